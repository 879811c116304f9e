//! Query-parameter filter engine (§4.6).

use crate::index::LabelIndex;
use crate::status::AppStatus;
use std::collections::BTreeSet;

const SYSTEM_SINGLE_VALUED: [&str; 4] = ["name", "location", "source", "origin_url"];

/// A parsed, ready-to-evaluate query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedFilters {
    /// AND-combined `(field, value)` predicates: single-valued system
    /// fields plus every `labels.<key>=<value>`.
    pub and_predicates: Vec<(String, String)>,
    /// `status` values, OR-combined, then ANDed with everything else.
    pub status_values: Vec<String>,
    /// Query parameters that were ignored, already formatted as the
    /// warning message that should be logged.
    pub warnings: Vec<String>,
}

impl ParsedFilters {
    pub fn is_empty(&self) -> bool {
        self.and_predicates.is_empty() && self.status_values.is_empty()
    }
}

/// Parse a raw (undecoded) HTTP query string into `ParsedFilters`.
///
/// Unknown parameters are kept as warning messages rather than causing
/// an error; the common mistake `label[x]=v` is recognized and rewritten
/// to `labels.x` in the warning text (§4.6).
pub fn parse(raw_query: &str) -> ParsedFilters {
    let mut filters = ParsedFilters::default();
    for (key, value) in url::form_urlencoded::parse(raw_query.as_bytes()) {
        let key = key.into_owned();
        let value = value.into_owned();

        if key == "status" {
            filters.status_values.push(value);
            continue;
        }
        if SYSTEM_SINGLE_VALUED.contains(&key.as_str()) {
            filters.and_predicates.push((key, value));
            continue;
        }
        if let Some(label_key) = key.strip_prefix("labels.") {
            filters
                .and_predicates
                .push((format!("labels.{}", label_key), value));
            continue;
        }
        if let Some(bracketed) = parse_bracket_label_mistake(&key) {
            filters.warnings.push(format!(
                "unknown query parameter '{}', did you mean 'labels.{}'?",
                key, bracketed
            ));
            continue;
        }
        filters
            .warnings
            .push(format!("unknown query parameter '{}' ignored", key));
    }
    filters
}

/// Recognize the common mistake `label[x]` and return `x`.
fn parse_bracket_label_mistake(key: &str) -> Option<&str> {
    let rest = key.strip_prefix("label[")?;
    rest.strip_suffix(']')
}

/// Evaluate a parsed query against a cache snapshot + its label index.
///
/// 1. If `status` has multiple values, first narrow the snapshot by the
///    status OR-set.
/// 2. AND-combine the remaining filters via index intersection.
/// 3. Intersect both results.
/// 4. Sort by `name` ascending for deterministic output.
pub fn evaluate(snapshot: &[AppStatus], index: &LabelIndex, filters: &ParsedFilters) -> Vec<AppStatus> {
    let status_ids: Option<BTreeSet<String>> = if filters.status_values.is_empty() {
        None
    } else {
        let mut union = BTreeSet::new();
        for value in &filters.status_values {
            union.extend(index.lookup("status", value));
        }
        Some(union)
    };

    let predicate_ids = index.find_by_labels(&filters.and_predicates);

    let selected: BTreeSet<String> = match status_ids {
        Some(status_set) => status_set.intersection(&predicate_ids).cloned().collect(),
        None => predicate_ids,
    };

    let mut results: Vec<AppStatus> = snapshot
        .iter()
        .filter(|app| selected.contains(&app.app_id()))
        .cloned()
        .collect();
    results.sort_by(|a, b| a.name.cmp(&b.name));
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;
    use std::collections::BTreeMap;

    fn app(name: &str, status: Status, env: &str) -> AppStatus {
        AppStatus {
            name: name.to_string(),
            location: "loc1".to_string(),
            status,
            source: "src".to_string(),
            origin_url: "https://self".to_string(),
            labels: maplit::btreemap! { "env".to_string() => env.to_string() },
        }
    }

    #[test]
    fn status_is_or_combined_and_anded_with_labels() {
        let apps = vec![
            app("a1", Status::Up, "prod"),
            app("a2", Status::Down, "prod"),
            app("a3", Status::Unavailable, "prod"),
            app("a4", Status::Up, "staging"),
        ];
        let index = LabelIndex::rebuild(&apps);

        let filters = parse("status=up&status=down");
        let result = evaluate(&apps, &index, &filters);
        assert_eq!(result.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(), vec!["a1", "a2"]);

        let filters = parse("status=up&status=down&labels.env=prod");
        let result = evaluate(&apps, &index, &filters);
        assert_eq!(result.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(), vec!["a1", "a2"]);
    }

    #[test]
    fn results_sorted_by_name() {
        let apps = vec![app("zeta", Status::Up, "prod"), app("alpha", Status::Up, "prod")];
        let index = LabelIndex::rebuild(&apps);
        let filters = parse("");
        let result = evaluate(&apps, &index, &filters);
        assert_eq!(result[0].name, "alpha");
        assert_eq!(result[1].name, "zeta");
    }

    #[test]
    fn bracket_label_mistake_is_rewritten_in_warning() {
        let filters = parse("label%5Bx%5D=v");
        assert_eq!(filters.and_predicates.len(), 0);
        assert_eq!(filters.warnings.len(), 1);
        assert!(filters.warnings[0].contains("labels.x"));
    }

    #[test]
    fn unknown_param_is_ignored_with_warning() {
        let filters = parse("bogus=1");
        assert!(filters.and_predicates.is_empty());
        assert_eq!(filters.warnings.len(), 1);
    }
}
