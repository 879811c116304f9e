//! Inverted label index: `(field, value) -> {app-id}` (§4.5).

use crate::status::AppStatus;
use std::collections::{BTreeMap, BTreeSet};

/// System fields every app is indexed on in addition to its user labels.
pub const SYSTEM_FIELDS: [&str; 5] = ["name", "location", "status", "source", "origin_url"];

/// Inverted index from `(field, value)` to the set of app-ids carrying it.
#[derive(Clone, Debug, Default)]
pub struct LabelIndex {
    entries: BTreeMap<(String, String), BTreeSet<String>>,
}

impl LabelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the whole index from a cache snapshot. Cost is
    /// O(apps × fields), matching the §4.5 complexity note.
    pub fn rebuild(apps: &[AppStatus]) -> Self {
        let mut entries: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();
        for app in apps {
            let id = app.app_id();
            Self::insert(&mut entries, "name", &app.name, &id);
            Self::insert(&mut entries, "location", &app.location, &id);
            Self::insert(&mut entries, "status", app.status.as_str(), &id);
            Self::insert(&mut entries, "source", &app.source, &id);
            Self::insert(&mut entries, "origin_url", &app.origin_url, &id);
            for (key, value) in &app.labels {
                let field = format!("labels.{}", key);
                Self::insert(&mut entries, &field, value, &id);
            }
        }
        LabelIndex { entries }
    }

    fn insert(
        entries: &mut BTreeMap<(String, String), BTreeSet<String>>,
        field: &str,
        value: &str,
        app_id: &str,
    ) {
        entries
            .entry((field.to_string(), value.to_string()))
            .or_insert_with(BTreeSet::new)
            .insert(app_id.to_string());
    }

    /// Look up the set of app-ids for one `(field, value)` predicate.
    pub fn lookup(&self, field: &str, value: &str) -> BTreeSet<String> {
        self.entries
            .get(&(field.to_string(), value.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Intersection (AND) of the app-id sets for each `(field, value)` filter.
    /// An empty filter map returns every known app-id.
    pub fn find_by_labels(&self, filters: &[(String, String)]) -> BTreeSet<String> {
        if filters.is_empty() {
            return self.all_app_ids();
        }
        let mut sets = filters
            .iter()
            .map(|(field, value)| self.lookup(field, value))
            .collect::<Vec<_>>();
        sets.sort_by_key(|s| s.len());
        let mut iter = sets.into_iter();
        let first = match iter.next() {
            Some(s) => s,
            None => return BTreeSet::new(),
        };
        iter.fold(first, |acc, set| acc.intersection(&set).cloned().collect())
    }

    fn all_app_ids(&self) -> BTreeSet<String> {
        self.entries
            .values()
            .flat_map(|set| set.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;
    use std::collections::BTreeMap;

    fn app(name: &str, source: &str, status: Status, labels: &[(&str, &str)]) -> AppStatus {
        AppStatus {
            name: name.to_string(),
            location: "loc1".to_string(),
            status,
            source: source.to_string(),
            origin_url: "https://self".to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn lookup_returns_exact_set_for_every_field_value() {
        let apps = vec![
            app("a1", "src", Status::Up, &[("env", "prod")]),
            app("a2", "src", Status::Down, &[("env", "staging")]),
        ];
        let index = LabelIndex::rebuild(&apps);
        assert_eq!(index.lookup("status", "up"), maplit::btreeset! { "src:a1".to_string() });
        assert_eq!(
            index.lookup("labels.env", "staging"),
            maplit::btreeset! { "src:a2".to_string() }
        );
    }

    #[test]
    fn empty_filter_returns_all_app_ids() {
        let apps = vec![app("a1", "src", Status::Up, &[]), app("a2", "src", Status::Down, &[])];
        let index = LabelIndex::rebuild(&apps);
        let all = index.find_by_labels(&[]);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn and_combines_multiple_predicates() {
        let apps = vec![
            app("a1", "src", Status::Up, &[("env", "prod")]),
            app("a2", "src", Status::Up, &[("env", "staging")]),
        ];
        let index = LabelIndex::rebuild(&apps);
        let filters = vec![("status".to_string(), "up".to_string()), ("labels.env".to_string(), "prod".to_string())];
        let result = index.find_by_labels(&filters);
        assert_eq!(result, maplit::btreeset! { "src:a1".to_string() });
    }
}
