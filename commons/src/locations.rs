//! Location rollup aggregation (§4.7).

use crate::status::{AppStatus, Location, Status};

/// Rollup law (§8 invariant 6):
/// - no apps at this location -> `None`
/// - all `up` -> `Up`
/// - any `down` -> `Down`
/// - otherwise -> `Unavailable`
fn rollup(apps_at_location: &[&AppStatus]) -> Option<Status> {
    if apps_at_location.is_empty() {
        return None;
    }
    if apps_at_location.iter().any(|a| a.status == Status::Down) {
        return Some(Status::Down);
    }
    if apps_at_location.iter().all(|a| a.status == Status::Up) {
        return Some(Status::Up);
    }
    Some(Status::Unavailable)
}

/// Compute the rollup status for each candidate location against an
/// already-filtered app set.
///
/// When `filter_active` is true, locations with no matching apps are
/// dropped from the result; in the unfiltered default case they are kept
/// with a `null` status.
pub fn aggregate(locations: &[Location], filtered_apps: &[AppStatus], filter_active: bool) -> Vec<Location> {
    locations
        .iter()
        .filter_map(|loc| {
            let matching: Vec<&AppStatus> = filtered_apps
                .iter()
                .filter(|app| app.location == loc.name)
                .collect();
            let status = rollup(&matching);
            if status.is_none() && filter_active {
                return None;
            }
            let mut out = loc.clone();
            out.status = status;
            Some(out)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn app(name: &str, location: &str, status: Status) -> AppStatus {
        AppStatus {
            name: name.to_string(),
            location: location.to_string(),
            status,
            source: "src".to_string(),
            origin_url: "https://self".to_string(),
            labels: BTreeMap::new(),
        }
    }

    fn loc(name: &str) -> Location {
        Location {
            name: name.to_string(),
            latitude: 0.0,
            longitude: 0.0,
            source: String::new(),
            status: None,
        }
    }

    #[test]
    fn rollup_law_matches_spec() {
        let all_up = vec![app("a", "locX", Status::Up), app("b", "locX", Status::Up)];
        let result = aggregate(&[loc("locX")], &all_up, false);
        assert_eq!(result[0].status, Some(Status::Up));

        let one_down = vec![app("a", "locX", Status::Up), app("b", "locX", Status::Down)];
        let result = aggregate(&[loc("locX")], &one_down, false);
        assert_eq!(result[0].status, Some(Status::Down));

        let unavailable_mix = vec![app("a", "locX", Status::Up), app("b", "locX", Status::Unavailable)];
        let result = aggregate(&[loc("locX")], &unavailable_mix, false);
        assert_eq!(result[0].status, Some(Status::Unavailable));

        let no_apps: Vec<AppStatus> = vec![];
        let result = aggregate(&[loc("locX")], &no_apps, false);
        assert_eq!(result[0].status, None);
    }

    #[test]
    fn filtered_locations_with_no_matches_are_omitted() {
        let apps = vec![app("a", "locX", Status::Up)];
        let result = aggregate(&[loc("locX"), loc("locY")], &apps, true);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "locX");
    }

    #[test]
    fn unfiltered_locations_with_no_matches_are_kept_with_null_status() {
        let apps = vec![app("a", "locX", Status::Up)];
        let result = aggregate(&[loc("locX"), loc("locY")], &apps, false);
        assert_eq!(result.len(), 2);
        let locy = result.iter().find(|l| l.name == "locY").unwrap();
        assert_eq!(locy.status, None);
    }
}
