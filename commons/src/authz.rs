//! Label-scoped authorization filter (§4.8).

use crate::status::AppStatus;
use std::collections::{BTreeMap, BTreeSet};

/// A role grants visibility into apps carrying one of a set of allowed
/// values for each of a set of label keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Role {
    pub name: String,
    pub allowed_labels: BTreeMap<String, BTreeSet<String>>,
}

/// An authenticated caller's identity plus its role-derived label
/// allow-set, as constructed by the (out-of-scope) login collaborator.
#[derive(Clone, Debug, Default)]
pub struct Principal {
    pub username: String,
    pub roles: Vec<Role>,
    pub is_admin: bool,
    pub has_full_access: bool,
}

impl Principal {
    pub fn admin() -> Self {
        Principal {
            username: "admin".to_string(),
            roles: Vec::new(),
            is_admin: true,
            has_full_access: false,
        }
    }

    fn bypasses_authz(&self) -> bool {
        self.is_admin || self.has_full_access
    }

    /// Union of every role's `key -> {allowed values}` map.
    pub fn allowed_labels(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut merged: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for role in &self.roles {
            for (key, values) in &role.allowed_labels {
                merged
                    .entry(key.clone())
                    .or_insert_with(BTreeSet::new)
                    .extend(values.iter().cloned());
            }
        }
        merged
    }
}

/// An app passes iff, for at least one label key the principal is
/// allowed to see, the app carries that key with an allowed value. Apps
/// with no labels are rejected for non-admin principals.
fn app_is_visible(app: &AppStatus, allowed: &BTreeMap<String, BTreeSet<String>>) -> bool {
    if app.labels.is_empty() {
        return false;
    }
    app.labels.iter().any(|(key, value)| {
        allowed
            .get(key)
            .map(|values| values.contains(value))
            .unwrap_or(false)
    })
}

/// Filter an app snapshot down to what `principal` may see.
pub fn filter_apps(principal: &Principal, apps: &[AppStatus]) -> Vec<AppStatus> {
    if principal.bypasses_authz() {
        return apps.to_vec();
    }
    let allowed = principal.allowed_labels();
    apps.iter()
        .filter(|app| app_is_visible(app, &allowed))
        .cloned()
        .collect()
}

/// Restrict a label-key listing (`GET /api/labels`) to keys the
/// principal is allowed to see.
pub fn filter_label_keys(principal: &Principal, keys: BTreeSet<String>) -> BTreeSet<String> {
    if principal.bypasses_authz() {
        return keys;
    }
    let allowed = principal.allowed_labels();
    keys.into_iter().filter(|k| allowed.contains_key(k)).collect()
}

/// Restrict a label-value listing (`GET /api/labels?key`) to values the
/// principal is allowed to see for that key.
pub fn filter_label_values(
    principal: &Principal,
    key: &str,
    values: BTreeSet<String>,
) -> BTreeSet<String> {
    if principal.bypasses_authz() {
        return values;
    }
    let allowed = principal.allowed_labels();
    match allowed.get(key) {
        Some(permitted) => values.into_iter().filter(|v| permitted.contains(v)).collect(),
        None => BTreeSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(name: &str, labels: &[(&str, &str)]) -> AppStatus {
        use crate::status::Status;
        AppStatus {
            name: name.to_string(),
            location: "loc1".to_string(),
            status: Status::Up,
            source: "src".to_string(),
            origin_url: "https://self".to_string(),
            labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    fn role_env_prod() -> Role {
        Role {
            name: "viewer".to_string(),
            allowed_labels: maplit::btreemap! { "env".to_string() => maplit::btreeset!{ "prod".to_string() } },
        }
    }

    #[test]
    fn scenario_s4_authorization() {
        let principal = Principal {
            username: "u".to_string(),
            roles: vec![role_env_prod()],
            is_admin: false,
            has_full_access: false,
        };
        let apps = vec![
            app("A", &[("env", "prod")]),
            app("B", &[("env", "staging")]),
            app("C", &[("team", "x")]),
        ];
        let visible = filter_apps(&principal, &apps);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, "A");

        let keys: BTreeSet<String> = maplit::btreeset! { "env".to_string(), "team".to_string() };
        assert_eq!(filter_label_keys(&principal, keys), maplit::btreeset! { "env".to_string() });

        let values: BTreeSet<String> = maplit::btreeset! { "prod".to_string(), "staging".to_string() };
        assert_eq!(
            filter_label_values(&principal, "env", values),
            maplit::btreeset! { "prod".to_string() }
        );
    }

    #[test]
    fn admin_bypasses_authz() {
        let apps = vec![app("A", &[("env", "prod")])];
        let visible = filter_apps(&Principal::admin(), &apps);
        assert_eq!(visible.len(), 1);
    }

    #[test]
    fn apps_with_no_labels_are_rejected_for_non_admin() {
        let principal = Principal {
            username: "u".to_string(),
            roles: vec![role_env_prod()],
            is_admin: false,
            has_full_access: false,
        };
        let apps = vec![app("A", &[])];
        assert!(filter_apps(&principal, &apps).is_empty());
    }
}
