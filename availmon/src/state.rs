use commons::authz::Role;
use commons::config::ServerSettings;
use commons::status::Location;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Known locations: the statically configured set plus whatever peer
/// sources have reported, merged by name with config taking precedence
/// (§4.2, §9 "server-configured locations win over colliding peer
/// locations").
pub struct LocationRegistry {
    config_locations: Vec<Location>,
    peer_locations: RwLock<BTreeMap<String, Vec<Location>>>,
}

impl LocationRegistry {
    pub fn new(config_locations: Vec<Location>) -> Self {
        LocationRegistry {
            config_locations,
            peer_locations: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn config_locations(&self) -> Vec<Location> {
        self.config_locations.clone()
    }

    /// Replace the set of locations last reported by one peer source.
    pub fn replace_peer_locations(&self, source_name: &str, locations: Vec<Location>) {
        let mut guard = self.peer_locations.write().expect("lock poisoned");
        guard.insert(source_name.to_string(), locations);
    }

    /// The merged, deduplicated-by-name view used to serve `/api/locations`.
    pub fn snapshot(&self) -> Vec<Location> {
        let mut by_name: BTreeMap<String, Location> = BTreeMap::new();
        for loc in &self.config_locations {
            by_name.insert(loc.name.clone(), loc.clone());
        }
        let guard = self.peer_locations.read().expect("lock poisoned");
        for locations in guard.values() {
            for loc in locations {
                by_name.entry(loc.name.clone()).or_insert_with(|| loc.clone());
            }
        }
        by_name.into_values().collect()
    }
}

/// Shared, read-mostly state handed to every HTTP handler.
pub struct AppState {
    pub cache: Arc<commons::cache::Cache>,
    pub locations: Arc<LocationRegistry>,
    pub roles: Vec<Role>,
    pub server: ServerSettings,
}
