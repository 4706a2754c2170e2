//! Per-route, per-client state storage.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::rules::{RouteConfig, RouteTable};

/// A shared, individually locked per-client state object.
pub type ClientSlot<S> = Arc<Mutex<S>>;

/// Client states for a single configured route.
struct RouteClients<S> {
    rule: RouteConfig,
    clients: DashMap<String, ClientSlot<S>>,
}

/// Two-level container: route -> client key -> state.
///
/// The route level is fixed at construction and never mutated afterwards, so
/// it needs no synchronization. The client level is a sharded concurrent map
/// whose values carry their own mutex; callers hold that mutex for the whole
/// check-and-update of a decision.
pub struct ClientStore<S> {
    routes: HashMap<String, RouteClients<S>>,
}

impl<S> ClientStore<S> {
    /// Create an empty client map for every configured route.
    pub fn new(table: &RouteTable) -> Self {
        let mut routes = HashMap::with_capacity(table.len());
        for rule in table.route_names().filter_map(|name| table.get(name)) {
            routes.insert(
                rule.route.clone(),
                RouteClients {
                    rule: rule.clone(),
                    clients: DashMap::new(),
                },
            );
        }
        Self { routes }
    }

    /// Get the state slot for `client_key` on `route`, creating it on first sight.
    ///
    /// Returns `None` for routes that are not configured. Concurrent first
    /// requests from the same client observe a single slot; `init` runs at most
    /// once per key.
    pub fn slot<F>(&self, route: &str, client_key: &str, init: F) -> Option<ClientSlot<S>>
    where
        F: FnOnce(&RouteConfig) -> S,
    {
        let route_clients = self.routes.get(route)?;

        // Fast path: the shard read lock is enough once the client is known.
        if let Some(slot) = route_clients.clients.get(client_key) {
            return Some(Arc::clone(slot.value()));
        }

        let slot = route_clients
            .clients
            .entry(client_key.to_owned())
            .or_insert_with(|| {
                debug!(route = %route, client = %client_key, "Creating client state");
                Arc::new(Mutex::new(init(&route_clients.rule)))
            });
        Some(Arc::clone(slot.value()))
    }

    /// Look up an existing slot without creating one.
    pub fn get(&self, route: &str, client_key: &str) -> Option<ClientSlot<S>> {
        let route_clients = self.routes.get(route)?;
        route_clients
            .clients
            .get(client_key)
            .map(|slot| Arc::clone(slot.value()))
    }

    pub fn contains_route(&self, route: &str) -> bool {
        self.routes.contains_key(route)
    }

    /// Number of clients seen on a route.
    pub fn route_client_count(&self, route: &str) -> usize {
        self.routes
            .get(route)
            .map(|route_clients| route_clients.clients.len())
            .unwrap_or(0)
    }

    /// Number of clients seen across all routes.
    pub fn client_count(&self) -> usize {
        self.routes
            .values()
            .map(|route_clients| route_clients.clients.len())
            .sum()
    }
}
