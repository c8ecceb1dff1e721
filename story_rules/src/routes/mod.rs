//! Ending routes and nearest-route resolution.

use serde::{Deserialize, Serialize};

use crate::state::Tendencies;

/// One ending path, defined by the tendency vector it sits at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub name: String,
    /// Forecast text shown while the player drifts toward this route.
    #[serde(default)]
    pub hint: String,
    pub target: Tendencies,
    /// Entry scene of this route's final chapter.
    pub scene: String,
    #[serde(default)]
    pub ending_title: String,
    #[serde(default)]
    pub ending_text: String,
}

/// Authored set of routes, kept sorted by id.
///
/// The sort order is the tie-break: when two routes sit at the same distance,
/// the one with the lexically smaller id wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Route>", into = "Vec<Route>")]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl From<Vec<Route>> for RouteTable {
    fn from(routes: Vec<Route>) -> Self {
        Self::new(routes)
    }
}

impl From<RouteTable> for Vec<Route> {
    fn from(table: RouteTable) -> Self {
        table.routes
    }
}

impl RouteTable {
    pub fn new(mut routes: Vec<Route>) -> Self {
        routes.sort_by(|a, b| a.id.cmp(&b.id));
        Self { routes }
    }

    pub fn get(&self, id: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Manhattan distance from `vector` to every route, in tie-break order.
    pub fn distances(&self, vector: &Tendencies) -> Vec<(&Route, i32)> {
        self.routes
            .iter()
            .map(|route| (route, route.target.manhattan(vector)))
            .collect()
    }

    /// The route closest to `vector`. `None` only for an empty table.
    pub fn nearest(&self, vector: &Tendencies) -> Option<&Route> {
        // min_by_key keeps the first minimum, and routes are sorted by id.
        self.distances(vector)
            .into_iter()
            .min_by_key(|(_, distance)| *distance)
            .map(|(route, _)| route)
    }

    /// Route used at END: the lock when set and known, otherwise nearest.
    pub fn resolve_ending(&self, lock: Option<&str>, vector: &Tendencies) -> Option<&Route> {
        lock.and_then(|id| self.get(id))
            .or_else(|| self.nearest(vector))
    }
}

/// Convenience wrapper returning only the route id.
pub fn nearest_route<'a>(table: &'a RouteTable, vector: &Tendencies) -> Option<&'a str> {
    table.nearest(vector).map(|route| route.id.as_str())
}
