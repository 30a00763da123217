pub mod route;

pub use route::{GeoFact, GeoSource, Hop, RouteRow, RouteSummary, UnreachableHop};
