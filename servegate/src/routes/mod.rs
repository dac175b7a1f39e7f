pub mod manager;
pub mod table;
pub mod update;

pub use manager::RouteManager;
pub use table::{normalize_route, RouteTable, RoutesFile};
pub use update::RouteUpdater;
