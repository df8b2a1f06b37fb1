//! Zpark REST API
//! Alert intake from Zabbix and webhook callbacks from Spark

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod types;

pub use handlers::AppState;
pub use routes::create_router;
pub use types::*;
