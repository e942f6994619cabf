//! HTTP API Module
//! REST surface for workbook cleaning and Google Cloud uploads

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod types;

pub use handlers::AppState;
pub use routes::create_router;
pub use types::*;
