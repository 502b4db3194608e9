//! REST API for mail-search
//!
//! - `GET /health`
//! - `GET /api/search?q=&account_id=&max_results=`
//! - `POST /api/search`
//! - `POST /api/index/sync`
//! - `GET /api/index/stats`

pub mod handlers;
pub mod server;

pub use handlers::AppState;
pub use server::ApiServer;
