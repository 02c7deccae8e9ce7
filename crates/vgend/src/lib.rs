//! vgend: HTTP daemon for vgen runs
//!
//! - `POST /run` submits a run, `GET /run/:id` snapshots it
//! - `GET /run/:id/stream` follows its events over SSE
//! - `POST /run/:id/input` answers a human review gate
//! - `GET /runs`, `DELETE /run/:id` and `GET /health`

pub mod api;
pub mod config;
pub mod error;
pub mod server;

pub use api::{create_router, AppState};
pub use config::{DaemonConfig, ServerConfig};
pub use error::{ApiError, ApiResult, DaemonError, DaemonResult};
pub use server::Server;
