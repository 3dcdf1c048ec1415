pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod proxy;
pub mod server;
pub mod translate;

pub use config::{BridgeConfig, ResolvedConfig};
pub use error::{BridgeError, Result};
pub use logging::SharedJournal;
pub use server::{build_router, AppState};
