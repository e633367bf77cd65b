//! # Voice Widget Backend
//!
//! HTTP backend the storefront voice widget talks to. It mints RTC access
//! tokens, acknowledges agent activation requests and serves the product
//! inventory.
//!
//! ```rust,no_run
//! use voicewidget_backend::{BackendConfig, serve};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BackendConfig::from_env()?;
//!     serve(config).await
//! }
//! ```

use std::future::Future;

use tokio::net::TcpListener;
use tracing::info;

pub mod api;
pub mod config;
pub mod error;
pub mod inventory;
pub mod logging;
pub mod token;

pub use api::{ApiState, create_router};
pub use config::BackendConfig;
pub use error::{BackendError, BackendResult};
pub use token::{AccessClaims, AccessTokenIssuer, VideoGrant};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bind to the configured address and serve until the process exits
pub async fn serve(config: BackendConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.bind_address).await?;
    serve_with_shutdown(listener, config, std::future::pending()).await
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve_with_shutdown<F>(listener: TcpListener, config: BackendConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Voice widget backend listening on {}", listener.local_addr()?);
    let app = create_router(ApiState::new(config));
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    Ok(())
}
