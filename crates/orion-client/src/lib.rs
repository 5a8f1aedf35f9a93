//! Session conversation client.
//!
//! [`SessionClient`] is the controller behind one open session: it loads
//! history, keeps the text channel, falls back to plan-then-execute when the
//! channel is down, and merges voice turns into the same [`Timeline`].
//!
//! [`Timeline`]: orion_session::Timeline

/// `orion.toml` configuration.
pub mod config;
/// The session controller.
pub mod session;

pub use config::ClientConfig;
pub use session::SessionClient;
