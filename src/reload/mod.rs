//! Live reload: pushing "reload" to connected browsers.
//!
//! # Module Structure
//!
//! ```text
//! reload/
//! ├── hub       # ReloadHub: accepted WebSocket clients + broadcast
//! ├── message   # JSON wire format
//! └── server    # Port binding with retry
//! ```
//!
//! The hub is the only [`Notifier`] the dev loop uses; watch chains hold it
//! behind the trait so they can run without a socket in tests.

mod hub;
mod message;
mod server;

pub use hub::{Notifier, ReloadHub};
pub use server::MAX_PORT_RETRIES;
