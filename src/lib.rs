//! Wallet background service
//!
//! The trust boundary of a browser wallet: durable keyed storage, the
//! registry of sites allowed to talk to an account, a cached view of
//! network health, and the signing, submission and tracking of
//! transactions the user has reviewed.
//!
//! # Security Model
//!
//! - Every request from a site is checked against the pre-authorization
//!   registry at the time it is handled
//! - Private keys never leave the wallet module
//! - Storage failures never surface to callers as partial state

pub mod accounts;
pub mod clock;
pub mod config;
pub mod network;
pub mod node;
pub mod preauth;
pub mod service;
pub mod storage;
pub mod transactions;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use config::{Config, PRIVATE_KEY_ENV};
pub use error::{Error, Result};
pub use service::{BackgroundService, Collaborators};
