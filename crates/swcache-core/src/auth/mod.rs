//! Credentials for the background sync endpoint.
//!
//! The bearer token sent with synced records lives in the OS keychain,
//! one entry per deployment variant.

pub mod credentials;

pub use credentials::TokenStore;
