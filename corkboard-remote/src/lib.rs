//! HTTP implementation of [`corkboard::BoardBackend`].

pub mod client;
pub mod config;
pub mod types;

pub use client::RemoteBackend;
pub use config::RemoteConfig;
