//! GitHub REST API layer
//!
//! # Modules
//!
//! - [`client`]: `reqwest`-backed client implementing [`client::ReleaseSource`]
//! - [`models`]: serde models for releases, assets, repository details and
//!   user identity

pub mod client;
pub mod models;
