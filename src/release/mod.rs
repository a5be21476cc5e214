//! Release layer: talking to the repository host
//!
//! # Modules
//!
//! - [`types`]: Repository identity, releases and assets
//! - [`auth`]: Authorization headers derived from the repository token
//! - [`source`]: `ReleaseSource` trait, paginated listing and asset selection
//! - [`github`]: GitHub Releases API implementation of `ReleaseSource`
//! - [`download`]: Chunked asset download with progress reporting

pub mod auth;
pub mod download;
pub mod github;
pub mod source;
pub mod types;
