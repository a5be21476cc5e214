//! Version layer: what is published, what is wanted and what is installed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   semver    │────▶│    spec     │     │    cache    │
//! │  (parse)    │     │  (filter)   │     │ (installed) │
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`semver`]: Tag normalization and `SemanticVersion`
//! - [`spec`]: Compatibility expressions such as `~1.2` or `>=1.0, <2.0`
//! - [`cache`]: JSON file cache of the last installed version per repository

pub mod cache;
pub mod semver;
pub mod spec;
