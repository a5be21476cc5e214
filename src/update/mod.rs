//! Update orchestration
//!
//! - [`coordinator`]: Decides whether to update, downloads, then records the new version

pub mod coordinator;
