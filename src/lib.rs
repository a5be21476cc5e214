//! Download the assets of the newest compatible GitHub release
//!
//! # Modules
//!
//! - [`version`]: Version parsing, compatibility specs and the installed-version cache
//! - [`release`]: Release listing, asset lookup and asset download
//! - [`update`]: Orchestrates a single update run
//! - [`config`]: Constants, settings file and default directories
//! - [`logging`]: Tracing subscriber setup for the binary
//! - [`error`]: Error types shared across modules

pub mod config;
pub mod error;
pub mod logging;
pub mod release;
pub mod update;
pub mod version;
