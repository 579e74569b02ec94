//! Buildhook: premerge build status cache
//!
//! Maps ticket branches to the build of their trial merge with master, notifying the
//! build coordinator the first time a branch head is seen and caching the results the
//! coordinator reports back.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod notify;
pub mod oracle;
pub mod resolver;
pub mod store;
pub mod types;
