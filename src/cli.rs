//! CLI domain: parse, route, output, and presentation only.
//! No domain orchestration; single route table dispatches to the resolver.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{format_record_json, format_record_text, format_resolution};
pub use route::RunContext;
