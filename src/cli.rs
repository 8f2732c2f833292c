//! CLI domain: parse, route, output, and presentation only.
//! No scheduling logic; the route table dispatches to the scheduler and stores.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{ActorCommands, Cli, Commands};
pub use presentation::{
    format_actor_list_json, format_actor_list_text, format_eligible_json, format_eligible_text,
    format_json, format_recovered,
};
pub use route::RunContext;
