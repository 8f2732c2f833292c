//! CLI presentation: text and json formatters per command.

use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde::Serialize;
use serde_json::json;

use crate::store::ActorRecord;

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn format_actor_list_text(actors: &[ActorRecord]) -> String {
    if actors.is_empty() {
        return "No actors found.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec![
        "Actor",
        "Name",
        "Tracked",
        "Notebook",
        "Last auto refresh",
        "Auto status",
        "Last duration (ms)",
    ]);
    for actor in actors {
        table.add_row(vec![
            actor.id.clone(),
            actor.display_name.clone(),
            if actor.is_tracked { "yes" } else { "no" }.to_string(),
            actor.notebook_status.to_string(),
            or_dash(actor.auto_refresh_last_run_at.map(|at| at.to_rfc3339())),
            or_dash(actor.auto_refresh_last_status),
            or_dash(actor.last_refresh_duration_ms),
        ]);
    }
    format!("{}\n\nTotal: {} actor(s)", table, actors.len())
}

pub fn format_actor_list_json(actors: &[ActorRecord]) -> String {
    let out = json!({ "actors": actors, "total": actors.len() });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_eligible_text(actors: &[ActorRecord]) -> String {
    if actors.is_empty() {
        return "No actors are due for auto-refresh.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Actor", "Name", "Last auto refresh"]);
    for actor in actors {
        table.add_row(vec![
            actor.id.clone(),
            actor.display_name.clone(),
            actor
                .auto_refresh_last_run_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
        ]);
    }
    format!("Next auto-refresh batch:\n{}", table)
}

pub fn format_eligible_json(actors: &[ActorRecord]) -> String {
    let ids: Vec<&str> = actors.iter().map(|a| a.id.as_str()).collect();
    let out = json!({ "eligible": ids, "total": ids.len() });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_recovered(recovered: &[String]) -> String {
    if recovered.is_empty() {
        return "No stalled refreshes found.".to_string();
    }
    let mut output = format!("Recovered {} stalled refresh(es):\n", recovered.len());
    for id in recovered {
        output.push_str(&format!("  {}\n", id));
    }
    output
}

/// Pretty JSON for any read model.
pub fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
