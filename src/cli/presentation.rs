//! CLI presentation: text and JSON rendering of build records.

use crate::api::build_view;
use crate::types::BuildRecord;
use serde_json::json;

/// One-line summary of a record.
pub fn format_record_text(record: &BuildRecord, coordinator_web_host: &str) -> String {
    let view = build_view(record, coordinator_web_host);
    let mut line = format!("{} {}", record.target_commit.short(), view.label);
    if let (Some(builder), Some(number)) = (&record.builder, record.build_number) {
        line.push_str(&format!(" ({} #{})", builder, number));
    }
    if let Some(url) = view.url {
        line.push_str(&format!(" {}", url));
    }
    line
}

pub fn format_record_json(record: &BuildRecord, coordinator_web_host: &str) -> String {
    let view = build_view(record, coordinator_web_host);
    json!({
        "target_commit": record.target_commit,
        "master_revision": record.master_revision,
        "builder": record.builder,
        "build_number": record.build_number,
        "status": record.status,
        "label": view.label,
        "review_class": view.review_class,
        "url": view.url,
    })
    .to_string()
}

/// Render an optional record; `None` renders as "no build".
pub fn format_resolution(
    record: Option<&BuildRecord>,
    format: &str,
    coordinator_web_host: &str,
) -> String {
    match (record, format) {
        (Some(r), "json") => format_record_json(r, coordinator_web_host),
        (Some(r), _) => format_record_text(r, coordinator_web_host),
        (None, "json") => "null".to_string(),
        (None, _) => "No build".to_string(),
    }
}
