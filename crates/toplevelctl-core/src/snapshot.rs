//! Snapshot rendering.
//!
//! A snapshot is the committed view of every live window: one text line per
//! window, or a JSON array. JSON is indented by default and printed on a
//! single line in compact mode. Closed windows waiting for the next sweep are
//! never included.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::error::Result;
use crate::store::{Parent, WindowRecord, WindowStore};

/// Placeholder for a parent that is not (or no longer) tracked.
const UNKNOWN_APP_ID: &str = "unknown";

/// Indentation step of non-compact JSON.
const JSON_INDENT: &[u8] = b" ";

/// Output encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Text,
    /// Indented JSON array.
    Json,
    /// JSON array on a single line.
    CompactJson,
}

impl Format {
    /// `compact` only matters for JSON output.
    pub fn from_flags(json: bool, compact: bool) -> Self {
        match (json, compact) {
            (false, _) => Format::Text,
            (true, false) => Format::Json,
            (true, true) => Format::CompactJson,
        }
    }
}

#[derive(Serialize)]
struct Entry<'a> {
    id: u64,
    title: Option<&'a str>,
    app_id: Option<String>,
    parent_id: Option<u64>,
    parent_app_id: Option<String>,
    maximized: bool,
    minimized: bool,
    active: bool,
    fullscreen: bool,
}

/// Render the live windows of `store`, ascending by id when `sorted`.
pub fn render<H>(store: &WindowStore<H>, format: Format, sorted: bool) -> Result<String> {
    let live = store.iter(sorted).filter(|record| !record.is_closed());

    match format {
        Format::Text => {
            let mut out = String::new();
            for record in live {
                write_text_line(&mut out, record);
            }
            Ok(out)
        }
        Format::Json | Format::CompactJson => {
            let entries: Vec<Entry<'_>> = live.map(|record| entry(store, record)).collect();
            let mut out = if format == Format::CompactJson {
                serde_json::to_string(&entries)?
            } else {
                to_indented_json(&entries)?
            };
            out.push('\n');
            Ok(out)
        }
    }
}

fn to_indented_json<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(JSON_INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    // serde_json only emits UTF-8.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn entry<'a, H>(store: &'a WindowStore<H>, record: &'a WindowRecord<H>) -> Entry<'a> {
    let parent_app_id = match record.parent {
        Parent::None => None,
        Parent::Window(id) => Some(
            store
                .find_live(id)
                .and_then(|parent| parent.app_id.as_deref())
                .map(str::to_lowercase)
                .unwrap_or_else(|| UNKNOWN_APP_ID.to_string()),
        ),
        Parent::Unresolved => Some(UNKNOWN_APP_ID.to_string()),
    };

    Entry {
        id: record.id.0,
        title: record.title.as_deref(),
        app_id: record.app_id.as_deref().map(str::to_lowercase),
        parent_id: parent_id(record.parent),
        parent_app_id,
        maximized: record.state.maximized,
        minimized: record.state.minimized,
        active: record.state.activated,
        fullscreen: record.state.fullscreen,
    }
}

fn parent_id(parent: Parent) -> Option<u64> {
    match parent {
        Parent::Window(id) => Some(id.0),
        Parent::None | Parent::Unresolved => None,
    }
}

fn write_text_line<H>(out: &mut String, record: &WindowRecord<H>) {
    // Writing into a String cannot fail.
    let _ = write!(
        out,
        "-> {}. title={} app_id={}",
        record.id,
        record.title.as_deref().unwrap_or("(nil)"),
        record.app_id.as_deref().unwrap_or("(nil)"),
    );
    match parent_id(record.parent) {
        Some(id) => {
            let _ = write!(out, " parent={id}");
        }
        None => out.push_str(" no parent"),
    }

    let state = record.state;
    out.push_str(pick(state.maximized, " maximized", " unmaximized"));
    out.push_str(pick(state.minimized, " minimized", " unminimized"));
    out.push_str(pick(state.activated, " active", " inactive"));
    if state.fullscreen {
        out.push_str(" fullscreen");
    }
    out.push('\n');
}

fn pick(flag: bool, set: &'static str, unset: &'static str) -> &'static str {
    if flag { set } else { unset }
}
