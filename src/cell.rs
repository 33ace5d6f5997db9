//! Cell content resolution.
//!
//! A cell is resolved by walking a fixed chain of rules; the first rule that
//! applies decides the content:
//!
//! 1. date format → formatted date, raw text when the value is not a date
//! 2. `[USE_VALUE]` URL → hyperlink to the value itself
//! 3. URL template → hyperlink built from placeholders
//! 4. lookup with entity linking → navigation link to the related record
//! 5. lookup without entity linking → plain text
//! 6. formatted companion of the column key → its text
//! 7. anything else → the value as text
//!
//! Hyperlinks are only produced for absolute `http`/`https` URLs; anything
//! else degrades to the link text as plain text.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::column::ColumnDescriptor;
use crate::date::format_value;
use crate::link::{
    EXTERNAL_LINK_TEXT, SafeUrl, TEMPLATE_LINK_TEXT, USE_VALUE_PLACEHOLDER, fill_template,
    link_text,
};
use crate::record::{Record, is_truthy, value_text};

pub const JOIN_DELIMITER: &str = "; ";

/// Host-supplied values that influence rendering.
#[derive(Debug, Clone, Default)]
pub struct CellContext {
    pub base_environment_url: Option<String>,
    pub debug: bool,
}

impl CellContext {
    pub fn new(base_environment_url: Option<String>) -> Self {
        Self {
            base_environment_url,
            debug: false,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum CellContent {
    Empty,
    PlainText(String),
    FormattedDate(String),
    Hyperlink {
        href: SafeUrl,
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    EntityLink {
        target_entity: String,
        target_id: String,
        text: String,
    },
}

impl CellContent {
    /// The text a reader sees in the cell.
    pub fn display_text(&self) -> &str {
        match self {
            Self::Empty => "",
            Self::PlainText(text) | Self::FormattedDate(text) => text,
            Self::Hyperlink { text, .. } | Self::EntityLink { text, .. } => text,
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(self, Self::Hyperlink { .. } | Self::EntityLink { .. })
    }
}

/// Content before any rendering rule: formatted companion of the field name,
/// then of the column key, then the raw field value. Joined columns append
/// every truthy listed field, separated by `"; "`.
pub fn cell_value(record: &Record, column: &ColumnDescriptor) -> Option<Value> {
    let base = record
        .formatted(&column.field_name)
        .or_else(|| record.formatted(&column.key))
        .or_else(|| record.get(&column.field_name));

    let Some(fields) = column.join_fields() else {
        return base.cloned();
    };

    let mut joined = base.filter(|v| is_truthy(Some(v))).cloned();
    for field in fields {
        let Some(extra) = record.get(field).filter(|v| is_truthy(Some(v))) else {
            continue;
        };
        joined = Some(match joined {
            Some(prev) => Value::String(format!(
                "{}{JOIN_DELIMITER}{}",
                value_text(&prev),
                value_text(extra)
            )),
            None => extra.clone(),
        });
    }
    Some(joined.unwrap_or_else(|| Value::String(String::new())))
}

/// Resolve the displayable content of one cell.
pub fn resolve_cell(record: &Record, column: &ColumnDescriptor, ctx: &CellContext) -> CellContent {
    let content = cell_value(record, column);
    if !is_truthy(record.get(&column.key)) && !is_truthy(content.as_ref()) {
        return CellContent::Empty;
    }
    let content = content.unwrap_or(Value::Null);
    let text = value_text(&content);

    if let Some(pattern) = column.date_format() {
        return match format_value(&content, pattern) {
            Ok(formatted) => CellContent::FormattedDate(formatted),
            Err(err) => {
                if ctx.debug {
                    debug!(column = %column.key, value = %text, error = %err, "date formatting failed");
                }
                CellContent::PlainText(text)
            }
        };
    }

    if let Some(url) = column.url() {
        let (href, default_text) = if url == USE_VALUE_PLACEHOLDER {
            (text.clone(), EXTERNAL_LINK_TEXT)
        } else {
            let record_id = record.get(&column.key).map(value_text).unwrap_or_default();
            let href = fill_template(url, ctx.base_environment_url.as_deref(), &record_id);
            (href, TEMPLATE_LINK_TEXT)
        };
        let label = link_text(&text, column.url_link_text(), default_text);
        return match SafeUrl::parse(&href) {
            Some(href) => CellContent::Hyperlink { href, text: label },
            None => {
                if ctx.debug {
                    debug!(column = %column.key, href = %href, "refusing to link to unsafe URL");
                }
                CellContent::PlainText(label)
            }
        };
    }

    if let Some(entity) = record.lookup_logical_name(&column.field_name) {
        if column.entity_linking() {
            return CellContent::EntityLink {
                target_entity: value_text(entity),
                target_id: record
                    .get(&column.field_name)
                    .map(value_text)
                    .unwrap_or_default(),
                text,
            };
        }
        return CellContent::PlainText(text);
    }

    if let Some(formatted) = record.formatted(&column.key) {
        return CellContent::PlainText(value_text(formatted));
    }

    CellContent::PlainText(text)
}
