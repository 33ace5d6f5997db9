//! Host parameters and their resolution into a grid configuration.
//!
//! The host hands every parameter over as a raw string (or nothing). Test
//! harnesses pass the literal `"val"` for unset text parameters; flags are on
//! only when set to `"1"`.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::cell::CellContext;
use crate::column::{ColumnDescriptor, normalize_columns};

/// Placeholder in the FetchXML replaced with the hosting record's id.
pub const DEFAULT_RECORD_ID_PLACEHOLDER: &str = "[RECORDID]";
/// Base URL used when the host cannot report its own.
pub const FALLBACK_BASE_URL: &str = "https://localhost";

const HARNESS_PLACEHOLDER: &str = "val";

static ENTITY_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<entity\s+name='([^']*)'").expect("ENTITY_NAME_RE: invalid regex pattern")
});

static GUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("GUID_RE: invalid regex pattern")
});

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Column layout is not valid JSON: {0}")]
    ColumnLayout(#[source] serde_json::Error),
    #[error("Custom button config is not valid JSON: {0}")]
    CustomButton(#[source] serde_json::Error),
}

/// Raw parameter strings as the host supplies them.
#[derive(Debug, Clone, Default)]
pub struct ControlParameters {
    pub fetch_xml: Option<String>,
    pub record_id_placeholder: Option<String>,
    pub column_layout_json: Option<String>,
    pub debug_mode: Option<String>,
    pub overridden_record_id: Option<String>,
    pub custom_button_config: Option<String>,
    pub hide_new_button: Option<String>,
    pub hide_refresh_button: Option<String>,
    pub hide_export_button: Option<String>,
    pub hide_bulk_edit_button: Option<String>,
}

/// Values the host knows about the page the grid sits on.
#[derive(Debug, Clone, Default)]
pub struct HostContext {
    pub record_id: Option<String>,
    pub base_environment_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolbarConfig {
    pub hide_new: bool,
    pub hide_refresh: bool,
    pub hide_export: bool,
    pub hide_bulk_edit: bool,
}

/// Custom toolbar button that opens a custom page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomButtonConfig {
    pub button_text: String,
    pub function_name: String,
    pub custom_page_name: String,
    #[serde(default)]
    pub web_resource_name: Option<String>,
    #[serde(default)]
    pub dialog_title: Option<String>,
    #[serde(default)]
    pub dialog_width: Option<f64>,
    #[serde(default)]
    pub dialog_height: Option<f64>,
    #[serde(default)]
    pub show_when_selected_min: Option<usize>,
    #[serde(default)]
    pub show_when_selected_max: Option<usize>,
}

impl CustomButtonConfig {
    /// Whether the button shows for the given number of selected rows.
    pub fn is_visible_for(&self, selected_count: usize) -> bool {
        self.show_when_selected_min.is_none_or(|min| selected_count >= min)
            && self.show_when_selected_max.is_none_or(|max| selected_count <= max)
    }

    /// Dialog title, defaulting to the button text.
    pub fn title(&self) -> &str {
        self.dialog_title.as_deref().unwrap_or(&self.button_text)
    }
}

#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Query ready to run; `None` when there is nothing valid to run.
    pub fetch_xml: Option<String>,
    pub primary_entity: String,
    pub record_id: Option<String>,
    pub columns: Vec<ColumnDescriptor>,
    pub debug: bool,
    pub base_environment_url: String,
    pub toolbar: ToolbarConfig,
    pub custom_button: Option<CustomButtonConfig>,
}

impl GridConfig {
    pub fn from_parameters(
        params: &ControlParameters,
        host: &HostContext,
    ) -> Result<Self, ConfigError> {
        let debug = flag(&params.debug_mode);

        let record_id = params
            .overridden_record_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .inspect(|id| {
                if debug {
                    debug!(record_id = %id, "using overridden record id");
                }
            })
            .or(host.record_id.as_deref())
            .map(clean_record_id);

        let placeholder = params
            .record_id_placeholder
            .as_deref()
            .unwrap_or(DEFAULT_RECORD_ID_PLACEHOLDER);

        let (fetch_xml, primary_entity) = match text(&params.fetch_xml) {
            Some(raw) => {
                let fetch_xml = raw.replace('"', "'");
                let entity = primary_entity_name(&fetch_xml).unwrap_or_default();
                let resolved = resolve_fetch_xml(&fetch_xml, record_id.as_deref(), placeholder);
                if resolved.is_none() {
                    warn!(entity = %entity, "query skipped: record id missing or placeholder unresolved");
                }
                (resolved, entity)
            }
            None => (None, String::new()),
        };

        let columns = match text(&params.column_layout_json) {
            Some(json) => {
                let value = serde_json::from_str(json).map_err(ConfigError::ColumnLayout)?;
                normalize_columns(&value)
            }
            None => Vec::new(),
        };

        let custom_button = match params.custom_button_config.as_deref().map(str::trim) {
            Some(json) if !json.is_empty() && json != HARNESS_PLACEHOLDER => {
                Some(serde_json::from_str(json).map_err(ConfigError::CustomButton)?)
            }
            _ => None,
        };

        let base_environment_url = host
            .base_environment_url
            .clone()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| FALLBACK_BASE_URL.to_string());

        if debug {
            debug!(
                primary_entity = %primary_entity,
                fetch_xml = ?fetch_xml,
                columns = columns.len(),
                "grid configuration resolved"
            );
        }

        Ok(Self {
            fetch_xml,
            primary_entity,
            record_id,
            columns,
            debug,
            base_environment_url,
            toolbar: ToolbarConfig {
                hide_new: flag(&params.hide_new_button),
                hide_refresh: flag(&params.hide_refresh_button),
                hide_export: flag(&params.hide_export_button),
                hide_bulk_edit: flag(&params.hide_bulk_edit_button),
            },
            custom_button,
        })
    }

    pub fn cell_context(&self) -> CellContext {
        CellContext::new(Some(self.base_environment_url.clone())).with_debug(self.debug)
    }
}

fn flag(value: &Option<String>) -> bool {
    value.as_deref() == Some("1")
}

/// A text parameter, unless unset, empty, or the harness placeholder.
fn text(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty() && *v != HARNESS_PLACEHOLDER)
}

/// Lookup ids sometimes arrive wrapped in braces.
fn clean_record_id(id: &str) -> String {
    id.trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .to_string()
}

pub fn is_guid(value: &str) -> bool {
    GUID_RE.is_match(value)
}

/// Name of the first `<entity name='…'>` element.
pub fn primary_entity_name(fetch_xml: &str) -> Option<String> {
    ENTITY_NAME_RE
        .captures(fetch_xml)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|name| !name.is_empty())
}

/// Substitute every occurrence of `placeholder` with the record id.
///
/// Yields `None` when the record id is not a GUID or a placeholder survives
/// substitution; running such a query would return unrelated rows or fail.
pub fn resolve_fetch_xml(fetch_xml: &str, record_id: Option<&str>, placeholder: &str) -> Option<String> {
    let record_id = record_id.filter(|id| is_guid(id))?;
    let resolved = if placeholder.is_empty() {
        fetch_xml.to_string()
    } else {
        fetch_xml.replace(placeholder, record_id)
    };
    if !placeholder.is_empty() && resolved.contains(placeholder) {
        return None;
    }
    Some(resolved)
}
