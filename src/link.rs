//! Hyperlink synthesis for URL columns.

use serde::Serialize;
use std::fmt;
use url::Url;

/// Replaced with the host's base environment URL.
pub const BASE_ENVIRONMENT_URL_PLACEHOLDER: &str = "[BASE_ENVIRONMENT_URL]";
/// Replaced with the row's identifier (the value under the column key).
pub const RECORD_ID_URL_PLACEHOLDER: &str = "[ID]";
/// Use the field's own value as the whole URL or as the link text.
pub const USE_VALUE_PLACEHOLDER: &str = "[USE_VALUE]";

pub const EXTERNAL_LINK_TEXT: &str = "External Link";
pub const TEMPLATE_LINK_TEXT: &str = "Link";

/// An absolute `http`/`https` URL. Only [`SafeUrl::parse`] builds one, so
/// holding a value is proof the href is safe to emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SafeUrl(String);

impl SafeUrl {
    pub fn parse(href: &str) -> Option<Self> {
        let url = Url::parse(href.trim()).ok()?;
        match url.scheme() {
            "http" | "https" if url.host().is_some() => Some(Self(url.into())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SafeUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Substitute the first occurrence of each placeholder in a URL template.
pub fn fill_template(template: &str, base_url: Option<&str>, record_id: &str) -> String {
    template
        .replacen(BASE_ENVIRONMENT_URL_PLACEHOLDER, base_url.unwrap_or(""), 1)
        .replacen(RECORD_ID_URL_PLACEHOLDER, record_id, 1)
}

/// Link text for a URL column.
///
/// `[USE_VALUE]` shows the content itself; any other configured text is shown
/// when there is content; otherwise `default`.
pub fn link_text(content: &str, configured: Option<&str>, default: &str) -> String {
    match configured.filter(|t| !t.is_empty()) {
        Some(USE_VALUE_PLACEHOLDER) => content.to_string(),
        Some(custom) if !content.is_empty() => custom.to_string(),
        _ => default.to_string(),
    }
}
