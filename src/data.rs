//! Loading rows through the host's query capability.

use tracing::{debug, warn};

use crate::column::ColumnDescriptor;
use crate::config::GridConfig;
use crate::record::Record;

pub const NO_QUERY_MESSAGE: &str = "No query to run.";
pub const NO_RESULTS_MESSAGE: &str = "Query returned no results.";

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("{0}")]
    Host(String),
    #[error("Malformed response: {0}")]
    Response(#[from] serde_json::Error),
}

/// Host capability that executes a FetchXML query for an entity.
pub trait QueryRunner {
    fn run_query(&self, entity_name: &str, fetch_xml: &str) -> Result<Vec<Record>, QueryError>;
}

/// Everything one refresh produces. A refresh replaces the previous result
/// wholesale.
#[derive(Debug, Clone)]
pub struct LoadResult {
    pub items: Vec<Record>,
    pub columns: Vec<ColumnDescriptor>,
    pub primary_entity: String,
    /// Status text for the host to announce; `None` when rows loaded.
    pub announced_message: Option<String>,
}

pub fn load_grid<R: QueryRunner + ?Sized>(runner: &R, config: &GridConfig) -> LoadResult {
    let result = |items: Vec<Record>, message: Option<String>| LoadResult {
        items,
        columns: config.columns.clone(),
        primary_entity: config.primary_entity.clone(),
        announced_message: message,
    };

    let fetch_xml = match config.fetch_xml.as_deref() {
        Some(fetch_xml) if !config.columns.is_empty() => fetch_xml,
        _ => return result(Vec::new(), Some(NO_QUERY_MESSAGE.to_string())),
    };

    match runner.run_query(&config.primary_entity, fetch_xml) {
        Ok(items) if items.is_empty() => result(items, Some(NO_RESULTS_MESSAGE.to_string())),
        Ok(items) => {
            if config.debug {
                debug!(rows = items.len(), entity = %config.primary_entity, "query returned rows");
            }
            result(items, None)
        }
        Err(err) => {
            warn!(error = %err, entity = %config.primary_entity, "query failed");
            result(Vec::new(), Some(format!("Error fetching records. {err}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ControlParameters, HostContext};
    use crate::record::record;
    use serde_json::json;
    use std::cell::RefCell;

    struct FakeRunner {
        response: Result<Vec<Record>, String>,
        calls: RefCell<Vec<(String, String)>>,
    }

    impl QueryRunner for FakeRunner {
        fn run_query(&self, entity_name: &str, fetch_xml: &str) -> Result<Vec<Record>, QueryError> {
            self.calls
                .borrow_mut()
                .push((entity_name.to_string(), fetch_xml.to_string()));
            self.response.clone().map_err(QueryError::Host)
        }
    }

    fn runner(response: Result<Vec<Record>, String>) -> FakeRunner {
        FakeRunner {
            response,
            calls: RefCell::new(Vec::new()),
        }
    }

    fn config() -> GridConfig {
        let params = ControlParameters {
            fetch_xml: Some("<fetch><entity name='account'><attribute name='name'/></entity></fetch>".into()),
            record_id_placeholder: Some(String::new()),
            column_layout_json: Some(r#"[{"key":"name","fieldName":"name","name":"Name"}]"#.into()),
            ..Default::default()
        };
        let host = HostContext {
            record_id: Some("3f2504e0-4f89-11d3-9a0c-0305e82c3301".into()),
            base_environment_url: None,
        };
        GridConfig::from_parameters(&params, &host).unwrap()
    }

    #[test]
    fn test_rows_loaded() {
        let r = runner(Ok(vec![record(json!({ "name": "Contoso" }))]));
        let result = load_grid(&r, &config());
        assert_eq!(result.items.len(), 1);
        assert!(result.announced_message.is_none());
        assert_eq!(result.primary_entity, "account");
        assert_eq!(r.calls.borrow()[0].0, "account");
    }

    #[test]
    fn test_empty_results() {
        let result = load_grid(&runner(Ok(vec![])), &config());
        assert_eq!(result.announced_message.as_deref(), Some(NO_RESULTS_MESSAGE));
    }

    #[test]
    fn test_query_error_is_announced() {
        let result = load_grid(&runner(Err("Access denied".into())), &config());
        assert!(result.items.is_empty());
        assert_eq!(
            result.announced_message.as_deref(),
            Some("Error fetching records. Access denied")
        );
        assert_eq!(result.columns.len(), 1);
    }

    #[test]
    fn test_no_query_skips_runner() {
        let mut cfg = config();
        cfg.fetch_xml = None;
        let r = runner(Ok(vec![]));
        let result = load_grid(&r, &cfg);
        assert_eq!(result.announced_message.as_deref(), Some(NO_QUERY_MESSAGE));
        assert!(r.calls.borrow().is_empty());
    }
}
