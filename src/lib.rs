pub mod cell;
pub mod column;
pub mod compare;
pub mod config;
pub mod data;
pub mod date;
pub mod export;
pub mod grid;
pub mod link;
pub mod pattern;
pub mod record;
pub mod row_id;
pub mod table;

use serde_json::Value;
use wasm_bindgen::prelude::*;

use cell::{CellContext, resolve_cell};
use column::{ColumnDescriptor, normalize_columns, normalize_columns_str};
use compare::compare_rows;
use grid::{ClickOrigin, Grid, SortDirection, grid_columns, sort_rows};
use record::{Record, records_from_json};

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

fn parse_record(source: &str) -> Result<Record, String> {
    let value: Value = serde_json::from_str(source).map_err(|e| e.to_string())?;
    Record::from_value(value).ok_or_else(|| "record must be a JSON object".to_string())
}

/// A single column goes through the same normalization as a whole layout.
fn parse_column(source: &str) -> Result<ColumnDescriptor, String> {
    let value: Value = serde_json::from_str(source).map_err(|e| e.to_string())?;
    normalize_columns(&Value::Array(vec![value]))
        .into_iter()
        .next()
        .ok_or_else(|| "column needs a key or fieldName".to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| e.to_string())
}

/// Normalize a column layout; malformed layouts yield `[]`.
#[wasm_bindgen(js_name = "normalizeColumns")]
pub fn normalize_columns_js(layout: &str) -> Result<String, String> {
    to_json(&normalize_columns_str(layout))
}

/// Three-way comparison of two records under a column: -1, 0 or 1.
#[wasm_bindgen(js_name = "compareRows")]
pub fn compare_rows_js(a: &str, b: &str, column: &str) -> Result<i32, String> {
    let a = parse_record(a)?;
    let b = parse_record(b)?;
    let column = parse_column(column)?;
    Ok(compare_rows(&a, &b, &column) as i32)
}

/// Resolve a cell to tagged JSON content.
#[wasm_bindgen(js_name = "resolveCell")]
pub fn resolve_cell_js(
    record: &str,
    column: &str,
    base_environment_url: Option<String>,
    debug: Option<bool>,
) -> Result<String, String> {
    let record = parse_record(record)?;
    let column = parse_column(column)?;
    let ctx = CellContext::new(base_environment_url).with_debug(debug.unwrap_or(false));
    to_json(&resolve_cell(&record, &column, &ctx))
}

/// Stable sort of a JSON array of records.
#[wasm_bindgen(js_name = "sortRows")]
pub fn sort_rows_js(rows: &str, column: &str, descending: bool) -> Result<String, String> {
    let mut rows = records_from_json(rows).map_err(|e| e.to_string())?;
    let column = parse_column(column)?;
    let direction = if descending {
        SortDirection::Descending
    } else {
        SortDirection::Ascending
    };
    sort_rows(&mut rows, &column, direction);
    to_json(&rows)
}

#[wasm_bindgen(js_name = "exportCsv")]
pub fn export_csv_js(rows: &str, columns: &str) -> Result<String, String> {
    let rows = records_from_json(rows).map_err(|e| e.to_string())?;
    export::export_csv(&rows, &normalize_columns_str(columns)).map_err(|e| e.to_string())
}

/// Substitute the record id into a FetchXML query; `undefined` when the query
/// must not run.
#[wasm_bindgen(js_name = "resolveFetchXml")]
pub fn resolve_fetch_xml_js(
    fetch_xml: &str,
    record_id: Option<String>,
    placeholder: Option<String>,
) -> Option<String> {
    config::resolve_fetch_xml(
        &fetch_xml.replace('"', "'"),
        record_id.as_deref(),
        placeholder
            .as_deref()
            .unwrap_or(config::DEFAULT_RECORD_ID_PLACEHOLDER),
    )
}

/// One grid instance on the page, owning its sort, selection and focus.
#[wasm_bindgen]
pub struct GridHandle {
    grid: Grid,
    on_cell_click: Option<js_sys::Function>,
}

#[wasm_bindgen]
impl GridHandle {
    /// `onCellClick` is called as `(recordJson, columnJson, origin)`.
    #[wasm_bindgen(constructor)]
    pub fn new(
        grid_id: &str,
        columns: &str,
        rows: &str,
        primary_entity: &str,
        base_environment_url: Option<String>,
        debug: Option<bool>,
        on_cell_click: Option<js_sys::Function>,
    ) -> Result<GridHandle, String> {
        let rows = records_from_json(rows).map_err(|e| e.to_string())?;
        let ctx = CellContext::new(base_environment_url).with_debug(debug.unwrap_or(false));
        let columns = grid_columns(normalize_columns_str(columns), &ctx);
        Ok(Self {
            grid: Grid::new(grid_id, columns, rows, primary_entity),
            on_cell_click,
        })
    }

    #[wasm_bindgen(js_name = "columns")]
    pub fn columns_json(&self) -> Result<String, String> {
        let descriptors: Vec<&ColumnDescriptor> =
            self.grid.columns().iter().map(|c| c.descriptor()).collect();
        to_json(&descriptors)
    }

    #[wasm_bindgen(js_name = "rowCount")]
    pub fn row_count(&self) -> usize {
        self.grid.rows().len()
    }

    #[wasm_bindgen(js_name = "rowId")]
    pub fn row_id(&self, row: usize) -> Option<String> {
        self.grid.row_id(row).map(str::to_string)
    }

    pub fn cell(&self, row: usize, column_id: &str) -> Result<Option<String>, String> {
        self.grid
            .render_cell(row, column_id)
            .map(|cell| to_json(&cell))
            .transpose()
    }

    pub fn sort(&mut self, column_id: &str, descending: bool) -> bool {
        let direction = if descending {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        self.grid.sort_by(column_id, direction)
    }

    #[wasm_bindgen(js_name = "toggleSort")]
    pub fn toggle_sort(&mut self, column_id: &str) -> bool {
        self.grid.toggle_sort(column_id)
    }

    /// Handle a cell click. Returns the navigation request JSON when the cell
    /// is an entity link.
    pub fn click(&mut self, row: usize, column_id: &str, origin: &str) -> Result<Option<String>, String> {
        let origin = ClickOrigin::from_str(origin).ok_or_else(|| format!("unknown click origin: {origin}"))?;
        let navigation = self.grid.click_cell(row, column_id, origin);

        if let (Some(callback), Some(record), Some(column)) = (
            &self.on_cell_click,
            self.grid.rows().get(row),
            self.grid.column(column_id),
        ) {
            let record = to_json(record)?;
            let column = to_json(column.descriptor())?;
            let origin = match origin {
                ClickOrigin::Cell => "cell",
                ClickOrigin::Checkbox => "checkbox",
            };
            callback
                .call3(
                    &JsValue::NULL,
                    &JsValue::from_str(&record),
                    &JsValue::from_str(&column),
                    &JsValue::from_str(origin),
                )
                .map_err(|e| format!("onCellClick failed: {e:?}"))?;
        }

        navigation.map(|n| to_json(&n)).transpose()
    }

    /// Row activation; returns the navigation request JSON for the row's
    /// own record, or `undefined` when it has no primary key.
    #[wasm_bindgen(js_name = "openRow")]
    pub fn open_row(&self, row: usize) -> Result<Option<String>, String> {
        self.grid.open_row(row).map(|n| to_json(&n)).transpose()
    }

    #[wasm_bindgen(js_name = "setSelection")]
    pub fn set_selection(&mut self, row_ids: js_sys::Array) {
        let ids: Vec<String> = row_ids.iter().filter_map(|v| v.as_string()).collect();
        self.grid.state_mut().set_selection(ids);
    }

    #[wasm_bindgen(js_name = "selectedIds")]
    pub fn selected_ids(&self) -> js_sys::Array {
        self.grid
            .state()
            .selected_ids()
            .map(JsValue::from_str)
            .collect()
    }

    #[wasm_bindgen(js_name = "focusedCell")]
    pub fn focused_cell(&self) -> Option<String> {
        self.grid.state().focused_cell().map(str::to_string)
    }

    #[wasm_bindgen(js_name = "exportCsv")]
    pub fn export_csv(&self) -> Result<String, String> {
        let descriptors: Vec<ColumnDescriptor> = self
            .grid
            .columns()
            .iter()
            .map(|c| c.descriptor().clone())
            .collect();
        export::export_csv(self.grid.rows(), &descriptors).map_err(|e| e.to_string())
    }
}
