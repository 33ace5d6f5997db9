//! Grid model handed to a rendering surface.
//!
//! The surface receives one [`GridColumn`] per configured column (header text,
//! cell resolution and comparator bound together) plus the rows. Selection and
//! focus live in a [`GridState`] owned by one grid instance, so two grids on
//! the same page never clear each other's focus.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;

use crate::cell::{CellContent, CellContext, resolve_cell};
use crate::column::ColumnDescriptor;
use crate::compare::compare_rows;
use crate::record::{Record, is_truthy, value_text};
use crate::row_id::{assign_row_ids, primary_id_attribute};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggle(&self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "asc" | "ascending" => Some(Self::Ascending),
            "desc" | "descending" => Some(Self::Descending),
            _ => None,
        }
    }
}

/// Stable sort of `rows` on `column`. Descending reverses the comparator, so
/// rows of equal rank keep their relative order either way.
pub fn sort_rows(rows: &mut [Record], column: &ColumnDescriptor, direction: SortDirection) {
    rows.sort_by(|a, b| directed(compare_rows(a, b, column), direction));
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

/// Column binding for a rendering surface.
#[derive(Debug, Clone)]
pub struct GridColumn {
    descriptor: ColumnDescriptor,
    ctx: CellContext,
}

impl GridColumn {
    pub fn new(descriptor: ColumnDescriptor, ctx: CellContext) -> Self {
        Self { descriptor, ctx }
    }

    /// Column id used by the surface: the key, or the field name for layouts
    /// with an empty key.
    pub fn id(&self) -> &str {
        if self.descriptor.key.is_empty() {
            &self.descriptor.field_name
        } else {
            &self.descriptor.key
        }
    }

    pub fn header(&self) -> &str {
        &self.descriptor.display_name
    }

    pub fn descriptor(&self) -> &ColumnDescriptor {
        &self.descriptor
    }

    pub fn render_cell(&self, record: &Record) -> CellContent {
        resolve_cell(record, &self.descriptor, &self.ctx)
    }

    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        compare_rows(a, b, &self.descriptor)
    }
}

/// Bind every descriptor to the same rendering context.
pub fn grid_columns(descriptors: Vec<ColumnDescriptor>, ctx: &CellContext) -> Vec<GridColumn> {
    descriptors
        .into_iter()
        .map(|d| GridColumn::new(d, ctx.clone()))
        .collect()
}

/// Where a click on a cell came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOrigin {
    Cell,
    /// The row-selection checkbox; selection is left to the surface.
    Checkbox,
}

impl ClickOrigin {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "cell" => Some(Self::Cell),
            "checkbox" => Some(Self::Checkbox),
            _ => None,
        }
    }
}

/// Selection and focus of one grid instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridState {
    grid_id: String,
    selected: BTreeSet<String>,
    focused_cell: Option<String>,
}

impl GridState {
    pub fn new(grid_id: impl Into<String>) -> Self {
        Self {
            grid_id: grid_id.into(),
            ..Default::default()
        }
    }

    pub fn grid_id(&self) -> &str {
        &self.grid_id
    }

    pub fn cell_id(row_id: &str, column_key: &str) -> String {
        format!("{row_id}-{column_key}")
    }

    /// Select exactly the clicked row and focus the clicked cell. Checkbox
    /// clicks change nothing. Returns whether the state changed.
    pub fn click(&mut self, row_id: &str, column_key: &str, origin: ClickOrigin) -> bool {
        if origin == ClickOrigin::Checkbox {
            return false;
        }
        let cell_id = Self::cell_id(row_id, column_key);
        let unchanged = self.selected.len() == 1
            && self.selected.contains(row_id)
            && self.focused_cell.as_deref() == Some(cell_id.as_str());
        if unchanged {
            return false;
        }
        self.selected.clear();
        self.selected.insert(row_id.to_string());
        self.focused_cell = Some(cell_id);
        true
    }

    /// Replace the selection, e.g. from checkbox or select-all interaction.
    /// Focus is kept only if its row is still selected.
    pub fn set_selection<I>(&mut self, row_ids: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.selected = row_ids.into_iter().map(Into::into).collect();
        let keep_focus = self.focused_cell.as_deref().is_some_and(|cell| {
            self.selected
                .iter()
                .any(|row| cell.strip_prefix(row.as_str()).is_some_and(|rest| rest.starts_with('-')))
        });
        if !keep_focus {
            self.focused_cell = None;
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.focused_cell = None;
    }

    pub fn is_selected(&self, row_id: &str) -> bool {
        self.selected.contains(row_id)
    }

    pub fn selected_ids(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    pub fn focused_cell(&self) -> Option<&str> {
        self.focused_cell.as_deref()
    }

    pub fn is_focused(&self, row_id: &str, column_key: &str) -> bool {
        self.focused_cell.as_deref() == Some(Self::cell_id(row_id, column_key).as_str())
    }
}

/// Request to open a related record's form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationRequest {
    pub entity_name: String,
    pub entity_id: String,
}

impl NavigationRequest {
    pub fn from_cell(cell: &CellContent) -> Option<Self> {
        match cell {
            CellContent::EntityLink {
                target_entity,
                target_id,
                ..
            } => Some(Self {
                entity_name: target_entity.clone(),
                entity_id: target_id.clone(),
            }),
            _ => None,
        }
    }
}

/// Host capability that opens record forms.
pub trait Navigator {
    fn open_record_form(&self, request: &NavigationRequest);
}

/// A grid instance: bound columns, rows with their identities, sort and state.
#[derive(Debug, Clone)]
pub struct Grid {
    columns: Vec<GridColumn>,
    rows: Vec<Record>,
    row_ids: Vec<String>,
    primary_entity: String,
    sort: Option<(String, SortDirection)>,
    state: GridState,
}

impl Grid {
    pub fn new(
        grid_id: impl Into<String>,
        columns: Vec<GridColumn>,
        rows: Vec<Record>,
        primary_entity: &str,
    ) -> Self {
        let row_ids = assign_row_ids(&rows, primary_entity);
        Self {
            columns,
            rows,
            row_ids,
            primary_entity: primary_entity.to_string(),
            sort: None,
            state: GridState::new(grid_id),
        }
    }

    pub fn columns(&self) -> &[GridColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn row_id(&self, index: usize) -> Option<&str> {
        self.row_ids.get(index).map(String::as_str)
    }

    pub fn column(&self, id: &str) -> Option<&GridColumn> {
        self.columns.iter().find(|c| c.id() == id)
    }

    pub fn state(&self) -> &GridState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GridState {
        &mut self.state
    }

    pub fn current_sort(&self) -> Option<(&str, SortDirection)> {
        self.sort.as_ref().map(|(id, dir)| (id.as_str(), *dir))
    }

    /// Stable sort on the named column; row identities move with their rows.
    /// Returns `false` for an unknown column.
    pub fn sort_by(&mut self, column_id: &str, direction: SortDirection) -> bool {
        let Some(column) = self.column(column_id) else {
            return false;
        };
        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        order.sort_by(|&a, &b| directed(column.compare(&self.rows[a], &self.rows[b]), direction));

        let rows = order.iter().map(|&i| self.rows[i].clone()).collect();
        let row_ids = order.iter().map(|&i| self.row_ids[i].clone()).collect();
        self.rows = rows;
        self.row_ids = row_ids;
        self.sort = Some((column_id.to_string(), direction));
        true
    }

    /// Header click: ascending first, then alternating.
    pub fn toggle_sort(&mut self, column_id: &str) -> bool {
        let direction = match self.current_sort() {
            Some((current, dir)) if current == column_id => dir.toggle(),
            _ => SortDirection::Ascending,
        };
        self.sort_by(column_id, direction)
    }

    pub fn render_cell(&self, row: usize, column_id: &str) -> Option<CellContent> {
        let record = self.rows.get(row)?;
        Some(self.column(column_id)?.render_cell(record))
    }

    /// Handle a click on a cell: update selection/focus and, for entity links
    /// clicked directly, return the navigation request for the host.
    pub fn click_cell(
        &mut self,
        row: usize,
        column_id: &str,
        origin: ClickOrigin,
    ) -> Option<NavigationRequest> {
        let row_id = self.row_ids.get(row)?.clone();
        let cell = self.render_cell(row, column_id)?;
        self.state.click(&row_id, column_id, origin);
        if origin == ClickOrigin::Cell {
            NavigationRequest::from_cell(&cell)
        } else {
            None
        }
    }

    /// Row activation (double click or Enter): open the row's own record.
    /// `None` when the row has no primary key.
    pub fn open_row(&self, row: usize) -> Option<NavigationRequest> {
        let record = self.rows.get(row)?;
        let id = record
            .get(&primary_id_attribute(&self.primary_entity))
            .filter(|v| is_truthy(Some(v)))?;
        Some(NavigationRequest {
            entity_name: self.primary_entity.clone(),
            entity_id: value_text(id),
        })
    }

    pub fn selected_rows(&self) -> Vec<&Record> {
        self.rows
            .iter()
            .zip(&self.row_ids)
            .filter(|(_, id)| self.state.is_selected(id))
            .map(|(row, _)| row)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnData;
    use crate::record::record;
    use serde_json::json;
    use std::cell::RefCell;

    fn columns() -> Vec<GridColumn> {
        grid_columns(
            vec![
                ColumnDescriptor::new("name", "name", "Name"),
                ColumnDescriptor::new("owner", "_ownerid_value", "Owner").with_data(ColumnData {
                    entity_linking: Some(true),
                    ..Default::default()
                }),
            ],
            &CellContext::default(),
        )
    }

    fn rows() -> Vec<Record> {
        vec![
            record(json!({ "accountid": "a1", "name": "Fabrikam" })),
            record(json!({ "accountid": "a2", "name": "contoso",
                "_ownerid_value": "u1",
                "_ownerid_value@Microsoft.Dynamics.CRM.lookuplogicalname": "systemuser" })),
            record(json!({ "accountid": "a3", "name": null })),
        ]
    }

    fn names(grid: &Grid) -> Vec<String> {
        grid.rows()
            .iter()
            .map(|r| r.get("name").map(|v| v.to_string()).unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_sort_rows_stable_both_directions() {
        let col = ColumnDescriptor::new("g", "g", "G");
        let mut data = vec![
            record(json!({ "g": 1, "n": "a" })),
            record(json!({ "g": 0, "n": "b" })),
            record(json!({ "g": 1, "n": "c" })),
        ];
        sort_rows(&mut data, &col, SortDirection::Descending);
        let order: Vec<&str> = data.iter().map(|r| r.get("n").and_then(|v| v.as_str()).unwrap()).collect();
        assert_eq!(order, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_grid_sort_moves_row_ids() {
        let mut grid = Grid::new("g1", columns(), rows(), "account");
        assert!(grid.sort_by("name", SortDirection::Ascending));
        assert_eq!(names(&grid), vec!["", "\"contoso\"", "\"Fabrikam\""]);
        assert_eq!(grid.row_id(0), Some("a3"));
        assert_eq!(grid.row_id(1), Some("a2"));
        assert!(!grid.sort_by("missing", SortDirection::Ascending));
    }

    #[test]
    fn test_toggle_sort() {
        let mut grid = Grid::new("g1", columns(), rows(), "account");
        grid.toggle_sort("name");
        assert_eq!(grid.current_sort(), Some(("name", SortDirection::Ascending)));
        grid.toggle_sort("name");
        assert_eq!(grid.current_sort(), Some(("name", SortDirection::Descending)));
        assert_eq!(grid.row_id(0), Some("a1"));
        grid.toggle_sort("owner");
        assert_eq!(grid.current_sort(), Some(("owner", SortDirection::Ascending)));
    }

    #[test]
    fn test_click_selects_single_row_and_focuses() {
        let mut grid = Grid::new("g1", columns(), rows(), "account");
        grid.state_mut().set_selection(["a1", "a3"]);
        assert_eq!(grid.state().selected_count(), 2);

        let nav = grid.click_cell(0, "name", ClickOrigin::Cell);
        assert!(nav.is_none());
        assert_eq!(grid.state().selected_ids().collect::<Vec<_>>(), vec!["a1"]);
        assert_eq!(grid.state().focused_cell(), Some("a1-name"));
        assert!(grid.state().is_focused("a1", "name"));
        assert_eq!(grid.selected_rows().len(), 1);
    }

    #[test]
    fn test_checkbox_click_is_ignored() {
        let mut grid = Grid::new("g1", columns(), rows(), "account");
        grid.click_cell(0, "name", ClickOrigin::Cell);
        let nav = grid.click_cell(1, "owner", ClickOrigin::Checkbox);
        assert!(nav.is_none());
        assert_eq!(grid.state().focused_cell(), Some("a1-name"));
    }

    #[test]
    fn test_open_row_targets_primary_record() {
        let mut grid = Grid::new("g1", columns(), rows(), "account");
        assert_eq!(
            grid.open_row(1),
            Some(NavigationRequest {
                entity_name: "account".into(),
                entity_id: "a2".into()
            })
        );
        grid.sort_by("name", SortDirection::Ascending);
        assert_eq!(grid.open_row(0).map(|n| n.entity_id), Some("a3".to_string()));
        assert!(grid.open_row(9).is_none());
    }

    #[test]
    fn test_open_row_without_primary_key() {
        let rows = vec![
            record(json!({ "name": "Aggregate" })),
            record(json!({ "__rowId": "r1", "accountid": "" })),
        ];
        let grid = Grid::new("g1", columns(), rows, "account");
        assert!(grid.open_row(0).is_none());
        assert!(grid.open_row(1).is_none());
    }

    #[test]
    fn test_entity_link_click_navigates() {
        struct Recorder(RefCell<Vec<NavigationRequest>>);
        impl Navigator for Recorder {
            fn open_record_form(&self, request: &NavigationRequest) {
                self.0.borrow_mut().push(request.clone());
            }
        }

        let mut grid = Grid::new("g1", columns(), rows(), "account");
        let recorder = Recorder(RefCell::new(Vec::new()));
        if let Some(request) = grid.click_cell(1, "owner", ClickOrigin::Cell) {
            recorder.open_record_form(&request);
        }
        assert_eq!(
            recorder.0.borrow().as_slice(),
            &[NavigationRequest {
                entity_name: "systemuser".into(),
                entity_id: "u1".into()
            }]
        );
        assert_eq!(grid.state().focused_cell(), Some("a2-owner"));
    }

    #[test]
    fn test_focus_is_scoped_to_grid_instance() {
        let mut first = Grid::new("first", columns(), rows(), "account");
        let mut second = Grid::new("second", columns(), rows(), "account");
        first.click_cell(0, "name", ClickOrigin::Cell);
        second.click_cell(2, "name", ClickOrigin::Cell);
        assert_eq!(first.state().focused_cell(), Some("a1-name"));
        assert_eq!(second.state().focused_cell(), Some("a3-name"));
    }

    #[test]
    fn test_set_selection_drops_stale_focus() {
        let mut state = GridState::new("g");
        state.click("r1", "name", ClickOrigin::Cell);
        state.set_selection(["r1", "r2"]);
        assert_eq!(state.focused_cell(), Some("r1-name"));
        state.set_selection(["r2"]);
        assert_eq!(state.focused_cell(), None);
    }

    #[test]
    fn test_repeat_click_reports_no_change() {
        let mut state = GridState::new("g");
        assert!(state.click("r1", "name", ClickOrigin::Cell));
        assert!(!state.click("r1", "name", ClickOrigin::Cell));
        assert!(state.click("r1", "city", ClickOrigin::Cell));
    }

    #[test]
    fn test_column_binding() {
        let cols = columns();
        assert_eq!(cols[0].id(), "name");
        assert_eq!(cols[0].header(), "Name");
        let a = record(json!({ "name": "b" }));
        let b = record(json!({ "name": "A" }));
        assert_eq!(cols[0].compare(&a, &b), Ordering::Greater);
        assert_eq!(cols[0].render_cell(&a).display_text(), "b");
    }
}
