//! Plain-text table rendering for terminals.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::cell::CellContent;
use crate::grid::Grid;

pub struct TableMetrics {
    pub column_gap: usize,
    pub max_cell_width: usize,
    pub min_column_width: usize,
}

impl Default for TableMetrics {
    fn default() -> Self {
        Self {
            column_gap: 2,
            max_cell_width: 40,
            min_column_width: 3,
        }
    }
}

impl TableMetrics {
    pub fn text_width(&self, text: &str) -> usize {
        UnicodeWidthStr::width(text)
    }

    /// Cut `text` to the cell width, marking the cut with an ellipsis.
    pub fn fit(&self, text: &str) -> String {
        if self.text_width(text) <= self.max_cell_width {
            return text.to_string();
        }
        let budget = self.max_cell_width.saturating_sub(1);
        let mut out = String::new();
        let mut used = 0;
        for c in text.chars() {
            let w = c.width().unwrap_or(0);
            if used + w > budget {
                break;
            }
            out.push(c);
            used += w;
        }
        out.push('…');
        out
    }

    fn pad(&self, text: &str, width: usize) -> String {
        let fill = width.saturating_sub(self.text_width(text));
        format!("{text}{}", " ".repeat(fill))
    }
}

/// Terminal text for one cell. Link targets are shown after the text.
pub fn cell_text(cell: &CellContent) -> String {
    match cell {
        CellContent::Hyperlink { href, text } => format!("{text} <{href}>"),
        CellContent::EntityLink {
            target_entity,
            target_id,
            text,
        } => format!("{text} [{target_entity}:{target_id}]"),
        other => other.display_text().replace('\n', " "),
    }
}

pub struct TableRenderer {
    metrics: TableMetrics,
}

impl Default for TableRenderer {
    fn default() -> Self {
        Self {
            metrics: TableMetrics::default(),
        }
    }
}

impl TableRenderer {
    pub fn new(metrics: TableMetrics) -> Self {
        Self { metrics }
    }

    pub fn render(&self, grid: &Grid) -> String {
        let headers: Vec<String> = grid
            .columns()
            .iter()
            .map(|c| self.metrics.fit(c.header()))
            .collect();

        let body: Vec<Vec<String>> = grid
            .rows()
            .iter()
            .map(|row| {
                grid.columns()
                    .iter()
                    .map(|c| self.metrics.fit(&cell_text(&c.render_cell(row))))
                    .collect()
            })
            .collect();

        let widths: Vec<usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                body.iter()
                    .map(|cells| self.metrics.text_width(&cells[i]))
                    .chain(std::iter::once(self.metrics.text_width(h)))
                    .fold(self.metrics.min_column_width, usize::max)
            })
            .collect();

        let gap = " ".repeat(self.metrics.column_gap);
        let line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(text, &w)| self.metrics.pad(text, w))
                .collect::<Vec<_>>()
                .join(&gap)
                .trim_end()
                .to_string()
        };

        let mut out = String::new();
        out.push_str(&line(&headers));
        out.push('\n');
        let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
        out.push_str(&line(&rule));
        out.push('\n');
        for cells in &body {
            out.push_str(&line(cells));
            out.push('\n');
        }
        out
    }
}
