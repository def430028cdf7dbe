//! Table output formatting for CLI commands
//!
//! Renders session results and task summaries with comfy-table.

use std::env;

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};

use crate::domain::models::{CoverageResult, EvaluationTask, SessionResult};

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub const fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// One row per query, grouped by sub-task.
    pub fn format_session_result(&self, result: &SessionResult) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            Cell::new("Sub-task").add_attribute(Attribute::Bold),
            Cell::new("Query").add_attribute(Attribute::Bold),
            Cell::new("Groups").add_attribute(Attribute::Bold),
            Cell::new("Covered").add_attribute(Attribute::Bold),
        ]);

        for (ti, sub_task) in result.sub_tasks.iter().enumerate() {
            for (qi, covered) in sub_task.is_query_covered.iter().enumerate() {
                table.add_row(vec![
                    Cell::new(ti),
                    Cell::new(qi),
                    Cell::new(group_count(sub_task, qi)),
                    self.covered_cell(*covered),
                ]);
            }
        }

        table.to_string()
    }

    /// Shape of a parsed task.
    pub fn format_task(&self, task: &EvaluationTask) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            Cell::new("Sub-task").add_attribute(Attribute::Bold),
            Cell::new("Queries").add_attribute(Attribute::Bold),
            Cell::new("Groups").add_attribute(Attribute::Bold),
        ]);

        for (ti, set) in task.query_sets.iter().enumerate() {
            let groups: usize = set.queries.iter().map(|q| q.groups.len()).sum();
            table.add_row(vec![Cell::new(ti), Cell::new(set.len()), Cell::new(groups)]);
        }

        table.to_string()
    }

    fn covered_cell(&self, covered: bool) -> Cell {
        match (covered, self.use_colors) {
            (true, true) => Cell::new("yes").fg(Color::Green),
            (false, true) => Cell::new("no").fg(Color::Red),
            (true, false) => Cell::new("✓ yes"),
            (false, false) => Cell::new("✗ no"),
        }
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width);
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of alternative groups of a query, read from the echoed input.
fn group_count(sub_task: &CoverageResult, query: usize) -> usize {
    sub_task
        .queries
        .get(query)
        .and_then(serde_json::Value::as_array)
        .map_or(0, Vec::len)
}

/// Colors are off when `NO_COLOR` is set or the terminal is dumb.
fn supports_color() -> bool {
    env::var_os("NO_COLOR").is_none() && !env::var("TERM").is_ok_and(|term| term == "dumb")
}
