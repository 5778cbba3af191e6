//! Plain-text rendering of list pages.

use std::fmt::Write as _;

use client_core::{navigation::MenuEntry, TableState};
use shared::protocol::{BreakdownItem, Project, Requirement, TestCase};

const MAX_CELL_WIDTH: usize = 48;

pub trait TableRow {
    fn headers() -> &'static [&'static str];
    fn cells(&self) -> Vec<String>;
}

impl TableRow for Requirement {
    fn headers() -> &'static [&'static str] {
        &["ID", "MODULE", "FEATURE", "PRIORITY", "CASES"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.module_name.clone(),
            self.feature_name.clone(),
            self.priority.clone(),
            self.case_count.to_string(),
        ]
    }
}

impl TableRow for TestCase {
    fn headers() -> &'static [&'static str] {
        &["ID", "REQ", "TITLE", "PRIORITY", "TYPE", "STATUS", "STEPS"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.requirement_id.to_string(),
            self.case_title.clone(),
            self.priority.clone().unwrap_or_default(),
            self.case_type.clone().unwrap_or_default(),
            self.status.clone().unwrap_or_default(),
            self.steps.len().to_string(),
        ]
    }
}

impl TableRow for BreakdownItem {
    fn headers() -> &'static [&'static str] {
        &["ID", "PROJECT", "MODULE", "FEATURE", "PRIORITY", "CONFIDENCE", "REVIEW"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.project_id.map(|id| id.to_string()).unwrap_or_default(),
            self.module_name.clone().unwrap_or_default(),
            self.feature_name.clone().unwrap_or_default(),
            self.priority.clone().unwrap_or_default(),
            self.confidence_score
                .map(|score| format!("{score:.2}"))
                .unwrap_or_default(),
            self.review_status
                .map(|status| status.to_string())
                .unwrap_or_default(),
        ]
    }
}

impl TableRow for Project {
    fn headers() -> &'static [&'static str] {
        &["ID", "NAME", "DESCRIPTION", "CREATED"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.project_name.clone(),
            self.description.clone().unwrap_or_default(),
            self.created_at
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
        ]
    }
}

fn clip(cell: &str) -> String {
    let single_line = cell.replace(['\n', '\r'], " ");
    if single_line.chars().count() <= MAX_CELL_WIDTH {
        return single_line;
    }
    let mut clipped: String = single_line.chars().take(MAX_CELL_WIDTH - 1).collect();
    clipped.push('…');
    clipped
}

pub fn render_rows<T: TableRow>(rows: &[T]) -> String {
    let headers = T::headers();
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.cells().iter().map(|cell| clip(cell)).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &body {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let line = |cells: &[String], out: &mut String| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        let _ = writeln!(out, "{}", padded.join("  ").trim_end());
    };

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    line(&header_cells, &mut out);
    for row in &body {
        line(row, &mut out);
    }
    if body.is_empty() {
        out.push_str("(no rows)\n");
    }
    out
}

pub fn render_page<T: TableRow>(state: &TableState<T>) -> String {
    let mut out = render_rows(&state.rows);
    let filters: Vec<String> = state
        .filters
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    let _ = write!(
        out,
        "page {}/{} | {} total | {} per page",
        state.page,
        state.total_pages().max(1),
        state.total,
        state.size
    );
    if !filters.is_empty() {
        let _ = write!(out, " | {}", filters.join(", "));
    }
    out.push('\n');
    out
}

pub fn render_menu(entries: &[MenuEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let icon = entry.icon.unwrap_or("-");
        let _ = writeln!(out, "{:<16} {:<10} {}", entry.path, icon, entry.title);
    }
    out
}
