//! Formatted output helpers for CLI commands.

use std::fmt::Display;

/// Column gap between table cells.
const PADDING: usize = 2;

/// Renders `rows` under `headers` as left-aligned columns.
///
/// Each column is as wide as its widest cell; the last column is not
/// padded.
#[must_use]
pub fn table<H: AsRef<str>>(headers: &[H], rows: &[Vec<String>]) -> String {
    let header: Vec<&str> = headers.iter().map(AsRef::as_ref).collect();
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let lines = std::iter::once(header).chain(rows.iter().map(|r| r.iter().map(String::as_str).collect()));
    for cells in lines {
        let last = cells.len().saturating_sub(1);
        for (i, cell) in cells.iter().enumerate() {
            out.push_str(cell);
            if i < last {
                let width = widths.get(i).copied().unwrap_or_default();
                let fill = width.saturating_sub(cell.chars().count()) + PADDING;
                out.extend(std::iter::repeat_n(' ', fill));
            }
        }
        out.push('\n');
    }
    out
}

/// Formats an optional value, blank when absent.
#[must_use]
pub fn or_blank<T: Display>(value: Option<T>) -> String {
    value.map_or_else(String::new, |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_align_to_widest_cell() {
        let rows = vec![
            vec!["a1".to_string(), "web".to_string(), "running".to_string()],
            vec!["b2".to_string(), "database".to_string(), "stopped".to_string()],
        ];
        let rendered = table(&["ID", "NAME", "STATUS"], &rows);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "ID  NAME      STATUS");
        assert_eq!(lines[1], "a1  web       running");
        assert_eq!(lines[2], "b2  database  stopped");
    }

    #[test]
    fn empty_table_prints_header_only() {
        assert_eq!(table(&["NAME", "DRIVER"], &[]), "NAME  DRIVER\n");
    }

    #[test]
    fn blank_cells_keep_alignment() {
        let rows = vec![vec![String::new(), "x".to_string()]];
        assert_eq!(table(&["PID", "IP"], &rows), "PID  IP\n     x\n");
    }

    #[test]
    fn optional_values() {
        assert_eq!(or_blank(Some(42)), "42");
        assert_eq!(or_blank::<u32>(None), "");
    }
}
