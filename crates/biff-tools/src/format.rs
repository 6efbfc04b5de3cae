// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! The one columnar renderer shared by `who`, `read_messages` and `last`,
//! plus timestamp/idle helpers.
//!
//! Column order is part of the tool contract: the post-tool display layer is
//! a thin reformatter and relies on the `▶` header sentinel and stable
//! columns, so changing either changes the user-visible protocol.

use chrono::{DateTime, Local, Utc};

/// Render an aligned table.  The header row leads with `▶` and data rows are
/// indented to match, so every cell of a column starts at the same offset:
///
/// ```text
/// ▶ NAME | TTY      | PLAN
///   @kai | aabb1122 | fixing auth
/// ```
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let cols = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().take(cols).enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let fmt_row = |prefix: &str, cells: &[String]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .take(cols)
            .enumerate()
            .map(|(i, c)| format!("{c:<width$}", width = widths[i]))
            .collect();
        format!("{prefix}{}", padded.join(" | ")).trim_end().to_string()
    };

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let mut lines = vec![fmt_row("▶ ", &header_cells)];
    for row in rows {
        lines.push(fmt_row("  ", row));
    }
    lines.join("\n")
}

/// Short clock time in the invoking session's local zone, for message rows.
pub fn fmt_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M").to_string()
}

/// Full local timestamp, for `who`/`finger`/`last`.
pub fn fmt_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%a %b %e %H:%M").to_string()
}

/// Idle time since `last_active`: `-` under a minute, then `37m`, `2h05m`,
/// `3d`.
pub fn fmt_idle(last_active: DateTime<Utc>) -> String {
    let secs = Utc::now()
        .signed_duration_since(last_active)
        .num_seconds()
        .max(0);
    match secs {
        0..=59 => "-".to_string(),
        60..=3599 => format!("{}m", secs / 60),
        3600..=86399 => format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60),
        _ => format!("{}d", secs / 86400),
    }
}

/// First `max` chars of `s`, with an ellipsis when truncated.
pub fn preview(s: &str, max: usize) -> String {
    let trimmed = s.trim().replace('\n', " ");
    if trimmed.chars().count() <= max {
        trimmed
    } else {
        let cut: String = trimmed.chars().take(max).collect();
        format!("{cut}…")
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_header_leads_with_sentinel() {
        let out = render_table(&["NAME", "PLAN"], &[]);
        assert!(out.starts_with("▶ NAME"));
    }

    #[test]
    fn table_columns_align_across_rows() {
        let rows = vec![
            vec!["@kai".to_string(), "fixing auth".to_string()],
            vec!["@ericsson".to_string(), "review".to_string()],
        ];
        let out = render_table(&["NAME", "PLAN"], &rows);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        // Every line's separator sits at the same character column.
        let pipe_cols: Vec<usize> = lines
            .iter()
            .map(|l| l.chars().position(|c| c == '|').unwrap())
            .collect();
        assert!(pipe_cols.windows(2).all(|w| w[0] == w[1]), "{out}");
    }

    #[test]
    fn table_cells_are_pipe_separated() {
        let rows = vec![vec!["kai".to_string(), "from eric".to_string(), "hi".to_string()]];
        let out = render_table(&["TO", "FROM", "MESSAGE"], &rows);
        assert!(out.contains("kai | from eric | hi"));
    }

    #[test]
    fn table_trailing_whitespace_is_trimmed() {
        let rows = vec![vec!["a".to_string(), "b".to_string()]];
        let out = render_table(&["LONGHEADER", "X"], &rows);
        for line in out.lines() {
            assert_eq!(line, line.trim_end());
        }
    }

    #[test]
    fn idle_formats_by_magnitude() {
        let now = Utc::now();
        assert_eq!(fmt_idle(now), "-");
        assert_eq!(fmt_idle(now - chrono::Duration::minutes(37)), "37m");
        assert_eq!(
            fmt_idle(now - chrono::Duration::minutes(125)),
            "2h05m"
        );
        assert_eq!(fmt_idle(now - chrono::Duration::days(3)), "3d");
    }

    #[test]
    fn idle_never_negative() {
        let future = Utc::now() + chrono::Duration::minutes(5);
        assert_eq!(fmt_idle(future), "-");
    }

    #[test]
    fn preview_passes_short_strings() {
        assert_eq!(preview("hi there", 48), "hi there");
    }

    #[test]
    fn preview_truncates_with_ellipsis() {
        let long = "x".repeat(60);
        let p = preview(&long, 48);
        assert_eq!(p.chars().count(), 49);
        assert!(p.ends_with('…'));
    }

    #[test]
    fn preview_flattens_newlines() {
        assert_eq!(preview("a\nb", 48), "a b");
    }
}
