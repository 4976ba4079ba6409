//! Text rendering of repair outcomes for the terminal.

use crate::db::executor::QueryResult;
use crate::repair::{AttemptRecord, Failure, FailureReason, Success};
use std::fmt::Write;

/// Box-drawn table of column names and row values, followed by a row count.
pub fn render_table(result: &QueryResult) -> String {
    let string_rows: Vec<Vec<String>> = (0..result.row_count())
        .filter_map(|row| result.record(row))
        .map(|record| record.iter().map(|(_, v)| v.to_string()).collect())
        .collect();

    let mut col_widths: Vec<usize> = result.columns.iter().map(|c| c.chars().count()).collect();
    for srow in &string_rows {
        for (i, value) in srow.iter().enumerate() {
            if let Some(width) = col_widths.get_mut(i) {
                *width = (*width).max(value.chars().count());
            }
        }
    }

    let mut output = String::new();
    if !col_widths.is_empty() {
        output.push_str(&border(&col_widths, '┌', '┬', '┐'));
        output.push_str(&line(&col_widths, &result.columns));
        output.push_str(&border(&col_widths, '├', '┼', '┤'));
        for srow in &string_rows {
            output.push_str(&line(&col_widths, srow));
        }
        output.push_str(&border(&col_widths, '└', '┴', '┘'));
    }

    let row_count = string_rows.len();
    let row_label = if row_count == 1 { "row" } else { "rows" };
    let _ = writeln!(output, "({} {})", row_count, row_label);
    output
}

fn border(widths: &[usize], left: char, middle: char, right: char) -> String {
    let mut output = String::new();
    output.push(left);
    for (idx, width) in widths.iter().enumerate() {
        output.push_str(&"─".repeat(width + 2));
        output.push(if idx == widths.len() - 1 { right } else { middle });
    }
    output.push('\n');
    output
}

fn line(widths: &[usize], values: &[String]) -> String {
    let mut output = String::from("│");
    for (i, width) in widths.iter().enumerate() {
        let value = values.get(i).map(String::as_str).unwrap_or("");
        let padding = width.saturating_sub(value.chars().count());
        output.push(' ');
        output.push_str(value);
        output.push_str(&" ".repeat(padding));
        output.push_str(" │");
    }
    output.push('\n');
    output
}

pub fn render_success(success: &Success) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "SQL: {}", success.query);
    if success.attempts.len() > 1 {
        let _ = writeln!(
            output,
            "(query corrected after {} attempts)",
            success.attempts.len()
        );
    }
    output.push('\n');
    output.push_str(&render_table(&success.result));
    output
}

pub fn render_failure(failure: &Failure) -> String {
    let mut output = String::new();
    match &failure.reason {
        FailureReason::Exhausted(err) => {
            let _ = writeln!(
                output,
                "ERROR: the query still failed after {} attempt(s).",
                failure.attempts.len()
            );
            let _ = writeln!(output, "Last query:\n  {}", indent(&err.query));
            let _ = writeln!(output, "Database error:\n  {}", indent(&err.message));
        }
        FailureReason::Generation(err) => {
            let _ = writeln!(output, "ERROR: no SQL could be generated for this question.");
            let _ = writeln!(output, "  {}", indent(&err.to_string()));
        }
        FailureReason::Service(err) => {
            let _ = writeln!(output, "ERROR: the language model service failed.");
            let _ = writeln!(output, "  {}", indent(&err.to_string()));
        }
    }

    if !failure.attempts.is_empty() {
        output.push_str("Attempts:\n");
        for attempt in &failure.attempts {
            output.push_str(&render_attempt(attempt));
        }
    }
    output
}

fn render_attempt(attempt: &AttemptRecord) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "  {}. {}", attempt.number, indent(&attempt.query));
    match &attempt.error {
        Some(message) => {
            let _ = writeln!(output, "     -> {}", message.lines().next().unwrap_or(""));
        }
        None => {
            let _ = writeln!(output, "     -> ok ({} ms)", attempt.elapsed_ms);
        }
    }
    output
}

// Continuation lines of multi-line text line up under the first.
fn indent(text: &str) -> String {
    text.trim().lines().collect::<Vec<_>>().join("\n  ")
}
