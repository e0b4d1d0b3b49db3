//! Bulk-input parsing: `serial,group_tag` rows into migration tasks.
//!
//! The input is the tabular hand-off format the enrollment tooling emits.
//! An optional header line is detected and skipped, blank lines are
//! ignored, and double-quoted fields are supported. Anything else is a
//! line-numbered error rather than a silently dropped row.

use std::path::Path;

use anyhow::Context;

use crate::types::MigrationTask;

pub fn load_tasks(path: &Path) -> anyhow::Result<Vec<MigrationTask>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read bulk input file: {}", path.display()))?;
    parse_tasks(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn parse_tasks(content: &str) -> anyhow::Result<Vec<MigrationTask>> {
    let mut tasks = Vec::new();
    let mut saw_row = false;

    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let fields = split_fields(line);
        if !saw_row && is_header(&fields) {
            saw_row = true;
            continue;
        }
        saw_row = true;

        let serial = fields.first().map(|s| s.trim()).unwrap_or_default();
        if serial.is_empty() {
            anyhow::bail!("line {line_no}: missing serial number");
        }

        let group_tag = fields
            .get(1)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_owned);

        let mut task = MigrationTask::new(serial);
        if let Some(tag) = group_tag {
            task = task.with_group_tag(tag);
        }
        tasks.push(task);
    }

    if tasks.is_empty() {
        anyhow::bail!("bulk input contains no device rows");
    }
    Ok(tasks)
}

fn is_header(fields: &[String]) -> bool {
    fields
        .first()
        .map(|f| {
            let first: String = f
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_ascii_lowercase();
            first.contains("serial")
        })
        .unwrap_or(false)
}

/// Comma-split with double-quote support; `""` inside a quoted field is a
/// literal quote.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
