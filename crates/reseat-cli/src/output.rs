//! Terminal and file output for migration runs and inventory exports.

use std::path::Path;

use anyhow::Context;
use console::style;

use reseat_core::export::InventorySnapshot;
use reseat_core::migrate::MigrationOutcome;
use reseat_core::migrate::batch::BatchReport;

/// Print one task line with a status marker.
pub fn print_outcome_line(serial: &str, outcome: &MigrationOutcome) {
    if outcome.succeeded() {
        println!("{} {serial}: {outcome}", style("✓").green());
    } else {
        println!("{} {serial}: {outcome}", style("✗").red());
    }
}

/// Final tally for a batch run.
pub fn print_batch_summary(report: &BatchReport) {
    println!();
    for record in report.records() {
        print_outcome_line(&record.serial, &record.outcome);
    }
    println!();

    if report.cancelled() {
        println!("{} run cancelled before all tasks were attempted", style("⚠").yellow());
    }

    let line = format!(
        "Summary: {} tasks, {} migrated, {} skipped, {} failed",
        report.len(),
        report.migrated(),
        report.skipped(),
        report.failed()
    );
    if report.failed() == 0 && !report.cancelled() {
        println!("{line}");
    } else {
        println!("{}", style(line).yellow());
    }
}

pub fn print_batch_json(report: &BatchReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Serialize the snapshot to a tabular file in the hand-off format the
/// enrollment tooling consumes.
pub fn write_snapshot(path: &Path, snapshot: &InventorySnapshot) -> anyhow::Result<()> {
    let mut out = String::from("Device Serial Number,Group Tag,Model,Manufacturer\n");
    for device in &snapshot.devices {
        out.push_str(&format!(
            "{},{},{},{}\n",
            csv_field(&device.serial),
            csv_field(device.group_tag.as_deref().unwrap_or_default()),
            csv_field(device.model.as_deref().unwrap_or_default()),
            csv_field(device.manufacturer.as_deref().unwrap_or_default()),
        ));
    }
    std::fs::write(path, out)
        .with_context(|| format!("Failed to write snapshot file: {}", path.display()))
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
