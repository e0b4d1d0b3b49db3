//! Reseat - tenant-to-tenant device enrollment migration
//!
//! Usage:
//!   reseat migrate <SERIAL>      # Move one device from source to target
//!   reseat batch <FILE>          # Move every device listed in a file
//!   reseat export <FILE>         # Snapshot a tenant's inventory
//!   reseat remove <SERIAL>       # Delete one enrollment record

mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reseat_core::bulk;
use reseat_core::config::ReseatConfig;
use reseat_core::directory::{DeviceDirectory, HttpDirectoryClient};
use reseat_core::export;
use reseat_core::migrate::batch::BatchMigrator;
use reseat_core::migrate::Migrator;
use reseat_core::poll::PollSettings;
use reseat_core::types::{MigrationTask, TenantRole};

#[derive(Parser)]
#[command(name = "reseat")]
#[command(about = "Tenant-to-tenant device enrollment migration", long_about = None)]
struct Cli {
    /// Path to reseat.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate a single device from the source tenant to the target tenant
    ///
    /// The source record is deleted and the deletion is confirmed by
    /// polling before the device is imported at the target.
    Migrate {
        /// Device serial number (matched case-insensitively)
        serial: String,

        /// Group tag to apply at the target (defaults to the tag on the
        /// source record)
        #[arg(long)]
        group_tag: Option<String>,

        /// Look up only; perform no deletes or imports
        #[arg(long)]
        dry_run: bool,

        /// Deletion-confirmation timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Deletion-confirmation poll interval in seconds
        #[arg(long)]
        interval: Option<u64>,

        /// Skip the confirmation prompt (for CI/CD)
        #[arg(short = 'y', long)]
        yes: bool,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Migrate every device listed in a tabular input file
    ///
    /// Rows are `serial,group_tag`; a header line is detected and
    /// skipped. Devices are processed strictly in order with a pacing
    /// delay between them, and one device's failure never stops the rest.
    Batch {
        /// Input file of serial,group_tag rows
        file: PathBuf,

        /// Look up only; perform no deletes or imports
        #[arg(long)]
        dry_run: bool,

        /// Delay between consecutive devices in seconds
        #[arg(long)]
        pacing: Option<u64>,

        /// Deletion-confirmation timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Deletion-confirmation poll interval in seconds
        #[arg(long)]
        interval: Option<u64>,

        /// Skip the confirmation prompt (for CI/CD)
        #[arg(short = 'y', long)]
        yes: bool,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Snapshot a tenant's device inventory to a tabular file
    Export {
        /// Output file
        file: PathBuf,

        /// Which tenant to read
        #[arg(long, default_value = "source")]
        tenant: TenantArg,
    },

    /// Delete one enrollment record from a tenant
    #[command(alias = "rm")]
    Remove {
        /// Device serial number
        serial: String,

        /// Which tenant to delete from
        #[arg(long, default_value = "source")]
        tenant: TenantArg,

        /// Skip the confirmation prompt (for CI/CD)
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable lines
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum TenantArg {
    Source,
    Target,
}

impl From<TenantArg> for TenantRole {
    fn from(value: TenantArg) -> Self {
        match value {
            TenantArg::Source => TenantRole::Source,
            TenantArg::Target => TenantRole::Target,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reseat=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let exit_code = match cli.command {
        Commands::Migrate {
            serial,
            group_tag,
            dry_run,
            timeout,
            interval,
            yes,
            format,
        } => {
            run_migrate(
                &config, serial, group_tag, dry_run, timeout, interval, yes, format,
            )
            .await?
        }
        Commands::Batch {
            file,
            dry_run,
            pacing,
            timeout,
            interval,
            yes,
            format,
        } => {
            run_batch(
                &config, &file, dry_run, pacing, timeout, interval, yes, format,
            )
            .await?
        }
        Commands::Export { file, tenant } => run_export(&config, &file, tenant.into()).await?,
        Commands::Remove { serial, tenant, yes } => {
            run_remove(&config, &serial, tenant.into(), yes).await?
        }
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<ReseatConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => ReseatConfig::default_path()?,
    };
    ReseatConfig::load(&path)
}

fn poll_settings(
    config: &ReseatConfig,
    timeout: Option<u64>,
    interval: Option<u64>,
) -> PollSettings {
    PollSettings::new(
        timeout
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.migration.poll_timeout()),
        interval
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.migration.poll_interval()),
    )
}

fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    Ok(dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

/// Cancel the returned token on Ctrl-C; the batch stops after the device
/// currently in flight.
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping after the current device");
            handle.cancel();
        }
    });
    cancel
}

#[allow(clippy::too_many_arguments)]
async fn run_migrate(
    config: &ReseatConfig,
    serial: String,
    group_tag: Option<String>,
    dry_run: bool,
    timeout: Option<u64>,
    interval: Option<u64>,
    yes: bool,
    format: OutputFormat,
) -> Result<i32> {
    if !dry_run {
        let prompt = format!(
            "Migrate device {serial} from {} to {}? The source record will be deleted",
            config.source.tenant_id, config.target.tenant_id
        );
        if !confirm(&prompt, yes)? {
            println!("Migration cancelled.");
            return Ok(0);
        }
    }

    let source = HttpDirectoryClient::new(&config.source)?;
    let target = HttpDirectoryClient::new(&config.target)?;
    let migrator = Migrator::new(&source, &target, poll_settings(config, timeout, interval))
        .with_dry_run(dry_run);

    let mut task = MigrationTask::new(serial.clone());
    if let Some(tag) = group_tag {
        task = task.with_group_tag(tag);
    }

    let outcome = migrator.run(&task).await?;

    match format {
        OutputFormat::Table => output::print_outcome_line(&serial, &outcome),
        OutputFormat::Json => {
            let mut line = serde_json::to_value(&outcome)?;
            line["serial"] = serde_json::Value::String(serial.clone());
            line["succeeded"] = serde_json::Value::Bool(outcome.succeeded());
            println!("{}", serde_json::to_string_pretty(&line)?);
        }
    }

    Ok(if outcome.succeeded() { 0 } else { 1 })
}

#[allow(clippy::too_many_arguments)]
async fn run_batch(
    config: &ReseatConfig,
    file: &std::path::Path,
    dry_run: bool,
    pacing: Option<u64>,
    timeout: Option<u64>,
    interval: Option<u64>,
    yes: bool,
    format: OutputFormat,
) -> Result<i32> {
    let tasks = bulk::load_tasks(file)?;

    if !dry_run {
        let prompt = format!(
            "Migrate {} devices from {} to {}? Source records will be deleted",
            tasks.len(),
            config.source.tenant_id,
            config.target.tenant_id
        );
        if !confirm(&prompt, yes)? {
            println!("Migration cancelled.");
            return Ok(0);
        }
    }

    let source = HttpDirectoryClient::new(&config.source)?;
    let target = HttpDirectoryClient::new(&config.target)?;
    let migrator = Migrator::new(&source, &target, poll_settings(config, timeout, interval))
        .with_dry_run(dry_run);
    let batch = BatchMigrator::new(
        migrator,
        pacing
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.migration.pacing()),
    );

    let cancel = cancel_on_interrupt();
    let report = batch.run(&tasks, &cancel).await?;

    match format {
        OutputFormat::Table => output::print_batch_summary(&report),
        OutputFormat::Json => output::print_batch_json(&report)?,
    }

    Ok(if report.failed() == 0 && !report.cancelled() {
        0
    } else {
        1
    })
}

async fn run_export(config: &ReseatConfig, file: &std::path::Path, role: TenantRole) -> Result<i32> {
    let client = HttpDirectoryClient::new(config.tenant(role))?;
    let inventory = export::snapshot(&client).await?;
    output::write_snapshot(file, &inventory)?;
    println!(
        "Exported {} devices from {role} to {} (taken at {})",
        inventory.devices.len(),
        file.display(),
        inventory.taken_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(0)
}

async fn run_remove(config: &ReseatConfig, serial: &str, role: TenantRole, yes: bool) -> Result<i32> {
    let client = HttpDirectoryClient::new(config.tenant(role))?;

    let Some(record) = client.find(serial).await? else {
        println!("No enrollment record for {serial} at {role}.");
        return Ok(0);
    };

    let prompt = format!(
        "Delete enrollment record {serial} ({}) from {role}?",
        record.remote_id
    );
    if !confirm(&prompt, yes)? {
        println!("Removal cancelled.");
        return Ok(0);
    }

    client.delete(&record).await?;
    println!("✓ Deleted {serial} from {role}");
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn migrate_parses_without_panic() {
        let args = ["reseat", "migrate", "ABC123", "--group-tag", "Line-01"];
        assert!(Cli::try_parse_from(args).is_ok());
    }

    #[test]
    fn migrate_dry_run_with_overrides_parses() {
        let args = [
            "reseat", "migrate", "ABC123", "--dry-run", "--timeout", "120", "--interval", "5",
        ];
        assert!(Cli::try_parse_from(args).is_ok());
    }

    #[test]
    fn batch_parses_without_panic() {
        let args = ["reseat", "batch", "devices.csv", "--pacing", "3", "-y"];
        assert!(Cli::try_parse_from(args).is_ok());
    }

    #[test]
    fn batch_with_format_json_parses() {
        let args = ["reseat", "batch", "devices.csv", "--format", "json"];
        assert!(Cli::try_parse_from(args).is_ok());
    }

    #[test]
    fn export_defaults_to_source_tenant() {
        let args = ["reseat", "export", "inventory.csv"];
        assert!(Cli::try_parse_from(args).is_ok());
    }

    #[test]
    fn export_target_tenant_parses() {
        let args = ["reseat", "export", "inventory.csv", "--tenant", "target"];
        assert!(Cli::try_parse_from(args).is_ok());
    }

    #[test]
    fn remove_alias_parses() {
        let args = ["reseat", "rm", "ABC123", "--tenant", "target", "-y"];
        assert!(Cli::try_parse_from(args).is_ok());
    }

    #[test]
    fn global_config_flag_parses() {
        let args = ["reseat", "--config", "/tmp/reseat.toml", "migrate", "ABC123"];
        assert!(Cli::try_parse_from(args).is_ok());
    }

    #[test]
    fn invalid_tenant_is_rejected() {
        let args = ["reseat", "export", "inventory.csv", "--tenant", "both"];
        assert!(Cli::try_parse_from(args).is_err());
    }
}
