use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use failover_pool::config::load_config;
use failover_pool::connect::PgConnector;
use failover_pool::observability::logging;
use failover_pool::pool::ConnectionDescriptor;
use failover_pool::{BackupExporter, FailoverController, Pool, Shutdown};

#[derive(Parser)]
#[command(name = "snapshot-cli")]
#[command(about = "Export and maintenance CLI for the dashboard database pool", long_about = None)]
struct Cli {
    /// Path to the pool configuration file.
    #[arg(short, long, default_value = "pool.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export one table to a snapshot file
    Export {
        #[arg(short, long)]
        table: String,
    },
    /// Export every configured table
    ExportAll,
    /// Remove snapshots past the retention window
    Cleanup,
    /// Probe the active target and print pool state
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init("failover_pool=info");

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    let descriptors: Vec<ConnectionDescriptor> =
        config.descriptors.iter().map(ConnectionDescriptor::from).collect();
    let (pool, probe_rx) = Pool::new(descriptors, config.pool.clone(), Arc::new(PgConnector));

    let shutdown = Shutdown::new();
    let controller = FailoverController::new(pool.clone(), config.health.clone(), probe_rx);
    let monitor = tokio::spawn(controller.run(shutdown.subscribe()));

    let exporter = BackupExporter::new(pool.clone(), config.backup.clone());

    let mut failed = false;
    match cli.command {
        Commands::Export { table } => {
            match exporter.export_table(&table).await {
                Ok(snapshot) => {
                    println!("exported {} ({} rows) -> {}", snapshot.table, snapshot.row_count, snapshot.file_name());
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    failed = true;
                }
            }
        }
        Commands::ExportAll => {
            for (table, result) in exporter.export_all().await {
                match result {
                    Ok(snapshot) => {
                        println!("exported {} ({} rows) -> {}", table, snapshot.row_count, snapshot.file_name());
                    }
                    Err(e) => {
                        eprintln!("Error exporting {}: {}", table, e);
                        failed = true;
                    }
                }
            }
        }
        Commands::Cleanup => {
            let removed = exporter.cleanup_old_snapshots()?;
            println!("removed {} expired snapshot(s)", removed);
        }
        Commands::Status => {
            let healthy = pool.health_check(config.health.probe_timeout()).await;
            let stats = pool.stats();
            let report = json!({
                "active_target": pool.active_descriptor().to_string(),
                "active_reachable": healthy,
                "status": stats.status.to_string(),
                "in_use": stats.in_use,
                "idle": stats.idle,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            failed = !healthy;
        }
    }

    shutdown.trigger();
    pool.shutdown().await;
    let _ = monitor.await;

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
