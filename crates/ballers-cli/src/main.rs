//! CLI de operación: `ballers sync`, `ballers watch`, `ballers history`,
//! `ballers check-config`.
//!
//! Códigos de salida: 0 éxito, 1 corrida fallida, 2 corrida ya en curso,
//! 3 error de configuración o arranque.

use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use ballers_core::{RunLog, SyncReport};
use ballers_sync::config::interval_from_minutes;
use ballers_sync::{bootstrap, AppError, SyncConfig};
use clap::{Parser, Subcommand};
use log::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ballers")]
#[command(about = "Sincroniza la hoja de cálculo de Ballers con la base de datos")]
struct Cli {
    /// Salida en JSON en lugar de texto
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ejecuta una corrida y muestra el reporte
    Sync,
    /// Auto-sync periódico hasta que se detenga el proceso
    Watch {
        /// Intervalo entre corridas (por defecto BALLERS_SYNC_INTERVAL_MINUTES)
        #[arg(long)]
        interval_minutes: Option<u64>,
    },
    /// Últimas corridas registradas
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Valida la configuración sin tocar la hoja ni la base
    CheckConfig,
}

const EXIT_RUN_FAILED: u8 = 1;
const EXIT_BUSY: u8 = 2;
const EXIT_CONFIG: u8 = 3;

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
                             .with_writer(std::io::stderr)
                             .init();

    match run(cli) {
        Ok(code) => code,
        Err(AppError::Busy(busy)) => {
            error!("{busy}");
            ExitCode::from(EXIT_BUSY)
        }
        Err(e) => {
            error!("{e}");
            ExitCode::from(EXIT_CONFIG)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, AppError> {
    let config = SyncConfig::from_env()?;
    match cli.command {
        Command::CheckConfig => {
            let summary = config.summary();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_default());
            } else {
                println!("hoja:        {} [{}]", summary.spreadsheet_id, summary.range);
                println!("clave:       {}", summary.key_columns.join(", "));
                println!("atributos:   {}", summary.attribute_columns.join(", "));
                println!("numéricas:   {}", summary.numeric_columns.join(", "));
                println!("página:      {} filas, {} intentos", summary.page_size, summary.max_attempts);
                println!("auto-sync:   cada {} min", summary.sync_interval_minutes);
                println!("base:        {}", summary.database_host);
                println!("credencial:  {}", if summary.credential_present { "presente" } else { "ausente" });
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Sync => {
            let app = bootstrap(config)?;
            let report = app.orchestrator.run(&app.config.source)?;
            print_report(&report, cli.json);
            Ok(if report.is_success() { ExitCode::SUCCESS } else { ExitCode::from(EXIT_RUN_FAILED) })
        }
        Command::History { limit } => {
            let app = bootstrap(config)?;
            for report in app.run_log.recent(limit)? {
                print_report(&report, cli.json);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Watch { interval_minutes } => {
            let interval = match interval_minutes {
                Some(m) => interval_from_minutes("--interval-minutes", m)?,
                None => config.sync_interval,
            };
            let app = bootstrap(config)?;
            let auto = app.auto_sync();
            auto.start(interval);
            info!("watch: auto-sync cada {} min", interval.as_secs() / 60);
            loop {
                thread::sleep(Duration::from_secs(5));
                if let Some(changes) = auto.take_pending_changes() {
                    if let Some(msg) = changes.message() {
                        println!("Sincronización: {msg}");
                    }
                }
                let stats = auto.status();
                if let Some(err) = &stats.last_error {
                    log::warn!("watch: última corrida fallida ({} de {}): {err}", stats.failed_syncs, stats.total_syncs);
                }
            }
        }
    }
}

fn print_report(report: &SyncReport, json: bool) {
    if json {
        println!("{}", serde_json::to_string(report).unwrap_or_default());
        return;
    }
    let c = report.counts();
    println!("{} {} {} insert={} update={} unchanged={} orphan={} applied={} warnings={} ms={}",
             report.finished_at().format("%Y-%m-%d %H:%M:%S"),
             report.run_id(),
             report.state().as_str(),
             c.insert,
             c.update,
             c.unchanged,
             c.orphan,
             report.applied(),
             report.warnings().len(),
             report.duration().num_milliseconds());
    for w in report.warnings() {
        println!("  aviso: {w}");
    }
    for e in report.errors() {
        println!("  error: {e}");
    }
}
