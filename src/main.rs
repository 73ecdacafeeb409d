use chargepay::application::engine::PaymentEngine;
use chargepay::domain::session::SessionId;
use chargepay::infrastructure::in_memory::{
    InMemorySessionStore, InMemoryTransactionStore, RecordingPublisher,
};
use chargepay::infrastructure::ledger::SimulatedXrpl;
#[cfg(feature = "storage-rocksdb")]
use chargepay::infrastructure::rocksdb::RocksDbStore;
use chargepay::interfaces::csv::energy_reader::EnergyUpdateReader;
use chargepay::interfaces::csv::session_writer::SessionWriter;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input energy updates CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[cfg_attr(not(feature = "storage-rocksdb"), allow(unused_variables))]
fn build_engine(cli: &Cli, xrpl: &SimulatedXrpl, publisher: &RecordingPublisher) -> Result<PaymentEngine> {
    #[cfg(feature = "storage-rocksdb")]
    if let Some(db_path) = &cli.db_path {
        let store = RocksDbStore::open(db_path).into_diagnostic()?;
        return Ok(PaymentEngine::new(
            Box::new(store.clone()),
            Box::new(store),
            Box::new(xrpl.clone()),
            Box::new(xrpl.clone()),
            Box::new(publisher.clone()),
        ));
    }

    Ok(PaymentEngine::new(
        Box::new(InMemorySessionStore::new()),
        Box::new(InMemoryTransactionStore::new()),
        Box::new(xrpl.clone()),
        Box::new(xrpl.clone()),
        Box::new(publisher.clone()),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let xrpl = SimulatedXrpl::new();
    let publisher = RecordingPublisher::new();
    let engine = build_engine(&cli, &xrpl, &publisher)?;

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = EnergyUpdateReader::new(file);

    // Payment sessions keyed by charging session, created on first sight.
    let mut sessions: BTreeMap<String, SessionId> = BTreeMap::new();
    let mut totals: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
    let mut row_number = 0u64;

    for row in reader.updates() {
        row_number += 1;
        let row = match row {
            Ok(row) => row,
            Err(error) => {
                tracing::error!(row = row_number, %error, "skipping malformed energy update");
                continue;
            }
        };

        let session_id = match sessions.get(&row.charging_session_id) {
            Some(id) => id.clone(),
            None => {
                let view = match engine
                    .initialize_session(&row.charging_session_id, &row.user_id, &row.station_id)
                    .await
                {
                    Ok(view) => view,
                    Err(error) => {
                        tracing::error!(
                            charging_session_id = %row.charging_session_id,
                            %error,
                            "failed to initialize payment session"
                        );
                        continue;
                    }
                };
                sessions.insert(row.charging_session_id.clone(), view.id.clone());
                view.id
            }
        };

        let attempt = format!("row-{}", row_number);
        match engine
            .process_micropayment(&session_id, row.energy_delta, row.amount_xrp, &attempt)
            .await
        {
            Ok(_) => {
                let entry = totals.entry(row.charging_session_id.clone()).or_default();
                entry.0 += row.energy_delta;
                entry.1 += row.amount_xrp;
            }
            Err(error) => {
                tracing::error!(session_id = %session_id, %error, "micropayment failed");
            }
        }
    }

    let mut views = Vec::new();
    for (charging_session_id, session_id) in &sessions {
        let (energy, amount) = totals.get(charging_session_id).copied().unwrap_or_default();
        match engine.finalize_session(session_id, energy, amount).await {
            Ok(view) => views.push(view),
            Err(error) => {
                tracing::error!(session_id = %session_id, %error, "failed to finalize session");
            }
        }
    }

    let stdout = io::stdout();
    let mut writer = SessionWriter::new(stdout.lock());
    writer.write_sessions(views).into_diagnostic()?;

    Ok(())
}
