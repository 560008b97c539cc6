use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use workspace_gate::application::guard::CrudGuard;
use workspace_gate::application::subscription_store::SubscriptionStore;
use workspace_gate::config::EngineConfig;
use workspace_gate::domain::access::Denial;
use workspace_gate::domain::ids::{PrincipalId, ProjectId, TenantId};
use workspace_gate::domain::payment::{Payment, PaymentStatus, rollup};
use workspace_gate::domain::subscription::{RawBillingRecord, SubscriptionState};
use workspace_gate::infrastructure::in_memory::InMemoryStore;
use workspace_gate::interfaces::csv::payment_reader::PaymentReader;
use workspace_gate::interfaces::csv::rollup_writer::RollupWriter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Derive each project's payment status from a payments CSV file
    Rollup {
        /// Input payments CSV file
        input: PathBuf,

        /// Treat unpaid payments due before this date (YYYY-MM-DD) as late.
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Normalize a tenant billing record (JSON) and report the access decision
    Access {
        /// Billing record JSON file
        record: PathBuf,

        /// Engine configuration JSON file (optional).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct AccessReport {
    state: Option<SubscriptionState>,
    allowed: bool,
    denial: Option<Denial>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Rollup { input, as_of } => run_rollup(input, as_of),
        Command::Access { record, config } => run_access(record, config).await,
    }
}

fn run_rollup(input: PathBuf, as_of: Option<NaiveDate>) -> Result<()> {
    let file = File::open(input).into_diagnostic()?;
    let reader = PaymentReader::new(file);

    let mut by_project: BTreeMap<ProjectId, Vec<Payment>> = BTreeMap::new();
    for (row, payment) in reader.payments().enumerate() {
        match payment {
            Ok(mut payment) => {
                if let Some(today) = as_of
                    && payment.is_overdue(today)
                {
                    payment.status = PaymentStatus::Atrasado;
                }
                by_project.entry(payment.project).or_default().push(payment);
            }
            Err(e) => {
                tracing::warn!(row = row + 1, error = %e, "Skipping payment row");
            }
        }
    }

    let rollups = by_project
        .iter()
        .map(|(project, payments)| (*project, rollup(payments)));

    let stdout = io::stdout();
    let mut writer = RollupWriter::new(stdout.lock());
    writer.write_rollups(rollups).into_diagnostic()?;

    Ok(())
}

async fn run_access(record: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let config = match config {
        Some(path) => EngineConfig::from_path(path).into_diagnostic()?,
        None => EngineConfig::default(),
    };

    let content = std::fs::read_to_string(&record).into_diagnostic()?;
    let raw = match serde_json::from_str(&content) {
        Ok(value) => RawBillingRecord::from_json(value),
        Err(e) => {
            tracing::warn!(path = %record.display(), error = %e, "Unreadable billing record, treating as empty");
            RawBillingRecord::default()
        }
    };

    let store = InMemoryStore::new();
    let principal = PrincipalId::new("cli");
    let tenant = TenantId(1);
    store.link_principal(principal.clone(), tenant).await;
    store.set_billing_record(tenant, raw).await;

    let subscriptions =
        SubscriptionStore::spawn(principal, Arc::new(store.clone()), Arc::new(store));
    let guard = CrudGuard::for_store(&subscriptions, config.guard);
    let outcome = guard.execute_guarded(Some("cli"), || async {}).await;

    let report = AccessReport {
        state: subscriptions.state(),
        allowed: outcome.is_allowed(),
        denial: outcome.denial().cloned(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&report).into_diagnostic()?
    );

    Ok(())
}
