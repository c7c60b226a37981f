use chrono::Utc;
use clap::Parser;
use feepay::application::intake::PaymentIntake;
use feepay::application::processor::PaymentProcessor;
use feepay::application::queue::WorkQueue;
use feepay::application::recovery::reconcile;
use feepay::config::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_LATENCY_MS, DEFAULT_MIN_LATENCY_MS,
    DEFAULT_STALE_AFTER_SECS, DEFAULT_SUCCESS_RATE, PipelineConfig, QueueConfig,
    SettlementConfig,
};
use feepay::domain::payment::PaymentFilter;
use feepay::domain::ports::{PaymentStoreRef, SettlementGatewayRef};
use feepay::domain::school::{Role, Student};
use feepay::infrastructure::gateway::SimulatedGateway;
use feepay::infrastructure::in_memory::{InMemoryPaymentStore, InMemoryStudentDirectory};
use feepay::interfaces::csv::payment_writer::PaymentWriter;
use feepay::interfaces::csv::request_reader::PaymentRequestReader;
use feepay::interfaces::csv::student_reader::StudentReader;
use feepay::telemetry;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input payment requests CSV file
    input: PathBuf,

    /// Students CSV file. When omitted, each referenced student is registered
    /// as a child of the payer who references it first.
    #[arg(long)]
    students: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "FEEPAY_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Maximum number of payments settling at once
    #[arg(long, env = "FEEPAY_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    #[arg(long, env = "FEEPAY_MIN_LATENCY_MS", default_value_t = DEFAULT_MIN_LATENCY_MS)]
    min_latency_ms: u64,

    #[arg(long, env = "FEEPAY_MAX_LATENCY_MS", default_value_t = DEFAULT_MAX_LATENCY_MS)]
    max_latency_ms: u64,

    /// Probability that a simulated settlement succeeds
    #[arg(long, env = "FEEPAY_SUCCESS_RATE", default_value_t = DEFAULT_SUCCESS_RATE)]
    success_rate: f64,

    /// Age after which a payment stuck in processing is failed on startup
    #[arg(long, env = "FEEPAY_STALE_AFTER_SECS", default_value_t = DEFAULT_STALE_AFTER_SECS)]
    stale_after_secs: u64,

    /// Seed for the settlement simulator
    #[arg(long, env = "FEEPAY_SEED")]
    seed: Option<u64>,
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            queue: QueueConfig {
                concurrency: self.concurrency,
            },
            settlement: SettlementConfig {
                min_latency: Duration::from_millis(self.min_latency_ms),
                max_latency: Duration::from_millis(self.max_latency_ms),
                success_rate: self.success_rate,
            },
            stale_after: Duration::from_secs(self.stale_after_secs),
            seed: self.seed,
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<&Path>) -> Result<PaymentStoreRef> {
    use feepay::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => Ok(Arc::new(RocksDBStore::open(path).into_diagnostic()?)),
        None => Ok(Arc::new(InMemoryPaymentStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<&Path>) -> Result<PaymentStoreRef> {
    if db_path.is_some() {
        tracing::warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemoryPaymentStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();
    let cli = Cli::parse();

    let config = cli.pipeline_config();
    config.validate().into_diagnostic()?;

    let store = open_store(cli.db_path.as_deref())?;

    let students = InMemoryStudentDirectory::new();
    if let Some(path) = &cli.students {
        let file = File::open(path).into_diagnostic()?;
        for student in StudentReader::new(file).students() {
            match student {
                Ok(student) => students.register(student).await,
                Err(e) => error!("Error reading student: {}", e),
            }
        }
    }
    let auto_register = cli.students.is_none();

    let gateway = match config.seed {
        Some(seed) => SimulatedGateway::with_seed(config.settlement.clone(), seed),
        None => SimulatedGateway::new(config.settlement.clone()),
    }
    .into_diagnostic()?;
    let gateway: SettlementGatewayRef = Arc::new(gateway);

    let queue = WorkQueue::start(&config.queue);
    let processor = PaymentProcessor::new(store.clone(), gateway);
    let intake = PaymentIntake::new(
        store.clone(),
        Arc::new(students.clone()),
        processor,
        queue.handle(),
    );

    reconcile(&store, &intake, config.stale_after, Utc::now())
        .await
        .into_diagnostic()?;

    // Submit payment requests
    let file = File::open(&cli.input).into_diagnostic()?;
    for record in PaymentRequestReader::new(file).requests() {
        let (requester, request) = match record {
            Ok(record) => record.into_parts(),
            Err(e) => {
                error!("Error reading payment request: {}", e);
                continue;
            }
        };

        if auto_register && !students.contains(request.student_id).await {
            students
                .register(Student {
                    id: request.student_id,
                    parent_id: (requester.role == Role::Parent).then_some(requester.user_id),
                    grade: 0,
                    fee_structure_id: None,
                })
                .await;
        }

        if let Err(e) = intake.create_payment(requester, request).await {
            error!("Error creating payment: {}", e);
        }
    }

    // Wait for every queued settlement before reporting
    queue.shutdown().await.into_diagnostic()?;

    let mut payments = store
        .list(&PaymentFilter::default())
        .await
        .into_diagnostic()?;
    payments.sort_by_key(|p| p.id);
    info!(count = payments.len(), "Writing payments");

    let stdout = io::stdout();
    let mut writer = PaymentWriter::new(stdout.lock());
    writer.write_payments(payments).into_diagnostic()?;

    Ok(())
}
