mod classifier;
mod config;
mod logging;
mod mailbox;

use anyhow::{bail, Context, Result};
use chrono::{Days, Local, NaiveDate};
use clap::{Parser, Subcommand};
use mailvault_core::classifier::{disposition_prompt, recommend_disposition, ClassifierError};
use mailvault_core::{RecordSet, StoredEmail};
use mailvault_ingest::{IngestionOptions, IngestionReport, MailIngestor};
use mailvault_storage::{EmailStore, SqliteEmailStore, DEFAULT_LIST_LIMIT};
use std::path::PathBuf;
use tracing::info;

use crate::classifier::CommandClassifier;
use crate::config::AppConfig;
use crate::mailbox::SnapshotMailbox;

#[derive(Parser)]
#[command(name = "mailvault")]
#[command(about = "Local email store with label reconciliation", long_about = None)]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch recent inbox messages and store them
    StoreInbox {
        #[arg(long, default_value_t = 50)]
        num_emails: usize,
        /// Insert one record at a time and reconcile labels on collisions
        #[arg(long)]
        incremental: bool,
    },
    /// Store trashed messages sent before the cutoff day
    StoreDeleted {
        #[arg(long, default_value_t = 1)]
        days_ago: u64,
    },
    /// Print the most recent stored records
    GetStored {
        /// Record set to read: active (inbox, emails) or deleted (trash, deleted_emails)
        #[arg(long, default_value_t = RecordSet::Active)]
        set: RecordSet,
        /// Shorthand for `--set deleted`
        #[arg(long, conflicts_with = "set")]
        deleted: bool,
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,
    },
    /// Ask the classifier whether a stored record belongs in the trash
    Classify {
        #[arg(long, default_value_t = 0)]
        index: usize,
        #[arg(long, default_value_t = RecordSet::Active)]
        set: RecordSet,
        #[arg(long, conflicts_with = "set")]
        deleted: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;
    logging::init_logging(config.log.level.as_deref());

    let store = SqliteEmailStore::open(&config.db.path)
        .with_context(|| format!("failed to open email store {}", config.db.path.display()))?;

    match cli.command {
        Commands::StoreInbox {
            num_emails,
            incremental,
        } => {
            let mailbox = SnapshotMailbox::new(&config.mailbox.snapshot_path);
            let report = ingestor(&config)
                .store_inbox(&mailbox, &store, num_emails, incremental)
                .context("failed to store inbox messages")?;
            print_report(&report);
        }
        Commands::StoreDeleted { days_ago } => {
            let cutoff = cutoff_date(Local::now().date_naive(), days_ago)?;
            let mailbox = SnapshotMailbox::new(&config.mailbox.snapshot_path);
            let report = ingestor(&config)
                .store_deleted(&mailbox, &store, cutoff)
                .context("failed to store deleted messages")?;
            print_report(&report);
        }
        Commands::GetStored {
            set,
            deleted,
            limit,
        } => {
            let set = record_set(set, deleted);
            let emails = store
                .list(set, limit)
                .context("failed to list stored emails")?;
            if emails.is_empty() {
                println!("No stored emails in {set}");
            }
            for (index, email) in emails.iter().enumerate() {
                println!("{}", summary_line(index, email));
            }
        }
        Commands::Classify {
            index,
            set,
            deleted,
        } => {
            let classifier_config = config
                .classifier
                .as_ref()
                .ok_or(ClassifierError::NotConfigured)?;
            let email = nth_recent(&store, record_set(set, deleted), index)?;
            println!("{}", disposition_prompt(&email));

            let classifier = CommandClassifier::new(classifier_config);
            let answer =
                recommend_disposition(&classifier, &email).context("classifier failed")?;
            info!(id = email.id, answer = %answer, "classification received");
            println!("Recommendation: {answer}");
        }
    }

    Ok(())
}

fn ingestor(config: &AppConfig) -> MailIngestor {
    MailIngestor::new(IngestionOptions {
        label_filter: config.mailbox.labels.clone(),
    })
}

fn record_set(set: RecordSet, deleted: bool) -> RecordSet {
    if deleted {
        RecordSet::Deleted
    } else {
        set
    }
}

fn cutoff_date(today: NaiveDate, days_ago: u64) -> Result<NaiveDate> {
    today
        .checked_sub_days(Days::new(days_ago))
        .with_context(|| format!("cannot go back {days_ago} days from {today}"))
}

fn nth_recent(store: &dyn EmailStore, set: RecordSet, index: usize) -> Result<StoredEmail> {
    let limit = index.saturating_add(1);
    let emails = store
        .list(set, limit)
        .with_context(|| format!("failed to list stored emails in {set}"))?;
    let count = emails.len();
    match emails.into_iter().nth(index) {
        Some(email) => Ok(email),
        None => bail!("index {index} out of range: {count} stored emails in {set}"),
    }
}

fn summary_line(index: usize, email: &StoredEmail) -> String {
    format!(
        "[{index}], [{}], [{}], [{}]",
        email.from,
        email.subject,
        email.canonical_sent_at()
    )
}

fn print_report(report: &IngestionReport) {
    println!(
        "observed {} (filtered {}, unparseable {}): active written {}, deleted written {}, inserted {}, unchanged {}, updated {}, partial {}",
        report.observed,
        report.filtered_out,
        report.skipped_unparseable,
        report.active_written,
        report.deleted_written,
        report.inserted,
        report.unchanged,
        report.updated,
        report.partial_updates,
    );
}
