//! CLI command definitions for workq.
//!
//! Operator commands for inspecting and steering queues stored in Redis:
//! status, listing, scheduling, cancellation, suspend/resume and purging.

use crate::config::{QueuingConfig, DEFAULT_PREFIX, DEFAULT_REDIS_URL};
use crate::queuing::{QueueStats, WorkQueuing};
use crate::work::{WorkItem, WorkState};
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use tracing::info;

/// Operator CLI for Redis-backed work queues.
#[derive(Parser)]
#[command(name = "workq")]
#[command(about = "Inspect and manage Redis-backed work queues")]
#[command(version)]
#[command(
    long_about = "workq inspects and manages crash-recoverable work queues stored in Redis.\n\nExample usage:\n  workq status\n  workq schedule images --category thumbnail --payload '{\"blob\":\"b1\"}'\n  workq suspend images"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Redis connection URL.
    #[arg(long, env = "WORKQ_REDIS_URL", default_value = DEFAULT_REDIS_URL, global = true)]
    pub redis_url: String,

    /// Prefix of every queue key.
    #[arg(long, env = "WORKQ_PREFIX", default_value = DEFAULT_PREFIX, global = true)]
    pub prefix: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Show membership sizes of one or all queues.
    Status(StatusArgs),

    /// List work ids of a queue.
    #[command(alias = "ls")]
    List(ListArgs),

    /// Show the state and payload of a work item.
    Show(ShowArgs),

    /// Schedule a new work item.
    Schedule(ScheduleArgs),

    /// Cancel a scheduled work item.
    Cancel(CancelArgs),

    /// Move all scheduled work of a queue to its suspended list.
    Suspend(QueueArgs),

    /// Move all suspended work of a queue back to its scheduled list.
    Resume(QueueArgs),

    /// Delete completed (or canceled) work.
    Purge(PurgeArgs),

    /// Print queue metrics in Prometheus text format.
    Metrics,
}

/// Arguments for `workq status`.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Only show this queue.
    #[arg(short, long)]
    pub queue: Option<String>,

    /// Output JSON to stdout.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `workq list`.
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Queue id.
    pub queue: String,

    /// State to list (scheduled, running, completed, canceled, suspended).
    /// Lists scheduled and running work when omitted.
    #[arg(short, long)]
    pub state: Option<String>,
}

/// Arguments for `workq show`.
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Work id.
    pub work_id: String,
}

/// Arguments for `workq schedule`.
#[derive(Parser, Debug)]
pub struct ScheduleArgs {
    /// Queue id.
    pub queue: String,

    /// Work category, used by handlers to dispatch.
    #[arg(short, long)]
    pub category: String,

    /// JSON payload of the work.
    #[arg(short, long)]
    pub payload: Option<String>,

    /// Explicit work id (a UUID is generated otherwise).
    #[arg(long)]
    pub id: Option<String>,

    /// Human-readable title.
    #[arg(short, long)]
    pub title: Option<String>,
}

/// Arguments for `workq cancel`.
#[derive(Parser, Debug)]
pub struct CancelArgs {
    /// Queue id.
    pub queue: String,

    /// Work id.
    pub work_id: String,
}

/// Arguments naming a single queue.
#[derive(Parser, Debug)]
pub struct QueueArgs {
    /// Queue id.
    pub queue: String,
}

/// Arguments for `workq purge`.
#[derive(Parser, Debug)]
pub struct PurgeArgs {
    /// Queue id.
    pub queue: String,

    /// Only delete work finished before this epoch-millis timestamp.
    #[arg(long, conflicts_with = "older_than_secs")]
    pub before: Option<i64>,

    /// Only delete work finished more than this many seconds ago.
    #[arg(long)]
    pub older_than_secs: Option<u64>,

    /// Purge canceled work instead of completed work.
    #[arg(long)]
    pub canceled: bool,
}

impl PurgeArgs {
    /// Purge threshold in epoch millis; 0 deletes everything.
    fn threshold_millis(&self, now: DateTime<Utc>) -> i64 {
        match (self.before, self.older_than_secs) {
            (Some(before), _) => before,
            (None, Some(secs)) => {
                let secs = i64::try_from(secs).unwrap_or(i64::MAX / 1000);
                (now.timestamp_millis() - secs.saturating_mul(1000)).max(1)
            }
            (None, None) => 0,
        }
    }
}

/// What `workq list --state` may select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListSelection {
    Pending,
    State(WorkState),
    Suspended,
}

fn parse_list_selection(state: Option<&str>) -> anyhow::Result<ListSelection> {
    match state {
        None => Ok(ListSelection::Pending),
        Some(s) if s.eq_ignore_ascii_case("suspended") => Ok(ListSelection::Suspended),
        Some(s) => s
            .parse::<WorkState>()
            .map(ListSelection::State)
            .map_err(|e| anyhow::anyhow!(e)),
    }
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI with the parsed arguments.
///
/// This is the main entry point for the workq CLI.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let config = QueuingConfig::new()
        .with_redis_url(cli.redis_url)
        .with_prefix(cli.prefix);
    let queuing = WorkQueuing::connect(config)
        .await
        .context("Failed to connect to the work queue store")?;

    match cli.command {
        Commands::Status(args) => run_status_command(&queuing, args).await,
        Commands::List(args) => run_list_command(&queuing, args).await,
        Commands::Show(args) => run_show_command(&queuing, args).await,
        Commands::Schedule(args) => run_schedule_command(&queuing, args).await,
        Commands::Cancel(args) => run_cancel_command(&queuing, args).await,
        Commands::Suspend(args) => {
            let moved = queuing.set_suspending(&args.queue).await?;
            println!("Suspended {} work item(s) on '{}'", moved, args.queue);
            Ok(())
        }
        Commands::Resume(args) => {
            let moved = queuing.schedule_suspended_work(&args.queue).await?;
            println!("Rescheduled {} work item(s) on '{}'", moved, args.queue);
            Ok(())
        }
        Commands::Purge(args) => run_purge_command(&queuing, args).await,
        Commands::Metrics => run_metrics_command(&queuing).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn run_status_command(queuing: &WorkQueuing, args: StatusArgs) -> anyhow::Result<()> {
    let queue_ids: Vec<String> = match args.queue {
        Some(queue) => vec![queue],
        None => queuing.known_queue_ids().await?.into_iter().collect(),
    };

    let mut stats = Vec::with_capacity(queue_ids.len());
    for queue_id in &queue_ids {
        stats.push(queuing.queue_stats(queue_id).await?);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    if stats.is_empty() {
        println!("No queues found under prefix '{}'", queuing.config().prefix);
        return Ok(());
    }

    print!("{}", render_status_table(&stats));
    Ok(())
}

fn render_status_table(stats: &[QueueStats]) -> String {
    let width = stats
        .iter()
        .map(|s| s.queue_id.len())
        .max()
        .unwrap_or(0)
        .max("QUEUE".len());

    let mut out = format!(
        "{:<width$}  {:>9}  {:>7}  {:>9}  {:>9}  {:>8}\n",
        "QUEUE",
        "SCHEDULED",
        "RUNNING",
        "COMPLETED",
        "SUSPENDED",
        "CANCELED",
        width = width
    );
    for s in stats {
        out.push_str(&format!(
            "{:<width$}  {:>9}  {:>7}  {:>9}  {:>9}  {:>8}\n",
            s.queue_id,
            s.scheduled,
            s.running,
            s.completed,
            s.suspended,
            s.canceled,
            width = width
        ));
    }
    out
}

async fn run_list_command(queuing: &WorkQueuing, args: ListArgs) -> anyhow::Result<()> {
    let ids = match parse_list_selection(args.state.as_deref())? {
        ListSelection::Pending => queuing.list_work_ids(&args.queue, None).await?,
        ListSelection::State(state) => queuing.list_work_ids(&args.queue, Some(state)).await?,
        ListSelection::Suspended => queuing.list_suspended_ids(&args.queue).await?,
    };

    for id in &ids {
        println!("{}", id);
    }
    info!(queue_id = %args.queue, count = ids.len(), "Listed work ids");
    Ok(())
}

#[derive(Debug, Serialize)]
struct ShowOutput {
    work_id: String,
    state: Option<WorkState>,
    state_time: Option<String>,
    work: Option<WorkItem>,
}

async fn run_show_command(queuing: &WorkQueuing, args: ShowArgs) -> anyhow::Result<()> {
    let record = queuing.get_work_state_record(&args.work_id).await?;
    let work = queuing.state_store().fetch(&args.work_id).await?;

    if record.is_none() && work.is_none() {
        anyhow::bail!("Work '{}' not found", args.work_id);
    }

    let output = ShowOutput {
        work_id: args.work_id,
        state: record.map(|r| r.state),
        state_time: record
            .and_then(|r| r.timestamp)
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|t| t.to_rfc3339()),
        work,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run_schedule_command(queuing: &WorkQueuing, args: ScheduleArgs) -> anyhow::Result<()> {
    let mut work = WorkItem::new(&args.queue, &args.category);
    if let Some(id) = args.id {
        work = work.with_id(id);
    }
    if let Some(title) = args.title {
        work = work.with_title(title);
    }
    if let Some(payload) = args.payload {
        let payload: serde_json::Value =
            serde_json::from_str(&payload).context("Payload is not valid JSON")?;
        work = work.with_payload(payload);
    }

    queuing.add_scheduled_work(&args.queue, &mut work).await?;
    println!("{}", work.id);
    Ok(())
}

async fn run_cancel_command(queuing: &WorkQueuing, args: CancelArgs) -> anyhow::Result<()> {
    match queuing.remove_scheduled(&args.queue, &args.work_id).await? {
        Some(_) => {
            println!("Canceled '{}' on '{}'", args.work_id, args.queue);
            Ok(())
        }
        None => anyhow::bail!(
            "Work '{}' is not scheduled on '{}'",
            args.work_id,
            args.queue
        ),
    }
}

async fn run_purge_command(queuing: &WorkQueuing, args: PurgeArgs) -> anyhow::Result<()> {
    let threshold = args.threshold_millis(Utc::now());
    let removed = if args.canceled {
        queuing.clear_canceled_work(&args.queue, threshold).await?
    } else {
        queuing.clear_completed_work(&args.queue, threshold).await?
    };

    let kind = if args.canceled { "canceled" } else { "completed" };
    println!("Purged {} {} work item(s) from '{}'", removed, kind, args.queue);
    Ok(())
}

async fn run_metrics_command(queuing: &WorkQueuing) -> anyhow::Result<()> {
    for queue_id in queuing.known_queue_ids().await? {
        queuing.queue_stats(&queue_id).await?;
    }
    print!("{}", queuing.metrics().export());
    Ok(())
}
