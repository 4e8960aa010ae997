use tracing::{info, warn};

use shiftcheck::config::Config;
use shiftcheck::reconcile::ReconciliationEngine;
use shiftcheck::report::{self, Report};
use shiftcheck::scheduler::ResourceScheduler;
use shiftcheck::source;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    if let Err(e) = shiftcheck::observability::init(config.metrics_port) {
        warn!("metrics exporter not installed: {e}");
    }

    info!("shiftcheck starting");
    info!("  events: {}", config.events_path.display());
    info!("  submissions: {}", config.submissions_path.display());
    info!("  time zone: {}", config.reference_tz.name());
    info!(
        "  excluding attendees matching: {}",
        if config.exclude.is_empty() { "<none>" } else { config.exclude.as_str() }
    );

    let raw_events = source::load_events(&config.events_path).await?;
    let events = source::parse_events(&raw_events, config.reference_tz);
    let rows = source::load_rows(&config.submissions_path).await?;
    let submissions = source::parse_submissions(&rows, config.reference_tz);

    let filter = config.subject_filter();
    let reconciliation =
        ReconciliationEngine::new(filter.clone()).reconcile(&events.records, &submissions.records);
    report::log_summary(&reconciliation);

    let hours = report::hours_by_subject(&events.records, &filter);
    for (subject, h) in &hours {
        info!("{subject}: {h:.2} hours");
    }

    let mut output = Report::new(events, submissions, &reconciliation, hours);
    info!(
        "{}: {} rows, {}: {} rows",
        report::MISSING_SUBMISSION_SHEET,
        output.missing_submission.len() - 1,
        report::EXTRA_SUBMISSION_SHEET,
        output.extra_submission.len() - 1,
    );

    if let Some(path) = &config.tasks_path {
        let tasks = source::load_tasks(path).await?;
        let scheduler = ResourceScheduler::new();
        let outcomes = report::book_tasks(&scheduler, &tasks);
        info!(
            "tasks: {} requested, {} booked",
            tasks.len(),
            scheduler.booking_count()
        );
        output = output.with_tasks(&scheduler, outcomes);
    }

    let json = serde_json::to_string_pretty(&output)?;
    match &config.output_path {
        Some(path) => {
            tokio::fs::write(path, json).await?;
            info!("report written to {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}
