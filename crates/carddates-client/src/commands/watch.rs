//! `carddates watch`.

use std::sync::Arc;

use carddates_providers::DatesProvider;
use carddates_server::{DateSnapshot, DateStore, Poller, Scheduler};
use chrono::{Local, NaiveDate};
use tracing::{info, warn};

use crate::cli::WatchArgs;
use crate::config::ClientConfig;
use crate::error::ClientResult;

use super::dates::{format_output, within};

/// Polls until Ctrl-C, printing the window after every successful cycle.
pub async fn run(config: &ClientConfig, args: WatchArgs) -> ClientResult<()> {
    let provider: Arc<dyn DatesProvider> = Arc::new(super::build_provider(config)?);

    let mut poll = config.poll.clone();
    if let Some(secs) = args.interval {
        poll.interval_secs = secs;
    }
    let scheduler = Scheduler::new(poll.to_scheduler_config()?);
    let days = args.days.unwrap_or(config.display.days_ahead);

    let store = Arc::new(DateStore::new());
    let mut updates = store.subscribe();
    let (handle, task) = Poller::new(provider, store.clone()).spawn(scheduler);

    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = store.snapshot().await;
                let today = Local::now().date_naive();
                println!("{}", render_update(&snapshot, today, days, config)?);
            }
            _ = &mut interrupted => {
                info!("Interrupted");
                break;
            }
        }
    }

    let _ = handle.stop().await;
    if let Err(e) = task.await {
        warn!(error = %e, "Poller task ended abnormally");
    }
    Ok(())
}

fn render_update(
    snapshot: &DateSnapshot,
    today: NaiveDate,
    days: i64,
    config: &ClientConfig,
) -> ClientResult<String> {
    let header = match snapshot.updated_at {
        Some(at) => format!(
            "# dates: {}, updated {}",
            snapshot.dates.len(),
            at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        ),
        None => format!("# dates: {}", snapshot.dates.len()),
    };
    let body = format_output(
        &within(&snapshot.dates, today, days),
        today,
        &config.display,
        false,
        config.display.limit,
    )?;
    Ok(format!("{header}\n{body}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use carddates_core::ContactDate;

    #[test]
    fn update_block() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let snapshot = DateSnapshot {
            dates: vec![ContactDate::new(
                "Jane Doe",
                NaiveDate::from_ymd_opt(1990, 10, 21).unwrap(),
                Some(1990),
                "bday",
            )],
            ..Default::default()
        };
        let output = render_update(&snapshot, today, 7, &ClientConfig::default()).unwrap();
        insta::assert_snapshot!(output, @r"
        # dates: 1
        2026-10-21  Jane Doe turns 36  (in 2 days)
        ");
    }
}
