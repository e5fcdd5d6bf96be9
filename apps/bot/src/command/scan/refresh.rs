use anyhow::bail;
use screener::RefreshError;
use tracing::{error, info};

use super::parse_interval;
use crate::{Context, Error};

/// Refresh one interval's snapshot now instead of waiting for its timer
#[poise::command(slash_command)]
pub async fn refresh(
    ctx: Context<'_>,
    #[description = "Interval (defaults to your selected one)"] interval: Option<String>,
) -> Result<(), Error> {
    ctx.defer().await?;

    let user_id = ctx.author().id.get();
    let data = ctx.data();
    let interval = match parse_interval(interval.as_deref())? {
        Some(i) => i,
        None => data.paginator.selected_interval(user_id),
    };

    info!(user_id, %interval, "manual refresh requested");

    let result = data.scheduler.read().await.refresh_now(interval).await;
    let snapshot = match result {
        Ok(s) => s,
        Err(RefreshError::Unscheduled(i)) => {
            let scheduled = data.scheduler.read().await.intervals();
            bail!(
                "{i} is not refreshed by this bot. Scheduled: {}.",
                scheduled
                    .iter()
                    .map(|i| i.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        Err(e) => {
            error!(user_id, %interval, error = %e, "manual refresh failed");
            bail!("Refresh of {interval} failed: {e}");
        }
    };

    let took = snapshot.completed_at - snapshot.started_at;
    info!(
        user_id,
        %interval,
        rows = snapshot.len(),
        skipped = snapshot.skipped(),
        "manual refresh done"
    );
    ctx.say(format!(
        "✅ {interval} refreshed: {} symbols ({} skipped) in {}s.",
        snapshot.len(),
        snapshot.skipped(),
        took.num_seconds()
    ))
    .await?;

    Ok(())
}
