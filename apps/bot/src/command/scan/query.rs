use poise::CreateReply;
use tracing::{info, warn};

use super::{
    parse_interval,
    render::{page_buttons, page_content, page_error},
};
use crate::{Context, Error};

/// Filter the latest snapshot, e.g. `rsi <= 30 and adx > 25`
#[poise::command(slash_command)]
pub async fn query(
    ctx: Context<'_>,
    #[description = "Filter expression, e.g. rsi < 30 and close > ema200"] expression: String,
    #[description = "Interval (defaults to your selected one)"] interval: Option<String>,
) -> Result<(), Error> {
    let user_id = ctx.author().id.get();
    let interval = parse_interval(interval.as_deref())?;
    let data = ctx.data();

    info!(user_id, %expression, ?interval, "scan query");

    match data.paginator.new_query(user_id, interval, &expression) {
        Ok(view) => {
            info!(
                user_id,
                interval = %view.interval,
                total_rows = view.total_rows,
                "query matched"
            );
            ctx.send(
                CreateReply::default()
                    .content(page_content(None, &view, data.display_tz))
                    .components(page_buttons(&view, user_id)),
            )
            .await?;
        }
        Err(e) => {
            warn!(user_id, %expression, error = %e, "query rejected");
            ctx.send(
                CreateReply::default()
                    .content(page_error(&e))
                    .ephemeral(true),
            )
            .await?;
        }
    }

    Ok(())
}
