use poise::CreateReply;

use super::render::status_lines;
use crate::{Context, Error};

/// Row counts and last refresh time per interval
#[poise::command(slash_command)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    let user_id = ctx.author().id.get();

    let scheduled = data.scheduler.read().await.intervals();
    let text = format!(
        "Selected interval: **{}**\n{}",
        data.paginator.selected_interval(user_id),
        status_lines(&data.store.status(), &scheduled, data.display_tz)
    );

    ctx.send(CreateReply::default().content(text).ephemeral(true))
        .await?;

    Ok(())
}
