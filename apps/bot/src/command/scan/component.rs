use poise::serenity_prelude as serenity;
use screener::Interval;
use tracing::{debug, info, warn};

use super::{
    interval::{SELECT_PREFIX, interval_menu},
    render::{PAGE_PREFIX, page_buttons, page_content, page_error, parse_page_id},
};
use crate::{Data, Error};

/// Pagination buttons and the interval select menu. Ids carry the owner's
/// user id; anyone else gets an ephemeral refusal. Page ids also carry the
/// result id, so buttons on a message from an older query are refused.
pub async fn handle_component(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &serenity::ComponentInteraction,
) -> Result<(), Error> {
    let id = interaction.data.custom_id.as_str();
    let user_id = interaction.user.id.get();

    debug!(user_id, custom_id = id, "component received");

    if id.starts_with(PAGE_PREFIX) {
        let Some((owner, result_id, page)) = parse_page_id(id) else {
            warn!(user_id, custom_id = id, "malformed page id");
            return Ok(());
        };
        if owner != user_id {
            return refuse(ctx, interaction, "Only the person who ran this query can page it.").await;
        }

        return match data.paginator.goto_result(user_id, result_id, page) {
            Ok(view) => {
                debug!(user_id, page, total_pages = view.total_pages, "page turned");
                update(
                    ctx,
                    interaction,
                    page_content(None, &view, data.display_tz),
                    page_buttons(&view, user_id),
                )
                .await
            }
            Err(e) => {
                info!(user_id, result_id, page, error = %e, "page request rejected");
                refuse(ctx, interaction, &page_error(&e)).await
            }
        };
    }

    if let Some(owner) = id.strip_prefix(SELECT_PREFIX) {
        if owner != user_id.to_string() {
            return refuse(ctx, interaction, "Use `/scan interval` to pick your own interval.").await;
        }

        let chosen = match &interaction.data.kind {
            serenity::ComponentInteractionDataKind::StringSelect { values } => {
                values.first().and_then(|v| v.parse::<Interval>().ok())
            }
            _ => None,
        };
        let Some(interval) = chosen else {
            debug!(user_id, "empty interval selection");
            return Ok(());
        };

        data.paginator.select_interval(user_id, interval);
        info!(user_id, %interval, "interval selected");

        return update(
            ctx,
            interaction,
            format!("Interval set to **{interval}**."),
            vec![interval_menu(user_id, interval)],
        )
        .await;
    }

    Ok(())
}

async fn update(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    content: String,
    components: Vec<serenity::CreateActionRow>,
) -> Result<(), Error> {
    interaction
        .create_response(
            ctx,
            serenity::CreateInteractionResponse::UpdateMessage(
                serenity::CreateInteractionResponseMessage::new()
                    .content(content)
                    .components(components),
            ),
        )
        .await?;
    Ok(())
}

async fn refuse(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    text: &str,
) -> Result<(), Error> {
    interaction
        .create_response(
            ctx,
            serenity::CreateInteractionResponse::Message(
                serenity::CreateInteractionResponseMessage::new()
                    .content(text)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}
