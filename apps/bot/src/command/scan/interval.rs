use poise::CreateReply;
use screener::Interval;
use serenity::all::{
    CreateActionRow, CreateSelectMenu, CreateSelectMenuKind, CreateSelectMenuOption,
};
use tracing::info;

use super::parse_interval;
use crate::{Context, Error};

pub const SELECT_PREFIX: &str = "scan_interval:";

pub fn select_id(owner: u64) -> String {
    format!("{SELECT_PREFIX}{owner}")
}

pub fn interval_menu(owner: u64, current: Interval) -> CreateActionRow {
    let options = Interval::ALL
        .into_iter()
        .map(|i| CreateSelectMenuOption::new(i.as_str(), i.as_str()).default_selection(i == current))
        .collect();

    CreateActionRow::SelectMenu(
        CreateSelectMenu::new(select_id(owner), CreateSelectMenuKind::String { options })
            .placeholder("Choose interval...")
            .min_values(1)
            .max_values(1),
    )
}

/// Choose the interval your queries run against
#[poise::command(slash_command)]
pub async fn interval(
    ctx: Context<'_>,
    #[description = "Interval, e.g. 15m, 1h, 4h (omit to pick from a menu)"] interval: Option<
        String,
    >,
) -> Result<(), Error> {
    let user_id = ctx.author().id.get();
    let paginator = &ctx.data().paginator;

    match parse_interval(interval.as_deref())? {
        Some(interval) => {
            paginator.select_interval(user_id, interval);
            info!(user_id, %interval, "interval selected");
            ctx.send(
                CreateReply::default()
                    .content(format!("Interval set to **{interval}**."))
                    .ephemeral(true),
            )
            .await?;
        }
        None => {
            let current = paginator.selected_interval(user_id);
            ctx.send(
                CreateReply::default()
                    .content(format!("Current interval: **{current}**"))
                    .components(vec![interval_menu(user_id, current)])
                    .ephemeral(true),
            )
            .await?;
        }
    }

    Ok(())
}
