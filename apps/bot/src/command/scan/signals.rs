use poise::CreateReply;
use screener::Signal;
use tracing::{info, warn};

use super::{
    parse_interval,
    render::{page_buttons, page_content, page_error},
};
use crate::{Context, Error};

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum SignalKind {
    #[name = "oversold"]
    Oversold,
    #[name = "overbought"]
    Overbought,
    #[name = "strong_trend"]
    StrongTrend,
}

impl From<SignalKind> for Signal {
    fn from(kind: SignalKind) -> Self {
        match kind {
            SignalKind::Oversold => Signal::Oversold,
            SignalKind::Overbought => Signal::Overbought,
            SignalKind::StrongTrend => Signal::StrongTrend,
        }
    }
}

/// Built-in screens: RSI extremes and strong ADX trends
#[poise::command(slash_command)]
pub async fn signals(
    ctx: Context<'_>,
    #[description = "Which screen to run"] kind: SignalKind,
    #[description = "Interval (defaults to your selected one)"] interval: Option<String>,
) -> Result<(), Error> {
    let user_id = ctx.author().id.get();
    let interval = parse_interval(interval.as_deref())?;
    let signal = Signal::from(kind);
    let data = ctx.data();

    info!(user_id, %signal, ?interval, "scan signals");

    let reply = match data.paginator.signal(user_id, interval, signal) {
        Ok(view) => CreateReply::default()
            .content(page_content(
                Some(signal_title(signal)),
                &view,
                data.display_tz,
            ))
            .components(page_buttons(&view, user_id)),
        Err(e) => {
            warn!(user_id, %signal, error = %e, "signal scan failed");
            CreateReply::default()
                .content(page_error(&e))
                .ephemeral(true)
        }
    };
    ctx.send(reply).await?;

    Ok(())
}

fn signal_title(signal: Signal) -> &'static str {
    match signal {
        Signal::Oversold => "📉 Oversold (RSI ≤ 30)",
        Signal::Overbought => "📈 Overbought (RSI ≥ 70)",
        Signal::StrongTrend => "💪 Strong trend (ADX > 45)",
    }
}
