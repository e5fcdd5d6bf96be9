mod component;
mod interval;
mod query;
mod refresh;
mod render;
mod signals;
mod status;

use anyhow::bail;
use screener::Interval;

use crate::{Context, Error};
pub use component::handle_component;
use interval::interval;
use query::query;
use refresh::refresh;
use signals::signals;
use status::status;

#[poise::command(
    slash_command,
    rename = "scan",
    subcommands("refresh", "query", "signals", "interval", "status")
)]
pub async fn scan_command(_: Context<'_>) -> Result<(), Error> {
    Ok(())
}

fn parse_interval(raw: Option<&str>) -> Result<Option<Interval>, Error> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(id) => match id.parse() {
            Ok(interval) => Ok(Some(interval)),
            Err(_) => bail!(
                "Unknown interval `{id}`. Use one of: {}.",
                Interval::ALL.map(|i| i.as_str()).join(", ")
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_argument() {
        assert_eq!(parse_interval(None).unwrap(), None);
        assert_eq!(parse_interval(Some("  ")).unwrap(), None);
        assert_eq!(parse_interval(Some("4H")).unwrap(), Some(Interval::Hour4));

        let err = parse_interval(Some("2d")).unwrap_err().to_string();
        assert!(err.starts_with("Unknown interval `2d`"));
        assert!(err.contains("1m, 5m, 15m"));
    }
}
