use std::{env::var, time::Duration};

use anyhow::{Context as _, Result, bail};
use chrono_tz::Tz;
use screener::{
    BINANCE_FAPI_URL, Interval, IntervalConfig, PaginatorSettings, RefreshSettings,
    TRADINGVIEW_SCAN_URL,
};

const DEFAULT_INTERVALS: &str = "5m,15m,1h,4h,1d";
/// Largest page that still renders inside one Discord message.
pub const MAX_PAGE_SIZE: usize = 25;

#[derive(Clone, Debug)]
pub enum Persistence {
    Fs { dir: String },
    Redis { url: String, key_prefix: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub discord_token: String,
    pub version: String,
    pub intervals: Vec<IntervalConfig>,
    pub default_interval: Interval,
    pub page_size: usize,
    pub backoff: Duration,
    pub fetch_timeout: Duration,
    pub universe_limit: Option<usize>,
    pub session_idle: Duration,
    pub persistence: Persistence,
    pub tradingview_url: String,
    pub binance_url: String,
    pub display_tz: Tz,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let discord_token = get("DISCORD_TOKEN").context("DISCORD_TOKEN not set")?;

        let mut intervals = Vec::new();
        let raw = get("SCAN_INTERVALS").unwrap_or_else(|| DEFAULT_INTERVALS.to_string());
        for id in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let interval: Interval = id.parse().with_context(|| format!("SCAN_INTERVALS: {id}"))?;
            if intervals.iter().any(|c: &IntervalConfig| c.interval == interval) {
                continue;
            }

            let key = format!("SCAN_PERIOD_{}", interval.as_str().to_ascii_uppercase());
            let config = match parse::<u64>(&get, &key)? {
                Some(0) => bail!("{key} must be positive"),
                Some(secs) => IntervalConfig::new(interval).with_period(Duration::from_secs(secs)),
                None => IntervalConfig::new(interval),
            };
            intervals.push(config);
        }
        if intervals.is_empty() {
            bail!("SCAN_INTERVALS is empty");
        }

        let scheduled = |i: Interval| intervals.iter().any(|c| c.interval == i);
        let default_interval = match get("DEFAULT_INTERVAL") {
            Some(v) => {
                let interval: Interval = v.parse().context("DEFAULT_INTERVAL")?;
                if !scheduled(interval) {
                    bail!("DEFAULT_INTERVAL {interval} is not in SCAN_INTERVALS");
                }
                interval
            }
            None if scheduled(Interval::Minute15) => Interval::Minute15,
            None => intervals[0].interval,
        };

        let page_size = parse(&get, "PAGE_SIZE")?.unwrap_or(10);
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            bail!("PAGE_SIZE must be between 1 and {MAX_PAGE_SIZE}");
        }

        let persistence = match get("REDIS_URL") {
            Some(url) => Persistence::Redis {
                url,
                key_prefix: get("REDIS_KEY_PREFIX").unwrap_or_else(|| "screener".to_string()),
            },
            None => Persistence::Fs {
                dir: get("SNAPSHOT_DIR").unwrap_or_else(|| ".".to_string()),
            },
        };

        let display_tz = match get("DISPLAY_TZ") {
            Some(tz) => tz
                .parse::<Tz>()
                .map_err(|e| anyhow::anyhow!("DISPLAY_TZ: {e}"))?,
            None => chrono_tz::Europe::Istanbul,
        };

        Ok(Self {
            discord_token,
            version: get("APP_VERSION").unwrap_or_else(|| "Unknown".to_string()),
            intervals,
            default_interval,
            page_size,
            backoff: Duration::from_secs(parse(&get, "REFRESH_BACKOFF_SECS")?.unwrap_or(60)),
            fetch_timeout: Duration::from_secs(parse(&get, "FETCH_TIMEOUT_SECS")?.unwrap_or(15)),
            universe_limit: parse(&get, "UNIVERSE_LIMIT")?,
            session_idle: Duration::from_secs(parse(&get, "SESSION_IDLE_SECS")?.unwrap_or(1800)),
            persistence,
            tradingview_url: get("TRADINGVIEW_SCAN_URL")
                .unwrap_or_else(|| TRADINGVIEW_SCAN_URL.to_string()),
            binance_url: get("BINANCE_FAPI_URL").unwrap_or_else(|| BINANCE_FAPI_URL.to_string()),
            display_tz,
        })
    }

    pub fn refresh_settings(&self) -> RefreshSettings {
        RefreshSettings {
            fetch_timeout: self.fetch_timeout,
            universe_limit: self.universe_limit,
            backoff: self.backoff,
        }
    }

    pub fn paginator_settings(&self) -> PaginatorSettings {
        PaginatorSettings {
            page_size: self.page_size,
            default_interval: self.default_interval,
            idle_ttl: self.session_idle,
        }
    }

    pub fn scheduled(&self) -> Vec<Interval> {
        self.intervals.iter().map(|c| c.interval).collect()
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    get(key)
        .map(|v| v.trim().parse::<T>().with_context(|| format!("{key}: `{v}`")))
        .transpose()
}
