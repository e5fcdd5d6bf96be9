use std::sync::Arc;

use chrono_tz::Tz;
use screener::{Paginator, RefreshScheduler, SnapshotStore};
use tokio::sync::RwLock;

pub mod command;
pub mod config;
pub mod presence;

pub struct Data {
    pub scheduler: Arc<RwLock<RefreshScheduler>>,
    pub store: Arc<SnapshotStore>,
    pub paginator: Arc<Paginator>,
    pub display_tz: Tz,
}

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;
