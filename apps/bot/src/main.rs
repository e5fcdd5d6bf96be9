use std::{sync::Arc, time::Duration};

use anyhow::{Context as _, Result};
use bot::{
    Data,
    command::scan::{self, scan_command},
    config::{Config, Persistence},
    presence,
};
use poise::{Framework, FrameworkOptions};
use screener::{
    BinanceUniverse, BlobStore, FsBlobStore, Paginator, RedisBlobStore, RefreshScheduler,
    SnapshotStore, TradingViewClient,
};
use serenity::all::{ClientBuilder, FullEvent, GatewayIntents, Interaction};
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const EVICT_EVERY: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().context("invalid configuration")?;

    let persistence: Arc<dyn BlobStore> = match &config.persistence {
        Persistence::Redis { url, key_prefix } => Arc::new(
            RedisBlobStore::new(url, key_prefix.clone())
                .await
                .context("init redis snapshot store failed")?,
        ),
        Persistence::Fs { dir } => Arc::new(FsBlobStore::new(dir)),
    };

    let store = SnapshotStore::new(persistence);
    let restored = store.restore(&config.scheduled()).await;
    info!(restored, "snapshots restored");

    let fetcher = Arc::new(
        TradingViewClient::new(config.tradingview_url.clone(), config.fetch_timeout)
            .context("init indicator client failed")?,
    );
    let universe = Arc::new(
        BinanceUniverse::new(config.binance_url.clone(), config.fetch_timeout)
            .context("init symbol universe client failed")?,
    );

    let mut scheduler = RefreshScheduler::new(
        universe,
        fetcher,
        Arc::clone(&store),
        config.refresh_settings(),
    );
    scheduler.start(&config.intervals);
    let events = scheduler.subscribe();
    let scheduler = Arc::new(RwLock::new(scheduler));

    let paginator = Arc::new(Paginator::new(
        Arc::clone(&store),
        config.paginator_settings(),
    ));

    let evictor = {
        let paginator = Arc::clone(&paginator);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(EVICT_EVERY);
            loop {
                tick.tick().await;
                paginator.evict_idle();
            }
        })
    };

    let intents = GatewayIntents::non_privileged();
    let commands = vec![scan_command()];

    let framework = Framework::builder()
        .options(FrameworkOptions {
            event_handler: |serenity_ctx, event, _framework_ctx, data| {
                Box::pin(async move {
                    if let FullEvent::InteractionCreate { interaction, .. } = event
                        && let Interaction::Component(component) = interaction
                        && let Err(e) = scan::handle_component(serenity_ctx, data, component).await
                    {
                        warn!(error = ?e, "component handling failed");
                    }
                    Ok(())
                })
            },
            commands,
            ..Default::default()
        })
        .setup({
            let scheduler = Arc::clone(&scheduler);
            let store = Arc::clone(&store);
            let paginator = Arc::clone(&paginator);
            let config = config.clone();

            move |ctx, ready, framework| {
                Box::pin(async move {
                    info!(user = %ready.user.name, id = %ready.user.id, "connected successfully");

                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                    tokio::spawn(presence::run(
                        ctx.clone(),
                        Arc::clone(&store),
                        events,
                        config.version.clone(),
                        config.display_tz,
                    ));

                    Ok(Data {
                        scheduler,
                        store,
                        paginator,
                        display_tz: config.display_tz,
                    })
                })
            }
        })
        .build();

    let mut client = ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await
        .context("creating discord client failed")?;
    let shard_manager = client.shard_manager.clone();

    tokio::spawn(async move {
        if let Err(why) = client.start().await {
            error!(error = ?why, "client error");
        }
    });

    shutdown_signal().await;
    info!("shutdown requested");

    evictor.abort();
    scheduler.read().await.request_stop();
    scheduler.write().await.stop().await;
    shard_manager.shutdown_all().await;

    info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::{
            select,
            signal::unix::{SignalKind, signal},
        };
        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(term), Ok(int)) => (term, int),
            _ => {
                warn!("failed to install signal handlers, falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv()  => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
