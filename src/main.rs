use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::audio::registry::GuildRegistry;
use crate::bot::KronosBot;
use crate::config::Config;
use crate::sources::{TrackResolver, YtDlpExtractor};
use crate::ui::ChannelAnnouncer;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kronos_music=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting Kronos v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(Config::load()?);
    let extractor = YtDlpExtractor::new(config.ytdlp_path.clone());

    if std::env::args().any(|arg| arg == "--health-check") {
        let version = extractor.verify().await?;
        println!("OK (yt-dlp {})", version);
        return Ok(());
    }

    info!("{}", config.summary());

    match extractor.verify().await {
        Ok(version) => info!("✅ yt-dlp {} available", version),
        Err(e) => warn!("⚠️ yt-dlp check failed, /play will not work: {:?}", e),
    }

    // Voice states are needed to find the invoker's channel
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let announcer = Arc::new(ChannelAnnouncer::new(Arc::new(Http::new(&config.discord_token))));
    let registry = Arc::new(GuildRegistry::new(config.player_settings(), announcer));
    let resolver = TrackResolver::new(Arc::new(extractor));
    let handler = KronosBot::new(config.clone(), registry.clone(), resolver);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Could not listen for Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, closing...");
        registry.shutdown().await;
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
