use anyhow::Context as _;
use clap::Parser as _;
use dotenvy::dotenv;
use invite_tally::db;
use invite_tally::modules::{self, invite_tracking::platform};
use invite_tally::services::config::TrackingSettings;
use invite_tally::services::store::{ConnectionProvider, ReconnectingPool};
use invite_tally::Data;
use poise::serenity_prelude as serenity;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Discord bot token.
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    token: String,

    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 10)]
    db_max_connections: u32,

    /// Prefix for text commands.
    #[arg(long, env = "COMMAND_PREFIX", default_value = "!")]
    prefix: String,

    /// Take an invite back off the inviter's count when the invitee leaves.
    #[arg(long, env = "REVERSE_ON_LEAVE")]
    reverse_on_leave: bool,

    /// Record joins of bot accounts too.
    #[arg(long, env = "TRACK_BOTS")]
    track_bots: bool,

    /// JSON overrides for reply expiry, e.g. `{"leaderboard_secs": 60}`.
    #[arg(long, env = "REPLY_EXPIRY")]
    reply_expiry: Option<String>,

    /// Rollback the specified number of migrations and run all migrations again.
    #[arg(long, num_args = 0..=1, default_missing_value = "1")]
    refresh_migrations: Option<u32>,
}

impl Args {
    fn settings(&self) -> anyhow::Result<TrackingSettings> {
        let mut settings = TrackingSettings::default();
        settings.reverse_on_leave = self.reverse_on_leave;
        settings.attribution.skip_bots = !self.track_bots;

        if let Some(json) = &self.reply_expiry {
            settings = settings
                .with_expiry_json(json)
                .context("Invalid REPLY_EXPIRY")?;
        }

        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting invite tally bot...");

    let settings = args.settings()?;

    let pool = ReconnectingPool::connect(db::connect_options(
        &args.database_url,
        args.db_max_connections,
    ))
    .await
    .context("Failed to connect to database")?;

    // Run migrations
    let conn = pool.connection();
    if let Some(depth) = args.refresh_migrations {
        info!("Refreshing migrations (down {}, then up)...", depth);
        db::migrations::Migrator::down(&conn, Some(depth))
            .await
            .context("Failed to rollback migration")?;
    }

    db::migrations::Migrator::up(&conn, None)
        .await
        .context("Failed to run migrations")?;

    if args.refresh_migrations.is_some() {
        info!("Migrations refreshed successfully.");
        pool.close().await?;
        return Ok(());
    }

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_INVITES
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let http = Arc::new(serenity::Http::new(&args.token));
    let data = Data::new(
        Arc::new(pool.clone()),
        settings,
        Arc::new(platform::SerenityReplies::new(http.clone())),
        Arc::new(platform::SerenityMembership::new(http)),
    );
    let notifier = data.notifier.clone();

    for module in modules::definitions() {
        info!("Loaded module {} ({})", module.name, module.id);
    }

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: modules::commands(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(args.prefix.clone()),
                ..Default::default()
            },
            event_handler: invite_tally::services::event_manager::handler,
            ..Default::default()
        })
        .setup(move |_ctx, ready, _framework| {
            Box::pin(async move {
                info!("Serving {} guilds", ready.guilds.len());
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&args.token, intents)
        .framework(framework)
        .await
        .context("Failed to create client")?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {:?}", e);
            return;
        }
        info!("Shutting down...");
        notifier.shutdown();
        shard_manager.shutdown_all().await;
    });

    info!("Bot is ready!");
    client.start_autosharded().await.context("Client error")?;

    pool.close().await?;
    Ok(())
}
