use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

pub mod entities;
pub mod migrations;

/// Pool settings used by the bot. SSL and pooling details beyond these are left
/// to the connection URL.
pub fn connect_options(database_url: &str, max_connections: u32) -> ConnectOptions {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(false);
    opt
}

pub async fn establish_connection(
    options: ConnectOptions,
) -> Result<DatabaseConnection, sea_orm::DbErr> {
    info!("Connecting to database...");
    let db = Database::connect(options).await?;
    info!("Database connection established");

    Ok(db)
}
