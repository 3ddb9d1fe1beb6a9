use std::sync::Arc;

use bb8_postgres::bb8::Pool;
use bb8_postgres::tokio_postgres::NoTls;
use bb8_postgres::PostgresConnectionManager;
use clap::Parser;
use dotenv::dotenv;
use tracing::info;

use crate::config::Config;
use crate::controller::AppState;
use crate::notifier::email::Mailer;
use crate::notifier::telegram::TelegramConsole;
use crate::notifier::{LiveChannel, NotificationChannel};
use crate::repositories::memory_repo::MemoryReservationRepo;
use crate::repositories::postgres_repo::PostgresReservationRepo;
use crate::repositories::reservation_repo::ReservationStore;
use crate::workflow::ApprovalCoordinator;

pub mod config;
pub mod controller;
pub mod helpers;
pub mod models;
pub mod notifier;
pub mod repositories;
pub mod workflow;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::parse();

    let store: Arc<dyn ReservationStore> = if config.environment == "local" {
        info!("Running with the in-memory reservation store");
        Arc::new(MemoryReservationRepo::new())
    } else {
        let manager =
            PostgresConnectionManager::new_from_stringlike(&config.database_url, NoTls)?;
        let postgres_connection = Pool::builder().build(manager).await?;
        Arc::new(PostgresReservationRepo::new(postgres_connection))
    };

    let console = Arc::new(TelegramConsole::new(
        &config.telegram_bot_token,
        &config.telegram_chat_id,
    ));
    let mailer = Mailer::new(&config)?;
    let channel: Arc<dyn NotificationChannel> =
        Arc::new(LiveChannel::new(console.clone(), mailer));

    let coordinator = Arc::new(ApprovalCoordinator::new(
        store.clone(),
        channel,
        time::Duration::seconds(config.deny_reply_timeout_secs as i64),
        config.rebook_url_base.clone(),
    ));

    let sweeper = coordinator.clone();
    let sweep_interval = config.expiry_sweep_interval_secs;
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(sweep_interval));
        loop {
            ticker.tick().await;
            let cleared = sweeper.expire_stale_prompts().await;
            if cleared > 0 {
                info!("Cleared {} expired denial prompts", cleared);
            }
        }
    });

    controller::serve(
        AppState {
            coordinator,
            store,
            console,
        },
        &config,
    )
    .await
}
