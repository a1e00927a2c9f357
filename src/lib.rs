pub mod db;
pub mod modules;
pub mod services;

use sea_orm::DatabaseConnection;
use services::admin::{AdminGate, MembershipInfo};
use services::config::TrackingSettings;
use services::notifier::{Notifier, ReplyChannel};
use services::reports::InviteReports;
use services::store::{ConnectionProvider, InviteStore, RetryPolicy};
use services::tracker::InviteTracker;
use std::sync::Arc;

// Custom user data passed to all command functions
#[derive(Clone)]
pub struct Data {
    pub pool: Arc<dyn ConnectionProvider>,
    pub tracker: Arc<InviteTracker>,
    pub reports: Arc<InviteReports>,
    pub notifier: Arc<Notifier>,
    pub settings: Arc<TrackingSettings>,
    pub event_handlers: Arc<Vec<(&'static str, modules::EventHandler)>>,
}

impl Data {
    pub fn new(
        pool: Arc<dyn ConnectionProvider>,
        settings: TrackingSettings,
        replies: Arc<dyn ReplyChannel>,
        membership: Arc<dyn MembershipInfo>,
    ) -> Self {
        let store = Arc::new(InviteStore::new(pool.clone(), RetryPolicy::default()));
        let gate = Arc::new(AdminGate::new(membership));

        Self {
            pool,
            tracker: Arc::new(InviteTracker::new(
                store.clone(),
                settings.attribution,
                settings.reverse_on_leave,
            )),
            reports: Arc::new(InviteReports::new(store, gate, settings.leaderboard_limit)),
            notifier: Arc::new(Notifier::new(replies)),
            settings: Arc::new(settings),
            event_handlers: Arc::new(modules::event_handlers()),
        }
    }

    /// Current database handle, for adapter-owned tables.
    pub fn db(&self) -> DatabaseConnection {
        self.pool.connection()
    }
}

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;
