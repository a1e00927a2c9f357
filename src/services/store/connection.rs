use sea_orm::{ConnectOptions, DatabaseConnection, DbErr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Hands the store a database handle and repairs it when the store reports it lost.
pub trait ConnectionProvider: Send + Sync {
    fn connection(&self) -> DatabaseConnection;

    /// Starts re-establishing the connection in the background. Must not block.
    fn reconnect(&self);
}

/// A fixed handle. Reconnecting is left to the pool itself.
impl ConnectionProvider for DatabaseConnection {
    fn connection(&self) -> DatabaseConnection {
        self.clone()
    }

    fn reconnect(&self) {}
}

/// Connection pool that can be swapped out for a fresh one after a connection failure.
#[derive(Clone)]
pub struct ReconnectingPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    current: RwLock<DatabaseConnection>,
    options: ConnectOptions,
    reconnecting: AtomicBool,
}

impl ReconnectingPool {
    pub async fn connect(options: ConnectOptions) -> Result<Self, DbErr> {
        let db = crate::db::establish_connection(options.clone()).await?;

        Ok(Self {
            inner: Arc::new(PoolInner {
                current: RwLock::new(db),
                options,
                reconnecting: AtomicBool::new(false),
            }),
        })
    }

    pub async fn close(&self) -> Result<(), DbErr> {
        info!("Closing database connection");
        self.connection().close().await
    }
}

impl ConnectionProvider for ReconnectingPool {
    fn connection(&self) -> DatabaseConnection {
        match self.inner.current.read() {
            Ok(db) => db.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn reconnect(&self) {
        if self.inner.reconnecting.swap(true, Ordering::AcqRel) {
            return;
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            warn!("Database connection lost, reconnecting...");
            match crate::db::establish_connection(inner.options.clone()).await {
                Ok(db) => {
                    let mut current = match inner.current.write() {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    *current = db;
                    info!("Database reconnected");
                }
                Err(e) => {
                    warn!("Database reconnect failed: {}", e);
                }
            }
            inner.reconnecting.store(false, Ordering::Release);
        });
    }
}
