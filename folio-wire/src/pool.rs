use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use folio_errors::FolioError;

use crate::client::{Credentials, WireClient};

/// Configuration for a [`ConnPool`].
#[derive(Clone, Debug)]
pub struct PoolConfig {
    pub endpoint: String,
    pub db: Option<u32>,
    pub credentials: Option<Credentials>,
    pub size: usize,
    pub connect_timeout: Duration,
    pub receive_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            endpoint: "127.0.0.1:6379".to_owned(),
            db: None,
            credentials: None,
            size: 8,
            connect_timeout: Duration::from_secs(5),
            receive_timeout: Duration::from_secs(5),
        }
    }
}

/// A bounded free-list of [`WireClient`]s. Checkout blocks on a semaphore
/// rather than growing the pool under load (§4.2 "bounded pool, no
/// unbounded fan-out"); a checked-out connection that fails a liveness
/// probe on return is dropped rather than recycled.
pub struct ConnPool {
    config: PoolConfig,
    free: Mutex<Vec<WireClient>>,
    permits: Semaphore,
    closed: Mutex<bool>,
}

impl ConnPool {
    pub fn new(config: PoolConfig) -> Arc<Self> {
        let permits = Semaphore::new(config.size);
        Arc::new(ConnPool {
            config,
            free: Mutex::new(Vec::new()),
            permits,
            closed: Mutex::new(false),
        })
    }

    /// Runs `f` against a checked-out connection, returning it to the pool
    /// afterwards unless `f` itself reports a transport-level failure (in
    /// which case the connection is dropped instead of recycled).
    ///
    /// `f` returns a boxed future rather than a plain generic one: a closure
    /// borrowing its `&mut WireClient` argument for the call's own lifetime
    /// can't be expressed with an unparameterized associated future type,
    /// so callers build their body with `Box::pin(async move { .. })`.
    pub async fn with_conn<T, F>(&self, f: F) -> Result<T, FolioError>
    where
        F: for<'c> FnOnce(
            &'c mut WireClient,
        )
            -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<T, FolioError>> + Send + 'c>>,
    {
        if *self.closed.lock() {
            return Err(FolioError::PoolClosed);
        }
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FolioError::PoolClosed)?;
        let mut conn = self.checkout().await?;
        let result = f(&mut conn).await;
        match &result {
            Err(FolioError::Transport(_)) => {
                warn!(endpoint = %self.config.endpoint, "dropping connection after transport error");
            }
            _ => self.checkin(conn),
        }
        result
    }

    async fn checkout(&self) -> Result<WireClient, FolioError> {
        if let Some(conn) = self.free.lock().pop() {
            return Ok(conn);
        }
        debug!(endpoint = %self.config.endpoint, "opening new pooled connection");
        WireClient::open(
            &self.config.endpoint,
            self.config.db,
            self.config.credentials.clone(),
            self.config.connect_timeout,
            self.config.receive_timeout,
        )
        .await
    }

    fn checkin(&self, conn: WireClient) {
        self.free.lock().push(conn);
    }

    /// Pings every free connection and replaces any that fail (§4.2). A
    /// checked-out connection is never probed here: it's either in active
    /// use or will be probed the next time it's idle in the free list.
    pub async fn check_health(&self) -> Result<(), FolioError> {
        let free = std::mem::take(&mut *self.free.lock());
        let mut healthy = Vec::with_capacity(free.len());
        for mut conn in free {
            if conn.ping().await.is_ok() {
                healthy.push(conn);
                continue;
            }
            warn!(endpoint = %self.config.endpoint, "replacing connection that failed its liveness check");
            match WireClient::open(
                &self.config.endpoint,
                self.config.db,
                self.config.credentials.clone(),
                self.config.connect_timeout,
                self.config.receive_timeout,
            )
            .await
            {
                Ok(replacement) => healthy.push(replacement),
                Err(e) => warn!(endpoint = %self.config.endpoint, error = %e, "failed to open a replacement connection"),
            }
        }
        self.free.lock().extend(healthy);
        Ok(())
    }

    /// Marks the pool closed: further [`Self::with_conn`] calls fail fast
    /// with [`FolioError::PoolClosed`]. Connections already free-listed are
    /// simply dropped.
    pub fn close(&self) {
        *self.closed.lock() = true;
        self.free.lock().clear();
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    pub fn size(&self) -> usize {
        self.config.size
    }
}
