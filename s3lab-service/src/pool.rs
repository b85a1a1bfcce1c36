//! Bounded connection pool with occupancy statistics.
//!
//! [`ConnectionPool`] caps the number of simultaneously leased connections
//! using a tokio semaphore. Callers that find the pool exhausted wait up to
//! the configured acquisition timeout and are counted as *pending* while they
//! do. Connections that were opened once stay around as idle keep-alive
//! connections and are reported as *available* until they are leased again.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::error::{Error, Result};

/// Default maximum number of simultaneous connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 150;

/// Largest capacity a pool can be created with.
pub const MAX_CONNECTIONS_LIMIT: usize = Semaphore::MAX_PERMITS;

/// Default time to wait for a pooled connection.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration of a [`ConnectionPool`].
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Maximum number of connections that can be leased at the same time.
    pub max_connections: usize,
    /// How long to wait for a connection before failing with [`Error::PoolTimeout`].
    pub connection_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }
}

/// Instantaneous occupancy of a connection pool.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct PoolStats {
    /// Requests waiting for a connection to become available.
    pub pending: usize,
    /// Opened connections that are currently idle.
    pub available: usize,
    /// Connections currently leased to a request.
    pub leased: usize,
}

/// A bounded pool of connection slots shared by all requests of a client.
///
/// Cloning the pool is cheap and yields a handle to the same slots.
#[derive(Clone, Debug)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    semaphore: Arc<Semaphore>,
    max: usize,
    timeout: Duration,
    pending: AtomicUsize,
    opened: AtomicUsize,
}

impl ConnectionPool {
    /// Creates a new pool with the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if `max_connections` exceeds [`MAX_CONNECTIONS_LIMIT`].
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                semaphore: Arc::new(Semaphore::new(config.max_connections)),
                max: config.max_connections,
                timeout: config.connection_timeout,
                pending: AtomicUsize::new(0),
                opened: AtomicUsize::new(0),
            }),
        }
    }

    /// Returns the maximum number of simultaneously leased connections.
    pub fn capacity(&self) -> usize {
        self.inner.max
    }

    /// Returns the current occupancy of the pool.
    pub fn stats(&self) -> PoolStats {
        let leased = self.leased();
        let opened = self.inner.opened.load(Ordering::Relaxed).max(leased);

        PoolStats {
            pending: self.inner.pending.load(Ordering::Relaxed),
            available: opened - leased,
            leased,
        }
    }

    fn leased(&self) -> usize {
        self.inner.max - self.inner.semaphore.available_permits()
    }

    /// Leases a connection, waiting up to the configured timeout.
    ///
    /// The returned lease remembers the occupancy observed when it was requested. A caller that
    /// has to wait counts itself among the pending requests of that snapshot.
    ///
    /// Returns [`Error::PoolTimeout`] if no connection is returned in time, and
    /// [`Error::Cancelled`] if the pool was closed.
    pub async fn acquire(&self) -> Result<Lease> {
        let stats = self.stats();
        let (permit, requested) = match Arc::clone(&self.inner.semaphore).try_acquire_owned() {
            Ok(permit) => (permit, stats),
            Err(TryAcquireError::Closed) => return Err(Error::Cancelled),
            Err(TryAcquireError::NoPermits) => {
                let _pending = PendingGuard::enter(&self.inner.pending);
                let requested = self.stats();
                let acquire = Arc::clone(&self.inner.semaphore).acquire_owned();
                match tokio::time::timeout(self.inner.timeout, acquire).await {
                    Ok(Ok(permit)) => (permit, requested),
                    Ok(Err(_closed)) => return Err(Error::Cancelled),
                    Err(_elapsed) => {
                        return Err(Error::PoolTimeout {
                            timeout: self.inner.timeout,
                        });
                    }
                }
            }
        };

        self.inner.opened.fetch_max(self.leased(), Ordering::Relaxed);
        Ok(Lease {
            requested,
            _permit: permit,
        })
    }

    /// Closes the pool.
    ///
    /// All pending and future calls to [`acquire`](Self::acquire) fail with
    /// [`Error::Cancelled`]. Outstanding leases remain valid until dropped.
    pub fn close(&self) {
        self.inner.semaphore.close();
    }

    /// Returns `true` if the pool has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.semaphore.is_closed()
    }
}

/// A leased connection slot.
///
/// Dropping the lease returns the connection to the pool as an idle connection.
#[derive(Debug)]
pub struct Lease {
    requested: PoolStats,
    _permit: OwnedSemaphorePermit,
}

impl Lease {
    /// Returns the pool occupancy at the time this lease was requested.
    pub fn requested_stats(&self) -> PoolStats {
        self.requested
    }
}

/// Counts the holder as pending for as long as it is alive.
struct PendingGuard<'a>(&'a AtomicUsize);

impl<'a> PendingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(max_connections: usize) -> ConnectionPool {
        ConnectionPool::new(&PoolConfig {
            max_connections,
            connection_timeout: Duration::from_millis(100),
        })
    }

    #[tokio::test]
    async fn lease_and_release() {
        let pool = pool(2);
        assert_eq!(pool.stats(), PoolStats::default());

        let l1 = pool.acquire().await.unwrap();
        let l2 = pool.acquire().await.unwrap();
        assert_eq!(
            pool.stats(),
            PoolStats {
                pending: 0,
                available: 0,
                leased: 2
            }
        );

        drop(l1);
        assert_eq!(
            pool.stats(),
            PoolStats {
                pending: 0,
                available: 1,
                leased: 1
            }
        );

        drop(l2);
        assert_eq!(
            pool.stats(),
            PoolStats {
                pending: 0,
                available: 2,
                leased: 0
            }
        );
    }

    #[tokio::test]
    async fn idle_connections_are_reused() {
        let pool = pool(4);
        drop(pool.acquire().await.unwrap());
        drop(pool.acquire().await.unwrap());

        // Sequential leases never open more than one connection.
        assert_eq!(pool.stats().available, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_are_pending() {
        let pool = pool(1);
        let lease = pool.acquire().await.unwrap();

        let mut waiting = Box::pin(pool.acquire());
        assert!(futures::poll!(&mut waiting).is_pending());
        assert_eq!(pool.stats().pending, 1);
        assert_eq!(pool.stats().leased, 1);

        drop(lease);
        let lease = waiting.await.unwrap();
        assert_eq!(pool.stats().pending, 0);
        assert_eq!(pool.stats().leased, 1);
        drop(lease);
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_lease_counts_itself_as_pending() {
        let pool = pool(1);
        let lease = pool.acquire().await.unwrap();
        assert_eq!(lease.requested_stats(), PoolStats::default());

        let mut waiting = Box::pin(pool.acquire());
        assert!(futures::poll!(&mut waiting).is_pending());

        drop(lease);
        let lease = waiting.await.unwrap();
        assert_eq!(
            lease.requested_stats(),
            PoolStats {
                pending: 1,
                available: 0,
                leased: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_pool_times_out() {
        let pool = pool(1);
        let _lease = pool.acquire().await.unwrap();

        let result = pool.acquire().await;
        assert!(matches!(result, Err(Error::PoolTimeout { .. })));
        assert_eq!(pool.stats().pending, 0);
    }

    #[tokio::test]
    async fn closed_pool_cancels_waiters() {
        let pool = pool(1);
        let _lease = pool.acquire().await.unwrap();

        let mut waiting = Box::pin(pool.acquire());
        assert!(futures::poll!(&mut waiting).is_pending());

        pool.close();
        assert!(pool.is_closed());
        assert!(matches!(waiting.await, Err(Error::Cancelled)));
        assert!(matches!(pool.acquire().await, Err(Error::Cancelled)));
    }
}
