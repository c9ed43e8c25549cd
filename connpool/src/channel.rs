// Copyright 2024 Cloudflare, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The pool backed by a bounded lock free queue

use connpool_error::{Error, ErrorType::*, Result};
use crossbeam_queue::ArrayQueue;
use log::{debug, trace, warn};
use parking_lot::RwLock;
use std::sync::Arc;

use crate::conf::PoolConf;
use crate::connection::{Connection, PooledConnection};
use crate::Pool;

/// The function a pool calls to create a new connection
pub type Factory<C> = Arc<dyn Fn() -> Result<C> + Send + Sync>;

// The idle queue and the factory, only present while the pool is open
struct Shared<C> {
    idle: Arc<ArrayQueue<C>>,
    factory: Factory<C>,
}

// derive(Clone) would require C: Clone
impl<C> Clone for Shared<C> {
    fn clone(&self) -> Self {
        Shared {
            idle: self.idle.clone(),
            factory: self.factory.clone(),
        }
    }
}

pub(crate) struct PoolInner<C: Connection> {
    // None once the pool is closed, never Some again
    shared: RwLock<Option<Shared<C>>>,
    max_cap: usize,
}

impl<C: Connection> PoolInner<C> {
    // The read side never waits behind a pending close() so that acquire and release are only
    // ever blocked for the instant of the swap.
    fn snapshot(&self) -> Option<Shared<C>> {
        self.shared.read_recursive().clone()
    }

    /// Put a connection back to the idle queue, or close it if the pool is closed or full
    pub(crate) fn put(&self, conn: Option<C>) -> Result<()> {
        let Some(conn) = conn else {
            return Error::e_explain(InvalidConnection, "connection is absent, rejecting");
        };

        // held until the push is done so that close() cannot drain before it
        let shared = self.shared.read_recursive();
        let Some(current) = shared.as_ref() else {
            debug!("connection released to a closed pool, close it");
            let mut conn = conn;
            return conn.close();
        };

        match current.idle.push(conn) {
            Ok(()) => Ok(()),
            Err(mut conn) => {
                debug!("idle queue is full ({}), close the connection", self.max_cap);
                conn.close()
            }
        }
        // read lock released here
    }

    fn shutdown(&self) {
        let shared = self.shared.write().take();
        // write lock released here

        let Some(shared) = shared else {
            return;
        };
        // pushes only happen under the read lock on a live slot, so the queue takes no new entries
        let mut closed = 0;
        while let Some(mut conn) = shared.idle.pop() {
            if let Err(e) = conn.close() {
                warn!("fail to close idle connection: {e}");
            }
            closed += 1;
        }
        debug!("pool closed, {closed} idle connections closed");
    }
}

impl<C: Connection> Drop for PoolInner<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Connection pool backed by a bounded queue of idle connections
///
/// At most `max_cap` connections are kept idle. [Pool::acquire()] never waits: when no idle
/// connection is available a new one is created by the factory, so the number of connections in
/// use is not bounded.
///
/// The handle is cheap to clone. The pool is closed by [Pool::close()] or when the last handle is
/// dropped.
pub struct ChannelPool<C: Connection> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Connection> Clone for ChannelPool<C> {
    fn clone(&self) -> Self {
        ChannelPool {
            inner: self.inner.clone(),
        }
    }
}

impl<C: Connection> ChannelPool<C> {
    /// Create a new [ChannelPool] with `initial_cap` connections already created.
    ///
    /// Fails with [InvalidCapacity] unless `0 < initial_cap <= max_cap`. If the factory fails
    /// while filling the pool, every connection created so far is closed and
    /// [FactoryFailure] is returned with the factory error as the cause.
    pub fn new<F>(initial_cap: usize, max_cap: usize, factory: F) -> Result<Self>
    where
        F: Fn() -> Result<C> + Send + Sync + 'static,
    {
        if initial_cap == 0 || max_cap == 0 || initial_cap > max_cap {
            return Error::e_explain(
                InvalidCapacity,
                format!("invalid capacity settings, initial: {initial_cap}, max: {max_cap}"),
            );
        }

        let factory: Factory<C> = Arc::new(factory);
        let pool = ChannelPool {
            inner: Arc::new(PoolInner {
                shared: RwLock::new(Some(Shared {
                    idle: Arc::new(ArrayQueue::new(max_cap)),
                    factory: factory.clone(),
                })),
                max_cap,
            }),
        };

        for _ in 0..initial_cap {
            let conn = match factory() {
                Ok(c) => c,
                Err(e) => {
                    pool.close();
                    return Error::e_because(
                        FactoryFailure,
                        "factory is not able to fill the pool",
                        e,
                    );
                }
            };
            pool.inner.put(Some(conn))?;
        }
        debug!("pool created with {initial_cap} of {max_cap} connections");
        Ok(pool)
    }

    /// Create a new [ChannelPool] with the capacities from the given [PoolConf]
    pub fn from_conf<F>(conf: &PoolConf, factory: F) -> Result<Self>
    where
        F: Fn() -> Result<C> + Send + Sync + 'static,
    {
        Self::new(conf.initial_capacity, conf.max_capacity, factory)
    }

    /// The maximum number of idle connections
    pub fn max_capacity(&self) -> usize {
        self.inner.max_cap
    }

    /// Whether [Pool::close()] has been called
    pub fn is_closed(&self) -> bool {
        self.inner.shared.read_recursive().is_none()
    }

    fn wrap(&self, conn: C) -> PooledConnection<C> {
        PooledConnection::new(conn, Arc::downgrade(&self.inner))
    }
}

impl<C: Connection> Pool for ChannelPool<C> {
    type Conn = PooledConnection<C>;

    fn acquire(&self) -> Result<PooledConnection<C>> {
        let Some(shared) = self.inner.snapshot() else {
            return Error::e_explain(PoolClosed, "acquire from a closed pool");
        };

        if let Some(conn) = shared.idle.pop() {
            trace!("reuse idle connection");
            return Ok(self.wrap(conn));
        }
        trace!("no idle connection, create a new one");
        // factory errors are passed through untouched
        let conn = (shared.factory)()?;
        Ok(self.wrap(conn))
    }

    fn close(&self) {
        self.inner.shutdown();
    }

    fn count(&self) -> usize {
        self.inner
            .shared
            .read_recursive()
            .as_ref()
            .map_or(0, |s| s.idle.len())
    }
}

impl<C: Connection> std::fmt::Debug for ChannelPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelPool")
            .field("idle", &self.count())
            .field("max_cap", &self.inner.max_cap)
            .finish()
    }
}
