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

//! Raw connections and the wrapper handed out by the pool

use connpool_error::{Error, ErrorType::*, Result};
use log::debug;
use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::ops::{Deref, DerefMut};
use std::sync::Weak;

use crate::channel::PoolInner;

/// A raw connection that can be pooled
///
/// The pool never reads or writes the connection, it only needs a way to really close it.
pub trait Connection: Send {
    /// Close the connection for real.
    ///
    /// Closing an already closed connection should be a no-op returning `Ok`.
    fn close(&mut self) -> Result<()>;
}

fn shutdown_result(res: io::Result<()>, context: &'static str) -> Result<()> {
    match res {
        Ok(()) => Ok(()),
        // already shut down, either by us or by the peer
        Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
        Err(e) => Error::e_because(CloseError, context, e),
    }
}

impl Connection for TcpStream {
    fn close(&mut self) -> Result<()> {
        shutdown_result(self.shutdown(Shutdown::Both), "fail to shutdown tcp stream")
    }
}

#[cfg(unix)]
impl Connection for std::os::unix::net::UnixStream {
    fn close(&mut self) -> Result<()> {
        shutdown_result(self.shutdown(Shutdown::Both), "fail to shutdown unix stream")
    }
}

/// A connection borrowed from a pool
///
/// It derefs to the raw connection. Closing or dropping it returns the raw connection to the
/// pool it came from, unless it was marked unusable, in which case the raw connection is closed.
pub struct PooledConnection<C: Connection> {
    // Some until closed or dropped
    conn: Option<C>,
    pool: Weak<PoolInner<C>>,
    unusable: Mutex<bool>,
}

impl<C: Connection> PooledConnection<C> {
    pub(crate) fn new(conn: C, pool: Weak<PoolInner<C>>) -> Self {
        PooledConnection {
            conn: Some(conn),
            pool,
            unusable: Mutex::new(false),
        }
    }

    /// Mark this connection as broken so that it will never go back to the pool.
    ///
    /// Call this after an IO error. It cannot be undone.
    pub fn mark_unusable(&self) {
        *self.unusable.lock() = true;
    }

    /// Whether [Self::mark_unusable()] was called
    pub fn is_unusable(&self) -> bool {
        *self.unusable.lock()
    }

    /// Give the connection back to the pool, or close it for real if it is unusable.
    ///
    /// When the pool is closed or full the connection is closed for real as well, and the result
    /// of that close is returned.
    pub fn close(mut self) -> Result<()> {
        self.do_close()
        // drop() sees no connection left and does nothing
    }

    fn do_close(&mut self) -> Result<()> {
        let unusable = self.unusable.lock();
        let conn = self.conn.take();
        if *unusable {
            return close_raw(conn);
        }
        match self.pool.upgrade() {
            Some(pool) => pool.put(conn),
            None => {
                debug!("pool is gone, closing the connection");
                close_raw(conn)
            }
        }
    }
}

fn close_raw<C: Connection>(conn: Option<C>) -> Result<()> {
    match conn {
        Some(mut c) => c.close(),
        None => Ok(()),
    }
}

impl<C: Connection> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if self.conn.is_none() {
            return;
        }
        if let Err(e) = self.do_close() {
            debug!("fail to release connection on drop: {e}");
        }
    }
}

impl<C: Connection> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        // conn is only taken by close() and drop(), both of which end the wrapper
        self.conn.as_ref().expect("pooled connection already released")
    }
}

impl<C: Connection> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.conn.as_mut().expect("pooled connection already released")
    }
}

impl<C: Connection + Read> Read for PooledConnection<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.deref_mut().read(buf)
    }
}

impl<C: Connection + Write> Write for PooledConnection<C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.deref_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.deref_mut().flush()
    }
}

impl<C: Connection> std::fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("unusable", &self.is_unusable())
            .field("pool_alive", &(self.pool.strong_count() > 0))
            .finish()
    }
}
