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

//! Bounded connection pooling
//!
//! A [ChannelPool] keeps up to `max_cap` idle connections in a lock free queue. Connections are
//! created by a user supplied factory, handed out wrapped in a [PooledConnection], and go back to
//! the idle queue when the wrapper is closed or dropped.
//!
//! ```
//! use connpool::{ChannelPool, Connection, Pool, Result};
//!
//! struct Conn;
//! impl Connection for Conn {
//!     fn close(&mut self) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! let pool = ChannelPool::new(2, 4, || Ok(Conn)).unwrap();
//! assert_eq!(pool.count(), 2);
//! let conn = pool.acquire().unwrap();
//! assert_eq!(pool.count(), 1);
//! conn.close().unwrap();
//! assert_eq!(pool.count(), 2);
//! pool.close();
//! assert!(pool.acquire().is_err());
//! ```

#![warn(clippy::all)]
#![allow(clippy::type_complexity)]

mod channel;
mod conf;
mod connection;
#[cfg(test)]
mod mock;

pub use channel::{ChannelPool, Factory};
pub use conf::PoolConf;
pub use connection::{Connection, PooledConnection};
pub use connpool_error::{BError, Error, ErrorType, OrErr, Result};

/// The capability set of a connection pool
pub trait Pool {
    /// What [Pool::acquire()] hands out
    type Conn;

    /// Get a connection, either an idle one or a freshly created one.
    ///
    /// Fails with [ErrorType::PoolClosed] after [Pool::close()].
    fn acquire(&self) -> Result<Self::Conn>;

    /// Shut the pool down and close all idle connections. Calling it again does nothing.
    fn close(&self);

    /// The number of idle connections
    fn count(&self) -> usize;
}
