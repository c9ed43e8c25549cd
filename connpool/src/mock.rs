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

// A factory of fake connections that records every real close

use connpool_error::{Error, ErrorType::*, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::Connection;

pub(crate) struct MockConn {
    pub id: usize,
    factory: Arc<MockFactory>,
}

impl Connection for MockConn {
    // not idempotent on purpose, a double close shows up twice
    fn close(&mut self) -> Result<()> {
        self.factory.closed.lock().push(self.id);
        if self.factory.close_fail_at == Some(self.id) {
            return Error::e_explain(CloseError, "mock close failure");
        }
        Ok(())
    }
}

pub(crate) struct MockFactory {
    calls: AtomicUsize,
    fail_at: Option<usize>,
    close_fail_at: Option<usize>,
    closed: Mutex<Vec<usize>>,
}

impl MockFactory {
    fn build(fail_at: Option<usize>, close_fail_at: Option<usize>) -> Arc<Self> {
        Arc::new(MockFactory {
            calls: AtomicUsize::new(0),
            fail_at,
            close_fail_at,
            closed: Mutex::new(vec![]),
        })
    }

    pub fn new() -> Arc<Self> {
        Self::build(None, None)
    }

    // the nth call (0 based) fails
    pub fn failing_at(n: usize) -> Arc<Self> {
        Self::build(Some(n), None)
    }

    // closing the connection with this id fails, the attempt is still recorded
    pub fn failing_close_of(id: usize) -> Arc<Self> {
        Self::build(None, Some(id))
    }

    pub fn factory(self: &Arc<Self>) -> impl Fn() -> Result<MockConn> + Send + Sync + 'static {
        let factory = self.clone();
        move || {
            let id = factory.calls.fetch_add(1, Ordering::SeqCst);
            if factory.fail_at == Some(id) {
                return Error::e_explain(ConnectError, "mock dial failure");
            }
            Ok(MockConn {
                id,
                factory: factory.clone(),
            })
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> Vec<usize> {
        self.closed.lock().clone()
    }
}
