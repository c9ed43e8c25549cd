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

#![allow(unused)]

use connpool::{Connection, Error, ErrorType, Result};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

pub fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A fake connection, every real close is recorded by its [Recorder]
pub struct FakeConn {
    pub id: usize,
    recorder: Arc<Recorder>,
}

impl Connection for FakeConn {
    fn close(&mut self) -> Result<()> {
        self.recorder.closed.lock().push(self.id);
        Ok(())
    }
}

#[derive(Default)]
pub struct Recorder {
    created: AtomicUsize,
    closed: Mutex<Vec<usize>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Recorder::default())
    }

    pub fn factory(self: &Arc<Self>) -> impl Fn() -> Result<FakeConn> + Send + Sync + 'static {
        let recorder = self.clone();
        move || {
            Ok(FakeConn {
                id: recorder.created.fetch_add(1, Ordering::SeqCst),
                recorder: recorder.clone(),
            })
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> Vec<usize> {
        let mut closed = self.closed.lock().clone();
        closed.sort();
        closed
    }

    /// Panics if any connection was closed more than once
    pub fn assert_no_double_close(&self) {
        let closed = self.closed();
        let mut dedup = closed.clone();
        dedup.dedup();
        assert_eq!(closed, dedup, "a connection was closed twice");
    }
}

/// Start a TCP echo server on a random local port. Each accepted connection is counted.
pub fn echo_server() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else {
                continue;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            thread::spawn(move || {
                let mut buf = [0; 1024];
                loop {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => return,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).is_err() {
                                return;
                            }
                        }
                    }
                }
            });
        }
    });
    (addr, accepted)
}

pub fn tcp_factory(addr: SocketAddr) -> impl Fn() -> Result<TcpStream> + Send + Sync + 'static {
    move || {
        TcpStream::connect(addr)
            .map_err(|e| Error::because(ErrorType::ConnectError, format!("dial {addr}"), e))
    }
}
