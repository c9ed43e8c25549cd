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

// Pool TCP connections to a local echo server.
//
// RUST_LOG=debug cargo run --example tcp_pool [path/to/pool.yaml]

use connpool::{ChannelPool, ErrorType::ConnectError, OrErr, Pool, PoolConf, Result};
use log::info;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

fn echo_server() -> Result<std::net::SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").or_err(ConnectError, "bind echo server")?;
    let addr = listener.local_addr().or_err(ConnectError, "echo server addr")?;
    thread::spawn(move || {
        for mut stream in listener.incoming().flatten() {
            thread::spawn(move || {
                let mut buf = [0; 1024];
                while let Ok(n) = stream.read(&mut buf) {
                    if n == 0 || stream.write_all(&buf[..n]).is_err() {
                        break;
                    }
                }
            });
        }
    });
    Ok(addr)
}

fn main() -> Result<()> {
    env_logger::init();

    let conf = match std::env::args().nth(1) {
        Some(path) => PoolConf::load_from_yaml(path)?,
        None => PoolConf::default(),
    };
    let addr = echo_server()?;
    let pool = ChannelPool::from_conf(&conf, move || {
        TcpStream::connect(addr).or_err(ConnectError, "dial echo server")
    })?;
    info!("pool ready: {pool:?}");

    let workers: Vec<_> = (0..4)
        .map(|id| {
            let pool = pool.clone();
            thread::spawn(move || -> Result<()> {
                for round in 0..8 {
                    let mut conn = pool.acquire()?;
                    let msg = format!("worker {id} round {round}");
                    let mut buf = vec![0; msg.len()];
                    let res = conn
                        .write_all(msg.as_bytes())
                        .and_then(|_| conn.read_exact(&mut buf));
                    if let Err(e) = res {
                        info!("worker {id}: {e}, dropping the connection");
                        conn.mark_unusable();
                    }
                    conn.close()?;
                }
                Ok(())
            })
        })
        .collect();

    for w in workers {
        if let Ok(Err(e)) = w.join() {
            info!("worker failed: {e}");
        }
    }
    info!("idle connections: {} of {}", pool.count(), pool.max_capacity());
    pool.close();
    Ok(())
}
