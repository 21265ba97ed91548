//! In-process stand-in for a Redis server, used by tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

const SERVE: u8 = 0;
const DROP: u8 = 1;
const SILENT: u8 = 2;

pub struct FakeRedis {
    addr: SocketAddr,
    mode: Arc<AtomicU8>,
    accepted: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeRedis {
    /// Answers `+OK` to every command.
    pub async fn serving() -> Self {
        Self::start(SERVE).await
    }

    /// Accepts connections and closes them immediately.
    pub async fn dropping() -> Self {
        Self::start(DROP).await
    }

    /// Accepts connections and never answers.
    pub async fn silent() -> Self {
        Self::start(SILENT).await
    }

    async fn start(mode: u8) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mode = Arc::new(AtomicU8::new(mode));
        let accepted = Arc::new(AtomicUsize::new(0));

        let task = tokio::spawn({
            let mode = mode.clone();
            let accepted = accepted.clone();
            async move {
                let mut held = Vec::new();
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        return;
                    };
                    accepted.fetch_add(1, Ordering::SeqCst);
                    match mode.load(Ordering::SeqCst) {
                        SERVE => {
                            tokio::spawn(answer_ok(stream));
                        }
                        SILENT => held.push(stream),
                        _ => drop(stream),
                    }
                }
            }
        });

        Self {
            addr,
            mode,
            accepted,
            task,
        }
    }

    pub fn url(&self) -> String {
        format!("redis://{}", self.addr)
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// New connections are dropped from now on; open ones keep being served.
    pub fn start_dropping(&self) {
        self.mode.store(DROP, Ordering::SeqCst);
    }

    /// Closes the listener so further connects are refused.
    pub async fn shut_down(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

/// One `+OK` per RESP array header seen on the wire.
async fn answer_ok(mut stream: TcpStream) {
    let mut buf = [0u8; 4096];
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        let commands = buf[..n]
            .split(|b| *b == b'\n')
            .filter(|line| line.first() == Some(&b'*'))
            .count();
        for _ in 0..commands {
            if stream.write_all(b"+OK\r\n").await.is_err() {
                return;
            }
        }
    }
}
