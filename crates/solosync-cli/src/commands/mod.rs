pub mod auth;
pub mod config;
pub mod history;
pub mod log;
pub mod routine;
pub mod session;

use std::io::{BufRead, Write};
use std::sync::Arc;

use solosync_core::{ApiClient, ApiError, Config, KeyringTokenStore};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

pub(crate) fn runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}

pub(crate) fn api_client(config: &Config) -> Result<ApiClient, ApiError> {
    ApiClient::new(&config.api, Arc::new(KeyringTokenStore::new()))
}

/// Lines typed on stdin, read on a dedicated thread so both async code
/// (player controls) and sync code (survey prompts) can consume them.
pub(crate) struct InputLines {
    rx: mpsc::UnboundedReceiver<String>,
}

impl InputLines {
    pub fn stdin() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self { rx }
    }

    pub async fn next(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Print `question` and wait for the answer. Must not be called from
    /// inside the runtime. `None` once stdin is closed.
    pub fn prompt(&mut self, question: &str) -> Option<String> {
        print!("{question}");
        let _ = std::io::stdout().flush();
        self.rx.blocking_recv()
    }
}
