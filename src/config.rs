//! Server settings from the command line, the environment and `.env`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_PORT: u16 = 8765;
pub const DEFAULT_SESSION_QUEUE: usize = 256;
pub const DEFAULT_ENGINE_QUEUE: usize = 1024;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "quizshow", about = "Quiz show presentation server")]
pub struct Settings {
    /// Port for websocket, status and asset traffic.
    #[arg(long, env = "QUIZ_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[arg(long, env = "QUIZ_BIND", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Page catalog (JSON with comments).
    #[arg(long, env = "QUIZ_CATALOG", default_value = "config.jsonc")]
    pub catalog: PathBuf,

    /// Directory served under `/static`.
    #[arg(long, env = "QUIZ_ASSET_DIR", default_value = ".")]
    pub asset_dir: PathBuf,

    /// Outbound messages buffered per client before it is dropped.
    #[arg(long, env = "QUIZ_SESSION_QUEUE", default_value_t = DEFAULT_SESSION_QUEUE)]
    pub session_queue: usize,

    /// Commands buffered for the engine task.
    #[arg(long, env = "QUIZ_ENGINE_QUEUE", default_value_t = DEFAULT_ENGINE_QUEUE)]
    pub engine_queue: usize,
}

impl Settings {
    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Queue sizes of zero would make `mpsc::channel` panic.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.session_queue = self.session_queue.max(1);
        self.engine_queue = self.engine_queue.max(1);
        self
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            catalog: PathBuf::from("config.jsonc"),
            asset_dir: PathBuf::from("."),
            session_queue: DEFAULT_SESSION_QUEUE,
            engine_queue: DEFAULT_ENGINE_QUEUE,
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
