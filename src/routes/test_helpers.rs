//! Spin up the full router on an ephemeral port.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::catalog::Catalog;
use crate::config::Settings;
use crate::services::engine::spawn_engine;
use crate::state::AppState;

pub(crate) async fn spawn_server(catalog: Catalog, asset_dir: PathBuf) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");

    let settings = Settings { port: addr.port(), asset_dir, ..Settings::default() };
    let (engine, _task) = spawn_engine(Arc::new(catalog), settings.engine_queue);
    let app = super::app(AppState::new(engine, &settings));

    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await;
    });
    addr
}

/// Send a raw HTTP/1.1 GET, bypassing any client-side path normalization.
/// Returns the whole response with header names lowercased.
pub(crate) async fn raw_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let request = format!("GET {path} HTTP/1.1\r\nHost: quiz.local\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.expect("write request");

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.expect("read response");
    let text = String::from_utf8_lossy(&raw).into_owned();

    let (head, body) = text.split_once("\r\n\r\n").unwrap_or((text.as_str(), ""));
    format!("{}\r\n\r\n{body}", head.to_ascii_lowercase())
}
