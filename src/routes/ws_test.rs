use super::*;
use crate::catalog::Catalog;
use crate::routes::test_helpers::{raw_get, spawn_server};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SHOW: &str = r#"{
    "0": { "type": "main", "table": [ [ { "link": "Q1" } ] ] },
    "Q1": { "type": "image", "image": "media/q1.png", "link": "0" },
}"#;

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}{path}")).await.expect("ws connect");
    client
}

async fn send_json(client: &mut Client, value: Value) {
    client
        .send(WsMessage::Text(value.to_string().into()))
        .await
        .expect("ws send");
}

async fn recv_json(client: &mut Client) -> Value {
    loop {
        let msg = timeout(Duration::from_millis(500), client.next())
            .await
            .expect("ws receive timed out")
            .expect("ws stream ended")
            .expect("ws error");
        if let WsMessage::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("server sends json");
        }
    }
}

async fn assert_silent(client: &mut Client) {
    assert!(
        timeout(Duration::from_millis(80), client.next()).await.is_err(),
        "expected no message"
    );
}

async fn join(client: &mut Client, mode: &str) -> Vec<Value> {
    send_json(client, json!({ "type": "connect", "mode": mode })).await;
    let mut replies = Vec::new();
    for _ in 0..3 {
        replies.push(recv_json(client).await);
    }
    replies
}

// =============================================================================
// PURE HELPERS
// =============================================================================

#[test]
fn asset_host_prefers_host_header() {
    let address: SocketAddr = "192.168.1.20:50000".parse().expect("addr");
    assert_eq!(asset_host(Some("quiz.local:8765"), Some(address), 8765), "quiz.local:8765");
    assert_eq!(asset_host(Some("  "), Some(address), 8765), "192.168.1.20:8765");
    assert_eq!(asset_host(None, None, 9000), "localhost:9000");

    let v6: SocketAddr = "[::1]:50000".parse().expect("addr");
    assert_eq!(asset_host(None, Some(v6), 8765), "[::1]:8765");
}

#[test]
fn parse_event_drops_bad_input() {
    let id = SessionId(1);
    assert_eq!(parse_event(id, r#"{"type":"ping"}"#), Some(Event::Ping));
    assert_eq!(parse_event(id, "not json"), None);
    assert_eq!(parse_event(id, r#"{"type":"launch_rockets"}"#), None);
    assert_eq!(parse_event(id, r#"{"type":"grid_click","row":"a"}"#), None);
}

// =============================================================================
// END TO END
// =============================================================================

#[tokio::test]
async fn connect_receives_catalog_with_asset_urls() {
    let addr = spawn_server(Catalog::parse(SHOW).expect("catalog"), ".".into()).await;
    let mut client = connect(addr, "/ws").await;

    let welcome = recv_json(&mut client).await;
    assert_eq!(welcome["type"], "welcome");
    assert_eq!(welcome["client_id"], "client_1");

    let replies = join(&mut client, "team_red").await;
    assert_eq!(replies[0]["type"], "connection_confirmed");
    assert_eq!(replies[0]["mode"], "team_red");
    assert_eq!(replies[1]["type"], "config");
    assert_eq!(
        replies[1]["config"]["Q1"]["image"],
        format!("http://{addr}/static/media/q1.png")
    );
    assert_eq!(replies[2]["type"], "render_page");
    assert_eq!(replies[2]["page_id"], "0");
    assert_eq!(replies[2]["enabled_team"], "team_red");
    assert_eq!(replies[2]["pressed_buttons"], json!([]));
}

#[tokio::test]
async fn grid_click_is_broadcast_to_every_client() {
    let addr = spawn_server(Catalog::parse(SHOW).expect("catalog"), ".".into()).await;
    let mut display = connect(addr, "/").await;
    let mut master = connect(addr, "/ws").await;
    recv_json(&mut display).await;
    recv_json(&mut master).await;

    join(&mut display, "display").await;
    join(&mut master, "master").await;
    let announced = recv_json(&mut display).await;
    assert_eq!(announced["type"], "client_connected");
    assert_eq!(announced["mode"], "master");

    send_json(&mut master, json!({ "type": "grid_click", "row": 0, "col": 0 })).await;
    for client in [&mut display, &mut master] {
        let render = recv_json(client).await;
        assert_eq!(render["type"], "render_page");
        assert_eq!(render["page_id"], "Q1");
        assert_eq!(render["page_config"]["link"], "0");
    }

    send_json(&mut master, json!({ "type": "return_to_main" })).await;
    let render = recv_json(&mut display).await;
    assert_eq!(render["page_id"], "0");
    assert_eq!(render["pressed_buttons"], json!(["0_0"]));
}

#[tokio::test]
async fn bad_messages_do_not_close_the_connection() {
    let addr = spawn_server(Catalog::parse(SHOW).expect("catalog"), ".".into()).await;
    let mut client = connect(addr, "/ws").await;
    recv_json(&mut client).await;

    client.send(WsMessage::Text("{nope".into())).await.expect("send");
    send_json(&mut client, json!({ "type": "self_destruct" })).await;
    assert_silent(&mut client).await;

    send_json(&mut client, json!({ "type": "ping" })).await;
    let pong = recv_json(&mut client).await;
    assert_eq!(pong["type"], "pong");
    assert!(pong["timestamp"].is_string());
}

#[tokio::test]
async fn points_reports_scores_and_devices() {
    let addr = spawn_server(Catalog::parse(SHOW).expect("catalog"), ".".into()).await;
    let mut master = connect(addr, "/ws").await;
    recv_json(&mut master).await;
    join(&mut master, "master").await;

    let mut blue = connect(addr, "/ws").await;
    recv_json(&mut blue).await;
    join(&mut blue, "team_blue").await;
    recv_json(&mut master).await;

    send_json(&mut master, json!({ "type": "master_add_points", "team": "team_blue", "points": 3 })).await;
    send_json(&mut master, json!({ "type": "ping" })).await;
    recv_json(&mut master).await;

    let response = raw_get(addr, "/points").await;
    assert!(response.starts_with("http/1.1 200"), "{response}");
    let (_, body) = response.split_once("\r\n\r\n").expect("body");
    let status: Value = serde_json::from_str(body).expect("points json");
    assert_eq!(status["team_blue"], 3);
    assert_eq!(status["team_blue_devices"], 1);
    assert_eq!(status["enabled_team"], "team_red");
    assert_eq!(status["last_buzzer_team"], Value::Null);
}

#[tokio::test]
async fn healthz_is_ok() {
    let addr = spawn_server(Catalog::default(), ".".into()).await;
    let response = raw_get(addr, "/healthz").await;
    assert!(response.starts_with("http/1.1 200"), "{response}");
}
