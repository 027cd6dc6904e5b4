pub mod test_create_and_join_room;
pub mod test_participants_exclude_caller;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tablelink_session::HttpRelay;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

pub const ROOM: &str = "123456";

/// What the stub relay saw and still holds.
#[derive(Default)]
pub struct StubRelay {
    pub mailbox: Vec<Value>,
    pub heartbeats: Vec<String>,
    pub closed: bool,
}

type Shared = Arc<Mutex<StubRelay>>;

#[derive(Deserialize)]
struct DeviceBody {
    device_id: String,
}

#[derive(Deserialize)]
struct DeviceQuery {
    device_id: String,
}

fn known(room: &str) -> Result<(), (StatusCode, String)> {
    if room == ROOM {
        Ok(())
    } else {
        Err((StatusCode::NOT_FOUND, format!("room {room} not found")))
    }
}

async fn create_room(Json(body): Json<DeviceBody>) -> Json<Value> {
    Json(json!({ "room_id": ROOM, "token": format!("host-token-{}", body.device_id) }))
}

async fn join_room(
    Path(room): Path<String>,
    Json(body): Json<DeviceBody>,
) -> Result<Json<Value>, (StatusCode, String)> {
    known(&room)?;
    Ok(Json(json!({ "token": format!("guest-token-{}", body.device_id), "host_id": "host" })))
}

async fn push_signal(
    State(state): State<Shared>,
    Path(room): Path<String>,
    Json(envelope): Json<Value>,
) -> Result<StatusCode, (StatusCode, String)> {
    known(&room)?;
    state.lock().await.mailbox.push(envelope);
    Ok(StatusCode::OK)
}

async fn pull_signals(
    State(state): State<Shared>,
    Path(room): Path<String>,
    Query(query): Query<DeviceQuery>,
) -> Result<Json<Vec<Value>>, (StatusCode, String)> {
    known(&room)?;
    let mut state = state.lock().await;
    let (mine, rest): (Vec<Value>, Vec<Value>) = state
        .mailbox
        .drain(..)
        .partition(|e| e["to"] == json!(query.device_id));
    state.mailbox = rest;

    let delivered = mine
        .into_iter()
        .map(|mut e| {
            if let Some(fields) = e.as_object_mut() {
                fields.remove("to");
            }
            e
        })
        .collect();
    Ok(Json(delivered))
}

async fn heartbeat(
    State(state): State<Shared>,
    Path(room): Path<String>,
    Json(body): Json<DeviceBody>,
) -> Result<StatusCode, (StatusCode, String)> {
    if room == "broken" {
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "database down".to_owned()));
    }
    known(&room)?;
    state.lock().await.heartbeats.push(body.device_id);
    Ok(StatusCode::OK)
}

async fn participants(Path(room): Path<String>) -> Result<Json<Value>, (StatusCode, String)> {
    known(&room)?;
    Ok(Json(json!([
        {"device_id": "host", "role": "host", "last_seen": "2024-05-01 10:00:00"},
        {"device_id": "guest-1", "role": "guest", "last_seen": "2024-05-01 10:00:02"},
        "guest-2"
    ])))
}

async fn close_room(
    State(state): State<Shared>,
    Path(room): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    known(&room)?;
    state.lock().await.closed = true;
    Ok(StatusCode::OK)
}

/// Starts a stub relay on an ephemeral port and returns a client for it.
pub async fn spawn_stub_relay() -> (HttpRelay, Shared) {
    let state: Shared = Arc::new(Mutex::new(StubRelay::default()));

    let app = Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{room}/join", post(join_room))
        .route("/rooms/{room}/signal", post(push_signal).get(pull_signals))
        .route("/rooms/{room}/heartbeat", post(heartbeat))
        .route("/rooms/{room}/participants", get(participants))
        .route("/rooms/{room}/close", post(close_room))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let relay = HttpRelay::new(format!("http://{addr}/"), Duration::from_secs(5)).unwrap();
    (relay, state)
}
