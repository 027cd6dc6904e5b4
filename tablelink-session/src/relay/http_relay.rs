use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::relay::SignalingTransport;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tablelink_core::utils::now_millis;
use tablelink_core::{DeviceId, JoinedRoom, Participant, Room, RoomId, SignalEnvelope};
use tracing::debug;

#[derive(Deserialize)]
struct CreateRoomResponse {
    room_id: RoomId,
    token: String,
}

/// `SignalingTransport` over the relay's HTTP API.
#[derive(Clone)]
pub struct HttpRelay {
    http: Client,
    base_url: String,
}

impl HttpRelay {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> SessionResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    pub fn from_config(config: &SessionConfig) -> SessionResult<Self> {
        Self::new(config.relay_url.clone(), config.request_timeout)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn room_url(&self, room_id: &RoomId, tail: &str) -> String {
        self.url(&format!("/rooms/{}/{}", room_id, tail))
    }

    async fn send(&self, request: RequestBuilder) -> SessionResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(SessionError::Transport {
            status: Some(status.as_u16()),
            message,
        })
    }
}

#[async_trait]
impl SignalingTransport for HttpRelay {
    async fn create_room(&self, device_id: &DeviceId) -> SessionResult<Room> {
        let response = self
            .send(
                self.http
                    .post(self.url("/rooms"))
                    .json(&json!({ "device_id": device_id })),
            )
            .await?;
        let created: CreateRoomResponse = response.json().await?;
        debug!(room_id = %created.room_id, "relay created room");

        Ok(Room {
            room_id: created.room_id,
            host_token: created.token,
            created_at: now_millis(),
        })
    }

    async fn join_room(
        &self,
        room_id: &RoomId,
        device_id: &DeviceId,
    ) -> SessionResult<JoinedRoom> {
        let request = self
            .http
            .post(self.room_url(room_id, "join"))
            .json(&json!({ "device_id": device_id }));

        match self.send(request).await {
            Ok(response) => Ok(response.json().await?),
            Err(SessionError::Transport {
                status: Some(status),
                ..
            }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(SessionError::InviteNotFound(room_id.clone()))
            }
            Err(e) => Err(e),
        }
    }

    async fn push_signal(&self, room_id: &RoomId, envelope: &SignalEnvelope) -> SessionResult<()> {
        debug!(room_id = %room_id, kind = ?envelope.kind, to = ?envelope.to, "pushing signal");
        self.send(self.http.post(self.room_url(room_id, "signal")).json(envelope))
            .await?;
        Ok(())
    }

    async fn pull_signals(
        &self,
        room_id: &RoomId,
        device_id: &DeviceId,
    ) -> SessionResult<Vec<SignalEnvelope>> {
        let response = self
            .send(
                self.http
                    .get(self.room_url(room_id, "signal"))
                    .query(&[("device_id", device_id.as_str())]),
            )
            .await?;
        Ok(response.json().await?)
    }

    async fn heartbeat(&self, room_id: &RoomId, device_id: &DeviceId) -> SessionResult<()> {
        self.send(
            self.http
                .post(self.room_url(room_id, "heartbeat"))
                .json(&json!({ "device_id": device_id })),
        )
        .await?;
        Ok(())
    }

    async fn list_participants(
        &self,
        room_id: &RoomId,
        device_id: &DeviceId,
    ) -> SessionResult<Vec<DeviceId>> {
        let response = self
            .send(self.http.get(self.room_url(room_id, "participants")))
            .await?;
        let listed: Vec<Participant> = response.json().await?;

        Ok(listed
            .into_iter()
            .map(|p| p.device_id)
            .filter(|id| id != device_id)
            .collect())
    }

    async fn close_room(&self, room_id: &RoomId, device_id: &DeviceId) -> SessionResult<()> {
        self.send(
            self.http
                .post(self.room_url(room_id, "close"))
                .json(&json!({ "device_id": device_id })),
        )
        .await?;
        Ok(())
    }
}
