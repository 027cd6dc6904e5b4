use crate::error::SessionResult;
use async_trait::async_trait;
use tablelink_core::{DeviceId, JoinedRoom, Room, RoomId, SignalEnvelope};

/// Client side of the signaling relay.
///
/// Every call is one request/response; nothing here retries. Retry policy
/// belongs to whoever drives the calls (see `PollingLoop`).
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    async fn create_room(&self, device_id: &DeviceId) -> SessionResult<Room>;

    async fn join_room(&self, room_id: &RoomId, device_id: &DeviceId)
    -> SessionResult<JoinedRoom>;

    async fn push_signal(&self, room_id: &RoomId, envelope: &SignalEnvelope) -> SessionResult<()>;

    /// Drains the mailbox of `device_id`.
    async fn pull_signals(
        &self,
        room_id: &RoomId,
        device_id: &DeviceId,
    ) -> SessionResult<Vec<SignalEnvelope>>;

    async fn heartbeat(&self, room_id: &RoomId, device_id: &DeviceId) -> SessionResult<()>;

    /// Lists the other participants of the room (the caller is left out).
    async fn list_participants(
        &self,
        room_id: &RoomId,
        device_id: &DeviceId,
    ) -> SessionResult<Vec<DeviceId>>;

    async fn close_room(&self, room_id: &RoomId, device_id: &DeviceId) -> SessionResult<()>;
}
