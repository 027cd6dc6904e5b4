mod device;
mod message;
mod room;
mod signaling;

pub use device::DeviceId;
pub use message::{ApplicationMessage, ChatMessage, MessageBody};
pub use room::{JoinedRoom, Participant, Room, RoomId};
pub use signaling::{
    IceCandidate, IceServerConfig, RestartReason, SignalEnvelope, SignalKind, SignalPayload,
};
