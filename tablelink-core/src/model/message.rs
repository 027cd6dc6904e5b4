use crate::utils::{CHAT_TEXT_LIMIT, now_millis};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Payload exchanged over an open data channel: `{type, ...fields, ts}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationMessage {
    #[serde(flatten)]
    pub body: MessageBody,
    /// Send time in unix millis. Informational only.
    #[serde(default)]
    pub ts: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessageBody {
    /// guest -> host, carries the guest's self description.
    Hello(Map<String, Value>),
    /// host -> guest, acknowledges a hello.
    Ack(Map<String, Value>),
    Ping,
    Pong,
    CharacterUpdate(Map<String, Value>),
    DiceRoll(Map<String, Value>),
    ChatMessage(ChatMessage),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender_name: String,
    #[serde(default)]
    pub sender_icon: Option<String>,
    pub timestamp: u64,
}

impl ChatMessage {
    pub fn new(
        text: impl Into<String>,
        sender_name: impl Into<String>,
        sender_icon: Option<String>,
    ) -> Self {
        let mut message = Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            sender_name: sender_name.into(),
            sender_icon,
            timestamp: now_millis(),
        };
        message.enforce_limit();
        message
    }

    fn enforce_limit(&mut self) {
        if let Some((cut, _)) = self.text.char_indices().nth(CHAT_TEXT_LIMIT) {
            self.text.truncate(cut);
        }
    }
}

impl ApplicationMessage {
    pub fn new(body: MessageBody) -> Self {
        Self {
            body,
            ts: now_millis(),
        }
    }

    pub fn hello(info: Map<String, Value>) -> Self {
        Self::new(MessageBody::Hello(info))
    }

    pub fn ack(fields: Map<String, Value>) -> Self {
        Self::new(MessageBody::Ack(fields))
    }

    pub fn ping() -> Self {
        Self::new(MessageBody::Ping)
    }

    pub fn pong() -> Self {
        Self::new(MessageBody::Pong)
    }

    pub fn character_update(fields: Map<String, Value>) -> Self {
        Self::new(MessageBody::CharacterUpdate(fields))
    }

    pub fn dice_roll(fields: Map<String, Value>) -> Self {
        Self::new(MessageBody::DiceRoll(fields))
    }

    pub fn chat(message: ChatMessage) -> Self {
        Self::new(MessageBody::ChatMessage(message))
    }

    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match &self.body {
            MessageBody::Hello(_) => "hello",
            MessageBody::Ack(_) => "ack",
            MessageBody::Ping => "ping",
            MessageBody::Pong => "pong",
            MessageBody::CharacterUpdate(_) => "characterUpdate",
            MessageBody::DiceRoll(_) => "diceRoll",
            MessageBody::ChatMessage(_) => "chatMessage",
        }
    }

    /// Serializes for the data channel. Chat text over the limit is cut here
    /// even if the message was assembled by hand.
    pub fn encode(&self) -> serde_json::Result<String> {
        if let MessageBody::ChatMessage(chat) = &self.body {
            if chat.text.chars().count() > CHAT_TEXT_LIMIT {
                let mut chat = chat.clone();
                chat.enforce_limit();
                let trimmed = Self {
                    body: MessageBody::ChatMessage(chat),
                    ts: self.ts,
                };
                return serde_json::to_string(&trimmed);
            }
        }
        serde_json::to_string(self)
    }

    pub fn decode(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}
