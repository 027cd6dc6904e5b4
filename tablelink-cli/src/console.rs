use async_trait::async_trait;
use colored::*;
use serde_json::{Map, Value};
use tablelink_core::{ApplicationMessage, DeviceId, MessageBody, RestartReason};
use tablelink_session::{SessionCallbacks, SessionError, SessionStatus};

/// One line typed by the user.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleInput {
    Chat(String),
    Roll(i64),
    Quit,
    Empty,
    Invalid(String),
}

impl ConsoleInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Chat(line.to_owned());
        };

        let mut parts = command.split_whitespace();
        match parts.next() {
            Some("quit") | Some("exit") => Self::Quit,
            Some("roll") => match parts.next().map(str::parse::<i64>) {
                Some(Ok(total)) => Self::Roll(total),
                _ => Self::Invalid("usage: /roll <total>".to_owned()),
            },
            _ => Self::Invalid(format!("unknown command: {line}")),
        }
    }
}

fn display_name(info: Option<&Map<String, Value>>, peer: &DeviceId) -> String {
    info.and_then(|info| info.get("name"))
        .and_then(Value::as_str)
        .map_or_else(|| peer.to_string(), str::to_owned)
}

/// Prints session events to the terminal.
pub struct ConsoleCallbacks;

#[async_trait]
impl SessionCallbacks for ConsoleCallbacks {
    async fn on_peer_connected(&self, peer: &DeviceId, info: Option<&Map<String, Value>>) {
        println!("{} {}", "+".green().bold(), display_name(info, peer).green());
    }

    async fn on_peer_disconnected(&self, peer: &DeviceId) {
        println!("{} {}", "-".yellow().bold(), peer.to_string().yellow());
    }

    async fn on_message(&self, peer: &DeviceId, message: &ApplicationMessage) {
        match &message.body {
            MessageBody::ChatMessage(chat) => {
                println!("{} {}", format!("[{}]", chat.sender_name).cyan(), chat.text);
            }
            MessageBody::DiceRoll(fields) => {
                let who = fields
                    .get("roller")
                    .and_then(Value::as_str)
                    .map_or_else(|| peer.to_string(), str::to_owned);
                let total = fields.get("total").map(Value::to_string).unwrap_or_default();
                println!("{} rolled {}", who.magenta(), total.bold());
            }
            MessageBody::Hello(info) => {
                println!("{}", format!("{} says hello", display_name(Some(info), peer)).dimmed());
            }
            MessageBody::CharacterUpdate(_) => {
                println!("{}", format!("{peer} updated their character").dimmed());
            }
            MessageBody::Ack(_) | MessageBody::Ping | MessageBody::Pong => {}
        }
    }

    async fn on_error(&self, peer: Option<&DeviceId>, error: &SessionError) {
        match peer {
            Some(peer) => eprintln!("{} {peer}: {error}", "error".red().bold()),
            None => eprintln!("{} {error}", "error".red().bold()),
        }
    }

    async fn on_restart_required(&self, peer: &DeviceId, reason: RestartReason, attempt: u32) {
        println!(
            "{}",
            format!("reconnecting to {peer} ({reason}, attempt {attempt})").yellow()
        );
    }

    async fn on_status_changed(&self, status: SessionStatus) {
        let label = match status {
            SessionStatus::Connected => status.to_string().green(),
            SessionStatus::Connecting | SessionStatus::Reconnecting => status.to_string().yellow(),
            SessionStatus::ConnectionLost => status.to_string().red().bold(),
            SessionStatus::Ended => status.to_string().dimmed(),
        };
        println!("{} {}", "status:".dimmed(), label);
    }
}
