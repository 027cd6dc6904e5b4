mod console;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use console::{ConsoleCallbacks, ConsoleInput};
use dialoguer::Input;
use directories::ProjectDirs;
use serde_json::{Map, json};
use std::path::PathBuf;
use std::sync::Arc;
use tablelink_core::utils::DEFAULT_STUN_ADDR;
use tablelink_core::{ApplicationMessage, IceServerConfig, RoomId};
use tablelink_session::{DeviceIdentity, SessionConfig, SessionOrchestrator, SessionRole};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tablelink", version, about = "Host or join a tabletop session")]
struct Cli {
    /// Signaling relay base URL.
    #[arg(
        long,
        global = true,
        env = "TABLELINK_RELAY_URL",
        default_value = "http://127.0.0.1:5000"
    )]
    relay_url: String,

    /// STUN server URL. Repeat for more than one.
    #[arg(long, global = true, env = "TABLELINK_STUN", value_delimiter = ',')]
    stun: Vec<String>,

    /// File holding this device's id.
    #[arg(long, global = true)]
    identity: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a room and wait for players.
    Host {
        #[arg(long, default_value = "Game Master")]
        name: String,
    },

    /// Join a room by its code.
    Join {
        room: String,

        #[arg(long)]
        name: Option<String>,
    },
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        let stun = if self.stun.is_empty() {
            vec![DEFAULT_STUN_ADDR.to_owned()]
        } else {
            self.stun.clone()
        };

        SessionConfig {
            relay_url: self.relay_url.clone(),
            ice_servers: vec![IceServerConfig {
                urls: stun,
                username: None,
                credential: None,
            }],
            ..SessionConfig::default()
        }
    }

    fn identity_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.identity {
            return Ok(path.clone());
        }
        let dirs = ProjectDirs::from("org", "tablelink", "tablelink")
            .context("no home directory to keep the device identity in")?;
        Ok(dirs.data_dir().join("device_id"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let identity = DeviceIdentity::load_or_create(cli.identity_path()?).await?;
    info!(device_id = %identity.device_id(), path = %identity.path().display(), "device identity loaded");

    let orchestrator =
        SessionOrchestrator::over_http(cli.session_config(), identity.device_id().clone())
            .context("setting up the relay client")?;
    let callbacks = Arc::new(ConsoleCallbacks);

    let name = match cli.command {
        Commands::Host { name } => {
            let room = orchestrator.start_host_session(callbacks).await?;
            println!("{}", "🎲 Room is open".green().bold());
            println!("   Code: {}", room.room_id.as_str().bold());
            name
        }
        Commands::Join { room, name } => {
            let name = match name {
                Some(name) => name,
                None => Input::<String>::new()
                    .with_prompt("Your name")
                    .interact_text()?,
            };
            let mut hello = Map::new();
            hello.insert("name".to_owned(), json!(name));

            let joined = orchestrator
                .start_player_session(RoomId::from(room), hello, callbacks)
                .await?;
            println!(
                "{} {}",
                "🎲 Joined, waiting for the host".green().bold(),
                joined.host_id.to_string().dimmed()
            );
            name
        }
    };

    println!(
        "{}",
        "Type to chat, /roll <total> to roll, /quit to leave.".dimmed()
    );
    let outcome = run_console(&orchestrator, &name).await;
    orchestrator.end_session().await;
    outcome
}

async fn run_console(orchestrator: &SessionOrchestrator, name: &str) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match ConsoleInput::parse(&line) {
                    ConsoleInput::Quit => break,
                    ConsoleInput::Empty => {}
                    ConsoleInput::Invalid(reason) => println!("{}", reason.red()),
                    ConsoleInput::Chat(text) => {
                        if !orchestrator.send_chat_message(&text, name, None).await {
                            println!("{}", "nobody is connected yet".yellow());
                        }
                    }
                    ConsoleInput::Roll(total) => roll(orchestrator, name, total).await,
                }
            }

            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

async fn roll(orchestrator: &SessionOrchestrator, name: &str, total: i64) {
    let mut fields = Map::new();
    fields.insert("total".to_owned(), json!(total));
    fields.insert("roller".to_owned(), json!(name));

    let is_host = orchestrator
        .session_state()
        .await
        .is_some_and(|state| state.role == SessionRole::Host);
    let delivered = if is_host {
        orchestrator
            .broadcast(ApplicationMessage::dice_roll(fields))
            .await
            > 0
    } else {
        orchestrator.send_dice_roll(fields).await
    };

    if delivered {
        println!("{} {}", "you rolled".dimmed(), total.to_string().bold());
    } else {
        println!("{}", "roll not delivered, no open channel".yellow());
    }
}
