use clap::{Parser, Subcommand};
use orion_api::ApiClient;
use orion_channels::{ChannelEvent, ConnectionManager, TextChannel};
use orion_client::{ClientConfig, SessionClient};
use orion_core::{Message, Role};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "orion", about = "Orion: talk to an agent session from the terminal")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "orion.toml")]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a session and chat with the agent
    Chat {
        /// Session to open
        session_id: String,
    },
    /// Print the reconstructed history of a session
    History {
        /// Session to read
        session_id: String,
    },
    /// Manage sessions
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// List sessions visible to the token
    List,
    /// Create a new session
    Create {
        /// Display name for the session
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if cli.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = ClientConfig::load(&cli.config).await?.with_env();
    let api = Arc::new(ApiClient::new(config.api_url.clone(), config.token.clone()));

    match cli.command {
        Commands::Chat { session_id } => chat(&config, api, session_id).await?,
        Commands::History { session_id } => {
            let records = api.session_history(&session_id).await?;
            let messages = orion_session::reconstruct(&records);
            if messages.is_empty() {
                println!("No messages in session {session_id}.");
            }
            for message in &messages {
                print_message(message);
            }
        }
        Commands::Sessions { action } => match action {
            SessionAction::List => {
                let sessions = api.list_sessions().await?;
                if sessions.is_empty() {
                    println!("No sessions.");
                } else {
                    for session in &sessions {
                        println!(
                            "  {}  {:<8} {}  {}",
                            session.id,
                            session.status,
                            session.created_at.format("%Y-%m-%d %H:%M"),
                            session.name().unwrap_or("(unnamed)")
                        );
                    }
                    println!("\nTotal: {} session(s)", sessions.len());
                }
            }
            SessionAction::Create { name } => {
                let session = api.create_session(name.as_deref()).await?;
                println!("Created session {}", session.id);
            }
        },
    }

    Ok(())
}

async fn chat(config: &ClientConfig, api: Arc<ApiClient>, session_id: String) -> anyhow::Result<()> {
    let channel: Arc<dyn TextChannel> = ConnectionManager::new(config.channel_config());
    let mut client = SessionClient::new(session_id, api, channel);
    client.open().await;
    info!(session_id = %client.session_id(), "Session opened");

    for message in client.timeline().messages() {
        print_message(message);
    }
    show_banner(&mut client);
    println!("Type a message, or /quit to leave.");

    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    let mut streaming = false;

    loop {
        let seen = client.timeline().messages().len();
        tokio::select! {
            line = lines.next() => {
                let Some(line) = line else { break };
                let line = line?;
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                if text == "/quit" {
                    break;
                }
                if let Err(e) = client.send(text).await {
                    eprintln!("{e}");
                    continue;
                }
                // Fallback replies are already in the timeline when send returns.
                print_new(&client, seen + 1, &mut streaming, false);
                show_banner(&mut client);
            }
            event = client.next_event() => {
                let Some(event) = event else { break };
                match &event {
                    ChannelEvent::PartialToken { text } => {
                        if !streaming {
                            print!("assistant> ");
                            streaming = true;
                        }
                        print!("{text}");
                        let _ = std::io::stdout().flush();
                    }
                    ChannelEvent::SessionRenamed { name, .. } => {
                        println!("(session renamed to {name})");
                    }
                    _ => {}
                }
                let completes_stream = matches!(event, ChannelEvent::ReplyComplete { .. });
                print_new(&client, seen, &mut streaming, completes_stream);
                if streaming && !client.timeline().is_streaming() {
                    // Stream cut off without a reply.
                    println!();
                    streaming = false;
                }
                show_banner(&mut client);
            }
        }
    }

    client.close().await;
    Ok(())
}

/// Print assistant messages finalized since index `from`. A reply that
/// completes a stream was already printed token by token, so only its line
/// is closed.
fn print_new(client: &SessionClient, from: usize, streaming: &mut bool, completes_stream: bool) {
    for message in client.timeline().messages().iter().skip(from) {
        if message.role != Role::Assistant {
            continue;
        }
        if std::mem::take(streaming) {
            println!();
            if completes_stream {
                continue;
            }
        }
        print_message(message);
    }
}

fn print_message(message: &Message) {
    println!("{}> {}", message.role, message.content);
}

fn show_banner(client: &mut SessionClient) {
    if let Some(banner) = client.timeline().banner() {
        eprintln!("! {banner}");
        client.dismiss_banner();
    }
}
