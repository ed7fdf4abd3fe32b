use std::sync::Arc;

use clap::Parser;
use hubchat::{
    ChatError, ChatMessage, ChatSession, ConfigError, ConnectionManager, ConnectionState, HubConfig,
    HubConnectionFactory,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error("failed to read stdin: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "hubchat-cli", about = "Terminal client for a realtime chat hub")]
struct Cli {
    /// Name to chat as.
    #[arg(long, env = "HUBCHAT_USERNAME")]
    username: String,

    /// Hub origin; overrides the environment config.
    #[arg(long, env = "HUBCHAT_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "HUBCHAT_HUB_PATH")]
    hub_path: Option<String>,
}

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Say(&'a str),
    Clear,
    Status,
    Reconnect,
    Quit,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if !trimmed.starts_with('/') {
        return Input::Say(line);
    }
    match trimmed {
        "/clear" => Input::Clear,
        "/status" => Input::Status,
        "/reconnect" => Input::Reconnect,
        "/quit" | "/exit" => Input::Quit,
        other => Input::Unknown(other),
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut config = HubConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url.trim_end_matches('/').to_owned();
    }
    if let Some(hub_path) = cli.hub_path {
        config.hub_path = hub_path;
    }

    let mut manager = ConnectionManager::new(config, Arc::new(HubConnectionFactory));
    let renderer = spawn_renderer(manager.session());

    println!("connecting to {} as {}", manager.config().hub_url(), cli.username);
    manager.connect(&cli.username).await?;

    let result = run_repl(&mut manager, &cli.username).await;
    manager.disconnect().await;
    renderer.abort();
    result
}

async fn run_repl(manager: &mut ConnectionManager, username: &str) -> Result<(), CliError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Say(text) => {
                // Blank lines are a no-op at the prompt.
                if text.trim().is_empty() {
                    continue;
                }
                if let Err(e) = manager.send_message(text).await {
                    eprintln!("! {e}");
                }
            }
            Input::Clear => manager.clear_messages(),
            Input::Status => print_status(&manager.session().state().get()),
            Input::Reconnect => {
                if let Err(e) = manager.connect(username).await {
                    eprintln!("! {e}");
                }
            }
            Input::Quit => break,
            Input::Unknown(command) => {
                eprintln!("! unknown command {command}; try /clear, /status, /reconnect or /quit");
            }
        }
    }
    Ok(())
}

// =============================================================================
// RENDERING
// =============================================================================

fn spawn_renderer(session: &ChatSession) -> JoinHandle<()> {
    let mut state_rx = session.state().subscribe();
    let mut messages_rx = session.messages().subscribe();

    tokio::spawn(async move {
        let mut shown = 0;
        loop {
            tokio::select! {
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = state_rx.borrow_and_update().clone();
                    print_status(&state);
                }
                changed = messages_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let messages = messages_rx.borrow_and_update().clone();
                    if messages.len() < shown {
                        println!("-- history cleared --");
                        shown = 0;
                    }
                    for message in &messages[shown..] {
                        print_message(message);
                    }
                    shown = messages.len();
                }
            }
        }
    })
}

fn print_status(state: &ConnectionState) {
    match &state.error {
        Some(error) => println!("-- {} ({error}) --", state.status.as_str()),
        None => println!("-- {} --", state.status.as_str()),
    }
}

fn print_message(message: &ChatMessage) {
    let ts = message.timestamp;
    let marker = if message.is_own_message { "*" } else { " " };
    println!(
        "[{:02}:{:02}:{:02}]{marker}{}: {}",
        ts.hour(),
        ts.minute(),
        ts.second(),
        message.sender,
        message.content
    );
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
