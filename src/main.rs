#![forbid(unsafe_code)]

//! Interactive `presence-sync` console over the in-process store.
//!
//! Wires a [`MemoryStore`], a [`LocalIdentity`] and the lifecycle
//! coordinator on a single-threaded runtime and reads commands from stdin.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use presence_sync::gateway::memory::MemoryStore;
use presence_sync::gateway::StoreGateway;
use presence_sync::identity::{IdentityProvider, LocalIdentity};
use presence_sync::models::message::{Message, MessageKind};
use presence_sync::models::session::Session;
use presence_sync::{AppError, LifecycleCoordinator, Result, SyncConfig};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "presence-sync",
    about = "Interactive presence and message feed console",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML configuration file; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

/// One console line.
#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_help_flag = true)]
struct ConsoleLine {
    #[command(subcommand)]
    command: ConsoleCommand,
}

#[derive(Debug, Subcommand)]
enum ConsoleCommand {
    /// Sign in as `uid`.
    Login {
        /// User identifier.
        uid: String,
        /// Optional email; its local part becomes the display name.
        email: Option<String>,
    },
    /// Sign out.
    Logout,
    /// Repeat the current identity callback.
    Renotify,
    /// Post a message.
    Send {
        /// Message words.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Delete every message.
    Clear,
    /// Remove the own presence record.
    Offline,
    /// Re-arm presence and re-attach streams if needed.
    Refresh,
    /// Print the message feed.
    Messages,
    /// Print who is online.
    Roster,
    /// Print the session phase.
    Status,
    /// Drop the store connection, firing disconnect cleanups.
    Disconnect,
    /// Leave the console.
    Quit,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("presence-sync console bootstrap");

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = match args.config {
        Some(path) => SyncConfig::load_from_path(path)?,
        None => SyncConfig::default(),
    };
    info!("configuration loaded");

    let store = Arc::new(MemoryStore::new());
    let identity = Arc::new(LocalIdentity::new());
    let ct = CancellationToken::new();

    let gateway: Arc<dyn StoreGateway> = store.clone();
    let provider: Arc<dyn IdentityProvider> = identity.clone();
    let (coordinator, transitions) = LifecycleCoordinator::new(&config, gateway, provider, ct.clone());
    let coordinator = Arc::new(coordinator);
    let loop_handle = Arc::clone(&coordinator).spawn(transitions);
    info!("console ready; type a command (login, send, roster, quit, ...)");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            () = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let command = match ConsoleLine::try_parse_from(line.split_whitespace()) {
            Ok(parsed) => parsed.command,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        if matches!(command, ConsoleCommand::Quit) {
            break;
        }
        execute(command, &coordinator, &store, &identity).await;
    }

    coordinator.shutdown().await;
    ct.cancel();
    let _ = loop_handle.await;
    info!("presence-sync shut down");
    Ok(())
}

async fn execute(
    command: ConsoleCommand,
    coordinator: &LifecycleCoordinator,
    store: &MemoryStore,
    identity: &LocalIdentity,
) {
    let outcome = match command {
        ConsoleCommand::Login { uid, email } => {
            identity.sign_in(match email {
                Some(email) => Session::with_email(uid, email),
                None => Session::new(uid),
            });
            Ok(())
        }
        ConsoleCommand::Logout => {
            identity.sign_out();
            Ok(())
        }
        ConsoleCommand::Renotify => {
            identity.renotify();
            Ok(())
        }
        ConsoleCommand::Send { text } => coordinator.send(&text.join(" ")).await.map(|id| {
            println!("sent {id}");
        }),
        ConsoleCommand::Clear => coordinator.clear().await,
        ConsoleCommand::Offline => coordinator.set_offline().await,
        ConsoleCommand::Refresh => coordinator.refresh().await,
        ConsoleCommand::Messages => {
            let own_uid = coordinator.current_session().map(|session| session.uid);
            for message in coordinator.messages().borrow().iter() {
                println!("{}", render_message(message, own_uid.as_deref()));
            }
            Ok(())
        }
        ConsoleCommand::Roster => {
            let roster = coordinator.roster().borrow().clone();
            let mut names: Vec<_> = roster
                .values()
                .map(|record| format!("{} ({})", record.display_name, record.uid))
                .collect();
            names.sort();
            println!("{} online: {}", names.len(), names.join(", "));
            Ok(())
        }
        ConsoleCommand::Status => {
            println!("{:?}", coordinator.phase().await);
            Ok(())
        }
        ConsoleCommand::Disconnect => {
            store.simulate_disconnect();
            Ok(())
        }
        ConsoleCommand::Quit => Ok(()),
    };

    // Let the coordinator loop drain transitions queued by this command.
    tokio::task::yield_now().await;

    match outcome {
        Ok(()) => {}
        Err(err) if err.is_soft_rejection() => println!("rejected: {err}"),
        Err(err) => {
            error!(%err, "command failed");
            println!("failed: {err}");
        }
    }
}

fn render_message(message: &Message, own_uid: Option<&str>) -> String {
    let time = DateTime::from_timestamp_millis(message.timestamp).map_or_else(
        || "--:--".to_owned(),
        |at| at.with_timezone(&Local).format("%H:%M").to_string(),
    );
    let own = own_uid.is_some_and(|uid| message.is_from(uid));
    match message.kind {
        MessageKind::System => format!("[{time}] * {}", message.text),
        MessageKind::Text if own => format!("[{time}] you: {}", message.text),
        MessageKind::Text => format!("[{time}] {}: {}", message.sender_name, message.text),
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
