//! recollect CLI — the main entry point.
//!
//! Commands:
//! - `init`     — Create the config directory and a default config
//! - `session`  — Create, list, show and delete sessions
//! - `message`  — Record messages (with automatic pinning)
//! - `pin`      — Manage pinned memory
//! - `summary`  — Record summaries and inspect what is due
//! - `context`  — Assemble the context for a session
//! - `config`   — Validate or print the configuration
//! - `status`   — Show store status

use clap::{Parser, Subcommand};
use recollect_core::message::Role;
use recollect_core::pin::PinType;
use recollect_core::session::SessionId;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "recollect",
    about = "recollect — conversation memory and context assembly",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use this config file instead of ~/.recollect/config.toml
    #[arg(short, long, global = true, env = "RECOLLECT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config directory and a default config file
    Init,

    /// Manage sessions
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Record and list messages
    Message {
        #[command(subcommand)]
        command: MessageCommand,
    },

    /// Manage pinned memory
    Pin {
        #[command(subcommand)]
        command: PinCommand,
    },

    /// Record and inspect summaries
    Summary {
        #[command(subcommand)]
        command: SummaryCommand,
    },

    /// Assemble the context for a session
    Context {
        session: SessionId,

        /// Token budget (defaults to context.token_limit)
        #[arg(short, long, allow_negative_numbers = true)]
        limit: Option<i64>,

        /// Print the assembled context as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Show store status
    Status,
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Create a session and print its id
    New {
        #[arg(short, long)]
        title: Option<String>,
    },
    /// List all sessions
    List,
    /// Show one session with its message, summary and pin counts
    Show { session: SessionId },
    /// Delete a session and everything it owns
    Delete { session: SessionId },
}

#[derive(Subcommand)]
enum MessageCommand {
    /// Record a message; code blocks and "remember" notes are pinned
    Add {
        session: SessionId,
        /// user, assistant, system or tool
        role: Role,
        text: String,
        #[arg(short, long)]
        importance: Option<f64>,
        /// Skip automatic pin detection
        #[arg(long)]
        no_detect: bool,
    },
    /// List the most recent messages, oldest first
    List {
        session: SessionId,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Rewrite a message's importance score
    Score { message_id: i64, importance: f64 },
}

#[derive(Subcommand)]
enum PinCommand {
    /// Pin content to a session
    Add {
        session: SessionId,
        content: String,
        /// user, auto, code, concept or system
        #[arg(short = 't', long = "type", default_value = "user")]
        pin_type: PinType,
        #[arg(short, long)]
        importance: Option<f64>,
        /// Message the pin was taken from
        #[arg(short, long)]
        source: Option<i64>,
    },
    /// List pins, most important first
    List {
        session: SessionId,
        #[arg(short = 't', long = "type")]
        pin_type: Option<PinType>,
    },
    /// Delete a pin
    Delete { pin_id: i64 },
}

#[derive(Subcommand)]
enum SummaryCommand {
    /// Record a summary covering messages START..=END
    Add {
        session: SessionId,
        start: i64,
        end: i64,
        text: String,
        #[arg(short, long)]
        importance: Option<f64>,
    },
    /// List summaries in creation order
    List { session: SessionId },
    /// Show the message range that is due for summarization
    Pending { session: SessionId },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Validate the configuration
    Validate,
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Config { command } => match command {
            ConfigCommand::Validate => commands::config_cmd::validate(config_path).await?,
            ConfigCommand::Show => commands::config_cmd::show(config_path).await?,
            ConfigCommand::Path => commands::config_cmd::path(config_path).await?,
        },
        command => {
            let config = commands::load_config(config_path)?;
            let engine = commands::open_engine(&config).await?;
            let cancel = commands::cancel_on_ctrl_c();
            let cancel = &cancel;
            match command {
                Commands::Session { command } => match command {
                    SessionCommand::New { title } => {
                        commands::session::create(&engine, title, cancel).await?
                    }
                    SessionCommand::List => commands::session::list(&engine, cancel).await?,
                    SessionCommand::Show { session } => {
                        commands::session::show(&engine, &session, cancel).await?
                    }
                    SessionCommand::Delete { session } => {
                        commands::session::delete(&engine, &session, cancel).await?
                    }
                },
                Commands::Message { command } => match command {
                    MessageCommand::Add {
                        session,
                        role,
                        text,
                        importance,
                        no_detect,
                    } => {
                        commands::message::add(
                            &engine, session, role, text, importance, !no_detect, cancel,
                        )
                        .await?
                    }
                    MessageCommand::List { session, limit } => {
                        commands::message::list(&engine, &session, limit, cancel).await?
                    }
                    MessageCommand::Score {
                        message_id,
                        importance,
                    } => commands::message::score(&engine, message_id, importance, cancel).await?,
                },
                Commands::Pin { command } => match command {
                    PinCommand::Add {
                        session,
                        content,
                        pin_type,
                        importance,
                        source,
                    } => {
                        commands::pin::add(
                            &engine, session, content, pin_type, importance, source, cancel,
                        )
                        .await?
                    }
                    PinCommand::List { session, pin_type } => {
                        commands::pin::list(&engine, &session, pin_type, cancel).await?
                    }
                    PinCommand::Delete { pin_id } => {
                        commands::pin::delete(&engine, pin_id, cancel).await?
                    }
                },
                Commands::Summary { command } => match command {
                    SummaryCommand::Add {
                        session,
                        start,
                        end,
                        text,
                        importance,
                    } => {
                        commands::summary::add(
                            &engine, session, start, end, text, importance, cancel,
                        )
                        .await?
                    }
                    SummaryCommand::List { session } => {
                        commands::summary::list(&engine, &session, cancel).await?
                    }
                    SummaryCommand::Pending { session } => {
                        commands::summary::pending(&engine, &session, cancel).await?
                    }
                },
                Commands::Context {
                    session,
                    limit,
                    json,
                } => commands::context::run(&engine, &session, limit, json, cancel).await?,
                Commands::Status => commands::status::run(&engine, &config, cancel).await?,
                Commands::Init | Commands::Config { .. } => {}
            }
        }
    }

    Ok(())
}
