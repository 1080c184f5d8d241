use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod backend;
mod config;
mod handler;
mod tui;
mod ui;
mod view;
mod widget;

use app::App;
use backend::{ChatBackend, HttpChatBackend};
use config::Config;
use view::{InputField, MessagePanel, SendButton};
use widget::{ChatWidget, Origin};

#[derive(Parser)]
#[command(name = "chatbox")]
#[command(about = "Chat with a remote /api/chat endpoint from the terminal")]
struct Cli {
    /// Config file (defaults to <config dir>/chatbox/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the chat server
    #[arg(long, global = true, env = "CHATBOX_ENDPOINT")]
    endpoint: Option<String>,

    /// Request timeout in seconds, 0 for none
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Log file (defaults to <data dir>/chatbox/chatbox.log)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat (default)
    Chat,
    /// Send one message and print the reply
    Ask {
        /// The message to send
        message: String,
    },
    /// Ask the server to index a database table
    Train {
        /// Table name to train on
        table: String,
    },
    /// List trainable tables, or the columns of one table
    Tables {
        /// Show the columns of this table
        table: Option<String>,
    },
    /// Ask the server to index the rows returned by a SQL query
    TrainSql {
        /// Name the indexed rows are stored under
        #[arg(long)]
        source: String,
        /// The SQL query to run
        query: String,
    },
    /// Write the default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_file.as_deref())?;

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.request_timeout_secs = timeout;
    }

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(&config).await,
        Commands::Ask { message } => ask(&config, &message).await,
        Commands::Train { table } => train(&config, &table).await,
        Commands::Tables { table } => tables(&config, table.as_deref()).await,
        Commands::TrainSql { source, query } => train_sql(&config, &source, &query).await,
        Commands::InitConfig { force } => init_config(cli.config.as_deref(), force),
    }
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let path = match log_file {
        Some(path) => path.to_path_buf(),
        None => dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("chatbox")
            .join("chatbox.log"),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .init();
    Ok(())
}

async fn run_chat(config: &Config) -> Result<()> {
    let backend = Arc::new(HttpChatBackend::from_config(config)?);
    info!(url = backend.chat_url(), "starting interactive chat");

    let mut app = App::new(Arc::clone(&backend), config, backend.chat_url());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new(config.tick_rate());

    let result = event_loop(&mut terminal, &mut events, &mut app).await;

    tui::restore()?;
    result
}

async fn event_loop<B: ChatBackend + 'static>(
    terminal: &mut tui::Tui,
    events: &mut tui::EventHandler,
    app: &mut App<B>,
) -> Result<()> {
    loop {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            event = events.next() => match event {
                Some(event) => handler::handle_event(app, event),
                None => break,
            },
            joined = app.next_reply() => app.settle(joined),
        }

        if app.should_quit {
            break;
        }
    }

    if let Some(handle) = app.in_flight.take() {
        handle.abort();
    }
    Ok(())
}

/// One headless turn through the same widget the terminal UI uses.
async fn ask(config: &Config, message: &str) -> Result<()> {
    let backend = Arc::new(HttpChatBackend::from_config(config)?);

    let mut input = InputField::new();
    input.set_text(message);
    let mut widget = ChatWidget::new(
        backend,
        MessagePanel::new(),
        input,
        SendButton::default(),
        config.apology_message.clone(),
    );

    widget.submit_current_input().await;

    let reply = widget
        .messages()
        .messages()
        .iter()
        .rev()
        .find(|m| m.origin == Origin::Bot);
    match reply {
        Some(reply) => {
            println!("{}", reply.text);
            for source in &reply.sources {
                println!("  - {} ({:.2})", source.source.as_deref().unwrap_or("unknown"), source.score);
            }
            Ok(())
        }
        None => bail!("nothing to send: the message is empty"),
    }
}

async fn train(config: &Config, table: &str) -> Result<()> {
    let backend = HttpChatBackend::from_config(config)?;
    let summary = backend.train(table).await?;
    info!(table, rows = summary.processed_rows, "training finished");
    println!("{} ({} rows processed)", summary.message, summary.processed_rows);
    Ok(())
}

async fn tables(config: &Config, table: Option<&str>) -> Result<()> {
    let backend = HttpChatBackend::from_config(config)?;
    let names = match table {
        Some(table) => backend.columns(table).await?,
        None => backend.tables().await?,
    };
    for name in names {
        println!("{name}");
    }
    Ok(())
}

async fn train_sql(config: &Config, source: &str, query: &str) -> Result<()> {
    let backend = HttpChatBackend::from_config(config)?;
    let summary = backend.train_sql(query, source).await?;
    info!(source, count = summary.count, "SQL training finished");
    println!("{} ({} points)", summary.message, summary.count);
    Ok(())
}

fn init_config(path: Option<&Path>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::default_path()?,
    };
    if path.exists() && !force {
        bail!("{} already exists, pass --force to overwrite", path.display());
    }
    Config::new().save(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
