//! chat-stream CLI - Talk to the chat backend from the terminal

use anyhow::{bail, Result};
use chat_stream::{
    api::MessageFeedback,
    config::Config,
    ChatApiClient, ChatModeKey, CorrelationPolicy, SessionToken, StreamAnswerRequest,
    StreamAnswerResult,
};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "chat-stream")]
#[command(about = "Stream answers from the chat backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Config file (default: ~/.config/chat-stream/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream an answer to a prompt (Ctrl-C stops it, twice abandons it)
    Ask {
        /// The prompt
        prompt: String,

        /// Chat mode (generic, documents)
        #[arg(short, long, default_value = "generic")]
        mode: ChatModeKey,

        /// Continue an existing chat
        #[arg(short, long)]
        chat_id: Option<String>,

        /// Language model key (generic mode)
        #[arg(long)]
        model: Option<String>,

        /// Knowledge base key (documents mode)
        #[arg(long)]
        knowledge_base: Option<String>,
    },

    /// Ask the backend to stop generating for a chat
    Stop {
        chat_id: String,
    },

    /// Check backend health
    Health,

    /// List previous chats
    Chats {
        /// Only chats of this mode
        #[arg(short, long)]
        mode: Option<ChatModeKey>,

        /// Include hidden and untitled chats
        #[arg(long)]
        all: bool,
    },

    /// Show the messages of a chat
    Messages {
        chat_id: String,

        /// Also print the chat metadata
        #[arg(long)]
        with_chat: bool,
    },

    /// Hide a chat from the history
    Hide {
        chat_id: String,
    },

    /// Rate a message (positive, negative, none)
    Feedback {
        message_id: String,

        feedback: MessageFeedback,

        /// Free-text comment
        #[arg(long)]
        comment: Option<String>,
    },

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Initialize configuration file with defaults
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., api.base_url, stream.read_timeout_secs)
        key: String,

        /// Value to set
        value: String,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.unwrap_or_else(Config::default_path);

    let command = match cli.command {
        Commands::Config(cmd) => return run_config_command(cmd, config_path),
        command => command,
    };

    let config = Config::load_from(config_path)?;
    let client = ChatApiClient::from_config(&config)?;

    match command {
        Commands::Ask {
            prompt,
            mode,
            chat_id,
            model,
            knowledge_base,
        } => {
            let mut request = StreamAnswerRequest::new(prompt, mode);
            request.conversation_id = chat_id;
            request.language_model_key = model;
            request.knowledge_base_key = knowledge_base;
            run_ask(&client, request).await?;
        }
        Commands::Stop { chat_id } => {
            let reply = client.stop_stream(&chat_id).await?;
            println!("{}", reply.unwrap_or_else(|| "stop requested".to_string()));
        }
        Commands::Health => {
            let health = client.health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Commands::Chats { mode, all } => {
            let chats = client.chats(mode).await?;
            for chat in chats.iter().filter(|c| all || c.is_listable()) {
                println!(
                    "{}  {}  {}",
                    chat.id,
                    chat.created_at.as_deref().unwrap_or("-"),
                    chat.title.as_deref().unwrap_or("(untitled)")
                );
            }
        }
        Commands::Messages { chat_id, with_chat } => {
            run_messages(&client, &chat_id, with_chat).await?;
        }
        Commands::Hide { chat_id } => {
            let hidden = client.hide_chat(&chat_id).await?;
            println!("{} hidden: {}", hidden.id, hidden.hidden);
        }
        Commands::Feedback {
            message_id,
            feedback,
            comment,
        } => {
            let response = client.send_feedback(&message_id, feedback, comment).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Config(_) => unreachable!("handled above"),
    }

    info!(correlation_id = %client.correlation_id(), "done");
    Ok(())
}

/// How an `ask` ended under user interrupts
enum AskOutcome {
    Finished(StreamAnswerResult),
    Abandoned,
}

/// How long a pending stop request may delay exit once the stream is over
const STOP_GRACE: Duration = Duration::from_secs(3);

async fn run_ask(client: &ChatApiClient, request: StreamAnswerRequest) -> Result<()> {
    let (tx, mut interrupts) = mpsc::channel(4);
    let forward = tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(()).await.is_err() {
                break;
            }
        }
    });

    let outcome =
        stream_with_interrupts(client, &request, &mut interrupts, &mut std::io::stdout()).await;
    forward.abort();

    let result = match outcome? {
        AskOutcome::Finished(result) => result,
        AskOutcome::Abandoned => bail!("interrupted twice, stream abandoned"),
    };

    println!();
    if result.is_cancelled() {
        eprintln!("--- stopped ---");
    }
    if let Some(id) = &result.new_chat_id {
        eprintln!("chat id: {}", id);
    }
    let correlation_id = client.correlation_id();
    if !correlation_id.is_empty() {
        eprintln!("correlation id: {}", correlation_id);
    }

    Ok(())
}

/// Stream `request` into `out` until it ends or the user gives up.
///
/// The first interrupt cancels locally at the next fragment and asks the
/// backend to stop. A second one drops the stream even if a read is stuck.
async fn stream_with_interrupts<W: Write>(
    client: &ChatApiClient,
    request: &StreamAnswerRequest,
    interrupts: &mut mpsc::Receiver<()>,
    out: &mut W,
) -> Result<AskOutcome> {
    let session = SessionToken::new();
    let known_chat_id = Mutex::new(request.conversation_id.clone());
    let mut stop_task: Option<JoinHandle<()>> = None;

    let stream = client.stream_answer(request, &session, |chunk, new_chat_id| {
        if let Some(id) = new_chat_id {
            let mut known = known_chat_id.lock().unwrap_or_else(|e| e.into_inner());
            if known.is_none() {
                *known = Some(id.to_string());
            }
        }
        let _ = write!(out, "{}", chunk);
        let _ = out.flush();
    });
    tokio::pin!(stream);

    let outcome = loop {
        tokio::select! {
            result = &mut stream => break AskOutcome::Finished(result?),
            Some(()) = interrupts.recv() => {
                if let Some(task) = stop_task.take() {
                    task.abort();
                    break AskOutcome::Abandoned;
                }

                session.advance();
                let chat_id = known_chat_id
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone();
                let client = client.clone();
                stop_task = Some(tokio::spawn(async move {
                    if let Some(chat_id) = chat_id {
                        if let Err(e) = client.stop_stream(&chat_id).await {
                            warn!(error = %e, "stop request failed");
                        }
                    }
                }));
            }
        }
    };

    if let Some(task) = stop_task {
        if tokio::time::timeout(STOP_GRACE, task).await.is_err() {
            warn!("stop request still pending, giving up");
        }
    }

    Ok(outcome)
}

async fn run_messages(client: &ChatApiClient, chat_id: &str, with_chat: bool) -> Result<()> {
    let messages = if with_chat {
        let data = client.chat_with_messages(chat_id).await?;
        if let Some(chat) = &data.chat {
            println!("# {}", chat.title.as_deref().unwrap_or(&chat.id));
        }
        data.messages
    } else {
        client.chat_messages(chat_id).await?
    };

    for message in messages {
        println!("[{:?}] {}", message.role, message.content);
        if let Some(sources) = &message.sources {
            for (index, source) in sources {
                println!(
                    "    [{}] {}{}",
                    index,
                    source.file_name.as_deref().unwrap_or("?"),
                    source
                        .page_label
                        .as_deref()
                        .map(|p| format!(" p.{}", p))
                        .unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}

fn run_config_command(cmd: ConfigCommands, path: PathBuf) -> Result<()> {
    match cmd {
        ConfigCommands::Init { force } => config_init(force, path)?,
        ConfigCommands::Show => config_show(path)?,
        ConfigCommands::Set { key, value } => config_set(&key, &value, path)?,
        ConfigCommands::Path => println!("{}", path.display()),
        ConfigCommands::Validate => config_validate(path)?,
    }
    Ok(())
}

fn config_init(force: bool, path: PathBuf) -> Result<()> {
    if path.exists() && !force {
        println!("Configuration file already exists at: {}", path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    Config::default().save_to(path.clone())?;

    println!("Configuration file created at: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file to set api.base_url and api.api_key, or");
    println!("  2. Set environment variables:");
    println!("     export CHAT_API_URL=https://your-backend/api");
    println!("     export CHAT_API_KEY=your_api_key");
    println!("     export CHAT_AUTH_TOKEN=your_bearer_token");

    Ok(())
}

fn config_show(path: PathBuf) -> Result<()> {
    let mut config = Config::load_from(path)?;

    // Mask secrets in display
    if config.api.api_key.is_some() {
        config.api.api_key = Some("***".to_string());
    }
    if config.auth.token.is_some() {
        config.auth.token = Some("***".to_string());
    }

    println!("{}", toml::to_string_pretty(&config)?);

    println!("\n--- Environment Variables ---");
    for var in ["CHAT_API_URL", "CHAT_API_KEY", config.auth.token_env.as_str()] {
        println!(
            "{}: {}",
            var,
            if std::env::var(var).is_ok() { "set" } else { "not set" }
        );
    }

    Ok(())
}

fn config_set(key: &str, value: &str, path: PathBuf) -> Result<()> {
    let mut config = Config::load_from(path.clone())?;

    let parts: Vec<&str> = key.split('.').collect();
    if parts.len() != 2 {
        println!("Invalid key format. Use: section.key (e.g., api.base_url)");
        return Ok(());
    }

    match (parts[0], parts[1]) {
        ("api", "base_url") => config.api.base_url = value.to_string(),
        ("api", "api_key") => config.api.api_key = Some(value.to_string()),
        ("api", "request_timeout_secs") => config.api.request_timeout_secs = Some(value.parse()?),
        ("auth", "token") => config.auth.token = Some(value.to_string()),
        ("auth", "token_env") => config.auth.token_env = value.to_string(),
        ("stream", "read_timeout_secs") => config.stream.read_timeout_secs = Some(value.parse()?),
        ("correlation", "missing_header") => {
            config.correlation.missing_header = match value {
                "clear" => CorrelationPolicy::ClearOnMissing,
                "keep" => CorrelationPolicy::KeepLastSeen,
                _ => {
                    println!("Available: clear, keep");
                    return Ok(());
                }
            }
        }
        _ => {
            println!("Unknown key: {}", key);
            println!("Available: api.base_url, api.api_key, api.request_timeout_secs, auth.token, auth.token_env, stream.read_timeout_secs, correlation.missing_header");
            return Ok(());
        }
    }

    config.save_to(path)?;
    println!("Set {} = {}", key, value);
    Ok(())
}

fn config_validate(path: PathBuf) -> Result<()> {
    let config = Config::load_from(path)?;
    match config.validate() {
        Ok(()) => println!("Configuration is valid"),
        Err(e) => println!("Configuration error: {}", e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_stream::api::{
        CorrelationTracker, Endpoints, HeaderComposer, StaticTokenProvider, TracingTelemetry,
    };
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ChatApiClient {
        ChatApiClient::new(
            Endpoints::new(&server.uri()).unwrap(),
            HeaderComposer::new(Arc::new(StaticTokenProvider::new("tok")), "key-1"),
            CorrelationTracker::default(),
            Arc::new(TracingTelemetry),
        )
    }

    #[tokio::test]
    async fn test_stream_without_interrupts_finishes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat-service/chat/stream/start"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Hi there"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let request = StreamAnswerRequest::new("hello", ChatModeKey::Generic);
        let (_tx, mut interrupts) = mpsc::channel(4);
        let mut out = Vec::new();

        let outcome = stream_with_interrupts(&client, &request, &mut interrupts, &mut out)
            .await
            .unwrap();

        match outcome {
            AskOutcome::Finished(result) => assert_eq!(result.final_answer, "Hi there"),
            AskOutcome::Abandoned => panic!("stream should have finished"),
        }
        assert_eq!(out, b"Hi there");
    }

    #[tokio::test]
    async fn test_second_interrupt_abandons_stalled_stream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat-service/chat/stream/start"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("too late")
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let request =
            StreamAnswerRequest::new("hello", ChatModeKey::Generic).in_conversation("chat-42");
        let (tx, mut interrupts) = mpsc::channel(4);
        tx.send(()).await.unwrap();
        tx.send(()).await.unwrap();
        let mut out = Vec::new();

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            stream_with_interrupts(&client, &request, &mut interrupts, &mut out),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(matches!(outcome, AskOutcome::Abandoned));
        assert!(out.is_empty());
    }
}
