use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use helper_bot::bot::{Bot, build_dialogs};
use helper_bot::channels::{ChannelManager, CliChannel, TelegramChannel, WebChatChannel};
use helper_bot::config::BotConfig;
use helper_bot::llm::{create_embedder, create_provider};
use helper_bot::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let config = BotConfig::from_env().context("Invalid configuration")?;

    // Initialize tracing; the guard flushes the file writer on exit.
    let (file_layer, _log_guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "helper-bot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    eprintln!("🤖 Helper Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!(
        "   Web Q&A: {}",
        if config.web_qa_enabled() { "enabled" } else { "disabled" }
    );

    let llm = create_provider(&config.llm)?;
    let embeddings = config.embedding.as_ref().map(create_embedder).transpose()?;

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );

    let dialogs = build_dialogs(llm, embeddings, &config.retrieval);
    let bot = Bot::new(dialogs, db).with_transcripts(config.transcripts);

    // ── Channels ─────────────────────────────────────────────────────────
    let mut channels = ChannelManager::new();
    channels.add(Box::new(CliChannel::new()));

    if let Some(port) = config.ws_port {
        let webchat = WebChatChannel::new();
        let app = webchat.router();
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
            .await
            .with_context(|| format!("Failed to bind web chat port {port}"))?;
        tokio::spawn(async move {
            tracing::info!(port, "Web chat server started");
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Web chat server stopped: {e}");
            }
        });
        eprintln!("   Chat WS: ws://0.0.0.0:{port}/ws/chat");
        channels.add(Box::new(webchat));
    }

    if let Some(telegram) = config.telegram {
        eprintln!(
            "   Telegram: enabled (allowed: {})",
            if telegram.allowed_users.iter().any(|u| u == "*") {
                "everyone".to_string()
            } else {
                telegram.allowed_users.join(", ")
            }
        );
        channels.add(Box::new(TelegramChannel::new(
            telegram.bot_token,
            telegram.allowed_users,
        )));
    }

    eprintln!("   Type a message and press Enter. /help for commands, /quit to exit.\n");

    bot.run(Arc::new(channels)).await?;
    Ok(())
}
