//! Social-Listening Daemon: Binary Entrypoint
//! Boots the pollers (one per adapter instantiation) and the small
//! observability HTTP surface, then runs until interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use social_listening::api::{self, AppState};
use social_listening::config::AppConfig;
use social_listening::dispatch::Dispatcher;
use social_listening::metrics::Metrics;
use social_listening::notify::{NoopNotifier, Notifier, SlackNotifier};
use social_listening::scheduler::{spawn_poller, PollerCfg, StatusBoard};
use social_listening::sources::hackernews::HackerNewsSource;
use social_listening::sources::reddit::{RedditCredentials, RedditSearchSource};
use social_listening::sources::SourceAdapter;
use social_listening::state::{CursorStore, FileStateStore, ReplayLog};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("social_listening=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

/// Every external call shares this client; a stalled source or channel
/// fails the cycle instead of hanging it.
fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(15))
        .build()
        .context("building http client")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load()?;
    tracing::info!(keyword = %cfg.keyword, dry_run = cfg.dry_run, "starting social listening");

    let client = http_client()?;

    let notifier: Arc<dyn Notifier> = if cfg.dry_run {
        Arc::new(NoopNotifier)
    } else {
        match SlackNotifier::from_env(client.clone()) {
            Some(slack) => Arc::new(slack),
            None => {
                tracing::warn!("SLACK_BOT_TOKEN unset, notifications are dry-run only");
                Arc::new(NoopNotifier)
            }
        }
    };

    let store = Arc::new(FileStateStore::open(&cfg.state_path)?);
    let board = StatusBoard::new();
    let metrics = Metrics::init();

    let mut pollers = Vec::new();

    // Hacker News: sequential-ID walk.
    pollers.push(spawn(
        Arc::new(HackerNewsSource::new(client.clone())),
        PollerCfg {
            keyword: cfg.keyword.clone(),
            channel: cfg.hackernews.channel.clone(),
            interval_secs: cfg.hackernews.interval_secs,
        },
        &store,
        &notifier,
        &board,
    ));

    // Reddit search feed, posts and comments as independent cycles with
    // independent cursors and destinations.
    match RedditCredentials::from_env() {
        Some(creds) => {
            pollers.push(spawn(
                Arc::new(RedditSearchSource::posts(client.clone(), creds.clone())),
                PollerCfg {
                    keyword: cfg.keyword.clone(),
                    channel: cfg.reddit_posts.channel.clone(),
                    interval_secs: cfg.reddit_posts.interval_secs,
                },
                &store,
                &notifier,
                &board,
            ));
            pollers.push(spawn(
                Arc::new(RedditSearchSource::comments(client.clone(), creds)),
                PollerCfg {
                    keyword: cfg.keyword.clone(),
                    channel: cfg.reddit_comments.channel.clone(),
                    interval_secs: cfg.reddit_comments.interval_secs,
                },
                &store,
                &notifier,
                &board,
            ));
        }
        None => {
            tracing::warn!("Reddit credentials incomplete, Reddit pollers disabled");
        }
    }

    let state = AppState {
        board,
        started: Utc::now(),
    };
    let router = api::create_router(state).merge(metrics.router());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding port {port}"))?;
    tracing::info!(port, pollers = pollers.len(), "serving status endpoint");

    axum::serve(listener, router).await.context("http server")?;
    Ok(())
}

fn spawn(
    adapter: Arc<dyn SourceAdapter>,
    cfg: PollerCfg,
    store: &Arc<FileStateStore>,
    notifier: &Arc<dyn Notifier>,
    board: &StatusBoard,
) -> tokio::task::JoinHandle<()> {
    let dispatcher = Arc::new(Dispatcher::new(
        adapter.id(),
        Arc::clone(notifier),
        Arc::clone(store) as Arc<dyn ReplayLog>,
    ));
    spawn_poller(
        adapter,
        cfg,
        Arc::clone(store) as Arc<dyn CursorStore>,
        dispatcher,
        board.clone(),
    )
}
