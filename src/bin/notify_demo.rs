//! Demo that pushes one synthetic match through the dispatcher
//! (stdout/log only when SLACK_BOT_TOKEN is unset).

use std::sync::Arc;

use social_listening::dispatch::Dispatcher;
use social_listening::notify::{NoopNotifier, Notifier, SlackNotifier};
use social_listening::sources::{Item, Match};
use social_listening::state::MemoryStateStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();
    let _ = dotenvy::dotenv();

    let channel = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "#social-feed-test".to_string());

    let client = reqwest::Client::new();
    let notifier: Arc<dyn Notifier> = match SlackNotifier::from_env(client) {
        Some(slack) => Arc::new(slack),
        None => {
            eprintln!("SLACK_BOT_TOKEN unset; running against the no-op notifier");
            Arc::new(NoopNotifier)
        }
    };

    let dispatcher = Dispatcher::new("notify_demo", notifier, Arc::new(MemoryStateStore::new()));

    let m = Match {
        item: Item {
            id: "demo-1".into(),
            kind: "story".into(),
            url: "https://news.ycombinator.com/item?id=1".into(),
            text: "demo mention".into(),
            published_at: 0,
        },
        channel,
    };

    match dispatcher.dispatch(&m).await {
        Ok(outcome) => println!("notify-demo done: {outcome:?}"),
        Err(e) => eprintln!("notify-demo failed: {e}"),
    }
}
