// tests/cycle_controller.rs
//! Controller semantics: the cursor advances if and only if the whole
//! fetch/filter/dispatch sequence succeeded, and the replay log is the
//! only thing standing between a retried cycle and duplicate
//! notifications.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use social_listening::cycle::{run_cycle, CycleOutcome};
use social_listening::dispatch::Dispatcher;
use social_listening::error::PollError;
use social_listening::notify::Notifier;
use social_listening::sources::{Item, ItemWalk, SourceAdapter};
use social_listening::state::{CursorStore, MemoryStateStore, ReplayLog};

fn item(id: &str, text: &str) -> Item {
    Item {
        id: id.to_string(),
        kind: "story".to_string(),
        url: format!("https://example.test/{id}"),
        text: text.to_string(),
        published_at: 0,
    }
}

/// One scripted batch per `open` call; `fail_after` injects a fetch
/// error after that many items have been yielded.
struct Batch {
    items: Vec<Item>,
    end: Option<String>,
    fail_after: Option<usize>,
}

struct ScriptedSource {
    id: String,
    batches: Mutex<VecDeque<Batch>>,
    opened_with: Mutex<Vec<Option<String>>>,
}

impl ScriptedSource {
    fn new(id: &str, batches: Vec<Batch>) -> Self {
        Self {
            id: id.to_string(),
            batches: Mutex::new(batches.into()),
            opened_with: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SourceAdapter for ScriptedSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn open(
        &self,
        cursor: Option<&str>,
        _keyword: &str,
    ) -> Result<Box<dyn ItemWalk + Send>, PollError> {
        self.opened_with.lock().push(cursor.map(str::to_string));
        let batch = self
            .batches
            .lock()
            .pop_front()
            .expect("scripted source ran out of batches");
        Ok(Box::new(ScriptedWalk {
            items: batch.items.into(),
            end: batch.end,
            fail_after: batch.fail_after,
            yielded: 0,
        }))
    }
}

struct ScriptedWalk {
    items: VecDeque<Item>,
    end: Option<String>,
    fail_after: Option<usize>,
    yielded: usize,
}

#[async_trait]
impl ItemWalk for ScriptedWalk {
    async fn next_item(&mut self) -> Result<Option<Item>, PollError> {
        if self.fail_after == Some(self.yielded) {
            return Err(PollError::fetch("scripted", "mid-range failure"));
        }
        self.yielded += 1;
        Ok(self.items.pop_front())
    }

    fn end_cursor(&self) -> Option<String> {
        self.end.clone()
    }
}

/// Records every delivered message; can fail exactly one attempt.
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    attempts: Mutex<usize>,
    fail_at_attempt: Mutex<Option<usize>>,
}

impl RecordingNotifier {
    fn fail_at(self, attempt: usize) -> Self {
        *self.fail_at_attempt.lock() = Some(attempt);
        self
    }

    fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, t)| t.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, channel: &str, text: &str) -> Result<()> {
        let mut attempts = self.attempts.lock();
        *attempts += 1;
        let mut fail = self.fail_at_attempt.lock();
        if *fail == Some(*attempts) {
            *fail = None;
            bail!("simulated channel failure");
        }
        self.sent.lock().push((channel.to_string(), text.to_string()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

fn dispatcher(
    adapter_id: &str,
    notifier: &Arc<RecordingNotifier>,
    store: &Arc<MemoryStateStore>,
) -> Dispatcher {
    Dispatcher::new(
        adapter_id,
        Arc::clone(notifier) as Arc<dyn Notifier>,
        Arc::clone(store) as Arc<dyn ReplayLog>,
    )
}

#[tokio::test]
async fn successful_cycle_advances_cursor_and_notifies_matches() {
    let source = ScriptedSource::new(
        "hn",
        vec![Batch {
            items: vec![
                item("1", "dagster in the title"),
                item("2", "unrelated"),
                item("3", "more Dagster news"),
            ],
            end: Some("3".into()),
            fail_after: None,
        }],
    );
    let store = Arc::new(MemoryStateStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let d = dispatcher("hn", &notifier, &store);

    let outcome = run_cycle(&source, "dagster", "#feed", store.as_ref(), &d)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Completed {
            examined: 3,
            matched: 2,
            sent: 2,
            replayed: 0,
            cursor: "3".into(),
        }
    );
    assert_eq!(store.load("hn").unwrap().as_deref(), Some("3"));
    assert_eq!(
        notifier.sent_texts(),
        vec!["https://example.test/1", "https://example.test/3"]
    );
}

#[tokio::test]
async fn non_matching_range_still_advances_cursor() {
    let source = ScriptedSource::new(
        "hn",
        vec![Batch {
            items: vec![item("10", "nothing"), item("11", "here")],
            end: Some("11".into()),
            fail_after: None,
        }],
    );
    let store = Arc::new(MemoryStateStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let d = dispatcher("hn", &notifier, &store);

    let outcome = run_cycle(&source, "dagster", "#feed", store.as_ref(), &d)
        .await
        .unwrap();

    match outcome {
        CycleOutcome::Completed {
            examined, matched, ..
        } => {
            assert_eq!(examined, 2);
            assert_eq!(matched, 0);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    // The examined-but-empty range must not be re-fetched forever.
    assert_eq!(store.load("hn").unwrap().as_deref(), Some("11"));
    assert!(notifier.sent_texts().is_empty());
}

#[tokio::test]
async fn empty_feed_skips_without_touching_cursor() {
    let source = ScriptedSource::new(
        "reddit_posts",
        vec![Batch {
            items: vec![],
            end: None,
            fail_after: None,
        }],
    );
    let store = Arc::new(MemoryStateStore::new());
    store.store("reddit_posts", "t3_before").unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let d = dispatcher("reddit_posts", &notifier, &store);

    let outcome = run_cycle(&source, "dagster", "#feed", store.as_ref(), &d)
        .await
        .unwrap();

    assert!(matches!(outcome, CycleOutcome::Skipped { .. }));
    assert_eq!(store.load("reddit_posts").unwrap().as_deref(), Some("t3_before"));
}

#[tokio::test]
async fn fetch_error_mid_range_leaves_cursor_untouched() {
    let source = ScriptedSource::new(
        "hn",
        vec![Batch {
            items: vec![item("1", "dagster"), item("2", "dagster")],
            end: Some("2".into()),
            fail_after: Some(1),
        }],
    );
    let store = Arc::new(MemoryStateStore::new());
    store.store("hn", "0").unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let d = dispatcher("hn", &notifier, &store);

    let err = run_cycle(&source, "dagster", "#feed", store.as_ref(), &d)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "fetch");
    assert_eq!(store.load("hn").unwrap().as_deref(), Some("0"));
}

#[tokio::test]
async fn dispatch_failure_aborts_cycle_and_retry_dedupes_by_replay_key() {
    let matching = vec![
        item("1", "dagster one"),
        item("2", "dagster two"),
        item("3", "dagster three"),
    ];
    // The failed cycle never advances the cursor, so the retry
    // re-fetches the entire range.
    let source = ScriptedSource::new(
        "hn",
        vec![
            Batch {
                items: matching.clone(),
                end: Some("3".into()),
                fail_after: None,
            },
            Batch {
                items: matching,
                end: Some("3".into()),
                fail_after: None,
            },
        ],
    );
    let store = Arc::new(MemoryStateStore::new());
    // Second send attempt fails: item 1 went out, items 2 and 3 did not.
    let notifier = Arc::new(RecordingNotifier::default().fail_at(2));
    let d = dispatcher("hn", &notifier, &store);

    let err = run_cycle(&source, "dagster", "#feed", store.as_ref(), &d)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "dispatch");
    assert_eq!(store.load("hn").unwrap(), None);
    assert_eq!(notifier.sent_texts(), vec!["https://example.test/1"]);

    // Retried cycle: item 1 is replayed (not re-sent), 2 and 3 go out,
    // cursor finally commits.
    let outcome = run_cycle(&source, "dagster", "#feed", store.as_ref(), &d)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Completed {
            examined: 3,
            matched: 3,
            sent: 2,
            replayed: 1,
            cursor: "3".into(),
        }
    );
    assert_eq!(store.load("hn").unwrap().as_deref(), Some("3"));
    assert_eq!(
        notifier.sent_texts(),
        vec![
            "https://example.test/1",
            "https://example.test/2",
            "https://example.test/3"
        ]
    );
}

#[tokio::test]
async fn second_cycle_with_no_new_items_sends_nothing() {
    let source = ScriptedSource::new(
        "hn",
        vec![
            Batch {
                items: vec![item("5", "dagster")],
                end: Some("5".into()),
                fail_after: None,
            },
            // Nothing new upstream: the walk past cursor 5 is empty but
            // still reports 5 as its end.
            Batch {
                items: vec![],
                end: Some("5".into()),
                fail_after: None,
            },
        ],
    );
    let store = Arc::new(MemoryStateStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let d = dispatcher("hn", &notifier, &store);

    run_cycle(&source, "dagster", "#feed", store.as_ref(), &d)
        .await
        .unwrap();
    let second = run_cycle(&source, "dagster", "#feed", store.as_ref(), &d)
        .await
        .unwrap();

    match second {
        CycleOutcome::Completed { matched, sent, .. } => {
            assert_eq!(matched, 0);
            assert_eq!(sent, 0);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(notifier.sent_texts().len(), 1);
    // The second open saw the cursor the first cycle committed.
    let opened = source.opened_with.lock().clone();
    assert_eq!(opened, vec![None, Some("5".to_string())]);
}

#[tokio::test]
async fn sibling_instantiations_keep_disjoint_cursors() {
    let posts = ScriptedSource::new(
        "reddit_posts",
        vec![Batch {
            items: vec![item("t3_p", "dagster post")],
            end: Some("t3_p".into()),
            fail_after: None,
        }],
    );
    let comments = ScriptedSource::new(
        "reddit_comments",
        vec![Batch {
            items: vec![item("t1_c", "dagster comment")],
            end: Some("t1_c".into()),
            fail_after: None,
        }],
    );
    let store = Arc::new(MemoryStateStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let d_posts = dispatcher("reddit_posts", &notifier, &store);
    let d_comments = dispatcher("reddit_comments", &notifier, &store);

    run_cycle(&posts, "dagster", "#posts", store.as_ref(), &d_posts)
        .await
        .unwrap();
    run_cycle(&comments, "dagster", "#comments", store.as_ref(), &d_comments)
        .await
        .unwrap();

    assert_eq!(store.load("reddit_posts").unwrap().as_deref(), Some("t3_p"));
    assert_eq!(store.load("reddit_comments").unwrap().as_deref(), Some("t1_c"));
}
