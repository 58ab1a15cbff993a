// src/scheduler.rs
//! The scheduling harness: one tokio task per adapter instantiation,
//! ticking at that adapter's interval. A task runs its cycles strictly
//! in sequence, which is what guarantees a single in-flight cycle per
//! cursor. Outcomes land on a shared status board for the HTTP surface.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cycle::{run_cycle, CycleOutcome};
use crate::dispatch::Dispatcher;
use crate::error::PollError;
use crate::sources::SourceAdapter;
use crate::state::CursorStore;

#[derive(Debug, Clone)]
pub struct PollerCfg {
    pub keyword: String,
    pub channel: String,
    /// Shorter for the cheap ID-walk source so the unprocessed range
    /// stays small; longer for the rate-limited search feed.
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AdapterStatus {
    pub cycles: u64,
    pub errors: u64,
    pub matched_total: u64,
    pub sent_total: u64,
    pub cursor: Option<String>,
    pub last_outcome: Option<String>,
    pub last_error: Option<String>,
    pub last_run: Option<DateTime<Utc>>,
}

/// Shared, read-mostly view of every poller's latest state.
#[derive(Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<HashMap<String, AdapterStatus>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_outcome(&self, adapter_id: &str, outcome: &CycleOutcome) {
        let mut map = self.inner.write().expect("status lock");
        let entry = map.entry(adapter_id.to_string()).or_default();
        entry.cycles += 1;
        entry.last_run = Some(Utc::now());
        entry.last_error = None;
        match outcome {
            CycleOutcome::Skipped { reason } => {
                entry.last_outcome = Some(format!("skipped: {reason}"));
            }
            CycleOutcome::Completed {
                examined,
                matched,
                sent,
                cursor,
                ..
            } => {
                entry.matched_total += *matched as u64;
                entry.sent_total += *sent as u64;
                entry.cursor = Some(cursor.clone());
                entry.last_outcome =
                    Some(format!("examined {examined}, matched {matched}, sent {sent}"));
            }
        }
    }

    pub fn record_error(&self, adapter_id: &str, err: &PollError) {
        let mut map = self.inner.write().expect("status lock");
        let entry = map.entry(adapter_id.to_string()).or_default();
        entry.cycles += 1;
        entry.errors += 1;
        entry.last_run = Some(Utc::now());
        entry.last_error = Some(err.to_string());
    }

    pub fn snapshot(&self) -> BTreeMap<String, AdapterStatus> {
        let map = self.inner.read().expect("status lock");
        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// Spawn the poll loop for one adapter instantiation. The loop never
/// exits on its own: every error is cycle-scoped, logged, and retried
/// at the next tick.
pub fn spawn_poller(
    adapter: Arc<dyn SourceAdapter>,
    cfg: PollerCfg,
    store: Arc<dyn CursorStore>,
    dispatcher: Arc<Dispatcher>,
    board: StatusBoard,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let adapter_id = adapter.id().to_string();
        let mut ticker = tokio::time::interval(Duration::from_secs(cfg.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            adapter = %adapter_id,
            channel = %cfg.channel,
            interval_secs = cfg.interval_secs,
            "poller started"
        );

        loop {
            ticker.tick().await;

            let result = run_cycle(
                adapter.as_ref(),
                &cfg.keyword,
                &cfg.channel,
                store.as_ref(),
                &dispatcher,
            )
            .await;

            counter!("poll_cycles_total", "adapter" => adapter_id.clone()).increment(1);
            gauge!("poll_last_run_ts", "adapter" => adapter_id.clone())
                .set(Utc::now().timestamp() as f64);

            match result {
                Ok(outcome) => {
                    board.record_outcome(&adapter_id, &outcome);
                    match &outcome {
                        CycleOutcome::Completed {
                            examined, matched, ..
                        } if *matched > 0 => {
                            tracing::info!(
                                adapter = %adapter_id,
                                examined,
                                matched,
                                "cycle found mentions"
                            );
                        }
                        _ => {
                            tracing::debug!(adapter = %adapter_id, outcome = ?outcome, "cycle done");
                        }
                    }
                }
                Err(e) => {
                    board.record_error(&adapter_id, &e);
                    counter!(
                        "poll_cycle_errors_total",
                        "adapter" => adapter_id.clone(),
                        "kind" => e.kind()
                    )
                    .increment(1);
                    tracing::warn!(adapter = %adapter_id, error = %e, "cycle failed, will retry");
                }
            }
        }
    })
}
