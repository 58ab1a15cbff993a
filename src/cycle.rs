// src/cycle.rs
//! One poll cycle: load cursor → open the walk → filter and dispatch
//! item by item, oldest first → advance the cursor. The cursor is
//! written if and only if everything before it succeeded, so an abort
//! anywhere leaves the previous cursor in place and the next scheduled
//! tick re-examines the same range. There is no retry inside a cycle;
//! the schedule is the retry.

use metrics::counter;

use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::error::PollError;
use crate::relevance::keyword_matches;
use crate::sources::{Match, SourceAdapter};
use crate::state::CursorStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The source had nothing at all; the cursor was left untouched.
    Skipped { reason: &'static str },
    /// The cycle ran to the end and committed `cursor`.
    Completed {
        examined: usize,
        matched: usize,
        sent: usize,
        replayed: usize,
        cursor: String,
    },
}

pub async fn run_cycle(
    adapter: &dyn SourceAdapter,
    keyword: &str,
    channel: &str,
    store: &dyn CursorStore,
    dispatcher: &Dispatcher,
) -> Result<CycleOutcome, PollError> {
    crate::metrics::ensure_described();

    let adapter_id = adapter.id();
    let cursor = store
        .load(adapter_id)
        .map_err(|e| PollError::cursor(adapter_id, e))?;

    tracing::debug!(adapter = adapter_id, cursor = ?cursor, "cycle start");

    let mut walk = adapter.open(cursor.as_deref(), keyword).await?;

    let mut examined = 0usize;
    let mut matched = 0usize;
    let mut sent = 0usize;
    let mut replayed = 0usize;

    while let Some(item) = walk.next_item().await? {
        examined += 1;
        counter!("poll_items_examined_total", "adapter" => adapter_id.to_string()).increment(1);

        if !keyword_matches(&item.text, keyword) {
            continue;
        }
        matched += 1;
        counter!("poll_matches_total", "adapter" => adapter_id.to_string()).increment(1);

        let m = Match {
            item,
            channel: channel.to_string(),
        };
        match dispatcher.dispatch(&m).await? {
            DispatchOutcome::Sent => sent += 1,
            DispatchOutcome::Replayed => replayed += 1,
        }
    }

    // The walk decides whether there is anything to commit: the ID-walk
    // source always reports the max it saw (so an all-miss range is not
    // re-fetched forever), the search feed reports nothing on an empty
    // page.
    let Some(next) = walk.end_cursor() else {
        tracing::debug!(adapter = adapter_id, "nothing to do");
        return Ok(CycleOutcome::Skipped {
            reason: "no new items",
        });
    };

    store
        .store(adapter_id, &next)
        .map_err(|e| PollError::cursor(adapter_id, e))?;

    tracing::debug!(
        adapter = adapter_id,
        examined,
        matched,
        cursor = %next,
        "cycle committed"
    );

    Ok(CycleOutcome::Completed {
        examined,
        matched,
        sent,
        replayed,
        cursor: next,
    })
}
