// src/dispatch.rs
//! Turns a matched item into a notification request with a replay-safe
//! key and forwards it to the channel. The key (the item's own id) is
//! the only guard against duplicate user-visible notifications when a
//! partially-dispatched cycle is retried, so it must be stable across
//! retries: nothing derived from time or attempt count.

use std::sync::Arc;

use metrics::counter;

use crate::error::PollError;
use crate::notify::Notifier;
use crate::sources::Match;
use crate::state::ReplayLog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub replay_key: String,
    pub channel: String,
    pub text: String,
}

impl NotificationRequest {
    pub fn for_match(m: &Match) -> Self {
        Self {
            replay_key: m.item.id.clone(),
            channel: m.channel.clone(),
            // The notification body is the item's link; readers click
            // through for context.
            text: m.item.url.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    /// Key was already in the replay log; nothing was sent.
    Replayed,
}

/// One dispatcher per adapter instantiation; the replay log is scoped
/// by the adapter id it is constructed with.
pub struct Dispatcher {
    adapter_id: String,
    notifier: Arc<dyn Notifier>,
    replay: Arc<dyn ReplayLog>,
}

impl Dispatcher {
    pub fn new(
        adapter_id: impl Into<String>,
        notifier: Arc<dyn Notifier>,
        replay: Arc<dyn ReplayLog>,
    ) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            notifier,
            replay,
        }
    }

    pub async fn dispatch(&self, m: &Match) -> Result<DispatchOutcome, PollError> {
        let req = NotificationRequest::for_match(m);

        if self.replay.seen(&self.adapter_id, &req.replay_key) {
            tracing::debug!(
                adapter = %self.adapter_id,
                key = %req.replay_key,
                "already notified, skipping replay"
            );
            counter!("notify_replayed_total").increment(1);
            return Ok(DispatchOutcome::Replayed);
        }

        self.notifier
            .send(&req.channel, &req.text)
            .await
            .map_err(|e| PollError::dispatch(&req.channel, e))?;

        // Record only after a successful send: an unsent key must stay
        // eligible for the retried cycle.
        self.replay
            .record(&self.adapter_id, &req.replay_key)
            .map_err(|e| PollError::cursor(&self.adapter_id, e))?;

        counter!("notify_sent_total").increment(1);
        tracing::info!(
            adapter = %self.adapter_id,
            channel = %req.channel,
            key = %req.replay_key,
            url = %req.text,
            "notification sent"
        );
        Ok(DispatchOutcome::Sent)
    }
}
