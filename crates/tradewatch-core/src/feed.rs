//! Append-only projection of the simulation log.
//!
//! Every successfully polled event is classified once, counted once and
//! rendered at the end of the feed. Earlier entries are never touched again.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::model::event::{Event, EventKind, Reflection, Trade, Utterance};

/// Running totals shown by the status panel. `total` only counts projected
/// variants, so `total == messages + trades + reflections` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounts {
    pub messages: u64,
    pub trades: u64,
    pub reflections: u64,
    pub total: u64,
}

/// A single rendered row of the feed. `seq` is the position in the feed and
/// increases by one per appended entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub seq: u64,
    pub timestamp: f64,
    pub body: FeedBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedBody {
    /// Marker emitted right before the opening utterance of a conversation.
    ConversationBoundary {
        participants: Vec<String>,
        markov_step: u32,
    },
    Utterance(Utterance),
    Trade(Trade),
    Reflection(Reflection),
}

#[derive(Debug, Default)]
pub struct Feed {
    entries: Vec<FeedEntry>,
}

impl Feed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[FeedEntry] {
        &self.entries
    }

    /// Entries appended at or after `cursor` (a previous `len()`).
    pub fn since(&self, cursor: usize) -> &[FeedEntry] {
        &self.entries[cursor.min(self.entries.len())..]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, timestamp: f64, body: FeedBody) {
        let seq = self.entries.len() as u64;
        self.entries.push(FeedEntry {
            seq,
            timestamp,
            body,
        });
    }
}

/// Result of applying one polled batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Index of the first entry appended by this batch.
    pub first_new: usize,
    pub appended: usize,
    pub counted: u64,
    pub skipped: u64,
}

#[derive(Debug, Default)]
pub struct Reconciler {
    feed: Feed,
    counts: EventCounts,
    /// Every event handed to `apply_batch`, skipped types included.
    received: u64,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    pub fn counts(&self) -> EventCounts {
        self.counts
    }

    /// Number of events received so far, including ones that are not
    /// projected into the feed.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Project a polled batch in the order it was received.
    pub fn apply_batch(&mut self, events: Vec<Event>) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            first_new: self.feed.len(),
            ..BatchOutcome::default()
        };

        for event in events {
            self.received += 1;
            let timestamp = event.timestamp;
            match event.kind {
                EventKind::Utterance(utterance) => {
                    self.counts.messages += 1;
                    if utterance.opens_conversation() {
                        let participants = utterance
                            .participants
                            .clone()
                            .unwrap_or_else(|| vec![utterance.agent.clone()]);
                        self.feed.push(
                            timestamp,
                            FeedBody::ConversationBoundary {
                                participants,
                                markov_step: utterance.markov_step,
                            },
                        );
                    }
                    self.feed.push(timestamp, FeedBody::Utterance(utterance));
                }
                EventKind::Trade(trade) => {
                    self.counts.trades += 1;
                    self.feed.push(timestamp, FeedBody::Trade(trade));
                }
                EventKind::Reflection(reflection) => {
                    self.counts.reflections += 1;
                    self.feed.push(timestamp, FeedBody::Reflection(reflection));
                }
                EventKind::Other { kind, .. } => {
                    tracing::debug!(kind = %kind, "skipping unprojected event type");
                    outcome.skipped += 1;
                    continue;
                }
            }
            self.counts.total += 1;
            outcome.counted += 1;
        }

        outcome.appended = self.feed.len() - outcome.first_new;
        outcome
    }
}

fn local_time(timestamp: f64) -> String {
    let secs = timestamp.floor() as i64;
    let nanos = ((timestamp - timestamp.floor()) * 1e9) as u32;
    match DateTime::from_timestamp(secs, nanos) {
        Some(utc) => utc.with_timezone(&Local).format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}

impl std::fmt::Display for FeedEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.body {
            FeedBody::ConversationBoundary {
                participants,
                markov_step,
            } => {
                write!(f, "💬 {} (Step {markov_step})", participants.join(" → "))
            }
            FeedBody::Utterance(u) => {
                writeln!(
                    f,
                    "Step {} • Turn {}    {}",
                    u.markov_step,
                    u.conversation_turn,
                    local_time(self.timestamp)
                )?;
                write!(f, "{}: {}", u.agent, u.text)
            }
            FeedBody::Trade(t) => {
                let items = t
                    .items()
                    .iter()
                    .map(|item| format!("{} {} (${})", item.quantity, item.name, item.value))
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(
                    f,
                    "Step {} • Turn {} [TRADE]    {}",
                    t.markov_step,
                    t.conversation_turn,
                    local_time(self.timestamp)
                )?;
                write!(f, "{} → {}: {items}", t.seller(), t.buyer())
            }
            FeedBody::Reflection(r) => {
                writeln!(f, "Step {} [REFLECTION]    {}", r.markov_step, local_time(self.timestamp))?;
                write!(f, "{} reflecting on: {}", r.agent, r.anchor)?;
                for thought in &r.thoughts {
                    write!(f, "\n  - {thought}")?;
                }
                Ok(())
            }
        }
    }
}
