//! Backend event topics and the per-subscription event queue.
//!
//! The backend publishes [`LedgerEvent`]s tagged with a [`Topic`]. Each
//! session subscribes to all five topics under its own
//! [`SubscriptionKey`](crate::ids::SubscriptionKey) and receives them
//! through an [`EventSource`], a bounded queue of depth
//! [`SUBSCRIPTION_DEPTH`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::ids::SubscriptionKey;
use crate::ledger::{Block, Transaction};

/// Depth of every per-subscription event queue.
pub const SUBSCRIPTION_DEPTH: usize = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Topic
// ─────────────────────────────────────────────────────────────────────────────

/// Backend event topics a session subscribes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    /// A block was appended to the chain.
    #[serde(rename = "newBlock")]
    NewBlock,
    /// A transaction was accepted into the pending pool.
    #[serde(rename = "newTx:pre")]
    TxPre,
    /// A transaction was rejected before entering the pool.
    #[serde(rename = "newTx:pre:fail")]
    TxPreFail,
    /// A transaction was applied to state.
    #[serde(rename = "newTx:post")]
    TxPost,
    /// A transaction failed while being applied.
    #[serde(rename = "newTx:post:fail")]
    TxPostFail,
}

impl Topic {
    /// Every topic, in subscription order.
    pub const ALL: [Self; 5] = [
        Self::NewBlock,
        Self::TxPre,
        Self::TxPreFail,
        Self::TxPost,
        Self::TxPostFail,
    ];

    /// Backend topic name.
    pub fn name(self) -> &'static str {
        match self {
            Self::NewBlock => "newBlock",
            Self::TxPre => "newTx:pre",
            Self::TxPreFail => "newTx:pre:fail",
            Self::TxPost => "newTx:post",
            Self::TxPostFail => "newTx:post:fail",
        }
    }

    /// Label of the client push carrying events of this topic.
    pub fn push_label(self) -> &'static str {
        match self {
            Self::NewBlock => "BlockAdded",
            Self::TxPre => "TxPre",
            Self::TxPreFail => "TxPreFail",
            Self::TxPost => "TxPost",
            Self::TxPostFail => "TxPostFail",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LedgerEvent
// ─────────────────────────────────────────────────────────────────────────────

/// Payload of a backend event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventPayload {
    /// A block was appended.
    BlockAdded(Block),
    /// A transaction entered the pending pool.
    TxPre(Transaction),
    /// A transaction was rejected on submission.
    TxPreFailed {
        /// The rejected transaction.
        tx: Transaction,
        /// Rejection reason.
        reason: String,
    },
    /// A transaction was applied.
    TxPost(Transaction),
    /// A transaction failed to apply.
    TxPostFailed {
        /// The failed transaction.
        tx: Transaction,
        /// Failure reason.
        reason: String,
    },
}

impl EventPayload {
    /// Topic this payload belongs to.
    pub fn topic(&self) -> Topic {
        match self {
            Self::BlockAdded(_) => Topic::NewBlock,
            Self::TxPre(_) => Topic::TxPre,
            Self::TxPreFailed { .. } => Topic::TxPreFail,
            Self::TxPost(_) => Topic::TxPost,
            Self::TxPostFailed { .. } => Topic::TxPostFail,
        }
    }
}

/// An event published by the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerEvent {
    /// Topic the event was published under.
    pub topic: Topic,
    /// Event payload.
    pub payload: EventPayload,
    /// Name of the publishing component.
    pub source: String,
    /// Publication time.
    pub timestamp: DateTime<Utc>,
}

impl LedgerEvent {
    /// Event tagged with the payload's own topic.
    pub fn new(payload: EventPayload, source: impl Into<String>) -> Self {
        Self {
            topic: payload.topic(),
            payload,
            source: source.into(),
            timestamp: Utc::now(),
        }
    }

    /// Whether the payload kind agrees with the topic tag.
    pub fn is_consistent(&self) -> bool {
        self.payload.topic() == self.topic
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EventSource
// ─────────────────────────────────────────────────────────────────────────────

/// Receiving half of one subscription.
#[derive(Debug)]
pub struct EventSource {
    topic: Topic,
    key: SubscriptionKey,
    rx: mpsc::Receiver<LedgerEvent>,
}

impl EventSource {
    /// Wrap an existing receiver.
    pub fn new(topic: Topic, key: SubscriptionKey, rx: mpsc::Receiver<LedgerEvent>) -> Self {
        Self { topic, key, rx }
    }

    /// Create a bounded subscription queue of depth [`SUBSCRIPTION_DEPTH`].
    pub fn channel(topic: Topic, key: SubscriptionKey) -> (mpsc::Sender<LedgerEvent>, Self) {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_DEPTH);
        (tx, Self::new(topic, key, rx))
    }

    /// Topic this source was opened for.
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Subscription key.
    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    /// Next event, or `None` once the backend dropped the subscription.
    pub async fn recv(&mut self) -> Option<LedgerEvent> {
        self.rx.recv().await
    }
}
