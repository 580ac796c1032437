//! The ledger backend contract.
//!
//! The gateway never touches chain storage directly; everything goes through
//! [`Ledger`]. Implementations must be safe to call from many sessions at
//! once.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::LedgerError;
use crate::events::{EventSource, Topic};
use crate::ids::SubscriptionKey;
use crate::ledger::{Account, Block, WorldState};

/// Whether `hash` is the "no parent" sentinel that terminates a history walk.
pub fn is_sentinel_hash(hash: &str) -> bool {
    hash.bytes().all(|b| b == b'0')
}

/// Await `fut`, failing with [`LedgerError::Timeout`] after `limit`.
/// `None` waits indefinitely.
pub async fn with_deadline<T, F>(limit: Option<Duration>, fut: F) -> Result<T, LedgerError>
where
    F: Future<Output = Result<T, LedgerError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| LedgerError::Timeout(limit))?,
        None => fut.await,
    }
}

/// Local key management: the addresses a node signs for.
pub trait KeyManager: Send + Sync {
    /// Address used as sender for new transactions.
    fn active_address(&self) -> String;

    /// Every managed address.
    fn addresses(&self) -> Vec<String>;

    /// Generate and manage a new address.
    fn new_address(&self) -> Result<String, LedgerError>;

    /// Switch the active address to a managed one.
    fn set_address(&self, address: &str) -> Result<(), LedgerError>;
}

/// Chain queries, transaction submission, and event subscription.
#[async_trait]
pub trait Ledger: KeyManager {
    /// Number of blocks in the chain, genesis included.
    async fn block_count(&self) -> Result<u64, LedgerError>;

    /// Hash of the chain head.
    async fn latest_block_hash(&self) -> Result<String, LedgerError>;

    /// Block by hash, `None` when unknown.
    async fn block(&self, hash: &str) -> Result<Option<Block>, LedgerError>;

    /// Account by address, `None` when it does not exist.
    async fn account(&self, address: &str) -> Result<Option<Account>, LedgerError>;

    /// Every account, in export order.
    async fn world_state(&self) -> Result<WorldState, LedgerError>;

    /// Submit a value transfer. Returns the transaction hash.
    async fn tx(&self, recipient: &str, amount: &str) -> Result<String, LedgerError>;

    /// Submit a message call carrying `data` lines. Returns the transaction hash.
    async fn msg(&self, recipient: &str, data: &[String]) -> Result<String, LedgerError>;

    /// Compile `code` in `lang` and deploy it. Returns the contract address.
    async fn script(&self, code: &str, lang: &str) -> Result<String, LedgerError>;

    /// Open a subscription to `topic` under `key`. `target` narrows the
    /// subscription to one address; empty means everything.
    fn subscribe(
        &self,
        key: &SubscriptionKey,
        topic: Topic,
        target: &str,
    ) -> Result<EventSource, LedgerError>;

    /// Release the subscription under `key`. Unknown keys are ignored.
    fn unsubscribe(&self, key: &SubscriptionKey);

    /// Commit pending transactions into a new block.
    async fn commit(&self) -> Result<(), LedgerError>;

    /// Toggle committing on every accepted transaction.
    fn set_auto_commit(&self, enabled: bool);

    /// Whether transactions are committed as they arrive.
    fn is_auto_commit(&self) -> bool;
}
