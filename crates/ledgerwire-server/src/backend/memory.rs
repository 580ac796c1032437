//! In-process ledger for development and tests.
//!
//! Keeps a linear chain rooted at an all-zero parent hash, an address-ordered
//! account map, a set of managed addresses and a pending-transaction pool.
//! Submission publishes `newTx:pre` (or `newTx:pre:fail`); commit applies
//! the pool, publishes `newTx:post`/`newTx:post:fail` per transaction and
//! then `newBlock`.
//!
//! There is no consensus, persistence, gas accounting or script execution.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use ledgerwire_core::backend::{KeyManager, Ledger};
use ledgerwire_core::errors::LedgerError;
use ledgerwire_core::events::{EventPayload, EventSource, LedgerEvent, Topic};
use ledgerwire_core::ids::SubscriptionKey;
use ledgerwire_core::ledger::{Account, Block, Transaction, WorldState};
use ledgerwire_core::time::wire_timestamp;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Event source name.
pub const SOURCE: &str = "memory-ledger";

/// Parent hash of the genesis block.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

fn parse_amount(raw: &str) -> Result<u128, LedgerError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed
        .parse()
        .map_err(|_| LedgerError::Invalid(format!("amount '{raw}' is not a non-negative integer")))
}

struct Subscriber {
    topic: Topic,
    target: String,
    tx: mpsc::Sender<LedgerEvent>,
}

impl Subscriber {
    fn wants(&self, payload: &EventPayload) -> bool {
        if self.target.is_empty() {
            return true;
        }
        match payload {
            EventPayload::BlockAdded(block) => {
                block.coinbase == self.target
                    || block
                        .transactions
                        .iter()
                        .any(|tx| tx.sender == self.target || tx.recipient == self.target)
            }
            EventPayload::TxPre(tx)
            | EventPayload::TxPost(tx)
            | EventPayload::TxPreFailed { tx, .. }
            | EventPayload::TxPostFailed { tx, .. } => {
                tx.sender == self.target || tx.recipient == self.target
            }
        }
    }
}

struct Chain {
    blocks: HashMap<String, Block>,
    head: String,
    height: u64,
    accounts: BTreeMap<String, Account>,
    pending: Vec<Transaction>,
    addresses: Vec<String>,
    active: usize,
}

impl Chain {
    fn active_address(&self) -> String {
        self.addresses.get(self.active).cloned().unwrap_or_default()
    }

    fn next_nonce(&self, sender: &str) -> u64 {
        let committed = self.accounts.get(sender).map_or(0, |a| a.nonce);
        let queued = self.pending.iter().filter(|tx| tx.sender == sender).count() as u64;
        committed + queued
    }

    fn balance(&self, address: &str) -> u128 {
        self.accounts
            .get(address)
            .and_then(|a| a.balance.parse().ok())
            .unwrap_or(0)
    }

    /// Apply one transaction to account state.
    fn apply(&mut self, tx: &Transaction) -> Result<(), String> {
        let value = parse_amount(&tx.value).map_err(|e| e.to_string())?;
        let available = self.balance(&tx.sender);
        if available < value {
            return Err(format!("insufficient balance: have {available}, need {value}"));
        }

        let sender = self
            .accounts
            .entry(tx.sender.clone())
            .or_insert_with(|| Account::new(tx.sender.clone(), "0"));
        sender.balance = (available - value).to_string();
        sender.nonce += 1;

        let recipient_balance = self.balance(&tx.recipient);
        let recipient = self
            .accounts
            .entry(tx.recipient.clone())
            .or_insert_with(|| Account::new(tx.recipient.clone(), "0"));
        recipient.balance = recipient_balance.saturating_add(value).to_string();
        if tx.contract_creation {
            recipient.code = tx.data.join("\n");
        }
        Ok(())
    }
}

/// In-memory [`Ledger`] implementation.
pub struct MemoryLedger {
    chain: Mutex<Chain>,
    subscribers: Mutex<HashMap<SubscriptionKey, Subscriber>>,
    auto_commit: AtomicBool,
    address_seq: AtomicU64,
}

impl MemoryLedger {
    /// Ledger with a genesis block and one managed address holding
    /// `genesis_balance`.
    pub fn new(genesis_balance: &str) -> Result<Self, LedgerError> {
        Ok(Self::with_balance(parse_amount(genesis_balance)?))
    }

    fn with_balance(balance: u128) -> Self {
        let address_seq = AtomicU64::new(0);
        let first = Self::derive_address(&address_seq);

        let genesis = Block {
            number: 0,
            hash: digest(&["genesis", &first]),
            prev_hash: ZERO_HASH.into(),
            coinbase: first.clone(),
            timestamp: wire_timestamp(),
            transactions: Vec::new(),
        };

        let mut accounts = BTreeMap::new();
        let _ = accounts.insert(first.clone(), Account::new(first.clone(), balance.to_string()));
        let mut blocks = HashMap::new();
        let head = genesis.hash.clone();
        let _ = blocks.insert(head.clone(), genesis);

        info!(address = %first, %head, "memory ledger initialized");
        Self {
            chain: Mutex::new(Chain {
                blocks,
                head,
                height: 1,
                accounts,
                pending: Vec::new(),
                addresses: vec![first],
                active: 0,
            }),
            subscribers: Mutex::new(HashMap::new()),
            auto_commit: AtomicBool::new(false),
            address_seq,
        }
    }

    fn derive_address(seq: &AtomicU64) -> String {
        let n = seq.fetch_add(1, Ordering::Relaxed);
        let seed = uuid::Uuid::now_v7().to_string();
        digest(&["address", &seed, &n.to_string()])[..40].to_owned()
    }

    /// Number of open subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Whether a subscription is open under `key`.
    pub fn is_subscribed(&self, key: &SubscriptionKey) -> bool {
        self.subscribers.lock().contains_key(key)
    }

    /// Number of transactions waiting for the next commit.
    pub fn pending_count(&self) -> usize {
        self.chain.lock().pending.len()
    }

    /// Forget a stored block, leaving its child pointing at a missing parent.
    pub fn remove_block(&self, hash: &str) -> Option<Block> {
        self.chain.lock().blocks.remove(hash)
    }

    /// Put back a block taken out with [`remove_block`](Self::remove_block).
    pub fn restore_block(&self, block: Block) {
        let _ = self.chain.lock().blocks.insert(block.hash.clone(), block);
    }

    /// Publish an event to every subscriber of its topic.
    pub async fn publish(&self, payload: EventPayload) {
        let topic = payload.topic();
        self.publish_on(topic, LedgerEvent::new(payload, SOURCE)).await;
    }

    /// Deliver `event` to every subscriber of `topic`, whatever the event's
    /// own tag. Subscribers whose receiver is gone are dropped.
    pub async fn publish_on(&self, topic: Topic, event: LedgerEvent) {
        let targets: Vec<(SubscriptionKey, mpsc::Sender<LedgerEvent>)> = self
            .subscribers
            .lock()
            .iter()
            .filter(|(_, s)| s.topic == topic && s.wants(&event.payload))
            .map(|(k, s)| (k.clone(), s.tx.clone()))
            .collect();

        for (key, tx) in targets {
            if tx.send(event.clone()).await.is_err() {
                debug!(%key, "subscriber gone, dropping subscription");
                let _ = self.subscribers.lock().remove(&key);
            }
        }
    }

    /// Deliver `event` to the single subscription under `key`.
    /// Returns whether it was delivered.
    pub async fn publish_to(&self, key: &SubscriptionKey, event: LedgerEvent) -> bool {
        let tx = self.subscribers.lock().get(key).map(|s| s.tx.clone());
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    async fn submit(&self, mut tx: Transaction) -> Result<String, LedgerError> {
        let accepted = {
            let mut chain = self.chain.lock();
            tx.sender = chain.active_address();
            tx.nonce = chain.next_nonce(&tx.sender);
            tx.hash = digest(&[&tx.sender, &tx.nonce.to_string(), &tx.recipient, &tx.value]);
            match parse_amount(&tx.value) {
                Ok(_) => {
                    chain.pending.push(tx.clone());
                    Ok(())
                }
                Err(e) => Err(e),
            }
        };

        if let Err(e) = accepted {
            self.publish(EventPayload::TxPreFailed {
                tx,
                reason: e.to_string(),
            })
            .await;
            return Err(e);
        }

        let hash = tx.hash.clone();
        debug!(%hash, "transaction accepted");
        self.publish(EventPayload::TxPre(tx)).await;
        if self.is_auto_commit() {
            self.commit().await?;
        }
        Ok(hash)
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::with_balance(1_000_000_000_000)
    }
}

impl KeyManager for MemoryLedger {
    fn active_address(&self) -> String {
        self.chain.lock().active_address()
    }

    fn addresses(&self) -> Vec<String> {
        self.chain.lock().addresses.clone()
    }

    fn new_address(&self) -> Result<String, LedgerError> {
        let address = Self::derive_address(&self.address_seq);
        self.chain.lock().addresses.push(address.clone());
        info!(%address, "address created");
        Ok(address)
    }

    fn set_address(&self, address: &str) -> Result<(), LedgerError> {
        let mut chain = self.chain.lock();
        let index = chain
            .addresses
            .iter()
            .position(|a| a == address)
            .ok_or_else(|| LedgerError::NotFound {
                what: "managed address",
                key: address.to_owned(),
            })?;
        chain.active = index;
        Ok(())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn block_count(&self) -> Result<u64, LedgerError> {
        Ok(self.chain.lock().height)
    }

    async fn latest_block_hash(&self) -> Result<String, LedgerError> {
        Ok(self.chain.lock().head.clone())
    }

    async fn block(&self, hash: &str) -> Result<Option<Block>, LedgerError> {
        Ok(self.chain.lock().blocks.get(hash).cloned())
    }

    async fn account(&self, address: &str) -> Result<Option<Account>, LedgerError> {
        Ok(self.chain.lock().accounts.get(address).cloned())
    }

    async fn world_state(&self) -> Result<WorldState, LedgerError> {
        Ok(WorldState::from_accounts(
            self.chain.lock().accounts.values().cloned(),
        ))
    }

    async fn tx(&self, recipient: &str, amount: &str) -> Result<String, LedgerError> {
        if recipient.is_empty() {
            return Err(LedgerError::Invalid("recipient is required".into()));
        }
        self.submit(Transaction {
            hash: String::new(),
            nonce: 0,
            sender: String::new(),
            recipient: recipient.to_owned(),
            value: amount.to_owned(),
            gas: String::new(),
            gas_cost: String::new(),
            data: Vec::new(),
            contract_creation: false,
        })
        .await
    }

    async fn msg(&self, recipient: &str, data: &[String]) -> Result<String, LedgerError> {
        if recipient.is_empty() {
            return Err(LedgerError::Invalid("recipient is required".into()));
        }
        self.submit(Transaction {
            hash: String::new(),
            nonce: 0,
            sender: String::new(),
            recipient: recipient.to_owned(),
            value: "0".into(),
            gas: String::new(),
            gas_cost: String::new(),
            data: data.to_vec(),
            contract_creation: false,
        })
        .await
    }

    async fn script(&self, code: &str, lang: &str) -> Result<String, LedgerError> {
        if code.trim().is_empty() {
            return Err(LedgerError::Compile(format!("empty {lang} script")));
        }
        let address = {
            let chain = self.chain.lock();
            let sender = chain.active_address();
            let nonce = chain.next_nonce(&sender);
            digest(&["contract", &sender, &nonce.to_string()])[..40].to_owned()
        };
        let _ = self
            .submit(Transaction {
                hash: String::new(),
                nonce: 0,
                sender: String::new(),
                recipient: address.clone(),
                value: "0".into(),
                gas: String::new(),
                gas_cost: String::new(),
                data: vec![code.to_owned()],
                contract_creation: true,
            })
            .await?;
        Ok(address)
    }

    fn subscribe(
        &self,
        key: &SubscriptionKey,
        topic: Topic,
        target: &str,
    ) -> Result<EventSource, LedgerError> {
        let (tx, source) = EventSource::channel(topic, key.clone());
        let previous = self.subscribers.lock().insert(
            key.clone(),
            Subscriber {
                topic,
                target: target.to_owned(),
                tx,
            },
        );
        if previous.is_some() {
            warn!(%key, "subscription key reused, previous subscriber replaced");
        }
        debug!(%key, %topic, "subscribed");
        Ok(source)
    }

    fn unsubscribe(&self, key: &SubscriptionKey) {
        if self.subscribers.lock().remove(key).is_some() {
            debug!(%key, "unsubscribed");
        }
    }

    async fn commit(&self) -> Result<(), LedgerError> {
        let (block, outcomes) = {
            let mut chain = self.chain.lock();
            let pending = std::mem::take(&mut chain.pending);
            let mut included = Vec::with_capacity(pending.len());
            let mut outcomes = Vec::with_capacity(pending.len());
            for tx in pending {
                match chain.apply(&tx) {
                    Ok(()) => {
                        included.push(tx.clone());
                        outcomes.push(EventPayload::TxPost(tx));
                    }
                    Err(reason) => outcomes.push(EventPayload::TxPostFailed { tx, reason }),
                }
            }

            let number = chain.height;
            let prev_hash = chain.head.clone();
            let coinbase = chain.active_address();
            let tx_hashes: Vec<&str> = included.iter().map(|tx| tx.hash.as_str()).collect();
            let number_text = number.to_string();
            let mut parts = vec![number_text.as_str(), prev_hash.as_str()];
            parts.extend(tx_hashes);
            let block = Block {
                number,
                hash: digest(&parts),
                prev_hash: prev_hash.clone(),
                coinbase,
                timestamp: wire_timestamp(),
                transactions: included.clone(),
            };
            chain.head = block.hash.clone();
            chain.height += 1;
            let _ = chain.blocks.insert(block.hash.clone(), block.clone());
            (block, outcomes)
        };

        info!(number = block.number, hash = %block.hash, txs = block.transactions.len(), "block committed");
        for outcome in outcomes {
            self.publish(outcome).await;
        }
        self.publish(EventPayload::BlockAdded(block)).await;
        Ok(())
    }

    fn set_auto_commit(&self, enabled: bool) {
        self.auto_commit.store(enabled, Ordering::Relaxed);
    }

    fn is_auto_commit(&self) -> bool {
        self.auto_commit.load(Ordering::Relaxed)
    }
}
