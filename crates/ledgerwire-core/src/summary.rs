//! Compact block and account forms pushed to clients.
//!
//! A live `BlockAdded` push carries a [`BlockSummary`] with one
//! [`AccountDelta`] per account the block touched. Summaries produced by a
//! history walk omit the deltas, and omit the parent hash for genesis.

use std::collections::HashMap;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::backend::{Ledger, is_sentinel_hash};
use crate::errors::LedgerError;
use crate::ledger::{Account, Block};

/// How a block affected an account. Serialized as its raw bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountFlag(u8);

impl AccountFlag {
    /// State changed.
    pub const MODIFIED: Self = Self(0);
    /// Account came into existence.
    pub const CREATED: Self = Self(1);
    /// Account no longer exists.
    pub const DELETED: Self = Self(2);

    /// Raw wire value.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Whether the creation bit is set.
    pub fn is_created(self) -> bool {
        self.0 & Self::CREATED.0 != 0
    }

    /// Whether the deletion bit is set.
    pub fn is_deleted(self) -> bool {
        self.0 & Self::DELETED.0 != 0
    }
}

impl BitOr for AccountFlag {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AccountFlag {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Compact account record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDelta {
    /// Account address.
    pub address: String,
    /// Change kind.
    pub flag: AccountFlag,
    /// Whether the account holds contract code.
    #[serde(default)]
    pub contract: bool,
    /// Nonce after the change; absent for deleted accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    /// Balance after the change; absent for deleted accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<String>,
}

impl AccountDelta {
    /// Delta for an account that still exists.
    pub fn present(account: &Account, flag: AccountFlag) -> Self {
        Self {
            address: account.address.clone(),
            flag,
            contract: account.is_contract(),
            nonce: Some(account.nonce),
            balance: Some(account.balance.clone()),
        }
    }

    /// Delta for an account the backend no longer knows.
    pub fn deleted(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            flag: AccountFlag::DELETED,
            contract: false,
            nonce: None,
            balance: None,
        }
    }
}

impl From<&Account> for AccountDelta {
    fn from(account: &Account) -> Self {
        Self::present(account, AccountFlag::MODIFIED)
    }
}

/// Compact block record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSummary {
    /// Block height.
    pub number: u64,
    /// Block hash.
    pub hash: String,
    /// Parent hash; absent for genesis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    /// Number of included transactions.
    pub transactions: usize,
    /// Accounts the block touched. Empty in history walks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accounts_affected: Vec<AccountDelta>,
}

impl BlockSummary {
    /// Summary without account deltas.
    pub fn from_block(block: &Block) -> Self {
        Self {
            number: block.number,
            hash: block.hash.clone(),
            prev_hash: (!is_sentinel_hash(&block.prev_hash)).then(|| block.prev_hash.clone()),
            transactions: block.transactions.len(),
            accounts_affected: Vec::new(),
        }
    }

    /// Attach account deltas.
    #[must_use]
    pub fn with_deltas(mut self, deltas: Vec<AccountDelta>) -> Self {
        self.accounts_affected = deltas;
        self
    }
}

/// Addresses touched by `block`, in first-touch order, with their change kind.
///
/// Senders and the coinbase are modified. Recipients are modified, or
/// created when the transaction deploys a contract. An address touched
/// several times keeps its first position and accumulates creation bits.
pub fn affected_accounts(block: &Block) -> Vec<(String, AccountFlag)> {
    let mut touched: Vec<(String, AccountFlag)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    let mut mark = |address: &str, flag: AccountFlag| {
        if address.is_empty() {
            return;
        }
        if let Some(&i) = index.get(address) {
            touched[i].1 |= flag;
        } else {
            let _ = index.insert(address.to_owned(), touched.len());
            touched.push((address.to_owned(), flag));
        }
    };

    for tx in &block.transactions {
        mark(&tx.sender, AccountFlag::MODIFIED);
        let recipient_flag = if tx.contract_creation {
            AccountFlag::CREATED
        } else {
            AccountFlag::MODIFIED
        };
        mark(&tx.recipient, recipient_flag);
    }
    mark(&block.coinbase, AccountFlag::MODIFIED);
    touched
}

/// Full summary of a freshly added block, with one delta per touched account.
/// Accounts the backend no longer knows are reported as deleted.
pub async fn summarize_block(ledger: &dyn Ledger, block: &Block) -> Result<BlockSummary, LedgerError> {
    let mut deltas = Vec::new();
    for (address, flag) in affected_accounts(block) {
        let delta = match ledger.account(&address).await? {
            Some(account) => AccountDelta::present(&account, flag),
            None => AccountDelta::deleted(address),
        };
        deltas.push(delta);
    }
    Ok(BlockSummary::from_block(block).with_deltas(deltas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Transaction;
    use serde_json::json;

    fn tx(sender: &str, recipient: &str, create: bool) -> Transaction {
        Transaction {
            hash: format!("{sender}{recipient}"),
            nonce: 0,
            sender: sender.into(),
            recipient: recipient.into(),
            value: "1".into(),
            gas: String::new(),
            gas_cost: String::new(),
            data: vec![],
            contract_creation: create,
        }
    }

    fn block(prev: &str, txs: Vec<Transaction>) -> Block {
        Block {
            number: 3,
            hash: "b3".into(),
            prev_hash: prev.into(),
            coinbase: "miner".into(),
            timestamp: 0,
            transactions: txs,
        }
    }

    #[test]
    fn flag_wire_values() {
        assert_eq!(serde_json::to_value(AccountFlag::MODIFIED).unwrap(), json!(0));
        assert_eq!(serde_json::to_value(AccountFlag::CREATED).unwrap(), json!(1));
        assert_eq!(serde_json::to_value(AccountFlag::DELETED).unwrap(), json!(2));
        assert!((AccountFlag::CREATED | AccountFlag::DELETED).is_deleted());
        assert!(!AccountFlag::MODIFIED.is_created());
    }

    #[test]
    fn genesis_summary_omits_parent() {
        let summary = BlockSummary::from_block(&block(&"0".repeat(64), vec![]));
        assert_eq!(summary.prev_hash, None);
        let v = serde_json::to_value(&summary).unwrap();
        assert!(v.get("prevHash").is_none());
        assert!(v.get("accountsAffected").is_none());
    }

    #[test]
    fn summary_keeps_parent() {
        let summary = BlockSummary::from_block(&block("b2", vec![tx("a", "b", false)]));
        assert_eq!(summary.prev_hash.as_deref(), Some("b2"));
        assert_eq!(summary.transactions, 1);
    }

    #[test]
    fn affected_accounts_order_and_flags() {
        let b = block("b2", vec![tx("a", "b", false), tx("a", "c", true), tx("b", "miner", false)]);
        let touched = affected_accounts(&b);
        assert_eq!(
            touched,
            vec![
                ("a".to_owned(), AccountFlag::MODIFIED),
                ("b".to_owned(), AccountFlag::MODIFIED),
                ("c".to_owned(), AccountFlag::CREATED),
                ("miner".to_owned(), AccountFlag::MODIFIED),
            ]
        );
    }

    #[test]
    fn creation_bit_accumulates() {
        let b = block("b2", vec![tx("a", "c", false), tx("a", "c", true)]);
        let touched = affected_accounts(&b);
        assert_eq!(touched[1], ("c".to_owned(), AccountFlag::CREATED));
    }

    proptest::proptest! {
        #[test]
        fn each_address_reported_once(
            pairs in proptest::collection::vec(("[a-d]", "[a-d]", proptest::bool::ANY), 0..12)
        ) {
            let txs = pairs.iter().map(|(s, r, c)| tx(s, r, *c)).collect();
            let touched = affected_accounts(&block("b2", txs));
            let mut seen: Vec<&str> = touched.iter().map(|(a, _)| a.as_str()).collect();
            let total = seen.len();
            seen.sort_unstable();
            seen.dedup();
            proptest::prop_assert_eq!(seen.len(), total);
            proptest::prop_assert_eq!(touched.last().map(|(a, _)| a.as_str()), Some("miner"));
            for (address, flag) in &touched {
                let deployed = pairs.iter().any(|(_, r, c)| *c && r == address);
                proptest::prop_assert_eq!(flag.is_created(), deployed);
            }
        }
    }

    #[test]
    fn deleted_delta_omits_state() {
        let v = serde_json::to_value(AccountDelta::deleted("gone")).unwrap();
        assert_eq!(v, json!({"address": "gone", "flag": 2, "contract": false}));
    }
}
