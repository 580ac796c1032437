//! Ledger data as reported by the backend.
//!
//! Amounts are decimal strings so arbitrarily large balances survive the
//! JSON boundary untouched.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// A transaction, pending or included in a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction hash.
    pub hash: String,
    /// Sender nonce at submission.
    pub nonce: u64,
    /// Sender address.
    pub sender: String,
    /// Recipient address (the new contract address for contract creation).
    pub recipient: String,
    /// Transferred value.
    pub value: String,
    /// Gas limit.
    #[serde(default)]
    pub gas: String,
    /// Gas price.
    #[serde(default)]
    pub gas_cost: String,
    /// Message data lines, or the script source for contract creation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<String>,
    /// Whether this transaction creates a contract.
    #[serde(default)]
    pub contract_creation: bool,
}

/// A block in the chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Height; genesis is 0.
    pub number: u64,
    /// Block hash.
    pub hash: String,
    /// Parent hash. Genesis points at the all-zero sentinel.
    pub prev_hash: String,
    /// Address credited for producing the block.
    pub coinbase: String,
    /// Wire timestamp of production.
    pub timestamp: i64,
    /// Included transactions.
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

/// Account state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account address.
    pub address: String,
    /// Current balance.
    pub balance: String,
    /// Number of transactions sent.
    pub nonce: u64,
    /// Contract code; empty for plain accounts.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
    /// Contract storage.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub storage: BTreeMap<String, String>,
}

impl Account {
    /// A plain account holding `balance`.
    pub fn new(address: impl Into<String>, balance: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            balance: balance.into(),
            ..Self::default()
        }
    }

    /// Whether the account carries contract code.
    pub fn is_contract(&self) -> bool {
        !self.code.is_empty()
    }
}

/// Every account known to the backend, with a stable iteration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorldState {
    accounts: HashMap<String, Account>,
    order: Vec<String>,
}

impl WorldState {
    /// Build from accounts in the order they should be exported.
    /// Later duplicates replace earlier entries but keep the first position.
    pub fn from_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let mut state = Self::default();
        for account in accounts {
            if !state.accounts.contains_key(&account.address) {
                state.order.push(account.address.clone());
            }
            let _ = state.accounts.insert(account.address.clone(), account);
        }
        state
    }

    /// Number of accounts.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether there are no accounts.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Look up one account.
    pub fn get(&self, address: &str) -> Option<&Account> {
        self.accounts.get(address)
    }

    /// Accounts in export order.
    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.order.iter().filter_map(|a| self.accounts.get(a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn world_state_keeps_order() {
        let ws = WorldState::from_accounts([
            Account::new("cc", "3"),
            Account::new("aa", "1"),
            Account::new("bb", "2"),
        ]);
        let order: Vec<_> = ws.iter().map(|a| a.address.as_str()).collect();
        assert_eq!(order, ["cc", "aa", "bb"]);
        assert_eq!(ws.len(), 3);
    }

    #[test]
    fn world_state_duplicate_replaces_in_place() {
        let ws = WorldState::from_accounts([
            Account::new("aa", "1"),
            Account::new("bb", "2"),
            Account::new("aa", "9"),
        ]);
        assert_eq!(ws.len(), 2);
        assert_eq!(ws.iter().next().unwrap().balance, "9");
    }

    #[test]
    fn account_contract_detection() {
        let mut acc = Account::new("aa", "0");
        assert!(!acc.is_contract());
        acc.code = "(return 0)".into();
        assert!(acc.is_contract());
    }

    #[test]
    fn block_serializes_camel_case() {
        let block = Block {
            number: 1,
            hash: "h1".into(),
            prev_hash: "h0".into(),
            coinbase: "cb".into(),
            timestamp: 7,
            transactions: vec![],
        };
        let v = serde_json::to_value(&block).unwrap();
        assert_eq!(v["prevHash"], json!("h0"));
        assert_eq!(v["transactions"], json!([]));
    }
}
