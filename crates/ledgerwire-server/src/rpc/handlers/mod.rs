//! Default method set.
//!
//! | Module | Methods |
//! |--------|---------|
//! | `chain` | `MyBalance`, `LastBlockNumber`, `BlockByHash`, `BlockMiniByHash`, `Account` |
//! | `mining` | `StartMining`, `StopMining`, `IsMining`, `Commit` |
//! | `address` | `MyAddress`, `ActiveAddress`, `MyAddresses`, `NewAddress`, `SetAddress` |
//! | `transact` | `Transact` |
//! | `world_state` | `WorldState` |

pub mod address;
pub mod chain;
pub mod mining;
pub mod transact;
pub mod world_state;

use std::sync::Arc;

use serde_json::Value;

use crate::rpc::errors::RpcError;
use crate::rpc::registry::{MethodHandler, MethodRegistry};
use crate::rpc::types::labels;

/// Register every default method on `registry`.
pub fn register_default_methods(registry: &MethodRegistry) -> Result<(), RpcError> {
    let methods: [(&str, Arc<dyn MethodHandler>); 15] = [
        ("MyBalance", Arc::new(chain::MyBalanceHandler)),
        ("LastBlockNumber", Arc::new(chain::LastBlockNumberHandler)),
        ("BlockByHash", Arc::new(chain::BlockByHashHandler)),
        ("BlockMiniByHash", Arc::new(chain::BlockMiniByHashHandler)),
        ("Account", Arc::new(chain::AccountHandler)),
        ("StartMining", Arc::new(mining::StartMiningHandler)),
        ("StopMining", Arc::new(mining::StopMiningHandler)),
        ("IsMining", Arc::new(mining::IsMiningHandler)),
        ("Commit", Arc::new(mining::CommitHandler)),
        ("MyAddress", Arc::new(address::MyAddressHandler)),
        ("ActiveAddress", Arc::new(address::MyAddressHandler)),
        ("MyAddresses", Arc::new(address::MyAddressesHandler)),
        ("NewAddress", Arc::new(address::NewAddressHandler)),
        ("SetAddress", Arc::new(address::SetAddressHandler)),
        ("Transact", Arc::new(transact::TransactHandler)),
    ];
    for (name, handler) in methods {
        registry.add(name, handler, false)?;
    }
    // Registered under its push label so an aborted export's error reply carries it.
    registry.add(labels::WORLD_STATE, Arc::new(world_state::WorldStateHandler), false)
}

/// Read a required string parameter. `params` may be an object holding
/// `key` or a bare JSON string.
pub fn require_string_param(params: Option<&Value>, key: &str) -> Result<String, RpcError> {
    match params {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(p) => p
            .get(key)
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| RpcError::InvalidParams {
                message: format!("Missing required parameter '{key}'"),
            }),
        None => Err(RpcError::InvalidParams {
            message: format!("Missing required parameter '{key}'"),
        }),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_methods_registered() {
        let reg = MethodRegistry::new();
        register_default_methods(&reg).unwrap();
        for name in [
            "MyBalance", "MyAddress", "ActiveAddress", "StartMining", "StopMining",
            "LastBlockNumber", "BlockByHash", "Account", "Transact", "WorldState",
            "MyAddresses", "NewAddress", "SetAddress", "BlockMiniByHash", "IsMining", "Commit",
        ] {
            assert!(reg.contains(name), "{name} missing");
        }
        assert_eq!(reg.len(), 16);
    }

    #[test]
    fn registering_twice_collides() {
        let reg = MethodRegistry::new();
        register_default_methods(&reg).unwrap();
        assert_eq!(register_default_methods(&reg).unwrap_err().code(), "DUPLICATE_METHOD");
    }

    #[test]
    fn string_param_forms() {
        assert_eq!(require_string_param(Some(&json!({"hash": "ab"})), "hash").unwrap(), "ab");
        assert_eq!(require_string_param(Some(&json!("ab")), "hash").unwrap(), "ab");
        assert_eq!(
            require_string_param(Some(&json!({"other": 1})), "hash").unwrap_err().code(),
            "INVALID_PARAMS"
        );
        assert_eq!(require_string_param(None, "hash").unwrap_err().code(), "INVALID_PARAMS");
    }
}
