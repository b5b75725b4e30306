//! External ledger gateway
//!
//! The contractor service records payments and role grants on chain. The
//! library only cares whether a call succeeded, its transaction hash, and
//! whether a failure was for lack of funds.
//!
//! Implementations:
//! - [`HttpLedgerGateway`]: JSON client for the contractor service
//! - [`InMemoryLedger`]: balances and roles in memory, for tests and dev mode

mod http;
mod memory;

pub use http::{HttpLedgerGateway, LedgerClientConfig};
pub use memory::InMemoryLedger;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::error;

use crate::auth::ParticipantRole;
use crate::types::{LibraryError, Result};

/// Payment for one work: burn from the reader, mint to the author
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub work_id: String,
    pub reader_address: String,
    pub author_address: String,
    /// Amount in wei
    pub price: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    #[serde(default)]
    pub reader_tx_hash: String,
    #[serde(default)]
    pub author_tx_hash: String,
}

/// On-chain registration of a published work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    pub authors: Vec<String>,
    pub name: String,
    pub uri: String,
    /// Work id as a decimal uint256
    pub work_id: String,
    pub price: String,
}

/// Capabilities the library needs from the ledger
#[async_trait::async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn purchase_work(&self, request: &PurchaseRequest) -> Result<PurchaseReceipt>;

    async fn add_participant(&self, address: &str) -> Result<String>;

    async fn make_author(&self, address: &str) -> Result<String>;

    async fn make_reviewer(&self, address: &str) -> Result<String>;

    async fn publish_work(&self, request: &PublishRequest) -> Result<String>;

    async fn faucet(&self, address: &str, amount: &str) -> Result<String>;

    /// Role recorded on chain; None when the address is unknown there
    async fn participant_role(&self, address: &str) -> Result<Option<ParticipantRole>>;
}

/// Map a ledger failure message onto the error taxonomy
pub fn classify_failure(message: impl Into<String>) -> LibraryError {
    let message = message.into();
    if message.to_ascii_lowercase().contains("insufficient") {
        LibraryError::InsufficientFunds(message)
    } else {
        LibraryError::Ledger(message)
    }
}

/// Run a ledger call under `limit`. Expiry is an upstream failure; the
/// caller must not commit anything afterwards.
pub async fn bounded<T, F>(limit: Duration, operation: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            error!(
                "Ledger call {} timed out after {}ms",
                operation,
                limit.as_millis()
            );
            Err(LibraryError::Ledger(format!(
                "{operation} timed out after {}ms",
                limit.as_millis()
            )))
        }
    }
}

/// Ledger representation of a library id: the UUID's 128 bits as a
/// decimal uint256
pub fn ledger_work_id(id: &str) -> Result<String> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| LibraryError::BadRequest(format!("work id {id} is not a UUID: {e}")))?;
    Ok(uuid.as_u128().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_is_distinguished() {
        assert!(matches!(
            classify_failure("execution reverted: Insufficient balance"),
            LibraryError::InsufficientFunds(_)
        ));
        assert!(matches!(
            classify_failure("nonce too low"),
            LibraryError::Ledger(_)
        ));
    }

    #[test]
    fn test_ledger_work_id_is_decimal_of_uuid_bits() {
        assert_eq!(
            ledger_work_id("00000000-0000-0000-0000-0000000000ff").unwrap(),
            "255"
        );
        assert_eq!(
            ledger_work_id("ffffffff-ffff-ffff-ffff-ffffffffffff").unwrap(),
            u128::MAX.to_string()
        );
        assert!(ledger_work_id("not-a-uuid").is_err());
    }

    #[tokio::test]
    async fn test_bounded_call_times_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, LibraryError>(())
        };
        let result = bounded(Duration::from_millis(10), "purchase_work", slow).await;
        assert!(matches!(result, Err(LibraryError::Ledger(_))));
    }
}
