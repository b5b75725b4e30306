//! In-memory ledger
//!
//! Keeps token balances (wei) and on-chain roles per address. Can be made
//! unavailable or slow to exercise failure paths.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{LedgerGateway, PublishRequest, PurchaseReceipt, PurchaseRequest};
use crate::auth::ParticipantRole;
use crate::types::{LibraryError, Result};

#[derive(Default)]
pub struct InMemoryLedger {
    balances: DashMap<String, u128>,
    roles: DashMap<String, ParticipantRole>,
    published: DashMap<String, PublishRequest>,
    tx_counter: AtomicU64,
    unavailable: AtomicBool,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<String>>,
}

fn parse_amount(amount: &str) -> Result<u128> {
    amount
        .parse()
        .map_err(|_| LibraryError::Ledger(format!("invalid amount '{amount}'")))
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, address: &str, wei: u128) {
        self.balances.insert(address.to_string(), wei);
    }

    pub fn balance(&self, address: &str) -> u128 {
        self.balances.get(address).map(|b| *b).unwrap_or(0)
    }

    pub fn role(&self, address: &str) -> Option<ParticipantRole> {
        self.roles.get(address).map(|r| *r)
    }

    pub fn published_work(&self, ledger_work_id: &str) -> Option<PublishRequest> {
        self.published.get(ledger_work_id).map(|p| p.clone())
    }

    /// Every call fails with an upstream error while set
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every call by `delay`
    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().await = delay;
    }

    /// Names of the operations called so far
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    async fn enter(&self, operation: &str) -> Result<String> {
        self.calls.lock().await.push(operation.to_string());

        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LibraryError::Ledger(format!("{operation}: ledger unavailable")));
        }

        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let mut hash = [0u8; 32];
        hash[24..].copy_from_slice(&n.to_be_bytes());
        Ok(format!("0x{}", hex::encode(hash)))
    }

    fn grant_role(&self, address: &str, role: ParticipantRole) {
        let mut entry = self
            .roles
            .entry(address.to_string())
            .or_insert(ParticipantRole::Reader);
        if *entry < role {
            *entry = role;
        }
    }
}

#[async_trait::async_trait]
impl LedgerGateway for InMemoryLedger {
    async fn purchase_work(&self, request: &PurchaseRequest) -> Result<PurchaseReceipt> {
        let reader_tx_hash = self.enter("purchase_work").await?;
        let price = parse_amount(&request.price)?;

        {
            let mut reader = self
                .balances
                .entry(request.reader_address.clone())
                .or_insert(0);
            if *reader < price {
                return Err(LibraryError::InsufficientFunds(format!(
                    "insufficient funds: balance {} below price {}",
                    *reader, price
                )));
            }
            *reader -= price;
        }
        *self
            .balances
            .entry(request.author_address.clone())
            .or_insert(0) += price;

        let author_tx_hash = self.enter("purchase_work:mint").await?;
        Ok(PurchaseReceipt {
            reader_tx_hash,
            author_tx_hash,
        })
    }

    async fn add_participant(&self, address: &str) -> Result<String> {
        let tx = self.enter("add_participant").await?;
        self.grant_role(address, ParticipantRole::Reader);
        Ok(tx)
    }

    async fn make_author(&self, address: &str) -> Result<String> {
        let tx = self.enter("make_author").await?;
        self.grant_role(address, ParticipantRole::Author);
        Ok(tx)
    }

    async fn make_reviewer(&self, address: &str) -> Result<String> {
        let tx = self.enter("make_reviewer").await?;
        self.grant_role(address, ParticipantRole::Validator);
        Ok(tx)
    }

    async fn publish_work(&self, request: &PublishRequest) -> Result<String> {
        let tx = self.enter("publish_work").await?;
        self.published
            .insert(request.work_id.clone(), request.clone());
        Ok(tx)
    }

    async fn faucet(&self, address: &str, amount: &str) -> Result<String> {
        let tx = self.enter("faucet").await?;
        let amount = parse_amount(amount)?;
        *self.balances.entry(address.to_string()).or_insert(0) += amount;
        Ok(tx)
    }

    async fn participant_role(&self, address: &str) -> Result<Option<ParticipantRole>> {
        self.enter("participant_role").await?;
        Ok(self.role(address))
    }
}
