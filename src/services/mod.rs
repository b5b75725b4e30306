//! Services layer for Scriptorium
//!
//! Business operations over the stores and the ledger gateway. Transport
//! code resolves the caller's address from its token and calls in here.
//!
//! ## Services
//!
//! - **Identity**: registration, role promotions, profiles, faucet
//! - **Works**: publication, the status state machine, visibility-filtered reads
//! - **Reviews**: per-validator reviews and the aggregation that settles a work
//! - **Purchases**: paid access grants and bookmarks

pub mod identity;
pub mod purchases;
pub mod reviews;
pub mod works;

pub use identity::IdentityService;
pub use purchases::PurchaseLedger;
pub use reviews::ReviewAggregator;
pub use works::{WorkRepository, WorkService, WorkView};

use chrono::TimeDelta;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use crate::auth::ParticipantRole;
use crate::ledger::LedgerGateway;
use crate::library::{
    default_purchase_window, normalize_address, Clock, InitialWorkStatus, Participant,
    ReviewQuorum, Stores, DEFAULT_WORK_PRICE,
};
use crate::types::{LibraryError, Result};

/// Participant granted Admin at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSeed {
    pub nickname: String,
    pub web3_address: String,
}

/// Behaviour switches and amounts, fixed at construction
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    pub initial_status: InitialWorkStatus,
    pub review_quorum: ReviewQuorum,
    pub purchase_window: TimeDelta,
    /// Price (wei) for works published without one
    pub default_price: String,
    /// Tokens (wei) handed out per faucet call
    pub faucet_amount: String,
    /// Budget for each ledger call
    pub ledger_timeout: Duration,
    pub admins: Vec<AdminSeed>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            initial_status: InitialWorkStatus::default(),
            review_quorum: ReviewQuorum::default(),
            purchase_window: default_purchase_window(),
            default_price: DEFAULT_WORK_PRICE.to_string(),
            faucet_amount: DEFAULT_WORK_PRICE.to_string(),
            ledger_timeout: Duration::from_secs(30),
            admins: Vec::new(),
        }
    }
}

/// Dependencies shared by every service
pub(crate) struct Core {
    pub stores: Stores,
    pub ledger: Arc<dyn LedgerGateway>,
    pub clock: Arc<dyn Clock>,
    pub config: LibraryConfig,
}

impl Core {
    /// Participant behind `address`, or NotFound
    pub async fn participant(&self, address: &str) -> Result<Participant> {
        self.stores
            .identity
            .participant_by_address(&normalize_address(address))
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("participant {address}")))
    }

    /// Participant behind `address` if any; anonymous callers map to None
    pub async fn viewer(&self, address: Option<&str>) -> Result<Option<Participant>> {
        match address {
            Some(address) => {
                self.stores
                    .identity
                    .participant_by_address(&normalize_address(address))
                    .await
            }
            None => Ok(None),
        }
    }

    /// Participant behind `address` holding at least `minimum`
    pub async fn participant_with_role(
        &self,
        address: &str,
        minimum: ParticipantRole,
    ) -> Result<Participant> {
        let participant = self.participant(address).await?;
        require_role(&participant, minimum)?;
        Ok(participant)
    }
}

pub(crate) fn require_role(participant: &Participant, minimum: ParticipantRole) -> Result<()> {
    if participant.role < minimum {
        return Err(LibraryError::Forbidden(format!(
            "role {} is below required {}",
            participant.role, minimum
        )));
    }
    Ok(())
}

/// Log an upstream failure with its operation before handing it back
pub(crate) fn log_upstream(operation: &str, ids: &str, err: LibraryError) -> LibraryError {
    if err.is_upstream() {
        error!("{}: {} failed: {}", operation, ids, err);
    }
    err
}

/// Entry point bundling all services over one set of stores
#[derive(Clone)]
pub struct Library {
    pub identity: IdentityService,
    pub works: WorkService,
    pub reviews: ReviewAggregator,
    pub purchases: PurchaseLedger,
}

impl Library {
    pub fn new(
        stores: Stores,
        ledger: Arc<dyn LedgerGateway>,
        clock: Arc<dyn Clock>,
        config: LibraryConfig,
    ) -> Self {
        let core = Arc::new(Core {
            stores,
            ledger,
            clock,
            config,
        });
        let works = WorkService::new(core.clone());

        Self {
            identity: IdentityService::new(core.clone()),
            reviews: ReviewAggregator::new(core.clone(), works.repository().clone()),
            purchases: PurchaseLedger::new(core, works.clone()),
            works,
        }
    }
}
