//! Purchases and bookmarks
//!
//! A purchase moves funds on the ledger first; the grant is only written
//! after the ledger accepted the payment. Grants expire after the purchase
//! window and are never deleted, only outlived.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use super::works::{WorkService, WorkView};
use super::{log_upstream, Core};
use crate::auth::ParticipantRole;
use crate::ledger::{bounded, PurchaseReceipt, PurchaseRequest};
use crate::library::{has_valid_grant, Bookmark, Participant, PurchaseGrant, WorkStatus};
use crate::types::{LibraryError, Result};

/// Purchase already paid on chain, reported by the ledger side
#[derive(Debug, Clone, Deserialize)]
pub struct SettledPurchase {
    pub web3_address: String,
    pub work_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOutcome {
    pub grant: PurchaseGrant,
    pub receipt: PurchaseReceipt,
}

#[derive(Clone)]
pub struct PurchaseLedger {
    core: Arc<Core>,
    works: WorkService,
}

impl PurchaseLedger {
    pub(crate) fn new(core: Arc<Core>, works: WorkService) -> Self {
        Self { core, works }
    }

    /// Whether the participant currently holds a valid grant for the work
    pub async fn has_valid_purchase(&self, participant_id: &str, work_id: &str) -> Result<bool> {
        let grants = self
            .core
            .stores
            .linkage
            .grants(participant_id, work_id)
            .await
            .map_err(|e| log_upstream("has_valid_purchase", work_id, e))?;
        Ok(has_valid_grant(
            &grants,
            self.core.clock.now(),
            self.core.config.purchase_window,
        ))
    }

    async fn ensure_not_purchased(&self, reader: &Participant, work_id: &str) -> Result<()> {
        if self.has_valid_purchase(&reader.id, work_id).await? {
            return Err(LibraryError::Conflict(format!(
                "work {work_id} already purchased by {}",
                reader.web3_address
            )));
        }
        Ok(())
    }

    /// Pay the author for a work and grant the reader access to its content
    pub async fn purchase(&self, address: &str, work_id: &str) -> Result<PurchaseOutcome> {
        let reader = self
            .core
            .participant_with_role(address, ParticipantRole::Reader)
            .await?;
        let (work, link) = self.works.repository().get(work_id).await?;
        if link.status == WorkStatus::Declined {
            return Err(LibraryError::NotFound(format!("work {work_id}")));
        }

        let author = self
            .core
            .stores
            .identity
            .participant_by_id(&link.participant_id)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("author of work {work_id}")))?;
        let price = if work.price.is_empty() {
            self.core.config.default_price.clone()
        } else {
            work.price
        };
        let request = PurchaseRequest {
            work_id: work_id.to_string(),
            reader_address: reader.web3_address.clone(),
            author_address: author.web3_address,
            price,
        };

        self.ensure_not_purchased(&reader, work_id).await?;
        let ids = format!("{} -> {}", reader.web3_address, work_id);
        let receipt = bounded(
            self.core.config.ledger_timeout,
            "purchase_work",
            self.core.ledger.purchase_work(&request),
        )
        .await
        .map_err(|e| log_upstream("purchase_work", &ids, e))?;

        let grant = PurchaseGrant::new(&reader.id, work_id, self.core.clock.now());
        self.core
            .stores
            .linkage
            .create_grant(&grant)
            .await
            .map_err(|e| log_upstream("purchase_work", &ids, e))?;

        info!(
            "Purchase {} settled (reader tx {}, author tx {})",
            ids, receipt.reader_tx_hash, receipt.author_tx_hash
        );
        Ok(PurchaseOutcome { grant, receipt })
    }

    /// Grant access for a purchase paid outside the library
    pub async fn record_settled(
        &self,
        address: &str,
        settled: SettledPurchase,
    ) -> Result<PurchaseGrant> {
        self.core
            .participant_with_role(address, ParticipantRole::Admin)
            .await?;
        let reader = self.core.participant(&settled.web3_address).await?;
        self.works.repository().get(&settled.work_id).await?;

        self.ensure_not_purchased(&reader, &settled.work_id).await?;
        let grant = PurchaseGrant::new(&reader.id, &settled.work_id, self.core.clock.now());
        self.core.stores.linkage.create_grant(&grant).await?;

        info!(
            "Recorded settled purchase {} -> {}",
            reader.web3_address, settled.work_id
        );
        Ok(grant)
    }

    /// Works the caller currently holds a valid grant for
    pub async fn purchased_works(&self, address: &str) -> Result<Vec<WorkView>> {
        let reader = self
            .core
            .participant_with_role(address, ParticipantRole::Reader)
            .await?;
        let now = self.core.clock.now();
        let window = self.core.config.purchase_window;

        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for grant in self
            .core
            .stores
            .linkage
            .grants_by_participant(&reader.id)
            .await
            .map_err(|e| log_upstream("purchased_works", &reader.web3_address, e))?
        {
            if !grant.is_valid_at(now, window) || !seen.insert(grant.work_id.clone()) {
                continue;
            }
            let link = self
                .core
                .stores
                .linkage
                .work_link(&grant.work_id)
                .await
                .map_err(|e| log_upstream("purchased_works", &grant.work_id, e))?;
            links.extend(link);
        }

        let pairs = self.works.repository().join(links).await?;
        self.works.present(Some(reader), pairs).await
    }

    // ========================================================================
    // Bookmarks
    // ========================================================================

    /// Returns false when the work was already bookmarked
    pub async fn add_bookmark(&self, address: &str, work_id: &str) -> Result<bool> {
        let reader = self
            .core
            .participant_with_role(address, ParticipantRole::Reader)
            .await?;
        self.works.repository().get(work_id).await?;

        let bookmark = Bookmark::new(&reader.id, work_id, self.core.clock.now());
        self.core.stores.linkage.create_bookmark(&bookmark).await
    }

    /// Returns false when there was no bookmark to remove
    pub async fn remove_bookmark(&self, address: &str, work_id: &str) -> Result<bool> {
        let reader = self
            .core
            .participant_with_role(address, ParticipantRole::Reader)
            .await?;
        self.works.repository().get(work_id).await?;

        self.core
            .stores
            .linkage
            .delete_bookmark(&reader.id, work_id)
            .await
    }

    pub async fn bookmarks(&self, address: &str) -> Result<Vec<WorkView>> {
        let reader = self
            .core
            .participant_with_role(address, ParticipantRole::Reader)
            .await?;

        let mut links = Vec::new();
        for work_id in self
            .core
            .stores
            .linkage
            .bookmarked_work_ids(&reader.id)
            .await
            .map_err(|e| log_upstream("bookmarks", &reader.web3_address, e))?
        {
            let link = self
                .core
                .stores
                .linkage
                .work_link(&work_id)
                .await
                .map_err(|e| log_upstream("bookmarks", &work_id, e))?;
            links.extend(link);
        }

        let pairs = self.works.repository().join(links).await?;
        self.works.present(Some(reader), pairs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::library::{
        ManualClock, NewWork, ProfileFields, Registration, Stores, WorkContent, WorkTransition,
    };
    use crate::services::{AdminSeed, Library, LibraryConfig};
    use chrono::TimeDelta;

    const AUTHOR: &str = "0x00000000000000000000000000000000000000a1";
    const READER: &str = "0x00000000000000000000000000000000000000b0";
    const ADMIN: &str = "0x00000000000000000000000000000000000000ad";

    struct Fixture {
        lib: Library,
        ledger: Arc<InMemoryLedger>,
        clock: Arc<ManualClock>,
        work_id: String,
    }

    async fn fixture() -> Fixture {
        let ledger = Arc::new(InMemoryLedger::new());
        let clock = Arc::new(ManualClock::default());
        let lib = Library::new(
            Stores::in_memory(),
            ledger.clone(),
            clock.clone(),
            LibraryConfig {
                default_price: "100".into(),
                faucet_amount: "150".into(),
                ..Default::default()
            },
        );
        lib.identity
            .bootstrap_admins(&[AdminSeed {
                nickname: "admin".into(),
                web3_address: ADMIN.into(),
            }])
            .await
            .unwrap();
        for (nickname, address) in [("author", AUTHOR), ("reader", READER)] {
            lib.identity
                .register(Registration {
                    nickname: nickname.into(),
                    web3_address: address.into(),
                })
                .await
                .unwrap();
        }
        lib.identity
            .become_author(
                AUTHOR,
                ProfileFields {
                    email_address: "a@science.org".into(),
                    name: "Ada".into(),
                    surname: "Byron".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let work = lib
            .works
            .publish(
                AUTHOR,
                NewWork {
                    name: "Tides".into(),
                    annotation: "Moon and sea".into(),
                    tags: vec![],
                    price: String::new(),
                    sources: String::new(),
                    language: "en".into(),
                    content: Some(WorkContent {
                        work_data: "full text".into(),
                    }),
                },
            )
            .await
            .unwrap()
            .work;
        lib.works
            .repository()
            .transition(&work.id, WorkTransition::Confirm)
            .await
            .unwrap();

        Fixture {
            lib,
            ledger,
            clock,
            work_id: work.id,
        }
    }

    #[tokio::test]
    async fn test_purchase_pays_author_and_grants_content() {
        let f = fixture().await;
        f.lib.identity.faucet(READER).await.unwrap();

        let outcome = f.lib.purchases.purchase(READER, &f.work_id).await.unwrap();
        assert!(!outcome.receipt.reader_tx_hash.is_empty());
        assert_eq!(f.ledger.balance(READER), 50);
        assert_eq!(f.ledger.balance(AUTHOR), 100);

        let view = f.lib.works.get(Some(READER), &f.work_id).await.unwrap();
        assert!(view.work.content.is_some());

        let again = f.lib.purchases.purchase(READER, &f.work_id).await;
        assert!(matches!(again, Err(LibraryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_insufficient_funds_writes_no_grant() {
        let f = fixture().await;
        let result = f.lib.purchases.purchase(READER, &f.work_id).await;
        assert!(matches!(result, Err(LibraryError::InsufficientFunds(_))));
        assert!(f.lib.purchases.purchased_works(READER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ledger_timeout_writes_no_grant() {
        let ledger = Arc::new(InMemoryLedger::new());
        let lib = Library::new(
            Stores::in_memory(),
            ledger.clone(),
            Arc::new(ManualClock::default()),
            LibraryConfig {
                ledger_timeout: std::time::Duration::from_millis(20),
                ..Default::default()
            },
        );
        lib.identity
            .register(Registration {
                nickname: "reader".into(),
                web3_address: READER.into(),
            })
            .await
            .unwrap();
        lib.identity
            .become_author(
                READER,
                ProfileFields {
                    email_address: "r@science.org".into(),
                    name: "Rita".into(),
                    surname: "Reads".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let work = lib
            .works
            .publish(
                READER,
                NewWork {
                    name: "Own".into(),
                    annotation: "Self published".into(),
                    tags: vec![],
                    price: "1".into(),
                    sources: String::new(),
                    language: String::new(),
                    content: Some(WorkContent {
                        work_data: "x".into(),
                    }),
                },
            )
            .await
            .unwrap()
            .work;

        ledger.set_delay(Some(std::time::Duration::from_millis(200))).await;
        let result = lib.purchases.purchase(READER, &work.id).await;
        assert!(matches!(result, Err(LibraryError::Ledger(_))));

        let reader = lib.identity.basic_info(READER).await.unwrap();
        assert!(!lib
            .purchases
            .has_valid_purchase(&reader.id, &work.id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_grant_expires_after_window() {
        let f = fixture().await;
        let settled = SettledPurchase {
            web3_address: READER.into(),
            work_id: f.work_id.clone(),
        };
        f.lib
            .purchases
            .record_settled(ADMIN, settled.clone())
            .await
            .unwrap();
        assert_eq!(f.lib.purchases.purchased_works(READER).await.unwrap().len(), 1);

        f.clock.advance(TimeDelta::days(2));
        assert_eq!(f.lib.purchases.purchased_works(READER).await.unwrap().len(), 1);

        f.clock.advance(TimeDelta::seconds(1));
        assert!(f.lib.purchases.purchased_works(READER).await.unwrap().is_empty());
        let view = f.lib.works.get(Some(READER), &f.work_id).await.unwrap();
        assert!(view.work.content.is_none());

        // Expired grants do not block a new purchase
        f.lib.purchases.record_settled(ADMIN, settled).await.unwrap();
    }

    #[tokio::test]
    async fn test_bookmarks_are_idempotent() {
        let f = fixture().await;
        assert!(f.lib.purchases.add_bookmark(READER, &f.work_id).await.unwrap());
        assert!(!f.lib.purchases.add_bookmark(READER, &f.work_id).await.unwrap());

        let listed = f.lib.purchases.bookmarks(READER).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].bookmarked);

        assert!(f.lib.purchases.remove_bookmark(READER, &f.work_id).await.unwrap());
        assert!(!f.lib.purchases.remove_bookmark(READER, &f.work_id).await.unwrap());
        assert!(matches!(
            f.lib.purchases.add_bookmark(READER, "missing").await,
            Err(LibraryError::NotFound(_))
        ));
    }
}
