//! Identity service
//!
//! Registration, role promotions and profiles. Promotions are one-way:
//! a participant's role only ever grows, and asking again for a role
//! already held returns the stored profile without touching the ledger.

use std::sync::Arc;
use tracing::{info, warn};

use super::{log_upstream, require_role, AdminSeed, Core};
use crate::auth::ParticipantRole;
use crate::ledger::bounded;
use crate::library::{
    normalize_address, AuthorInfo, Participant, ProfileFields, Registration, ValidatorInfo,
};
use crate::types::{LibraryError, Result};

#[derive(Clone)]
pub struct IdentityService {
    core: Arc<Core>,
}

impl IdentityService {
    pub(crate) fn new(core: Arc<Core>) -> Self {
        Self { core }
    }

    /// Resolve the caller and check its role
    pub async fn require(&self, address: &str, minimum: ParticipantRole) -> Result<Participant> {
        self.core.participant_with_role(address, minimum).await
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a new Reader and record it on the ledger
    pub async fn register(&self, registration: Registration) -> Result<Participant> {
        registration.validate()?;
        let address = normalize_address(&registration.web3_address);

        if self
            .core
            .stores
            .identity
            .participant_by_address(&address)
            .await?
            .is_some()
        {
            return Err(LibraryError::Conflict(format!(
                "participant {address} already exists"
            )));
        }

        bounded(
            self.core.config.ledger_timeout,
            "add_participant",
            self.core.ledger.add_participant(&address),
        )
        .await
        .map_err(|e| log_upstream("register", &address, e))?;

        let participant = Participant::new(
            registration.nickname.trim(),
            &address,
            ParticipantRole::Reader,
            self.core.clock.now(),
        );
        let participant = self
            .core
            .stores
            .identity
            .create_participant(participant)
            .await
            .map_err(|e| log_upstream("register", &address, e))?;

        info!("Registered participant {} ({})", participant.nickname, address);
        Ok(participant)
    }

    /// Make sure every configured admin exists with the Admin role
    pub async fn bootstrap_admins(&self, seeds: &[AdminSeed]) -> Result<()> {
        for seed in seeds {
            let address = normalize_address(&seed.web3_address);
            match self
                .core
                .stores
                .identity
                .participant_by_address(&address)
                .await?
            {
                Some(existing) if existing.role >= ParticipantRole::Admin => {}
                Some(existing) => {
                    self.core
                        .stores
                        .identity
                        .update_role(&existing.id, ParticipantRole::Admin)
                        .await?;
                    info!("Promoted {} to admin", address);
                }
                None => {
                    let admin = Participant::new(
                        seed.nickname.as_str(),
                        &address,
                        ParticipantRole::Admin,
                        self.core.clock.now(),
                    );
                    self.core.stores.identity.create_participant(admin).await?;
                    info!("Created admin {} ({})", seed.nickname, address);
                }
            }
        }
        Ok(())
    }

    pub async fn exists(&self, address: &str) -> Result<bool> {
        Ok(self
            .core
            .stores
            .identity
            .participant_by_address(&normalize_address(address))
            .await?
            .is_some())
    }

    pub async fn basic_info(&self, address: &str) -> Result<Participant> {
        self.core.participant(address).await
    }

    pub async fn update_nickname(&self, address: &str, nickname: &str) -> Result<Participant> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(LibraryError::BadRequest("nickname is empty".into()));
        }

        let mut participant = self.core.participant(address).await?;
        self.core
            .stores
            .identity
            .update_nickname(&participant.id, nickname)
            .await?;
        participant.nickname = nickname.to_string();
        Ok(participant)
    }

    // ========================================================================
    // Promotions
    // ========================================================================

    /// Grant the Author role and store the author profile
    pub async fn become_author(&self, address: &str, fields: ProfileFields) -> Result<AuthorInfo> {
        fields.validate_author_application()?;
        let mut participant = self.core.participant(address).await?;

        let existing = self.core.stores.profiles.author(&participant.id).await?;
        if participant.role >= ParticipantRole::Author {
            if let Some(profile) = existing {
                return Ok(AuthorInfo {
                    basic_info: participant,
                    author_info: Some(profile),
                });
            }
        } else {
            bounded(
                self.core.config.ledger_timeout,
                "make_author",
                self.core.ledger.make_author(&participant.web3_address),
            )
            .await
            .map_err(|e| log_upstream("become_author", &participant.web3_address, e))?;

            participant.role = self
                .core
                .stores
                .identity
                .update_role(&participant.id, ParticipantRole::Author)
                .await?;
        }

        let profile = match existing {
            Some(profile) => profile,
            None => {
                let profile = fields.into_author(&participant.id);
                self.core.stores.profiles.put_author(&profile).await?;
                profile
            }
        };

        info!(
            "Participant {} is an author (role {})",
            participant.web3_address, participant.role
        );
        Ok(AuthorInfo {
            basic_info: participant,
            author_info: Some(profile),
        })
    }

    /// Grant the Validator role and store the validator profile
    pub async fn become_validator(
        &self,
        address: &str,
        fields: ProfileFields,
    ) -> Result<ValidatorInfo> {
        fields.validate_validator_application()?;
        let mut participant = self.core.participant(address).await?;

        let existing = self.core.stores.profiles.validator(&participant.id).await?;
        if participant.role >= ParticipantRole::Validator {
            if let Some(profile) = existing {
                return Ok(ValidatorInfo {
                    basic_info: participant,
                    validator_info: Some(profile),
                });
            }
        } else {
            bounded(
                self.core.config.ledger_timeout,
                "make_reviewer",
                self.core.ledger.make_reviewer(&participant.web3_address),
            )
            .await
            .map_err(|e| log_upstream("become_validator", &participant.web3_address, e))?;

            participant.role = self
                .core
                .stores
                .identity
                .update_role(&participant.id, ParticipantRole::Validator)
                .await?;
        }

        let profile = match existing {
            Some(profile) => profile,
            None => {
                let profile = fields.into_validator(&participant.id);
                self.core.stores.profiles.put_validator(&profile).await?;
                profile
            }
        };

        info!(
            "Participant {} is a validator (role {})",
            participant.web3_address, participant.role
        );
        Ok(ValidatorInfo {
            basic_info: participant,
            validator_info: Some(profile),
        })
    }

    // ========================================================================
    // Profiles
    // ========================================================================

    /// Public author page; the address must belong to an author
    pub async fn author_info(&self, address: &str) -> Result<AuthorInfo> {
        let participant = self.core.participant(address).await?;
        require_role(&participant, ParticipantRole::Author)?;
        let author_info = self.core.stores.profiles.author(&participant.id).await?;
        Ok(AuthorInfo {
            basic_info: participant,
            author_info,
        })
    }

    /// Public validator page; the address must belong to a validator
    pub async fn validator_info(&self, address: &str) -> Result<ValidatorInfo> {
        let participant = self.core.participant(address).await?;
        require_role(&participant, ParticipantRole::Validator)?;
        let validator_info = self.core.stores.profiles.validator(&participant.id).await?;
        Ok(ValidatorInfo {
            basic_info: participant,
            validator_info,
        })
    }

    pub async fn update_author(&self, address: &str, fields: ProfileFields) -> Result<AuthorInfo> {
        let participant = self
            .core
            .participant_with_role(address, ParticipantRole::Author)
            .await?;
        let mut profile = self
            .core
            .stores
            .profiles
            .author(&participant.id)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("author profile of {address}")))?;

        fields.apply_to_author(&mut profile);
        self.core.stores.profiles.put_author(&profile).await?;
        Ok(AuthorInfo {
            basic_info: participant,
            author_info: Some(profile),
        })
    }

    pub async fn update_validator(
        &self,
        address: &str,
        fields: ProfileFields,
    ) -> Result<ValidatorInfo> {
        let participant = self
            .core
            .participant_with_role(address, ParticipantRole::Validator)
            .await?;
        let mut profile = self
            .core
            .stores
            .profiles
            .validator(&participant.id)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("validator profile of {address}")))?;

        fields.apply_to_validator(&mut profile);
        self.core.stores.profiles.put_validator(&profile).await?;
        Ok(ValidatorInfo {
            basic_info: participant,
            validator_info: Some(profile),
        })
    }

    // ========================================================================
    // Faucet
    // ========================================================================

    /// Hand the configured amount of test tokens to the caller
    pub async fn faucet(&self, address: &str) -> Result<String> {
        let participant = self
            .core
            .participant_with_role(address, ParticipantRole::Reader)
            .await?;
        let amount = &self.core.config.faucet_amount;

        let tx_hash = bounded(
            self.core.config.ledger_timeout,
            "faucet",
            self.core.ledger.faucet(&participant.web3_address, amount),
        )
        .await
        .map_err(|e| log_upstream("faucet", &participant.web3_address, e))?;

        if tx_hash.is_empty() {
            warn!("Faucet for {} returned no tx hash", participant.web3_address);
        }
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::library::{ManualClock, Stores};
    use crate::services::{Library, LibraryConfig};

    const ALICE: &str = "0x00000000000000000000000000000000000a11ce";

    fn library(ledger: Arc<InMemoryLedger>) -> Library {
        Library::new(
            Stores::in_memory(),
            ledger,
            Arc::new(ManualClock::default()),
            LibraryConfig::default(),
        )
    }

    fn author_fields() -> ProfileFields {
        ProfileFields {
            email_address: "alice@science.org".into(),
            name: "Alice".into(),
            surname: "Liddell".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_address() {
        let lib = library(Arc::new(InMemoryLedger::new()));
        let registration = Registration {
            nickname: "alice".into(),
            web3_address: ALICE.to_uppercase().replacen("0X", "0x", 1),
        };

        let participant = lib.identity.register(registration.clone()).await.unwrap();
        assert_eq!(participant.web3_address, ALICE);
        assert_eq!(participant.role, ParticipantRole::Reader);

        let again = lib.identity.register(registration).await;
        assert!(matches!(again, Err(LibraryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_register_fails_when_ledger_is_down() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_unavailable(true);
        let lib = library(ledger);

        let result = lib
            .identity
            .register(Registration {
                nickname: "alice".into(),
                web3_address: ALICE.into(),
            })
            .await;
        assert!(matches!(result, Err(LibraryError::Ledger(_))));
        assert!(!lib.identity.exists(ALICE).await.unwrap());
    }

    #[tokio::test]
    async fn test_promotions_are_monotone_and_idempotent() {
        let ledger = Arc::new(InMemoryLedger::new());
        let lib = library(ledger.clone());
        lib.identity
            .register(Registration {
                nickname: "alice".into(),
                web3_address: ALICE.into(),
            })
            .await
            .unwrap();

        let fields = ProfileFields {
            language: "en".into(),
            ..author_fields()
        };
        lib.identity
            .become_validator(ALICE, fields.clone())
            .await
            .unwrap();

        // Validator outranks Author: the role stays, only the profile is added
        let author = lib.identity.become_author(ALICE, fields).await.unwrap();
        assert_eq!(author.basic_info.role, ParticipantRole::Validator);
        assert!(author.author_info.is_some());

        let calls_before = ledger.calls().await.len();
        lib.identity
            .become_author(ALICE, author_fields())
            .await
            .unwrap();
        assert_eq!(ledger.calls().await.len(), calls_before);
        assert!(!ledger.calls().await.contains(&"make_author".to_string()));
    }

    #[tokio::test]
    async fn test_author_info_requires_author_role() {
        let lib = library(Arc::new(InMemoryLedger::new()));
        lib.identity
            .register(Registration {
                nickname: "alice".into(),
                web3_address: ALICE.into(),
            })
            .await
            .unwrap();

        assert!(matches!(
            lib.identity.author_info(ALICE).await,
            Err(LibraryError::Forbidden(_))
        ));

        lib.identity
            .become_author(ALICE, author_fields())
            .await
            .unwrap();
        let updated = lib
            .identity
            .update_author(
                ALICE,
                ProfileFields {
                    orcid: "0000-0002-1825-0097".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let profile = updated.author_info.unwrap();
        assert_eq!(profile.name, "Alice");
        assert_eq!(profile.orcid, "0000-0002-1825-0097");
    }

    #[tokio::test]
    async fn test_bootstrap_admins_promotes_existing() {
        let lib = library(Arc::new(InMemoryLedger::new()));
        lib.identity
            .register(Registration {
                nickname: "alice".into(),
                web3_address: ALICE.into(),
            })
            .await
            .unwrap();

        let seeds = vec![
            AdminSeed {
                nickname: "alice".into(),
                web3_address: ALICE.into(),
            },
            AdminSeed {
                nickname: "root".into(),
                web3_address: "0x000000000000000000000000000000000000beef".into(),
            },
        ];
        lib.identity.bootstrap_admins(&seeds).await.unwrap();
        lib.identity.bootstrap_admins(&seeds).await.unwrap();

        for seed in &seeds {
            let admin = lib.identity.basic_info(&seed.web3_address).await.unwrap();
            assert_eq!(admin.role, ParticipantRole::Admin);
        }
    }
}
