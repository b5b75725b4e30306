//! Author and validator profile schemas
//!
//! One document per promoted participant, keyed by the participant id from
//! PostgreSQL.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::LibraryDocument;
use crate::db::schemas::Metadata;
use crate::library::{AuthorProfile, ValidatorProfile};

pub const AUTHOR_COLLECTION: &str = "authors";

pub const VALIDATOR_COLLECTION: &str = "validators";

fn participant_id_index() -> Vec<(Document, Option<IndexOptions>)> {
    vec![(
        doc! { "id": 1 },
        Some(
            IndexOptions::builder()
                .unique(true)
                .name("participant_id_unique".to_string())
                .build(),
        ),
    )]
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AuthorDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Participant id
    pub id: String,

    pub name: String,
    #[serde(default)]
    pub middlename: String,
    pub surname: String,
    pub email_address: String,
    #[serde(default)]
    pub orcid: String,
    #[serde(default)]
    pub sciences: Vec<String>,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub scholar_ship_profile: String,
}

impl From<&AuthorProfile> for AuthorDoc {
    fn from(p: &AuthorProfile) -> Self {
        Self {
            _id: None,
            metadata: Metadata::default(),
            id: p.id.clone(),
            name: p.name.clone(),
            middlename: p.middlename.clone(),
            surname: p.surname.clone(),
            email_address: p.email_address.clone(),
            orcid: p.orcid.clone(),
            sciences: p.sciences.clone(),
            language: p.language.clone(),
            scholar_ship_profile: p.scholar_ship_profile.clone(),
        }
    }
}

impl From<AuthorDoc> for AuthorProfile {
    fn from(d: AuthorDoc) -> Self {
        Self {
            id: d.id,
            name: d.name,
            middlename: d.middlename,
            surname: d.surname,
            email_address: d.email_address,
            orcid: d.orcid,
            sciences: d.sciences,
            language: d.language,
            scholar_ship_profile: d.scholar_ship_profile,
        }
    }
}

impl LibraryDocument for AuthorDoc {
    const COLLECTION: &'static str = AUTHOR_COLLECTION;

    fn indexes() -> Vec<(Document, Option<IndexOptions>)> {
        participant_id_index()
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ValidatorDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Participant id
    pub id: String,

    pub name: String,
    #[serde(default)]
    pub middlename: String,
    pub surname: String,
    pub email_address: String,
    #[serde(default)]
    pub orcid: String,
    #[serde(default)]
    pub sciences: Vec<String>,
    #[serde(default)]
    pub language: String,
    /// Diploma document reference
    #[serde(default)]
    pub diploma_id: String,
}

impl From<&ValidatorProfile> for ValidatorDoc {
    fn from(p: &ValidatorProfile) -> Self {
        Self {
            _id: None,
            metadata: Metadata::default(),
            id: p.id.clone(),
            name: p.name.clone(),
            middlename: p.middlename.clone(),
            surname: p.surname.clone(),
            email_address: p.email_address.clone(),
            orcid: p.orcid.clone(),
            sciences: p.sciences.clone(),
            language: p.language.clone(),
            diploma_id: p.diploma_id.clone(),
        }
    }
}

impl From<ValidatorDoc> for ValidatorProfile {
    fn from(d: ValidatorDoc) -> Self {
        Self {
            id: d.id,
            name: d.name,
            middlename: d.middlename,
            surname: d.surname,
            email_address: d.email_address,
            orcid: d.orcid,
            sciences: d.sciences,
            language: d.language,
            diploma_id: d.diploma_id,
        }
    }
}

impl LibraryDocument for ValidatorDoc {
    const COLLECTION: &'static str = VALIDATOR_COLLECTION;

    fn indexes() -> Vec<(Document, Option<IndexOptions>)> {
        participant_id_index()
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
