//! Timestamps shared by all documents

use bson::DateTime;
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Metadata {
    /// When the document was last written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    /// When the document was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

impl Metadata {
    /// Metadata carrying domain timestamps
    pub fn at(created_at: chrono::DateTime<Utc>, updated_at: chrono::DateTime<Utc>) -> Self {
        Self {
            updated_at: Some(DateTime::from_chrono(updated_at)),
            created_at: Some(DateTime::from_chrono(created_at)),
        }
    }

    pub fn created(&self) -> chrono::DateTime<Utc> {
        self.created_at
            .map(|d| d.to_chrono())
            .unwrap_or_else(Utc::now)
    }

    pub fn updated(&self) -> chrono::DateTime<Utc> {
        self.updated_at
            .or(self.created_at)
            .map(|d| d.to_chrono())
            .unwrap_or_else(Utc::now)
    }
}
