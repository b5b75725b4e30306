//! Work document schema
//!
//! Stores the work's descriptive fields and content. The status here is a
//! copy; the linkage row in PostgreSQL is authoritative.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::LibraryDocument;
use crate::db::schemas::Metadata;
use crate::library::{Work, WorkContent, WorkStatus};

/// Collection name for works
pub const WORK_COLLECTION: &str = "works";

/// Work document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WorkDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Library work id (UUID), shared with the linkage row
    pub id: String,

    pub name: String,

    pub annotation: String,

    pub author_id: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Price in wei, decimal string
    #[serde(default)]
    pub price: String,

    #[serde(default)]
    pub sources: String,

    #[serde(default)]
    pub language: String,

    pub status: WorkStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<WorkContent>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_at: Option<DateTime>,
}

impl From<&Work> for WorkDoc {
    fn from(work: &Work) -> Self {
        Self {
            _id: None,
            metadata: Metadata::at(work.created_at, work.updated_at),
            id: work.id.clone(),
            name: work.name.clone(),
            annotation: work.annotation.clone(),
            author_id: work.author_id.clone(),
            tags: work.tags.clone(),
            price: work.price.clone(),
            sources: work.sources.clone(),
            language: work.language.clone(),
            status: work.status,
            content: work.content.clone(),
            released_at: work.released_at.map(DateTime::from_chrono),
        }
    }
}

impl From<WorkDoc> for Work {
    fn from(doc: WorkDoc) -> Self {
        Self {
            created_at: doc.metadata.created(),
            updated_at: doc.metadata.updated(),
            id: doc.id,
            name: doc.name,
            annotation: doc.annotation,
            author_id: doc.author_id,
            tags: doc.tags,
            price: doc.price,
            sources: doc.sources,
            language: doc.language,
            status: doc.status,
            content: doc.content,
            released_at: doc.released_at.map(|d| d.to_chrono()),
        }
    }
}

impl LibraryDocument for WorkDoc {
    const COLLECTION: &'static str = WORK_COLLECTION;

    fn indexes() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("work_id_unique".to_string())
                        .build(),
                ),
            ),
            // Keyword search; stemming off so phrases match as typed and
            // the per-work `language` field is not read as a text language
            (
                doc! { "name": "text", "annotation": "text" },
                Some(
                    IndexOptions::builder()
                        .name("work_text".to_string())
                        .default_language("none".to_string())
                        .language_override("text_language".to_string())
                        .build(),
                ),
            ),
        ]
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
