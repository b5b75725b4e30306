//! Store implementations
//!
//! - **MongoDB**: works, reviews, author and validator profiles
//! - **PostgreSQL**: participants, work/review linkage, purchase grants, bookmarks
//! - **Memory**: everything, for tests and dev mode

pub mod document;
pub mod memory;
pub mod mongo;
pub mod postgres;
pub mod schemas;

use std::sync::Arc;

use crate::library::Stores;
use crate::types::Result;

pub use document::MongoDocumentStore;
pub use memory::MemoryStore;
pub use mongo::{LibraryDocument, MongoClient, MongoCollection};
pub use postgres::PgLinkageStore;

/// Connect both databases and bundle them as [`Stores`]
pub async fn connect(mongodb_uri: &str, mongodb_db: &str, postgres_url: &str) -> Result<Stores> {
    let mongo = MongoClient::new(mongodb_uri, mongodb_db).await?;
    let documents = Arc::new(MongoDocumentStore::new(&mongo).await?);

    let relational = Arc::new(PgLinkageStore::connect(postgres_url).await?);
    relational.run_migrations().await?;

    Ok(Stores {
        identity: relational.clone(),
        profiles: documents.clone(),
        works: documents.clone(),
        reviews: documents,
        linkage: relational,
    })
}
