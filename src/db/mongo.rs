//! MongoDB client and typed collections
//!
//! Each document schema names its collection and indexes through
//! [`LibraryDocument`]; the indexes are created when the collection is opened.

use bson::{doc, DateTime, Document};
use futures_util::TryStreamExt;
use mongodb::{
    options::{ClientOptions, IndexOptions, UpdateModifications},
    Client, Collection, Database, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::db::schemas::Metadata;
use crate::types::LibraryError;

/// Server selection and connect budget; startup fails instead of hanging
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// A document type stored in its own collection
pub trait LibraryDocument: Serialize + DeserializeOwned + Unpin + Send + Sync {
    const COLLECTION: &'static str;

    fn indexes() -> Vec<(Document, Option<IndexOptions>)>;

    fn metadata_mut(&mut self) -> &mut Metadata;
}

fn failed(operation: &'static str) -> impl Fn(mongodb::error::Error) -> LibraryError {
    move |e| LibraryError::Database(format!("MongoDB {operation} failed: {e}"))
}

#[derive(Clone)]
pub struct MongoClient {
    database: Database,
}

impl MongoClient {
    /// Connect and ping the database
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, LibraryError> {
        info!("Connecting to MongoDB database '{}'", db_name);

        let mut options = ClientOptions::parse(uri).await.map_err(failed("connect"))?;
        options.app_name = Some("scriptorium".to_string());
        options.server_selection_timeout.get_or_insert(CONNECT_TIMEOUT);
        options.connect_timeout.get_or_insert(CONNECT_TIMEOUT);

        let database = Client::with_options(options)
            .map_err(failed("connect"))?
            .database(db_name);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(failed("ping"))?;

        info!("Connected to MongoDB database '{}'", db_name);
        Ok(Self { database })
    }

    /// Open the collection of `T`, creating its indexes
    pub async fn collection<T: LibraryDocument>(&self) -> Result<MongoCollection<T>, LibraryError> {
        let collection = MongoCollection {
            inner: self.database.collection::<T>(T::COLLECTION),
        };
        collection.create_indexes().await?;
        Ok(collection)
    }
}

#[derive(Debug, Clone)]
pub struct MongoCollection<T: Send + Sync> {
    inner: Collection<T>,
}

impl<T: LibraryDocument> MongoCollection<T> {
    async fn create_indexes(&self) -> Result<(), LibraryError> {
        let indexes: Vec<IndexModel> = T::indexes()
            .into_iter()
            .map(|(keys, options)| IndexModel::builder().keys(keys).options(options).build())
            .collect();
        if indexes.is_empty() {
            return Ok(());
        }

        let count = indexes.len();
        self.inner
            .create_indexes(indexes)
            .await
            .map_err(failed("create_indexes"))?;
        debug!("{} indexes ensured on {}", count, T::COLLECTION);
        Ok(())
    }

    /// Replace the document matching `filter`, inserting it when absent.
    /// `created_at` is kept when already set; `updated_at` is stamped now.
    pub async fn upsert_one(&self, filter: Document, mut item: T) -> Result<(), LibraryError> {
        let now = DateTime::now();
        let metadata = item.metadata_mut();
        metadata.created_at.get_or_insert(now);
        metadata.updated_at = Some(now);

        self.inner
            .replace_one(filter, item)
            .upsert(true)
            .await
            .map_err(failed("upsert"))?;
        Ok(())
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, LibraryError> {
        self.inner.find_one(filter).await.map_err(failed("find"))
    }

    /// Every document matching `filter`; an unreadable document fails the read
    pub async fn find_many(&self, filter: Document) -> Result<Vec<T>, LibraryError> {
        self.inner
            .find(filter)
            .await
            .map_err(failed("find"))?
            .try_collect()
            .await
            .map_err(failed("read cursor"))
    }

    /// Apply an update to the first match; returns whether one matched
    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<bool, LibraryError> {
        let result = self
            .inner
            .update_one(filter, update.into())
            .await
            .map_err(failed("update"))?;
        Ok(result.matched_count > 0)
    }

    /// Delete the first match; returns whether anything was removed
    pub async fn delete_one(&self, filter: Document) -> Result<bool, LibraryError> {
        let result = self
            .inner
            .delete_one(filter)
            .await
            .map_err(failed("delete"))?;
        Ok(result.deleted_count > 0)
    }
}
