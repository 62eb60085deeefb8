use async_trait::async_trait;

use crate::{db::DbPool, errors::ServiceError};

pub mod warranty_queries;

/// Trait representing a generic asynchronous read query.
#[async_trait]
pub trait Query: Send + Sync {
    type Result: Send + Sync;

    /// Executes the query using the provided database connection
    async fn execute(&self, db: &DbPool) -> Result<Self::Result, ServiceError>;
}
