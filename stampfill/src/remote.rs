//! The node operations a worker depends on, and their HTTP implementation.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use stampfill_client::{Batch, BatchId, Client, Reference, UploadOptions};

/// Fetches the current state of a postage batch.
///
/// Implementations perform a single read-only request and do not retry.
#[async_trait]
pub trait BatchStatusClient: fmt::Debug + Send + Sync {
    /// Returns a fresh snapshot of the batch.
    async fn fetch(&self, batch_id: &BatchId) -> stampfill_client::Result<Batch>;
}

/// Uploads a payload stamped with a postage batch.
#[async_trait]
pub trait UploadClient: fmt::Debug + Send + Sync {
    /// Uploads the full payload and returns the content reference assigned by the node.
    async fn upload(
        &self,
        payload: Bytes,
        batch_id: &BatchId,
        options: UploadOptions,
    ) -> stampfill_client::Result<Reference>;
}

/// A remote implementation using HTTP to talk to the node.
#[derive(Clone, Debug)]
pub struct HttpRemote {
    /// The client used to talk to the node.
    pub client: Client,
}

impl HttpRemote {
    /// Creates a new `HttpRemote` on top of the given client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BatchStatusClient for HttpRemote {
    async fn fetch(&self, batch_id: &BatchId) -> stampfill_client::Result<Batch> {
        self.client.batch(batch_id).await
    }
}

#[async_trait]
impl UploadClient for HttpRemote {
    async fn upload(
        &self,
        payload: Bytes,
        batch_id: &BatchId,
        options: UploadOptions,
    ) -> stampfill_client::Result<Reference> {
        let response = self
            .client
            .upload(payload)
            .batch(batch_id)
            .options(options)
            .send()
            .await?;
        Ok(response.reference)
    }
}
