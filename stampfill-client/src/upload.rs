use std::fmt;

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::client::handle_response;
use crate::{BatchId, Client};

/// Header naming the postage batch an upload is stamped with.
pub const HEADER_POSTAGE_BATCH_ID: &str = "swarm-postage-batch-id";
/// Header toggling encryption of the uploaded content.
pub const HEADER_ENCRYPT: &str = "swarm-encrypt";
/// Header toggling deferred uploads.
pub const HEADER_DEFERRED_UPLOAD: &str = "swarm-deferred-upload";

/// Flags forwarded to the node alongside every upload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Ask the node to encrypt the content before storing it.
    pub encrypt: bool,
    /// Ask the node to defer pushing the content to the network.
    pub deferred: bool,
}

/// Opaque content reference returned by the node after a successful upload.
#[derive(Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct Reference(String);

impl Reference {
    /// Returns the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Reference {
    fn from(reference: String) -> Self {
        Self(reference)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reference").field(&self.0).finish()
    }
}

/// The response returned from the node after uploading bytes.
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    /// The reference under which the content can be retrieved.
    pub reference: Reference,
}

impl Client {
    /// Creates an upload request for the given payload.
    ///
    /// The request has to be bound to a batch with [`UploadBuilder::batch`] before sending.
    pub fn upload(&self, payload: impl Into<Bytes>) -> UploadBuilder {
        UploadBuilder {
            client: self.clone(),
            batch_id: None,
            options: UploadOptions::default(),
            payload: payload.into(),
        }
    }
}

/// An [`upload`](Client::upload) request builder.
#[must_use]
pub struct UploadBuilder {
    client: Client,
    batch_id: Option<BatchId>,
    options: UploadOptions,
    payload: Bytes,
}

impl fmt::Debug for UploadBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadBuilder")
            .field("batch_id", &self.batch_id)
            .field("options", &self.options)
            .field("len", &self.payload.len())
            .finish_non_exhaustive()
    }
}

impl UploadBuilder {
    /// Sets the postage batch the upload is paid with.
    pub fn batch(mut self, batch_id: &BatchId) -> Self {
        self.batch_id = Some(batch_id.clone());
        self
    }

    /// Sets whether the node should encrypt the content.
    pub fn encrypt(mut self, encrypt: bool) -> Self {
        self.options.encrypt = encrypt;
        self
    }

    /// Sets whether the node should defer the upload to the network.
    pub fn deferred(mut self, deferred: bool) -> Self {
        self.options.deferred = deferred;
        self
    }

    /// Replaces all upload flags at once.
    pub fn options(mut self, options: UploadOptions) -> Self {
        self.options = options;
        self
    }

    fn headers(&self) -> crate::Result<HeaderMap> {
        let batch_id = self
            .batch_id
            .as_ref()
            .ok_or(crate::Error::MissingBatch)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            HEADER_POSTAGE_BATCH_ID,
            HeaderValue::from_str(batch_id.as_str())?,
        );
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        headers.insert(
            HEADER_DEFERRED_UPLOAD,
            HeaderValue::from_static(bool_str(self.options.deferred)),
        );
        headers.insert(
            HEADER_ENCRYPT,
            HeaderValue::from_static(bool_str(self.options.encrypt)),
        );
        Ok(headers)
    }

    /// Sends the upload to the node.
    ///
    /// # Errors
    ///
    /// Fails if no batch was set, on transport errors, if the node responds with a non-success
    /// status, or if the response body does not contain a reference.
    pub async fn send(self) -> crate::Result<UploadResponse> {
        let headers = self.headers()?;
        let response = self
            .client
            .request(reqwest::Method::POST, &["bytes"])?
            .headers(headers)
            .body(self.payload)
            .send()
            .await?;

        handle_response(response).await
    }
}

fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}
