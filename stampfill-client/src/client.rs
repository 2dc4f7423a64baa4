use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::{Batch, BatchId, Error};

const USER_AGENT: &str = concat!("stampfill-client/", env!("CARGO_PKG_VERSION"));

#[derive(Debug)]
struct ClientBuilderInner {
    node_url: Url,
    reqwest_builder: reqwest::ClientBuilder,
}

/// Builder to create a [`Client`].
#[must_use]
#[derive(Debug)]
pub struct ClientBuilder(crate::Result<ClientBuilderInner>);

impl ClientBuilder {
    /// Creates a new [`ClientBuilder`], configured with the given `node_url`.
    ///
    /// Unlike most API clients, no timeouts are configured by default. Uploads can be large and
    /// a node that is busy stamping chunks may take a long time to answer. Use
    /// [`Self::timeout`] to bound requests.
    pub fn new(node_url: impl reqwest::IntoUrl) -> Self {
        let node_url = match node_url.into_url() {
            Ok(url) => url,
            Err(err) => return Self(Err(err.into())),
        };

        if node_url.cannot_be_a_base() {
            return Self(Err(Error::InvalidUrl {
                message: format!("`{node_url}` cannot be used as a base URL"),
            }));
        }

        let reqwest_builder = reqwest::Client::builder().user_agent(USER_AGENT);

        Self(Ok(ClientBuilderInner {
            node_url,
            reqwest_builder,
        }))
    }

    /// Sets both the connect and the read timeout for the [`reqwest::Client`].
    /// For more fine-grained configuration, use [`Self::configure_reqwest`].
    pub fn timeout(self, timeout: Duration) -> Self {
        self.configure_reqwest(|builder| builder.connect_timeout(timeout).read_timeout(timeout))
    }

    /// Calls the closure with the underlying [`reqwest::ClientBuilder`].
    pub fn configure_reqwest<F>(self, closure: F) -> Self
    where
        F: FnOnce(reqwest::ClientBuilder) -> reqwest::ClientBuilder,
    {
        let Ok(inner) = self.0 else { return self };
        Self(Ok(ClientBuilderInner {
            node_url: inner.node_url,
            reqwest_builder: closure(inner.reqwest_builder),
        }))
    }

    /// Returns a [`Client`] that uses this [`ClientBuilder`] configuration.
    ///
    /// # Errors
    ///
    /// This method fails if:
    /// - the given `node_url` is invalid
    /// - the [`reqwest::Client`] fails to build. Refer to [`reqwest::ClientBuilder::build`] for
    ///   more information on when this can happen.
    pub fn build(self) -> crate::Result<Client> {
        let inner = self.0?;
        Ok(Client {
            inner: Arc::new(ClientInner {
                reqwest: inner.reqwest_builder.build()?,
                node_url: inner.node_url,
            }),
        })
    }
}

#[derive(Debug)]
pub(crate) struct ClientInner {
    reqwest: reqwest::Client,
    node_url: Url,
}

/// A client for the node API. Use [`Client::builder`] to configure and construct this.
///
/// The client is cheap to clone, all clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Convenience function to create a [`ClientBuilder`].
    pub fn builder(node_url: impl reqwest::IntoUrl) -> ClientBuilder {
        ClientBuilder::new(node_url)
    }

    /// The node URL this client sends requests to.
    pub fn node_url(&self) -> &Url {
        &self.inner.node_url
    }

    /// Fetches the current state of the given postage batch.
    ///
    /// Every call returns a complete, fresh snapshot of the batch.
    pub async fn batch(&self, batch_id: &BatchId) -> crate::Result<Batch> {
        let response = self
            .request(reqwest::Method::GET, &["stamps", batch_id.as_str()])?
            .send()
            .await?;

        handle_response(response).await
    }

    pub(crate) fn request(
        &self,
        method: reqwest::Method,
        segments: &[&str],
    ) -> crate::Result<reqwest::RequestBuilder> {
        let url = self.endpoint(segments)?;
        Ok(self.inner.reqwest.request(method, url))
    }

    fn endpoint(&self, segments: &[&str]) -> crate::Result<Url> {
        let mut url = self.inner.node_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl {
                message: format!("`{}` cannot be used as a base URL", self.inner.node_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Error body returned by the node for failed requests.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Turns non-success responses into [`Error::UnexpectedStatus`] and decodes the JSON body of
/// successful ones.
pub(crate) async fn handle_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> crate::Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(ErrorBody { message }) => message,
            Err(_) => body.trim().to_owned(),
        };
        return Err(Error::UnexpectedStatus { status, message });
    }

    Ok(response.json().await?)
}
