//! Exposes an in-process test server for use in integration tests.
//!
//! ```
//! use stampfill_test::node::BatchState;
//! use stampfill_test::server::TestServer;
//!
//! #[tokio::main]
//! async fn main() {
//!    let server = TestServer::new().await;
//!    server.node().script_batch("cafe", [BatchState::usable(0)]);
//!    let url = server.url("/stamps/cafe");
//!    // use the URL in tests...
//! }
//! ```

use std::net::{SocketAddr, TcpListener};

use crate::node::FakeNode;

/// An in-process fake storage node for use in integration tests.
///
/// The server listens on a random available port on localhost and is shut down when dropped.
#[derive(Debug)]
pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
    node: FakeNode,
}

impl TestServer {
    /// Starts a server for an empty [`FakeNode`].
    pub async fn new() -> Self {
        Self::with_node(FakeNode::default()).await
    }

    /// Starts a server that answers requests from the given node.
    pub async fn with_node(node: FakeNode) -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let app = node.router();
        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            handle,
            socket,
            node,
        }
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.socket.port(), path)
    }

    /// The fake node backing this server, used to script responses and inspect uploads.
    pub fn node(&self) -> &FakeNode {
        &self.node
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
