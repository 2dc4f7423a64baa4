//! # Stampfill Client
//!
//! A small async client for the parts of a storage node's HTTP API that the load generator needs:
//! reading the state of a postage batch and uploading raw bytes against it.
//!
//! ## Usage
//!
//! ```no_run
//! use stampfill_client::{BatchId, Client};
//!
//! #[tokio::main]
//! # async fn main() -> stampfill_client::Result<()> {
//!     let client = Client::builder("http://localhost:1635").build()?;
//!     let batch_id: BatchId = "b7f8691f430db68104e5c92b8aaf2041bd99749fc1aeba44db77ab0a014b614b".parse()?;
//!
//!     let batch = client.batch(&batch_id).await?;
//!     if batch.usable {
//!         let response = client
//!             .upload("Hello, world!")
//!             .batch(&batch_id)
//!             .encrypt(true)
//!             .send()
//!             .await?;
//!         println!("uploaded as {}", response.reference);
//!     }
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod client;
mod error;
mod stamps;
mod upload;

pub use reqwest::StatusCode;

pub use client::*;
pub use error::*;
pub use stamps::*;
pub use upload::*;

#[cfg(test)]
mod tests;
