//! A load generator that fills postage batches on a storage node.
//!
//! Each configured [`Worker`] waits for its batch to become usable and then uploads random
//! payloads against it until the node reports the batch as full or expired. Workers run
//! concurrently and share a [`StopSignal`]: as soon as one of them fails, all others stop at
//! their next iteration.
//!
//! The node is only accessed through the [`BatchStatusClient`] and [`UploadClient`] traits,
//! [`HttpRemote`] implements both on top of [`stampfill_client`].
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod coordinator;
pub mod observability;
pub mod payload;
pub mod remote;
pub mod stop;
pub mod summary;
pub mod worker;
pub mod worker_log;

pub use crate::config::Config;
pub use crate::coordinator::{run, run_all};
pub use crate::remote::{BatchStatusClient, HttpRemote, UploadClient};
pub use crate::stop::StopSignal;
pub use crate::summary::Summary;
pub use crate::worker::{Outcome, Worker, WorkerError, WorkerReport};
