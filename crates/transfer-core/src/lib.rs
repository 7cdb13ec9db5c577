//! Concurrent block-transfer pipeline: partitions assets into parts and
//! moves them between local files and HTTP(S) endpoints, downloading from a
//! single source or uploading across a multipart target URI list, with
//! bounded concurrency, retry, and a pooled in-memory staging buffer.
//!
//! The library never installs a `tracing` subscriber; that is the host
//! binary's responsibility (see `transfer-cli`'s `logging` module).

pub mod api;
pub mod cancel;
pub mod config;
pub mod controller;
pub mod error;
pub mod fetch_head;
pub mod filter;
pub mod joiner;
pub mod mapper;
pub mod model;
pub mod planner;
pub mod pool;
pub mod retry;
pub mod storage;
pub mod transfer_op;

pub use api::{download_files, upload_files, BatchHandle, BatchOutcome, DownloadFile, UploadFile};
pub use config::{Options, TransferConfig};
pub use controller::Event;
pub use error::TransferError;
