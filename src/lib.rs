//! Streaming ingestion pipeline for genomic data files.
//!
//! Uploads pass through gate checks (filename, size, extension), a
//! bounded-memory content validator for the detected format, a single-pass
//! hashed write into local storage, and finally a durable processing record
//! that tracks the upload through its lifecycle.

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod notify;
pub mod output;
pub mod records;
pub mod registry;
pub mod storage;
pub mod validators;
