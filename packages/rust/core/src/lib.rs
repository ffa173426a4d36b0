//! Core workflows for Intake.
//!
//! This crate ties together validation, the object store, text extraction,
//! the search index, contact enrichment and notifications into the
//! operations exposed by the CLI (contact intake, uploads, object
//! processing, search, reporting and the background watcher).

pub mod contact;
pub mod enrichment;
pub mod index;
pub mod pipeline;
pub mod report;
pub mod search;
pub mod service;
pub mod upload;
pub mod validation;
pub mod watcher;

pub use contact::generate_contact_id;
pub use enrichment::build_insights;
pub use index::{LibsqlIndexer, SearchHits, SearchIndexer, SearchQuery, index_document_id};
pub use pipeline::{
    EventReport, ObjectEvent, ProcessingOutcome, ProgressReporter, RecordFailure, SilentProgress,
    parse_event, parse_s3_uri,
};
pub use search::index_filter;
pub use service::Service;
pub use upload::UploadRequest;
pub use watcher::{WatchPass, WatcherHandle, WatcherStatus, spawn_watcher};
