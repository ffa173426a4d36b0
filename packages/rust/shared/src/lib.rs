//! Shared types, error model, and configuration for Intake.
//!
//! This crate is the foundation depended on by all other Intake crates.
//! It provides:
//! - [`IntakeError`]: the unified error type
//! - Domain types ([`ContactRecord`], [`DocumentRecord`], [`IndexedDocument`], ...)
//! - Configuration ([`AppConfig`], [`ServiceConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EmailConfig, MAX_WATCH_SECS, ServiceConfig, StorageConfig, UploadsConfig,
    WatcherConfig, config_dir, config_file_path, expand_home, init_config, load_config,
    load_config_from, validate_config,
};
pub use error::{IntakeError, Result};
pub use types::{
    AnalyticsResponse, CONTACT_STATUS_NEW, ConfidenceLevel, ContactDocuments, ContactForm,
    ContactRecord, ContactResponse, ContentAnalysis, DocumentId, DocumentInsights,
    DocumentMetadata, DocumentRecord, DocumentResponse, DocumentSummary, Entities,
    HealthResponse, IndexedDocument, MAX_SEARCH_LIMIT, ObjectFacts, ProcessingInfo,
    ProcessingMetadata, ProcessingStatus, SearchRequest, SearchResponse, SearchResult,
    StatsResponse, UNKNOWN, utc_timestamp,
};
