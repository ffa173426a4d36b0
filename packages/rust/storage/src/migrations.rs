//! SQL migration definitions for the Intake database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: contacts, documents, counters, outbox",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Contact form submissions
CREATE TABLE IF NOT EXISTS contacts (
    id                          TEXT PRIMARY KEY,
    name                        TEXT NOT NULL,
    email                       TEXT NOT NULL,
    company                     TEXT NOT NULL,
    service                     TEXT NOT NULL,
    budget                      TEXT NOT NULL,
    message                     TEXT NOT NULL,
    timestamp                   TEXT NOT NULL,
    status                      TEXT NOT NULL,
    source                      TEXT NOT NULL,
    user_agent                  TEXT NOT NULL,
    page_url                    TEXT NOT NULL,
    document_processing_enabled INTEGER NOT NULL DEFAULT 0,
    search_capabilities         INTEGER NOT NULL DEFAULT 0,
    document_insights_json      TEXT,
    last_updated                TEXT
);

-- Uploaded documents
CREATE TABLE IF NOT EXISTS documents (
    id                       TEXT PRIMARY KEY,
    contact_id               TEXT NOT NULL,
    filename                 TEXT NOT NULL,
    size                     INTEGER NOT NULL,
    content_type             TEXT NOT NULL,
    document_type            TEXT NOT NULL,
    description              TEXT NOT NULL DEFAULT '',
    tags_json                TEXT NOT NULL DEFAULT '[]',
    upload_timestamp         TEXT NOT NULL,
    processing_status        TEXT NOT NULL,
    s3_bucket                TEXT NOT NULL,
    s3_key                   TEXT NOT NULL,
    file_hash                TEXT NOT NULL,
    processing_metadata_json TEXT,
    processing_timestamp     TEXT,
    complexity_score         REAL,
    indexed_timestamp        TEXT,
    processing_error         TEXT,
    UNIQUE(s3_bucket, s3_key)
);

CREATE INDEX IF NOT EXISTS idx_documents_contact ON documents(contact_id);
CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(processing_status);

-- Named counters (visitor count)
CREATE TABLE IF NOT EXISTS counters (
    name  TEXT PRIMARY KEY,
    count INTEGER NOT NULL DEFAULT 0
);

-- Outgoing email
CREATE TABLE IF NOT EXISTS outbox (
    id           TEXT PRIMARY KEY,
    from_address TEXT NOT NULL,
    to_address   TEXT NOT NULL,
    subject      TEXT NOT NULL,
    body         TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Search index: named indexes, indexed documents, FTS5",
            sql: r#"
CREATE TABLE IF NOT EXISTS search_indexes (
    name       TEXT PRIMARY KEY,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS indexed_documents (
    id               TEXT PRIMARY KEY,
    index_name       TEXT NOT NULL REFERENCES search_indexes(name) ON DELETE CASCADE,
    contact_id       TEXT NOT NULL,
    filename         TEXT NOT NULL,
    document_type    TEXT NOT NULL,
    status           TEXT NOT NULL,
    text_content     TEXT NOT NULL,
    keywords         TEXT NOT NULL,
    timestamp        TEXT NOT NULL,
    document_json    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_indexed_documents_index ON indexed_documents(index_name);
CREATE INDEX IF NOT EXISTS idx_indexed_documents_contact ON indexed_documents(contact_id);

-- Full-text search on filename, extracted text and keywords
CREATE VIRTUAL TABLE IF NOT EXISTS indexed_documents_fts USING fts5(
    filename,
    text_content,
    keywords,
    content=indexed_documents,
    content_rowid=rowid
);

-- Triggers to keep FTS in sync with indexed_documents
CREATE TRIGGER IF NOT EXISTS indexed_documents_fts_insert AFTER INSERT ON indexed_documents BEGIN
    INSERT INTO indexed_documents_fts(rowid, filename, text_content, keywords)
    VALUES (new.rowid, new.filename, new.text_content, new.keywords);
END;

CREATE TRIGGER IF NOT EXISTS indexed_documents_fts_delete AFTER DELETE ON indexed_documents BEGIN
    INSERT INTO indexed_documents_fts(indexed_documents_fts, rowid, filename, text_content, keywords)
    VALUES ('delete', old.rowid, old.filename, old.text_content, old.keywords);
END;

CREATE TRIGGER IF NOT EXISTS indexed_documents_fts_update AFTER UPDATE ON indexed_documents BEGIN
    INSERT INTO indexed_documents_fts(indexed_documents_fts, rowid, filename, text_content, keywords)
    VALUES ('delete', old.rowid, old.filename, old.text_content, old.keywords);
    INSERT INTO indexed_documents_fts(rowid, filename, text_content, keywords)
    VALUES (new.rowid, new.filename, new.text_content, new.keywords);
END;

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
