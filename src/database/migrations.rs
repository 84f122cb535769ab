//! Database migrations for crm-sync
//!
//! This module contains SQL migrations for the SQLite database schema.

/// SQL statement to create the initial database schema
pub const CREATE_SCHEMA: &str = r#"
-- Tenant documents (accounts and watermarks as JSON)
CREATE TABLE IF NOT EXISTS tenants (
    id TEXT PRIMARY KEY,
    api_key TEXT NOT NULL,
    document TEXT NOT NULL,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

-- Sync events written by the sink
CREATE TABLE IF NOT EXISTS actions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    api_key TEXT NOT NULL,
    action_name TEXT NOT NULL,
    action_date DATETIME NOT NULL,
    identity TEXT,
    document TEXT NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_actions_api_key_date ON actions(api_key, action_date);
CREATE INDEX IF NOT EXISTS idx_actions_identity ON actions(identity);
"#;
