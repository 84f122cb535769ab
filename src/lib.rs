//! crm-sync - Incremental CRM-to-analytics synchronization engine
//!
//! This crate pulls companies, contacts and meetings changed since the last
//! run from a CRM search API and writes them as sync events to an analytics
//! sink, tracking per-entity watermarks for each connected account.

pub mod config;
pub mod crm;
pub mod database;
pub mod error;
pub mod models;
pub mod sync;
pub mod telemetry;
