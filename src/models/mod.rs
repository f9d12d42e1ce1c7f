//! Core data models for the media storage gateway and history ledger.
//!
//! History entries map to the `generation_history` table via `sqlx::FromRow`;
//! everything here serializes as camelCase JSON via `serde`.

pub mod history;
pub mod object_key;
pub mod upload;
