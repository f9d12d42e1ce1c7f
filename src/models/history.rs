//! Represents a recorded image generation and pages of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One completed generation, as stored in `generation_history`.
///
/// Entries are append-only: created once after a successful upload and
/// never updated or reassigned to another user.
#[derive(Serialize, Clone, FromRow, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Ledger-assigned identifier, increasing with every insert.
    pub id: i64,

    /// Owner of the entry, as resolved by authentication.
    pub user_id: String,

    /// Free-form generation category (e.g. the generation mode).
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,

    /// Public URL of the uploaded result.
    pub image_url: String,

    pub prompt: Option<String>,

    pub effect_id: Option<String>,

    /// Assigned by the ledger at insert time.
    pub created_at: DateTime<Utc>,
}

/// Request body for recording a generation.
///
/// Fields are optional here so that missing values reach validation and
/// produce a message naming the field.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewHistoryEntry {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub image_url: Option<String>,
    pub prompt: Option<String>,
    pub effect_id: Option<String>,
}

/// A page of history, newest first.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub items: Vec<HistoryEntry>,
    pub page: i64,
    pub page_size: i64,
    pub has_more: bool,
}
