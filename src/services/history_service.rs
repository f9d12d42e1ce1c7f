//! src/services/history_service.rs
//!
//! HistoryService: append-only ledger of generation events backed by
//! SQLite. Listing is offset/limit over `created_at DESC, id DESC`; instead of
//! counting rows, a full page triggers a single `LIMIT 1` probe to decide
//! whether another page exists.

use crate::models::history::{HistoryEntry, HistoryPage, NewHistoryEntry};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 50;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type HistoryResult<T> = Result<T, HistoryError>;

/// Normalized page coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    /// `page` floored at 1; `page_size` clamped to `1..=MAX_PAGE_SIZE`.
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(DEFAULT_PAGE).max(1),
            page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Lenient parse of raw query values; unparseable input falls back to
    /// the defaults.
    pub fn parse(page: Option<&str>, page_size: Option<&str>) -> Self {
        Self::new(page.and_then(leading_int), page_size.and_then(leading_int))
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Integer prefix of `raw` (`"3"`, `"-2"`, `"12abc"`), like a browser's parseInt.
fn leading_int(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let digits_start = usize::from(raw.starts_with(['-', '+']));
    let digits_len = raw[digits_start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return None;
    }
    raw[..digits_start + digits_len].parse().ok()
}

#[derive(Clone)]
pub struct HistoryService {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl HistoryService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Append a generation event for `user_id`.
    ///
    /// `type` and `imageUrl` must be non-blank; blank optional fields are
    /// stored as NULL. The same image may be recorded more than once.
    pub async fn record_event(
        &self,
        user_id: &str,
        entry: NewHistoryEntry,
    ) -> HistoryResult<HistoryEntry> {
        let kind = required(entry.kind, "type")?;
        let image_url = required(entry.image_url, "imageUrl")?;
        let prompt = optional(entry.prompt);
        let effect_id = optional(entry.effect_id);
        debug!(
            "create-history userId={} type={} imageUrl={} effectId={:?}",
            user_id, kind, image_url, effect_id
        );

        let created = sqlx::query_as::<_, HistoryEntry>(
            r#"
            INSERT INTO generation_history (user_id, type, image_url, prompt, effect_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, user_id, type, image_url, prompt, effect_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(&kind)
        .bind(&image_url)
        .bind(prompt)
        .bind(effect_id)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;

        Ok(created)
    }

    /// Newest-first page of `user_id`'s history.
    ///
    /// Rows sharing a `created_at` are ordered by `id DESC`. `has_more` is
    /// only probed when the page came back full; a short page is the last.
    pub async fn list_history(
        &self,
        user_id: &str,
        request: PageRequest,
    ) -> HistoryResult<HistoryPage> {
        let items = sqlx::query_as::<_, HistoryEntry>(
            "SELECT id, user_id, type, image_url, prompt, effect_id, created_at
             FROM generation_history
             WHERE user_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(request.page_size)
        .bind(request.offset())
        .fetch_all(&*self.db)
        .await?;

        let has_more = match items.last() {
            Some(last) if items.len() as i64 == request.page_size => {
                self.has_entries_after(user_id, last.created_at, last.id)
                    .await?
            }
            _ => false,
        };

        debug!(
            "list-history userId={} page={} pageSize={} returned={} hasMore={}",
            user_id,
            request.page,
            request.page_size,
            items.len(),
            has_more
        );

        Ok(HistoryPage {
            items,
            page: request.page,
            page_size: request.page_size,
            has_more,
        })
    }

    /// Whether any entry sorts after `(created_at, id)` in listing order.
    async fn has_entries_after(
        &self,
        user_id: &str,
        created_at: DateTime<Utc>,
        id: i64,
    ) -> HistoryResult<bool> {
        let next = sqlx::query_scalar::<_, i64>(
            "SELECT 1 FROM generation_history
             WHERE user_id = ?
               AND (created_at < ? OR (created_at = ? AND id < ?))
             LIMIT 1",
        )
        .bind(user_id)
        .bind(created_at)
        .bind(created_at)
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;

        Ok(next.is_some())
    }
}

fn required(value: Option<String>, field: &'static str) -> HistoryResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(HistoryError::MissingField(field))
}

fn optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
