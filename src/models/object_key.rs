//! Represents the key under which a generated image is stored.

use chrono::Utc;
use serde::Serialize;
use std::fmt;

/// Extension used when the uploaded file name carries none (or an unusable one).
pub const DEFAULT_EXTENSION: &str = "png";

/// Number of random bytes appended to the timestamp; rendered as hex.
const RANDOM_SUFFIX_LEN: usize = 6;

/// Object key of the form `users/<userId>/generated/<millis>-<hex>.<ext>`.
///
/// The timestamp and random suffix together make collisions between
/// concurrent uploads of the same user practically impossible. They do not
/// make keys strictly sortable.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Derive a fresh key for `user_id`, taking the extension from `file_name`.
    pub fn generate(user_id: &str, file_name: &str) -> Self {
        let suffix: [u8; RANDOM_SUFFIX_LEN] = rand::random();
        Self::from_parts(user_id, Utc::now().timestamp_millis(), &suffix, file_name)
    }

    fn from_parts(user_id: &str, millis: i64, suffix: &[u8], file_name: &str) -> Self {
        Self(format!(
            "users/{}/generated/{}-{}.{}",
            user_id,
            millis,
            hex::encode(suffix),
            extension_of(file_name)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Whether `user_id` can stand as the single `<userId>` segment of a key.
///
/// Rejects empty and dot segments, and any byte outside printable ASCII or
/// with meaning in a key path or its public URL (`/`, `\`, `?`, `#`, `%`).
pub fn is_key_safe_user_id(user_id: &str) -> bool {
    !matches!(user_id, "" | "." | "..")
        && user_id
            .bytes()
            .all(|b| b.is_ascii_graphic() && !matches!(b, b'/' | b'\\' | b'?' | b'#' | b'%'))
}

/// Extension after the last `.` of `file_name`.
///
/// Falls back to [`DEFAULT_EXTENSION`] when there is no dot, when the
/// extension is empty, or when it contains anything but ASCII alphanumerics
/// (a `/` there would move the object out of the user's prefix).
pub fn extension_of(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && ext.bytes().all(|b| b.is_ascii_alphanumeric()) => ext,
        _ => DEFAULT_EXTENSION,
    }
}
