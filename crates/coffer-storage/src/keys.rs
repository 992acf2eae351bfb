//! Shared key and bucket name checks for storage backends.

use coffer_core::{StoreError, StoreResult};

/// Longest object key accepted by S3-compatible services, in bytes.
pub const MAX_KEY_LEN: usize = 1024;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Check an object key before any remote call is made.
pub fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey("key must not be empty".to_string()));
    }

    if key.len() > MAX_KEY_LEN {
        return Err(StoreError::InvalidKey(format!(
            "key is {} bytes, limit is {}",
            key.len(),
            MAX_KEY_LEN
        )));
    }

    Ok(())
}

/// Check a bucket name against the S3 naming rules.
///
/// 3 to 63 characters of lowercase letters, digits, `.` and `-`, starting and
/// ending with a letter or digit, without consecutive dots.
pub fn validate_bucket_name(name: &str) -> Result<(), String> {
    if !(3..=63).contains(&name.len()) {
        return Err(format!("bucket name '{}' must be 3 to 63 characters", name));
    }

    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-');
    if !valid_chars {
        return Err(format!(
            "bucket name '{}' may only contain lowercase letters, digits, '.' and '-'",
            name
        ));
    }

    let alnum = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !alnum(name.chars().next()) || !alnum(name.chars().last()) {
        return Err(format!(
            "bucket name '{}' must start and end with a letter or digit",
            name
        ));
    }

    if name.contains("..") {
        return Err(format!("bucket name '{}' contains consecutive dots", name));
    }

    Ok(())
}

/// Content type stored with an object, guessed from the key's extension.
pub fn content_type_for(key: &str) -> String {
    mime_guess::from_path(key)
        .first_raw()
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string()
}
