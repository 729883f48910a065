use serde_json::Value;
use thiserror::Error;

/// One scraped account, normalized from a raw provider row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    /// Case-sensitive, exactly as scraped.
    pub username: String,
    pub full_name: String,
    /// `None` when the provider did not say.
    pub is_verified: Option<bool>,
    pub source_batch: String,
}

/// A raw row that could not be turned into an [`AccountRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record {index} in batch {batch}: {reason}")]
pub struct MalformedRecord {
    pub batch: String,
    pub index: usize,
    pub reason: String,
}

impl AccountRecord {
    /// Normalize one raw row. Only `username` is required; every other field
    /// falls back to its default.
    pub fn from_raw(
        raw: &Value,
        source_batch: &str,
        index: usize,
    ) -> Result<Self, MalformedRecord> {
        let malformed = |reason: &str| MalformedRecord {
            batch: source_batch.to_string(),
            index,
            reason: reason.to_string(),
        };

        let obj = raw.as_object().ok_or_else(|| malformed("not an object"))?;
        let username = match obj.get("username") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::String(_)) => return Err(malformed("empty username")),
            Some(_) => return Err(malformed("username is not a string")),
            None => return Err(malformed("missing username")),
        };

        let full_name = obj
            .get("full_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let is_verified = obj.get("is_verified").and_then(Value::as_bool);

        Ok(Self {
            username,
            full_name,
            is_verified,
            source_batch: source_batch.to_string(),
        })
    }
}

/// Normalize every row of a batch, keeping good records in order and
/// collecting the rejects.
pub fn normalize_batch(
    raw: &[Value],
    source_batch: &str,
) -> (Vec<AccountRecord>, Vec<MalformedRecord>) {
    let mut records = Vec::with_capacity(raw.len());
    let mut malformed = Vec::new();
    for (index, row) in raw.iter().enumerate() {
        match AccountRecord::from_raw(row, source_batch, index) {
            Ok(r) => records.push(r),
            Err(e) => malformed.push(e),
        }
    }
    (records, malformed)
}
