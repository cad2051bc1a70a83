//! Report attachment lists.
//!
//! Attachment references are persisted as a JSON array of strings. Prior state may be missing
//! or corrupt (hand-edited files, older formats); reading it never fails. A corrupt value is
//! logged and treated as an empty list, so an append after corruption loses the unreadable
//! references but keeps the new ones.

/// Tolerantly decodes a stored attachment column.
///
/// Absent, blank, `null`, malformed and non-string-array values all decode to an empty list.
pub fn decode(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty() && *r != "null") else {
        return Vec::new();
    };

    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(references) => references,
        Err(e) => {
            tracing::warn!("discarding unreadable report attachment list: {}", e);
            Vec::new()
        }
    }
}

/// Encodes an attachment list as the JSON column format read by [`decode`].
pub fn encode(references: &[String]) -> String {
    serde_json::Value::from(references.to_vec()).to_string()
}

/// Appends `new_references` after `existing`, keeping both orders and any duplicates.
pub fn append<I>(mut existing: Vec<String>, new_references: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    existing.extend(new_references);
    existing
}

/// Combines a stored (possibly corrupt) attachment column with newly uploaded references.
pub fn merge(existing_raw: Option<&str>, new_references: &[String]) -> Vec<String> {
    append(decode(existing_raw), new_references.iter().cloned())
}
