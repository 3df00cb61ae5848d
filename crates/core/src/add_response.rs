//! Parsing of the node RPC `add` response, one JSON object per line.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer};

/// One line of an `add` response.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AddEntry {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Hash")]
    pub hash: Option<String>,
    #[serde(rename = "Size", default, deserialize_with = "size_from_string_or_number")]
    pub size: Option<u64>,
}

impl AddEntry {
    pub fn size_bytes(&self) -> u64 {
        self.size.unwrap_or(0)
    }

    /// Progress lines carry `Bytes` but no `Hash`.
    pub fn is_pin_candidate(&self) -> bool {
        self.hash.is_some()
    }
}

fn size_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(u64),
        Text(String),
    }

    match Option::<Size>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Size::Number(n)) => Ok(Some(n)),
        Some(Size::Text(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Parse one non-empty line.
pub fn parse_add_line(line: &str) -> Result<AddEntry> {
    serde_json::from_str(line.trim())
        .map_err(|e| Error::Encoding(format!("invalid add response line: {e}")))
}

/// Parse a complete response body, skipping blank lines.
pub fn parse_add_response(body: &str) -> Result<Vec<AddEntry>> {
    body.lines()
        .filter(|l| !l.trim().is_empty())
        .map(parse_add_line)
        .collect()
}
