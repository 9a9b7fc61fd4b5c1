//! Normalization of raw museum records into [`ArtworkRecord`]s.
//!
//! Each museum ships its own JSON shape; the per-museum normalizers are
//! pure functions from a raw record to either a canonical record or a
//! skip decision. Normalizers never perform IO and never fail a pass: a
//! malformed record is a skip, not an error.

pub mod aic;
pub mod cma;
pub mod met;
pub mod rma;
pub mod smk;


use serde_json::Value;

use crate::model::ArtworkRecord;
use crate::{Result, SyncError};

/// Outcome of normalizing one raw record.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Record(ArtworkRecord),
    Skip(SkipReason),
}

/// Why a raw record was excluded from indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// No stable museum-local identifier.
    MissingIdentifier,
    /// No usable image URL.
    MissingImage,
    /// The record is not in the public domain.
    NotPublicDomain,
    /// The artwork type is outside the covered set.
    UnsupportedWorkType,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::MissingIdentifier => "missing identifier",
            SkipReason::MissingImage => "missing image",
            SkipReason::NotPublicDomain => "not public domain",
            SkipReason::UnsupportedWorkType => "unsupported work type",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispatch a raw record to the normalizer for its museum.
pub fn normalize(museum: &str, raw: &Value) -> Result<Normalized> {
    match museum {
        "smk" => Ok(smk::normalize(raw)),
        "cma" => Ok(cma::normalize(raw)),
        "aic" => Ok(aic::normalize(raw)),
        "met" => Ok(met::normalize(raw)),
        "rma" => Ok(rma::normalize(raw)),
        other => Err(SyncError::Config(format!(
            "no normalizer for museum '{other}'"
        ))),
    }
}

/// Whether a normalizer exists for the museum. Source registration checks
/// this so a pass can never reach the unknown-museum error above.
pub fn supported(museum: &str) -> bool {
    matches!(museum, "smk" | "cma" | "aic" | "met" | "rma")
}

/// Canonical facet label for a source work-type designation, if the
/// designation belongs to the covered set. Matching is case-insensitive
/// and spans every source museum's vocabulary.
pub fn canonical_work_type(label: &str) -> Option<&'static str> {
    let label = label.trim().to_lowercase();
    let canonical = match label.as_str() {
        // SMK (Danish object names)
        "maleri" => "painting",
        "tegning" => "drawing",
        "akvarel" => "watercolor",
        "pastel" => "pastel",
        "akvatinte" => "aquatint",
        "buste" => "bust",
        // CMA and the Met
        "painting" | "paintings" => "painting",
        "print" | "prints" => "print",
        "drawing" | "drawings" => "drawing",
        "watercolor" => "watercolor",
        "sculpture" => "sculpture",
        "bust" => "bust",
        // AIC artwork types
        "drawing and watercolor" => "drawing",
        _ => return None,
    };
    Some(canonical)
}

/// Map source labels to canonical work types, returning a sorted,
/// deduplicated list. Labels outside the table pass through lowercased so
/// uncovered facets stay queryable rather than vanishing.
pub(crate) fn canonical_work_types<'a, I>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut types: Vec<String> = labels
        .into_iter()
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(|label| match canonical_work_type(label) {
            Some(canonical) => canonical.to_string(),
            None => label.to_lowercase(),
        })
        .collect();
    types.sort_unstable();
    types.dedup();
    types
}

/// First year in a free-form date designation: handles ISO dates
/// ("1851-01-01T..."), bare years, and prefixed forms like "ca. 1650".
/// A minus sign directly before the digits marks a BCE year.
pub(crate) fn extract_year(text: &str) -> Option<i32> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(u8::is_ascii_digit)?;

    let digits: String = text[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    let year = digits.parse::<i32>().ok()?;

    let negative = start > 0 && bytes[start - 1] == b'-';
    Some(if negative { -year } else { year })
}

/// Non-empty string field, with whitespace-only treated as absent.
pub(crate) fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub(crate) fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
