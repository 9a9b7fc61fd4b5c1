//! Metropolitan Museum of Art record shape.
//!
//! The per-object endpoint reports absent fields as empty strings rather
//! than omitting them, and public-domain status is only known per object.

use serde_json::Value;

use crate::model::ArtworkRecord;

use super::{Normalized, SkipReason, canonical_work_types, non_empty_str};

pub fn normalize(raw: &Value) -> Normalized {
    let Some(accession_number) = non_empty_str(raw.get("accessionNumber")) else {
        return Normalized::Skip(SkipReason::MissingIdentifier);
    };

    if raw.get("isPublicDomain").and_then(Value::as_bool) != Some(true) {
        return Normalized::Skip(SkipReason::NotPublicDomain);
    }

    let primary = non_empty_str(raw.get("primaryImage"));
    let small = non_empty_str(raw.get("primaryImageSmall"));
    let Some(image_url) = primary.or(small) else {
        return Normalized::Skip(SkipReason::MissingImage);
    };

    let artists: Vec<String> = non_empty_str(raw.get("artistDisplayName"))
        .map(str::to_string)
        .into_iter()
        .collect();

    let work_types = canonical_work_types(
        non_empty_str(raw.get("classification"))
            .into_iter()
            .chain(non_empty_str(raw.get("objectName"))),
    );

    Normalized::Record(ArtworkRecord {
        museum: "met".to_string(),
        object_number: accession_number.to_string(),
        title: non_empty_str(raw.get("title")).unwrap_or_default().to_string(),
        artists,
        image_url: image_url.to_string(),
        thumbnail_url: small.or(primary).map(str::to_string),
        work_types,
        production_start: raw
            .get("objectBeginDate")
            .and_then(Value::as_i64)
            .map(|y| y as i32),
        production_end: raw
            .get("objectEndDate")
            .and_then(Value::as_i64)
            .map(|y| y as i32),
        period: non_empty_str(raw.get("period")).map(str::to_string),
    })
}
