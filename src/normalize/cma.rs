//! Cleveland Museum of Art record shape.

use serde_json::Value;

use crate::model::ArtworkRecord;

use super::{Normalized, SkipReason, canonical_work_types, non_empty_str};

pub fn normalize(raw: &Value) -> Normalized {
    let Some(accession_number) = non_empty_str(raw.get("accession_number")) else {
        return Normalized::Skip(SkipReason::MissingIdentifier);
    };

    // The query restricts to CC0; anything else in the payload is skipped.
    let cc0 = non_empty_str(raw.get("share_license_status"))
        .is_none_or(|share| share.eq_ignore_ascii_case("cc0"));
    if !cc0 {
        return Normalized::Skip(SkipReason::NotPublicDomain);
    }

    let Some(image_url) = non_empty_str(raw.pointer("/images/web/url")) else {
        return Normalized::Skip(SkipReason::MissingImage);
    };

    let title = non_empty_str(raw.get("title")).unwrap_or_default().to_string();

    let artists: Vec<String> = raw
        .get("creators")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|creator| non_empty_str(creator.get("description")))
        .map(str::to_string)
        .collect();

    let work_types = canonical_work_types(non_empty_str(raw.get("type")));

    Normalized::Record(ArtworkRecord {
        museum: "cma".to_string(),
        object_number: accession_number.to_string(),
        title,
        artists,
        image_url: image_url.to_string(),
        thumbnail_url: Some(image_url.to_string()),
        work_types,
        production_start: raw
            .get("creation_date_earliest")
            .and_then(Value::as_i64)
            .map(|y| y as i32),
        production_end: raw
            .get("creation_date_latest")
            .and_then(Value::as_i64)
            .map(|y| y as i32),
        period: non_empty_str(raw.get("creation_date")).map(str::to_string),
    })
}
