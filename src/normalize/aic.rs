//! Art Institute of Chicago record shape.
//!
//! The listing endpoint cannot filter on public-domain status or artwork
//! type server-side, so both checks live here.

use serde_json::Value;

use crate::model::ArtworkRecord;

use super::{
    Normalized, SkipReason, canonical_work_type, canonical_work_types, non_empty_str, string_list,
};

/// IIIF Image API URL for a listed image identifier.
fn iiif_url(image_id: &str) -> String {
    format!("https://www.artic.edu/iiif/2/{image_id}/full/843,/0/default.jpg")
}

pub fn normalize(raw: &Value) -> Normalized {
    let Some(reference_number) = non_empty_str(raw.get("main_reference_number")) else {
        return Normalized::Skip(SkipReason::MissingIdentifier);
    };

    if raw.get("is_public_domain").and_then(Value::as_bool) != Some(true) {
        return Normalized::Skip(SkipReason::NotPublicDomain);
    }

    // The listing cannot filter on artwork type, so types outside the
    // covered vocabulary are rejected here.
    let artwork_type = non_empty_str(raw.get("artwork_type_title"));
    if artwork_type.is_none_or(|t| canonical_work_type(t).is_none()) {
        return Normalized::Skip(SkipReason::UnsupportedWorkType);
    }
    let work_types = canonical_work_types(artwork_type);

    let Some(image_id) = non_empty_str(raw.get("image_id")) else {
        return Normalized::Skip(SkipReason::MissingImage);
    };
    let image_url = iiif_url(image_id);

    Normalized::Record(ArtworkRecord {
        museum: "aic".to_string(),
        object_number: reference_number.to_string(),
        title: non_empty_str(raw.get("title")).unwrap_or_default().to_string(),
        artists: string_list(raw.get("artist_titles")),
        thumbnail_url: Some(image_url.clone()),
        image_url,
        work_types,
        production_start: raw
            .get("date_start")
            .and_then(Value::as_i64)
            .map(|y| y as i32),
        production_end: raw.get("date_end").and_then(Value::as_i64).map(|y| y as i32),
        period: non_empty_str(raw.get("date_display")).map(str::to_string),
    })
}
