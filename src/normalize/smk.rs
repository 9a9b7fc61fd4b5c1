//! Statens Museum for Kunst record shape.

use serde_json::Value;

use crate::model::ArtworkRecord;

use super::{Normalized, SkipReason, canonical_work_types, extract_year, non_empty_str};

pub fn normalize(raw: &Value) -> Normalized {
    let Some(object_number) = non_empty_str(raw.get("object_number")) else {
        return Normalized::Skip(SkipReason::MissingIdentifier);
    };

    // The search filter already restricts to public-domain works; keep the
    // check anyway so a filterless response cannot leak restricted works in.
    if raw.get("public_domain").and_then(Value::as_bool) != Some(true) {
        return Normalized::Skip(SkipReason::NotPublicDomain);
    }

    let Some(image_url) = non_empty_str(raw.get("image_native")) else {
        return Normalized::Skip(SkipReason::MissingImage);
    };

    let title = non_empty_str(raw.pointer("/titles/0/title"))
        .unwrap_or_default()
        .to_string();

    let artists = super::string_list(raw.get("artist"));

    let work_types = canonical_work_types(
        raw.get("object_names")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|entry| non_empty_str(entry.get("name"))),
    );

    let production = raw.pointer("/production_date/0");
    let production_start = production
        .and_then(|p| non_empty_str(p.get("start")))
        .and_then(extract_year);
    let production_end = production
        .and_then(|p| non_empty_str(p.get("end")))
        .and_then(extract_year);
    let period = production
        .and_then(|p| non_empty_str(p.get("period")))
        .map(str::to_string);

    Normalized::Record(ArtworkRecord {
        museum: "smk".to_string(),
        object_number: object_number.to_string(),
        title,
        artists,
        image_url: image_url.to_string(),
        thumbnail_url: non_empty_str(raw.get("image_thumbnail")).map(str::to_string),
        work_types,
        production_start,
        production_end,
        period,
    })
}
