//! Rijksmuseum EDM record shape.
//!
//! Records arrive as OAI-PMH `GetRecord` payloads converted from XML, so
//! every field sits inside the `metadata/rdf:RDF` graph and values come in
//! several shapes: bare strings, `#text` objects with an `xml:lang`
//! attribute, language-tagged lists, and `@rdf:resource` references that
//! point at concept or agent nodes elsewhere in the graph.

use serde_json::Value;

use crate::model::ArtworkRecord;

use super::{Normalized, SkipReason, canonical_work_types, non_empty_str};

const PUBLIC_DOMAIN_RIGHTS: &[&str] = &[
    "https://creativecommons.org/publicdomain/zero/1.0/",
    "http://creativecommons.org/publicdomain/zero/1.0/",
    "https://creativecommons.org/publicdomain/mark/1.0/",
    "http://creativecommons.org/publicdomain/mark/1.0/",
];

pub fn normalize(raw: &Value) -> Normalized {
    let Some(rdf) = raw.pointer("/metadata/rdf:RDF") else {
        return Normalized::Skip(SkipReason::MissingIdentifier);
    };
    let Some(cho) = provided_cho(rdf) else {
        return Normalized::Skip(SkipReason::MissingIdentifier);
    };
    let Some(object_number) = non_empty_str(cho.get("dc:identifier")) else {
        return Normalized::Skip(SkipReason::MissingIdentifier);
    };

    let public_domain = rights(cho)
        .map(|r| PUBLIC_DOMAIN_RIGHTS.contains(&r.as_str()))
        .unwrap_or(false);
    if !public_domain {
        return Normalized::Skip(SkipReason::NotPublicDomain);
    }

    let Some(image_url) = image_url(rdf) else {
        return Normalized::Skip(SkipReason::MissingImage);
    };

    let title = cho
        .get("dc:title")
        .and_then(text_of)
        .unwrap_or_default();

    let labels = work_type_labels(rdf, cho);
    let work_types = canonical_work_types(labels.iter().map(String::as_str));

    let (production_start, production_end) = cho
        .get("dcterms:created")
        .and_then(text_of)
        .map(|created| production_years(&created))
        .unwrap_or((None, None));

    let thumbnail_url = Some(thumbnail_of(&image_url));

    Normalized::Record(ArtworkRecord {
        museum: "rma".to_string(),
        object_number: object_number.to_string(),
        title,
        artists: artist_names(rdf, cho),
        image_url,
        thumbnail_url,
        work_types,
        production_start,
        production_end,
        period: None,
    })
}

/// The ProvidedCHO node, either inside the aggregation or at the graph's
/// top level.
fn provided_cho(rdf: &Value) -> Option<&Value> {
    rdf.pointer("/ore:Aggregation/edm:aggregatedCHO/edm:ProvidedCHO")
        .or_else(|| rdf.get("edm:ProvidedCHO"))
}

/// Rights statement URL, preferring an `@rdf:resource` reference over
/// inline text.
fn rights(cho: &Value) -> Option<String> {
    let items = as_list(cho.get("dc:rights"));

    for item in &items {
        if let Some(resource) = non_empty_str(item.get("@rdf:resource")) {
            return Some(resource.to_string());
        }
    }

    items.first().and_then(|item| text_of(item))
}

fn image_url(rdf: &Value) -> Option<String> {
    let aggregation = rdf.get("ore:Aggregation")?;

    let candidate = aggregation
        .get("edm:isShownBy")
        .and_then(web_resource_url)
        .or_else(|| aggregation.get("edm:object").and_then(web_resource_url));

    candidate.filter(|url| url.starts_with("https://") && url.ends_with(".jpg"))
}

/// URL of an EDM web resource, which may be a direct string, a reference
/// object, a wrapped `edm:WebResource`, or a list of references.
fn web_resource_url(value: &Value) -> Option<String> {
    match value {
        Value::String(url) => Some(url.clone()),
        Value::Object(_) => non_empty_str(value.get("@rdf:resource"))
            .or_else(|| non_empty_str(value.pointer("/edm:WebResource/@rdf:about")))
            .map(str::to_string),
        Value::Array(items) => items.iter().find_map(web_resource_url),
        _ => None,
    }
}

/// IIIF images can be served at reduced width; anything else is used
/// unchanged.
fn thumbnail_of(image_url: &str) -> String {
    if image_url.starts_with("https://iiif.micr.io/") && image_url.contains("/full/max/") {
        image_url.replace("/full/max/", "/full/800,/")
    } else {
        image_url.to_string()
    }
}

fn artist_names(rdf: &Value, cho: &Value) -> Vec<String> {
    let mut names = Vec::new();

    for creator in as_list(cho.get("dc:creator")) {
        let name = match creator {
            Value::String(name) => Some(name.clone()),
            _ => creator
                .pointer("/edm:Agent/skos:prefLabel")
                .or_else(|| creator.pointer("/rdf:Description/skos:prefLabel"))
                .and_then(text_of)
                .or_else(|| {
                    non_empty_str(creator.get("@rdf:resource"))
                        .and_then(|reference| resolve_agent(rdf, reference))
                }),
        };
        if let Some(name) = name {
            names.push(name);
        }
    }

    names
}

/// Resolve an `@rdf:resource` agent reference against the graph's agent
/// and description nodes.
fn resolve_agent(rdf: &Value, reference: &str) -> Option<String> {
    for key in ["edm:Agent", "rdf:Description"] {
        for node in as_list(rdf.get(key)) {
            if non_empty_str(node.get("@rdf:about")) == Some(reference) {
                return node.get("skos:prefLabel").and_then(text_of);
            }
        }
    }
    None
}

/// Work-type labels from `dc:type`: inline `skos:Concept` nodes carry
/// their label directly, `@rdf:resource` references are looked up in the
/// graph's concept list.
fn work_type_labels(rdf: &Value, cho: &Value) -> Vec<String> {
    let type_entries = as_list(cho.get("dc:type"));

    let inline: Vec<String> = type_entries
        .iter()
        .filter_map(|entry| entry.pointer("/skos:Concept/skos:prefLabel"))
        .filter_map(text_of)
        .collect();
    if !inline.is_empty() {
        return inline;
    }

    let concepts = as_list(rdf.get("skos:Concept"));
    type_entries
        .iter()
        .filter_map(|entry| non_empty_str(entry.get("@rdf:resource")))
        .filter_map(|reference| {
            concepts
                .iter()
                .find(|concept| non_empty_str(concept.get("@rdf:about")) == Some(reference))
                .and_then(|concept| concept.get("skos:prefLabel"))
                .and_then(text_of)
        })
        .collect()
}

/// Earliest and latest three-to-four-digit years in a free-form creation
/// date like "c. 1642" or "1660 - 1665".
fn production_years(created: &str) -> (Option<i32>, Option<i32>) {
    let mut years: Vec<i32> = Vec::new();
    let mut digits = String::new();

    for ch in created.chars().chain(std::iter::once(' ')) {
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else {
            if (3..=4).contains(&digits.len()) {
                if let Ok(year) = digits.parse() {
                    years.push(year);
                }
            }
            digits.clear();
        }
    }

    (
        years.iter().min().copied(),
        years.iter().max().copied(),
    )
}

/// Text of a value that may be a bare string, a `#text` object, or a
/// language-tagged list. English is preferred, then Dutch, then whatever
/// comes first.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Value::Object(_) => non_empty_str(value.get("#text")).map(str::to_string),
        Value::Array(items) => {
            for lang in ["en", "nl"] {
                let tagged = items
                    .iter()
                    .find(|item| non_empty_str(item.get("@xml:lang")) == Some(lang));
                if let Some(text) = tagged.and_then(text_of) {
                    return Some(text);
                }
            }
            items.first().and_then(text_of)
        }
        _ => None,
    }
}

fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
    }
}
