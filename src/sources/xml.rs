//! XML to JSON conversion for sources that serve XML payloads.
//!
//! Elements become objects keyed by their qualified name, attributes get an
//! `@` prefix, text content lands under `#text`, and repeated sibling
//! elements collapse into arrays. An element holding nothing but text
//! becomes a plain string. This keeps the converted records addressable
//! with the same paths as any native-JSON source.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

pub(crate) fn document_to_value(xml: &str) -> Result<Value, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // The bottom entry collects the root element(s).
    let mut stack: Vec<(String, Map<String, Value>)> = vec![(String::new(), Map::new())];

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(start) => {
                let name = element_name(&start)?;
                let map = attribute_map(&start)?;
                stack.push((name, map));
            }
            Event::Empty(start) => {
                let name = element_name(&start)?;
                let value = collapse(attribute_map(&start)?);
                let (_, parent) = stack
                    .last_mut()
                    .ok_or_else(|| "unbalanced document".to_string())?;
                insert_child(parent, name, value);
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| e.to_string())?;
                if !text.trim().is_empty() {
                    let (_, element) = stack
                        .last_mut()
                        .ok_or_else(|| "unbalanced document".to_string())?;
                    append_text(element, text.trim());
                }
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                if !text.trim().is_empty() {
                    let (_, element) = stack
                        .last_mut()
                        .ok_or_else(|| "unbalanced document".to_string())?;
                    append_text(element, text.trim());
                }
            }
            Event::End(_) => {
                let (name, map) = stack
                    .pop()
                    .ok_or_else(|| "unbalanced document".to_string())?;
                let value = collapse(map);
                let (_, parent) = stack
                    .last_mut()
                    .ok_or_else(|| "unbalanced document".to_string())?;
                insert_child(parent, name, value);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match stack.pop() {
        Some((_, root)) if stack.is_empty() => Ok(Value::Object(root)),
        _ => Err("unbalanced document".to_string()),
    }
}

fn element_name(start: &BytesStart<'_>) -> Result<String, String> {
    std::str::from_utf8(start.name().as_ref())
        .map(str::to_string)
        .map_err(|e| format!("invalid element name: {}", e))
}

fn attribute_map(start: &BytesStart<'_>) -> Result<Map<String, Value>, String> {
    let mut map = Map::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| e.to_string())?;
        let key = std::str::from_utf8(attribute.key.as_ref())
            .map_err(|e| format!("invalid attribute name: {}", e))?;
        let value = attribute.unescape_value().map_err(|e| e.to_string())?;
        map.insert(format!("@{}", key), Value::String(value.into_owned()));
    }
    Ok(map)
}

/// An element with no content becomes null, text-only content becomes the
/// bare string, everything else stays an object.
fn collapse(map: Map<String, Value>) -> Value {
    if map.is_empty() {
        return Value::Null;
    }
    if map.len() == 1 {
        if let Some(Value::String(text)) = map.get("#text") {
            return Value::String(text.clone());
        }
    }
    Value::Object(map)
}

fn append_text(element: &mut Map<String, Value>, text: &str) {
    match element.get_mut("#text") {
        Some(Value::String(existing)) => {
            existing.push(' ');
            existing.push_str(text);
        }
        _ => {
            element.insert("#text".to_string(), Value::String(text.to_string()));
        }
    }
}

fn insert_child(parent: &mut Map<String, Value>, name: String, value: Value) {
    match parent.get_mut(&name) {
        None => {
            parent.insert(name, value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}
