//! JSON:API envelopes for resource endpoints.

use serde::Serialize;

/// One resource object: `{"type": ..., "id": ..., "attributes": {...}}`.
#[derive(Debug, Serialize)]
pub struct Resource<T: Serialize> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: String,
    pub attributes: T,
}

impl<T: Serialize> Resource<T> {
    pub fn new(kind: &'static str, id: impl ToString, attributes: T) -> Self {
        Self {
            kind,
            id: id.to_string(),
            attributes,
        }
    }
}

/// Single-resource document.
#[derive(Debug, Serialize)]
pub struct Document<T: Serialize> {
    pub data: Resource<T>,
}

impl<T: Serialize> Document<T> {
    pub fn new(kind: &'static str, id: impl ToString, attributes: T) -> Self {
        Self {
            data: Resource::new(kind, id, attributes),
        }
    }
}

/// Collection document.
#[derive(Debug, Serialize)]
pub struct Collection<T: Serialize> {
    pub data: Vec<Resource<T>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_shape_matches_jsonapi() {
        let doc = Document::new("user", "u1", serde_json::json!({"username": "alice"}));
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["data"]["type"], "user");
        assert_eq!(json["data"]["id"], "u1");
        assert_eq!(json["data"]["attributes"]["username"], "alice");
    }
}
