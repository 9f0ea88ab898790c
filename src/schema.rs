//! Target schemas for extraction.
//!
//! The model is told the expected output shape through a JSON Schema document
//! embedded in the system instruction. [`ResponseSchema`] is the one seam that
//! turns a caller-side shape descriptor into that document:
//!
//! - a raw `serde_json::Value` is taken as an already-written schema;
//! - a `schemars::Schema` (e.g. from `schemars::schema_for!`) is serialised;
//! - [`schema_of::<T>()`](schema_of) derives the document from any Rust type
//!   implementing `schemars::JsonSchema`.

use schemars::JsonSchema;
use serde_json::Value;

/// A shape descriptor that can produce a JSON Schema document.
pub trait ResponseSchema {
    fn json_schema(&self) -> Value;
}

impl ResponseSchema for Value {
    fn json_schema(&self) -> Value {
        self.clone()
    }
}

impl ResponseSchema for schemars::Schema {
    fn json_schema(&self) -> Value {
        self.as_value().clone()
    }
}

impl<S: ResponseSchema + ?Sized> ResponseSchema for &S {
    fn json_schema(&self) -> Value {
        (**self).json_schema()
    }
}

/// Derive the JSON Schema document for `T`.
pub fn schema_of<T: JsonSchema>() -> Value {
    schemars::schema_for!(T).json_schema()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[allow(dead_code)]
    #[derive(JsonSchema)]
    struct Caption {
        text: String,
        confidence: f32,
    }

    #[test]
    fn raw_value_passes_through() {
        let schema = json!({"type": "object", "properties": {"field": {"type": "string"}}});
        assert_eq!(schema.json_schema(), schema);
    }

    #[test]
    fn derived_schema_lists_fields() {
        let schema = schema_of::<Caption>();
        let props = schema["properties"].as_object().expect("properties object");
        assert!(props.contains_key("text"));
        assert!(props.contains_key("confidence"));
        assert_eq!(schema["type"], "object");
    }

    #[test]
    fn reference_impl_delegates() {
        let schema = json!({"type": "object"});
        let by_ref: &Value = &schema;
        assert_eq!(ResponseSchema::json_schema(&by_ref), schema);
    }
}
