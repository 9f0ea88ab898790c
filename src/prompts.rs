//! System instruction for schema-constrained extraction.
//!
//! Every prompt the crate sends lives here so that tests can inspect the exact
//! wording without a network round trip. The caller's prompt travels in the
//! user turn; this module only produces the system instruction that pins the
//! reply format.

use serde_json::Value;

/// Prefix of the system instruction. The schema document follows verbatim.
pub const JSON_SCHEMA_INSTRUCTION: &str = "You must respond with valid JSON matching this schema: ";

/// Build the system instruction embedding `schema` as compact JSON.
///
/// The embedded document round-trips: parsing the text after
/// [`JSON_SCHEMA_INSTRUCTION`] yields `schema` again.
pub fn schema_instruction(schema: &Value) -> String {
    format!("{JSON_SCHEMA_INSTRUCTION}{schema}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn embedded_schema_round_trips() {
        let schema = json!({
            "type": "object",
            "properties": {"field": {"type": "string", "description": "a \"quoted\" word"}},
            "required": ["field"]
        });
        let instruction = schema_instruction(&schema);
        let embedded = instruction
            .strip_prefix(JSON_SCHEMA_INSTRUCTION)
            .expect("instruction starts with the fixed prefix");
        let parsed: Value = serde_json::from_str(embedded).expect("embedded schema is JSON");
        assert_eq!(parsed, schema);
    }

    #[test]
    fn instruction_mentions_json() {
        assert!(schema_instruction(&json!({})).contains("valid JSON"));
    }
}
