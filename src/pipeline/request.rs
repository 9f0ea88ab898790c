//! Wire request construction for the chat-completions route.
//!
//! ## Body layout
//!
//! ```text
//! {
//!   "model": "...",
//!   "messages": [{"role": "user", "content": [
//!       {"type": "text",  "text":  "<prompt>"},
//!       {"type": "image", "image": "<base64 png>"}, ...
//!   ]}],
//!   "system": "You must respond with valid JSON matching this schema: {...}",
//!   "stream": false,
//!   "response_format": {"type": "json_object"}
//! }
//! ```
//!
//! The text part always comes first; image parts follow in caller order.

use crate::prompts::schema_instruction;
use serde::Serialize;
use serde_json::Value;

/// Complete JSON body sent to `{base}/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub system: String,
    pub stream: bool,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: Vec<ContentPart>,
}

/// One element of a multimodal message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { image: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self { kind: "json_object" }
    }
}

/// Build the user turn: the prompt, then one part per encoded image.
pub fn user_message(prompt: &str, encoded_images: Vec<String>) -> ChatMessage {
    let mut content = Vec::with_capacity(encoded_images.len() + 1);
    content.push(ContentPart::Text {
        text: prompt.to_string(),
    });
    content.extend(
        encoded_images
            .into_iter()
            .map(|image| ContentPart::Image { image }),
    );
    ChatMessage {
        role: "user",
        content,
    }
}

/// Assemble the full non-streaming JSON-mode request.
pub fn build_request(
    model: &str,
    prompt: &str,
    encoded_images: Vec<String>,
    schema: &Value,
) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: vec![user_message(prompt, encoded_images)],
        system: schema_instruction(schema),
        stream: false,
        response_format: ResponseFormat::json_object(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_only_message_has_one_part() {
        let msg = user_message("describe", vec![]);
        assert_eq!(msg.role, "user");
        assert_eq!(
            msg.content,
            vec![ContentPart::Text {
                text: "describe".into()
            }]
        );
    }

    #[test]
    fn images_follow_text_in_order() {
        let images: Vec<String> = (0..5).map(|i| format!("img{i}")).collect();
        let msg = user_message("p", images.clone());
        assert_eq!(msg.content.len(), 6);
        assert!(matches!(&msg.content[0], ContentPart::Text { text } if text == "p"));
        for (i, part) in msg.content[1..].iter().enumerate() {
            assert_eq!(part, &ContentPart::Image { image: images[i].clone() });
        }
    }

    #[test]
    fn serialised_body_matches_wire_shape() {
        let schema = json!({"type": "object"});
        let req = build_request("m/x", "hello", vec!["AAAA".into()], &schema);
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "m/x",
                "messages": [{"role": "user", "content": [
                    {"type": "text", "text": "hello"},
                    {"type": "image", "image": "AAAA"}
                ]}],
                "system": schema_instruction(&schema),
                "stream": false,
                "response_format": {"type": "json_object"}
            })
        );
    }
}
