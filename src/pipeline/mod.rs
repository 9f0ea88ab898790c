//! Pipeline stages for one extraction call.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested without a network and the HTTP layer in [`crate::client`] stays a
//! thin driver.
//!
//! ## Data Flow
//!
//! ```text
//! images ──▶ encode ──▶ request ──▶ (HTTP POST) ──▶ response
//!           (base64)   (wire body)                  (envelope → content)
//! ```
//!
//! 1. [`encode`]: PNG-encode and base64-wrap each `DynamicImage`
//! 2. [`request`]: assemble the user turn, system instruction and JSON-mode body
//! 3. [`response`]: decode the envelope, then decode the model reply as JSON

pub mod encode;
pub mod request;
pub mod response;
