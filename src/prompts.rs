//! Prompts for shipment-field extraction.
//!
//! The reply schema is generated from [`ShipmentMetadata`] itself, so the
//! prompt and the parser cannot drift apart.

use crate::item::ShipmentMetadata;
use once_cell::sync::Lazy;
use schemars::schema_for;

/// System prompt for extracting shipment fields from ZPL markup.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a logistics expert fluent in ZPL (Zebra Programming Language).
Read the ZPL label code supplied by the user and extract the shipping information it prints.

Rules:
1. recipientName: the person or company the parcel is addressed to.
2. trackingNumber: the tracking code, or the order number if no tracking code is printed.
3. carrier: the shipping company (e.g. Correios, FedEx, Loggi, UPS).
4. destination: destination city and state, e.g. "São Paulo, SP".
5. Text may be split across several ^FD fields or hex-escaped; reassemble it.
6. If the code is complex or partly unreadable, infer your best answer.

Reply with ONLY a JSON object matching this JSON Schema. No prose, no code fences."#;

/// Pretty-printed JSON Schema of the expected reply.
pub static SHIPMENT_SCHEMA: Lazy<String> = Lazy::new(|| {
    serde_json::to_string_pretty(&schema_for!(ShipmentMetadata)).unwrap_or_default()
});

/// Full system message: instructions followed by the reply schema.
pub fn extraction_system_message() -> String {
    format!("{}\n\n{}", EXTRACTION_SYSTEM_PROMPT, SHIPMENT_SCHEMA.as_str())
}

/// User message carrying the (already truncated) markup.
pub fn extraction_user_message(markup: &str) -> String {
    format!("ZPL code:\n\n{}", markup)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_requires_all_four_fields() {
        let schema: serde_json::Value =
            serde_json::from_str(SHIPMENT_SCHEMA.as_str()).expect("schema is JSON");
        let required: Vec<&str> = schema["required"]
            .as_array()
            .expect("required array")
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        for field in ["recipientName", "trackingNumber", "carrier", "destination"] {
            assert!(required.contains(&field), "missing {field} in {required:?}");
        }
    }

    #[test]
    fn system_message_embeds_schema() {
        let msg = extraction_system_message();
        assert!(msg.starts_with("You are a logistics expert"));
        assert!(msg.contains("\"trackingNumber\""));
    }
}
