//! JSON message contract for collaboration sessions.
//!
//! Inbound frames are a discriminated envelope on the string `type`
//! field. Anything that does not parse into the envelope maps to the
//! explicit ignore branch — a malformed frame never closes the session.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// A validated inbound frame.
#[derive(Debug)]
pub enum ClientMessage {
    /// `{"type":"tab_change","tab":"<tab>"}` — presence update only.
    TabChange { tab: String },
    /// Any other object with a string `type`: a field-level edit to be
    /// relayed to room peers. Carried verbatim; the server only stamps
    /// `updated_by` before re-broadcast.
    Edit(Map<String, Value>),
}

/// Parse one inbound text frame. Returns None for anything that is not
/// a JSON object with a string `type` (including a tab_change missing
/// its tab) — the caller ignores those and keeps the connection open.
pub fn parse_client_message(text: &str) -> Option<ClientMessage> {
    let value: Value = serde_json::from_str(text).ok()?;
    let Value::Object(obj) = value else {
        return None;
    };
    let msg_type = obj.get("type")?.as_str()?;

    if msg_type == "tab_change" {
        let tab = obj.get("tab")?.as_str()?.to_string();
        return Some(ClientMessage::TabChange { tab });
    }

    Some(ClientMessage::Edit(obj))
}

/// Serialize an edit for re-broadcast, stamping the acting user's
/// display name. The name always comes from the authenticated session,
/// never from the client payload.
pub fn edit_frame(mut edit: Map<String, Value>, user_name: &str) -> String {
    edit.insert(
        "updated_by".to_string(),
        Value::String(user_name.to_string()),
    );
    Value::Object(edit).to_string()
}

/// Serialize a presence snapshot:
/// `{"type":"presence","presence":{"<tab>":["<name>",...]}}`
pub fn presence_frame(presence: &BTreeMap<String, Vec<String>>) -> String {
    serde_json::json!({
        "type": "presence",
        "presence": presence,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tab_change() {
        let msg = parse_client_message(r#"{"type":"tab_change","tab":"pricing"}"#);
        match msg {
            Some(ClientMessage::TabChange { tab }) => assert_eq!(tab, "pricing"),
            other => panic!("expected tab change, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_edit_keeps_fields() {
        let msg = parse_client_message(
            r#"{"type":"update","table":"wbs_items","row_id":"r1","field":"description","value":"x"}"#,
        );
        match msg {
            Some(ClientMessage::Edit(obj)) => {
                assert_eq!(obj["table"], "wbs_items");
                assert_eq!(obj["row_id"], "r1");
            }
            other => panic!("expected edit, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_frames_are_ignored() {
        assert!(parse_client_message("not json").is_none());
        assert!(parse_client_message("[1,2,3]").is_none());
        assert!(parse_client_message(r#"{"no_type":true}"#).is_none());
        assert!(parse_client_message(r#"{"type":42}"#).is_none());
        // tab_change without a tab is malformed, not an edit
        assert!(parse_client_message(r#"{"type":"tab_change"}"#).is_none());
    }

    #[test]
    fn test_edit_frame_stamps_server_side_identity() {
        // A spoofed updated_by from the client is overwritten.
        let Some(ClientMessage::Edit(obj)) = parse_client_message(
            r#"{"type":"update","table":"pricing_rows","updated_by":"Mallory"}"#,
        ) else {
            panic!("expected edit");
        };
        let frame = edit_frame(obj, "Alice PM");
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["updated_by"], "Alice PM");
        assert_eq!(value["table"], "pricing_rows");
    }
}
