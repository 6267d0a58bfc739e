//! Text input sent by the web client over the room's data channel.
//!
//! The browser publishes `{"type":"user_text","text":"..."}`. Anything that
//! does not decode into that shape is not a user-text message and is dropped
//! without raising an error.

use serde::Deserialize;

/// Messages the web client may publish on the data channel.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ClientDataMessage {
    /// A typed utterance the agent should answer out loud.
    #[serde(rename = "user_text")]
    UserText { text: String },
}

/// Extracts the trimmed user utterance from a raw data packet payload.
///
/// Invalid UTF-8 bytes are skipped rather than failing the decode. Returns
/// `None` for payloads that are not JSON, carry another `type`, lack a string
/// `text` field, or whose text is empty after trimming.
pub fn extract_user_text(payload: &[u8]) -> Option<String> {
    let decoded: String = payload.utf8_chunks().map(|chunk| chunk.valid()).collect();
    let message: ClientDataMessage = serde_json::from_str(&decoded).ok()?;
    let ClientDataMessage::UserText { text } = message;
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_user_text() {
        let payload = br#"{"type":"user_text","text":"hello there"}"#;
        assert_eq!(extract_user_text(payload), Some("hello there".to_string()));
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let payload = br#"{"type":"user_text","text":"   hi   "}"#;
        assert_eq!(extract_user_text(payload), Some("hi".to_string()));
    }

    #[test]
    fn ignores_other_types() {
        let payload = br#"{"type":"other","text":"x"}"#;
        assert_eq!(extract_user_text(payload), None);
    }

    #[test]
    fn missing_text_key_is_dropped() {
        let payload = br#"{"type":"user_text","body":"x"}"#;
        assert_eq!(extract_user_text(payload), None);
    }

    #[test]
    fn empty_or_whitespace_text_is_dropped() {
        assert_eq!(extract_user_text(br#"{"type":"user_text","text":""}"#), None);
        assert_eq!(
            extract_user_text(br#"{"type":"user_text","text":"  \n\t "}"#),
            None
        );
    }

    #[test]
    fn non_string_text_is_dropped() {
        assert_eq!(extract_user_text(br#"{"type":"user_text","text":42}"#), None);
    }

    #[test]
    fn escaped_quotes_survive() {
        let payload = br#"{"type":"user_text","text":"say \"cheese\", please"}"#;
        assert_eq!(
            extract_user_text(payload),
            Some(r#"say "cheese", please"#.to_string())
        );
    }

    #[test]
    fn field_order_and_spacing_do_not_matter() {
        let payload = br#"{ "text" : "order", "type" : "user_text" }"#;
        assert_eq!(extract_user_text(payload), Some("order".to_string()));
    }

    #[test]
    fn garbage_is_dropped() {
        assert_eq!(extract_user_text(b"not json"), None);
        assert_eq!(extract_user_text(&[0xff, 0xfe, 0x00]), None);
        assert_eq!(extract_user_text(b""), None);
    }

    #[test]
    fn invalid_utf8_after_the_json_is_skipped() {
        let mut payload = br#"{"type":"user_text","text":"hi"}"#.to_vec();
        payload.push(0xff);
        assert_eq!(extract_user_text(&payload), Some("hi".to_string()));
    }

    #[test]
    fn invalid_utf8_inside_the_text_is_skipped() {
        let mut payload = br#"{"type":"user_text","text":"ok"#.to_vec();
        payload.push(0xff);
        payload.extend_from_slice(br#""}"#);
        assert_eq!(extract_user_text(&payload), Some("ok".to_string()));
    }

    #[test]
    fn invalid_utf8_between_characters_is_skipped() {
        let mut payload = br#"{"type":"user_text","text":"he"#.to_vec();
        payload.extend_from_slice(&[0xc3, 0x28]);
        payload.extend_from_slice(br#"llo"}"#);
        assert_eq!(extract_user_text(&payload), Some("he(llo".to_string()));
    }
}
