//! Compact payload formats per event kind
//!
//! - typing: a boolean token (`true`/`false`, `1`/`0`)
//! - presence: `{1|0}:{timestamp}`
//! - read/delivery receipts: `{commentId}:{commentUniqueId}`
//!
//! Decoding never fails: malformed input degrades to a documented default.

const SEPARATOR: char = ':';

fn parse_flag(token: &str) -> bool {
    let token = token.trim();
    token == "1" || token.eq_ignore_ascii_case("true")
}

/// Decode a typing payload, anything unrecognized means "not typing"
pub fn decode_typing(payload: &str) -> bool {
    parse_flag(payload)
}

/// Decode a presence payload into `(is_online, timestamp)`
///
/// Splits on the first `:` only, so ISO-8601 timestamps pass through intact.
/// The timestamp is not validated.
pub fn decode_presence(payload: &str) -> (bool, String) {
    match payload.split_once(SEPARATOR) {
        Some((flag, timestamp)) => (parse_flag(flag), timestamp.to_string()),
        None => (parse_flag(payload), String::new()),
    }
}

/// Decode a receipt payload into `(comment_id, comment_unique_id)`
///
/// Takes the first and last `:`-separated components. A payload without `:`
/// yields the whole payload for both fields.
pub fn decode_receipt(payload: &str) -> (String, String) {
    let comment_id = payload.split(SEPARATOR).next().unwrap_or_default();
    let comment_unique_id = payload.rsplit(SEPARATOR).next().unwrap_or_default();
    (comment_id.to_string(), comment_unique_id.to_string())
}

pub fn encode_typing(is_typing: bool) -> String {
    is_typing.to_string()
}

pub fn encode_presence(is_online: bool, timestamp: &str) -> String {
    let flag = if is_online { "1" } else { "0" };
    format!("{flag}{SEPARATOR}{timestamp}")
}

pub fn encode_receipt(comment_id: &str, comment_unique_id: &str) -> String {
    format!("{comment_id}{SEPARATOR}{comment_unique_id}")
}
