//! Topic classification and identifier extraction
//!
//! Topics are `/`-delimited paths whose meaning is encoded purely by position
//! and segment count. The mapping from shape to [`EventKind`] lives in
//! [`TOPIC_GRAMMAR`] so it can be audited and extended in one place.

use super::events::EventKind;

/// One row of the topic grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicPattern {
    /// Required first segment, if any
    pub prefix: Option<&'static str>,
    /// Exact number of segments
    pub segments: usize,
    /// Required value of the last segment
    pub marker: &'static str,
    pub kind: EventKind,
}

impl TopicPattern {
    const fn new(
        prefix: Option<&'static str>,
        segments: usize,
        marker: &'static str,
        kind: EventKind,
    ) -> Self {
        Self {
            prefix,
            segments,
            marker,
            kind,
        }
    }

    /// Check whether a split topic has this shape
    pub fn matches(&self, topic: &Topic<'_>) -> bool {
        topic.len() == self.segments
            && topic.last() == Some(self.marker)
            && self
                .prefix
                .map_or(true, |prefix| topic.first() == Some(prefix))
    }
}

/// Topic shapes recognized on the wire, checked in order
pub const TOPIC_GRAMMAR: &[TopicPattern] = &[
    TopicPattern::new(None, 2, "c", EventKind::Comment),
    TopicPattern::new(Some("u"), 3, "s", EventKind::Online),
    TopicPattern::new(None, 5, "t", EventKind::Typing),
    TopicPattern::new(None, 5, "r", EventKind::Read),
    TopicPattern::new(None, 5, "d", EventKind::Delivery),
];

/// Placeholder for an identifier the publisher left out
const UNSET_SEGMENT: &str = "_";

const ROOM_PREFIX: &str = "r/";
const ROOM_SUFFIXES: &[&str] = &["/t", "/r", "/d"];
const USER_PREFIX: &str = "u/";
const USER_SUFFIX: &str = "/s";

/// A topic split into its path segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic<'a> {
    raw: &'a str,
    segments: Vec<&'a str>,
}

impl<'a> Topic<'a> {
    pub fn parse(raw: &'a str) -> Self {
        Self {
            raw,
            segments: raw.split('/').collect(),
        }
    }

    pub fn as_str(&self) -> &'a str {
        self.raw
    }

    pub fn segments(&self) -> &[&'a str] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn first(&self) -> Option<&'a str> {
        self.segments.first().copied()
    }

    pub fn last(&self) -> Option<&'a str> {
        self.segments.last().copied()
    }
}

/// Classify a topic into the event kind its shape denotes
pub fn classify(topic: &str) -> EventKind {
    let topic = Topic::parse(topic);
    TOPIC_GRAMMAR
        .iter()
        .find(|pattern| pattern.matches(&topic))
        .map_or(EventKind::Undefined, |pattern| pattern.kind)
}

fn strip_room_markers(topic: &str) -> Option<&str> {
    let rest = topic.strip_prefix(ROOM_PREFIX)?;
    ROOM_SUFFIXES
        .iter()
        .find_map(|suffix| rest.strip_suffix(*suffix))
}

/// Room id of a typing/read/delivery topic, empty when the shape does not match
pub fn room_id(topic: &str) -> String {
    strip_room_markers(topic)
        .and_then(|rest| rest.split('/').next())
        .unwrap_or_default()
        .to_string()
}

/// User of a room topic: the last component after the room id
///
/// `_` is a placeholder, so `r/9/_/_/t` carries no user and yields an empty
/// string, as does a topic with nothing after the room id.
pub fn user_email(topic: &str) -> String {
    let Some(rest) = strip_room_markers(topic) else {
        return String::new();
    };

    match rest.rsplit_once('/') {
        Some((_, last)) if last != UNSET_SEGMENT => last.to_string(),
        _ => String::new(),
    }
}

/// User of a presence topic `u/{email}/s`, empty when the shape does not match
pub fn online_user(topic: &str) -> String {
    topic
        .strip_prefix(USER_PREFIX)
        .and_then(|rest| rest.strip_suffix(USER_SUFFIX))
        .and_then(|rest| rest.split('/').next())
        .unwrap_or_default()
        .to_string()
}

/// Outbound topic construction matching [`TOPIC_GRAMMAR`]
pub struct TopicBuilder;

impl TopicBuilder {
    /// Comment stream for a user token: `{token}/c`
    pub fn comment(token: &str) -> String {
        format!("{token}/c")
    }

    /// Typing topic: `r/{room_id}/{topic_id}/{user}/t`
    pub fn typing(room_id: &str, topic_id: &str, user: &str) -> String {
        Self::room_event(room_id, topic_id, user, "t")
    }

    /// Read receipt topic: `r/{room_id}/{topic_id}/{user}/r`
    pub fn read(room_id: &str, topic_id: &str, user: &str) -> String {
        Self::room_event(room_id, topic_id, user, "r")
    }

    /// Delivery receipt topic: `r/{room_id}/{topic_id}/{user}/d`
    pub fn delivery(room_id: &str, topic_id: &str, user: &str) -> String {
        Self::room_event(room_id, topic_id, user, "d")
    }

    /// Presence topic: `u/{user}/s`
    pub fn presence(user: &str) -> String {
        format!("u/{user}/s")
    }

    /// Wildcard filters covering typing, read and delivery events of a room
    pub fn room_subscriptions(room_id: &str) -> Vec<String> {
        ["t", "r", "d"]
            .iter()
            .map(|marker| Self::room_event(room_id, "+", "+", marker))
            .collect()
    }

    fn room_event(room_id: &str, topic_id: &str, user: &str, marker: &str) -> String {
        format!("r/{room_id}/{topic_id}/{user}/{marker}")
    }
}
