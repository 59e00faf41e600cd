//! Event routing tests
//!
//! Literal (topic, payload) fixtures through the public router, plus property
//! tests over the topic grammar.

use proptest::prelude::*;
use qiscus_realtime::protocol::{
    classify, online_user, room_id, user_email, DecodedEvent, EventKind, PresenceEvent,
    ReceiptEvent, TypingEvent,
};
use qiscus_realtime::transport::mqtt::EventRouter;

#[test]
fn test_typing_without_email_segment() {
    assert_eq!(
        EventRouter::route("r/9/_/_/t", "true"),
        DecodedEvent::Typing(TypingEvent {
            room_id: "9".to_string(),
            user_email: String::new(),
            is_typing: true,
        })
    );
}

#[test]
fn test_typing_with_email_segment() {
    assert_eq!(
        EventRouter::route("r/55/55/bob@x.com/t", "false"),
        DecodedEvent::Typing(TypingEvent {
            room_id: "55".to_string(),
            user_email: "bob@x.com".to_string(),
            is_typing: false,
        })
    );
    assert_eq!(room_id("r/55/a/b/t"), "55");
    assert_eq!(user_email("r/55/a/b/bob@x.com/t"), "bob@x.com");
    assert!(
        EventRouter::route("r/55/a/b/bob@x.com/t", "true").is_undefined(),
        "six segments is not a typing topic"
    );
}

#[test]
fn test_typing_decode_failure_is_false() {
    match EventRouter::route("r/1/1/x/t", "maybe") {
        DecodedEvent::Typing(typing) => assert!(!typing.is_typing),
        other => panic!("expected typing, got {other:?}"),
    }
}

#[test]
fn test_presence() {
    assert_eq!(
        EventRouter::route("u/bob@x.com/s", "1:2020-01-01T00:00:00Z"),
        DecodedEvent::Online(PresenceEvent {
            user_email: "bob@x.com".to_string(),
            is_online: true,
            timestamp_utc: "2020-01-01T00:00:00Z".to_string(),
        })
    );
    assert_eq!(online_user("u/bob@x.com/s"), "bob@x.com");
}

#[test]
fn test_read_receipt() {
    assert_eq!(
        EventRouter::route("r/7/7/a/r", "abc:def"),
        DecodedEvent::Read(ReceiptEvent {
            room_id: "7".to_string(),
            comment_id: "abc".to_string(),
            comment_unique_id: "def".to_string(),
        })
    );
}

#[test]
fn test_delivery_receipt_without_separator_duplicates_payload() {
    assert_eq!(
        EventRouter::route("r/7/7/a/d", "123"),
        DecodedEvent::Delivery(ReceiptEvent {
            room_id: "7".to_string(),
            comment_id: "123".to_string(),
            comment_unique_id: "123".to_string(),
        })
    );
}

#[test]
fn test_comment_body_passes_through() {
    let body = r#"{"id":1,"message":"hi: there"}"#;
    assert_eq!(
        EventRouter::route("token/c", body),
        DecodedEvent::Comment {
            body: body.to_string()
        }
    );
}

#[test]
fn test_unroutable_topics_are_undefined() {
    for topic in ["", "c", "a/b", "a/b/c", "r/1/2/3/x", "r/1/2/3/4/t", "u/a/b/s"] {
        assert!(
            EventRouter::route(topic, "1").is_undefined(),
            "topic '{topic}' should be undefined"
        );
    }
}

#[test]
fn test_missing_identifiers_are_undefined() {
    assert!(EventRouter::route("r//a/b/t", "true").is_undefined());
    assert!(EventRouter::route("u//s", "1:ts").is_undefined());
    assert!(EventRouter::route("r/1/a/b/r", "").is_undefined());
}

#[test]
fn test_crate_root_reexports_event_types() {
    // Topic helpers stay under `protocol`; the event types are re-exported at the root
    let topic = qiscus_realtime::TopicBuilder::read("9", "9", "bob@x.com");
    let event = qiscus_realtime::EventRouter::route(&topic, "10:uniq-10");
    assert_eq!(
        event,
        qiscus_realtime::DecodedEvent::Read(qiscus_realtime::ReceiptEvent {
            room_id: "9".to_string(),
            comment_id: "10".to_string(),
            comment_unique_id: "uniq-10".to_string(),
        })
    );
    assert_eq!(event.kind(), qiscus_realtime::EventKind::Read);
}

proptest! {
    #[test]
    fn prop_two_segment_c_is_comment(x in "[^/]*") {
        prop_assert_eq!(classify(&format!("{x}/c")), EventKind::Comment);
    }

    #[test]
    fn prop_five_segment_markers(
        parts in prop::collection::vec("[^/]*", 4),
        marker in prop::sample::select(vec!["t", "r", "d"]),
    ) {
        let topic = format!("{}/{}", parts.join("/"), marker);
        let expected = match marker {
            "t" => EventKind::Typing,
            "r" => EventKind::Read,
            _ => EventKind::Delivery,
        };
        prop_assert_eq!(classify(&topic), expected);
    }

    #[test]
    fn prop_five_segment_other_marker_is_undefined(
        parts in prop::collection::vec("[^/]*", 4),
        marker in "[a-z]{1,3}".prop_filter("not a marker", |m| !["t", "r", "d"].contains(&m.as_str())),
    ) {
        let topic = format!("{}/{}", parts.join("/"), marker);
        prop_assert_eq!(classify(&topic), EventKind::Undefined);
    }

    #[test]
    fn prop_classify_is_idempotent(topic in "[a-z0-9/_@.]{0,40}") {
        prop_assert_eq!(classify(&topic), classify(&topic));
    }

    #[test]
    fn prop_route_never_panics(topic in ".{0,60}", payload in ".{0,60}") {
        let _ = EventRouter::route(&topic, &payload);
    }
}
