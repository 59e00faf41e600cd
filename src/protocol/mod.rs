//! Realtime wire protocol: topic grammar, payload formats and typed events
//!
//! Everything in this module is pure and synchronous.

pub mod events;
pub mod payload;
pub mod topics;

pub use events::*;
pub use topics::{classify, online_user, room_id, user_email, Topic, TopicBuilder, TopicPattern};
