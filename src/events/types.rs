//! Domain event kinds and the watched-path table.

use crate::types::{AccountId, BlockHeight};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of a derived event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Profile,
    Widget,
    FollowEdge,
    HideEdge,
    Post,
    Comment,
    Settings,
    IndexLike,
    IndexNotify,
    IndexPost,
    IndexComment,
    IndexHashtag,
    IndexTosAccept,
    IndexFlag,
    IndexRepost,
}

impl EventType {
    /// The index action this event comes from, for index events.
    pub fn index_action(&self) -> Option<&'static str> {
        INDEX_EVENTS
            .iter()
            .find(|(_, event_type)| event_type == self)
            .map(|(action, _)| *action)
    }
}

/// How the extracted change of a watched path becomes event data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Processing {
    /// Drop the change unless it is an object.
    RequireObject,
    /// Unwrap an object to its `""` value.
    CollapseToValue,
}

impl Processing {
    pub(crate) fn apply(self, change: Value) -> Option<Value> {
        match (self, change) {
            (Processing::RequireObject, change @ Value::Object(_)) => Some(change),
            (Processing::RequireObject, _) => None,
            (Processing::CollapseToValue, Value::Object(mut map)) => map.remove(""),
            (Processing::CollapseToValue, change) => Some(change),
        }
    }
}

/// An account-relative path pattern watched for events.
#[derive(Clone, Copy, Debug)]
pub struct DataPattern {
    pub path: &'static str,
    pub event_type: EventType,
    pub processing: Processing,
}

/// Watched paths, in derivation order.
pub const DATA_PATTERNS: &[DataPattern] = &[
    DataPattern {
        path: "profile/**",
        event_type: EventType::Profile,
        processing: Processing::RequireObject,
    },
    DataPattern {
        path: "widget/*/**",
        event_type: EventType::Widget,
        processing: Processing::RequireObject,
    },
    DataPattern {
        path: "graph/follow/*",
        event_type: EventType::FollowEdge,
        processing: Processing::RequireObject,
    },
    DataPattern {
        path: "graph/hide/*",
        event_type: EventType::HideEdge,
        processing: Processing::RequireObject,
    },
    DataPattern {
        path: "post/main",
        event_type: EventType::Post,
        processing: Processing::CollapseToValue,
    },
    DataPattern {
        path: "post/comment",
        event_type: EventType::Comment,
        processing: Processing::CollapseToValue,
    },
    DataPattern {
        path: "settings/**",
        event_type: EventType::Settings,
        processing: Processing::RequireObject,
    },
];

/// Index actions that produce events.
const INDEX_EVENTS: &[(&str, EventType)] = &[
    ("like", EventType::IndexLike),
    ("notify", EventType::IndexNotify),
    ("post", EventType::IndexPost),
    ("comment", EventType::IndexComment),
    ("hashtag", EventType::IndexHashtag),
    ("tosAccept", EventType::IndexTosAccept),
    ("flag", EventType::IndexFlag),
    ("repost", EventType::IndexRepost),
];

/// Event type of an index action, if it has one.
pub fn index_event_type(action: &str) -> Option<EventType> {
    INDEX_EVENTS
        .iter()
        .find(|(name, _)| *name == action)
        .map(|(_, event_type)| *event_type)
}

/// A derived, height-ordered notification of a tree or index change.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub account_id: AccountId,
    pub block_height: BlockHeight,
    pub data: Value,
}
