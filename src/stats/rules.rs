//! Declarative counter rules for event payloads.
//!
//! Payload checks follow loose JSON truthiness: missing, null, false, zero and
//! the empty string are false, everything else is true.

use serde_json::Value;

/// A counter and the predicate that triggers it.
pub(crate) type Rule = (&'static str, fn(&Value) -> bool);

pub(crate) const PROFILE_RULES: &[Rule] = &[
    ("profile", |_| true),
    ("profile.name", |p| truthy(at(p, &["name"]))),
    ("profile.image", |p| image_set(at(p, &["image"]))),
    ("profile.image.nft", |p| nft_set(at(p, &["image"]))),
    ("profile.backgroundImage", |p| image_set(at(p, &["backgroundImage"]))),
    ("profile.description", |p| truthy(at(p, &["description"]))),
    ("profile.linktree", |p| {
        LINKTREE.iter().any(|site| truthy(at(p, &["linktree", *site])))
    }),
    ("profile.linktree.twitter", |p| truthy(at(p, &["linktree", "twitter"]))),
    ("profile.linktree.github", |p| truthy(at(p, &["linktree", "github"]))),
    ("profile.linktree.telegram", |p| truthy(at(p, &["linktree", "telegram"]))),
    ("profile.linktree.website", |p| truthy(at(p, &["linktree", "website"]))),
    ("profile.tags", |p| has_keys(at(p, &["tags"]))),
];

/// Applied to each widget of a widget event.
pub(crate) const WIDGET_RULES: &[Rule] = &[
    ("widget", |_| true),
    ("widget.code", |w| has_key(Some(w), "")),
    ("widget.metadata", |w| has_keys(at(w, &["metadata"]))),
    ("widget.metadata.name", |w| has_key(at(w, &["metadata"]), "name")),
    ("widget.metadata.description", |w| {
        has_key(at(w, &["metadata"]), "description")
    }),
    ("widget.metadata.image", |w| has_keys(at(w, &["metadata", "image"]))),
    ("widget.app", |w| has_key(at(w, &["metadata", "tags"]), "app")),
];

/// Applied to the parsed body of a post.
pub(crate) const POST_RULES: &[Rule] = &[
    ("post", |_| true),
    ("post.image", |p| has_keys(at(p, &["image"]))),
    ("post.text", |p| truthy(at(p, &["text"]))),
    ("post.group", |p| truthy(at(p, &["groupId"]))),
];

/// Applied to the parsed body of a comment.
pub(crate) const COMMENT_RULES: &[Rule] = &[
    ("comment", |_| true),
    ("comment.text", |c| truthy(at(c, &["text"]))),
];

const LINKTREE: [&str; 4] = ["twitter", "github", "telegram", "website"];

/// Counters whose predicate holds for `payload`.
pub(crate) fn matching<'a>(
    rules: &'static [Rule],
    payload: &'a Value,
) -> impl Iterator<Item = &'static str> + 'a {
    rules
        .iter()
        .filter(move |(_, predicate)| predicate(payload))
        .map(|(name, _)| *name)
}

fn at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |value, key| value.get(key))
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn has_keys(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::String(s)) => !s.is_empty(),
        _ => false,
    }
}

fn has_key(value: Option<&Value>, key: &str) -> bool {
    matches!(value, Some(Value::Object(map)) if map.contains_key(key))
}

fn nft_set(image: Option<&Value>) -> bool {
    image.is_some_and(|image| {
        truthy(at(image, &["nft", "tokenId"])) && truthy(at(image, &["nft", "contractId"]))
    })
}

fn image_set(image: Option<&Value>) -> bool {
    image.is_some_and(|image| {
        truthy(at(image, &["url"])) || truthy(at(image, &["ipfs_cid"]))
    }) || nft_set(image)
}
