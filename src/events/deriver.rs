//! Event derivation from tree history and index facts.

use super::types::{index_event_type, DataPattern, DomainEvent, DATA_PATTERNS};
use crate::index::IndexFact;
use crate::query::{changes_at, Pattern};
use crate::tree::{Changes, Entry, Node, VersionedTree};
use crate::types::BlockHeight;
use serde_json::json;

/// Events for the facts that have an index event type, in fact order.
pub fn events_from_facts(facts: &[IndexFact]) -> impl Iterator<Item = DomainEvent> + '_ {
    facts.iter().filter_map(|fact| {
        Some(DomainEvent {
            event_type: index_event_type(&fact.index_key.action)?,
            account_id: fact.account_id.clone(),
            block_height: fact.block_height,
            data: json!({"key": fact.key, "value": fact.value}),
        })
    })
}

/// Replay the whole tree into a height-ordered event log.
///
/// `facts` are the index facts from a full index rebuild.
pub fn derive_all(tree: &VersionedTree, facts: &[IndexFact]) -> Vec<DomainEvent> {
    let patterns = compiled_patterns();
    let mut events: Vec<DomainEvent> = events_from_facts(facts).collect();

    for (account_id, entry) in tree.root().children() {
        let Some(account) = entry.node_at(None) else {
            continue;
        };
        for (watched, pattern) in &patterns {
            let Some(prefix) = prefix_entry(account, pattern) else {
                continue;
            };
            for version in prefix.versions() {
                if let Some(event) = derive_one(account_id, account, watched, pattern, version.height) {
                    events.push(event);
                }
            }
        }
    }

    events.sort_by_key(|event| event.block_height);
    events
}

/// Events for one applied batch: index events first, then the data events of
/// every touched account whose watched paths changed at `height`.
pub fn derive_for_batch(
    tree: &VersionedTree,
    changes: &Changes,
    height: BlockHeight,
    facts: &[IndexFact],
) -> Vec<DomainEvent> {
    let patterns = compiled_patterns();
    let mut events: Vec<DomainEvent> = events_from_facts(facts).collect();

    for account_id in changes.keys() {
        let Some(account) = tree.account(account_id, None) else {
            continue;
        };
        for (watched, pattern) in &patterns {
            let touched = prefix_entry(account, pattern)
                .and_then(|entry| entry.versions().last())
                .is_some_and(|version| version.height == height);
            if !touched {
                continue;
            }
            if let Some(event) = derive_one(account_id, account, watched, pattern, height) {
                events.push(event);
            }
        }
    }
    events
}

fn compiled_patterns() -> Vec<(&'static DataPattern, Pattern)> {
    let mut compiled = Vec::with_capacity(DATA_PATTERNS.len());
    for watched in DATA_PATTERNS {
        let Ok(Some(pattern)) = Pattern::parse(watched.path) else {
            continue;
        };
        compiled.push((watched, pattern));
    }
    compiled
}

fn derive_one(
    account_id: &str,
    account: &Node,
    watched: &DataPattern,
    pattern: &Pattern,
    height: BlockHeight,
) -> Option<DomainEvent> {
    let change = changes_at(account, pattern, height)?;
    Some(DomainEvent {
        event_type: watched.event_type,
        account_id: account_id.to_string(),
        block_height: height,
        data: watched.processing.apply(change)?,
    })
}

/// The latest entry at the pattern's literal prefix.
fn prefix_entry<'a>(account: &'a Node, pattern: &Pattern) -> Option<&'a Entry> {
    let prefix: Vec<&str> = pattern.literal_prefix().collect();
    let (last, parents) = prefix.split_last()?;
    let mut node = account;
    for segment in parents {
        node = node.get(segment)?.node_at(None)?;
    }
    node.get(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventType;
    use crate::index::IndexEngine;
    use crate::tree::changes_from_json;
    use serde_json::Value;

    fn apply_all(batches: &[(u64, Value)]) -> (VersionedTree, Vec<DomainEvent>) {
        let mut tree = VersionedTree::new();
        let mut index = IndexEngine::new();
        let mut incremental = Vec::new();
        for (height, value) in batches {
            let height = BlockHeight(*height);
            let changes = changes_from_json(value).unwrap();
            tree.write(&changes, height).unwrap();
            let facts = index.append_for_batch(&changes, height);
            incremental.extend(derive_for_batch(&tree, &changes, height, &facts));
        }
        (tree, incremental)
    }

    fn summary(events: &[DomainEvent]) -> Vec<(u64, EventType, &str)> {
        events
            .iter()
            .map(|e| (e.block_height.0, e.event_type, e.account_id.as_str()))
            .collect()
    }

    #[test]
    fn test_table_patterns_parse() {
        assert_eq!(compiled_patterns().len(), DATA_PATTERNS.len());
    }

    #[test]
    fn test_profile_and_post_events() {
        let (_, events) = apply_all(&[
            (1, json!({"alice": {"profile": {"name": "A"}}})),
            (2, json!({"alice": {"post": {"main": "{\"text\":\"hi\"}"}}})),
            (3, json!({"alice": {"profile": {"name": null}}})),
        ]);
        assert_eq!(
            summary(&events),
            vec![
                (1, EventType::Profile, "alice"),
                (2, EventType::Post, "alice"),
                (3, EventType::Profile, "alice"),
            ]
        );
        assert_eq!(events[0].data, json!({"name": "A"}));
        assert_eq!(events[1].data, json!("{\"text\":\"hi\"}"));
        assert_eq!(events[2].data, json!({"name": null}));
    }

    #[test]
    fn test_follow_edges_per_height() {
        let (_, events) = apply_all(&[
            (1, json!({"alice": {"graph": {"follow": {"bob": ""}}}})),
            (2, json!({"alice": {"graph": {"follow": {"carol": ""}}}})),
            (3, json!({"alice": {"graph": {"follow": {"bob": null}}}})),
        ]);
        let data: Vec<_> = events.iter().map(|e| e.data.clone()).collect();
        assert_eq!(
            data,
            vec![json!({"bob": ""}), json!({"carol": ""}), json!({"bob": null})]
        );
    }

    #[test]
    fn test_index_events_precede_data_events() {
        let (_, events) = apply_all(&[(
            4,
            json!({
                "bob": {"post": {"main": "{}"}},
                "alice": {"index": {"like": "{\"key\":{\"path\":\"bob/post/main\"},\"value\":{\"type\":\"like\"}}"}},
            }),
        )]);
        assert_eq!(
            summary(&events),
            vec![(4, EventType::IndexLike, "alice"), (4, EventType::Post, "bob")]
        );
        assert_eq!(
            events[0].data,
            json!({"key": {"path": "bob/post/main"}, "value": {"type": "like"}})
        );
    }

    #[test]
    fn test_derive_all_matches_incremental() {
        let batches = [
            (1, json!({"alice": {"profile": {"name": "A"}, "widget": {"app": {"": "code"}}}})),
            (2, json!({"bob": {"graph": {"follow": {"alice": ""}}}})),
            (3, json!({"alice": {"post": {"comment": "{\"text\":\"c\"}"}}})),
            (4, json!({"alice": {"widget": {"app": {"metadata": {"name": "App"}}}}})),
            (5, json!({"bob": {"settings": {"theme": "dark"}, "index": {"notify": "{\"key\":\"alice\",\"value\":1}"}}})),
        ];
        let (tree, incremental) = apply_all(&batches);

        let facts = IndexEngine::new().build_all(&tree);
        let rebuilt = derive_all(&tree, &facts);
        assert_eq!(rebuilt, incremental);
        assert_eq!(rebuilt.len(), 7);
    }

    #[test]
    fn test_leaf_prefix_versions_are_skipped() {
        let (tree, events) = apply_all(&[
            (1, json!({"alice": {"profile": "plain"}})),
            (2, json!({"alice": {"profile": {"name": "A"}}})),
        ]);
        assert_eq!(summary(&events), vec![(2, EventType::Profile, "alice")]);
        // The relocated leaf keeps height 1, so it is not part of the change at 2.
        assert_eq!(events[0].data, json!({"name": "A"}));
        assert_eq!(derive_all(&tree, &[]), events);
    }
}
