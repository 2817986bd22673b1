//! Folds the event log into counters, graph membership and like sets.

use super::counter::{increment, AccountCounters, GlobalCounters};
use super::rules::{self, Rule};
use crate::events::{DomainEvent, EventType};
use crate::index::canonical_json;
use crate::types::{AccountId, BlockHeight};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Live graph membership of one account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AccountGraph {
    pub following: BTreeSet<AccountId>,
    pub followers: BTreeSet<AccountId>,
    pub hidden: BTreeSet<AccountId>,
    pub hidden_by: BTreeSet<AccountId>,
}

#[derive(Debug, Default)]
struct AccountState {
    counters: AccountCounters,
    graph: AccountGraph,
    widgets: HashSet<String>,
}

/// Which edge set an edge event updates.
#[derive(Clone, Copy)]
enum Edge {
    Follow,
    Hide,
}

impl Edge {
    /// Counters for (actor create, receiver create, actor delete, receiver delete).
    fn counters(self) -> [&'static str; 4] {
        match self {
            Edge::Follow => [
                "graph.follow",
                "graph.followed",
                "graph.unfollow",
                "graph.unfollowed",
            ],
            Edge::Hide => ["graph.hide", "graph.hidden", "graph.unhide", "graph.unhidden"],
        }
    }

    fn outgoing(self, graph: &mut AccountGraph) -> &mut BTreeSet<AccountId> {
        match self {
            Edge::Follow => &mut graph.following,
            Edge::Hide => &mut graph.hidden,
        }
    }

    fn incoming(self, graph: &mut AccountGraph) -> &mut BTreeSet<AccountId> {
        match self {
            Edge::Follow => &mut graph.followers,
            Edge::Hide => &mut graph.hidden_by,
        }
    }
}

/// Incremental statistics over the domain event log.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    accounts: HashMap<AccountId, AccountState>,
    global: GlobalCounters,

    /// Canonical item JSON to the accounts currently liking it.
    likes: HashMap<String, BTreeSet<AccountId>>,

    events_processed: usize,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process the events of `events` not seen by a previous call.
    ///
    /// `events` must extend the log passed before.
    pub fn process_events(&mut self, events: &[DomainEvent]) -> usize {
        let start = self.events_processed.min(events.len());
        for event in &events[start..] {
            self.process_event(event);
            self.events_processed += 1;
        }
        events.len() - start
    }

    /// Number of events folded so far.
    pub fn events_processed(&self) -> usize {
        self.events_processed
    }

    pub fn account_stats(&self, account_id: &str) -> Option<&AccountCounters> {
        self.accounts.get(account_id).map(|state| &state.counters)
    }

    pub fn global_stats(&self) -> &GlobalCounters {
        &self.global
    }

    pub fn graph(&self, account_id: &str) -> Option<&AccountGraph> {
        self.accounts.get(account_id).map(|state| &state.graph)
    }

    /// Accounts currently liking `item`, sorted.
    pub fn likes(&self, item: &Value) -> Vec<AccountId> {
        self.likes
            .get(&canonical_json(item))
            .map(|accounts| accounts.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    fn process_event(&mut self, event: &DomainEvent) {
        let actor = event.account_id.as_str();
        let height = event.block_height;
        self.touch(actor, height);

        match event.event_type {
            EventType::Profile => self.apply_rules(actor, rules::PROFILE_RULES, &event.data, height),
            EventType::Widget => self.process_widgets(actor, &event.data, height),
            EventType::FollowEdge => self.process_edges(actor, Edge::Follow, &event.data, height),
            EventType::HideEdge => self.process_edges(actor, Edge::Hide, &event.data, height),
            EventType::Post => self.process_text(actor, rules::POST_RULES, &event.data, height),
            EventType::Comment => {
                self.process_text(actor, rules::COMMENT_RULES, &event.data, height)
            }
            EventType::Settings => self.inc(actor, "settings", height),
            EventType::IndexLike => self.process_like(actor, &event.data, height),
            other => {
                if let Some(action) = other.index_action() {
                    self.inc(actor, &format!("index.{action}"), height);
                }
            }
        }
    }

    /// Count `account` for an account taking part in an event.
    fn touch(&mut self, account_id: &str, height: BlockHeight) {
        self.inc(account_id, "account", height);
    }

    fn inc(&mut self, account_id: &str, name: &str, height: BlockHeight) {
        let state = self.accounts.entry(account_id.to_string()).or_default();
        increment(&mut self.global, &mut state.counters, account_id, name, height);
    }

    fn apply_rules(&mut self, account_id: &str, rules: &'static [Rule], payload: &Value, height: BlockHeight) {
        for name in rules::matching(rules, payload) {
            self.inc(account_id, name, height);
        }
    }

    fn process_widgets(&mut self, account_id: &str, data: &Value, height: BlockHeight) {
        let Some(widgets) = data.as_object() else {
            return;
        };
        for (source, widget) in widgets {
            self.apply_rules(account_id, rules::WIDGET_RULES, widget, height);
            let first_seen = self
                .accounts
                .entry(account_id.to_string())
                .or_default()
                .widgets
                .insert(source.clone());
            if first_seen {
                self.inc(account_id, "widget.unique", height);
            }
        }
    }

    /// Posts and comments carry JSON text. A tombstone counts as an empty
    /// body, unparsable text is not counted.
    fn process_text(&mut self, account_id: &str, rules: &'static [Rule], data: &Value, height: BlockHeight) {
        let body = match data {
            Value::Null => Value::Null,
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(body) => body,
                Err(_) => return,
            },
            _ => return,
        };
        self.apply_rules(account_id, rules, &body, height);
    }

    fn process_edges(&mut self, actor: &str, edge: Edge, data: &Value, height: BlockHeight) {
        let Some(edges) = data.as_object() else {
            return;
        };
        let [create, created, delete, deleted] = edge.counters();
        for (receiver, value) in edges {
            let create_edge = !value.is_null();
            let changed = {
                let graph = &mut self.accounts.entry(actor.to_string()).or_default().graph;
                let outgoing = edge.outgoing(graph);
                if create_edge {
                    outgoing.insert(receiver.clone())
                } else {
                    outgoing.remove(receiver)
                }
            };
            if !changed {
                continue;
            }

            self.inc(actor, if create_edge { create } else { delete }, height);
            self.touch(receiver, height);
            let graph = &mut self.accounts.entry(receiver.clone()).or_default().graph;
            let incoming = edge.incoming(graph);
            if create_edge {
                incoming.insert(actor.to_string());
            } else {
                incoming.remove(actor);
            }
            self.inc(receiver, if create_edge { created } else { deleted }, height);
        }
    }

    fn process_like(&mut self, actor: &str, data: &Value, height: BlockHeight) {
        let Some(item) = data.get("key") else {
            return;
        };
        let liked = match data.get("value").and_then(|v| v.get("type")).and_then(Value::as_str) {
            Some("like") => true,
            Some("unlike") => false,
            _ => return,
        };

        let likers = self.likes.entry(canonical_json(item)).or_default();
        let changed = if liked {
            likers.insert(actor.to_string())
        } else {
            likers.remove(actor)
        };
        if !changed {
            return;
        }

        self.inc(actor, if liked { "like" } else { "unlike" }, height);
        if let Some((owner, kind)) = item_owner(item) {
            self.touch(owner, height);
            let counter = match (kind, liked) {
                (ItemKind::Post, true) => "post.likes",
                (ItemKind::Post, false) => "post.unliked",
                (ItemKind::Comment, true) => "comment.likes",
                (ItemKind::Comment, false) => "comment.unliked",
            };
            self.inc(owner, counter, height);
        }
    }
}

#[derive(Clone, Copy)]
enum ItemKind {
    Post,
    Comment,
}

/// Owner account and kind of a liked item, from its `path`.
fn item_owner(item: &Value) -> Option<(&str, ItemKind)> {
    let path = item.get("path")?.as_str()?;
    let (owner, rest) = path.split_once('/')?;
    let kind = match rest {
        "post/main" => ItemKind::Post,
        "post/comment" => ItemKind::Comment,
        _ => return None,
    };
    Some((owner, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(event_type: EventType, account: &str, height: u64, data: Value) -> DomainEvent {
        DomainEvent {
            event_type,
            account_id: account.to_string(),
            block_height: BlockHeight(height),
            data,
        }
    }

    fn count(stats: &StatsAggregator, account: &str, name: &str) -> u64 {
        stats
            .account_stats(account)
            .and_then(|counters| counters.get(name))
            .map_or(0, |stat| stat.count)
    }

    fn like(account: &str, height: u64, path: &str, kind: &str) -> DomainEvent {
        event(
            EventType::IndexLike,
            account,
            height,
            json!({"key": {"type": "social", "path": path, "blockHeight": 1}, "value": {"type": kind}}),
        )
    }

    #[test]
    fn test_idempotent_follow() {
        let events = vec![
            event(EventType::FollowEdge, "alice", 1, json!({"bob": ""})),
            event(EventType::FollowEdge, "alice", 2, json!({"bob": ""})),
        ];
        let mut stats = StatsAggregator::new();
        stats.process_events(&events);

        assert_eq!(count(&stats, "alice", "graph.follow"), 1);
        assert_eq!(count(&stats, "bob", "graph.followed"), 1);
        assert_eq!(count(&stats, "alice", "account"), 2);
        assert!(stats.graph("bob").unwrap().followers.contains("alice"));
    }

    #[test]
    fn test_unfollow_only_when_present() {
        let events = vec![
            event(EventType::FollowEdge, "alice", 1, json!({"bob": null})),
            event(EventType::FollowEdge, "alice", 2, json!({"bob": ""})),
            event(EventType::FollowEdge, "alice", 3, json!({"bob": null})),
            event(EventType::HideEdge, "alice", 4, json!({"carol": ""})),
        ];
        let mut stats = StatsAggregator::new();
        stats.process_events(&events);

        assert_eq!(count(&stats, "alice", "graph.unfollow"), 1);
        assert_eq!(count(&stats, "bob", "graph.unfollowed"), 1);
        assert!(stats.graph("alice").unwrap().following.is_empty());
        assert_eq!(count(&stats, "alice", "graph.hide"), 1);
        assert_eq!(count(&stats, "carol", "graph.hidden"), 1);
        assert!(stats.graph("carol").unwrap().hidden_by.contains("alice"));
    }

    #[test]
    fn test_resume_is_idempotent() {
        let mut events = vec![event(EventType::Settings, "alice", 1, json!({"theme": "dark"}))];
        let mut stats = StatsAggregator::new();
        assert_eq!(stats.process_events(&events), 1);
        assert_eq!(stats.process_events(&events), 0);
        assert_eq!(count(&stats, "alice", "settings"), 1);

        events.push(event(EventType::Settings, "alice", 2, json!({})));
        assert_eq!(stats.process_events(&events), 1);
        assert_eq!(count(&stats, "alice", "settings"), 2);
        assert_eq!(stats.events_processed(), 2);
    }

    #[test]
    fn test_likes_and_unlikes() {
        let events = vec![
            like("bob", 5, "alice/post/main", "like"),
            like("bob", 6, "alice/post/main", "like"),
            like("carol", 7, "alice/post/main", "like"),
            like("bob", 8, "alice/post/main", "unlike"),
            like("bob", 9, "alice/post/comment", "like"),
        ];
        let mut stats = StatsAggregator::new();
        stats.process_events(&events);

        assert_eq!(count(&stats, "bob", "like"), 2);
        assert_eq!(count(&stats, "bob", "unlike"), 1);
        assert_eq!(count(&stats, "alice", "post.likes"), 2);
        assert_eq!(count(&stats, "alice", "post.unliked"), 1);
        assert_eq!(count(&stats, "alice", "comment.likes"), 1);

        let item = json!({"path": "alice/post/main", "blockHeight": 1, "type": "social"});
        assert_eq!(stats.likes(&item), vec!["carol".to_string()]);
        assert!(stats.likes(&json!("nothing")).is_empty());
    }

    #[test]
    fn test_posts_widgets_and_index_events() {
        let events = vec![
            event(EventType::Post, "alice", 1, json!("{\"text\": \"hello\"}")),
            event(EventType::Post, "alice", 2, json!("not json")),
            event(EventType::Post, "alice", 3, Value::Null),
            event(EventType::Comment, "alice", 4, json!("{\"text\": \"\"}")),
            event(
                EventType::Widget,
                "alice",
                5,
                json!({"app": {"": "code"}, "lib": {"metadata": {"name": "Lib"}}}),
            ),
            event(EventType::Widget, "alice", 6, json!({"app": {"": "code2"}})),
            event(EventType::IndexNotify, "alice", 7, json!({"key": "bob", "value": {}})),
        ];
        let mut stats = StatsAggregator::new();
        stats.process_events(&events);

        // The tombstone at 3 counts as a post without text, "not json" does not.
        assert_eq!(count(&stats, "alice", "post"), 2);
        assert_eq!(count(&stats, "alice", "post.text"), 1);
        assert_eq!(count(&stats, "alice", "post.image"), 0);
        assert_eq!(count(&stats, "alice", "comment"), 1);
        assert_eq!(count(&stats, "alice", "comment.text"), 0);
        assert_eq!(count(&stats, "alice", "widget"), 3);
        assert_eq!(count(&stats, "alice", "widget.code"), 2);
        assert_eq!(count(&stats, "alice", "widget.unique"), 2);
        assert_eq!(count(&stats, "alice", "widget.metadata.name"), 1);
        assert_eq!(count(&stats, "alice", "index.notify"), 1);
        assert_eq!(count(&stats, "alice", "account"), 7);
    }

    #[test]
    fn test_global_mirrors_and_ranks() {
        let events = vec![
            event(EventType::Settings, "bob", 1, json!({})),
            event(EventType::Settings, "alice", 2, json!({})),
            event(EventType::Settings, "bob", 3, json!({})),
        ];
        let mut stats = StatsAggregator::new();
        stats.process_events(&events);

        let settings = &stats.global_stats()["settings"];
        assert_eq!(settings.count, 3);
        assert_eq!(settings.accounts, vec!["bob".to_string(), "alice".to_string()]);
        assert_eq!(stats.account_stats("alice").unwrap()["settings"].rank, 1);
        assert_eq!(stats.account_stats("bob").unwrap()["settings"].rank, 0);
        assert_eq!(stats.account_count(), 2);
    }
}
