//! Per-(key, action) index logs and ranged queries.

use super::fact::{parse_facts, IndexFact, IndexKey};
use crate::tree::{Changes, VersionedTree};
use crate::types::{AccountId, BlockHeight, OneOrMany};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Name of the reserved subtree holding index payloads.
pub const INDEX_PATH: &str = "index";

/// Scan direction of an index query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Desc,
    /// Unknown names fall back to this.
    #[default]
    #[serde(other)]
    Asc,
}

/// Options of an index query.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexQuery {
    /// Only return facts from these accounts.
    #[serde(alias = "accountId")]
    pub account_id: Option<OneOrMany<AccountId>>,

    /// Soft result limit. Never splits a group of facts sharing a height.
    pub limit: Option<usize>,

    pub order: Order,

    /// Cursor height. Inclusive upper bound for `Desc`, exclusive lower bound for `Asc`.
    /// `0` is the same as no cursor.
    pub from: Option<BlockHeight>,
}

/// One index query result.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub account_id: AccountId,
    pub block_height: BlockHeight,
    pub value: Value,
}

#[derive(Clone, Debug)]
struct IndexRecord {
    account_id: AccountId,
    block_height: BlockHeight,
    value: Value,
}

impl From<&IndexFact> for IndexRecord {
    fn from(fact: &IndexFact) -> Self {
        Self {
            account_id: fact.account_id.clone(),
            block_height: fact.block_height,
            value: fact.value.clone(),
        }
    }
}

/// Secondary index over the `index` subtree of every account.
#[derive(Debug, Default)]
pub struct IndexEngine {
    /// Height-ordered facts per key.
    logs: HashMap<IndexKey, Vec<IndexRecord>>,

    fact_count: usize,
}

impl IndexEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the latest tree, replacing all logs.
    ///
    /// Returns every fact in discovery order: accounts and actions sorted,
    /// versions of one action by height.
    pub fn build_all(&mut self, tree: &VersionedTree) -> Vec<IndexFact> {
        self.logs.clear();
        self.fact_count = 0;

        let mut facts = Vec::new();
        for (account_id, account) in tree.root().children() {
            let Some(index) = account
                .node_at(None)
                .and_then(|node| node.get(INDEX_PATH))
                .and_then(|entry| entry.node_at(None))
            else {
                continue;
            };
            for (action, entry) in index.children() {
                for (height, text) in entry.leaf_history() {
                    if let Some(text) = text {
                        facts.extend(parse_facts(account_id, action, text, height));
                    }
                }
            }
        }

        for fact in &facts {
            self.insert(fact);
        }
        for log in self.logs.values_mut() {
            log.sort_by_key(|record| record.block_height);
        }
        facts
    }

    /// Append the facts written by one batch. Cost is proportional to the batch.
    pub fn append_for_batch(&mut self, changes: &Changes, height: BlockHeight) -> Vec<IndexFact> {
        let mut facts = Vec::new();
        for (account_id, change) in changes {
            let Some(index) = change
                .as_tree()
                .and_then(|account| account.get(INDEX_PATH))
                .and_then(|index| index.as_tree())
            else {
                continue;
            };
            for (action, change) in index {
                if let Some(text) = change.text() {
                    facts.extend(parse_facts(account_id, action, text, height));
                }
            }
        }
        for fact in &facts {
            self.insert(fact);
        }
        facts
    }

    /// Facts for `key` and `action`, filtered and paginated by `query`.
    pub fn query(&self, key: &Value, action: &str, query: &IndexQuery) -> Vec<IndexEntry> {
        let Some(log) = self.logs.get(&IndexKey::new(key, action)) else {
            return Vec::new();
        };
        let limit = query.limit.unwrap_or(log.len());
        if limit == 0 {
            return Vec::new();
        }
        let accounts: Option<HashSet<&str>> = query
            .account_id
            .as_ref()
            .map(|ids| ids.as_slice().iter().map(String::as_str).collect());

        // Height 0 means no cursor.
        let from = query.from.filter(|height| height.0 > 0);
        let scan: Box<dyn Iterator<Item = &IndexRecord>> = match query.order {
            Order::Desc => {
                let end = match from {
                    Some(from) => log.partition_point(|r| r.block_height <= from),
                    None => log.len(),
                };
                Box::new(log[..end].iter().rev())
            }
            Order::Asc => {
                let start = match from {
                    Some(from) => log.partition_point(|r| r.block_height <= from),
                    None => 0,
                };
                Box::new(log[start..].iter())
            }
        };

        let mut results: Vec<IndexEntry> = Vec::new();
        for record in scan {
            if let Some(last) = results.last() {
                if results.len() >= limit && record.block_height != last.block_height {
                    break;
                }
            }
            if accounts
                .as_ref()
                .map_or(true, |ids| ids.contains(record.account_id.as_str()))
            {
                results.push(IndexEntry {
                    account_id: record.account_id.clone(),
                    block_height: record.block_height,
                    value: record.value.clone(),
                });
            }
        }
        results
    }

    /// Total number of facts.
    pub fn len(&self) -> usize {
        self.fact_count
    }

    pub fn is_empty(&self) -> bool {
        self.fact_count == 0
    }

    /// Number of distinct (key, action) logs.
    pub fn key_count(&self) -> usize {
        self.logs.len()
    }

    fn insert(&mut self, fact: &IndexFact) {
        self.logs
            .entry(fact.index_key.clone())
            .or_default()
            .push(IndexRecord::from(fact));
        self.fact_count += 1;
    }
}
