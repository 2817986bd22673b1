//! Monotonic counters with first-occurrence ranking.

use crate::types::{AccountId, BlockHeight};
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// One counter of one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatValue {
    pub count: u64,
    pub first_height: BlockHeight,
    pub last_height: BlockHeight,

    /// Number of accounts that reached this counter before this one.
    pub rank: usize,
}

/// One global counter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStat {
    pub count: u64,
    pub first_height: BlockHeight,
    pub last_height: BlockHeight,

    /// Accounts in the order they first reached this counter.
    pub accounts: Vec<AccountId>,
}

/// Counters of one account, by dotted name.
pub type AccountCounters = BTreeMap<String, StatValue>;

/// Global counters, by dotted name.
pub type GlobalCounters = BTreeMap<String, GlobalStat>;

/// Increment `name` for `account_id` at `height`, mirroring it into `global`.
///
/// The account's rank is fixed on its first occurrence of the counter.
pub(crate) fn increment(
    global: &mut GlobalCounters,
    local: &mut AccountCounters,
    account_id: &str,
    name: &str,
    height: BlockHeight,
) {
    let global_stat = global.entry(name.to_string()).or_insert_with(|| GlobalStat {
        count: 0,
        first_height: height,
        last_height: height,
        accounts: Vec::new(),
    });
    global_stat.count += 1;
    global_stat.last_height = height;

    match local.entry(name.to_string()) {
        Entry::Occupied(mut slot) => {
            let stat = slot.get_mut();
            stat.count += 1;
            stat.last_height = height;
        }
        Entry::Vacant(slot) => {
            let rank = global_stat.accounts.len();
            global_stat.accounts.push(account_id.to_string());
            slot.insert(StatValue {
                count: 1,
                first_height: height,
                last_height: height,
                rank,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_assigned_on_first_occurrence() {
        let mut global = GlobalCounters::new();
        let mut alice = AccountCounters::new();
        let mut bob = AccountCounters::new();

        increment(&mut global, &mut alice, "alice", "post", BlockHeight(1));
        increment(&mut global, &mut bob, "bob", "post", BlockHeight(2));
        increment(&mut global, &mut alice, "alice", "post", BlockHeight(3));

        assert_eq!(
            alice["post"],
            StatValue {
                count: 2,
                first_height: BlockHeight(1),
                last_height: BlockHeight(3),
                rank: 0,
            }
        );
        assert_eq!(bob["post"].rank, 1);

        let post = &global["post"];
        assert_eq!(post.count, 3);
        assert_eq!(post.first_height, BlockHeight(1));
        assert_eq!(post.last_height, BlockHeight(3));
        assert_eq!(post.accounts, vec!["alice".to_string(), "bob".to_string()]);
    }
}
