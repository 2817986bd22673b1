//! Options for tree queries.

use serde::{Deserialize, Serialize};

/// Options for `get`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetOptions {
    /// Wrap values with the `:block` height of their version.
    #[serde(alias = "withBlockHeight")]
    pub with_block_height: bool,

    /// Wrap values with the `:timestamp` of their version's block.
    #[serde(alias = "withTimestamp")]
    pub with_timestamp: bool,

    /// Return tombstones as explicit nulls.
    #[serde(alias = "returnDeleted")]
    pub return_deleted: bool,
}

impl GetOptions {
    pub(crate) fn with_metadata(&self) -> bool {
        self.with_block_height || self.with_timestamp
    }
}

/// What `keys` reports for every matched key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeysReturnType {
    /// Height of the effective version.
    BlockHeight,
    /// Every recorded height up to the queried one.
    History,
    /// `true`. Unknown names fall back to this.
    #[default]
    #[serde(other)]
    True,
}

/// Options for `keys`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysOptions {
    #[serde(alias = "returnType")]
    pub return_type: KeysReturnType,

    #[serde(alias = "returnDeleted")]
    pub return_deleted: bool,

    /// Only report keys holding a value, not pure subtrees.
    #[serde(alias = "valuesOnly")]
    pub values_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_options_accept_both_spellings() {
        let snake: GetOptions =
            serde_json::from_value(json!({"with_block_height": true, "return_deleted": true}))
                .unwrap();
        let camel: GetOptions =
            serde_json::from_value(json!({"withBlockHeight": true, "returnDeleted": true}))
                .unwrap();
        assert_eq!(snake, camel);
        assert!(snake.with_metadata());
    }

    #[test]
    fn test_unknown_return_type_falls_back() {
        for name in ["Whatever", "bogus"] {
            let options: KeysOptions =
                serde_json::from_value(json!({"return_type": name})).unwrap();
            assert_eq!(options.return_type, KeysReturnType::True);
        }
        assert_eq!(
            serde_json::to_value(KeysReturnType::BlockHeight).unwrap(),
            json!("BlockHeight")
        );

        let options: KeysOptions =
            serde_json::from_value(json!({"returnType": "History", "valuesOnly": true})).unwrap();
        assert_eq!(options.return_type, KeysReturnType::History);
        assert!(options.values_only);
    }
}
