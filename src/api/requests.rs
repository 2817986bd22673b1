//! Request types and their validation.

use crate::error::{RequestError, Result};
use crate::index::IndexQuery;
use crate::query::{GetOptions, KeysOptions, Pattern};
use crate::types::{AccountId, BlockHeight, OneOrMany};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `get`: values matching patterns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetRequest {
    pub keys: Option<Vec<String>>,

    #[serde(alias = "blockHeight")]
    pub block_height: Option<BlockHeight>,

    pub options: GetOptions,
}

impl GetRequest {
    pub fn new<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Self {
        Self {
            keys: Some(keys.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn at(mut self, height: BlockHeight) -> Self {
        self.block_height = Some(height);
        self
    }

    pub fn with_options(mut self, options: GetOptions) -> Self {
        self.options = options;
        self
    }

    pub(crate) fn patterns(&self) -> Result<Vec<Pattern>> {
        parse_patterns(self.keys.as_deref())
    }
}

/// `keys`: key markers matching patterns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysRequest {
    pub keys: Option<Vec<String>>,

    #[serde(alias = "blockHeight")]
    pub block_height: Option<BlockHeight>,

    pub options: KeysOptions,
}

impl KeysRequest {
    pub fn new<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Self {
        Self {
            keys: Some(keys.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn at(mut self, height: BlockHeight) -> Self {
        self.block_height = Some(height);
        self
    }

    pub fn with_options(mut self, options: KeysOptions) -> Self {
        self.options = options;
        self
    }

    pub(crate) fn patterns(&self) -> Result<Vec<Pattern>> {
        parse_patterns(self.keys.as_deref())
    }
}

/// `index`: facts for a key and action.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexRequest {
    pub key: Option<Value>,
    pub action: Option<String>,
    pub options: IndexQuery,

    /// Used when `options` has no account filter.
    #[serde(alias = "accountId")]
    pub account_id: Option<OneOrMany<AccountId>>,
}

impl IndexRequest {
    pub fn new(key: Value, action: impl Into<String>) -> Self {
        Self {
            key: Some(key),
            action: Some(action.into()),
            ..Self::default()
        }
    }

    pub fn with_options(mut self, options: IndexQuery) -> Self {
        self.options = options;
        self
    }

    /// Validated key, action and effective query.
    pub(crate) fn validate(&self) -> Result<(&Value, &str, IndexQuery)> {
        let key = match &self.key {
            None | Some(Value::Null) => return Err(RequestError::MissingField("key").into()),
            Some(key) => key,
        };
        let action = non_empty(self.action.as_deref(), "action")?;
        let mut query = self.options.clone();
        if query.account_id.is_none() {
            query.account_id = self.account_id.clone();
        }
        if let Some(accounts) = &query.account_id {
            validate_accounts(accounts)?;
        }
        Ok((key, action, query))
    }
}

/// `time`: block timestamps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeRequest {
    #[serde(alias = "blockHeight")]
    pub block_height: Option<OneOrMany<BlockHeight>>,
}

impl TimeRequest {
    pub(crate) fn validate(&self) -> Result<&OneOrMany<BlockHeight>> {
        match &self.block_height {
            Some(OneOrMany::Many(heights)) if heights.is_empty() => {
                Err(RequestError::MissingField("blockHeight").into())
            }
            Some(heights) => Ok(heights),
            None => Err(RequestError::MissingField("blockHeight").into()),
        }
    }
}

/// `account_stats`: counters of one or more accounts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountStatsRequest {
    #[serde(alias = "accountId")]
    pub account_id: Option<OneOrMany<AccountId>>,
}

impl AccountStatsRequest {
    pub(crate) fn validate(&self) -> Result<&OneOrMany<AccountId>> {
        let accounts = self
            .account_id
            .as_ref()
            .ok_or(RequestError::MissingField("accountId"))?;
        validate_accounts(accounts)?;
        Ok(accounts)
    }
}

/// `likes`: accounts liking an item. A JSON array asks for several items.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LikesRequest {
    pub item: Option<Value>,
}

impl LikesRequest {
    pub(crate) fn validate(&self) -> Result<OneOrMany<&Value>> {
        match &self.item {
            None | Some(Value::Null) => Err(RequestError::MissingField("item").into()),
            Some(Value::Array(items)) if items.is_empty() => {
                Err(RequestError::MissingField("item").into())
            }
            Some(Value::Array(items)) => Ok(OneOrMany::Many(items.iter().collect())),
            Some(item) => Ok(OneOrMany::One(item)),
        }
    }
}

/// Any API request.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ApiRequest {
    Get(GetRequest),
    Keys(KeysRequest),
    Index(IndexRequest),
    Time(TimeRequest),
    AccountStats(AccountStatsRequest),
    Likes(LikesRequest),
}

impl ApiRequest {
    /// Parse a request body for the named endpoint.
    pub fn parse(endpoint: &str, body: &Value) -> Result<ApiRequest> {
        fn from<T: DeserializeOwned>(body: &Value) -> Result<T> {
            if !body.is_object() {
                return Err(RequestError::Malformed("request body must be an object".into()).into());
            }
            T::deserialize(body).map_err(|e| RequestError::Malformed(e.to_string()).into())
        }

        Ok(match endpoint {
            "get" => ApiRequest::Get(from(body)?),
            "keys" => ApiRequest::Keys(from(body)?),
            "index" => ApiRequest::Index(from(body)?),
            "time" => ApiRequest::Time(from(body)?),
            "account_stats" | "accountStats" => ApiRequest::AccountStats(from(body)?),
            "likes" => ApiRequest::Likes(from(body)?),
            other => {
                return Err(RequestError::Malformed(format!("unknown endpoint '{other}'")).into())
            }
        })
    }

    /// Cache namespace of the request.
    pub fn endpoint(&self) -> &'static str {
        match self {
            ApiRequest::Get(_) => "get",
            ApiRequest::Keys(_) => "keys",
            ApiRequest::Index(_) => "index",
            ApiRequest::Time(_) => "time",
            ApiRequest::AccountStats(_) => "account_stats",
            ApiRequest::Likes(_) => "likes",
        }
    }

    /// Cache key of the request within its endpoint.
    pub(crate) fn cache_key(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn parse_patterns(keys: Option<&[String]>) -> Result<Vec<Pattern>> {
    let keys = keys.ok_or(RequestError::MissingField("keys"))?;
    let mut patterns = Vec::with_capacity(keys.len());
    for key in keys {
        if let Some(pattern) = Pattern::parse(key)? {
            patterns.push(pattern);
        }
    }
    Ok(patterns)
}

fn non_empty<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(RequestError::MissingField(field).into()),
    }
}

fn validate_accounts(accounts: &OneOrMany<AccountId>) -> Result<()> {
    if accounts.as_slice().is_empty() || accounts.as_slice().iter().any(String::is_empty) {
        return Err(RequestError::MissingField("accountId").into());
    }
    Ok(())
}
