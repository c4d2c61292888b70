use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct ReqresQuest {
    pub setup: Setup,
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub request_specs: BTreeMap<String, RequestSpecEntry>,
    #[serde(default)]
    pub response_specs: BTreeMap<String, ResponseSpecEntry>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Setup {
    pub base_url: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Global {
    pub headers: Option<toml::Value>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RequestSpecEntry {
    pub content_type: Option<String>,
    pub log: Option<String>,
    pub headers: Option<toml::Value>,
    pub filters: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ResponseSpecEntry {
    pub status: Option<i32>,
    pub log: Option<StringOrStrings>,
    pub log_if_validation_fails: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum StringOrStrings {
    Single(String),
    Multiple(Vec<String>),
}

impl StringOrStrings {
    pub fn items(&self) -> Vec<&str> {
        match self {
            StringOrStrings::Single(s) => vec![s.as_str()],
            StringOrStrings::Multiple(v) => v.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for StringOrStrings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringOrStrings::Single(s) => write!(f, "{s}"),
            StringOrStrings::Multiple(v) => write!(f, "[{}]", v.join(", ")),
        }
    }
}
