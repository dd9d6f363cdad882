use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Uncaught fault (a panic).
    #[serde(rename = "error")]
    Error,
    /// An async task that failed with nobody awaiting its result.
    #[serde(rename = "unhandledrejection")]
    UnhandledRejection,
    /// Caught at a UI component boundary; carries a component stack.
    #[serde(rename = "react")]
    Boundary,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Error => "error",
            ErrorKind::UnhandledRejection => "unhandledrejection",
            ErrorKind::Boundary => "react",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub message: String,
    pub stack: Option<String>,
    pub component_stack: Option<String>,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub timestamp: i64,
    pub url: String,
    pub agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageCount {
    pub message: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStats {
    pub total_errors: u64,
    pub by_type: BTreeMap<String, u64>,
    pub buffered: u64,
    pub top_messages: Vec<MessageCount>,
}
