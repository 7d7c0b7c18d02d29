//! Actions: opaque, immutable commands applied to a latent state.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of action kinds. Each kind owns its own transition
/// parameters in the predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Observe,
    Query,
    Execute,
    Communicate,
    Transform,
    Create,
    Delete,
    Navigate,
}

impl ActionType {
    pub const ALL: [ActionType; 8] = [
        ActionType::Observe,
        ActionType::Query,
        ActionType::Execute,
        ActionType::Communicate,
        ActionType::Transform,
        ActionType::Create,
        ActionType::Delete,
        ActionType::Navigate,
    ];

    /// Stable position in [`ActionType::ALL`].
    pub fn index(self) -> usize {
        match self {
            ActionType::Observe => 0,
            ActionType::Query => 1,
            ActionType::Execute => 2,
            ActionType::Communicate => 3,
            ActionType::Transform => 4,
            ActionType::Create => 5,
            ActionType::Delete => 6,
            ActionType::Navigate => 7,
        }
    }

    /// Intrinsic prediction uncertainty of this kind of action.
    ///
    /// Observing changes nothing and is the most predictable; deleting is
    /// irreversible and the least.
    pub fn base_uncertainty(self) -> f64 {
        match self {
            ActionType::Observe => 0.1,
            ActionType::Query => 0.15,
            ActionType::Communicate => 0.3,
            ActionType::Navigate => 0.35,
            ActionType::Transform => 0.5,
            ActionType::Execute => 0.5,
            ActionType::Create => 0.6,
            ActionType::Delete => 0.8,
        }
    }

    /// Risk weight used by what-if analysis.
    pub fn risk(self) -> f64 {
        match self {
            ActionType::Observe => 0.05,
            ActionType::Query => 0.1,
            ActionType::Communicate => 0.2,
            ActionType::Navigate => 0.3,
            ActionType::Transform => 0.4,
            ActionType::Create => 0.5,
            ActionType::Execute => 0.6,
            ActionType::Delete => 0.9,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Observe => "observe",
            ActionType::Query => "query",
            ActionType::Execute => "execute",
            ActionType::Communicate => "communicate",
            ActionType::Transform => "transform",
            ActionType::Create => "create",
            ActionType::Delete => "delete",
            ActionType::Navigate => "navigate",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single action parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for ParamValue { fn from(v: bool) -> Self { ParamValue::Bool(v) } }
impl From<f64> for ParamValue { fn from(v: f64) -> Self { ParamValue::Number(v) } }
impl From<i64> for ParamValue { fn from(v: i64) -> Self { ParamValue::Number(v as f64) } }
impl From<i32> for ParamValue { fn from(v: i32) -> Self { ParamValue::Number(v as f64) } }
impl From<String> for ParamValue { fn from(v: String) -> Self { ParamValue::String(v) } }
impl From<&str> for ParamValue { fn from(v: &str) -> Self { ParamValue::String(v.to_owned()) } }

/// Parameters keyed by name. Ordered so that embeddings derived from them
/// do not depend on insertion order.
pub type ActionParams = BTreeMap<String, ParamValue>;

/// An immutable command issued by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    id: String,
    action_type: ActionType,
    parameters: ActionParams,
    agent: String,
    timestamp: DateTime<Utc>,
}

impl Action {
    /// New action with a fresh id, stamped now.
    pub fn new(action_type: ActionType, agent: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action_type,
            parameters: ActionParams::new(),
            agent: agent.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn action_type(&self) -> ActionType { self.action_type }
    pub fn parameters(&self) -> &ActionParams { &self.parameters }
    pub fn agent(&self) -> &str { &self.agent }
    pub fn timestamp(&self) -> DateTime<Utc> { self.timestamp }
}
