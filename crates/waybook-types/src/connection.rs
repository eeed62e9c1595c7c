//! Connections: declarative links that pull a user's earlier (or later)
//! work into the block being rendered.
//!
//! A connection names a direction (`ConnectionType`), a mechanism
//! (`ConnectionMethod`), and a parameter payload. Parameters are stored as
//! JSON written by curriculum authors, so parsing is lenient: anything
//! malformed degrades to an empty instruction list rather than failing the
//! block that references it.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

/// Direction of a connection relative to the block that declares it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ConnectionType {
    /// Pulls from an earlier exercise into this one.
    Forward,
    /// Pulls from within the same exercise.
    Internal,
    /// A later exercise revisits this one's data.
    Backward,
    /// Reads shared reference material, not user work.
    Resource,
    /// Narrative link only; resolves to its own params.
    Framework,
}

impl ConnectionType {
    /// Parse from string (case-insensitive). Unknown types resolve like
    /// `Framework` — the caller echoes params rather than erroring.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Forward => "forward",
            ConnectionType::Internal => "internal",
            ConnectionType::Backward => "backward",
            ConnectionType::Resource => "resource",
            ConnectionType::Framework => "framework",
        }
    }

    /// Check if this direction routes through the user-data sources.
    pub fn is_auto_populate_direction(&self) -> bool {
        matches!(
            self,
            ConnectionType::Forward | ConnectionType::Internal | ConnectionType::Backward
        )
    }
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a connection materializes its data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ConnectionMethod {
    /// Fetch the user's stored data from the named source.
    AutoPopulate,
    /// Fetch shared reference material (no user data).
    ReferenceLink,
    /// No fetch; the parsed params are the payload.
    #[default]
    Custom,
}

impl ConnectionMethod {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionMethod::AutoPopulate => "auto_populate",
            ConnectionMethod::ReferenceLink => "reference_link",
            ConnectionMethod::Custom => "custom",
        }
    }
}

impl std::fmt::Display for ConnectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Author-written connection parameters.
///
/// Every field is optional; unknown fields are ignored. The default —
/// also the fallback for malformed JSON — is an empty instruction list.
/// Stored params are authored snake_case (`from_exercise`, `from_module`),
/// and `custom` connections echo them back in the same shape.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformParams {
    /// Which user-data source feeds an auto-populate connection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Named filter applied by the source adapter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Exercise the data came from, e.g. "1.2.3".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_exercise: Option<String>,
    /// Module the data came from, when no single exercise applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_module: Option<String>,
    /// Reference-link target, e.g. "skills_master".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Rendering hint passed through to clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    /// Author-facing narrative instructions.
    #[serde(default)]
    pub instructions: Vec<String>,
}

impl TransformParams {
    /// Parse stored params JSON; malformed input degrades to the default.
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_default()
    }

    /// The exercise (or module) the connected data originates from.
    pub fn source_exercise(&self) -> Option<String> {
        self.from_exercise
            .clone()
            .or_else(|| self.from_module.clone())
    }
}

/// What a connection resolved to. Soft failures (missing connection,
/// unknown source) land in `error` with `data: None` — resolution never
/// takes down the block that asked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionResult {
    pub connection_id: i64,
    pub method: ConnectionMethod,
    pub data: Option<serde_json::Value>,
    pub is_empty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_exercise: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionResult {
    /// Resolution for a connection id that doesn't exist.
    pub fn not_found(connection_id: i64) -> Self {
        Self {
            connection_id,
            method: ConnectionMethod::Custom,
            data: None,
            is_empty: true,
            source_exercise: None,
            error: Some(format!("connection {connection_id} not found")),
        }
    }
}
