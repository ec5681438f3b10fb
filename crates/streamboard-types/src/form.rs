//! Declarative form types shared between plugin and host.
//!
//! [`InputType`] is the closed set of input kinds and the registry that
//! maps wire tags (`"input_text"`, ...) onto them. [`InputDef`] is the
//! static, serializable shape of an input descriptor as it appears in
//! configuration files. [`ExportedInput`] is what the host receives when it
//! asks for a form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kinds of input a form may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputType {
    /// Single-line text.
    #[serde(rename = "input_text")]
    Text,
    /// Multi-line text.
    #[serde(rename = "input_textarea")]
    TextArea,
    /// Boolean checkbox.
    #[serde(rename = "input_checkbox")]
    Checkbox,
    /// Single choice among `items`.
    #[serde(rename = "input_select")]
    Select,
    /// File picker, optionally restricted by `accept`.
    #[serde(rename = "input_file")]
    File,
}

/// Tag -> kind registry. Tags not listed here are unknown.
const REGISTRY: &[(&str, InputType)] = &[
    ("input_text", InputType::Text),
    ("input_textarea", InputType::TextArea),
    ("input_checkbox", InputType::Checkbox),
    ("input_select", InputType::Select),
    ("input_file", InputType::File),
];

impl InputType {
    /// Look up a wire tag in the registry.
    pub fn from_tag(tag: &str) -> Option<Self> {
        REGISTRY
            .iter()
            .find(|(known, _)| *known == tag)
            .map(|(_, kind)| *kind)
    }

    /// The wire tag for this kind.
    pub fn tag(self) -> &'static str {
        REGISTRY
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(tag, _)| *tag)
            .unwrap_or("input_text")
    }

    /// All registered kinds, in registry order.
    pub fn all() -> impl Iterator<Item = Self> {
        REGISTRY.iter().map(|(_, kind)| *kind)
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Returned when parsing a tag the registry does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown input type: {0}")]
pub struct UnknownInputType(pub String);

impl FromStr for InputType {
    type Err = UnknownInputType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| UnknownInputType(s.to_owned()))
    }
}

/// One choice of a select input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectItem {
    /// Display text.
    pub label: String,
    /// Value stored when chosen.
    pub value: Value,
}

impl SelectItem {
    /// Create a select item.
    pub fn new(label: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Static input descriptor, as written in configuration files.
///
/// `input_type` is kept as a raw tag so that descriptors naming kinds this
/// build does not know still parse; they are dropped when a form is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDef {
    /// Wire tag, e.g. `"input_text"`.
    #[serde(rename = "type")]
    pub input_type: String,

    /// Unique key within the form. Older descriptors call this `action`.
    #[serde(alias = "action")]
    pub key: String,

    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Plain default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Choices for `input_select`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<SelectItem>>,

    /// Accepted file types for `input_file` (e.g. `".mp3,audio/*"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept: Option<String>,
}

/// An input as exported to the host.
///
/// `value` is the effective value (explicit or default); `default` is the
/// resolved default even when an explicit value is set, so the host can
/// offer "reset to default".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedInput {
    /// Input kind.
    #[serde(rename = "type")]
    pub input_type: InputType,

    /// Key within the form.
    pub key: String,

    /// Display label, `null` when unset.
    #[serde(default)]
    pub label: Option<String>,

    /// Effective value.
    pub value: Value,

    /// Resolved default.
    pub default: Value,

    /// Resolved choices (select only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,

    /// Accepted file types (file only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept: Option<String>,
}
