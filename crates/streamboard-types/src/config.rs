//! SDK configuration schema.
//!
//! All structs accept both `snake_case` and `camelCase` field names via
//! `#[serde(alias)]`. Unknown fields are ignored so that newer hosts can
//! ship richer configuration files to older plugins.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::form::InputDef;

/// Root configuration for a plugin built on the SDK.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SdkConfig {
    /// Message bus settings.
    #[serde(default)]
    pub bus: BusConfig,

    /// Declarative configuration forms.
    #[serde(default)]
    pub forms: FormsConfig,
}

/// Message bus settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Identity of the remote endpoint the bus is bound to. Inbound frames
    /// attributed to any other sender are dropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Give up on calls after this many seconds. Unset means wait forever.
    #[serde(
        default,
        alias = "callTimeoutSecs",
        skip_serializing_if = "Option::is_none"
    )]
    pub call_timeout_secs: Option<u64>,
}

impl BusConfig {
    /// The call timeout as a [`Duration`], if configured.
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_secs.map(Duration::from_secs)
    }
}

/// Form templates: one global settings form plus one per action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormsConfig {
    /// Global settings form.
    #[serde(default, alias = "configForm")]
    pub global: Vec<InputDef>,

    /// Per-action context forms, keyed by action id.
    #[serde(default)]
    pub actions: BTreeMap<String, Vec<InputDef>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_uses_defaults() {
        let cfg: SdkConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, SdkConfig::default());
        assert!(cfg.bus.call_timeout().is_none());
    }

    #[test]
    fn camel_case_aliases() {
        let cfg: SdkConfig = serde_json::from_str(
            r#"{
                "bus": {"endpoint": "win-1", "callTimeoutSecs": 5},
                "forms": {"configForm": [{"type": "input_text", "key": "name"}]}
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.bus.endpoint.as_deref(), Some("win-1"));
        assert_eq!(cfg.bus.call_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(cfg.forms.global.len(), 1);
    }

    #[test]
    fn toml_with_actions() {
        let cfg: SdkConfig = toml::from_str(
            r##"
            [bus]
            call_timeout_secs = 10

            [[forms.actions.counter]]
            type = "input_checkbox"
            key = "reset_on_press"
            default = false

            [[forms.actions.counter]]
            type = "input_text"
            key = "prefix"
            default = "#"
            "##,
        )
        .unwrap();
        assert_eq!(cfg.bus.call_timeout_secs, Some(10));
        assert_eq!(cfg.forms.actions["counter"].len(), 2);
        assert_eq!(cfg.forms.actions["counter"][1].key, "prefix");
    }

    #[test]
    fn unknown_fields_ignored() {
        let cfg: SdkConfig =
            serde_json::from_str(r#"{"bus": {"retries": 3}, "theme": "dark"}"#).unwrap();
        assert!(cfg.bus.endpoint.is_none());
    }
}
