//! Payloads of host -> plugin events.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// Payload of a `pressUp` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressUp {
    /// How long the key was held, in milliseconds.
    ///
    /// Hosts may report fractional milliseconds; they are rounded.
    #[serde(
        rename = "pressDuration",
        alias = "press_duration",
        default,
        deserialize_with = "rounded_millis"
    )]
    pub press_duration_ms: u64,
}

fn rounded_millis<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = f64::deserialize(deserializer)?;
    // Saturating cast: negative and NaN become 0.
    Ok(millis.round() as u64)
}

impl PressUp {
    /// Hold time as a [`Duration`].
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.press_duration_ms)
    }
}

/// Payload of a `playSound` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaySound {
    /// Path of the audio file, as understood by the host.
    pub file: String,
}
