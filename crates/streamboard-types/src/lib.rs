//! Core types for the StreamBoard plugin SDK.
//!
//! This crate holds everything that crosses the plugin/host boundary or is
//! read from configuration files, without any runtime behaviour:
//!
//! - [`envelope`] -- the [`Envelope`] unit on the raw channel and the
//!   sender-tagged [`Inbound`] frame.
//! - [`channel`] -- reserved channel names and scope helpers.
//! - [`form`] -- input kinds, static descriptors, exported inputs.
//! - [`event`] -- payloads of host -> plugin events.
//! - [`config`] -- the SDK configuration schema.

pub mod channel;
pub mod config;
pub mod envelope;
pub mod event;
pub mod form;

pub use config::{BusConfig, FormsConfig, SdkConfig};
pub use envelope::{Envelope, Inbound, response_channel};
pub use event::{PlaySound, PressUp};
pub use form::{ExportedInput, InputDef, InputType, SelectItem, UnknownInputType};
