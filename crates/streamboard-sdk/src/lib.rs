//! Plugin-side SDK for StreamBoard.
//!
//! A plugin runs as a separate process and talks to the host over one raw,
//! bidirectional message channel. This crate layers on top of that channel:
//!
//! - [`bus`] -- named events, request/response calls with correlation ids,
//!   and prefixed views for per-context scoping.
//! - [`context`] -- one [`Context`] per UI element the plugin controls,
//!   with its lifecycle and configuration form.
//! - [`form`] -- configuration form templates and live forms.
//! - [`sdk`] -- the [`StreamBoard`] facade tying them together.
//! - [`transport`] -- in-memory and JSON-lines raw channels.
//! - [`config`] -- loading [`SdkConfig`](streamboard_types::SdkConfig)
//!   from JSON or TOML files.
//!
//! ```no_run
//! use streamboard_sdk::{JsonLinesTransport, StreamBoard};
//!
//! # async fn run() -> streamboard_sdk::Result<()> {
//! let (transport, inbound) = JsonLinesTransport::stdio();
//! let sdk = StreamBoard::new(transport)?;
//! sdk.on_context(Some("counter"), |ctx| {
//!     let _ = ctx.set_text("0");
//! });
//! sdk.listen(inbound);
//! sdk.ready().await?;
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod config;
pub mod context;
pub mod error;
pub mod form;
pub mod sdk;
pub mod transport;

pub use bus::{Bus, ListenerId};
pub use config::{ConfigFormat, load_config, parse_config};
pub use context::{Context, LifecycleState};
pub use error::{Result, SdkError};
pub use form::{ConfigForm, Form, Input, InputDescriptor, InputKind, Resolvable};
pub use sdk::StreamBoard;
pub use transport::{ChannelTransport, Endpoint, InboundRx, JsonLinesTransport, Transport};

pub use streamboard_types as types;
