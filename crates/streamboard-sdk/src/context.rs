//! Per-UI-element contexts.
//!
//! A [`Context`] represents one remote UI element (a key on the board) the
//! plugin controls. It talks over a view of the SDK bus prefixed with its
//! uuid, owns the configuration [`Form`] it was created with, and moves
//! through [`LifecycleState`]:
//!
//! ```text
//! created -> active -> stopping -> stopped
//!                ^          |
//!                +----------+  (stop not acknowledged)
//! ```
//!
//! # Stopping
//!
//! [`Context::stop`] asks the host to stop the context and tears it down
//! only on a truthy acknowledgement. Concurrent and repeated callers share
//! one in-flight call, so a context never issues two overlapping `stop`
//! calls. The host may also stop the context by calling
//! `stop` on it, which is answered once with `true`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use streamboard_types::channel::scoped;
use streamboard_types::{ExportedInput, PlaySound, PressUp};

use crate::bus::{Bus, ListenerId};
use crate::error::Result;
use crate::form::Form;

/// Live contexts keyed by uuid, shared between the SDK and its contexts.
pub(crate) type ContextMap = Mutex<BTreeMap<String, Context>>;

/// Lifecycle of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, not yet published to the application.
    Created,
    /// Published and serving events.
    Active,
    /// A `stop` call is in flight.
    Stopping,
    /// Torn down. Terminal.
    Stopped,
}

/// Outcome slot for [`Context::stop`].
enum StopState {
    /// No stop in flight.
    Idle,
    /// Stop in flight; every caller awaits this.
    Pending(Shared<BoxFuture<'static, bool>>),
    /// Stopped for good.
    Stopped,
}

type StopListener = Arc<dyn Fn() + Send + Sync>;

struct ContextInner {
    uuid: String,
    action: String,
    bus: Bus,
    form: Mutex<Form>,
    state: Mutex<LifecycleState>,
    stop: Mutex<StopState>,
    stop_listeners: Mutex<Vec<StopListener>>,
    contexts: Weak<ContextMap>,
}

impl ContextInner {
    fn snapshot(&self) -> Form {
        self.form.lock().clone()
    }
}

/// Handle to one context. Cloning yields another handle to the same one.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("uuid", &self.inner.uuid)
            .field("action", &self.inner.action)
            .field("state", &*self.inner.state.lock())
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Build a context on `bus` (already prefixed with `uuid`) and register
    /// its per-context channels.
    pub(crate) fn new(
        uuid: String,
        action: String,
        form: Form,
        bus: Bus,
        contexts: Weak<ContextMap>,
    ) -> Result<Self> {
        let context = Self {
            inner: Arc::new(ContextInner {
                uuid,
                action,
                bus,
                form: Mutex::new(form),
                state: Mutex::new(LifecycleState::Created),
                stop: Mutex::new(StopState::Idle),
                stop_listeners: Mutex::new(Vec::new()),
                contexts,
            }),
        };
        context.register()?;
        Ok(context)
    }

    fn register(&self) -> Result<()> {
        let bus = &self.inner.bus;

        // Registered first so application listeners see the merged form.
        let weak = Arc::downgrade(&self.inner);
        bus.on(scoped::SETTINGS, move |args| {
            if let Some(inner) = weak.upgrade() {
                let settings = args.first().cloned().unwrap_or(Value::Null);
                inner.form.lock().apply(&settings);
            }
        });

        let weak = Arc::downgrade(&self.inner);
        bus.handle(scoped::CONFIG_FORM, move |_| {
            let form = weak.upgrade().map(|inner| inner.snapshot());
            async move {
                match form {
                    Some(form) => form.export_value().await,
                    None => Value::Array(Vec::new()),
                }
            }
        })?;

        let weak = Arc::downgrade(&self.inner);
        bus.handle_once(scoped::STOP, move |_| {
            if let Some(inner) = weak.upgrade() {
                Self { inner }.teardown("stopped by host");
            }
            async { Value::Bool(true) }
        })?;

        Ok(())
    }

    /// Stable identity; also the channel scope.
    pub fn uuid(&self) -> &str {
        &self.inner.uuid
    }

    /// Action (form template) the context was created from.
    pub fn action(&self) -> &str {
        &self.inner.action
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.inner.state.lock()
    }

    /// The context's prefixed bus view, for channels beyond the built-ins.
    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    pub(crate) fn activate(&self) {
        let mut state = self.inner.state.lock();
        if *state == LifecycleState::Created {
            *state = LifecycleState::Active;
        }
    }

    // -- Outgoing events ----------------------------------------------------

    /// Set the key's text.
    pub fn set_text(&self, value: &str) -> Result<()> {
        self.inner.bus.send(scoped::SET_TEXT, vec![json!(value)])
    }

    /// Set the key's image.
    pub fn set_image(&self, value: &str) -> Result<()> {
        self.inner.bus.send(scoped::SET_IMAGE, vec![json!(value)])
    }

    /// Set the key's color.
    pub fn set_color(&self, value: &str) -> Result<()> {
        self.inner.bus.send(scoped::SET_COLOR, vec![json!(value)])
    }

    /// Ask the host to play an audio file.
    pub fn play_sound(&self, path: &str) -> Result<()> {
        let payload = serde_json::to_value(PlaySound {
            file: path.to_owned(),
        })?;
        self.inner.bus.send(scoped::PLAY_SOUND, vec![payload])
    }

    // -- Incoming events ----------------------------------------------------

    /// Run `listener` whenever the key is pressed.
    pub fn on_press_down<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.bus.on(scoped::PRESS_DOWN, move |_| listener())
    }

    /// Run `listener` whenever the key is released.
    pub fn on_press_up<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(PressUp) + Send + Sync + 'static,
    {
        let uuid = self.inner.uuid.clone();
        self.inner.bus.on(scoped::PRESS_UP, move |args| {
            let payload = args.first().cloned().unwrap_or_else(|| json!({}));
            match serde_json::from_value::<PressUp>(payload) {
                Ok(event) => listener(event),
                Err(e) => warn!(uuid = %uuid, error = %e, "malformed pressUp payload"),
            }
        })
    }

    /// Run `listener` with the merged configuration after every settings
    /// push from the host.
    ///
    /// The push is applied to the context's form before `listener` runs.
    /// Defaults may be asynchronous, so `listener` runs on a spawned task.
    pub fn on_settings<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(Map<String, Value>) + Send + Sync + 'static,
    {
        let listener = Arc::new(listener);
        let weak = Arc::downgrade(&self.inner);
        self.inner.bus.on(scoped::SETTINGS, move |_| {
            let Some(form) = weak.upgrade().map(|inner| inner.snapshot()) else {
                return;
            };
            let listener = Arc::clone(&listener);
            tokio::spawn(async move {
                listener(form.get_config().await);
            });
        })
    }

    /// Run `listener` once the context has been torn down.
    pub fn on_stop<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.stop_listeners.lock().push(Arc::new(listener));
    }

    // -- Configuration ------------------------------------------------------

    /// Snapshot of the context's form.
    pub fn form(&self) -> Form {
        self.inner.snapshot()
    }

    /// Effective value of one input.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let form = self.form();
        form.get(key).await
    }

    /// Set one input. Unknown keys are ignored (returns `false`).
    pub fn set(&self, key: &str, value: Value) -> bool {
        self.inner.form.lock().set(key, value)
    }

    /// Effective values of every input.
    pub async fn get_config(&self) -> Map<String, Value> {
        let form = self.form();
        form.get_config().await
    }

    /// Apply values to matching inputs; unknown keys are ignored.
    pub fn set_config(&self, config: &Map<String, Value>) {
        self.inner.form.lock().set_config(config);
    }

    /// Export the context's form.
    pub async fn export(&self) -> Vec<ExportedInput> {
        let form = self.form();
        form.export().await
    }

    // -- Stopping -----------------------------------------------------------

    /// Ask the host to stop this context.
    ///
    /// Returns the host's acknowledgement. On `true` the context is torn
    /// down; on `false` it stays active and a later call asks again.
    /// Calls made while a stop is in flight share its outcome; calls made
    /// after a successful stop return `true` without asking again.
    pub async fn stop(&self) -> bool {
        let outcome = {
            let mut stop = self.inner.stop.lock();
            match &*stop {
                StopState::Stopped => return true,
                StopState::Pending(outcome) => outcome.clone(),
                StopState::Idle => {
                    let outcome = self.clone().request_stop().boxed().shared();
                    *stop = StopState::Pending(outcome.clone());
                    outcome
                }
            }
        };
        outcome.await
    }

    async fn request_stop(self) -> bool {
        self.transition(LifecycleState::Active, LifecycleState::Stopping);
        debug!(uuid = %self.inner.uuid, "requesting stop");

        let acknowledged = match self.inner.bus.invoke(scoped::STOP, Vec::new()).await {
            Ok(value) => is_truthy(&value),
            Err(e) => {
                warn!(uuid = %self.inner.uuid, error = %e, "stop call failed");
                false
            }
        };

        if acknowledged {
            self.teardown("stop acknowledged");
        } else if self.transition(LifecycleState::Stopping, LifecycleState::Active) {
            *self.inner.stop.lock() = StopState::Idle;
            info!(uuid = %self.inner.uuid, "stop not acknowledged, context stays active");
        }
        acknowledged
    }

    /// Move from `from` to `to`; returns whether the state was `from`.
    fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        let mut state = self.inner.state.lock();
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }

    /// Remove every registration this context made, drop it from the SDK's
    /// map and notify stop listeners. Idempotent.
    fn teardown(&self, reason: &str) {
        {
            let mut state = self.inner.state.lock();
            if *state == LifecycleState::Stopped {
                return;
            }
            *state = LifecycleState::Stopped;
        }
        *self.inner.stop.lock() = StopState::Stopped;

        self.inner.bus.remove_all_listeners(None);
        self.inner.bus.remove_handler(None);
        if let Some(contexts) = self.inner.contexts.upgrade() {
            contexts.lock().remove(&self.inner.uuid);
        }

        info!(
            uuid = %self.inner.uuid,
            action = %self.inner.action,
            reason,
            "context stopped"
        );
        let listeners = std::mem::take(&mut *self.inner.stop_listeners.lock());
        for listener in listeners {
            listener();
        }
    }
}

/// Truthiness of an acknowledgement value.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
