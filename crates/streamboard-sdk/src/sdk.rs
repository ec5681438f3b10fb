//! The SDK facade.
//!
//! [`StreamBoard`] owns the message bus, the live [`Context`]s and the form
//! templates, and answers the host's global requests:
//!
//! | Channel | Kind | Behaviour |
//! |---------|------|-----------|
//! | `initContext` | event | create a context, notify [`on_context`](StreamBoard::on_context) listeners |
//! | `settings` | event | apply to the global settings form, notify [`on_settings`](StreamBoard::on_settings) listeners |
//! | `configForm` | call | export the global settings form |
//! | `actionConfigForm` | call | export a fresh form for the given action |
//!
//! and issues the plugin's own: [`ready`](StreamBoard::ready) and, through
//! contexts, `stop`.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use futures_util::future::join_all;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use streamboard_types::channel::global;
use streamboard_types::{FormsConfig, SdkConfig};

use crate::bus::{Bus, ListenerId};
use crate::context::{Context, ContextMap, is_truthy};
use crate::error::Result;
use crate::form::{ConfigForm, Form};
use crate::transport::{InboundRx, Transport};

type ContextListener = Arc<dyn Fn(Context) + Send + Sync>;

struct SdkInner {
    bus: Bus,
    contexts: Arc<ContextMap>,
    /// Global settings template.
    config_form: Mutex<ConfigForm>,
    /// Live global settings built from `config_form`.
    settings: Mutex<Form>,
    /// Per-action context templates.
    action_forms: Mutex<HashMap<String, ConfigForm>>,
    /// Listeners with an optional action filter.
    context_listeners: Mutex<Vec<(Option<String>, ContextListener)>>,
}

impl SdkInner {
    fn settings_snapshot(&self) -> Form {
        self.settings.lock().clone()
    }

    fn action_form(&self, action: &str) -> Option<ConfigForm> {
        self.action_forms.lock().get(action).cloned()
    }

    fn init_context(&self, args: &[Value]) {
        let (Some(uuid), Some(action)) = (
            args.first().and_then(Value::as_str),
            args.get(1).and_then(Value::as_str),
        ) else {
            warn!(?args, "initContext without uuid and action, ignoring");
            return;
        };
        if uuid.is_empty() {
            warn!(action, "initContext with empty uuid, ignoring");
            return;
        }
        if self.contexts.lock().contains_key(uuid) {
            debug!(uuid, "initContext for a live context, ignoring");
            return;
        }

        let mut form = self.action_form(action).unwrap_or_default().get_form();
        form.apply(args.get(2).unwrap_or(&Value::Null));

        let context = match Context::new(
            uuid.to_owned(),
            action.to_owned(),
            form,
            self.bus.prefix(uuid),
            Arc::downgrade(&self.contexts),
        ) {
            Ok(context) => context,
            Err(e) => {
                warn!(uuid, action, error = %e, "cannot create context");
                return;
            }
        };
        self.contexts.lock().insert(uuid.to_owned(), context.clone());
        context.activate();
        info!(uuid, action, "context created");

        let listeners: Vec<ContextListener> = self
            .context_listeners
            .lock()
            .iter()
            .filter(|(filter, _)| filter.as_deref().is_none_or(|a| a == action))
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(context.clone());
        }
    }
}

/// Plugin-side entry point.
///
/// Cloning yields another handle to the same SDK.
#[derive(Clone)]
pub struct StreamBoard {
    inner: Arc<SdkInner>,
}

impl StreamBoard {
    /// Create an SDK over `transport` with default configuration.
    pub fn new(transport: Arc<dyn Transport>) -> Result<Self> {
        Self::with_config(transport, &SdkConfig::default())
    }

    /// Create an SDK over `transport`, applying the bus settings and form
    /// templates from `config`.
    ///
    /// Nothing is received until [`listen`](Self::listen) is called.
    pub fn with_config(transport: Arc<dyn Transport>, config: &SdkConfig) -> Result<Self> {
        let sdk = Self {
            inner: Arc::new(SdkInner {
                bus: Bus::with_config(transport, &config.bus),
                contexts: Arc::new(Mutex::new(Default::default())),
                config_form: Mutex::new(ConfigForm::default()),
                settings: Mutex::new(Form::default()),
                action_forms: Mutex::new(HashMap::new()),
                context_listeners: Mutex::new(Vec::new()),
            }),
        };
        sdk.apply_forms(&config.forms);
        sdk.register()?;
        Ok(sdk)
    }

    fn register(&self) -> Result<()> {
        let bus = &self.inner.bus;

        let weak = Arc::downgrade(&self.inner);
        bus.on(global::INIT_CONTEXT, move |args| {
            if let Some(inner) = weak.upgrade() {
                inner.init_context(args);
            }
        });

        // Registered before any application listener so they see the
        // merged settings.
        let weak = Arc::downgrade(&self.inner);
        bus.on(global::SETTINGS, move |args| {
            if let Some(inner) = weak.upgrade() {
                let settings = args.first().cloned().unwrap_or(Value::Null);
                inner.settings.lock().apply(&settings);
            }
        });

        let weak = Arc::downgrade(&self.inner);
        bus.handle(global::CONFIG_FORM, move |_| {
            let form = weak.upgrade().map(|inner| inner.settings_snapshot());
            async move {
                match form {
                    Some(form) => form.export_value().await,
                    None => Value::Array(Vec::new()),
                }
            }
        })?;

        let weak: Weak<SdkInner> = Arc::downgrade(&self.inner);
        bus.handle(global::ACTION_CONFIG_FORM, move |args| {
            let template = args
                .first()
                .and_then(Value::as_str)
                .and_then(|action| weak.upgrade()?.action_form(action));
            async move {
                match template {
                    Some(template) => template.get_form().export_value().await,
                    None => Value::Array(Vec::new()),
                }
            }
        })?;

        Ok(())
    }

    /// Spawn the dispatch loop over frames received from the host.
    pub fn listen(&self, inbound: InboundRx) -> JoinHandle<()> {
        self.inner.bus.listen(inbound)
    }

    /// The unscoped bus, for channels beyond the built-ins.
    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    /// Tell the host the plugin is ready. Returns its acknowledgement.
    pub async fn ready(&self) -> Result<bool> {
        let ack = self.inner.bus.invoke(global::READY, Vec::new()).await?;
        Ok(is_truthy(&ack))
    }

    // -- Forms --------------------------------------------------------------

    /// Replace the global settings template.
    ///
    /// Explicit values already set on inputs that still exist are kept.
    pub fn set_config_form(&self, template: impl Into<ConfigForm>) {
        let template = template.into();
        let mut fresh = template.get_form();
        {
            let current = self.inner.settings.lock();
            for input in current.inputs() {
                if let Some(value) = input.value() {
                    fresh.set(input.key(), value.clone());
                }
            }
        }
        *self.inner.settings.lock() = fresh;
        *self.inner.config_form.lock() = template;
    }

    /// The global settings template.
    pub fn config_form(&self) -> ConfigForm {
        self.inner.config_form.lock().clone()
    }

    /// Register the template contexts of `action` are created from.
    pub fn set_action_config_form(&self, action: &str, template: impl Into<ConfigForm>) {
        self.inner
            .action_forms
            .lock()
            .insert(action.to_owned(), template.into());
    }

    /// The template registered for `action`.
    pub fn action_config_form(&self, action: &str) -> Option<ConfigForm> {
        self.inner.action_form(action)
    }

    /// Register every template declared in configuration.
    pub fn apply_forms(&self, forms: &FormsConfig) {
        if !forms.global.is_empty() {
            self.set_config_form(ConfigForm::from_defs(forms.global.iter().cloned()));
        }
        for (action, defs) in &forms.actions {
            self.set_action_config_form(action, ConfigForm::from_defs(defs.iter().cloned()));
        }
    }

    // -- Global settings ----------------------------------------------------

    /// Effective global settings.
    pub async fn get_config(&self) -> Map<String, Value> {
        let form = self.inner.settings_snapshot();
        form.get_config().await
    }

    /// Apply values to the global settings; unknown keys are ignored.
    pub fn set_config(&self, config: &Map<String, Value>) {
        self.inner.settings.lock().set_config(config);
    }

    /// Run `listener` with the merged global settings after every settings
    /// push from the host. Runs on a spawned task.
    pub fn on_settings<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(Map<String, Value>) + Send + Sync + 'static,
    {
        let listener = Arc::new(listener);
        let weak = Arc::downgrade(&self.inner);
        self.inner.bus.on(global::SETTINGS, move |_| {
            let Some(form) = weak.upgrade().map(|inner| inner.settings_snapshot()) else {
                return;
            };
            let listener = Arc::clone(&listener);
            tokio::spawn(async move {
                listener(form.get_config().await);
            });
        })
    }

    // -- Contexts -----------------------------------------------------------

    /// Run `listener` for every new context, or only for contexts of
    /// `action`.
    pub fn on_context<F>(&self, action: Option<&str>, listener: F)
    where
        F: Fn(Context) + Send + Sync + 'static,
    {
        self.inner
            .context_listeners
            .lock()
            .push((action.map(str::to_owned), Arc::new(listener)));
    }

    /// Live contexts, optionally only those of `action`, ordered by uuid.
    pub fn get_all_contexts(&self, action: Option<&str>) -> Vec<Context> {
        self.inner
            .contexts
            .lock()
            .values()
            .filter(|c| action.is_none_or(|a| c.action() == a))
            .cloned()
            .collect()
    }

    /// The live context with `uuid`.
    pub fn get_context(&self, uuid: &str) -> Option<Context> {
        self.inner.contexts.lock().get(uuid).cloned()
    }

    /// Stop every context, then drop the SDK's own registrations.
    ///
    /// Returns how many contexts acknowledged the stop. Contexts that did
    /// not stay live.
    pub async fn stop(&self) -> usize {
        let contexts = self.get_all_contexts(None);
        let outcomes = join_all(contexts.iter().map(Context::stop)).await;
        let stopped = outcomes.iter().filter(|ack| **ack).count();

        self.inner.bus.remove_all_listeners(None);
        self.inner.bus.remove_handler(None);
        info!(contexts = contexts.len(), stopped, "sdk stopped");
        stopped
    }
}

impl std::fmt::Debug for StreamBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamBoard")
            .field("bus", &self.inner.bus)
            .field("contexts", &self.inner.contexts.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::InputDescriptor;
    use crate::transport::ChannelTransport;
    use serde_json::json;
    use streamboard_types::{Envelope, Inbound, InputType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sdk() -> (StreamBoard, crate::transport::Endpoint) {
        let (left, right) = ChannelTransport::pair();
        (StreamBoard::new(left.transport).unwrap(), right)
    }

    fn init(sdk: &StreamBoard, uuid: &str, action: &str, config: Value) {
        sdk.bus().dispatch(Inbound::anonymous(Envelope::event(
            global::INIT_CONTEXT,
            vec![json!(uuid), json!(action), config],
        )));
    }

    #[tokio::test]
    async fn init_context_applies_template_and_initial_config() {
        let (sdk, _host) = sdk();
        sdk.set_action_config_form(
            "a1",
            vec![
                InputDescriptor::of(InputType::Text, "t").default_value("d"),
                InputDescriptor::of(InputType::Checkbox, "c").default_value(false),
            ],
        );
        init(&sdk, "u1", "a1", json!({"c": true, "zzz": 1}));

        let ctx = sdk.get_context("u1").unwrap();
        assert_eq!(ctx.action(), "a1");
        assert_eq!(
            Value::Object(ctx.get_config().await),
            json!({"t": "d", "c": true})
        );
    }

    #[tokio::test]
    async fn unregistered_action_gets_empty_form() {
        let (sdk, _host) = sdk();
        init(&sdk, "u1", "nothing", json!({"x": 1}));
        assert!(sdk.get_context("u1").unwrap().form().is_empty());
    }

    #[tokio::test]
    async fn malformed_and_duplicate_init_are_ignored() {
        let (sdk, _host) = sdk();
        sdk.bus().dispatch(Inbound::anonymous(Envelope::event(
            global::INIT_CONTEXT,
            vec![json!(42)],
        )));
        assert!(sdk.get_all_contexts(None).is_empty());

        let created = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&created);
        sdk.on_context(None, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        init(&sdk, "u1", "a1", json!({}));
        init(&sdk, "u1", "a1", json!({}));
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(sdk.get_all_contexts(None).len(), 1);
    }

    #[tokio::test]
    async fn set_config_form_keeps_explicit_values() {
        let (sdk, _host) = sdk();
        sdk.set_config_form(vec![InputDescriptor::of(InputType::Text, "name")]);
        sdk.set_config(json!({"name": "deck"}).as_object().unwrap());
        sdk.set_config_form(vec![
            InputDescriptor::of(InputType::Text, "name"),
            InputDescriptor::of(InputType::Checkbox, "dark").default_value(true),
        ]);
        assert_eq!(
            Value::Object(sdk.get_config().await),
            json!({"name": "deck", "dark": true})
        );
        assert_eq!(sdk.config_form().descriptors().len(), 2);
    }

    #[tokio::test]
    async fn forms_from_config() {
        let config: SdkConfig = serde_json::from_value(json!({
            "forms": {
                "global": [{"type": "input_text", "key": "token", "default": ""}],
                "actions": {"counter": [{"type": "input_text", "key": "prefix", "default": "#"}]}
            }
        }))
        .unwrap();
        let (left, _right) = ChannelTransport::pair();
        let sdk = StreamBoard::with_config(left.transport, &config).unwrap();
        assert_eq!(sdk.get_config().await.get("token"), Some(&json!("")));
        assert!(sdk.action_config_form("counter").is_some());
        assert!(sdk.action_config_form("other").is_none());
    }
}
