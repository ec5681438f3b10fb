//! Configuration forms.
//!
//! A [`ConfigForm`] is a template: an ordered list of [`InputDescriptor`]s.
//! [`ConfigForm::get_form`] compiles it into a live [`Form`] of [`Input`]s
//! holding current values. Descriptors whose type tag is not in the
//! [`InputType`] registry are dropped at that point, so a plugin built
//! against an older SDK degrades to "field omitted" rather than failing.
//!
//! Defaults and select items are [`Resolvable`]: either a plain value or a
//! provider returning a future. Reads that need them ([`Form::get`],
//! [`Form::get_config`], [`Form::export`]) await providers transparently.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use serde_json::{Map, Value};
use tracing::debug;

use streamboard_types::{ExportedInput, InputDef, InputType};

/// Produces a value on demand.
pub type Provider = Arc<dyn Fn() -> BoxFuture<'static, Value> + Send + Sync>;

/// A value known up front or computed by a provider.
#[derive(Clone)]
pub enum Resolvable {
    /// Known value.
    Value(Value),
    /// Computed on each resolution.
    Provider(Provider),
}

impl Resolvable {
    /// A plain value.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// An asynchronous provider.
    pub fn provider<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        Self::Provider(Arc::new(move || f().boxed()))
    }

    /// A synchronous provider.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self::Provider(Arc::new(move || futures_util::future::ready(f()).boxed()))
    }

    /// Resolve to a value, awaiting the provider if there is one.
    pub async fn resolve(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Provider(provider) => provider().await,
        }
    }
}

impl fmt::Debug for Resolvable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

impl From<Value> for Resolvable {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Raw input descriptor, as registered with a [`ConfigForm`].
///
/// The type is kept as a tag string; unknown tags are tolerated here and
/// dropped when a form is built.
#[derive(Debug, Clone)]
pub struct InputDescriptor {
    /// Wire tag, e.g. `"input_text"`.
    pub input_type: String,
    /// Unique key within the form.
    pub key: String,
    /// Display label.
    pub label: Option<String>,
    /// Default value or provider.
    pub default: Option<Resolvable>,
    /// Choices for selects.
    pub items: Option<Resolvable>,
    /// Accepted file types for file inputs.
    pub accept: Option<String>,
}

impl InputDescriptor {
    /// Start a descriptor with a raw type tag.
    pub fn new(input_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            input_type: input_type.into(),
            key: key.into(),
            label: None,
            default: None,
            items: None,
            accept: None,
        }
    }

    /// Start a descriptor for a known kind.
    pub fn of(kind: InputType, key: impl Into<String>) -> Self {
        Self::new(kind.tag(), key)
    }

    /// Set the label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set a plain default.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(Resolvable::value(value));
        self
    }

    /// Set a default provider.
    pub fn default_with<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        self.default = Some(Resolvable::provider(f));
        self
    }

    /// Set select items (value or provider).
    pub fn items(mut self, items: Resolvable) -> Self {
        self.items = Some(items);
        self
    }

    /// Set accepted file types.
    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }
}

impl From<InputDef> for InputDescriptor {
    fn from(def: InputDef) -> Self {
        Self {
            input_type: def.input_type,
            key: def.key,
            label: def.label,
            default: def.default.map(Resolvable::Value),
            items: def
                .items
                .map(|items| Resolvable::Value(serde_json::to_value(items).unwrap_or_default())),
            accept: def.accept,
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Variant-specific part of an input.
#[derive(Debug, Clone)]
pub enum InputKind {
    /// Single-line text.
    Text,
    /// Multi-line text.
    TextArea,
    /// Checkbox.
    Checkbox,
    /// Single choice.
    Select {
        /// Choices, resolved on export.
        items: Resolvable,
    },
    /// File picker.
    File {
        /// Accepted file types.
        accept: Option<String>,
    },
}

impl InputKind {
    /// The registry kind this variant corresponds to.
    pub fn input_type(&self) -> InputType {
        match self {
            Self::Text => InputType::Text,
            Self::TextArea => InputType::TextArea,
            Self::Checkbox => InputType::Checkbox,
            Self::Select { .. } => InputType::Select,
            Self::File { .. } => InputType::File,
        }
    }
}

/// A live input holding an optional explicit value.
#[derive(Debug, Clone)]
pub struct Input {
    key: String,
    label: Option<String>,
    value: Option<Value>,
    default: Option<Resolvable>,
    kind: InputKind,
}

impl Input {
    /// Build an input from a descriptor, or `None` if its tag is unknown.
    pub fn from_descriptor(desc: &InputDescriptor) -> Option<Self> {
        let kind = match InputType::from_tag(&desc.input_type)? {
            InputType::Text => InputKind::Text,
            InputType::TextArea => InputKind::TextArea,
            InputType::Checkbox => InputKind::Checkbox,
            InputType::Select => InputKind::Select {
                items: desc
                    .items
                    .clone()
                    .unwrap_or_else(|| Resolvable::Value(Value::Array(Vec::new()))),
            },
            InputType::File => InputKind::File {
                accept: desc.accept.clone(),
            },
        };
        Some(Self {
            key: desc.key.clone(),
            label: desc.label.clone(),
            value: None,
            default: desc.default.clone(),
            kind,
        })
    }

    /// Key within the form.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Display label.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Variant-specific part.
    pub fn kind(&self) -> &InputKind {
        &self.kind
    }

    /// Registry kind.
    pub fn input_type(&self) -> InputType {
        self.kind.input_type()
    }

    /// The explicitly set value, if any.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Set an explicit value.
    pub fn set_value(&mut self, value: Value) {
        self.value = Some(value);
    }

    /// Drop the explicit value, falling back to the default.
    pub fn reset(&mut self) {
        self.value = None;
    }

    /// The resolved default, `Null` if there is none.
    pub async fn default_value(&self) -> Value {
        match &self.default {
            Some(default) => default.resolve().await,
            None => Value::Null,
        }
    }

    /// Explicit value if set, otherwise the resolved default.
    pub async fn effective_value(&self) -> Value {
        match &self.value {
            Some(value) => value.clone(),
            None => self.default_value().await,
        }
    }
}

/// Export an input for the host.
pub async fn export_input(input: &Input) -> ExportedInput {
    let default = input.default_value().await;
    let value = match &input.value {
        Some(value) => value.clone(),
        None => default.clone(),
    };
    let (items, accept) = match &input.kind {
        InputKind::Select { items } => (Some(items.resolve().await), None),
        InputKind::File { accept } => (None, accept.clone()),
        InputKind::Text | InputKind::TextArea | InputKind::Checkbox => (None, None),
    };
    ExportedInput {
        input_type: input.input_type(),
        key: input.key.clone(),
        label: input.label.clone(),
        value,
        default,
        items,
        accept,
    }
}

// ---------------------------------------------------------------------------
// Form
// ---------------------------------------------------------------------------

/// A live form: ordered inputs with unique keys.
///
/// The set of keys is fixed by the [`ConfigForm`] the form was built from;
/// writes to unknown keys are ignored.
#[derive(Debug, Clone, Default)]
pub struct Form {
    inputs: Vec<Input>,
}

impl Form {
    /// Number of inputs.
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Whether the form has no inputs.
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Inputs in declaration order.
    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    /// Keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(Input::key)
    }

    /// Look up an input.
    pub fn input(&self, key: &str) -> Option<&Input> {
        self.inputs.iter().find(|i| i.key == key)
    }

    /// Look up an input for modification.
    pub fn input_mut(&mut self, key: &str) -> Option<&mut Input> {
        self.inputs.iter_mut().find(|i| i.key == key)
    }

    /// Effective value of `key`; `None` if the form has no such input.
    pub async fn get(&self, key: &str) -> Option<Value> {
        match self.input(key) {
            Some(input) => Some(input.effective_value().await),
            None => None,
        }
    }

    /// Set the explicit value of `key`. Returns `false` (and changes
    /// nothing) if the form has no such input.
    pub fn set(&mut self, key: &str, value: Value) -> bool {
        match self.input_mut(key) {
            Some(input) => {
                input.set_value(value);
                true
            }
            None => {
                debug!(key, "ignoring value for unknown input");
                false
            }
        }
    }

    /// Drop the explicit value of `key`. Returns whether the key exists.
    pub fn reset(&mut self, key: &str) -> bool {
        match self.input_mut(key) {
            Some(input) => {
                input.reset();
                true
            }
            None => false,
        }
    }

    /// Apply every entry of `config` to the matching input.
    pub fn set_config(&mut self, config: &Map<String, Value>) {
        for (key, value) in config {
            self.set(key, value.clone());
        }
    }

    /// Apply a JSON value that should be an object.
    ///
    /// Anything other than an object (including `null`) leaves the form
    /// unchanged.
    pub fn apply(&mut self, config: &Value) {
        match config {
            Value::Object(map) => self.set_config(map),
            Value::Null => {}
            other => debug!(kind = json_kind(other), "ignoring non-object settings"),
        }
    }

    /// Effective values of every input, keyed by input key.
    pub async fn get_config(&self) -> Map<String, Value> {
        let values = join_all(self.inputs.iter().map(Input::effective_value)).await;
        self.inputs
            .iter()
            .map(|i| i.key.clone())
            .zip(values)
            .collect()
    }

    /// Export every input, in declaration order.
    pub async fn export(&self) -> Vec<ExportedInput> {
        join_all(self.inputs.iter().map(export_input)).await
    }

    /// [`export`](Self::export) as a JSON array for the wire.
    pub async fn export_value(&self) -> Value {
        let exported = self.export().await;
        serde_json::to_value(exported).unwrap_or_else(|_| Value::Array(Vec::new()))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// ConfigForm
// ---------------------------------------------------------------------------

/// Form template: an ordered list of descriptors.
#[derive(Debug, Clone, Default)]
pub struct ConfigForm {
    descriptors: Vec<InputDescriptor>,
}

impl ConfigForm {
    /// Create a template from descriptors.
    pub fn new(descriptors: Vec<InputDescriptor>) -> Self {
        Self { descriptors }
    }

    /// Create a template from static definitions.
    pub fn from_defs(defs: impl IntoIterator<Item = InputDef>) -> Self {
        Self::new(defs.into_iter().map(InputDescriptor::from).collect())
    }

    /// Parse a JSON array of definitions.
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        let defs: Vec<InputDef> = serde_json::from_str(json)?;
        Ok(Self::from_defs(defs))
    }

    /// The registered descriptors, including ones with unknown tags.
    pub fn descriptors(&self) -> &[InputDescriptor] {
        &self.descriptors
    }

    /// Build a fresh, independent form.
    ///
    /// Keys are unique within a form: only the first descriptor for a key
    /// is kept.
    pub fn get_form(&self) -> Form {
        let mut seen = HashSet::new();
        let inputs = self
            .descriptors
            .iter()
            .filter_map(|desc| {
                if seen.contains(desc.key.as_str()) {
                    debug!(key = %desc.key, "dropping input with duplicate key");
                    return None;
                }
                let input = Input::from_descriptor(desc);
                match &input {
                    Some(_) => {
                        seen.insert(desc.key.as_str());
                    }
                    None => {
                        debug!(key = %desc.key, input_type = %desc.input_type, "dropping input of unknown type");
                    }
                }
                input
            })
            .collect();
        Form { inputs }
    }
}

impl From<Vec<InputDescriptor>> for ConfigForm {
    fn from(descriptors: Vec<InputDescriptor>) -> Self {
        Self::new(descriptors)
    }
}
