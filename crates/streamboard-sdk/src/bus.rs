//! Message bus over a single raw channel.
//!
//! [`Bus`] turns one [`Transport`] into many independently addressable
//! logical channels with four primitives:
//!
//! - [`send`](Bus::send): fire-and-forget event.
//! - [`on`](Bus::on) / [`once`](Bus::once): additive subscriptions.
//! - [`handle`](Bus::handle) / [`handle_once`](Bus::handle_once): at most
//!   one call-responder per channel.
//! - [`invoke`](Bus::invoke): call/response matched by correlation id.
//!
//! [`prefix`](Bus::prefix) returns a view on the same shared registry whose
//! channel names are qualified with `scope/`. Views never copy state: every
//! registration is stored under its full name together with the scope that
//! owns it, so teardown through one view cannot touch another view's
//! registrations.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use streamboard_types::channel::{join_scope, scoped_name, strip_scope};
use streamboard_types::{BusConfig, Envelope, Inbound, response_channel};

use crate::error::{Result, SdkError};
use crate::transport::{InboundRx, Transport};

/// Subscriber callback. Receives the envelope's argument list.
pub type Listener = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Call-responder. Receives the argument list, resolves to the response.
pub type Handler = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Value> + Send + Sync>;

/// Identifies a subscription for [`Bus::remove_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Subscription {
    id: ListenerId,
    owner: Option<String>,
    once: bool,
    listener: Listener,
}

struct Registration {
    owner: Option<String>,
    once: bool,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    /// Full channel name -> subscribers in registration order.
    subscriptions: HashMap<String, Vec<Subscription>>,
    /// Full channel name -> the one responder.
    handlers: HashMap<String, Registration>,
    /// Response channel name -> resolver of the outstanding call.
    pending: HashMap<String, oneshot::Sender<Value>>,
    /// Set once the inbound side has ended; no response can arrive.
    closed: bool,
}

struct Shared {
    transport: Arc<dyn Transport>,
    endpoint: RwLock<Option<String>>,
    call_timeout: Option<Duration>,
    registry: Mutex<Registry>,
}

/// Handle to a message bus, or to a prefixed view of one.
///
/// Cloning is cheap and yields a handle to the same bus and scope.
#[derive(Clone)]
pub struct Bus {
    shared: Arc<Shared>,
    scope: Option<String>,
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("scope", &self.scope)
            .field("endpoint", &*self.shared.endpoint.read())
            .field("call_timeout", &self.shared.call_timeout)
            .finish_non_exhaustive()
    }
}

impl Bus {
    /// Create an unscoped bus over `transport` with default settings.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, &BusConfig::default())
    }

    /// Create an unscoped bus over `transport`.
    pub fn with_config(transport: Arc<dyn Transport>, config: &BusConfig) -> Self {
        debug!(
            endpoint = ?config.endpoint,
            call_timeout_secs = ?config.call_timeout_secs,
            "message bus created"
        );
        Self {
            shared: Arc::new(Shared {
                transport,
                endpoint: RwLock::new(config.endpoint.clone()),
                call_timeout: config.call_timeout(),
                registry: Mutex::new(Registry::default()),
            }),
            scope: None,
        }
    }

    /// Scope of this view, `None` for the unscoped bus.
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Return a view whose channel names are qualified with `scope/`.
    pub fn prefix(&self, scope: &str) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            scope: Some(join_scope(self.scope.as_deref(), scope)),
        }
    }

    /// Bind the bus to a remote endpoint identity.
    ///
    /// From then on, frames attributed to a different sender are dropped.
    /// Applies to every view of the bus.
    pub fn bind_endpoint(&self, endpoint: impl Into<String>) {
        *self.shared.endpoint.write() = Some(endpoint.into());
    }

    /// The endpoint identity the bus is bound to, if any.
    pub fn endpoint(&self) -> Option<String> {
        self.shared.endpoint.read().clone()
    }

    fn full_name(&self, channel: &str) -> String {
        scoped_name(self.scope.as_deref(), channel)
    }

    // -- Sending ------------------------------------------------------------

    /// Send a fire-and-forget event.
    pub fn send(&self, channel: &str, args: Vec<Value>) -> Result<()> {
        let full = self.full_name(channel);
        trace!(channel = %full, "send");
        self.shared.transport.post(Envelope::event(full, args))
    }

    /// Call the remote responder for `channel` and wait for its answer.
    ///
    /// Waits indefinitely unless the bus was configured with a call
    /// timeout, in which case an unanswered call fails with
    /// [`SdkError::NoResponse`].
    pub async fn invoke(&self, channel: &str, args: Vec<Value>) -> Result<Value> {
        self.call(channel, args, self.shared.call_timeout).await
    }

    /// Like [`invoke`](Self::invoke) with an explicit timeout for this call.
    pub async fn invoke_timeout(
        &self,
        channel: &str,
        args: Vec<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        self.call(channel, args, Some(timeout)).await
    }

    async fn call(
        &self,
        channel: &str,
        args: Vec<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let full = self.full_name(channel);
        let correlation_id = Uuid::new_v4().to_string();
        let reply_channel = response_channel(&full, &correlation_id);

        let (tx, rx) = oneshot::channel();
        {
            let mut registry = self.shared.registry.lock();
            if registry.closed {
                debug!(channel = %full, "invoke on closed bus");
                return Err(SdkError::ChannelClosed);
            }
            registry.pending.insert(reply_channel.clone(), tx);
        }

        debug!(channel = %full, correlation_id = %correlation_id, "invoke");
        if let Err(e) = self
            .shared
            .transport
            .post(Envelope::call(full.clone(), correlation_id, args))
        {
            self.shared.registry.lock().pending.remove(&reply_channel);
            return Err(e);
        }

        let Some(timeout) = timeout else {
            return rx.await.map_err(|_| SdkError::ChannelClosed);
        };
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(SdkError::ChannelClosed),
            Err(_) => {
                self.shared.registry.lock().pending.remove(&reply_channel);
                warn!(channel = %full, timeout_secs = timeout.as_secs(), "call timed out");
                Err(SdkError::NoResponse {
                    channel: full,
                    timeout,
                })
            }
        }
    }

    // -- Subscriptions ------------------------------------------------------

    /// Subscribe to every event on `channel`.
    pub fn on<F>(&self, channel: &str, listener: F) -> ListenerId
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.subscribe(channel, false, Arc::new(listener))
    }

    /// Subscribe to the next event on `channel` only.
    pub fn once<F>(&self, channel: &str, listener: F) -> ListenerId
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.subscribe(channel, true, Arc::new(listener))
    }

    fn subscribe(&self, channel: &str, once: bool, listener: Listener) -> ListenerId {
        let full = self.full_name(channel);
        let mut registry = self.shared.registry.lock();
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry
            .subscriptions
            .entry(full)
            .or_default()
            .push(Subscription {
                id,
                owner: self.scope.clone(),
                once,
                listener,
            });
        id
    }

    /// Remove one subscription owned by this view. Returns whether it existed.
    pub fn remove_listener(&self, channel: &str, id: ListenerId) -> bool {
        let full = self.full_name(channel);
        let mut registry = self.shared.registry.lock();
        let Some(subs) = registry.subscriptions.get_mut(&full) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|s| !(s.id == id && s.owner == self.scope));
        let removed = subs.len() != before;
        if subs.is_empty() {
            registry.subscriptions.remove(&full);
        }
        removed
    }

    /// Remove this view's subscriptions on `channel`, or on every channel.
    ///
    /// Subscriptions made through other views of the same bus are kept.
    pub fn remove_all_listeners(&self, channel: Option<&str>) {
        let mut registry = self.shared.registry.lock();
        match channel {
            Some(channel) => {
                let full = self.full_name(channel);
                if let Some(subs) = registry.subscriptions.get_mut(&full) {
                    subs.retain(|s| s.owner != self.scope);
                    if subs.is_empty() {
                        registry.subscriptions.remove(&full);
                    }
                }
            }
            None => {
                registry.subscriptions.retain(|_, subs| {
                    subs.retain(|s| s.owner != self.scope);
                    !subs.is_empty()
                });
            }
        }
    }

    // -- Handlers -----------------------------------------------------------

    /// Register the responder for calls on `channel`.
    ///
    /// Fails with [`SdkError::DuplicateHandler`] if the channel already has
    /// one.
    pub fn handle<F, Fut>(&self, channel: &str, handler: F) -> Result<()>
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        self.register_handler(channel, false, Arc::new(move |args| handler(args).boxed()))
    }

    /// Register a responder that answers a single call and then unregisters.
    pub fn handle_once<F, Fut>(&self, channel: &str, handler: F) -> Result<()>
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        self.register_handler(channel, true, Arc::new(move |args| handler(args).boxed()))
    }

    fn register_handler(&self, channel: &str, once: bool, handler: Handler) -> Result<()> {
        let full = self.full_name(channel);
        let mut registry = self.shared.registry.lock();
        if registry.handlers.contains_key(&full) {
            return Err(SdkError::DuplicateHandler(full));
        }
        registry.handlers.insert(
            full,
            Registration {
                owner: self.scope.clone(),
                once,
                handler,
            },
        );
        Ok(())
    }

    /// Remove this view's responder on `channel`, or all of its responders.
    pub fn remove_handler(&self, channel: Option<&str>) {
        let mut registry = self.shared.registry.lock();
        match channel {
            Some(channel) => {
                let full = self.full_name(channel);
                if registry
                    .handlers
                    .get(&full)
                    .is_some_and(|r| r.owner == self.scope)
                {
                    registry.handlers.remove(&full);
                }
            }
            None => registry.handlers.retain(|_, r| r.owner != self.scope),
        }
    }

    // -- Introspection ------------------------------------------------------

    /// Channels (relative to this view) with at least one subscription
    /// owned by this view.
    pub fn event_names(&self) -> Vec<String> {
        let registry = self.shared.registry.lock();
        let mut names: Vec<String> = registry
            .subscriptions
            .iter()
            .filter(|(_, subs)| subs.iter().any(|s| s.owner == self.scope))
            .filter_map(|(full, _)| strip_scope(self.scope.as_deref(), full).map(str::to_owned))
            .collect();
        names.sort();
        names
    }

    /// Number of subscriptions on `channel`, across all views.
    pub fn listener_count(&self, channel: &str) -> usize {
        let full = self.full_name(channel);
        self.shared
            .registry
            .lock()
            .subscriptions
            .get(&full)
            .map_or(0, Vec::len)
    }

    /// Channels (relative to this view) this view has a responder on.
    pub fn handler_names(&self) -> Vec<String> {
        let registry = self.shared.registry.lock();
        let mut names: Vec<String> = registry
            .handlers
            .iter()
            .filter(|(_, r)| r.owner == self.scope)
            .filter_map(|(full, _)| strip_scope(self.scope.as_deref(), full).map(str::to_owned))
            .collect();
        names.sort();
        names
    }

    /// Number of calls still waiting for a response, across all views.
    pub fn pending_calls(&self) -> usize {
        self.shared.registry.lock().pending.len()
    }

    // -- Dispatch -----------------------------------------------------------

    /// Whether a frame passes endpoint validation.
    ///
    /// Frames without a sender identity, and every frame on an unbound bus,
    /// are accepted.
    pub fn is_valid_request(&self, frame: &Inbound) -> bool {
        match (&*self.shared.endpoint.read(), &frame.sender) {
            (Some(endpoint), Some(sender)) => endpoint == sender,
            _ => true,
        }
    }

    /// Route one inbound frame.
    ///
    /// Resolves a pending call if the frame is its response; otherwise runs
    /// the channel's subscribers in registration order and, for calls, the
    /// channel's responder on a spawned task. Frames failing validation, or
    /// outside this view's scope, are dropped silently.
    pub fn dispatch(&self, frame: Inbound) {
        if !self.is_valid_request(&frame) {
            trace!(
                channel = %frame.envelope.channel,
                sender = ?frame.sender,
                "dropping frame from unexpected sender"
            );
            return;
        }
        let envelope = frame.envelope;
        if strip_scope(self.scope.as_deref(), &envelope.channel).is_none() {
            trace!(channel = %envelope.channel, scope = ?self.scope, "frame outside scope");
            return;
        }

        let (listeners, handler) = {
            let mut registry = self.shared.registry.lock();

            if let Some(resolver) = registry.pending.remove(&envelope.channel) {
                drop(registry);
                trace!(channel = %envelope.channel, "resolving call");
                if resolver.send(envelope.first_arg()).is_err() {
                    debug!(channel = %envelope.channel, "caller went away before response");
                }
                return;
            }

            let listeners: Vec<Listener> = match registry.subscriptions.get_mut(&envelope.channel)
            {
                Some(subs) => {
                    let listeners = subs.iter().map(|s| Arc::clone(&s.listener)).collect();
                    subs.retain(|s| !s.once);
                    if subs.is_empty() {
                        registry.subscriptions.remove(&envelope.channel);
                    }
                    listeners
                }
                None => Vec::new(),
            };

            let handler = if envelope.is_correlated() {
                let once = registry
                    .handlers
                    .get(&envelope.channel)
                    .map(|r| r.once);
                match once {
                    Some(true) => registry
                        .handlers
                        .remove(&envelope.channel)
                        .map(|r| r.handler),
                    Some(false) => registry
                        .handlers
                        .get(&envelope.channel)
                        .map(|r| Arc::clone(&r.handler)),
                    None => None,
                }
            } else {
                None
            };

            (listeners, handler)
        };

        for listener in &listeners {
            listener(&envelope.args);
        }

        match (handler, envelope.correlation_id) {
            (Some(handler), Some(correlation_id)) => {
                let transport = Arc::clone(&self.shared.transport);
                let channel = envelope.channel;
                let args = envelope.args;
                tokio::spawn(async move {
                    let value = handler(args).await;
                    let response = Envelope::response(&channel, &correlation_id, value);
                    if let Err(e) = transport.post(response) {
                        warn!(channel = %channel, error = %e, "failed to send response");
                    }
                });
            }
            (None, Some(correlation_id)) if listeners.is_empty() => {
                debug!(
                    channel = %envelope.channel,
                    correlation_id = %correlation_id,
                    "call with no handler left unanswered"
                );
            }
            _ => {}
        }
    }

    /// Mark the bus closed: outstanding calls fail with
    /// [`SdkError::ChannelClosed`], and so does every later call.
    pub fn close(&self) {
        let dropped = {
            let mut registry = self.shared.registry.lock();
            registry.closed = true;
            std::mem::take(&mut registry.pending)
        };
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "failing outstanding calls");
        }
    }

    /// Whether the inbound side has ended.
    pub fn is_closed(&self) -> bool {
        self.shared.registry.lock().closed
    }

    /// Spawn the dispatch loop over `inbound`.
    ///
    /// The loop ends when the receiver closes; the bus is then
    /// [closed](Self::close) since no response can arrive.
    pub fn listen(&self, mut inbound: InboundRx) -> JoinHandle<()> {
        let bus = self.clone();
        tokio::spawn(async move {
            while let Some(frame) = inbound.recv().await {
                bus.dispatch(frame);
            }
            debug!("inbound channel closed");
            bus.close();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn local_bus() -> (Bus, crate::transport::Endpoint) {
        let (left, right) = ChannelTransport::pair();
        (Bus::new(left.transport), right)
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&[Value]) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move |_: &[Value]| {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn send_prefixes_scoped_names() {
        let (bus, mut peer) = local_bus();
        bus.prefix("u1").send("setText", vec![json!("hi")]).unwrap();
        let frame = peer.inbound.recv().await.unwrap();
        assert_eq!(frame.envelope.channel, "u1/setText");
        assert_eq!(frame.envelope.args, vec![json!("hi")]);
        assert!(frame.envelope.correlation_id.is_none());
    }

    #[tokio::test]
    async fn subscriptions_are_additive() {
        let (bus, _peer) = local_bus();
        let (a, la) = counter();
        let (b, lb) = counter();
        bus.on("settings", la);
        bus.on("settings", lb);
        bus.dispatch(Inbound::anonymous(Envelope::event("settings", vec![])));
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn once_fires_a_single_time() {
        let (bus, _peer) = local_bus();
        let (count, listener) = counter();
        bus.once("pressDown", listener);
        for _ in 0..3 {
            bus.dispatch(Inbound::anonymous(Envelope::event("pressDown", vec![])));
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count("pressDown"), 0);
    }

    #[tokio::test]
    async fn second_handler_is_rejected() {
        let (bus, _peer) = local_bus();
        bus.handle("configForm", |_| async { json!([]) }).unwrap();
        let err = bus.handle("configForm", |_| async { json!([]) }).unwrap_err();
        assert!(matches!(err, SdkError::DuplicateHandler(ref c) if c == "configForm"));
        let err = bus
            .handle_once("configForm", |_| async { json!([]) })
            .unwrap_err();
        assert!(matches!(err, SdkError::DuplicateHandler(_)));
    }

    #[tokio::test]
    async fn remove_listener_by_id() {
        let (bus, _peer) = local_bus();
        let (count, listener) = counter();
        let id = bus.on("x", listener);
        assert!(bus.remove_listener("x", id));
        assert!(!bus.remove_listener("x", id));
        bus.dispatch(Inbound::anonymous(Envelope::event("x", vec![])));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unscoped_teardown_keeps_view_registrations() {
        let (bus, _peer) = local_bus();
        let view = bus.prefix("u1");
        let (global, lg) = counter();
        let (scoped, ls) = counter();
        bus.on("settings", lg);
        view.on("settings", ls);
        view.handle("stop", |_| async { json!(true) }).unwrap();
        bus.handle("ready", |_| async { json!(true) }).unwrap();

        bus.remove_all_listeners(None);
        bus.remove_handler(None);

        bus.dispatch(Inbound::anonymous(Envelope::event("settings", vec![])));
        bus.dispatch(Inbound::anonymous(Envelope::event("u1/settings", vec![])));
        assert_eq!(global.load(Ordering::SeqCst), 0);
        assert_eq!(scoped.load(Ordering::SeqCst), 1);
        assert_eq!(view.handler_names(), vec!["stop".to_string()]);
        assert!(bus.handler_names().is_empty());
    }

    #[tokio::test]
    async fn view_teardown_keeps_unscoped_registrations() {
        let (bus, _peer) = local_bus();
        let view = bus.prefix("u1");
        bus.on("u1/settings", |_| {});
        view.on("settings", |_| {});
        view.remove_all_listeners(Some("settings"));
        assert_eq!(bus.listener_count("u1/settings"), 1);
        assert_eq!(view.event_names(), Vec::<String>::new());
        assert_eq!(bus.event_names(), vec!["u1/settings".to_string()]);
    }

    #[tokio::test]
    async fn view_dispatch_ignores_foreign_scope() {
        let (bus, _peer) = local_bus();
        let view = bus.prefix("u1");
        let (count, listener) = counter();
        bus.on("u2/settings", listener);
        view.dispatch(Inbound::anonymous(Envelope::event("u2/settings", vec![])));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn bound_bus_drops_foreign_senders() {
        let (bus, _peer) = local_bus();
        bus.bind_endpoint("win-1");
        let (count, listener) = counter();
        bus.on("pressDown", listener);

        bus.dispatch(Inbound::from_sender("win-2", Envelope::event("pressDown", vec![])));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        bus.dispatch(Inbound::from_sender("win-1", Envelope::event("pressDown", vec![])));
        bus.dispatch(Inbound::anonymous(Envelope::event("pressDown", vec![])));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn bound_bus_never_answers_foreign_calls() {
        let (bus, mut peer) = local_bus();
        bus.bind_endpoint("win-1");
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        bus.handle("x", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            async { json!(true) }
        })
        .unwrap();

        bus.dispatch(Inbound::from_sender("win-2", Envelope::call("x", "c1", vec![])));
        let quiet = tokio::time::timeout(Duration::from_millis(50), peer.inbound.recv()).await;
        assert!(quiet.is_err(), "foreign call was answered");
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        bus.dispatch(Inbound::from_sender("win-1", Envelope::call("x", "c2", vec![])));
        let frame = peer.inbound.recv().await.unwrap();
        assert_eq!(frame.envelope.channel, "x-c2");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handler_answers_on_response_channel() {
        let (bus, mut peer) = local_bus();
        bus.handle("echo", |args| async move { json!(args) }).unwrap();
        bus.dispatch(Inbound::anonymous(Envelope::call(
            "echo",
            "c1",
            vec![json!(1), json!("two")],
        )));
        let frame = peer.inbound.recv().await.unwrap();
        assert_eq!(frame.envelope.channel, "echo-c1");
        assert_eq!(frame.envelope.correlation_id.as_deref(), Some("c1"));
        assert_eq!(frame.envelope.args, vec![json!([1, "two"])]);
    }

    #[tokio::test]
    async fn handle_once_unregisters_after_first_call() {
        let (bus, mut peer) = local_bus();
        bus.handle_once("stop", |_| async { json!(true) }).unwrap();
        bus.dispatch(Inbound::anonymous(Envelope::call("stop", "a", vec![])));
        assert!(bus.handler_names().is_empty());
        let frame = peer.inbound.recv().await.unwrap();
        assert_eq!(frame.envelope.channel, "stop-a");
        bus.handle("stop", |_| async { json!(false) }).unwrap();
    }

    #[tokio::test]
    async fn invoke_times_out_and_cleans_up() {
        let (left, _peer) = ChannelTransport::pair();
        let bus = Bus::new(left.transport);
        let err = bus
            .invoke_timeout("ready", vec![], Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::NoResponse { ref channel, .. } if channel == "ready"));
        assert_eq!(bus.pending_calls(), 0);
    }

    #[tokio::test]
    async fn invoke_fails_when_transport_is_gone() {
        let (left, peer) = ChannelTransport::pair();
        drop(peer);
        let bus = Bus::new(left.transport);
        let err = bus.invoke("ready", vec![]).await.unwrap_err();
        assert!(matches!(err, SdkError::Transport(_)));
        assert_eq!(bus.pending_calls(), 0);
    }

    #[tokio::test]
    async fn invoke_after_close_fails_fast() {
        let (left, mut peer) = ChannelTransport::pair();
        let bus = Bus::new(left.transport);
        let (inbound_tx, inbound_rx) = tokio::sync::mpsc::unbounded_channel();
        let listener = bus.listen(inbound_rx);
        drop(inbound_tx);
        listener.await.unwrap();

        assert!(bus.is_closed());
        let err = bus.invoke("ready", vec![]).await.unwrap_err();
        assert!(matches!(err, SdkError::ChannelClosed));
        assert_eq!(bus.pending_calls(), 0);
        assert!(peer.inbound.try_recv().is_err(), "nothing is posted once closed");
    }
}
