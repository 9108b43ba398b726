//! Server-pushed event listeners.
//!
//! The server keeps the listener registry; the client only routes `event`
//! frames to the subscription that owns the listener id. Routes are installed
//! while the `addEventListener` reply is dispatched, so an event the server
//! pushes right behind that reply is never missed. Server registries live
//! per connection: after a reconnect every live route is registered again
//! and remapped onto the id the new connection assigns.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use super::{lock_ignore_poison, Inner, RpcClient};
use crate::protocol::RequestId;
use crate::{log_debug, log_warn, Result};

/// Handle returned from a successful `add_event_listener`.
///
/// Dropping the handle stops local delivery but does not unregister the
/// listener on the server; call [`RpcClient::remove_event_listener`] for that.
pub struct EventSubscription {
    // ---
    id: Arc<AtomicU64>,

    /// Payloads of `event` frames addressed to this listener.
    pub inbox: mpsc::UnboundedReceiver<Value>,
}

impl EventSubscription {
    /// Listener id assigned by the server.
    ///
    /// Changes when the listener is registered again after a reconnect.
    pub fn id(&self) -> u64 {
        self.id.load(Ordering::SeqCst)
    }
}

/// One entry of the server's `getEventListeners` reply.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerInfo<I> {
    pub id: u64,
    pub info: I,
}

/// Everything needed to deliver to, and re-register, one subscription.
pub(super) struct Route {
    event_name: String,
    info: Value,
    id: Arc<AtomicU64>,
    tx: mpsc::UnboundedSender<Value>,
}

impl Route {
    /// Arguments of the `addEventListener` request registering this route.
    pub fn params(&self) -> (&str, &Value) {
        (&self.event_name, &self.info)
    }
}

pub(super) struct EventListeners {
    // ---
    /// Confirmed routes, keyed by the server's listener id.
    routes: HashMap<u64, Route>,

    /// Routes waiting for the reply to their `addEventListener` request.
    staged: HashMap<RequestId, Route>,

    /// Like `staged`, for requests sent by `reregister_listeners`; nobody
    /// awaits these, so they are retried if the connection drops again.
    resuming: HashMap<RequestId, Route>,
}

impl EventListeners {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            staged: HashMap::new(),
            resuming: HashMap::new(),
        }
    }

    /// Park `route` until the reply to `request_id` names its listener id.
    pub fn stage(&mut self, request_id: RequestId, route: Route) {
        self.staged.insert(request_id, route);
    }

    /// Install the route staged for `request_id` under the id in `payload`.
    ///
    /// Returns false when nothing was staged for `request_id`.
    pub fn confirm(&mut self, request_id: RequestId, payload: &Value) -> bool {
        // ---
        let Some(route) = self
            .staged
            .remove(&request_id)
            .or_else(|| self.resuming.remove(&request_id))
        else {
            return false;
        };

        match payload.as_u64() {
            Some(id) => {
                route.id.store(id, Ordering::SeqCst);
                log_debug!("event listener {id} registered for {}", route.event_name);
                self.routes.insert(id, route);
            }
            None => log_warn!("addEventListener answered without a listener id: {payload}"),
        }
        true
    }

    /// Drop the route staged for `request_id`; its subscription inbox closes.
    pub fn unstage(&mut self, request_id: RequestId) -> bool {
        self.staged.remove(&request_id).is_some() || self.resuming.remove(&request_id).is_some()
    }

    /// Returns false when no live route exists for `id`.
    pub fn deliver(&mut self, id: u64, payload: Value) -> bool {
        // ---
        let Some(route) = self.routes.get(&id) else {
            return false;
        };

        if route.tx.send(payload).is_ok() {
            return true;
        }

        // Subscription handle dropped
        self.routes.remove(&id);
        false
    }

    pub fn remove(&mut self, id: u64) -> bool {
        self.routes.remove(&id).is_some()
    }

    /// Take every route to register again on a new connection.
    ///
    /// Confirmed routes and unanswered re-registrations are included;
    /// routes whose subscription handle was dropped are discarded.
    pub fn take_live(&mut self) -> Vec<Route> {
        self.routes
            .drain()
            .map(|(_, route)| route)
            .chain(self.resuming.drain().map(|(_, route)| route))
            .filter(|route| !route.tx.is_closed())
            .collect()
    }

    /// Put back a route that could not be re-registered, under its last id.
    pub fn restore(&mut self, route: Route) {
        self.routes.insert(route.id.load(Ordering::SeqCst), route);
    }

    pub fn clear(&mut self) {
        self.routes.clear();
        self.staged.clear();
        self.resuming.clear();
    }
}

impl Inner {
    // ---

    /// Register every live route again on a freshly opened connection.
    ///
    /// Replies are matched in `dispatch`, which remaps each route onto the
    /// listener id the new connection assigned.
    pub(super) async fn reregister_listeners(&self) {
        // ---
        let routes = lock_ignore_poison(&self.listeners).take_live();
        if routes.is_empty() {
            return;
        }

        let Some(outbox) = lock_ignore_poison(&self.outbox).clone() else {
            let mut listeners = lock_ignore_poison(&self.listeners);
            routes.into_iter().for_each(|route| listeners.restore(route));
            return;
        };

        log_debug!("re-registering {} event listener(s)", routes.len());

        let mut routes = routes.into_iter();
        while let Some(route) = routes.next() {
            let request_id = self.ids.next_id();
            let text = match self.encode(request_id, "addEventListener", &route.params()) {
                Ok(text) => text,
                Err(_err) => {
                    log_warn!("cannot re-register {}: {_err}", route.event_name);
                    lock_ignore_poison(&self.listeners).restore(route);
                    continue;
                }
            };

            lock_ignore_poison(&self.listeners)
                .resuming
                .insert(request_id, route);

            if outbox.send(text).await.is_err() {
                // Connection dropped again; the next reconnect picks these up
                let mut listeners = lock_ignore_poison(&self.listeners);
                routes.for_each(|route| listeners.restore(route));
                return;
            }
        }
    }
}

impl RpcClient {
    // ---

    /// Register a listener for `event_name` on the server.
    ///
    /// `info` is stored by the server alongside the listener and is what
    /// [`emit_event`](Self::emit_event) filters on. The listener is
    /// registered again automatically after every reconnect.
    ///
    /// # Errors
    ///
    /// Fails like [`send`](Self::send) does.
    pub async fn add_event_listener<I>(&self, event_name: &str, info: &I) -> Result<EventSubscription>
    where
        I: Serialize + ?Sized,
    {
        // ---
        let info = serde_json::to_value(info)?;
        let (tx, inbox) = mpsc::unbounded_channel();
        let id = Arc::new(AtomicU64::new(0));
        let route = Route {
            event_name: event_name.to_string(),
            info: info.clone(),
            id: id.clone(),
            tx,
        };

        let mut staged = None;
        let reply = self
            .inner
            .request(
                "addEventListener",
                &(event_name, &info),
                self.inner.config.request_timeout,
                |request_id| {
                    staged = Some(request_id);
                    lock_ignore_poison(&self.inner.listeners).stage(request_id, route);
                },
            )
            .await;

        let payload = match reply {
            Ok(payload) => payload,
            Err(err) => {
                if let Some(request_id) = staged {
                    lock_ignore_poison(&self.inner.listeners).unstage(request_id);
                }
                return Err(err);
            }
        };

        // The route was installed when the reply was dispatched
        let _: u64 = serde_json::from_value(payload)?;
        Ok(EventSubscription { id, inbox })
    }

    /// Unregister a listener on the server and stop local delivery.
    ///
    /// # Errors
    ///
    /// Fails like [`send`](Self::send) does. The local route is dropped only
    /// after the server confirmed the removal.
    pub async fn remove_event_listener(&self, id: u64) -> Result<()> {
        // ---
        let _: Value = self.send("removeEventListener", &[id]).await?;
        lock_ignore_poison(&self.inner.listeners).remove(id);
        Ok(())
    }

    /// Emit `data` to every `event_name` listener whose info passes `filter`.
    ///
    /// # Errors
    ///
    /// Fails like [`send`](Self::send) does, or with a serialization error if
    /// the listener infos do not deserialize into `I`.
    pub async fn emit_event<I, D, F>(&self, event_name: &str, filter: F, data: &D) -> Result<()>
    where
        I: DeserializeOwned,
        D: Serialize + ?Sized,
        F: Fn(&I) -> bool,
    {
        // ---
        let listeners: Vec<ListenerInfo<I>> =
            self.send("getEventListeners", &[event_name]).await?;

        let ids: Vec<u64> = listeners
            .iter()
            .filter(|listener| filter(&listener.info))
            .map(|listener| listener.id)
            .collect();

        let _: Value = self.send("emitEvent", &(ids, data)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    fn route(event_name: &str) -> (Route, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let route = Route {
            event_name: event_name.to_string(),
            info: json!({}),
            id: Arc::new(AtomicU64::new(0)),
            tx,
        };
        (route, rx)
    }

    #[test]
    fn test_confirm_installs_route_before_delivery() {
        // ---
        let mut listeners = EventListeners::new();
        let (route, mut rx) = route("Tick");
        let id = route.id.clone();

        listeners.stage(RequestId::from(4), route);
        assert!(!listeners.deliver(1, json!("early")));

        assert!(listeners.confirm(RequestId::from(4), &json!(1)));
        assert_eq!(id.load(Ordering::SeqCst), 1);

        assert!(listeners.deliver(1, json!("hello")));
        assert!(!listeners.deliver(2, json!("nobody")));
        assert_eq!(rx.try_recv().unwrap(), json!("hello"));
    }

    #[test]
    fn test_confirm_without_listener_id_drops_route() {
        // ---
        let mut listeners = EventListeners::new();
        let (route, mut rx) = route("Tick");

        listeners.stage(RequestId::from(0), route);
        assert!(listeners.confirm(RequestId::from(0), &json!("nope")));
        assert!(!listeners.confirm(RequestId::from(0), &json!(1)));

        // Route gone, so the subscription inbox is closed
        assert!(rx.try_recv().is_err());
        assert!(rx.is_closed());
    }

    #[test]
    fn test_unstage_closes_inbox() {
        // ---
        let mut listeners = EventListeners::new();
        let (route, rx) = route("Tick");

        listeners.stage(RequestId::from(9), route);
        assert!(listeners.unstage(RequestId::from(9)));
        assert!(!listeners.unstage(RequestId::from(9)));
        assert!(rx.is_closed());
    }

    #[test]
    fn test_take_live_skips_dropped_subscriptions() {
        // ---
        let mut listeners = EventListeners::new();
        let (kept, _rx) = route("Kept");
        let (dropped, dropped_rx) = route("Dropped");
        drop(dropped_rx);

        listeners.stage(RequestId::from(0), kept);
        listeners.stage(RequestId::from(1), dropped);
        listeners.confirm(RequestId::from(0), &json!(10));
        listeners.confirm(RequestId::from(1), &json!(11));

        let live = listeners.take_live();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].params().0, "Kept");
        assert!(!listeners.deliver(10, json!("old id")));
    }

    #[test]
    fn test_deliver_prunes_dropped_subscription() {
        // ---
        let mut listeners = EventListeners::new();
        let (route, rx) = route("Tick");
        listeners.stage(RequestId::from(3), route);
        listeners.confirm(RequestId::from(3), &json!(3));
        drop(rx);

        assert!(!listeners.deliver(3, json!(1)));
        assert!(!listeners.remove(3));
    }
}
