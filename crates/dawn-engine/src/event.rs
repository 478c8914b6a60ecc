//! Typed event bus with immediate and queued delivery.
//!
//! Any `'static` type can be an event. Listeners register per event type and
//! are called in registration order. Events are either delivered right away
//! with [`EventSystem::trigger`] or queued with [`EventSystem::queue`] and
//! delivered on the next [`EventSystem::update`].
//!
//! `update` works on two queues: it takes everything queued so far as the
//! processing batch, and anything queued while that batch is dispatched lands
//! in the fresh incoming queue for the following update. With a time budget,
//! undelivered events go back to the *front* of the incoming queue so order is
//! preserved.
//!
//! Listeners cannot borrow the event system while it dispatches to them.
//! Instead they receive an [`EventDispatch`] through which they can queue or
//! abort events and add or remove listeners; those changes apply once the
//! current dispatch finishes, in the order they were requested.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use dawn_engine::event::EventSystem;
//!
//! struct Scored(u32);
//!
//! let total = Rc::new(Cell::new(0));
//! let mut events = EventSystem::new();
//! let sink = total.clone();
//! events.add_listener(move |e: &Scored, _| sink.set(sink.get() + e.0));
//!
//! events.queue(Scored(10));
//! events.queue(Scored(5));
//! assert_eq!(total.get(), 0);
//!
//! assert!(events.update(None));
//! assert_eq!(total.get(), 15);
//! ```

use std::any::{type_name, Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

use crate::context::Subsystem;

// ---------------------------------------------------------------------------
// Built-in events
// ---------------------------------------------------------------------------

/// Asks the engine to leave its main loop after the current frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitEvent;

/// A chat-style text message, e.g. relayed from the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    /// Who sent the message.
    pub sender: String,
    /// Message body.
    pub message: String,
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

/// Handle returned by `add_listener`, used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type ListenerFn = Box<dyn FnMut(&dyn Any, &mut EventDispatch)>;

struct Listener {
    id: ListenerId,
    callback: ListenerFn,
}

/// A queue change requested through [`EventDispatch`].
enum Deferred {
    Queue(QueuedEvent),
    Abort {
        type_id: TypeId,
        name: &'static str,
        all_of_type: bool,
    },
}

struct QueuedEvent {
    type_id: TypeId,
    name: &'static str,
    payload: Box<dyn Any>,
}

impl QueuedEvent {
    fn new<E: Any>(event: E) -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            name: type_name::<E>(),
            payload: Box::new(event),
        }
    }
}

fn wrap<E: Any>(mut f: impl FnMut(&E, &mut EventDispatch) + 'static) -> ListenerFn {
    Box::new(move |event: &dyn Any, dispatch: &mut EventDispatch| {
        if let Some(event) = event.downcast_ref::<E>() {
            f(event, dispatch);
        }
    })
}

// ---------------------------------------------------------------------------
// EventDispatch
// ---------------------------------------------------------------------------

/// Deferred operations requested by listeners during a dispatch.
pub struct EventDispatch {
    next_listener: u64,
    queued: Vec<Deferred>,
    added: Vec<(TypeId, Listener)>,
    removed: Vec<ListenerId>,
}

impl EventDispatch {
    fn new(next_listener: u64) -> Self {
        Self {
            next_listener,
            queued: Vec::new(),
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// Queue an event for the next update.
    pub fn queue<E: Any>(&mut self, event: E) {
        self.queued.push(Deferred::Queue(QueuedEvent::new(event)));
    }

    /// Abort the oldest pending event of type `E` (or all of them) once the
    /// current dispatch finishes. See [`EventSystem::abort`].
    pub fn abort<E: Any>(&mut self, all_of_type: bool) {
        self.queued.push(Deferred::Abort {
            type_id: TypeId::of::<E>(),
            name: type_name::<E>(),
            all_of_type,
        });
    }

    /// Register a listener once the current dispatch finishes.
    pub fn add_listener<E: Any>(
        &mut self,
        f: impl FnMut(&E, &mut EventDispatch) + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.added.push((
            TypeId::of::<E>(),
            Listener {
                id,
                callback: wrap(f),
            },
        ));
        id
    }

    /// Remove a listener once the current dispatch finishes.
    pub fn remove_listener(&mut self, id: ListenerId) {
        self.removed.push(id);
    }
}

// ---------------------------------------------------------------------------
// EventSystem
// ---------------------------------------------------------------------------

/// Typed publish/subscribe bus.
#[derive(Default)]
pub struct EventSystem {
    listeners: HashMap<TypeId, Vec<Listener>>,
    incoming: VecDeque<QueuedEvent>,
    next_listener: u64,
}

impl EventSystem {
    /// Create an event system with no listeners and empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `f` for every event of type `E`.
    pub fn add_listener<E: Any>(
        &mut self,
        f: impl FnMut(&E, &mut EventDispatch) + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Listener {
                id,
                callback: wrap(f),
            });
        id
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        for list in self.listeners.values_mut() {
            if let Some(pos) = list.iter().position(|l| l.id == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Whether any listener is registered for `E`.
    pub fn has_listeners<E: Any>(&self) -> bool {
        self.listener_count::<E>() > 0
    }

    /// Number of listeners registered for `E`.
    pub fn listener_count<E: Any>(&self) -> usize {
        self.listeners.get(&TypeId::of::<E>()).map_or(0, Vec::len)
    }

    /// Deliver `event` to its listeners now, bypassing the queue.
    ///
    /// Returns `true` if at least one listener ran.
    pub fn trigger<E: Any>(&mut self, event: E) -> bool {
        let event = QueuedEvent::new(event);
        let mut dispatch = EventDispatch::new(self.next_listener);
        let handled = self.dispatch(&event, &mut dispatch);
        self.finish(dispatch);
        handled
    }

    /// Queue `event` for the next [`update`](Self::update).
    ///
    /// Returns whether a listener for `E` is currently registered. The event
    /// is queued either way.
    pub fn queue<E: Any>(&mut self, event: E) -> bool {
        self.incoming.push_back(QueuedEvent::new(event));
        self.has_listeners::<E>()
    }

    /// Remove the oldest pending event of type `E`, or every pending one when
    /// `all_of_type` is set. Returns `true` if anything was removed.
    pub fn abort<E: Any>(&mut self, all_of_type: bool) -> bool {
        self.abort_pending(TypeId::of::<E>(), type_name::<E>(), all_of_type)
    }

    fn abort_pending(&mut self, id: TypeId, name: &'static str, all_of_type: bool) -> bool {
        let before = self.incoming.len();
        if all_of_type {
            self.incoming.retain(|e| e.type_id != id);
        } else if let Some(pos) = self.incoming.iter().position(|e| e.type_id == id) {
            self.incoming.remove(pos);
        }
        let aborted = before - self.incoming.len();
        if aborted > 0 {
            tracing::debug!(event = name, aborted, "pending events aborted");
        }
        aborted > 0
    }

    /// Number of events waiting for the next update.
    pub fn pending_count(&self) -> usize {
        self.incoming.len()
    }

    /// Deliver every event queued before this call, in FIFO order.
    ///
    /// With `max_time`, stops once the budget is spent (checked after each
    /// event) and keeps the remainder at the front of the queue. Returns
    /// `true` if the whole batch was delivered.
    pub fn update(&mut self, max_time: Option<Duration>) -> bool {
        let start = Instant::now();
        let mut processing = std::mem::take(&mut self.incoming);
        let mut dispatch = EventDispatch::new(self.next_listener);

        while let Some(event) = processing.pop_front() {
            self.dispatch(&event, &mut dispatch);
            if max_time.is_some_and(|budget| start.elapsed() >= budget) {
                break;
            }
        }

        let complete = processing.is_empty();
        if !complete {
            tracing::debug!(
                remaining = processing.len(),
                "event budget exhausted; deferring the rest"
            );
            processing.append(&mut self.incoming);
            self.incoming = processing;
        }

        self.finish(dispatch);
        complete
    }

    fn dispatch(&mut self, event: &QueuedEvent, dispatch: &mut EventDispatch) -> bool {
        let Some(list) = self.listeners.get_mut(&event.type_id) else {
            tracing::trace!(event = event.name, "event has no listeners");
            return false;
        };
        for listener in list.iter_mut() {
            (listener.callback)(event.payload.as_ref(), dispatch);
        }
        !list.is_empty()
    }

    /// Apply everything listeners deferred during a dispatch.
    fn finish(&mut self, dispatch: EventDispatch) {
        let EventDispatch {
            next_listener,
            queued,
            added,
            removed,
        } = dispatch;

        self.next_listener = next_listener;
        for (type_id, listener) in added {
            self.listeners.entry(type_id).or_default().push(listener);
        }
        for id in removed {
            self.remove_listener(id);
        }
        for op in queued {
            match op {
                Deferred::Queue(event) => self.incoming.push_back(event),
                Deferred::Abort {
                    type_id,
                    name,
                    all_of_type,
                } => {
                    self.abort_pending(type_id, name, all_of_type);
                }
            }
        }
    }
}

impl Subsystem for EventSystem {
    fn name(&self) -> &'static str {
        "events"
    }

    fn shutdown(&mut self) {
        if !self.incoming.is_empty() {
            tracing::debug!(dropped = self.incoming.len(), "discarding undelivered events");
        }
        self.incoming.clear();
        self.listeners.clear();
    }
}

impl fmt::Debug for EventSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSystem")
            .field("listener_types", &self.listeners.len())
            .field("pending", &self.incoming.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
