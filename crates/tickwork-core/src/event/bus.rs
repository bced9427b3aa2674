// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::envelope::{validate, EventEnvelope};
use super::Event;
use crate::error::{EventError, RegistrationError};
use crate::isolate::{contained, FailureKind};
use std::any::{self, Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

type Handler = Box<dyn Fn(&dyn Any) -> anyhow::Result<()>>;

/// Identity of a registered [`Subscriber`], derived from its allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

impl SubscriberId {
    fn of<S>(subscriber: &Rc<S>) -> Self {
        Self(Rc::as_ptr(subscriber) as *const () as usize)
    }
}

/// Identifies a listener added with [`EventBus::listen`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    id: u64,
    type_id: TypeId,
}

/// An object that declares the events it wants to receive.
///
/// Interest is declared explicitly in [`subscribe`](Subscriber::subscribe);
/// nothing is discovered at runtime. The bus only keeps a weak reference to the
/// subscriber, so dropping the last `Rc` silently retires its listeners.
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use tickwork_core::event::{EventBus, Subscriber, Subscriptions};
///
/// struct TickLogger { seen: Cell<u32> }
/// struct Tick;
///
/// impl Subscriber for TickLogger {
///     fn subscribe(&self, subs: &mut Subscriptions<Self>) {
///         subs.on::<Tick, _>(0, |this, _| {
///             this.seen.set(this.seen.get() + 1);
///             Ok(())
///         });
///     }
/// }
///
/// let bus = EventBus::new();
/// let logger = Rc::new(TickLogger { seen: Cell::new(0) });
/// bus.register(&logger).unwrap();
/// bus.publish(&Tick).unwrap();
/// assert_eq!(logger.seen.get(), 1);
/// ```
pub trait Subscriber: Sized + 'static {
    /// Declares every (event type, handler, priority) this subscriber wants.
    fn subscribe(&self, subs: &mut Subscriptions<Self>);
}

struct PendingListener {
    type_id: TypeId,
    priority: i32,
    label: String,
    handler: Handler,
}

/// Collects the listeners a [`Subscriber`] declares during registration.
pub struct Subscriptions<S> {
    subscriber: Weak<S>,
    pending: Vec<PendingListener>,
}

impl<S: 'static> Subscriptions<S> {
    fn new(subscriber: Weak<S>) -> Self {
        Self {
            subscriber,
            pending: Vec::new(),
        }
    }

    /// Registers `handler` for events of type `E`.
    ///
    /// Lower `priority` values run first; equal priorities run in declaration order.
    pub fn on<E, F>(&mut self, priority: i32, handler: F) -> &mut Self
    where
        E: Event,
        F: Fn(&S, &E) -> anyhow::Result<()> + 'static,
    {
        let subscriber = self.subscriber.clone();
        let erased: Handler = Box::new(move |event| {
            let (Some(this), Some(event)) = (subscriber.upgrade(), event.downcast_ref::<E>())
            else {
                return Ok(());
            };
            handler(&this, event)
        });

        self.pending.push(PendingListener {
            type_id: TypeId::of::<E>(),
            priority,
            label: format!("{}<{}>", any::type_name::<S>(), any::type_name::<E>()),
            handler: erased,
        });
        self
    }
}

struct Listener {
    id: u64,
    priority: i32,
    label: String,
    active: Cell<bool>,
    owner: Option<Weak<dyn Any>>,
    handler: Handler,
}

impl Listener {
    fn is_live(&self) -> bool {
        self.active.get()
            && self
                .owner
                .as_ref()
                .map_or(true, |owner| owner.strong_count() > 0)
    }
}

struct SubscriberEntry {
    name: &'static str,
    alive: Weak<dyn Any>,
    listeners: Vec<(TypeId, u64)>,
}

/// Listener lists are copy-on-write: a dispatch holds an `Rc` to the list it
/// started with, and any mutation during that dispatch clones the list.
type ListenerList = Rc<Vec<Rc<Listener>>>;

#[derive(Default)]
struct Registry {
    by_type: HashMap<TypeId, ListenerList>,
    subscribers: HashMap<SubscriberId, SubscriberEntry>,
    next_id: u64,
}

impl Registry {
    fn insert(&mut self, type_id: TypeId, listener: Listener) {
        let list = Rc::make_mut(self.by_type.entry(type_id).or_default());
        let position = list.partition_point(|other| other.priority <= listener.priority);
        list.insert(position, Rc::new(listener));
    }

    fn remove(&mut self, type_id: TypeId, id: u64) -> bool {
        let Some(list) = self.by_type.get_mut(&type_id) else {
            return false;
        };
        let Some(position) = list.iter().position(|listener| listener.id == id) else {
            return false;
        };
        list[position].active.set(false);
        Rc::make_mut(list).remove(position);
        if list.is_empty() {
            self.by_type.remove(&type_id);
        }
        true
    }

    fn drop_subscriber(&mut self, id: SubscriberId) -> Option<SubscriberEntry> {
        let entry = self.subscribers.remove(&id)?;
        for &(type_id, listener_id) in &entry.listeners {
            self.remove(type_id, listener_id);
        }
        Some(entry)
    }

    /// Forgets subscribers whose last strong reference is gone.
    fn prune_dead(&mut self) {
        let dead: Vec<SubscriberId> = self
            .subscribers
            .iter()
            .filter(|(_, entry)| entry.alive.strong_count() == 0)
            .map(|(id, _)| *id)
            .collect();

        for id in dead {
            if let Some(entry) = self.drop_subscriber(id) {
                log::debug!("EventBus: pruned dropped subscriber {}", entry.name);
            }
        }
    }
}

struct BusInner {
    registry: RefCell<Registry>,
    failures: Cell<u64>,
}

/// Synchronous, single-threaded publish/subscribe bus.
///
/// `publish` runs every listener of the event's exact type before returning.
/// Listeners may publish, register or unregister re-entrantly: nested
/// publishes complete depth-first before the outer dispatch moves on, and
/// registry changes never disturb a dispatch already in progress.
#[derive(Clone)]
pub struct EventBus {
    inner: Rc<BusInner>,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        log::debug!("EventBus initialized.");
        Self {
            inner: Rc::new(BusInner {
                registry: RefCell::new(Registry::default()),
                failures: Cell::new(0),
            }),
        }
    }

    /// Registers every listener `subscriber` declares.
    ///
    /// ## Arguments
    /// * `subscriber` - The subscriber; the bus only keeps a weak reference to it.
    ///
    /// ## Returns
    /// The [`SubscriberId`] identifying this registration.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::Duplicate`] if this subscriber is already registered.
    pub fn register<S: Subscriber>(
        &self,
        subscriber: &Rc<S>,
    ) -> Result<SubscriberId, RegistrationError> {
        let id = SubscriberId::of(subscriber);
        let name = any::type_name::<S>();
        {
            let mut registry = self.inner.registry.borrow_mut();
            registry.prune_dead();
            if registry.subscribers.contains_key(&id) {
                return Err(RegistrationError::Duplicate { subscriber: name });
            }
        }

        // Runs user code, so no borrow may be held here.
        let mut subs = Subscriptions::new(Rc::downgrade(subscriber));
        subscriber.subscribe(&mut subs);

        let alive: Weak<dyn Any> = Rc::downgrade(subscriber) as Weak<dyn Any>;
        let mut registry = self.inner.registry.borrow_mut();
        let mut listeners = Vec::with_capacity(subs.pending.len());
        for pending in subs.pending {
            registry.next_id += 1;
            let listener_id = registry.next_id;
            listeners.push((pending.type_id, listener_id));
            registry.insert(
                pending.type_id,
                Listener {
                    id: listener_id,
                    priority: pending.priority,
                    label: pending.label,
                    active: Cell::new(true),
                    owner: Some(alive.clone()),
                    handler: pending.handler,
                },
            );
        }

        log::debug!(
            "EventBus: registered {} ({} listeners)",
            name,
            listeners.len()
        );
        registry.subscribers.insert(
            id,
            SubscriberEntry {
                name,
                alive,
                listeners,
            },
        );
        Ok(id)
    }

    /// Removes every listener owned by `subscriber`.
    ///
    /// Returns `false` if it was not registered.
    pub fn unregister<S: Subscriber>(&self, subscriber: &Rc<S>) -> bool {
        let entry = self
            .inner
            .registry
            .borrow_mut()
            .drop_subscriber(SubscriberId::of(subscriber));
        match entry {
            Some(entry) => {
                log::debug!("EventBus: unregistered {}", entry.name);
                true
            }
            None => false,
        }
    }

    /// Returns `true` if `subscriber` is currently registered.
    pub fn is_registered<S: Subscriber>(&self, subscriber: &Rc<S>) -> bool {
        self.inner
            .registry
            .borrow()
            .subscribers
            .contains_key(&SubscriberId::of(subscriber))
    }

    /// Adds a free-standing listener for events of type `E`.
    ///
    /// ## Arguments
    /// * `priority` - Lower values run first; ties run in registration order.
    /// * `label` - Name used in failure logs.
    /// * `handler` - Called with each published `E`.
    ///
    /// ## Returns
    /// A handle to pass to [`remove`](Self::remove).
    pub fn listen<E, F>(&self, priority: i32, label: impl Into<String>, handler: F) -> ListenerHandle
    where
        E: Event,
        F: Fn(&E) -> anyhow::Result<()> + 'static,
    {
        let erased: Handler = Box::new(move |event| match event.downcast_ref::<E>() {
            Some(event) => handler(event),
            None => Ok(()),
        });

        let type_id = TypeId::of::<E>();
        let mut registry = self.inner.registry.borrow_mut();
        registry.prune_dead();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.insert(
            type_id,
            Listener {
                id,
                priority,
                label: label.into(),
                active: Cell::new(true),
                owner: None,
                handler: erased,
            },
        );
        ListenerHandle { id, type_id }
    }

    /// Removes a listener added with [`listen`](Self::listen).
    pub fn remove(&self, handle: ListenerHandle) -> bool {
        self.inner
            .registry
            .borrow_mut()
            .remove(handle.type_id, handle.id)
    }

    /// Publishes `event` to every listener of type `E`.
    ///
    /// Listener failures are logged and counted, never returned.
    ///
    /// ## Arguments
    /// * `event` - The event; only listeners of its exact type receive it.
    ///
    /// ## Returns
    /// How many listeners were invoked.
    ///
    /// # Errors
    ///
    /// [`EventError`] if `event` can never be a valid event.
    pub fn publish<E: Event>(&self, event: &E) -> Result<usize, EventError> {
        let type_name = any::type_name::<E>();
        validate(event, type_name)?;
        Ok(self.dispatch(event, TypeId::of::<E>(), type_name))
    }

    /// Publishes a type-erased event.
    pub fn publish_envelope(&self, envelope: &EventEnvelope) -> usize {
        self.dispatch(envelope.payload(), envelope.type_id(), envelope.type_name())
    }

    fn dispatch(&self, event: &dyn Any, type_id: TypeId, type_name: &'static str) -> usize {
        let snapshot = match self.inner.registry.borrow().by_type.get(&type_id) {
            Some(list) => Rc::clone(list),
            None => {
                log::trace!("EventBus: no listeners for {type_name}");
                return 0;
            }
        };

        let mut invoked = 0;
        for listener in snapshot.iter() {
            if !listener.is_live() {
                continue;
            }
            invoked += 1;
            let failure = contained(FailureKind::Listener, &listener.label, Some(type_name), || {
                (listener.handler)(event)
            });
            if failure.is_some() {
                self.inner.failures.set(self.inner.failures.get() + 1);
            }
        }
        invoked
    }

    /// Number of live listeners for `E`.
    pub fn listener_count<E: Event>(&self) -> usize {
        self.inner
            .registry
            .borrow()
            .by_type
            .get(&TypeId::of::<E>())
            .map_or(0, |list| list.iter().filter(|l| l.is_live()).count())
    }

    /// Number of registered subscribers, including ones dropped but not yet pruned.
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.borrow().subscribers.len()
    }

    /// Total listener failures contained since creation.
    pub fn failure_count(&self) -> u64 {
        self.inner.failures.get()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.inner.registry.borrow();
        f.debug_struct("EventBus")
            .field("event_types", &registry.by_type.len())
            .field("subscribers", &registry.subscribers.len())
            .field("failures", &self.inner.failures.get())
            .finish()
    }
}
