use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::events::{EventContext, ModelEvent};
use crate::value::Value;

type Handler<M> = Arc<dyn Fn(&mut EventContext<'_, M>) + Send + Sync>;

/// Ordered handler lists for one model type
pub struct ModelObserver<M> {
    model_name: &'static str,
    handlers: HashMap<ModelEvent, Vec<Handler<M>>>,
}

impl<M> ModelObserver<M> {
    pub fn new(model_name: &'static str) -> Self {
        Self {
            model_name,
            handlers: HashMap::new(),
        }
    }

    pub fn model_name(&self) -> &'static str {
        self.model_name
    }

    /// Register a handler; handlers run in registration order
    pub fn on<F>(&mut self, event: ModelEvent, handler: F) -> &mut Self
    where
        F: Fn(&mut EventContext<'_, M>) + Send + Sync + 'static,
    {
        self.handlers.entry(event).or_default().push(Arc::new(handler));
        self
    }

    pub fn handler_count(&self, event: ModelEvent) -> usize {
        self.handlers.get(&event).map_or(0, Vec::len)
    }

    pub fn clear(&mut self, event: ModelEvent) {
        self.handlers.remove(&event);
    }

    /// Run the handlers for `ctx.event`, stopping at the first cancel
    pub fn emit(&self, ctx: &mut EventContext<'_, M>) {
        let Some(handlers) = self.handlers.get(&ctx.event) else {
            return;
        };
        for handler in handlers {
            handler(ctx);
            if ctx.is_cancelled() {
                break;
            }
        }
    }

    /// Emit `event` and report whether the operation may go ahead
    pub fn emit_and_check(&self, event: ModelEvent, record: Option<&M>, key: Option<&Value>) -> bool {
        let mut ctx = EventContext::new(event, self.model_name);
        ctx.record = record;
        ctx.key = key;
        self.emit(&mut ctx);
        !ctx.is_cancelled()
    }
}

impl<M> fmt::Debug for ModelObserver<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<_> = self
            .handlers
            .iter()
            .map(|(event, handlers)| (event.name(), handlers.len()))
            .collect();
        counts.sort_unstable();
        f.debug_struct("ModelObserver")
            .field("model", &self.model_name)
            .field("handlers", &counts)
            .finish()
    }
}

/// Per-model observers, keyed by model type
#[derive(Default)]
pub struct ObserverManager {
    model_observers: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ObserverManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The observer for `M`, created on first use
    pub fn observe<M: 'static>(&mut self, model_name: &'static str) -> &mut ModelObserver<M> {
        let entry = self
            .model_observers
            .entry(TypeId::of::<M>())
            .or_insert_with(|| Box::new(ModelObserver::<M>::new(model_name)));
        match entry.downcast_mut::<ModelObserver<M>>() {
            Some(observer) => observer,
            // The map is keyed by TypeId, so the downcast cannot miss
            None => unreachable!("observer registered under a foreign TypeId"),
        }
    }

    pub fn get<M: 'static>(&self) -> Option<&ModelObserver<M>> {
        self.model_observers
            .get(&TypeId::of::<M>())?
            .downcast_ref::<ModelObserver<M>>()
    }

    pub fn has_observers_for<M: 'static>(&self) -> bool {
        self.model_observers.contains_key(&TypeId::of::<M>())
    }

    pub fn remove<M: 'static>(&mut self) -> bool {
        self.model_observers.remove(&TypeId::of::<M>()).is_some()
    }

    pub fn emit<M: 'static>(&self, ctx: &mut EventContext<'_, M>) {
        if let Some(observer) = self.get::<M>() {
            observer.emit(ctx);
        }
    }

    /// True when no handler cancelled; models without observers always pass
    pub fn emit_and_check<M: 'static>(
        &self,
        event: ModelEvent,
        record: Option<&M>,
        key: Option<&Value>,
    ) -> bool {
        self.get::<M>()
            .map_or(true, |observer| observer.emit_and_check(event, record, key))
    }
}

impl fmt::Debug for ObserverManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverManager")
            .field("models", &self.model_observers.len())
            .finish()
    }
}
