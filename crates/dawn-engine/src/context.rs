//! Subsystem coordinator.
//!
//! The [`Context`] owns every engine service (renderer, physics, scene, ...)
//! and hands them out by type. Services are kept in the order they were added
//! and torn down in reverse, so a subsystem may rely on anything registered
//! before it for its whole lifetime.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;

use crate::EngineError;

// ---------------------------------------------------------------------------
// Subsystem
// ---------------------------------------------------------------------------

/// A singleton engine service held by the [`Context`].
pub trait Subsystem: 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    /// Called right before the subsystem is dropped by the context.
    fn shutdown(&mut self) {}
}

trait ErasedSubsystem {
    fn subsystem_mut(&mut self) -> &mut dyn Subsystem;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<S: Subsystem> ErasedSubsystem for S {
    fn subsystem_mut(&mut self) -> &mut dyn Subsystem {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Typed registry of subsystems with ordered teardown.
///
/// ```
/// use dawn_engine::context::{Context, Subsystem};
///
/// struct Audio { volume: f32 }
/// impl Subsystem for Audio {}
///
/// let mut ctx = Context::new();
/// ctx.add_subsystem(Audio { volume: 0.5 }).unwrap();
///
/// assert_eq!(ctx.subsystem::<Audio>().map(|a| a.volume), Some(0.5));
/// assert!(ctx.add_subsystem(Audio { volume: 1.0 }).is_err());
/// ```
#[derive(Default)]
pub struct Context {
    subsystems: HashMap<TypeId, Box<dyn ErasedSubsystem>>,
    /// Addition order. Entries stay put while a subsystem is lent out by
    /// [`with_subsystem`](Self::with_subsystem).
    order: Vec<(TypeId, &'static str)>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subsystem` and return a reference to it.
    ///
    /// # Errors
    ///
    /// [`EngineError::DuplicateSubsystem`] if one of type `T` is registered.
    pub fn add_subsystem<T: Subsystem>(&mut self, subsystem: T) -> Result<&mut T, EngineError> {
        let id = TypeId::of::<T>();
        let name = subsystem.name();
        if self.order.iter().any(|&(existing, _)| existing == id) {
            return Err(EngineError::DuplicateSubsystem { name });
        }

        self.order.push((id, name));
        let slot = self.subsystems.entry(id).or_insert(Box::new(subsystem));
        tracing::info!(subsystem = name, "subsystem added");

        match slot.as_any_mut().downcast_mut::<T>() {
            Some(subsystem) => Ok(subsystem),
            None => unreachable!("subsystem slot holds a different type"),
        }
    }

    /// The subsystem of type `T`, or `None` if absent.
    pub fn subsystem<T: Subsystem>(&self) -> Option<&T> {
        self.subsystems
            .get(&TypeId::of::<T>())?
            .as_any()
            .downcast_ref::<T>()
    }

    /// Mutable access to the subsystem of type `T`.
    pub fn subsystem_mut<T: Subsystem>(&mut self) -> Option<&mut T> {
        self.subsystems
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// Whether a subsystem of type `T` is registered.
    pub fn has_subsystem<T: Subsystem>(&self) -> bool {
        self.order.iter().any(|&(id, _)| id == TypeId::of::<T>())
    }

    /// Shut down and drop the subsystem of type `T`. Returns `false` if none
    /// was registered.
    pub fn remove_subsystem<T: Subsystem>(&mut self) -> bool {
        self.take_subsystem::<T>().is_some()
    }

    /// Unregister the subsystem of type `T` and hand it back after calling
    /// its `shutdown` hook.
    pub fn take_subsystem<T: Subsystem>(&mut self) -> Option<T> {
        let id = TypeId::of::<T>();
        let mut boxed = self.subsystems.remove(&id)?;
        self.order.retain(|&(existing, _)| existing != id);
        boxed.subsystem_mut().shutdown();
        tracing::info!(subsystem = type_name::<T>(), "subsystem removed");
        boxed.into_any().downcast::<T>().ok().map(|b| *b)
    }

    /// Shut down and drop every subsystem, newest first.
    pub fn clear_subsystems(&mut self) {
        while let Some((id, name)) = self.order.pop() {
            if let Some(mut subsystem) = self.subsystems.remove(&id) {
                subsystem.subsystem_mut().shutdown();
                drop(subsystem);
                tracing::info!(subsystem = name, "subsystem removed");
            }
        }
    }

    /// Lend the subsystem of type `T` out of the context so `f` can use it
    /// alongside the rest of the context. While lent, `T` itself is not
    /// reachable through the context.
    ///
    /// If `f` clears the context (or clears it and registers a new `T`), the
    /// lent subsystem is shut down once `f` returns instead of being put back.
    ///
    /// Returns `None` if `T` is not registered.
    pub fn with_subsystem<T: Subsystem, R>(
        &mut self,
        f: impl FnOnce(&mut T, &mut Context) -> R,
    ) -> Option<R> {
        let id = TypeId::of::<T>();
        let mut boxed = self.subsystems.remove(&id)?;
        let result = boxed.as_any_mut().downcast_mut::<T>().map(|t| f(t, self));
        // A clear inside `f` drops the order entry; a re-add fills the slot.
        if self.has_subsystem::<T>() && !self.subsystems.contains_key(&id) {
            self.subsystems.insert(id, boxed);
        } else {
            let subsystem = boxed.subsystem_mut();
            subsystem.shutdown();
            tracing::info!(subsystem = subsystem.name(), "subsystem removed");
        }
        result
    }

    /// Subsystem names in addition order.
    pub fn names(&self) -> Vec<&'static str> {
        self.order.iter().map(|&(_, name)| name).collect()
    }

    /// Number of registered subsystems.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no subsystems are registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.clear_subsystems();
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("subsystems", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    #[derive(Debug)]
    struct A(Log);
    #[derive(Debug)]
    struct B(Log);
    #[derive(Debug)]
    struct C(Log);

    impl Subsystem for A {
        fn name(&self) -> &'static str {
            "A"
        }
        fn shutdown(&mut self) {
            self.0.borrow_mut().push("A");
        }
    }

    impl Subsystem for B {
        fn name(&self) -> &'static str {
            "B"
        }
        fn shutdown(&mut self) {
            self.0.borrow_mut().push("B");
        }
    }

    impl Subsystem for C {
        fn name(&self) -> &'static str {
            "C"
        }
        fn shutdown(&mut self) {
            self.0.borrow_mut().push("C");
        }
    }

    fn abc(log: &Log) -> Context {
        let mut ctx = Context::new();
        ctx.add_subsystem(A(log.clone())).unwrap();
        ctx.add_subsystem(B(log.clone())).unwrap();
        ctx.add_subsystem(C(log.clone())).unwrap();
        ctx
    }

    #[test]
    fn teardown_is_reverse_of_addition() {
        let log = Log::default();
        let mut ctx = abc(&log);
        assert_eq!(ctx.names(), vec!["A", "B", "C"]);

        ctx.clear_subsystems();
        assert_eq!(*log.borrow(), vec!["C", "B", "A"]);
        assert!(ctx.is_empty());
    }

    #[test]
    fn drop_clears_in_reverse() {
        let log = Log::default();
        drop(abc(&log));
        assert_eq!(*log.borrow(), vec!["C", "B", "A"]);
    }

    #[test]
    fn duplicate_is_rejected() {
        let log = Log::default();
        let mut ctx = Context::new();
        ctx.add_subsystem(A(log.clone())).unwrap();
        let err = ctx.add_subsystem(A(log.clone())).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateSubsystem { name: "A" }));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn absent_lookup_is_none() {
        let ctx = Context::new();
        assert!(ctx.subsystem::<A>().is_none());
        assert!(!ctx.has_subsystem::<A>());
    }

    #[test]
    fn remove_drops_from_map_and_order() {
        let log = Log::default();
        let mut ctx = abc(&log);
        assert!(ctx.remove_subsystem::<B>());
        assert!(!ctx.remove_subsystem::<B>());
        assert_eq!(ctx.names(), vec!["A", "C"]);
        assert_eq!(*log.borrow(), vec!["B"]);

        ctx.clear_subsystems();
        assert_eq!(*log.borrow(), vec!["B", "C", "A"]);
    }

    #[test]
    fn with_subsystem_lends_and_restores() {
        struct Counter(u32);
        impl Subsystem for Counter {}

        let log = Log::default();
        let mut ctx = Context::new();
        ctx.add_subsystem(Counter(0)).unwrap();
        ctx.add_subsystem(A(log)).unwrap();

        let seen = ctx.with_subsystem::<Counter, _>(|counter, rest| {
            counter.0 += 1;
            assert!(rest.subsystem::<Counter>().is_none());
            rest.subsystem::<A>().is_some()
        });
        assert_eq!(seen, Some(true));
        assert_eq!(ctx.subsystem::<Counter>().map(|c| c.0), Some(1));
        assert!(ctx.names()[0].ends_with("Counter"));
    }

    #[test]
    fn clearing_while_lent_still_shuts_down_lent_subsystem() {
        let log = Log::default();
        let mut ctx = abc(&log);

        ctx.with_subsystem::<B, _>(|_, rest| rest.clear_subsystems());

        assert_eq!(*log.borrow(), vec!["C", "A", "B"]);
        assert!(ctx.is_empty());
        assert!(ctx.subsystem::<B>().is_none());

        drop(ctx);
        assert_eq!(log.borrow().len(), 3);
    }
}
