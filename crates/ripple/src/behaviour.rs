//! Behaviours
//!
//! A behaviour is a node holding a current value of some type plus a change
//! event. The engine relies on semantic equality of values to suppress no-op
//! updates, so behaviour payloads carry the [`Value`] bound; plain data gets
//! it for free from structural equality.

use std::fmt;
use std::rc::Rc;

use crate::event::Event;

/// Payload constraint for behaviour values.
///
/// Blanket-implemented: any clonable, comparable, owned type qualifies.
pub trait Value: Clone + PartialEq + 'static {}

impl<T: Clone + PartialEq + 'static> Value for T {}

/// A node exposing a current value and a change signal
pub trait Behaviour<T: Value> {
    /// Current value; stable between waves. During a wave the post-resolution
    /// value is visible only once the node itself has resolved.
    fn value(&self) -> T;

    /// Event that fires in every wave where this behaviour's value changed
    fn change(&self) -> Event;
}

/// Shared handle to a behaviour.
///
/// Compares by node identity, which makes behaviours themselves usable as
/// behaviour payloads (the shape `join` collapses).
pub struct BehaviourRef<T: Value> {
    inner: Rc<dyn Behaviour<T>>,
}

impl<T: Value> BehaviourRef<T> {
    pub(crate) fn new(inner: Rc<dyn Behaviour<T>>) -> Self {
        Self { inner }
    }

    pub fn value(&self) -> T {
        self.inner.value()
    }

    pub fn change(&self) -> Event {
        self.inner.change()
    }
}

impl<T: Value> Clone for BehaviourRef<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Value> PartialEq for BehaviourRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Value> fmt::Debug for BehaviourRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BehaviourRef({:p})", Rc::as_ptr(&self.inner))
    }
}

impl<T: Value> Behaviour<T> for BehaviourRef<T> {
    fn value(&self) -> T {
        self.inner.value()
    }

    fn change(&self) -> Event {
        self.inner.change()
    }
}

struct Constant<T: Value> {
    value: T,
}

impl<T: Value> Behaviour<T> for Constant<T> {
    fn value(&self) -> T {
        self.value.clone()
    }

    fn change(&self) -> Event {
        Event::never()
    }
}

/// A behaviour that always holds `value` and never fires
pub fn constant<T: Value>(value: T) -> BehaviourRef<T> {
    BehaviourRef::new(Rc::new(Constant { value }))
}

/// Clonable function handle comparable by identity.
///
/// Lets function-valued behaviours satisfy the [`Value`] bound; two handles
/// are equal only when they share the same underlying closure.
pub struct Func<S, R> {
    f: Rc<dyn Fn(&S) -> R>,
}

impl<S: 'static, R: 'static> Func<S, R> {
    pub fn new(f: impl Fn(&S) -> R + 'static) -> Self {
        Self { f: Rc::new(f) }
    }

    pub fn call(&self, arg: &S) -> R {
        (self.f)(arg)
    }
}

impl<S, R> Clone for Func<S, R> {
    fn clone(&self) -> Self {
        Self { f: self.f.clone() }
    }
}

impl<S, R> PartialEq for Func<S, R> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.f, &other.f)
    }
}

impl<S, R> fmt::Debug for Func<S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Func({:p})", Rc::as_ptr(&self.f))
    }
}
