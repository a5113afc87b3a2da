//! Listener lists for render-ready values
//!
//! Controllers publish each frame's value through an [`Emitter`]. Listeners
//! are called with no emitter borrow held, so a listener may subscribe or
//! unsubscribe (itself included) while being notified.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

/// Identifies one listener on an [`Emitter`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<T> = Rc<dyn Fn(&T)>;

pub struct Emitter<T> {
    listeners: RefCell<SmallVec<[(ListenerId, Listener<T>); 2]>>,
    next_id: Cell<u64>,
}

impl<T> Emitter<T> {
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(SmallVec::new()),
            next_id: Cell::new(0),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&T) + 'static,
    {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener; returns false if it was already gone
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn emit(&self, value: &T) {
        let snapshot: SmallVec<[Listener<T>; 2]> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(value);
        }
    }

    pub fn clear(&self) {
        // Dropped outside the borrow: a listener may own things that emit
        let drained: SmallVec<[(ListenerId, Listener<T>); 2]> =
            self.listeners.borrow_mut().drain(..).collect();
        drop(drained);
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }
}

impl<T> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_reaches_all_listeners() {
        let emitter = Emitter::<i32>::new();
        let sum = Rc::new(Cell::new(0));

        for _ in 0..3 {
            let sum = Rc::clone(&sum);
            emitter.subscribe(move |v| sum.set(sum.get() + v));
        }
        emitter.emit(&2);
        assert_eq!(sum.get(), 6);
    }

    #[test]
    fn test_unsubscribe() {
        let emitter = Emitter::<i32>::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let id = emitter.subscribe(move |_| counter.set(counter.get() + 1));

        emitter.emit(&0);
        assert!(emitter.unsubscribe(id));
        assert!(!emitter.unsubscribe(id));
        emitter.emit(&0);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself() {
        let emitter = Rc::new(Emitter::<i32>::new());
        let own_id = Rc::new(Cell::new(None));

        let weak = Rc::downgrade(&emitter);
        let slot = Rc::clone(&own_id);
        let id = emitter.subscribe(move |_| {
            if let (Some(emitter), Some(id)) = (weak.upgrade(), slot.get()) {
                emitter.unsubscribe(id);
            }
        });
        own_id.set(Some(id));

        emitter.emit(&1);
        assert!(emitter.is_empty());
    }
}
