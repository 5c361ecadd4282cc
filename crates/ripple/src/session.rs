//! Proxy sessions
//!
//! A session aggregates detach callbacks for a group of proxies. Destroying
//! it runs every callback once, in registration order, and leaves the
//! session dead: further registrations are a misuse error.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::lifespan::Lifespan;

struct SessionCore {
    callbacks: RefCell<Vec<Box<dyn FnOnce()>>>,
    destroyed: Cell<bool>,
}

impl SessionCore {
    fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        let callbacks = self.callbacks.take();
        debug!(detached = callbacks.len(), "session destroyed");
        for callback in callbacks {
            callback();
        }
    }
}

/// A group of detach callbacks with a shared lifetime
#[derive(Clone)]
pub struct Session {
    core: Rc<SessionCore>,
}

impl Session {
    /// Create a session that is destroyed when `lifespan` is disposed
    pub fn new(lifespan: &Rc<dyn Lifespan>) -> Result<Self> {
        let session = Self {
            core: Rc::new(SessionCore {
                callbacks: RefCell::new(Vec::new()),
                destroyed: Cell::new(false),
            }),
        };
        let core = session.core.clone();
        lifespan.on_dispose(Box::new(move || core.destroy()))?;
        Ok(session)
    }

    /// Register a callback to run once when the session is destroyed
    pub fn on_destroy(&self, callback: Box<dyn FnOnce()>) -> Result<()> {
        if self.core.destroyed.get() {
            return Err(Error::SessionDestroyed);
        }
        self.core.callbacks.borrow_mut().push(callback);
        Ok(())
    }

    /// Run all detach callbacks and mark the session dead
    pub fn destroy(&self) {
        self.core.destroy();
    }

    pub fn is_destroyed(&self) -> bool {
        self.core.destroyed.get()
    }
}
