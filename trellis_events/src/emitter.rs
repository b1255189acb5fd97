// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Synchronous, token-based publish/subscribe channel.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::RefCell;

/// Identifier for a single subscription on an [`Emitter`].
///
/// Returned by [`Emitter::on`] and consumed by [`Emitter::off`]. Tokens are
/// unique per emitter channel and are never reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Token(u64);

/// Handler invoked with the event name and a borrowed payload.
pub type Callback<T> = Rc<dyn Fn(&str, &T)>;

struct Inner<T> {
    next_token: u64,
    // Registration order is preserved within each event's handler list.
    handlers: BTreeMap<String, Vec<(Token, Callback<T>)>>,
}

/// A synchronous subscription channel.
///
/// Cloning an `Emitter` yields another handle to the same channel; handlers
/// registered through one clone fire when any clone triggers.
///
/// ## Reentrancy
///
/// [`Emitter::trigger`] snapshots the handler list for the event before
/// invoking anything, so handlers may subscribe, unsubscribe, or trigger
/// further events on the same channel while they run. A handler removed
/// during delivery of the same event still receives that delivery; a handler
/// added during delivery does not.
pub struct Emitter<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> core::fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let inner = self.inner.borrow();
        let events = inner.handlers.len();
        let subscriptions: usize = inner.handlers.values().map(Vec::len).sum();
        f.debug_struct("Emitter")
            .field("events", &events)
            .field("subscriptions", &subscriptions)
            .finish_non_exhaustive()
    }
}

impl<T> Emitter<T> {
    /// Create a new, empty channel.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                next_token: 0,
                handlers: BTreeMap::new(),
            })),
        }
    }

    /// Subscribe `callback` to `event`. Returns a token for [`Emitter::off`].
    pub fn on(&self, event: &str, callback: Callback<T>) -> Token {
        let mut inner = self.inner.borrow_mut();
        let token = Token(inner.next_token);
        inner.next_token += 1;
        inner
            .handlers
            .entry(event.to_string())
            .or_default()
            .push((token, callback));
        token
    }

    /// Remove the subscription identified by `token`.
    ///
    /// Returns `true` if a subscription was removed. Unknown (or already
    /// removed) tokens return `false`.
    pub fn off(&self, token: Token) -> bool {
        let mut inner = self.inner.borrow_mut();
        let mut removed = false;
        inner.handlers.retain(|_, list| {
            let before = list.len();
            list.retain(|(t, _)| *t != token);
            removed |= list.len() != before;
            !list.is_empty()
        });
        removed
    }

    /// Trigger `event`, invoking every subscribed handler in registration
    /// order with `payload`.
    pub fn trigger(&self, event: &str, payload: &T) {
        // Snapshot under a short borrow; handlers run with the borrow
        // released so they can re-enter this channel.
        let snapshot: Vec<(Token, Callback<T>)> = {
            let inner = self.inner.borrow();
            match inner.handlers.get(event) {
                Some(list) => list.clone(),
                None => return,
            }
        };
        for (token, callback) in snapshot {
            // A handler unsubscribed mid-delivery is skipped from this point.
            let still_subscribed = {
                let inner = self.inner.borrow();
                inner
                    .handlers
                    .get(event)
                    .is_some_and(|list| list.iter().any(|(t, _)| *t == token))
            };
            if still_subscribed {
                callback(event, payload);
            }
        }
    }

    /// Number of live subscriptions for `event`.
    pub fn handler_count(&self, event: &str) -> usize {
        self.inner
            .borrow()
            .handlers
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Remove every subscription on the channel.
    pub fn clear(&self) {
        self.inner.borrow_mut().handlers.clear();
    }
}
