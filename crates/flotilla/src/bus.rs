//! Message dispatch: typed handlers keyed by wire tag.
//!
//! The bus is the seam between the connection driver and application code.
//! Handlers come and go at runtime (a login flow registers two, waits, and
//! removes both), so registration returns an id and removal is by id, never
//! by comparing closures.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use flotilla_protocol::{Message, MsgType};

type Handler = Arc<dyn Fn(&Message) + Send + Sync>;

/// Ticket returned by [`DispatchBus::on`]; the only way to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Routes decoded messages to registered handlers.
///
/// Dispatch runs handlers in registration order, against a snapshot taken
/// before the first call — a handler that registers or removes handlers
/// mid-dispatch affects the next message, not the current one. A panicking
/// handler is logged and skipped; it never takes down the reader loop or
/// its sibling handlers.
#[derive(Default)]
pub struct DispatchBus {
    handlers: Mutex<HashMap<u32, Vec<(HandlerId, Handler)>>>,
}

impl DispatchBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for messages of `msg_type`.
    pub fn on(
        &self,
        msg_type: MsgType,
        handler: impl Fn(&Message) + Send + Sync + 'static,
    ) -> HandlerId {
        let id = HandlerId::next();
        self.lock()
            .entry(msg_type.tag())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Removes a handler. Returns false if the id was already gone —
    /// removing twice is harmless.
    pub fn off(&self, id: HandlerId) -> bool {
        let mut handlers = self.lock();
        for list in handlers.values_mut() {
            if let Some(index) = list.iter().position(|(h, _)| *h == id) {
                list.remove(index);
                return true;
            }
        }
        false
    }

    /// Delivers `message` to every handler registered for its tag.
    pub fn dispatch(&self, message: &Message) {
        let snapshot: Vec<Handler> = {
            let handlers = self.lock();
            match handlers.get(&message.tag()) {
                Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
                None => {
                    tracing::trace!(tag = message.tag(), "no handlers for message");
                    return;
                }
            }
        };

        for handler in snapshot {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
                handler(message);
            }));
            if result.is_err() {
                tracing::error!(
                    tag = message.tag(),
                    "message handler panicked, continuing"
                );
            }
        }
    }

    /// Number of handlers registered for `msg_type`.
    pub fn handler_count(&self, msg_type: MsgType) -> usize {
        self.lock()
            .get(&msg_type.tag())
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u32, Vec<(HandlerId, Handler)>>> {
        self.handlers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// =========================================================================
// Tests
// =========================================================================
