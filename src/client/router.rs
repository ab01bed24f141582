// ABOUTME: Correlates inbound frames with pending requests by sequence number
// ABOUTME: Owns the three handler tables and the random sequence number allocator

use crate::client::types::{Message, Response, ResultEvent};
use crate::frame::{Command, Frame};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};

/// Routing state for a single connection.
///
/// Three tables keyed by sequence number, one per handler class. A request
/// always holds a response slot and at most one of the other two. Each table
/// has its own lock; no operation holds two table locks at once, and no lock
/// is held across a channel send.
#[derive(Debug, Default)]
pub(crate) struct Router {
    response_handlers: Mutex<HashMap<u32, oneshot::Sender<Response>>>,
    result_handlers: Mutex<HashMap<u32, mpsc::UnboundedSender<ResultEvent>>>,
    list_result_handlers: Mutex<HashMap<u32, mpsc::UnboundedSender<Option<String>>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Router {
    pub(crate) fn new() -> Router {
        Router::default()
    }

    /// Allocate a random sequence number that collides with no pending
    /// request in any table, and claim its response slot.
    fn claim_seq(&self, tx: oneshot::Sender<Response>) -> u32 {
        loop {
            let seq_num = rand::random::<u32>();
            // A pending streaming request may have had its response slot
            // consumed already, so the streaming tables are checked too.
            if lock(&self.result_handlers).contains_key(&seq_num) {
                continue;
            }
            if lock(&self.list_result_handlers).contains_key(&seq_num) {
                continue;
            }
            match lock(&self.response_handlers).entry(seq_num) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(tx);
                    return seq_num;
                }
            }
        }
    }

    /// Register a request that terminates with a single response.
    pub(crate) fn register_response(&self) -> (u32, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        (self.claim_seq(tx), rx)
    }

    /// Register a request that also streams results (subscribe, query).
    pub(crate) fn register_streaming(
        &self,
    ) -> (
        u32,
        oneshot::Receiver<Response>,
        mpsc::UnboundedReceiver<ResultEvent>,
    ) {
        let (tx, rx) = oneshot::channel();
        let seq_num = self.claim_seq(tx);
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        lock(&self.result_handlers).insert(seq_num, result_tx);
        (seq_num, rx, result_rx)
    }

    /// Register a request that also streams child URIs (list).
    pub(crate) fn register_list(
        &self,
    ) -> (
        u32,
        oneshot::Receiver<Response>,
        mpsc::UnboundedReceiver<Option<String>>,
    ) {
        let (tx, rx) = oneshot::channel();
        let seq_num = self.claim_seq(tx);
        let (list_tx, list_rx) = mpsc::unbounded_channel();
        lock(&self.list_result_handlers).insert(seq_num, list_tx);
        (seq_num, rx, list_rx)
    }

    /// Drop every handler registered for `seq_num`. Used when the outbound
    /// write fails after registration, so abandoned entries cannot
    /// accumulate.
    pub(crate) fn deregister(&self, seq_num: u32) {
        lock(&self.response_handlers).remove(&seq_num);
        lock(&self.result_handlers).remove(&seq_num);
        lock(&self.list_result_handlers).remove(&seq_num);
    }

    /// Route one inbound frame to its pending request, if any.
    pub(crate) fn dispatch(&self, frame: Frame) {
        match frame.command() {
            Command::RESPONSE => self.dispatch_response(frame),
            Command::RESULT => self.dispatch_result(frame),
            other => {
                tracing::debug!(command = %other, "dropping frame with unhandled command");
            }
        }
    }

    fn dispatch_response(&self, frame: Frame) {
        let seq_num = frame.seq_num();
        let handler = lock(&self.response_handlers).remove(&seq_num);
        let response = Response::from_frame(frame);

        // A failed request terminates its streaming side as well; dropping
        // the senders ends the streams.
        if !response.is_okay() {
            lock(&self.result_handlers).remove(&seq_num);
            lock(&self.list_result_handlers).remove(&seq_num);
        }

        match handler {
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => tracing::debug!(seq_num, "dropping response with no pending request"),
        }
    }

    fn dispatch_result(&self, frame: Frame) {
        let seq_num = frame.seq_num();
        let finished = frame
            .first_text("finished")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        let result_tx = {
            let mut handlers = lock(&self.result_handlers);
            if finished {
                // Removed before dispatch so the final event is also the
                // last: the dropped sender closes the stream behind it.
                handlers.remove(&seq_num)
            } else {
                handlers.get(&seq_num).cloned()
            }
        };
        if let Some(tx) = result_tx {
            let message = Message::from_frame(frame);
            let _ = tx.send(ResultEvent { message, finished });
            return;
        }

        let list_tx = {
            let mut handlers = lock(&self.list_result_handlers);
            if finished {
                handlers.remove(&seq_num)
            } else {
                handlers.get(&seq_num).cloned()
            }
        };
        if let Some(tx) = list_tx {
            if finished {
                let _ = tx.send(None);
            } else if let Some(child) = frame.first_text("child") {
                let _ = tx.send(Some(child.into_owned()));
            } else {
                tracing::debug!(seq_num, "list result frame carries no child");
            }
            return;
        }

        tracing::debug!(seq_num, "dropping result with no pending request");
    }

    /// Tear down every pending request. Dropped response senders wake their
    /// waiters with a connection-closed failure; dropped stream senders end
    /// the streams without a completion sentinel.
    pub(crate) fn fail_all(&self) {
        lock(&self.response_handlers).clear();
        lock(&self.result_handlers).clear();
        lock(&self.list_result_handlers).clear();
    }
}
