//! Request/response correlation gates.
//!
//! LocoNet replies are not addressed to anyone: a slot data report or an
//! LNCV reply is just another broadcast on the bus. The gates here turn
//! that push model into awaitable calls. Each operation class (slot
//! lookup, CV programming, LNCV, discovery) owns one gate; an async mutex
//! serializes callers within a class, so at any moment at most one
//! request per class is outstanding and an arriving notification can only
//! ever resolve the request that is actually waiting.
//!
//! Cleanup of the pending slot is tied to a drop guard, so every exit
//! path (reply, timeout, cancellation, send failure, caller dropping the
//! future) leaves the gate empty for the next caller.

use std::future::Future;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use locolib_core::{Error, Result};

/// Clears the shared pending slot when the owning request unwinds.
struct ClearOnDrop<'a, P>(&'a StdMutex<Option<P>>);

impl<P> Drop for ClearOnDrop<'_, P> {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.0.lock() {
            pending.take();
        }
    }
}

type Pending<K, T> = Option<(K, oneshot::Sender<Result<T>>)>;

/// Single-outstanding-request gate for one operation class.
///
/// `K` identifies which reply belongs to the pending request (the
/// locomotive address for slot lookups, `()` where the class itself is
/// identification enough).
pub struct ResponseGate<K, T> {
    lock: Mutex<()>,
    pending: StdMutex<Pending<K, T>>,
}

impl<K: PartialEq, T> ResponseGate<K, T> {
    pub fn new() -> Self {
        ResponseGate {
            lock: Mutex::new(()),
            pending: StdMutex::new(None),
        }
    }

    /// Issue a request and wait for its reply.
    ///
    /// Registers `key` as pending, then drives `send` (the transmit
    /// future), then waits until the dispatch path fulfills the request,
    /// `timeout` elapses, or `cancel` fires. The pending registration
    /// happens before the send so a reply cannot race past an
    /// unregistered request.
    pub async fn request(
        &self,
        key: K,
        timeout: Duration,
        cancel: &CancellationToken,
        send: impl Future<Output = Result<()>>,
    ) -> Result<T> {
        let _serial = self.lock.lock().await;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self
                .pending
                .lock()
                .map_err(|_| Error::Protocol("gate poisoned".into()))?;
            *pending = Some((key, tx));
        }
        let _clear = ClearOnDrop(&self.pending);

        send.await?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::NotConnected),
            reply = rx => reply.map_err(|_| Error::ConnectionLost)?,
            _ = tokio::time::sleep(timeout) => Err(Error::Timeout),
        }
    }

    /// Resolve the pending request if its key matches. Returns whether
    /// the value was consumed; a `false` means the notification was
    /// unsolicited (or late) and the caller should treat it as ordinary
    /// bus traffic.
    pub fn fulfill(&self, key: &K, value: T) -> bool {
        self.complete(key, Ok(value))
    }

    /// Fail the pending request if its key matches.
    pub fn reject(&self, key: &K, err: Error) -> bool {
        self.complete(key, Err(err))
    }

    /// Fail whatever request is pending, regardless of key. The closure
    /// receives the pending key so the error can name it.
    pub fn reject_pending(&self, err: impl FnOnce(&K) -> Error) -> bool {
        let Ok(mut pending) = self.pending.lock() else {
            return false;
        };
        match pending.take() {
            Some((key, tx)) => {
                let e = err(&key);
                tx.send(Err(e)).is_ok()
            }
            None => false,
        }
    }

    fn complete(&self, key: &K, result: Result<T>) -> bool {
        let Ok(mut pending) = self.pending.lock() else {
            return false;
        };
        match pending.take() {
            Some((k, tx)) if k == *key => tx.send(result).is_ok(),
            other => {
                *pending = other;
                false
            }
        }
    }
}

impl<K: PartialEq, T> Default for ResponseGate<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Window accumulator for discovery-style operations where one broadcast
/// request draws replies from arbitrarily many devices.
pub struct DiscoveryGate<T> {
    lock: Mutex<()>,
    collector: StdMutex<Option<Vec<T>>>,
}

impl<T> DiscoveryGate<T> {
    pub fn new() -> Self {
        DiscoveryGate {
            lock: Mutex::new(()),
            collector: StdMutex::new(None),
        }
    }

    /// Broadcast via `send`, then collect offered items for `window`.
    pub async fn collect(
        &self,
        window: Duration,
        cancel: &CancellationToken,
        send: impl Future<Output = Result<()>>,
    ) -> Result<Vec<T>> {
        let _serial = self.lock.lock().await;

        {
            let mut collector = self
                .collector
                .lock()
                .map_err(|_| Error::Protocol("gate poisoned".into()))?;
            *collector = Some(Vec::new());
        }
        let _clear = ClearOnDrop(&self.collector);

        send.await?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::NotConnected),
            _ = tokio::time::sleep(window) => {}
        }

        let items = self
            .collector
            .lock()
            .map_err(|_| Error::Protocol("gate poisoned".into()))?
            .take()
            .unwrap_or_default();
        Ok(items)
    }

    /// Offer an item to an open collection window. A `false` return means
    /// no window is open and the item was ignored.
    pub fn offer(&self, item: T) -> bool {
        let Ok(mut collector) = self.collector.lock() else {
            return false;
        };
        match collector.as_mut() {
            Some(items) => {
                items.push(item);
                true
            }
            None => false,
        }
    }
}

impl<T> Default for DiscoveryGate<T> {
    fn default() -> Self {
        Self::new()
    }
}
