//! Cooperative cancellation.
//!
//! An [`AbortController`] fires at most once, with a typed reason. Signals
//! are cheap clones observing the same controller; aborting is cooperative,
//! so a handler that never checks its signal still runs to completion — its
//! result is simply discarded by the engine.

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use crate::error::Error;

#[derive(Debug, Default)]
struct AbortInner {
    token: CancellationToken,
    reason: OnceLock<Error>,
}

/// The firing half of a cancellation pair.
#[derive(Debug, Clone, Default)]
pub struct AbortController {
    inner: Arc<AbortInner>,
}

impl AbortController {
    pub fn new() -> Self {
        Self::default()
    }

    /// An observer for this controller.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            inner: self.inner.clone(),
        }
    }

    /// Fires the controller. The first reason wins; later calls are no-ops.
    pub fn abort(&self, reason: Error) {
        let _ = self.inner.reason.set(reason);
        self.inner.token.cancel();
    }
}

/// The observing half of a cancellation pair.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    inner: Arc<AbortInner>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// The abort reason, once the controller has fired.
    pub fn reason(&self) -> Option<Error> {
        self.inner.reason.get().cloned()
    }

    /// Resolves when the controller fires. Immediately, if it already has.
    pub async fn aborted(&self) {
        self.inner.token.cancelled().await;
    }
}
