//! Teardown capability returned by every subscribe-style operation.

use std::fmt;
use std::sync::Mutex;

type Teardown = Box<dyn FnOnce() + Send>;

/// Handle that releases one subscription's resources.
///
/// `unsubscribe` runs the teardown at most once; later calls are no-ops.
/// Dropping the handle unsubscribes too, so keep it alive for as long as
/// the listener should stay attached.
#[must_use = "dropping a Subscription detaches its listener"]
pub struct Subscription {
    teardown: Mutex<Option<Teardown>>,
}

impl Subscription {
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Mutex::new(Some(Box::new(teardown))),
        }
    }

    /// A subscription with nothing to release (e.g. an empty watch list).
    pub fn noop() -> Self {
        Self {
            teardown: Mutex::new(None),
        }
    }

    /// Combine several subscriptions into one that tears them all down.
    pub fn merge(subscriptions: Vec<Subscription>) -> Self {
        Self::new(move || {
            for sub in &subscriptions {
                sub.unsubscribe();
            }
        })
    }

    /// Release the subscription. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        let teardown = self
            .teardown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    /// Whether teardown has not run yet.
    pub fn is_active(&self) -> bool {
        self.teardown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
