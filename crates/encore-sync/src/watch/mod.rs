//! Generic watchers built on a [`RealtimeSource`](crate::realtime::RealtimeSource).
//!
//! Both keep a local mirror of the listened subtree and turn the raw
//! `put`/`patch` stream into either child-level changes or whole-value
//! snapshots. Watchers spawn a task and must be started inside a tokio
//! runtime. Tearing down the returned subscription detaches the listener
//! and discards anything still in flight.

mod children;
mod value;

pub use children::{watch_children, ChildEvent};
pub use value::watch_value;

use std::cmp::Ordering;

/// Child key order used by the database: integer keys first in numeric
/// order, then everything else lexicographically.
pub(crate) fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_keys_sort_first_and_numerically() {
        let mut keys = vec!["b", "10", "a", "2", "-1"];
        keys.sort_by(|a, b| compare_keys(a, b));
        assert_eq!(keys, vec!["-1", "2", "10", "a", "b"]);
    }
}
