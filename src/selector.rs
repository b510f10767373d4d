//! Process-wide unique selectors for dynamic components

use std::sync::atomic::{AtomicU64, Ordering};

/// Default prefix used when the host does not supply one
pub const DEFAULT_SELECTOR_PREFIX: &str = "dynamic-template";

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Build a selector from `prefix` and the next process-wide id
///
/// Ids are never reused for the lifetime of the process, so two live
/// instances can never produce colliding component factories.
pub fn next_selector(prefix: &str) -> String {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", prefix, id)
}
