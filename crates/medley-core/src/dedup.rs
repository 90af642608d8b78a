//! Duplicate slot detection
//!
//! The same source instance may legally occupy several slots. Duplicate
//! flags mark every occurrence after the first so preparation, error
//! checks, and release are never issued twice for one source. Flags are
//! recomputed from scratch whenever the slot list changes.

use std::collections::HashSet;

use crate::source::SourceKey;

/// For each position, whether an earlier position holds the same source
/// identity. First occurrence wins; comparison is by [`SourceKey`], never
/// by value.
pub fn duplicate_flags<I>(keys: I) -> Vec<bool>
where
    I: IntoIterator<Item = SourceKey>,
{
    let mut seen = HashSet::new();
    keys.into_iter().map(|key| !seen.insert(key)).collect()
}
