//! Parsing of comma-separated component selections.

use crate::{Catalog, Result};

/// Resolve a selection flag against a catalog.
///
/// - `None` (flag omitted) selects the whole catalog.
/// - An explicit value with no entries selects nothing.
/// - Any unknown entry rejects the whole selection.
///
/// Entries are trimmed, de-duplicated, and returned in catalog order so that
/// components sharing base configuration deploy in a stable sequence.
pub fn select<C: Catalog>(raw: Option<&str>) -> Result<Vec<C>> {
    let Some(raw) = raw else {
        return Ok(C::ALL.to_vec());
    };

    let requested = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(C::lookup)
        .collect::<Result<Vec<_>>>()?;

    Ok(C::ALL
        .iter()
        .copied()
        .filter(|member| requested.contains(member))
        .collect())
}
