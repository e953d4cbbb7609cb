//! Element-level diff of reference lists.
//!
//! Elements are matched by native id along a longest common subsequence, so
//! an insertion in the middle of a list reports one `add` instead of shifting
//! every following element.

use crate::{ChangeOp, ChangeRecord, PropertyPath};
use catbridge_model::{NativeRef, NativeValue, RefList};

/// Largest LCS table built; beyond it the list is replaced whole.
const MAX_TABLE_CELLS: usize = 1 << 22;

/// Indices (into `old` and `new`) of the elements outside the LCS, or `None`
/// when the differing middle section is too large to align.
fn unmatched(old: &[NativeRef], new: &[NativeRef]) -> Option<(Vec<usize>, Vec<usize>)> {
    let prefix = old
        .iter()
        .zip(new)
        .take_while(|(a, b)| a.id == b.id)
        .count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a.id == b.id)
        .count();
    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];

    let (n, m) = (old_mid.len(), new_mid.len());
    if n.saturating_mul(m) > MAX_TABLE_CELLS {
        return None;
    }

    // Row-major (n + 1) x (m + 1).
    let width = m + 1;
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if old_mid[i].id == new_mid[j].id {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let (mut removed, mut added) = (Vec::new(), Vec::new());
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old_mid[i].id == new_mid[j].id {
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            removed.push(prefix + i);
            i += 1;
        } else {
            added.push(prefix + j);
            j += 1;
        }
    }
    removed.extend((i..n).map(|i| prefix + i));
    added.extend((j..m).map(|j| prefix + j));
    Some((removed, added))
}

fn bulk_replace(property: &str, old: &RefList, new: &RefList) -> Vec<ChangeRecord> {
    vec![ChangeRecord {
        path: PropertyPath::whole(property),
        op: ChangeOp::Replace,
        old: Some(NativeValue::ReferenceList(old.clone())),
        new: Some(NativeValue::ReferenceList(new.clone())),
    }]
}

pub(crate) fn diff_elements(property: &str, old: &RefList, new: &RefList) -> Vec<ChangeRecord> {
    let Some((removed, added)) = unmatched(&old.items, &new.items) else {
        tracing::debug!(
            property,
            old = old.items.len(),
            new = new.items.len(),
            "reference lists too far apart to align; replacing whole"
        );
        return bulk_replace(property, old, new);
    };
    let element = |r: &NativeRef| Some(NativeValue::Reference(r.clone()));

    match (removed.is_empty(), added.is_empty()) {
        (true, true) => Vec::new(),
        (true, false) => added
            .into_iter()
            .map(|j| ChangeRecord {
                path: PropertyPath::element(property, j),
                op: ChangeOp::Add,
                old: None,
                new: element(&new.items[j]),
            })
            .collect(),
        (false, true) => removed
            .into_iter()
            .map(|i| ChangeRecord {
                path: PropertyPath::element(property, i),
                op: ChangeOp::Remove,
                old: element(&old.items[i]),
                new: None,
            })
            .collect(),
        // Same positions swapped out one for one: in-place replacements.
        (false, false) if removed == added => removed
            .into_iter()
            .map(|i| ChangeRecord {
                path: PropertyPath::element(property, i),
                op: ChangeOp::Replace,
                old: element(&old.items[i]),
                new: element(&new.items[i]),
            })
            .collect(),
        (false, false) => bulk_replace(property, old, new),
    }
}
