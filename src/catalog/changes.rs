//! Positional diffs between two snapshots of an ordered result set.
//!
//! Indices follow the usual table-view convention:
//!
//! - `deletions` are positions in the **old** sequence,
//! - `insertions` and `modifications` are positions in the **new** sequence.
//!
//! Applying deletions (descending), then insertions (ascending), to the old
//! sequence yields the new one. An item that changed position is reported as
//! a deletion plus an insertion; the items that stay put are the longest run
//! of common items whose relative order is unchanged.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub deletions: Vec<usize>,
    pub insertions: Vec<usize>,
    pub modifications: Vec<usize>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty() && self.insertions.is_empty() && self.modifications.is_empty()
    }
}

/// Diff `old` against `new`, matching items by `key`.
pub fn diff<T, K>(old: &[T], new: &[T], key: impl Fn(&T) -> K) -> ChangeSet
where
    T: PartialEq,
    K: Eq + Hash,
{
    let old_index: HashMap<K, usize> = old.iter().enumerate().map(|(i, t)| (key(t), i)).collect();

    let mut changes = ChangeSet::default();
    // (old position, new position) of items present in both, in new order
    let mut common = Vec::new();
    let mut kept_old = vec![false; old.len()];

    for (new_pos, item) in new.iter().enumerate() {
        match old_index.get(&key(item)) {
            Some(&old_pos) => {
                common.push((old_pos, new_pos));
                kept_old[old_pos] = true;
            }
            None => changes.insertions.push(new_pos),
        }
    }
    changes
        .deletions
        .extend(kept_old.iter().enumerate().filter(|(_, kept)| !**kept).map(|(i, _)| i));

    let olds: Vec<usize> = common.iter().map(|&(o, _)| o).collect();
    let stable = longest_increasing_subsequence(&olds);
    let mut in_place = vec![false; common.len()];
    for i in stable {
        in_place[i] = true;
    }

    for (i, &(old_pos, new_pos)) in common.iter().enumerate() {
        if !in_place[i] {
            changes.deletions.push(old_pos);
            changes.insertions.push(new_pos);
        } else if old[old_pos] != new[new_pos] {
            changes.modifications.push(new_pos);
        }
    }

    changes.deletions.sort_unstable();
    changes.insertions.sort_unstable();
    changes.modifications.sort_unstable();
    changes
}

/// Indices into `seq` of one longest strictly increasing subsequence.
fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    // tails[k] = index of the smallest tail of an increasing run of length k+1
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];

    for (i, &value) in seq.iter().enumerate() {
        let pos = tails.partition_point(|&t| seq[t] < value);
        if pos > 0 {
            prev[i] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }

    let mut out = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        out.push(i);
        cursor = prev[i];
    }
    out.reverse();
    out
}
