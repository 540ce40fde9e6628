use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::algorithm::Algorithm;
use crate::error::{Error, Result};
use crate::hashtree::{LeafRecord, MerkleTree};

/// Outcome of comparing one replacement item against a stored leaf hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleChange {
  pub original_hash: String,
  pub modified_hash: String,
  pub changed: bool,
  pub algorithm: Algorithm,
}

/// A position whose resubmitted item no longer matches its stored leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
  pub position: usize,
  pub original_data: String,
  pub current_data: String,
  pub original_hash: String,
  pub current_hash: String,
}

/// Outcome of rebuilding the whole tree with a substitution applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeVerdict {
  pub is_valid: bool,
  pub stored_root_hash: String,
  pub computed_root_hash: String,
  pub leaf_count: usize,
  pub algorithm: Algorithm,
}

impl TreeVerdict {
  pub fn message(&self) -> &'static str {
    if self.is_valid { "tree integrity verified" } else { "root hash mismatch, tree data has been tampered with" }
  }
}

/// Hashes `modified_data` and reports whether it differs from the stored hash of `original_data`.
///
/// This only looks at one leaf and says nothing about the root.
pub fn verify_single_change(
  stored_leaf_hash: &str,
  original_data: &str,
  modified_data: &str,
  algorithm: Algorithm,
) -> SingleChange {
  let modified_hash = algorithm.digest(modified_data);
  let changed = modified_hash != stored_leaf_hash;
  debug!(original = original_data, modified = modified_data, changed, "single leaf checked");
  SingleChange { original_hash: stored_leaf_hash.to_string(), modified_hash, changed, algorithm }
}

/// Same as [`verify_single_change`] with the stored leaf looked up by its original data (first match).
pub fn verify_single_change_in(
  leaves: &[LeafRecord],
  original_data: &str,
  modified_data: &str,
  algorithm: Algorithm,
) -> Result<SingleChange> {
  let leaf = leaves
    .iter()
    .find(|leaf| leaf.original_data == original_data)
    .ok_or_else(|| Error::LeafNotFound(format!("no leaf holds {original_data:?}")))?;
  Ok(verify_single_change(&leaf.hash, original_data, modified_data, algorithm))
}

/// Compares resubmitted items with the stored leaves position by position.
///
/// Only differing positions are reported, in position order.
pub fn detect_changes<S: AsRef<str>>(
  stored_leaves: &[LeafRecord],
  current_items: &[S],
  algorithm: Algorithm,
) -> Result<Vec<ChangeRecord>> {
  if stored_leaves.len() != current_items.len() {
    return Err(Error::LengthMismatch { expected: stored_leaves.len(), actual: current_items.len() });
  }
  let changes = stored_leaves
    .iter()
    .zip(current_items)
    .enumerate()
    .filter_map(|(position, (leaf, current))| {
      let current = current.as_ref();
      let current_hash = algorithm.digest(current);
      (current_hash != leaf.hash).then(|| ChangeRecord {
        position,
        original_data: leaf.original_data.clone(),
        current_data: current.to_string(),
        original_hash: leaf.hash.clone(),
        current_hash,
      })
    })
    .collect::<Vec<_>>();
  debug!(leaves = stored_leaves.len(), changed = changes.len(), "changes detected");
  Ok(changes)
}

/// Replaces every stored item equal to `original_data` with `modified_data`, rebuilds the tree and compares
/// the new root with `stored_root_hash`.
pub fn verify_whole_tree(
  stored_leaves: &[LeafRecord],
  original_data: &str,
  modified_data: &str,
  algorithm: Algorithm,
  stored_root_hash: &str,
) -> Result<TreeVerdict> {
  let items = stored_leaves
    .iter()
    .map(|leaf| if leaf.original_data == original_data { modified_data } else { leaf.original_data.as_str() })
    .collect::<Vec<_>>();
  let rebuilt = MerkleTree::build(&items, algorithm)?;
  let computed_root_hash = rebuilt.root_hash().to_string();
  let is_valid = computed_root_hash == stored_root_hash;
  debug!(leaves = items.len(), is_valid, stored = stored_root_hash, computed = %computed_root_hash, "tree re-verified");
  Ok(TreeVerdict {
    is_valid,
    stored_root_hash: stored_root_hash.to_string(),
    computed_root_hash,
    leaf_count: stored_leaves.len(),
    algorithm,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::hashtree::commit;

  #[test]
  fn test_single_change() {
    let commitment = commit(&["a", "b"], Algorithm::Sha1).unwrap();
    let leaf = &commitment.leaves[0];

    let result = verify_single_change(&leaf.hash, "a", "a", Algorithm::Sha1);
    assert!(!result.changed);
    assert_eq!(leaf.hash, result.modified_hash);

    let result = verify_single_change(&leaf.hash, "a", "z", Algorithm::Sha1);
    assert!(result.changed);
    assert_eq!("86f7e437faa5a7fce15d1ddcb9eaeaea377667b8", result.original_hash);
    assert_eq!(Algorithm::Sha1.digest("z"), result.modified_hash);
  }

  #[test]
  fn test_single_change_lookup() {
    let commitment = commit(&["a", "b"], Algorithm::Md5).unwrap();
    let result = verify_single_change_in(&commitment.leaves, "b", "b", Algorithm::Md5).unwrap();
    assert!(!result.changed);
    assert!(matches!(
      verify_single_change_in(&commitment.leaves, "c", "b", Algorithm::Md5),
      Err(Error::LeafNotFound(_))
    ));
  }

  #[test]
  fn test_detect_single_change() {
    let commitment = commit(&["a", "b", "c"], Algorithm::Md5).unwrap();
    let changes = detect_changes(&commitment.leaves, &["a", "X", "c"], Algorithm::Md5).unwrap();
    assert_eq!(
      vec![ChangeRecord {
        position: 1,
        original_data: "b".to_string(),
        current_data: "X".to_string(),
        original_hash: "92eb5ffee6ae2fec3ad71c777531578f".to_string(),
        current_hash: "02129bb861061d1a052c592e2dc6b383".to_string(),
      }],
      changes
    );
  }

  #[test]
  fn test_detect_keeps_position_order() {
    let commitment = commit(&["a", "b", "c", "d"], Algorithm::Sha256).unwrap();
    let changes = detect_changes(&commitment.leaves, &["A", "b", "", "D"], Algorithm::Sha256).unwrap();
    assert_eq!(vec![0, 2, 3], changes.iter().map(|c| c.position).collect::<Vec<_>>());
    assert!(detect_changes(&commitment.leaves, &commitment.items(), Algorithm::Sha256).unwrap().is_empty());
  }

  #[test]
  fn test_detect_length_mismatch() {
    let commitment = commit(&["a", "b", "c"], Algorithm::Sha256).unwrap();
    let result = detect_changes(&commitment.leaves, &["a", "b"], Algorithm::Sha256);
    assert!(matches!(result, Err(Error::LengthMismatch { expected: 3, actual: 2 })));
  }

  #[test]
  fn test_whole_tree_sensitivity() {
    let items = ["a", "b", "c", "d", "e"];
    let commitment = commit(&items, Algorithm::Sha256).unwrap();
    let root = commitment.tree.root_hash();
    for item in items {
      let verdict = verify_whole_tree(&commitment.leaves, item, item, Algorithm::Sha256, root).unwrap();
      assert!(verdict.is_valid, "{item}");
      assert_eq!(root, verdict.computed_root_hash);
      assert_eq!(5, verdict.leaf_count);

      let verdict = verify_whole_tree(&commitment.leaves, item, "tampered", Algorithm::Sha256, root).unwrap();
      assert!(!verdict.is_valid, "{item}");
      assert_eq!(root, verdict.stored_root_hash);
      assert_ne!(root, verdict.computed_root_hash);
    }
  }

  #[test]
  fn test_whole_tree_replaces_every_match() {
    let commitment = commit(&["x", "y", "x"], Algorithm::Sha256).unwrap();
    let verdict =
      verify_whole_tree(&commitment.leaves, "x", "z", Algorithm::Sha256, commitment.tree.root_hash()).unwrap();
    let expected = MerkleTree::build(&["z", "y", "z"], Algorithm::Sha256).unwrap();
    assert_eq!(expected.root_hash(), verdict.computed_root_hash);
    assert!(!verdict.is_valid);
  }

  #[test]
  fn test_whole_tree_without_match_is_valid() {
    let commitment = commit(&["a", "b", "c"], Algorithm::Sha1).unwrap();
    let root = commitment.tree.root_hash();
    let verdict = verify_whole_tree(&commitment.leaves, "missing", "z", Algorithm::Sha1, root).unwrap();
    assert!(verdict.is_valid);
    assert_eq!("tree integrity verified", verdict.message());
  }

  #[test]
  fn test_whole_tree_empty_leaves() {
    let result = verify_whole_tree(&[], "a", "b", Algorithm::Sha1, "");
    assert!(matches!(result, Err(Error::EmptyInput)));
  }
}
