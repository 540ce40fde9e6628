use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::algorithm::Algorithm;
use crate::error::{Error, Result};

pub mod proof;
pub mod verify;

/// Hash levels of a tree, root level first and leaf level last.
pub type Levels = Vec<Vec<String>>;

/// One committed input item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafRecord {
  pub position: usize,
  pub original_data: String,
  pub hash: String,
}

/// Immutable snapshot of a fully built binary hash tree.
///
/// A snapshot is never modified after construction. Any change to the underlying items means building a new
/// one; the levels are kept so that proofs can be derived without hashing the items again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "TreeRepr")]
pub struct MerkleTree {
  algorithm: Algorithm,
  root_hash: String,
  leaf_count: usize,
  levels: Levels,
}

/// A tree together with the leaf records produced by the same build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commitment {
  pub tree: MerkleTree,
  pub leaves: Vec<LeafRecord>,
}

impl MerkleTree {
  /// Builds the tree over `items` in order.
  ///
  /// Each leaf is the digest of one item. Parents are the digest of the concatenated hex text of their two
  /// children, and the last node of an odd-length level is paired with itself (self-pairing).
  pub fn build<S: AsRef<str>>(items: &[S], algorithm: Algorithm) -> Result<Self> {
    if items.is_empty() {
      return Err(Error::EmptyInput);
    }
    let leaves = items.iter().map(|item| algorithm.digest(item.as_ref())).collect::<Vec<_>>();

    let mut levels = vec![leaves];
    loop {
      let level = &levels[levels.len() - 1];
      if level.len() <= 1 {
        break;
      }
      let parents = parent_level(level, algorithm);
      trace!("level of {} nodes reduced to {}", level.len(), parents.len());
      levels.push(parents);
    }
    levels.reverse();

    let tree = Self::assemble(algorithm, levels);
    debug!(
      algorithm = %algorithm,
      leaves = tree.leaf_count,
      height = tree.height(),
      root = %tree.root_hash,
      "tree built"
    );
    Ok(tree)
  }

  /// Like [`MerkleTree::build`] with the algorithm given by name. Unknown names fail before anything is hashed.
  pub fn build_named<S: AsRef<str>>(items: &[S], algorithm: &str) -> Result<Self> {
    let algorithm = algorithm.parse::<Algorithm>()?;
    Self::build(items, algorithm)
  }

  /// Restores a snapshot from a stored level structure after checking its shape.
  ///
  /// Parent hashes are not recomputed here; use [`MerkleTree::is_consistent`] for that.
  pub fn from_levels(algorithm: Algorithm, levels: Levels) -> Result<Self> {
    check_shape(algorithm, &levels)?;
    Ok(Self::assemble(algorithm, levels))
  }

  fn assemble(algorithm: Algorithm, levels: Levels) -> Self {
    let root_hash = levels[0][0].clone();
    let leaf_count = levels[levels.len() - 1].len();
    MerkleTree { algorithm, root_hash, leaf_count, levels }
  }

  pub fn algorithm(&self) -> Algorithm {
    self.algorithm
  }

  pub fn root_hash(&self) -> &str {
    &self.root_hash
  }

  pub fn leaf_count(&self) -> usize {
    self.leaf_count
  }

  pub fn levels(&self) -> &[Vec<String>] {
    &self.levels
  }

  /// Number of levels including the root and leaf levels.
  pub fn height(&self) -> usize {
    self.levels.len()
  }

  pub fn leaf_hashes(&self) -> &[String] {
    &self.levels[self.levels.len() - 1]
  }

  pub fn into_levels(self) -> Levels {
    self.levels
  }

  /// Whether every parent hash matches the digest of its children.
  pub fn is_consistent(&self) -> bool {
    self.levels.windows(2).all(|pair| pair[0] == parent_level(&pair[1], self.algorithm))
  }
}

impl Commitment {
  /// Builds a tree and the leaf records describing each committed item.
  pub fn new<S: AsRef<str>>(items: &[S], algorithm: Algorithm) -> Result<Self> {
    let tree = MerkleTree::build(items, algorithm)?;
    let leaves = items
      .iter()
      .zip(tree.leaf_hashes())
      .enumerate()
      .map(|(position, (item, hash))| LeafRecord {
        position,
        original_data: item.as_ref().to_string(),
        hash: hash.clone(),
      })
      .collect();
    Ok(Commitment { tree, leaves })
  }

  /// Original items in position order.
  pub fn items(&self) -> Vec<&str> {
    self.leaves.iter().map(|leaf| leaf.original_data.as_str()).collect()
  }
}

/// Builds a tree over `items` together with its leaf records.
pub fn commit<S: AsRef<str>>(items: &[S], algorithm: Algorithm) -> Result<Commitment> {
  Commitment::new(items, algorithm)
}

/// Index of the node that `index` is combined with on a level of `len` nodes.
///
/// Self-pairing: the last node of an odd-length level has no partner and is combined with itself. Both the
/// builder and the proof walker go through this function so they always agree on how a parent was formed.
pub(crate) fn pair_of(index: usize, len: usize) -> usize {
  debug_assert!(index < len);
  if index % 2 == 1 {
    index - 1
  } else if index + 1 < len {
    index + 1
  } else {
    index
  }
}

fn parent_level(level: &[String], algorithm: Algorithm) -> Vec<String> {
  (0..level.len().div_ceil(2))
    .map(|i| {
      let left = 2 * i;
      let right = pair_of(left, level.len());
      algorithm.combine(&level[left], &level[right])
    })
    .collect()
}

fn check_shape(algorithm: Algorithm, levels: &[Vec<String>]) -> Result<()> {
  match levels.first() {
    None => return Err(Error::InvalidData("tree has no levels".to_string())),
    Some(root) if root.len() != 1 => {
      return Err(Error::InvalidData(format!("root level must hold one hash, found {}", root.len())));
    }
    Some(_) => (),
  }
  for (k, pair) in levels.windows(2).enumerate() {
    if pair[1].len() <= 1 {
      return Err(Error::InvalidData(format!("level {} below the root holds {} hashes", k + 1, pair[1].len())));
    }
    let expected = pair[1].len().div_ceil(2);
    if pair[0].len() != expected {
      return Err(Error::InvalidData(format!(
        "level {k} holds {} hashes but level {} requires {expected}",
        pair[0].len(),
        k + 1
      )));
    }
  }
  for (k, level) in levels.iter().enumerate() {
    if let Some(hash) = level.iter().find(|hash| !algorithm.is_digest(hash)) {
      return Err(Error::InvalidData(format!("level {k} holds a value that is not a {algorithm} digest: {hash:?}")));
    }
  }
  Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TreeRepr {
  algorithm: Algorithm,
  root_hash: String,
  leaf_count: usize,
  levels: Levels,
}

impl TryFrom<TreeRepr> for MerkleTree {
  type Error = Error;

  fn try_from(repr: TreeRepr) -> Result<Self> {
    let tree = MerkleTree::from_levels(repr.algorithm, repr.levels)?;
    if tree.root_hash != repr.root_hash {
      return Err(Error::InvalidData(format!("root hash {} does not head the levels", repr.root_hash)));
    }
    if tree.leaf_count != repr.leaf_count {
      let message = format!("leaf count {} but {} leaves stored", repr.leaf_count, tree.leaf_count);
      return Err(Error::InvalidData(message));
    }
    Ok(tree)
  }
}

#[cfg(test)]
mod test;
