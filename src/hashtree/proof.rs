use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::algorithm::Algorithm;
use crate::error::{Error, Result};
use crate::hashtree::{LeafRecord, MerkleTree, pair_of};

/// Side on which a proof step's hash sits relative to the running hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  Left,
  Right,
  Root,
}

impl Display for Direction {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      Direction::Left => "left",
      Direction::Right => "right",
      Direction::Root => "root",
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
  pub hash: String,
  pub direction: Direction,
}

/// Proof that the leaf at `position` is part of a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionProof {
  pub position: usize,
  pub leaf_hash: String,
  pub path: Vec<ProofStep>,
}

impl InclusionProof {
  pub fn root_hash(&self) -> Option<&str> {
    self.path.last().filter(|step| step.direction == Direction::Root).map(|step| step.hash.as_str())
  }

  pub fn verify(&self, algorithm: Algorithm) -> Result<bool> {
    verify_proof(&self.leaf_hash, &self.path, algorithm)
  }
}

/// Sibling path from the leaf at `position` up to the root, followed by a single `root` step.
///
/// A node left unpaired at the end of an odd-length level was combined with itself, so its step carries the
/// node's own hash on the left.
pub fn proof_path(levels: &[Vec<String>], position: usize) -> Result<Vec<ProofStep>> {
  let leaf_count = levels.last().map_or(0, Vec::len);
  if position >= leaf_count {
    return Err(Error::LeafNotFound(format!("position {position} is outside of 0..{leaf_count}")));
  }
  let root = levels[0].first().ok_or_else(|| Error::InvalidData("root level is empty".to_string()))?;

  let mut path = Vec::with_capacity(levels.len());
  let mut index = position;
  for (k, level) in levels.iter().enumerate().skip(1).rev() {
    if index >= level.len() {
      return Err(Error::InvalidData(format!("level {k} holds {} hashes, no node {index}", level.len())));
    }
    let sibling = pair_of(index, level.len());
    let direction = if sibling > index { Direction::Right } else { Direction::Left };
    path.push(ProofStep { hash: level[sibling].clone(), direction });
    index /= 2;
  }
  path.push(ProofStep { hash: root.clone(), direction: Direction::Root });
  Ok(path)
}

/// Recomputes the root from `leaf_hash` along `path` and compares it with the path's terminal root step.
pub fn verify_proof(leaf_hash: &str, path: &[ProofStep], algorithm: Algorithm) -> Result<bool> {
  let Some((root, steps)) = path.split_last() else {
    return Err(Error::MalformedProof("path is empty".to_string()));
  };
  if root.direction != Direction::Root {
    return Err(Error::MalformedProof(format!("path ends with a {} step instead of root", root.direction)));
  }

  let mut current = leaf_hash.to_string();
  for (i, step) in steps.iter().enumerate() {
    current = match step.direction {
      Direction::Left => algorithm.combine(&step.hash, &current),
      Direction::Right => algorithm.combine(&current, &step.hash),
      Direction::Root => return Err(Error::MalformedProof(format!("root step at {i} before the end of the path"))),
    };
  }
  Ok(current == root.hash)
}

impl MerkleTree {
  pub fn proof_path(&self, position: usize) -> Result<Vec<ProofStep>> {
    proof_path(self.levels(), position)
  }

  pub fn prove(&self, position: usize) -> Result<InclusionProof> {
    let path = self.proof_path(position)?;
    let leaf_hash = self.leaf_hashes()[position].clone();
    Ok(InclusionProof { position, leaf_hash, path })
  }
}

/// Proves the first leaf whose original data equals `data`.
pub fn proof_for_data(tree: &MerkleTree, leaves: &[LeafRecord], data: &str) -> Result<InclusionProof> {
  let leaf = leaves
    .iter()
    .find(|leaf| leaf.original_data == data)
    .ok_or_else(|| Error::LeafNotFound(format!("no leaf holds {data:?}")))?;
  let proof = tree.prove(leaf.position)?;
  debug!(position = leaf.position, steps = proof.path.len(), "proof derived");
  Ok(proof)
}
