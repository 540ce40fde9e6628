use serde::{Deserialize, Serialize};

use crate::algorithm::Algorithm;
use crate::error::{Error, Result};
use crate::hashtree::proof::{InclusionProof, proof_path};
use crate::hashtree::{Commitment, LeafRecord, Levels, MerkleTree};

/// JSON document describing a committed tree: `{"root": .., "levels": [[..]..], "leaves": [{"data", "hash"}..]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDocument {
  pub root: String,
  pub levels: Levels,
  pub leaves: Vec<DocumentLeaf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLeaf {
  pub data: String,
  pub hash: String,
}

impl TreeDocument {
  pub fn from_commitment(commitment: &Commitment) -> Self {
    let leaves = commitment
      .leaves
      .iter()
      .map(|leaf| DocumentLeaf { data: leaf.original_data.clone(), hash: leaf.hash.clone() })
      .collect();
    TreeDocument { root: commitment.tree.root_hash().to_string(), levels: commitment.tree.levels().to_vec(), leaves }
  }

  pub fn to_json(&self) -> Result<String> {
    Ok(serde_json::to_string(self)?)
  }

  pub fn to_json_pretty(&self) -> Result<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  /// Parses a document that may have been stored either as a JSON object or as a JSON string holding one.
  pub fn parse(text: &str) -> Result<Self> {
    if let Ok(inner) = serde_json::from_str::<String>(text) {
      return Ok(serde_json::from_str(&inner)?);
    }
    Ok(serde_json::from_str(text)?)
  }

  /// Position of the first leaf carrying `data`.
  pub fn position_of(&self, data: &str) -> Result<usize> {
    self
      .leaves
      .iter()
      .position(|leaf| leaf.data == data)
      .ok_or_else(|| Error::LeafNotFound(format!("no leaf holds {data:?}")))
  }

  pub fn proof_for(&self, data: &str) -> Result<InclusionProof> {
    let position = self.position_of(data)?;
    let path = proof_path(&self.levels, position)?;
    Ok(InclusionProof { position, leaf_hash: self.leaves[position].hash.clone(), path })
  }

  /// Restores the commitment, checking that root, levels and leaves agree with each other.
  pub fn to_commitment(&self, algorithm: Algorithm) -> Result<Commitment> {
    let tree = MerkleTree::from_levels(algorithm, self.levels.clone())?;
    if tree.root_hash() != self.root {
      return Err(Error::InvalidData(format!("document root {} does not head its levels", self.root)));
    }
    if tree.leaf_count() != self.leaves.len() {
      return Err(Error::InvalidData(format!(
        "document lists {} leaves but its leaf level holds {}",
        self.leaves.len(),
        tree.leaf_count()
      )));
    }
    let mut leaves = Vec::with_capacity(self.leaves.len());
    for (position, (leaf, hash)) in self.leaves.iter().zip(tree.leaf_hashes()).enumerate() {
      if &leaf.hash != hash {
        return Err(Error::InvalidData(format!("leaf {position} hash differs from the leaf level")));
      }
      leaves.push(LeafRecord { position, original_data: leaf.data.clone(), hash: leaf.hash.clone() });
    }
    Ok(Commitment { tree, leaves })
  }
}
