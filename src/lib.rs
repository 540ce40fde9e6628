use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub mod algorithm;
pub mod document;
pub mod error;
pub mod hashtree;
pub mod store;

pub use algorithm::{Algorithm, hash};
pub use error::{Error, Result};
pub use hashtree::proof::{Direction, InclusionProof, ProofStep, proof_for_data, proof_path, verify_proof};
pub use hashtree::verify::{
  ChangeRecord, SingleChange, TreeVerdict, detect_changes, verify_single_change, verify_single_change_in,
  verify_whole_tree,
};
pub use hashtree::{Commitment, LeafRecord, Levels, MerkleTree, commit};

/// Creates a new empty file in `dir` named `{prefix}{suffix}`, or `{prefix}_{i}{suffix}` when taken.
pub fn unique_file(dir: &Path, prefix: &str, suffix: &str) -> Result<PathBuf> {
  for i in 0..=u16::MAX {
    let name = if i == 0 { format!("{prefix}{suffix}") } else { format!("{prefix}_{i}{suffix}") };
    let path = dir.join(name);
    match OpenOptions::new().write(true).create_new(true).open(&path) {
      Ok(_) => return Ok(path),
      Err(e) if e.kind() == ErrorKind::AlreadyExists => (),
      Err(e) => return Err(e.into()),
    }
  }
  Err(Error::InvalidData(format!("file name space is full: {prefix}_nnn{suffix}")))
}

pub fn splitmix64(x: u64) -> u64 {
  let mut z = x.wrapping_add(0x9e3779b97f4a7c15);
  z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
  z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
  z ^ (z >> 31)
}
