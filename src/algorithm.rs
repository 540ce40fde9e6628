use std::fmt::Display;
use std::str::FromStr;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Digest functions a tree can be committed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
  Sha256,
  Sha1,
  Md5,
}

impl Algorithm {
  pub const ALL: [Algorithm; 3] = [Algorithm::Sha256, Algorithm::Sha1, Algorithm::Md5];

  /// Lower-case hex digest of `input`.
  pub fn digest<T: AsRef<[u8]>>(&self, input: T) -> String {
    match self {
      Algorithm::Sha256 => hex_digest::<Sha256>(input.as_ref()),
      Algorithm::Sha1 => hex_digest::<Sha1>(input.as_ref()),
      Algorithm::Md5 => hex_digest::<Md5>(input.as_ref()),
    }
  }

  /// Digest of two hex digests joined as text, which is how every parent node is formed.
  pub fn combine(&self, left: &str, right: &str) -> String {
    let mut joined = String::with_capacity(left.len() + right.len());
    joined.push_str(left);
    joined.push_str(right);
    self.digest(joined)
  }

  /// Raw digest size in bytes.
  pub fn digest_len(&self) -> usize {
    match self {
      Algorithm::Sha256 => 32,
      Algorithm::Sha1 => 20,
      Algorithm::Md5 => 16,
    }
  }

  /// Number of hex characters in a digest.
  pub fn hex_len(&self) -> usize {
    self.digest_len() * 2
  }

  pub fn name(&self) -> &'static str {
    match self {
      Algorithm::Sha256 => "sha256",
      Algorithm::Sha1 => "sha1",
      Algorithm::Md5 => "md5",
    }
  }

  /// Whether `hash` has the shape of a digest from this algorithm.
  pub fn is_digest(&self, hash: &str) -> bool {
    hash.len() == self.hex_len() && hash.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
  }

  pub(crate) fn tag(&self) -> u8 {
    match self {
      Algorithm::Sha256 => 1,
      Algorithm::Sha1 => 2,
      Algorithm::Md5 => 3,
    }
  }

  pub(crate) fn from_tag(tag: u8) -> Result<Self> {
    Self::ALL
      .into_iter()
      .find(|a| a.tag() == tag)
      .ok_or_else(|| Error::InvalidData(format!("unknown algorithm tag: {tag}")))
  }
}

impl FromStr for Algorithm {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_ascii_lowercase().as_str() {
      "sha256" => Ok(Algorithm::Sha256),
      "sha1" => Ok(Algorithm::Sha1),
      "md5" => Ok(Algorithm::Md5),
      _ => Err(Error::UnsupportedAlgorithm(s.to_string())),
    }
  }
}

impl Display for Algorithm {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.name())
  }
}

/// Hashes `input` with the algorithm named by `algorithm`.
///
/// The name is resolved before anything is hashed, so an unknown name never does partial work.
pub fn hash(input: &str, algorithm: &str) -> Result<String> {
  let algorithm = Algorithm::from_str(algorithm)?;
  Ok(algorithm.digest(input))
}

fn hex_digest<D: Digest>(input: &[u8]) -> String {
  hex::encode(D::digest(input))
}
