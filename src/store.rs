use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, SubsecRound, Utc};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::algorithm::Algorithm;
use crate::error::{Error, Result};
use crate::hashtree::{Commitment, LeafRecord, MerkleTree};
use crate::unique_file;

const MAGIC: [u8; 4] = *b"MKAT";
const VERSION: u8 = 1;
pub const FILE_SUFFIX: &str = ".mkt";

/// Binary encoding with little-endian integers.
pub trait Serializable: Sized {
  fn write<W: Write>(&self, w: &mut W) -> Result<usize>;
  fn read<R: Read>(r: &mut R) -> Result<Self>;
}

impl Serializable for MerkleTree {
  fn write<W: Write>(&self, w: &mut W) -> Result<usize> {
    let algorithm = self.algorithm();
    let mut buffer = vec![0u8; algorithm.digest_len()];

    // Algorithm (1 byte), level count (4 bytes)
    w.write_u8(algorithm.tag())?;
    w.write_u32::<LittleEndian>(to_u32(self.height(), "level count")?)?;
    let mut len = 1 + 4;

    // Each level: hash count (4 bytes) and raw digests
    for level in self.levels() {
      w.write_u32::<LittleEndian>(to_u32(level.len(), "level size")?)?;
      for hash in level {
        hex::decode_to_slice(hash, &mut buffer).map_err(|e| Error::InvalidData(format!("{hash:?}: {e}")))?;
        w.write_all(&buffer)?;
      }
      len += 4 + level.len() * buffer.len();
    }
    Ok(len)
  }

  fn read<R: Read>(r: &mut R) -> Result<Self> {
    let algorithm = Algorithm::from_tag(r.read_u8()?)?;
    let height = r.read_u32::<LittleEndian>()?;
    let mut buffer = vec![0u8; algorithm.digest_len()];
    let mut levels = Vec::new();
    for _ in 0..height {
      let count = r.read_u32::<LittleEndian>()?;
      let mut level = Vec::new();
      for _ in 0..count {
        r.read_exact(&mut buffer)?;
        level.push(hex::encode(&buffer));
      }
      levels.push(level);
    }
    MerkleTree::from_levels(algorithm, levels)
  }
}

/// A committed tree as written to disk, with its name, creation time and original items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFile {
  pub name: String,
  pub created_at: DateTime<Utc>,
  pub commitment: Commitment,
}

impl TreeFile {
  pub fn new(name: &str, commitment: Commitment) -> Self {
    // stored with millisecond precision
    let created_at = Utc::now().trunc_subsecs(3);
    TreeFile { name: name.to_string(), created_at, commitment }
  }

  pub fn tree(&self) -> &MerkleTree {
    &self.commitment.tree
  }

  pub fn leaves(&self) -> &[LeafRecord] {
    &self.commitment.leaves
  }

  pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
    let file = File::create(&path)?;
    let mut writer = BufWriter::new(file);
    let len = self.write(&mut writer)?;
    writer.flush()?;
    debug!(path = %path.as_ref().display(), bytes = len, "tree file written");
    Ok(len)
  }

  /// Saves under a new file in `dir` named after the tree.
  pub fn save_in(&self, dir: &Path) -> Result<PathBuf> {
    let prefix =
      self.name.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' }).collect::<String>();
    let path = unique_file(dir, &prefix, FILE_SUFFIX)?;
    self.save(&path)?;
    Ok(path)
  }

  pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
    let file = File::open(&path)?;
    let mut reader = BufReader::new(file);
    let tree_file = Self::read(&mut reader)?;
    debug!(path = %path.as_ref().display(), name = %tree_file.name, "tree file loaded");
    Ok(tree_file)
  }
}

impl Serializable for TreeFile {
  fn write<W: Write>(&self, w: &mut W) -> Result<usize> {
    // Header: magic (4 bytes), version (1 byte), creation time in millis (8 bytes), name
    w.write_all(&MAGIC)?;
    w.write_u8(VERSION)?;
    w.write_i64::<LittleEndian>(self.created_at.timestamp_millis())?;
    let mut len = 4 + 1 + 8 + write_text(w, &self.name)?;

    len += self.commitment.tree.write(w)?;

    // Original items in position order; their hashes are the leaf level
    w.write_u64::<LittleEndian>(self.commitment.leaves.len() as u64)?;
    len += 8;
    for leaf in &self.commitment.leaves {
      len += write_text(w, &leaf.original_data)?;
    }
    Ok(len)
  }

  fn read<R: Read>(r: &mut R) -> Result<Self> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
      return Err(Error::InvalidData("not a tree file".to_string()));
    }
    let version = r.read_u8()?;
    if version != VERSION {
      return Err(Error::InvalidData(format!("unsupported tree file version: {version}")));
    }
    let millis = r.read_i64::<LittleEndian>()?;
    let created_at = DateTime::<Utc>::from_timestamp_millis(millis)
      .ok_or_else(|| Error::InvalidData(format!("creation time out of range: {millis}")))?;
    let name = read_text(r)?;

    let tree = MerkleTree::read(r)?;

    let count = r.read_u64::<LittleEndian>()?;
    if count != tree.leaf_count() as u64 {
      return Err(Error::InvalidData(format!("{count} items stored for {} leaves", tree.leaf_count())));
    }
    let mut leaves = Vec::with_capacity(tree.leaf_count());
    for (position, hash) in tree.leaf_hashes().iter().enumerate() {
      let original_data = read_text(r)?;
      leaves.push(LeafRecord { position, original_data, hash: hash.clone() });
    }
    Ok(TreeFile { name, created_at, commitment: Commitment { tree, leaves } })
  }
}

fn write_text<W: Write>(w: &mut W, text: &str) -> Result<usize> {
  w.write_u32::<LittleEndian>(to_u32(text.len(), "text length")?)?;
  w.write_all(text.as_bytes())?;
  Ok(4 + text.len())
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
  u32::try_from(value).map_err(|_| Error::InvalidData(format!("{what} {value} does not fit in 4 bytes")))
}

fn read_text<R: Read>(r: &mut R) -> Result<String> {
  let len = r.read_u32::<LittleEndian>()? as usize;
  let mut bytes = Vec::new();
  r.by_ref().take(len as u64).read_to_end(&mut bytes)?;
  if bytes.len() != len {
    return Err(Error::InvalidData(format!("text truncated at {} of {len} bytes", bytes.len())));
  }
  String::from_utf8(bytes).map_err(|e| Error::InvalidData(e.to_string()))
}
