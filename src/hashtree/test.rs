use rand::Rng;

use super::*;
use crate::splitmix64;

fn items(n: u64) -> Vec<String> {
  (1..=n).map(|i| format!("{:016x}", splitmix64(i))).collect()
}

#[test]
fn verify_three_item_levels() {
  let tree = MerkleTree::build(&["a", "b", "c"], Algorithm::Sha256).unwrap();
  let a = "ca978112ca1bbdcafac231b39a23dc4da786eff8147c4e72b9807785afee48bb";
  let b = "3e23e8160039594a33894f6564e1b1348bbd7a0088d42c4acb73eeaed59c009d";
  let c = "2e7d2c03a9507ae265ecf5b5356885a53393a2029d241394997265a1a25aefc6";
  assert_eq!(3, tree.height());
  assert_eq!(vec![a, b, c], tree.leaf_hashes());
  assert_eq!(Algorithm::Sha256.combine(a, b), tree.levels()[1][0]);
  assert_eq!(Algorithm::Sha256.combine(c, c), tree.levels()[1][1]);
  assert_eq!("0bdf27bf7ec894ca7cadfe491ec1a3ece840f117989e8c5e9bd7086467bf6c38", tree.root_hash());
  assert_eq!(3, tree.leaf_count());
}

#[test]
fn verify_known_roots() {
  let tree = MerkleTree::build(&["a", "b", "c"], Algorithm::Md5).unwrap();
  assert_eq!("d54ff7d0c3b219bcd40fc4107d0ab4f5", tree.root_hash());

  let tree = MerkleTree::build(&["a", "b"], Algorithm::Sha1).unwrap();
  assert_eq!("5463504435e4dbf2b93a3a8a00ca78e36ea40e24", tree.root_hash());

  let tree = MerkleTree::build(&["a", "b", "c", "d"], Algorithm::Sha256).unwrap();
  assert_eq!("58c89d709329eb37285837b042ab6ff72c7c8f74de0446b091b6a0131c102cfd", tree.root_hash());
}

#[test]
fn test_single_leaf_root_is_leaf_hash() {
  let tree = MerkleTree::build(&["x"], Algorithm::Sha256).unwrap();
  assert_eq!(1, tree.height());
  assert_eq!(Algorithm::Sha256.digest("x"), tree.root_hash());
  assert_eq!(vec![vec![Algorithm::Sha256.digest("x")]], tree.levels());
}

#[test]
fn test_empty_input() {
  let empty: [&str; 0] = [];
  assert!(matches!(MerkleTree::build(&empty, Algorithm::Sha256), Err(Error::EmptyInput)));
  assert!(matches!(commit(&empty, Algorithm::Md5), Err(Error::EmptyInput)));
}

#[test]
fn test_build_named() {
  let tree = MerkleTree::build_named(&["a", "b", "c"], "MD5").unwrap();
  assert_eq!("d54ff7d0c3b219bcd40fc4107d0ab4f5", tree.root_hash());
  assert!(matches!(MerkleTree::build_named(&["a"], "sha512"), Err(Error::UnsupportedAlgorithm(_))));
  let empty: [&str; 0] = [];
  assert!(matches!(MerkleTree::build_named(&empty, "sha3"), Err(Error::UnsupportedAlgorithm(_))));
}

#[test]
fn test_empty_strings_are_items() {
  let tree = MerkleTree::build(&["", ""], Algorithm::Md5).unwrap();
  let empty = "d41d8cd98f00b204e9800998ecf8427e";
  assert_eq!(Algorithm::Md5.combine(empty, empty), tree.root_hash());
}

#[test]
fn test_level_sizes_halve() {
  for n in 1..=65 {
    let tree = MerkleTree::build(&items(n), Algorithm::Sha1).unwrap();
    let levels = tree.levels();
    assert_eq!(1, levels[0].len());
    assert_eq!(n as usize, levels[levels.len() - 1].len());
    for k in 0..levels.len() - 1 {
      assert_eq!(levels[k + 1].len().div_ceil(2), levels[k].len(), "n={n}, k={k}");
    }
    assert!(tree.is_consistent());
  }
}

#[test]
fn test_deterministic() {
  let mut rng = rand::rng();
  for _ in 0..16 {
    let n = rng.random_range(1..=200);
    let data = items(n);
    for algorithm in Algorithm::ALL {
      let a = MerkleTree::build(&data, algorithm).unwrap();
      let b = MerkleTree::build(&data, algorithm).unwrap();
      assert_eq!(a, b);
    }
  }
}

#[test]
fn test_rebuild_from_leaf_records() {
  let commitment = commit(&items(21), Algorithm::Sha256).unwrap();
  let rebuilt = MerkleTree::build(&commitment.items(), Algorithm::Sha256).unwrap();
  assert_eq!(commitment.tree.root_hash(), rebuilt.root_hash());
  assert_eq!(commitment.tree, rebuilt);
}

#[test]
fn test_commit_leaf_records() {
  let commitment = commit(&["a", "b", "a"], Algorithm::Md5).unwrap();
  assert_eq!(3, commitment.leaves.len());
  for (i, leaf) in commitment.leaves.iter().enumerate() {
    assert_eq!(i, leaf.position);
    assert_eq!(commitment.tree.leaf_hashes()[i], leaf.hash);
  }
  assert_eq!("0cc175b9c0f1b6a831c399e269772661", commitment.leaves[2].hash);
  assert_eq!(vec!["a", "b", "a"], commitment.items());
}

#[test]
fn test_any_single_change_moves_root() {
  let mut rng = rand::rng();
  let data = items(37);
  let tree = MerkleTree::build(&data, Algorithm::Md5).unwrap();
  for _ in 0..20 {
    let mut changed = data.clone();
    let position = rng.random_range(0..changed.len());
    changed[position].push('!');
    let other = MerkleTree::build(&changed, Algorithm::Md5).unwrap();
    assert_ne!(tree.root_hash(), other.root_hash(), "position={position}");
  }
}

#[test]
fn test_from_levels() {
  let tree = MerkleTree::build(&items(9), Algorithm::Sha256).unwrap();
  let restored = MerkleTree::from_levels(Algorithm::Sha256, tree.levels().to_vec()).unwrap();
  assert_eq!(tree, restored);

  assert!(matches!(MerkleTree::from_levels(Algorithm::Sha256, vec![]), Err(Error::InvalidData(_))));
  assert!(matches!(MerkleTree::from_levels(Algorithm::Sha1, tree.levels().to_vec()), Err(Error::InvalidData(_))));

  let mut levels = tree.levels().to_vec();
  levels.remove(1);
  assert!(matches!(MerkleTree::from_levels(Algorithm::Sha256, levels), Err(Error::InvalidData(_))));

  let mut levels = tree.levels().to_vec();
  let root = levels[0][0].clone();
  levels[0].push(root);
  assert!(matches!(MerkleTree::from_levels(Algorithm::Sha256, levels), Err(Error::InvalidData(_))));

  // a single-node level below the root is never produced by a build
  let x = Algorithm::Sha256.digest("x");
  let stacked = vec![vec![x.clone()], vec![x.clone()]];
  assert!(matches!(MerkleTree::from_levels(Algorithm::Sha256, stacked), Err(Error::InvalidData(_))));
  let stacked = vec![vec![x.clone()], vec![x.clone()], vec![x.clone(), x]];
  assert!(matches!(MerkleTree::from_levels(Algorithm::Sha256, stacked), Err(Error::InvalidData(_))));
}

#[test]
fn test_tampered_levels_are_inconsistent() {
  let tree = MerkleTree::build(&items(6), Algorithm::Sha256).unwrap();
  let mut levels = tree.into_levels();
  let last = levels.len() - 1;
  levels[last][4] = Algorithm::Sha256.digest("forged");
  let forged = MerkleTree::from_levels(Algorithm::Sha256, levels).unwrap();
  assert!(!forged.is_consistent());
}

#[test]
fn test_pair_of() {
  assert_eq!(0, pair_of(0, 1));
  assert_eq!(1, pair_of(0, 2));
  assert_eq!(0, pair_of(1, 2));
  assert_eq!(2, pair_of(2, 3));
  assert_eq!(3, pair_of(2, 4));
  assert_eq!(4, pair_of(5, 7));
  assert_eq!(6, pair_of(6, 7));
}

#[test]
fn test_snapshot_json() {
  let tree = MerkleTree::build(&["a", "b", "c"], Algorithm::Md5).unwrap();
  let json = serde_json::to_string(&tree).unwrap();
  assert!(json.contains("\"rootHash\":\"d54ff7d0c3b219bcd40fc4107d0ab4f5\""));
  assert!(json.contains("\"leafCount\":3"));
  assert!(json.contains("\"algorithm\":\"md5\""));
  let restored: MerkleTree = serde_json::from_str(&json).unwrap();
  assert_eq!(tree, restored);

  let forged = json.replace("\"leafCount\":3", "\"leafCount\":4");
  assert!(serde_json::from_str::<MerkleTree>(&forged).is_err());
}
