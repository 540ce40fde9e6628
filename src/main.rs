use chrono::Local;
use clap::{Args, Parser, Subcommand};
use merkle_audit::document::TreeDocument;
use merkle_audit::store::TreeFile;
use merkle_audit::{
  Algorithm, Commitment, Error, MerkleTree, Result, detect_changes, proof_for_data, splitmix64,
  verify_single_change_in, verify_whole_tree,
};
use rand::Rng;
use serde::Serialize;
use std::fs::{create_dir_all, read_to_string};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod stat;

#[derive(Parser)]
#[command(name = "merkle-audit")]
#[command(author, version, about = "Commit ordered items to a binary hash tree, prove inclusion and detect tampering")]
struct Cli {
  #[command(subcommand)]
  command: Command,

  /// Print results as JSON
  #[arg(long, global = true)]
  json: bool,
}

#[derive(Subcommand)]
enum Command {
  /// Build a tree over the items and save it to a tree file
  Build {
    #[command(flatten)]
    items: ItemArgs,

    #[command(flatten)]
    algorithm: AlgorithmArg,

    /// Name recorded in the tree file
    #[arg(short, long, default_value = "tree")]
    name: String,

    /// Directory in which a new tree file is created
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Exact path of the tree file, overriding --dir
    #[arg(short, long)]
    output: Option<PathBuf>,
  },

  /// Print the levels and leaves of a tree file
  Show { file: PathBuf },

  /// Print the inclusion proof of one leaf
  Proof {
    file: PathBuf,

    /// Leaf position, starting at 0
    #[arg(short, long, conflicts_with = "data", required_unless_present = "data")]
    position: Option<usize>,

    /// Prove the first leaf holding this data
    #[arg(long)]
    data: Option<String>,
  },

  /// Check whether replacing one item changes its leaf hash
  VerifyChange {
    file: PathBuf,
    #[command(flatten)]
    change: ChangeArgs,
  },

  /// Report the positions whose items differ from the committed ones
  Detect {
    file: PathBuf,
    #[command(flatten)]
    items: ItemArgs,
  },

  /// Rebuild the whole tree with a substitution and compare root hashes
  VerifyTree {
    file: PathBuf,
    #[command(flatten)]
    change: ChangeArgs,
  },

  /// Measure build and proof times over growing item counts
  Bench {
    /// Largest number of items
    #[arg(default_value_t = 4096u64)]
    max_n: u64,

    #[command(flatten)]
    algorithm: AlgorithmArg,

    /// Number of item counts measured between 0 and max_n
    #[arg(long, default_value_t = 8u64)]
    division: u64,

    /// Repetitions per item count
    #[arg(long, default_value_t = 10usize)]
    trials: usize,

    /// Output directory for the CSV reports
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    #[arg(short, long, default_value_t = Local::now().format("%Y%m%d%H%M%S").to_string())]
    session: String,
  },
}

#[derive(Args)]
struct ItemArgs {
  /// Items in order
  items: Vec<String>,

  /// Read items from a file, one per line
  #[arg(short, long, conflicts_with = "items")]
  input: Option<PathBuf>,
}

impl ItemArgs {
  fn load(self) -> Result<Vec<String>> {
    match self.input {
      Some(path) => Ok(read_to_string(path)?.lines().map(str::to_string).collect()),
      None => Ok(self.items),
    }
  }
}

#[derive(Args)]
struct AlgorithmArg {
  /// Hash algorithm: sha256, sha1 or md5
  #[arg(short, long, env = "MERKLE_AUDIT_ALGORITHM", default_value = "sha256")]
  algorithm: String,
}

impl AlgorithmArg {
  fn parse(&self) -> Result<Algorithm> {
    Algorithm::from_str(&self.algorithm)
  }
}

#[derive(Args)]
struct ChangeArgs {
  /// Item as it was committed
  #[arg(long)]
  original: String,

  /// Item to substitute for it
  #[arg(long)]
  modified: String,
}

fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  match run(cli.command, cli.json) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      eprintln!("Error: {e}");
      ExitCode::FAILURE
    }
  }
}

fn run(command: Command, json: bool) -> Result<()> {
  match command {
    Command::Build { items, algorithm, name, dir, output } => {
      let algorithm = algorithm.parse()?;
      let items = items.load()?;
      let tree_file = TreeFile::new(&name, Commitment::new(&items, algorithm)?);
      let path = match output {
        Some(path) => {
          tree_file.save(&path)?;
          path
        }
        None => {
          create_dir_all(&dir)?;
          tree_file.save_in(&dir)?
        }
      };
      info!(path = %path.display(), leaves = items.len(), "tree saved");
      if json {
        println!("{}", TreeDocument::from_commitment(&tree_file.commitment).to_json_pretty()?);
      } else {
        println!("{} ({algorithm}, {} leaves)", tree_file.tree().root_hash(), items.len());
        println!("==> {}", path.display());
      }
    }
    Command::Show { file } => {
      let tree_file = TreeFile::load(&file)?;
      if json {
        println!("{}", TreeDocument::from_commitment(&tree_file.commitment).to_json_pretty()?);
      } else {
        show(&tree_file);
      }
    }
    Command::Proof { file, position, data } => {
      let tree_file = TreeFile::load(&file)?;
      let proof = match (position, data) {
        (Some(position), _) => tree_file.tree().prove(position)?,
        (None, Some(data)) => proof_for_data(tree_file.tree(), tree_file.leaves(), &data)?,
        (None, None) => return Err(Error::LeafNotFound("no position or data given".to_string())),
      };
      let valid = proof.verify(tree_file.tree().algorithm())?;
      if !valid {
        warn!(position = proof.position, "proof does not reproduce the stored root, the tree file may be damaged");
      }
      if json {
        print_json(&proof)?;
      } else {
        println!("leaf #{} {}", proof.position, proof.leaf_hash);
        for (i, step) in proof.path.iter().enumerate() {
          println!("  [{i}] {:<5} {}", step.direction.to_string(), step.hash);
        }
        println!("{}", if valid { "proof verified" } else { "proof does NOT verify" });
      }
    }
    Command::VerifyChange { file, change } => {
      let tree_file = TreeFile::load(&file)?;
      let algorithm = tree_file.tree().algorithm();
      let result = verify_single_change_in(tree_file.leaves(), &change.original, &change.modified, algorithm)?;
      if json {
        print_json(&result)?;
      } else {
        println!("original: {}", result.original_hash);
        println!("modified: {}", result.modified_hash);
        println!("{}", if result.changed { "changed" } else { "unchanged" });
      }
    }
    Command::Detect { file, items } => {
      let tree_file = TreeFile::load(&file)?;
      let items = items.load()?;
      let changes = detect_changes(tree_file.leaves(), &items, tree_file.tree().algorithm())?;
      if json {
        print_json(&changes)?;
      } else if changes.is_empty() {
        println!("no changes in {} items", items.len());
      } else {
        for change in &changes {
          println!("#{}: {:?} -> {:?}", change.position, change.original_data, change.current_data);
          println!("    {} -> {}", change.original_hash, change.current_hash);
        }
        println!("{} of {} items changed", changes.len(), items.len());
      }
    }
    Command::VerifyTree { file, change } => {
      let tree_file = TreeFile::load(&file)?;
      let tree = tree_file.tree();
      let verdict =
        verify_whole_tree(tree_file.leaves(), &change.original, &change.modified, tree.algorithm(), tree.root_hash())?;
      if json {
        print_json(&verdict)?;
      } else {
        println!("stored:   {}", verdict.stored_root_hash);
        println!("computed: {}", verdict.computed_root_hash);
        println!("{} ({} leaves)", verdict.message(), verdict.leaf_count);
      }
    }
    Command::Bench { max_n, algorithm, division, trials, output, session } => {
      let algorithm = algorithm.parse()?;
      create_dir_all(&output)?;
      bench(algorithm, max_n, division, trials, &output, &session)?;
    }
  }
  Ok(())
}

fn show(tree_file: &TreeFile) {
  let tree = tree_file.tree();
  println!("name:       {}", tree_file.name);
  println!("created at: {}", tree_file.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"));
  println!("algorithm:  {}", tree.algorithm());
  println!("root:       {}", tree.root_hash());
  println!("leaves:     {}", tree.leaf_count());
  for (k, level) in tree.levels().iter().enumerate() {
    println!("level {k}:");
    for hash in level {
      println!("  {hash}");
    }
  }
  for leaf in tree_file.leaves() {
    println!("#{} {} {:?}", leaf.position, leaf.hash, leaf.original_data);
  }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

fn bench(algorithm: Algorithm, max_n: u64, division: u64, trials: usize, dir: &Path, session: &str) -> Result<()> {
  println!("[{algorithm}::build+prove]");
  let mut rng = rand::rng();
  let mut build = stat::Report::new();
  let mut prove = stat::Report::new();
  let step = (max_n / division.max(1)).max(1);
  for n in (step..=max_n).step_by(step as usize) {
    let items = (1..=n).map(|i| format!("{:016x}", splitmix64(i))).collect::<Vec<_>>();
    for _ in 0..trials {
      let t0 = Instant::now();
      let tree = MerkleTree::build(&items, algorithm)?;
      build.add(n, t0.elapsed());

      let position = rng.random_range(0..items.len());
      let t0 = Instant::now();
      let proof = tree.prove(position)?;
      prove.add(n, t0.elapsed());

      if !proof.verify(algorithm)? {
        return Err(Error::MalformedProof(format!("proof of #{position} in {n} items does not verify")));
      }
    }
    if let (Some(b), Some(p)) = (build.single(n), prove.single(n)) {
      println!("  n={n}: build {b}; prove {p}");
    }
  }

  for (kind, report) in [("build", &build), ("prove", &prove)] {
    let path = dir.join(format!("{session}-{algorithm}-{kind}.csv"));
    report.save_to_csv(&path)?;
    println!("==> {}", path.to_string_lossy());
  }
  Ok(())
}
