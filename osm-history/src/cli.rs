// spec.md §6: "CLI surface (minimal, retained only for completeness)." The
// resolver core treats argument parsing as out of scope, so this is a small
// hand-rolled parser rather than a dependency: two positionals plus four
// named flags, each with the default the spec gives.

use osm_hist_base::ShardMode;
use std::path::PathBuf;

pub struct Cli {
    pub src_file: PathBuf,
    pub dest_output_dir: PathBuf,
    pub num_workers: usize,
    pub num_shards: usize,
    pub merge_shards: bool,
    pub hash_partition_shards: bool,
    pub geometry_builder: PathBuf,
}

impl Cli {
    pub fn shard_mode(&self) -> ShardMode {
        if self.hash_partition_shards {
            ShardMode::Hash
        } else {
            ShardMode::Counter
        }
    }
}

const USAGE: &str = "\
osm-history <src_file> <dest_output_dir> [options]

options:
  --num_workers <N>           worker threads for the indexing pass (default 3)
  --num_shards <N>            index shards (default 3; raised to num_workers if lower)
  --merge_shards <bool>       merge per-worker shards before resolving (default true)
  --hash_partition_shards <bool>
                              hash-mode shard routing instead of counter mode (default false)
  --geometry_builder <path>  external geometry builder program (default osm-geometry-builder)";

pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Cli, String> {
    let mut positionals = Vec::new();
    let mut num_workers = 3usize;
    let mut num_shards = 3usize;
    let mut merge_shards = true;
    let mut hash_partition_shards = false;
    let mut geometry_builder = PathBuf::from("osm-geometry-builder");

    let mut args = args.into_iter().peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Err(USAGE.to_string()),
            "--num_workers" => num_workers = parse_value(&mut args, "--num_workers")?,
            "--num_shards" => num_shards = parse_value(&mut args, "--num_shards")?,
            "--merge_shards" => merge_shards = parse_value(&mut args, "--merge_shards")?,
            "--hash_partition_shards" => {
                hash_partition_shards = parse_value(&mut args, "--hash_partition_shards")?
            }
            "--geometry_builder" => {
                geometry_builder = parse_value(&mut args, "--geometry_builder")?
            }
            other if other.starts_with("--") => {
                return Err(format!("unrecognized option {other:?}\n\n{USAGE}"))
            }
            other => positionals.push(other.to_string()),
        }
    }

    if positionals.len() != 2 {
        return Err(format!(
            "expected 2 positional arguments, got {}\n\n{USAGE}",
            positionals.len()
        ));
    }

    Ok(Cli {
        src_file: PathBuf::from(&positionals[0]),
        dest_output_dir: PathBuf::from(&positionals[1]),
        num_workers,
        num_shards,
        merge_shards,
        hash_partition_shards,
        geometry_builder,
    })
}

fn parse_value<T, I>(args: &mut std::iter::Peekable<I>, flag: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    I: Iterator<Item = String>,
{
    let raw = args
        .next()
        .ok_or_else(|| format!("{flag} requires a value\n\n{USAGE}"))?;
    raw.parse::<T>()
        .map_err(|_| format!("invalid value {raw:?} for {flag}\n\n{USAGE}"))
}
