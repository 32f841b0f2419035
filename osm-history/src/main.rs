// spec.md §6: top-level binary wiring the indexing pass and the resolution
// pass together behind the CLI surface. Everything interesting lives in the
// library crates; this is orchestration and process exit codes only.

mod cli;

use osm_hist_base::{Result, RunConfig};
use osm_hist_builder::ProcessGeometryBuilder;
use osm_hist_index::{FjallShardStore, TemporalStore};
use osm_hist_model::{JsonlSourceStream, SourceStream, SourceStreamFactory};
use osm_hist_resolve::{Lookup, MergedLookup, ResolutionPass, ShardedLookup};
use osm_hist_shard::ShardRouter;
use std::sync::Arc;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match cli::parse(args) {
        Ok(cli) => cli,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(2);
        }
    };

    init_tracing();

    if let Err(e) = run(cli) {
        tracing::error!(target: "osm_hist", "{e}");
        eprintln!("osm-history: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();
}

fn run(cli: cli::Cli) -> Result<()> {
    let mut config = RunConfig {
        num_workers: cli.num_workers,
        num_shards: cli.num_shards,
        merge_shards: cli.merge_shards,
        shard_mode: cli.shard_mode(),
        ..RunConfig::default()
    };
    config.normalize_shards();

    std::fs::create_dir_all(&cli.dest_output_dir)?;
    let index_dir = tempfile::tempdir()?;
    let work_dir = tempfile::tempdir()?;

    let src_file = cli.src_file.clone();
    let stream_factory: Arc<SourceStreamFactory> = Arc::new(move || {
        Ok(Box::new(JsonlSourceStream::open(&src_file)?) as Box<dyn SourceStream>)
    });

    tracing::info!(
        target: "osm_hist",
        num_workers = config.num_workers,
        num_shards = config.num_shards,
        merge_shards = config.merge_shards,
        "starting indexing pass"
    );
    let index_report = osm_hist_ingest::IndexPoolSupervisor::run(
        &config,
        index_dir.path(),
        "index",
        stream_factory,
    )?;
    tracing::info!(
        target: "osm_hist",
        nodes = index_report.nodes,
        ways = index_report.ways,
        relations = index_report.relations,
        "indexing pass complete"
    );

    let builder = ProcessGeometryBuilder::new(&cli.geometry_builder);

    let progress = if let Some(merged_path) = &index_report.merged_path {
        let store = FjallShardStore::open(merged_path, 0)?;
        let lookup = MergedLookup::new(store);
        run_resolution(&lookup, &builder, &config, &work_dir, &cli)?
    } else {
        let router = ShardRouter::new(config.num_shards, config.shard_mode);
        let shards: Vec<FjallShardStore> = index_report
            .shard_paths
            .iter()
            .map(|(shard, path)| FjallShardStore::open(path, *shard))
            .collect::<Result<_>>()?;
        let lookup = ShardedLookup::new(router, shards);
        run_resolution(&lookup, &builder, &config, &work_dir, &cli)?
    };

    tracing::info!(
        target: "osm_hist",
        nodes = progress.get(osm_hist_base::ProgressKind::Node),
        ways = progress.get(osm_hist_base::ProgressKind::Way),
        relations = progress.get(osm_hist_base::ProgressKind::Relation),
        "resolution pass complete"
    );
    Ok(())
}

fn run_resolution(
    lookup: &dyn Lookup,
    builder: &ProcessGeometryBuilder,
    config: &RunConfig,
    work_dir: &tempfile::TempDir,
    cli: &cli::Cli,
) -> Result<osm_hist_base::Progress> {
    let pass = ResolutionPass::new(lookup, builder, config, work_dir.path());
    let stream: Box<dyn SourceStream> = Box::new(JsonlSourceStream::open(&cli.src_file)?);
    tracing::info!(target: "osm_hist", "starting resolution pass");
    pass.run(stream, &cli.dest_output_dir)
}
