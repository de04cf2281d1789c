use std::path::Path;

use anyhow::{Context, Result, bail};
use sotrace::cli::{Cli, Commands, parse_cli};
use sotrace::input::load_post_ids;
use sotrace::logging::init_tracing;
use sotrace::output::{SimilarityCsvWriter, open_output};
use sotrace::runner::{run_changes, run_diff, run_similarity, run_summary};
use sotrace_analysis::{DirectoryDiffSink, LineageBuilder, SimilarityBand};
use sotrace_config::{SotraceConfig, load_config, validate_config, write_default_config};
use sotrace_store::SqliteStore;

fn main() -> Result<()> {
    let cli = parse_cli();
    init_tracing(cli.log_format);
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::InitConfig(args) = &cli.command {
        return init_config(&cli.config, args.force);
    }

    let mut config = load_config(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    cli.apply_overrides(&mut config);
    for warning in validate_config(&config) {
        tracing::warn!(code = warning.code, "config warning: {}", warning.message);
    }

    let post_ids = load_post_ids(&config.input.posts).with_context(|| {
        format!("failed to read post ids from {}", config.input.posts.display())
    })?;
    tracing::info!(
        posts = post_ids.len(),
        input = %config.input.posts.display(),
        "loaded post ids"
    );

    let store = SqliteStore::open(&config.store.database).with_context(|| {
        format!("failed to open database {}", config.store.database.display())
    })?;
    let builder = LineageBuilder::new(&store).with_progress_interval(config.run.progress_interval);

    match &cli.command {
        Commands::Summary(args) => {
            let path = args
                .output
                .clone()
                .unwrap_or_else(|| config.output.summary_path());
            let mut out = open_output(&path)
                .with_context(|| format!("failed to open summary output {}", path.display()))?;
            run_summary(&builder, &post_ids, args.format, &mut out)?;
        }
        Commands::Changes(args) => {
            let mut out = match &args.output {
                Some(path) => open_output(path)
                    .with_context(|| format!("failed to open changes output {}", path.display()))?,
                None => open_output(Path::new("-")).context("failed to open stdout")?,
            };
            run_changes(&builder, &post_ids, config.run.missing_policy, &mut out)?;
        }
        Commands::Similarity(args) => {
            let band = similarity_band(&config)?;
            let path = args
                .output
                .clone()
                .unwrap_or_else(|| config.output.similarity_path());
            let out = open_output(&path)
                .with_context(|| format!("failed to open similarity output {}", path.display()))?;
            let mut csv = SimilarityCsvWriter::new(out).context("failed to write CSV header")?;
            run_similarity(&builder, &post_ids, band, &mut csv)?;
            tracing::info!(rows = csv.rows(), output = %path.display(), "similarity CSV written");
        }
        Commands::Diff(args) => {
            let root = args
                .out_dir
                .clone()
                .unwrap_or_else(|| config.output.diff_path());
            let mut sink = DirectoryDiffSink::new(root);
            run_diff(&builder, &post_ids, &mut sink)?;
            tracing::info!(
                files = sink.written(),
                root = %sink.root().display(),
                "diff files written"
            );
        }
        Commands::InitConfig(_) => {}
    }

    Ok(())
}

fn similarity_band(config: &SotraceConfig) -> Result<SimilarityBand> {
    SimilarityBand::from_config(&config.similarity).context("invalid similarity band")
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, pass --force to overwrite", path.display());
    }

    write_default_config(path)
        .with_context(|| format!("failed to write config {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote default config");
    Ok(())
}
