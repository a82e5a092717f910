use std::path::Path;

use clap::Parser;
use codevec::{
    ArtifactDir,
    ModelManager,
    PipelineConfig,
    VectorIndex,
    cli::{self, Cli, Command},
    config::resolve_max_length,
    embedding::Embedder,
    error::{self, Error},
    flatten::flatten_repositories,
    ingestion::{SkipReason, list_working_set, normalize_corpus},
    pipeline::run_pipeline,
    normalize::normalize_query,
    search,
    text_util::truncate_chars,
};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("CODEVEC_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = PipelineConfig::resolve(cli.config.as_deref())?;

    match cli.command {
        Command::Flatten(args) => cmd_flatten(config, &args)?,
        Command::Normalize(args) => cmd_normalize(&args.dir)?,
        Command::Build(args) => cmd_build(config, args)?,
        Command::Query(args) => cmd_query(config, args)?,
        Command::Neighbors(args) => cmd_neighbors(&args)?,
        Command::Completions(args) => args.generate(),
    }

    Ok(())
}

fn with_cli_extensions(
    config: PipelineConfig,
    extensions: &[String],
) -> PipelineConfig {
    if extensions.is_empty() {
        config
    } else {
        config.with_extensions(extensions)
    }
}

fn cmd_flatten(
    config: PipelineConfig,
    args: &cli::FlattenArgs,
) -> error::Result<()> {
    let config = with_cli_extensions(config, &args.extensions);
    let report =
        flatten_repositories(&args.root, args.dest.as_deref(), &config)?;

    println!(
        "Copied {} file(s) into {}",
        report.files.len(),
        report.target_dir.display()
    );
    if !report.failures.is_empty() {
        println!("{} file(s) could not be copied", report.failures.len());
    }
    Ok(())
}

fn cmd_normalize(dir: &Path) -> error::Result<()> {
    if !dir.is_dir() {
        return Err(Error::InvalidRoot(dir.to_path_buf()));
    }
    let files = list_working_set(dir)?;
    let report = normalize_corpus(dir, &files);

    println!(
        "Normalized {} file(s), skipped {} ({} unsupported, {} empty)",
        report.documents.len(),
        report.skipped.len(),
        report.skipped_because(&SkipReason::Unsupported),
        report.skipped_because(&SkipReason::Empty),
    );
    Ok(())
}

fn cmd_build(config: PipelineConfig, args: cli::BuildArgs) -> error::Result<()> {
    let mut config = with_cli_extensions(config, &args.extensions);
    let mut model = ModelManager::from_option(args.model);

    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    config.max_length = match args.max_length {
        Some(max_length) => max_length,
        None => resolve_max_length(model.model_id(), config.max_length),
    };
    config.validate()?;

    let artifacts = ArtifactDir::resolve(args.out.as_deref())?;
    let report = run_pipeline(
        &args.root,
        args.dest.as_deref(),
        &artifacts,
        &mut model,
        &config,
    )?;

    println!(
        "Copied {}, normalized {}, embedded {} file(s)",
        report.copied, report.normalized, report.embedded
    );
    println!(
        "Skipped: {} copy failure(s), {} unsupported, {} empty, {} embedding failure(s)",
        report.copy_failures.len(),
        report.skipped_because(&SkipReason::Unsupported),
        report.skipped_because(&SkipReason::Empty),
        report.embedding_failures.len(),
    );
    if report.index_written() {
        println!("Index written to {}", artifacts.root().display());
    } else {
        println!("Nothing was embedded; no index written");
        if report.stale_removed > 0 {
            println!(
                "Removed {} stale artifact(s) from {}",
                report.stale_removed,
                artifacts.root().display()
            );
        }
    }
    Ok(())
}

fn cmd_query(
    mut config: PipelineConfig,
    args: cli::QueryArgs,
) -> error::Result<()> {
    let artifacts = ArtifactDir::resolve(args.out.as_deref())?;
    let index = VectorIndex::load(&artifacts)?;

    let mut model = ModelManager::from_option(args.model);
    config.max_length = resolve_max_length(model.model_id(), config.max_length);

    let query = normalize_query(&args.text, args.lang);
    let vector = model.embed(truncate_chars(&query, config.max_chars()))?;

    let hits = index.search(&vector, args.count)?;
    print_hits(&hits, &args.text, args.json)
}

fn cmd_neighbors(args: &cli::NeighborsArgs) -> error::Result<()> {
    let artifacts = ArtifactDir::resolve(args.out.as_deref())?;
    let index = VectorIndex::load(&artifacts)?;

    let hits = index.neighbors_of(&args.file_name, args.count)?;
    print_hits(&hits, &args.file_name, args.json)
}

fn print_hits(
    hits: &[search::SearchHit],
    query: &str,
    json: bool,
) -> error::Result<()> {
    if json {
        println!("{}", search::format_json(hits, query)?);
    } else {
        print!("{}", search::format_human(hits));
    }
    Ok(())
}
