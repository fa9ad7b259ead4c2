use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Parser, Subcommand};
use incident_lsi::{
    cluster::summarize_clusters,
    search::summarize_locations,
    ArtifactStore, DocumentRecord, Error, Pipeline, PipelineConfig, Result, ServingIndex,
};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "incident-lsi")]
#[command(author, version, about = "Latent semantic index over incident records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit every stage on a JSON Lines file and publish a new snapshot
    Build {
        /// Records as JSON Lines: {"id": .., "text": .., "metadata": {..}}
        #[arg(short, long)]
        input: PathBuf,

        /// Artifact store directory
        #[arg(short, long)]
        store: PathBuf,

        /// JSON config file; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Latent dimensions
        #[arg(long)]
        k: Option<usize>,

        /// Number of clusters
        #[arg(long)]
        clusters: Option<usize>,

        #[arg(long)]
        max_features: Option<usize>,

        #[arg(long)]
        min_df: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        /// Write the cluster report as JSON here
        #[arg(long)]
        report_json: Option<PathBuf>,

        /// Write the 2D layout as JSON here
        #[arg(long)]
        layout_json: Option<PathBuf>,
    },

    /// Query the current snapshot once
    Search {
        #[arg(short, long)]
        store: PathBuf,

        /// Query text
        query: String,

        /// Number of results
        #[arg(short = 'k', long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
        top_k: u64,

        /// Print location counts over the results
        #[arg(long)]
        locations: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read queries from stdin until EOF or "quit"
    Interactive {
        #[arg(short, long)]
        store: PathBuf,

        #[arg(short = 'k', long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
        top_k: u64,
    },

    /// Print the cluster report of a published snapshot
    Report {
        #[arg(short, long)]
        store: PathBuf,

        /// Version to report on (default: current)
        #[arg(long)]
        version: Option<u64>,
    },

    /// Delete old snapshot versions
    Prune {
        #[arg(short, long)]
        store: PathBuf,

        /// Newest versions to keep
        #[arg(long, default_value = "3")]
        keep: usize,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Build {
            input,
            store,
            config,
            k,
            clusters,
            max_features,
            min_df,
            seed,
            report_json,
            layout_json,
        } => {
            let overrides = Overrides {
                k,
                clusters,
                max_features,
                min_df,
                seed,
            };
            build_command(
                &input,
                &store,
                config.as_deref(),
                overrides,
                report_json.as_deref(),
                layout_json.as_deref(),
            )
        }
        Commands::Search {
            store,
            query,
            top_k,
            locations,
            json,
        } => search_command(&store, &query, top_k as usize, locations, json),
        Commands::Interactive { store, top_k } => interactive_command(&store, top_k as usize),
        Commands::Report { store, version } => report_command(&store, version),
        Commands::Prune { store, keep } => prune_command(&store, keep),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            if e.needs_rebuild() {
                eprintln!("hint: run `incident-lsi build` to publish a snapshot");
            }
            ExitCode::FAILURE
        }
    }
}

struct Overrides {
    k: Option<usize>,
    clusters: Option<usize>,
    max_features: Option<usize>,
    min_df: Option<usize>,
    seed: Option<u64>,
}

fn read_records(path: &Path) -> Result<Vec<DocumentRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .map_err(|e| Error::Configuration(format!("{}:{}: {e}", path.display(), n + 1)))?;
        records.push(record);
    }
    Ok(records)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

fn build_command(
    input: &Path,
    store: &Path,
    config: Option<&Path>,
    overrides: Overrides,
    report_json: Option<&Path>,
    layout_json: Option<&Path>,
) -> Result<()> {
    let mut config = match config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(k) = overrides.k {
        config.k = k;
    }
    if let Some(n) = overrides.clusters {
        config.n_clusters = n;
    }
    if let Some(n) = overrides.max_features {
        config.max_features = n;
    }
    if let Some(n) = overrides.min_df {
        config.min_document_frequency = n;
    }
    if let Some(seed) = overrides.seed {
        config.seed = seed;
    }

    let records = read_records(input)?;
    info!(records = records.len(), input = %input.display(), "records read");

    let store = ArtifactStore::new(store);
    let (output, version) = Pipeline::new(config).run_and_publish(records, &store)?;

    print!("{}", output.report);
    if let Some(path) = report_json {
        write_json(path, &output.report)?;
    }
    if let Some(path) = layout_json {
        write_json(path, &output.layout)?;
    }
    let metadata = store.metadata(version)?;
    println!(
        "\npublished version {version}: {} documents, vocabulary {}, k {} (requested {}), explained variance {:.3}",
        metadata.dataset_info.document_count,
        metadata.dataset_info.vocab_size,
        metadata.dataset_info.effective_k,
        metadata.dataset_info.requested_k,
        metadata.explained_variance,
    );
    Ok(())
}

fn search_command(store: &Path, query: &str, top_k: usize, locations: bool, json: bool) -> Result<()> {
    let snapshot = ArtifactStore::new(store).load()?;
    let hits = snapshot.search(query, top_k)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else {
        print!("{hits}");
    }
    if locations {
        print!("{}", summarize_locations(&hits, 10));
    }
    Ok(())
}

fn interactive_command(store: &Path, top_k: usize) -> Result<()> {
    let index = ServingIndex::open(ArtifactStore::new(store))?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "query> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query, "quit" | "exit") {
            break;
        }
        // a failed reload keeps serving the previous snapshot
        if let Err(e) = index.reload() {
            error!(error = %e, "reload failed");
        }
        let hits = match index.search(query, top_k) {
            Ok(hits) => hits,
            Err(e) => {
                writeln!(stdout, "error: {e}")?;
                continue;
            }
        };
        if hits.is_empty() {
            writeln!(stdout, "no results")?;
        } else {
            write!(stdout, "{hits}")?;
            write!(stdout, "{}", summarize_locations(&hits, 10))?;
        }
    }
    Ok(())
}

fn report_command(store: &Path, version: Option<u64>) -> Result<()> {
    let store = ArtifactStore::new(store);
    let snapshot = match version {
        Some(v) => store.load_version(v)?,
        None => store.load()?,
    };
    let model = snapshot.model();
    let config = model.config();
    let report = summarize_clusters(
        model.clusters(),
        snapshot.documents(),
        snapshot.lexical(),
        model.vectorizer().vocabulary(),
        config.top_terms,
        config.examples_per_cluster,
    );
    print!("{report}");
    Ok(())
}

fn prune_command(store: &Path, keep: usize) -> Result<()> {
    let removed = ArtifactStore::new(store).prune(keep)?;
    println!("removed {} version(s): {removed:?}", removed.len());
    Ok(())
}
