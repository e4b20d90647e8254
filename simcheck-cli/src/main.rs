use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use simcheck::{
    Comparator, DocumentMeta, EntryId, GradeLevel, InMemoryIndex, InMemoryResultStore,
    IncomingDocument, IndexSnapshot, Partition, SimcheckConfig,
};

#[derive(Parser, Debug)]
#[clap(
    name = "simcheck",
    about = "A program to check submitted documents against a repository of earlier ones."
)]
struct Cli {
    /// File path to a TOML configuration. Defaults are used if omitted.
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// File path to the repository snapshot (JSON). Created on the first ingestion.
    #[clap(short = 'r', long, default_value = "repository.json")]
    repo: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Adds a document to the repository.
    Ingest(DocumentArgs),
    /// Compares a document against the repository and prints the result as JSON.
    Compare(DocumentArgs),
    /// Lists the documents of a partition as JSON.
    List(PartitionArgs),
    /// Removes a repository entry.
    Remove {
        /// Entry identifier printed by `ingest` or `list`.
        entry_id: String,
    },
}

#[derive(Args, Debug)]
struct PartitionArgs {
    /// Grade level in 1..=12.
    #[clap(short = 'g', long)]
    grade: String,

    /// Project type, compared case-insensitively.
    #[clap(short = 't', long)]
    project_type: String,
}

impl PartitionArgs {
    fn partition(&self) -> Result<Partition> {
        let grade: GradeLevel = self.grade.parse()?;
        Ok(Partition::new(grade, &self.project_type)?)
    }
}

#[derive(Args, Debug)]
struct DocumentArgs {
    #[clap(flatten)]
    partition: PartitionArgs,

    /// File path to the extracted text of the document.
    #[clap(short = 'i', long)]
    input: PathBuf,

    /// Document identifier. Defaults to the file stem.
    #[clap(long)]
    id: Option<String>,

    /// Display name. Defaults to the file name.
    #[clap(long)]
    name: Option<String>,

    /// Correlation id of the submitter.
    #[clap(long)]
    submitter: Option<String>,

    /// Language tag of the text.
    #[clap(long)]
    language: Option<String>,
}

impl DocumentArgs {
    fn document(&self) -> Result<IncomingDocument> {
        let raw_text = fs::read_to_string(&self.input)
            .with_context(|| format!("failed to read {}", self.input.display()))?;
        let file_name = |p: &Path| p.file_name().map(|s| s.to_string_lossy().into_owned());
        let id = self
            .id
            .clone()
            .or_else(|| self.input.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .context("cannot derive a document id, use --id")?;
        let name = self
            .name
            .clone()
            .or_else(|| file_name(&self.input))
            .unwrap_or_else(|| id.clone());

        let mut meta = DocumentMeta::new(id, name, self.partition.partition()?)
            .byte_size(raw_text.len() as u64);
        if let Some(submitter) = &self.submitter {
            meta = meta.submitter(submitter);
        }
        if let Some(language) = &self.language {
            meta = meta.language(language);
        }
        Ok(IncomingDocument::new(meta, raw_text))
    }
}

fn load_index(path: &Path, num_blocks: usize) -> Result<InMemoryIndex> {
    if !path.exists() {
        return Ok(InMemoryIndex::new(num_blocks)?);
    }
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let snapshot = IndexSnapshot::from_json(&json)
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok(InMemoryIndex::from_snapshot(num_blocks, snapshot)?)
}

/// Replaces the snapshot at `path` through a temporary sibling file and a rename.
fn save_index(path: &Path, index: &InMemoryIndex) -> Result<()> {
    let json = index.snapshot().to_json()?;
    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    let mut file = fs::File::create(&temp_path)
        .with_context(|| format!("failed to create {}", temp_path.display()))?;
    file.write_all(json.as_bytes())
        .and_then(|_| file.sync_all())
        .with_context(|| format!("failed to write {}", temp_path.display()))?;
    drop(file);

    fs::rename(&temp_path, path)
        .with_context(|| format!("failed to replace {}", path.display()))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SimcheckConfig::load(path)?,
        None => SimcheckConfig::default(),
    };
    let index = Arc::new(load_index(&cli.repo, config.candidates.num_blocks)?);
    tracing::debug!(repo = %cli.repo.display(), entries = index.len(), "repository loaded");
    let store = Arc::new(InMemoryResultStore::new());
    let comparator = Comparator::new(config, index.clone(), store)?;

    match &cli.command {
        Command::Ingest(args) => {
            let entry = comparator.ingest(&args.document()?).await?;
            save_index(&cli.repo, &index)?;
            print_json(&entry.summary())?;
        }
        Command::Compare(args) => {
            let doc = args.document()?;
            match comparator.compare(&doc).await {
                Ok(result) => print_json(&result)?,
                Err(e) => {
                    eprintln!("{}", serde_json::to_string_pretty(&e.report())?);
                    return Err(e).context("comparison failed");
                }
            }
        }
        Command::List(args) => {
            let entries = comparator.list(&args.partition()?).await?;
            print_json(&entries)?;
        }
        Command::Remove { entry_id } => {
            let entry_id: EntryId = entry_id
                .parse()
                .with_context(|| format!("invalid entry id {entry_id:?}"))?;
            if !comparator.remove(entry_id).await? {
                anyhow::bail!("no entry {entry_id} in {}", cli.repo.display());
            }
            save_index(&cli.repo, &index)?;
        }
    }
    Ok(())
}
