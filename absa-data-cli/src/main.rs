use std::error::Error;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use absa_data::config::{EmbeddingConfig, PrepConfig};
use absa_data::dataset::{load_or_fit_vocab, vocab_cache_path, AbsaDatasetReader, DatasetName};
use absa_data::get_version;
use absa_data::vocab::Tokenizer;

#[derive(Debug, Args)]
struct DirArgs {
    /// JSON configuration file; flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

impl DirArgs {
    fn load(&self) -> Result<PrepConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => PrepConfig::from_file(path)?,
            None => PrepConfig::default(),
        };
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(cache_dir) = &self.cache_dir {
            config.cache_dir = cache_dir.clone();
        }
        Ok(config)
    }
}

#[derive(Debug, Args)]
#[clap(
    author,
    about = "Prepare train/test records and the embedding matrix of a dataset",
    version = get_version(),
)]
struct PrepareArgs {
    #[command(flatten)]
    dirs: DirArgs,

    /// Build static embeddings from this word-vector file.
    #[arg(short, long, conflicts_with = "model_dir")]
    word_vectors: Option<PathBuf>,

    /// Dimension of the word-vector file.
    #[arg(short, long, default_value = "300")]
    embed_dim: usize,

    /// Build contextual embeddings with the encoder in this directory.
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    #[arg(short, long)]
    seed: Option<u64>,

    /// Write train.jsonl and test.jsonl to this directory.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// One of: restaurant, laptop, restaurant16.
    dataset: String,
}

#[derive(Debug, Args)]
#[clap(
    author,
    about = "Load or fit the vocabulary of a dataset",
    version = get_version(),
)]
struct VocabArgs {
    #[command(flatten)]
    dirs: DirArgs,

    dataset: String,
}

#[derive(Debug, Args)]
#[clap(
    author,
    about = "Encode lines from stdin into index sequences",
    version = get_version(),
)]
struct EncodeArgs {
    vocab_file: PathBuf,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Prepare(PrepareArgs),
    Vocab(VocabArgs),
    Encode(EncodeArgs),
}

#[derive(Debug, Parser)]
#[clap(
    name = "absa-data",
    author,
    about = "An aspect-based sentiment analysis data preparation command line interface",
    version = get_version(),
)]
struct CommandArgs {
    #[clap(subcommand)]
    command: Commands,
}

fn prepare(args: PrepareArgs) -> Result<(), Box<dyn Error>> {
    let dataset: DatasetName = args.dataset.parse()?;

    let mut config = args.dirs.load()?;
    if let Some(path) = args.word_vectors {
        config.embedding = EmbeddingConfig::WordVectors {
            path,
            embed_dim: args.embed_dim,
        };
    } else if let Some(model_dir) = args.model_dir {
        config.embedding = EmbeddingConfig::Contextual { model_dir };
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let prepared = AbsaDatasetReader::new(dataset, &config)?;

    if let Some(output_dir) = &args.output_dir {
        fs::create_dir_all(output_dir)?;
        prepared.train_data.write_jsonl(&output_dir.join("train.jsonl"))?;
        prepared.test_data.write_jsonl(&output_dir.join("test.jsonl"))?;
        log::info!("records written to {}", output_dir.display());
    }

    println!(
        "{}: {} train, {} test, vocabulary {}, embedding dim {}",
        dataset,
        prepared.train_data.len(),
        prepared.test_data.len(),
        prepared.tokenizer.len(),
        prepared
            .embedding_matrix
            .embed_dim()
            .map_or_else(|| "-".to_string(), |dim| dim.to_string()),
    );
    Ok(())
}

fn vocab(args: VocabArgs) -> Result<(), Box<dyn Error>> {
    let dataset: DatasetName = args.dataset.parse()?;
    let config = args.dirs.load()?;

    let cache_path = vocab_cache_path(&config.cache_dir, dataset.tag());
    let (tokenizer, status) = load_or_fit_vocab(&dataset.files(&config.data_dir), &cache_path)?;

    println!("{}: {} words ({:?}) {}", dataset, tokenizer.len(), status, cache_path.display());
    Ok(())
}

fn encode(args: EncodeArgs) -> Result<(), Box<dyn Error>> {
    let tokenizer = Tokenizer::load(args.vocab_file.as_path())?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut writer = io::BufWriter::new(stdout.lock());

    for line in stdin.lock().lines() {
        let line = line?;
        let indices: Vec<String> = tokenizer
            .encode(&line)
            .iter()
            .map(|idx| idx.to_string())
            .collect();
        writeln!(writer, "{}", indices.join(" "))?;
    }

    writer.flush()?;
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = CommandArgs::parse();

    match args.command {
        Commands::Prepare(args) => prepare(args),
        Commands::Vocab(args) => vocab(args),
        Commands::Encode(args) => encode(args),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
