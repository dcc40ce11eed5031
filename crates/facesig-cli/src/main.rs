use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facesig_core::{embedding, quality, CosineMatcher, Embedding, Matcher, SubjectSignature};
use facesig_image::{FileSource, ImageSource};
use rayon::prelude::*;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "facesig", about = "Face embedding math and photo blur gating")]
struct Cli {
    /// TOML config file (defaults to $FACESIG_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score photos and report which ones are too blurry to enroll
    Quality {
        /// Image files to score
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// L2-normalize every vector in a JSON array of embeddings
    Normalize {
        /// JSON file: [[f32, ...], ...]
        embeddings: PathBuf,
    },
    /// Normalized centroid of a JSON array of embeddings
    Centroid {
        /// JSON file: [[f32, ...], ...]
        embeddings: PathBuf,
    },
    /// Build a gallery entry for one subject from its samples
    Signature {
        /// JSON file: [[f32, ...], ...]
        embeddings: PathBuf,
        #[arg(long)]
        id: String,
        #[arg(short, long)]
        label: String,
    },
    /// Cosine similarity between two embeddings
    Compare {
        /// JSON file: [f32, ...]
        a: PathBuf,
        /// JSON file: [f32, ...]
        b: PathBuf,
    },
    /// Match a probe embedding against a gallery of subject signatures
    Match {
        /// JSON file: [f32, ...]
        probe: PathBuf,
        /// JSON file: array of signatures as printed by `signature`
        gallery: PathBuf,
        /// Override the configured similarity threshold
        #[arg(short, long)]
        threshold: Option<f32>,
    },
}

#[derive(Serialize)]
struct QualityLine {
    path: String,
    variance: Option<f64>,
    blurry: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    tracing::debug!(?config, "configuration");

    match cli.command {
        Commands::Quality { images } => {
            let lines: Vec<QualityLine> = images
                .par_iter()
                .map(|path| score_image(path, &config))
                .collect();
            for line in &lines {
                println!("{}", serde_json::to_string(line)?);
            }
        }
        Commands::Normalize { embeddings } => {
            let vectors = read_vectors(&embeddings)?;
            let normalized = embedding::normalize_each(&vectors)?;
            println!("{}", serde_json::to_string(&normalized)?);
        }
        Commands::Centroid { embeddings } => {
            let vectors = read_vectors(&embeddings)?;
            let centroid = embedding::centroid(&vectors)?;
            println!("{}", serde_json::to_string(&centroid)?);
        }
        Commands::Signature {
            embeddings,
            id,
            label,
        } => {
            let samples: Vec<Embedding> = read_vectors(&embeddings)?
                .into_iter()
                .map(Embedding::new)
                .collect();
            let signature = SubjectSignature::from_samples(id, label, &samples)?;
            println!("{}", serde_json::to_string(&signature)?);
        }
        Commands::Compare { a, b } => {
            let a = read_json::<Vec<f32>>(&a)?;
            let b = read_json::<Vec<f32>>(&b)?;
            println!("{}", embedding::cosine(&a, &b)?);
        }
        Commands::Match {
            probe,
            gallery,
            threshold,
        } => {
            let probe = Embedding::new(read_json::<Vec<f32>>(&probe)?);
            let gallery = read_json::<Vec<SubjectSignature>>(&gallery)?;
            let threshold = threshold.unwrap_or(config.similarity_threshold);
            let result = CosineMatcher.compare(&probe, &gallery, threshold)?;
            tracing::info!(
                matched = result.matched,
                similarity = result.similarity,
                threshold,
                "match complete"
            );
            println!("{}", serde_json::to_string(&result)?);
        }
    }

    Ok(())
}

/// Load and score one photo. A photo that cannot be loaded is reported as blurry.
fn score_image(path: &Path, config: &Config) -> QualityLine {
    let source = FileSource::new(path).with_max_dimension(config.max_dimension);
    let (buffer, error) = match source.load() {
        Ok(buffer) => (Some(buffer), None),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not load image; rejecting");
            (None, Some(e.to_string()))
        }
    };
    let score = quality::assess(buffer.as_ref(), &config.quality);
    QualityLine {
        path: path.display().to_string(),
        variance: score.variance,
        blurry: score.is_blurry,
        error,
    }
}

fn read_vectors(path: &Path) -> Result<Vec<Vec<f32>>> {
    read_json(path)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}
