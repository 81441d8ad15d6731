//! Moral Bell CLI
//!
//! - `generate`: catalog -> requests.jsonl + manifest.json
//! - `analyze`:  results (+ manifest) -> report.json + text summary
//! - `cross`:    two single-source result sets -> cross-model report
//! - `compare`:  several reports -> cross-source consistency

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use moral_bell::analysis::{self, cross_source, ChshCalculator, Resolver, ResultSet};
use moral_bell::design::{DesignGenerator, DesignParams, Frame, Manifest, ScenarioCatalog};
use moral_bell::report::{compare_sources, Report};
use moral_bell::utils::init_logging;
use moral_bell::{EngineConfig, VerdictExtractor};

#[derive(Parser)]
#[command(name = "moral_bell", version, about = "Bell-type tests over judgment oracle verdicts")]
struct Cli {
    /// YAML or JSON engine configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Generate {
        #[arg(long)]
        catalog: PathBuf,
        #[arg(long, default_value_t = 10)]
        trials: u32,
        #[arg(long = "scenario")]
        scenarios: Vec<String>,
        #[arg(long = "language")]
        languages: Vec<String>,
        #[arg(long = "tense")]
        tenses: Vec<String>,
        /// `en:fr`
        #[arg(long = "cross-lingual", value_parser = parse_pair)]
        cross_lingual: Vec<(String, String)>,
        /// `present:past`
        #[arg(long = "cross-temporal", value_parser = parse_pair)]
        cross_temporal: Vec<(String, String)>,
        /// `en/present:fr/past`
        #[arg(long = "cross-dim", value_parser = parse_frame_pair)]
        cross_dimensional: Vec<(Frame, Frame)>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long, default_value = "design")]
        out_dir: PathBuf,
    },
    Analyze {
        #[arg(long)]
        results: PathBuf,
        #[arg(long)]
        manifest: Option<PathBuf>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long, default_value = "report.json")]
        out: PathBuf,
    },
    Cross {
        #[arg(long)]
        first: PathBuf,
        #[arg(long)]
        first_source: String,
        #[arg(long)]
        second: PathBuf,
        #[arg(long)]
        second_source: String,
        #[arg(long)]
        manifest: Option<PathBuf>,
        #[arg(long, default_value = "cross_report.json")]
        out: PathBuf,
    },
    Compare {
        #[arg(required = true, num_args = 2..)]
        reports: Vec<PathBuf>,
    },
}

fn parse_pair(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once(':') {
        Some((a, b)) if !a.is_empty() && !b.is_empty() => Ok((a.to_string(), b.to_string())),
        _ => Err(format!("expected `first:second`, got `{}`", raw)),
    }
}

fn parse_frame(raw: &str) -> std::result::Result<Frame, String> {
    match raw.split_once('/') {
        Some((language, tense)) if !language.is_empty() && !tense.is_empty() => Ok(Frame::new(language, tense)),
        _ => Err(format!("expected `language/tense`, got `{}`", raw)),
    }
}

fn parse_frame_pair(raw: &str) -> std::result::Result<(Frame, Frame), String> {
    let (a, b) = parse_pair(raw)?;
    Ok((parse_frame(&a)?, parse_frame(&b)?))
}

fn load_manifest(path: Option<&Path>) -> Result<Option<Manifest>> {
    path.map(|p| Manifest::load(p).with_context(|| format!("Failed to load manifest {}", p.display())))
        .transpose()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => EngineConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::from_env()?,
    };
    let _log_guard = init_logging(&config.log_filter, config.log_dir.as_deref());

    match cli.command {
        Command::Generate {
            catalog,
            trials,
            scenarios,
            languages,
            tenses,
            cross_lingual,
            cross_temporal,
            cross_dimensional,
            source,
            out_dir,
        } => {
            let catalog = ScenarioCatalog::load(&catalog)
                .with_context(|| format!("Failed to load catalog {}", catalog.display()))?;
            let params = DesignParams {
                scenarios,
                trials,
                languages,
                tenses,
                cross_lingual,
                cross_temporal,
                cross_dimensional,
                source,
            };

            let mut generator = DesignGenerator::new(catalog, &config)?;
            let output = generator.generate(&params)?;
            if output.requests.is_empty() {
                bail!("Design produced no requests; check catalog coverage for the requested languages and tenses");
            }

            std::fs::create_dir_all(&out_dir)?;
            let mut writer = BufWriter::new(File::create(out_dir.join("requests.jsonl"))?);
            for request in &output.requests {
                writeln!(writer, "{}", serde_json::to_string(request)?)?;
            }
            writer.flush()?;
            output.manifest.save(out_dir.join("manifest.json"))?;

            println!(
                "{} requests, {} configurations, {} skipped -> {}",
                output.summary.request_count,
                output.summary.configurations,
                output.summary.skipped.len(),
                out_dir.display()
            );
            for (cross_type, n) in &output.summary.by_cross_type {
                println!("  {:<6} {}", cross_type, n);
            }
        }

        Command::Analyze {
            results,
            manifest,
            source,
            out,
        } => {
            let set = ResultSet::load(&results)
                .with_context(|| format!("Failed to load results {}", results.display()))?;
            let manifest = load_manifest(manifest.as_deref())?;
            let extractor = VerdictExtractor::new(config.labels.clone(), config.excerpt_chars)?;
            let resolver = Resolver::new(&extractor)
                .with_manifest(manifest.as_ref())
                .with_source(source.clone());

            let calculator = ChshCalculator::new(config.classical_bound);
            let analysis = analysis::analyze(&resolver, &set, &calculator)
                .with_context(|| format!("{} is unusable", results.display()))?;

            let report = Report::from_analysis(analysis, source, &config);
            report.save(&out)?;
            print!("{}", report.render());
        }

        Command::Cross {
            first,
            first_source,
            second,
            second_source,
            manifest,
            out,
        } => {
            let manifest = load_manifest(manifest.as_deref())?;
            let extractor = VerdictExtractor::new(config.labels.clone(), config.excerpt_chars)?;
            let resolver = Resolver::new(&extractor).with_manifest(manifest.as_ref());

            let first_set = ResultSet::load(&first)?;
            let second_set = ResultSet::load(&second)?;
            let a = resolver.resolve(&first_set);
            let b = resolver.resolve(&second_set);

            let combined = cross_source(&a.observations, &b.observations, &first_source, &second_source);
            info!("{} cross-model observations", combined.len());

            let mut ledger = a.ledger;
            ledger.merge(&b.ledger);
            let calculator = ChshCalculator::new(config.classical_bound);
            let analysis = analysis::analyze_observations(&combined, ledger, a.records + b.records, &calculator)?;

            let report = Report::from_analysis(analysis, Some(format!("{}|{}", first_source, second_source)), &config);
            report.save(&out)?;
            print!("{}", report.render());
        }

        Command::Compare { reports } => {
            let loaded = reports
                .iter()
                .map(|p| Report::load(p).with_context(|| format!("Failed to load report {}", p.display())))
                .collect::<Result<Vec<_>>>()?;
            let comparison = compare_sources(&loaded, config.consistency_cv);
            print!("{}", comparison.render());
        }
    }

    Ok(())
}
