//! pakmerge - merges Borderlands 3 pakfiles into a single game-path tree.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use pakmerge::decoder::DEFAULT_DECODER;
use pakmerge::{
    discover_pakfiles, sort_pakfiles, Decoder, MergeConfig, Pakfile, PakMerger, PathNormalizer,
    PruneRules, Settings,
};
use std::io::BufRead;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pakmerge")]
#[command(version)]
#[command(about = "Unpack Borderlands 3 pakfiles in load order into a single merged tree")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (use RUST_LOG=debug for more detail)
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// How to reach the decoder. Unset flags fall back to saved settings.
#[derive(Args)]
struct DecoderArgs {
    /// UnrealPak executable (name or path)
    #[arg(short = 'u', long)]
    unrealpak: Option<String>,

    /// Run UnrealPak through this program (usually wine64)
    #[arg(long)]
    wine: Option<PathBuf>,

    /// WINEPREFIX for the decoder
    #[arg(long, env = "PAKMERGE_WINEPREFIX")]
    wineprefix: Option<PathBuf>,

    /// Crypto config JSON holding the pak encryption key
    #[arg(short, long)]
    crypto: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract pakfiles and merge them into one directory
    Extract {
        /// Pakfiles, or directories containing pakfiles
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Directory to merge into
        #[arg(short = 'e', long)]
        extract_to: Option<PathBuf>,

        /// Scratch directory (defaults to a folder inside the destination)
        #[arg(long)]
        temp_dir: Option<PathBuf>,

        #[command(flatten)]
        decoder: DecoderArgs,

        /// Also merge the audio-only pakfiles
        #[arg(long)]
        keep_audio: bool,

        /// Don't prune anything after extraction
        #[arg(long)]
        no_prune: bool,

        /// Remember the decoder, crypto and destination for next time
        #[arg(long)]
        save: bool,
    },

    /// Print the raw → canonical path mapping of pakfiles without extracting
    List {
        /// Pakfiles, or directories containing pakfiles
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        decoder: DecoderArgs,
    },

    /// Print pakfile names in merge order (reads names from stdin if none given)
    Sort {
        names: Vec<String>,
    },
}

fn build_decoder(args: &DecoderArgs, settings: &Settings) -> Result<Decoder> {
    let name = args
        .unrealpak
        .as_deref()
        .or(settings.decoder())
        .unwrap_or(DEFAULT_DECODER);
    let program = Decoder::locate(name).unwrap_or_else(|| PathBuf::from(name));

    let crypto = args
        .crypto
        .clone()
        .or_else(|| settings.crypto().map(PathBuf::from))
        .context("No crypto config given (use --crypto)")?;

    let mut decoder = Decoder::new(program, crypto);
    if let Some(wrapper) = args.wine.clone().or_else(|| settings.wrapper().map(PathBuf::from)) {
        decoder = decoder.with_wrapper(wrapper);
    }
    if let Some(prefix) = args
        .wineprefix
        .clone()
        .or_else(|| settings.wineprefix().map(PathBuf::from))
    {
        decoder = decoder.with_wineprefix(prefix);
    }
    Ok(decoder)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Only initialize logging if verbose or RUST_LOG is set
    if cli.verbose || std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env()
                    .add_directive(if cli.verbose { "pakmerge=debug".parse()? } else { "pakmerge=warn".parse()? }),
            )
            .init();
    }

    let settings = Settings::load();

    match cli.command {
        Commands::Extract {
            paths,
            extract_to,
            temp_dir,
            decoder,
            keep_audio,
            no_prune,
            save,
        } => {
            let pakfiles = discover_pakfiles(&paths)?;
            let destination = extract_to
                .or_else(|| settings.extract_to().map(PathBuf::from))
                .context("No destination given (use --extract-to)")?;
            let decoder_args = decoder;
            let decoder = build_decoder(&decoder_args, &settings)?;

            let prune = if no_prune {
                PruneRules::none()
            } else {
                settings.prune_rules()?
            };

            let mut config = MergeConfig::new(&destination, decoder.clone())
                .with_prune(prune)
                .with_skip_audio_paks(!(keep_audio || settings.keep_audio_paks));
            if let Some(temp_dir) = temp_dir {
                config = config.with_temp_dir(temp_dir);
            }

            if save {
                let mut updated = settings.clone();
                updated.decoder = decoder.program().to_string_lossy().into_owned();
                updated.crypto = decoder.crypto_config().to_string_lossy().into_owned();
                updated.extract_to = destination.to_string_lossy().into_owned();
                if let Some(wrapper) = decoder.wrapper() {
                    updated.wrapper = wrapper.to_string_lossy().into_owned();
                }
                if let Some(prefix) = &decoder_args.wineprefix {
                    updated.wineprefix = prefix.to_string_lossy().into_owned();
                }
                updated.save()?;
                println!("Saved settings to {}", Settings::settings_path()?.display());
            }

            println!("pakmerge - merging {} pakfiles into {}", pakfiles.len(), destination.display());
            println!();

            let merger = PakMerger::new(config)?;
            let report = merger.run(&pakfiles)?;

            println!("\n=== Merge Summary ===");
            println!("Pakfiles:  {} merged, {} audio-only skipped",
                report.processed.len(), report.skipped_audio.len());
            println!("Files:     {} placed", report.files_moved());
            println!("Pruned:    {}", report.pruned());
        }

        Commands::List { paths, decoder } => {
            let mut pakfiles = discover_pakfiles(&paths)?;
            sort_pakfiles(&mut pakfiles);
            let decoder = build_decoder(&decoder, &settings)?.with_progress(false);
            let normalizer = PathNormalizer::default();

            for pak in &pakfiles {
                let mapping = decoder.build_mapping(pak, &normalizer)?;
                println!("=== {} (patch {}) ===", pak, pak.patch());
                for (raw, canonical) in mapping.iter() {
                    println!("{} -> {}", raw, canonical);
                }
                eprintln!("Total: {} files\n", mapping.len());
            }
        }

        Commands::Sort { names } => {
            let names = if names.is_empty() {
                let mut lines = Vec::new();
                for line in std::io::stdin().lock().lines() {
                    let line = line.context("Failed to read stdin")?;
                    let line = line.trim();
                    if !line.is_empty() {
                        lines.push(line.to_string());
                    }
                }
                lines
            } else {
                names
            };
            if names.is_empty() {
                bail!("No pakfile names given");
            }

            let mut pakfiles = names
                .iter()
                .map(|name| Pakfile::new(name.as_str(), 0))
                .collect::<pakmerge::Result<Vec<_>>>()?;
            sort_pakfiles(&mut pakfiles);
            for pak in &pakfiles {
                println!("{}", pak);
            }
        }
    }

    Ok(())
}
