//! Command-line front end over the archive builder and reader.

use anyhow::bail;
use clap::{Parser, Subcommand};
use snappak::{
    build, extract_all, list_entries, parse_key_hex, verify, BuildOptions, CompressionKind,
    StaticKeyProvider, DEFAULT_MIN_SAVINGS,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "snappak", version, about = "SNAPPAK content archive tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build an archive from a directory tree
    Build {
        input_dir: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Compress entries with brotli (default)
        #[arg(long, conflicts_with_all = ["deflate", "no_compress"])]
        brotli: bool,

        /// Compress entries with deflate
        #[arg(long, conflicts_with = "no_compress")]
        deflate: bool,

        /// Store all entries uncompressed
        #[arg(long)]
        no_compress: bool,

        /// Minimum savings ratio required to keep a compressed payload
        #[arg(long, default_value_t = DEFAULT_MIN_SAVINGS)]
        min_savings: f64,

        /// Encrypt every entry (requires --key)
        #[arg(long, requires = "key")]
        encrypt: bool,

        /// 64-hex-character AES-256 key
        #[arg(long)]
        key: Option<String>,
    },
    /// Print the entry table of an archive
    List { pak: PathBuf },
    /// Extract all entries to a directory
    Extract {
        pak: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// 64-hex-character AES-256 key for encrypted archives
        #[arg(long)]
        key: Option<String>,
    },
    /// Scan an archive and report per-entry integrity
    Verify {
        pak: PathBuf,

        /// 64-hex-character AES-256 key for encrypted archives
        #[arg(long)]
        key: Option<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Parse failures (no arguments, unrecognized subcommands) exit
            // with 1; --help and --version print to stdout and exit clean.
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Build {
            input_dir,
            output,
            brotli: _,
            deflate,
            no_compress,
            min_savings,
            encrypt,
            key,
        } => {
            let compression = if no_compress {
                CompressionKind::None
            } else if deflate {
                CompressionKind::Deflate
            } else {
                CompressionKind::Brotli
            };

            if !(0.0..=1.0).contains(&min_savings) {
                bail!("--min-savings must be between 0 and 1");
            }

            let key = match (encrypt, key) {
                (true, Some(hex_key)) => Some(parse_key_hex(&hex_key)?),
                _ => None,
            };

            let options = BuildOptions {
                compression,
                min_savings,
                key,
            };
            build(&input_dir, &output, &options)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::List { pak } => {
            list_entries(&pak, &mut std::io::stdout())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Extract { pak, output, key } => {
            extract_all(&pak, &output, key_provider(key.as_deref())?)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify { pak, key } => {
            let failures = verify(
                &pak,
                &mut std::io::stdout(),
                key_provider(key.as_deref())?,
            )?;
            if failures > 0 {
                bail!("{failures} entries failed verification");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn key_provider(
    hex_key: Option<&str>,
) -> anyhow::Result<Option<Arc<dyn snappak::KeyProvider>>> {
    match hex_key {
        Some(hex_key) => Ok(Some(Arc::new(StaticKeyProvider::from_hex(hex_key)?))),
        None => Ok(None),
    }
}
