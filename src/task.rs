//! Build-integration adapter: a string-typed task definition that delegates
//! to the archive builder, for invocation from build systems.

use crate::archive::{build, BuildOptions, CompressionKind, DEFAULT_MIN_SAVINGS};
use crate::error::{PakError, Result};
use crate::keys::parse_key_hex;
use std::path::PathBuf;

/// Task parameters as a build system would pass them: strings in, defaults
/// applied here.
#[derive(Debug, Clone)]
pub struct BuildTask {
    pub input_dir: PathBuf,
    pub out_file: PathBuf,
    /// "brotli" or "deflate"; anything else disables compression.
    pub compress: String,
    /// Parsed as f64; defaults to 0.03 when absent.
    pub min_savings: Option<String>,
    /// Presence implies encryption.
    pub key_hex: Option<String>,
    pub overwrite: bool,
}

/// Run a build task, surfacing any failure to the caller.
pub fn run(task: &BuildTask) -> Result<()> {
    let compression = match task.compress.to_ascii_lowercase().as_str() {
        "brotli" => CompressionKind::Brotli,
        "deflate" => CompressionKind::Deflate,
        _ => CompressionKind::None,
    };

    let min_savings = match &task.min_savings {
        Some(raw) => raw
            .parse::<f64>()
            .map_err(|_| PakError::Usage(format!("invalid MinSavings value: {raw}")))?,
        None => DEFAULT_MIN_SAVINGS,
    };

    let key = match &task.key_hex {
        Some(hex_key) => Some(parse_key_hex(hex_key)?),
        None => None,
    };

    if task.out_file.exists() && !task.overwrite {
        return Err(PakError::Usage(format!(
            "output file already exists: {}",
            task.out_file.display()
        )));
    }

    let options = BuildOptions {
        compression,
        min_savings,
        key,
    };
    build(&task.input_dir, &task.out_file, &options)
}
