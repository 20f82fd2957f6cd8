//! Single-file compress/decompress commands.

use indicatif::{ProgressBar, ProgressStyle};
use packarc_archive::{Format, detect, gzip};
use packarc_core::error::{PackArcError, Result};
use packarc_lzma::{LzmaEncoder, LzmaOptions};
use std::fs;
use std::path::{Path, PathBuf};

fn level_options(level: u8) -> LzmaOptions {
    let level = level.min(9);
    let dict_size = match level {
        0 => 1 << 16,
        1 => 1 << 18,
        2 => 1 << 19,
        3 => 1 << 20,
        4 => 1 << 21,
        5 => 1 << 22,
        6 => 1 << 23,
        7 => 1 << 24,
        8 => 1 << 25,
        _ => 1 << 26,
    };
    let nice_len = match level {
        0..=3 => 16,
        4..=6 => 32,
        7 | 8 => 64,
        _ => 128,
    };
    LzmaOptions {
        dict_size,
        nice_len,
        ..Default::default()
    }
}

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{bar:30} {bytes}/{total_bytes} {msg}")
            .expect("static template"),
    );
    bar
}

/// Compress one file into `.lzma` or `.gz`.
pub fn compress(input: &Path, output: Option<&Path>, format: &str, level: u8) -> Result<()> {
    let data = fs::read(input)?;
    let (default_ext, packed) = match format {
        "lzma" => {
            let mut encoder = LzmaEncoder::new(level_options(level))?;
            let mut out = Vec::new();
            let bar = progress_bar(data.len() as u64);
            let total = data.len() as u64;
            let mut on_progress = |fraction: f32, _label: &str| {
                bar.set_position((fraction as f64 * total as f64) as u64);
            };
            encoder.encode_with_progress(
                &mut &data[..],
                &mut out,
                Some(data.len() as u64),
                &mut on_progress,
            )?;
            bar.finish_and_clear();
            ("lzma", out)
        }
        "gzip" | "gz" => {
            let name = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let header = gzip::GzipHeader::with_filename(&name).with_mtime_now();
            ("gz", gzip::compress_with_header(&data, level, &header)?)
        }
        other => {
            return Err(PackArcError::unsupported_method(other));
        }
    };

    let path = output.map(PathBuf::from).unwrap_or_else(|| {
        let mut name = input.as_os_str().to_owned();
        name.push(format!(".{default_ext}"));
        PathBuf::from(name)
    });
    fs::write(&path, &packed)?;
    println!(
        "{} -> {} ({} -> {} bytes)",
        input.display(),
        path.display(),
        data.len(),
        packed.len()
    );
    Ok(())
}

/// Decompress a `.lzma`, `.gz` or `.Z` file, dispatching on content.
pub fn decompress(input: &Path, output: Option<&Path>) -> Result<()> {
    let data = fs::read(input)?;
    let by_extension = match input.extension().and_then(|e| e.to_str()) {
        Some("lzma") => Some(Format::Lzma),
        Some("gz") => Some(Format::Gzip),
        Some("Z") | Some("z") => Some(Format::Compress),
        _ => None,
    };
    let format = by_extension.unwrap_or_else(|| detect(&data));

    let unpacked = match format {
        Format::Gzip => gzip::decompress(&mut &data[..])?,
        Format::Compress => packarc_lzw::decompress(&data[..])?,
        Format::Lzma => packarc_lzma::decompress(&data[..])?,
        other => {
            return Err(PackArcError::unsupported_method(format!("{other:?}")));
        }
    };

    // Default to the input minus its compression extension.
    let path = output.map(PathBuf::from).unwrap_or_else(|| {
        let candidate = input.with_extension("");
        if candidate == input {
            input.with_extension("out")
        } else {
            candidate
        }
    });
    fs::write(&path, &unpacked)?;
    println!(
        "{} -> {} ({} -> {} bytes)",
        input.display(),
        path.display(),
        data.len(),
        unpacked.len()
    );
    Ok(())
}
