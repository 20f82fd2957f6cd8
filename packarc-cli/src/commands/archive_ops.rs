//! Archive create/list/extract commands.

use filetime::FileTime;
use packarc_archive::{ArReader, ArWriter, Format, TarReader, TarWriter, detect};
use packarc_core::entry::{Entry, EntryKind};
use packarc_core::error::{PackArcError, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

#[derive(Serialize)]
struct EntryInfo {
    name: String,
    size: u64,
    mtime: u64,
    mode: u32,
    kind: String,
}

fn entry_from_path(path: &Path) -> Result<Entry> {
    let meta = fs::metadata(path)?;
    // Leading "/" and "./" are stripped, the way tar stores member names.
    let name = path
        .to_string_lossy()
        .trim_start_matches("./")
        .trim_start_matches('/')
        .to_string();
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let mut entry = if meta.is_dir() {
        Entry::directory(name)
    } else {
        Entry::file(name, meta.len())
    };
    entry.mtime = mtime;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        entry.mode = meta.permissions().mode() & 0o7777;
    }
    Ok(entry)
}

fn archive_format(path: &Path, explicit: Option<&str>) -> Result<Format> {
    if let Some(name) = explicit {
        return match name {
            "tar" => Ok(Format::Tar),
            "ar" => Ok(Format::Ar),
            other => Err(PackArcError::unsupported_method(other)),
        };
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("tar") => Ok(Format::Tar),
        Some("ar") | Some("a") => Ok(Format::Ar),
        _ => Err(PackArcError::invalid_operation(
            "cannot infer archive format; pass --format tar|ar",
        )),
    }
}

/// Create a tar or ar archive from the given files.
pub fn create(archive: &Path, files: &[PathBuf], format: Option<&str>) -> Result<()> {
    let format = archive_format(archive, format)?;
    match format {
        Format::Tar => {
            let mut writer = TarWriter::new(Vec::new());
            for path in files {
                let entry = entry_from_path(path)?;
                let data = if entry.is_file() {
                    fs::read(path)?
                } else {
                    Vec::new()
                };
                writer.append(&entry, &data)?;
            }
            fs::write(archive, writer.finish()?)?;
        }
        Format::Ar => {
            let mut writer = ArWriter::new(Vec::new());
            for path in files {
                let entry = entry_from_path(path)?;
                if !entry.is_file() {
                    return Err(PackArcError::invalid_operation(
                        "ar archives hold plain files only",
                    ));
                }
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let data = fs::read(path)?;
                let mut member = Entry::file(name, data.len() as u64);
                member.mtime = entry.mtime;
                member.mode = entry.mode;
                writer.append(&member, &data)?;
            }
            fs::write(archive, writer.finish()?)?;
        }
        _ => unreachable!(),
    }
    println!("created {} ({} entries)", archive.display(), files.len());
    Ok(())
}

fn collect_entries(archive: &Path) -> Result<Vec<(Entry, Vec<u8>)>> {
    let data = fs::read(archive)?;
    match detect(&data) {
        Format::Tar => Ok(TarReader::new(&data[..])
            .entries()?
            .into_iter()
            .map(|e| (e.entry, e.data))
            .collect()),
        Format::Ar => Ok(ArReader::new(&data[..])
            .entries()?
            .into_iter()
            .map(|e| (e.entry, e.data))
            .collect()),
        other => Err(PackArcError::unsupported_method(format!("{other:?}"))),
    }
}

/// List archive entries as a table or JSON.
pub fn list(archive: &Path, json: bool) -> Result<()> {
    let entries = collect_entries(archive)?;
    if json {
        let infos: Vec<EntryInfo> = entries
            .iter()
            .map(|(entry, _)| EntryInfo {
                name: entry.name.clone(),
                size: entry.size,
                mtime: entry.mtime,
                mode: entry.mode,
                kind: format!("{:?}", entry.kind),
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&infos)
                .map_err(|e| PackArcError::invalid_operation(e.to_string()))?
        );
    } else {
        for (entry, _) in &entries {
            println!("{:o}\t{}\t{}\t{}", entry.mode, entry.size, entry.mtime, entry.name);
        }
    }
    Ok(())
}

/// Extract an archive into a directory.
pub fn extract(archive: &Path, dir: &Path, force: bool) -> Result<()> {
    let entries = collect_entries(archive)?;
    let mut written = 0usize;
    for (entry, data) in entries {
        // Never follow the entry name outside the destination.
        if entry.name.starts_with('/') || entry.name.split('/').any(|part| part == "..") {
            return Err(PackArcError::invalid_operation(format!(
                "refusing unsafe entry path {:?}",
                entry.name
            )));
        }
        let target = dir.join(&entry.name);
        match entry.kind {
            EntryKind::Directory => {
                fs::create_dir_all(&target)?;
            }
            EntryKind::File | EntryKind::Other => {
                if target.exists() && !force {
                    return Err(PackArcError::invalid_operation(format!(
                        "{} exists; pass --force to overwrite",
                        target.display()
                    )));
                }
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&target, &data)?;
                if entry.mtime != 0 {
                    let mtime = FileTime::from_unix_time(entry.mtime as i64, 0);
                    filetime::set_file_mtime(&target, mtime)?;
                }
                written += 1;
            }
            EntryKind::Symlink | EntryKind::Hardlink => {
                // Links are listed but not materialized.
                log::debug!("skipping link entry {:?}", entry.name);
            }
        }
    }
    println!("extracted {written} files to {}", dir.display());
    Ok(())
}
