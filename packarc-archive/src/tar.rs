//! tar (ustar, POSIX.1-1988) container support.
//!
//! Sequential reader and writer over 512-byte blocks. PAX extended headers
//! and GNU long-name entries are tolerated on read (long names are
//! applied, other records skipped); the writer emits plain ustar only.

use log::debug;
use packarc_core::entry::{Entry, EntryKind};
use packarc_core::error::{PackArcError, Result};
use std::io::{Read, Write};

/// tar block size.
pub const BLOCK_SIZE: usize = 512;

const TYPE_FILE: u8 = b'0';
const TYPE_HARDLINK: u8 = b'1';
const TYPE_SYMLINK: u8 = b'2';
const TYPE_DIR: u8 = b'5';
const TYPE_GNU_LONGNAME: u8 = b'L';
const TYPE_GNU_LONGLINK: u8 = b'K';
const TYPE_PAX: u8 = b'x';
const TYPE_PAX_GLOBAL: u8 = b'g';

fn parse_string(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).trim_end().to_string()
}

fn parse_octal(field: &[u8]) -> Result<u64> {
    let text = parse_string(field);
    let text = text.trim();
    if text.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(text, 8)
        .map_err(|_| PackArcError::invalid_header(format!("bad octal field {text:?}")))
}

fn write_octal(block: &mut [u8], value: u64) {
    // Fixed-width zero-padded octal with a trailing NUL.
    let width = block.len() - 1;
    let text = format!("{value:0width$o}");
    block[..width].copy_from_slice(&text.as_bytes()[text.len() - width..]);
    block[width] = 0;
}

fn header_checksum(block: &[u8; BLOCK_SIZE]) -> u32 {
    let mut sum = 0u32;
    for (i, &b) in block.iter().enumerate() {
        // The checksum field itself counts as spaces.
        sum += if (148..156).contains(&i) { 0x20 } else { b as u32 };
    }
    sum
}

/// One parsed entry with its data.
#[derive(Debug, Clone)]
pub struct TarEntry {
    /// Entry metadata.
    pub entry: Entry,
    /// Entry contents (empty for directories and links).
    pub data: Vec<u8>,
}

/// Sequential tar reader.
#[derive(Debug)]
pub struct TarReader<R> {
    inner: R,
    offset: u64,
    pending_long_name: Option<String>,
    pending_long_link: Option<String>,
    pax_path: Option<String>,
    done: bool,
}

impl<R: Read> TarReader<R> {
    /// Wrap a byte source positioned at the start of an archive.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            pending_long_name: None,
            pending_long_link: None,
            pax_path: None,
            done: false,
        }
    }

    fn read_block(&mut self) -> Result<[u8; BLOCK_SIZE]> {
        let mut block = [0u8; BLOCK_SIZE];
        self.inner
            .read_exact(&mut block)
            .map_err(|e| PackArcError::from_read(e, self.offset))?;
        self.offset += BLOCK_SIZE as u64;
        Ok(block)
    }

    fn read_data(&mut self, size: u64) -> Result<Vec<u8>> {
        let mut data = vec![0u8; size as usize];
        self.inner
            .read_exact(&mut data)
            .map_err(|e| PackArcError::from_read(e, self.offset))?;
        let padding = (BLOCK_SIZE as u64 - size % BLOCK_SIZE as u64) % BLOCK_SIZE as u64;
        let mut pad = vec![0u8; padding as usize];
        self.inner
            .read_exact(&mut pad)
            .map_err(|e| PackArcError::from_read(e, self.offset))?;
        self.offset += size + padding;
        Ok(data)
    }

    /// Read the next entry, or `None` at the end-of-archive marker.
    pub fn next_entry(&mut self) -> Result<Option<TarEntry>> {
        loop {
            if self.done {
                return Ok(None);
            }
            let block = self.read_block()?;
            if block.iter().all(|&b| b == 0) {
                self.done = true;
                return Ok(None);
            }

            let stored_checksum = parse_octal(&block[148..156])? as u32;
            let computed = header_checksum(&block);
            if stored_checksum != computed {
                return Err(PackArcError::malformed(
                    self.offset - BLOCK_SIZE as u64,
                    format!("tar header checksum {computed} != {stored_checksum}"),
                ));
            }

            let size = parse_octal(&block[124..136])?;
            let typeflag = block[156];

            match typeflag {
                TYPE_GNU_LONGNAME => {
                    let data = self.read_data(size)?;
                    self.pending_long_name = Some(parse_string(&data));
                    continue;
                }
                TYPE_GNU_LONGLINK => {
                    let data = self.read_data(size)?;
                    self.pending_long_link = Some(parse_string(&data));
                    continue;
                }
                TYPE_PAX => {
                    let data = self.read_data(size)?;
                    self.pax_path = parse_pax_path(&data);
                    continue;
                }
                TYPE_PAX_GLOBAL => {
                    self.read_data(size)?;
                    continue;
                }
                _ => {}
            }

            let mut name = parse_string(&block[0..100]);
            let ustar = &block[257..262] == b"ustar";
            if ustar {
                let prefix = parse_string(&block[345..500]);
                if !prefix.is_empty() {
                    name = format!("{prefix}/{name}");
                }
            }
            if let Some(long) = self.pending_long_name.take() {
                name = long;
            }
            if let Some(path) = self.pax_path.take() {
                name = path;
            }

            let kind = match typeflag {
                TYPE_FILE | 0 => EntryKind::File,
                TYPE_DIR => EntryKind::Directory,
                TYPE_SYMLINK => EntryKind::Symlink,
                TYPE_HARDLINK => EntryKind::Hardlink,
                _ => EntryKind::Other,
            };
            let mut link_target = match kind {
                EntryKind::Symlink | EntryKind::Hardlink => Some(parse_string(&block[157..257])),
                _ => None,
            };
            if let Some(long) = self.pending_long_link.take() {
                if link_target.is_some() {
                    link_target = Some(long);
                }
            }

            let data_offset = self.offset;
            let data = if kind == EntryKind::File || kind == EntryKind::Other {
                self.read_data(size)?
            } else {
                // Directories and links carry no data blocks.
                Vec::new()
            };

            let entry = Entry {
                name,
                size,
                mtime: parse_octal(&block[136..148])?,
                mode: parse_octal(&block[100..108])? as u32,
                uid: parse_octal(&block[108..116])? as u32,
                gid: parse_octal(&block[116..124])? as u32,
                kind,
                link_target,
                data_offset,
            };
            debug!("tar: entry {:?} ({} bytes)", entry.name, entry.size);
            return Ok(Some(TarEntry { entry, data }));
        }
    }

    /// Collect all remaining entries.
    pub fn entries(&mut self) -> Result<Vec<TarEntry>> {
        let mut all = Vec::new();
        while let Some(entry) = self.next_entry()? {
            all.push(entry);
        }
        Ok(all)
    }
}

fn parse_pax_path(data: &[u8]) -> Option<String> {
    // PAX records are "len key=value\n"; only `path` matters here.
    let text = String::from_utf8_lossy(data);
    for record in text.split('\n') {
        if let Some((_, rest)) = record.split_once(' ') {
            if let Some(path) = rest.strip_prefix("path=") {
                return Some(path.to_string());
            }
        }
    }
    None
}

/// Sequential ustar writer.
#[derive(Debug)]
pub struct TarWriter<W> {
    inner: W,
    finished: bool,
}

impl<W: Write> TarWriter<W> {
    /// Wrap a byte sink.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            finished: false,
        }
    }

    /// Append one entry with its data.
    pub fn append(&mut self, entry: &Entry, data: &[u8]) -> Result<()> {
        if entry.kind == EntryKind::File && entry.size != data.len() as u64 {
            return Err(PackArcError::invalid_operation(format!(
                "entry {} declares {} bytes but {} were supplied",
                entry.name,
                entry.size,
                data.len()
            )));
        }
        let block = build_header(entry)?;
        self.inner
            .write_all(&block)
            .map_err(PackArcError::sink_closed)?;
        if !data.is_empty() {
            self.inner
                .write_all(data)
                .map_err(PackArcError::sink_closed)?;
            let padding = (BLOCK_SIZE - data.len() % BLOCK_SIZE) % BLOCK_SIZE;
            self.inner
                .write_all(&vec![0u8; padding])
                .map_err(PackArcError::sink_closed)?;
        }
        Ok(())
    }

    /// Write the two terminating zero blocks and return the sink.
    pub fn finish(mut self) -> Result<W> {
        self.inner
            .write_all(&[0u8; BLOCK_SIZE * 2])
            .map_err(PackArcError::sink_closed)?;
        self.finished = true;
        Ok(self.inner)
    }
}

fn build_header(entry: &Entry) -> Result<[u8; BLOCK_SIZE]> {
    let mut block = [0u8; BLOCK_SIZE];

    // Split long names across prefix/name at a slash boundary.
    let name = entry.name.as_str();
    let (prefix, base) = if name.len() <= 100 {
        ("", name)
    } else {
        let split = name[..name.len().min(156)]
            .rfind('/')
            .ok_or_else(|| PackArcError::invalid_operation(format!("name too long: {name}")))?;
        let (prefix, rest) = name.split_at(split);
        let base = &rest[1..];
        if prefix.len() > 155 || base.len() > 100 {
            return Err(PackArcError::invalid_operation(format!(
                "name too long: {name}"
            )));
        }
        (prefix, base)
    };
    block[0..base.len()].copy_from_slice(base.as_bytes());
    write_octal(&mut block[100..108], entry.mode as u64);
    write_octal(&mut block[108..116], entry.uid as u64);
    write_octal(&mut block[116..124], entry.gid as u64);
    write_octal(&mut block[124..136], entry.size);
    write_octal(&mut block[136..148], entry.mtime);
    block[156] = match entry.kind {
        EntryKind::File | EntryKind::Other => TYPE_FILE,
        EntryKind::Directory => TYPE_DIR,
        EntryKind::Symlink => TYPE_SYMLINK,
        EntryKind::Hardlink => TYPE_HARDLINK,
    };
    if let Some(target) = &entry.link_target {
        if target.len() > 100 {
            return Err(PackArcError::invalid_operation(format!(
                "link target too long: {target}"
            )));
        }
        block[157..157 + target.len()].copy_from_slice(target.as_bytes());
    }
    block[257..263].copy_from_slice(b"ustar\0");
    block[263..265].copy_from_slice(b"00");
    block[345..345 + prefix.len()].copy_from_slice(prefix.as_bytes());

    let checksum = header_checksum(&block);
    let text = format!("{checksum:06o}\0 ");
    block[148..156].copy_from_slice(text.as_bytes());
    Ok(block)
}
