//! Unix `ar` container support.
//!
//! The classic `!<arch>\n` format: 60-byte ASCII entry headers, decimal
//! fields, octal mode, two-byte terminator and newline padding to even
//! offsets. The GNU `//` long-name table is honoured on read; the writer
//! emits plain short names (GNU style, `/`-terminated).

use log::debug;
use packarc_core::entry::{Entry, EntryKind};
use packarc_core::error::{PackArcError, Result};
use std::io::{Read, Write};

/// Global archive magic.
pub const MAGIC: &[u8; 8] = b"!<arch>\n";

const HEADER_SIZE: usize = 60;
const HEADER_END: [u8; 2] = [0x60, 0x0A];

/// Longest plain (non-table) member name the writer accepts.
pub const MAX_NAME: usize = 15;

/// One parsed member with its data.
#[derive(Debug, Clone)]
pub struct ArEntry {
    /// Member metadata.
    pub entry: Entry,
    /// Member contents.
    pub data: Vec<u8>,
}

/// Sequential `ar` reader.
#[derive(Debug)]
pub struct ArReader<R> {
    inner: R,
    offset: u64,
    name_table: Vec<u8>,
    checked_magic: bool,
}

impl<R: Read> ArReader<R> {
    /// Wrap a byte source positioned at the start of an archive.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            name_table: Vec::new(),
            checked_magic: false,
        }
    }

    fn check_magic(&mut self) -> Result<()> {
        let mut magic = [0u8; 8];
        self.inner
            .read_exact(&mut magic)
            .map_err(|e| PackArcError::from_read(e, 0))?;
        self.offset = 8;
        if &magic != MAGIC {
            return Err(PackArcError::invalid_magic(MAGIC.to_vec(), magic.to_vec()));
        }
        self.checked_magic = true;
        Ok(())
    }

    /// Read the next member, or `None` at end of archive.
    pub fn next_entry(&mut self) -> Result<Option<ArEntry>> {
        if !self.checked_magic {
            self.check_magic()?;
        }
        loop {
            let mut header = [0u8; HEADER_SIZE];
            match self.inner.read(&mut header[..1]) {
                Ok(0) => return Ok(None),
                Ok(_) => {}
                Err(e) => return Err(PackArcError::Io(e)),
            }
            self.inner
                .read_exact(&mut header[1..])
                .map_err(|e| PackArcError::from_read(e, self.offset))?;
            self.offset += HEADER_SIZE as u64;

            if header[58..60] != HEADER_END {
                return Err(PackArcError::malformed(
                    self.offset - 2,
                    "bad ar member terminator",
                ));
            }

            let raw_name = field_str(&header[0..16]);
            let size = field_u64(&header[48..58], 10)?;
            let data_offset = self.offset;
            let mut data = vec![0u8; size as usize];
            self.inner
                .read_exact(&mut data)
                .map_err(|e| PackArcError::from_read(e, self.offset))?;
            self.offset += size;
            if size % 2 == 1 {
                let mut pad = [0u8; 1];
                self.inner
                    .read_exact(&mut pad)
                    .map_err(|e| PackArcError::from_read(e, self.offset))?;
                self.offset += 1;
            }

            // GNU long-name table: stash it and move on.
            if raw_name == "//" {
                self.name_table = data;
                continue;
            }
            // Symbol index members are bookkeeping, not payload.
            if raw_name == "/" || raw_name == "__.SYMDEF" {
                continue;
            }

            let name = self.resolve_name(&raw_name)?;
            let entry = Entry {
                name,
                size,
                mtime: field_u64(&header[16..28], 10)?,
                mode: field_u64(&header[40..48], 8)? as u32,
                uid: field_u64(&header[28..34], 10)? as u32,
                gid: field_u64(&header[34..40], 10)? as u32,
                kind: EntryKind::File,
                link_target: None,
                data_offset,
            };
            debug!("ar: member {:?} ({} bytes)", entry.name, entry.size);
            return Ok(Some(ArEntry { entry, data }));
        }
    }

    /// Collect all remaining members.
    pub fn entries(&mut self) -> Result<Vec<ArEntry>> {
        let mut all = Vec::new();
        while let Some(entry) = self.next_entry()? {
            all.push(entry);
        }
        Ok(all)
    }

    /// Find a member by name.
    pub fn entry_by_name(&mut self, name: &str) -> Result<Option<ArEntry>> {
        while let Some(entry) = self.next_entry()? {
            if entry.entry.name == name {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    fn resolve_name(&self, raw: &str) -> Result<String> {
        if let Some(offset_text) = raw.strip_prefix('/') {
            // "/123": offset into the GNU name table.
            let offset: usize = offset_text.parse().map_err(|_| {
                PackArcError::invalid_header(format!("bad long-name reference {raw:?}"))
            })?;
            if offset >= self.name_table.len() {
                return Err(PackArcError::invalid_header(format!(
                    "long-name offset {offset} outside the name table"
                )));
            }
            let rest = &self.name_table[offset..];
            let end = rest
                .iter()
                .position(|&b| b == b'\n' || b == 0)
                .unwrap_or(rest.len());
            let mut name = String::from_utf8_lossy(&rest[..end]).into_owned();
            if name.ends_with('/') {
                name.pop();
            }
            return Ok(name);
        }
        // GNU terminates short names with '/'; BSD pads with spaces.
        let mut name = raw.to_string();
        if name.ends_with('/') {
            name.pop();
        }
        Ok(name)
    }
}

fn field_str(field: &[u8]) -> String {
    String::from_utf8_lossy(field).trim_end().to_string()
}

fn field_u64(field: &[u8], radix: u32) -> Result<u64> {
    let text = field_str(field);
    if text.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(&text, radix)
        .map_err(|_| PackArcError::invalid_header(format!("bad ar numeric field {text:?}")))
}

/// Sequential `ar` writer.
#[derive(Debug)]
pub struct ArWriter<W> {
    inner: W,
    wrote_magic: bool,
}

impl<W: Write> ArWriter<W> {
    /// Wrap a byte sink.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            wrote_magic: false,
        }
    }

    /// Append one member.
    pub fn append(&mut self, entry: &Entry, data: &[u8]) -> Result<()> {
        if entry.name.len() > MAX_NAME {
            return Err(PackArcError::invalid_operation(format!(
                "ar member name {:?} longer than {MAX_NAME} bytes",
                entry.name
            )));
        }
        if !self.wrote_magic {
            self.inner
                .write_all(MAGIC)
                .map_err(PackArcError::sink_closed)?;
            self.wrote_magic = true;
        }
        let mut header = [b' '; HEADER_SIZE];
        put_field(&mut header[0..16], &format!("{}/", entry.name));
        put_field(&mut header[16..28], &entry.mtime.to_string());
        put_field(&mut header[28..34], &entry.uid.to_string());
        put_field(&mut header[34..40], &entry.gid.to_string());
        put_field(&mut header[40..48], &format!("{:o}", entry.mode));
        put_field(&mut header[48..58], &data.len().to_string());
        header[58..60].copy_from_slice(&HEADER_END);
        self.inner
            .write_all(&header)
            .map_err(PackArcError::sink_closed)?;
        self.inner
            .write_all(data)
            .map_err(PackArcError::sink_closed)?;
        if data.len() % 2 == 1 {
            self.inner
                .write_all(b"\n")
                .map_err(PackArcError::sink_closed)?;
        }
        Ok(())
    }

    /// Finish the archive and return the sink. An empty archive still gets
    /// its global magic.
    pub fn finish(mut self) -> Result<W> {
        if !self.wrote_magic {
            self.inner
                .write_all(MAGIC)
                .map_err(PackArcError::sink_closed)?;
        }
        Ok(self.inner)
    }
}

fn put_field(slot: &mut [u8], text: &str) {
    let bytes = text.as_bytes();
    let n = bytes.len().min(slot.len());
    slot[..n].copy_from_slice(&bytes[..n]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_roundtrip() {
        // ar uses the data length directly; the Entry size is advisory.
        let mut writer = ArWriter::new(Vec::new());
        writer
            .append(
                &Entry::file("hello.o", 8).with_mtime(1_500_000_000).with_mode(0o644),
                b"obj-code",
            )
            .unwrap();
        writer.append(&Entry::file("odd.txt", 3), b"odd").unwrap();
        let archive = writer.finish().unwrap();
        assert_eq!(&archive[..8], MAGIC);
        // Odd-sized member forces a pad byte; total stays even.
        assert_eq!(archive.len() % 2, 0);

        let mut reader = ArReader::new(&archive[..]);
        let entries = reader.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entry.name, "hello.o");
        assert_eq!(entries[0].entry.mtime, 1_500_000_000);
        assert_eq!(entries[0].entry.mode, 0o644);
        assert_eq!(entries[0].data, b"obj-code");
        assert_eq!(entries[1].entry.name, "odd.txt");
        assert_eq!(entries[1].data, b"odd");
    }

    #[test]
    fn test_empty_archive() {
        let archive = ArWriter::new(Vec::new()).finish().unwrap();
        assert_eq!(&archive[..], MAGIC);
        let mut reader = ArReader::new(&archive[..]);
        assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn test_gnu_long_name_table() {
        // Hand-built archive with a "//" table and a "/0" reference.
        let mut archive = Vec::new();
        archive.extend_from_slice(MAGIC);
        let table = b"a_rather_long_member_name.txt/\n";
        let mut header = [b' '; HEADER_SIZE];
        put_field(&mut header[0..16], "//");
        put_field(&mut header[48..58], &table.len().to_string());
        header[58..60].copy_from_slice(&HEADER_END);
        archive.extend_from_slice(&header);
        archive.extend_from_slice(table);
        archive.push(b'\n'); // table is odd-sized

        let mut header = [b' '; HEADER_SIZE];
        put_field(&mut header[0..16], "/0");
        put_field(&mut header[16..28], "0");
        put_field(&mut header[48..58], "4");
        header[58..60].copy_from_slice(&HEADER_END);
        archive.extend_from_slice(&header);
        archive.extend_from_slice(b"data");

        let mut reader = ArReader::new(&archive[..]);
        let entries = reader.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry.name, "a_rather_long_member_name.txt");
        assert_eq!(entries[0].data, b"data");
    }

    #[test]
    fn test_name_too_long_for_writer() {
        let mut writer = ArWriter::new(Vec::new());
        let err = writer
            .append(&Entry::file("definitely_a_very_long_name.o", 1), b"x")
            .err()
            .unwrap();
        assert!(matches!(err, PackArcError::InvalidOperation(_)));
    }

    #[test]
    fn test_bad_magic() {
        let mut reader = ArReader::new(&b"!<arch>X________"[..]);
        assert!(matches!(
            reader.next_entry(),
            Err(PackArcError::InvalidMagic { .. })
        ));
    }

    #[test]
    fn test_bad_terminator() {
        let mut archive = Vec::new();
        archive.extend_from_slice(MAGIC);
        archive.extend_from_slice(&[b' '; HEADER_SIZE]);
        let mut reader = ArReader::new(&archive[..]);
        assert!(matches!(
            reader.next_entry(),
            Err(PackArcError::Malformed { .. })
        ));
    }
}
