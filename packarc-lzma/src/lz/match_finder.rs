//! Hashed binary-tree match finder (BT2 / BT4).
//!
//! Every window position is inserted into a binary search tree ordered by
//! suffix bytes; trees are rooted in a hash table keyed by the first bytes
//! at the position. BT4 additionally keeps 2- and 3-byte hash tables whose
//! hits surface short matches the tree would skip past. All tables store
//! absolute stream positions as 32-bit integers; position zero is the empty
//! marker, so the window's logical positions are shifted up by one at init.
//! When a position would overflow 31 bits, every stored entry is shifted
//! down and dead entries clamp to the empty marker.

use super::input_window::InputWindow;
use packarc_core::checksum::CRC32_TABLE;
use packarc_core::error::Result;
use std::io::Read;

const EMPTY: u32 = 0;
const MAX_POS_BEFORE_NORMALIZE: u32 = (1 << 31) - 1;

const HASH2_SIZE: usize = 1 << 10;
const HASH3_SIZE: usize = 1 << 16;

/// Match finder flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchFinderKind {
    /// 2-byte hash only; smaller tables, weaker short-match discovery.
    Bt2,
    /// 2-, 3- and 4-byte hashes; the default.
    #[default]
    Bt4,
}

/// Binary-tree match finder over an [`InputWindow`].
#[derive(Debug)]
pub struct MatchFinder {
    pub(crate) win: InputWindow,
    kind: MatchFinderKind,
    hash2: Vec<u32>,
    hash3: Vec<u32>,
    hash: Vec<u32>,
    hash_mask: u32,
    son: Vec<u32>,
    cyclic_pos: u32,
    cyclic_size: u32,
    /// Longest match the finder reports (the parser's nice length).
    match_max_len: u32,
    cut_value: u32,
    min_match_check: u32,
    hash_direct_bytes: u32,
}

impl MatchFinder {
    /// Create a finder for a `dict_size`-byte history.
    ///
    /// `keep_add_before` is extra history the parser needs behind the head
    /// (its lookahead table depth) and `keep_add_after` extra lookahead
    /// beyond `match_max_len`.
    pub fn new(
        kind: MatchFinderKind,
        dict_size: u32,
        keep_add_before: u32,
        match_max_len: u32,
        keep_add_after: u32,
    ) -> Self {
        let reserve = (dict_size + keep_add_before + match_max_len + keep_add_after) / 2 + 256;
        let win = InputWindow::new(
            dict_size + keep_add_before,
            match_max_len + keep_add_after,
            reserve,
        );
        let cyclic_size = dict_size + 1;

        let (hash2, hash3, hash, hash_mask, min_match_check, hash_direct_bytes) = match kind {
            MatchFinderKind::Bt2 => (Vec::new(), Vec::new(), vec![EMPTY; 1 << 16], 0, 3, 2),
            MatchFinderKind::Bt4 => {
                let mut hs = dict_size - 1;
                hs |= hs >> 1;
                hs |= hs >> 2;
                hs |= hs >> 4;
                hs |= hs >> 8;
                hs >>= 1;
                hs |= 0xFFFF;
                if hs > (1 << 24) {
                    hs >>= 1;
                }
                (
                    vec![EMPTY; HASH2_SIZE],
                    vec![EMPTY; HASH3_SIZE],
                    vec![EMPTY; hs as usize + 1],
                    hs,
                    4,
                    0,
                )
            }
        };

        Self {
            win,
            kind,
            hash2,
            hash3,
            hash,
            hash_mask,
            son: vec![EMPTY; cyclic_size as usize * 2],
            cyclic_pos: 0,
            cyclic_size,
            match_max_len,
            cut_value: 16 + (match_max_len >> 1),
            min_match_check,
            hash_direct_bytes,
        }
    }

    /// Reset and fill the window from a fresh source.
    pub fn init<R: Read>(&mut self, src: &mut R) -> Result<()> {
        self.hash2.fill(EMPTY);
        self.hash3.fill(EMPTY);
        self.hash.fill(EMPTY);
        self.cyclic_pos = 0;
        self.win.init(src)?;
        // Shift logical positions up by one so zero means "no entry".
        self.win.reduce_offsets(-1);
        Ok(())
    }

    /// Bytes available ahead of the head.
    #[inline]
    pub fn num_available(&self) -> u32 {
        self.win.num_available()
    }

    /// Byte at `head + index`.
    #[inline]
    pub fn get_index_byte(&self, index: i32) -> u8 {
        self.win.get_index_byte(index)
    }

    /// Match length of `distance` against bytes from `head + index`.
    #[inline]
    pub fn get_match_len(&self, index: i32, distance: u32, limit: u32) -> u32 {
        self.win.get_match_len(index, distance, limit)
    }

    fn move_pos_internal<R: Read>(&mut self, src: &mut R) -> Result<()> {
        self.cyclic_pos += 1;
        if self.cyclic_pos >= self.cyclic_size {
            self.cyclic_pos = 0;
        }
        self.win.move_pos(src)?;
        if self.win.pos == MAX_POS_BEFORE_NORMALIZE {
            self.normalize();
        }
        Ok(())
    }

    fn normalize(&mut self) {
        let sub = self.win.pos - self.cyclic_size;
        Self::normalize_links(&mut self.son, sub);
        Self::normalize_links(&mut self.hash, sub);
        Self::normalize_links(&mut self.hash2, sub);
        Self::normalize_links(&mut self.hash3, sub);
        self.win.reduce_offsets(sub as i32);
    }

    fn normalize_links(items: &mut [u32], sub: u32) {
        for value in items.iter_mut() {
            *value = if *value <= sub { EMPTY } else { *value - sub };
        }
    }

    /// Find all strictly-lengthening matches at the head, append
    /// `(len, distance - 1)` pairs to `distances` and advance one position.
    /// Returns the number of slots written.
    pub fn get_matches<R: Read>(&mut self, src: &mut R, distances: &mut [u32]) -> Result<u32> {
        let len_limit;
        if self.win.pos + self.match_max_len <= self.win.stream_pos {
            len_limit = self.match_max_len;
        } else {
            len_limit = self.win.stream_pos - self.win.pos;
            if len_limit < self.min_match_check {
                self.move_pos_internal(src)?;
                return Ok(0);
            }
        }

        let pos = self.win.pos;
        let boff = self.win.buffer_offset;
        let match_min_pos = if pos > self.cyclic_size {
            pos - self.cyclic_size
        } else {
            0
        };
        let cur = boff.wrapping_add(pos) as usize;
        let mut offset = 0usize;
        let mut max_len = 1u32;

        let mut cur_match;
        match self.kind {
            MatchFinderKind::Bt4 => {
                let buf = &self.win.buf;
                let temp = CRC32_TABLE[buf[cur] as usize] ^ buf[cur + 1] as u32;
                let hash2_value = (temp & (HASH2_SIZE as u32 - 1)) as usize;
                let temp = temp ^ ((buf[cur + 2] as u32) << 8);
                let hash3_value = (temp & (HASH3_SIZE as u32 - 1)) as usize;
                let hash_value = ((temp ^ (CRC32_TABLE[buf[cur + 3] as usize] << 5))
                    & self.hash_mask) as usize;

                cur_match = self.hash[hash_value];
                let mut cur_match2 = self.hash2[hash2_value];
                let cur_match3 = self.hash3[hash3_value];
                self.hash2[hash2_value] = pos;
                self.hash3[hash3_value] = pos;
                self.hash[hash_value] = pos;

                if cur_match2 > match_min_pos
                    && buf[boff.wrapping_add(cur_match2) as usize] == buf[cur]
                {
                    max_len = 2;
                    distances[offset] = 2;
                    distances[offset + 1] = pos - cur_match2 - 1;
                    offset += 2;
                }
                if cur_match3 > match_min_pos
                    && buf[boff.wrapping_add(cur_match3) as usize] == buf[cur]
                {
                    if cur_match3 == cur_match2 {
                        offset -= 2;
                    }
                    max_len = 3;
                    distances[offset] = 3;
                    distances[offset + 1] = pos - cur_match3 - 1;
                    offset += 2;
                    cur_match2 = cur_match3;
                }
                if offset != 0 && cur_match2 == cur_match {
                    // The tree walk will rediscover this candidate with an
                    // exact length.
                    offset -= 2;
                    max_len = 1;
                }
            }
            MatchFinderKind::Bt2 => {
                let buf = &self.win.buf;
                let hash_value = buf[cur] as usize | ((buf[cur + 1] as usize) << 8);
                cur_match = self.hash[hash_value];
                self.hash[hash_value] = pos;

                if self.hash_direct_bytes != 0
                    && cur_match > match_min_pos
                    && buf[boff.wrapping_add(cur_match) as usize + 2] != buf[cur + 2]
                {
                    max_len = 2;
                    distances[offset] = 2;
                    distances[offset + 1] = pos - cur_match - 1;
                    offset += 2;
                }
            }
        }

        let mut ptr0 = ((self.cyclic_pos << 1) + 1) as usize;
        let mut ptr1 = (self.cyclic_pos << 1) as usize;
        let mut len0 = self.hash_direct_bytes;
        let mut len1 = self.hash_direct_bytes;
        let mut count = self.cut_value;

        loop {
            if cur_match <= match_min_pos || count == 0 {
                self.son[ptr0] = EMPTY;
                self.son[ptr1] = EMPTY;
                break;
            }
            count -= 1;

            let delta = pos - cur_match;
            let cyclic = ((if delta <= self.cyclic_pos {
                self.cyclic_pos - delta
            } else {
                self.cyclic_pos - delta + self.cyclic_size
            }) << 1) as usize;
            let buf = &self.win.buf;
            let pby1 = boff.wrapping_add(cur_match) as usize;
            let mut len = len0.min(len1);

            if buf[pby1 + len as usize] == buf[cur + len as usize] {
                len += 1;
                while len != len_limit && buf[pby1 + len as usize] == buf[cur + len as usize] {
                    len += 1;
                }
                if max_len < len {
                    max_len = len;
                    distances[offset] = len;
                    distances[offset + 1] = delta - 1;
                    offset += 2;
                    if len == len_limit {
                        self.son[ptr1] = self.son[cyclic];
                        self.son[ptr0] = self.son[cyclic + 1];
                        break;
                    }
                }
            }

            if buf[pby1 + len as usize] < buf[cur + len as usize] {
                self.son[ptr1] = cur_match;
                ptr1 = cyclic + 1;
                cur_match = self.son[ptr1];
                len1 = len;
            } else {
                self.son[ptr0] = cur_match;
                ptr0 = cyclic;
                cur_match = self.son[ptr0];
                len0 = len;
            }
        }

        self.move_pos_internal(src)?;
        Ok(offset as u32)
    }

    /// Insert `num` positions into the tree without reporting matches.
    pub fn skip<R: Read>(&mut self, src: &mut R, mut num: u32) -> Result<()> {
        while num > 0 {
            num -= 1;

            let len_limit;
            if self.win.pos + self.match_max_len <= self.win.stream_pos {
                len_limit = self.match_max_len;
            } else {
                len_limit = self.win.stream_pos - self.win.pos;
                if len_limit < self.min_match_check {
                    self.move_pos_internal(src)?;
                    continue;
                }
            }

            let pos = self.win.pos;
            let boff = self.win.buffer_offset;
            let match_min_pos = if pos > self.cyclic_size {
                pos - self.cyclic_size
            } else {
                0
            };
            let cur = boff.wrapping_add(pos) as usize;

            let mut cur_match;
            match self.kind {
                MatchFinderKind::Bt4 => {
                    let buf = &self.win.buf;
                    let temp = CRC32_TABLE[buf[cur] as usize] ^ buf[cur + 1] as u32;
                    let hash2_value = (temp & (HASH2_SIZE as u32 - 1)) as usize;
                    let temp = temp ^ ((buf[cur + 2] as u32) << 8);
                    let hash3_value = (temp & (HASH3_SIZE as u32 - 1)) as usize;
                    let hash_value = ((temp ^ (CRC32_TABLE[buf[cur + 3] as usize] << 5))
                        & self.hash_mask) as usize;
                    self.hash2[hash2_value] = pos;
                    self.hash3[hash3_value] = pos;
                    cur_match = self.hash[hash_value];
                    self.hash[hash_value] = pos;
                }
                MatchFinderKind::Bt2 => {
                    let buf = &self.win.buf;
                    let hash_value = buf[cur] as usize | ((buf[cur + 1] as usize) << 8);
                    cur_match = self.hash[hash_value];
                    self.hash[hash_value] = pos;
                }
            }

            let mut ptr0 = ((self.cyclic_pos << 1) + 1) as usize;
            let mut ptr1 = (self.cyclic_pos << 1) as usize;
            let mut len0 = self.hash_direct_bytes;
            let mut len1 = self.hash_direct_bytes;
            let mut count = self.cut_value;

            loop {
                if cur_match <= match_min_pos || count == 0 {
                    self.son[ptr0] = EMPTY;
                    self.son[ptr1] = EMPTY;
                    break;
                }
                count -= 1;

                let delta = pos - cur_match;
                let cyclic = ((if delta <= self.cyclic_pos {
                    self.cyclic_pos - delta
                } else {
                    self.cyclic_pos - delta + self.cyclic_size
                }) << 1) as usize;
                let buf = &self.win.buf;
                let pby1 = boff.wrapping_add(cur_match) as usize;
                let mut len = len0.min(len1);

                if buf[pby1 + len as usize] == buf[cur + len as usize] {
                    len += 1;
                    while len != len_limit && buf[pby1 + len as usize] == buf[cur + len as usize] {
                        len += 1;
                    }
                    if len == len_limit {
                        self.son[ptr1] = self.son[cyclic];
                        self.son[ptr0] = self.son[cyclic + 1];
                        break;
                    }
                }

                if buf[pby1 + len as usize] < buf[cur + len as usize] {
                    self.son[ptr1] = cur_match;
                    ptr1 = cyclic + 1;
                    cur_match = self.son[ptr1];
                    len1 = len;
                } else {
                    self.son[ptr0] = cur_match;
                    ptr0 = cyclic;
                    cur_match = self.son[ptr0];
                    len0 = len;
                }
            }

            self.move_pos_internal(src)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn finder_over(data: &[u8], kind: MatchFinderKind) -> (MatchFinder, Cursor<Vec<u8>>) {
        let mut src = Cursor::new(data.to_vec());
        let mut mf = MatchFinder::new(kind, 1 << 12, 256, 64, 274);
        mf.init(&mut src).unwrap();
        (mf, src)
    }

    fn matches_at_each(
        mf: &mut MatchFinder,
        src: &mut Cursor<Vec<u8>>,
        n: usize,
    ) -> Vec<Vec<(u32, u32)>> {
        let mut distances = vec![0u32; 64 * 2 + 2];
        let mut all = Vec::new();
        for _ in 0..n {
            let pairs = mf.get_matches(src, &mut distances).unwrap() as usize;
            let found = distances[..pairs]
                .chunks(2)
                .map(|c| (c[0], c[1]))
                .collect();
            all.push(found);
        }
        all
    }

    #[test]
    fn test_finds_repeated_run() {
        let (mut mf, mut src) = finder_over(b"abcabcabc", MatchFinderKind::Bt4);
        let per_pos = matches_at_each(&mut mf, &mut src, 4);
        // Positions 0..2 have no history; position 3 must see "abc" at
        // distance 3 (reported zero-based as 2).
        assert!(per_pos[0].is_empty());
        let at3 = per_pos[3].last().copied().unwrap();
        assert_eq!(at3, (6, 2));
    }

    #[test]
    fn test_reported_matches_are_real() {
        let data: Vec<u8> = b"the quick brown fox jumps over the lazy dog the quick fox"
            .repeat(3);
        let (mut mf, mut src) = finder_over(&data, MatchFinderKind::Bt4);
        for (pos, found) in matches_at_each(&mut mf, &mut src, data.len().min(100))
            .into_iter()
            .enumerate()
        {
            let mut last_len = 0;
            for (len, dist) in found {
                assert!(len > last_len, "lengths must strictly increase");
                last_len = len;
                let d = dist as usize + 1;
                assert!(d <= pos);
                for i in 0..len as usize {
                    assert_eq!(data[pos + i], data[pos - d + i], "bogus match at {pos}");
                }
            }
        }
    }

    #[test]
    fn test_bt2_reports_short_matches() {
        let (mut mf, mut src) = finder_over(b"ababababab", MatchFinderKind::Bt2);
        let per_pos = matches_at_each(&mut mf, &mut src, 4);
        // Position 2 sees "ab" at distance 2.
        assert!(per_pos[2].iter().any(|&(len, dist)| len >= 2 && dist == 1));
    }

    #[test]
    fn test_skip_keeps_tree_consistent() {
        let data = b"xyzxyzxyzxyz".to_vec();
        let mut src = Cursor::new(data);
        let mut mf = MatchFinder::new(MatchFinderKind::Bt4, 1 << 12, 256, 64, 274);
        mf.init(&mut src).unwrap();
        let mut distances = vec![0u32; 64 * 2 + 2];
        mf.get_matches(&mut src, &mut distances).unwrap();
        mf.skip(&mut src, 5).unwrap();
        // Position 6: matches at distances 3 and 6 exist.
        let pairs = mf.get_matches(&mut src, &mut distances).unwrap() as usize;
        assert!(pairs >= 2);
        let (len, dist) = (distances[pairs - 2], distances[pairs - 1]);
        assert!(len >= 6);
        assert!(dist == 2 || dist == 5);
    }
}
