//! Filename handling: long-filename assembly, 8.3 fallback, volume labels.
//!
//! Long filenames are stored as the low byte of each UCS-2 unit; anything
//! outside printable ASCII becomes '_' so every name is valid UTF-8.

use heapless::Vec;

use crate::MAX_LFN_LEN;

use super::EntryView;

pub(crate) const LFN_CHARS: usize = 13;
const LFN_SEQ_MASK: u8 = 0x1F;
const LFN_LAST: u8 = 0x40;

#[inline]
fn sanitize(b: u8) -> u8 {
    if b == 0 {
        0
    } else if (0x20..0x7F).contains(&b) {
        b
    } else {
        b'_'
    }
}

/// A display name, always printable ASCII.
#[derive(Clone)]
pub(crate) struct NameBuf {
    bytes: Vec<u8, MAX_LFN_LEN>,
}

impl NameBuf {
    pub(crate) fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    pub(crate) fn clear(&mut self) {
        self.bytes.clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub(crate) fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes).unwrap_or("")
    }

    pub(crate) fn set_bytes(&mut self, bytes: &[u8]) {
        self.bytes.clear();
        for &b in bytes {
            if b == 0 || self.bytes.push(sanitize(b)).is_err() {
                break;
            }
        }
    }

    pub(crate) fn set_str(&mut self, s: &str) {
        self.set_bytes(s.as_bytes());
    }

    fn push(&mut self, b: u8) {
        let _ = self.bytes.push(sanitize(b));
    }
}

/// Accumulates long-filename fragments while scanning directory entries.
/// Fragments arrive in reverse order; the sequence number places each one.
pub(crate) struct LfnBuf {
    buf: [u8; MAX_LFN_LEN],
}

impl LfnBuf {
    pub(crate) fn new() -> Self {
        Self {
            buf: [0; MAX_LFN_LEN],
        }
    }

    pub(crate) fn clear(&mut self) {
        self.buf = [0; MAX_LFN_LEN];
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf[0] == 0
    }

    /// Records one LFN entry's 13 characters at the slot its sequence number
    /// selects. Out-of-range sequence numbers are ignored.
    pub(crate) fn record(&mut self, e: &EntryView<'_>) {
        let seq = e.lfn_seq();
        let slot = usize::from(seq & LFN_SEQ_MASK);
        if slot == 0 {
            return;
        }
        let base = LFN_CHARS * (slot - 1);
        if base + LFN_CHARS >= MAX_LFN_LEN {
            return;
        }
        for k in 0..LFN_CHARS {
            self.buf[base + k] = sanitize(e.lfn_char(k));
        }
        if seq & LFN_LAST != 0 {
            self.buf[base + LFN_CHARS] = 0;
        }
    }

    /// The assembled name, up to the first NUL.
    pub(crate) fn assembled(&self) -> &[u8] {
        let end = self.buf.iter().position(|&b| b == 0).unwrap_or(MAX_LFN_LEN);
        &self.buf[..end]
    }
}

/// Builds the 8.3 display form: name up to the first space, a dot, then the
/// extension up to the first space. An empty extension leaves the trailing
/// dot in place.
pub(crate) fn short_name(e: &EntryView<'_>, out: &mut NameBuf) {
    out.clear();
    for i in 0..8 {
        let b = e.name_byte(i);
        if b == b' ' {
            break;
        }
        out.push(b);
    }
    out.push(b'.');
    for i in 0..3 {
        let b = e.ext_byte(i);
        if b == b' ' {
            break;
        }
        out.push(b);
    }
}

/// Adopts a volume-label entry as the directory display name: the pending
/// long name when one exists, otherwise all 11 raw label characters.
pub(crate) fn adopt_label(e: &EntryView<'_>, lfn: &LfnBuf, out: &mut NameBuf) {
    if lfn.is_empty() {
        out.clear();
        for i in 0..8 {
            let b = e.name_byte(i);
            if b == 0 {
                return;
            }
            out.push(b);
        }
        for i in 0..3 {
            let b = e.ext_byte(i);
            if b == 0 {
                return;
            }
            out.push(b);
        }
    } else {
        out.set_bytes(lfn.assembled());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_maps_nonprintable_to_underscore() {
        assert_eq!(sanitize(b'A'), b'A');
        assert_eq!(sanitize(b' '), b' ');
        assert_eq!(sanitize(0), 0);
        assert_eq!(sanitize(0xFF), b'_');
        assert_eq!(sanitize(0x07), b'_');
    }

    #[test]
    fn namebuf_truncates_at_capacity() {
        let mut n = NameBuf::new();
        let long = [b'x'; MAX_LFN_LEN + 40];
        n.set_bytes(&long);
        assert_eq!(n.as_str().len(), MAX_LFN_LEN);
    }

    #[test]
    fn lfn_fragments_land_at_their_sequence_slot() {
        use crate::block::SectorBuf;

        let mut sec = SectorBuf::zeroed();
        let mut put = |s: &mut SectorBuf, off: usize, b: u8| {
            let w = s.0[off / 2];
            s.0[off / 2] = if off % 2 == 0 {
                (w & 0xFF00) | u16::from(b)
            } else {
                (w & 0x00FF) | (u16::from(b) << 8)
            };
        };

        // Slot 0: sequence 2 + last flag, text "p3" then terminator.
        put(&mut sec, 0, 0x42);
        put(&mut sec, 11, 0x0F);
        put(&mut sec, 1, b'p');
        put(&mut sec, 3, b'3');
        // Slot 1: sequence 1, a full 13 characters.
        let frag = b"hello_world.m";
        put(&mut sec, 32, 0x01);
        put(&mut sec, 32 + 11, 0x0F);
        const OFFS: [usize; LFN_CHARS] = [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];
        for (k, &c) in frag.iter().enumerate() {
            put(&mut sec, 32 + OFFS[k], c);
        }

        let mut lfn = LfnBuf::new();
        lfn.record(&EntryView::new(&sec, 0));
        lfn.record(&EntryView::new(&sec, 1));
        assert_eq!(lfn.assembled(), b"hello_world.mp3");
    }

    #[test]
    fn lfn_drops_out_of_range_sequence_numbers() {
        use crate::block::SectorBuf;

        // A zeroed entry carries sequence number 0, which is invalid and
        // must not write anywhere.
        let sec = SectorBuf::zeroed();
        let mut lfn = LfnBuf::new();
        lfn.record(&EntryView::new(&sec, 0));
        assert!(lfn.is_empty());

        // Sequence numbers past the buffer are dropped too.
        let mut far = SectorBuf::zeroed();
        far.0[0] = 0x001F; // sequence 31: 13 * 30 overruns the name buffer
        far.0[5] = 0x0F00;
        lfn.record(&EntryView::new(&far, 0));
        assert!(lfn.is_empty());
    }
}
