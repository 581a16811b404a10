// Copyright 2017-2022 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

/*!

Reading MIRIAD mask-format items, such as UV data flags.

A mask item is a sequence of big-endian 32-bit words, each carrying 31
payload bits in its low positions; the top bit is unused. The reader
expands the packing into one byte per bit, which is much less
space-efficient but far easier to work with.

*/

use byteorder::{BigEndian, ByteOrder};
use std::cmp;

use crate::errors::Result;
use crate::iostream::{AccessMode, IoStream};
use crate::{DataSet, OpenFlags};

/// The number of payload bits carried per 32-bit word.
const BITS_PER_WORD: usize = 31;

/// A streaming reader of one mask item.
#[derive(Debug)]
pub struct MaskItem {
    stream: IoStream,
    current_val: u32,
    bits_left_in_current: usize,
}

impl MaskItem {
    /// Open the named mask item of a data set. Only read access is
    /// supported.
    pub fn open(ds: &DataSet, name: &str, mode: AccessMode, flags: OpenFlags) -> Result<Self> {
        assert_eq!(mode, AccessMode::Read, "mask items are read-only");

        let stream = ds.open_large_item(name, mode, flags)?;

        Ok(MaskItem {
            stream,
            current_val: 0,
            bits_left_in_current: 0,
        })
    }

    /// Read `dest.len()` bits from the mask, storing a 1 or 0 byte per
    /// bit. Running out of data mid-mask is a format error.
    pub fn read_expand(&mut self, dest: &mut [u8]) -> Result<()> {
        let mut ofs = 0;
        let mut n_bits = dest.len();
        let mut cur = self.current_val;

        while n_bits > 0 {
            if self.bits_left_in_current > 0 {
                let toread = cmp::min(self.bits_left_in_current, n_bits);
                n_bits -= toread;
                self.bits_left_in_current -= toread;

                let mut i = BITS_PER_WORD - self.bits_left_in_current - toread;

                for _ in 0..toread {
                    dest[ofs] = if cur & (1 << i) != 0 { 1 } else { 0 };
                    ofs += 1;
                    i += 1;
                }
            }

            if n_bits == 0 {
                return Ok(());
            }

            // Pull in the next word.
            let buf = self.stream.fetch_temp(4)?;

            if buf.len() != 4 {
                return Err(format_err!("invalid mask item: bad item length"));
            }

            cur = BigEndian::read_u32(buf);
            self.current_val = cur;
            self.bits_left_in_current = BITS_PER_WORD;
        }

        Ok(())
    }

    /// Release the underlying stream.
    pub fn close(self) -> Result<()> {
        self.stream.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn mask_dataset(words: &[u32]) -> (tempfile::TempDir, DataSet) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vis");

        let flags = OpenFlags {
            create_ok: true,
            ..Default::default()
        };
        let ds = DataSet::open(&path, AccessMode::Write, flags).unwrap();

        let mut bytes = Vec::with_capacity(words.len() * 4);
        for w in words {
            bytes.extend_from_slice(&w.to_be_bytes());
        }
        fs::write(path.join("flags"), &bytes).unwrap();

        (dir, ds)
    }

    #[test]
    fn expand_alternating_word() {
        let (_dir, ds) = mask_dataset(&[0x5555_5555]);
        let mut mask = MaskItem::open(&ds, "flags", AccessMode::Read, Default::default()).unwrap();

        let mut dest = [0u8; 31];
        mask.read_expand(&mut dest).unwrap();

        for (i, &b) in dest.iter().enumerate() {
            assert_eq!(b, (1 - i % 2) as u8, "bit {} wrong", i);
        }

        mask.close().unwrap();
    }

    #[test]
    fn expansion_crosses_words() {
        // Word 1: all ones; word 2: only bit 0 set.
        let (_dir, ds) = mask_dataset(&[0x7FFF_FFFF, 0x0000_0001]);
        let mut mask = MaskItem::open(&ds, "flags", AccessMode::Read, Default::default()).unwrap();

        // Split the reads unevenly to exercise the partial-word state.
        let mut head = [0u8; 17];
        mask.read_expand(&mut head).unwrap();
        assert!(head.iter().all(|&b| b == 1));

        let mut tail = [0u8; 45];
        mask.read_expand(&mut tail).unwrap();
        assert!(tail[..14].iter().all(|&b| b == 1));
        assert_eq!(tail[14], 1);
        assert!(tail[15..].iter().all(|&b| b == 0));
    }

    #[test]
    fn truncated_mask_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vis");

        let flags = OpenFlags {
            create_ok: true,
            ..Default::default()
        };
        let ds = DataSet::open(&path, AccessMode::Write, flags).unwrap();
        fs::write(path.join("flags"), &[0x7F, 0xFF]).unwrap();

        let mut mask = MaskItem::open(&ds, "flags", AccessMode::Read, Default::default()).unwrap();
        let mut dest = [0u8; 8];
        assert!(mask.read_expand(&mut dest).is_err());
    }
}
