// Copyright 2017-2022 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

/*!

Buffered, endianness-recoding I/O streams.

MIRIAD data sets are standardized to big-endian storage, and the various
pieces of a data set are read and written in block-aligned chunks. The
[`IoStream`] type wraps a file in a buffer whose size is a multiple of 256
bytes; since every data type's alignment divides 256, alignment operations
can never cross a block boundary, which keeps the hot paths simple.

A stream is opened in read mode or write mode, never both. Read-mode
streams hand out borrowed slices of their internal buffers
([`IoStream::fetch_temp`]); a borrow is valid only until the next read
operation, which the `&mut self` receivers enforce. Requests that straddle
a block boundary are assembled in a scratch buffer.

*/

use std::cmp;
use std::fs::File;
use std::io::{self, Read, Write};

use crate::errors::Result;
use crate::Type;

/// The buffer size selected when a caller passes `bufsz == 0`.
pub const DEFAULT_BUF_SIZE: usize = 16384;

/// Whether a handle is open for reading or for writing.
///
/// For whole data sets, `Write` implies read capability as well; there is
/// no write-only data set. Individual item streams are strictly one or the
/// other.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum AccessMode {
    Read,
    Write,
}

/// The per-element width at which byte order is converted.
///
/// This equals the type size except for complex64, which recodes as two
/// float32 values.
fn recode_unit(ty: Type) -> usize {
    match ty {
        Type::Binary | Type::Int8 | Type::Text => 1,
        Type::Int16 => 2,
        Type::Int32 | Type::Float32 | Type::Complex64 => 4,
        Type::Int64 | Type::Float64 => 8,
    }
}

/// Copy `src` to `dest`, converting each element of type `ty` between
/// big-endian and host order. The two buffers must be the same length, a
/// whole number of elements. A zero-length copy is valid.
pub fn recode_copy(src: &[u8], dest: &mut [u8], ty: Type) {
    use byteorder::{BigEndian, ByteOrder, NativeEndian};

    assert_eq!(src.len(), dest.len());
    debug_assert_eq!(src.len() % recode_unit(ty), 0);

    match recode_unit(ty) {
        1 => dest.copy_from_slice(src),
        2 => {
            for (s, d) in src.chunks_exact(2).zip(dest.chunks_exact_mut(2)) {
                NativeEndian::write_u16(d, BigEndian::read_u16(s));
            }
        }
        4 => {
            for (s, d) in src.chunks_exact(4).zip(dest.chunks_exact_mut(4)) {
                NativeEndian::write_u32(d, BigEndian::read_u32(s));
            }
        }
        _ => {
            for (s, d) in src.chunks_exact(8).zip(dest.chunks_exact_mut(8)) {
                NativeEndian::write_u64(d, BigEndian::read_u64(s));
            }
        }
    }
}

/// Convert `data` between big-endian and host order in place. A no-op for
/// one-byte types and on big-endian hosts.
pub fn recode_inplace(data: &mut [u8], ty: Type) {
    use byteorder::{BigEndian, ByteOrder, NativeEndian};

    debug_assert_eq!(data.len() % recode_unit(ty), 0);

    match recode_unit(ty) {
        1 => {}
        2 => {
            for c in data.chunks_exact_mut(2) {
                let v = BigEndian::read_u16(c);
                NativeEndian::write_u16(c, v);
            }
        }
        4 => {
            for c in data.chunks_exact_mut(4) {
                let v = BigEndian::read_u32(c);
                NativeEndian::write_u32(c, v);
            }
        }
        _ => {
            for c in data.chunks_exact_mut(8) {
                let v = BigEndian::read_u64(c);
                NativeEndian::write_u64(c, v);
            }
        }
    }
}

/// Read into `buf` until it is full or EOF is reached, retrying
/// interrupted system calls. Returns the number of bytes placed.
fn read_full(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut ofs = 0;

    while ofs < buf.len() {
        match file.read(&mut buf[ofs..]) {
            Ok(0) => break,
            Ok(n) => ofs += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(ofs)
}

/// A buffered big-endian stream over one file descriptor.
pub struct IoStream {
    mode: AccessMode,
    file: File,
    bufsz: usize,
    buf: Vec<u8>,
    scratch: Vec<u8>,
    pos: usize,
    eof: bool,
    end: usize,
    flushed: bool,
}

impl IoStream {
    /// Wrap `file` in a new stream. `bufsz` must be a multiple of 256;
    /// zero selects [`DEFAULT_BUF_SIZE`].
    pub fn new(mode: AccessMode, file: File, bufsz: usize) -> Self {
        let bufsz = if bufsz == 0 { DEFAULT_BUF_SIZE } else { bufsz };
        assert_eq!(bufsz & 0xFF, 0, "stream buffer size must be a multiple of 256");

        let (scratch, pos) = match mode {
            // The cursor starts at the buffer end so that the first fetch
            // triggers a block read.
            AccessMode::Read => (vec![0u8; bufsz], bufsz),
            AccessMode::Write => (Vec::new(), 0),
        };

        IoStream {
            mode,
            file,
            bufsz,
            buf: vec![0u8; bufsz],
            scratch,
            pos,
            eof: false,
            end: 0,
            flushed: false,
        }
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn buffer_size(&self) -> usize {
        self.bufsz
    }

    /// Read the next block into the main buffer. A short read marks EOF
    /// and records where the valid data end.
    fn refill(&mut self) -> Result<()> {
        debug_assert!(self.mode == AccessMode::Read && !self.eof);

        let n = read_full(&mut self.file, &mut self.buf)?;

        if n != self.bufsz {
            self.eof = true;
            self.end = n;
        }

        self.pos = 0;
        Ok(())
    }

    /// The workhorse behind `fetch_temp`: locate up to `nbytes` of
    /// buffered data, returning `(in_scratch, start, len)`.
    fn fetch_raw(&mut self, nbytes: usize) -> Result<(bool, usize, usize)> {
        assert_eq!(self.mode, AccessMode::Read);
        assert!(nbytes <= self.bufsz);

        if self.eof {
            // The request is either entirely within the main buffer or
            // truncated by EOF; either way the scratch buffer is not
            // needed.
            let start = self.pos;

            if self.pos + nbytes <= self.end {
                self.pos += nbytes;
                return Ok((false, start, nbytes));
            }

            let n = self.end - self.pos;
            self.pos = self.end;
            return Ok((false, start, n));
        }

        if self.pos == self.bufsz {
            // Last time we read exactly up to a block boundary. Read in a
            // new block and try again.
            self.refill()?;
            return self.fetch_raw(nbytes);
        }

        if self.pos + nbytes <= self.bufsz {
            // Not at EOF, and the request is entirely buffered.
            let start = self.pos;
            self.pos += nbytes;
            return Ok((false, start, nbytes));
        }

        // We are reading across the end of the current block: save the
        // tail, refill, and assemble the pieces in the scratch buffer.
        // The recursive fetch cannot cross a boundary again since the
        // remainder fits within one block.

        let nlow = self.bufsz - self.pos;
        self.scratch[..nlow].copy_from_slice(&self.buf[self.pos..]);

        self.refill()?;

        let (_, start, nhi) = self.fetch_raw(nbytes - nlow)?;
        let dest = &mut self.scratch[nlow..nlow + nhi];
        dest.copy_from_slice(&self.buf[start..start + nhi]);

        Ok((true, 0, nlow + nhi))
    }

    /// Borrow the next `nbytes` bytes of the stream. The returned slice
    /// may be shorter than requested if EOF intervenes, and is valid only
    /// until the next read operation. `nbytes` must not exceed the buffer
    /// size.
    pub fn fetch_temp(&mut self, nbytes: usize) -> Result<&[u8]> {
        let (in_scratch, start, len) = self.fetch_raw(nbytes)?;

        Ok(if in_scratch {
            &self.scratch[start..start + len]
        } else {
            &self.buf[start..start + len]
        })
    }

    /// Like `fetch_temp`, but for `nvals` elements of type `ty`, recoded
    /// to host order in place. The element count actually fetched is the
    /// returned length over `ty.size()`; a fetch that does not cover a
    /// whole number of elements is a format error.
    pub fn fetch_temp_typed(&mut self, ty: Type, nvals: usize) -> Result<&[u8]> {
        let (in_scratch, start, len) = self.fetch_raw(nvals * ty.size())?;

        if len % ty.size() != 0 {
            return Err(format_err!(
                "truncated stream: {} bytes do not hold whole {} values",
                len,
                ty
            ));
        }

        let slice = if in_scratch {
            &mut self.scratch[start..start + len]
        } else {
            &mut self.buf[start..start + len]
        };

        recode_inplace(slice, ty);
        Ok(&*slice)
    }

    /// Decode up to `nvals` elements of type `ty` directly into `dest`,
    /// which must hold at least `nvals * ty.size()` bytes. Returns the
    /// number of whole elements read, which is short only at EOF. Unlike
    /// `fetch_temp`, the request may exceed the buffer size: whole blocks
    /// are read straight into `dest`, and the residual tail is recovered
    /// through a buffer refill so that the stream's block alignment is
    /// preserved for subsequent operations.
    pub fn read_into(&mut self, ty: Type, nvals: usize, dest: &mut [u8]) -> Result<usize> {
        assert_eq!(self.mode, AccessMode::Read);

        let esize = ty.size();
        let nbytes = nvals * esize;
        assert!(dest.len() >= nbytes);

        if self.eof {
            // All that's left is to decode already-buffered data. If
            // there isn't as much as requested, return a short count.
            let n = cmp::min(self.end - self.pos, nbytes);

            if n % esize != 0 {
                return Err(truncation_error(ty));
            }

            recode_copy(&self.buf[self.pos..self.pos + n], &mut dest[..n], ty);
            self.pos += n;
            return Ok(n / esize);
        }

        let ninbuf = cmp::min(nbytes, self.bufsz - self.pos);
        dest[..ninbuf].copy_from_slice(&self.buf[self.pos..self.pos + ninbuf]);
        self.pos += ninbuf;
        let mut total = ninbuf;

        if ninbuf < nbytes {
            let remaining = nbytes - ninbuf;
            let nblocks = remaining / self.bufsz;
            let ndirect = nblocks * self.bufsz;

            let nread = read_full(&mut self.file, &mut dest[total..total + ndirect])?;
            total += nread;

            if nread < ndirect {
                self.eof = true;
                self.end = 0;
                self.pos = 0;
            } else {
                let tail = remaining - ndirect;

                if tail > 0 {
                    self.refill()?;
                    let avail = if self.eof { self.end } else { self.bufsz };
                    let n = cmp::min(tail, avail);
                    dest[total..total + n].copy_from_slice(&self.buf[..n]);
                    self.pos = n;
                    total += n;
                }
                // With no tail the cursor is parked at the block
                // boundary, so the next fetch triggers a refill.
            }
        }

        if total % esize != 0 {
            return Err(truncation_error(ty));
        }

        recode_inplace(&mut dest[..total], ty);
        Ok(total / esize)
    }

    /// Advance the cursor (read mode) or zero-pad (write mode) to the
    /// next multiple of `align`, which must divide the buffer size. In
    /// read mode after EOF the cursor stops at the end of the data.
    pub fn nudge_align(&mut self, align: usize) -> Result<()> {
        debug_assert_eq!(self.bufsz % align, 0);

        let n = self.pos % align;

        if n == 0 {
            return Ok(());
        }

        let n = align - n;

        match self.mode {
            AccessMode::Read => {
                if self.eof {
                    if self.pos + n <= self.end {
                        self.pos += n;
                    } else {
                        self.pos = self.end;
                    }
                    return Ok(());
                }

                // Since the buffer size is a multiple of every supported
                // alignment, the skip cannot cross a block boundary.
                debug_assert!(self.pos != self.bufsz);
                debug_assert!(self.pos + n <= self.bufsz);
                self.pos += n;
                Ok(())
            }
            AccessMode::Write => {
                const ZEROS: [u8; 64] = [0u8; 64];
                let mut left = n;

                while left > 0 {
                    let c = cmp::min(left, ZEROS.len());
                    self.write_raw(&ZEROS[..c])?;
                    left -= c;
                }

                Ok(())
            }
        }
    }

    fn flush_block(&mut self) -> Result<()> {
        self.file.write_all(&self.buf)?;
        self.pos = 0;
        Ok(())
    }

    /// Append raw bytes to the stream. Whole blocks written from an
    /// aligned cursor bypass the buffer entirely.
    pub fn write_raw(&mut self, mut data: &[u8]) -> Result<()> {
        assert_eq!(self.mode, AccessMode::Write);

        while !data.is_empty() {
            if self.pos == 0 && data.len() >= self.bufsz {
                self.file.write_all(&data[..self.bufsz])?;
                data = &data[self.bufsz..];
                continue;
            }

            let n = cmp::min(data.len(), self.bufsz - self.pos);
            self.buf[self.pos..self.pos + n].copy_from_slice(&data[..n]);
            self.pos += n;
            data = &data[n..];

            if self.pos == self.bufsz {
                self.flush_block()?;
            }
        }

        Ok(())
    }

    /// Append host-order elements of type `ty`, recoding them to
    /// big-endian as they are buffered. `data` must be a whole number of
    /// elements.
    pub fn write_typed(&mut self, ty: Type, data: &[u8]) -> Result<()> {
        assert_eq!(self.mode, AccessMode::Write);

        if data.len() % ty.size() != 0 {
            return Err(format_err!(
                "typed write of {} bytes is not a whole number of {} values",
                data.len(),
                ty
            ));
        }

        let unit = recode_unit(ty);
        let mut src = data;

        while !src.is_empty() {
            let n = cmp::min(src.len(), self.bufsz - self.pos);
            let n = n - n % unit;

            if n == 0 {
                // An element would straddle two buffer flushes; the
                // alignment discipline of our callers rules this out.
                return Err(format_err!(
                    "typed write would split a {} value across a block boundary",
                    ty
                ));
            }

            recode_copy(&src[..n], &mut self.buf[self.pos..self.pos + n], ty);
            self.pos += n;
            src = &src[n..];

            if self.pos == self.bufsz {
                self.flush_block()?;
            }
        }

        Ok(())
    }

    pub(crate) fn shutdown(&mut self) -> Result<()> {
        if self.flushed {
            return Ok(());
        }

        self.flushed = true;

        if self.mode == AccessMode::Write && self.pos > 0 {
            let pos = self.pos;
            self.pos = 0;
            self.file.write_all(&self.buf[..pos])?;
        }

        Ok(())
    }

    /// Flush any residual write buffer and release the stream, reporting
    /// errors. Dropping a stream performs the same flush but discards any
    /// error.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }
}

impl Drop for IoStream {
    fn drop(&mut self) {
        let _r = self.shutdown();
    }
}

impl std::fmt::Debug for IoStream {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("IoStream")
            .field("mode", &self.mode)
            .field("bufsz", &self.bufsz)
            .field("pos", &self.pos)
            .field("eof", &self.eof)
            .finish()
    }
}

fn truncation_error(ty: Type) -> crate::errors::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("truncated stream: short read is not a whole number of {} values", ty),
    )
    .into()
}

/// Copy the remainder of `input` to `output`, byte-exactly and with no
/// recoding. The two streams must have equal buffer sizes and equal
/// cursors (modulo the buffer size), so that the unconsumed tail of
/// `input`'s buffer exactly tops up `output`'s current block; every
/// subsequent full block then streams through `write_raw`'s direct path.
pub fn pipe(input: &mut IoStream, output: &mut IoStream) -> Result<()> {
    assert_eq!(input.mode, AccessMode::Read);
    assert_eq!(output.mode, AccessMode::Write);
    assert_eq!(input.bufsz, output.bufsz);
    assert_eq!(input.pos % input.bufsz, output.pos);

    loop {
        if !input.eof && input.pos == input.bufsz {
            input.refill()?;
            continue;
        }

        let valid = if input.eof { input.end } else { input.bufsz };

        if input.pos < valid {
            output.write_raw(&input.buf[input.pos..valid])?;
            input.pos = valid;
        }

        if input.eof {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, ByteOrder};
    use std::fs;
    use std::io::Write as _;
    use std::path::Path;

    fn write_file(path: &Path, data: &[u8]) {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(data).unwrap();
    }

    fn reader(path: &Path, bufsz: usize) -> IoStream {
        IoStream::new(AccessMode::Read, fs::File::open(path).unwrap(), bufsz)
    }

    fn writer(path: &Path, bufsz: usize) -> IoStream {
        IoStream::new(AccessMode::Write, fs::File::create(path).unwrap(), bufsz)
    }

    #[test]
    fn recode_is_involution() {
        let orig: Vec<u8> = (0..64).collect();

        for &ty in &[
            Type::Int8,
            Type::Int16,
            Type::Int32,
            Type::Int64,
            Type::Float32,
            Type::Float64,
            Type::Complex64,
            Type::Text,
        ] {
            let mut data = orig.clone();
            recode_inplace(&mut data, ty);
            recode_inplace(&mut data, ty);
            assert_eq!(data, orig, "double recode of {} altered data", ty);

            let mut once = orig.clone();
            recode_inplace(&mut once, ty);
            let mut copied = vec![0u8; 64];
            recode_copy(&orig, &mut copied, ty);
            assert_eq!(copied, once);
        }
    }

    #[test]
    fn fetch_within_and_across_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        let data: Vec<u8> = (0..600u32).map(|i| (i % 251) as u8).collect();
        write_file(&path, &data);

        let mut s = reader(&path, 256);

        // Entirely within the first block.
        let got = s.fetch_temp(200).unwrap();
        assert_eq!(got, &data[..200]);

        // Crosses the 256-byte boundary; must be assembled in scratch
        // without disturbing the contents.
        let got = s.fetch_temp(100).unwrap();
        assert_eq!(got, &data[200..300]);

        // Within the second block.
        let got = s.fetch_temp(100).unwrap();
        assert_eq!(got, &data[300..400]);

        // Truncated by EOF: 600 - 400 = 200 bytes remain.
        let got = s.fetch_temp(250).unwrap();
        assert_eq!(got, &data[400..]);

        // Sticky EOF.
        assert_eq!(s.fetch_temp(1).unwrap().len(), 0);
    }

    #[test]
    fn fetch_exact_boundary_refills() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        let data: Vec<u8> = (0..512u32).map(|i| (i % 256) as u8).collect();
        write_file(&path, &data);

        let mut s = reader(&path, 256);
        assert_eq!(s.fetch_temp(256).unwrap(), &data[..256]);
        assert_eq!(s.fetch_temp(256).unwrap(), &data[256..]);
        assert_eq!(s.fetch_temp(4).unwrap().len(), 0);
    }

    #[test]
    fn fetch_typed_decodes_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        let mut data = vec![0u8; 16];
        BigEndian::write_i32_into(&[1, -2, 300000, -400000], &mut data);
        write_file(&path, &data);

        let mut s = reader(&path, 256);
        let got = s.fetch_temp_typed(Type::Int32, 4).unwrap();
        let mut vals = [0i32; 4];
        byteorder::NativeEndian::read_i32_into(got, &mut vals);
        assert_eq!(vals, [1, -2, 300000, -400000]);
    }

    #[test]
    fn nudge_align_lands_on_multiples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        let data: Vec<u8> = (0..256u32).map(|i| i as u8).collect();
        write_file(&path, &data);

        let mut s = reader(&path, 256);
        s.fetch_temp(3).unwrap();
        s.nudge_align(8).unwrap();
        assert_eq!(s.fetch_temp(1).unwrap(), &[8]);

        // Already aligned: no movement.
        s.nudge_align(1).unwrap();
        assert_eq!(s.fetch_temp(1).unwrap(), &[9]);
    }

    #[test]
    fn nudge_align_clamps_at_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        write_file(&path, &[1, 2, 3]);

        let mut s = reader(&path, 256);
        s.fetch_temp(3).unwrap();
        s.nudge_align(8).unwrap();
        assert_eq!(s.fetch_temp(1).unwrap().len(), 0);
    }

    #[test]
    fn read_into_spans_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");

        let vals: Vec<i32> = (0..300).map(|i| i * 7 - 1000).collect();
        let mut data = vec![0u8; 1200];
        BigEndian::write_i32_into(&vals, &mut data);
        write_file(&path, &data);

        let mut s = reader(&path, 256);

        // Pull a prefix through the buffer so the bulk read starts
        // mid-block.
        let got = s.fetch_temp_typed(Type::Int32, 1).unwrap();
        assert_eq!(byteorder::NativeEndian::read_i32(got), vals[0]);

        let mut dest = vec![0u8; 299 * 4];
        let n = s.read_into(Type::Int32, 299, &mut dest).unwrap();
        assert_eq!(n, 299);

        let mut out = vec![0i32; 299];
        byteorder::NativeEndian::read_i32_into(&dest, &mut out);
        assert_eq!(out, &vals[1..]);

        // The stream is exactly consumed.
        assert_eq!(s.fetch_temp(4).unwrap().len(), 0);
    }

    #[test]
    fn read_into_short_at_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        let mut data = vec![0u8; 8];
        BigEndian::write_i32_into(&[5, 6], &mut data);
        write_file(&path, &data);

        let mut s = reader(&path, 256);
        let mut dest = vec![0u8; 16];
        assert_eq!(s.read_into(Type::Int32, 4, &mut dest).unwrap(), 2);
    }

    #[test]
    fn read_into_rejects_partial_element() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        write_file(&path, &[0, 0, 0, 1, 0, 0]);

        let mut s = reader(&path, 256);
        let mut dest = vec![0u8; 8];
        assert!(s.read_into(Type::Int32, 2, &mut dest).is_err());
    }

    #[test]
    fn write_raw_and_typed_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");

        let vals: Vec<i64> = (0..200).map(|i| i * i - 5000).collect();
        let mut host = vec![0u8; vals.len() * 8];
        byteorder::NativeEndian::write_i64_into(&vals, &mut host);

        let mut s = writer(&path, 256);
        s.write_raw(b"prehdr\0\0").unwrap();
        s.write_typed(Type::Int64, &host).unwrap();
        s.close().unwrap();

        let data = fs::read(&path).unwrap();
        assert_eq!(data.len(), 8 + vals.len() * 8);
        assert_eq!(&data[..8], b"prehdr\0\0");

        let mut back = vec![0i64; vals.len()];
        BigEndian::read_i64_into(&data[8..], &mut back);
        assert_eq!(back, vals);
    }

    #[test]
    fn write_nudge_align_pads_zeros() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");

        let mut s = writer(&path, 256);
        s.write_raw(&[0xAA, 0xBB, 0xCC]).unwrap();
        s.nudge_align(8).unwrap();
        s.write_raw(&[0xDD]).unwrap();
        s.close().unwrap();

        assert_eq!(
            fs::read(&path).unwrap(),
            vec![0xAA, 0xBB, 0xCC, 0, 0, 0, 0, 0, 0xDD]
        );
    }

    #[test]
    fn complex_values_recode_as_float_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");

        let mut host = vec![0u8; 8];
        byteorder::NativeEndian::write_f32_into(&[1.5, -2.5], &mut host);

        let mut s = writer(&path, 256);
        s.write_typed(Type::Complex64, &host).unwrap();
        s.close().unwrap();

        let data = fs::read(&path).unwrap();
        assert_eq!(BigEndian::read_f32(&data[0..4]), 1.5);
        assert_eq!(BigEndian::read_f32(&data[4..8]), -2.5);
    }

    #[test]
    fn pipe_copies_byte_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");

        let data: Vec<u8> = (0..3000u32).map(|i| (i % 254) as u8).collect();
        write_file(&src, &data);

        let mut input = reader(&src, 256);
        let mut output = writer(&dst, 256);
        pipe(&mut input, &mut output).unwrap();
        output.close().unwrap();

        assert_eq!(fs::read(&dst).unwrap(), data);
    }

    #[test]
    fn pipe_mid_stream() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");

        let data: Vec<u8> = (0..700u32).map(|i| (i % 250) as u8).collect();
        write_file(&src, &data);

        let mut input = reader(&src, 256);
        let mut output = writer(&dst, 256);

        // Consume a prefix by hand, then let pipe take over at equal
        // cursors.
        let head = input.fetch_temp(16).unwrap().to_vec();
        output.write_raw(&head).unwrap();
        pipe(&mut input, &mut output).unwrap();
        output.close().unwrap();

        assert_eq!(fs::read(&dst).unwrap(), data);
    }
}
