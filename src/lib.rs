// Copyright 2017-2022 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

/*!

Access to MIRIAD-format data sets.

A MIRIAD data set is a directory. Small typed "items" are packed together
into a binary file named `header`; every other item is a file of its own
inside the directory. All multi-byte values are stored big-endian,
regardless of the host. On top of the generic item layer, the
[`visdata`] module implements the streaming codec for UV visibility data
and [`mask`] unpacks bit-mask items such as UV flags.

Data sets are opened read-only or read-write, never write-only. All
writes are buffered until the relevant handle is closed, and the `header`
file is only ever replaced atomically, by writing `header+new` and
renaming it into place.

*/

use byteorder::{BigEndian, ByteOrder, NativeEndian};
use num_complex::Complex;
use std::cmp;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

#[macro_use]
pub mod errors; // must come first to provide macros for other modules
pub mod iostream;
pub mod mask;
pub mod visdata;

use crate::errors::{DsError, Error, Result};
pub use crate::iostream::{AccessMode, IoStream};

/// The maximum length of the name of a dataset "item", in bytes.
pub const MAX_ITEM_NAME_LENGTH: usize = 8;

/// The granularity of records in the `header` item, in bytes.
const HEADER_RECORD_SIZE: usize = 16;

/// The maximum size of a small item's packed data, in bytes.
const HEADER_MAX_DATA_SIZE: usize = 64;

/// The data types defined by the MIRIAD format.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Type {
    Binary = 0,
    Int8 = 1,
    Int32 = 2,
    Int16 = 3,
    Float32 = 4,
    Float64 = 5,
    Text = 6,
    Complex64 = 7,
    Int64 = 8,
}

impl Type {
    /// Decode an on-disk type code.
    pub fn try_from_code(type_code: i32) -> Result<Self> {
        match type_code {
            0 => Ok(Type::Binary),
            1 => Ok(Type::Int8),
            2 => Ok(Type::Int32),
            3 => Ok(Type::Int16),
            4 => Ok(Type::Float32),
            5 => Ok(Type::Float64),
            6 => Ok(Type::Text),
            7 => Ok(Type::Complex64),
            8 => Ok(Type::Int64),
            _ => Err(format_err!("illegal MIRIAD type code {}", type_code)),
        }
    }

    /// The single-character abbreviation used in UV variable tables and
    /// diagnostic listings.
    pub fn abbrev_char(&self) -> char {
        match self {
            Type::Binary => '?',
            Type::Int8 => 'b',
            Type::Int16 => 'j',
            Type::Int32 => 'i',
            Type::Int64 => 'l',
            Type::Float32 => 'r',
            Type::Float64 => 'd',
            Type::Complex64 => 'c',
            Type::Text => 'a',
        }
    }

    /// The inverse of [`Type::abbrev_char`].
    pub fn try_from_abbrev(c: char) -> Result<Self> {
        match c {
            '?' => Ok(Type::Binary),
            'b' => Ok(Type::Int8),
            'j' => Ok(Type::Int16),
            'i' => Ok(Type::Int32),
            'l' => Ok(Type::Int64),
            'r' => Ok(Type::Float32),
            'd' => Ok(Type::Float64),
            'c' => Ok(Type::Complex64),
            'a' => Ok(Type::Text),
            _ => Err(format_err!("illegal MIRIAD type abbreviation '{}'", c)),
        }
    }

    /// The size of a single value of this type, in bytes.
    pub fn size(&self) -> usize {
        match self {
            Type::Binary => 1,
            Type::Int8 => 1,
            Type::Int16 => 2,
            Type::Int32 => 4,
            Type::Int64 => 8,
            Type::Float32 => 4,
            Type::Float64 => 8,
            Type::Complex64 => 8,
            Type::Text => 1,
        }
    }

    /// The alignment required of values of this type within a stream.
    pub fn alignment(&self) -> usize {
        match self {
            Type::Binary => 1,
            Type::Int8 => 1,
            Type::Int16 => 2,
            Type::Int32 => 4,
            Type::Int64 => 8,
            Type::Float32 => 4,
            Type::Float64 => 8,
            Type::Complex64 => 4, // this is the only surprising one
            Type::Text => 1,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.pad(match self {
            Type::Binary => "binary",
            Type::Int8 => "int8",
            Type::Int16 => "int16",
            Type::Int32 => "int32",
            Type::Int64 => "int64",
            Type::Float32 => "float32",
            Type::Float64 => "float64",
            Type::Complex64 => "complex64",
            Type::Text => "text",
        })
    }
}

/// Convert `nvals` host-order values of `src_ty` in `src` into values of
/// `dest_ty` in `dest`, allowing only conversions that the format defines
/// as widening: int8 → int16 → int32 → int64 → float32 → float64, with
/// complex64 reachable from any of the reals. Same-type conversion is a
/// straight copy. Returns false, leaving `dest` unspecified, for any
/// other pair.
pub fn upconvert(src_ty: Type, src: &[u8], dest_ty: Type, dest: &mut [u8], nvals: usize) -> bool {
    debug_assert!(src.len() >= nvals * src_ty.size());
    debug_assert!(dest.len() >= nvals * dest_ty.size());

    if src_ty == dest_ty {
        let n = nvals * src_ty.size();
        dest[..n].copy_from_slice(&src[..n]);
        return true;
    }

    let permitted = match dest_ty {
        Type::Int16 => matches!(src_ty, Type::Int8),
        Type::Int32 => matches!(src_ty, Type::Int8 | Type::Int16),
        Type::Int64 => matches!(src_ty, Type::Int8 | Type::Int16 | Type::Int32),
        Type::Float32 => matches!(src_ty, Type::Int8 | Type::Int16 | Type::Int32 | Type::Int64),
        Type::Float64 | Type::Complex64 => matches!(
            src_ty,
            Type::Int8 | Type::Int16 | Type::Int32 | Type::Int64 | Type::Float32
        ),
        _ => false,
    };

    if !permitted {
        return false;
    }

    for i in 0..nvals {
        // Every permitted source value can be carried through an i64 or
        // f64 without loss (int64 → float32 rounds, but the format
        // blesses that conversion).
        let iv: i64;
        let fv: f64;

        match src_ty {
            Type::Int8 => {
                iv = src[i] as i8 as i64;
                fv = iv as f64;
            }
            Type::Int16 => {
                iv = NativeEndian::read_i16(&src[2 * i..]) as i64;
                fv = iv as f64;
            }
            Type::Int32 => {
                iv = NativeEndian::read_i32(&src[4 * i..]) as i64;
                fv = iv as f64;
            }
            Type::Int64 => {
                iv = NativeEndian::read_i64(&src[8 * i..]);
                fv = iv as f64;
            }
            Type::Float32 => {
                fv = NativeEndian::read_f32(&src[4 * i..]) as f64;
                iv = 0;
            }
            _ => unreachable!(),
        }

        match dest_ty {
            Type::Int16 => NativeEndian::write_i16(&mut dest[2 * i..2 * i + 2], iv as i16),
            Type::Int32 => NativeEndian::write_i32(&mut dest[4 * i..4 * i + 4], iv as i32),
            Type::Int64 => NativeEndian::write_i64(&mut dest[8 * i..8 * i + 8], iv),
            Type::Float32 => NativeEndian::write_f32(&mut dest[4 * i..4 * i + 4], fv as f32),
            Type::Float64 => NativeEndian::write_f64(&mut dest[8 * i..8 * i + 8], fv),
            Type::Complex64 => {
                NativeEndian::write_f32(&mut dest[8 * i..8 * i + 4], fv as f32);
                NativeEndian::write_f32(&mut dest[8 * i + 4..8 * i + 8], 0.0);
            }
            _ => unreachable!(),
        }
    }

    true
}

/// Render a run of host-order typed values for human consumption:
/// `<>` when empty, a quoted string for text, a bracketed list for
/// multi-valued items.
pub fn format_data(data: &[u8], ty: Type, nvals: usize) -> String {
    if nvals == 0 {
        return "<>".to_owned();
    }

    if ty == Type::Text {
        return format!("\"{}\"", String::from_utf8_lossy(&data[..nvals]));
    }

    let mut s = String::new();

    if nvals > 1 {
        s.push('[');
    }

    for i in 0..nvals {
        if i > 0 {
            s.push_str(", ");
        }

        match ty {
            Type::Binary => s.push('?'),
            Type::Int8 => s.push_str(&format!("{}", data[i] as i8)),
            Type::Int16 => s.push_str(&format!("{}", NativeEndian::read_i16(&data[2 * i..]))),
            Type::Int32 => s.push_str(&format!("{}", NativeEndian::read_i32(&data[4 * i..]))),
            Type::Int64 => s.push_str(&format!("{}", NativeEndian::read_i64(&data[8 * i..]))),
            Type::Float32 => s.push_str(&format!("{}", NativeEndian::read_f32(&data[4 * i..]))),
            Type::Float64 => s.push_str(&format!("{}", NativeEndian::read_f64(&data[8 * i..]))),
            Type::Complex64 => {
                let re = NativeEndian::read_f32(&data[8 * i..]);
                let im = NativeEndian::read_f32(&data[8 * i + 4..]);
                s.push_str(&format!("{}{:+}i", re, im));
            }
            Type::Text => unreachable!(),
        }
    }

    if nvals > 1 {
        s.push(']');
    }

    s
}

/// This trait marks that the given Rust type maps onto a type defined in
/// the MIRIAD data format.
pub trait MiriadMappedType: Sized {
    /// The particular MIRIAD [`Type`] to which this Rust type maps.
    const TYPE: Type;

    /// Decode a buffer of big-endian data into a vector of values.
    fn vec_from_miriad_bytes(buf: &[u8]) -> Result<Vec<Self>>;

    /// Encode values into their on-disk big-endian representation.
    fn vec_to_miriad_bytes(values: &[Self]) -> Vec<u8>;

    /// Encode values into host-order bytes, the form consumed by the
    /// typed stream writers.
    fn vec_to_native_bytes(values: &[Self]) -> Vec<u8>;
}

impl MiriadMappedType for u8 {
    const TYPE: Type = Type::Binary;

    fn vec_from_miriad_bytes(buf: &[u8]) -> Result<Vec<Self>> {
        Ok(buf.to_vec())
    }

    fn vec_to_miriad_bytes(values: &[Self]) -> Vec<u8> {
        values.to_vec()
    }

    fn vec_to_native_bytes(values: &[Self]) -> Vec<u8> {
        values.to_vec()
    }
}

impl MiriadMappedType for i8 {
    const TYPE: Type = Type::Int8;

    fn vec_from_miriad_bytes(buf: &[u8]) -> Result<Vec<Self>> {
        Ok(buf.iter().map(|&b| b as i8).collect())
    }

    fn vec_to_miriad_bytes(values: &[Self]) -> Vec<u8> {
        values.iter().map(|&v| v as u8).collect()
    }

    fn vec_to_native_bytes(values: &[Self]) -> Vec<u8> {
        Self::vec_to_miriad_bytes(values)
    }
}

macro_rules! impl_mapped_type {
    ($rust:ty, $mt:expr, $size:expr, $read:ident, $write:ident) => {
        impl MiriadMappedType for $rust {
            const TYPE: Type = $mt;

            fn vec_from_miriad_bytes(buf: &[u8]) -> Result<Vec<Self>> {
                if buf.len() % $size != 0 {
                    return Err(format_err!(
                        "{} bytes do not hold whole {} values",
                        buf.len(),
                        $mt
                    ));
                }

                Ok(buf.chunks_exact($size).map(|c| BigEndian::$read(c)).collect())
            }

            fn vec_to_miriad_bytes(values: &[Self]) -> Vec<u8> {
                let mut buf = vec![0u8; values.len() * $size];
                BigEndian::$write(values, &mut buf);
                buf
            }

            fn vec_to_native_bytes(values: &[Self]) -> Vec<u8> {
                let mut buf = vec![0u8; values.len() * $size];
                NativeEndian::$write(values, &mut buf);
                buf
            }
        }
    };
}

impl_mapped_type!(i16, Type::Int16, 2, read_i16, write_i16_into);
impl_mapped_type!(i32, Type::Int32, 4, read_i32, write_i32_into);
impl_mapped_type!(i64, Type::Int64, 8, read_i64, write_i64_into);
impl_mapped_type!(f32, Type::Float32, 4, read_f32, write_f32_into);
impl_mapped_type!(f64, Type::Float64, 8, read_f64, write_f64_into);

impl MiriadMappedType for Complex<f32> {
    const TYPE: Type = Type::Complex64;

    fn vec_from_miriad_bytes(buf: &[u8]) -> Result<Vec<Self>> {
        if buf.len() % 8 != 0 {
            return Err(format_err!(
                "{} bytes do not hold whole complex64 values",
                buf.len()
            ));
        }

        Ok(buf
            .chunks_exact(8)
            .map(|c| Complex::new(BigEndian::read_f32(&c[..4]), BigEndian::read_f32(&c[4..])))
            .collect())
    }

    fn vec_to_miriad_bytes(values: &[Self]) -> Vec<u8> {
        let mut buf = vec![0u8; values.len() * 8];
        for (v, c) in values.iter().zip(buf.chunks_exact_mut(8)) {
            BigEndian::write_f32(&mut c[..4], v.re);
            BigEndian::write_f32(&mut c[4..], v.im);
        }
        buf
    }

    fn vec_to_native_bytes(values: &[Self]) -> Vec<u8> {
        let mut buf = vec![0u8; values.len() * 8];
        for (v, c) in values.iter().zip(buf.chunks_exact_mut(8)) {
            NativeEndian::write_f32(&mut c[..4], v.re);
            NativeEndian::write_f32(&mut c[4..], v.im);
        }
        buf
    }
}

impl MiriadMappedType for String {
    const TYPE: Type = Type::Text;

    /// As a special hack, this only ever returns a 1-element vector.
    fn vec_from_miriad_bytes(buf: &[u8]) -> Result<Vec<Self>> {
        Ok(vec![std::str::from_utf8(buf)?.to_owned()])
    }

    fn vec_to_miriad_bytes(values: &[Self]) -> Vec<u8> {
        values.concat().into_bytes()
    }

    fn vec_to_native_bytes(values: &[Self]) -> Vec<u8> {
        Self::vec_to_miriad_bytes(values)
    }
}

/// Check that `name` is legal as the name of a dataset item: one to
/// eight bytes, starting with a lowercase ASCII letter, continuing with
/// lowercase letters, digits, `-`, or `_`. The name `header` is reserved
/// for the small-item store.
pub fn validate_item_name(name: &str) -> Result<()> {
    let bytes = name.as_bytes();

    let ok = !bytes.is_empty()
        && bytes.len() <= MAX_ITEM_NAME_LENGTH
        && bytes[0].is_ascii_lowercase()
        && bytes[1..]
            .iter()
            .all(|&b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
        && name != "header";

    if ok {
        Ok(())
    } else {
        Err(Error::ItemName(name.to_owned()))
    }
}

/// Flags modifying how data sets and large items are opened.
///
/// For read-only opens the flags are ignored. Otherwise `create_ok`
/// permits creating a missing dataset or item; `exist_bad` makes an
/// *existing* one an error (and implies `create_ok`); `append` forbids
/// rewriting existing content; `truncate` discards existing content.
/// `truncate` and `append` are mutually exclusive, and a writable large
/// item must select exactly one of them.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct OpenFlags {
    pub create_ok: bool,
    pub exist_bad: bool,
    pub truncate: bool,
    pub append: bool,
}

/// A small item: its packed data live inline in the `header` file.
/// The data are kept in their on-disk big-endian form.
#[derive(Clone, Debug)]
struct SmallItem {
    name: String,
    ty: Type,
    data: Vec<u8>,
}

impl SmallItem {
    fn n_vals(&self) -> usize {
        self.data.len() / self.ty.size()
    }
}

/// What [`DataSet::probe_item`] reports about an item.
#[derive(Clone, Debug)]
pub struct ItemInfo {
    pub name: String,
    pub is_large: bool,
    pub ty: Type,
    pub n_vals: usize,
    /// For small items, the packed big-endian data.
    pub small_data: Option<Vec<u8>>,
}

impl ItemInfo {
    /// Render a small item's value for human consumption. Returns None
    /// for large items.
    pub fn format_value(&self) -> Option<String> {
        self.small_data.as_ref().map(|data| {
            let mut host = vec![0u8; data.len()];
            iostream::recode_copy(data, &mut host, self.ty);
            format_data(&host, self.ty, self.n_vals)
        })
    }
}

/// An open MIRIAD data set.
pub struct DataSet {
    path: PathBuf,
    mode: AccessMode,
    append: bool,
    small_items: Vec<SmallItem>,
    small_index: HashMap<String, usize>,
    header_dirty: bool,
    closed: bool,
}

fn io_context(e: io::Error, msg: String) -> Error {
    io::Error::new(e.kind(), format!("{}: {}", msg, e)).into()
}

impl DataSet {
    /// Open a data set directory.
    ///
    /// Opening with [`AccessMode::Write`] grants read access too; there
    /// is no write-only data set. With `create_ok` a missing directory
    /// is created (mode 0755) and an empty header will be written on
    /// close. With `truncate` every file in an existing directory is
    /// deleted first. With `append`, existing small items may not be
    /// modified and existing large items may only be appended to.
    pub fn open<P: AsRef<Path>>(path: P, mode: AccessMode, flags: OpenFlags) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let mut flags = flags;
        let mut created = false;

        if flags.exist_bad {
            flags.create_ok = true;
        }

        if mode == AccessMode::Write {
            assert!(
                !(flags.truncate && flags.append),
                "truncate and append are mutually exclusive"
            );

            if flags.create_ok {
                match fs::DirBuilder::new().mode(0o755).create(&path) {
                    Ok(()) => created = true,
                    Err(ref e) if e.kind() == io::ErrorKind::AlreadyExists && !flags.exist_bad => {}
                    Err(e) => {
                        return Err(io_context(
                            e,
                            format!("failed to create dataset directory \"{}\"", path.display()),
                        ));
                    }
                }
            }
        }

        if !created {
            match fs::metadata(&path) {
                Ok(ref md) if md.is_dir() => {}
                Ok(_) => {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::Other,
                        format!("dataset \"{}\" is not a directory", path.display()),
                    )));
                }
                Err(e) => {
                    return Err(io_context(
                        e,
                        format!("cannot open dataset \"{}\"", path.display()),
                    ));
                }
            }
        }

        let mut ds = DataSet {
            path,
            mode,
            append: flags.append,
            small_items: Vec::new(),
            small_index: HashMap::new(),
            header_dirty: false,
            closed: false,
        };

        if created {
            // An empty header will be written at close.
            ds.header_dirty = true;
        } else if mode == AccessMode::Write && flags.truncate {
            ds.truncate_contents()?;
            ds.header_dirty = true;
        } else {
            ds.parse_header()?;
        }

        Ok(ds)
    }

    fn item_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    fn small(&self, name: &str) -> Option<&SmallItem> {
        self.small_index.get(name).map(|&idx| &self.small_items[idx])
    }

    fn insert_small(&mut self, item: SmallItem) {
        // A redundant header record silently replaces its predecessor.
        if let Some(&idx) = self.small_index.get(&item.name) {
            self.small_items[idx] = item;
        } else {
            self.small_index.insert(item.name.clone(), self.small_items.len());
            self.small_items.push(item);
        }
    }

    fn truncate_contents(&mut self) -> Result<()> {
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;

            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
            }
        }

        Ok(())
    }

    /// Read the packed `header` file into the small-item table.
    fn parse_header(&mut self) -> Result<()> {
        let f = fs::File::open(self.item_path("header")).map_err(|e| {
            io_context(
                e,
                format!("failed to open header of \"{}\"", self.path.display()),
            )
        })?;
        let mut hio = IoStream::new(AccessMode::Read, f, 0);

        loop {
            let rec = hio.fetch_temp(HEADER_RECORD_SIZE)?;

            if rec.is_empty() {
                break;
            }

            if rec.len() != HEADER_RECORD_SIZE {
                return Err(format_err!("invalid dataset header: incomplete record"));
            }

            let alen = rec[HEADER_RECORD_SIZE - 1] as usize;

            if alen != 0 && alen < 5 {
                return Err(format_err!("invalid dataset header: bad record length"));
            }

            if alen > HEADER_MAX_DATA_SIZE {
                return Err(format_err!(
                    "invalid dataset header: record length exceeds {} bytes",
                    HEADER_MAX_DATA_SIZE
                ));
            }

            // The padding bytes after the name are always NULs, so the
            // name is NUL-terminated within its 15 bytes; verify rather
            // than assume.
            if rec[MAX_ITEM_NAME_LENGTH] != 0 {
                return Err(format_err!(
                    "invalid dataset header: item name is not NUL-terminated"
                ));
            }

            let name_len = rec.iter().position(|&b| b == 0).unwrap();
            let name = std::str::from_utf8(&rec[..name_len])?.to_owned();

            let (ty, data) = if alen == 0 {
                (Type::Binary, Vec::new())
            } else {
                let payload = hio.fetch_temp(alen)?;

                if payload.len() != alen {
                    return Err(format_err!("invalid dataset header: incomplete small item"));
                }

                let mut ty = Type::try_from_code(BigEndian::read_i32(&payload[..4]))
                    .map_err(|_| format_err!("invalid dataset header: illegal type code"))?;

                // Textual items are stored with the int8 type code; there
                // is no way to tell the two apart, and text wins.
                if ty == Type::Int8 {
                    ty = Type::Text;
                }

                // Padding realigns the data to the type's alignment, so
                // only int64 and float64 carry any; complex64 aligns to
                // its float32 halves and starts right after the code.
                let dstart = cmp::max(4, ty.alignment());

                if alen < dstart {
                    return Err(format_err!("invalid dataset header: bad record length"));
                }

                let dlen = alen - dstart;

                if dlen % ty.size() != 0 {
                    return Err(format_err!(
                        "invalid dataset header: nonintegral number of values"
                    ));
                }

                (ty, payload[dstart..].to_vec())
            };

            self.insert_small(SmallItem { name, ty, data });
            hio.nudge_align(HEADER_RECORD_SIZE)?;
        }

        Ok(())
    }

    /// Serialize the small-item table and atomically replace the
    /// `header` file with it.
    pub fn write_header(&mut self) -> Result<()> {
        if self.mode != AccessMode::Write {
            return Err(Error::InternalPerms);
        }

        let mut hio = self.open_for_replace("header")?;

        for si in &self.small_items {
            let mut rec = [0u8; HEADER_RECORD_SIZE];
            rec[..si.name.len()].copy_from_slice(si.name.as_bytes());

            let alen = if si.data.is_empty() {
                0
            } else {
                cmp::max(4, si.ty.alignment()) + si.data.len()
            };
            rec[HEADER_RECORD_SIZE - 1] = alen as u8;
            hio.write_raw(&rec)?;

            if alen != 0 {
                // Text goes to disk as int8.
                let code = match si.ty {
                    Type::Text => Type::Int8 as i32,
                    other => other as i32,
                };

                let mut code_buf = [0u8; 4];
                BigEndian::write_i32(&mut code_buf, code);
                hio.write_raw(&code_buf)?;
                hio.nudge_align(si.ty.alignment())?;
                hio.write_raw(&si.data)?;
            }

            hio.nudge_align(HEADER_RECORD_SIZE)?;
        }

        hio.close()?;
        self.finish_replace_inner("header", true)?;
        self.header_dirty = false;
        Ok(())
    }

    /// Does an item of the given name exist?
    pub fn has_item(&self, name: &str) -> bool {
        if name.len() > MAX_ITEM_NAME_LENGTH {
            return false;
        }

        if self.small_index.contains_key(name) {
            return true;
        }

        self.item_path(name).exists()
    }

    /// List the names of every item in the data set: the union of the
    /// directory contents (names of eight bytes or fewer, excluding
    /// `header`) and the small-item table. An item present in both
    /// places is a format error.
    pub fn list_items(&self) -> Result<Vec<String>> {
        let mut items = Vec::new();

        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;

            let name = match entry.file_name().into_string() {
                Ok(s) => s,
                Err(_) => continue,
            };

            if name == "header" || name.len() > MAX_ITEM_NAME_LENGTH {
                continue;
            }

            if self.small_index.contains_key(&name) {
                return Err(format_err!(
                    "invalid dataset: item \"{}\" has both a file and a header entry",
                    name
                ));
            }

            items.push(name);
        }

        for si in &self.small_items {
            items.push(si.name.clone());
        }

        Ok(items)
    }

    /// Identify an item's storage, type and size. Large items are
    /// classified from their first four bytes as described in the format:
    /// a valid type code makes a typed item if the file size works out; a
    /// zero word is heterogeneous binary sized in bytes; printable ASCII
    /// is text spanning the whole file; anything else is opaque binary.
    /// Returns `Ok(None)` if no such item exists.
    pub fn probe_item(&self, name: &str) -> Result<Option<ItemInfo>> {
        if let Some(si) = self.small(name) {
            return Ok(Some(ItemInfo {
                name: name.to_owned(),
                is_large: false,
                ty: si.ty,
                n_vals: si.n_vals(),
                small_data: Some(si.data.clone()),
            }));
        }

        let size = match fs::metadata(self.item_path(name)) {
            Ok(md) => md.len(),
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(io_context(e, format!("unable to stat dataset item \"{}\"", name)));
            }
        };

        let f = fs::File::open(self.item_path(name))?;
        let mut io = IoStream::new(AccessMode::Read, f, 0);
        let head = io.fetch_temp(4)?;

        let mut ty = Type::Binary;
        let mut n_vals = 0usize;

        if head.len() == 4 {
            let code = BigEndian::read_i32(head);

            match code {
                1..=5 | 7 | 8 => {
                    // Possibly a typed item; believe the code only if the
                    // file size corresponds to a whole number of values.
                    let t = Type::try_from_code(code).unwrap();
                    let ofs = cmp::max(4, t.alignment()) as u64;

                    if size >= ofs && (size - ofs) % t.size() as u64 == 0 {
                        ty = t;
                        n_vals = ((size - ofs) / t.size() as u64) as usize;
                    }
                }
                0 => {
                    // Heterogeneous binary, sized in bytes.
                    n_vals = (size - 4) as usize;
                }
                _ => {
                    if head.iter().all(|&c| (0x20..=0x7e).contains(&c)) {
                        ty = Type::Text;
                        n_vals = size as usize;
                    }
                }
            }
        }

        Ok(Some(ItemInfo {
            name: name.to_owned(),
            is_large: true,
            ty,
            n_vals,
            small_data: None,
        }))
    }

    fn open_large_inner(
        &self,
        name: &str,
        mode: AccessMode,
        flags: OpenFlags,
        internal: bool,
    ) -> Result<IoStream> {
        match mode {
            AccessMode::Read => {
                let f = fs::File::open(self.item_path(name)).map_err(|e| {
                    io_context(e, format!("failed to open item file \"{}\"", name))
                })?;
                Ok(IoStream::new(AccessMode::Read, f, 0))
            }
            AccessMode::Write => {
                if self.mode != AccessMode::Write {
                    return Err(Error::InternalPerms);
                }

                assert!(
                    flags.truncate != flags.append,
                    "a writable item needs exactly one of truncate or append"
                );

                if self.append && flags.truncate && !internal {
                    return Err(Error::InternalPerms);
                }

                if (flags.create_ok || flags.exist_bad) && !internal {
                    validate_item_name(name)?;
                }

                let mut opts = fs::OpenOptions::new();
                opts.write(true);

                if flags.exist_bad {
                    opts.create_new(true);
                } else if flags.create_ok {
                    opts.create(true);
                }

                if flags.truncate {
                    opts.truncate(true);
                } else {
                    opts.append(true);
                }

                let f = opts.open(self.item_path(name)).map_err(|e| {
                    io_context(e, format!("failed to open item file \"{}\"", name))
                })?;
                Ok(IoStream::new(AccessMode::Write, f, 0))
            }
        }
    }

    /// Open a large item as a stream. Write opens require a writable
    /// data set and exactly one of the `truncate` and `append` flags; in
    /// an append-mode data set, truncation is forbidden.
    pub fn open_large_item(&self, name: &str, mode: AccessMode, flags: OpenFlags) -> Result<IoStream> {
        self.open_large_inner(name, mode, flags, false)
    }

    /// Begin atomically replacing a large item: returns a write stream
    /// on `"{name}+new"`.
    pub fn open_for_replace(&self, name: &str) -> Result<IoStream> {
        let tmp = format!("{}+new", name);
        let flags = OpenFlags {
            create_ok: true,
            truncate: true,
            ..Default::default()
        };
        self.open_large_inner(&tmp, AccessMode::Write, flags, true)
    }

    /// Complete an atomic replacement: rename `"{name}+new"` over
    /// `name`.
    pub fn finish_replace(&self, name: &str) -> Result<()> {
        self.finish_replace_inner(name, false)
    }

    fn finish_replace_inner(&self, name: &str, internal: bool) -> Result<()> {
        if !internal {
            validate_item_name(name)?;
        }

        let tmp = self.item_path(&format!("{}+new", name));
        fs::rename(&tmp, self.item_path(name))
            .map_err(|e| io_context(e, format!("failed to replace item \"{}\"", name)))?;
        Ok(())
    }

    /// Rename a large item.
    pub fn rename_large_item(&self, oldname: &str, newname: &str) -> Result<()> {
        if self.mode != AccessMode::Write {
            return Err(Error::InternalPerms);
        }

        validate_item_name(newname)?;
        fs::rename(self.item_path(oldname), self.item_path(newname)).map_err(|e| {
            io_context(
                e,
                format!("failed to rename item \"{}\" to \"{}\"", oldname, newname),
            )
        })?;
        Ok(())
    }

    fn small_scalar(&self, name: &str) -> Result<&SmallItem> {
        let si = self
            .small(name)
            .ok_or_else(|| Error::Nonexistant(name.to_owned()))?;

        if si.n_vals() != 1 {
            return Err(format_err!(
                "expected scalar value for item \"{}\" but it has {} values",
                name,
                si.n_vals()
            ));
        }

        Ok(si)
    }

    /// Fetch a scalar small item, widening it to int64.
    pub fn get_i64(&self, name: &str) -> Result<i64> {
        let si = self.small_scalar(name)?;

        let mut host = [0u8; 8];
        iostream::recode_copy(&si.data, &mut host[..si.data.len()], si.ty);

        let mut out = [0u8; 8];

        if !upconvert(si.ty, &host, Type::Int64, &mut out, 1) {
            return Err(format_err!(
                "cannot express {} item \"{}\" as int64",
                si.ty,
                name
            ));
        }

        Ok(NativeEndian::read_i64(&out))
    }

    /// Fetch a scalar small item, widening it to float64.
    pub fn get_f64(&self, name: &str) -> Result<f64> {
        let si = self.small_scalar(name)?;

        let mut host = [0u8; 8];
        iostream::recode_copy(&si.data, &mut host[..si.data.len()], si.ty);

        let mut out = [0u8; 8];

        if !upconvert(si.ty, &host, Type::Float64, &mut out, 1) {
            return Err(format_err!(
                "cannot express {} item \"{}\" as float64",
                si.ty,
                name
            ));
        }

        Ok(NativeEndian::read_f64(&out))
    }

    /// Fetch a textual small item as a fresh string.
    pub fn get_small_string(&self, name: &str) -> Result<String> {
        let si = self
            .small(name)
            .ok_or_else(|| Error::Nonexistant(name.to_owned()))?;

        // Textual small items are stored with an int8 type indicator;
        // both spellings are accepted here.
        match si.ty {
            Type::Text | Type::Int8 => Ok(std::str::from_utf8(&si.data)?.to_owned()),
            other => Err(format_err!("item \"{}\" has type {}, not text", name, other)),
        }
    }

    /// Create or update a small item. `data` is the packed big-endian
    /// representation; its length must be a whole number of values of
    /// `ty` and at most 64 bytes. In an append-mode data set existing
    /// items may not be modified. The header is rewritten when the data
    /// set is closed.
    pub fn set_small_item(
        &mut self,
        name: &str,
        ty: Type,
        data: &[u8],
        create_ok: bool,
    ) -> std::result::Result<(), DsError> {
        if self.mode != AccessMode::Write {
            return Err(DsError::InternalPerms);
        }

        if data.len() % ty.size() != 0 || data.len() > HEADER_MAX_DATA_SIZE {
            return Err(DsError::Format);
        }

        match self.small_index.get(name) {
            Some(&idx) => {
                if self.append {
                    return Err(DsError::InternalPerms);
                }

                let item = &mut self.small_items[idx];
                item.ty = ty;
                item.data = data.to_vec();
            }
            None => {
                if !create_ok {
                    return Err(DsError::Nonexistant);
                }

                if validate_item_name(name).is_err() {
                    return Err(DsError::ItemName);
                }

                // The name must not shadow an item stored as a file.
                if self.item_path(name).exists() {
                    return Err(DsError::Format);
                }

                self.small_index.insert(name.to_owned(), self.small_items.len());
                self.small_items.push(SmallItem {
                    name: name.to_owned(),
                    ty,
                    data: data.to_vec(),
                });
            }
        }

        self.header_dirty = true;
        Ok(())
    }

    pub fn set_small_i16(
        &mut self,
        name: &str,
        value: i16,
        create_ok: bool,
    ) -> std::result::Result<(), DsError> {
        self.set_small_item(name, Type::Int16, &value.to_be_bytes(), create_ok)
    }

    pub fn set_small_i32(
        &mut self,
        name: &str,
        value: i32,
        create_ok: bool,
    ) -> std::result::Result<(), DsError> {
        self.set_small_item(name, Type::Int32, &value.to_be_bytes(), create_ok)
    }

    pub fn set_small_i64(
        &mut self,
        name: &str,
        value: i64,
        create_ok: bool,
    ) -> std::result::Result<(), DsError> {
        self.set_small_item(name, Type::Int64, &value.to_be_bytes(), create_ok)
    }

    pub fn set_small_f32(
        &mut self,
        name: &str,
        value: f32,
        create_ok: bool,
    ) -> std::result::Result<(), DsError> {
        self.set_small_item(name, Type::Float32, &value.to_be_bytes(), create_ok)
    }

    pub fn set_small_f64(
        &mut self,
        name: &str,
        value: f64,
        create_ok: bool,
    ) -> std::result::Result<(), DsError> {
        self.set_small_item(name, Type::Float64, &value.to_be_bytes(), create_ok)
    }

    pub fn set_small_string(
        &mut self,
        name: &str,
        value: &str,
        create_ok: bool,
    ) -> std::result::Result<(), DsError> {
        self.set_small_item(name, Type::Text, value.as_bytes(), create_ok)
    }

    pub fn access_mode(&self) -> AccessMode {
        self.mode
    }

    fn flush(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.closed = true;

        if self.header_dirty && self.mode == AccessMode::Write {
            self.write_header()?;
        }

        Ok(())
    }

    /// Close the data set, rewriting the header if small items have
    /// changed. Dropping a data set performs the same flush but discards
    /// any error.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }
}

impl Drop for DataSet {
    fn drop(&mut self) {
        let _r = self.flush();
    }
}
