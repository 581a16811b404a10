// Copyright 2017-2022 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

/*!

Access to MIRIAD "uv" data sets containing visibility data.

UV data live in two items. The `vartable` item is a small piece of text
declaring the name and type of every variable that appears in the stream;
a variable's position in the table is its numeric ident in the stream.
The `visdata` item is the stream itself: a sequence of 8-byte-aligned
records, each a 4-byte header `{var, 0, entry_type, 0}` followed by an
entry-specific body. A SIZE entry declares the byte length of the
variable's subsequent payloads, a DATA entry carries a payload, and an
EOR entry marks the end of one correlation record.

Writers buffer the variable table and rewrite it atomically when the
stream is closed, so a reader never observes a table that disagrees with
the data already on disk.

*/

use byteorder::{BigEndian, ByteOrder};
use std::collections::HashMap;

use crate::errors::{Error, Result};
use crate::iostream::{AccessMode, IoStream};
use crate::{DataSet, MiriadMappedType, OpenFlags, Type};

/// The stream format identifies variables with one byte, so no stream
/// can declare more than this many.
pub const MAX_VARIABLES: usize = 256;

/// Records within the visdata stream start at multiples of this.
const VISDATA_ALIGN: usize = 8;

/// The size of a record header.
const HEADER_SIZE: usize = 4;

const ET_SIZE: u8 = 0;
const ET_DATA: u8 = 1;
const ET_EOR: u8 = 2;

/// One UV variable: its declaration, plus the reader-side cache of its
/// most recent size and value.
#[derive(Clone, Debug)]
pub struct UvVariable {
    name: String,
    ident: u8,
    ty: Type,
    n_vals: isize,
    data: Vec<u8>,
}

impl UvVariable {
    fn new(ty: Type, name: &str, ident: u8) -> Self {
        UvVariable {
            name: name.to_owned(),
            ident,
            ty,
            n_vals: -1,
            data: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The variable's position in the vartable, which is how the stream
    /// refers to it.
    pub fn ident(&self) -> u8 {
        self.ident
    }

    pub fn type_(&self) -> Type {
        self.ty
    }

    /// The current number of values, or -1 if no SIZE entry has been
    /// seen yet.
    pub fn n_vals(&self) -> isize {
        self.n_vals
    }

    /// The most recently read value, as host-order bytes. Empty in
    /// writers and before the first DATA entry.
    pub fn value_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Render the current value for human consumption.
    pub fn format_value(&self) -> String {
        let n = if self.n_vals < 0 { 0 } else { self.n_vals as usize };
        crate::format_data(&self.data, self.ty, n)
    }
}

/// One decoded entry of the visdata stream.
///
/// `EndOfStream` does not correspond to anything on disk; it reports
/// that the stream ended cleanly on a record boundary.
pub enum UvEvent<'a> {
    Size(&'a UvVariable),
    Data(&'a UvVariable),
    EndOfRecord,
    EndOfStream,
}

/// A handle for reading or writing the UV data of one data set.
pub struct UvIo<'a> {
    ds: &'a DataSet,
    mode: AccessMode,
    vd: IoStream,
    vars: Vec<UvVariable>,
    vars_by_name: HashMap<String, usize>,
    vartable_dirty: bool,
    closed: bool,
}

fn parse_vartable(
    ds: &DataSet,
    vars: &mut Vec<UvVariable>,
    index: &mut HashMap<String, usize>,
) -> Result<()> {
    let mut vtab = ds.open_large_item("vartable", AccessMode::Read, Default::default())?;

    // A line is a type letter, a space, the name, and a newline.
    let mut line: Vec<u8> = Vec::with_capacity(12);

    let mut add_var = |line: &[u8]| -> Result<()> {
        if line.len() < 3 {
            return Err(format_err!("invalid UV vartable: no variable name"));
        }

        if line[1] != b' ' {
            return Err(format_err!("invalid UV vartable: bad variable typename"));
        }

        let ty = Type::try_from_abbrev(line[0] as char)
            .map_err(|_| format_err!("invalid UV vartable: unknown variable typename"))?;

        let name = std::str::from_utf8(&line[2..])?;

        if name.len() > crate::MAX_ITEM_NAME_LENGTH {
            return Err(format_err!(
                "invalid UV vartable: variable name \"{}\" too long",
                name
            ));
        }

        if vars.len() >= MAX_VARIABLES {
            return Err(format_err!("invalid UV vartable: too many variables"));
        }

        let ident = vars.len() as u8;
        index.insert(name.to_owned(), vars.len());
        vars.push(UvVariable::new(ty, name, ident));
        Ok(())
    };

    loop {
        let got = vtab.fetch_temp(1)?;

        if got.is_empty() {
            // The canonical form ends every line with a newline, but a
            // trailing unterminated line is accepted.
            if !line.is_empty() {
                add_var(&line)?;
            }

            break;
        }

        let c = got[0];

        if c == b'\n' {
            add_var(&line)?;
            line.clear();
        } else {
            line.push(c);

            if line.len() >= 12 {
                return Err(format_err!("invalid UV vartable: line too long"));
            }
        }
    }

    Ok(())
}

impl<'a> UvIo<'a> {
    /// Open the UV stream of a data set for reading or writing, never
    /// both. Reading parses the vartable up front; appending to an
    /// existing stream does too, so that already-declared variables keep
    /// their idents. Writing with truncation starts with no variables.
    pub fn open(ds: &'a DataSet, mode: AccessMode, flags: OpenFlags) -> Result<Self> {
        let read_vartable = match mode {
            AccessMode::Read => true,
            AccessMode::Write => flags.append && ds.has_item("visdata"),
        };

        let mut vars = Vec::new();
        let mut vars_by_name = HashMap::new();

        if read_vartable {
            parse_vartable(ds, &mut vars, &mut vars_by_name)?;
        }

        let vd = ds.open_large_item("visdata", mode, flags)?;

        Ok(UvIo {
            ds,
            mode,
            vd,
            vars,
            vars_by_name,
            vartable_dirty: false,
            closed: false,
        })
    }

    /// The declared variables, in ident order.
    pub fn list_vars(&self) -> impl Iterator<Item = &UvVariable> {
        self.vars.iter()
    }

    /// Look up a variable by name.
    pub fn query_var(&self, name: &str) -> Option<&UvVariable> {
        self.vars_by_name.get(name).map(|&idx| &self.vars[idx])
    }

    /// Decode the next entry of the stream. Returns
    /// [`UvEvent::EndOfStream`] at a clean EOF; anything else malformed
    /// is a format error.
    pub fn read_next(&mut self) -> Result<UvEvent<'_>> {
        enum Decoded {
            Size(usize),
            Data(usize),
            Eor,
        }

        if self.mode != AccessMode::Read {
            return Err(Error::InternalPerms);
        }

        let header = self.vd.fetch_temp(HEADER_SIZE)?;

        if header.is_empty() {
            return Ok(UvEvent::EndOfStream);
        }

        if header.len() != HEADER_SIZE {
            return Err(format_err!("invalid UV visdata: incomplete record"));
        }

        // Snapshot the header fields: the fetched slice does not survive
        // the I/O below.
        let varnum = header[0] as usize;
        let etype = header[2];

        let decoded = match etype {
            ET_SIZE => {
                if varnum >= self.vars.len() {
                    return Err(format_err!("invalid UV visdata: illegal variable number"));
                }

                let buf = self.vd.fetch_temp(4)?;

                if buf.len() != 4 {
                    return Err(format_err!("invalid UV visdata: truncated variable data"));
                }

                let nbytes = BigEndian::read_i32(buf);

                if nbytes < 0 {
                    return Err(format_err!("invalid UV visdata: negative entry size"));
                }

                let nbytes = nbytes as usize;
                let var = &mut self.vars[varnum];

                if nbytes % var.ty.size() != 0 {
                    return Err(format_err!("invalid UV visdata: illegal entry size"));
                }

                var.n_vals = (nbytes / var.ty.size()) as isize;
                var.data.resize(nbytes, 0);
                Decoded::Size(varnum)
            }
            ET_DATA => {
                if varnum >= self.vars.len() {
                    return Err(format_err!("invalid UV visdata: illegal variable number"));
                }

                let (ty, n_vals) = {
                    let var = &self.vars[varnum];
                    (var.ty, var.n_vals)
                };

                if n_vals < 0 {
                    return Err(format_err!(
                        "invalid UV visdata: data record precedes the variable's size"
                    ));
                }

                let n_vals = n_vals as usize;
                self.vd.nudge_align(ty.alignment())?;

                let var = &mut self.vars[varnum];
                let nread = self.vd.read_into(ty, n_vals, &mut var.data)?;

                if nread != n_vals {
                    return Err(format_err!("invalid UV visdata: truncated variable data"));
                }

                Decoded::Data(varnum)
            }
            ET_EOR => Decoded::Eor,
            other => {
                return Err(format_err!(
                    "invalid UV visdata: unknown record type {}",
                    other
                ));
            }
        };

        self.vd.nudge_align(VISDATA_ALIGN)?;

        Ok(match decoded {
            Decoded::Size(idx) => UvEvent::Size(&self.vars[idx]),
            Decoded::Data(idx) => UvEvent::Data(&self.vars[idx]),
            Decoded::Eor => UvEvent::EndOfRecord,
        })
    }

    /// Write one update of a UV variable: the host-order bytes of a
    /// whole number of values of type `ty`. The variable is declared on
    /// first use; its type may never change afterwards. A SIZE entry is
    /// emitted only when the value count differs from the previous
    /// update of the same variable.
    pub fn write_var(&mut self, name: &str, ty: Type, data: &[u8]) -> Result<()> {
        if self.mode != AccessMode::Write {
            return Err(Error::InternalPerms);
        }

        if data.len() % ty.size() != 0 {
            return Err(format_err!(
                "UV variable data must be a whole number of {} values",
                ty
            ));
        }

        let nvals = data.len() / ty.size();

        let idx = match self.vars_by_name.get(name) {
            Some(&idx) => idx,
            None => {
                crate::validate_item_name(name)?;

                if self.vars.len() >= MAX_VARIABLES {
                    return Err(format_err!(
                        "cannot declare more than {} UV variables",
                        MAX_VARIABLES
                    ));
                }

                let idx = self.vars.len();
                self.vars_by_name.insert(name.to_owned(), idx);
                self.vars.push(UvVariable::new(ty, name, idx as u8));
                self.vartable_dirty = true;
                idx
            }
        };

        if self.vars[idx].ty != ty {
            return Err(format_err!(
                "cannot change the type of UV variable \"{}\"",
                name
            ));
        }

        let ident = self.vars[idx].ident;
        self.vd.nudge_align(VISDATA_ALIGN)?;

        if self.vars[idx].n_vals != nvals as isize {
            self.vd.write_raw(&[ident, 0, ET_SIZE, 0])?;

            let nbytes = (nvals * ty.size()) as i32;
            self.vd.write_typed(Type::Int32, &nbytes.to_ne_bytes())?;

            self.vars[idx].n_vals = nvals as isize;
        }

        self.vd.nudge_align(VISDATA_ALIGN)?;
        self.vd.write_raw(&[ident, 0, ET_DATA, 0])?;
        self.vd.nudge_align(ty.alignment())?;
        self.vd.write_typed(ty, data)
    }

    /// Typed convenience form of [`UvIo::write_var`].
    pub fn write_var_typed<T: MiriadMappedType>(&mut self, name: &str, values: &[T]) -> Result<()> {
        self.write_var(name, T::TYPE, &T::vec_to_native_bytes(values))
    }

    /// Terminate the current correlation record.
    pub fn write_end_record(&mut self) -> Result<()> {
        if self.mode != AccessMode::Write {
            return Err(Error::InternalPerms);
        }

        self.vd.nudge_align(VISDATA_ALIGN)?;
        self.vd.write_raw(&[0, 0, ET_EOR, 0])
    }

    /// Rewrite the on-disk vartable to match the declared variables.
    /// This happens automatically when a writer is closed; calling it
    /// earlier publishes the table for the benefit of concurrent
    /// diagnostics.
    pub fn update_vartable(&mut self) -> Result<()> {
        if self.mode != AccessMode::Write {
            return Err(Error::InternalPerms);
        }

        let mut vtab = self.ds.open_for_replace("vartable")?;

        for var in &self.vars {
            let line = format!("{} {}\n", var.ty.abbrev_char(), var.name);
            vtab.write_raw(line.as_bytes())?;
        }

        vtab.close()?;
        self.ds.finish_replace("vartable")?;
        self.vartable_dirty = false;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.closed = true;

        if self.vartable_dirty {
            self.update_vartable()?;
        }

        self.vd.shutdown()
    }

    /// Flush the vartable if it is dirty, then flush and release the
    /// visdata stream. Dropping the handle does the same but discards
    /// any error.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }
}

impl<'a> Drop for UvIo<'a> {
    fn drop(&mut self) {
        let _r = self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::NativeEndian;
    use std::fs;
    use std::path::Path;

    fn create_flags() -> OpenFlags {
        OpenFlags {
            create_ok: true,
            ..Default::default()
        }
    }

    fn write_flags() -> OpenFlags {
        OpenFlags {
            create_ok: true,
            truncate: true,
            ..Default::default()
        }
    }

    fn new_dataset(path: &Path) -> DataSet {
        DataSet::open(path, AccessMode::Write, create_flags()).unwrap()
    }

    fn read_dataset(path: &Path) -> DataSet {
        DataSet::open(path, AccessMode::Read, Default::default()).unwrap()
    }

    fn expect_size(uv: &mut UvIo, name: &str, n: isize) {
        match uv.read_next().unwrap() {
            UvEvent::Size(var) => {
                assert_eq!(var.name(), name);
                assert_eq!(var.n_vals(), n);
            }
            _ => panic!("expected a SIZE entry"),
        }
    }

    fn expect_data_f64(uv: &mut UvIo, name: &str, expected: &[f64]) {
        match uv.read_next().unwrap() {
            UvEvent::Data(var) => {
                assert_eq!(var.name(), name);
                let mut vals = vec![0f64; expected.len()];
                NativeEndian::read_f64_into(var.value_bytes(), &mut vals);
                assert_eq!(vals, expected);
            }
            _ => panic!("expected a DATA entry"),
        }
    }

    fn expect_eor(uv: &mut UvIo) {
        assert!(matches!(uv.read_next().unwrap(), UvEvent::EndOfRecord));
    }

    fn expect_eos(uv: &mut UvIo) {
        assert!(matches!(uv.read_next().unwrap(), UvEvent::EndOfStream));
    }

    #[test]
    fn uv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vis");

        let ds = new_dataset(&path);
        let mut uv = UvIo::open(&ds, AccessMode::Write, write_flags()).unwrap();
        uv.write_var_typed::<f64>("antpos", &[1.0, 2.0, 3.0]).unwrap();
        uv.write_var_typed::<f64>("antpos", &[4.0, 5.0, 6.0]).unwrap();
        uv.write_end_record().unwrap();
        uv.close().unwrap();
        ds.close().unwrap();

        assert_eq!(fs::read(path.join("vartable")).unwrap(), b"d antpos\n");

        // SIZE (8) + DATA (4 + 4 pad + 24) + DATA (ditto) + EOR (4).
        assert_eq!(fs::metadata(path.join("visdata")).unwrap().len(), 76);

        let ds = read_dataset(&path);
        let mut uv = UvIo::open(&ds, AccessMode::Read, Default::default()).unwrap();

        let var = uv.query_var("antpos").expect("antpos should be declared");
        assert_eq!(var.type_(), Type::Float64);
        assert_eq!(var.ident(), 0);
        assert_eq!(var.n_vals(), -1);

        expect_size(&mut uv, "antpos", 3);
        expect_data_f64(&mut uv, "antpos", &[1.0, 2.0, 3.0]);
        // No second SIZE: the count did not change.
        expect_data_f64(&mut uv, "antpos", &[4.0, 5.0, 6.0]);
        expect_eor(&mut uv);
        expect_eos(&mut uv);
    }

    #[test]
    fn size_entries_follow_count_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vis");

        let ds = new_dataset(&path);
        let mut uv = UvIo::open(&ds, AccessMode::Write, write_flags()).unwrap();
        uv.write_var_typed::<i32>("nschan", &[64]).unwrap();
        uv.write_var_typed::<i32>("nschan", &[64, 128]).unwrap();
        uv.write_end_record().unwrap();
        uv.close().unwrap();

        let mut uv = UvIo::open(&ds, AccessMode::Read, Default::default()).unwrap();
        expect_size(&mut uv, "nschan", 1);
        assert!(matches!(uv.read_next().unwrap(), UvEvent::Data(_)));
        expect_size(&mut uv, "nschan", 2);
        assert!(matches!(uv.read_next().unwrap(), UvEvent::Data(_)));
        expect_eor(&mut uv);
        expect_eos(&mut uv);
    }

    #[test]
    fn variables_get_dense_idents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vis");

        let ds = new_dataset(&path);
        let mut uv = UvIo::open(&ds, AccessMode::Write, write_flags()).unwrap();
        uv.write_var_typed::<i32>("nants", &[3]).unwrap();
        uv.write_var_typed::<f64>("time", &[2450000.5]).unwrap();
        uv.write_var_typed::<f32>("baseline", &[258.0]).unwrap();
        uv.write_end_record().unwrap();
        uv.close().unwrap();

        assert_eq!(
            fs::read(path.join("vartable")).unwrap(),
            b"i nants\nd time\nr baseline\n"
        );

        let uv = UvIo::open(&ds, AccessMode::Read, Default::default()).unwrap();
        let names: Vec<_> = uv.list_vars().map(|v| (v.ident(), v.name().to_owned())).collect();
        assert_eq!(
            names,
            vec![
                (0, "nants".to_owned()),
                (1, "time".to_owned()),
                (2, "baseline".to_owned())
            ]
        );
    }

    #[test]
    fn type_changes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vis");

        let ds = new_dataset(&path);
        let mut uv = UvIo::open(&ds, AccessMode::Write, write_flags()).unwrap();
        uv.write_var_typed::<i32>("nants", &[3]).unwrap();
        assert!(uv.write_var_typed::<f32>("nants", &[3.0]).is_err());
    }

    #[test]
    fn append_reopens_the_vartable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vis");

        let ds = new_dataset(&path);

        let mut uv = UvIo::open(&ds, AccessMode::Write, write_flags()).unwrap();
        uv.write_var_typed::<f64>("time", &[1.0]).unwrap();
        uv.write_end_record().unwrap();
        uv.close().unwrap();

        let aflags = OpenFlags {
            append: true,
            ..Default::default()
        };
        let mut uv = UvIo::open(&ds, AccessMode::Write, aflags).unwrap();

        // The previous declaration is visible, with its ident.
        assert_eq!(uv.query_var("time").unwrap().ident(), 0);

        uv.write_var_typed::<f64>("time", &[2.0]).unwrap();
        uv.write_end_record().unwrap();
        uv.close().unwrap();

        let mut uv = UvIo::open(&ds, AccessMode::Read, Default::default()).unwrap();
        expect_size(&mut uv, "time", 1);
        expect_data_f64(&mut uv, "time", &[1.0]);
        expect_eor(&mut uv);
        // The second session re-declares the size: its cache started
        // cold.
        expect_size(&mut uv, "time", 1);
        expect_data_f64(&mut uv, "time", &[2.0]);
        expect_eor(&mut uv);
        expect_eos(&mut uv);
    }

    #[test]
    fn vartable_boundary_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vis");

        let ds = new_dataset(&path);
        fs::write(path.join("visdata"), b"").unwrap();

        // An 11-byte line with the '?' glyph parses.
        fs::write(path.join("vartable"), b"? xxxxxxxx\n").unwrap();
        let uv = UvIo::open(&ds, AccessMode::Read, Default::default()).unwrap();
        assert_eq!(uv.query_var("xxxxxxxx").unwrap().type_(), Type::Binary);
        drop(uv);

        // A trailing line without a newline is accepted.
        fs::write(path.join("vartable"), b"d time\nr ut").unwrap();
        let uv = UvIo::open(&ds, AccessMode::Read, Default::default()).unwrap();
        assert_eq!(uv.query_var("ut").unwrap().type_(), Type::Float32);
        drop(uv);

        // Twelve bytes with no newline in sight: too long.
        fs::write(path.join("vartable"), b"j abcdefghij").unwrap();
        assert!(UvIo::open(&ds, AccessMode::Read, Default::default()).is_err());

        // Bad glyph, missing name, missing space.
        for bad in &["z time\n", "d\n", "dtime\n"] {
            fs::write(path.join("vartable"), bad.as_bytes()).unwrap();
            assert!(UvIo::open(&ds, AccessMode::Read, Default::default()).is_err());
        }
    }

    #[test]
    fn malformed_streams_are_format_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vis");

        let ds = new_dataset(&path);
        fs::write(path.join("vartable"), b"r foo\n").unwrap();

        // A DATA entry with no preceding SIZE.
        fs::write(path.join("visdata"), &[0, 0, ET_DATA, 0]).unwrap();
        let mut uv = UvIo::open(&ds, AccessMode::Read, Default::default()).unwrap();
        assert!(uv.read_next().is_err());
        drop(uv);

        // An undeclared variable number.
        fs::write(path.join("visdata"), &[5, 0, ET_SIZE, 0, 0, 0, 0, 4]).unwrap();
        let mut uv = UvIo::open(&ds, AccessMode::Read, Default::default()).unwrap();
        assert!(uv.read_next().is_err());
        drop(uv);

        // A negative SIZE payload.
        fs::write(path.join("visdata"), &[0, 0, ET_SIZE, 0, 0xFF, 0xFF, 0xFF, 0xFC]).unwrap();
        let mut uv = UvIo::open(&ds, AccessMode::Read, Default::default()).unwrap();
        assert!(uv.read_next().is_err());
        drop(uv);

        // A SIZE payload that is not a whole number of values.
        fs::write(path.join("visdata"), &[0, 0, ET_SIZE, 0, 0, 0, 0, 6]).unwrap();
        let mut uv = UvIo::open(&ds, AccessMode::Read, Default::default()).unwrap();
        assert!(uv.read_next().is_err());
        drop(uv);

        // An unknown entry type.
        fs::write(path.join("visdata"), &[0, 0, 7, 0]).unwrap();
        let mut uv = UvIo::open(&ds, AccessMode::Read, Default::default()).unwrap();
        assert!(uv.read_next().is_err());
        drop(uv);

        // A truncated record header.
        fs::write(path.join("visdata"), &[0, 0]).unwrap();
        let mut uv = UvIo::open(&ds, AccessMode::Read, Default::default()).unwrap();
        assert!(uv.read_next().is_err());
    }

    #[test]
    fn writes_require_write_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vis");

        let ds = new_dataset(&path);
        fs::write(path.join("vartable"), b"r foo\n").unwrap();
        fs::write(path.join("visdata"), b"").unwrap();

        let mut uv = UvIo::open(&ds, AccessMode::Read, Default::default()).unwrap();
        assert!(matches!(
            uv.write_var_typed::<f32>("foo", &[1.0]),
            Err(Error::InternalPerms)
        ));
        assert!(matches!(uv.write_end_record(), Err(Error::InternalPerms)));
        assert!(matches!(uv.update_vartable(), Err(Error::InternalPerms)));
    }

    #[test]
    fn text_variables_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vis");

        let ds = new_dataset(&path);
        let mut uv = UvIo::open(&ds, AccessMode::Write, write_flags()).unwrap();
        uv.write_var("source", Type::Text, b"3c286").unwrap();
        uv.write_end_record().unwrap();
        uv.close().unwrap();

        assert_eq!(fs::read(path.join("vartable")).unwrap(), b"a source\n");

        let mut uv = UvIo::open(&ds, AccessMode::Read, Default::default()).unwrap();
        expect_size(&mut uv, "source", 5);

        match uv.read_next().unwrap() {
            UvEvent::Data(var) => {
                assert_eq!(var.value_bytes(), b"3c286");
                assert_eq!(var.format_value(), "\"3c286\"");
            }
            _ => panic!("expected a DATA entry"),
        }
    }
}
