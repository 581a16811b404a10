// Copyright 2017-2022 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

/*!

Error types for MIRIAD dataset access.

There are two channels here. [`Error`] is the open-ended rich error used
throughout the crate: I/O failures are surfaced verbatim, on-disk format
violations carry a message describing what was wrong. [`DsError`] is a small
closed code returned by operations whose failure modes are a short,
enumerable list (notably [`crate::DataSet::set_small_item`]), so that
callers can react to a specific failure without string-matching.

*/

use std::{io, str};
use thiserror::Error;

/// The error type used throughout this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// An I/O-related error.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Something on disk violated the MIRIAD dataset format.
    #[error("{0}")]
    Format(String),

    /// The operation is not permitted in the handle's current access mode.
    #[error("operation not permitted in the current access mode")]
    InternalPerms,

    /// A proposed item or variable name is not legal in the file format.
    #[error("illegal MIRIAD item name \"{0}\"")]
    ItemName(String),

    /// A required item does not exist.
    #[error("no such item \"{0}\"")]
    Nonexistant(String),

    /// An error related to UTF-8 conversion.
    #[error(transparent)]
    Utf8(#[from] str::Utf8Error),
}

/// A crate-wide alias for `Result` with our [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Construct an [`Error::Format`] with `format!`-style arguments.
macro_rules! format_err {
    ($( $fmt_args:expr ),*) => {
        $crate::errors::Error::Format(format!($( $fmt_args ),*))
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        match err {
            Error::Io(e) => e,
            other => io::Error::new(io::ErrorKind::Other, format!("{}", other)),
        }
    }
}

/// The closed set of ways that a small-item update can fail.
///
/// These mirror the stable numeric codes of the classic implementation;
/// operations with richer failure modes use [`Error`] instead.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DsError {
    /// The request would violate the dataset format.
    Format,
    /// The dataset is not open in a mode that permits the operation.
    InternalPerms,
    /// The item name is not legal.
    ItemName,
    /// The named item does not exist and creation was not requested.
    Nonexistant,
}

impl DsError {
    /// A human-readable description of this error code.
    pub fn describe(&self) -> &'static str {
        match self {
            DsError::Format => "dataset format constraint violated",
            DsError::InternalPerms => "operation not permitted in the current access mode",
            DsError::ItemName => "illegal item name",
            DsError::Nonexistant => "no such item",
        }
    }
}

impl std::fmt::Display for DsError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}

impl std::error::Error for DsError {}

impl From<DsError> for Error {
    fn from(code: DsError) -> Error {
        match code {
            DsError::Format => Error::Format("dataset format constraint violated".to_owned()),
            DsError::InternalPerms => Error::InternalPerms,
            DsError::ItemName => Error::ItemName("<unspecified>".to_owned()),
            DsError::Nonexistant => Error::Nonexistant("<unspecified>".to_owned()),
        }
    }
}
