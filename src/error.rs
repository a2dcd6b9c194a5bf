// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::{
    io,
    os::raw::c_int,
    path::PathBuf,
    sync,
};

use log::warn;
use thiserror::Error;

use crate::value::Type;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("unknown type tag: {0}")]
    UnknownType(u8),

    #[error("unexpected type tag: expected {expected}, got {actual}")]
    UnexpectedType {
        expected: Type,
        actual: Type,
    },

    #[error("empty data; expected tag")]
    Empty,

    #[error("invalid value for type {value_type}: {err}")]
    DecodingError {
        value_type: Type,
        err: Box<bincode::ErrorKind>,
    },

    #[error("couldn't encode value: {0}")]
    EncodingError(Box<bincode::ErrorKind>),

    #[error("invalid uuid bytes")]
    InvalidUuid,

    #[error("{len} bytes can't be decoded as {type_name}")]
    Undecodable {
        type_name: &'static str,
        len: usize,
    },

    #[error("bulk value buffer of {len} bytes isn't a multiple of the {width}-byte value width")]
    WidthMismatch {
        width: usize,
        len: usize,
    },

    #[error("reserved {reserved} bytes but the encoding needs {needed}")]
    ReserveSizeMismatch {
        reserved: usize,
        needed: usize,
    },
}

impl From<Box<bincode::ErrorKind>> for DataError {
    fn from(e: Box<bincode::ErrorKind>) -> DataError {
        DataError::EncodingError(e)
    }
}

/// How a `StoreError` should be treated by the caller.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ErrorCategory {
    /// The entry doesn't exist. An ordinary outcome, not a fault.
    Absent,
    /// A write was rejected by `NO_OVERWRITE` or `NO_DUP_DATA`.
    Conflict,
    /// The environment is damaged; nothing local can fix it.
    Integrity,
    /// A configured limit was hit. Retrying needs a bigger environment.
    Capacity,
    /// The API was used in a way the engine refuses.
    Misuse,
    /// Reported by the operating system.
    Os,
    /// Stored bytes didn't match the codec.
    Data,
    Other,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key/value pair already exists")]
    KeyExists,

    #[error("key/value pair not found")]
    KeyValuePairNotFound,

    #[error("database corrupted")]
    DatabaseCorrupted,

    #[error("requested page not found")]
    PageNotFound,

    #[error("file is not a valid database file")]
    FileInvalid,

    #[error("environment version mismatch")]
    VersionMismatch,

    #[error("update of meta page failed or environment had a fatal error")]
    Panic,

    #[error("database contents grew beyond environment map size")]
    MapResized,

    #[error("operation and database are incompatible")]
    Incompatible,

    #[error("environment map size limit reached")]
    MapFull,

    #[error("environment maximum databases limit reached")]
    DbsFull,

    #[error("environment maximum readers limit reached")]
    ReadersFull,

    #[error("thread-local storage keys full")]
    TlsFull,

    #[error("transaction has too many dirty pages")]
    TxnFull,

    #[error("too many open cursors")]
    CursorFull,

    #[error("page has not enough space")]
    PageFull,

    #[error("invalid reuse of reader locktable slot")]
    BadReaderSlot,

    #[error("transaction must abort, has a child, or is invalid")]
    BadTransaction,

    #[error("unsupported size of key/database name/data, or wrong fixed-width size")]
    KeyValuePairBadSize,

    #[error("the database handle was changed unexpectedly")]
    BadDbi,

    #[error("invalid parameter")]
    InvalidParameter,

    #[error("out of memory")]
    OutOfMemory,

    #[error("permission denied")]
    PermissionDenied,

    #[error("I/O error: {0:?}")]
    IoError(#[from] io::Error),

    #[error("unrecognized engine error code: {0}")]
    Other(i32),

    #[error("data error: {0:?}")]
    DataError(#[from] DataError),

    #[error("directory does not exist or not a directory: {0:?}")]
    DirectoryDoesNotExistError(PathBuf),

    #[error("manager poisoned")]
    ManagerPoisonError,
}

impl StoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            StoreError::KeyValuePairNotFound => ErrorCategory::Absent,
            StoreError::KeyExists => ErrorCategory::Conflict,
            StoreError::DatabaseCorrupted
            | StoreError::PageNotFound
            | StoreError::FileInvalid
            | StoreError::VersionMismatch
            | StoreError::Panic
            | StoreError::MapResized
            | StoreError::Incompatible => ErrorCategory::Integrity,
            StoreError::MapFull
            | StoreError::DbsFull
            | StoreError::ReadersFull
            | StoreError::TlsFull
            | StoreError::TxnFull
            | StoreError::CursorFull
            | StoreError::PageFull => ErrorCategory::Capacity,
            StoreError::BadReaderSlot
            | StoreError::BadTransaction
            | StoreError::KeyValuePairBadSize
            | StoreError::BadDbi
            | StoreError::ManagerPoisonError => ErrorCategory::Misuse,
            StoreError::InvalidParameter
            | StoreError::OutOfMemory
            | StoreError::PermissionDenied
            | StoreError::IoError(_)
            | StoreError::DirectoryDoesNotExistError(_) => ErrorCategory::Os,
            StoreError::DataError(_) => ErrorCategory::Data,
            StoreError::Other(_) => ErrorCategory::Other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::Absent
    }

    /// Converts a raw engine status code. Must not be called with `MDB_SUCCESS`.
    pub(crate) fn from_code(code: c_int) -> StoreError {
        let err = StoreError::from(lmdb::Error::from_err_code(code));
        if err.category() == ErrorCategory::Integrity {
            warn!("engine reported an integrity fault: {} ({})", err, code);
        }
        err
    }
}

impl From<lmdb::Error> for StoreError {
    fn from(e: lmdb::Error) -> StoreError {
        match e {
            lmdb::Error::KeyExist => StoreError::KeyExists,
            lmdb::Error::NotFound => StoreError::KeyValuePairNotFound,
            lmdb::Error::PageNotFound => StoreError::PageNotFound,
            lmdb::Error::Corrupted => StoreError::DatabaseCorrupted,
            lmdb::Error::Panic => StoreError::Panic,
            lmdb::Error::VersionMismatch => StoreError::VersionMismatch,
            lmdb::Error::Invalid => StoreError::FileInvalid,
            lmdb::Error::MapFull => StoreError::MapFull,
            lmdb::Error::DbsFull => StoreError::DbsFull,
            lmdb::Error::ReadersFull => StoreError::ReadersFull,
            lmdb::Error::TlsFull => StoreError::TlsFull,
            lmdb::Error::TxnFull => StoreError::TxnFull,
            lmdb::Error::CursorFull => StoreError::CursorFull,
            lmdb::Error::PageFull => StoreError::PageFull,
            lmdb::Error::MapResized => StoreError::MapResized,
            lmdb::Error::Incompatible => StoreError::Incompatible,
            lmdb::Error::BadRslot => StoreError::BadReaderSlot,
            lmdb::Error::BadTxn => StoreError::BadTransaction,
            lmdb::Error::BadValSize => StoreError::KeyValuePairBadSize,
            lmdb::Error::BadDbi => StoreError::BadDbi,
            lmdb::Error::Other(code) => from_os_code(code),
        }
    }
}

impl<T> From<sync::PoisonError<T>> for StoreError {
    fn from(_: sync::PoisonError<T>) -> StoreError {
        StoreError::ManagerPoisonError
    }
}

// Positive codes are errno values passed through by the engine.
fn from_os_code(code: c_int) -> StoreError {
    if code <= 0 {
        return StoreError::Other(code);
    }
    let os = io::Error::from_raw_os_error(code);
    match os.kind() {
        io::ErrorKind::InvalidInput => StoreError::InvalidParameter,
        io::ErrorKind::OutOfMemory => StoreError::OutOfMemory,
        io::ErrorKind::PermissionDenied => StoreError::PermissionDenied,
        _ => StoreError::IoError(os),
    }
}

/// Turns an engine status code into a `Result`.
pub(crate) fn lmdb_result(code: c_int) -> Result<(), StoreError> {
    if code == lmdb_sys::MDB_SUCCESS as c_int {
        Ok(())
    } else {
        Err(StoreError::from_code(code))
    }
}
