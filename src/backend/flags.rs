// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::os::raw::c_uint;

use bitflags::bitflags;
use serde_derive::{
    Deserialize,
    Serialize,
};

bitflags! {
    /// Flags accepted by the write operations.
    ///
    /// The engine's `RESERVE` and `MULTIPLE` modes are not flags here: they
    /// change the shape of the data argument, so they are reached through
    /// `put_reserved` and `RwCursor::put_multiple` instead.
    #[derive(Default, Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
    pub struct WriteFlags: c_uint {
        /// Fail with `KeyExists` instead of overwriting an existing key.
        const NO_OVERWRITE = lmdb_sys::MDB_NOOVERWRITE as c_uint;
        /// Fail with `KeyExists` if the exact key/value pair is already stored.
        const NO_DUP_DATA = lmdb_sys::MDB_NODUPDATA as c_uint;
        /// Replace the entry under the cursor. Cursor writes only.
        const CURRENT = lmdb_sys::MDB_CURRENT as c_uint;
        /// Keys are being added in sorted order past the end of the database.
        const APPEND = lmdb_sys::MDB_APPEND as c_uint;
        /// Values are being added in sorted order past the last duplicate.
        const APPEND_DUP = lmdb_sys::MDB_APPENDDUP as c_uint;
    }
}

pub(crate) const RESERVE: c_uint = lmdb_sys::MDB_RESERVE as c_uint;
pub(crate) const MULTIPLE: c_uint = lmdb_sys::MDB_MULTIPLE as c_uint;

bitflags! {
    /// Flags a database was opened with, as reported by the engine.
    #[derive(Default, Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
    pub struct DatabaseFlags: c_uint {
        const REVERSE_KEY = lmdb_sys::MDB_REVERSEKEY as c_uint;
        const DUP_SORT = lmdb_sys::MDB_DUPSORT as c_uint;
        const INTEGER_KEY = lmdb_sys::MDB_INTEGERKEY as c_uint;
        const DUP_FIXED = lmdb_sys::MDB_DUPFIXED as c_uint;
        const INTEGER_DUP = lmdb_sys::MDB_INTEGERDUP as c_uint;
        const REVERSE_DUP = lmdb_sys::MDB_REVERSEDUP as c_uint;
    }
}

pub(crate) const CREATE: c_uint = lmdb_sys::MDB_CREATE as c_uint;
pub(crate) const READ_ONLY: c_uint = lmdb_sys::MDB_RDONLY as c_uint;

/// The engine's cursor positioning verbs.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub(crate) enum CursorOp {
    First,
    FirstDup,
    GetBoth,
    GetBothRange,
    GetCurrent,
    GetMultiple,
    Last,
    LastDup,
    Next,
    NextDup,
    NextMultiple,
    NextNoDup,
    Prev,
    PrevDup,
    PrevNoDup,
    Set,
    SetKey,
    SetRange,
}

impl CursorOp {
    pub(crate) fn code(self) -> c_uint {
        (match self {
            CursorOp::First => lmdb_sys::MDB_FIRST,
            CursorOp::FirstDup => lmdb_sys::MDB_FIRST_DUP,
            CursorOp::GetBoth => lmdb_sys::MDB_GET_BOTH,
            CursorOp::GetBothRange => lmdb_sys::MDB_GET_BOTH_RANGE,
            CursorOp::GetCurrent => lmdb_sys::MDB_GET_CURRENT,
            CursorOp::GetMultiple => lmdb_sys::MDB_GET_MULTIPLE,
            CursorOp::Last => lmdb_sys::MDB_LAST,
            CursorOp::LastDup => lmdb_sys::MDB_LAST_DUP,
            CursorOp::Next => lmdb_sys::MDB_NEXT,
            CursorOp::NextDup => lmdb_sys::MDB_NEXT_DUP,
            CursorOp::NextMultiple => lmdb_sys::MDB_NEXT_MULTIPLE,
            CursorOp::NextNoDup => lmdb_sys::MDB_NEXT_NODUP,
            CursorOp::Prev => lmdb_sys::MDB_PREV,
            CursorOp::PrevDup => lmdb_sys::MDB_PREV_DUP,
            CursorOp::PrevNoDup => lmdb_sys::MDB_PREV_NODUP,
            CursorOp::Set => lmdb_sys::MDB_SET,
            CursorOp::SetKey => lmdb_sys::MDB_SET_KEY,
            CursorOp::SetRange => lmdb_sys::MDB_SET_RANGE,
        }) as c_uint
    }

    /// Whether a successful call of this verb rewrites the key buffer. The
    /// others leave the caller's input key (or nothing) in place.
    pub(crate) fn writes_key(self) -> bool {
        !matches!(
            self,
            CursorOp::Set
                | CursorOp::GetBoth
                | CursorOp::GetBothRange
                | CursorOp::FirstDup
                | CursorOp::LastDup
                | CursorOp::GetMultiple
        )
    }

    /// Whether a successful call of this verb always rewrites the value buffer.
    /// `GetMultiple` may legitimately leave it untouched.
    pub(crate) fn writes_value(self) -> bool {
        !matches!(self, CursorOp::GetBoth | CursorOp::GetMultiple)
    }
}
