// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The byte view exchanged with the engine. An `MDB_val` handed out by LMDB
//! points into the memory map and is only read inside the call that produced
//! it; nothing in this module hands out a slice that outlives its caller's frame.

use std::{
    ptr,
    slice,
};

use lmdb_sys::MDB_val;

/// The value an output `MDB_val` holds before the engine writes to it.
pub(crate) fn unset() -> MDB_val {
    MDB_val {
        mv_size: 0,
        mv_data: ptr::null_mut(),
    }
}

/// Borrows caller-owned bytes as an input `MDB_val`.
///
/// The engine never writes through input values, so handing it a pointer
/// derived from a shared slice is sound.
pub(crate) fn from_slice(bytes: &[u8]) -> MDB_val {
    MDB_val {
        mv_size: bytes.len() as _,
        mv_data: bytes.as_ptr() as *mut _,
    }
}

/// An output `MDB_val` whose `mv_size` asks the engine to reserve `len` bytes.
pub(crate) fn with_len(len: usize) -> MDB_val {
    MDB_val {
        mv_size: len as _,
        mv_data: ptr::null_mut(),
    }
}

/// True when the engine replaced `val` with something other than `before`.
pub(crate) fn rewritten(before: &MDB_val, val: &MDB_val) -> bool {
    before.mv_data != val.mv_data || before.mv_size != val.mv_size
}

/// Views the bytes behind `val`.
///
/// # Safety
///
/// `val` must have been filled in by a successful engine call (or by
/// `from_slice`) whose data is still live, and the returned slice must not be
/// used after that data is invalidated. A zero-length view is never
/// dereferenced.
pub(crate) unsafe fn as_slice<'a>(val: &MDB_val) -> &'a [u8] {
    if val.mv_size == 0 || val.mv_data.is_null() {
        &[]
    } else {
        slice::from_raw_parts(val.mv_data as *const u8, val.mv_size as usize)
    }
}

/// Views an engine-reserved write buffer.
///
/// # Safety
///
/// Same contract as `as_slice`, and the buffer must have been returned by a
/// `MDB_RESERVE` write in the still-active write transaction.
pub(crate) unsafe fn as_mut_slice<'a>(val: &MDB_val) -> &'a mut [u8] {
    if val.mv_size == 0 || val.mv_data.is_null() {
        &mut []
    } else {
        slice::from_raw_parts_mut(val.mv_data as *mut u8, val.mv_size as usize)
    }
}
