// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Typed cursors.
//!
//! Every positioning verb runs the same three steps: prepare the key and value
//! buffers (the key filled in for the `set` family, unset otherwise), make one
//! `mdb_cursor_get` call, then decode whatever the engine wrote before the
//! call returns. Absence (`MDB_NOTFOUND`) is `Ok(None)`; the cursor stays open
//! and any absolute verb can position it again.

use std::{
    cmp::Ordering,
    marker::PhantomData,
    ops::{
        Deref,
        DerefMut,
    },
    os::raw::c_int,
    ptr,
};

use lmdb_sys::{
    MDB_cursor,
    MDB_dbi,
    MDB_txn,
    MDB_val,
};

use crate::{
    backend::{
        val,
        CursorOp,
        WriteFlags,
        MULTIPLE,
    },
    codec::{
        decode,
        decode_fixed,
        Accessible,
        Codec,
        FixedWidth,
    },
    error::{
        lmdb_result,
        DataError,
        StoreError,
    },
    iter::{
        DupIter,
        Iter,
    },
    readwrite::{
        Readable,
        Writer,
    },
    store::tier::{
        DuplicateKeyed,
        FixedWidthDuplicate,
        Tier,
    },
};

type EmptyResult = Result<(), StoreError>;

/// A read cursor over one database in one transaction.
pub struct Cursor<'t, K, V, T> {
    cursor: *mut MDB_cursor,
    txn: *mut MDB_txn,
    dbi: MDB_dbi,
    _marker: PhantomData<(&'t (), fn() -> (K, V, T))>,
}

impl<'t, K, V, T> Cursor<'t, K, V, T>
where
    K: Codec,
    V: Codec,
    T: Tier<K, V>,
{
    pub(crate) fn open<R: Readable>(txn: &'t R, dbi: MDB_dbi) -> Result<Cursor<'t, K, V, T>, StoreError> {
        let txn = txn.txn_ptr();
        let mut cursor: *mut MDB_cursor = ptr::null_mut();
        unsafe { lmdb_result(lmdb_sys::mdb_cursor_open(txn, dbi, &mut cursor))? };
        Ok(Cursor {
            cursor,
            txn,
            dbi,
            _marker: PhantomData,
        })
    }

    /// Runs one positioning verb. `f` sees the key and value exactly as the
    /// engine left them, and must not keep them.
    pub(crate) fn get_op<R, F>(&mut self, key: Option<&[u8]>, data: Option<&[u8]>, op: CursorOp, f: F) -> Result<Option<R>, StoreError>
    where
        F: FnOnce(&[u8], &[u8]) -> Result<R, DataError>,
    {
        let key_before = key.map_or_else(val::unset, val::from_slice);
        let data_before = data.map_or_else(val::unset, val::from_slice);
        let mut key_val = key.map_or_else(val::unset, val::from_slice);
        let mut data_val = data.map_or_else(val::unset, val::from_slice);

        let code = unsafe { lmdb_sys::mdb_cursor_get(self.cursor, &mut key_val, &mut data_val, op.code() as _) };
        if code == lmdb_sys::MDB_NOTFOUND as c_int {
            return Ok(None);
        }
        lmdb_result(code)?;

        debug_assert!(!op.writes_key() || val::rewritten(&key_before, &key_val), "{:?} left the key unset", op);
        debug_assert!(!op.writes_value() || val::rewritten(&data_before, &data_val), "{:?} left the value unset", op);

        let (k, v) = unsafe { (val::as_slice(&key_val), val::as_slice(&data_val)) };
        Ok(Some(f(k, v)?))
    }

    fn get_pair(&mut self, op: CursorOp) -> Result<Option<(K, V)>, StoreError> {
        self.get_op(None, None, op, decode_pair)
    }

    fn get_pair_at(&mut self, key: &K::View, op: CursorOp) -> Result<Option<(K, V)>, StoreError> {
        key.with_bytes(|k| self.get_op(Some(k), None, op, decode_pair))?
    }

    pub fn first(&mut self) -> Result<Option<(K, V)>, StoreError> {
        self.get_pair(CursorOp::First)
    }

    pub fn last(&mut self) -> Result<Option<(K, V)>, StoreError> {
        self.get_pair(CursorOp::Last)
    }

    pub fn next(&mut self) -> Result<Option<(K, V)>, StoreError> {
        self.get_pair(CursorOp::Next)
    }

    pub fn prev(&mut self) -> Result<Option<(K, V)>, StoreError> {
        self.get_pair(CursorOp::Prev)
    }

    /// The entry under the cursor.
    pub fn get_current(&mut self) -> Result<Option<(K, V)>, StoreError> {
        self.get_pair(CursorOp::GetCurrent)
    }

    /// Positions at `key` and returns its (first) value.
    pub fn set(&mut self, key: &K::View) -> Result<Option<V>, StoreError> {
        key.with_bytes(|k| self.get_op(Some(k), None, CursorOp::Set, |_, v| decode(v)))?
    }

    /// Positions at `key` and returns the stored key along with its value.
    pub fn set_key(&mut self, key: &K::View) -> Result<Option<(K, V)>, StoreError> {
        self.get_pair_at(key, CursorOp::SetKey)
    }

    /// Positions at the first key greater than or equal to `key`.
    pub fn set_range(&mut self, key: &K::View) -> Result<Option<(K, V)>, StoreError> {
        self.get_pair_at(key, CursorOp::SetRange)
    }

    /// Compares two keys with the comparator the engine uses for this database.
    pub fn compare_keys(&self, a: &K::View, b: &K::View) -> Result<Ordering, StoreError> {
        let order = a.with_bytes(|a| {
            b.with_bytes(|b| {
                let (a, b) = (val::from_slice(a), val::from_slice(b));
                unsafe { lmdb_sys::mdb_cmp(self.txn, self.dbi, &a, &b) }
            })
        })??;
        Ok(order.cmp(&0))
    }

    /// Consumes the cursor into a scan over the whole database, first to last.
    pub fn into_iter_start(self) -> Iter<'t, K, V, T> {
        Iter::start(self)
    }

    /// Consumes the cursor into a scan over the whole database, last to first.
    pub fn into_iter_end(self) -> Iter<'t, K, V, T> {
        Iter::end(self)
    }

    /// Consumes the cursor into a forward scan from the first key at or after `key`.
    pub fn into_iter_from(self, key: &K::View) -> Result<Iter<'t, K, V, T>, StoreError> {
        let key = key.with_bytes(<[u8]>::to_vec)?;
        Ok(Iter::starting_at(self, key))
    }
}

pub(crate) fn decode_pair<K: Codec, V: Codec>(k: &[u8], v: &[u8]) -> Result<(K, V), DataError> {
    Ok((decode(k)?, decode(v)?))
}

/// Verbs that only make sense when a key can have many values.
impl<'t, K, V, T> Cursor<'t, K, V, T>
where
    K: Codec,
    V: Codec,
    T: Tier<K, V> + DuplicateKeyed,
{
    /// The next value of the current key.
    pub fn next_dup(&mut self) -> Result<Option<(K, V)>, StoreError> {
        self.get_pair(CursorOp::NextDup)
    }

    /// The previous value of the current key.
    pub fn prev_dup(&mut self) -> Result<Option<(K, V)>, StoreError> {
        self.get_pair(CursorOp::PrevDup)
    }

    /// The first value of the next key.
    pub fn next_no_dup(&mut self) -> Result<Option<(K, V)>, StoreError> {
        self.get_pair(CursorOp::NextNoDup)
    }

    /// The last value of the previous key.
    pub fn prev_no_dup(&mut self) -> Result<Option<(K, V)>, StoreError> {
        self.get_pair(CursorOp::PrevNoDup)
    }

    pub fn first_dup(&mut self) -> Result<Option<V>, StoreError> {
        self.get_op(None, None, CursorOp::FirstDup, |_, v| decode(v))
    }

    pub fn last_dup(&mut self) -> Result<Option<V>, StoreError> {
        self.get_op(None, None, CursorOp::LastDup, |_, v| decode(v))
    }

    /// Positions at the exact pair, if it is stored.
    pub fn get_both(&mut self, key: &K::View, value: &V::View) -> Result<bool, StoreError> {
        let found = key.with_bytes(|k| {
            value.with_bytes(|v| self.get_op(Some(k), Some(v), CursorOp::GetBoth, |_, _| Ok(())))
        })???;
        Ok(found.is_some())
    }

    /// Positions at `key`'s first value greater than or equal to `value`.
    pub fn get_both_range(&mut self, key: &K::View, value: &V::View) -> Result<Option<V>, StoreError> {
        key.with_bytes(|k| value.with_bytes(|v| self.get_op(Some(k), Some(v), CursorOp::GetBothRange, |_, v| decode(v))))??
    }

    /// How many values the current key has.
    pub fn dup_count(&self) -> Result<usize, StoreError> {
        let mut count = 0;
        unsafe { lmdb_result(lmdb_sys::mdb_cursor_count(self.cursor, &mut count))? };
        Ok(count as usize)
    }

    /// Compares two values with the duplicate comparator the engine uses for
    /// this database.
    pub fn compare_values(&self, a: &V::View, b: &V::View) -> Result<Ordering, StoreError> {
        let order = a.with_bytes(|a| {
            b.with_bytes(|b| {
                let (a, b) = (val::from_slice(a), val::from_slice(b));
                unsafe { lmdb_sys::mdb_dcmp(self.txn, self.dbi, &a, &b) }
            })
        })??;
        Ok(order.cmp(&0))
    }

    /// Consumes the cursor into a scan over the values of `key`.
    pub fn into_iter_dup_of(self, key: &K::View) -> Result<DupIter<'t, K, V, T>, StoreError> {
        let key = key.with_bytes(<[u8]>::to_vec)?;
        Ok(DupIter::new(self, key))
    }
}

/// Bulk fetch, decoding a page worth of values from a single engine call.
impl<'t, K, V, T> Cursor<'t, K, V, T>
where
    K: Codec,
    V: FixedWidth,
    T: Tier<K, V> + FixedWidthDuplicate,
{
    /// Returns the values of the current key, starting at the page the cursor
    /// is on, and moves the cursor to the last of them. The cursor must
    /// already be positioned.
    pub fn get_multiple(&mut self) -> Result<Option<Vec<V>>, StoreError> {
        let data_before = val::unset();
        let mut key_val = val::unset();
        let mut data_val = val::unset();
        let code = unsafe {
            lmdb_sys::mdb_cursor_get(self.cursor, &mut key_val, &mut data_val, CursorOp::GetMultiple.code() as _)
        };
        if code == lmdb_sys::MDB_NOTFOUND as c_int {
            return Ok(None);
        }
        lmdb_result(code)?;

        // A key with a single value has no duplicate page, and the engine
        // reports success without touching the buffer.
        if !val::rewritten(&data_before, &data_val) {
            return self.get_op(None, None, CursorOp::GetCurrent, |_, v| Ok(vec![decode(v)?]));
        }
        Ok(Some(decode_fixed(unsafe { val::as_slice(&data_val) })?))
    }

    /// Returns the next page of values of the current key.
    pub fn next_multiple(&mut self) -> Result<Option<(K, Vec<V>)>, StoreError> {
        self.get_op(None, None, CursorOp::NextMultiple, |k, v| Ok((decode(k)?, decode_fixed(v)?)))
    }
}

impl<'t, K, V, T> Drop for Cursor<'t, K, V, T> {
    fn drop(&mut self) {
        unsafe { lmdb_sys::mdb_cursor_close(self.cursor) }
    }
}

/// A cursor that can also write. Borrows its writer mutably, so nothing else
/// can touch the transaction while it lives.
pub struct RwCursor<'t, K, V, T> {
    cursor: Cursor<'t, K, V, T>,
    _writer: PhantomData<&'t mut ()>,
}

impl<'t, K, V, T> RwCursor<'t, K, V, T>
where
    K: Codec,
    V: Codec,
    T: Tier<K, V>,
{
    pub(crate) fn open(writer: &'t mut Writer, dbi: MDB_dbi) -> Result<RwCursor<'t, K, V, T>, StoreError> {
        Ok(RwCursor {
            cursor: Cursor::open(&*writer, dbi)?,
            _writer: PhantomData,
        })
    }

    /// Stores a pair and leaves the cursor on it. With `WriteFlags::CURRENT`
    /// the entry under the cursor is replaced; its key must match.
    pub fn put(&mut self, key: &K::View, value: &V::View, flags: WriteFlags) -> EmptyResult {
        key.with_bytes(|k| {
            value.with_bytes(|v| {
                let mut key_val = val::from_slice(k);
                let mut data_val = val::from_slice(v);
                lmdb_result(unsafe {
                    lmdb_sys::mdb_cursor_put(self.cursor.cursor, &mut key_val, &mut data_val, flags.bits() as _)
                })
            })
        })???;
        Ok(())
    }

    /// Deletes the entry under the cursor. On duplicate-keyed databases this is
    /// a single value.
    pub fn delete_current(&mut self) -> EmptyResult {
        lmdb_result(unsafe { lmdb_sys::mdb_cursor_del(self.cursor.cursor, 0) })
    }
}

impl<'t, K, V, T> RwCursor<'t, K, V, T>
where
    K: Codec,
    V: Codec,
    T: Tier<K, V> + DuplicateKeyed,
{
    /// Deletes every value of the key under the cursor.
    pub fn delete_current_dups(&mut self) -> EmptyResult {
        lmdb_result(unsafe { lmdb_sys::mdb_cursor_del(self.cursor.cursor, WriteFlags::NO_DUP_DATA.bits() as _) })
    }
}

impl<'t, K, V, T> RwCursor<'t, K, V, T>
where
    K: Codec,
    V: FixedWidth,
    T: Tier<K, V> + FixedWidthDuplicate,
{
    /// Stores all of `values` under `key` in one engine call. Returns how many
    /// were written.
    pub fn put_multiple(&mut self, key: &K::View, values: &[V], flags: WriteFlags) -> Result<usize, StoreError> {
        if values.is_empty() {
            return Ok(0);
        }
        let mut buf = Vec::with_capacity(values.len() * V::WIDTH);
        for value in values {
            value.with_bytes(|bytes| {
                if bytes.len() != V::WIDTH {
                    return Err(DataError::WidthMismatch {
                        width: V::WIDTH,
                        len: bytes.len(),
                    });
                }
                buf.extend_from_slice(bytes);
                Ok(())
            })??;
        }

        key.with_bytes(|k| {
            let mut key_val = val::from_slice(k);
            // The engine takes the element width in the first `MDB_val` and
            // the element count in the second, which it overwrites with the
            // number actually stored.
            let mut data: [MDB_val; 2] = [val::from_slice(&buf), val::with_len(values.len())];
            data[0].mv_size = V::WIDTH as _;
            let flags = flags.bits() | MULTIPLE;
            lmdb_result(unsafe { lmdb_sys::mdb_cursor_put(self.cursor.cursor, &mut key_val, data.as_mut_ptr(), flags as _) })
                .map(|()| data[1].mv_size as usize)
        })?
    }
}

impl<'t, K, V, T> Deref for RwCursor<'t, K, V, T> {
    type Target = Cursor<'t, K, V, T>;

    fn deref(&self) -> &Self::Target {
        &self.cursor
    }
}

impl<'t, K, V, T> DerefMut for RwCursor<'t, K, V, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.cursor
    }
}
