// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

pub mod tier;

use std::{
    ffi::CString,
    fmt,
    marker::PhantomData,
    mem,
    os::raw::c_int,
    ptr,
};

use lmdb_sys::{
    MDB_dbi,
    MDB_stat,
};
use log::debug;

use crate::{
    backend::{
        val,
        DatabaseFlags,
        DatabaseStat,
        WriteFlags,
        CREATE,
        RESERVE,
    },
    codec::{
        decode,
        Accessible,
        Codec,
    },
    cursor::{
        Cursor,
        RwCursor,
    },
    error::{
        lmdb_result,
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
};

use self::tier::{
    Basic,
    DuplicateKeyed,
    SingleValued,
    Tier,
};

type EmptyResult = Result<(), StoreError>;

#[derive(Default, Debug, Copy, Clone)]
pub struct StoreOptions {
    pub create: bool,
}

impl StoreOptions {
    pub fn create() -> StoreOptions {
        StoreOptions {
            create: true,
        }
    }
}

/// A handle to a named database, typed by its key codec, value codec and
/// tier. Handles are plain engine identifiers: they are copied freely and
/// stay valid, across transactions, for as long as the environment is open.
pub struct Database<K, V, T = Basic> {
    dbi: MDB_dbi,
    _marker: PhantomData<fn() -> (K, V, T)>,
}

impl<K, V, T> Clone for Database<K, V, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V, T> Copy for Database<K, V, T> {}

impl<K, V, T> PartialEq for Database<K, V, T> {
    fn eq(&self, other: &Self) -> bool {
        self.dbi == other.dbi
    }
}

impl<K, V, T> Eq for Database<K, V, T> {}

impl<K, V, T> fmt::Debug for Database<K, V, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Database").field("dbi", &self.dbi).field("tier", &std::any::type_name::<T>()).finish()
    }
}

/// The raw-bytes tier.
pub type BasicDatabase = Database<Vec<u8>, Vec<u8>, Basic>;

impl<K, V, T> Database<K, V, T>
where
    K: Codec,
    V: Codec,
    T: Tier<K, V>,
{
    /// Opens the database called `name`, or the environment's unnamed database.
    ///
    /// The tier's comparators are installed before this returns. Reopening a
    /// database with another tier, or with codecs that order differently,
    /// fails with `Incompatible` and leaves the existing handles alone. A handle
    /// opened in a transaction that is later aborted is closed with it, so
    /// open inside a transaction that commits, as `Tkv::open_database` does.
    pub fn open<R: Readable>(txn: &R, name: Option<&str>, options: StoreOptions) -> Result<Database<K, V, T>, StoreError> {
        let c_name = name.map(CString::new).transpose().map_err(|_| StoreError::InvalidParameter)?;
        let name_ptr = c_name.as_ref().map_or(ptr::null(), |n| n.as_ptr());
        let mut flags = T::FLAGS.bits();
        if options.create {
            flags |= CREATE;
        }

        let mut dbi: MDB_dbi = 0;
        unsafe { lmdb_result(lmdb_sys::mdb_dbi_open(txn.txn_ptr(), name_ptr, flags as _, &mut dbi))? };

        let db = Database {
            dbi,
            _marker: PhantomData,
        };

        // An existing database keeps the flags it was created with.
        let dup = DatabaseFlags::DUP_SORT | DatabaseFlags::DUP_FIXED;
        let stored = db.flags(txn)?;
        if stored & dup != T::FLAGS & dup {
            debug!("database {:?} was created with {:?}, not {:?}", name, stored, T::FLAGS);
            return Err(StoreError::Incompatible);
        }

        let ordered = unsafe { tier::wire::<K, V, T>(txn.txn_ptr(), dbi, name)? };
        debug!("opened database {:?} (dbi {}, flags {:?}, comparators installed: {})", name, dbi, T::FLAGS, ordered);
        Ok(db)
    }

    pub fn dbi(&self) -> MDB_dbi {
        self.dbi
    }

    /// Looks up `key`. On duplicate-keyed databases this is the key's first
    /// value.
    pub fn get<R: Readable>(&self, txn: &R, key: &K::View) -> Result<Option<V>, StoreError> {
        key.with_bytes(|k| -> Result<Option<V>, StoreError> {
            let mut key_val = val::from_slice(k);
            let mut data_val = val::unset();
            let code = unsafe { lmdb_sys::mdb_get(txn.txn_ptr(), self.dbi, &mut key_val, &mut data_val) };
            if code == lmdb_sys::MDB_NOTFOUND as c_int {
                return Ok(None);
            }
            lmdb_result(code)?;
            debug_assert!(val::rewritten(&val::unset(), &data_val), "get left the value unset");
            let v = decode(unsafe { val::as_slice(&data_val) })?;
            Ok(Some(v))
        })?
    }

    pub fn contains<R: Readable>(&self, txn: &R, key: &K::View) -> Result<bool, StoreError> {
        key.with_bytes(|k| -> Result<bool, StoreError> {
            let mut key_val = val::from_slice(k);
            let mut data_val = val::unset();
            let code = unsafe { lmdb_sys::mdb_get(txn.txn_ptr(), self.dbi, &mut key_val, &mut data_val) };
            if code == lmdb_sys::MDB_NOTFOUND as c_int {
                return Ok(false);
            }
            lmdb_result(code)?;
            debug_assert!(val::rewritten(&val::unset(), &data_val), "get left the value unset");
            Ok(true)
        })?
    }

    /// Stores `value` under `key`.
    ///
    /// Values whose codec knows its encoded length up front are encoded
    /// straight into space the engine reserves, on tiers that allow it.
    pub fn put(&self, writer: &mut Writer, key: &K::View, value: &V::View, flags: WriteFlags) -> EmptyResult {
        if !T::FLAGS.contains(DatabaseFlags::DUP_SORT) {
            if let Some(len) = value.reserve_len()? {
                // A failed encoding leaves the reserved bytes in place; the
                // writer should be aborted.
                key.with_bytes(|k| self.reserve(writer, k, len, flags, |buf| value.encode_into(buf)))???;
                return Ok(());
            }
        }

        key.with_bytes(|k| {
            value.with_bytes(|v| {
                let mut key_val = val::from_slice(k);
                let mut data_val = val::from_slice(v);
                lmdb_result(unsafe {
                    lmdb_sys::mdb_put(writer.txn_ptr(), self.dbi, &mut key_val, &mut data_val, flags.bits() as _)
                })
            })
        })??
    }

    fn reserve<F, R>(&self, writer: &mut Writer, key: &[u8], len: usize, flags: WriteFlags, fill: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let mut key_val = val::from_slice(key);
        let mut data_val = val::with_len(len);
        lmdb_result(unsafe {
            lmdb_sys::mdb_put(writer.txn_ptr(), self.dbi, &mut key_val, &mut data_val, (flags.bits() | RESERVE) as _)
        })?;
        let buf = unsafe { val::as_mut_slice(&data_val) };
        debug_assert_eq!(buf.len(), len);
        Ok(fill(buf))
    }

    /// Deletes `key`. On duplicate-keyed databases every value goes. Deleting
    /// a key that isn't there is `KeyValuePairNotFound`.
    pub fn delete(&self, writer: &mut Writer, key: &K::View) -> EmptyResult {
        key.with_bytes(|k| {
            let mut key_val = val::from_slice(k);
            lmdb_result(unsafe { lmdb_sys::mdb_del(writer.txn_ptr(), self.dbi, &mut key_val, ptr::null_mut()) })
        })?
    }

    /// Removes every entry. The handle stays open.
    pub fn clear(&self, writer: &mut Writer) -> EmptyResult {
        lmdb_result(unsafe { lmdb_sys::mdb_drop(writer.txn_ptr(), self.dbi, 0) })
    }

    pub fn stat<R: Readable>(&self, txn: &R) -> Result<DatabaseStat, StoreError> {
        let mut stat: MDB_stat = unsafe { mem::zeroed() };
        lmdb_result(unsafe { lmdb_sys::mdb_stat(txn.txn_ptr(), self.dbi, &mut stat) })?;
        Ok(DatabaseStat::from(stat))
    }

    /// The flags the database was created with.
    pub fn flags<R: Readable>(&self, txn: &R) -> Result<DatabaseFlags, StoreError> {
        let mut flags = 0;
        lmdb_result(unsafe { lmdb_sys::mdb_dbi_flags(txn.txn_ptr(), self.dbi, &mut flags) })?;
        Ok(DatabaseFlags::from_bits_truncate(flags as _))
    }

    pub fn cursor<'t, R: Readable>(&self, txn: &'t R) -> Result<Cursor<'t, K, V, T>, StoreError> {
        Cursor::open(txn, self.dbi)
    }

    pub fn cursor_mut<'t>(&self, writer: &'t mut Writer) -> Result<RwCursor<'t, K, V, T>, StoreError> {
        RwCursor::open(writer, self.dbi)
    }

    /// Every entry, in key order.
    pub fn iter_start<'t, R: Readable>(&self, txn: &'t R) -> Result<Iter<'t, K, V, T>, StoreError> {
        Ok(self.cursor(txn)?.into_iter_start())
    }

    /// Every entry, in reverse key order.
    pub fn iter_end<'t, R: Readable>(&self, txn: &'t R) -> Result<Iter<'t, K, V, T>, StoreError> {
        Ok(self.cursor(txn)?.into_iter_end())
    }

    /// Entries from the first key at or after `key` onwards.
    pub fn iter_from<'t, R: Readable>(&self, txn: &'t R, key: &K::View) -> Result<Iter<'t, K, V, T>, StoreError> {
        self.cursor(txn)?.into_iter_from(key)
    }
}

impl<K, V, T> Database<K, V, T>
where
    K: Codec,
    V: Codec,
    T: Tier<K, V> + SingleValued,
{
    /// Reserves exactly `len` bytes for the value of `key` and calls `fill`
    /// with them, once, before returning. Bytes `fill` leaves alone hold
    /// whatever the engine put there.
    pub fn put_reserved<F, R>(&self, writer: &mut Writer, key: &K::View, len: usize, flags: WriteFlags, fill: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        key.with_bytes(|k| self.reserve(writer, k, len, flags, fill))?
    }
}

impl<K, V, T> Database<K, V, T>
where
    K: Codec,
    V: Codec,
    T: Tier<K, V> + DuplicateKeyed,
{
    /// Whether exactly this pair is stored.
    pub fn contains_pair<R: Readable>(&self, txn: &R, key: &K::View, value: &V::View) -> Result<bool, StoreError> {
        self.cursor(txn)?.get_both(key, value)
    }

    /// Deletes one value of `key`, leaving its other values in place.
    pub fn delete_value(&self, writer: &mut Writer, key: &K::View, value: &V::View) -> EmptyResult {
        key.with_bytes(|k| {
            value.with_bytes(|v| {
                let mut key_val = val::from_slice(k);
                let mut data_val = val::from_slice(v);
                lmdb_result(unsafe { lmdb_sys::mdb_del(writer.txn_ptr(), self.dbi, &mut key_val, &mut data_val) })
            })
        })??
    }

    /// Every value of `key`, in value order.
    pub fn get_all<R: Readable>(&self, txn: &R, key: &K::View) -> Result<Vec<V>, StoreError> {
        self.iter_dup_of(txn, key)?.collect()
    }

    /// The values of `key`, in value order.
    pub fn iter_dup_of<'t, R: Readable>(&self, txn: &'t R, key: &K::View) -> Result<DupIter<'t, K, V, T>, StoreError> {
        self.cursor(txn)?.into_iter_dup_of(key)
    }
}
