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
    marker::PhantomData,
    mem,
    ptr,
};

use lmdb::Environment;
use lmdb_sys::{
    MDB_env,
    MDB_txn,
};
use log::{
    debug,
    trace,
};

use crate::{
    backend::READ_ONLY,
    error::{
        lmdb_result,
        StoreError,
    },
};

mod private {
    pub trait Sealed {}
}

/// A transaction that databases can be read through: a `Reader` or a `Writer`.
pub trait Readable: private::Sealed {
    #[doc(hidden)]
    fn txn_ptr(&self) -> *mut MDB_txn;
}

unsafe fn begin(env: *mut MDB_env, parent: *mut MDB_txn, flags: u32) -> Result<*mut MDB_txn, StoreError> {
    let mut txn: *mut MDB_txn = ptr::null_mut();
    lmdb_result(lmdb_sys::mdb_txn_begin(env, parent, flags as _, &mut txn))?;
    Ok(txn)
}

/// A read-only transaction. Sees the snapshot that was current when it began.
///
/// Readers occupy a slot in the environment's reader table for as long as they
/// are active. A long-lived reader can `reset` to give the slot back, and
/// `renew` later to pick up a fresh snapshot.
pub struct Reader<'env> {
    txn: *mut MDB_txn,
    _env: PhantomData<&'env Environment>,
}

impl<'env> Reader<'env> {
    pub(crate) fn new(env: &'env Environment) -> Result<Reader<'env>, StoreError> {
        let txn = unsafe { begin(env.env(), ptr::null_mut(), READ_ONLY)? };
        Ok(Reader {
            txn,
            _env: PhantomData,
        })
    }

    /// Ends the transaction. Only needed to keep database handles that were
    /// opened through this reader; otherwise dropping it is equivalent.
    pub fn commit(self) -> Result<(), StoreError> {
        let txn = self.txn;
        mem::forget(self);
        trace!("committing read transaction");
        lmdb_result(unsafe { lmdb_sys::mdb_txn_commit(txn) })
    }

    pub fn abort(self) {
        // Dropping aborts.
    }

    /// Releases the snapshot and the reader slot, keeping the handle. Reads
    /// fail until the reader is renewed.
    pub fn reset(&mut self) {
        debug!("resetting read transaction");
        unsafe { lmdb_sys::mdb_txn_reset(self.txn) }
    }

    /// Reacquires a reader slot on the latest committed snapshot.
    pub fn renew(&mut self) -> Result<(), StoreError> {
        debug!("renewing read transaction");
        lmdb_result(unsafe { lmdb_sys::mdb_txn_renew(self.txn) })
    }
}

impl<'env> Drop for Reader<'env> {
    fn drop(&mut self) {
        unsafe { lmdb_sys::mdb_txn_abort(self.txn) }
    }
}

impl<'env> private::Sealed for Reader<'env> {}

impl<'env> Readable for Reader<'env> {
    fn txn_ptr(&self) -> *mut MDB_txn {
        self.txn
    }
}

/// A read-write transaction. Only one can be active in an environment at a
/// time; beginning a second one blocks until the first ends.
///
/// Dropping a writer without calling `commit` discards its writes.
pub struct Writer<'env> {
    txn: *mut MDB_txn,
    env: *mut MDB_env,
    _env: PhantomData<&'env Environment>,
}

impl<'env> Writer<'env> {
    pub(crate) fn new(env: &'env Environment) -> Result<Writer<'env>, StoreError> {
        let env = env.env();
        let txn = unsafe { begin(env, ptr::null_mut(), 0)? };
        Ok(Writer {
            txn,
            env,
            _env: PhantomData,
        })
    }

    /// Begins a child transaction. Its writes become part of this transaction
    /// when it commits and vanish when it aborts. This transaction can't be
    /// used, committed or aborted until the child is gone.
    pub fn begin_nested(&mut self) -> Result<Writer<'_>, StoreError> {
        debug!("beginning nested write transaction");
        let txn = unsafe { begin(self.env, self.txn, 0)? };
        Ok(Writer {
            txn,
            env: self.env,
            _env: PhantomData,
        })
    }

    /// Makes the writes visible to transactions that begin afterwards. The
    /// transaction is over even if this fails.
    pub fn commit(self) -> Result<(), StoreError> {
        let txn = self.txn;
        mem::forget(self);
        trace!("committing write transaction");
        lmdb_result(unsafe { lmdb_sys::mdb_txn_commit(txn) })
    }

    pub fn abort(self) {
        // Dropping aborts.
    }
}

impl<'env> Drop for Writer<'env> {
    fn drop(&mut self) {
        trace!("aborting write transaction");
        unsafe { lmdb_sys::mdb_txn_abort(self.txn) }
    }
}

impl<'env> private::Sealed for Writer<'env> {}

impl<'env> Readable for Writer<'env> {
    fn txn_ptr(&self) -> *mut MDB_txn {
        self.txn
    }
}
