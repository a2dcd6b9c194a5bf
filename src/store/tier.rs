// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Capability tiers.
//!
//! Every database is opened at exactly one tier, which fixes its engine flags,
//! the comparators installed for it, and the operations its handles and
//! cursors offer:
//!
//! * `Basic`: raw bytes in, raw bytes out, byte-lexicographic order.
//! * `Strict`: typed keys and values, keys ordered by the key type.
//! * `DupSort`: `Strict` plus many values per key, ordered by the value type.
//! * `DupFixed`: `DupSort` with fixed-width values, adding bulk fetch and
//!   bulk insert.
//!
//! The operations are gated by the marker traits `SingleValued`,
//! `DuplicateKeyed` and `FixedWidthDuplicate`, so asking a `Strict` cursor for
//! `next_dup` is a compile error rather than an engine error.
//!
//! LMDB keeps comparators per environment, not per transaction or handle, so
//! once a database is wired to a tier's comparators every later open of it in
//! the same environment must ask for the same ones.

use std::{
    any::TypeId,
    collections::{
        btree_map::Entry,
        BTreeMap,
    },
    sync::Mutex,
};

use lazy_static::lazy_static;
use lmdb_sys::{
    MDB_dbi,
    MDB_env,
    MDB_txn,
};
use log::debug;

use crate::{
    backend::DatabaseFlags,
    codec::{
        Codec,
        FixedWidth,
    },
    comparator::{
        compare_raw,
        Comparable,
    },
    error::{
        lmdb_result,
        StoreError,
    },
};

mod private {
    pub trait Sealed {}
}

/// The key and value types whose comparators a tier installs. `None` leaves
/// the engine's byte order in place.
#[doc(hidden)]
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct Comparators {
    key: Option<TypeId>,
    value: Option<TypeId>,
}

impl Comparators {
    const NONE: Comparators = Comparators {
        key: None,
        value: None,
    };

    fn keys<K: 'static>() -> Comparators {
        Comparators {
            key: Some(TypeId::of::<K>()),
            value: None,
        }
    }

    fn keys_and_values<K: 'static, V: 'static>() -> Comparators {
        Comparators {
            key: Some(TypeId::of::<K>()),
            value: Some(TypeId::of::<V>()),
        }
    }
}

type WiringKey = (usize, Option<String>);

lazy_static! {
    static ref WIRING: Mutex<BTreeMap<WiringKey, Comparators>> = Mutex::new(BTreeMap::new());
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct Basic;

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct Strict;

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct DupSort;

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct DupFixed;

impl private::Sealed for Basic {}
impl private::Sealed for Strict {}
impl private::Sealed for DupSort {}
impl private::Sealed for DupFixed {}

/// A tier that can hold keys of type `K` and values of type `V`.
pub trait Tier<K: Codec, V: Codec>: private::Sealed {
    const FLAGS: DatabaseFlags;

    #[doc(hidden)]
    fn comparators() -> Comparators;

    /// Wires the tier's comparators into the engine for `dbi`.
    ///
    /// # Safety
    ///
    /// `txn` must be live and `dbi` must have just been opened in it, before any
    /// ordered operation runs against the database.
    #[doc(hidden)]
    unsafe fn install_comparators(txn: *mut MDB_txn, dbi: MDB_dbi) -> Result<bool, StoreError>;
}

/// Tiers that store one value per key. Only these accept reserved writes.
pub trait SingleValued: private::Sealed {}

/// Tiers that store a sorted set of values per key.
pub trait DuplicateKeyed: private::Sealed {}

/// Duplicate-keyed tiers whose values all have the same width.
pub trait FixedWidthDuplicate: DuplicateKeyed {}

impl SingleValued for Basic {}
impl SingleValued for Strict {}
impl DuplicateKeyed for DupSort {}
impl DuplicateKeyed for DupFixed {}
impl FixedWidthDuplicate for DupFixed {}

unsafe fn set_key_order<K: Comparable>(txn: *mut MDB_txn, dbi: MDB_dbi) -> Result<(), StoreError> {
    lmdb_result(lmdb_sys::mdb_set_compare(txn, dbi, Some(compare_raw::<K>)))
}

unsafe fn set_value_order<V: Comparable>(txn: *mut MDB_txn, dbi: MDB_dbi) -> Result<(), StoreError> {
    lmdb_result(lmdb_sys::mdb_set_dupsort(txn, dbi, Some(compare_raw::<V>)))
}

impl Tier<Vec<u8>, Vec<u8>> for Basic {
    const FLAGS: DatabaseFlags = DatabaseFlags::empty();

    fn comparators() -> Comparators {
        Comparators::NONE
    }

    unsafe fn install_comparators(_txn: *mut MDB_txn, _dbi: MDB_dbi) -> Result<bool, StoreError> {
        Ok(false)
    }
}

impl<K, V> Tier<K, V> for Strict
where
    K: Comparable,
    V: Codec,
{
    const FLAGS: DatabaseFlags = DatabaseFlags::empty();

    fn comparators() -> Comparators {
        Comparators::keys::<K>()
    }

    unsafe fn install_comparators(txn: *mut MDB_txn, dbi: MDB_dbi) -> Result<bool, StoreError> {
        set_key_order::<K>(txn, dbi)?;
        Ok(true)
    }
}

impl<K, V> Tier<K, V> for DupSort
where
    K: Comparable,
    V: Comparable,
{
    const FLAGS: DatabaseFlags = DatabaseFlags::DUP_SORT;

    fn comparators() -> Comparators {
        Comparators::keys_and_values::<K, V>()
    }

    unsafe fn install_comparators(txn: *mut MDB_txn, dbi: MDB_dbi) -> Result<bool, StoreError> {
        set_key_order::<K>(txn, dbi)?;
        set_value_order::<V>(txn, dbi)?;
        Ok(true)
    }
}

impl<K, V> Tier<K, V> for DupFixed
where
    K: Comparable,
    V: Comparable + FixedWidth,
{
    const FLAGS: DatabaseFlags = DatabaseFlags::DUP_SORT.union(DatabaseFlags::DUP_FIXED);

    fn comparators() -> Comparators {
        Comparators::keys_and_values::<K, V>()
    }

    unsafe fn install_comparators(txn: *mut MDB_txn, dbi: MDB_dbi) -> Result<bool, StoreError> {
        set_key_order::<K>(txn, dbi)?;
        set_value_order::<V>(txn, dbi)?;
        Ok(true)
    }
}

/// Installs `T`'s comparators for the database `name`, opened as `dbi` in
/// `txn`. Fails with `Incompatible`, installing nothing, if the database was
/// already wired to other comparators in this environment.
///
/// The same comparators are installed again on every open: a handle that was
/// opened in an aborted transaction comes back with the engine's defaults.
///
/// # Safety
///
/// `txn` must be live and `dbi` must have just been opened in it.
pub(crate) unsafe fn wire<K, V, T>(txn: *mut MDB_txn, dbi: MDB_dbi, name: Option<&str>) -> Result<bool, StoreError>
where
    K: Codec,
    V: Codec,
    T: Tier<K, V>,
{
    let env = lmdb_sys::mdb_txn_env(txn) as usize;
    let wanted = T::comparators();
    let mut wiring = WIRING.lock()?;
    let entry = wiring.entry((env, name.map(String::from)));
    if let Entry::Occupied(ref e) = entry {
        if *e.get() != wanted {
            debug!("database {:?} is wired to {:?}, not {:?}", name, e.get(), wanted);
            return Err(StoreError::Incompatible);
        }
    }
    let installed = T::install_comparators(txn, dbi)?;
    if let Entry::Vacant(e) = entry {
        e.insert(wanted);
    }
    Ok(installed)
}

/// Forgets the wiring of every database in `env`, which is closing.
pub(crate) fn forget_environment(env: *mut MDB_env) {
    if let Ok(mut wiring) = WIRING.lock() {
        wiring.retain(|(e, _), _| *e != env as usize);
    }
}
