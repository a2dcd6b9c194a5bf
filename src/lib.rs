// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! A typed layer over [LMDB](http://www.lmdb.tech/doc/) databases and cursors.
//!
//! LMDB stores byte strings and hands them back as pointers into its memory
//! map, valid only until the transaction moves on. This crate puts types on
//! both sides of that exchange without giving up on the zero-copy reads:
//! keys and values are written straight from the application's own storage,
//! and read back by decoding the engine's buffer in place, before the call
//! that produced it returns.
//!
//! A `Database<K, V, T>` is typed by its key codec, its value codec, and a
//! capability tier `T`:
//!
//! * `Basic` databases hold raw bytes in byte order.
//! * `Strict` databases order keys by the key type, installing a comparator
//!   into the engine when they are opened.
//! * `DupSort` databases also keep many values per key, ordered by the value
//!   type.
//! * `DupFixed` databases have fixed-width values, and can fetch and store
//!   them in bulk.
//!
//! The tier decides, at compile time, which cursor verbs are available.
//!
//! ```
//! use std::fs;
//! use tempfile::Builder;
//! use tkv::{
//!     Database,
//!     StoreOptions,
//!     Strict,
//!     Tkv,
//!     WriteFlags,
//! };
//!
//! let root = Builder::new().prefix("simple-db").tempdir().unwrap();
//! fs::create_dir_all(root.path()).unwrap();
//! let env = Tkv::new(root.path()).unwrap();
//!
//! let bands: Database<u32, String, Strict> = env.open_database(Some("bands"), StoreOptions::create()).unwrap();
//!
//! {
//!     let mut writer = env.write().unwrap();
//!     bands.put(&mut writer, &700, "lighters", WriteFlags::empty()).unwrap();
//!     bands.put(&mut writer, &5, "fighters", WriteFlags::empty()).unwrap();
//!     writer.commit().unwrap();
//! }
//!
//! let reader = env.read().unwrap();
//! assert_eq!(bands.get(&reader, &5).unwrap().as_deref(), Some("fighters"));
//! assert_eq!(bands.get(&reader, &6).unwrap(), None);
//!
//! // Keys come back in numeric order, not byte order.
//! let keys: Vec<u32> = bands.iter_start(&reader).unwrap().map(|r| r.unwrap().0).collect();
//! assert_eq!(keys, vec![5, 700]);
//! ```

#[macro_use]
extern crate arrayref;

mod backend;
pub mod codec;
pub mod comparator;
pub mod cursor;
pub mod env;
pub mod error;
pub mod iter;
pub mod manager;
pub mod readwrite;
pub mod store;
pub mod value;

pub use lmdb::{
    EnvironmentBuilder,
    EnvironmentFlags,
};

pub use self::backend::{
    DatabaseFlags,
    DatabaseStat,
    WriteFlags,
};
pub use self::codec::{
    Accessible,
    Codec,
    Decodable,
    FixedWidth,
};
pub use self::comparator::Comparable;
pub use self::cursor::{
    Cursor,
    RwCursor,
};
pub use self::env::{
    Tkv,
    DEFAULT_MAX_DBS,
};
pub use self::error::{
    DataError,
    ErrorCategory,
    StoreError,
};
pub use self::iter::{
    DupIter,
    Iter,
};
pub use self::manager::Manager;
pub use self::readwrite::{
    Readable,
    Reader,
    Writer,
};
pub use self::store::{
    tier::{
        Basic,
        DupFixed,
        DupSort,
        DuplicateKeyed,
        FixedWidthDuplicate,
        SingleValued,
        Strict,
        Tier,
    },
    BasicDatabase,
    Database,
    StoreOptions,
};
pub use self::value::{
    SerdeBincode,
    Type,
    Value,
};
