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
    os::raw::c_uint,
    path::{
        Path,
        PathBuf,
    },
};

use lmdb::{
    Environment,
    EnvironmentBuilder,
};
use log::debug;

use crate::{
    codec::Codec,
    error::StoreError,
    readwrite::{
        Reader,
        Writer,
    },
    store::{
        tier::{
            self,
            Tier,
        },
        Database,
        StoreOptions,
    },
};

pub static DEFAULT_MAX_DBS: c_uint = 5;

/// Wrapper around an `lmdb::Environment`.
#[derive(Debug)]
pub struct Tkv {
    path: PathBuf,
    env: Environment,
}

impl Drop for Tkv {
    fn drop(&mut self) {
        tier::forget_environment(self.env.env());
    }
}

/// Static methods.
impl Tkv {
    pub fn environment_builder() -> EnvironmentBuilder {
        Environment::new()
    }

    /// Return a new Tkv environment that supports up to `DEFAULT_MAX_DBS` open databases.
    pub fn new(path: &Path) -> Result<Tkv, StoreError> {
        Tkv::with_capacity(path, DEFAULT_MAX_DBS)
    }

    /// Return a new Tkv environment that supports the specified number of open databases.
    pub fn with_capacity(path: &Path, max_dbs: c_uint) -> Result<Tkv, StoreError> {
        let mut builder = Tkv::environment_builder();
        builder.set_max_dbs(max_dbs);
        Tkv::from_builder(path, builder)
    }

    /// Return a new Tkv environment from the provided builder.
    pub fn from_builder(path: &Path, builder: EnvironmentBuilder) -> Result<Tkv, StoreError> {
        if !path.is_dir() {
            return Err(StoreError::DirectoryDoesNotExistError(path.into()));
        }

        let env = builder.open(path).map_err(|e| match e {
            lmdb::Error::Other(2) => StoreError::DirectoryDoesNotExistError(path.into()),
            e => StoreError::from(e),
        })?;
        debug!("opened environment at {:?}", path);

        Ok(Tkv {
            path: path.into(),
            env,
        })
    }
}

impl Tkv {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes written data to disk. Only needed when the environment was
    /// opened with one of the relaxed sync flags, or `force` is set.
    pub fn sync(&self, force: bool) -> Result<(), StoreError> {
        self.env.sync(force).map_err(StoreError::from)
    }

    /// Opens a database in a transaction of its own and commits it, so the
    /// handle can be used from any later transaction. With `options.create`
    /// this takes the write lock.
    ///
    /// LMDB allows one read transaction per thread, so this fails with
    /// `BadReaderSlot` if the calling thread holds a `Reader` and `create` is
    /// not set.
    pub fn open_database<K, V, T>(&self, name: Option<&str>, options: StoreOptions) -> Result<Database<K, V, T>, StoreError>
    where
        K: Codec,
        V: Codec,
        T: Tier<K, V>,
    {
        if options.create {
            let writer = self.write()?;
            let db = Database::open(&writer, name, options)?;
            writer.commit()?;
            Ok(db)
        } else {
            let reader = self.read()?;
            let db = Database::open(&reader, name, options)?;
            reader.commit()?;
            Ok(db)
        }
    }
}

/// Read and write accessors.
impl Tkv {
    pub fn read(&self) -> Result<Reader<'_>, StoreError> {
        Reader::new(&self.env)
    }

    /// Begins the environment's write transaction, blocking while another one
    /// is active.
    pub fn write(&self) -> Result<Writer<'_>, StoreError> {
        Writer::new(&self.env)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::Builder;

    use super::*;
    use crate::{
        backend::WriteFlags,
        store::{
            tier::Strict,
            BasicDatabase,
        },
        value::Value,
    };

    type ValueDatabase = Database<String, Value, Strict>;

    /// We can't open a directory that doesn't exist.
    #[test]
    fn test_open_fails() {
        let root = Builder::new().prefix("test_open_fails").tempdir().expect("tempdir");
        assert!(root.path().exists());

        let nope = root.path().join("nope/");
        assert!(!nope.exists());

        let pb = nope.to_path_buf();
        match Tkv::new(nope.as_path()).err() {
            Some(StoreError::DirectoryDoesNotExistError(p)) => {
                assert_eq!(pb, p);
            },
            _ => panic!("expected error"),
        };
    }

    #[test]
    fn test_open() {
        let root = Builder::new().prefix("test_open").tempdir().expect("tempdir");
        fs::create_dir_all(root.path()).expect("dir created");
        assert!(root.path().is_dir());

        let k = Tkv::new(root.path()).expect("new succeeded");
        assert_eq!(k.path(), root.path());
        let _: BasicDatabase = k.open_database(None, StoreOptions::create()).expect("created default");

        let yyy: ValueDatabase = k.open_database(Some("yyy"), StoreOptions::create()).expect("opened");
        let reader = k.read().expect("reader");
        assert_eq!(yyy.get(&reader, "foo").expect("read"), None);
    }

    #[test]
    fn test_open_a_missing_database() {
        let root = Builder::new().prefix("test_open_a_missing_database").tempdir().expect("tempdir");
        fs::create_dir_all(root.path()).expect("dir created");
        let k = Tkv::new(root.path()).expect("new succeeded");
        match k.open_database::<String, Value, Strict>(Some("sk"), StoreOptions::default()) {
            Err(StoreError::KeyValuePairNotFound) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_open_fail_with_badrslot() {
        let root = Builder::new().prefix("test_open_fail_with_badrslot").tempdir().expect("tempdir");
        fs::create_dir_all(root.path()).expect("dir created");
        let k = Tkv::new(root.path()).expect("new succeeded");
        let _: ValueDatabase = k.open_database(Some("sk"), StoreOptions::create()).expect("opened");

        // LMDB allows one read transaction per thread.
        let _reader = k.read().expect("reader");
        match k.open_database::<String, Value, Strict>(Some("sk"), StoreOptions::default()) {
            Err(StoreError::BadReaderSlot) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_round_trip_and_transactions() {
        let root = Builder::new().prefix("test_round_trip_and_transactions").tempdir().expect("tempdir");
        fs::create_dir_all(root.path()).expect("dir created");
        let k = Tkv::new(root.path()).expect("new succeeded");
        let sk: ValueDatabase = k.open_database(Some("sk"), StoreOptions::create()).expect("opened");

        {
            let mut writer = k.write().expect("writer");
            sk.put(&mut writer, "foo", &Value::I64(1234), WriteFlags::empty()).expect("wrote");
            sk.put(&mut writer, "noo", &Value::F64(1234.0.into()), WriteFlags::empty()).expect("wrote");
            sk.put(&mut writer, "bar", &Value::Bool(true), WriteFlags::empty()).expect("wrote");
            sk.put(&mut writer, "baz", &Value::Str("héllo, yöu".to_string()), WriteFlags::empty()).expect("wrote");
            assert_eq!(sk.get(&writer, "foo").expect("read"), Some(Value::I64(1234)));
            assert_eq!(sk.get(&writer, "noo").expect("read"), Some(Value::F64(1234.0.into())));
            assert_eq!(sk.get(&writer, "bar").expect("read"), Some(Value::Bool(true)));
            assert_eq!(sk.get(&writer, "baz").expect("read"), Some(Value::Str("héllo, yöu".to_string())));

            // Isolation. Reads won't return values.
            let r = &k.read().expect("reader");
            assert_eq!(sk.get(r, "foo").expect("read"), None);
            assert_eq!(sk.get(r, "bar").expect("read"), None);
        }

        // Dropped: tx rollback. Reads will still return nothing.
        {
            let r = &k.read().expect("reader");
            assert_eq!(sk.get(r, "foo").expect("read"), None);
            assert_eq!(sk.get(r, "baz").expect("read"), None);
        }

        {
            let mut writer = k.write().expect("writer");
            sk.put(&mut writer, "foo", &Value::I64(1234), WriteFlags::empty()).expect("wrote");
            sk.put(&mut writer, "bar", &Value::Bool(true), WriteFlags::empty()).expect("wrote");
            writer.commit().expect("committed");
        }

        // Committed. Reads will succeed.
        {
            let r = k.read().expect("reader");
            assert_eq!(sk.get(&r, "foo").expect("read"), Some(Value::I64(1234)));
            assert_eq!(sk.get(&r, "bar").expect("read"), Some(Value::Bool(true)));
        }

        {
            let mut writer = k.write().expect("writer");
            sk.delete(&mut writer, "foo").expect("deleted");
            sk.delete(&mut writer, "bar").expect("deleted");
            assert_eq!(sk.get(&writer, "foo").expect("read"), None);

            // Deleting something that isn't there is an error.
            match sk.delete(&mut writer, "foo") {
                Err(StoreError::KeyValuePairNotFound) => (),
                other => panic!("unexpected {:?}", other),
            }

            // Isolation. Reads still return values.
            let r = k.read().expect("reader");
            assert_eq!(sk.get(&r, "foo").expect("read"), Some(Value::I64(1234)));
        }

        // Dropped: tx rollback. Reads will still return values.
        {
            let r = k.read().expect("reader");
            assert_eq!(sk.get(&r, "foo").expect("read"), Some(Value::I64(1234)));
        }
    }

    #[test]
    fn test_isolation() {
        let root = Builder::new().prefix("test_isolation").tempdir().expect("tempdir");
        fs::create_dir_all(root.path()).expect("dir created");
        let k = Tkv::new(root.path()).expect("new succeeded");
        let s: ValueDatabase = k.open_database(Some("s"), StoreOptions::create()).expect("opened");

        {
            let mut writer = k.write().expect("writer");
            s.put(&mut writer, "foo", &Value::I64(1234), WriteFlags::empty()).expect("wrote");
            writer.commit().expect("committed");
        }

        // Establish a long-lived reader that outlasts a writer.
        let mut reader = k.read().expect("reader");
        assert_eq!(s.get(&reader, "foo").expect("read"), Some(Value::I64(1234)));

        let mut writer = k.write().expect("writer");
        s.put(&mut writer, "foo", &Value::I64(999), WriteFlags::empty()).expect("wrote");

        // The reader and writer are isolated.
        assert_eq!(s.get(&reader, "foo").expect("read"), Some(Value::I64(1234)));
        assert_eq!(s.get(&writer, "foo").expect("read"), Some(Value::I64(999)));

        // If we commit the writer, we still have isolation.
        writer.commit().expect("committed");
        assert_eq!(s.get(&reader, "foo").expect("read"), Some(Value::I64(1234)));

        // Resetting gives up the snapshot; reads fail until the reader is renewed.
        reader.reset();
        assert!(s.get(&reader, "foo").is_err());

        // A renewed reader sees the committed value.
        reader.renew().expect("renewed");
        assert_eq!(s.get(&reader, "foo").expect("read"), Some(Value::I64(999)));
    }

    #[test]
    fn test_nested_writers() {
        let root = Builder::new().prefix("test_nested_writers").tempdir().expect("tempdir");
        fs::create_dir_all(root.path()).expect("dir created");
        let k = Tkv::new(root.path()).expect("new succeeded");
        let s: ValueDatabase = k.open_database(Some("s"), StoreOptions::create()).expect("opened");

        let mut writer = k.write().expect("writer");
        s.put(&mut writer, "outer", &Value::U64(1), WriteFlags::empty()).expect("wrote");

        {
            let mut child = writer.begin_nested().expect("child");
            s.put(&mut child, "aborted", &Value::U64(2), WriteFlags::empty()).expect("wrote");
            assert_eq!(s.get(&child, "outer").expect("read"), Some(Value::U64(1)));
            child.abort();
        }
        assert_eq!(s.get(&writer, "aborted").expect("read"), None);

        {
            let mut child = writer.begin_nested().expect("child");
            s.put(&mut child, "committed", &Value::U64(3), WriteFlags::empty()).expect("wrote");
            child.commit().expect("committed");
        }
        assert_eq!(s.get(&writer, "committed").expect("read"), Some(Value::U64(3)));
        writer.commit().expect("committed");

        let reader = k.read().expect("reader");
        assert_eq!(s.get(&reader, "outer").expect("read"), Some(Value::U64(1)));
        assert_eq!(s.get(&reader, "committed").expect("read"), Some(Value::U64(3)));
        assert_eq!(s.get(&reader, "aborted").expect("read"), None);
    }
}
