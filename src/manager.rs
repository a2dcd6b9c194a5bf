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
    collections::{
        btree_map::Entry,
        BTreeMap,
    },
    io,
    os::raw::c_uint,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Arc,
        RwLock,
    },
};

use lazy_static::lazy_static;

use crate::{
    env::Tkv,
    error::StoreError,
};

type SharedTkv = Arc<RwLock<Tkv>>;

lazy_static! {
    static ref MANAGER: RwLock<Manager> = RwLock::new(Manager::new());
}

/// A process is only permitted to have one open handle to each environment. This
/// manager exists to enforce that constraint: don't open environments directly.
pub struct Manager {
    environments: BTreeMap<PathBuf, SharedTkv>,
}

impl Manager {
    fn new() -> Manager {
        Manager {
            environments: Default::default(),
        }
    }

    pub fn singleton() -> &'static RwLock<Manager> {
        &*MANAGER
    }

    /// Return the open environment at `path`, returning `None` if it has not already been opened.
    pub fn get<'p, P>(&self, path: P) -> Result<Option<SharedTkv>, StoreError>
    where
        P: Into<&'p Path>,
    {
        let canonical = canonicalize(path.into())?;
        Ok(self.environments.get(&canonical).cloned())
    }

    /// Return the open environment at `path`, or create it by calling `f`.
    pub fn get_or_create<'p, F, P>(&mut self, path: P, f: F) -> Result<SharedTkv, StoreError>
    where
        F: FnOnce(&Path) -> Result<Tkv, StoreError>,
        P: Into<&'p Path>,
    {
        let canonical = canonicalize(path.into())?;
        Ok(match self.environments.entry(canonical) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(e) => {
                let k = Arc::new(RwLock::new(f(e.key().as_path())?));
                e.insert(k).clone()
            },
        })
    }

    /// Return the open environment at `path` with capacity `capacity`,
    /// or create it by calling `f`.
    pub fn get_or_create_with_capacity<'p, F, P>(&mut self, path: P, capacity: c_uint, f: F) -> Result<SharedTkv, StoreError>
    where
        F: FnOnce(&Path, c_uint) -> Result<Tkv, StoreError>,
        P: Into<&'p Path>,
    {
        let canonical = canonicalize(path.into())?;
        Ok(match self.environments.entry(canonical) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(e) => {
                let k = Arc::new(RwLock::new(f(e.key().as_path(), capacity)?));
                e.insert(k).clone()
            },
        })
    }

    /// Forgets the environment at `path`. It closes once the last handle to
    /// it is dropped.
    pub fn remove<'p, P>(&mut self, path: P) -> Result<Option<SharedTkv>, StoreError>
    where
        P: Into<&'p Path>,
    {
        let canonical = canonicalize(path.into())?;
        Ok(self.environments.remove(&canonical))
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf, StoreError> {
    path.canonicalize().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => StoreError::DirectoryDoesNotExistError(path.into()),
        _ => StoreError::IoError(e),
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::Builder;

    use super::*;

    /// Test that the manager will return the same Tkv instance each time for each path.
    #[test]
    fn test_same() {
        let root = Builder::new().prefix("test_same").tempdir().expect("tempdir");
        fs::create_dir_all(root.path()).expect("dir created");

        let mut manager = Manager::new();

        let p = root.path();
        assert!(manager.get(p).expect("success").is_none());

        let created_arc = manager.get_or_create(p, Tkv::new).expect("created");
        let fetched_arc = manager.get(p).expect("success").expect("existed");
        assert!(Arc::ptr_eq(&created_arc, &fetched_arc));
    }

    /// Test that the manager will return the same Tkv instance each time for each path.
    #[test]
    fn test_same_with_capacity() {
        let root = Builder::new().prefix("test_same_with_capacity").tempdir().expect("tempdir");
        fs::create_dir_all(root.path()).expect("dir created");

        let mut manager = Manager::new();

        let p = root.path();
        assert!(manager.get(p).expect("success").is_none());

        let created_arc = manager.get_or_create_with_capacity(p, 10, Tkv::with_capacity).expect("created");
        let fetched_arc = manager.get(p).expect("success").expect("existed");
        assert!(Arc::ptr_eq(&created_arc, &fetched_arc));

        let removed = manager.remove(p).expect("success").expect("existed");
        assert!(Arc::ptr_eq(&created_arc, &removed));
        assert!(manager.get(p).expect("success").is_none());
    }

    #[test]
    fn test_missing_directory() {
        let root = Builder::new().prefix("test_missing_directory").tempdir().expect("tempdir");
        let nope = root.path().join("nope");
        let manager = Manager::new();
        match manager.get(nope.as_path()) {
            Err(StoreError::DirectoryDoesNotExistError(p)) => assert_eq!(p, nope),
            other => panic!("unexpected {:?}", other.map(|o| o.is_some())),
        }
    }
}
