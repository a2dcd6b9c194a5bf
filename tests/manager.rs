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
    fs,
    sync::Arc,
};

use tempfile::Builder;
use tkv::{
    Database,
    Manager,
    StoreOptions,
    Strict,
    Tkv,
    WriteFlags,
};

#[test]
// Identical to the same-named unit test, but this one confirms that it works
// via public Manager APIs.
fn test_same() {
    let root = Builder::new().prefix("test_same").tempdir().expect("tempdir");
    fs::create_dir_all(root.path()).expect("dir created");

    let p = root.path();
    let mut manager = Manager::singleton().write().expect("lock");
    assert!(manager.get(p).expect("success").is_none());

    let created_arc = manager.get_or_create(p, Tkv::new).expect("created");
    let fetched_arc = manager.get(p).expect("success").expect("existed");
    assert!(Arc::ptr_eq(&created_arc, &fetched_arc));

    manager.remove(p).expect("success");
}

#[test]
fn test_shared_handle_sees_writes() {
    let root = Builder::new().prefix("test_shared_handle").tempdir().expect("tempdir");
    fs::create_dir_all(root.path()).expect("dir created");
    let p = root.path();

    let first = Manager::singleton().write().expect("lock").get_or_create(p, Tkv::new).expect("created");
    {
        let env = first.read().expect("env");
        let db: Database<u32, String, Strict> = env.open_database(Some("s"), StoreOptions::create()).expect("opened");
        let mut writer = env.write().expect("writer");
        db.put(&mut writer, &1, "one", WriteFlags::empty()).expect("wrote");
        writer.commit().expect("committed");
    }

    let second = Manager::singleton().read().expect("lock").get(p).expect("success").expect("existed");
    let env = second.read().expect("env");
    let db: Database<u32, String, Strict> = env.open_database(Some("s"), StoreOptions::default()).expect("opened");
    let reader = env.read().expect("reader");
    assert_eq!(db.get(&reader, &1).expect("read").as_deref(), Some("one"));
    drop(reader);
    drop(env);

    Manager::singleton().write().expect("lock").remove(p).expect("success");
}
