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
    cmp::Ordering,
    fs,
};

use tempfile::Builder;
use tkv::{
    Database,
    DupFixed,
    DupSort,
    StoreError,
    StoreOptions,
    Tkv,
    WriteFlags,
};

fn letters(env: &Tkv) -> Database<u32, String, DupSort> {
    let db = env.open_database(Some("letters"), StoreOptions::create()).expect("opened");
    let mut writer = env.write().expect("writer");
    for (k, v) in &[(1, "b"), (1, "a"), (1, "c"), (2, "x"), (3, "y")] {
        db.put(&mut writer, k, *v, WriteFlags::empty()).expect("wrote");
    }
    writer.commit().expect("committed");
    db
}

#[test]
fn test_dup_values() {
    let root = Builder::new().prefix("test_dup_values").tempdir().expect("tempdir");
    fs::create_dir_all(root.path()).expect("dir created");
    let env = Tkv::new(root.path()).expect("new succeeded");
    let db = letters(&env);

    let reader = env.read().expect("reader");
    assert_eq!(db.get(&reader, &1).expect("read").as_deref(), Some("a"));
    assert_eq!(db.get_all(&reader, &1).expect("read"), vec!["a", "b", "c"]);
    assert_eq!(db.get_all(&reader, &2).expect("read"), vec!["x"]);
    assert!(db.get_all(&reader, &9).expect("read").is_empty());
    assert_eq!(db.stat(&reader).expect("stat").entries, 5);

    assert!(db.contains_pair(&reader, &1, "b").expect("read"));
    assert!(!db.contains_pair(&reader, &1, "z").expect("read"));
    assert!(!db.contains_pair(&reader, &9, "a").expect("read"));

    let pairs: Vec<(u32, String)> = db.iter_start(&reader).expect("iter").collect::<Result<_, _>>().expect("pairs");
    let flat: Vec<(u32, &str)> = pairs.iter().map(|(k, v)| (*k, v.as_str())).collect();
    assert_eq!(flat, vec![(1, "a"), (1, "b"), (1, "c"), (2, "x"), (3, "y")]);
}

#[test]
fn test_dup_cursor() {
    let root = Builder::new().prefix("test_dup_cursor").tempdir().expect("tempdir");
    fs::create_dir_all(root.path()).expect("dir created");
    let env = Tkv::new(root.path()).expect("new succeeded");
    let db = letters(&env);

    let reader = env.read().expect("reader");
    let mut cursor = db.cursor(&reader).expect("cursor");

    assert_eq!(cursor.set_key(&1).expect("set_key"), Some((1, "a".to_string())));
    assert_eq!(cursor.dup_count().expect("count"), 3);
    assert_eq!(cursor.next_dup().expect("next_dup"), Some((1, "b".to_string())));
    assert_eq!(cursor.next_dup().expect("next_dup"), Some((1, "c".to_string())));
    assert_eq!(cursor.next_dup().expect("next_dup"), None);

    assert!(cursor.set_key(&1).expect("set_key").is_some());
    assert_eq!(cursor.last_dup().expect("last_dup").as_deref(), Some("c"));
    assert_eq!(cursor.prev_dup().expect("prev_dup"), Some((1, "b".to_string())));
    assert_eq!(cursor.first_dup().expect("first_dup").as_deref(), Some("a"));
    assert_eq!(cursor.prev_dup().expect("prev_dup"), None);

    assert!(cursor.set_key(&1).expect("set_key").is_some());
    assert_eq!(cursor.next_no_dup().expect("next_no_dup"), Some((2, "x".to_string())));
    assert_eq!(cursor.dup_count().expect("count"), 1);
    assert_eq!(cursor.prev_no_dup().expect("prev_no_dup"), Some((1, "c".to_string())));

    assert!(cursor.get_both(&1, "b").expect("get_both"));
    assert_eq!(cursor.get_current().expect("current"), Some((1, "b".to_string())));
    assert!(!cursor.get_both(&1, "bb").expect("get_both"));
    assert_eq!(cursor.get_both_range(&1, "bb").expect("get_both_range").as_deref(), Some("c"));
    assert_eq!(cursor.get_both_range(&1, "d").expect("get_both_range"), None);

    assert_eq!(cursor.compare_values("a", "b").expect("compared"), Ordering::Less);
    assert_eq!(cursor.compare_keys(&3, &2).expect("compared"), Ordering::Greater);
}

#[test]
fn test_dup_iter() {
    let root = Builder::new().prefix("test_dup_iter").tempdir().expect("tempdir");
    fs::create_dir_all(root.path()).expect("dir created");
    let env = Tkv::new(root.path()).expect("new succeeded");
    let db = letters(&env);

    let reader = env.read().expect("reader");
    let values: Vec<String> = db.iter_dup_of(&reader, &1).expect("iter").collect::<Result<_, _>>().expect("values");
    assert_eq!(values, vec!["a", "b", "c"]);
    assert_eq!(db.iter_dup_of(&reader, &3).expect("iter").count(), 1);
    assert_eq!(db.iter_dup_of(&reader, &4).expect("iter").count(), 0);

    let reversed: Vec<(u32, String)> = db.iter_end(&reader).expect("iter").collect::<Result<_, _>>().expect("pairs");
    assert_eq!(reversed.first(), Some(&(3, "y".to_string())));
    assert_eq!(reversed.last(), Some(&(1, "a".to_string())));
    assert_eq!(reversed.len(), 5);
}

#[test]
fn test_dup_deletes() {
    let root = Builder::new().prefix("test_dup_deletes").tempdir().expect("tempdir");
    fs::create_dir_all(root.path()).expect("dir created");
    let env = Tkv::new(root.path()).expect("new succeeded");
    let db = letters(&env);

    let mut writer = env.write().expect("writer");
    db.delete_value(&mut writer, &1, "b").expect("deleted");
    match db.delete_value(&mut writer, &1, "b") {
        Err(StoreError::KeyValuePairNotFound) => (),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(db.get_all(&writer, &1).expect("read"), vec!["a", "c"]);

    match db.put(&mut writer, &1, "a", WriteFlags::NO_DUP_DATA) {
        Err(StoreError::KeyExists) => (),
        other => panic!("unexpected {:?}", other),
    }

    {
        let mut cursor = db.cursor_mut(&mut writer).expect("cursor");
        assert!(cursor.set_key(&1).expect("set_key").is_some());
        cursor.delete_current().expect("deleted");
        assert_eq!(cursor.get_current().expect("current"), Some((1, "c".to_string())));

        assert!(cursor.set_key(&2).expect("set_key").is_some());
        cursor.put(&2, "w", WriteFlags::empty()).expect("wrote");
        assert_eq!(cursor.dup_count().expect("count"), 2);
        cursor.delete_current_dups().expect("deleted");
    }
    assert!(!db.contains(&writer, &2).expect("read"));

    db.delete(&mut writer, &1).expect("deleted");
    writer.commit().expect("committed");

    let reader = env.read().expect("reader");
    let keys: Vec<u32> = db.iter_start(&reader).expect("iter").map(|r| r.expect("pair").0).collect();
    assert_eq!(keys, vec![3]);
}

#[test]
fn test_dup_value_order() {
    let root = Builder::new().prefix("test_dup_value_order").tempdir().expect("tempdir");
    fs::create_dir_all(root.path()).expect("dir created");
    let env = Tkv::new(root.path()).expect("new succeeded");
    let db: Database<u32, u64, DupSort> = env.open_database(Some("order"), StoreOptions::create()).expect("opened");

    let mut writer = env.write().expect("writer");
    for v in &[256u64, 1, 65536, 2] {
        db.put(&mut writer, &7, v, WriteFlags::empty()).expect("wrote");
    }
    writer.commit().expect("committed");

    let reader = env.read().expect("reader");
    assert_eq!(db.get_all(&reader, &7).expect("read"), vec![1, 2, 256, 65536]);
    let cursor = db.cursor(&reader).expect("cursor");
    assert_eq!(cursor.compare_values(&2, &256).expect("compared"), Ordering::Less);
}

#[test]
fn test_dup_fixed() {
    let root = Builder::new().prefix("test_dup_fixed").tempdir().expect("tempdir");
    fs::create_dir_all(root.path()).expect("dir created");
    let env = Tkv::new(root.path()).expect("new succeeded");
    let db: Database<u32, u32, DupFixed> = env.open_database(Some("fixed"), StoreOptions::create()).expect("opened");

    let mut writer = env.write().expect("writer");
    {
        let mut cursor = db.cursor_mut(&mut writer).expect("cursor");
        assert_eq!(cursor.put_multiple(&1, &[10, 20, 30], WriteFlags::empty()).expect("wrote"), 3);
        assert_eq!(cursor.put_multiple(&5, &[], WriteFlags::empty()).expect("wrote"), 0);
    }
    db.put(&mut writer, &2, &40, WriteFlags::empty()).expect("wrote");
    writer.commit().expect("committed");

    let reader = env.read().expect("reader");
    let mut cursor = db.cursor(&reader).expect("cursor");

    assert_eq!(cursor.set_key(&1).expect("set_key"), Some((1, 10)));
    assert_eq!(cursor.next_dup().expect("next_dup"), Some((1, 20)));
    assert_eq!(cursor.next_dup().expect("next_dup"), Some((1, 30)));
    assert_eq!(cursor.next_dup().expect("next_dup"), None);

    assert!(cursor.set_key(&1).expect("set_key").is_some());
    assert_eq!(cursor.get_multiple().expect("get_multiple"), Some(vec![10, 20, 30]));
    assert_eq!(cursor.get_current().expect("current"), Some((1, 30)));
    assert_eq!(cursor.next_multiple().expect("next_multiple"), None);

    // A lone value has no duplicate page.
    assert!(cursor.set_key(&2).expect("set_key").is_some());
    assert_eq!(cursor.get_multiple().expect("get_multiple"), Some(vec![40]));

    assert!(!db.contains(&reader, &5).expect("read"));
    assert_eq!(db.get_all(&reader, &1).expect("read"), vec![10, 20, 30]);
}

#[test]
fn test_dup_fixed_single_puts() {
    let root = Builder::new().prefix("test_dup_fixed_single_puts").tempdir().expect("tempdir");
    fs::create_dir_all(root.path()).expect("dir created");
    let env = Tkv::new(root.path()).expect("new succeeded");
    let db: Database<u32, u32, DupFixed> = env.open_database(Some("fixed"), StoreOptions::create()).expect("opened");

    let mut writer = env.write().expect("writer");
    db.put(&mut writer, &1, &10, WriteFlags::empty()).expect("wrote");
    db.put(&mut writer, &1, &20, WriteFlags::empty()).expect("wrote");
    db.put(&mut writer, &1, &30, WriteFlags::empty()).expect("wrote");
    writer.commit().expect("committed");

    let reader = env.read().expect("reader");
    let mut cursor = db.cursor(&reader).expect("cursor");
    assert_eq!(cursor.set_key(&1).expect("set_key"), Some((1, 10)));
    assert_eq!(cursor.next_dup().expect("next_dup"), Some((1, 20)));
    assert_eq!(cursor.next_dup().expect("next_dup"), Some((1, 30)));
    assert_eq!(cursor.next_dup().expect("next_dup"), None);
}

#[test]
fn test_dup_fixed_bulk_pages() {
    let root = Builder::new().prefix("test_dup_fixed_bulk_pages").tempdir().expect("tempdir");
    fs::create_dir_all(root.path()).expect("dir created");
    let env = Tkv::new(root.path()).expect("new succeeded");
    let db: Database<u32, u64, DupFixed> = env.open_database(Some("bulk"), StoreOptions::create()).expect("opened");

    // Enough values to spill over several duplicate pages.
    let values: Vec<u64> = (0..5000).collect();
    let mut writer = env.write().expect("writer");
    {
        let mut cursor = db.cursor_mut(&mut writer).expect("cursor");
        assert_eq!(cursor.put_multiple(&1, &values, WriteFlags::empty()).expect("wrote"), values.len());
    }
    db.put(&mut writer, &2, &0, WriteFlags::empty()).expect("wrote");
    writer.commit().expect("committed");

    let reader = env.read().expect("reader");
    let mut cursor = db.cursor(&reader).expect("cursor");
    assert!(cursor.set_key(&1).expect("set_key").is_some());
    assert_eq!(cursor.dup_count().expect("count"), values.len());

    let mut fetched = cursor.get_multiple().expect("get_multiple").expect("first page");
    while let Some((key, page)) = cursor.next_multiple().expect("next_multiple") {
        assert_eq!(key, 1);
        fetched.extend(page);
    }
    assert_eq!(fetched, values);
}
