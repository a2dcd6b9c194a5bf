// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Prints every key/value pair of a database as hex, one pair per line, in
//! the engine's byte order. Takes the path of the environment, and optionally
//! `-s <name>` to read a named database instead of the unnamed one.

use std::{
    env::args,
    io::{
        self,
        Write,
    },
    path::Path,
};

use tkv::{
    BasicDatabase,
    StoreOptions,
    Tkv,
};

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn main() {
    let mut args = args();
    let mut database = None;
    let mut path = None;

    // The first arg is the name of the program, which we can ignore.
    args.next();

    while let Some(arg) = args.next() {
        if &arg[0..1] == "-" {
            match &arg[1..] {
                "s" => {
                    database = match args.next() {
                        None => panic!("-s must be followed by database name"),
                        Some(str) => Some(str),
                    };
                },
                str => panic!("arg -{} not recognized", str),
            }
        } else {
            if path.is_some() {
                panic!("must provide only one path to the LMDB environment");
            }
            path = Some(arg);
        }
    }

    let path = path.expect("must provide a path to the LMDB environment");
    let mut builder = Tkv::environment_builder();
    builder.set_max_dbs(2);
    let tkv = Tkv::from_builder(Path::new(&path), builder).expect("Tkv");
    let store: BasicDatabase = tkv.open_database(database.as_deref(), StoreOptions::default()).expect("opened");
    let reader = tkv.read().expect("reader");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for pair in store.iter_start(&reader).expect("cursor") {
        let (key, value) = pair.expect("pair");
        writeln!(out, "{} {}", hex(&key), hex(&value)).expect("wrote");
    }
}
