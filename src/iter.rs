// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::mem;

use crate::{
    backend::CursorOp,
    codec::{
        decode,
        Codec,
    },
    cursor::{
        decode_pair,
        Cursor,
    },
    error::StoreError,
    store::tier::{
        DuplicateKeyed,
        Tier,
    },
};

enum State {
    /// Not yet positioned. Holds the verb, and the key for `SetRange`.
    Start(CursorOp, Option<Vec<u8>>),
    Continue,
    Done,
}

/// Walks a database in key order, or in reverse. Owns its cursor; once the
/// walk runs off the end, or hits an error, it yields nothing more.
pub struct Iter<'t, K, V, T> {
    cursor: Cursor<'t, K, V, T>,
    state: State,
    step: CursorOp,
}

impl<'t, K, V, T> Iter<'t, K, V, T>
where
    K: Codec,
    V: Codec,
    T: Tier<K, V>,
{
    pub(crate) fn start(cursor: Cursor<'t, K, V, T>) -> Iter<'t, K, V, T> {
        Iter {
            cursor,
            state: State::Start(CursorOp::First, None),
            step: CursorOp::Next,
        }
    }

    pub(crate) fn end(cursor: Cursor<'t, K, V, T>) -> Iter<'t, K, V, T> {
        Iter {
            cursor,
            state: State::Start(CursorOp::Last, None),
            step: CursorOp::Prev,
        }
    }

    pub(crate) fn starting_at(cursor: Cursor<'t, K, V, T>, key: Vec<u8>) -> Iter<'t, K, V, T> {
        Iter {
            cursor,
            state: State::Start(CursorOp::SetRange, Some(key)),
            step: CursorOp::Next,
        }
    }
}

impl<'t, K, V, T> Iterator for Iter<'t, K, V, T>
where
    K: Codec,
    V: Codec,
    T: Tier<K, V>,
{
    type Item = Result<(K, V), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = match mem::replace(&mut self.state, State::Continue) {
            State::Done => {
                self.state = State::Done;
                return None;
            },
            State::Start(op, key) => self.cursor.get_op(key.as_deref(), None, op, decode_pair),
            State::Continue => self.cursor.get_op(None, None, self.step, decode_pair),
        };
        step(&mut self.state, result)
    }
}

/// Walks the values of one key in value order. Owns its cursor.
pub struct DupIter<'t, K, V, T> {
    cursor: Cursor<'t, K, V, T>,
    key: Vec<u8>,
    state: State,
}

impl<'t, K, V, T> DupIter<'t, K, V, T>
where
    K: Codec,
    V: Codec,
    T: Tier<K, V> + DuplicateKeyed,
{
    pub(crate) fn new(cursor: Cursor<'t, K, V, T>, key: Vec<u8>) -> DupIter<'t, K, V, T> {
        DupIter {
            cursor,
            key,
            state: State::Start(CursorOp::SetKey, None),
        }
    }
}

impl<'t, K, V, T> Iterator for DupIter<'t, K, V, T>
where
    K: Codec,
    V: Codec,
    T: Tier<K, V> + DuplicateKeyed,
{
    type Item = Result<V, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = match mem::replace(&mut self.state, State::Continue) {
            State::Done => {
                self.state = State::Done;
                return None;
            },
            State::Start(op, _) => self.cursor.get_op(Some(self.key.as_slice()), None, op, |_, v| decode(v)),
            State::Continue => self.cursor.get_op(None, None, CursorOp::NextDup, |_, v| decode(v)),
        };
        step(&mut self.state, result)
    }
}

fn step<I>(state: &mut State, result: Result<Option<I>, StoreError>) -> Option<Result<I, StoreError>> {
    match result {
        Ok(Some(item)) => Some(Ok(item)),
        Ok(None) => {
            *state = State::Done;
            None
        },
        Err(e) => {
            *state = State::Done;
            Some(Err(e))
        },
    }
}
