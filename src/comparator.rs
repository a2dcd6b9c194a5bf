// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Native ordering for stored types.
//!
//! A `Comparable` type supplies a three-way comparison over two encoded
//! values. `compare_raw::<T>` wraps it in the C signature LMDB expects, and is
//! installed as a database's key or duplicate-value comparator when the
//! database is opened. It runs inside the engine's page search and sort code,
//! so it must not allocate, panic, or touch anything but the two buffers.

use std::{
    cmp::Ordering,
    os::raw::c_int,
};

use byteorder::{
    ByteOrder,
    NativeEndian,
};
use lmdb_sys::MDB_val;
use ordered_float::OrderedFloat;
use paste::paste;
use uuid::Uuid;

use crate::{
    backend::val,
    codec::Codec,
};

pub trait Comparable: Codec + 'static {
    /// Compares two non-empty encoded values.
    fn compare(a: &[u8], b: &[u8]) -> Ordering;
}

/// Orders empty buffers before everything else, then defers to `T`.
pub fn compare_bytes<T: Comparable>(a: &[u8], b: &[u8]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => T::compare(a, b),
    }
}

/// The `MDB_cmp_func` installed for databases ordered by `T`.
pub(crate) unsafe extern "C" fn compare_raw<T: Comparable>(a: *const MDB_val, b: *const MDB_val) -> c_int {
    let a = val::as_slice(&*a);
    let b = val::as_slice(&*b);
    match compare_bytes::<T>(a, b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

impl Comparable for Vec<u8> {
    fn compare(a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

// UTF-8 byte order is code point order.
impl Comparable for String {
    fn compare(a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

impl Comparable for Uuid {
    fn compare(a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

impl Comparable for bool {
    fn compare(a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

impl Comparable for u8 {
    fn compare(a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

impl Comparable for i8 {
    fn compare(a: &[u8], b: &[u8]) -> Ordering {
        match (a, b) {
            ([a], [b]) => (*a as i8).cmp(&(*b as i8)),
            _ => a.cmp(b),
        }
    }
}

// Buffers of the wrong width can only come from a database written with a
// different codec; they fall back to byte order rather than fail.
macro_rules! numeric_comparable {
    ($($t:ident),*) => {$(paste! {
        impl Comparable for $t {
            fn compare(a: &[u8], b: &[u8]) -> Ordering {
                const WIDTH: usize = std::mem::size_of::<$t>();
                if a.len() != WIDTH || b.len() != WIDTH {
                    return a.cmp(b);
                }
                NativeEndian::[<read_ $t>](a).cmp(&NativeEndian::[<read_ $t>](b))
            }
        }
    })*};
}

numeric_comparable!(u16, u32, u64, u128, i16, i32, i64, i128);

macro_rules! float_comparable {
    ($($t:ident),*) => {$(paste! {
        impl Comparable for $t {
            fn compare(a: &[u8], b: &[u8]) -> Ordering {
                const WIDTH: usize = std::mem::size_of::<$t>();
                if a.len() != WIDTH || b.len() != WIDTH {
                    return a.cmp(b);
                }
                OrderedFloat(NativeEndian::[<read_ $t>](a)).cmp(&OrderedFloat(NativeEndian::[<read_ $t>](b)))
            }
        }
    })*};
}

float_comparable!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp_values<T: Comparable + Copy>(a: T, b: T) -> Ordering
    where
        T: crate::codec::Accessible,
    {
        a.with_bytes(|a| b.with_bytes(|b| compare_bytes::<T>(a, b)).expect("encoded")).expect("encoded")
    }

    #[test]
    fn test_numeric_order_ignores_byte_order() {
        // 256 encodes as [0, 1, ...] on little-endian machines, which sorts
        // before 1's encoding bytewise.
        assert_eq!(cmp_values(1u32, 256u32), Ordering::Less);
        assert_eq!(cmp_values(700u32, 5u32), Ordering::Greater);
        assert_eq!(cmp_values(-1i64, 1i64), Ordering::Less);
        assert_eq!(cmp_values(-3i8, 2i8), Ordering::Less);
        assert_eq!(cmp_values(42u64, 42u64), Ordering::Equal);
    }

    #[test]
    fn test_float_total_order() {
        assert_eq!(cmp_values(-0.5f64, 0.25f64), Ordering::Less);
        assert_eq!(cmp_values(f64::NAN, f64::INFINITY), Ordering::Greater);
        assert_eq!(cmp_values(1.0f32, 1.0f32), Ordering::Equal);
    }

    #[test]
    fn test_empty_buffers() {
        assert_eq!(compare_bytes::<u32>(&[], &[]), Ordering::Equal);
        assert_eq!(compare_bytes::<u32>(&[], &[1, 0, 0, 0]), Ordering::Less);
        assert_eq!(compare_bytes::<String>(b"a", &[]), Ordering::Greater);
    }

    #[test]
    fn test_wrong_width_falls_back() {
        assert_eq!(compare_bytes::<u32>(&[1], &[2]), Ordering::Less);
        assert_eq!(compare_bytes::<u64>(&[1, 2, 3], &[1, 2]), Ordering::Greater);
    }

    #[test]
    fn test_raw_trampoline() {
        let a = 5u32.to_ne_bytes();
        let b = 700u32.to_ne_bytes();
        let (va, vb) = (val::from_slice(&a), val::from_slice(&b));
        let empty = val::unset();
        unsafe {
            assert_eq!(compare_raw::<u32>(&va, &vb), -1);
            assert_eq!(compare_raw::<u32>(&vb, &va), 1);
            assert_eq!(compare_raw::<u32>(&va, &va), 0);
            assert_eq!(compare_raw::<u32>(&empty, &va), -1);
            assert_eq!(compare_raw::<u32>(&empty, &empty), 0);
        }
    }

    #[test]
    fn test_strings_by_code_point() {
        assert_eq!(compare_bytes::<String>("apple".as_bytes(), "banana".as_bytes()), Ordering::Less);
        assert_eq!(compare_bytes::<String>("z".as_bytes(), "é".as_bytes()), Ordering::Less);
    }
}
