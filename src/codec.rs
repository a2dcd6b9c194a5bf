// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Conversions between application types and the bytes stored in LMDB.
//!
//! Encoding and decoding are separate capabilities. `Accessible` lends out a
//! type's byte representation for the duration of a closure, so types that
//! already own contiguous storage are written without any intermediate
//! buffer. `Decodable` rebuilds an owned value from bytes that are only valid
//! inside the engine call that produced them; it reports bytes it can't make
//! sense of with `None` rather than an error, leaving the caller to decide
//! what a malformed entry means.
//!
//! Fixed-width numbers are stored in native byte order and are only portable
//! between machines of the same endianness, as with LMDB's own
//! `INTEGER_KEY` databases.

use byteorder::{
    ByteOrder,
    NativeEndian,
};
use paste::paste;
use uuid::Uuid;

use crate::error::DataError;

/// Something that can hand out the bytes it is stored as.
pub trait Accessible {
    /// Calls `f` with a view of the encoded bytes. The view must not be kept
    /// past the call.
    fn with_bytes<R, F>(&self, f: F) -> Result<R, DataError>
    where
        F: FnOnce(&[u8]) -> R;

    /// The exact encoded length, for types that can encode straight into a
    /// buffer the engine allocates. `None` means the borrowed bytes from
    /// `with_bytes` are written as they are.
    fn reserve_len(&self) -> Result<Option<usize>, DataError> {
        Ok(None)
    }

    /// Encodes into `buf`, which is exactly `reserve_len()` bytes long.
    fn encode_into(&self, buf: &mut [u8]) -> Result<(), DataError> {
        self.with_bytes(|bytes| {
            if bytes.len() != buf.len() {
                return Err(DataError::ReserveSizeMismatch {
                    reserved: buf.len(),
                    needed: bytes.len(),
                });
            }
            buf.copy_from_slice(bytes);
            Ok(())
        })?
    }
}

/// Something that can be rebuilt from stored bytes.
pub trait Decodable: Sized {
    fn decode(bytes: &[u8]) -> Option<Self>;
}

/// An owned type and the borrowed form it is written from.
///
/// `String` is written from `str` and `Vec<u8>` from `[u8]`, so callers never
/// have to allocate an owned key just to look it up.
pub trait Codec: Decodable {
    type View: Accessible + ?Sized;
}

/// Types whose encoding always has the same length. Required for the values of
/// `DupFixed` databases, whose bulk operations work on owned values directly.
pub trait FixedWidth: Codec + Accessible {
    const WIDTH: usize;
}

pub(crate) fn decode<T: Decodable>(bytes: &[u8]) -> Result<T, DataError> {
    T::decode(bytes).ok_or(DataError::Undecodable {
        type_name: std::any::type_name::<T>(),
        len: bytes.len(),
    })
}

/// Splits a bulk buffer of fixed-width values and decodes each one.
pub(crate) fn decode_fixed<T: FixedWidth>(bytes: &[u8]) -> Result<Vec<T>, DataError> {
    if T::WIDTH == 0 || bytes.len() % T::WIDTH != 0 {
        return Err(DataError::WidthMismatch {
            width: T::WIDTH,
            len: bytes.len(),
        });
    }
    bytes.chunks_exact(T::WIDTH).map(decode).collect()
}

impl Accessible for [u8] {
    fn with_bytes<R, F>(&self, f: F) -> Result<R, DataError>
    where
        F: FnOnce(&[u8]) -> R,
    {
        Ok(f(self))
    }
}

impl Accessible for Vec<u8> {
    fn with_bytes<R, F>(&self, f: F) -> Result<R, DataError>
    where
        F: FnOnce(&[u8]) -> R,
    {
        Ok(f(self))
    }
}

impl Decodable for Vec<u8> {
    fn decode(bytes: &[u8]) -> Option<Self> {
        Some(bytes.to_vec())
    }
}

impl Codec for Vec<u8> {
    type View = [u8];
}

impl Accessible for str {
    fn with_bytes<R, F>(&self, f: F) -> Result<R, DataError>
    where
        F: FnOnce(&[u8]) -> R,
    {
        Ok(f(self.as_bytes()))
    }
}

impl Accessible for String {
    fn with_bytes<R, F>(&self, f: F) -> Result<R, DataError>
    where
        F: FnOnce(&[u8]) -> R,
    {
        Ok(f(self.as_bytes()))
    }
}

impl Decodable for String {
    fn decode(bytes: &[u8]) -> Option<Self> {
        std::str::from_utf8(bytes).ok().map(String::from)
    }
}

impl Codec for String {
    type View = str;
}

impl Accessible for bool {
    fn with_bytes<R, F>(&self, f: F) -> Result<R, DataError>
    where
        F: FnOnce(&[u8]) -> R,
    {
        Ok(f(&[*self as u8]))
    }
}

impl Decodable for bool {
    fn decode(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0] => Some(false),
            [1] => Some(true),
            _ => None,
        }
    }
}

impl Codec for bool {
    type View = bool;
}

impl FixedWidth for bool {
    const WIDTH: usize = 1;
}

impl Accessible for Uuid {
    fn with_bytes<R, F>(&self, f: F) -> Result<R, DataError>
    where
        F: FnOnce(&[u8]) -> R,
    {
        Ok(f(self.as_bytes()))
    }
}

impl Decodable for Uuid {
    fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() == 16 {
            Some(Uuid::from_bytes(*array_ref![bytes, 0, 16]))
        } else {
            None
        }
    }
}

impl Codec for Uuid {
    type View = Uuid;
}

impl FixedWidth for Uuid {
    const WIDTH: usize = 16;
}

// Single bytes have no byte order.
macro_rules! byte_codec {
    ($($t:ident),*) => {$(
        impl Accessible for $t {
            fn with_bytes<R, F>(&self, f: F) -> Result<R, DataError>
            where
                F: FnOnce(&[u8]) -> R,
            {
                Ok(f(&self.to_ne_bytes()))
            }
        }

        impl Decodable for $t {
            fn decode(bytes: &[u8]) -> Option<Self> {
                match bytes {
                    [b] => Some(<$t>::from_ne_bytes([*b])),
                    _ => None,
                }
            }
        }

        impl Codec for $t {
            type View = $t;
        }

        impl FixedWidth for $t {
            const WIDTH: usize = 1;
        }
    )*};
}

macro_rules! native_codec {
    ($($t:ident),*) => {$(paste! {
        impl Accessible for $t {
            fn with_bytes<R, F>(&self, f: F) -> Result<R, DataError>
            where
                F: FnOnce(&[u8]) -> R,
            {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                NativeEndian::[<write_ $t>](&mut buf, *self);
                Ok(f(&buf))
            }
        }

        impl Decodable for $t {
            fn decode(bytes: &[u8]) -> Option<Self> {
                if bytes.len() == std::mem::size_of::<$t>() {
                    Some(NativeEndian::[<read_ $t>](bytes))
                } else {
                    None
                }
            }
        }

        impl Codec for $t {
            type View = $t;
        }

        impl FixedWidth for $t {
            const WIDTH: usize = std::mem::size_of::<$t>();
        }
    })*};
}

byte_codec!(u8, i8);
native_codec!(u16, u32, u64, u128, i16, i32, i64, i128, f32, f64);
