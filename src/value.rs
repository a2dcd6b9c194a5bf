// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::fmt;

use bincode::{
    deserialize,
    serialize,
    serialize_into,
    serialized_size,
};
use ordered_float::OrderedFloat;
use serde::{
    de::DeserializeOwned,
    Serialize,
};
use uuid::Uuid;

use crate::{
    codec::{
        Accessible,
        Codec,
        Decodable,
    },
    error::DataError,
};

/// We define a set of types, associated with simple integers, to annotate values
/// stored in LMDB. This is to avoid an accidental 'cast' from a value of one type
/// to another. For this reason we don't simply use `deserialize` from the `bincode`
/// crate.
#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Type {
    Bool = 1,
    U64 = 2,
    I64 = 3,
    F64 = 4,
    Instant = 5, // Millisecond-precision timestamp.
    Uuid = 6,
    Str = 7,
    Json = 8,
    Blob = 9,
}

/// We use manual tagging, because <https://github.com/serde-rs/serde/issues/610>.
impl Type {
    pub fn from_tag(tag: u8) -> Result<Type, DataError> {
        Type::from_primitive(tag).ok_or(DataError::UnknownType(tag))
    }

    #[allow(clippy::wrong_self_convention)]
    pub fn to_tag(self) -> u8 {
        self as u8
    }

    fn from_primitive(p: u8) -> Option<Type> {
        match p {
            1 => Some(Type::Bool),
            2 => Some(Type::U64),
            3 => Some(Type::I64),
            4 => Some(Type::F64),
            5 => Some(Type::Instant),
            6 => Some(Type::Uuid),
            7 => Some(Type::Str),
            8 => Some(Type::Json),
            9 => Some(Type::Blob),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Type::Bool => "bool",
            Type::U64 => "u64",
            Type::I64 => "i64",
            Type::F64 => "f64",
            Type::Instant => "instant",
            Type::Uuid => "uuid",
            Type::Str => "str",
            Type::Json => "json",
            Type::Blob => "blob",
        })
    }
}

/// A self-describing stored value. Each encoding starts with the `Type` tag, so
/// a database can hold values of mixed types and reading one back as the wrong
/// type is an error instead of a silent reinterpretation.
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum Value {
    Bool(bool),
    U64(u64),
    I64(i64),
    F64(OrderedFloat<f64>),
    Instant(i64), // Millisecond-precision timestamp.
    Uuid(Uuid),
    Str(String),
    Json(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn value_type(&self) -> Type {
        match self {
            Value::Bool(_) => Type::Bool,
            Value::U64(_) => Type::U64,
            Value::I64(_) => Type::I64,
            Value::F64(_) => Type::F64,
            Value::Instant(_) => Type::Instant,
            Value::Uuid(_) => Type::Uuid,
            Value::Str(_) => Type::Str,
            Value::Json(_) => Type::Json,
            Value::Blob(_) => Type::Blob,
        }
    }

    /// Decodes a tagged slice, insisting that the tag is `expected`.
    pub fn expected_from_tagged_slice(expected: Type, slice: &[u8]) -> Result<Value, DataError> {
        let (tag, data) = slice.split_first().ok_or(DataError::Empty)?;
        let t = Type::from_tag(*tag)?;
        if t != expected {
            return Err(DataError::UnexpectedType {
                expected,
                actual: t,
            });
        }
        Value::from_type_and_data(t, data)
    }

    pub fn from_tagged_slice(slice: &[u8]) -> Result<Value, DataError> {
        let (tag, data) = slice.split_first().ok_or(DataError::Empty)?;
        let t = Type::from_tag(*tag)?;
        Value::from_type_and_data(t, data)
    }

    fn from_type_and_data(t: Type, data: &[u8]) -> Result<Value, DataError> {
        if t == Type::Uuid {
            return deserialize::<Vec<u8>>(data)
                .map_err(|e| DataError::DecodingError {
                    value_type: t,
                    err: e,
                })
                .and_then(|bytes| uuid(&bytes));
        }

        match t {
            Type::Bool => deserialize(data).map(Value::Bool),
            Type::U64 => deserialize(data).map(Value::U64),
            Type::I64 => deserialize(data).map(Value::I64),
            Type::F64 => deserialize(data).map(OrderedFloat).map(Value::F64),
            Type::Instant => deserialize(data).map(Value::Instant),
            Type::Str => deserialize(data).map(Value::Str),
            Type::Json => deserialize(data).map(Value::Json),
            Type::Blob => deserialize(data).map(Value::Blob),
            Type::Uuid => {
                // Processed above to avoid verbose duplication of error transforms.
                unreachable!()
            },
        }
        .map_err(|e| DataError::DecodingError {
            value_type: t,
            err: e,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DataError> {
        let mut bytes = vec![0u8; self.encoded_len()?];
        self.write_tagged(&mut bytes)?;
        Ok(bytes)
    }

    fn encoded_len(&self) -> Result<usize, DataError> {
        let payload = match self {
            Value::Bool(v) => serialized_size(v),
            Value::U64(v) => serialized_size(v),
            Value::I64(v) => serialized_size(v),
            Value::F64(v) => serialized_size(&v.0),
            Value::Instant(v) => serialized_size(v),
            Value::Uuid(v) => serialized_size(&v.as_bytes()[..]),
            Value::Str(v) => serialized_size(v),
            Value::Json(v) => serialized_size(v),
            Value::Blob(v) => serialized_size(v),
        }?;
        Ok(1 + payload as usize)
    }

    fn write_tagged(&self, buf: &mut [u8]) -> Result<(), DataError> {
        let (tag, mut buf) = buf.split_first_mut().ok_or(DataError::Empty)?;
        *tag = self.value_type().to_tag();
        match self {
            Value::Bool(v) => serialize_into(&mut buf, v),
            Value::U64(v) => serialize_into(&mut buf, v),
            Value::I64(v) => serialize_into(&mut buf, v),
            Value::F64(v) => serialize_into(&mut buf, &v.0),
            Value::Instant(v) => serialize_into(&mut buf, v),
            Value::Uuid(v) => serialize_into(&mut buf, &v.as_bytes()[..]),
            Value::Str(v) => serialize_into(&mut buf, v),
            Value::Json(v) => serialize_into(&mut buf, v),
            Value::Blob(v) => serialize_into(&mut buf, v),
        }?;
        Ok(())
    }
}

fn uuid(bytes: &[u8]) -> Result<Value, DataError> {
    if bytes.len() == 16 {
        Ok(Value::Uuid(Uuid::from_bytes(*array_ref![bytes, 0, 16])))
    } else {
        Err(DataError::InvalidUuid)
    }
}

impl Accessible for Value {
    fn with_bytes<R, F>(&self, f: F) -> Result<R, DataError>
    where
        F: FnOnce(&[u8]) -> R,
    {
        self.to_bytes().map(|bytes| f(&bytes))
    }

    fn reserve_len(&self) -> Result<Option<usize>, DataError> {
        self.encoded_len().map(Some)
    }

    fn encode_into(&self, buf: &mut [u8]) -> Result<(), DataError> {
        let needed = self.encoded_len()?;
        if buf.len() != needed {
            return Err(DataError::ReserveSizeMismatch {
                reserved: buf.len(),
                needed,
            });
        }
        self.write_tagged(buf)
    }
}

impl Decodable for Value {
    fn decode(bytes: &[u8]) -> Option<Self> {
        Value::from_tagged_slice(bytes).ok()
    }
}

impl Codec for Value {
    type View = Value;
}

/// Stores any serde type as bincode. Written through the engine's reserve
/// path, so the encoding goes straight into the database page.
#[derive(Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Copy)]
pub struct SerdeBincode<T>(pub T);

impl<T> SerdeBincode<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Serialize> Accessible for SerdeBincode<T> {
    fn with_bytes<R, F>(&self, f: F) -> Result<R, DataError>
    where
        F: FnOnce(&[u8]) -> R,
    {
        let bytes = serialize(&self.0)?;
        Ok(f(&bytes))
    }

    fn reserve_len(&self) -> Result<Option<usize>, DataError> {
        Ok(Some(serialized_size(&self.0)? as usize))
    }

    fn encode_into(&self, mut buf: &mut [u8]) -> Result<(), DataError> {
        let reserved = buf.len();
        serialize_into(&mut buf, &self.0)?;
        if !buf.is_empty() {
            return Err(DataError::ReserveSizeMismatch {
                reserved,
                needed: reserved - buf.len(),
            });
        }
        Ok(())
    }
}

impl<T: DeserializeOwned> Decodable for SerdeBincode<T> {
    fn decode(bytes: &[u8]) -> Option<Self> {
        deserialize(bytes).ok().map(SerdeBincode)
    }
}

impl<T: Serialize + DeserializeOwned> Codec for SerdeBincode<T> {
    type View = SerdeBincode<T>;
}
