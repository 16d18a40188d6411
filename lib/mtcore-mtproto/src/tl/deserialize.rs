// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use super::serialize::{BOOL_FALSE, BOOL_TRUE, LONG_STRING_MARKER, VECTOR, padding_after};
use std::fmt;

/// Reasons a buffer cannot be read as the requested type.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// The buffer ended in the middle of a value.
    UnexpectedEof,

    /// A boxed value started with a constructor other than the ones its
    /// type allows. Bare values carry no constructor and never fail this way.
    UnexpectedConstructor { id: u32 },
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => f.write_str("buffer ended before the value did"),
            Self::UnexpectedConstructor { id } => write!(f, "constructor {id:08x} not expected here"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
pub type Buffer<'a, 'b> = &'a mut Cursor<'b>;

/// Read position over an in-memory buffer. Reading past the end is the only
/// way it can fail.
#[derive(Debug)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Takes the next `len` bytes without copying.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or(Error::UnexpectedEof)?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        Ok(self.read_slice(1)?[0])
    }

    pub fn read_exact(&mut self, out: &mut [u8]) -> Result<()> {
        out.copy_from_slice(self.read_slice(out.len())?);
        Ok(())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0; N];
        self.read_exact(&mut out)?;
        Ok(out)
    }

    /// Appends everything left to `buf`, returning how many bytes that was.
    pub fn read_to_end(&mut self, buf: &mut Vec<u8>) -> usize {
        let rest = &self.buf[self.pos..];
        buf.extend_from_slice(rest);
        self.pos = self.buf.len();
        rest.len()
    }
}

/// Reading values in the [binary serialization] format.
///
/// [binary serialization]: https://core.telegram.org/mtproto/serialize
pub trait Deserializable {
    fn deserialize(buf: Buffer) -> Result<Self>
    where
        Self: Sized;

    /// Reads a value from the start of `buf`. Trailing bytes are ignored.
    ///
    /// ```
    /// use mtcore_mtproto::tl::Deserializable;
    ///
    /// assert!(!bool::from_bytes(&[0x37, 0x97, 0x79, 0xbc]).unwrap());
    /// assert_eq!(i32::from_bytes(&[0xff, 0xff, 0xff, 0xff]).unwrap(), -1);
    /// ```
    fn from_bytes(buf: &[u8]) -> Result<Self>
    where
        Self: Sized,
    {
        Self::deserialize(&mut Cursor::from_slice(buf))
    }
}

macro_rules! little_endian {
    ($($ty:ty),*) => {$(
        impl Deserializable for $ty {
            fn deserialize(buf: Buffer) -> Result<Self> {
                buf.read_array().map(<$ty>::from_le_bytes)
            }
        }
    )*};
}

little_endian!(i32, u32, i64, f64);

impl<const N: usize> Deserializable for [u8; N] {
    fn deserialize(buf: Buffer) -> Result<Self> {
        buf.read_array()
    }
}

impl Deserializable for bool {
    fn deserialize(buf: Buffer) -> Result<Self> {
        match u32::deserialize(buf)? {
            BOOL_TRUE => Ok(true),
            BOOL_FALSE => Ok(false),
            id => Err(Error::UnexpectedConstructor { id }),
        }
    }
}

fn deserialize_items<T: Deserializable>(buf: Buffer) -> Result<Vec<T>> {
    let count = u32::deserialize(buf)?;
    (0..count).map(|_| T::deserialize(buf)).collect()
}

impl<T: Deserializable> Deserializable for Vec<T> {
    fn deserialize(buf: Buffer) -> Result<Self> {
        match u32::deserialize(buf)? {
            VECTOR => deserialize_items(buf),
            id => Err(Error::UnexpectedConstructor { id }),
        }
    }
}

impl<T: Deserializable> Deserializable for super::RawVec<T> {
    fn deserialize(buf: Buffer) -> Result<Self> {
        deserialize_items(buf).map(Self)
    }
}

/// Invalid UTF-8 is replaced, not rejected.
impl Deserializable for String {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let bytes = Vec::<u8>::deserialize(buf)?;
        Ok(String::from_utf8(bytes)
            .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned()))
    }
}

impl Deserializable for Vec<u8> {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let (len, header) = match buf.read_byte()? {
            LONG_STRING_MARKER => {
                let [a, b, c] = buf.read_array()?;
                (u32::from_le_bytes([a, b, c, 0]) as usize, 4)
            }
            short => (short as usize, 1),
        };
        let bytes = buf.read_slice(len)?.to_vec();
        buf.read_slice(padding_after(header + len))?;
        Ok(bytes)
    }
}
