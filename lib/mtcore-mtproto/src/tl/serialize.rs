// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

/// Writing values in the [binary serialization] format.
///
/// [binary serialization]: https://core.telegram.org/mtproto/serialize
pub trait Serializable {
    fn serialize(&self, buf: &mut impl Extend<u8>);

    /// Serializes into a fresh buffer. Prefer [`Serializable::serialize`] to
    /// append to an existing one.
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.serialize(&mut out);
        out
    }
}

pub(crate) const BOOL_TRUE: u32 = 0x9972_75b5;
pub(crate) const BOOL_FALSE: u32 = 0xbc79_9737;
pub(crate) const VECTOR: u32 = 0x1cb5_c415;

/// Strings this long or shorter use a one byte length prefix.
pub(crate) const SHORT_STRING: usize = 253;
/// First byte of a string with a three byte length prefix.
pub(crate) const LONG_STRING_MARKER: u8 = 254;

/// Zero bytes needed after `written` bytes to reach a multiple of four.
pub(crate) fn padding_after(written: usize) -> usize {
    (4 - written % 4) % 4
}

macro_rules! little_endian {
    ($($ty:ty),*) => {$(
        impl Serializable for $ty {
            fn serialize(&self, buf: &mut impl Extend<u8>) {
                buf.extend(self.to_le_bytes());
            }
        }
    )*};
}

// `int`, `#`, `long` and `double`.
little_endian!(i32, u32, i64, f64);

/// `int128` and `int256` are written as-is.
impl<const N: usize> Serializable for [u8; N] {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        buf.extend(*self);
    }
}

impl Serializable for bool {
    /// ```
    /// use mtcore_mtproto::tl::Serializable;
    ///
    /// assert_eq!(true.to_bytes(), [0xb5, 0x75, 0x72, 0x99]);
    /// assert_eq!(false.to_bytes(), [0x37, 0x97, 0x79, 0xbc]);
    /// ```
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        if *self { BOOL_TRUE } else { BOOL_FALSE }.serialize(buf)
    }
}

/// Boxed `Vector t`.
///
/// ```
/// use mtcore_mtproto::tl::Serializable;
///
/// assert_eq!(vec![7i32].to_bytes(), [0x15, 0xc4, 0xb5, 0x1c, 1, 0, 0, 0, 7, 0, 0, 0]);
/// ```
impl<T: Serializable> Serializable for Vec<T> {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        VECTOR.serialize(buf);
        super::RawVec::<T>::serialize_items(self, buf);
    }
}

/// Bare `vector t`: the count and the items, without a constructor.
impl<T: Serializable> Serializable for super::RawVec<T> {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        Self::serialize_items(&self.0, buf);
    }
}

impl<T: Serializable> super::RawVec<T> {
    fn serialize_items(items: &[T], buf: &mut impl Extend<u8>) {
        (items.len() as i32).serialize(buf);
        for item in items {
            item.serialize(buf);
        }
    }
}

impl Serializable for String {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.as_bytes().serialize(buf)
    }
}

impl Serializable for Vec<u8> {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.as_slice().serialize(buf)
    }
}

/// A `string`, also used for `bytes`.
///
/// ```
/// use mtcore_mtproto::tl::Serializable;
///
/// assert_eq!(b"".as_slice().to_bytes(), [0, 0, 0, 0]);
/// assert_eq!(b"\x7f".as_slice().to_bytes(), [1, 0x7f, 0, 0]);
/// ```
impl Serializable for &[u8] {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        let header = if self.len() <= SHORT_STRING {
            buf.extend([self.len() as u8]);
            1
        } else {
            let [a, b, c, _] = (self.len() as u32).to_le_bytes();
            buf.extend([LONG_STRING_MARKER, a, b, c]);
            4
        };
        buf.extend(self.iter().copied());
        buf.extend(std::iter::repeat_n(0, padding_after(header + self.len())));
    }
}
