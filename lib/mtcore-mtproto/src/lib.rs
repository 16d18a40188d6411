// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! This library is an implementation of the [Mobile Transport Protocol].
//!
//! It is capable of generating authorization keys and performing the
//! encryption and decryption of messages sent to and received from a
//! server, as well as framing them for a byte stream.
//!
//! Everything here is sans-IO: requests go in as bytes and come out as
//! bytes ready to be written, so any runtime can drive it.
//!
//! [Mobile Transport Protocol]: https://core.telegram.org/mtproto
#![deny(unsafe_code)]

pub mod authentication;
pub mod manual_tl;
pub mod mtp;
pub mod tl;
pub mod transport;
mod utils;

pub use mtcore_crypto::AuthKey;

/// The default compression threshold to be used.
pub(crate) const DEFAULT_COMPRESSION_THRESHOLD: Option<usize> = Some(512);

/// A Message Identifier.
///
/// When requests are pushed to the [`mtp::Mtp`], they are assigned one of
/// these, and the response or error to them will carry the same value.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct MsgId(pub i64);

/// Whether the serialized request can be sent at all.
///
/// Requests must be padded to 4 bytes, and fit within the container size
/// limit along with their message header. Any valid request can be pushed
/// to an empty [`mtp::Mtp`] batch.
pub fn is_valid_request(request: &[u8]) -> bool {
    request.len() % 4 == 0
        && request.len() + manual_tl::Message::SIZE_OVERHEAD <= manual_tl::MessageContainer::MAXIMUM_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_validity() {
        assert!(is_valid_request(&[0; 4]));
        assert!(!is_valid_request(&[0; 5]));
        assert!(is_valid_request(&vec![0; 1_044_392]));
        assert!(is_valid_request(&vec![0; 1_044_432]));
        assert!(!is_valid_request(&vec![0; 1_044_436]));
        assert!(!is_valid_request(&vec![
            0;
            manual_tl::MessageContainer::MAXIMUM_SIZE
        ]));
    }
}
