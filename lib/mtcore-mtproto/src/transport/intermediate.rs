// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use super::{Error, Tagged, Transport, UnpackedOffset, read_i32};
use bytes::{BufMut, BytesMut};

/// Sent once, before the first packet, unless obfuscation carries it.
const TAG: [u8; 4] = [0xee; 4];

/// The [intermediate transport]: each packet is its payload prefixed by the
/// payload length.
///
/// ```text
/// +-----+-------...-------+
/// | len |     payload     |
/// +-----+-------...-------+
/// ```
///
/// It relies on the connection for integrity, and is the usual choice to
/// wrap in [`super::Obfuscated`].
///
/// [intermediate transport]: https://core.telegram.org/mtproto/mtproto-transports#intermediate
#[derive(Debug, Default)]
pub struct Intermediate {
    tag_sent: bool,
}

impl Intermediate {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for Intermediate {
    fn pack(&mut self, input: &[u8], output: &mut BytesMut) {
        assert_eq!(input.len() % 4, 0, "payload must be padded to 4 bytes");

        output.reserve(TAG.len() + 4 + input.len());
        if !std::mem::replace(&mut self.tag_sent, true) {
            output.put_slice(&TAG);
        }
        output.put_u32_le(input.len() as u32);
        output.put_slice(input);
    }

    fn unpack(&mut self, buffer: &mut [u8]) -> Result<UnpackedOffset, Error> {
        if buffer.len() < 4 {
            return Err(Error::MissingBytes);
        }

        let len = read_i32(buffer, 0);
        let end = usize::try_from(len)
            .map(|len| 4 + len)
            .map_err(|_| Error::BadLen { got: len })?;
        if buffer.len() < end {
            return Err(Error::MissingBytes);
        }

        match len {
            // A lone negative integer is the server reporting an error.
            4 if read_i32(buffer, 4) < 0 => Err(Error::BadStatus {
                status: read_i32(buffer, 4).unsigned_abs(),
            }),
            0..=4 => Err(Error::BadLen { got: len }),
            _ => Ok(UnpackedOffset {
                data_start: 4,
                data_end: end,
                next_offset: end,
            }),
        }
    }

    fn reset(&mut self) {
        self.tag_sent = false;
    }
}

impl Tagged for Intermediate {
    fn init_tag(&mut self) -> [u8; 4] {
        self.tag_sent = true;
        TAG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(transport: &mut Intermediate, payloads: &[&[u8]]) -> BytesMut {
        let mut output = BytesMut::new();
        for payload in payloads {
            transport.pack(payload, &mut output);
        }
        output
    }

    #[test]
    fn tag_precedes_the_first_packet_only() {
        let mut transport = Intermediate::new();
        assert_eq!(
            &packed(&mut transport, &[b""])[..],
            &[0xee, 0xee, 0xee, 0xee, 0, 0, 0, 0]
        );
        assert_eq!(&packed(&mut transport, &[b"abcd"])[..], b"\x04\0\0\0abcd");

        transport.reset();
        assert_eq!(&packed(&mut transport, &[b""])[..4], &TAG);
    }

    #[test]
    fn tag_taken_by_obfuscation_is_not_repeated() {
        let mut transport = Intermediate::new();
        assert_eq!(transport.init_tag(), TAG);
        assert_eq!(&packed(&mut transport, &[b"abcd"])[..4], &[4, 0, 0, 0]);
    }

    #[test]
    #[should_panic]
    fn unpadded_payload() {
        packed(&mut Intermediate::new(), &[b"abc"]);
    }

    #[test]
    fn unpacks_consecutive_packets() {
        let mut transport = Intermediate::new();
        transport.init_tag();
        let mut buffer = packed(&mut transport, &[b"first packet", b"and then"]);

        let first = transport.unpack(&mut buffer).unwrap();
        assert_eq!(&buffer[first.data_start..first.data_end], b"first packet");
        assert_eq!(first.next_offset, 16);

        let mut rest = buffer.split_off(first.next_offset);
        let second = transport.unpack(&mut rest).unwrap();
        assert_eq!(&rest[second.data_start..second.data_end], b"and then");
        assert_eq!(second.next_offset, rest.len());
    }

    #[test]
    fn partial_packets_need_more_bytes() {
        let mut transport = Intermediate::new();
        assert_eq!(transport.unpack(&mut [8, 0]), Err(Error::MissingBytes));
        assert_eq!(
            transport.unpack(&mut [8, 0, 0, 0, 1, 2, 3, 4]),
            Err(Error::MissingBytes)
        );
    }

    #[test]
    fn bad_lengths() {
        let mut transport = Intermediate::new();
        assert_eq!(
            transport.unpack(&mut [0xff, 0xff, 0xff, 0xff]),
            Err(Error::BadLen { got: -1 })
        );
        assert_eq!(
            transport.unpack(&mut [4, 0, 0, 0, 1, 0, 0, 0]),
            Err(Error::BadLen { got: 4 })
        );
    }

    #[test]
    fn negative_payload_is_a_status() {
        let mut buffer = [4, 0, 0, 0].to_vec();
        buffer.extend((-429i32).to_le_bytes());
        assert_eq!(
            Intermediate::new().unpack(&mut buffer),
            Err(Error::BadStatus { status: 429 })
        );
    }
}
