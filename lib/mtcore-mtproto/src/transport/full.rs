// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use super::{Error, Transport, UnpackedOffset, read_i32};
use bytes::{BufMut, BytesMut};

/// Length, sequence number and checksum.
const OVERHEAD: usize = 12;

/// The [full transport], the only one with integrity checks of its own.
///
/// ```text
/// +-----+-----+-------...-------+-----+
/// | len | seq |     payload     | crc |
/// +-----+-----+-------...-------+-----+
/// ```
///
/// `len` counts the whole packet, `seq` starts at zero in each direction and
/// `crc` is the CRC32 of everything before it. A packet carrying only a
/// negative 32-bit integer reports a transport error.
///
/// [full transport]: https://core.telegram.org/mtproto/mtproto-transports#full
#[derive(Debug, Default)]
pub struct Full {
    sent: u32,
    received: u32,
}

impl Full {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for Full {
    fn pack(&mut self, input: &[u8], output: &mut BytesMut) {
        assert_eq!(input.len() % 4, 0, "payload must be padded to 4 bytes");

        let start = output.len();
        output.reserve(input.len() + OVERHEAD);
        output.put_u32_le((input.len() + OVERHEAD) as u32);
        output.put_u32_le(self.sent);
        output.put_slice(input);
        let crc = crc32fast::hash(&output[start..]);
        output.put_u32_le(crc);

        self.sent = self.sent.wrapping_add(1);
    }

    fn unpack(&mut self, buffer: &mut [u8]) -> Result<UnpackedOffset, Error> {
        if buffer.len() < 4 {
            return Err(Error::MissingBytes);
        }

        let len = read_i32(buffer, 0);
        if len < OVERHEAD as i32 {
            return Err(Error::BadLen { got: len });
        }
        let len = len as usize;
        if buffer.len() < len {
            return Err(Error::MissingBytes);
        }

        let crc = read_i32(buffer, len - 4) as u32;
        let expected = crc32fast::hash(&buffer[..len - 4]);
        if crc != expected {
            return Err(Error::BadCrc { expected, got: crc });
        }

        let seq = read_i32(buffer, 4) as u32;
        if seq != self.received {
            return Err(Error::BadSeq {
                expected: self.received,
                got: seq,
            });
        }
        self.received = self.received.wrapping_add(1);

        if len == OVERHEAD + 4 {
            let status = read_i32(buffer, 8);
            if status < 0 {
                return Err(Error::BadStatus {
                    status: status.unsigned_abs(),
                });
            }
        }

        Ok(UnpackedOffset {
            data_start: 8,
            data_end: len - 4,
            next_offset: len,
        })
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(payloads: &[&[u8]]) -> BytesMut {
        let mut transport = Full::new();
        let mut output = BytesMut::new();
        for payload in payloads {
            transport.pack(payload, &mut output);
        }
        output
    }

    #[test]
    fn empty_packet_layout() {
        assert_eq!(
            &packed(&[&[]])[..],
            &[12, 0, 0, 0, 0, 0, 0, 0, 38, 202, 141, 50]
        );
    }

    #[test]
    fn sequence_increments() {
        let output = packed(&[&[1, 2, 3, 4], &[5, 6, 7, 8]]);
        assert_eq!(output.len(), 32);
        assert_eq!(&output[4..8], &[0, 0, 0, 0]);
        assert_eq!(&output[20..24], &[1, 0, 0, 0]);
    }

    #[test]
    #[should_panic]
    fn unpadded_payloads_are_refused() {
        packed(&[&[1, 2, 3]]);
    }

    #[test]
    fn unpacks_consecutive_packets() {
        let mut buffer = packed(&[&[1, 2, 3, 4], &[5, 6, 7, 8]]);
        let mut transport = Full::new();

        let first = transport.unpack(&mut buffer).unwrap();
        assert_eq!(&buffer[first.data_start..first.data_end], &[1, 2, 3, 4]);
        let mut rest = buffer.split_off(first.next_offset);

        let second = transport.unpack(&mut rest).unwrap();
        assert_eq!(&rest[second.data_start..second.data_end], &[5, 6, 7, 8]);
        assert_eq!(second.next_offset, rest.len());
    }

    #[test]
    fn partial_packets_need_more_bytes() {
        let mut buffer = packed(&[&[1, 2, 3, 4]]);
        let mut transport = Full::new();
        assert_eq!(transport.unpack(&mut buffer[..2]), Err(Error::MissingBytes));
        let len = buffer.len();
        assert_eq!(
            transport.unpack(&mut buffer[..len - 1]),
            Err(Error::MissingBytes)
        );
        assert!(transport.unpack(&mut buffer).is_ok());
    }

    #[test]
    fn corrupted_packets_are_refused() {
        let mut buffer = packed(&[&[1, 2, 3, 4]]);
        buffer[9] ^= 1;
        assert!(matches!(
            Full::new().unpack(&mut buffer),
            Err(Error::BadCrc { .. })
        ));
    }

    #[test]
    fn out_of_order_packets_are_refused() {
        let mut buffer = packed(&[&[1, 2, 3, 4], &[5, 6, 7, 8]]);
        let mut second = buffer.split_off(16);
        assert_eq!(
            Full::new().unpack(&mut second),
            Err(Error::BadSeq {
                expected: 0,
                got: 1
            })
        );
    }

    #[test]
    fn short_lengths_are_refused() {
        let mut buffer = [8, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            Full::new().unpack(&mut buffer),
            Err(Error::BadLen { got: 8 })
        );
    }

    #[test]
    fn negative_payload_is_a_status() {
        let mut buffer = packed(&[&(-404i32).to_le_bytes()]);
        assert_eq!(
            Full::new().unpack(&mut buffer),
            Err(Error::BadStatus { status: 404 })
        );
    }

    #[test]
    fn reset_restarts_sequences() {
        let mut transport = Full::new();
        let mut output = BytesMut::new();
        transport.pack(&[0; 4], &mut output);
        transport.reset();
        output.clear();
        transport.pack(&[0; 4], &mut output);
        assert_eq!(&output[4..8], &[0, 0, 0, 0]);
    }
}
