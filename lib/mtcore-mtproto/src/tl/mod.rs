// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The subset of the [Type Language] needed by the protocol itself.
//!
//! Only the definitions used to generate an authorization key and the
//! service messages of the [Mobile Transport Protocol] are present. The
//! rest of the API is opaque to this crate: requests are taken already
//! serialized, and responses are handed back as raw bytes.
//!
//! Bare types live in [`types`], and are wrapped by the boxed [`enums`],
//! one variant per constructor. Requests live in [`functions`].
//!
//! [Type Language]: https://core.telegram.org/mtproto/TL
//! [Mobile Transport Protocol]: https://core.telegram.org/mtproto/service_messages
pub mod deserialize;
mod serialize;

pub use deserialize::{Cursor, Deserializable};
pub use serialize::Serializable;

/// A vector without the `vector` constructor in front (`vector<t>` in the schema).
#[derive(Clone, Debug, PartialEq)]
pub struct RawVec<T>(pub Vec<T>);

/// Anything that has a constructor identifier.
pub trait Identifiable {
    /// The unique identifier for the type.
    const CONSTRUCTOR_ID: u32;
}

/// Structures implementing this trait indicate that they are suitable for
/// use to perform Remote Procedure Calls (RPC), and know what the type of
/// the response will be.
pub trait RemoteCall: Serializable {
    /// The type of the "return" value coming from the other end of the
    /// connection.
    type Return: Deserializable;
}

/// Declares a bare type, which serializes its fields in order.
macro_rules! tl_type {
    ($(#[$meta:meta])* $name:ident = $id:literal { $($field:ident: $ty:ty),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name {
            $(pub $field: $ty,)*
        }

        impl $crate::tl::Identifiable for $name {
            const CONSTRUCTOR_ID: u32 = $id;
        }

        impl $crate::tl::Serializable for $name {
            #[allow(unused_variables)]
            fn serialize(&self, buf: &mut impl Extend<u8>) {
                $($crate::tl::Serializable::serialize(&self.$field, buf);)*
            }
        }

        impl $crate::tl::Deserializable for $name {
            #[allow(unused_variables)]
            fn deserialize(
                buf: $crate::tl::deserialize::Buffer,
            ) -> $crate::tl::deserialize::Result<Self> {
                $(let $field = <$ty as $crate::tl::Deserializable>::deserialize(buf)?;)*
                Ok(Self { $($field,)* })
            }
        }
    };
}

/// Declares a boxed type, one variant per bare constructor in [`types`].
macro_rules! tl_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident($ty:ident)),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        pub enum $name {
            $($variant($crate::tl::types::$ty),)+
        }

        impl $crate::tl::Serializable for $name {
            fn serialize(&self, buf: &mut impl Extend<u8>) {
                match self {
                    $(Self::$variant(x) => {
                        $crate::tl::Serializable::serialize(
                            &<$crate::tl::types::$ty as $crate::tl::Identifiable>::CONSTRUCTOR_ID,
                            buf,
                        );
                        $crate::tl::Serializable::serialize(x, buf);
                    })+
                }
            }
        }

        impl $crate::tl::Deserializable for $name {
            fn deserialize(
                buf: $crate::tl::deserialize::Buffer,
            ) -> $crate::tl::deserialize::Result<Self> {
                let id = <u32 as $crate::tl::Deserializable>::deserialize(buf)?;
                $(
                    if id == <$crate::tl::types::$ty as $crate::tl::Identifiable>::CONSTRUCTOR_ID {
                        return Ok(Self::$variant(
                            <$crate::tl::types::$ty as $crate::tl::Deserializable>::deserialize(buf)?,
                        ));
                    }
                )+
                Err($crate::tl::deserialize::Error::UnexpectedConstructor { id })
            }
        }
    };
}

/// Declares a request, which is always serialized boxed.
macro_rules! tl_function {
    (
        $(#[$meta:meta])* $name:ident = $id:literal { $($field:ident: $ty:ty),* $(,)? }
        -> $ret:ty
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name {
            $(pub $field: $ty,)*
        }

        impl $crate::tl::Identifiable for $name {
            const CONSTRUCTOR_ID: u32 = $id;
        }

        impl $crate::tl::Serializable for $name {
            fn serialize(&self, buf: &mut impl Extend<u8>) {
                $crate::tl::Serializable::serialize(&<Self as $crate::tl::Identifiable>::CONSTRUCTOR_ID, buf);
                $($crate::tl::Serializable::serialize(&self.$field, buf);)*
            }
        }

        impl $crate::tl::Deserializable for $name {
            fn deserialize(
                buf: $crate::tl::deserialize::Buffer,
            ) -> $crate::tl::deserialize::Result<Self> {
                let id = <u32 as $crate::tl::Deserializable>::deserialize(buf)?;
                if id != <Self as $crate::tl::Identifiable>::CONSTRUCTOR_ID {
                    return Err($crate::tl::deserialize::Error::UnexpectedConstructor { id });
                }
                $(let $field = <$ty as $crate::tl::Deserializable>::deserialize(buf)?;)*
                Ok(Self { $($field,)* })
            }
        }

        impl $crate::tl::RemoteCall for $name {
            type Return = $ret;
        }
    };
}

pub mod enums;
pub mod functions;
pub mod types;

/// The name of the definition with the given constructor identifier, for
/// logging purposes.
///
/// # Examples
///
/// ```
/// use mtcore_mtproto::tl::name_for_id;
///
/// assert_eq!(name_for_id(0x347773c5), "pong");
/// assert_eq!(name_for_id(0x12345678), "(unknown)");
/// ```
#[allow(clippy::unreadable_literal)]
pub fn name_for_id(id: u32) -> &'static str {
    match id {
        0x05162463 => "resPQ",
        0x83c95aec => "p_q_inner_data",
        0xa9f55f95 => "p_q_inner_data_dc",
        0x56fddf88 => "p_q_inner_data_temp_dc",
        0x79cb045d => "server_DH_params_fail",
        0xd0e8075c => "server_DH_params_ok",
        0xb5890dba => "server_DH_inner_data",
        0x6643b654 => "client_DH_inner_data",
        0x3bcbf734 => "dh_gen_ok",
        0x46dc1fb9 => "dh_gen_retry",
        0xa69dae02 => "dh_gen_fail",
        0xf35c6d01 => "rpc_result",
        0x2144ca19 => "rpc_error",
        0x5e2ad36e => "rpc_answer_unknown",
        0xcd78e586 => "rpc_answer_dropped_running",
        0xa43ad8b7 => "rpc_answer_dropped",
        0x0949d9dc => "future_salt",
        0xae500895 => "future_salts",
        0x347773c5 => "pong",
        0xe22045fc => "destroy_session_ok",
        0x62d350c9 => "destroy_session_none",
        0x9ec20908 => "new_session_created",
        0x73f1f8dc => "msg_container",
        0xe06046b2 => "msg_copy",
        0x3072cfa1 => "gzip_packed",
        0x62d6b459 => "msgs_ack",
        0xa7eff811 => "bad_msg_notification",
        0xedab447b => "bad_server_salt",
        0x7d861a08 => "msg_resend_req",
        0x8610baeb => "msg_resend_ans_req",
        0xda69fb52 => "msgs_state_req",
        0x04deb57d => "msgs_state_info",
        0x8cc0d131 => "msgs_all_info",
        0x276d3ec6 => "msg_detailed_info",
        0x809db6df => "msg_new_detailed_info",
        0x9299359f => "http_wait",
        0xbe7e8ef1 => "req_pq_multi",
        0xd712e4be => "req_DH_params",
        0xf5045f1f => "set_client_DH_params",
        0x58e4a740 => "rpc_drop_answer",
        0xb921bd04 => "get_future_salts",
        0x7abe77ec => "ping",
        0xf3427b8c => "ping_delay_disconnect",
        0xe7512126 => "destroy_session",
        0x1cb5c415 => "vector",
        0x997275b5 => "boolTrue",
        0xbc799737 => "boolFalse",
        _ => "(unknown)",
    }
}
