// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! All of the functions, each represented by a `struct`.
//!
//! All of them implement [`crate::tl::Identifiable`], [`crate::tl::Serializable`]
//! and [`crate::tl::Deserializable`]. To find out the type that will be
//! returned upon invoking one of these requests, check out the associated
//! type in the corresponding [`crate::tl::RemoteCall`] trait impl.
#![allow(clippy::unreadable_literal)]
use super::enums;

tl_function! {
    /// `req_pq_multi#be7e8ef1 nonce:int128 = ResPQ;`
    ReqPqMulti = 0xbe7e8ef1 {
        nonce: [u8; 16],
    } -> enums::ResPq
}

tl_function! {
    /// `req_DH_params#d712e4be nonce:int128 server_nonce:int128 p:string q:string public_key_fingerprint:long encrypted_data:string = Server_DH_Params;`
    ReqDhParams = 0xd712e4be {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        p: Vec<u8>,
        q: Vec<u8>,
        public_key_fingerprint: i64,
        encrypted_data: Vec<u8>,
    } -> enums::ServerDhParams
}

tl_function! {
    /// `set_client_DH_params#f5045f1f nonce:int128 server_nonce:int128 encrypted_data:string = Set_client_DH_params_answer;`
    SetClientDhParams = 0xf5045f1f {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        encrypted_data: Vec<u8>,
    } -> enums::SetClientDhParamsAnswer
}

tl_function! {
    /// `rpc_drop_answer#58e4a740 req_msg_id:long = RpcDropAnswer;`
    RpcDropAnswer = 0x58e4a740 {
        req_msg_id: i64,
    } -> enums::RpcDropAnswer
}

tl_function! {
    /// `get_future_salts#b921bd04 num:int = FutureSalts;`
    GetFutureSalts = 0xb921bd04 {
        num: i32,
    } -> enums::FutureSalts
}

tl_function! {
    /// `ping#7abe77ec ping_id:long = Pong;`
    Ping = 0x7abe77ec {
        ping_id: i64,
    } -> enums::Pong
}

tl_function! {
    /// `ping_delay_disconnect#f3427b8c ping_id:long disconnect_delay:int = Pong;`
    ///
    /// The server closes the connection if no other ping arrives within
    /// `disconnect_delay` seconds.
    PingDelayDisconnect = 0xf3427b8c {
        ping_id: i64,
        disconnect_delay: i32,
    } -> enums::Pong
}

tl_function! {
    /// `destroy_session#e7512126 session_id:long = DestroySessionRes;`
    DestroySession = 0xe7512126 {
        session_id: i64,
    } -> enums::DestroySessionRes
}
