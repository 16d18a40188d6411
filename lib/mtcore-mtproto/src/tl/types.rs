// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! All of the bare types, each represented by a `struct`.
//!
//! All of them implement [`crate::tl::Identifiable`], [`crate::tl::Serializable`]
//! and [`crate::tl::Deserializable`]. Serializing a bare type does not
//! include its constructor identifier.
#![allow(clippy::unreadable_literal)]
use super::RawVec;

tl_type! {
    /// `resPQ#05162463 nonce:int128 server_nonce:int128 pq:string server_public_key_fingerprints:Vector<long> = ResPQ;`
    ResPq = 0x05162463 {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        pq: Vec<u8>,
        server_public_key_fingerprints: Vec<i64>,
    }
}

tl_type! {
    /// `p_q_inner_data#83c95aec pq:string p:string q:string nonce:int128 server_nonce:int128 new_nonce:int256 = P_Q_inner_data;`
    PQInnerData = 0x83c95aec {
        pq: Vec<u8>,
        p: Vec<u8>,
        q: Vec<u8>,
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        new_nonce: [u8; 32],
    }
}

tl_type! {
    /// `p_q_inner_data_dc#a9f55f95 pq:string p:string q:string nonce:int128 server_nonce:int128 new_nonce:int256 dc:int = P_Q_inner_data;`
    PQInnerDataDc = 0xa9f55f95 {
        pq: Vec<u8>,
        p: Vec<u8>,
        q: Vec<u8>,
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        new_nonce: [u8; 32],
        dc: i32,
    }
}

tl_type! {
    /// `p_q_inner_data_temp_dc#56fddf88 pq:string p:string q:string nonce:int128 server_nonce:int128 new_nonce:int256 dc:int expires_in:int = P_Q_inner_data;`
    PQInnerDataTempDc = 0x56fddf88 {
        pq: Vec<u8>,
        p: Vec<u8>,
        q: Vec<u8>,
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        new_nonce: [u8; 32],
        dc: i32,
        expires_in: i32,
    }
}

tl_type! {
    ServerDhParamsFail = 0x79cb045d {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        new_nonce_hash: [u8; 16],
    }
}

tl_type! {
    ServerDhParamsOk = 0xd0e8075c {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        encrypted_answer: Vec<u8>,
    }
}

tl_type! {
    /// `server_DH_inner_data#b5890dba nonce:int128 server_nonce:int128 g:int dh_prime:string g_a:string server_time:int = Server_DH_inner_data;`
    ServerDhInnerData = 0xb5890dba {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        g: i32,
        dh_prime: Vec<u8>,
        g_a: Vec<u8>,
        server_time: i32,
    }
}

tl_type! {
    /// `client_DH_inner_data#6643b654 nonce:int128 server_nonce:int128 retry_id:long g_b:string = Client_DH_Inner_Data;`
    ClientDhInnerData = 0x6643b654 {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        retry_id: i64,
        g_b: Vec<u8>,
    }
}

tl_type! {
    DhGenOk = 0x3bcbf734 {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        new_nonce_hash1: [u8; 16],
    }
}

tl_type! {
    DhGenRetry = 0x46dc1fb9 {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        new_nonce_hash2: [u8; 16],
    }
}

tl_type! {
    DhGenFail = 0xa69dae02 {
        nonce: [u8; 16],
        server_nonce: [u8; 16],
        new_nonce_hash3: [u8; 16],
    }
}

tl_type! {
    /// `rpc_error#2144ca19 error_code:int error_message:string = RpcError;`
    RpcError = 0x2144ca19 {
        error_code: i32,
        error_message: String,
    }
}

tl_type! {
    RpcAnswerUnknown = 0x5e2ad36e {}
}

tl_type! {
    RpcAnswerDroppedRunning = 0xcd78e586 {}
}

tl_type! {
    RpcAnswerDropped = 0xa43ad8b7 {
        msg_id: i64,
        seq_no: i32,
        bytes: i32,
    }
}

tl_type! {
    FutureSalt = 0x0949d9dc {
        valid_since: i32,
        valid_until: i32,
        salt: i64,
    }
}

tl_type! {
    /// `future_salts#ae500895 req_msg_id:long now:int salts:vector<future_salt> = FutureSalts;`
    FutureSalts = 0xae500895 {
        req_msg_id: i64,
        now: i32,
        salts: RawVec<FutureSalt>,
    }
}

tl_type! {
    /// `pong#347773c5 msg_id:long ping_id:long = Pong;`
    Pong = 0x347773c5 {
        msg_id: i64,
        ping_id: i64,
    }
}

tl_type! {
    DestroySessionOk = 0xe22045fc {
        session_id: i64,
    }
}

tl_type! {
    DestroySessionNone = 0x62d350c9 {
        session_id: i64,
    }
}

tl_type! {
    /// `new_session_created#9ec20908 first_msg_id:long unique_id:long server_salt:long = NewSession;`
    NewSessionCreated = 0x9ec20908 {
        first_msg_id: i64,
        unique_id: i64,
        server_salt: i64,
    }
}

tl_type! {
    /// `msgs_ack#62d6b459 msg_ids:Vector<long> = MsgsAck;`
    MsgsAck = 0x62d6b459 {
        msg_ids: Vec<i64>,
    }
}

tl_type! {
    /// `bad_msg_notification#a7eff811 bad_msg_id:long bad_msg_seqno:int error_code:int = BadMsgNotification;`
    BadMsgNotification = 0xa7eff811 {
        bad_msg_id: i64,
        bad_msg_seqno: i32,
        error_code: i32,
    }
}

tl_type! {
    /// `bad_server_salt#edab447b bad_msg_id:long bad_msg_seqno:int error_code:int new_server_salt:long = BadMsgNotification;`
    BadServerSalt = 0xedab447b {
        bad_msg_id: i64,
        bad_msg_seqno: i32,
        error_code: i32,
        new_server_salt: i64,
    }
}

tl_type! {
    MsgResendReq = 0x7d861a08 {
        msg_ids: Vec<i64>,
    }
}

tl_type! {
    MsgResendAnsReq = 0x8610baeb {
        msg_ids: Vec<i64>,
    }
}

tl_type! {
    MsgsStateReq = 0xda69fb52 {
        msg_ids: Vec<i64>,
    }
}

tl_type! {
    /// `msgs_state_info#04deb57d req_msg_id:long info:string = MsgsStateInfo;`
    ///
    /// `info` holds one status byte per message asked about.
    MsgsStateInfo = 0x04deb57d {
        req_msg_id: i64,
        info: Vec<u8>,
    }
}

tl_type! {
    MsgsAllInfo = 0x8cc0d131 {
        msg_ids: Vec<i64>,
        info: Vec<u8>,
    }
}

tl_type! {
    MsgDetailedInfo = 0x276d3ec6 {
        msg_id: i64,
        answer_msg_id: i64,
        bytes: i32,
        status: i32,
    }
}

tl_type! {
    MsgNewDetailedInfo = 0x809db6df {
        answer_msg_id: i64,
        bytes: i32,
        status: i32,
    }
}

tl_type! {
    HttpWait = 0x9299359f {
        max_delay: i32,
        wait_after: i32,
        max_wait: i32,
    }
}
