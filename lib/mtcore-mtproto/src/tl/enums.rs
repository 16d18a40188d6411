// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! All of the boxed types, each represented by a `enum`.
//!
//! All of them implement [`crate::tl::Serializable`] and [`crate::tl::Deserializable`],
//! writing and checking the constructor identifier of the variant.

tl_enum! {
    ResPq {
        Pq(ResPq),
    }
}

tl_enum! {
    PQInnerData {
        Data(PQInnerData),
        Dc(PQInnerDataDc),
        TempDc(PQInnerDataTempDc),
    }
}

tl_enum! {
    ServerDhParams {
        Fail(ServerDhParamsFail),
        Ok(ServerDhParamsOk),
    }
}

tl_enum! {
    ServerDhInnerData {
        Data(ServerDhInnerData),
    }
}

tl_enum! {
    ClientDhInnerData {
        Data(ClientDhInnerData),
    }
}

tl_enum! {
    SetClientDhParamsAnswer {
        DhGenOk(DhGenOk),
        DhGenRetry(DhGenRetry),
        DhGenFail(DhGenFail),
    }
}

tl_enum! {
    RpcError {
        Error(RpcError),
    }
}

tl_enum! {
    RpcDropAnswer {
        Unknown(RpcAnswerUnknown),
        DroppedRunning(RpcAnswerDroppedRunning),
        Dropped(RpcAnswerDropped),
    }
}

tl_enum! {
    FutureSalt {
        Salt(FutureSalt),
    }
}

tl_enum! {
    FutureSalts {
        Salts(FutureSalts),
    }
}

tl_enum! {
    Pong {
        Pong(Pong),
    }
}

tl_enum! {
    DestroySessionRes {
        Ok(DestroySessionOk),
        None(DestroySessionNone),
    }
}

tl_enum! {
    NewSession {
        Created(NewSessionCreated),
    }
}

tl_enum! {
    MsgsAck {
        Ack(MsgsAck),
    }
}

tl_enum! {
    BadMsgNotification {
        Notification(BadMsgNotification),
        BadServerSalt(BadServerSalt),
    }
}

tl_enum! {
    MsgResendReq {
        Req(MsgResendReq),
        AnsReq(MsgResendAnsReq),
    }
}

tl_enum! {
    MsgsStateReq {
        Req(MsgsStateReq),
    }
}

tl_enum! {
    MsgsStateInfo {
        Info(MsgsStateInfo),
    }
}

tl_enum! {
    MsgsAllInfo {
        Info(MsgsAllInfo),
    }
}

tl_enum! {
    MsgDetailedInfo {
        Info(MsgDetailedInfo),
        MsgNewDetailedInfo(MsgNewDetailedInfo),
    }
}

tl_enum! {
    HttpWait {
        Wait(HttpWait),
    }
}
