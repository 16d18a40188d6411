// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use std::net::{SocketAddrV4, SocketAddrV6};

/// Storage for everything the sender needs to survive a restart.
///
/// Methods take `&self` because a session is shared by every connection
/// of a sender pool. Implementations use interior mutability.
pub trait Session: Send + Sync {
    /// Datacenter that requests go to unless told otherwise.
    ///
    /// Before sign in this is only a guess, which a migration error may
    /// correct. Called for every request, so keep it fast.
    fn home_dc_id(&self) -> i32;

    fn set_home_dc_id(&self, dc_id: i32);

    /// Address and key of a datacenter.
    ///
    /// Falls back to the built-in addresses of the primary datacenters when
    /// nothing was stored. `None` means the datacenter is unknown.
    fn dc_option(&self, dc_id: i32) -> Option<DcOption>;

    /// Stores `dc_option`, replacing whatever was known about its `id`.
    fn set_dc_option(&self, dc_option: &DcOption);

    fn auth_key(&self, dc_id: i32) -> Option<[u8; 256]> {
        self.dc_option(dc_id)?.auth_key
    }

    /// Stores or, with `None`, discards the key of a datacenter. Unknown
    /// datacenters are left alone.
    fn set_auth_key(&self, dc_id: i32, auth_key: Option<[u8; 256]>) {
        if let Some(option) = self.dc_option(dc_id) {
            self.set_dc_option(&DcOption { auth_key, ..option });
        }
    }

    /// Salt from the last `new_session_created` or `bad_server_salt`.
    fn server_salt(&self) -> Option<i64>;

    fn set_server_salt(&self, salt: i64);

    /// Whether the home datacenter's key belongs to a signed in user.
    ///
    /// Migrations are only followed automatically while this is `false`.
    fn signed_in(&self) -> bool;

    fn set_signed_in(&self, signed_in: bool);
}

/// How to reach one datacenter, plus the key negotiated with it.
#[derive(Clone, Debug, PartialEq)]
pub struct DcOption {
    /// 1 to 5 for the primary datacenters, which are built in.
    pub id: i32,
    pub ipv4: SocketAddrV4,
    pub ipv6: SocketAddrV6,
    /// Permanent key, kept across restarts. Whether a user is bound to it
    /// is tracked by [`Session::signed_in`].
    pub auth_key: Option<[u8; 256]>,
}
