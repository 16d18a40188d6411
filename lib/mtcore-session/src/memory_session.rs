// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use crate::{DEFAULT_DC, DcOption, KNOWN_DC_OPTIONS, Session, known_dc_option};
use log::debug;
use std::collections::BTreeMap;
use std::net::{SocketAddrV4, SocketAddrV6};
use std::sync::{Mutex, MutexGuard};

#[cfg(feature = "impl-serde")]
use serde_derive::{Deserialize, Serialize};

/// A datacenter option as stored in a [`SessionData`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "impl-serde", derive(Serialize, Deserialize))]
pub struct DcOptionData {
    pub id: i32,
    pub ipv4: SocketAddrV4,
    pub ipv6: SocketAddrV6,
    #[cfg_attr(feature = "impl-serde", serde(with = "serde_bytes"))]
    pub auth_key: Option<Vec<u8>>,
}

/// A snapshot of everything a [`MemorySession`] holds.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "impl-serde", derive(Serialize, Deserialize))]
pub struct SessionData {
    pub home_dc: i32,
    pub server_salt: Option<i64>,
    pub signed_in: bool,
    pub dc_options: Vec<DcOptionData>,
}

impl Default for SessionData {
    fn default() -> Self {
        Self {
            home_dc: DEFAULT_DC,
            server_salt: None,
            signed_in: false,
            dc_options: KNOWN_DC_OPTIONS.iter().map(DcOptionData::from).collect(),
        }
    }
}

impl From<&DcOption> for DcOptionData {
    fn from(option: &DcOption) -> Self {
        Self {
            id: option.id,
            ipv4: option.ipv4,
            ipv6: option.ipv6,
            auth_key: option.auth_key.map(|key| key.to_vec()),
        }
    }
}

impl From<&DcOptionData> for DcOption {
    /// Keys of the wrong length are dropped.
    fn from(data: &DcOptionData) -> Self {
        Self {
            id: data.id,
            ipv4: data.ipv4,
            ipv6: data.ipv6,
            auth_key: data
                .auth_key
                .as_deref()
                .and_then(|key| key.try_into().ok()),
        }
    }
}

struct State {
    home_dc: i32,
    server_salt: Option<i64>,
    signed_in: bool,
    dc_options: BTreeMap<i32, DcOption>,
}

/// A basic session implementation, kept only in-memory.
///
/// Use [`MemorySession::snapshot`] to persist it elsewhere, and
/// [`MemorySession::from`] to load it back.
pub struct MemorySession {
    state: Mutex<State>,
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::from(SessionData::default())
    }
}

impl MemorySession {
    /// Create a new session, knowing only the primary datacenters.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // The state is always left consistent, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy out everything the session holds.
    pub fn snapshot(&self) -> SessionData {
        let state = self.lock();
        SessionData {
            home_dc: state.home_dc,
            server_salt: state.server_salt,
            signed_in: state.signed_in,
            dc_options: state.dc_options.values().map(DcOptionData::from).collect(),
        }
    }
}

impl From<SessionData> for MemorySession {
    fn from(data: SessionData) -> Self {
        Self {
            state: Mutex::new(State {
                home_dc: data.home_dc,
                server_salt: data.server_salt,
                signed_in: data.signed_in,
                dc_options: data
                    .dc_options
                    .iter()
                    .map(|option| (option.id, DcOption::from(option)))
                    .collect(),
            }),
        }
    }
}

impl Session for MemorySession {
    fn home_dc_id(&self) -> i32 {
        self.lock().home_dc
    }

    fn set_home_dc_id(&self, dc_id: i32) {
        debug!("home datacenter is now {dc_id}");
        self.lock().home_dc = dc_id;
    }

    fn dc_option(&self, dc_id: i32) -> Option<DcOption> {
        self.lock()
            .dc_options
            .get(&dc_id)
            .cloned()
            .or_else(|| known_dc_option(dc_id))
    }

    fn set_dc_option(&self, dc_option: &DcOption) {
        self.lock()
            .dc_options
            .insert(dc_option.id, dc_option.clone());
    }

    fn set_auth_key(&self, dc_id: i32, auth_key: Option<[u8; 256]>) {
        let mut state = self.lock();
        if !state.dc_options.contains_key(&dc_id) {
            let Some(option) = known_dc_option(dc_id) else {
                return;
            };
            state.dc_options.insert(dc_id, option);
        }
        if let Some(option) = state.dc_options.get_mut(&dc_id) {
            debug!(
                "{} authorization key for dc {dc_id}",
                if auth_key.is_some() { "storing" } else { "forgetting" }
            );
            option.auth_key = auth_key;
        }
    }

    fn server_salt(&self) -> Option<i64> {
        self.lock().server_salt
    }

    fn set_server_salt(&self, salt: i64) {
        self.lock().server_salt = Some(salt);
    }

    fn signed_in(&self) -> bool {
        self.lock().signed_in
    }

    fn set_signed_in(&self, signed_in: bool) {
        self.lock().signed_in = signed_in;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let session = MemorySession::new();
        assert_eq!(session.home_dc_id(), DEFAULT_DC);
        assert_eq!(session.server_salt(), None);
        assert!(!session.signed_in());
        for dc_id in 1..=5 {
            assert!(session.dc_option(dc_id).is_some());
            assert!(session.auth_key(dc_id).is_none());
        }
    }

    #[test]
    fn auth_keys_are_per_dc() {
        let session = MemorySession::new();
        session.set_auth_key(2, Some([2; 256]));
        session.set_auth_key(4, Some([4; 256]));

        assert_eq!(session.auth_key(2), Some([2; 256]));
        assert_eq!(session.auth_key(4), Some([4; 256]));
        assert_eq!(session.auth_key(1), None);

        session.set_auth_key(2, None);
        assert_eq!(session.auth_key(2), None);
        assert_eq!(session.auth_key(4), Some([4; 256]));
    }

    #[test]
    fn unknown_dc_is_ignored() {
        let session = MemorySession::new();
        session.set_auth_key(42, Some([1; 256]));
        assert_eq!(session.auth_key(42), None);
        assert!(session.dc_option(42).is_none());
    }

    #[test]
    fn snapshot_keeps_everything() {
        let session = MemorySession::new();
        session.set_home_dc_id(4);
        session.set_server_salt(-123);
        session.set_signed_in(true);
        session.set_auth_key(4, Some([7; 256]));

        let data = session.snapshot();
        assert_eq!(data.dc_options.len(), 5);

        let restored = MemorySession::from(data.clone());
        assert_eq!(restored.home_dc_id(), 4);
        assert_eq!(restored.server_salt(), Some(-123));
        assert!(restored.signed_in());
        assert_eq!(restored.auth_key(4), Some([7; 256]));
        assert_eq!(restored.snapshot(), data);
    }

    #[test]
    fn bad_key_length_is_dropped() {
        let mut data = SessionData::default();
        data.dc_options[0].auth_key = Some(vec![1; 10]);
        let session = MemorySession::from(data);
        assert_eq!(session.auth_key(1), None);
    }
}
