// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use crate::reconnection::{DEFAULT_RECONNECTION_POLICY, ReconnectionPolicy};
use mtcore_crypto::rsa;
use std::time::Duration;

/// The tunables of a [`crate::Sender`] and the [`crate::SenderPool`].
#[derive(Clone)]
pub struct Configuration {
    /// Flood-wait errors asking to wait at most this many seconds are
    /// waited out and the request is sent again. Longer waits are
    /// returned to the caller.
    pub flood_sleep_threshold: u32,

    /// How many times a single request may be sent again after transient
    /// server errors, flood waits, migrations or refused messages.
    pub max_retries: usize,

    /// How long to wait before sending a request that failed because of
    /// a transient server error.
    pub retry_delay: Duration,

    /// Whether incoming messages have their session, identifier and
    /// freshness checked. The message key is verified regardless.
    pub security_checks: bool,

    /// How often to ping the server while connected.
    pub ping_interval: Duration,

    /// The server closes the connection if it receives no ping for this
    /// many seconds.
    pub ping_disconnect_delay: u32,

    /// How long to wait for the answer to a ping before reconnecting.
    pub pong_timeout: Duration,

    /// Requests at least this large are compressed, if it saves space.
    pub compression_threshold: Option<usize>,

    /// What to do when the connection is lost.
    pub reconnection_policy: &'static dyn ReconnectionPolicy,

    /// The keys the server may encrypt the handshake with.
    pub rsa_keys: Vec<rsa::Key>,

    /// If present, new authorization keys are temporary and expire after
    /// this many seconds.
    pub temp_key_expires_in: Option<i32>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            flood_sleep_threshold: 60,
            max_retries: 5,
            retry_delay: Duration::from_secs(1),
            security_checks: true,
            ping_interval: Duration::from_secs(60),
            ping_disconnect_delay: 75,
            pong_timeout: Duration::from_secs(10),
            compression_threshold: Some(512),
            reconnection_policy: &DEFAULT_RECONNECTION_POLICY,
            rsa_keys: rsa::known_keys(),
            temp_key_expires_in: None,
        }
    }
}
