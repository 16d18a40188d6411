// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use std::ops::ControlFlow;
use std::time::Duration;

/// Decides whether a lost connection should be established again.
pub trait ReconnectionPolicy: Send + Sync {
    /// Called before every reconnection attempt, starting at `1`.
    ///
    /// Returning `Continue` waits for the given duration before trying,
    /// and `Break` gives up, failing every pending request.
    fn should_retry(&self, attempts: usize) -> ControlFlow<(), Duration>;
}

/// Never reconnect.
pub struct NoReconnect;

impl ReconnectionPolicy for NoReconnect {
    fn should_retry(&self, _: usize) -> ControlFlow<(), Duration> {
        ControlFlow::Break(())
    }
}

/// Reconnect up to `attempts` times in a row, waiting `delay` before each.
pub struct FixedReconnect {
    pub attempts: usize,
    pub delay: Duration,
}

impl ReconnectionPolicy for FixedReconnect {
    fn should_retry(&self, attempts: usize) -> ControlFlow<(), Duration> {
        if attempts <= self.attempts {
            ControlFlow::Continue(self.delay)
        } else {
            ControlFlow::Break(())
        }
    }
}

/// The policy used unless configured otherwise.
pub static DEFAULT_RECONNECTION_POLICY: FixedReconnect = FixedReconnect {
    attempts: 5,
    delay: Duration::from_secs(1),
};
