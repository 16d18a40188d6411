// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The contract between the sender and whatever stores its state.
//!
//! The sender only needs to remember which datacenter is "home", the
//! authorization key generated for each datacenter, and the last server
//! salt it was given. How that is persisted is up to the [`Session`]
//! implementation. [`MemorySession`] keeps it all in memory, and can be
//! converted to and from a [`SessionData`] snapshot.
#![deny(unsafe_code)]

mod dc_options;
mod memory_session;
mod session;

pub use dc_options::{DEFAULT_DC, KNOWN_DC_OPTIONS, known_dc_option};
pub use memory_session::{DcOptionData, MemorySession, SessionData};
pub use session::{DcOption, Session};
