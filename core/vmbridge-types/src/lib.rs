// SPDX-License-Identifier: MIT
//! vmbridge-types crate
//!
//! Data model shared by the bridge logic and its operators. No revm dependency.

pub mod abi;
pub mod address;
pub mod constants;
pub mod error;
pub mod height;
pub mod proposal;
pub mod types;

pub use error::{BridgeError, ErrorCategory, Result};
