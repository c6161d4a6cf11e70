//! Hardware-agnostic core of the alarm-panel-to-SMS bridge firmware.
//!
//! This crate holds the event-driven modem dialogue manager (line
//! reassembly, response classification, exchange arbitration, the dialogue
//! engine's multi-stage state machine, input monitoring and config
//! persistence codec) without depending on any concrete peripheral type.
//! The hardware glue lives in the `alarmdial-fw` binary crate, which
//! implements the traits in [`hal`] against `embassy-nrf`.
//!
//! Built `no_std` except under `cargo test`, where it links against `std`
//! so the logic can be exercised on the host.
#![cfg_attr(not(test), no_std)]

pub mod arbiter;
pub mod bootstrap;
pub mod classify;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod hal;
pub mod input;
pub mod line;
#[macro_use]
pub mod logger;
pub mod ringbuf;

/// Number of alarm-panel dry-contact inputs wired to the board.
pub const ALARM_INPUTS: usize = 3;

/// Maximum length of a single reassembled line, including the classifier's
/// payload slice (spec §4.1: 200-byte line limit).
pub const MAX_LINE_LEN: usize = 200;

/// Maximum length of a telephone number or per-input message, plus NUL.
pub const MAX_FIELD_LEN: usize = 49;

/// Exact length of the shared-secret password.
pub const PASSWORD_LEN: usize = 6;
