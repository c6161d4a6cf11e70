//! Error taxonomy for the dialogue manager.
//!
//! Mirrors the donor firmware's register-of-named-failure-modes style: one
//! flat enum, a `Display` impl, and a `fatal_error!` escape hatch for
//! genuinely unexpected boot-time failures (e.g. the watchdog peripheral
//! already running when `alarmdial-fw::main` goes to claim it). The
//! CPSI-offline reboot (spec §4.4.1/§7) is a *named*, expected failure
//! mode rather than a programming error, so it takes the more specific
//! path instead: `Engine::on_line` reports it as `LoopSignal::ModemOffline`
//! and `Device::step` calls `hal::Watchdog::force_reboot_after` directly.

use core::fmt;

/// Application error type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The exchange arbiter is busy; the caller must wait for idle.
    BusBusy,
    /// A fixed-capacity buffer (line, field, ring buffer) could not hold
    /// the requested data and the write was truncated or rejected.
    Capacity,
    /// The persisted configuration record failed its checksum.
    ChecksumMismatch,
    /// A response arrived that the arbiter was not expecting.
    UnexpectedResponse,
    /// An exchange's deadline elapsed before its response arrived.
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BusBusy => write!(f, "exchange bus is busy"),
            Error::Capacity => write!(f, "fixed-capacity buffer exhausted"),
            Error::ChecksumMismatch => write!(f, "config record checksum mismatch"),
            Error::UnexpectedResponse => write!(f, "unexpected modem response"),
            Error::Timeout => write!(f, "exchange timed out"),
        }
    }
}

/// Result type alias for this crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Halt the firmware after a condition the spec says must not be
/// recovered from in software (only the watchdog may reboot the device).
///
/// # Safety
/// Never returns.
#[inline(never)]
#[cold]
pub fn fatal_error(file: &str, line: u32, msg: &str) -> ! {
    panic!("FATAL ERROR at {}:{}: {}", file, line, msg);
}

/// Trigger a fatal halt with file/line context.
#[macro_export]
macro_rules! fatal_error {
    ($msg:expr) => {
        $crate::error::fatal_error(file!(), line!(), $msg)
    };
}
