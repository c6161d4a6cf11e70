//! Optional line-oriented debug trace (spec §6: "Optional line-oriented
//! debug output over USB (excluded from core scope)").
//!
//! Follows the donor's `log!` macro shape — format into a fixed-capacity
//! `heapless::String`, then hand the bytes to whatever sink is plugged in —
//! but routed through a trait instead of a concrete UART handle, since this
//! crate never touches real hardware. `alarmdial-fw` supplies the USB/UART
//! sink; tests can supply nothing at all (the macro is a no-op without the
//! `debug-log` feature).

/// A sink for debug trace lines. Implemented by the firmware binary over
/// whatever the board's debug transport is (typically USB CDC-ACM).
pub trait DebugWriter {
    fn write_line(&mut self, line: &str);
}

/// Format a message into a bounded buffer and hand it to a [`DebugWriter`].
///
/// Silently drops the line if it doesn't fit in 256 bytes, matching the
/// donor's fixed-capacity `heapless::String<256>` scratch buffer.
#[cfg(feature = "debug-log")]
#[macro_export]
macro_rules! log {
    ($writer:expr, $($arg:tt)*) => {{
        use core::fmt::Write as _;
        let mut buf: heapless::String<256> = heapless::String::new();
        if core::write!(&mut buf, $($arg)*).is_ok() {
            $crate::logger::DebugWriter::write_line(&mut $writer, &buf);
        }
    }};
}

#[cfg(not(feature = "debug-log"))]
#[macro_export]
macro_rules! log {
    ($writer:expr, $($arg:tt)*) => {{
        let _ = &$writer;
    }};
}

/// Log an AT command exchange (command sent, response received), matching
/// the donor's `log_at!` macro.
#[cfg(feature = "debug-log")]
#[macro_export]
macro_rules! log_at {
    ($writer:expr, $cmd:expr, $resp:expr) => {{
        $crate::log!($writer, ">> {}", $cmd);
        $crate::log!($writer, "<< {}", $resp);
    }};
}

#[cfg(not(feature = "debug-log"))]
#[macro_export]
macro_rules! log_at {
    ($writer:expr, $cmd:expr, $resp:expr) => {{
        let _ = (&$writer, &$cmd, &$resp);
    }};
}
