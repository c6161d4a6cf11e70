//! Interfaces for the OUT-OF-SCOPE external collaborators named in spec §1:
//! board bring-up, the low-level UART driver, the flash driver, and the
//! watchdog timer. This crate only ever talks to these through trait
//! objects/generics; `alarmdial-fw` provides the real `embassy-nrf`-backed
//! implementations, and `alarmdial-core`'s tests provide in-memory fakes.
//!
//! Grounded on the `Tx`/`RxWithIdle` split in the donor corpus's AT-command
//! broker (`other_examples` `at-uart.rs`): the physical layer is abstracted
//! away behind a pair of small traits so the dialogue logic never needs to
//! know whether it's talking to real silicon or a test double.

/// Non-blocking read of a single byte already sitting in the UART's
/// receive path. Used only by the interrupt producer (C8); the dialogue
/// manager never polls this directly.
pub trait UartByteSource {
    /// Returns the next received byte, or `None` if the receive FIFO is
    /// currently empty.
    fn try_read(&mut self) -> Option<u8>;
}

/// Blocking write of raw bytes to the modem UART (spec §6: CR-terminated
/// AT commands, `\x1A`-terminated SMS bodies).
pub trait UartWriter {
    fn write_all(&mut self, data: &[u8]);
}

/// The on-chip flash region backing the config record (spec §3, §4.6).
pub trait FlashDevice {
    /// Erase the sector backing the config record. Must be called before
    /// `program`.
    fn erase_sector(&mut self);
    /// Program `data` into the config record's flash region. `data.len()`
    /// is always exactly the record size.
    fn program(&mut self, data: &[u8]);
    /// Read the current contents of the config record's flash region into
    /// `data`. `data.len()` is always exactly the record size.
    fn read(&self, data: &mut [u8]);
}

/// The hardware watchdog timer (spec §5: 8 s reboot-on-hang; spec §4.4.1:
/// 1 ms arm-and-spin on a dead modem).
pub trait Watchdog {
    /// Reset the watchdog countdown. Called once per main-loop iteration.
    fn feed(&mut self);
    /// Re-arm the watchdog with a new timeout and stop feeding it,
    /// guaranteeing a reset after roughly `timeout_ms` milliseconds.
    fn force_reboot_after(&mut self, timeout_ms: u32) -> !;
}

/// A single sensed digital input (alarm contact or reset button), already
/// debounced at the electrical level by the board's pull-up wiring.
pub trait DigitalInput {
    /// Raw pin level: `true` if the pin reads high.
    fn is_high(&self) -> bool;
}

/// Critical-section guard used for the one place this firmware needs
/// interrupts disabled: the flash commit in C6 (spec §5).
pub trait CriticalSection {
    fn with_interrupts_disabled<F: FnOnce()>(&self, f: F);
}

/// A toggleable output (the heartbeat LED, spec §4.7/§6).
pub trait DigitalOutput {
    fn set_high(&mut self);
    fn set_low(&mut self);
}

/// A blocking millisecond delay, used only during modem bootstrap (C9)
/// before the interrupt-driven ring buffer exists to time anything else
/// (spec §4.9).
pub trait Delay {
    fn delay_ms(&mut self, ms: u32);
}

/// A monotonic clock. Bootstrap (C9) polls [`UartByteSource`] directly
/// rather than going through the ring buffer, so it needs its own way to
/// measure elapsed time for per-command timeouts.
pub trait Clock {
    fn now(&self) -> embassy_time::Instant;
}
