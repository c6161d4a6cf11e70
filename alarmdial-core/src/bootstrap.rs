//! Modem Bootstrap (C9, spec §4.9).
//!
//! The fixed reboot-then-initialise sequence run once at power-on, before
//! the interrupt-driven ring buffer and the dialogue engine take over.
//! Every command, timeout, and retry count here is lifted directly from
//! `original_source/AlarmDial.c`'s `initialise_modem` and its
//! `write_command_with_response_check` helper. No donor equivalent exists
//! (the nRF91 modem brings itself up via `embassy-net-nrf91`); grounded
//! instead on the donor main.rs's habit of a flat, linear bring-up
//! sequence with one step per statement.

use embassy_time::Duration;

use crate::hal::{Clock, Delay, UartByteSource, UartWriter};
use crate::line::Line;

const RETRIES: u8 = 3;

/// Settle time before and after `AT+CRESET`, matching the source's two
/// `sleep_ms` calls bracketing the reset.
pub const PRE_RESET_DELAY_MS: u32 = 10_000;
pub const POST_RESET_DELAY_MS: u32 = 30_000;

/// One step of the fixed initialisation sequence: an AT command and how
/// long to wait for its `OK` before retrying.
pub struct Step {
    pub command: &'static str,
    pub timeout: Duration,
}

/// The nine-command sequence `initialise_modem` issues after reset, in
/// order, each retried up to [`RETRIES`] times on timeout.
pub const INIT_SEQUENCE: [Step; 9] = [
    Step { command: "ATE0\r", timeout: Duration::from_secs(120) },
    Step { command: "AT&D0\r", timeout: Duration::from_secs(9) },
    Step { command: "ATV1\r", timeout: Duration::from_secs(9) },
    Step {
        command: "AT+CGEREP=0,0;+CVHU=0;+CLIP=0;+CLCC=1\r",
        timeout: Duration::from_secs(36),
    },
    Step {
        command: "AT+CNMP=2;+CSCS=\"IRA\";+CMGF=1;+CNMI=2,1\r",
        timeout: Duration::from_secs(36),
    },
    Step { command: "AT+CPMS=\"SM\",\"SM\",\"SM\"\r", timeout: Duration::from_secs(9) },
    Step { command: "AT+CMGD=0,4\r", timeout: Duration::from_secs(9) },
    Step { command: "AT+CPMS=\"ME\",\"ME\",\"ME\"\r", timeout: Duration::from_secs(9) },
    Step { command: "AT+CMGD=0,4\r", timeout: Duration::from_secs(9) },
];

/// Reads one line directly off the UART, bypassing the ring buffer
/// (bootstrap runs before the RX interrupt is installed). Returns `None`
/// on timeout with whatever was read so far discarded, matching the
/// source's `read_message`.
fn read_line_with_timeout<R: UartByteSource, C: Clock>(rx: &mut R, clock: &C, timeout: Duration) -> Option<Line> {
    let deadline = clock.now() + timeout;
    let mut line = Line::new();
    loop {
        match rx.try_read() {
            Some(b'\n') => return Some(line),
            Some(b'\r') => {}
            Some(byte) => {
                let _ = line.push(byte as char);
            }
            None => {
                if clock.now() > deadline {
                    return None;
                }
            }
        }
    }
}

/// Sends `command`, retrying up to [`RETRIES`] times until a line starting
/// with `OK` arrives within `timeout`. All other lines are discarded,
/// matching `write_command_with_response_check`'s "loop until we see the
/// target or time out, then retry the whole command" behaviour.
fn write_command_with_ok<U: UartWriter, R: UartByteSource, C: Clock>(
    uart: &mut U,
    rx: &mut R,
    clock: &C,
    command: &str,
    timeout: Duration,
) -> bool {
    for _ in 0..RETRIES {
        uart.write_all(command.as_bytes());
        loop {
            match read_line_with_timeout(rx, clock, timeout) {
                Some(line) if line.starts_with("OK") => return true,
                Some(_) => continue,
                None => break,
            }
        }
    }
    false
}

/// Runs the full bring-up sequence. Step failures aren't surfaced or
/// retried beyond [`RETRIES`] — matching the source's documented choice
/// that there's nothing sensible software can do about a modem that
/// won't initialise this early, short of the periodic CPSI liveness probe
/// eventually forcing a watchdog reboot once the main loop starts.
pub fn run<U: UartWriter, R: UartByteSource, D: Delay, C: Clock>(uart: &mut U, rx: &mut R, delay: &mut D, clock: &C) {
    delay.delay_ms(PRE_RESET_DELAY_MS);
    uart.write_all(b"AT+CRESET\r");
    delay.delay_ms(POST_RESET_DELAY_MS);
    for step in INIT_SEQUENCE.iter() {
        write_command_with_ok(uart, rx, clock, step.command, step.timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::{Cell, RefCell};
    use embassy_time::Instant;
    use std::collections::VecDeque;

    struct FakeUart {
        written: RefCell<std::vec::Vec<std::vec::Vec<u8>>>,
    }
    impl FakeUart {
        fn new() -> Self {
            Self { written: RefCell::new(std::vec::Vec::new()) }
        }
    }
    impl UartWriter for FakeUart {
        fn write_all(&mut self, data: &[u8]) {
            self.written.borrow_mut().push(data.to_vec());
        }
    }

    struct FakeDelay {
        total_ms: u32,
    }
    impl Delay for FakeDelay {
        fn delay_ms(&mut self, ms: u32) {
            self.total_ms += ms;
        }
    }

    struct TickingClock {
        instant: Cell<Instant>,
        step: Duration,
    }
    impl Clock for TickingClock {
        fn now(&self) -> Instant {
            let current = self.instant.get();
            self.instant.set(current + self.step);
            current
        }
    }

    struct ScriptedRx {
        queue: RefCell<VecDeque<u8>>,
    }
    impl ScriptedRx {
        fn with(bytes: &[u8]) -> Self {
            Self { queue: RefCell::new(bytes.iter().copied().collect()) }
        }
        fn empty() -> Self {
            Self { queue: RefCell::new(VecDeque::new()) }
        }
    }
    impl UartByteSource for ScriptedRx {
        fn try_read(&mut self) -> Option<u8> {
            self.queue.borrow_mut().pop_front()
        }
    }

    fn clock(step_ms: u64) -> TickingClock {
        TickingClock {
            instant: Cell::new(Instant::from_ticks(0)),
            step: Duration::from_millis(step_ms),
        }
    }

    #[test]
    fn read_line_returns_available_line_without_timing_out() {
        let mut rx = ScriptedRx::with(b"OK\r\n");
        let clk = clock(0);
        let line = read_line_with_timeout(&mut rx, &clk, Duration::from_secs(1)).unwrap();
        assert_eq!(line.as_str(), "OK");
    }

    #[test]
    fn read_line_times_out_when_nothing_arrives() {
        let mut rx = ScriptedRx::empty();
        let clk = clock(100);
        let line = read_line_with_timeout(&mut rx, &clk, Duration::from_millis(50));
        assert!(line.is_none());
    }

    #[test]
    fn write_command_succeeds_on_first_response() {
        let mut uart = FakeUart::new();
        let mut rx = ScriptedRx::with(b"OK\r\n");
        let clk = clock(0);
        assert!(write_command_with_ok(&mut uart, &mut rx, &clk, "ATE0\r", Duration::from_secs(1)));
        assert_eq!(uart.written.borrow().len(), 1);
    }

    #[test]
    fn write_command_retries_up_to_the_limit_then_gives_up() {
        let mut uart = FakeUart::new();
        let mut rx = ScriptedRx::empty();
        let clk = clock(100);
        assert!(!write_command_with_ok(&mut uart, &mut rx, &clk, "ATE0\r", Duration::from_millis(10)));
        assert_eq!(uart.written.borrow().len(), RETRIES as usize);
    }

    #[test]
    fn full_sequence_issues_reset_and_every_step() {
        let mut uart = FakeUart::new();
        let mut rx = ScriptedRx::with(b"OK\r\nOK\r\nOK\r\nOK\r\nOK\r\nOK\r\nOK\r\nOK\r\nOK\r\n");
        let mut delay = FakeDelay { total_ms: 0 };
        let clk = clock(0);
        run(&mut uart, &mut rx, &mut delay, &clk);
        assert_eq!(delay.total_ms, PRE_RESET_DELAY_MS + POST_RESET_DELAY_MS);
        // AT+CRESET plus the nine init-sequence commands.
        assert_eq!(uart.written.borrow().len(), 1 + INIT_SEQUENCE.len());
        assert_eq!(uart.written.borrow()[0], b"AT+CRESET\r".to_vec());
    }
}
