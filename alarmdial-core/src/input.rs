//! Input Monitor (C5, spec §4.5).
//!
//! Polls the alarm-panel dry contacts and the password-reset button at
//! 1 Hz, active-low, and reacts with an immediate SMS — bypassing the
//! dialogue engine's multi-stage queue entirely, same as
//! `original_source/AlarmDial.c`'s GPIO-check block in `main()`. No donor
//! equivalent exists; styled after the donor main loop's own
//! polling-with-a-last-checked-timestamp idiom.

use embassy_time::{Duration, Instant};

use crate::arbiter::Arbiter;
use crate::config::{default_config, ConfigStore};
use crate::engine::Engine;
use crate::hal::{DigitalInput, UartWriter};
use crate::ALARM_INPUTS;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const PASSWORD_RESET_DEBOUNCE: Duration = Duration::from_secs(10);

/// Tracks the last-seen level of each alarm input and the reset button's
/// rate limiter.
pub struct InputMonitor {
    last_poll: Instant,
    last_reset_check: Instant,
    last_reset_fired: Instant,
    last_state: [bool; ALARM_INPUTS],
}

impl InputMonitor {
    pub fn new(now: Instant) -> Self {
        Self {
            last_poll: now,
            last_reset_check: now,
            last_reset_fired: now,
            last_state: [false; ALARM_INPUTS],
        }
    }

    /// Polls the `K` alarm inputs at 1 Hz. An input whose active-low level
    /// changed since the last poll triggers the configured fall/rise SMS,
    /// provided its `notify_on_change` flag is set and no exchange is
    /// currently outstanding.
    pub fn poll_inputs<I: DigitalInput, U: UartWriter>(
        &mut self,
        inputs: &[I; ALARM_INPUTS],
        arbiter: &mut Arbiter,
        engine: &mut Engine,
        config: &ConfigStore,
        uart: &mut U,
        now: Instant,
    ) {
        if now - self.last_poll <= POLL_INTERVAL || arbiter.bus_busy() {
            return;
        }
        self.last_poll = now;
        for (idx, input) in inputs.iter().enumerate() {
            let status = !input.is_high();
            if status == self.last_state[idx] {
                continue;
            }
            self.last_state[idx] = status;
            if !config.live().notify_on_change[idx] {
                continue;
            }
            let body = if status {
                config.live().sms_on_fall[idx].clone()
            } else {
                config.live().sms_on_rise[idx].clone()
            };
            let tel_no = config.live().tel_no.clone();
            engine.send_sms_if_idle(arbiter, uart, tel_no.as_str(), body.as_str(), now);
        }
    }

    /// Polls the password-reset line at 1 Hz, rate-limited to once every
    /// 10 s: resets the password to its compiled-in default and confirms
    /// by SMS.
    pub fn poll_password_reset<I: DigitalInput, U: UartWriter>(
        &mut self,
        reset_line: &I,
        arbiter: &mut Arbiter,
        engine: &mut Engine,
        config: &mut ConfigStore,
        uart: &mut U,
        now: Instant,
    ) {
        if now - self.last_reset_check <= POLL_INTERVAL
            || now - self.last_reset_fired <= PASSWORD_RESET_DEBOUNCE
            || arbiter.bus_busy()
        {
            return;
        }
        self.last_reset_check = now;
        if reset_line.is_high() {
            return;
        }
        self.last_reset_fired = now;
        config.live_mut().password = default_config().password;
        config.mark_dirty();
        let tel_no = config.live().tel_no.clone();
        engine.send_sms_if_idle(arbiter, uart, tel_no.as_str(), "Password reset to default", now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::FlashDevice;

    fn t0() -> Instant {
        Instant::from_ticks(0)
    }

    struct FakeInput {
        high: bool,
    }
    impl DigitalInput for FakeInput {
        fn is_high(&self) -> bool {
            self.high
        }
    }

    #[derive(Default)]
    struct FakeUart {
        written: std::vec::Vec<u8>,
    }
    impl UartWriter for FakeUart {
        fn write_all(&mut self, data: &[u8]) {
            self.written.extend_from_slice(data);
        }
    }

    struct BlankFlash;
    impl FlashDevice for BlankFlash {
        fn erase_sector(&mut self) {}
        fn program(&mut self, _data: &[u8]) {}
        fn read(&self, data: &mut [u8]) {
            data.fill(0xFF);
        }
    }

    #[test]
    fn falling_edge_sends_the_fall_message() {
        let mut monitor = InputMonitor::new(t0());
        let mut arbiter = Arbiter::new(t0());
        let mut engine = Engine::new(t0());
        let config = ConfigStore::load(&BlankFlash);
        let mut uart = FakeUart::default();

        let inputs = [
            FakeInput { high: false },
            FakeInput { high: true },
            FakeInput { high: true },
        ];
        let later = t0() + Duration::from_secs(2);
        monitor.poll_inputs(&inputs, &mut arbiter, &mut engine, &config, &mut uart, later);

        assert!(arbiter.is_awaiting(crate::arbiter::ExchangeTag::Cmgs));
        let text = std::str::from_utf8(&uart.written).unwrap();
        assert!(text.contains("Intruder alarm triggered"));
    }

    #[test]
    fn no_notification_when_flag_is_off() {
        let mut monitor = InputMonitor::new(t0());
        let mut arbiter = Arbiter::new(t0());
        let mut engine = Engine::new(t0());
        let mut config = ConfigStore::load(&BlankFlash);
        config.live_mut().notify_on_change[0] = false;
        let mut uart = FakeUart::default();

        let inputs = [
            FakeInput { high: false },
            FakeInput { high: true },
            FakeInput { high: true },
        ];
        let later = t0() + Duration::from_secs(2);
        monitor.poll_inputs(&inputs, &mut arbiter, &mut engine, &config, &mut uart, later);

        assert!(uart.written.is_empty());
    }

    #[test]
    fn unchanged_level_sends_nothing() {
        let mut monitor = InputMonitor::new(t0());
        let mut arbiter = Arbiter::new(t0());
        let mut engine = Engine::new(t0());
        let config = ConfigStore::load(&BlankFlash);
        let mut uart = FakeUart::default();

        let inputs = [
            FakeInput { high: true },
            FakeInput { high: true },
            FakeInput { high: true },
        ];
        let later = t0() + Duration::from_secs(2);
        monitor.poll_inputs(&inputs, &mut arbiter, &mut engine, &config, &mut uart, later);
        assert!(uart.written.is_empty());
    }

    #[test]
    fn password_reset_is_rate_limited() {
        // `InputMonitor::new` seeds `last_reset_fired` at boot time, so the
        // same 10 s debounce that rate-limits repeat resets also suppresses
        // one fired within 10 s of boot (original_source/AlarmDial.c:420-421,
        // 985). `first` sits past that window so it isn't itself suppressed.
        let mut monitor = InputMonitor::new(t0());
        let mut arbiter = Arbiter::new(t0());
        let mut engine = Engine::new(t0());
        let mut config = ConfigStore::load(&BlankFlash);
        config.live_mut().password = crate::config::Password::try_from("000000").unwrap();
        let mut uart = FakeUart::default();
        let reset = FakeInput { high: false };

        let first = t0() + Duration::from_secs(11);
        monitor.poll_password_reset(&reset, &mut arbiter, &mut engine, &mut config, &mut uart, first);
        assert_eq!(config.live().password.as_str(), "674358");
        assert!(arbiter.is_awaiting(crate::arbiter::ExchangeTag::Cmgs));

        arbiter.complete(crate::arbiter::ExchangeTag::Cmgs);
        config.live_mut().password = crate::config::Password::try_from("111111").unwrap();
        uart.written.clear();

        let soon_after = first + Duration::from_secs(3);
        monitor.poll_password_reset(&reset, &mut arbiter, &mut engine, &mut config, &mut uart, soon_after);
        // still rate-limited: password unchanged, no SMS sent.
        assert_eq!(config.live().password.as_str(), "111111");
        assert!(uart.written.is_empty());

        let much_later = first + Duration::from_secs(11);
        monitor.poll_password_reset(&reset, &mut arbiter, &mut engine, &mut config, &mut uart, much_later);
        assert_eq!(config.live().password.as_str(), "674358");
        assert!(!uart.written.is_empty());
    }
}
