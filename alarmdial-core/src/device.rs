//! Scheduler / Main Loop (C7, spec §4.7).
//!
//! The hardware-agnostic body of the single cooperative loop: one call to
//! [`Device::step`] per iteration. `alarmdial-fw::main` owns the `loop {}`,
//! the 10 ms pacing sleep, and the concrete `hal` implementations; this
//! module owns everything else, so the whole nine-step sequence from
//! `original_source/AlarmDial.c`'s `main()` can run and be tested on the
//! host. No donor equivalent exists (the nRF91 firmware's loop lives behind
//! `embassy-executor` tasks); shaped instead after the donor's flat
//! `Device`-owns-its-peripherals struct in spirit, generalised to this
//! crate's own set of `hal` traits.

use embassy_time::{Duration, Instant};

use crate::arbiter::Arbiter;
use crate::classify::classify;
use crate::config::ConfigStore;
use crate::engine::{Engine, LoopSignal};
use crate::hal::{CriticalSection, DigitalInput, DigitalOutput, FlashDevice, UartWriter, Watchdog};
use crate::input::InputMonitor;
use crate::line::next_line;
use crate::logger::DebugWriter;
use crate::ringbuf::RingBuffer;
use crate::ALARM_INPUTS;

const LED_TOGGLE_INTERVAL: Duration = Duration::from_secs(1);

/// Owns the live dialogue state and every `hal` handle the main loop
/// touches. Generic over the concrete peripheral types so `alarmdial-fw`
/// can plug in `embassy-nrf` singletons while this crate's tests plug in
/// fakes.
pub struct Device<'a, U, I, O, F, CS, W, L> {
    ring: &'a RingBuffer,
    arbiter: Arbiter,
    engine: Engine,
    input_monitor: InputMonitor,
    config: ConfigStore,
    uart: U,
    inputs: [I; ALARM_INPUTS],
    reset_line: I,
    led: O,
    flash: F,
    critical_section: CS,
    watchdog: W,
    debug: L,
    last_led_toggle: Instant,
    led_on: bool,
}

impl<'a, U, I, O, F, CS, W, L> Device<'a, U, I, O, F, CS, W, L>
where
    U: UartWriter,
    I: DigitalInput,
    O: DigitalOutput,
    F: FlashDevice,
    CS: CriticalSection,
    W: Watchdog,
    L: DebugWriter,
{
    /// Boots the device's in-memory state: loads config from flash (or
    /// defaults on checksum mismatch, spec §4.6) and starts every timer
    /// from `now`. Does not touch the modem — that's [`crate::bootstrap`],
    /// run separately before the ring buffer and this loop even exist.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ring: &'a RingBuffer,
        uart: U,
        inputs: [I; ALARM_INPUTS],
        reset_line: I,
        led: O,
        flash: F,
        critical_section: CS,
        watchdog: W,
        debug: L,
        now: Instant,
    ) -> Self {
        let config = ConfigStore::load(&flash);
        Self {
            ring,
            arbiter: Arbiter::new(now),
            engine: Engine::new(now),
            input_monitor: InputMonitor::new(now),
            config,
            uart,
            inputs,
            reset_line,
            led,
            flash,
            critical_section,
            watchdog,
            debug,
            last_led_toggle: now,
            led_on: false,
        }
    }

    /// Runs one iteration of the nine-step sequence (spec §4.7). The 10 ms
    /// pacing sleep between iterations is the caller's job.
    pub fn step(&mut self, now: Instant) {
        // (2) kick watchdog
        self.watchdog.feed();

        // (3) reassemble and classify one line, if one is fully buffered
        if self.ring.pending_lines() > 0 {
            if let Some(line) = next_line(self.ring) {
                crate::log!(self.debug, "<< {}", line.as_str());
                let tag = classify(&line);
                let signal = self
                    .engine
                    .on_line(tag, &line, &mut self.arbiter, &mut self.config, &mut self.uart, now);
                if signal == LoopSignal::ModemOffline {
                    // (spec §4.4.1/§7): force a full device reboot rather
                    // than attempt any software recovery of a dead modem.
                    crate::log!(self.debug, "modem offline, forcing reboot");
                    self.watchdog.force_reboot_after(1);
                }
            }
        }

        // (4)/(5): bus_busy is recomputed by the arbiter on demand; service
        // periodic probes, the SMS prompt handshake, and input monitoring.
        self.engine.poll_periodic(&mut self.arbiter, &mut self.uart, now);
        self.engine.poll_sms_prompt_fallback(&mut self.uart, now);
        self.input_monitor.poll_inputs(
            &self.inputs,
            &mut self.arbiter,
            &mut self.engine,
            &self.config,
            &mut self.uart,
            now,
        );
        self.input_monitor.poll_password_reset(
            &self.reset_line,
            &mut self.arbiter,
            &mut self.engine,
            &mut self.config,
            &mut self.uart,
            now,
        );

        // (6) expire timeouts
        for tag in self.arbiter.tick(now) {
            self.engine.on_timeout(tag);
        }

        // (8) heartbeat LED, once a second
        if now - self.last_led_toggle > LED_TOGGLE_INTERVAL {
            self.last_led_toggle = now;
            self.led_on = !self.led_on;
            if self.led_on {
                self.led.set_high();
            } else {
                self.led.set_low();
            }
        }

        // (9) commit dirty config, only while the bus is idle
        self.config
            .commit_if_idle(self.arbiter.bus_busy(), &mut self.flash, &self.critical_section);
    }
}
