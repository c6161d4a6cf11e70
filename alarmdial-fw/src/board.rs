//! Concrete `hal` trait implementations wrapping `embassy-nrf` peripheral
//! singletons, grounded on the donor's `main.rs` peripheral bring-up block
//! (`embassy_nrf::init`, `Uarte::new`, `Output::new`) and generalised to
//! cover the OUT-OF-SCOPE collaborators this spec names that the donor
//! never needed: on-chip flash and the watchdog timer.

use embassy_nrf::gpio::{Input, Output};
use embassy_nrf::nvmc::Nvmc;
use embassy_nrf::uarte::UarteTx;
use embassy_nrf::wdt::WatchdogHandle;
use embassy_time::{Duration, Instant};
use embedded_io::Write as _;

use alarmdial_core::config::RECORD_SIZE;
use alarmdial_core::hal;
use alarmdial_core::logger::DebugWriter;

/// Blocking UART writer, the modem command path (spec §4.8: RX is the
/// interrupt producer's job; TX never needs to be interrupt-driven since
/// the arbiter already guarantees at most one outstanding write at a
/// time).
pub struct BoardUart<'d> {
    tx: UarteTx<'d>,
}

impl<'d> BoardUart<'d> {
    pub fn new(tx: UarteTx<'d>) -> Self {
        Self { tx }
    }
}

impl hal::UartWriter for BoardUart<'_> {
    fn write_all(&mut self, data: &[u8]) {
        // Blocking write: the dialogue engine already serialises exchanges,
        // so there's never a concurrent writer to starve. Goes through
        // `embedded_io::Write` rather than `UarteTx`'s own inherent
        // `blocking_write` so this hal impl is the usual embedded-io
        // trait-extension shape instead of a driver-specific one-off.
        let _ = self.tx.write_all(data);
    }
}

/// Raw-register byte reader used only by [`alarmdial_core::bootstrap`],
/// before the RX interrupt (C8) is installed.
pub struct BoardUartRx;

impl hal::UartByteSource for BoardUartRx {
    fn try_read(&mut self) -> Option<u8> {
        let uarte = embassy_nrf::pac::UARTE0;
        if uarte.events_rxdrdy().read() == 0 {
            return None;
        }
        uarte.events_rxdrdy().write_value(0);
        Some(uarte.rxd().read() as u8)
    }
}

/// Debug trace sink (spec §6: "optional line-oriented debug output"),
/// grounded on the donor's trace UART on SERIAL1 — plain blocking writes
/// here rather than the donor's `BufferedUarteTx`/trace-forwarding task
/// pair, since this firmware has no async executor to run one on.
pub struct BoardDebugWriter<'d> {
    tx: UarteTx<'d>,
}

impl<'d> BoardDebugWriter<'d> {
    pub fn new(tx: UarteTx<'d>) -> Self {
        Self { tx }
    }
}

impl DebugWriter for BoardDebugWriter<'_> {
    fn write_line(&mut self, line: &str) {
        let _ = self.tx.write_all(line.as_bytes());
        let _ = self.tx.write_all(b"\r\n");
    }
}

/// The config record's backing flash region (spec §3, §4.6): one NVMC page
/// reserved at the top of flash by the linker script.
pub struct BoardFlash {
    nvmc: Nvmc<'static>,
    offset: u32,
}

impl BoardFlash {
    pub fn new(nvmc: Nvmc<'static>, offset: u32) -> Self {
        Self { nvmc, offset }
    }
}

impl hal::FlashDevice for BoardFlash {
    fn erase_sector(&mut self) {
        let _ = self.nvmc.erase(self.offset, self.offset + RECORD_SIZE as u32);
    }

    fn program(&mut self, data: &[u8]) {
        let _ = self.nvmc.write(self.offset, data);
    }

    fn read(&self, data: &mut [u8]) {
        // `Nvmc::read` only needs `&self` on real silicon (flash is
        // memory-mapped), but the driver's API takes `&mut self` — held
        // behind `unsafe` here since this crate's `hal::FlashDevice::read`
        // is documented as read-only and flash reads never race the
        // interrupt producer.
        let nvmc = &self.nvmc as *const Nvmc<'static> as *mut Nvmc<'static>;
        let _ = unsafe { (*nvmc).read(self.offset, data) };
    }
}

/// Hardware watchdog (spec §5: 8 s reboot-on-hang; spec §4.4.1: 1 ms
/// arm-and-spin on a dead modem).
pub struct BoardWatchdog {
    handle: WatchdogHandle,
}

impl BoardWatchdog {
    pub fn new(handle: WatchdogHandle) -> Self {
        Self { handle }
    }
}

impl hal::Watchdog for BoardWatchdog {
    fn feed(&mut self) {
        self.handle.pet();
    }

    fn force_reboot_after(&mut self, timeout_ms: u32) -> ! {
        // There is no software path back from here: once the modem has
        // reported itself offline the only sanctioned recovery is a full
        // device reset (spec §4.4.1/§7).
        let deadline = Instant::now() + Duration::from_millis(timeout_ms as u64);
        loop {
            if Instant::now() > deadline {
                cortex_m::peripheral::SCB::sys_reset();
            }
        }
    }
}

/// A sensed alarm-panel or reset-button contact.
pub struct BoardInput<'d> {
    pin: Input<'d>,
}

impl<'d> BoardInput<'d> {
    pub fn new(pin: Input<'d>) -> Self {
        Self { pin }
    }
}

impl hal::DigitalInput for BoardInput<'_> {
    fn is_high(&self) -> bool {
        self.pin.is_high()
    }
}

/// The heartbeat LED.
pub struct BoardOutput<'d> {
    pin: Output<'d>,
}

impl<'d> BoardOutput<'d> {
    pub fn new(pin: Output<'d>) -> Self {
        Self { pin }
    }
}

impl hal::DigitalOutput for BoardOutput<'_> {
    fn set_high(&mut self) {
        self.pin.set_high();
    }

    fn set_low(&mut self) {
        self.pin.set_low();
    }
}

/// The one critical section this firmware needs: disabling interrupts
/// around the flash erase/program pair in the config commit (spec §5).
pub struct BoardCriticalSection;

impl hal::CriticalSection for BoardCriticalSection {
    fn with_interrupts_disabled<F: FnOnce()>(&self, f: F) {
        critical_section::with(|_| f());
    }
}

/// A blocking delay, used only during modem bootstrap (C9) before
/// anything interrupt-driven exists to time things with instead. Spins on
/// [`embassy_time::Instant`] rather than a CPU-cycle busy loop, since
/// `embassy-time`'s RTC-backed time driver is already running by the time
/// `main` gets here.
pub struct BoardDelay;

impl hal::Delay for BoardDelay {
    fn delay_ms(&mut self, ms: u32) {
        let deadline = Instant::now() + Duration::from_millis(ms as u64);
        while Instant::now() < deadline {}
    }
}

/// The monotonic clock bootstrap (C9) uses for its own per-command
/// timeouts, since it polls [`BoardUartRx`] directly rather than going
/// through the ring buffer.
pub struct BoardClock;

impl hal::Clock for BoardClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
