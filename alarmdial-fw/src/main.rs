#![no_std]
#![no_main]

mod board;
mod isr;

use panic_halt as _;

use cortex_m_rt::entry;
use embassy_nrf::gpio::{Input, Level, Output, OutputDrive, Pull};
use embassy_nrf::nvmc::Nvmc;
use embassy_nrf::uarte::{self, Uarte};
use embassy_nrf::wdt::{self, Watchdog as WatchdogPeripheral};
use embassy_nrf::{bind_interrupts, interrupt, peripherals};
use embassy_time::{Duration, Instant};

use alarmdial_core::device::Device;
use alarmdial_core::{bootstrap, fatal_error};

use board::{
    BoardClock, BoardCriticalSection, BoardDebugWriter, BoardDelay, BoardFlash, BoardInput, BoardOutput, BoardUart,
    BoardUartRx, BoardWatchdog,
};

bind_interrupts!(struct Irqs {
    SERIAL0 => uarte::InterruptHandler<peripherals::SERIAL0>;
    SERIAL1 => uarte::InterruptHandler<peripherals::SERIAL1>;
});

/// Offset of the reserved config page within the chip's flash, matching
/// the linker script's carve-out at the top of the address space.
const CONFIG_FLASH_OFFSET: u32 = 0x0007_F000;

const LOOP_PACING: Duration = Duration::from_millis(10);

#[entry]
fn main() -> ! {
    let p = embassy_nrf::init(Default::default());

    let mut uart_config = uarte::Config::default();
    uart_config.parity = uarte::Parity::EXCLUDED;
    uart_config.baudrate = uarte::Baudrate::BAUD9600;
    let uart = Uarte::new(p.SERIAL0, p.P0_26, p.P0_27, Irqs, uart_config);
    // RX is never driven through embassy's own interrupt handler: C8 needs
    // the raw UARTE0 vector (`isr::UARTE0_UART0`) pushing straight into the
    // ring buffer, so only the TX half is kept here.
    let (tx, _rx) = uart.split();
    let mut boot_uart = BoardUart::new(tx);
    let mut boot_rx = BoardUartRx;
    let mut boot_delay = BoardDelay;
    let clock = BoardClock;

    bootstrap::run(&mut boot_uart, &mut boot_rx, &mut boot_delay, &clock);

    let led = Output::new(p.P0_00, Level::Low, OutputDrive::Standard);
    let alarm_inputs = [
        Input::new(p.P0_02, Pull::Up),
        Input::new(p.P0_03, Pull::Up),
        Input::new(p.P0_04, Pull::Up),
    ]
    .map(BoardInput::new);
    let reset_line = BoardInput::new(Input::new(p.P0_05, Pull::Up));

    // Debug trace UART (spec §6), mirroring the donor's UART1 trace output —
    // TX-only in spirit, the RX half is just never read from.
    let mut trace_config = uarte::Config::default();
    trace_config.parity = uarte::Parity::EXCLUDED;
    trace_config.baudrate = uarte::Baudrate::BAUD115200;
    let trace_uart = Uarte::new(p.SERIAL1, p.P0_01, p.P0_28, Irqs, trace_config);
    let (trace_tx, _trace_rx) = trace_uart.split();
    let debug = BoardDebugWriter::new(trace_tx);

    let nvmc = Nvmc::new(p.NVMC);
    let flash = BoardFlash::new(nvmc, CONFIG_FLASH_OFFSET);

    let mut wdt_config = wdt::Config::default();
    wdt_config.timeout_ticks = 32_768 * 8; // 8 s (spec §5)
    let (watchdog_handle, _) = match WatchdogPeripheral::try_new(p.WDT, wdt_config) {
        Ok(pair) => pair,
        Err(_) => fatal_error!("watchdog already running at boot"),
    };
    let watchdog = BoardWatchdog::new(watchdog_handle);

    // Now that bootstrap no longer needs direct register access, install
    // the RX vector and let the interrupt producer (C8) take over.
    unsafe {
        cortex_m::peripheral::NVIC::unmask(interrupt::UARTE0_UART0);
    }

    let mut device = Device::new(
        &isr::RING,
        boot_uart,
        alarm_inputs,
        reset_line,
        BoardOutput::new(led),
        flash,
        BoardCriticalSection,
        watchdog,
        debug,
        Instant::now(),
    );

    loop {
        device.step(Instant::now());
        let deadline = Instant::now() + LOOP_PACING;
        while Instant::now() < deadline {}
    }
}
