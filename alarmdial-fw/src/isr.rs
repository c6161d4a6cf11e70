//! Interrupt Producer (C8, spec §4.8).
//!
//! The raw UARTE0 RX vector: on every `ENDRX`/`RXDRDY` event it drains
//! whatever the hardware has ready into the shared ring buffer and
//! immediately returns. This is the only preemptive actor in the whole
//! firmware (spec §5) — everything else runs from the cooperative loop in
//! [`alarmdial_core::device::Device::step`].
//!
//! Modelled on the donor's own raw vector, `modem.rs`'s `#[interrupt] fn
//! IPC()`: a single hardware callback that does the minimum possible work
//! against a statically-owned piece of shared state and returns. Unlike
//! the donor, this firmware can't hand the byte stream off to
//! `embassy-net-nrf91`'s own IPC machinery — there is no such driver for a
//! plain external AT modem — so the vector here talks to the UARTE
//! peripheral registers directly instead of going through
//! `embassy_nrf::uarte`'s own (executor-driven) interrupt handler.

use embassy_nrf::interrupt;
use embassy_nrf::pac;

use alarmdial_core::ringbuf::RingBuffer;

/// Backing storage for the byte stream shared between this ISR and the
/// main loop, in the donor's `static mut TRACE_UART_BUF`-style placement —
/// a `'static` the ISR and `main` both reach without passing it as an
/// argument across the interrupt boundary.
pub static RING: RingBuffer = RingBuffer::new();

/// UARTE0 RX data-ready vector. Pushes every byte the peripheral has ready
/// into [`RING`], clearing the event as it goes so the interrupt doesn't
/// immediately re-fire.
#[interrupt]
fn UARTE0_UART0() {
    let uarte = pac::UARTE0;
    while uarte.events_rxdrdy().read() != 0 {
        uarte.events_rxdrdy().write_value(0);
        let byte = uarte.rxd().read() as u8;
        RING.push(byte);
    }
}
