//! Config Store (C6, spec §3, §4.6).
//!
//! The persisted record's exact byte layout (checksum byte, then
//! NUL-terminated password/tel-no/per-input messages, then boolean flags)
//! is lifted straight from `original_source/AlarmDial.c`'s flash-encoding
//! loop at the end of `main()`; there's no donor equivalent since the
//! nRF91 board keeps no local alarm configuration at all.

use crate::hal::{CriticalSection, FlashDevice};
use crate::{ALARM_INPUTS, MAX_FIELD_LEN, PASSWORD_LEN};

/// Size of the persisted record (spec §3).
pub const RECORD_SIZE: usize = 1024;

pub type Field = heapless::String<MAX_FIELD_LEN>;
pub type Password = heapless::String<PASSWORD_LEN>;

/// The live configuration — the single mutable source of truth at runtime
/// (spec §3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub password: Password,
    pub tel_no: Field,
    pub sms_on_fall: [Field; ALARM_INPUTS],
    pub sms_on_rise: [Field; ALARM_INPUTS],
    pub notify_on_change: [bool; ALARM_INPUTS],
}

/// Compile-time defaults, applied on first boot or checksum mismatch
/// (spec §4.6).
pub fn default_config() -> Config {
    Config {
        password: Password::try_from("674358").unwrap(),
        tel_no: Field::try_from("+447700900000").unwrap(),
        sms_on_fall: [
            Field::try_from("Intruder alarm triggered").unwrap(),
            Field::try_from("Alarm system armed").unwrap(),
            Field::try_from("Panic button pressed").unwrap(),
        ],
        sms_on_rise: [
            Field::try_from("Intruder alarm cleared").unwrap(),
            Field::try_from("Alarm system disarmed").unwrap(),
            Field::try_from("Panic button cleared").unwrap(),
        ],
        notify_on_change: [true; ALARM_INPUTS],
    }
}

fn checksum_of(buf: &[u8; RECORD_SIZE]) -> u8 {
    buf[1..].iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

fn write_field(buf: &mut [u8; RECORD_SIZE], pos: usize, bytes: &[u8]) -> usize {
    let mut p = pos;
    for &b in bytes {
        buf[p] = b;
        p += 1;
    }
    buf[p] = 0;
    p + 1
}

fn read_field(buf: &[u8; RECORD_SIZE], pos: usize) -> Option<(&[u8], usize)> {
    let mut p = pos;
    while p < RECORD_SIZE && buf[p] != 0 {
        p += 1;
    }
    if p >= RECORD_SIZE {
        return None;
    }
    Some((&buf[pos..p], p + 1))
}

fn field_from_bytes<const N: usize>(bytes: &[u8]) -> Option<heapless::String<N>> {
    let s = core::str::from_utf8(bytes).ok()?;
    heapless::String::try_from(s).ok()
}

/// Serialises `cfg` into the on-flash layout (spec §3): byte 0 is the
/// additive 8-bit checksum over the rest of the buffer; bytes past the
/// last field are deterministically zero-filled (see DESIGN.md's Open
/// Question decision on this point — the source inherits flash's previous
/// contents there instead).
pub fn encode(cfg: &Config) -> [u8; RECORD_SIZE] {
    let mut buf = [0u8; RECORD_SIZE];
    let mut pos = 1usize;
    pos = write_field(&mut buf, pos, cfg.password.as_bytes());
    pos = write_field(&mut buf, pos, cfg.tel_no.as_bytes());
    for f in &cfg.sms_on_fall {
        pos = write_field(&mut buf, pos, f.as_bytes());
    }
    for f in &cfg.sms_on_rise {
        pos = write_field(&mut buf, pos, f.as_bytes());
    }
    for &n in &cfg.notify_on_change {
        buf[pos] = n as u8;
        pos += 1;
    }
    buf[0] = checksum_of(&buf);
    buf
}

/// Parses the on-flash layout. Returns `None` on checksum mismatch or a
/// malformed record (caller falls back to [`default_config`] per spec
/// §4.6).
pub fn decode(buf: &[u8; RECORD_SIZE]) -> Option<Config> {
    if checksum_of(buf) != buf[0] {
        return None;
    }
    let mut pos = 1usize;

    let (password_bytes, next) = read_field(buf, pos)?;
    let password: Password = field_from_bytes(password_bytes)?;
    pos = next;

    let (tel_bytes, next) = read_field(buf, pos)?;
    let tel_no: Field = field_from_bytes(tel_bytes)?;
    pos = next;

    let mut sms_on_fall: [Field; ALARM_INPUTS] = core::array::from_fn(|_| Field::new());
    for slot in sms_on_fall.iter_mut() {
        let (bytes, next) = read_field(buf, pos)?;
        *slot = field_from_bytes(bytes)?;
        pos = next;
    }

    let mut sms_on_rise: [Field; ALARM_INPUTS] = core::array::from_fn(|_| Field::new());
    for slot in sms_on_rise.iter_mut() {
        let (bytes, next) = read_field(buf, pos)?;
        *slot = field_from_bytes(bytes)?;
        pos = next;
    }

    let mut notify_on_change = [false; ALARM_INPUTS];
    for slot in notify_on_change.iter_mut() {
        if pos >= RECORD_SIZE {
            return None;
        }
        *slot = buf[pos] != 0;
        pos += 1;
    }

    Some(Config {
        password,
        tel_no,
        sms_on_fall,
        sms_on_rise,
        notify_on_change,
    })
}

/// Owns the live config, its dirty flag, and the flash commit sequence.
pub struct ConfigStore {
    live: Config,
    dirty: bool,
}

impl ConfigStore {
    /// Loads the record from flash, recomputing the checksum and falling
    /// back to defaults (and marking the store dirty, so the defaults get
    /// written back on the first idle tick) on mismatch (spec §4.6).
    pub fn load<F: FlashDevice>(flash: &F) -> Self {
        let mut buf = [0u8; RECORD_SIZE];
        flash.read(&mut buf);
        match decode(&buf) {
            Some(live) => Self { live, dirty: false },
            None => Self {
                live: default_config(),
                dirty: true,
            },
        }
    }

    pub fn live(&self) -> &Config {
        &self.live
    }

    pub fn live_mut(&mut self) -> &mut Config {
        &mut self.live
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Commits the live config to flash, but only if the bus is idle and
    /// the store is actually dirty (spec §4.6, §4.7 step 9). Erase and
    /// program happen inside the one critical section this firmware needs
    /// (spec §5).
    pub fn commit_if_idle<F: FlashDevice, CS: CriticalSection>(
        &mut self,
        bus_busy: bool,
        flash: &mut F,
        critical_section: &CS,
    ) {
        if !self.dirty || bus_busy {
            return;
        }
        let encoded = encode(&self.live);
        critical_section.with_interrupts_disabled(|| {
            flash.erase_sector();
            flash.program(&encoded);
        });
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;

    struct FakeFlash {
        region: RefCell<[u8; RECORD_SIZE]>,
    }

    impl FakeFlash {
        fn blank() -> Self {
            Self {
                region: RefCell::new([0xFFu8; RECORD_SIZE]),
            }
        }

        fn holding(buf: [u8; RECORD_SIZE]) -> Self {
            Self {
                region: RefCell::new(buf),
            }
        }
    }

    impl FlashDevice for FakeFlash {
        fn erase_sector(&mut self) {
            *self.region.borrow_mut() = [0u8; RECORD_SIZE];
        }
        fn program(&mut self, data: &[u8]) {
            self.region.borrow_mut().copy_from_slice(data);
        }
        fn read(&self, data: &mut [u8]) {
            data.copy_from_slice(&*self.region.borrow());
        }
    }

    struct NoOpCriticalSection;
    impl CriticalSection for NoOpCriticalSection {
        fn with_interrupts_disabled<F: FnOnce()>(&self, f: F) {
            f();
        }
    }

    #[test]
    fn checksum_round_trips() {
        let cfg = default_config();
        let encoded = encode(&cfg);
        assert_eq!(encoded[0], checksum_of(&encoded));
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, cfg);
    }

    #[test]
    fn round_trip_after_field_edits() {
        let mut cfg = default_config();
        cfg.tel_no = Field::try_from("+447911123456").unwrap();
        cfg.password = Password::try_from("000000").unwrap();
        cfg.sms_on_fall[1] = Field::try_from("Zone 2 triggered").unwrap();
        cfg.notify_on_change[2] = false;
        let encoded = encode(&cfg);
        assert_eq!(decode(&encoded).unwrap(), cfg);
    }

    #[test]
    fn checksum_mismatch_falls_back_to_defaults_and_marks_dirty() {
        let flash = FakeFlash::blank(); // 0xFF everywhere: checksum won't match byte 0
        let store = ConfigStore::load(&flash);
        assert_eq!(store.live(), &default_config());
        assert!(store.is_dirty());
    }

    #[test]
    fn valid_record_loads_clean() {
        let cfg = default_config();
        let flash = FakeFlash::holding(encode(&cfg));
        let store = ConfigStore::load(&flash);
        assert_eq!(store.live(), &cfg);
        assert!(!store.is_dirty());
    }

    #[test]
    fn commit_only_happens_when_idle_and_dirty() {
        let mut flash = FakeFlash::blank();
        let mut store = ConfigStore::load(&flash);
        assert!(store.is_dirty());

        // Busy: must not commit.
        store.commit_if_idle(true, &mut flash, &NoOpCriticalSection);
        assert!(store.is_dirty());

        // Idle: commits and clears dirty.
        store.commit_if_idle(false, &mut flash, &NoOpCriticalSection);
        assert!(!store.is_dirty());

        let mut buf = [0u8; RECORD_SIZE];
        flash.read(&mut buf);
        assert_eq!(decode(&buf).unwrap(), default_config());

        // Clean: a second idle tick is a no-op (no re-erase needed, but
        // harmless either way — we just check dirty stays false).
        store.commit_if_idle(false, &mut flash, &NoOpCriticalSection);
        assert!(!store.is_dirty());
    }
}
