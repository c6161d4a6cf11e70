//! Exchange Arbiter (C3, spec §4.3).
//!
//! Owns the "bus busy" predicate and the per-command pending/deadline
//! state. No donor equivalent exists — the nRF91 driver hides exchange
//! bookkeeping behind `Control::at_command`'s blocking call — so this is
//! built directly from the spec, shaped like the donor's small stateful
//! structs (`registration.rs::RegistrationMonitor`) that pair a `Control`
//! call with locally-owned state and `embassy_time::Instant` deadlines.

use embassy_time::{Duration, Instant};
use heapless::Vec;

use crate::error::{Error, Result};

/// The AT exchanges this firmware itself initiates and waits on. `+CMTI`
/// and `+CLCC` are unsolicited and never appear here — nothing is ever
/// "awaiting" them, they just arrive (spec §3: "the interrupt producer
/// does not issue commands", and these two are the main loop's own
/// unsolicited-event handlers, not initiated exchanges).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeTag {
    Ok,
    Cpsi,
    Creg,
    Cmgd,
    Csq,
    Cmgs,
    Cmgr,
}

const COUNT: usize = 7;
const ALL: [ExchangeTag; COUNT] = [
    ExchangeTag::Ok,
    ExchangeTag::Cpsi,
    ExchangeTag::Creg,
    ExchangeTag::Cmgd,
    ExchangeTag::Csq,
    ExchangeTag::Cmgs,
    ExchangeTag::Cmgr,
];

impl ExchangeTag {
    fn index(self) -> usize {
        match self {
            ExchangeTag::Ok => 0,
            ExchangeTag::Cpsi => 1,
            ExchangeTag::Creg => 2,
            ExchangeTag::Cmgd => 3,
            ExchangeTag::Csq => 4,
            ExchangeTag::Cmgs => 5,
            ExchangeTag::Cmgr => 6,
        }
    }

    /// Per-command timeout (spec §4.3, §5): 60 s for OK, 9 s otherwise.
    fn timeout(self) -> Duration {
        match self {
            ExchangeTag::Ok => Duration::from_secs(60),
            _ => Duration::from_secs(9),
        }
    }
}

/// Exchange bookkeeping: which commands are outstanding, and when each one
/// times out.
pub struct Arbiter {
    awaiting: [bool; COUNT],
    deadline: [Instant; COUNT],
}

impl Arbiter {
    pub fn new(now: Instant) -> Self {
        Self {
            awaiting: [false; COUNT],
            deadline: [now; COUNT],
        }
    }

    /// `bus_busy := OR over all awaiting[i]` (spec §3/§4.3).
    pub fn bus_busy(&self) -> bool {
        self.awaiting.iter().any(|&a| a)
    }

    /// Pre: `!bus_busy()`. Marks `tag` as outstanding with its deadline set
    /// `timeout` (per-tag fixed value) from `now`. Returns
    /// [`Error::BusBusy`] if an exchange is already outstanding.
    pub fn try_begin(&mut self, tag: ExchangeTag, now: Instant) -> Result<()> {
        if self.bus_busy() {
            return Err(Error::BusBusy);
        }
        self.awaiting[tag.index()] = true;
        self.deadline[tag.index()] = now + tag.timeout();
        Ok(())
    }

    /// Clears `tag`'s outstanding flag. Idempotent (spec §8, property 5).
    pub fn complete(&mut self, tag: ExchangeTag) {
        self.awaiting[tag.index()] = false;
    }

    pub fn is_awaiting(&self, tag: ExchangeTag) -> bool {
        self.awaiting[tag.index()]
    }

    /// Expires any exchange whose deadline has passed, returning the list
    /// of tags that timed out this tick so the caller (the dialogue
    /// engine) can react — in particular, a CMGR timeout must also drop
    /// any pending multi-stage reply that depended on the abandoned read
    /// (spec §4.3).
    pub fn tick(&mut self, now: Instant) -> Vec<ExchangeTag, COUNT> {
        let mut expired = Vec::new();
        for &tag in ALL.iter() {
            let idx = tag.index();
            if self.awaiting[idx] && now > self.deadline[idx] {
                self.awaiting[idx] = false;
                // Vec<_, COUNT> can never overflow here since ALL has
                // exactly COUNT entries.
                let _ = expired.push(tag);
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> Instant {
        Instant::from_ticks(0)
    }

    #[test]
    fn begin_fails_while_busy() {
        let mut a = Arbiter::new(t0());
        a.try_begin(ExchangeTag::Cpsi, t0()).unwrap();
        assert_eq!(
            a.try_begin(ExchangeTag::Creg, t0()),
            Err(Error::BusBusy)
        );
        assert!(a.bus_busy());
    }

    #[test]
    fn complete_is_idempotent() {
        let mut a = Arbiter::new(t0());
        a.try_begin(ExchangeTag::Csq, t0()).unwrap();
        a.complete(ExchangeTag::Csq);
        a.complete(ExchangeTag::Csq);
        assert!(!a.is_awaiting(ExchangeTag::Csq));
        assert!(!a.bus_busy());
    }

    #[test]
    fn timeout_clears_awaiting_flag() {
        let mut a = Arbiter::new(t0());
        a.try_begin(ExchangeTag::Cmgr, t0()).unwrap();
        let after = t0() + Duration::from_secs(10);
        let expired = a.tick(after);
        assert_eq!(expired.as_slice(), &[ExchangeTag::Cmgr]);
        assert!(!a.is_awaiting(ExchangeTag::Cmgr));
        assert!(!a.bus_busy());
    }

    #[test]
    fn ok_has_the_longer_sixty_second_timeout() {
        let mut a = Arbiter::new(t0());
        a.try_begin(ExchangeTag::Ok, t0()).unwrap();
        let ten_s_later = t0() + Duration::from_secs(10);
        assert!(a.tick(ten_s_later).is_empty());
        assert!(a.is_awaiting(ExchangeTag::Ok));
        let sixty_one_s_later = t0() + Duration::from_secs(61);
        assert_eq!(a.tick(sixty_one_s_later).as_slice(), &[ExchangeTag::Ok]);
    }
}
