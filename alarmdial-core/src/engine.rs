//! Dialogue Engine (C4, spec §4.4).
//!
//! The multi-stage AT-command conversation: periodic liveness probes
//! (`AT+CPSI?`, `AT+CREG?`, `AT+CMGD=0,4`), unsolicited event handling
//! (`+CMTI` → read the message, `+CLCC` → hang up), the SMS command
//! grammar, and the two-step `AT+CMGS` send sequence. Grounded directly on
//! `original_source/AlarmDial.c`'s main loop body (the donor firmware has
//! no equivalent — its `Control::at_command` hides this entirely), shaped
//! like the donor's small poll-and-react structs (`registration.rs`).
//!
//! One divergence from the source, by construction rather than oversight:
//! each periodic probe here rechecks [`Arbiter::bus_busy`] immediately
//! before firing, rather than consulting one bus-busy snapshot taken at
//! the top of the loop iteration. The source's snapshot could in principle
//! let two periodic probes start in the same tick; rechecking preserves
//! the mutual-exclusion invariant (spec §8, property 1) exactly.

use core::fmt::Write as _;

use embassy_time::{Duration, Instant};

use crate::arbiter::{Arbiter, ExchangeTag};
use crate::classify::Tag;
use crate::config::{default_config, ConfigStore, Field, Password};
use crate::hal::UartWriter;
use crate::{ALARM_INPUTS, PASSWORD_LEN};

/// An outbound SMS or status text. Sized generously above the 49-byte
/// field cap since replies interpolate a field into fixed wording.
pub type Message = heapless::String<160>;

const CPSI_INTERVAL: Duration = Duration::from_secs(2_419_200); // 4 weeks
const CREG_INTERVAL: Duration = Duration::from_secs(28_800); // 8 hours
const CMGD_INTERVAL: Duration = Duration::from_secs(86_400); // 24 hours
const PROMPT_FALLBACK: Duration = Duration::from_millis(500);

/// Byte offset of the signal value in a `+CSQ: <value>,<qual>` line (spec
/// §4.4.5; see DESIGN.md's Open Question decision on this constant).
pub const CSQ_VALUE_OFFSET: usize = 6;

/// What to do once the bare `OK` that follows an initiated exchange
/// arrives.
#[derive(Clone, Debug, PartialEq, Eq)]
enum PendingAction {
    None,
    QuerySignal,
    SendMessage(Message),
}

enum SmsTx {
    Idle,
    AwaitingPrompt { body: Message, deadline: Instant },
}

/// Which edge of an alarm input a command-text edit applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    Fall,
    Rise,
}

/// The fully-parsed and validated effect of one incoming SMS command body
/// (spec §4.4.6). Produced by [`interpret_sms`], a pure function, and
/// consumed by [`Engine::apply`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The text didn't start with the live password: dropped without a
    /// reply (spec §8, scenario on wrong-password silence).
    Silent,
    /// Correct password, no recognised command word.
    Unmatched,
    QuerySignal,
    SetTelephone(Field),
    SetPassword(Password),
    InvalidPassword,
    ToggleNotify(usize),
    InvalidToggle,
    SetMessage(usize, Edge, Field),
    InvalidMessage,
    ResetDefaults,
}

/// Parses one SMS body against the live password, producing the exact
/// effect to apply — a pure function so the whole command grammar can be
/// tested without a `Config` or any I/O. Mirrors
/// `original_source/AlarmDial.c`'s password-prefixed command dispatch
/// line for line.
pub fn interpret_sms(password: &str, text: &str) -> Outcome {
    let rest = match text.strip_prefix(password) {
        Some(rest) => rest,
        None => return Outcome::Silent,
    };
    if rest.starts_with(" Signal?") {
        return Outcome::QuerySignal;
    }
    if let Some(value) = rest.strip_prefix(" TelephoneNumber!") {
        return Outcome::SetTelephone(truncate_to(value));
    }
    if let Some(value) = rest.strip_prefix(" Password!") {
        return if value.chars().count() == PASSWORD_LEN {
            match Password::try_from(value) {
                Ok(pw) => Outcome::SetPassword(pw),
                Err(()) => Outcome::InvalidPassword,
            }
        } else {
            Outcome::InvalidPassword
        };
    }
    if let Some(value) = rest.strip_prefix(" SMSonInput!") {
        return match parse_input_index(value) {
            Some(idx) => Outcome::ToggleNotify(idx),
            None => Outcome::InvalidToggle,
        };
    }
    if let Some(value) = rest.strip_prefix(" MessageText!") {
        return match parse_message_edit(value) {
            Some((idx, edge, text)) => Outcome::SetMessage(idx, edge, truncate_to(text)),
            None => Outcome::InvalidMessage,
        };
    }
    if rest.starts_with(" Defaults!") {
        return Outcome::ResetDefaults;
    }
    Outcome::Unmatched
}

fn parse_input_index(value: &str) -> Option<usize> {
    let mut chars = value.chars();
    let digit = chars.next()?;
    if chars.next().is_some() || !digit.is_ascii_digit() {
        return None;
    }
    let idx = (digit as u8 - b'1') as usize;
    if idx < ALARM_INPUTS {
        Some(idx)
    } else {
        None
    }
}

fn parse_message_edit(value: &str) -> Option<(usize, Edge, &str)> {
    let mut chars = value.chars();
    let digit = chars.next()?;
    if !digit.is_ascii_digit() {
        return None;
    }
    let idx = (digit as u8 - b'1') as usize;
    let after_digit = &value[digit.len_utf8()..];
    let after_bang = after_digit.strip_prefix('!')?;
    let (edge, text) = if let Some(t) = after_bang.strip_prefix("On!") {
        (Edge::Fall, t)
    } else if let Some(t) = after_bang.strip_prefix("Off!") {
        (Edge::Rise, t)
    } else {
        return None;
    };
    if idx >= ALARM_INPUTS {
        return None;
    }
    Some((idx, edge, text))
}

fn truncate_to<const N: usize>(s: &str) -> heapless::String<N> {
    let mut end = s.len().min(N);
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    heapless::String::try_from(&s[..end]).unwrap_or_default()
}

fn fixed_message(s: &str) -> Message {
    Message::try_from(s).unwrap()
}

fn parse_csq_value(line: &str) -> &str {
    let rest = line.get(CSQ_VALUE_OFFSET..).unwrap_or("");
    match rest.find(',') {
        Some(comma) => &rest[..comma],
        None => rest,
    }
}

/// Result of feeding one classified line into the engine.
#[derive(Debug, PartialEq, Eq)]
pub enum LoopSignal {
    Continue,
    /// `+CPSI?` came back without "Online": the caller must force a
    /// watchdog reboot (spec §4.4.1, §7) — this crate never calls the
    /// watchdog itself, that's `alarmdial-fw`'s job via [`crate::hal::Watchdog`].
    ModemOffline,
}

/// The dialogue state machine: periodic probe timers, the pending
/// post-OK action, the CMGR header/body join, and the CMGS prompt
/// handshake.
pub struct Engine {
    pending: PendingAction,
    sms_tx: SmsTx,
    cmgr_header_seen: bool,
    last_cpsi: Instant,
    last_creg: Instant,
    last_cmgd: Instant,
}

impl Engine {
    pub fn new(now: Instant) -> Self {
        Self {
            pending: PendingAction::None,
            sms_tx: SmsTx::Idle,
            cmgr_header_seen: false,
            last_cpsi: now,
            last_creg: now,
            last_cmgd: now,
        }
    }

    /// Issues whichever periodic probe is due, provided the bus is idle
    /// (spec §4.4.2-§4.4.4).
    pub fn poll_periodic<U: UartWriter>(&mut self, arbiter: &mut Arbiter, uart: &mut U, now: Instant) {
        if !arbiter.bus_busy() && now - self.last_cpsi > CPSI_INTERVAL {
            uart.write_all(b"AT+CPSI?\r");
            let _ = arbiter.try_begin(ExchangeTag::Cpsi, now);
            self.last_cpsi = now;
            return;
        }
        if !arbiter.bus_busy() && now - self.last_creg > CREG_INTERVAL {
            uart.write_all(b"AT+CREG?\r");
            let _ = arbiter.try_begin(ExchangeTag::Creg, now);
            self.last_creg = now;
            return;
        }
        if !arbiter.bus_busy() && now - self.last_cmgd > CMGD_INTERVAL {
            uart.write_all(b"AT+CMGD=0,4\r");
            // the source never tracks +CMGD's own response, only the
            // trailing bare OK — see DESIGN.md.
            let _ = arbiter.try_begin(ExchangeTag::Ok, now);
            self.last_cmgd = now;
        }
    }

    /// Feeds one reassembled, classified line through the dialogue state
    /// machine.
    pub fn on_line<U: UartWriter>(
        &mut self,
        tag: Tag,
        line: &str,
        arbiter: &mut Arbiter,
        config: &mut ConfigStore,
        uart: &mut U,
        now: Instant,
    ) -> LoopSignal {
        match tag {
            Tag::Ok => {
                if arbiter.is_awaiting(ExchangeTag::Ok) {
                    arbiter.complete(ExchangeTag::Ok);
                    match core::mem::replace(&mut self.pending, PendingAction::None) {
                        PendingAction::None => {}
                        PendingAction::QuerySignal => {
                            uart.write_all(b"AT+CSQ\r");
                            let _ = arbiter.try_begin(ExchangeTag::Csq, now);
                        }
                        PendingAction::SendMessage(body) => {
                            let tel_no = config.live().tel_no.clone();
                            self.begin_send_sms(arbiter, uart, tel_no.as_str(), body.as_str(), now);
                        }
                    }
                }
            }
            Tag::Cpsi => {
                if arbiter.is_awaiting(ExchangeTag::Cpsi) {
                    arbiter.complete(ExchangeTag::Cpsi);
                    if line.contains("Online") {
                        let tail = line.get(7..).unwrap_or("");
                        let mut msg = Message::new();
                        let _ = write!(msg, "Modem check: {}", tail);
                        self.pending = PendingAction::SendMessage(msg);
                        let _ = arbiter.try_begin(ExchangeTag::Ok, now);
                    } else {
                        return LoopSignal::ModemOffline;
                    }
                }
            }
            Tag::Creg => {
                if arbiter.is_awaiting(ExchangeTag::Creg) {
                    arbiter.complete(ExchangeTag::Creg);
                    let _ = arbiter.try_begin(ExchangeTag::Ok, now);
                }
            }
            Tag::Csq => {
                if arbiter.is_awaiting(ExchangeTag::Csq) {
                    arbiter.complete(ExchangeTag::Csq);
                    let value = parse_csq_value(line);
                    let mut msg = Message::new();
                    let _ = write!(msg, "Signal quality is {}", value);
                    self.pending = PendingAction::SendMessage(msg);
                    let _ = arbiter.try_begin(ExchangeTag::Ok, now);
                }
            }
            Tag::Cmgs => {
                if arbiter.is_awaiting(ExchangeTag::Cmgs) {
                    arbiter.complete(ExchangeTag::Cmgs);
                    let _ = arbiter.try_begin(ExchangeTag::Ok, now);
                }
            }
            Tag::Cmti => {
                if !arbiter.bus_busy() {
                    if let Some(index) = line.get(12..) {
                        let mut cmd: heapless::String<32> = heapless::String::new();
                        if write!(cmd, "AT+CMGR={}\r", index).is_ok() {
                            uart.write_all(cmd.as_bytes());
                            let _ = arbiter.try_begin(ExchangeTag::Cmgr, now);
                        }
                    }
                }
            }
            Tag::Clcc => {
                if !arbiter.bus_busy() {
                    uart.write_all(b"AT+CHUP\r");
                    let _ = arbiter.try_begin(ExchangeTag::Ok, now);
                }
            }
            Tag::Cmgr => {
                if arbiter.is_awaiting(ExchangeTag::Cmgr) {
                    self.cmgr_header_seen = true;
                }
            }
            Tag::Data => {
                if self.cmgr_header_seen && arbiter.is_awaiting(ExchangeTag::Cmgr) {
                    self.cmgr_header_seen = false;
                    arbiter.complete(ExchangeTag::Cmgr);
                    let _ = arbiter.try_begin(ExchangeTag::Ok, now);
                    let password = config.live().password.clone();
                    let outcome = interpret_sms(password.as_str(), line);
                    self.pending = self.apply(config, outcome);
                }
            }
            Tag::Prompt => self.fire_prompt(uart),
            Tag::Error | Tag::Unknown | Tag::Ignore | Tag::Cpms | Tag::Cmgd => {}
        }
        LoopSignal::Continue
    }

    /// Sends the blind fallback body if a `>` prompt never arrived within
    /// [`PROMPT_FALLBACK`] of issuing `AT+CMGS` (redesigned from the
    /// source's unconditional 500 ms sleep — see DESIGN.md). Call once per
    /// main-loop iteration regardless of whether a line arrived.
    pub fn poll_sms_prompt_fallback<U: UartWriter>(&mut self, uart: &mut U, now: Instant) {
        let due = matches!(&self.sms_tx, SmsTx::AwaitingPrompt { deadline, .. } if now > *deadline);
        if due {
            self.fire_prompt(uart);
        }
    }

    fn fire_prompt<U: UartWriter>(&mut self, uart: &mut U) {
        if let SmsTx::AwaitingPrompt { body, .. } = core::mem::replace(&mut self.sms_tx, SmsTx::Idle) {
            uart.write_all(body.as_bytes());
            uart.write_all(&[0x1A]);
        }
    }

    /// Clears state made stale by an exchange timing out (spec §4.3's
    /// note that a CMGR timeout must drop any reply that depended on it).
    pub fn on_timeout(&mut self, tag: ExchangeTag) {
        if tag == ExchangeTag::Cmgr {
            self.cmgr_header_seen = false;
        }
    }

    /// Sends `body` to `tel_no` right away if no exchange is outstanding.
    /// Used by the input monitor (C5) for edge-triggered and
    /// password-reset notifications, which bypass the multi-stage queue
    /// entirely (spec §4.4.7, §4.5).
    pub fn send_sms_if_idle<U: UartWriter>(
        &mut self,
        arbiter: &mut Arbiter,
        uart: &mut U,
        tel_no: &str,
        body: &str,
        now: Instant,
    ) -> bool {
        if arbiter.bus_busy() {
            return false;
        }
        self.begin_send_sms(arbiter, uart, tel_no, body, now);
        true
    }

    fn begin_send_sms<U: UartWriter>(
        &mut self,
        arbiter: &mut Arbiter,
        uart: &mut U,
        tel_no: &str,
        body: &str,
        now: Instant,
    ) {
        let _ = arbiter.try_begin(ExchangeTag::Cmgs, now);
        let mut cmd: heapless::String<64> = heapless::String::new();
        let _ = write!(cmd, "AT+CMGS=\"{}\"\r", tel_no);
        uart.write_all(cmd.as_bytes());
        self.sms_tx = SmsTx::AwaitingPrompt {
            body: truncate_to(body),
            deadline: now + PROMPT_FALLBACK,
        };
    }

    fn apply(&self, config: &mut ConfigStore, outcome: Outcome) -> PendingAction {
        match outcome {
            Outcome::Silent => PendingAction::None,
            Outcome::Unmatched => PendingAction::SendMessage(fixed_message("Invalid instruction")),
            Outcome::QuerySignal => PendingAction::QuerySignal,
            Outcome::SetTelephone(field) => {
                config.live_mut().tel_no = field;
                config.mark_dirty();
                PendingAction::SendMessage(fixed_message("Ok. Changed telephone number"))
            }
            Outcome::SetPassword(pw) => {
                config.live_mut().password = pw;
                config.mark_dirty();
                PendingAction::SendMessage(fixed_message("Ok. Changed password"))
            }
            Outcome::InvalidPassword => PendingAction::SendMessage(fixed_message(
                "Error. Invalid password (needs to be 6 characters)",
            )),
            Outcome::ToggleNotify(idx) => {
                let new_value = !config.live().notify_on_change[idx];
                config.live_mut().notify_on_change[idx] = new_value;
                config.mark_dirty();
                let mut msg = Message::new();
                let _ = write!(
                    msg,
                    "Ok. Input {} will {}trigger SMS from now on",
                    idx + 1,
                    if new_value { "" } else { "not " }
                );
                PendingAction::SendMessage(msg)
            }
            Outcome::InvalidToggle => {
                let mut msg = Message::new();
                let _ = write!(msg, "Error. Invalid input number (must be 1-{})", ALARM_INPUTS);
                PendingAction::SendMessage(msg)
            }
            Outcome::SetMessage(idx, edge, field) => {
                let mut msg = Message::new();
                match edge {
                    Edge::Fall => {
                        let _ = write!(
                            msg,
                            "Ok. New message for input {} activating: \"{}\"",
                            idx + 1,
                            field.as_str()
                        );
                        config.live_mut().sms_on_fall[idx] = field;
                    }
                    Edge::Rise => {
                        let _ = write!(
                            msg,
                            "Ok. New message for input {} deactivating: \"{}\"",
                            idx + 1,
                            field.as_str()
                        );
                        config.live_mut().sms_on_rise[idx] = field;
                    }
                }
                config.mark_dirty();
                PendingAction::SendMessage(msg)
            }
            Outcome::InvalidMessage => {
                PendingAction::SendMessage(fixed_message("Error. Invalid message change request"))
            }
            Outcome::ResetDefaults => {
                *config.live_mut() = default_config();
                config.mark_dirty();
                PendingAction::SendMessage(fixed_message("Ok. Resetting settings to defaults"))
            }
        }
    }
}
