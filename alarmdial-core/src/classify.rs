//! Message Classifier (C2, spec §4.2).
//!
//! A pure function mapping one reassembled line to a tagged variant. The
//! payload for every tag that carries one is simply the input line itself
//! (the source's fixed-size `received_response[tag]` copy is the same
//! "whole line" shape), so unlike the donor's `parse_cereg_response` this
//! doesn't need to hand back a separate slice — callers that need the
//! payload just keep the `&str` they classified.

/// Tagged modem-response categories (spec §4.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tag {
    Ok,
    Error,
    Cpsi,
    Creg,
    Cpms,
    Csq,
    Cmgd,
    Cmgs,
    Cmti,
    Cmgr,
    Clcc,
    /// Command-like line (starts with `+`) that doesn't match a known tag.
    Unknown,
    /// The modem's data-entry cue (`>`) during CMGS; ignored by the loop.
    Prompt,
    /// Empty line — ignored by the loop.
    Ignore,
    /// Out-of-band payload, typically an SMS body read back after CMGR.
    Data,
}

/// Classifies one line, applying the spec's ordered rule list.
pub fn classify(line: &str) -> Tag {
    if line.starts_with("OK") {
        return Tag::Ok;
    }
    if line.starts_with("ERROR") {
        return Tag::Error;
    }
    if line.starts_with("+CPSI") {
        return Tag::Cpsi;
    }
    if line.starts_with("+CREG") {
        return Tag::Creg;
    }
    if line.starts_with("+CPMS") {
        return Tag::Cpms;
    }
    if line.starts_with("+CSQ") {
        return Tag::Csq;
    }
    if line.starts_with("+CMGD") {
        return Tag::Cmgd;
    }
    if line.starts_with("+CMGS") {
        return Tag::Cmgs;
    }
    if line.starts_with("+CMTI") {
        return Tag::Cmti;
    }
    if line.starts_with("+CMGR") {
        return Tag::Cmgr;
    }
    if line.starts_with("+CLCC") {
        return Tag::Clcc;
    }
    if line.starts_with('>') {
        return Tag::Prompt;
    }
    if line.is_empty() {
        return Tag::Ignore;
    }
    if line.starts_with('+') {
        return Tag::Unknown;
    }
    Tag::Data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_tags() {
        assert_eq!(classify("OK"), Tag::Ok);
        assert_eq!(classify("ERROR"), Tag::Error);
        assert_eq!(
            classify("+CPSI: LTE,Online,460-00,0x1234,..."),
            Tag::Cpsi
        );
        assert_eq!(classify("+CREG: 2,1"), Tag::Creg);
        assert_eq!(classify("+CPMS: \"SM\",3,50"), Tag::Cpms);
        assert_eq!(classify("+CSQ: 17,0"), Tag::Csq);
        assert_eq!(classify("+CMGD: 0,4"), Tag::Cmgd);
        assert_eq!(classify("+CMGS: 12"), Tag::Cmgs);
        assert_eq!(classify("+CMTI: \"ME\",3"), Tag::Cmti);
        assert_eq!(classify("+CMGR: \"REC UNREAD\",\"+44...\""), Tag::Cmgr);
        assert_eq!(classify("+CLCC: 1,1,4,0,0"), Tag::Clcc);
    }

    #[test]
    fn classifies_prompt_ignore_unknown_data() {
        assert_eq!(classify("> "), Tag::Prompt);
        assert_eq!(classify(""), Tag::Ignore);
        assert_eq!(classify("+CFOO: 1"), Tag::Unknown);
        assert_eq!(classify("674358 Signal?"), Tag::Data);
    }
}
