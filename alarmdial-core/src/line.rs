//! Line Reassembler (C1, spec §4.1).
//!
//! Turns the raw byte stream sitting in the ring buffer into LF-terminated
//! line records, stripping CR and truncating at [`crate::MAX_LINE_LEN`]
//! bytes. No donor equivalent exists (the nRF91 driver hides this inside
//! `embassy-net-nrf91`); built directly from the spec, following `circq`'s
//! habit of draining in FIFO order one call at a time.

use crate::ringbuf::RingBuffer;
use crate::MAX_LINE_LEN;

/// A single reassembled line: CR/LF-free, silently truncated past
/// [`MAX_LINE_LEN`] bytes (matching the source's fixed 200-byte buffer).
pub type Line = heapless::String<MAX_LINE_LEN>;

/// Pre-condition: `rb.pending_lines() > 0`. Reads and discards bytes up to
/// and including the next LF, stripping any CR, and returns the resulting
/// line. Post-condition: the LF counter is decremented by one and the
/// consumed bytes are gone from the buffer (enforced by
/// [`RingBuffer::read_byte`] itself).
///
/// Returns `None` only if called against the precondition (no pending
/// line) — callers are expected to check [`RingBuffer::pending_lines`]
/// first, per spec §4.7 step 3.
pub fn next_line(rb: &RingBuffer) -> Option<Line> {
    if rb.pending_lines() == 0 {
        return None;
    }
    let mut line = Line::new();
    loop {
        let byte = match rb.read_byte() {
            Some(b) => b,
            // Unreachable in practice: `pending_lines() > 0` guarantees an
            // LF is already buffered ahead of us.
            None => break,
        };
        match byte {
            b'\n' => break,
            b'\r' => continue,
            _ => {
                // Truncate silently past capacity, matching the source's
                // `l < max_str_l - 1` guard — we keep draining the buffer
                // up to the LF regardless.
                let _ = line.push(byte as char);
            }
        }
    }
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_cr_and_splits_on_lf() {
        let rb = RingBuffer::new();
        for b in b"+CSQ: 17,0\r\nOK\r\n" {
            rb.push(*b);
        }
        assert_eq!(next_line(&rb).unwrap().as_str(), "+CSQ: 17,0");
        assert_eq!(next_line(&rb).unwrap().as_str(), "OK");
        assert_eq!(rb.pending_lines(), 0);
    }

    #[test]
    fn empty_line_yields_length_zero() {
        let rb = RingBuffer::new();
        for b in b"\r\n" {
            rb.push(*b);
        }
        let line = next_line(&rb).unwrap();
        assert_eq!(line.len(), 0);
    }

    #[test]
    fn reassembly_is_independent_of_how_bytes_arrive() {
        // Simulate the byte stream split arbitrarily across ISR
        // invocations: the result must equal the stream split at LF with
        // CR stripped, regardless of where the splits land (spec §8,
        // property 4).
        let whole = b"+CMTI: \"ME\",3\r\n+CMGR: ...\r\n674358 Signal?\r\nOK\r\n";
        let chunks: [&[u8]; 5] = [
            &whole[0..5],
            &whole[5..14],
            &whole[14..30],
            &whole[30..40],
            &whole[40..],
        ];
        let rb = RingBuffer::new();
        for chunk in chunks {
            for b in chunk {
                rb.push(*b);
            }
        }
        let mut lines = heapless::Vec::<Line, 8>::new();
        while rb.pending_lines() > 0 {
            lines.push(next_line(&rb).unwrap()).unwrap();
        }
        assert_eq!(lines[0].as_str(), "+CMTI: \"ME\",3");
        assert_eq!(lines[1].as_str(), "+CMGR: ...");
        assert_eq!(lines[2].as_str(), "674358 Signal?");
        assert_eq!(lines[3].as_str(), "OK");
    }

    #[test]
    fn truncates_overlong_lines() {
        let rb = RingBuffer::new();
        let overlong: heapless::Vec<u8, 400> = (0..300).map(|_| b'a').collect();
        for b in &overlong {
            rb.push(*b);
        }
        rb.push(b'\n');
        let line = next_line(&rb).unwrap();
        assert_eq!(line.len(), MAX_LINE_LEN);
    }
}
