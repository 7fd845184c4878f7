//! Minimal server-sent-event wire handling, shared by the upstream decoder
//! and the consumer-side transcript reconstruction.

/// Reassembles SSE event blocks from arbitrarily chunked bytes.
///
/// Event blocks are separated by a blank line; a chunk boundary can fall
/// anywhere, so bytes are buffered until a complete block is available.
#[derive(Debug, Default)]
pub struct EventStreamBuffer {
    pending: String,
}

impl EventStreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, chunk: &[u8]) {
        self.pending.push_str(&String::from_utf8_lossy(chunk));
    }

    /// Pop the next complete event block, without its trailing blank line.
    pub fn next_block(&mut self) -> Option<String> {
        let end = self.pending.find("\n\n")?;
        let rest = self.pending.split_off(end + 2);
        let mut block = std::mem::replace(&mut self.pending, rest);
        block.truncate(end);
        Some(block)
    }
}

/// Payloads of the `data:` lines in an event block, in order.
pub fn data_payloads(block: &str) -> Vec<&str> {
    block
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect()
}

/// `(event, data)` pairs for streams that tag events with an `event:` line.
/// Each `data:` line is paired with the most recent `event:` line.
pub fn tagged_payloads(block: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    let mut tag = "";
    for line in block.lines() {
        if let Some(event) = line.strip_prefix("event:") {
            tag = event.trim();
        } else if let Some(data) = line.strip_prefix("data:") {
            pairs.push((tag, data.trim()));
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_survive_arbitrary_chunking() {
        let mut buffer = EventStreamBuffer::new();
        buffer.extend(b"data: un\n\ndata: de");
        assert_eq!(buffer.next_block().as_deref(), Some("data: un"));
        assert!(buffer.next_block().is_none());

        buffer.extend(b"ux\n\n");
        assert_eq!(buffer.next_block().as_deref(), Some("data: deux"));
    }

    #[test]
    fn data_payloads_ignores_other_fields() {
        let block = "event: message\ndata: a\nretry: 100\ndata: b";
        assert_eq!(data_payloads(block), vec!["a", "b"]);
    }

    #[test]
    fn tagged_payloads_pairs_data_with_latest_event_line() {
        let block = "event: content_block_delta\ndata: {\"x\":1}\nevent: message_stop\ndata: {}";
        assert_eq!(
            tagged_payloads(block),
            vec![("content_block_delta", "{\"x\":1}"), ("message_stop", "{}")]
        );
    }
}
