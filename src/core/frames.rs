//! Line framing for server-sent event bodies.
//!
//! [`FrameDecoder`] turns network reads split at arbitrary points into
//! complete newline-terminated lines; [`StreamFrame::from_line`] then says
//! what each line is. Splitting happens on raw bytes: `\n` never occurs
//! inside a multi-byte UTF-8 sequence, so a character cut in half by a read
//! boundary is simply carried in the residual buffer until the rest arrives.

use memchr::memchr;

pub const DATA_PREFIX: &str = "data:";
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Default)]
pub struct FrameDecoder {
    residual: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every line it completed, without the
    /// trailing `\n` (or `\r\n`).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.residual.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = memchr(b'\n', &self.residual[start..]) {
            let end = start + offset;
            let mut line = &self.residual[start..end];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            lines.push(line.to_vec());
            start = end + 1;
        }
        self.residual.drain(..start);
        lines
    }

    /// Bytes of the current incomplete line.
    pub fn pending(&self) -> &[u8] {
        &self.residual
    }

    /// Ends the stream. An unterminated trailing line is never a frame, so
    /// it is dropped; the number of discarded bytes is returned.
    pub fn finish(&mut self) -> usize {
        let discarded = self.residual.len();
        self.residual.clear();
        discarded
    }
}

/// One decoded logical line from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// A `data:` line; the payload has the prefix and surrounding
    /// whitespace removed.
    Data(String),
    /// The `data: [DONE]` terminal marker.
    Done,
    /// Blank lines, SSE comments and non-data fields.
    Ignored,
    /// A `data:` line whose payload is not valid UTF-8.
    Invalid,
}

impl StreamFrame {
    pub fn from_line(line: &[u8]) -> Self {
        let line = line.trim_ascii();
        if line.is_empty() || line[0] == b':' {
            return StreamFrame::Ignored;
        }
        // Only data lines are decoded; other fields are ignored whatever their bytes.
        let Some(payload) = line.strip_prefix(DATA_PREFIX.as_bytes()) else {
            return StreamFrame::Ignored;
        };
        let Ok(payload) = std::str::from_utf8(payload) else {
            return StreamFrame::Invalid;
        };

        match payload.trim_start() {
            DONE_SENTINEL => StreamFrame::Done,
            "" => StreamFrame::Ignored,
            payload => StreamFrame::Data(payload.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hé\"}}]}\n",
        "\n",
        ": keep-alive\r\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"llo 🌍\"}}]}\r\n",
        "\n",
        "data: [DONE]\n",
        "\n",
    );

    fn decode_in_chunks(input: &[u8], sizes: &[usize]) -> Vec<Vec<u8>> {
        let mut decoder = FrameDecoder::new();
        let mut lines = Vec::new();
        let mut rest = input;
        let mut sizes = sizes.iter().cycle();
        while !rest.is_empty() {
            let size = (*sizes.next().unwrap()).min(rest.len()).max(1);
            let (chunk, tail) = rest.split_at(size);
            lines.extend(decoder.push(chunk));
            rest = tail;
        }
        assert_eq!(decoder.finish(), 0);
        lines
    }

    #[test]
    fn output_does_not_depend_on_chunk_boundaries() {
        let bytes = STREAM.as_bytes();
        let whole = decode_in_chunks(bytes, &[bytes.len()]);
        assert_eq!(whole.len(), 7);

        for sizes in [&[1][..], &[2, 3], &[7], &[5, 1, 13], &[64, 1]] {
            assert_eq!(decode_in_chunks(bytes, sizes), whole, "sizes {sizes:?}");
        }
    }

    #[test]
    fn every_split_point_yields_same_lines() {
        let bytes = STREAM.as_bytes();
        let expected = decode_in_chunks(bytes, &[bytes.len()]);
        for split in 1..bytes.len() {
            let mut decoder = FrameDecoder::new();
            let mut lines = decoder.push(&bytes[..split]);
            lines.extend(decoder.push(&bytes[split..]));
            assert_eq!(lines, expected, "split at {split}");
        }
    }

    #[test]
    fn split_multibyte_character_is_reassembled() {
        let line = "data: 🌍\n".as_bytes();
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(&line[..8]).is_empty());
        let lines = decoder.push(&line[8..]);
        assert_eq!(lines, vec![b"data: \xF0\x9F\x8C\x8D".to_vec()]);
        assert_eq!(
            StreamFrame::from_line(&lines[0]),
            StreamFrame::Data("🌍".to_string())
        );
    }

    #[test]
    fn unterminated_tail_is_discarded() {
        let mut decoder = FrameDecoder::new();
        let lines = decoder.push(b"data: {\"a\":1}\ndata: {\"b\"");
        assert_eq!(lines.len(), 1);
        assert_eq!(decoder.pending(), b"data: {\"b\"");
        assert_eq!(decoder.finish(), 10);
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn classifies_lines() {
        assert_eq!(StreamFrame::from_line(b""), StreamFrame::Ignored);
        assert_eq!(StreamFrame::from_line(b"   "), StreamFrame::Ignored);
        assert_eq!(StreamFrame::from_line(b": ping"), StreamFrame::Ignored);
        assert_eq!(StreamFrame::from_line(b"event: message"), StreamFrame::Ignored);
        assert_eq!(StreamFrame::from_line(b"data: [DONE]"), StreamFrame::Done);
        assert_eq!(StreamFrame::from_line(b"data:[DONE]"), StreamFrame::Done);
        assert_eq!(StreamFrame::from_line(b"data: "), StreamFrame::Ignored);
        assert_eq!(
            StreamFrame::from_line(b"data:{\"x\":1}"),
            StreamFrame::Data("{\"x\":1}".to_string())
        );
        assert_eq!(StreamFrame::from_line(b"data: \xFF\xFE"), StreamFrame::Invalid);
    }

    #[test]
    fn non_data_lines_with_invalid_utf8_are_ignored() {
        assert_eq!(StreamFrame::from_line(b"event: \xFF"), StreamFrame::Ignored);
        assert_eq!(StreamFrame::from_line(b": \xFE\xFF"), StreamFrame::Ignored);
        assert_eq!(StreamFrame::from_line(b"id: \xC3"), StreamFrame::Ignored);
    }
}
