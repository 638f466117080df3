use bytes::BytesMut;
use serde_json::Value;
use tracing::debug;

/// Stateful splitter for a wire format of back-to-back JSON objects.
///
/// The response body is a continuous sequence of top-level `{...}`
/// objects with no outer array and no delimiter; chunk boundaries can
/// fall anywhere, including inside a string literal or an escape
/// sequence. The splitter accumulates chunk text and yields each
/// balanced top-level object as it completes, leaving any truncated
/// suffix buffered for the next chunk.
pub struct BraceAwareSplitter {
    buffer: BytesMut,
}

impl BraceAwareSplitter {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Append a chunk of response body to the pending buffer. Raw
    /// bytes are accepted because a network chunk may end mid-way
    /// through a multibyte character; object spans are only sliced at
    /// ASCII structural bytes, so the split is harmless.
    pub fn add_chunk(&mut self, chunk: impl AsRef<[u8]>) {
        self.buffer.extend_from_slice(chunk.as_ref());
    }

    /// Scan from the buffer's start and extract every complete
    /// top-level object, parsing each one. Spans that are balanced but
    /// fail to parse are dropped; the wire format is best-effort and a
    /// bad span must not stop the scan or corrupt the remainder.
    pub fn drain_complete_objects(&mut self) -> Vec<Value> {
        let mut results = Vec::new();

        while let Some((start, end)) = self.find_object_span() {
            // Consumes any noise before the opening brace along with the span
            let span = self.buffer.split_to(end);
            let object_bytes = &span[start..];

            match serde_json::from_slice::<Value>(object_bytes) {
                Ok(value) => results.push(value),
                Err(e) => {
                    debug!(
                        error = %e,
                        span = %String::from_utf8_lossy(object_bytes),
                        "Dropping malformed JSON span"
                    );
                }
            }
        }

        results
    }

    /// Locate the first balanced top-level object, tracking brace depth
    /// and string context. Returns `(object start, one past the closing
    /// brace)`, or `None` while the buffer holds only a prefix.
    ///
    /// A `\` inside a string consumes the following byte no matter what
    /// it is, so `\"` never closes a string early. Brace scanning over
    /// raw bytes is UTF-8 safe: continuation bytes never collide with
    /// the ASCII structural characters.
    fn find_object_span(&self) -> Option<(usize, usize)> {
        let mut depth: u32 = 0;
        let mut in_string = false;
        let mut escaped = false;
        let mut start = None;

        for (i, &byte) in self.buffer.iter().enumerate() {
            if in_string {
                if escaped {
                    escaped = false;
                } else {
                    match byte {
                        b'\\' => escaped = true,
                        b'"' => in_string = false,
                        _ => {}
                    }
                }
            } else {
                match byte {
                    b'"' => in_string = true,
                    b'{' => {
                        depth += 1;
                        if depth == 1 {
                            start = Some(i);
                        }
                    }
                    b'}' if depth > 0 => {
                        depth -= 1;
                        if depth == 0
                            && let Some(s) = start
                        {
                            return Some((s, i + 1));
                        }
                    }
                    _ => {}
                }
            }
        }

        None
    }

    /// Bytes still waiting for more data.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Discard any buffered remainder (used on session teardown).
    pub fn clear(&mut self) {
        self.buffer.clear();
        if self.buffer.capacity() > 65536 {
            self.buffer = BytesMut::with_capacity(8192);
        }
    }
}

impl Default for BraceAwareSplitter {
    fn default() -> Self {
        Self::new()
    }
}
