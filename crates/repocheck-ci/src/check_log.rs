//! Append-only audit log for one check run.

/// Captured git and analyzer output plus engine notes, in order.
///
/// Owned by a single `perform` call and copied into the check's `stdout`
/// at checkpoints.
#[derive(Debug, Default, Clone)]
pub struct CheckLog {
    buf: String,
}

impl CheckLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw process output as-is.
    pub fn append(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    /// Append an engine note on its own line.
    pub fn note(&mut self, line: &str) {
        self.buf.push('\n');
        self.buf.push_str(line);
        self.buf.push('\n');
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Log text followed by `message`, separated by a newline.
    pub fn with_error(&self, message: &str) -> String {
        if self.is_empty() {
            message.to_string()
        } else {
            format!("{}\n{}", self.buf, message)
        }
    }
}
