use std::fmt::{Debug, Display, Formatter};
use std::io::Write;

const INITIAL_CAPACITY: usize = 64;

/// A credential written once to a privileged process's input stream.
///
/// The value never appears in `Debug` or `Display` output and is consumed by
/// [`Secret::write_line`], so whoever writes it cannot keep it around. Its
/// buffer is zeroed when the secret is dropped, and [`Secret::push`] zeroes
/// the old buffer whenever it has to grow.
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn empty() -> Self {
        Self(String::with_capacity(INITIAL_CAPACITY))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, c: char) {
        let needed = self.0.len() + c.len_utf8();
        if needed > self.0.capacity() {
            let capacity = needed.max(self.0.capacity() * 2).max(INITIAL_CAPACITY);
            let mut grown = String::with_capacity(capacity);
            grown.push_str(&self.0);
            let old = std::mem::replace(&mut self.0, grown);
            zero_buffer(&mut old.into_bytes());
        }
        self.0.push(c);
    }

    pub fn pop(&mut self) {
        self.0.pop();
    }

    /// Drops a trailing `\n` or `\r\n` in place.
    pub fn without_line_terminator(mut self) -> Self {
        let len = self.0.trim_end_matches(['\r', '\n']).len();
        self.0.truncate(len);
        self
    }

    /// Writes the secret followed by a line terminator and flushes.
    pub(crate) fn write_line(self, writer: &mut impl Write) -> std::io::Result<()> {
        writer.write_all(self.0.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

/// Overwrites the whole allocation of `bytes`, spare capacity included.
fn zero_buffer(bytes: &mut Vec<u8>) {
    let capacity = bytes.capacity();
    bytes.clear();
    bytes.resize(capacity, 0);
    std::hint::black_box(&bytes);
}

impl Drop for Secret {
    fn drop(&mut self) {
        zero_buffer(&mut std::mem::take(&mut self.0).into_bytes());
    }
}

impl Debug for Secret {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("Secret([REDACTED])")
    }
}

impl Display for Secret {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_redact() {
        let secret = Secret::new("hunter2");
        assert!(!format!("{secret:?}").contains("hunter2"));
        assert!(!format!("{secret}").contains("hunter2"));
    }

    #[test]
    fn test_write_line_appends_newline() {
        let mut buffer: Vec<u8> = Vec::new();
        Secret::new("hunter2").write_line(&mut buffer).unwrap();
        assert_eq!(buffer, b"hunter2\n");
    }

    #[test]
    fn test_push_and_pop_across_growth() {
        let mut secret = Secret::empty();
        for c in "correct-horse-battery-staple-".repeat(5).chars() {
            secret.push(c);
        }
        secret.push('é');
        secret.pop();
        secret.pop();

        let mut buffer: Vec<u8> = Vec::new();
        secret.write_line(&mut buffer).unwrap();
        let expected = format!("{}\n", &"correct-horse-battery-staple-".repeat(5)[..144]);
        assert_eq!(buffer, expected.as_bytes());
    }

    #[test]
    fn test_without_line_terminator() {
        let mut buffer: Vec<u8> = Vec::new();
        Secret::new("hunter2\r\n")
            .without_line_terminator()
            .write_line(&mut buffer)
            .unwrap();
        assert_eq!(buffer, b"hunter2\n");
    }

    #[test]
    fn test_zero_buffer_covers_spare_capacity() {
        let mut bytes = Vec::with_capacity(32);
        bytes.extend_from_slice(b"hunter2");
        zero_buffer(&mut bytes);
        assert_eq!(bytes.len(), bytes.capacity());
        assert!(bytes.iter().all(|byte| *byte == 0));
    }

    #[test]
    fn test_is_empty() {
        assert!(Secret::new("").is_empty());
        assert!(Secret::empty().is_empty());
        assert!(!Secret::new("x").is_empty());
    }
}
