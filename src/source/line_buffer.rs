use std::fmt;

/// Initial size of the scratch region that file reads land in.
pub const DEFAULT_CAPACITY: usize = 4096;

/// One log line, including its terminating `\n`.
///
/// Records own their bytes. They are copied out of the scratch buffer at
/// emission time, so later reads can never mutate a record already handed
/// downstream.
#[derive(Clone, PartialEq, Eq)]
pub struct Record {
    bytes: Vec<u8>,
}

impl Record {
    /// Copy a terminated line out of the scratch buffer, normalizing a
    /// trailing `\r\n` to `\n`.
    fn from_line(line: &[u8]) -> Self {
        let mut bytes = if line.ends_with(b"\r\n") {
            let mut bytes = Vec::with_capacity(line.len() - 1);
            bytes.extend_from_slice(&line[..line.len() - 2]);
            bytes.push(b'\n');
            bytes
        } else {
            line.to_vec()
        };
        bytes.shrink_to_fit();
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn first_byte(&self) -> Option<u8> {
        self.bytes.first().copied()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl From<&[u8]> for Record {
    fn from(line: &[u8]) -> Self {
        Self::from_line(line)
    }
}

impl From<&str> for Record {
    fn from(line: &str) -> Self {
        Self::from_line(line.as_bytes())
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record({:?})", String::from_utf8_lossy(&self.bytes))
    }
}

/// Accumulates raw file bytes and yields complete lines.
///
/// The buffer holds a fixed-capacity scratch region. The prefix
/// `scratch[..filled]` is the unterminated fragment left over from earlier
/// reads; new bytes are written directly after it.
pub struct LineBuffer {
    scratch: Vec<u8>,
    filled: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            scratch: vec![0; capacity.max(1)],
            filled: 0,
        }
    }

    /// The retained, unterminated fragment.
    pub fn pending(&self) -> &[u8] {
        &self.scratch[..self.filled]
    }

    pub fn capacity(&self) -> usize {
        self.scratch.len()
    }

    /// Drop the retained fragment.
    pub fn reset(&mut self) {
        self.filled = 0;
    }

    /// The writable region after the fragment.
    ///
    /// Doubles the scratch region when the fragment already fills it, so a
    /// line longer than the capacity still makes progress.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        if self.filled == self.scratch.len() {
            let grown = self.scratch.len() * 2;
            self.scratch.resize(grown, 0);
        }
        &mut self.scratch[self.filled..]
    }

    /// Mark `count` bytes of the spare region as filled and split off every
    /// complete line.
    pub fn commit(&mut self, count: usize) -> Vec<Record> {
        let start = self.filled;
        self.filled = (start + count).min(self.scratch.len());
        self.slice_lines(start)
    }

    /// Append `bytes` after the fragment and split off every complete line.
    pub fn append(&mut self, mut bytes: &[u8]) -> Vec<Record> {
        let mut records = Vec::new();
        while !bytes.is_empty() {
            let spare = self.spare_mut();
            let count = spare.len().min(bytes.len());
            spare[..count].copy_from_slice(&bytes[..count]);
            bytes = &bytes[count..];
            records.extend(self.commit(count));
        }
        records
    }

    /// Emit the lines terminated inside `scratch[scan_from..filled]` and move
    /// the remainder to the front of the scratch region.
    fn slice_lines(&mut self, scan_from: usize) -> Vec<Record> {
        let mut records = Vec::new();
        let mut line_start = 0;
        let mut cursor = scan_from;

        while let Some(relative) = self.scratch[cursor..self.filled]
            .iter()
            .position(|&b| b == b'\n')
        {
            let newline = cursor + relative;
            records.push(Record::from_line(&self.scratch[line_start..=newline]));
            cursor = newline + 1;
            line_start = cursor;
        }

        if line_start > 0 {
            self.scratch.copy_within(line_start..self.filled, 0);
            self.filled -= line_start;
        }

        records
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}
