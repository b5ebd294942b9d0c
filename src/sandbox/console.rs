// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::script::ConsoleSink;

/// Marker appended to lines cut at the length cap.
pub const TRUNCATION_MARKER: &str = "...";

/// Bounded capture of one record's `print` output.
///
/// Holds at most `max_lines` lines; when full, the oldest line is dropped
/// and counted. Lines longer than `max_line_len` characters are cut.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleBuffer {
    lines: VecDeque<String>,
    dropped: usize,
    max_lines: usize,
    max_line_len: usize,
}

impl ConsoleBuffer {
    pub fn new(max_lines: usize, max_line_len: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            dropped: 0,
            max_lines,
            max_line_len,
        }
    }

    pub fn push(&mut self, line: &str) {
        if self.max_lines == 0 {
            self.dropped += 1;
            return;
        }
        if self.lines.len() == self.max_lines {
            self.lines.pop_front();
            self.dropped += 1;
        }
        self.lines.push_back(truncate_line(line, self.max_line_len));
    }

    pub fn lines(&self) -> impl Iterator<Item = &String> {
        self.lines.iter()
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines.into()
    }
}

pub(crate) fn truncate_line(line: &str, max_len: usize) -> String {
    if line.chars().count() <= max_len {
        return line.to_string();
    }
    let mut cut: String = line.chars().take(max_len).collect();
    cut.push_str(TRUNCATION_MARKER);
    cut
}

/// Console handle shared between the blocking script worker and the host.
///
/// The host keeps a clone so that output printed before a forced
/// interruption is still available after the worker is abandoned.
#[derive(Debug, Clone)]
pub struct SharedConsole {
    buffer: Arc<Mutex<ConsoleBuffer>>,
    max_line_len: usize,
}

impl SharedConsole {
    pub fn new(max_lines: usize, max_line_len: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(ConsoleBuffer::new(max_lines, max_line_len))),
            max_line_len,
        }
    }

    /// Copy of the buffer as it stands now.
    pub fn snapshot(&self) -> ConsoleBuffer {
        match self.buffer.lock() {
            Ok(buffer) => buffer.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ConsoleSink for SharedConsole {
    fn write_line(&self, line: &str) {
        match self.buffer.lock() {
            Ok(mut buffer) => buffer.push(line),
            Err(poisoned) => poisoned.into_inner().push(line),
        }
    }

    fn max_line_chars(&self) -> usize {
        self.max_line_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_oldest_lines_beyond_cap() {
        let mut buffer = ConsoleBuffer::new(2, 80);
        buffer.push("one");
        buffer.push("two");
        buffer.push("three");
        assert_eq!(buffer.lines().collect::<Vec<_>>(), vec!["two", "three"]);
        assert_eq!(buffer.dropped(), 1);
    }

    #[test]
    fn truncates_long_lines_on_char_boundaries() {
        let mut buffer = ConsoleBuffer::new(4, 3);
        buffer.push("ééééé");
        assert_eq!(buffer.into_lines(), vec!["ééé...".to_string()]);
    }

    #[test]
    fn shared_console_survives_writer() {
        let console = SharedConsole::new(4, 80);
        let writer = console.clone();
        std::thread::spawn(move || writer.write_line("from worker"))
            .join()
            .unwrap();
        assert_eq!(console.snapshot().into_lines(), vec!["from worker".to_string()]);
    }

    #[test]
    fn shared_console_reports_its_line_cap() {
        assert_eq!(SharedConsole::new(4, 80).max_line_chars(), 80);
    }
}
