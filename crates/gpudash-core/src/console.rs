use std::collections::VecDeque;

use crate::logging::LogEntry;

const MAX_HISTORY: usize = 50;

/// State of the drop-down console: captured log lines, the command line
/// being edited, and previously submitted commands.
pub struct Console {
    pub visible: bool,
    log_lines: VecDeque<LogEntry>,
    pub input_buffer: String,
    pub cursor_pos: usize,
    scroll_offset: usize,
    max_lines: usize,
    history: VecDeque<String>,
    /// Position while browsing history; `None` when editing a fresh line.
    history_pos: Option<usize>,
}

impl Default for Console {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl Console {
    pub fn new(max_lines: usize) -> Self {
        Self {
            visible: false,
            log_lines: VecDeque::with_capacity(max_lines),
            input_buffer: String::new(),
            cursor_pos: 0,
            scroll_offset: 0,
            max_lines,
            history: VecDeque::new(),
            history_pos: None,
        }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    pub fn push_log(&mut self, entry: LogEntry) {
        if self.log_lines.len() >= self.max_lines {
            self.log_lines.pop_front();
            self.scroll_offset = self.scroll_offset.saturating_sub(1);
        }
        self.log_lines.push_back(entry);
    }

    pub fn log_lines(&self) -> &VecDeque<LogEntry> {
        &self.log_lines
    }

    pub fn clear_logs(&mut self) {
        self.log_lines.clear();
        self.scroll_offset = 0;
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn scroll_up(&mut self, amount: usize) {
        let max_offset = self.log_lines.len().saturating_sub(1);
        self.scroll_offset = (self.scroll_offset + amount).min(max_offset);
    }

    pub fn scroll_down(&mut self, amount: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(amount);
    }

    pub fn insert_char(&mut self, c: char) {
        self.input_buffer.insert(self.cursor_pos, c);
        self.cursor_pos += c.len_utf8();
    }

    /// Byte offset of the char boundary left of the cursor.
    fn prev_boundary(&self) -> Option<usize> {
        self.input_buffer[..self.cursor_pos]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
    }

    pub fn backspace(&mut self) {
        if let Some(prev) = self.prev_boundary() {
            self.input_buffer.remove(prev);
            self.cursor_pos = prev;
        }
    }

    pub fn cursor_left(&mut self) {
        if let Some(prev) = self.prev_boundary() {
            self.cursor_pos = prev;
        }
    }

    pub fn cursor_right(&mut self) {
        if let Some(c) = self.input_buffer[self.cursor_pos..].chars().next() {
            self.cursor_pos += c.len_utf8();
        }
    }

    /// Submit the current input buffer. Returns the input and clears the buffer.
    ///
    /// Non-blank input is remembered for [`history_prev`](Self::history_prev).
    pub fn submit_input(&mut self) -> String {
        let input = std::mem::take(&mut self.input_buffer);
        self.cursor_pos = 0;
        self.history_pos = None;
        let trimmed = input.trim();
        if !trimmed.is_empty() && self.history.back().map(String::as_str) != Some(trimmed) {
            if self.history.len() >= MAX_HISTORY {
                self.history.pop_front();
            }
            self.history.push_back(trimmed.to_string());
        }
        input
    }

    /// Replace the input line with the previous history entry.
    pub fn history_prev(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let pos = match self.history_pos {
            None => self.history.len() - 1,
            Some(p) => p.saturating_sub(1),
        };
        self.recall(Some(pos));
    }

    /// Move forward through history; past the newest entry the line is
    /// cleared.
    pub fn history_next(&mut self) {
        match self.history_pos {
            Some(p) if p + 1 < self.history.len() => self.recall(Some(p + 1)),
            Some(_) => self.recall(None),
            None => {}
        }
    }

    fn recall(&mut self, pos: Option<usize>) {
        self.history_pos = pos;
        self.input_buffer = pos
            .and_then(|p| self.history.get(p).cloned())
            .unwrap_or_default();
        self.cursor_pos = self.input_buffer.len();
    }
}
