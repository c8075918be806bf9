//! Which slice of a chart's history is on screen.
//!
//! A view either follows the tail of the series or is anchored at an
//! absolute end index, so new samples arriving while the user looks back
//! do not shift what is shown.

use std::ops::Range;

use crossterm::event::{KeyCode, KeyEvent};

use crate::event::Event;

/// Fixed-size window over a growing series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryView {
    size: usize,
    /// Exclusive end index while panned back; `None` follows the tail.
    end: Option<usize>,
}

impl HistoryView {
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            end: None,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_live(&self) -> bool {
        self.end.is_none()
    }

    /// Indices shown for a series of `len` entries.
    pub fn range(&self, len: usize) -> Range<usize> {
        let end = self.end.map_or(len, |e| e.min(len));
        end.saturating_sub(self.size)..end
    }

    pub fn slice<'a, T>(&self, series: &'a [T]) -> &'a [T] {
        &series[self.range(series.len())]
    }

    /// How many entries lie after the visible range.
    pub fn offset(&self, len: usize) -> usize {
        len - self.range(len).end
    }

    /// Move `steps` entries towards older history, stopping at a full
    /// window from the start.
    pub fn pan_back(&mut self, steps: usize, len: usize) {
        let floor = self.size.min(len);
        let end = self.range(len).end.saturating_sub(steps).max(floor);
        self.anchor(end, len);
    }

    /// Move `steps` entries towards the tail; reaching it resumes following.
    pub fn pan_forward(&mut self, steps: usize, len: usize) {
        if let Some(end) = self.end {
            self.anchor(end.min(len).saturating_add(steps), len);
        }
    }

    pub fn oldest(&mut self, len: usize) {
        self.anchor(self.size.min(len), len);
    }

    pub fn follow(&mut self) {
        self.end = None;
    }

    fn anchor(&mut self, end: usize, len: usize) {
        self.end = (end < len).then_some(end);
    }

    /// Apply a navigation key. Returns `true` if the key was one.
    ///
    /// Left/Right step one sample, `[`/`]` a whole window, Home jumps to
    /// the oldest samples and End back to the live tail.
    pub fn handle_key(&mut self, key: &KeyEvent, len: usize) -> bool {
        match key.code {
            KeyCode::Left => self.pan_back(1, len),
            KeyCode::Right => self.pan_forward(1, len),
            KeyCode::Char('[') => self.pan_back(self.size, len),
            KeyCode::Char(']') => self.pan_forward(self.size, len),
            KeyCode::Home => self.oldest(len),
            KeyCode::End => self.follow(),
            _ => return false,
        }
        true
    }

    /// [`handle_key`](Self::handle_key) for a bus event.
    pub fn handle_event(&mut self, ev: &Event, len: usize) -> bool {
        match ev {
            Event::Key(key) => self.handle_key(key, len),
            _ => false,
        }
    }

    /// HUD line describing the visible range, 1-based.
    pub fn describe(&self, len: usize) -> String {
        let range = self.range(len);
        if self.is_live() {
            format!("View: live, last {} of {len}", range.len())
        } else {
            format!("View: {}-{} of {len}", range.start + 1, range.end)
        }
    }
}
