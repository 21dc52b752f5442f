/*
 * audit.rs
 * Copyright (C) 2026 The Posterer Authors
 *
 * This file is part of Posterer, a workbench for composing HTTP requests.
 *
 * Posterer is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Posterer is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Posterer.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Per-request audit trail: timestamped lines, a trailing postscript section, and a stopwatch.
//!
//! One `Auditor` belongs to one request. Clones share the same log, so the worker thread can
//! append while the UI thread reads the rendered text or the elapsed time.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::Local;

#[derive(Default)]
struct AuditState {
    lines: Vec<String>,
    postscript: Vec<String>,
    started: Option<Instant>,
    /// Cached by the first `stop()`.
    elapsed: Option<u64>,
}

impl AuditState {
    /// Whole milliseconds since `start()`, rounded up.
    fn since_start(&self) -> u64 {
        self.started
            .map(|s| s.elapsed().as_micros().div_ceil(1000) as u64)
            .unwrap_or(0)
    }

    fn format_line(&self, timed: bool, message: &str) -> String {
        let clock = Local::now().format("%H:%M:%S%.3f");
        if timed {
            format!("[{}] @{}ms - {}", clock, self.since_start(), message)
        } else {
            format!("[{}] {}", clock, message)
        }
    }
}

/// Append-only audit log with an idempotent stopwatch. Cheap to clone (shared state).
#[derive(Clone, Default)]
pub struct Auditor {
    state: Arc<Mutex<AuditState>>,
}

impl Auditor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AuditState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the reference point for timing. Only the first call has any effect.
    pub fn start(&self) {
        let mut state = self.lock();
        if state.started.is_none() {
            state.started = Some(Instant::now());
        }
    }

    /// Stop the stopwatch and return elapsed milliseconds. Later calls return the cached value.
    pub fn stop(&self) -> u64 {
        let mut state = self.lock();
        if let Some(elapsed) = state.elapsed {
            return elapsed;
        }
        let elapsed = state.since_start();
        state.elapsed = Some(elapsed);
        elapsed
    }

    /// Elapsed milliseconds once stopped; 0 before that.
    pub fn elapsed_millis(&self) -> u64 {
        self.lock().elapsed.unwrap_or(0)
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().elapsed.is_some()
    }

    /// Append to the main log, optionally prefixed with `@<ms>ms -` relative to `start()`.
    pub fn append(&self, timed: bool, message: impl AsRef<str>) {
        let mut state = self.lock();
        let line = state.format_line(timed, message.as_ref());
        state.lines.push(line);
    }

    /// Append to the postscript, which renders after the main log.
    pub fn postscript(&self, timed: bool, message: impl AsRef<str>) {
        let mut state = self.lock();
        let line = state.format_line(timed, message.as_ref());
        state.postscript.push(line);
    }

    /// Number of lines in the main log and postscript together.
    pub fn len(&self) -> usize {
        let state = self.lock();
        state.lines.len() + state.postscript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Main log then postscript, one line each.
    pub fn render(&self) -> String {
        let state = self.lock();
        let mut out = String::new();
        for line in state.lines.iter().chain(state.postscript.iter()) {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for Auditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl fmt::Debug for Auditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Auditor")
            .field("lines", &state.lines.len())
            .field("postscript", &state.postscript.len())
            .field("elapsed", &state.elapsed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn elapsed_is_zero_before_start_and_stop() {
        let a = Auditor::new();
        assert_eq!(a.elapsed_millis(), 0);
        assert!(!a.is_stopped());
    }

    #[test]
    fn second_stop_returns_cached_value() {
        let a = Auditor::new();
        a.start();
        thread::sleep(Duration::from_millis(5));
        let first = a.stop();
        thread::sleep(Duration::from_millis(10));
        let second = a.stop();
        assert_eq!(first, second);
        assert_eq!(a.elapsed_millis(), first);
        assert!(first >= 5);
    }

    #[test]
    fn first_start_wins() {
        let a = Auditor::new();
        a.start();
        thread::sleep(Duration::from_millis(20));
        a.start();
        assert!(a.stop() >= 20);
    }

    #[test]
    fn postscript_renders_after_main_log() {
        let a = Auditor::new();
        a.postscript(false, "HTTP/1.1 200 OK");
        a.append(false, "connecting");
        a.append(true, "connected");
        let text = a.render();
        let connecting = text.find("connecting").unwrap();
        let status = text.find("HTTP/1.1 200 OK").unwrap();
        assert!(connecting < status);
        assert!(text.contains("ms - connected"));
        assert_eq!(a.len(), 3);
        assert_eq!(text, a.to_string());
    }

    #[test]
    fn clones_share_the_log() {
        let a = Auditor::new();
        let b = a.clone();
        let handle = thread::spawn(move || b.append(false, "from worker"));
        handle.join().unwrap();
        assert!(a.render().contains("from worker"));
    }
}
