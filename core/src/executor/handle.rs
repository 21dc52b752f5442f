/*
 * handle.rs
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

//! Result handle for one fired request.
//!
//! The worker thread sets the outcome once; readers on any thread get the processed
//! status/headers/body, computed at most once on first access.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::audit::Auditor;
use crate::error::ExecError;
use crate::model::Request;
use crate::tls::ClientAuthProbe;

use super::task::{process, Processed, TransportResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Created,
    Prepared,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed | TaskState::Cancelled)
    }
}

/// Terminal result as produced by the worker.
pub enum Outcome {
    Succeeded(Box<dyn TransportResponse>),
    Failed(ExecError),
    Cancelled,
}

impl Outcome {
    fn state(&self) -> TaskState {
        match self {
            Outcome::Succeeded(_) => TaskState::Succeeded,
            Outcome::Failed(_) => TaskState::Failed,
            Outcome::Cancelled => TaskState::Cancelled,
        }
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Succeeded(r) => f.debug_tuple("Succeeded").field(&r.status_line()).finish(),
            Outcome::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
            Outcome::Cancelled => f.write_str("Cancelled"),
        }
    }
}

/// Completion callbacks. Invoked once, on the worker thread.
pub trait TaskListener: Send + Sync {
    fn succeeded(&self, _task: &RequestTask) {}
    fn failed(&self, _task: &RequestTask, _error: &ExecError) {}
    fn cancelled(&self, _task: &RequestTask) {}
}

pub struct RequestTask {
    id: u64,
    request: Request,
    auditor: Auditor,
    state: Mutex<TaskState>,
    settled: Condvar,
    probe: OnceLock<ClientAuthProbe>,
    outcome: OnceLock<Outcome>,
    processed: OnceLock<Processed>,
    cancel: CancellationToken,
    listener: Option<Arc<dyn TaskListener>>,
}

impl RequestTask {
    pub(crate) fn new(
        id: u64,
        request: Request,
        auditor: Auditor,
        listener: Option<Arc<dyn TaskListener>>,
    ) -> Self {
        Self {
            id,
            request,
            auditor,
            state: Mutex::new(TaskState::Created),
            settled: Condvar::new(),
            probe: OnceLock::new(),
            outcome: OnceLock::new(),
            processed: OnceLock::new(),
            cancel: CancellationToken::new(),
            listener,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn reference_id(&self) -> u64 {
        self.id
    }

    /// The copy of the request taken when it was fired.
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn auditor(&self) -> &Auditor {
        &self.auditor
    }

    /// Rendered audit log.
    pub fn audit(&self) -> String {
        self.auditor.render()
    }

    /// Milliseconds from prepare to completion; 0 until the task settles.
    pub fn elapsed_millis(&self) -> u64 {
        self.auditor.elapsed_millis()
    }

    pub fn state(&self) -> TaskState {
        *self.lock_state()
    }

    pub(crate) fn set_state(&self, next: TaskState) {
        let mut state = self.lock_state();
        if !state.is_terminal() {
            *state = next;
        }
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn attach_probe(&self, probe: ClientAuthProbe) {
        let _ = self.probe.set(probe);
    }

    /// The server asked for a client certificate during the handshake.
    pub fn needed_client_auth(&self) -> bool {
        self.probe.get().map(ClientAuthProbe::observed).unwrap_or(false)
    }

    /// Ask the worker to abandon the request. Returns false if the task had already settled.
    pub fn cancel(&self) -> bool {
        if self.state().is_terminal() {
            return false;
        }
        self.cancel.cancel();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == TaskState::Cancelled
    }

    /// Record the terminal outcome and notify. Only the first call has any effect.
    pub(crate) fn finish(&self, outcome: Outcome) {
        let state = outcome.state();
        if self.outcome.set(outcome).is_err() {
            return;
        }
        {
            let mut guard = self.lock_state();
            *guard = state;
        }
        let outcome = self.outcome.get();
        match outcome {
            Some(Outcome::Succeeded(_)) => self.auditor.append(true, "request succeeded"),
            Some(Outcome::Failed(e)) => self.auditor.append(true, format!("request failed: {}", e)),
            Some(Outcome::Cancelled) => self.auditor.append(true, "request cancelled"),
            None => {}
        }
        self.settled.notify_all();
        tracing::debug!(id = self.id, state = ?state, elapsed_ms = self.elapsed_millis(), "request settled");

        if let Some(listener) = &self.listener {
            match outcome {
                Some(Outcome::Succeeded(_)) => listener.succeeded(self),
                Some(Outcome::Failed(e)) => listener.failed(self, e),
                Some(Outcome::Cancelled) => listener.cancelled(self),
                None => {}
            }
        }
    }

    /// Block until the task settles or `limit` passes; returns the state at that point.
    /// Meant for tests and headless callers; UI code should use a `TaskListener`.
    pub fn wait(&self, limit: Duration) -> TaskState {
        let guard = self.lock_state();
        let (guard, _) = self
            .settled
            .wait_timeout_while(guard, limit, |s| !s.is_terminal())
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }

    /// The failure, if the task failed.
    pub fn failure(&self) -> Option<&ExecError> {
        match self.outcome.get() {
            Some(Outcome::Failed(e)) => Some(e),
            _ => None,
        }
    }

    fn processed(&self) -> Option<&Processed> {
        match self.outcome.get() {
            Some(Outcome::Succeeded(response)) => Some(
                self.processed
                    .get_or_init(|| process(response.as_ref(), &self.auditor)),
            ),
            _ => None,
        }
    }

    /// Status line, or empty if not available.
    pub fn status(&self) -> String {
        self.processed().map(|p| p.status.clone()).unwrap_or_default()
    }

    /// `name=value` lines, or empty if not available.
    pub fn headers(&self) -> String {
        self.processed().map(|p| p.headers.clone()).unwrap_or_default()
    }

    /// Body text, or empty if not available.
    pub fn body(&self) -> String {
        self.processed().map(|p| p.body.clone()).unwrap_or_default()
    }

    /// True once a successful response has been processed.
    pub fn is_complete(&self) -> bool {
        self.processed().is_some()
    }
}

impl fmt::Debug for RequestTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestTask")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("endpoint", &self.request.endpoint())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    struct CountingResponse {
        reads: Arc<AtomicUsize>,
    }

    impl TransportResponse for CountingResponse {
        fn status_line(&self) -> String {
            self.reads.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            "HTTP/1.1 200 OK".to_string()
        }

        fn headers(&self) -> Vec<(String, String)> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            vec![("Server".to_string(), "stub".to_string())]
        }

        fn body_text(&self) -> String {
            self.reads.fetch_add(1, Ordering::SeqCst);
            "payload".to_string()
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<&'static str>>,
    }

    impl TaskListener for Recorder {
        fn succeeded(&self, _task: &RequestTask) {
            self.calls.lock().unwrap().push("succeeded");
        }
        fn failed(&self, _task: &RequestTask, _error: &ExecError) {
            self.calls.lock().unwrap().push("failed");
        }
        fn cancelled(&self, _task: &RequestTask) {
            self.calls.lock().unwrap().push("cancelled");
        }
    }

    fn task() -> RequestTask {
        RequestTask::new(1, Request::new("http://h/", "GET", "text/plain"), Auditor::new(), None)
    }

    #[test]
    fn processing_happens_once_under_concurrent_reads() {
        let reads = Arc::new(AtomicUsize::new(0));
        let task = Arc::new(task());
        task.finish(Outcome::Succeeded(Box::new(CountingResponse { reads: reads.clone() })));

        let readers: Vec<_> = (0..8)
            .map(|i| {
                let task = task.clone();
                thread::spawn(move || match i % 3 {
                    0 => task.body(),
                    1 => task.headers(),
                    _ => task.status(),
                })
            })
            .collect();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(reads.load(Ordering::SeqCst), 3);
        assert_eq!(task.body(), "payload");
        assert_eq!(task.body(), "payload");
        assert_eq!(task.headers(), "Server=stub\n");
        assert_eq!(task.status(), "HTTP/1.1 200 OK");
        assert!(task.is_complete());
        assert_eq!(reads.load(Ordering::SeqCst), 3);
        assert_eq!(task.audit().matches("HTTP/1.1 200 OK").count(), 1);
    }

    #[test]
    fn accessors_are_empty_before_and_after_cancel() {
        let t = task();
        assert_eq!(t.body(), "");
        assert!(!t.is_complete());
        assert!(t.cancel());
        t.finish(Outcome::Cancelled);
        assert_eq!(t.state(), TaskState::Cancelled);
        assert!(!t.is_complete());
        assert_eq!(t.status(), "");
        assert_eq!(t.headers(), "");
        assert!(!t.cancel());
    }

    #[test]
    fn first_outcome_wins_and_listener_called_once() {
        let recorder = Arc::new(Recorder::default());
        let t = RequestTask::new(
            2,
            Request::new("http://h/", "GET", "text/plain"),
            Auditor::new(),
            Some(recorder.clone() as Arc<dyn TaskListener>),
        );
        t.finish(Outcome::Failed(ExecError::Protocol("bad".into())));
        t.finish(Outcome::Cancelled);
        assert_eq!(t.state(), TaskState::Failed);
        assert!(matches!(t.failure(), Some(ExecError::Protocol(_))));
        assert_eq!(*recorder.calls.lock().unwrap(), vec!["failed"]);
    }

    #[test]
    fn terminal_state_is_sticky() {
        let t = task();
        t.set_state(TaskState::Running);
        t.finish(Outcome::Cancelled);
        t.set_state(TaskState::Running);
        assert_eq!(t.state(), TaskState::Cancelled);
    }

    #[test]
    fn wait_times_out_while_running() {
        let t = task();
        t.set_state(TaskState::Running);
        assert_eq!(t.wait(Duration::from_millis(10)), TaskState::Running);
    }

    #[test]
    fn no_client_auth_without_probe() {
        let t = task();
        assert!(!t.needed_client_auth());
        let probe = ClientAuthProbe::new();
        t.attach_probe(probe.clone());
        probe.mark();
        assert!(t.needed_client_auth());
    }
}
