/*
 * mod.rs
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

//! Fires requests on background workers.
//!
//! Each fired request gets its own thread running a single-threaded tokio runtime. The caller
//! gets an `Arc<RequestTask>` back immediately and learns of completion through a
//! `TaskListener` (or by polling).

mod handle;
mod task;

pub use handle::{Outcome, RequestTask, TaskListener, TaskState};
pub use task::{execute, prepare, process, PreparedRequest, Processed, TransportResponse};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::audit::Auditor;
use crate::config::ExecutorConfig;
use crate::error::ExecError;
use crate::model::{Proxy, Request};
use crate::tls::KeyStoreSelection;

/// One request to fire, with its optional proxy, keystore and listener.
#[derive(Clone)]
pub struct Submission {
    request: Request,
    proxy: Option<Proxy>,
    keystore: Option<KeyStoreSelection>,
    timeout: Option<Duration>,
    listener: Option<Arc<dyn TaskListener>>,
}

impl Submission {
    /// Takes its own copy of `request`; later edits by the caller do not reach the task.
    pub fn new(request: &Request) -> Self {
        Self {
            request: request.clone(),
            proxy: None,
            keystore: None,
            timeout: None,
            listener: None,
        }
    }

    pub fn with_proxy(mut self, proxy: Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_keystore(mut self, keystore: KeyStoreSelection) -> Self {
        self.keystore = Some(keystore);
        self
    }

    /// Connect/read timeout. Zero means the executor default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn TaskListener>) -> Self {
        self.listener = Some(listener);
        self
    }
}

pub struct Executor {
    config: ExecutorConfig,
    next_id: AtomicU64,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Ids start at 1 and strictly increase.
    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Fire `submission` on a new worker thread. Never blocks on the network.
    pub fn fire(&self, submission: Submission) -> Arc<RequestTask> {
        self.fire_with(submission, |_| {})
    }

    /// Like [`Executor::fire`], but hands the task to `register` before the worker starts, so no
    /// listener can observe the task before `register` has returned.
    pub fn fire_with(&self, submission: Submission, register: impl FnOnce(&Arc<RequestTask>)) -> Arc<RequestTask> {
        let id = self.allocate_id();
        let Submission {
            request,
            proxy,
            keystore,
            timeout,
            listener,
        } = submission;
        let timeout = timeout
            .filter(|t| !t.is_zero())
            .unwrap_or(self.config.default_timeout);
        let task = Arc::new(RequestTask::new(id, request, Auditor::new(), listener));
        info!(id, endpoint = task.request().endpoint(), method = task.request().method(), "firing request");
        register(&task);

        let job = Job {
            task: Arc::clone(&task),
            proxy,
            keystore,
            timeout,
            config: self.config.clone(),
        };
        let spawned = thread::Builder::new()
            .name(format!("posterer-request-{}", id))
            .spawn(move || job.run());
        if let Err(e) = spawned {
            warn!(id, error = %e, "could not start request worker");
            task.auditor().start();
            task.auditor().stop();
            task.finish(Outcome::Failed(ExecError::Worker(e.to_string())));
        }
        task
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

struct Job {
    task: Arc<RequestTask>,
    proxy: Option<Proxy>,
    keystore: Option<KeyStoreSelection>,
    timeout: Duration,
    config: ExecutorConfig,
}

impl Job {
    fn run(self) {
        let auditor = self.task.auditor().clone();
        auditor.start();
        let outcome = self.outcome(&auditor);
        auditor.stop();
        self.task.finish(outcome);
    }

    fn outcome(&self, auditor: &Auditor) -> Outcome {
        let cancel = self.task.cancel_token();
        if cancel.is_cancelled() {
            return Outcome::Cancelled;
        }
        let prepared = match prepare(
            self.task.request(),
            self.proxy.as_ref(),
            self.keystore.as_ref(),
            &self.config,
            self.timeout,
            auditor,
        ) {
            Ok(p) => p,
            Err(e) => return Outcome::Failed(e),
        };
        if let Some(probe) = prepared.probe() {
            self.task.attach_probe(probe.clone());
        }
        self.task.set_state(TaskState::Prepared);

        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => return Outcome::Failed(ExecError::Worker(e.to_string())),
        };
        self.task.set_state(TaskState::Running);
        runtime.block_on(async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Outcome::Cancelled,
                result = execute(&prepared, auditor) => match result {
                    Ok(response) => Outcome::Succeeded(Box::new(response)),
                    Err(e) => Outcome::Failed(e),
                },
            }
        })
    }
}
