/*
 * lib.rs
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

//! C FFI for the Posterer core. Fired requests are identified by their request id (never 0).
//! Functions returning `*mut c_char` hand over ownership: free with posterer_free_string.
//! All string parameters are UTF-8 NUL-terminated; NULL is treated as empty.

use libc::{c_char, c_int, c_void};
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::ptr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use posterer_core::config::{default_settings_path, ExecutorConfig};
use posterer_core::executor::{RequestTask, Submission, TaskListener};
use posterer_core::{ExecError, Executor, KeyStoreMaterial, KeyStoreSelection, Proxy, Request};

/// Wrapper so *mut c_void can be moved to the worker thread. Callbacks run on that thread.
struct SendableUserData(*mut c_void);
unsafe impl Send for SendableUserData {}
unsafe impl Sync for SendableUserData {}

/// Completion callback: (request id, outcome, user_data). Outcome is one of the
/// POSTERER_OUTCOME_* constants. Runs on the request's worker thread; UI must marshal to main thread.
type OnRequestComplete = extern "C" fn(u64, c_int, *mut c_void);

pub const POSTERER_OUTCOME_SUCCEEDED: c_int = 0;
pub const POSTERER_OUTCOME_FAILED: c_int = 1;
pub const POSTERER_OUTCOME_CANCELLED: c_int = 2;

/// HTTP request as composed in the UI. Flags are 0/non-zero.
#[repr(C)]
pub struct PostererRequest {
    pub endpoint: *const c_char,
    pub method: *const c_char,
    pub payload: *const c_char,
    pub content_type: *const c_char,
    pub base64: c_int,
    /// TLS protocol name (e.g. "TLSv1.2"), or empty for default transport settings.
    pub security: *const c_char,
    pub authenticate: c_int,
    pub username: *const c_char,
    pub password: *const c_char,
}

/// Forward proxy. User and password are carried but not sent.
#[repr(C)]
pub struct PostererProxy {
    pub host: *const c_char,
    pub port: *const c_char,
    pub user: *const c_char,
    pub password: *const c_char,
}

/// Keystore file (.p12/.pfx or JKS) and the alias presented for client authentication.
#[repr(C)]
pub struct PostererKeyStore {
    pub path: *const c_char,
    pub password: *const c_char,
    pub alias: *const c_char,
}

/// Executor plus the handles of fired requests, keyed by request id.
struct Registry {
    executor: Executor,
    tasks: RwLock<HashMap<u64, Arc<RequestTask>>>,
}

fn registry() -> &'static Registry {
    static REGISTRY: once_cell::sync::OnceCell<Registry> = once_cell::sync::OnceCell::new();
    REGISTRY.get_or_init(|| {
        let config = match default_settings_path() {
            Some(path) => ExecutorConfig::load(&path).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
                ExecutorConfig::default()
            }),
            None => ExecutorConfig::default(),
        };
        Registry {
            executor: Executor::new(config),
            tasks: RwLock::new(HashMap::new()),
        }
    })
}

fn task(id: u64) -> Option<Arc<RequestTask>> {
    registry().tasks.read().ok().and_then(|g| g.get(&id).cloned())
}

fn ptr_to_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string()) }
}

fn str_or_empty(ptr: *const c_char) -> String {
    ptr_to_str(ptr).unwrap_or_default()
}

/// Owned C string; interior NULs are dropped rather than failing.
fn to_c_string(s: &str) -> *mut c_char {
    CString::new(s.replace('\0', ""))
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut())
}

thread_local! {
    static LAST_ERROR: std::cell::RefCell<Option<CString>> = std::cell::RefCell::new(None);
}

fn set_last_error(msg: &str) {
    let msg = CString::new(msg.replace('\0', "")).unwrap_or_default();
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(msg));
}

fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

fn request_from_c(r: &PostererRequest) -> Request {
    let mut request = Request::new(str_or_empty(r.endpoint), str_or_empty(r.method), str_or_empty(r.content_type))
        .with_payload(str_or_empty(r.payload))
        .with_base64(r.base64 != 0)
        .with_security(str_or_empty(r.security));
    if r.authenticate != 0 {
        request = request.with_basic_auth(str_or_empty(r.username), str_or_empty(r.password));
    }
    request
}

fn proxy_from_c(p: &PostererProxy) -> Proxy {
    Proxy {
        host: str_or_empty(p.host),
        port: str_or_empty(p.port),
        user: str_or_empty(p.user),
        password: str_or_empty(p.password),
    }
}

/// Bridges task completion to the C callback.
struct CallbackListener {
    callback: OnRequestComplete,
    user_data: SendableUserData,
}

impl TaskListener for CallbackListener {
    fn succeeded(&self, task: &RequestTask) {
        (self.callback)(task.reference_id(), POSTERER_OUTCOME_SUCCEEDED, self.user_data.0);
    }

    fn failed(&self, task: &RequestTask, _error: &ExecError) {
        (self.callback)(task.reference_id(), POSTERER_OUTCOME_FAILED, self.user_data.0);
    }

    fn cancelled(&self, task: &RequestTask) {
        (self.callback)(task.reference_id(), POSTERER_OUTCOME_CANCELLED, self.user_data.0);
    }
}

#[no_mangle]
pub extern "C" fn posterer_version() -> *const c_char {
    b"0.1.0\0".as_ptr() as *const c_char
}

/// Last error message from a failed call on this thread. Valid until next FFI call. Do not free.
#[no_mangle]
pub extern "C" fn posterer_last_error() -> *const c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|s| s.as_ptr())
            .unwrap_or(ptr::null())
    })
}

/// Install a stderr log subscriber. filter uses RUST_LOG syntax; NULL means "info".
/// Returns 0 on success, -1 if the filter is invalid or a subscriber is already installed.
#[no_mangle]
pub extern "C" fn posterer_init_logging(filter: *const c_char) -> c_int {
    let directives = ptr_to_str(filter).unwrap_or_else(|| "info".to_string());
    let filter = match tracing_subscriber::EnvFilter::try_new(&directives) {
        Ok(f) => f,
        Err(e) => {
            set_last_error(&format!("invalid log filter: {}", e));
            return -1;
        }
    };
    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        Ok(()) => {
            clear_last_error();
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Free a string returned by this library. No-op if ptr is NULL.
#[no_mangle]
pub unsafe extern "C" fn posterer_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        let _ = CString::from_raw(ptr);
    }
}

/// Free a NULL-terminated string list returned by posterer_keystore_aliases.
#[no_mangle]
pub unsafe extern "C" fn posterer_free_string_list(ptr: *mut *mut c_char) {
    if ptr.is_null() {
        return;
    }
    let mut p = ptr;
    while !(*p).is_null() {
        let _ = CString::from_raw(*p);
        p = p.add(1);
    }
    let len = p.offset_from(ptr) as usize + 1;
    let _ = Box::from_raw(ptr::slice_from_raw_parts_mut(ptr, len));
}

/// Fire a request on a background worker. proxy and keystore may be NULL. timeout_secs 0 uses
/// the configured default. on_complete may be NULL. Returns the request id, or 0 on error.
#[no_mangle]
pub unsafe extern "C" fn posterer_fire(
    request: *const PostererRequest,
    proxy: *const PostererProxy,
    keystore: *const PostererKeyStore,
    timeout_secs: u32,
    on_complete: Option<OnRequestComplete>,
    user_data: *mut c_void,
) -> u64 {
    let Some(request) = request.as_ref() else {
        set_last_error("request is NULL");
        return 0;
    };
    let mut submission = Submission::new(&request_from_c(request))
        .with_timeout(Duration::from_secs(u64::from(timeout_secs)));
    if let Some(p) = proxy.as_ref() {
        submission = submission.with_proxy(proxy_from_c(p));
    }
    if let Some(k) = keystore.as_ref() {
        if let Some(path) = ptr_to_str(k.path).filter(|p| !p.trim().is_empty()) {
            submission = submission.with_keystore(KeyStoreSelection::new(
                path,
                str_or_empty(k.password),
                str_or_empty(k.alias),
            ));
        }
    }
    if let Some(callback) = on_complete {
        submission = submission.with_listener(Arc::new(CallbackListener {
            callback,
            user_data: SendableUserData(user_data),
        }));
    }

    // Register before the worker can call back, so the callback may query the handle. The lock
    // is released before launch; a worker that fails to start reports on this thread.
    let reg = registry();
    if reg.tasks.is_poisoned() {
        set_last_error("request registry poisoned");
        return 0;
    }
    let task = reg.executor.fire_with(submission, |task| {
        let mut tasks = reg.tasks.write().unwrap_or_else(|e| e.into_inner());
        tasks.insert(task.reference_id(), Arc::clone(task));
    });
    clear_last_error();
    task.reference_id()
}

/// Request cancellation. Returns 1 if the request was still in flight, 0 otherwise.
#[no_mangle]
pub extern "C" fn posterer_cancel(id: u64) -> c_int {
    task(id).map(|t| t.cancel() as c_int).unwrap_or(0)
}

/// 1 once a successful response is available, else 0 (also for failed/cancelled/unknown ids).
#[no_mangle]
pub extern "C" fn posterer_is_complete(id: u64) -> c_int {
    task(id).map(|t| t.is_complete() as c_int).unwrap_or(0)
}

fn task_string(id: u64, f: impl FnOnce(&RequestTask) -> String) -> *mut c_char {
    match task(id) {
        Some(t) => {
            clear_last_error();
            to_c_string(&f(&t))
        }
        None => {
            set_last_error(&format!("unknown request id {}", id));
            ptr::null_mut()
        }
    }
}

/// Status line ("" until complete). NULL for an unknown id. Caller frees.
#[no_mangle]
pub extern "C" fn posterer_status(id: u64) -> *mut c_char {
    task_string(id, RequestTask::status)
}

/// Headers as name=value lines. Caller frees.
#[no_mangle]
pub extern "C" fn posterer_headers(id: u64) -> *mut c_char {
    task_string(id, RequestTask::headers)
}

/// Response body text. Caller frees.
#[no_mangle]
pub extern "C" fn posterer_body(id: u64) -> *mut c_char {
    task_string(id, RequestTask::body)
}

/// Audit log. Caller frees.
#[no_mangle]
pub extern "C" fn posterer_audit(id: u64) -> *mut c_char {
    task_string(id, RequestTask::audit)
}

/// Elapsed milliseconds; 0 until the request settles or for an unknown id.
#[no_mangle]
pub extern "C" fn posterer_elapsed_ms(id: u64) -> u64 {
    task(id).map(|t| t.elapsed_millis()).unwrap_or(0)
}

/// 1 if the server asked for a client certificate during the handshake.
#[no_mangle]
pub extern "C" fn posterer_needed_client_auth(id: u64) -> c_int {
    task(id).map(|t| t.needed_client_auth() as c_int).unwrap_or(0)
}

/// Drop the handle. An in-flight request keeps running but can no longer be queried.
#[no_mangle]
pub extern "C" fn posterer_release(id: u64) {
    if let Ok(mut tasks) = registry().tasks.write() {
        tasks.remove(&id);
    }
}

/// Aliases in a keystore, as a NULL-terminated list (free with posterer_free_string_list).
/// Returns NULL on error (see posterer_last_error).
#[no_mangle]
pub extern "C" fn posterer_keystore_aliases(path: *const c_char, password: *const c_char) -> *mut *mut c_char {
    let Some(path) = ptr_to_str(path) else {
        set_last_error("path is NULL");
        return ptr::null_mut();
    };
    match KeyStoreMaterial::load(&path, &str_or_empty(password)) {
        Ok(material) => {
            let mut ptrs: Vec<*mut c_char> = material.aliases().into_iter().map(to_c_string).collect();
            ptrs.push(ptr::null_mut());
            clear_last_error();
            Box::into_raw(ptrs.into_boxed_slice()) as *mut *mut c_char
        }
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// 1 if endpoint, method and content type are all non-blank. 0 for NULL.
#[no_mangle]
pub unsafe extern "C" fn posterer_request_is_actionable(request: *const PostererRequest) -> c_int {
    let request = request.as_ref().map(|r| request_from_c(r));
    Request::is_actionable(request.as_ref()) as c_int
}

/// 1 if host and port are both non-blank. 0 for NULL.
#[no_mangle]
pub unsafe extern "C" fn posterer_proxy_is_actionable(proxy: *const PostererProxy) -> c_int {
    let proxy = proxy.as_ref().map(|p| proxy_from_c(p));
    Proxy::is_actionable(proxy.as_ref()) as c_int
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    #[test]
    fn actionable_checks() {
        let endpoint = c("http://localhost/");
        let method = c("GET");
        let content_type = c("text/plain");
        let mut request = PostererRequest {
            endpoint: endpoint.as_ptr(),
            method: method.as_ptr(),
            payload: ptr::null(),
            content_type: content_type.as_ptr(),
            base64: 0,
            security: ptr::null(),
            authenticate: 0,
            username: ptr::null(),
            password: ptr::null(),
        };
        unsafe {
            assert_eq!(posterer_request_is_actionable(&request), 1);
            request.content_type = ptr::null();
            assert_eq!(posterer_request_is_actionable(&request), 0);
            assert_eq!(posterer_request_is_actionable(ptr::null()), 0);

            let host = c("proxy");
            let proxy = PostererProxy {
                host: host.as_ptr(),
                port: ptr::null(),
                user: ptr::null(),
                password: ptr::null(),
            };
            assert_eq!(posterer_proxy_is_actionable(&proxy), 0);
            assert_eq!(posterer_proxy_is_actionable(ptr::null()), 0);
        }
    }

    #[test]
    fn null_request_sets_last_error() {
        let id = unsafe { posterer_fire(ptr::null(), ptr::null(), ptr::null(), 0, None, ptr::null_mut()) };
        assert_eq!(id, 0);
        assert!(!posterer_last_error().is_null());
    }

    #[test]
    fn unknown_id_queries_are_harmless() {
        assert!(posterer_body(u64::MAX).is_null());
        assert_eq!(posterer_is_complete(u64::MAX), 0);
        assert_eq!(posterer_cancel(u64::MAX), 0);
        assert_eq!(posterer_elapsed_ms(u64::MAX), 0);
        posterer_release(u64::MAX);
    }

    #[test]
    fn unreadable_keystore_reports_error() {
        let path = c("/nonexistent/posterer/keystore.p12");
        let pw = c("pw");
        assert!(posterer_keystore_aliases(path.as_ptr(), pw.as_ptr()).is_null());
        let msg = unsafe { CStr::from_ptr(posterer_last_error()) }.to_str().unwrap().to_string();
        assert!(!msg.is_empty());
    }

    #[test]
    fn unknown_method_reports_failure_through_handle() {
        let endpoint = c("http://127.0.0.1:9/");
        let method = c("BREW");
        let content_type = c("text/plain");
        let request = PostererRequest {
            endpoint: endpoint.as_ptr(),
            method: method.as_ptr(),
            payload: ptr::null(),
            content_type: content_type.as_ptr(),
            base64: 0,
            security: ptr::null(),
            authenticate: 0,
            username: ptr::null(),
            password: ptr::null(),
        };
        let id = unsafe { posterer_fire(&request, ptr::null(), ptr::null(), 1, None, ptr::null_mut()) };
        assert!(id > 0);
        let t = task(id).unwrap();
        t.wait(Duration::from_secs(5));
        assert_eq!(posterer_is_complete(id), 0);
        let body = posterer_body(id);
        assert_eq!(unsafe { CStr::from_ptr(body) }.to_bytes(), b"");
        unsafe { posterer_free_string(body) };
        posterer_release(id);
        assert!(task(id).is_none());
    }

    extern "C" fn report_handle(id: u64, outcome: c_int, user_data: *mut c_void) {
        let audit = posterer_audit(id);
        let known = !audit.is_null();
        unsafe { posterer_free_string(audit) };
        let tx = unsafe { &*(user_data as *const std::sync::mpsc::SyncSender<(c_int, bool)>) };
        let _ = tx.send((outcome, known));
    }

    #[test]
    fn callback_can_query_its_own_handle() {
        let endpoint = c("http://127.0.0.1:9/");
        let method = c("BREW");
        let content_type = c("text/plain");
        let request = PostererRequest {
            endpoint: endpoint.as_ptr(),
            method: method.as_ptr(),
            payload: ptr::null(),
            content_type: content_type.as_ptr(),
            base64: 0,
            security: ptr::null(),
            authenticate: 0,
            username: ptr::null(),
            password: ptr::null(),
        };
        let (tx, rx) = std::sync::mpsc::sync_channel::<(c_int, bool)>(1);
        let id = unsafe {
            posterer_fire(
                &request,
                ptr::null(),
                ptr::null(),
                1,
                Some(report_handle),
                &tx as *const _ as *mut c_void,
            )
        };
        assert!(id > 0);
        let (outcome, known) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome, POSTERER_OUTCOME_FAILED);
        assert!(known);
        posterer_release(id);
    }
}
