//! FFI bindings for meetwatch
//!
//! This module provides C-compatible functions so an embedding shell (a
//! webview host, a native meeting client) can forward its window and clipboard
//! events and collect the exported log. All functions use C strings
//! (null-terminated) and return allocated memory that must be freed by the
//! caller using `meetwatch_free_string`.
//!
//! Handles are not thread-safe; use each one from a single thread.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::rc::Rc;

use crate::clock::SystemClock;
use crate::config::MonitorConfig;
use crate::form::SessionForm;
use crate::monitor::capture::{CaptureError, CaptureStream, SharedStream};
use crate::monitor::export::MemoryExporter;
use crate::monitor::host::{EventHub, HostEventKind};
use crate::monitor::view::{CaptureOutcome, Entry, MonitoringView};
use crate::scoring::PointTable;
use crate::types::{BehaviorEvent, ExportDocument};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Score a JSON array of behavior events with the default point table.
///
/// # Safety
/// - `events_json` must be a valid null-terminated C string.
/// - Returns the score (0-100), or -1 on error; call `meetwatch_last_error`
///   to get the error message.
#[no_mangle]
pub unsafe extern "C" fn meetwatch_score_events(events_json: *const c_char) -> i32 {
    clear_last_error();

    let json_str = match cstr_to_string(events_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match serde_json::from_str::<Vec<BehaviorEvent>>(&json_str) {
        Ok(events) => PointTable::default().score(&events) as i32,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Check that an exported meeting log's summary matches its events.
///
/// # Safety
/// - `log_json` must be a valid null-terminated C string.
/// - Returns 0 when consistent, -1 otherwise; call `meetwatch_last_error`
///   for the reason.
#[no_mangle]
pub unsafe extern "C" fn meetwatch_verify_log(log_json: *const c_char) -> i32 {
    clear_last_error();

    let json_str = match cstr_to_string(log_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    let result = ExportDocument::from_json(&json_str)
        .and_then(|doc| doc.verify(&PointTable::default()));
    match result {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Session API
// ============================================================================

/// Opaque handle to a mounted monitoring view
pub struct MeetwatchSessionHandle {
    hub: Rc<EventHub>,
    view: MonitoringView<EventHub>,
    stream: Option<SharedStream>,
}

/// Validate the participant and mount a monitoring view.
///
/// # Safety
/// - `name` and `email` must be valid null-terminated C strings.
/// - `config_json` may be NULL for the default configuration.
/// - Returns a pointer that must be freed with `meetwatch_session_free`.
/// - Returns NULL on error; call `meetwatch_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn meetwatch_session_new(
    name: *const c_char,
    email: *const c_char,
    config_json: *const c_char,
) -> *mut MeetwatchSessionHandle {
    clear_last_error();

    let name_str = match cstr_to_string(name) {
        Some(s) => s,
        None => {
            set_last_error("Invalid name string pointer");
            return ptr::null_mut();
        }
    };

    let email_str = match cstr_to_string(email) {
        Some(s) => s,
        None => {
            set_last_error("Invalid email string pointer");
            return ptr::null_mut();
        }
    };

    let config = if config_json.is_null() {
        MonitorConfig::default()
    } else {
        let parsed = cstr_to_string(config_json)
            .ok_or_else(|| "Invalid config string pointer".to_string())
            .and_then(|json| MonitorConfig::from_json(&json).map_err(|e| e.to_string()));
        match parsed {
            Ok(config) => config,
            Err(msg) => {
                set_last_error(&msg);
                return ptr::null_mut();
            }
        }
    };

    let session = match SessionForm::with_values(name_str, email_str).submit() {
        Ok(session) => session,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let hub = Rc::new(EventHub::new());
    match MonitoringView::mount(Some(session), Rc::clone(&hub), Rc::new(SystemClock), config) {
        Entry::Mounted(view) => Box::into_raw(Box::new(MeetwatchSessionHandle {
            hub,
            view,
            stream: None,
        })),
        Entry::Redirect(_) => {
            set_last_error("Monitoring view refused the session");
            ptr::null_mut()
        }
    }
}

/// Free a session handle, releasing capture and observers.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `meetwatch_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn meetwatch_session_free(handle: *mut MeetwatchSessionHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Forward a host event (`blur`, `focus`, `resize`, `copy`, `cut`, `paste`,
/// `unload`/`beforeunload`).
///
/// # Safety
/// - `handle` must be a valid pointer returned by `meetwatch_session_new`.
/// - `event` must be a valid null-terminated C string.
/// - Returns the score after the event, or -1 on error.
#[no_mangle]
pub unsafe extern "C" fn meetwatch_session_dispatch(
    handle: *mut MeetwatchSessionHandle,
    event: *const c_char,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }

    let handle = &mut *handle;

    let event_str = match cstr_to_string(event) {
        Some(s) => s,
        None => {
            set_last_error("Invalid event string pointer");
            return -1;
        }
    };

    match event_str.parse::<HostEventKind>() {
        Ok(kind) => {
            handle.hub.dispatch(kind);
            handle.view.score() as i32
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Report the outcome of the host's capture request.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `meetwatch_session_new`.
/// - `granted` is non-zero when the host obtained the stream.
/// - Returns 0 when bound, 1 when degraded, 2 when discarded, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn meetwatch_session_capture_result(
    handle: *mut MeetwatchSessionHandle,
    granted: i32,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }

    let handle = &mut *handle;

    let issued = (granted != 0)
        .then(|| SharedStream::for_constraints(&handle.view.capture_constraints()));
    let result: Result<Box<dyn CaptureStream>, CaptureError> = match &issued {
        Some(stream) => Ok(Box::new(stream.clone())),
        None => Err(CaptureError::PermissionDenied),
    };

    // Only a bound stream is reported back; discarded ones are already stopped
    match handle.view.complete_capture(result) {
        CaptureOutcome::Bound => {
            handle.stream = issued;
            0
        }
        CaptureOutcome::Degraded => 1,
        CaptureOutcome::Discarded => 2,
    }
}

/// Number of capture tracks the host should keep running.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `meetwatch_session_new`.
/// - Returns 0 once the view has released the stream, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn meetwatch_session_live_tracks(
    handle: *const MeetwatchSessionHandle,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }

    let handle = &*handle;
    handle
        .stream
        .as_ref()
        .map(|s| s.live_tracks() as i32)
        .unwrap_or(0)
}

/// Current cheating score.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `meetwatch_session_new`.
/// - Returns the score (0-100), or -1 on error.
#[no_mangle]
pub unsafe extern "C" fn meetwatch_session_score(handle: *const MeetwatchSessionHandle) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }

    (*handle).view.score() as i32
}

/// Current view state as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `meetwatch_session_new`.
/// - Returns a newly allocated string that must be freed with `meetwatch_free_string`.
/// - Returns NULL on error; call `meetwatch_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn meetwatch_session_snapshot(
    handle: *const MeetwatchSessionHandle,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    match serde_json::to_string(&(*handle).view.snapshot()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Leave the meeting and return the exported log JSON.
///
/// The host is responsible for any delay before offering the download.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `meetwatch_session_new`.
/// - Returns a newly allocated string that must be freed with `meetwatch_free_string`.
/// - Returns NULL on error; call `meetwatch_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn meetwatch_session_leave(
    handle: *mut MeetwatchSessionHandle,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    let handle = &mut *handle;

    if let Err(e) = handle.view.leave() {
        set_last_error(&e.to_string());
        return ptr::null_mut();
    }

    let mut exporter = MemoryExporter::new();
    if let Err(e) = handle.view.finish(&mut exporter) {
        set_last_error(&e.to_string());
        return ptr::null_mut();
    }

    match exporter.last() {
        Some((_, contents)) => string_to_cstr(contents),
        None => {
            set_last_error("Export produced no document");
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer valid until the next meetwatch call on this thread.
/// - Returns NULL when the last call succeeded.
#[no_mangle]
pub unsafe extern "C" fn meetwatch_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by meetwatch functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a meetwatch function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn meetwatch_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        meetwatch_free_string(ptr);
        s
    }

    #[test]
    fn test_score_events() {
        let json = c(r#"[
            {"type": "windowControl", "timestamp": "2024-01-15T14:00:00.000Z"},
            {"type": "cameraOff", "timestamp": "2024-01-15T14:00:01.000Z"}
        ]"#);

        unsafe {
            assert_eq!(meetwatch_score_events(json.as_ptr()), 30);
            assert_eq!(meetwatch_score_events(c("nope").as_ptr()), -1);
            assert!(!meetwatch_last_error().is_null());
            assert_eq!(meetwatch_score_events(ptr::null()), -1);
        }
    }

    #[test]
    fn test_session_lifecycle() {
        unsafe {
            let handle = meetwatch_session_new(c("Ana").as_ptr(), c("a@x.com").as_ptr(), ptr::null());
            assert!(!handle.is_null());

            assert_eq!(meetwatch_session_capture_result(handle, 1), 0);
            assert_eq!(meetwatch_session_live_tracks(handle), 2);

            assert_eq!(meetwatch_session_dispatch(handle, c("blur").as_ptr()), 10);
            assert_eq!(meetwatch_session_dispatch(handle, c("blur").as_ptr()), 20);
            assert_eq!(meetwatch_session_dispatch(handle, c("paste").as_ptr()), 25);
            assert_eq!(meetwatch_session_dispatch(handle, c("scroll").as_ptr()), -1);
            assert_eq!(meetwatch_session_score(handle), 25);

            let snapshot = take_string(meetwatch_session_snapshot(handle));
            assert!(snapshot.contains("\"state\":\"active\""));

            let log = take_string(meetwatch_session_leave(handle));
            assert_eq!(meetwatch_session_live_tracks(handle), 0);
            assert_eq!(meetwatch_verify_log(c(&log).as_ptr()), 0);

            let doc = ExportDocument::from_json(&log).unwrap();
            assert_eq!(doc.summary.score, 25);
            assert_eq!(doc.summary.window_controls, 2);

            assert!(meetwatch_session_leave(handle).is_null());
            meetwatch_session_free(handle);
        }
    }

    #[test]
    fn test_session_rejects_invalid_email() {
        unsafe {
            let handle = meetwatch_session_new(c("Ana").as_ptr(), c("nope").as_ptr(), ptr::null());
            assert!(handle.is_null());
            assert!(!meetwatch_last_error().is_null());
        }
    }

    #[test]
    fn test_repeated_capture_result_keeps_bound_stream() {
        unsafe {
            let handle = meetwatch_session_new(c("Ana").as_ptr(), c("a@x.com").as_ptr(), ptr::null());
            assert!(!handle.is_null());

            assert_eq!(meetwatch_session_capture_result(handle, 1), 0);
            assert_eq!(meetwatch_session_capture_result(handle, 1), 2);
            assert_eq!(meetwatch_session_capture_result(handle, 0), 2);
            assert_eq!(meetwatch_session_live_tracks(handle), 2);
            assert!((*handle).view.is_capturing());

            let _ = take_string(meetwatch_session_leave(handle));
            assert_eq!(meetwatch_session_live_tracks(handle), 0);
            meetwatch_session_free(handle);
        }
    }

    #[test]
    fn test_capture_result_after_unload_is_discarded() {
        unsafe {
            let handle = meetwatch_session_new(c("Ana").as_ptr(), c("a@x.com").as_ptr(), ptr::null());
            assert!(!handle.is_null());

            assert_eq!(meetwatch_session_dispatch(handle, c("beforeunload").as_ptr()), 0);
            assert_eq!(meetwatch_session_capture_result(handle, 1), 2);
            assert_eq!(meetwatch_session_live_tracks(handle), 0);

            meetwatch_session_free(handle);
        }
    }

    #[test]
    fn test_denied_capture_degrades() {
        unsafe {
            let config = c(r#"{"export_delay_ms": 0}"#);
            let handle = meetwatch_session_new(c("Bo").as_ptr(), c("b@x.com").as_ptr(), config.as_ptr());
            assert!(!handle.is_null());

            assert_eq!(meetwatch_session_capture_result(handle, 0), 1);
            assert_eq!(meetwatch_session_live_tracks(handle), 0);
            assert_eq!(meetwatch_session_dispatch(handle, c("copy").as_ptr()), 5);

            meetwatch_session_free(handle);
        }
    }
}
