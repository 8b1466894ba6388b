//! FFI bindings for Neuroscreen
//!
//! This module provides C-compatible functions for driving a screening session
//! from a non-Rust UI host. Results are returned as JSON in null-terminated C
//! strings that must be freed by the caller using `ns_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::slice;

use serde::{Deserialize, Serialize};

use crate::config::ScreeningConfig;
use crate::encoder::ReportEncoder;
use crate::error::ScreeningError;
use crate::extractors::{FrameSize, Keypoints};
use crate::pipeline::{
    questionnaire_to_assessment, spiral_to_assessment, voice_to_assessment, Screener,
};
use crate::questionnaire::SymptomQuestionnaire;
use crate::session::{AssessmentSession, Submission};

// Thread-local storage for the last error
thread_local! {
    static LAST_ERROR: RefCell<Option<(CString, CString)>> = RefCell::new(None);
}

/// Set the last error message and code
fn set_last_error(msg: &str, code: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok().zip(CString::new(code).ok());
    });
}

/// Clear the last error
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

/// Helper to borrow a caller-owned byte buffer; NULL is only valid with length 0
unsafe fn borrow_bytes<'a>(data: *const u8, len: usize) -> Option<&'a [u8]> {
    if data.is_null() {
        return (len == 0).then_some(&[][..]);
    }
    Some(slice::from_raw_parts(data, len))
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Serialize a result to a C string, or record the error and return NULL
fn respond<T: Serialize>(result: Result<T, ScreeningError>) -> *mut c_char {
    match result.and_then(|value| serde_json::to_string(&value).map_err(ScreeningError::from)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string(), e.code());
            ptr::null_mut()
        }
    }
}

fn invalid_pointer(what: &str) -> *mut c_char {
    set_last_error(&format!("Invalid {what} pointer"), "INVALID_INPUT");
    ptr::null_mut()
}

/// Keypoints plus the frame they were detected in
#[derive(Debug, Deserialize)]
struct KeypointFrame {
    keypoints: Keypoints,
    frame: FrameSize,
}

// ============================================================================
// Stateless API
// ============================================================================

/// Assess an encoded spiral image and return the result as JSON.
///
/// # Safety
/// - `data` must point to `len` readable bytes (or be NULL with `len == 0`).
/// - Returns a newly allocated string that must be freed with `ns_free_string`.
/// - Returns NULL on error; call `ns_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn ns_spiral_assess(data: *const u8, len: usize) -> *mut c_char {
    clear_last_error();
    match borrow_bytes(data, len) {
        Some(bytes) => respond(spiral_to_assessment(bytes)),
        None => invalid_pointer("image data"),
    }
}

/// Assess a WAV recording and return the result as JSON.
///
/// # Safety
/// - `data` must point to `len` readable bytes (or be NULL with `len == 0`).
/// - Returns a newly allocated string that must be freed with `ns_free_string`.
/// - Returns NULL on error; call `ns_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn ns_voice_assess_wav(data: *const u8, len: usize) -> *mut c_char {
    clear_last_error();
    match borrow_bytes(data, len) {
        Some(bytes) => respond(voice_to_assessment(bytes)),
        None => invalid_pointer("audio data"),
    }
}

/// Score a questionnaire given as JSON and return the result as JSON.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `ns_free_string`.
/// - Returns NULL on error; call `ns_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn ns_questionnaire_assess(json: *const c_char) -> *mut c_char {
    clear_last_error();
    match cstr_to_string(json) {
        Some(json) => respond(
            SymptomQuestionnaire::from_json(&json).and_then(|q| questionnaire_to_assessment(&q)),
        ),
        None => invalid_pointer("JSON string"),
    }
}

// ============================================================================
// Session API
// ============================================================================

/// Opaque handle to a screening session
pub struct NsSessionHandle {
    screener: Screener,
    session: AssessmentSession,
    encoder: ReportEncoder,
}

/// Create a new session.
///
/// # Safety
/// - `config_json` may be NULL for the default configuration, otherwise it must
///   be a valid null-terminated C string holding a `ScreeningConfig`.
/// - Must be freed with `ns_session_free`.
/// - Returns NULL on error; call `ns_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn ns_session_new(config_json: *const c_char) -> *mut NsSessionHandle {
    clear_last_error();

    let screener = if config_json.is_null() {
        Ok(Screener::new())
    } else {
        match cstr_to_string(config_json) {
            Some(json) => ScreeningConfig::from_json(&json).and_then(Screener::from_config),
            None => Err(ScreeningError::InvalidInput(
                "Config is not valid UTF-8".to_string(),
            )),
        }
    };

    match screener {
        Ok(screener) => Box::into_raw(Box::new(NsSessionHandle {
            screener,
            session: AssessmentSession::new(),
            encoder: ReportEncoder::new(),
        })),
        Err(e) => {
            set_last_error(&e.to_string(), e.code());
            ptr::null_mut()
        }
    }
}

/// Free a session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `ns_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn ns_session_free(session: *mut NsSessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

unsafe fn submit(handle: *mut NsSessionHandle, submission: Submission) -> *mut c_char {
    if handle.is_null() {
        return invalid_pointer("session");
    }
    let handle = &mut *handle;
    respond(handle.screener.submit(&mut handle.session, submission))
}

/// Submit an encoded spiral image to the session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `ns_session_new`.
/// - `data` must point to `len` readable bytes.
/// - Returns the modality result as JSON (free with `ns_free_string`), or NULL on error.
#[no_mangle]
pub unsafe extern "C" fn ns_session_submit_spiral(
    session: *mut NsSessionHandle,
    data: *const u8,
    len: usize,
) -> *mut c_char {
    clear_last_error();
    match borrow_bytes(data, len) {
        Some(bytes) => submit(session, Submission::SpiralImage(bytes.to_vec())),
        None => invalid_pointer("image data"),
    }
}

/// Submit a WAV recording to the session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `ns_session_new`.
/// - `data` must point to `len` readable bytes.
/// - Returns the modality result as JSON (free with `ns_free_string`), or NULL on error.
#[no_mangle]
pub unsafe extern "C" fn ns_session_submit_voice_wav(
    session: *mut NsSessionHandle,
    data: *const u8,
    len: usize,
) -> *mut c_char {
    clear_last_error();
    match borrow_bytes(data, len) {
        Some(bytes) => submit(session, Submission::VoiceWav(bytes.to_vec())),
        None => invalid_pointer("audio data"),
    }
}

/// Submit mono PCM samples to the session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `ns_session_new`.
/// - `samples` must point to `count` readable floats (or be NULL with `count == 0`).
/// - Returns the modality result as JSON (free with `ns_free_string`), or NULL on error.
#[no_mangle]
pub unsafe extern "C" fn ns_session_submit_voice_pcm(
    session: *mut NsSessionHandle,
    samples: *const f32,
    count: usize,
    sample_rate: u32,
) -> *mut c_char {
    clear_last_error();
    let samples = if samples.is_null() {
        if count != 0 {
            return invalid_pointer("sample");
        }
        Vec::new()
    } else {
        slice::from_raw_parts(samples, count).to_vec()
    };
    submit(
        session,
        Submission::VoiceSamples {
            samples,
            sample_rate,
        },
    )
}

/// Submit posture keypoints given as `{"keypoints": {...}, "frame": {"width", "height"}}`.
///
/// # Safety
/// - `session` must be a valid pointer returned by `ns_session_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns the modality result as JSON (free with `ns_free_string`), or NULL on error.
#[no_mangle]
pub unsafe extern "C" fn ns_session_submit_posture_keypoints(
    session: *mut NsSessionHandle,
    json: *const c_char,
) -> *mut c_char {
    clear_last_error();
    let Some(json) = cstr_to_string(json) else {
        return invalid_pointer("JSON string");
    };
    match serde_json::from_str::<KeypointFrame>(&json) {
        Ok(input) => submit(
            session,
            Submission::PostureKeypoints {
                keypoints: input.keypoints,
                frame: input.frame,
            },
        ),
        Err(e) => respond::<()>(Err(e.into())),
    }
}

/// Submit questionnaire answers given as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `ns_session_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns the modality result as JSON (free with `ns_free_string`), or NULL on error.
#[no_mangle]
pub unsafe extern "C" fn ns_session_submit_questionnaire(
    session: *mut NsSessionHandle,
    json: *const c_char,
) -> *mut c_char {
    clear_last_error();
    let Some(json) = cstr_to_string(json) else {
        return invalid_pointer("JSON string");
    };
    match SymptomQuestionnaire::from_json(&json) {
        Ok(answers) => submit(session, Submission::Questionnaire(answers)),
        Err(e) => respond::<()>(Err(e)),
    }
}

/// Compute the overall assessment; the JSON is `null` for an empty session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `ns_session_new`.
/// - Returns a newly allocated string that must be freed with `ns_free_string`.
#[no_mangle]
pub unsafe extern "C" fn ns_session_overall(session: *const NsSessionHandle) -> *mut c_char {
    clear_last_error();
    if session.is_null() {
        return invalid_pointer("session");
    }
    let handle = &*session;
    respond(Ok(handle.screener.overall(&handle.session)))
}

/// Encode the session as a JSON report.
///
/// # Safety
/// - `session` must be a valid pointer returned by `ns_session_new`.
/// - Returns a newly allocated string that must be freed with `ns_free_string`.
#[no_mangle]
pub unsafe extern "C" fn ns_session_report(session: *const NsSessionHandle) -> *mut c_char {
    clear_last_error();
    if session.is_null() {
        return invalid_pointer("session");
    }
    let handle = &*session;
    match handle.encoder.encode_to_json(&handle.screener, &handle.session) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string(), e.code());
            ptr::null_mut()
        }
    }
}

/// Clear every result in the session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `ns_session_new`.
/// - Returns 0 on success, -1 for a NULL session.
#[no_mangle]
pub unsafe extern "C" fn ns_session_reset(session: *mut NsSessionHandle) -> i32 {
    clear_last_error();
    if session.is_null() {
        set_last_error("Null session pointer", "INVALID_INPUT");
        return -1;
    }
    (*session).session.reset();
    0
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Neuroscreen functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Neuroscreen function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn ns_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Neuroscreen call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn ns_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some((message, _)) => message.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the machine-readable code of the last error (e.g. `INVALID_INPUT`).
///
/// # Safety
/// - The returned pointer is valid until the next Neuroscreen call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn ns_last_error_code() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some((_, code)) => code.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Neuroscreen library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn ns_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{encode_png, spiral_image, upright_keypoints};
    use std::ffi::CString;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        ns_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_spiral_assess() {
        let png = encode_png(&spiral_image(224, 4.0, 0.0)).unwrap();

        unsafe {
            let json = take_string(ns_spiral_assess(png.as_ptr(), png.len()));
            let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert!(parsed["score"].is_u64());
            assert!(parsed["status"].is_string());
        }
    }

    #[test]
    fn test_ffi_session_lifecycle() {
        unsafe {
            let session = ns_session_new(ptr::null());
            assert!(!session.is_null());

            let empty = take_string(ns_session_overall(session));
            assert_eq!(empty, "null");

            let answers = CString::new(
                r#"{"age": 65, "familyHistory": true, "tremor": 8, "stiffness": 7,
                    "balance": 6, "hasFreeze": true, "hasSleepIssues": true}"#,
            )
            .unwrap();
            let result = take_string(ns_session_submit_questionnaire(session, answers.as_ptr()));
            assert!(result.contains("\"severe\""));

            let frame = FrameSize::new(640, 480);
            let keypoints = serde_json::json!({
                "keypoints": upright_keypoints(frame),
                "frame": frame,
            })
            .to_string();
            let keypoints = CString::new(keypoints).unwrap();
            let result = take_string(ns_session_submit_posture_keypoints(session, keypoints.as_ptr()));
            assert!(result.contains("\"score\""));

            let samples = vec![0.0f32; 1_600];
            let result = take_string(ns_session_submit_voice_pcm(
                session,
                samples.as_ptr(),
                samples.len(),
                16_000,
            ));
            assert!(result.contains("degenerate_signal"));

            let overall = take_string(ns_session_overall(session));
            assert!(overall.contains("\"status\":\"severe\""));

            let report = take_string(ns_session_report(session));
            assert!(report.contains("report_version"));

            assert_eq!(ns_session_reset(session), 0);
            assert_eq!(take_string(ns_session_overall(session)), "null");

            ns_session_free(session);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let garbage = b"not an image";
            let result = ns_spiral_assess(garbage.as_ptr(), garbage.len());
            assert!(result.is_null());

            let error = ns_last_error();
            assert!(!error.is_null());
            assert!(!CStr::from_ptr(error).to_str().unwrap().is_empty());

            let code = CStr::from_ptr(ns_last_error_code()).to_str().unwrap();
            assert_eq!(code, "INVALID_INPUT");
        }
    }

    #[test]
    fn test_ffi_invalid_config() {
        unsafe {
            let config = CString::new(r#"{"extraction_timeout_ms": 0}"#).unwrap();
            let session = ns_session_new(config.as_ptr());
            assert!(session.is_null());

            let code = CStr::from_ptr(ns_last_error_code()).to_str().unwrap();
            assert_eq!(code, "CONFIG_ERROR");
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = ns_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
