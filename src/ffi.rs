//! FFI interface for C/C++ hosts
//!
//! Requests and responses cross the boundary as JSON strings (see
//! `request::ScrapeRequest`).

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use crate::config::FetchConfig;
use crate::request::{scrape_blocking, ScrapeRequest};

/// Result struct returned to the host.
/// Both pointers are owned by Rust and must be freed via free_scrape_result
#[repr(C)]
pub struct ScrapeResultFFI {
    /// JSON-serialized response (null-terminated)
    pub json_ptr: *mut c_char,
    /// Error message if the scrape failed (null-terminated), or null on success
    pub error_ptr: *mut c_char,
}

/// Run a scrape request against literal HTML. Any `url` or `html` field in
/// the request is replaced by the supplied markup; no network access occurs.
///
/// # Safety
/// - `html_ptr` must point to valid memory of at least `html_len` bytes
/// - `request_json` must be a valid null-terminated C string
/// - Caller must free the result via `free_scrape_result`
#[no_mangle]
pub unsafe extern "C" fn scrape_html_ffi(
    html_ptr: *const c_char,
    html_len: usize,
    request_json: *const c_char,
) -> ScrapeResultFFI {
    let html = if html_ptr.is_null() || html_len == 0 {
        String::new()
    } else {
        let slice = std::slice::from_raw_parts(html_ptr as *const u8, html_len);
        match std::str::from_utf8(slice) {
            Ok(s) => s.to_string(),
            Err(_) => return make_error_result("Invalid UTF-8 in HTML content"),
        }
    };

    let mut request = match parse_request(request_json) {
        Ok(r) => r,
        Err(msg) => return make_error_result(&msg),
    };
    request.html = Some(html);
    request.url = None;

    run_request(&request)
}

/// Run a scrape request as-is, fetching `url` when no `html` is given.
///
/// # Safety
/// - `request_json` must be a valid null-terminated C string
/// - Caller must free the result via `free_scrape_result`
#[no_mangle]
pub unsafe extern "C" fn scrape_url_ffi(request_json: *const c_char) -> ScrapeResultFFI {
    match parse_request(request_json) {
        Ok(request) => run_request(&request),
        Err(msg) => make_error_result(&msg),
    }
}

/// Free a ScrapeResultFFI returned by this module
///
/// # Safety
/// - `result` must have been returned by `scrape_html_ffi` or `scrape_url_ffi`
/// - Must only be called once per result
#[no_mangle]
pub unsafe extern "C" fn free_scrape_result(result: ScrapeResultFFI) {
    if !result.json_ptr.is_null() {
        drop(CString::from_raw(result.json_ptr));
    }
    if !result.error_ptr.is_null() {
        drop(CString::from_raw(result.error_ptr));
    }
}

/// Install a tracing subscriber filtered by `RUST_LOG`. Safe to call more than once.
#[no_mangle]
pub extern "C" fn stream_scraper_init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

unsafe fn parse_request(request_json: *const c_char) -> Result<ScrapeRequest, String> {
    if request_json.is_null() {
        return Err("Request JSON is null".to_string());
    }
    let request_str = CStr::from_ptr(request_json)
        .to_str()
        .map_err(|_| "Invalid UTF-8 in request JSON".to_string())?;
    ScrapeRequest::from_json(request_str).map_err(|e| format!("Failed to parse request JSON: {e}"))
}

fn run_request(request: &ScrapeRequest) -> ScrapeResultFFI {
    let json = match scrape_blocking(request, &FetchConfig::default()).and_then(|r| r.to_json()) {
        Ok(json) => json,
        Err(e) => return make_error_result(&e.to_string()),
    };
    match CString::new(json) {
        Ok(cstr) => ScrapeResultFFI {
            json_ptr: cstr.into_raw(),
            error_ptr: ptr::null_mut(),
        },
        Err(_) => make_error_result("Result JSON contains null bytes"),
    }
}

// Helper to create error result
fn make_error_result(msg: &str) -> ScrapeResultFFI {
    let error_ptr = CString::new(msg.replace('\0', ""))
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut());
    ScrapeResultFFI {
        json_ptr: ptr::null_mut(),
        error_ptr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn take(result: ScrapeResultFFI) -> (Option<String>, Option<String>) {
        let json = (!result.json_ptr.is_null())
            .then(|| CStr::from_ptr(result.json_ptr).to_string_lossy().into_owned());
        let error = (!result.error_ptr.is_null())
            .then(|| CStr::from_ptr(result.error_ptr).to_string_lossy().into_owned());
        free_scrape_result(result);
        (json, error)
    }

    #[test]
    fn test_scrape_html_ffi() {
        let html = "<h1>Example Domain</h1>";
        let request = CString::new(r#"{"operations": {"selector": "h1", "extractor": "text"}}"#).unwrap();
        let (json, error) = unsafe {
            take(scrape_html_ffi(
                html.as_ptr() as *const c_char,
                html.len(),
                request.as_ptr(),
            ))
        };
        assert_eq!(json.as_deref(), Some(r#""Example Domain""#));
        assert!(error.is_none());
    }

    #[test]
    fn test_invalid_operation_reports_error() {
        let html = "<h1>x</h1>";
        let request = CString::new(r#"{"operations": {"selector": "h1", "extractor": "css"}}"#).unwrap();
        let (json, error) = unsafe {
            take(scrape_html_ffi(
                html.as_ptr() as *const c_char,
                html.len(),
                request.as_ptr(),
            ))
        };
        assert!(json.is_none());
        assert_eq!(
            error.as_deref(),
            Some("Invalid operation: Unknown operation extractor: css")
        );
    }

    #[test]
    fn test_null_request() {
        let (json, error) = unsafe { take(scrape_url_ffi(ptr::null())) };
        assert!(json.is_none());
        assert_eq!(error.as_deref(), Some("Request JSON is null"));
    }
}
