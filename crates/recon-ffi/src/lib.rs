//! C FFI bindings for recon-core
//!
//! This crate provides a C-compatible API so a native UI can run a comparison
//! and render the resulting report.

use recon_core::{build_report, parse_csv, ReconConfig, ReconciliationReport};
use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(message: String) {
    tracing::debug!(error = %message, "ffi call failed");
    LAST_ERROR.with(|slot| *slot.borrow_mut() = CString::new(message).ok());
}

/// Opaque handle to a reconciliation report
pub struct FfiReport {
    inner: ReconciliationReport,
}

unsafe fn str_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        None
    } else {
        CStr::from_ptr(ptr).to_str().ok()
    }
}

fn into_c_string(s: &str) -> *mut c_char {
    CString::new(s)
        .map(|s| s.into_raw())
        .unwrap_or(ptr::null_mut())
}

/// Compare two CSV files keyed on `key_column`
///
/// # Safety
/// - `reference`, `candidate` and `key_column` must be valid C strings
/// - Returns null on error; the message is available from `rc_last_error`
#[no_mangle]
pub unsafe extern "C" fn rc_compare_files(
    reference: *const c_char,
    candidate: *const c_char,
    key_column: *const c_char,
) -> *mut FfiReport {
    let (Some(reference), Some(candidate), Some(key)) =
        (str_arg(reference), str_arg(candidate), str_arg(key_column))
    else {
        set_last_error("invalid argument: expected three UTF-8 strings".to_string());
        return ptr::null_mut();
    };

    let config = ReconConfig::new(key);
    let result = parse_csv(reference, key).and_then(|reference| {
        let candidate = parse_csv(candidate, key)?;
        build_report(&reference, &candidate, None, &config)
    });

    match result {
        Ok(report) => Box::into_raw(Box::new(FfiReport { inner: report })),
        Err(e) => {
            set_last_error(e.to_string());
            ptr::null_mut()
        }
    }
}

/// Message of the last failed call on this thread
///
/// # Safety
/// - Returns null if no call has failed
/// - Caller must free the returned string with `rc_free_string`
#[no_mangle]
pub unsafe extern "C" fn rc_last_error() -> *mut c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|s| s.clone().into_raw())
            .unwrap_or(ptr::null_mut())
    })
}

/// Free a report
///
/// # Safety
/// - `report` must be a valid pointer returned by `rc_compare_files` or null
#[no_mangle]
pub unsafe extern "C" fn rc_free_report(report: *mut FfiReport) {
    if !report.is_null() {
        drop(Box::from_raw(report));
    }
}

/// Number of discrepant rows
///
/// # Safety
/// - `report` must be a valid pointer returned by `rc_compare_files`
#[no_mangle]
pub unsafe extern "C" fn rc_report_discrepant_count(report: *const FfiReport) -> usize {
    if report.is_null() {
        return 0;
    }
    (*report).inner.discrepant_count
}

/// Number of identical rows
///
/// # Safety
/// - `report` must be a valid pointer returned by `rc_compare_files`
#[no_mangle]
pub unsafe extern "C" fn rc_report_identical_count(report: *const FfiReport) -> usize {
    if report.is_null() {
        return 0;
    }
    (*report).inner.identical_count
}

/// Comparison time in milliseconds
///
/// # Safety
/// - `report` must be a valid pointer returned by `rc_compare_files`
#[no_mangle]
pub unsafe extern "C" fn rc_report_elapsed_ms(report: *const FfiReport) -> u64 {
    if report.is_null() {
        return 0;
    }
    (*report).inner.elapsed.as_millis() as u64
}

/// Number of output rows, separators included
///
/// # Safety
/// - `report` must be a valid pointer returned by `rc_compare_files`
#[no_mangle]
pub unsafe extern "C" fn rc_report_row_count(report: *const FfiReport) -> usize {
    if report.is_null() {
        return 0;
    }
    (*report).inner.rows.len()
}

/// Number of output columns
///
/// # Safety
/// - `report` must be a valid pointer returned by `rc_compare_files`
#[no_mangle]
pub unsafe extern "C" fn rc_report_col_count(report: *const FfiReport) -> usize {
    if report.is_null() {
        return 0;
    }
    (*report).inner.header.len()
}

/// Get a column name by index
///
/// # Safety
/// - `report` must be a valid pointer returned by `rc_compare_files`
/// - Returns null if index is out of bounds
/// - Caller must free the returned string with `rc_free_string`
#[no_mangle]
pub unsafe extern "C" fn rc_report_col_name(report: *const FfiReport, index: usize) -> *mut c_char {
    if report.is_null() {
        return ptr::null_mut();
    }

    (&(*report)
        .inner
        .header)
        .get(index)
        .map(|name| into_c_string(name))
        .unwrap_or(ptr::null_mut())
}

/// Get a cell value as a string; separator rows yield empty strings
///
/// # Safety
/// - `report` must be a valid pointer returned by `rc_compare_files`
/// - Returns null if row or col is out of bounds
/// - Caller must free the returned string with `rc_free_string`
#[no_mangle]
pub unsafe extern "C" fn rc_report_cell(
    report: *const FfiReport,
    row: usize,
    col: usize,
) -> *mut c_char {
    if report.is_null() {
        return ptr::null_mut();
    }

    let report = &(*report).inner;
    if col >= report.header.len() {
        return ptr::null_mut();
    }
    report
        .rows
        .get(row)
        .and_then(|r| r.value(col))
        .map(into_c_string)
        .unwrap_or(ptr::null_mut())
}

/// Number of keys present in only one dataset
///
/// # Safety
/// - `report` must be a valid pointer returned by `rc_compare_files`
#[no_mangle]
pub unsafe extern "C" fn rc_report_unique_key_count(report: *const FfiReport) -> usize {
    if report.is_null() {
        return 0;
    }
    (*report).inner.unique_keys.len()
}

/// Get an exclusive key by index (sorted order)
///
/// # Safety
/// - `report` must be a valid pointer returned by `rc_compare_files`
/// - Returns null if index is out of bounds
/// - Caller must free the returned string with `rc_free_string`
#[no_mangle]
pub unsafe extern "C" fn rc_report_unique_key(
    report: *const FfiReport,
    index: usize,
) -> *mut c_char {
    if report.is_null() {
        return ptr::null_mut();
    }

    (&(*report)
        .inner
        .unique_keys)
        .get(index)
        .map(|key| into_c_string(key))
        .unwrap_or(ptr::null_mut())
}

/// Render the paired rows as CSV text
///
/// # Safety
/// - `report` must be a valid pointer returned by `rc_compare_files`
/// - Returns null on error
/// - Caller must free the returned string with `rc_free_string`
#[no_mangle]
pub unsafe extern "C" fn rc_report_to_csv(report: *const FfiReport) -> *mut c_char {
    if report.is_null() {
        return ptr::null_mut();
    }

    match (*report).inner.to_csv_string() {
        Ok(csv) => into_c_string(&csv),
        Err(e) => {
            set_last_error(e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a string returned by other FFI functions
///
/// # Safety
/// - `s` must be a valid pointer returned by a rc_* function or null
#[no_mangle]
pub unsafe extern "C" fn rc_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}
