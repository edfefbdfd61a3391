// src/etw/win32.rs

//! ETW and process-query primitives over `windows-sys`.
//!
//! Nothing here keeps state between calls: the controller owns the handles
//! and the [`RecordSink`]. The logfile structure carries a raw pointer to the
//! sink in its `Context` field, which the OS hands back on every record as
//! `EVENT_RECORD.UserContext`.

use std::{
    ffi::{OsStr, c_void},
    mem,
    os::windows::prelude::OsStrExt,
    panic::{self, AssertUnwindSafe},
    ptr, slice,
    sync::Arc,
};

use windows_sys::{
    Win32::{
        Foundation::{CloseHandle, HANDLE},
        System::{
            Diagnostics::Etw::{
                CONTROLTRACE_HANDLE, CloseTrace, ControlTraceW, EVENT_RECORD,
                EVENT_TRACE_LOGFILEW, EVENT_TRACE_PROPERTIES, EnableTraceEx2, OpenTraceW,
                PROCESSTRACE_HANDLE, ProcessTrace, StartTraceW,
            },
            Threading::{OpenProcess, QueryFullProcessImageNameW},
        },
    },
    core::GUID,
};

use super::backend::{ProviderSpec, SessionProperties, TraceBackend};
use super::collector::RecordSink;
use super::error::EtwError;
use super::process::ImageNameSource;
use shared::constants::*;

/// `PROCESS_NAME_WIN32`: return a `C:\...` style path.
const PROCESS_NAME_WIN32: u32 = 0;
const IMAGE_PATH_CAPACITY: usize = 1024;

fn control_handle(value: u64) -> CONTROLTRACE_HANDLE {
    CONTROLTRACE_HANDLE { Value: value }
}

fn trace_handle(value: u64) -> PROCESSTRACE_HANDLE {
    PROCESSTRACE_HANDLE { Value: value }
}

fn guid(parts: GuidParts) -> GUID {
    GUID { data1: parts.0, data2: parts.1, data3: parts.2, data4: parts.3 }
}

/// NUL-terminated UTF-16 copy of `name`.
fn to_wide(name: &str) -> Result<Vec<u16>, EtwError> {
    if name.is_empty() || name.contains('\0') {
        return Err(EtwError::InvalidName(name.to_owned()));
    }
    Ok(OsStr::new(name).encode_wide().chain(Some(0)).collect())
}

/// `EVENT_TRACE_PROPERTIES` followed by room for the logger name, in an
/// 8-byte aligned heap buffer.
struct PropertiesBuffer {
    words: Vec<u64>,
}

impl PropertiesBuffer {
    fn zeroed() -> Self {
        let bytes = mem::size_of::<EVENT_TRACE_PROPERTIES>() + PROPERTIES_NAME_ROOM;
        let words = vec![0u64; bytes.div_ceil(mem::size_of::<u64>())];
        let mut buf = Self { words };
        let total = buf.byte_len() as u32;
        let props = buf.as_mut_ptr();
        // SAFETY: the buffer is at least size_of::<EVENT_TRACE_PROPERTIES>()
        // bytes, u64-aligned, and all-zero is a valid bit pattern for it.
        unsafe {
            (*props).Wnode.BufferSize = total;
            (*props).LoggerNameOffset = mem::size_of::<EVENT_TRACE_PROPERTIES>() as u32;
        }
        buf
    }

    fn for_session(session: &SessionProperties) -> Self {
        let mut buf = Self::zeroed();
        let props = buf.as_mut_ptr();
        // SAFETY: see `zeroed`.
        unsafe {
            (*props).Wnode.Flags = WNODE_FLAG_TRACED_GUID;
            (*props).Wnode.ClientContext = WNODE_CLIENT_CONTEXT_QPC;
            (*props).Wnode.Guid = guid(session.session_guid);
            (*props).BufferSize = session.buffer_size_kb;
            (*props).MinimumBuffers = session.min_buffers;
            (*props).MaximumBuffers = session.max_buffers;
            if session.real_time {
                (*props).LogFileMode = EVENT_TRACE_REAL_TIME_MODE as _;
            }
            (*props).FlushTimer = session.flush_timer_secs;
        }
        buf
    }

    fn byte_len(&self) -> usize {
        self.words.len() * mem::size_of::<u64>()
    }

    fn as_mut_ptr(&mut self) -> *mut EVENT_TRACE_PROPERTIES {
        self.words.as_mut_ptr().cast()
    }
}

fn check(code: u32, op: &'static str) -> Result<(), EtwError> {
    if code == ERROR_SUCCESS {
        Ok(())
    } else {
        Err(EtwError::Control { op, code })
    }
}

/// Real ETW session control.
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Backend;

impl TraceBackend for Win32Backend {
    fn stop_session(&self, name: &str) -> Result<(), EtwError> {
        let wide = to_wide(name)?;
        let mut props = PropertiesBuffer::zeroed();
        // SAFETY: `wide` is NUL-terminated and `props` is a valid, sized
        // EVENT_TRACE_PROPERTIES buffer; both outlive the call.
        let code = unsafe {
            ControlTraceW(
                control_handle(0),
                wide.as_ptr(),
                props.as_mut_ptr(),
                EVENT_TRACE_CONTROL_STOP as _,
            )
        };
        check(code, "ControlTrace(stop)")
    }

    fn start_session(&self, name: &str, session: &SessionProperties) -> Result<u64, EtwError> {
        let wide = to_wide(name)?;
        let mut props = PropertiesBuffer::for_session(session);
        let mut handle = control_handle(0);
        // SAFETY: as in `stop_session`; `handle` is a valid out pointer.
        let code = unsafe { StartTraceW(&mut handle, wide.as_ptr(), props.as_mut_ptr()) };
        match code {
            ERROR_SUCCESS => Ok(handle.Value),
            ERROR_ALREADY_EXISTS => Err(EtwError::AlreadyExists(name.to_owned())),
            code => Err(EtwError::SessionStart { name: name.to_owned(), code }),
        }
    }

    fn enable_provider(&self, session: u64, provider: &ProviderSpec) -> Result<(), EtwError> {
        let id = guid(provider.guid);
        // SAFETY: `id` outlives the call; no enable parameters.
        let code = unsafe {
            EnableTraceEx2(
                control_handle(session),
                &id,
                EVENT_CONTROL_CODE_ENABLE_PROVIDER,
                provider.level,
                provider.keywords,
                0,
                0,
                ptr::null(),
            )
        };
        if code == ERROR_SUCCESS { Ok(()) } else { Err(EtwError::ProviderEnable(code)) }
    }

    fn disable_provider(&self, session: u64, provider: &ProviderSpec) -> Result<(), EtwError> {
        let id = guid(provider.guid);
        // SAFETY: as in `enable_provider`.
        let code = unsafe {
            EnableTraceEx2(
                control_handle(session),
                &id,
                EVENT_CONTROL_CODE_DISABLE_PROVIDER,
                0,
                0,
                0,
                0,
                ptr::null(),
            )
        };
        check(code, "EnableTraceEx2(disable)")
    }

    fn open_trace(&self, name: &str, sink: &Arc<RecordSink>) -> Result<u64, EtwError> {
        let mut wide = to_wide(name)?;
        // SAFETY: all-zero is a valid EVENT_TRACE_LOGFILEW.
        let mut logfile: EVENT_TRACE_LOGFILEW = unsafe { mem::zeroed() };
        logfile.LoggerName = wide.as_mut_ptr();
        logfile.Anonymous1.ProcessTraceMode =
            PROCESS_TRACE_MODE_REAL_TIME | PROCESS_TRACE_MODE_EVENT_RECORD;
        logfile.Anonymous2.EventRecordCallback = Some(record_trampoline);
        logfile.Context = Arc::as_ptr(sink) as *mut c_void;

        // SAFETY: `logfile` and `wide` outlive the call. The sink pointer
        // stays valid because the controller holds the Arc until the trace
        // is closed and the pump has returned.
        let handle = unsafe { OpenTraceW(&mut logfile) }.Value;
        if handle == 0 || handle == INVALID_PROCESSTRACE_HANDLE {
            return Err(EtwError::TraceOpen(name.to_owned()));
        }
        Ok(handle)
    }

    fn process_trace(&self, trace: u64) -> Result<(), EtwError> {
        let handles = [trace_handle(trace)];
        // SAFETY: one valid handle; no time window.
        let code = unsafe { ProcessTrace(handles.as_ptr(), 1, ptr::null(), ptr::null()) };
        if code == ERROR_SUCCESS { Ok(()) } else { Err(EtwError::ProcessTrace(code)) }
    }

    fn close_trace(&self, trace: u64) -> Result<(), EtwError> {
        // SAFETY: closing an already-closed handle only returns an error code.
        let code = unsafe { CloseTrace(trace_handle(trace)) };
        if code == ERROR_SUCCESS || code == ERROR_CTX_CLOSE_PENDING {
            Ok(())
        } else {
            Err(EtwError::Control { op: "CloseTrace", code })
        }
    }
}

/// Invoked by the OS on the pump thread, once per record.
unsafe extern "system" fn record_trampoline(record: *mut EVENT_RECORD) {
    // SAFETY: the OS passes a valid record for the duration of the call.
    let Some(record) = (unsafe { record.as_ref() }) else {
        return;
    };
    // SAFETY: UserContext is the sink pointer stored in `open_trace`.
    let Some(sink) = (unsafe { (record.UserContext as *const RecordSink).as_ref() }) else {
        return;
    };

    let len = record.UserDataLength as usize;
    let payload: &[u8] = if record.UserData.is_null() || len == 0 {
        &[]
    } else {
        // SAFETY: UserData points to UserDataLength readable bytes.
        unsafe { slice::from_raw_parts(record.UserData as *const u8, len) }
    };

    let id = record.EventHeader.EventDescriptor.Id;
    let pid = record.EventHeader.ProcessId;
    // Unwinding into the OS is not allowed.
    let _ = panic::catch_unwind(AssertUnwindSafe(|| sink.on_record(id, pid, payload)));
}

/// Closes a process handle on drop.
struct ProcessHandle(HANDLE);

impl ProcessHandle {
    fn open_limited(pid: u32) -> Option<Self> {
        // SAFETY: plain FFI call; a null return means failure.
        let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid) };
        if handle.is_null() { None } else { Some(Self(handle)) }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // SAFETY: the handle came from OpenProcess and is closed once.
        unsafe { CloseHandle(self.0) };
    }
}

/// Image names via `QueryFullProcessImageNameW`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32ImageNames;

impl ImageNameSource for Win32ImageNames {
    fn image_path(&self, pid: u32) -> Option<String> {
        let process = ProcessHandle::open_limited(pid)?;
        let mut buf = [0u16; IMAGE_PATH_CAPACITY];
        let mut len = buf.len() as u32;
        // SAFETY: `buf` holds `len` u16s; `len` is updated with the length
        // written (excluding the NUL).
        let ok = unsafe {
            QueryFullProcessImageNameW(process.0, PROCESS_NAME_WIN32, buf.as_mut_ptr(), &mut len)
        };
        if ok == 0 {
            return None;
        }
        let len = (len as usize).min(buf.len());
        Some(String::from_utf16_lossy(&buf[..len]))
    }
}
