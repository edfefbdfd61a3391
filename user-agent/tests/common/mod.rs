//! In-memory `TraceBackend` for integration tests.
//!
//! Sessions are names in a set. `process_trace` blocks on a condvar until the
//! trace is closed and, while blocked, delivers records queued with
//! [`MockBackend::inject`] to the sink, from the pump thread.

#![allow(dead_code)]

use std::{
    collections::{HashSet, VecDeque},
    sync::{
        Arc, Condvar, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use agent::etw::{
    EtwError, EventDecoder, ImageNameSource, NoImageNames, ProcessNameResolver, ProviderSpec,
    RecordSink, SessionOptions, SessionProperties, TraceBackend,
};

type Record = (u16, u32, Vec<u8>);

#[derive(Default)]
struct MockState {
    sessions: HashSet<String>,
    open_traces: HashSet<u64>,
    sink: Option<Arc<RecordSink>>,
    pending: VecDeque<Record>,
    next_handle: u64,
    calls: Vec<&'static str>,
}

#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
    wakeup: Condvar,
    start_calls: AtomicUsize,
    delivered: AtomicUsize,
    /// `stop_session` calls to ignore (the session stays registered).
    stubborn_stops: AtomicUsize,
    pub fail_enable: AtomicBool,
    pub fail_open: AtomicBool,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// A session left behind by an earlier run.
    pub fn preregister(&self, name: &str) {
        self.lock().sessions.insert(name.to_owned());
    }

    pub fn ignore_next_stops(&self, n: usize) {
        self.stubborn_stops.store(n, Ordering::SeqCst);
    }

    pub fn live_sessions(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn open_traces(&self) -> usize {
        self.lock().open_traces.len()
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Queue one raw record for delivery by the pump.
    pub fn inject(&self, event_id: u16, pid: u32, payload: Vec<u8>) {
        self.lock().pending.push_back((event_id, pid, payload));
        self.wakeup.notify_all();
    }

    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }

    fn next_handle(&self) -> u64 {
        let mut st = self.lock();
        st.next_handle += 1;
        st.next_handle
    }

    fn record(&self, call: &'static str) {
        self.lock().calls.push(call);
    }
}

impl TraceBackend for MockBackend {
    fn stop_session(&self, name: &str) -> Result<(), EtwError> {
        self.record("stop_session");
        let stubborn = self
            .stubborn_stops
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stubborn {
            return Ok(());
        }
        if self.lock().sessions.remove(name) {
            Ok(())
        } else {
            Err(EtwError::Control { op: "ControlTrace(stop)", code: 4201 })
        }
    }

    fn start_session(&self, name: &str, _props: &SessionProperties) -> Result<u64, EtwError> {
        self.record("start_session");
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if !self.lock().sessions.insert(name.to_owned()) {
            return Err(EtwError::AlreadyExists(name.to_owned()));
        }
        Ok(self.next_handle())
    }

    fn enable_provider(&self, _session: u64, _provider: &ProviderSpec) -> Result<(), EtwError> {
        self.record("enable_provider");
        if self.fail_enable.load(Ordering::SeqCst) {
            return Err(EtwError::ProviderEnable(5));
        }
        Ok(())
    }

    fn disable_provider(&self, _session: u64, _provider: &ProviderSpec) -> Result<(), EtwError> {
        self.record("disable_provider");
        Ok(())
    }

    fn open_trace(&self, name: &str, sink: &Arc<RecordSink>) -> Result<u64, EtwError> {
        self.record("open_trace");
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(EtwError::TraceOpen(name.to_owned()));
        }
        let handle = self.next_handle();
        let mut st = self.lock();
        st.open_traces.insert(handle);
        st.sink = Some(sink.clone());
        Ok(handle)
    }

    fn process_trace(&self, trace: u64) -> Result<(), EtwError> {
        let mut st = self.lock();
        loop {
            if !st.open_traces.contains(&trace) {
                return Ok(());
            }
            if let Some((id, pid, payload)) = st.pending.pop_front() {
                let sink = st.sink.clone();
                drop(st);
                if let Some(sink) = sink {
                    sink.on_record(id, pid, &payload);
                }
                self.delivered.fetch_add(1, Ordering::SeqCst);
                st = self.lock();
                continue;
            }
            st = self.wakeup.wait(st).unwrap();
        }
    }

    fn close_trace(&self, trace: u64) -> Result<(), EtwError> {
        self.record("close_trace");
        let mut st = self.lock();
        let was_open = st.open_traces.remove(&trace);
        st.sink = None;
        st.pending.clear();
        drop(st);
        self.wakeup.notify_all();
        if was_open {
            Ok(())
        } else {
            Err(EtwError::Control { op: "CloseTrace", code: 6 })
        }
    }
}

/// Fixed pid → image path table.
pub struct TableNames(pub Vec<(u32, &'static str)>);

impl ImageNameSource for TableNames {
    fn image_path(&self, pid: u32) -> Option<String> {
        self.0.iter().find(|(p, _)| *p == pid).map(|(_, path)| path.to_string())
    }
}

pub fn options() -> SessionOptions {
    SessionOptions {
        session_name: "PersistMonTestSession".into(),
        join_timeout: Duration::from_secs(2),
        ..SessionOptions::default()
    }
    .without_settle_delays()
}

/// Decoder whose resolver never touches the OS.
pub fn offline_decoder() -> EventDecoder {
    EventDecoder::new(ProcessNameResolver::new(Box::new(NoImageNames)))
}

/// 8-byte FileObject followed by NUL-terminated UTF-16 `path`.
pub fn name_payload(path: &str) -> Vec<u8> {
    let mut buf = vec![0x11u8; 8];
    buf.extend(path.encode_utf16().chain(Some(0)).flat_map(u16::to_le_bytes));
    buf
}

/// Poll `cond` until it holds or `timeout` elapses.
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}
