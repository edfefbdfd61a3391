// ───── provider & session identity ──────────────────────────────────────────

/// GUID laid out as the Win32 `GUID` struct (`Data1`, `Data2`, `Data3`, `Data4`).
pub type GuidParts = (u32, u16, u16, [u8; 8]);

/// Microsoft-Windows-Kernel-File {EDD08927-9CC4-4E65-B970-C2560FB5C289}.
pub const KERNEL_FILE_PROVIDER_GUID: GuidParts = (
    0xEDD0_8927,
    0x9CC4,
    0x4E65,
    [0xB9, 0x70, 0xC2, 0x56, 0x0F, 0xB5, 0xC2, 0x89],
);

/// Private GUID stamped on the session we create.
pub const SESSION_GUID: GuidParts = (
    0x5F1E_6A4D,
    0x3B8C,
    0x4C2E,
    [0x9A, 0x41, 0x7D, 0x02, 0xE5, 0x6B, 0x18, 0xC3],
);

pub const DEFAULT_SESSION_NAME: &str = "PersistMonFileSession";

// ───── session geometry (fixed) ─────────────────────────────────────────────

/// Per-buffer size in KiB.
pub const BUFFER_SIZE_KB: u32 = 64;
pub const MIN_BUFFERS: u32 = 4;
pub const MAX_BUFFERS: u32 = 64;
/// Seconds between forced buffer flushes.
pub const FLUSH_TIMER_SECS: u32 = 1;
/// Room reserved after `EVENT_TRACE_PROPERTIES` for the logger name.
pub const PROPERTIES_NAME_ROOM: usize = 1024;

pub const TRACE_LEVEL_VERBOSE: u8 = 5;
pub const ALL_KEYWORDS: u64 = u64::MAX;

// ───── ETW control codes / flags ────────────────────────────────────────────

pub const WNODE_FLAG_TRACED_GUID: u32 = 0x0002_0000;
/// `WNODE_HEADER.ClientContext`: 1 = QueryPerformanceCounter timestamps.
pub const WNODE_CLIENT_CONTEXT_QPC: u32 = 1;
pub const EVENT_TRACE_REAL_TIME_MODE: u32 = 0x0000_0100;
pub const PROCESS_TRACE_MODE_REAL_TIME: u32 = 0x0000_0100;
pub const PROCESS_TRACE_MODE_EVENT_RECORD: u32 = 0x1000_0000;
pub const EVENT_TRACE_CONTROL_STOP: u32 = 1;
pub const EVENT_CONTROL_CODE_DISABLE_PROVIDER: u32 = 0;
pub const EVENT_CONTROL_CODE_ENABLE_PROVIDER: u32 = 1;

pub const INVALID_PROCESSTRACE_HANDLE: u64 = u64::MAX;

pub const ERROR_SUCCESS: u32 = 0;
pub const ERROR_ALREADY_EXISTS: u32 = 183;
pub const ERROR_CANCELLED: u32 = 1223;
pub const ERROR_INVALID_HANDLE: u32 = 6;
/// CloseTrace: handle closed, buffered records still being delivered.
pub const ERROR_CTX_CLOSE_PENDING: u32 = 7007;

pub const PROCESS_QUERY_LIMITED_INFORMATION: u32 = 0x1000;

// ───── Microsoft-Windows-Kernel-File event ids ──────────────────────────────

pub const EVENT_ID_NAMECREATE: u16 = 10;
pub const EVENT_ID_NAMEDELETE: u16 = 11;
pub const EVENT_ID_CREATE: u16 = 12;
pub const EVENT_ID_CLEANUP: u16 = 13;
pub const EVENT_ID_CLOSE: u16 = 14;
pub const EVENT_ID_READ: u16 = 15;
pub const EVENT_ID_WRITE: u16 = 16;
pub const EVENT_ID_SETINFO: u16 = 17;
pub const EVENT_ID_DELETE: u16 = 18;
pub const EVENT_ID_RENAME: u16 = 19;
pub const EVENT_ID_DIRENUM: u16 = 20;
pub const EVENT_ID_FLUSH: u16 = 21;
pub const EVENT_ID_QUERYINFO: u16 = 22;
pub const EVENT_ID_FSCTL: u16 = 23;
pub const EVENT_ID_OPERATIONEND: u16 = 24;
pub const EVENT_ID_DIRNOTIFY: u16 = 25;

pub const INTERESTING_EVENT_IDS: [u16; 6] = [
    EVENT_ID_NAMECREATE,
    EVENT_ID_NAMEDELETE,
    EVENT_ID_CREATE,
    EVENT_ID_WRITE,
    EVENT_ID_DELETE,
    EVENT_ID_RENAME,
];

// ───── decoder filtering ────────────────────────────────────────────────────

/// Pids below this are kernel / System pseudo-processes.
pub const SYSTEM_PID_CEILING: u32 = 10;
pub const SYSTEM_PROCESS_NAME: &str = "System";

/// Upper-case substrings marking filesystem metadata and log/trace churn.
pub const NOISE_PATH_PATTERNS: [&str; 12] = [
    "$MFT",
    "$LOGFILE",
    "$USNJRNL",
    "$EXTEND",
    "\\PREFETCH\\",
    "\\WINEVT\\",
    "\\CONFIG\\",
    ".ETL",
    ".LOG",
    ".PF",
    ".REGTRANS-MS",
    ".BLF",
];

/// Paths ending in `\` shorter than this are volume / drive roots.
pub const MIN_DIRECTORY_PATH_LEN: usize = 30;

// ───── risk tables ──────────────────────────────────────────────────────────

pub const HIGH_RISK_EXTENSIONS: [&str; 18] = [
    "exe", "dll", "sys", "bat", "cmd", "ps1", "vbs", "js", "jar", "msi", "scr", "com", "pif",
    "cpl", "hta", "wsf", "vbe", "jse",
];

pub const MEDIUM_RISK_EXTENSIONS: [&str; 10] = [
    "lnk", "url", "inf", "reg", "msp", "mst", "application", "gadget", "efi", "ocx",
];
