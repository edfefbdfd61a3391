// src/etw/process.rs

//! Memoizing pid → image-name lookup.
//!
//! The decoder calls this from the OS delivery thread, so a lookup must be
//! cheap after the first hit. Failures are cached as the `PID:<n>` placeholder
//! so a vanished process is queried at most once per session.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use shared::constants::{SYSTEM_PID_CEILING, SYSTEM_PROCESS_NAME};

/// Source of full image paths for live processes.
pub trait ImageNameSource: Send + Sync {
    /// Full image path of `pid`, or `None` if the process cannot be opened or
    /// queried (already exited, access denied, ...).
    fn image_path(&self, pid: u32) -> Option<String>;
}

/// Source that never resolves anything; used where no process API exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoImageNames;

impl ImageNameSource for NoImageNames {
    fn image_path(&self, _pid: u32) -> Option<String> {
        None
    }
}

pub fn placeholder_name(pid: u32) -> String {
    format!("PID:{pid}")
}

/// Last component of an image path; accepts both `\` and `/` separators.
pub fn file_name_of(image_path: &str) -> &str {
    image_path
        .rsplit(|c: char| c == '\\' || c == '/')
        .next()
        .unwrap_or(image_path)
}

#[cfg(windows)]
fn platform_source() -> Box<dyn ImageNameSource> {
    Box::new(super::win32::Win32ImageNames)
}

#[cfg(not(windows))]
fn platform_source() -> Box<dyn ImageNameSource> {
    Box::new(NoImageNames)
}

pub struct ProcessNameResolver {
    source: Box<dyn ImageNameSource>,
    cache: Mutex<HashMap<u32, String>>,
}

impl ProcessNameResolver {
    pub fn new(source: Box<dyn ImageNameSource>) -> Self {
        Self { source, cache: Mutex::new(HashMap::new()) }
    }

    /// Resolver backed by the current platform's process API.
    pub fn for_platform() -> Self {
        Self::new(platform_source())
    }

    pub fn resolve(&self, pid: u32) -> String {
        if pid < SYSTEM_PID_CEILING {
            return SYSTEM_PROCESS_NAME.to_owned();
        }

        if let Some(name) = self.lock().get(&pid) {
            return name.clone();
        }

        // Query outside the lock; a concurrent miss on the same pid just
        // stores the same answer twice.
        let name = self
            .source
            .image_path(pid)
            .map(|path| file_name_of(&path).to_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| placeholder_name(pid));

        self.lock().entry(pid).or_insert(name).clone()
    }

    pub fn cached(&self) -> usize {
        self.lock().len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u32, String>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ProcessNameResolver {
    fn default() -> Self {
        Self::for_platform()
    }
}
