// src/etw/decoder.rs

//! # Kernel-File payload decoder
//!
//! Turns `(event id, pid, UserData bytes)` into a [`FileEvent`].
//!
//! The Kernel-File provider does not lay out its payloads uniformly across
//! event kinds or OS builds, so the file name is located by probing a short,
//! fixed list of byte offsets and keeping the first candidate that looks like
//! a path. Every lookup is a bounds-checked slice of the payload; nothing is
//! cast in place.
//!
//! Records that yield no plausible path are dropped silently. That is the
//! common case: many records with an interesting id are control records that
//! carry no name at all.

use shared::constants::*;

use super::process::ProcessNameResolver;
use crate::comms::events::{FileEvent, FileEventKind};

/// Leading FileObject pointer in NameCreate / NameDelete payloads.
const NAME_RECORD_HEADER: usize = 8;
const CREATE_PRIMARY_OFFSET: usize = 32;
const CREATE_FALLBACK_OFFSETS: [usize; 4] = [40, 24, 16, 8];
const GENERIC_OFFSETS: [usize; 5] = [8, 16, 24, 32, 0];
/// Generic scans need this many bytes past the offset to be worth decoding.
const GENERIC_SCAN_SLACK: usize = 4;
/// Shortest payload that can carry anything we care about.
const MIN_PAYLOAD_LEN: usize = 8;

/// Decode little-endian UTF-16 up to the first NUL unit. An odd trailing byte
/// and unpaired surrogates are discarded.
pub fn utf16_until_nul(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0);
    char::decode_utf16(units).filter_map(Result::ok).collect()
}

/// Text starting at `offset`, or `None` if the offset is out of bounds.
fn text_at(payload: &[u8], offset: usize) -> Option<String> {
    payload.get(offset..).map(utf16_until_nul)
}

fn has_path_marker(text: &str) -> bool {
    text.contains('\\') || text.contains(':')
}

/// Candidate accepted by the fallback / generic scans.
fn plausible_path(text: &str) -> bool {
    text.chars().count() > 2 && has_path_marker(text)
}

/// Locate the file name inside a raw payload for `kind`.
pub fn extract_path(kind: FileEventKind, payload: &[u8]) -> Option<String> {
    if payload.len() < MIN_PAYLOAD_LEN {
        return None;
    }

    match kind {
        FileEventKind::NameCreate | FileEventKind::NameDelete => {
            if payload.len() <= NAME_RECORD_HEADER {
                return None;
            }
            text_at(payload, NAME_RECORD_HEADER).filter(|t| t.chars().count() > 1)
        }
        FileEventKind::Create => {
            let primary = (payload.len() > CREATE_PRIMARY_OFFSET)
                .then(|| text_at(payload, CREATE_PRIMARY_OFFSET))
                .flatten()
                .filter(|t| t.chars().count() > 1 && has_path_marker(t));
            primary.or_else(|| {
                CREATE_FALLBACK_OFFSETS
                    .iter()
                    .filter(|&&off| payload.len() > off)
                    .filter_map(|&off| text_at(payload, off))
                    .find(|t| plausible_path(t))
            })
        }
        _ => GENERIC_OFFSETS
            .iter()
            .filter(|&&off| payload.len() > off + GENERIC_SCAN_SLACK)
            .filter_map(|&off| text_at(payload, off))
            .find(|t| plausible_path(t)),
    }
}

/// `true` if `path` is filesystem metadata, log/trace churn, or a bare root.
pub fn is_noise(path: &str) -> bool {
    if path.is_empty() {
        return true;
    }
    let upper = path.to_uppercase();
    if NOISE_PATH_PATTERNS.iter().any(|noise| upper.contains(noise)) {
        return true;
    }
    path.ends_with('\\') && path.chars().count() < MIN_DIRECTORY_PATH_LEN
}

/// Stateless apart from the name cache held by its resolver.
pub struct EventDecoder {
    resolver: ProcessNameResolver,
}

impl EventDecoder {
    pub fn new(resolver: ProcessNameResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &ProcessNameResolver {
        &self.resolver
    }

    /// Decode one record. `None` means "not interesting, drop it".
    pub fn decode(&self, event_id: u16, process_id: u32, payload: &[u8]) -> Option<FileEvent> {
        let kind = FileEventKind::from_event_id(event_id).filter(|k| k.is_interesting())?;
        if process_id < SYSTEM_PID_CEILING {
            return None;
        }

        let path = extract_path(kind, payload)?;
        if is_noise(&path) {
            log::trace!("noise {} {}", kind, path);
            return None;
        }

        let process_name = self.resolver.resolve(process_id);
        Some(FileEvent::new(kind, path, process_id, process_name))
    }
}

impl Default for EventDecoder {
    fn default() -> Self {
        Self::new(ProcessNameResolver::for_platform())
    }
}
