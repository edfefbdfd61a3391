//! File-event model produced by the Kernel-File decoder.
//!
//! A `FileEvent` is created once, by the decoder, for every accepted record
//! and is never mutated afterwards. Events are serialized with `serde` so the
//! change summary built from them can be written out as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::constants::*;

/// Every operation the Microsoft-Windows-Kernel-File provider reports.
///
/// Only six of them survive decoding (see [`FileEventKind::is_interesting`]);
/// the rest exist so that raw ids can still be named in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileEventKind {
    NameCreate,
    NameDelete,
    Create,
    Cleanup,
    Close,
    Read,
    Write,
    #[serde(rename = "setinfo")]
    SetInfo,
    Delete,
    Rename,
    #[serde(rename = "direnum")]
    DirEnum,
    Flush,
    #[serde(rename = "queryinfo")]
    QueryInfo,
    Fsctl,
    OperationEnd,
    DirNotify,
}

impl FileEventKind {
    /// Map a Kernel-File event id (10..=25) to its kind.
    pub fn from_event_id(id: u16) -> Option<Self> {
        Some(match id {
            EVENT_ID_NAMECREATE => Self::NameCreate,
            EVENT_ID_NAMEDELETE => Self::NameDelete,
            EVENT_ID_CREATE => Self::Create,
            EVENT_ID_CLEANUP => Self::Cleanup,
            EVENT_ID_CLOSE => Self::Close,
            EVENT_ID_READ => Self::Read,
            EVENT_ID_WRITE => Self::Write,
            EVENT_ID_SETINFO => Self::SetInfo,
            EVENT_ID_DELETE => Self::Delete,
            EVENT_ID_RENAME => Self::Rename,
            EVENT_ID_DIRENUM => Self::DirEnum,
            EVENT_ID_FLUSH => Self::Flush,
            EVENT_ID_QUERYINFO => Self::QueryInfo,
            EVENT_ID_FSCTL => Self::Fsctl,
            EVENT_ID_OPERATIONEND => Self::OperationEnd,
            EVENT_ID_DIRNOTIFY => Self::DirNotify,
            _ => return None,
        })
    }

    pub fn event_id(self) -> u16 {
        match self {
            Self::NameCreate => EVENT_ID_NAMECREATE,
            Self::NameDelete => EVENT_ID_NAMEDELETE,
            Self::Create => EVENT_ID_CREATE,
            Self::Cleanup => EVENT_ID_CLEANUP,
            Self::Close => EVENT_ID_CLOSE,
            Self::Read => EVENT_ID_READ,
            Self::Write => EVENT_ID_WRITE,
            Self::SetInfo => EVENT_ID_SETINFO,
            Self::Delete => EVENT_ID_DELETE,
            Self::Rename => EVENT_ID_RENAME,
            Self::DirEnum => EVENT_ID_DIRENUM,
            Self::Flush => EVENT_ID_FLUSH,
            Self::QueryInfo => EVENT_ID_QUERYINFO,
            Self::Fsctl => EVENT_ID_FSCTL,
            Self::OperationEnd => EVENT_ID_OPERATIONEND,
            Self::DirNotify => EVENT_ID_DIRNOTIFY,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NameCreate => "name_create",
            Self::NameDelete => "name_delete",
            Self::Create => "create",
            Self::Cleanup => "cleanup",
            Self::Close => "close",
            Self::Read => "read",
            Self::Write => "write",
            Self::SetInfo => "setinfo",
            Self::Delete => "delete",
            Self::Rename => "rename",
            Self::DirEnum => "direnum",
            Self::Flush => "flush",
            Self::QueryInfo => "queryinfo",
            Self::Fsctl => "fsctl",
            Self::OperationEnd => "operation_end",
            Self::DirNotify => "dir_notify",
        }
    }

    /// Kinds the decoder tries to extract a path for.
    pub fn is_interesting(self) -> bool {
        INTERESTING_EVENT_IDS.contains(&self.event_id())
    }

    pub fn is_create(self) -> bool {
        matches!(self, Self::Create | Self::NameCreate)
    }

    pub fn is_delete(self) -> bool {
        matches!(self, Self::Delete | Self::NameDelete)
    }
}

impl std::fmt::Display for FileEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded file operation attributed to a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvent {
    pub kind: FileEventKind,
    pub path: String,
    pub process_id: u32,
    pub process_name: String,
    pub observed_at: DateTime<Utc>,
}

impl FileEvent {
    pub fn new(
        kind: FileEventKind,
        path: impl Into<String>,
        process_id: u32,
        process_name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            process_id,
            process_name: process_name.into(),
            observed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kernel_file_id_maps_back_to_itself() {
        for id in 10..=25u16 {
            let kind = FileEventKind::from_event_id(id).expect("id in range");
            assert_eq!(kind.event_id(), id);
        }
        assert_eq!(FileEventKind::from_event_id(9), None);
        assert_eq!(FileEventKind::from_event_id(26), None);
    }

    #[test]
    fn only_six_kinds_are_interesting() {
        let interesting: Vec<_> = (10..=25u16)
            .filter_map(FileEventKind::from_event_id)
            .filter(|k| k.is_interesting())
            .collect();
        assert_eq!(
            interesting,
            vec![
                FileEventKind::NameCreate,
                FileEventKind::NameDelete,
                FileEventKind::Create,
                FileEventKind::Write,
                FileEventKind::Delete,
                FileEventKind::Rename,
            ]
        );
    }

    #[test]
    fn serialized_kind_matches_display_name() {
        for id in 10..=25u16 {
            let kind = FileEventKind::from_event_id(id).unwrap();
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
