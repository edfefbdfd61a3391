// src/summary.rs

//! Per-path change summary built from a snapshot of the event log.
//!
//! Events are grouped by path and every group lands in at most one bucket,
//! chosen by the kinds present in the group (first match wins):
//!
//! | present                     | bucket     | extra                         |
//! |-----------------------------|------------|-------------------------------|
//! | delete / name_delete        | `deleted`  | `was_temporary` if also created |
//! | create / name_create        | `created`  |                               |
//! | write                       | `modified` | `write_count`                 |
//! | rename                      | `renamed`  |                               |
//!
//! Groups with none of these (close, read, ...) are dropped. Arrival order
//! inside a group never affects the bucket; it only decides which process is
//! reported (the last one seen).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared::constants::{HIGH_RISK_EXTENSIONS, MEDIUM_RISK_EXTENSIONS};

use crate::comms::events::{FileEvent, FileEventKind};

/// Who last touched a path, and every event that contributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathActivity {
    pub process_id: u32,
    pub process_name: String,
    pub events: Vec<FileEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedFile {
    #[serde(flatten)]
    pub activity: PathActivity,
    /// Created and deleted within the same capture.
    pub was_temporary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedFile {
    #[serde(flatten)]
    pub activity: PathActivity,
    pub write_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub created: BTreeMap<String, PathActivity>,
    pub deleted: BTreeMap<String, DeletedFile>,
    pub modified: BTreeMap<String, ModifiedFile>,
    pub renamed: BTreeMap<String, PathActivity>,
}

/// Risk of a file by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRisk {
    Low,
    Medium,
    High,
}

impl FileRisk {
    pub fn of(path: &str) -> Self {
        let name = path.rsplit(|c: char| c == '\\' || c == '/').next().unwrap_or(path);
        let Some((_, ext)) = name.rsplit_once('.') else {
            return Self::Low;
        };
        let ext = ext.to_ascii_lowercase();
        if HIGH_RISK_EXTENSIONS.contains(&ext.as_str()) {
            Self::High
        } else if MEDIUM_RISK_EXTENSIONS.contains(&ext.as_str()) {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl ChangeSummary {
    pub fn len(&self) -> usize {
        self.created.len() + self.deleted.len() + self.modified.len() + self.renamed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Created or modified paths whose risk is at least `min`, sorted.
    pub fn risky_paths(&self, min: FileRisk) -> Vec<&str> {
        let mut paths: Vec<&str> = self
            .created
            .keys()
            .chain(self.modified.keys())
            .map(String::as_str)
            .filter(|p| FileRisk::of(p) >= min)
            .collect();
        paths.sort_unstable();
        paths
    }
}

/// Aggregate `events` (in log order) into a [`ChangeSummary`].
pub fn summarize(events: &[FileEvent]) -> ChangeSummary {
    let mut groups: BTreeMap<&str, Vec<&FileEvent>> = BTreeMap::new();
    for event in events {
        groups.entry(event.path.as_str()).or_default().push(event);
    }

    let mut summary = ChangeSummary::default();
    for (path, group) in groups {
        classify(&mut summary, path, &group);
    }
    summary
}

fn classify(summary: &mut ChangeSummary, path: &str, group: &[&FileEvent]) {
    let has = |pred: fn(FileEventKind) -> bool| group.iter().any(|e| pred(e.kind));
    let writes = group.iter().filter(|e| e.kind == FileEventKind::Write).count();

    let Some(activity) = activity_of(group) else {
        return;
    };
    let path = path.to_owned();

    if has(FileEventKind::is_delete) {
        let was_temporary = has(FileEventKind::is_create);
        summary.deleted.insert(path, DeletedFile { activity, was_temporary });
    } else if has(FileEventKind::is_create) {
        summary.created.insert(path, activity);
    } else if writes > 0 {
        summary.modified.insert(path, ModifiedFile { activity, write_count: writes });
    } else if has(|k| k == FileEventKind::Rename) {
        summary.renamed.insert(path, activity);
    }
}

fn activity_of(group: &[&FileEvent]) -> Option<PathActivity> {
    let last = group.last()?;
    Some(PathActivity {
        process_id: last.process_id,
        process_name: last.process_name.clone(),
        events: group.iter().map(|&e| e.clone()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use FileEventKind::*;

    fn ev(kind: FileEventKind, path: &str) -> FileEvent {
        FileEvent::new(kind, path, 4321, "sample.exe")
    }

    fn by(kind: FileEventKind, path: &str, pid: u32, name: &str) -> FileEvent {
        FileEvent::new(kind, path, pid, name)
    }

    #[test]
    fn create_kind_outranks_writes() {
        let a = r"C:\Users\me\a.txt";
        let s = summarize(&[ev(NameCreate, a), ev(Write, a), ev(Write, a)]);
        assert!(s.created.contains_key(a));
        assert!(s.modified.is_empty());
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn writes_without_create_are_counted() {
        let a = r"C:\Users\me\a.txt";
        let s = summarize(&[ev(Write, a), ev(Write, a)]);
        assert_eq!(s.modified[a].write_count, 2);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn create_then_delete_is_temporary() {
        let b = r"C:\Temp\b.tmp";
        let s = summarize(&[ev(Create, b), ev(Delete, b)]);
        assert!(s.deleted[b].was_temporary);
        assert!(s.created.is_empty());
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn delete_alone_is_not_temporary() {
        let b = r"C:\Temp\old.log2";
        let s = summarize(&[ev(NameDelete, b)]);
        assert!(!s.deleted[b].was_temporary);
    }

    #[test]
    fn precedence_ignores_arrival_order() {
        let p = r"C:\x\y.dat";
        let forward = summarize(&[ev(Create, p), ev(Write, p), ev(Delete, p)]);
        let reverse = summarize(&[ev(Delete, p), ev(Write, p), ev(Create, p)]);
        assert!(forward.deleted.contains_key(p));
        assert!(reverse.deleted.contains_key(p));
        assert_eq!(forward.deleted[p].was_temporary, reverse.deleted[p].was_temporary);
    }

    #[test]
    fn rename_only_group_is_renamed() {
        let p = r"C:\x\moved.txt";
        let s = summarize(&[ev(Rename, p)]);
        assert!(s.renamed.contains_key(p));
        let s = summarize(&[ev(Rename, p), ev(Write, p)]);
        assert!(s.renamed.is_empty());
        assert_eq!(s.modified[p].write_count, 1);
    }

    #[test]
    fn close_and_read_only_groups_are_dropped() {
        let p = r"C:\x\seen.txt";
        let s = summarize(&[ev(Close, p), ev(Read, p), ev(Cleanup, p)]);
        assert!(s.is_empty());
    }

    #[test]
    fn last_event_decides_the_reported_process() {
        let p = r"C:\x\shared.txt";
        let s = summarize(&[by(Write, p, 100, "first.exe"), by(Write, p, 200, "second.exe")]);
        let m = &s.modified[p];
        assert_eq!(m.activity.process_id, 200);
        assert_eq!(m.activity.process_name, "second.exe");
        assert_eq!(m.activity.events.len(), 2);
    }

    #[test]
    fn whole_log_equals_union_of_per_path_partitions() {
        let log = vec![
            ev(Create, r"C:\a.exe"),
            ev(Write, r"C:\b.txt"),
            ev(Delete, r"C:\c.tmp"),
            ev(Write, r"C:\a.exe"),
            ev(Create, r"C:\c.tmp"),
            ev(Rename, r"C:\d.lnk"),
            ev(Read, r"C:\e.ini"),
            ev(Write, r"C:\b.txt"),
        ];
        let whole = summarize(&log);

        let mut union = ChangeSummary::default();
        let mut paths: Vec<&str> = log.iter().map(|e| e.path.as_str()).collect();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), 5);
        for path in paths {
            let part: Vec<FileEvent> = log.iter().filter(|e| e.path == path).cloned().collect();
            let s = summarize(&part);
            union.created.extend(s.created);
            union.deleted.extend(s.deleted);
            union.modified.extend(s.modified);
            union.renamed.extend(s.renamed);
        }
        assert_eq!(whole, union);
        assert_eq!(whole.len(), 4);
    }

    #[test]
    fn risk_follows_extension_tables() {
        assert_eq!(FileRisk::of(r"C:\Users\me\payload.EXE"), FileRisk::High);
        assert_eq!(FileRisk::of(r"C:\Start Menu\evil.lnk"), FileRisk::Medium);
        assert_eq!(FileRisk::of(r"C:\notes.txt"), FileRisk::Low);
        assert_eq!(FileRisk::of(r"C:\dir.d\noext"), FileRisk::Low);
        assert!(FileRisk::High > FileRisk::Medium);
    }

    #[test]
    fn risky_paths_lists_created_and_modified_only() {
        let s = summarize(&[
            ev(Create, r"C:\drop.dll"),
            ev(Write, r"C:\run.lnk"),
            ev(Delete, r"C:\gone.exe"),
            ev(Write, r"C:\plain.txt"),
        ]);
        assert_eq!(s.risky_paths(FileRisk::High), vec![r"C:\drop.dll"]);
        assert_eq!(s.risky_paths(FileRisk::Medium), vec![r"C:\drop.dll", r"C:\run.lnk"]);
        assert_eq!(s.risky_paths(FileRisk::Low).len(), 3);
    }

    #[test]
    fn summary_serializes_with_flattened_activity() {
        let s = summarize(&[ev(Write, r"C:\w.txt")]);
        let json = serde_json::to_value(&s).unwrap();
        let entry = &json["modified"][r"C:\w.txt"];
        assert_eq!(entry["write_count"], 1);
        assert_eq!(entry["process_name"], "sample.exe");
        assert_eq!(entry["events"][0]["kind"], "write");
    }
}
