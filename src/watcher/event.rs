//! Classified watch events and the mapping from raw `notify` events.

use std::fmt;
use std::path::{Path, PathBuf};

use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// The path appeared (including the new name of a rename).
    Create,
    /// Content or metadata changed.
    Update,
    /// The path went away (including the old name of a rename).
    Delete,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Op::Create => "create",
            Op::Update => "update",
            Op::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// A classified event for one absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub op: Op,
    pub path: PathBuf,
}

impl Event {
    pub fn new(op: Op, path: impl Into<PathBuf>) -> Self {
        Self {
            op,
            path: path.into(),
        }
    }

    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self::new(Op::Create, path)
    }

    pub fn update(path: impl Into<PathBuf>) -> Self {
        Self::new(Op::Update, path)
    }

    pub fn delete(path: impl Into<PathBuf>) -> Self {
        Self::new(Op::Delete, path)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.path.display())
    }
}

/// Classify a raw notification into zero or more events.
///
/// Renames are split: the old name becomes a `Delete` and the new name a
/// `Create`, with no correlation between the two. Access, `Any` and `Other`
/// kinds yield nothing; the caller logs and skips them.
pub fn classify(raw: &notify::Event) -> Vec<Event> {
    match raw.kind {
        EventKind::Create(_) => each(&raw.paths, Op::Create),
        EventKind::Remove(_) => each(&raw.paths, Op::Delete),
        EventKind::Modify(ModifyKind::Name(mode)) => classify_rename(mode, &raw.paths),
        EventKind::Modify(_) => each(&raw.paths, Op::Update),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

fn classify_rename(mode: RenameMode, paths: &[PathBuf]) -> Vec<Event> {
    match mode {
        RenameMode::From => each(paths, Op::Delete),
        RenameMode::To => each(paths, Op::Create),
        RenameMode::Both => {
            let mut events = Vec::with_capacity(2);
            if let Some(from) = paths.first() {
                events.push(Event::delete(from.clone()));
            }
            if let Some(to) = paths.get(1) {
                events.push(Event::create(to.clone()));
            }
            events
        }
        // Backends that cannot tell the two halves apart: decide by
        // whether the name still exists.
        RenameMode::Any | RenameMode::Other => paths
            .iter()
            .map(|p| Event::new(rename_side(p), p.clone()))
            .collect(),
    }
}

fn rename_side(path: &Path) -> Op {
    if path.exists() { Op::Create } else { Op::Delete }
}

fn each(paths: &[PathBuf], op: Op) -> Vec<Event> {
    paths.iter().map(|p| Event::new(op, p.clone())).collect()
}
