//! Structured run diagnostics.
//!
//! Every component reports through the [`Reporter`] trait. A [`DiagnosticLog`]
//! keeps the ordered events of the current run and can forward each one to a
//! live sink (a UI panel, stdout, …) as it arrives. Every event is mirrored to
//! the `log` facade as well.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local};

/// Recoverable failure messages are cut to this many characters.
pub const MESSAGE_LIMIT: usize = 80;

/// Truncates a message to [`MESSAGE_LIMIT`] characters.
pub fn truncate_message(message: &str) -> String {
    truncate_to(message, MESSAGE_LIMIT)
}

fn truncate_to(message: &str, limit: usize) -> String {
    match message.char_indices().nth(limit) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Why an image was left out of the document before reaching the embed step.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SkipReason {
    Missing,
    Empty,
    Decode(String),
    Encode(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Missing => f.write_str("file does not exist"),
            SkipReason::Empty => f.write_str("file is empty"),
            SkipReason::Decode(e) => write!(f, "cannot decode: {}", e),
            SkipReason::Encode(e) => write!(f, "cannot prepare working copy: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventKind {
    RunStarted {
        source: PathBuf,
    },
    ScanStarted,
    FolderScanned {
        name: String,
        images: usize,
        subfolders: usize,
        is_leaf: bool,
    },
    FolderUnreadable {
        name: String,
        error: String,
    },
    EntryUnreadable {
        name: String,
        error: String,
    },
    /// A folder whose canonical path is one of its own enclosing folders.
    FolderRevisited {
        name: String,
    },
    DepthLimitReached {
        name: String,
        limit: usize,
    },
    AssemblyStarted,
    DocumentCreated {
        margin_cm: f64,
    },
    TitleAdded {
        title: String,
    },
    FolderProcessing {
        name: String,
        level: usize,
    },
    /// Leaf classification for a folder being assembled.
    FolderClassified {
        name: String,
        images: usize,
        subfolders: usize,
        is_leaf: bool,
    },
    InsertingImages,
    NonLeafImagesIgnored,
    LeafWithoutImages,
    ImageProcessing {
        index: usize,
        total: usize,
        name: String,
    },
    ImageInspected {
        width_px: u32,
        height_px: u32,
        color_mode: String,
    },
    ConvertedToRgb,
    Resized {
        width_px: u32,
        height_px: u32,
    },
    ImageEmbedded {
        portrait: bool,
    },
    ImageSkipped {
        reason: String,
    },
    EmbedFailed {
        error: String,
    },
    InsertionSummary {
        inserted: usize,
        total: usize,
    },
    DocumentSaved {
        path: PathBuf,
    },
    RunFailed {
        error: String,
    },
    RunFinished,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::RunStarted { source } => write!(f, "Selected folder: {}", source.display()),
            EventKind::ScanStarted => f.write_str("Scanning folder structure..."),
            EventKind::FolderScanned {
                name,
                images,
                subfolders,
                is_leaf,
            }
            | EventKind::FolderClassified {
                name,
                images,
                subfolders,
                is_leaf,
            } => write!(
                f,
                "{}: {} images, {} subfolders, {}",
                name,
                images,
                subfolders,
                if *is_leaf { "leaf" } else { "branch" }
            ),
            EventKind::FolderUnreadable { name, error } => {
                write!(f, "Cannot read folder {}: {}", name, error)
            }
            EventKind::EntryUnreadable { name, error } => {
                write!(f, "Cannot inspect entry {}: {}", name, error)
            }
            EventKind::FolderRevisited { name } => {
                write!(f, "Skipping {}: links back to an enclosing folder (symlink cycle)", name)
            }
            EventKind::DepthLimitReached { name, limit } => {
                write!(f, "Skipping {}: nesting deeper than {} levels", name, limit)
            }
            EventKind::AssemblyStarted => f.write_str("Generating document..."),
            EventKind::DocumentCreated { margin_cm } => {
                write!(f, "Created document with {} cm margins", margin_cm)
            }
            EventKind::TitleAdded { title } => write!(f, "Added title: {}", title),
            EventKind::FolderProcessing { name, level } => {
                write!(f, "Processing folder: {} (level {})", name, level)
            }
            EventKind::InsertingImages => f.write_str("-> inserting images into leaf folder"),
            EventKind::NonLeafImagesIgnored => {
                f.write_str("-> not a leaf, images at this level are not inserted")
            }
            EventKind::LeafWithoutImages => f.write_str("-> leaf folder without images"),
            EventKind::ImageProcessing { index, total, name } => {
                write!(f, "[{}/{}] processing: {}", index, total, name)
            }
            EventKind::ImageInspected {
                width_px,
                height_px,
                color_mode,
            } => write!(f, "  size: {}x{}  mode: {}", width_px, height_px, color_mode),
            EventKind::ConvertedToRgb => f.write_str("  converted to RGB"),
            EventKind::Resized {
                width_px,
                height_px,
            } => write!(f, "  resized to: {}x{}", width_px, height_px),
            EventKind::ImageEmbedded { portrait } => {
                if *portrait {
                    f.write_str("  ok: portrait, height-limited")
                } else {
                    f.write_str("  ok: landscape, width-limited")
                }
            }
            EventKind::ImageSkipped { reason } => write!(f, "  skipped: {}", reason),
            EventKind::EmbedFailed { error } => write!(f, "  insertion failed: {}", error),
            EventKind::InsertionSummary { inserted, total } => {
                write!(f, "-> inserted {}/{}", inserted, total)
            }
            EventKind::DocumentSaved { path } => write!(f, "Document saved: {}", path.display()),
            EventKind::RunFailed { error } => write!(f, "Generation failed: {}", error),
            EventKind::RunFinished => f.write_str("Run finished"),
        }
    }
}

/// One timestamped diagnostic line.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiagnosticEvent {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    /// Nesting used for indentation when rendered.
    pub depth: usize,
    pub kind: EventKind,
}

impl DiagnosticEvent {
    pub fn new(severity: Severity, depth: usize, kind: EventKind) -> Self {
        Self {
            timestamp: Local::now(),
            severity,
            depth,
            kind,
        }
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}{}",
            self.timestamp.format("%H:%M:%S"),
            "  ".repeat(self.depth),
            self.kind
        )
    }
}

/// The single reporting interface every component writes through.
pub trait Reporter {
    fn report(&mut self, event: DiagnosticEvent);

    fn info(&mut self, depth: usize, kind: EventKind) {
        self.report(DiagnosticEvent::new(Severity::Info, depth, kind));
    }

    fn warn(&mut self, depth: usize, kind: EventKind) {
        self.report(DiagnosticEvent::new(Severity::Warning, depth, kind));
    }

    fn error(&mut self, depth: usize, kind: EventKind) {
        self.report(DiagnosticEvent::new(Severity::Error, depth, kind));
    }
}

type Sink = Box<dyn FnMut(&DiagnosticEvent) + Send>;

/// Append-only event list for one run.
#[derive(Default)]
pub struct DiagnosticLog {
    events: Vec<DiagnosticEvent>,
    sink: Option<Sink>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log that also hands every event to `sink` as it is recorded.
    pub fn with_sink<F>(sink: F) -> Self
    where
        F: FnMut(&DiagnosticEvent) + Send + 'static,
    {
        Self {
            events: Vec::new(),
            sink: Some(Box::new(sink)),
        }
    }

    pub fn events(&self) -> &[DiagnosticEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drops all recorded events. Called once at the start of each run.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Rendered lines, in recording order.
    pub fn lines(&self) -> Vec<String> {
        self.events.iter().map(|e| e.to_string()).collect()
    }

    pub fn count_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&EventKind) -> bool,
    {
        self.events.iter().filter(|e| predicate(&e.kind)).count()
    }
}

impl fmt::Debug for DiagnosticLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticLog")
            .field("events", &self.events)
            .field("sink", if self.sink.is_some() { &"Some(Sink)" } else { &"None" })
            .finish()
    }
}

impl Reporter for DiagnosticLog {
    fn report(&mut self, event: DiagnosticEvent) {
        let indent = "  ".repeat(event.depth);
        match event.severity {
            Severity::Info => log::info!("{}{}", indent, event.kind),
            Severity::Warning => log::warn!("{}{}", indent, event.kind),
            Severity::Error => log::error!("{}{}", indent, event.kind),
        }
        if let Some(sink) = self.sink.as_mut() {
            sink(&event);
        }
        self.events.push(event);
    }
}
