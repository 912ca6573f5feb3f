//! Evidoc - Folder to Evidence Document Library
//!
//! This crate turns a folder hierarchy of images into a single word-processing
//! document (`.docx`). Folder nesting becomes heading levels, and the images of
//! each leaf folder are embedded, normalized and scaled to fit A4 pages, right
//! after that folder's heading.
//!
//! # Getting Started
//!
//! Configure a run with [`EvidocConfig::builder`], then call
//! [`generate`](EvidocConfig::generate). Progress and every recovered failure
//! are recorded in a [`DiagnosticLog`](diagnostics::DiagnosticLog).
//!
//! ```rust,no_run
//! use evidoc::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> evidoc::error::Result<()> {
//!     let config = EvidocConfig::builder()
//!         .source_path("./project_evidence")
//!         .margin(MarginPreset::Narrow)
//!         .build()?;
//!
//!     // Optional: validate settings and the folder before running
//!     config.preflight_check()?;
//!
//!     let mut log = DiagnosticLog::with_sink(|event| println!("{}", event));
//!     let result = config.generate(&mut log).await;
//!
//!     match UserNotice::from_result(&result) {
//!         UserNotice::Success(path) => println!("Saved to {}", path.display()),
//!         UserNotice::Warning(msg) | UserNotice::Error(msg) => eprintln!("{}", msg),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Unreadable folders, undecodable images and rejected embeds never abort a run;
//! they show up as warnings in the log. Only failures that prevent a document
//! from being written at all surface as [`error::Error`].

pub mod assembler;
pub mod collector;
pub mod diagnostics;
pub mod error;
pub mod evidoc;
pub mod generator;
pub mod imaging;
pub mod path_utils;
pub mod types;

// Publicly expose the main `EvidocConfig` struct and its builder
pub use evidoc::EvidocConfig;
pub use evidoc::EvidocConfigBuilder;

// Re-export error and core types for direct access
pub use types::{
    AssemblyStats, EmbedSize, FolderNode, GenerationOutcome, MarginPreset, Orientation,
    PageGeometry, RunGate, RunPermit, UserNotice,
};

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and traits, allowing you to
/// import everything you need with a single `use evidoc::prelude::*;` statement.
pub mod prelude {
    pub use super::{
        AssemblyStats, EmbedSize, FolderNode, GenerationOutcome, MarginPreset, Orientation,
        PageGeometry, RunGate, UserNotice,
    };
    pub use crate::diagnostics::{DiagnosticEvent, DiagnosticLog, EventKind, Reporter, Severity};
    pub use crate::error::{Error, Result};
    pub use crate::evidoc::{EvidocConfig, EvidocConfigBuilder};
    pub use crate::generator::DocumentBuilder;
    pub use crate::generator::docx::Docx;
}
