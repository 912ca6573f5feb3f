//! Depth-first document assembly.
//!
//! Every readable folder becomes a heading whose level is its nesting depth.
//! Images are embedded only for leaf folders (no subfolders), directly after
//! that folder's heading. Failures of a single folder or image are reported
//! and skipped; they never abort the run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::collector::{Collector, FolderSource, canonical_key};
use crate::diagnostics::{EventKind, Reporter, truncate_message};
use crate::generator::{DocumentBuilder, HeadingStyle, MAX_HEADING_LEVEL, heading_style};
use crate::imaging::{ImageNormalizer, PageFit};
use crate::path_utils::display_name;
use crate::types::{AssemblyStats, Orientation};

/// Heading level given to the source root.
pub const ROOT_LEVEL: usize = 1;

/// One step of the explicit walk.
enum Visit {
    Folder(PathBuf, usize),
    /// All subfolders of this (canonical) folder are done.
    Leave(PathBuf),
}

/// Walks a folder tree and appends its content to a [`DocumentBuilder`].
#[derive(Debug, Clone)]
pub struct DocumentAssembler<S = Collector> {
    source: S,
    normalizer: ImageNormalizer,
    fit: PageFit,
}

impl<S: FolderSource> DocumentAssembler<S> {
    pub fn new(source: S, normalizer: ImageNormalizer, fit: PageFit) -> Self {
        Self {
            source,
            normalizer,
            fit,
        }
    }

    /// Appends the tree below `root`, starting at [`ROOT_LEVEL`].
    ///
    /// Folders are visited in pre-order: a folder's heading and images come
    /// before its first subfolder, and subfolders follow natural order.
    pub async fn assemble<B, R>(&self, builder: &mut B, root: &Path, reporter: &mut R) -> AssemblyStats
    where
        B: DocumentBuilder,
        R: Reporter + Send + ?Sized,
    {
        let mut stats = AssemblyStats::default();
        // Canonical paths of the folders enclosing the current one.
        let mut ancestors: HashSet<PathBuf> = HashSet::new();
        // Explicit stack; children are pushed in reverse so the first one pops next.
        let mut pending = vec![Visit::Folder(root.to_path_buf(), ROOT_LEVEL)];
        let level_limit = self.source.max_depth() + ROOT_LEVEL;

        while let Some(visit) = pending.pop() {
            let (folder, level) = match visit {
                Visit::Folder(folder, level) => (folder, level),
                Visit::Leave(key) => {
                    ancestors.remove(&key);
                    continue;
                }
            };
            let name = display_name(&folder);

            if level > level_limit {
                reporter.warn(
                    level,
                    EventKind::DepthLimitReached {
                        name,
                        limit: self.source.max_depth(),
                    },
                );
                continue;
            }
            let key = canonical_key(&folder).await;
            if ancestors.contains(&key) {
                reporter.warn(level, EventKind::FolderRevisited { name });
                continue;
            }

            reporter.info(
                level,
                EventKind::FolderProcessing {
                    name: name.clone(),
                    level,
                },
            );

            let listing = match self.source.list_folder(&folder).await {
                Ok(listing) => listing,
                Err(e) => {
                    reporter.warn(
                        level,
                        EventKind::FolderUnreadable {
                            name,
                            error: truncate_message(&e.to_string()),
                        },
                    );
                    stats.unreadable_folders += 1;
                    continue;
                }
            };
            for (entry, error) in &listing.unreadable {
                reporter.warn(
                    level,
                    EventKind::EntryUnreadable {
                        name: entry.clone(),
                        error: truncate_message(error),
                    },
                );
            }

            emit_heading(builder, &name, level);
            stats.folders_emitted += 1;

            reporter.info(
                level,
                EventKind::FolderClassified {
                    name,
                    images: listing.images.len(),
                    subfolders: listing.subfolders.len(),
                    is_leaf: listing.is_leaf(),
                },
            );

            if listing.is_leaf() {
                stats.leaf_folders += 1;
                if listing.images.is_empty() {
                    reporter.info(level, EventKind::LeafWithoutImages);
                } else {
                    reporter.info(level, EventKind::InsertingImages);
                    let inserted = self
                        .insert_images(builder, &listing.images, level, reporter, &mut stats)
                        .await;
                    reporter.info(
                        level,
                        EventKind::InsertionSummary {
                            inserted,
                            total: listing.images.len(),
                        },
                    );
                }
            } else {
                if !listing.images.is_empty() {
                    reporter.info(level, EventKind::NonLeafImagesIgnored);
                }
                ancestors.insert(key.clone());
                pending.push(Visit::Leave(key));
                pending.extend(
                    listing
                        .subfolders
                        .into_iter()
                        .rev()
                        .map(|subfolder| Visit::Folder(subfolder, level + 1)),
                );
            }
        }

        stats
    }

    /// Embeds each image in order; returns how many made it into the document.
    async fn insert_images<B, R>(
        &self,
        builder: &mut B,
        images: &[PathBuf],
        level: usize,
        reporter: &mut R,
        stats: &mut AssemblyStats,
    ) -> usize
    where
        B: DocumentBuilder,
        R: Reporter + Send + ?Sized,
    {
        let depth = level + 1;
        let total = images.len();
        let mut inserted = 0;

        for (index, image) in images.iter().enumerate() {
            reporter.info(
                depth,
                EventKind::ImageProcessing {
                    index: index + 1,
                    total,
                    name: display_name(image),
                },
            );

            let normalized = match self.normalizer.normalize(image).await {
                Ok(normalized) => normalized,
                Err(reason) => {
                    reporter.warn(
                        depth,
                        EventKind::ImageSkipped {
                            reason: truncate_message(&reason.to_string()),
                        },
                    );
                    stats.images_skipped += 1;
                    continue;
                }
            };

            reporter.info(
                depth,
                EventKind::ImageInspected {
                    width_px: normalized.original_width,
                    height_px: normalized.original_height,
                    color_mode: normalized.original_mode.to_string(),
                },
            );
            if normalized.converted_to_rgb {
                reporter.info(depth, EventKind::ConvertedToRgb);
            }
            if normalized.resized {
                reporter.info(
                    depth,
                    EventKind::Resized {
                        width_px: normalized.width_px,
                        height_px: normalized.height_px,
                    },
                );
            }

            let orientation = normalized.orientation();
            let size = self.fit.embed_size(orientation);
            let block = builder.add_centered_paragraph();

            match builder.embed_image(block, normalized.path(), size).await {
                Ok(()) => {
                    reporter.info(
                        depth,
                        EventKind::ImageEmbedded {
                            portrait: orientation == Orientation::Portrait,
                        },
                    );
                    inserted += 1;
                    stats.images_embedded += 1;
                }
                Err(e) => {
                    builder.remove_block(block);
                    reporter.warn(
                        depth,
                        EventKind::EmbedFailed {
                            error: truncate_message(&e.to_string()),
                        },
                    );
                    stats.embed_failures += 1;
                }
            }
            // Working copy is removed here, whatever the embed outcome.
            drop(normalized);
        }

        inserted
    }
}

fn emit_heading<B: DocumentBuilder>(builder: &mut B, name: &str, level: usize) {
    match heading_style(level) {
        HeadingStyle::Heading(level) => builder.add_heading(name, level),
        HeadingStyle::DeepParagraph => builder.add_styled_paragraph(name, MAX_HEADING_LEVEL),
    };
}
