//! Generator module provides the document-building interface and its DOCX implementation.
//!
//! The assembler never touches a file format directly. It drives a
//! [`DocumentBuilder`], which owns the in-memory [`Document`] (ordered blocks
//! plus page geometry) and serializes it once at the end of a run.

use crate::error::Result;
use crate::types::{EmbedSize, PageGeometry};
use async_trait::async_trait;
use std::path::Path;

pub mod docx;

/// Deepest heading level a document supports. Deeper folders become styled paragraphs.
pub const MAX_HEADING_LEVEL: usize = 9;

/// Identifies a block inside a [`Document`]. Ids are never reused.
pub type BlockId = usize;

/// How a folder title at a given nesting level is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingStyle {
    Heading(usize),
    /// A plain paragraph carrying the deepest heading's look.
    DeepParagraph,
}

/// Maps a nesting level (1-based) onto a heading style, capped at [`MAX_HEADING_LEVEL`].
pub fn heading_style(level: usize) -> HeadingStyle {
    if level <= MAX_HEADING_LEVEL {
        HeadingStyle::Heading(level.max(1))
    } else {
        HeadingStyle::DeepParagraph
    }
}

/// A picture placed inside a centered paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedPicture {
    /// 0-based index into the builder's media list.
    pub media_index: usize,
    pub width_emu: u64,
    pub height_emu: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Title(String),
    Heading { text: String, level: usize },
    StyledParagraph { text: String, style_level: usize },
    /// Centered paragraph; empty until a picture is embedded into it.
    Centered(Option<PlacedPicture>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
}

/// The output artifact: ordered blocks plus page geometry.
#[derive(Debug, Clone)]
pub struct Document {
    geometry: PageGeometry,
    blocks: Vec<Block>,
    next_id: BlockId,
}

impl Document {
    pub fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            blocks: Vec::new(),
            next_id: 0,
        }
    }

    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    pub fn set_geometry(&mut self, geometry: PageGeometry) {
        self.geometry = geometry;
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn push(&mut self, kind: BlockKind) -> BlockId {
        let id = self.next_id;
        self.next_id += 1;
        self.blocks.push(Block { id, kind });
        id
    }

    pub fn get_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        // Blocks are appended in id order, so the most recent ones sit at the end.
        self.blocks.iter_mut().rev().find(|b| b.id == id)
    }

    /// Removes a block; false if no block has this id.
    pub fn remove(&mut self, id: BlockId) -> bool {
        match self.blocks.iter().rposition(|b| b.id == id) {
            Some(pos) => {
                self.blocks.remove(pos);
                true
            }
            None => false,
        }
    }
}

/// Common interface for document builders.
///
/// Implementations keep the document model and turn it into a file on
/// [`save`](DocumentBuilder::save).
#[async_trait]
pub trait DocumentBuilder: Send {
    /// Applies a uniform margin to all four sides of every page.
    fn set_page_margins(&mut self, margin_cm: f64);

    /// Adds the centered document title.
    fn add_title(&mut self, text: &str) -> BlockId;

    /// Adds a heading at `level` (1..=[`MAX_HEADING_LEVEL`]).
    fn add_heading(&mut self, text: &str, level: usize) -> BlockId;

    /// Adds a paragraph styled like heading `style_level` without being a heading.
    fn add_styled_paragraph(&mut self, text: &str, style_level: usize) -> BlockId;

    /// Adds an empty centered paragraph to embed a picture into.
    fn add_centered_paragraph(&mut self) -> BlockId;

    /// Embeds the image at `image_path` into `block`, constrained by exactly one
    /// dimension. The other follows from the image's aspect ratio.
    async fn embed_image(
        &mut self,
        block: BlockId,
        image_path: &Path,
        size: EmbedSize,
    ) -> Result<()>;

    /// Removes a block, e.g. a placeholder whose embed failed.
    fn remove_block(&mut self, block: BlockId) -> bool;

    fn block_count(&self) -> usize;

    /// Serializes the document to `output_path`.
    async fn save(self, output_path: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MarginPreset;

    #[test]
    fn test_heading_style_caps_at_nine() {
        assert_eq!(heading_style(1), HeadingStyle::Heading(1));
        assert_eq!(heading_style(9), HeadingStyle::Heading(9));
        assert_eq!(heading_style(10), HeadingStyle::DeepParagraph);
        assert_eq!(heading_style(42), HeadingStyle::DeepParagraph);
    }

    #[test]
    fn test_document_ids_survive_removal() {
        let mut doc = Document::new(PageGeometry::from_preset(MarginPreset::Normal));
        let a = doc.push(BlockKind::Title("root".to_string()));
        let b = doc.push(BlockKind::Centered(None));
        assert!(doc.remove(b));
        assert!(!doc.remove(b));
        let c = doc.push(BlockKind::Centered(None));
        assert_ne!(b, c);
        assert_eq!(doc.blocks().len(), 2);
        assert_eq!(doc.blocks()[0].id, a);
        assert!(doc.get_mut(c).is_some());
        assert!(doc.get_mut(b).is_none());
    }
}
