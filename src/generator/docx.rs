use crate::error::{Error, Result};
use crate::generator::{
    Block, BlockId, BlockKind, Document, DocumentBuilder, MAX_HEADING_LEVEL, PlacedPicture,
};
use crate::path_utils::path_to_string_lossy;
use crate::types::{EmbedSize, PAGE_HEIGHT_CM, PAGE_WIDTH_CM, PageGeometry, get_media_info};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use image::ImageReader;
use memmap2::MmapOptions;
use rayon::prelude::*;
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;
use tokio::fs;
use tokio::task::spawn_blocking;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const CONTENT_TYPES_TEMPLATE: &str = include_str!("../../templates/docx/content_types.xml");
const PACKAGE_RELS_TEMPLATE: &str = include_str!("../../templates/docx/package.rels");
const DOCUMENT_RELS_TEMPLATE: &str = include_str!("../../templates/docx/document.xml.rels");
const DOCUMENT_TEMPLATE: &str = include_str!("../../templates/docx/document.xml");
const PICTURE_TEMPLATE: &str = include_str!("../../templates/docx/picture.xml");
const STYLES_TEMPLATE: &str = include_str!("../../templates/docx/styles.xml");
const HEADING_STYLE_TEMPLATE: &str = include_str!("../../templates/docx/heading_style.xml");
const CORE_TEMPLATE: &str = include_str!("../../templates/docx/core.xml");

/// Font sizes (half-points) for Heading1..Heading9.
const HEADING_SIZES: [u32; MAX_HEADING_LEVEL] = [32, 28, 26, 24, 22, 22, 21, 21, 21];

/// Outline level Word treats as body text.
const BODY_OUTLINE_LEVEL: usize = 9;

const TWIPS_PER_CM: f64 = 1440.0 / 2.54;

fn cm_to_twips(cm: f64) -> u32 {
    (cm * TWIPS_PER_CM).round() as u32
}

fn escape_xml(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\t')
        .collect::<String>()
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// An image stored in the package under `word/media/`.
struct Media {
    file_name: String,
    bytes: Vec<u8>,
}

impl Media {
    fn relationship_id(index: usize) -> String {
        format!("rIdImg{}", index + 1)
    }
}

/// A builder for Office Open XML word-processing documents (`.docx`).
///
/// Blocks are kept in memory; the package is only written on [`save`](DocumentBuilder::save).
pub struct Docx {
    document: Document,
    media: Vec<Media>,
    title: Option<String>,
}

impl Docx {
    pub fn new(geometry: PageGeometry) -> Self {
        Docx {
            document: Document::new(geometry),
            media: Vec::new(),
            title: None,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn media_count(&self) -> usize {
        self.media.len()
    }

    fn run(text: &str) -> String {
        format!(r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#, escape_xml(text))
    }

    fn picture_xml(picture: &PlacedPicture, media: &Media) -> String {
        let id = (picture.media_index + 1).to_string();
        PICTURE_TEMPLATE
            .trim_end()
            .replace("%cx%", &picture.width_emu.to_string())
            .replace("%cy%", &picture.height_emu.to_string())
            .replace("%id%", &id)
            .replace("%name%", &escape_xml(&media.file_name))
            .replace("%rid%", &Media::relationship_id(picture.media_index))
    }

    fn block_xml(&self, block: &Block) -> String {
        match &block.kind {
            BlockKind::Title(text) => format!(
                r#"<w:p><w:pPr><w:pStyle w:val="Title"/><w:jc w:val="center"/></w:pPr>{}</w:p>"#,
                Self::run(text)
            ),
            BlockKind::Heading { text, level } => format!(
                r#"<w:p><w:pPr><w:pStyle w:val="Heading{}"/></w:pPr>{}</w:p>"#,
                (*level).clamp(1, MAX_HEADING_LEVEL),
                Self::run(text)
            ),
            BlockKind::StyledParagraph { text, style_level } => format!(
                r#"<w:p><w:pPr><w:pStyle w:val="Heading{}"/><w:outlineLvl w:val="{}"/></w:pPr>{}</w:p>"#,
                (*style_level).clamp(1, MAX_HEADING_LEVEL),
                BODY_OUTLINE_LEVEL,
                Self::run(text)
            ),
            BlockKind::Centered(None) => r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr></w:p>"#.to_string(),
            BlockKind::Centered(Some(picture)) => match self.media.get(picture.media_index) {
                Some(media) => format!(
                    r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r>{}</w:r></w:p>"#,
                    Self::picture_xml(picture, media)
                ),
                None => r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr></w:p>"#.to_string(),
            },
        }
    }

    fn document_xml(&self) -> String {
        let geometry = self.document.geometry();
        let body = self
            .document
            .blocks()
            .par_iter()
            .map(|block| format!("    {}", self.block_xml(block)))
            .collect::<Vec<_>>()
            .join("\n");

        DOCUMENT_TEMPLATE
            .replace("%body%", &body)
            .replace("%page_width%", &cm_to_twips(PAGE_WIDTH_CM).to_string())
            .replace("%page_height%", &cm_to_twips(PAGE_HEIGHT_CM).to_string())
            .replace("%margin%", &cm_to_twips(geometry.margin_cm()).to_string())
    }

    fn styles_xml() -> String {
        let headings = HEADING_SIZES
            .iter()
            .enumerate()
            .map(|(i, size)| {
                HEADING_STYLE_TEMPLATE
                    .trim_end()
                    .replace("%level%", &(i + 1).to_string())
                    .replace("%outline%", &i.to_string())
                    .replace("%size%", &size.to_string())
            })
            .collect::<Vec<_>>()
            .join("\n");
        STYLES_TEMPLATE.replace("%heading_styles%", &headings)
    }

    fn document_rels_xml(&self) -> String {
        let relationships = self
            .media
            .iter()
            .enumerate()
            .map(|(i, media)| {
                format!(
                    r#"  <Relationship Id="{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/{}"/>"#,
                    Media::relationship_id(i),
                    media.file_name
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        DOCUMENT_RELS_TEMPLATE.replace("%relationships%", &relationships)
    }

    fn core_xml(&self) -> String {
        CORE_TEMPLATE
            .replace("%title%", &escape_xml(self.title.as_deref().unwrap_or("")))
            .replace(
                "%created%",
                &Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            )
    }
}

#[async_trait]
impl DocumentBuilder for Docx {
    fn set_page_margins(&mut self, margin_cm: f64) {
        self.document.set_geometry(PageGeometry::new(margin_cm));
    }

    fn add_title(&mut self, text: &str) -> BlockId {
        self.title = Some(text.to_string());
        self.document.push(BlockKind::Title(text.to_string()))
    }

    fn add_heading(&mut self, text: &str, level: usize) -> BlockId {
        self.document.push(BlockKind::Heading {
            text: text.to_string(),
            level: level.clamp(1, MAX_HEADING_LEVEL),
        })
    }

    fn add_styled_paragraph(&mut self, text: &str, style_level: usize) -> BlockId {
        self.document.push(BlockKind::StyledParagraph {
            text: text.to_string(),
            style_level: style_level.clamp(1, MAX_HEADING_LEVEL),
        })
    }

    fn add_centered_paragraph(&mut self) -> BlockId {
        self.document.push(BlockKind::Centered(None))
    }

    async fn embed_image(
        &mut self,
        block: BlockId,
        image_path: &Path,
        size: EmbedSize,
    ) -> Result<()> {
        match self.document.get_mut(block) {
            Some(Block {
                kind: BlockKind::Centered(None),
                ..
            }) => {}
            _ => {
                return Err(Error::Unsupported(format!(
                    "Block {} is not an empty centered paragraph",
                    block
                )));
            }
        }

        let file = fs::File::open(image_path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to open image file '{}': {}",
                    path_to_string_lossy(image_path),
                    e
                ),
            ))
        })?;
        let file_std = file.into_std().await;

        // Create the read-only memory map
        let mmap = match spawn_blocking(move || unsafe { MmapOptions::new().map(&file_std) })
            .await
            .map_err(|e| Error::AsyncTaskError(e.to_string()))?
        {
            Ok(map) => map,
            Err(e) => {
                return Err(e.into());
            }
        };

        let reader = ImageReader::new(Cursor::new(&mmap[..])).with_guessed_format()?;
        let format = reader.format().ok_or_else(|| {
            Error::Unsupported(format!(
                "Unrecognized image data in '{}'",
                path_to_string_lossy(image_path)
            ))
        })?;
        let (extension, _mime) = get_media_info(format)?;
        let (width_px, height_px) = reader.into_dimensions()?;
        let (width_emu, height_emu) = size.extent_emu(width_px, height_px).ok_or_else(|| {
            Error::Unsupported(format!(
                "Cannot size a {}x{} image to {:?}",
                width_px, height_px, size
            ))
        })?;

        let media_index = self.media.len();
        self.media.push(Media {
            file_name: format!("image{}.{}", media_index + 1, extension),
            bytes: mmap[..].to_vec(),
        });

        if let Some(target) = self.document.get_mut(block) {
            target.kind = BlockKind::Centered(Some(PlacedPicture {
                media_index,
                width_emu,
                height_emu,
            }));
        }
        Ok(())
    }

    fn remove_block(&mut self, block: BlockId) -> bool {
        self.document.remove(block)
    }

    fn block_count(&self) -> usize {
        self.document.blocks().len()
    }

    async fn save(self, output_path: &Path) -> Result<()> {
        let parts: Vec<(String, Vec<u8>)> = vec![
            (
                "[Content_Types].xml".to_string(),
                CONTENT_TYPES_TEMPLATE.as_bytes().to_vec(),
            ),
            ("_rels/.rels".to_string(), PACKAGE_RELS_TEMPLATE.as_bytes().to_vec()),
            ("docProps/core.xml".to_string(), self.core_xml().into_bytes()),
            ("word/document.xml".to_string(), self.document_xml().into_bytes()),
            ("word/styles.xml".to_string(), Self::styles_xml().into_bytes()),
            (
                "word/_rels/document.xml.rels".to_string(),
                self.document_rels_xml().into_bytes(),
            ),
        ];
        let media = self.media;
        let output_file = output_path.to_path_buf();

        // Write the whole package in a blocking task
        spawn_blocking(move || -> Result<()> {
            let xml_options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .unix_permissions(0o644);
            // JPEG and PNG payloads are already compressed
            let media_options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Stored)
                .unix_permissions(0o644);

            let file = File::create(&output_file).map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create document '{}': {}",
                        path_to_string_lossy(&output_file),
                        e
                    ),
                ))
            })?;
            let mut zip = ZipWriter::new(file);

            for (name, bytes) in &parts {
                zip.start_file(name.as_str(), xml_options)?;
                zip.write_all(bytes)?;
            }
            for item in &media {
                zip.start_file(format!("word/media/{}", item.file_name), media_options)?;
                zip.write_all(&item.bytes)?;
            }

            let mut file = zip.finish()?;
            file.flush()?;
            Ok(())
        })
        .await
        .map_err(|e| Error::AsyncTaskError(e.to_string()))??;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MarginPreset;

    #[test]
    fn test_twips_conversion() {
        assert_eq!(cm_to_twips(PAGE_WIDTH_CM), 11906);
        assert_eq!(cm_to_twips(PAGE_HEIGHT_CM), 16838);
        assert_eq!(cm_to_twips(MarginPreset::Narrow.margin_cm()), 720);
        assert_eq!(cm_to_twips(MarginPreset::Normal.margin_cm()), 1440);
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a&b <c>"), "a&amp;b &lt;c&gt;");
        assert_eq!(escape_xml("it's \"x\""), "it&apos;s &quot;x&quot;");
        assert_eq!(escape_xml("bell\u{7}"), "bell");
    }

    #[test]
    fn test_document_xml_reflects_blocks_and_margins() {
        let mut docx = Docx::new(PageGeometry::from_preset(MarginPreset::Narrow));
        docx.set_page_margins(MarginPreset::Wide.margin_cm());
        docx.add_title("root");
        docx.add_heading("A & B", 2);
        docx.add_styled_paragraph("deep", MAX_HEADING_LEVEL);
        let placeholder = docx.add_centered_paragraph();
        assert_eq!(docx.block_count(), 4);
        assert!(docx.remove_block(placeholder));
        assert_eq!(docx.block_count(), 3);

        let xml = docx.document_xml();
        assert!(xml.contains(r#"<w:pStyle w:val="Title"/><w:jc w:val="center"/>"#));
        assert!(xml.contains(r#"<w:pStyle w:val="Heading2"/></w:pPr><w:r><w:t xml:space="preserve">A &amp; B</w:t>"#));
        assert!(xml.contains(r#"<w:pStyle w:val="Heading9"/><w:outlineLvl w:val="9"/>"#));
        assert!(xml.contains(r#"w:top="1797""#));
        assert!(xml.contains(r#"<w:pgSz w:w="11906" w:h="16838"/>"#));
        assert!(!xml.contains("%body%"));
    }

    #[test]
    fn test_styles_define_nine_headings() {
        let styles = Docx::styles_xml();
        for level in 1..=MAX_HEADING_LEVEL {
            assert!(styles.contains(&format!(r#"w:styleId="Heading{}""#, level)));
        }
        assert!(!styles.contains("Heading10"));
        assert!(styles.contains(r#"w:styleId="Title""#));
    }

    #[tokio::test]
    async fn test_embed_into_non_placeholder_fails() {
        let mut docx = Docx::new(PageGeometry::from_preset(MarginPreset::Narrow));
        let heading = docx.add_heading("A", 1);
        let result = docx
            .embed_image(heading, Path::new("does-not-matter.jpg"), EmbedSize::WidthCm(5.0))
            .await;
        assert!(matches!(result, Err(Error::Unsupported(_))));
        assert_eq!(docx.media_count(), 0);
    }

    #[tokio::test]
    async fn test_embed_missing_file_fails() {
        let mut docx = Docx::new(PageGeometry::from_preset(MarginPreset::Narrow));
        let block = docx.add_centered_paragraph();
        let result = docx
            .embed_image(block, Path::new("no/such/image.jpg"), EmbedSize::WidthCm(5.0))
            .await;
        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(docx.block_count(), 1);
    }
}
