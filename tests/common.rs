//! Common test utilities and constants for the evidoc crate.
//!
//! Provides functions for setting up test directories, creating image
//! fixtures, and inspecting generated documents.

use evidoc::error::{Error, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use rand::{Rng, distributions::Alphanumeric};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

#[allow(dead_code)]
pub const TEST_TMP_DIR: &str = "tests/tmp";
#[allow(dead_code)]
pub const LONG_TEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Per-test directories: an evidence folder and a private scratch folder.
#[allow(dead_code)]
pub struct TestDirs {
    pub test_dir: PathBuf,
    pub source_dir: PathBuf,
    pub scratch_dir: PathBuf,
}

/// Helper function to create a clean, uniquely named test directory.
///
/// The source folder is named `evidence` so document titles are predictable.
#[allow(dead_code)]
pub async fn setup_test_dirs(sub_path: &str) -> TestDirs {
    let rand_string: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let unique_sub_path = format!("{}-{}", sub_path, rand_string);
    let test_dir = PathBuf::from(TEST_TMP_DIR).join(unique_sub_path);
    if test_dir.exists() {
        fs::remove_dir_all(&test_dir).await.unwrap();
    }
    let source_dir = test_dir.join("evidence");
    let scratch_dir = test_dir.join("scratch");

    fs::create_dir_all(&source_dir).await.unwrap();
    fs::create_dir_all(&scratch_dir).await.unwrap();

    TestDirs {
        test_dir,
        source_dir,
        scratch_dir,
    }
}

async fn save_image(image: DynamicImage, path: &Path, format: ImageFormat) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let path_clone = path.to_path_buf();
    tokio::task::spawn_blocking(move || image.save_with_format(path_clone, format))
        .await
        .map_err(|e| Error::AsyncTaskError(e.to_string()))?
        .map_err(Error::Image)?;
    Ok(())
}

/// Creates a solid-colour RGB JPEG of the given size.
#[allow(dead_code)]
pub async fn create_jpeg(path: &Path, width: u32, height: u32) -> Result<()> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
    save_image(DynamicImage::ImageRgb8(img), path, ImageFormat::Jpeg).await
}

/// Creates a half-transparent RGBA PNG of the given size.
#[allow(dead_code)]
pub async fn create_rgba_png(path: &Path, width: u32, height: u32) -> Result<()> {
    let img = RgbaImage::from_pixel(width, height, Rgba([10, 200, 10, 128]));
    save_image(DynamicImage::ImageRgba8(img), path, ImageFormat::Png).await
}

/// Creates a file with an image extension but garbage content.
#[allow(dead_code)]
pub async fn create_corrupt_image(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, b"this is not an image at all").await?;
    Ok(())
}

#[allow(dead_code)]
pub async fn dir_entry_count(path: &Path) -> usize {
    let mut count = 0;
    if let Ok(mut entries) = fs::read_dir(path).await {
        while let Ok(Some(_)) = entries.next_entry().await {
            count += 1;
        }
    }
    count
}

/// Reads one part of a DOCX package as text.
#[allow(dead_code)]
pub async fn read_docx_part(docx_path: &Path, part: &str) -> String {
    let file = fs::File::open(docx_path).await.unwrap();
    let file_std = file.into_std().await;
    let mut archive = zip::ZipArchive::new(file_std).unwrap();
    let mut file = archive.by_name(part).unwrap();
    let mut content = String::new();
    std::io::Read::read_to_string(&mut file, &mut content).unwrap();
    content
}

/// Names of all entries in a DOCX package.
#[allow(dead_code)]
pub async fn docx_entries(docx_path: &Path) -> Vec<String> {
    let file = fs::File::open(docx_path).await.unwrap();
    let file_std = file.into_std().await;
    let archive = zip::ZipArchive::new(file_std).unwrap();
    archive.file_names().map(|s| s.to_string()).collect()
}

/// One body paragraph of `word/document.xml`.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub style: Option<String>,
    pub text: String,
    pub has_picture: bool,
    pub body_outline: bool,
}

fn between<'a>(haystack: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = haystack.find(start)? + start.len();
    let to = haystack[from..].find(end)? + from;
    Some(&haystack[from..to])
}

/// Splits `word/document.xml` into its paragraphs, in document order.
#[allow(dead_code)]
pub fn paragraphs(document_xml: &str) -> Vec<Paragraph> {
    document_xml
        .split("<w:p>")
        .skip(1)
        .map(|chunk| Paragraph {
            style: between(chunk, "<w:pStyle w:val=\"", "\"").map(str::to_string),
            text: between(chunk, "<w:t xml:space=\"preserve\">", "</w:t>")
                .unwrap_or("")
                .to_string(),
            has_picture: chunk.contains("<pic:pic>"),
            body_outline: chunk.contains("<w:outlineLvl w:val=\"9\"/>"),
        })
        .collect()
}

/// Reads and splits the body of a generated document.
#[allow(dead_code)]
pub async fn document_paragraphs(docx_path: &Path) -> Vec<Paragraph> {
    paragraphs(&read_docx_part(docx_path, "word/document.xml").await)
}
