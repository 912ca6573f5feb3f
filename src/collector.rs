//! Folder listing, image classification and natural ordering.
//!
//! This module decides what a folder contains (subfolders and images, each in
//! natural order) and runs the scanner pre-pass that summarizes a whole tree
//! before the document is built.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use tokio::fs::{self, ReadDir, read_dir};

use crate::diagnostics::{EventKind, Reporter, truncate_message};
use crate::path_utils::{display_name, is_hidden_file};
use crate::types::FolderNode;

/// Extensions (lowercase, without the dot) treated as images.
pub const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "bmp", "gif", "tif", "tiff", "webp"];

/// Default recursion guard for folder descent.
pub const DEFAULT_MAX_DEPTH: usize = 64;

lazy_static! {
    /// ASCII and fullwidth digit runs; everything between them is compared as text.
    static ref DIGIT_RUN_REGEX: Regex = Regex::new(r"[0-9０-９]+").unwrap();
}

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// True iff the name's final extension is in [`IMAGE_EXTENSIONS`], ignoring case.
pub fn is_image_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Segment {
    Text(String),
    /// Digit run as ASCII, leading zeros stripped.
    Number(String),
}

impl Segment {
    fn number(digits: &str) -> Self {
        let ascii: String = digits.chars().map(ascii_digit).collect();
        Segment::Number(ascii.trim_start_matches('0').to_string())
    }
}

/// Maps a fullwidth digit (`０`..`９`) to its ASCII form.
fn ascii_digit(c: char) -> char {
    match c {
        '０'..='９' => char::from_u32('0' as u32 + (c as u32 - '０' as u32)).unwrap_or(c),
        _ => c,
    }
}

/// Splits a name into alternating text/number segments, always starting and
/// ending with a (possibly empty) text segment.
fn natural_key(name: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;
    for m in DIGIT_RUN_REGEX.find_iter(name) {
        segments.push(Segment::Text(name[last..m.start()].to_lowercase()));
        segments.push(Segment::number(m.as_str()));
        last = m.end();
    }
    segments.push(Segment::Text(name[last..].to_lowercase()));
    segments
}

fn compare_segments(a: &Segment, b: &Segment) -> Ordering {
    match (a, b) {
        (Segment::Number(x), Segment::Number(y)) => x.len().cmp(&y.len()).then_with(|| x.cmp(y)),
        (Segment::Text(x), Segment::Text(y)) => x.cmp(y),
        _ => a.cmp(b),
    }
}

/// Natural ordering of two display names.
///
/// Digit runs compare numerically and text runs case-insensitively, segment by
/// segment, so `img2` sorts before `img10`. Names whose keys are equal (`a01`
/// vs `a1`, `A` vs `a`) fall back to a plain byte comparison, keeping the
/// order total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let ka = natural_key(a);
    let kb = natural_key(b);
    for (sa, sb) in ka.iter().zip(kb.iter()) {
        match compare_segments(sa, sb) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    ka.len().cmp(&kb.len()).then_with(|| a.cmp(b))
}

/// Compares two paths by the natural order of their final component.
pub fn natural_path_cmp(a: &PathBuf, b: &PathBuf) -> Ordering {
    natural_cmp(&display_name(a), &display_name(b))
}

/// Sorts paths in place by natural order of their base names.
pub fn sort_naturally(paths: &mut [PathBuf]) {
    paths.par_sort_by(natural_path_cmp);
}

/// The classified, ordered contents of one folder.
#[derive(Debug, Clone, Default)]
pub struct FolderListing {
    pub subfolders: Vec<PathBuf>,
    pub images: Vec<PathBuf>,
    /// Entries whose metadata could not be read: (name, error).
    pub unreadable: Vec<(String, String)>,
}

impl FolderListing {
    pub fn is_leaf(&self) -> bool {
        self.subfolders.is_empty()
    }
}

/// Source of folder listings for the document walk.
#[async_trait]
pub trait FolderSource: Send + Sync {
    /// Lists one folder; an `Err` means the folder cannot be read at all.
    async fn list_folder(&self, directory: &Path) -> std::io::Result<FolderListing>;

    /// Deepest nesting below the root that is still descended into.
    fn max_depth(&self) -> usize;
}

/// Lists and classifies folder contents.
#[derive(Debug, Clone, Copy)]
pub struct Collector {
    skip_hidden: bool,
    max_depth: usize,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new(false, DEFAULT_MAX_DEPTH)
    }
}

impl Collector {
    /// Creates a new Collector.
    ///
    /// # Arguments
    ///
    /// * `skip_hidden` - Ignore dot-prefixed entries. A skipped hidden folder
    ///   no longer keeps its parent from being a leaf.
    /// * `max_depth` - Deepest folder nesting that is still descended into
    pub fn new(skip_hidden: bool, max_depth: usize) -> Self {
        Self {
            skip_hidden,
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Lists a directory and partitions it into subfolders and images.
    ///
    /// Failing to open or iterate the directory is an error for the caller to
    /// report. A single entry whose metadata cannot be read is recorded in
    /// [`FolderListing::unreadable`] and skipped. Symlinks are followed.
    pub async fn list_folder(&self, directory: &Path) -> std::io::Result<FolderListing> {
        let mut listing = FolderListing::default();
        let mut entries: ReadDir = read_dir(directory).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            if self.skip_hidden && is_hidden_file(&path) {
                continue;
            }

            let metadata = match fs::metadata(&path).await {
                Ok(m) => m,
                Err(e) => {
                    listing.unreadable.push((display_name(&path), e.to_string()));
                    continue;
                }
            };

            if metadata.is_dir() {
                listing.subfolders.push(path);
            } else if metadata.is_file() && is_image_file(&display_name(&path)) {
                listing.images.push(path);
            }
        }

        sort_naturally(&mut listing.subfolders);
        sort_naturally(&mut listing.images);
        Ok(listing)
    }

    /// Scanner pre-pass: walks the tree below `root`, reporting one summary
    /// line per folder, and returns the discovered structure.
    ///
    /// Never fails. An unreadable folder is reported and left out together with
    /// its subtree; `None` means the root itself could not be read.
    pub async fn scan_structure<R>(&self, root: &Path, reporter: &mut R) -> Option<FolderNode>
    where
        R: Reporter + Send + ?Sized,
    {
        scan_structure(self, root, reporter).await
    }
}

/// Scanner pre-pass over any [`FolderSource`]; see [`Collector::scan_structure`].
pub async fn scan_structure<S, R>(source: &S, root: &Path, reporter: &mut R) -> Option<FolderNode>
where
    S: FolderSource + ?Sized,
    R: Reporter + Send + ?Sized,
{
    let mut ancestors = HashSet::new();
    scan_folder(source, root.to_path_buf(), 0, &mut ancestors, reporter).await
}

fn scan_folder<'a, S, R>(
    source: &'a S,
    path: PathBuf,
    depth: usize,
    ancestors: &'a mut HashSet<PathBuf>,
    reporter: &'a mut R,
) -> BoxFuture<'a, Option<FolderNode>>
where
    S: FolderSource + ?Sized,
    R: Reporter + Send + ?Sized,
{
    Box::pin(async move {
        let name = display_name(&path);

        if depth > source.max_depth() {
            reporter.warn(
                depth,
                EventKind::DepthLimitReached {
                    name,
                    limit: source.max_depth(),
                },
            );
            return None;
        }
        let key = canonical_key(&path).await;
        if ancestors.contains(&key) {
            reporter.warn(depth, EventKind::FolderRevisited { name });
            return None;
        }

        let listing = match source.list_folder(&path).await {
            Ok(listing) => listing,
            Err(e) => {
                reporter.warn(
                    depth,
                    EventKind::FolderUnreadable {
                        name,
                        error: truncate_message(&e.to_string()),
                    },
                );
                return None;
            }
        };

        for (entry, error) in &listing.unreadable {
            reporter.warn(
                depth,
                EventKind::EntryUnreadable {
                    name: entry.clone(),
                    error: truncate_message(error),
                },
            );
        }

        reporter.info(
            depth,
            EventKind::FolderScanned {
                name: name.clone(),
                images: listing.images.len(),
                subfolders: listing.subfolders.len(),
                is_leaf: listing.is_leaf(),
            },
        );

        // Only enclosing folders count as a cycle; siblings may share a target.
        let mut child_folders = Vec::with_capacity(listing.subfolders.len());
        ancestors.insert(key.clone());
        for subfolder in listing.subfolders {
            if let Some(child) = scan_folder(source, subfolder, depth + 1, ancestors, reporter).await {
                child_folders.push(child);
            }
        }
        ancestors.remove(&key);

        Some(FolderNode {
            path,
            name,
            depth,
            child_folders,
            images: listing.images,
        })
    })
}

#[async_trait]
impl FolderSource for Collector {
    async fn list_folder(&self, directory: &Path) -> std::io::Result<FolderListing> {
        Collector::list_folder(self, directory).await
    }

    fn max_depth(&self) -> usize {
        self.max_depth
    }
}

/// Canonical form of `path`, used to detect a folder that contains itself
/// through a symlink. Paths that cannot be canonicalized are used as given.
pub(crate) async fn canonical_key(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .await
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticLog;

    /// Fails every listing below the root with a long error.
    struct FailingChildren {
        root: PathBuf,
    }

    #[async_trait]
    impl FolderSource for FailingChildren {
        async fn list_folder(&self, directory: &Path) -> std::io::Result<FolderListing> {
            if directory == self.root {
                let mut listing = FolderListing {
                    subfolders: vec![self.root.join("broken"), self.root.join("fine")],
                    ..FolderListing::default()
                };
                listing
                    .unreadable
                    .push(("ghost.jpg".to_string(), "stale handle ".repeat(12)));
                return Ok(listing);
            }
            if display_name(directory) == "fine" {
                return Ok(FolderListing::default());
            }
            Err(std::io::Error::other("unreadable ".repeat(12)))
        }

        fn max_depth(&self) -> usize {
            DEFAULT_MAX_DEPTH
        }
    }

    #[tokio::test]
    async fn test_scan_truncates_failure_messages() {
        let source = FailingChildren {
            root: PathBuf::from("virtual-root"),
        };
        let mut log = DiagnosticLog::new();
        let tree = scan_structure(&source, &source.root, &mut log).await.unwrap();

        let children: Vec<&str> = tree.child_folders.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(children, vec!["fine"]);
        for event in log.events() {
            match &event.kind {
                EventKind::FolderUnreadable { error, .. } | EventKind::EntryUnreadable { error, .. } => {
                    assert_eq!(error.chars().count(), 80)
                }
                _ => {}
            }
        }
        assert_eq!(log.count_where(|k| matches!(k, EventKind::FolderUnreadable { .. })), 1);
        assert_eq!(log.count_where(|k| matches!(k, EventKind::EntryUnreadable { .. })), 1);
    }

    #[test]
    fn test_is_image_file() {
        for name in [
            "a.jpg", "a.JPEG", "b.png", "c.Bmp", "d.gif", "e.tif", "f.TIFF", "g.webp",
        ] {
            assert!(is_image_file(name), "{} should be an image", name);
        }
        assert!(!is_image_file("notes.txt"));
        assert!(!is_image_file("photo.jpg.txt"));
        assert!(!is_image_file("jpg"));
        assert!(!is_image_file(".jpg"));
        assert!(!is_image_file("archive.avif"));
    }

    #[test]
    fn test_natural_order_examples() {
        assert_eq!(natural_cmp("img2", "img10"), Ordering::Less);
        assert_eq!(natural_cmp("a2", "a10"), Ordering::Less);
        assert_eq!(natural_cmp("a10", "a10b"), Ordering::Less);
        assert_eq!(natural_cmp("a2", "a10b"), Ordering::Less);
        assert_eq!(natural_cmp("img10.jpg", "img9.jpg"), Ordering::Greater);
    }

    #[test]
    fn test_natural_order_alphabetic_is_case_insensitive() {
        assert_eq!(natural_cmp("apple", "Banana"), Ordering::Less);
        assert_eq!(natural_cmp("Zebra", "apple"), Ordering::Greater);
        // Equal keys still resolve deterministically.
        assert_ne!(natural_cmp("Apple", "apple"), Ordering::Equal);
        assert_eq!(
            natural_cmp("Apple", "apple"),
            natural_cmp("apple", "Apple").reverse()
        );
    }

    #[test]
    fn test_natural_order_huge_and_padded_numbers() {
        assert_eq!(
            natural_cmp("x99999999999999999999999", "x100000000000000000000000"),
            Ordering::Less
        );
        assert_eq!(natural_cmp("p007", "p8"), Ordering::Less);
        assert_ne!(natural_cmp("p01", "p1"), Ordering::Equal);
    }

    #[test]
    fn test_natural_order_is_total() {
        let names = [
            "a10b", "A2", "a2", "a10", "10", "b", "", "a01", "a1", "第2章", "第10章", "x.png",
        ];
        for a in names {
            assert_eq!(natural_cmp(a, a), Ordering::Equal);
            for b in names {
                assert_eq!(natural_cmp(a, b), natural_cmp(b, a).reverse());
                for c in names {
                    if natural_cmp(a, b) == Ordering::Less && natural_cmp(b, c) == Ordering::Less {
                        assert_eq!(natural_cmp(a, c), Ordering::Less, "{} {} {}", a, b, c);
                    }
                }
            }
        }
    }

    #[test]
    fn test_sort_naturally_uses_base_names() {
        let mut paths = vec![
            PathBuf::from("z/img10.jpg"),
            PathBuf::from("a/img2.jpg"),
            PathBuf::from("m/img1.jpg"),
        ];
        sort_naturally(&mut paths);
        assert_eq!(
            paths,
            vec![
                PathBuf::from("m/img1.jpg"),
                PathBuf::from("a/img2.jpg"),
                PathBuf::from("z/img10.jpg"),
            ]
        );
        assert_eq!(
            natural_cmp("第2章", "第10章"),
            Ordering::Less,
            "digit runs inside CJK names compare numerically"
        );
    }

    #[test]
    fn test_natural_order_fullwidth_digits() {
        assert_eq!(natural_cmp("第２章", "第１０章"), Ordering::Less);
        assert_eq!(natural_cmp("第９章", "第10章"), Ordering::Less);
        assert_eq!(natural_cmp("第１１章", "第10章"), Ordering::Greater);
        // Same value in both widths still orders deterministically.
        assert_ne!(natural_cmp("第２章", "第2章"), Ordering::Equal);
    }
}
