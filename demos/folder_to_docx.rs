//! Example turning one folder into an evidence document.
//!
//! Usage:
//!
//! ```text
//! cargo run --example folder_to_docx -- <folder> [narrow|normal|moderate|wide] [--analyze]
//! ```
//!
//! Every diagnostic line is printed as it is recorded, followed by the final
//! notice a desktop shell would show.

use evidoc::prelude::*;
use std::path::PathBuf;

fn print_tree(node: &FolderNode) {
    println!(
        "{}{} ({} images{})",
        "  ".repeat(node.depth),
        node.name,
        node.images.len(),
        if node.is_leaf() { ", leaf" } else { "" }
    );
    for child in &node.child_folders {
        print_tree(child);
    }
}

#[tokio::main]
async fn main() -> evidoc::error::Result<()> {
    let mut args = std::env::args().skip(1);
    let source = args.next().map(PathBuf::from).unwrap_or_default();
    let mut margin = MarginPreset::default();
    let mut analyze_only = false;
    for arg in args {
        if arg == "--analyze" {
            analyze_only = true;
        } else {
            margin = arg.parse()?;
        }
    }

    let config = EvidocConfig::builder()
        .source_path(source)
        .margin(margin)
        .build()?;

    let mut log = DiagnosticLog::with_sink(|event| println!("{}", event));

    if analyze_only {
        let tree = config.analyze_source(&mut log).await?;
        println!();
        print_tree(&tree);
        println!(
            "{} folders, {} images would be embedded",
            tree.folder_count(),
            tree.embeddable_image_count()
        );
        return Ok(());
    }

    let gate = RunGate::new();
    let result = config.generate_exclusive(&gate, &mut log).await;

    println!();
    match UserNotice::from_result(&result) {
        UserNotice::Success(path) => {
            if let Ok(outcome) = &result {
                println!(
                    "Embedded {} images from {} leaf folders ({} skipped, {} rejected)",
                    outcome.stats.images_embedded,
                    outcome.stats.leaf_folders,
                    outcome.stats.images_skipped,
                    outcome.stats.embed_failures
                );
            }
            println!("Document saved to {}", path.display());
        }
        UserNotice::Warning(msg) => println!("Warning: {}", msg),
        UserNotice::Error(msg) => eprintln!("{}", msg),
    }
    Ok(())
}
