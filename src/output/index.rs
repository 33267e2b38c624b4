//! Documentation index generation
//!
//! This module writes `_index.md` at the output root, listing every saved
//! document grouped by directory.

use crate::output::traits::OutputResult;
use crate::storage::{DocumentRecord, Storage};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const INDEX_FILE: &str = "_index.md";

/// Writes the index for every document in the manifest
///
/// # Arguments
///
/// * `storage` - The run manifest
/// * `directory` - The output directory; the index is written at its root
///
/// # Returns
///
/// * `Ok(PathBuf)` - Path of the written index
/// * `Err(OutputError)` - Failed to query the manifest or write the file
pub fn write_index(storage: &dyn Storage, directory: &Path) -> OutputResult<PathBuf> {
    let documents = storage.list_documents()?;
    let path = directory.join(INDEX_FILE);

    let mut file = File::create(&path)?;
    file.write_all(format_index(&documents).as_bytes())?;

    tracing::info!("Wrote index of {} documents to {}", documents.len(), path.display());
    Ok(path)
}

/// Formats documents as a markdown index
///
/// Documents at the output root come first, then one section per directory
/// in path order. A document without a title is listed by its path.
pub fn format_index(documents: &[DocumentRecord]) -> String {
    let mut md = String::new();
    md.push_str("# Documentation Index\n\n");

    if documents.is_empty() {
        md.push_str("_No documents were saved._\n");
        return md;
    }

    md.push_str(&format!("{} documents\n\n", documents.len()));

    let mut sections: BTreeMap<&str, Vec<&DocumentRecord>> = BTreeMap::new();
    for doc in documents {
        let directory = doc.path.rsplit_once('/').map_or("", |(dir, _)| dir);
        sections.entry(directory).or_default().push(doc);
    }

    for (directory, docs) in sections {
        if !directory.is_empty() {
            md.push_str(&format!("## {}\n\n", directory));
        }
        for doc in docs {
            let label = doc.title.as_deref().unwrap_or(&doc.path);
            md.push_str(&format!("- [{}]({})\n", escape_label(label), doc.path));
        }
        md.push('\n');
    }

    md
}

fn escape_label(label: &str) -> String {
    label.replace('[', "\\[").replace(']', "\\]")
}
