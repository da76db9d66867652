use std::cmp::Ordering;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

use super::{ExpansionError, Result};
use crate::request::{ElementMetadata, ElementSpec, Group, Leaf, LinkMode, Source};

/// Directories before files, each alphabetical
fn dirs_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    (a.file_type().is_file(), a.file_name()).cmp(&(b.file_type().is_file(), b.file_name()))
}

/// Turn a directory tree into element specs: sub-directories become named
/// groups, files become `src: path` leaves. Blocking.
pub fn to_specs(root: &Path, template: &ElementMetadata) -> Result<Vec<ElementSpec>> {
    if !root.is_dir() {
        return Err(ExpansionError::NotADirectory(root.to_path_buf()));
    }

    // stack[d] collects the children of the open directory at depth d
    let mut stack: Vec<(String, Vec<ElementSpec>)> = vec![(String::new(), Vec::new())];

    for entry in WalkDir::new(root).min_depth(1).sort_by(dirs_first) {
        let entry = entry?;

        while stack.len() > entry.depth() {
            close_group(&mut stack);
        }

        let name = entry.file_name().to_string_lossy().into_owned();

        if entry.file_type().is_dir() {
            stack.push((name, Vec::new()));
        } else if entry.path().is_file() {
            let leaf = ElementSpec::Leaf(Leaf {
                source: Source::Path {
                    path: entry.path().to_path_buf(),
                    link: LinkMode::CopyFiles,
                },
                metadata: template.clone(),
            });
            if let Some((_, elements)) = stack.last_mut() {
                elements.push(leaf);
            }
        }
    }

    while stack.len() > 1 {
        close_group(&mut stack);
    }

    Ok(stack.pop().map(|(_, elements)| elements).unwrap_or_default())
}

fn close_group(stack: &mut Vec<(String, Vec<ElementSpec>)>) {
    if let Some((name, elements)) = stack.pop() {
        if let Some((_, parent)) = stack.last_mut() {
            parent.push(ElementSpec::Group(Group { name, elements }));
        }
    }
}
