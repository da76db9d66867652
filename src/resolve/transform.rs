//! In-place content rewrites requested per element

use std::io;
use std::path::Path;

/// Normalize CRLF and lone CR to LF and end non-empty content with a newline
pub fn to_posix_lines(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len() + 1);
    let mut bytes = input.iter().peekable();

    while let Some(&byte) = bytes.next() {
        if byte == b'\r' {
            if bytes.peek() == Some(&&b'\n') {
                bytes.next();
            }
            output.push(b'\n');
        } else {
            output.push(byte);
        }
    }

    if output.last().is_some_and(|&last| last != b'\n') {
        output.push(b'\n');
    }

    output
}

/// Collapse every run of spaces and tabs into a single tab
pub fn space_to_tab(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len());
    let mut in_run = false;

    for &byte in input {
        if byte == b' ' || byte == b'\t' {
            if !in_run {
                output.push(b'\t');
                in_run = true;
            }
        } else {
            output.push(byte);
            in_run = false;
        }
    }

    output
}

/// Rewrite a staged file, returning its new size. Blocking.
pub fn apply(path: &Path, posix_lines: bool, tabs: bool) -> io::Result<u64> {
    let mut content = std::fs::read(path)?;

    if posix_lines {
        content = to_posix_lines(&content);
    }
    if tabs {
        content = space_to_tab(&content);
    }

    std::fs::write(path, &content)?;
    Ok(content.len() as u64)
}
