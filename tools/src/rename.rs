use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Outcome of a rename batch. Only `copied` entries touched the filesystem.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RenameReport {
    pub copied: usize,
    pub missing: usize,
    pub malformed: usize,
    pub failed: usize,
}

/// Parse one `old_name -> new_name` line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Option<Result<(&str, &str), &str>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let Some((from, to)) = line.split_once("->") else {
        return Some(Err(line));
    };
    let (from, to) = (from.trim(), to.trim());
    if from.is_empty() || to.is_empty() {
        return Some(Err(line));
    }
    Some(Ok((from, to)))
}

/// Copy every mapped file from `source_dir` into `dest_dir`.
///
/// Per-line problems are logged and counted; the batch always runs to the end.
pub fn apply_mapping(mapping: &str, source_dir: &Path, dest_dir: &Path) -> RenameReport {
    let mut report = RenameReport::default();

    for (index, line) in mapping.lines().enumerate() {
        let line_no = index + 1;
        let (from, to) = match parse_line(line) {
            None => continue,
            Some(Err(raw)) => {
                tracing::warn!(line = line_no, content = raw, "skipping malformed mapping line");
                report.malformed += 1;
                continue;
            }
            Some(Ok(pair)) => pair,
        };

        let src = source_dir.join(from);
        let dst = dest_dir.join(to);
        if !src.is_file() {
            tracing::warn!(line = line_no, path = %src.display(), "source file does not exist");
            report.missing += 1;
            continue;
        }

        match copy_file(&src, &dst) {
            Ok(()) => report.copied += 1,
            Err(e) => {
                tracing::warn!(line = line_no, error = %format!("{e:#}"), "copy failed");
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        copied = report.copied,
        missing = report.missing,
        malformed = report.malformed,
        failed = report.failed,
        "rename batch finished"
    );
    report
}

/// Read the mapping file and run it. Only an unreadable mapping file is fatal.
pub fn run(mapping_path: &Path, source_dir: &Path, dest_dir: &Path) -> Result<RenameReport> {
    let mapping = fs::read_to_string(mapping_path)
        .with_context(|| format!("reading mapping file {}", mapping_path.display()))?;
    Ok(apply_mapping(&mapping, source_dir, dest_dir))
}

fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    fs::copy(src, dst)
        .with_context(|| format!("copying {} to {}", src.display(), dst.display()))?;
    Ok(())
}
