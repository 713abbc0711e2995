//! Rewrite every HTML file of a built site in place.
//!
//! Each file is one emission event. Files are processed in parallel and only
//! written back when the transform changed something.

use anyhow::{Context, Result};
use jwalk::WalkDir;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use crate::plugin::ScriptQueryPlugin;
use crate::{debug, log};

const MODULE: &str = "site";

/// Summary of one directory rewrite.
#[derive(Debug, Default)]
pub struct RewriteReport {
    /// HTML files found.
    pub scanned: usize,
    /// Files written back.
    pub rewritten: usize,
    /// Scripts patched across all files.
    pub scripts: usize,
    /// Preload links updated across all files.
    pub preloads: usize,
    /// Files that could not be processed, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

/// Per-file outcome.
enum FileOutcome {
    Unchanged,
    Rewritten { scripts: usize, preloads: usize },
}

/// Transform all `.html` / `.htm` files under `dir`.
///
/// A failing file is recorded in the report; the others still run.
pub fn rewrite_dir(dir: &Path, plugin: &ScriptQueryPlugin) -> Result<RewriteReport> {
    if !dir.is_dir() {
        anyhow::bail!("output directory `{}` does not exist", dir.display());
    }

    let files = collect_html_files(dir);
    debug!(plugin.log(), MODULE; "found {} html files in {}", files.len(), dir.display());

    let outcomes: Vec<_> = files
        .par_iter()
        .map(|path| (path, rewrite_file(path, plugin)))
        .collect();

    let mut report = RewriteReport {
        scanned: files.len(),
        ..RewriteReport::default()
    };
    for (path, outcome) in outcomes {
        match outcome {
            Ok(FileOutcome::Unchanged) => {}
            Ok(FileOutcome::Rewritten { scripts, preloads }) => {
                report.rewritten += 1;
                report.scripts += scripts;
                report.preloads += preloads;
            }
            Err(err) => {
                log!(plugin.log(), "error"; "{}: {err:#}", path.display());
                report.failed.push((path.clone(), format!("{err:#}")));
            }
        }
    }

    debug!(
        plugin.log(), MODULE;
        "rewrote {}/{} files, {} scripts, {} preloads",
        report.rewritten, report.scanned, report.scripts, report.preloads
    );
    Ok(report)
}

/// Sorted list of HTML files below `dir`.
fn collect_html_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path())
        .filter(|path| is_html(path))
        .collect();
    files.sort();
    files
}

fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
}

fn rewrite_file(path: &Path, plugin: &ScriptQueryPlugin) -> Result<FileOutcome> {
    let html = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let (output, report) = plugin
        .transform_page(&html, Some(path))
        .with_context(|| format!("failed to transform {}", path.display()))?;

    // Reserialization alone is not worth a write
    if report.is_empty() {
        return Ok(FileOutcome::Unchanged);
    }

    fs::write(path, output).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(FileOutcome::Rewritten {
        scripts: report.scripts.len(),
        preloads: report.preloads(),
    })
}
