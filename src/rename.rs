// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Atomic, collision-resistant file renaming

use same_file::is_same_file;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::{files, RelabelError, Result};

/// Highest counter value probed before a rename gives up
const MAX_COUNTER: u32 = 9999;

/// One requested rename operation
#[derive(Debug, Clone)]
pub struct RenameRequest {
    pub source: PathBuf,
    pub dest_dir: PathBuf,
    pub prefix: String,
    pub tags: Vec<String>,
    pub suffix: String,
    /// Starting counter; superseded by the running counter in a batch
    pub counter: u32,
}

/// Outcome of a single rename
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RenameOutcome {
    /// The file was moved to a new name
    Renamed {
        new_path: PathBuf,
        filename: String,
        counter: u32,
    },
    /// The file already carries the target name; nothing was moved
    Skipped {
        existing: PathBuf,
        filename: String,
        counter: u32,
        reason: String,
    },
    /// The operation could not be performed
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RenameResult {
    pub source: PathBuf,
    #[serde(flatten)]
    pub outcome: RenameOutcome,
}

impl RenameResult {
    pub fn succeeded(&self) -> bool {
        !matches!(self.outcome, RenameOutcome::Failed { .. })
    }

    pub fn is_skip(&self) -> bool {
        matches!(self.outcome, RenameOutcome::Skipped { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, RenameOutcome::Failed { .. })
    }
}

/// Aggregate outcome of a batch rename
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub results: Vec<RenameResult>,
}

impl BatchSummary {
    /// The failed subset of `results`
    pub fn failures(&self) -> Vec<&RenameResult> {
        self.results.iter().filter(|r| r.is_failure()).collect()
    }
}

/// Best-effort decomposition of a generated filename
#[derive(Debug, Clone, PartialEq)]
pub struct FilenameParts {
    pub parts: Vec<String>,
    pub extension: String,
    pub counter: Option<u32>,
}

/// Dry-run preview of one batch entry
#[derive(Debug, Clone, Serialize)]
pub struct RenamePreview {
    pub old_name: String,
    pub new_name: String,
    pub old_path: PathBuf,
    pub counter: u32,
}

/// Progress callback invoked after each item of a batch.
///
/// Errors returned from the callback are logged and do not affect the batch.
pub type ProgressCallback<'a> = dyn FnMut(usize, usize, &RenameResult) -> Result<()> + 'a;

/// Build a deterministic filename from its parts.
///
/// Format: `[prefix]_[tag1]_[tagN]_[suffix]_[counter].ext` — tags sorted
/// case-insensitively, empty parts dropped, `untitled` when every part is
/// empty, counter zero-padded to three digits, extension normalized to carry
/// its leading dot. Pure function, no I/O.
pub fn generate_filename(
    prefix: &str,
    tags: &[String],
    suffix: &str,
    extension: &str,
    counter: u32,
) -> String {
    let mut sorted_tags: Vec<&str> = tags
        .iter()
        .map(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .collect();
    sorted_tags.sort_by_key(|t| t.to_lowercase());

    let mut parts: Vec<&str> = Vec::new();
    if !prefix.is_empty() {
        parts.push(prefix);
    }
    parts.extend(sorted_tags);
    if !suffix.is_empty() {
        parts.push(suffix);
    }

    let stem = if parts.is_empty() {
        "untitled".to_string()
    } else {
        parts.join("_")
    };

    if extension.is_empty() {
        format!("{}_{:03}", stem, counter)
    } else if let Some(bare) = extension.strip_prefix('.') {
        format!("{}_{:03}.{}", stem, counter, bare)
    } else {
        format!("{}_{:03}.{}", stem, counter, extension)
    }
}

/// Rename one file, probing counters until a free name is found.
///
/// Validation failures, collision exhaustion, and filesystem errors are all
/// reported as a `Failed` outcome; nothing is moved on failure. Finding the
/// source already sitting at a candidate name is a successful no-op `Skipped`.
pub fn rename_one(request: &RenameRequest) -> RenameResult {
    match attempt_rename(request) {
        Ok(outcome) => RenameResult {
            source: request.source.clone(),
            outcome,
        },
        Err(e) => {
            error!("Error renaming {:?}: {}", request.source, e);
            RenameResult {
                source: request.source.clone(),
                outcome: RenameOutcome::Failed {
                    reason: e.to_string(),
                },
            }
        }
    }
}

fn attempt_rename(request: &RenameRequest) -> Result<RenameOutcome> {
    let source = std::fs::canonicalize(&request.source)
        .map_err(|_| RelabelError::MissingSource(request.source.clone()))?;

    if !source.is_file() {
        return Err(RelabelError::NotAFile(source));
    }

    if !files::is_supported_image(&source) {
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        return Err(RelabelError::UnsupportedExtension(format!(
            ".{} (supported: {})",
            ext,
            files::supported_extensions().join(", ")
        )));
    }

    if !request.dest_dir.exists() {
        info!("Creating destination directory: {:?}", request.dest_dir);
        std::fs::create_dir_all(&request.dest_dir)?;
    }
    let dest_dir = std::fs::canonicalize(&request.dest_dir)?;
    if !dest_dir.is_dir() {
        return Err(RelabelError::NotADirectory(dest_dir));
    }

    let extension = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_string();

    let original_counter = request.counter;
    let mut counter = request.counter;
    loop {
        let filename = generate_filename(
            &request.prefix,
            &request.tags,
            &request.suffix,
            &extension,
            counter,
        );
        let dest_path = dest_dir.join(&filename);

        if !dest_path.exists() {
            info!(
                "Renaming: {:?} -> {}",
                source.file_name().unwrap_or_default(),
                filename
            );
            std::fs::rename(&source, &dest_path)?;
            if counter != original_counter {
                debug!(
                    "Counter incremented from {} to {}",
                    original_counter, counter
                );
            }
            return Ok(RenameOutcome::Renamed {
                new_path: dest_path,
                filename,
                counter,
            });
        }

        if is_same_file(&dest_path, &source).unwrap_or(false) {
            info!("File already has target name: {}", filename);
            return Ok(RenameOutcome::Skipped {
                existing: dest_path,
                filename,
                counter,
                reason: "File already has target name".to_string(),
            });
        }

        counter += 1;
        if counter > MAX_COUNTER {
            return Err(RelabelError::CounterExhausted(dest_dir));
        }
    }
}

/// Build batch requests that share prefix, tags, suffix, and destination
pub fn batch_requests(
    sources: &[PathBuf],
    dest_dir: &Path,
    prefix: &str,
    tags: &[String],
    suffix: &str,
    start_counter: u32,
) -> Vec<RenameRequest> {
    sources
        .iter()
        .map(|source| RenameRequest {
            source: source.clone(),
            dest_dir: dest_dir.to_path_buf(),
            prefix: prefix.to_string(),
            tags: tags.to_vec(),
            suffix: suffix.to_string(),
            counter: start_counter,
        })
        .collect()
}

/// Rename a batch of files in input order.
///
/// The running counter starts at `start_counter` and advances to the used
/// value plus one only after an actual rename, so sequential files receive
/// sequential numbers. Failures are recorded per item and never abort the
/// batch.
pub fn rename_batch(
    requests: &[RenameRequest],
    start_counter: u32,
    mut progress_callback: Option<&mut ProgressCallback<'_>>,
) -> BatchSummary {
    let total = requests.len();
    let mut results: Vec<RenameResult> = Vec::with_capacity(total);
    let mut successful = 0;
    let mut failed = 0;
    let mut skipped = 0;
    let mut counter = start_counter;

    info!("Starting batch rename of {} files", total);

    for (index, request) in requests.iter().enumerate() {
        let effective = RenameRequest {
            counter,
            ..request.clone()
        };
        let result = rename_one(&effective);
        let display_name = request.source.file_name().unwrap_or_default();

        match &result.outcome {
            RenameOutcome::Renamed {
                counter: used,
                filename,
                ..
            } => {
                successful += 1;
                counter = used + 1;
                info!(
                    "[{}/{}] Renamed: {:?} -> {}",
                    index + 1,
                    total,
                    display_name,
                    filename
                );
            }
            RenameOutcome::Skipped { .. } => {
                skipped += 1;
                info!("[{}/{}] Skipped: {:?}", index + 1, total, display_name);
            }
            RenameOutcome::Failed { reason } => {
                failed += 1;
                error!(
                    "[{}/{}] Failed: {:?} - {}",
                    index + 1,
                    total,
                    display_name,
                    reason
                );
            }
        }

        if let Some(ref mut callback) = progress_callback {
            if let Err(e) = callback(index + 1, total, &result) {
                error!("Error in progress callback: {}", e);
            }
        }

        results.push(result);
    }

    info!(
        "Batch rename complete: {} successful, {} failed, {} skipped out of {} total",
        successful, failed, skipped, total
    );

    BatchSummary {
        total,
        successful,
        failed,
        skipped,
        results,
    }
}

/// Preview the names a batch rename would assign, without touching the disk.
///
/// Unsupported sources are left out; the counter increments per previewed
/// item.
pub fn preview_batch(
    sources: &[PathBuf],
    prefix: &str,
    tags: &[String],
    suffix: &str,
    start_counter: u32,
) -> Vec<RenamePreview> {
    let mut previews = Vec::new();
    let mut counter = start_counter;

    for source in sources {
        if !files::is_supported_image(source) {
            continue;
        }
        let extension = source.extension().and_then(|e| e.to_str()).unwrap_or("");
        let new_name = generate_filename(prefix, tags, suffix, extension, counter);
        previews.push(RenamePreview {
            old_name: source
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
                .to_string(),
            new_name,
            old_path: source.clone(),
            counter,
        });
        counter += 1;
    }

    previews
}

/// Decompose a generated filename into parts, extension, and trailing
/// counter. Best-effort: parts containing underscores cannot be
/// reconstructed into prefix/tags/suffix.
pub fn parse_filename_parts(filename: &str) -> FilenameParts {
    let path = Path::new(filename);
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");

    let mut parts: Vec<String> = stem.split('_').map(String::from).collect();
    let mut counter = None;
    if let Some(last) = parts.last() {
        if last.len() == 3 && last.chars().all(|c| c.is_ascii_digit()) {
            counter = last.parse().ok();
            parts.pop();
        }
    }

    FilenameParts {
        parts,
        extension,
        counter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::write(path, b"image-bytes").unwrap();
    }

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn request(source: &Path, dest: &Path) -> RenameRequest {
        RenameRequest {
            source: source.to_path_buf(),
            dest_dir: dest.to_path_buf(),
            prefix: String::new(),
            tags: Vec::new(),
            suffix: String::new(),
            counter: 0,
        }
    }

    #[test]
    fn test_generate_filename_full_parts() {
        assert_eq!(
            generate_filename("art", &tags(&["comics", "nancy"]), "collection", ".png", 0),
            "art_comics_nancy_collection_000.png"
        );
        assert_eq!(
            generate_filename("", &tags(&["warhol", "popart"]), "", ".jpg", 5),
            "popart_warhol_005.jpg"
        );
    }

    #[test]
    fn test_generate_filename_tag_order_independent() {
        let a = generate_filename("p", &tags(&["Zebra", "apple", "Mango"]), "", ".jpg", 1);
        let b = generate_filename("p", &tags(&["apple", "Mango", "Zebra"]), "", ".jpg", 1);
        let c = generate_filename("p", &tags(&["Mango", "Zebra", "apple"]), "", ".jpg", 1);
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a, "p_apple_Mango_Zebra_001.jpg");
    }

    #[test]
    fn test_generate_filename_untitled_fallback() {
        assert_eq!(generate_filename("", &[], "", ".jpg", 0), "untitled_000.jpg");
        assert_eq!(generate_filename("", &[], "", "", 0), "untitled_000");
    }

    #[test]
    fn test_generate_filename_extension_normalized() {
        assert_eq!(generate_filename("a", &[], "", "jpg", 0), "a_000.jpg");
        assert_eq!(generate_filename("a", &[], "", ".jpg", 0), "a_000.jpg");
    }

    #[test]
    fn test_generate_filename_counter_growth() {
        assert_eq!(generate_filename("a", &[], "", ".jpg", 42), "a_042.jpg");
        assert_eq!(generate_filename("a", &[], "", ".jpg", 1000), "a_1000.jpg");
    }

    #[test]
    fn test_rename_one_success() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("img.jpg");
        touch(&source);

        let mut req = request(&source, dir.path());
        req.prefix = "art".to_string();
        let result = rename_one(&req);

        match result.outcome {
            RenameOutcome::Renamed {
                new_path,
                filename,
                counter,
            } => {
                assert_eq!(filename, "art_000.jpg");
                assert_eq!(counter, 0);
                assert!(new_path.exists());
                assert!(!source.exists());
            }
            other => panic!("Expected Renamed, got {:?}", other),
        }
    }

    #[test]
    fn test_rename_one_collision_increments() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("img.jpg");
        touch(&source);
        touch(&dir.path().join("art_000.jpg"));

        let mut req = request(&source, dir.path());
        req.prefix = "art".to_string();
        let result = rename_one(&req);

        match result.outcome {
            RenameOutcome::Renamed {
                filename, counter, ..
            } => {
                assert_eq!(filename, "art_001.jpg");
                assert_eq!(counter, 1);
            }
            other => panic!("Expected Renamed, got {:?}", other),
        }
    }

    #[test]
    fn test_rename_one_skips_when_already_named() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("art_000.jpg");
        touch(&source);

        let mut req = request(&source, dir.path());
        req.prefix = "art".to_string();
        let result = rename_one(&req);

        assert!(result.is_skip());
        assert!(source.exists());
    }

    #[test]
    fn test_rename_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("img.jpg");
        touch(&source);

        let mut req = request(&source, dir.path());
        req.prefix = "set".to_string();
        let first = rename_one(&req);
        let renamed_to = match first.outcome {
            RenameOutcome::Renamed { new_path, .. } => new_path,
            other => panic!("Expected Renamed, got {:?}", other),
        };

        let mut again = request(&renamed_to, dir.path());
        again.prefix = "set".to_string();
        let second = rename_one(&again);
        assert!(second.is_skip());
        assert!(renamed_to.exists());
    }

    #[test]
    fn test_rename_one_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = rename_one(&request(&dir.path().join("absent.jpg"), dir.path()));
        match result.outcome {
            RenameOutcome::Failed { reason } => {
                assert!(reason.contains("does not exist"));
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_rename_one_unsupported_extension_fails_without_io() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("doc.txt");
        touch(&source);

        let result = rename_one(&request(&source, dir.path()));
        assert!(result.is_failure());
        assert!(source.exists());
    }

    #[test]
    fn test_rename_one_counter_exhaustion() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("img.jpg");
        touch(&source);
        touch(&dir.path().join("x_9999.jpg"));

        let mut req = request(&source, dir.path());
        req.prefix = "x".to_string();
        req.counter = 9999;
        let result = rename_one(&req);

        match result.outcome {
            RenameOutcome::Failed { reason } => {
                assert!(reason.contains("9999 attempts"));
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
        assert!(source.exists());
    }

    #[test]
    fn test_rename_one_creates_destination_directory() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("img.jpg");
        touch(&source);
        let dest = dir.path().join("out").join("nested");

        let result = rename_one(&request(&source, &dest));
        assert!(result.succeeded());
        assert!(dest.join("untitled_000.jpg").exists());
    }

    #[test]
    fn test_batch_sequential_counters() {
        let dir = tempfile::tempdir().unwrap();
        let sources: Vec<PathBuf> = ["a.jpg", "b.jpg", "c.jpg"]
            .iter()
            .map(|n| {
                let p = dir.path().join(n);
                touch(&p);
                p
            })
            .collect();

        let requests = batch_requests(&sources, dir.path(), "set", &[], "", 0);
        let summary = rename_batch(&requests, 0, None);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.successful, 3);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.results.len(), 3);
        assert!(dir.path().join("set_000.jpg").exists());
        assert!(dir.path().join("set_001.jpg").exists());
        assert!(dir.path().join("set_002.jpg").exists());
    }

    #[test]
    fn test_batch_failure_does_not_abort_or_advance_counter() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jpg");
        let c = dir.path().join("c.jpg");
        touch(&a);
        touch(&c);
        let sources = vec![a, dir.path().join("missing.jpg"), c];

        let requests = batch_requests(&sources, dir.path(), "set", &[], "", 0);
        let summary = rename_batch(&requests, 0, None);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.results.len(), 3);
        assert_eq!(summary.failures().len(), 1);
        assert!(dir.path().join("set_000.jpg").exists());
        assert!(dir.path().join("set_001.jpg").exists());
        assert!(!dir.path().join("set_002.jpg").exists());
    }

    #[test]
    fn test_batch_counts_always_sum_to_total() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.jpg");
        touch(&good);
        let already = dir.path().join("mix_000.jpg");
        touch(&already);

        let sources = vec![already, good, dir.path().join("gone.jpg")];
        let requests = batch_requests(&sources, dir.path(), "mix", &[], "", 0);
        let summary = rename_batch(&requests, 0, None);

        assert_eq!(
            summary.successful + summary.failed + summary.skipped,
            summary.total
        );
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.successful, 1);
    }

    #[test]
    fn test_batch_progress_callback_runs_and_errors_are_absorbed() {
        let dir = tempfile::tempdir().unwrap();
        let sources: Vec<PathBuf> = ["a.jpg", "b.jpg"]
            .iter()
            .map(|n| {
                let p = dir.path().join(n);
                touch(&p);
                p
            })
            .collect();

        let mut calls: Vec<(usize, usize)> = Vec::new();
        let mut callback = |index: usize, total: usize, _result: &RenameResult| -> Result<()> {
            calls.push((index, total));
            Err(RelabelError::Config("callback exploded".to_string()))
        };

        let requests = batch_requests(&sources, dir.path(), "cb", &[], "", 0);
        let summary = rename_batch(&requests, 0, Some(&mut callback));

        assert_eq!(calls, vec![(1, 2), (2, 2)]);
        assert_eq!(summary.successful, 2);
    }

    #[test]
    fn test_preview_skips_unsupported_and_counts_up() {
        let sources = vec![
            PathBuf::from("/x/one.jpg"),
            PathBuf::from("/x/notes.txt"),
            PathBuf::from("/x/two.png"),
        ];
        let previews = preview_batch(&sources, "pre", &tags(&["b", "a"]), "", 0);

        assert_eq!(previews.len(), 2);
        assert_eq!(previews[0].new_name, "pre_a_b_000.jpg");
        assert_eq!(previews[1].new_name, "pre_a_b_001.png");
        assert_eq!(previews[1].counter, 1);
    }

    #[test]
    fn test_parse_filename_parts_roundtrip() {
        let parsed = parse_filename_parts("art_comics_nancy_000.jpg");
        assert_eq!(parsed.parts, vec!["art", "comics", "nancy"]);
        assert_eq!(parsed.extension, ".jpg");
        assert_eq!(parsed.counter, Some(0));

        let no_counter = parse_filename_parts("plain_name.png");
        assert_eq!(no_counter.counter, None);
        assert_eq!(no_counter.parts, vec!["plain", "name"]);
    }
}
