//! Artifact export: stage, serialize, hand to a sink, release.
//!
//! The staged file plays the part of a browser object URL. It is released on
//! every path out of [`export_artifact`], including serialization and sink
//! failures.

use std::fs;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

const STAGED_PREFIX: &str = "card-";
const STAGED_SUFFIX: &str = ".staged";
const CARD_FILENAME_SUFFIX: &str = "_Emergency_Health_Card.html";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Export failed: {0}")]
    ExportFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that can write itself out as a downloadable file.
pub trait ArtifactSource {
    fn serialize(&self, out: &mut dyn Write) -> std::io::Result<()>;

    fn media_type(&self) -> &'static str {
        "application/octet-stream"
    }
}

/// Destination for finished artifacts (the "save as" step).
pub trait ArtifactSink: Send + Sync {
    fn save(&self, bytes: &[u8], filename: &str) -> Result<PathBuf, ExportError>;
}

/// Writes artifacts into a directory, creating it if needed.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for DirectorySink {
    fn save(&self, bytes: &[u8], filename: &str) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| ExportError::ExportFailed(format!("Cannot create exports dir: {e}")))?;
        let path = self.dir.join(sanitize_filename(filename));
        fs::write(&path, bytes)
            .map_err(|e| ExportError::ExportFailed(format!("Cannot write artifact: {e}")))?;
        Ok(path)
    }
}

/// Suggested download name for a member's card.
pub fn card_filename(member_name: &str) -> String {
    let name = sanitize_filename(member_name);
    let name = if name.is_empty() { "Member".to_string() } else { name };
    format!("{name}{CARD_FILENAME_SUFFIX}")
}

/// Strip path separators, control characters and traversal dots.
/// Spaces and non-ASCII letters are kept.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|&c| !c.is_control())
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();

    let mut cleaned = cleaned.replace("..", "");
    cleaned = cleaned.trim().trim_start_matches('.').to_string();

    if cleaned.chars().count() > 120 {
        cleaned = cleaned.chars().take(120).collect();
    }
    cleaned
}

/// Stage, serialize, and save one artifact.
pub fn export_artifact(
    source: &dyn ArtifactSource,
    filename: &str,
    staging_dir: &Path,
    sink: &dyn ArtifactSink,
) -> Result<PathBuf, ExportError> {
    let staging_failed =
        |e: std::io::Error| ExportError::ExportFailed(format!("Cannot stage artifact: {e}"));
    fs::create_dir_all(staging_dir).map_err(staging_failed)?;

    // Removed on drop, whichever way we leave this function.
    let mut staged = tempfile::Builder::new()
        .prefix(STAGED_PREFIX)
        .suffix(STAGED_SUFFIX)
        .tempfile_in(staging_dir)
        .map_err(staging_failed)?;

    let bytes = {
        let mut writer = BufWriter::new(staged.as_file_mut());
        source
            .serialize(&mut writer)
            .and_then(|_| writer.flush())
            .map_err(|e| ExportError::ExportFailed(format!("Serialization failed: {e}")))?;
        drop(writer);

        let file = staged.as_file_mut();
        let mut bytes = Vec::new();
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read_to_end(&mut bytes))
            .map_err(staging_failed)?;
        bytes
    };

    let result = sink.save(&bytes, filename);

    if let Err(e) = staged.close() {
        tracing::warn!(error = %e, "Failed to release staged artifact");
    }

    match &result {
        Ok(path) => tracing::info!(
            media_type = source.media_type(),
            size = bytes.len(),
            path = %path.display(),
            "Artifact exported"
        ),
        Err(e) => tracing::warn!(error = %e, "Artifact export failed"),
    }

    result.map_err(|e| match e {
        ExportError::ExportFailed(msg) => ExportError::ExportFailed(msg),
        ExportError::Io(io) => ExportError::ExportFailed(io.to_string()),
    })
}

/// Remove staged artifacts left behind by a previous crash.
pub fn cleanup_orphaned_staging(staging_dir: &Path) -> usize {
    let entries = match fs::read_dir(staging_dir) {
        Ok(e) => e,
        Err(_) => return 0, // Staging dir may not exist yet
    };

    let mut cleaned = 0usize;
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if path.is_file()
            && name.starts_with(STAGED_PREFIX)
            && name.ends_with(STAGED_SUFFIX)
            && fs::remove_file(&path).is_ok()
        {
            cleaned += 1;
        }
    }

    if cleaned > 0 {
        tracing::info!(files_cleaned = cleaned, "Cleaned orphaned staged artifacts");
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Bytes(&'static [u8]);

    impl ArtifactSource for Bytes {
        fn serialize(&self, out: &mut dyn Write) -> std::io::Result<()> {
            out.write_all(self.0)
        }
    }

    /// Writes part of its payload, then fails.
    struct Exploding;

    impl ArtifactSource for Exploding {
        fn serialize(&self, out: &mut dyn Write) -> std::io::Result<()> {
            out.write_all(b"<!DOCTYPE html><html>")?;
            Err(std::io::Error::new(std::io::ErrorKind::Other, "renderer blew up"))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        saved: Mutex<Vec<(Vec<u8>, String)>>,
    }

    impl ArtifactSink for RecordingSink {
        fn save(&self, bytes: &[u8], filename: &str) -> Result<PathBuf, ExportError> {
            self.saved
                .lock()
                .unwrap()
                .push((bytes.to_vec(), filename.to_string()));
            Ok(PathBuf::from(filename))
        }
    }

    struct FailingSink;

    impl ArtifactSink for FailingSink {
        fn save(&self, _: &[u8], _: &str) -> Result<PathBuf, ExportError> {
            Err(ExportError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }
    }

    fn staged_count(dir: &Path) -> usize {
        fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn export_hands_bytes_to_sink_and_releases_staging() {
        let staging = tempfile::tempdir().unwrap();
        let sink = RecordingSink::default();

        let path = export_artifact(&Bytes(b"card"), "a.html", staging.path(), &sink).unwrap();

        assert_eq!(path, PathBuf::from("a.html"));
        let saved = sink.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, b"card");
        assert_eq!(staged_count(staging.path()), 0);
    }

    #[test]
    fn serialization_failure_releases_staging_and_reports_export_failed() {
        let staging = tempfile::tempdir().unwrap();
        let sink = RecordingSink::default();

        let err = export_artifact(&Exploding, "a.html", staging.path(), &sink).unwrap_err();

        assert!(matches!(err, ExportError::ExportFailed(_)));
        assert!(err.to_string().contains("renderer blew up"));
        assert_eq!(staged_count(staging.path()), 0);
        assert!(sink.saved.lock().unwrap().is_empty());
    }

    #[test]
    fn sink_failure_releases_staging_and_reports_export_failed() {
        let staging = tempfile::tempdir().unwrap();
        let err = export_artifact(&Bytes(b"card"), "a.html", staging.path(), &FailingSink)
            .unwrap_err();
        assert!(matches!(err, ExportError::ExportFailed(_)));
        assert_eq!(staged_count(staging.path()), 0);
    }

    #[test]
    fn repeated_exports_do_not_accumulate() {
        let staging = tempfile::tempdir().unwrap();
        let sink = RecordingSink::default();
        for _ in 0..5 {
            export_artifact(&Bytes(b"card"), "a.html", staging.path(), &sink).unwrap();
            let _ = export_artifact(&Exploding, "a.html", staging.path(), &sink);
        }
        assert_eq!(staged_count(staging.path()), 0);
    }

    #[test]
    fn unusable_staging_dir_reports_export_failed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("staging");
        fs::write(&blocker, b"not a directory").unwrap();

        let err = export_artifact(&Bytes(b"card"), "a.html", &blocker, &RecordingSink::default())
            .unwrap_err();
        assert!(matches!(err, ExportError::ExportFailed(_)));
    }

    #[test]
    fn directory_sink_writes_file() {
        let exports = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(exports.path().join("exports"));
        let path = sink.save(b"<html></html>", "Asha Rao_Emergency_Health_Card.html").unwrap();
        assert!(path.ends_with("exports/Asha Rao_Emergency_Health_Card.html"));
        assert_eq!(fs::read(&path).unwrap(), b"<html></html>");
    }

    #[test]
    fn directory_sink_cannot_escape_its_dir() {
        let exports = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(exports.path());
        let path = sink.save(b"x", "../../etc/passwd").unwrap();
        assert!(path.starts_with(exports.path()));
    }

    #[test]
    fn card_filename_keeps_spaces() {
        assert_eq!(card_filename("Asha Rao"), "Asha Rao_Emergency_Health_Card.html");
        assert_eq!(card_filename("आशा राव"), "आशा राव_Emergency_Health_Card.html");
    }

    #[test]
    fn card_filename_strips_separators() {
        assert_eq!(card_filename("a/b\\c"), "a_b_c_Emergency_Health_Card.html");
        assert_eq!(card_filename("   "), "Member_Emergency_Health_Card.html");
        assert_eq!(card_filename("..\n"), "Member_Emergency_Health_Card.html");
    }

    #[test]
    fn cleanup_removes_only_staged_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("card-abc.staged"), b"x").unwrap();
        fs::write(dir.path().join("card-def.staged"), b"y").unwrap();
        fs::write(dir.path().join("keep.html"), b"z").unwrap();

        assert_eq!(cleanup_orphaned_staging(dir.path()), 2);
        assert!(dir.path().join("keep.html").exists());
        assert_eq!(staged_count(dir.path()), 1);
    }

    #[test]
    fn cleanup_missing_dir_no_panic() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_orphaned_staging(&dir.path().join("nope")), 0);
    }
}
