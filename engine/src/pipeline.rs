//! Archive ingestion pipeline.
//!
//! For each selected file, in order:
//! 1. copy it from the source directory into the destination directory
//! 2. move the original into the processed directory
//! 3. if requested and the name ends in .zip/.tar/.gz, extract the copy
//!
//! Failures are recorded per file and never stop the batch. The original is
//! only moved once its copy exists in the destination.

use std::path::{Component, Path};
use std::time::SystemTime;

use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::archive::{self, ArchiveKind};
use crate::error::{EngineError, FileError};
use crate::fs_ops;
use crate::model::{FileOutcome, FileReport, FileStage, PipelineRequest, PipelineResult};
use crate::progress::ProgressCallback;

/// Run one batch.
///
/// With an empty selection only the destination directory is created.
///
/// # Errors
/// Returns EngineError only when the request cannot run at all: an empty
/// destination path, or a destination directory that cannot be created.
/// Per-file problems are reported in the result.
pub fn run_pipeline(
    request: &PipelineRequest,
    progress_callback: Option<&dyn ProgressCallback>,
) -> Result<PipelineResult, EngineError> {
    if request.destination_dir.as_os_str().is_empty() {
        return Err(EngineError::InvalidPath {
            path: request.destination_dir.clone(),
            reason: "Destination path is empty".to_string(),
        });
    }

    let id = Uuid::new_v4();
    let span = info_span!("pipeline", run = %id);
    let _guard = span.enter();
    let started_at = SystemTime::now();

    fs_ops::ensure_dir(&request.destination_dir).map_err(|e| {
        EngineError::DirectoryUnavailable {
            path: request.destination_dir.clone(),
            source: e,
        }
    })?;

    info!(
        destination = %request.destination_dir.display(),
        files = request.selected_files.len(),
        extract = request.extract,
        "run started"
    );
    if let Some(callback) = progress_callback {
        callback.on_run_started(request);
    }

    let mut reports = Vec::with_capacity(request.selected_files.len());
    for (file_index, name) in request.selected_files.iter().enumerate() {
        if let Some(callback) = progress_callback {
            callback.on_file_started(file_index, name);
        }

        let report = process_file(request, file_index, name, progress_callback);
        match &report.outcome {
            FileOutcome::Failed(err) => warn!(file = %name, error = %err, "file failed"),
            outcome => info!(file = %name, %outcome, "file done"),
        }

        if let Some(callback) = progress_callback {
            callback.on_file_completed(file_index, &report);
        }
        reports.push(report);
    }

    let result = PipelineResult {
        id,
        destination_dir: request.destination_dir.clone(),
        reports,
        started_at,
        finished_at: SystemTime::now(),
    };

    info!(summary = %result.summary(), "run completed");
    if let Some(callback) = progress_callback {
        callback.on_run_completed(&result);
    }

    Ok(result)
}

/// Walk one file through copy, move and extract.
fn process_file(
    request: &PipelineRequest,
    file_index: usize,
    name: &str,
    progress_callback: Option<&dyn ProgressCallback>,
) -> FileReport {
    let notify = |stage: FileStage| {
        debug!(file = %name, %stage, "stage");
        if let Some(callback) = progress_callback {
            callback.on_file_stage(file_index, name, stage);
        }
    };

    notify(FileStage::Pending);
    let mut report = FileReport::new(name);
    let src = request.source_dir.join(name);
    if !is_plain_file_name(name) || !src.is_file() {
        report.outcome = FileOutcome::Failed(FileError::SourceMissing { path: src });
        return report;
    }

    // Copy; nothing else happens to this file unless it succeeds
    notify(FileStage::CopyAttempted);
    let copy_path = request.destination_dir.join(name);
    let copied = fs_ops::ensure_dir(&request.destination_dir)
        .and_then(|_| fs_ops::copy_file_with_metadata(&src, &copy_path));
    match copied {
        Ok(bytes) => {
            debug!(file = %name, bytes, "copied");
            report.copied_to = Some(copy_path.clone());
            report.outcome = FileOutcome::Copied;
            notify(FileStage::Copied);
        }
        Err(e) => {
            notify(FileStage::CopyFailed);
            report.outcome = FileOutcome::Failed(FileError::CopyFailed {
                path: copy_path,
                source: e,
            });
            return report;
        }
    }

    let mut failure: Option<FileError> = None;

    // Archive the original; a failure here leaves the copy in place
    notify(FileStage::MoveAttempted);
    let archive_path = request.processed_dir.join(name);
    let moved = fs_ops::ensure_dir(&request.processed_dir)
        .and_then(|_| fs_ops::move_file(&src, &archive_path));
    match moved {
        Ok(()) => {
            report.archived_to = Some(archive_path);
            report.outcome = FileOutcome::Moved;
            notify(FileStage::Moved);
        }
        Err(e) => {
            notify(FileStage::MoveFailed);
            failure = Some(FileError::MoveFailed {
                path: archive_path,
                source: e,
            });
        }
    }

    let kind = if request.extract {
        ArchiveKind::from_name(name)
    } else {
        None
    };
    match kind {
        None => notify(FileStage::NotApplicable),
        Some(kind) => {
            notify(FileStage::ExtractAttempted);
            match archive::extract_into(&copy_path, name, kind, &request.destination_dir) {
                Ok(folder) => {
                    report.extracted_to = Some(folder);
                    if failure.is_none() {
                        report.outcome = FileOutcome::Extracted;
                    }
                    notify(FileStage::Extracted);
                }
                Err(e) => {
                    notify(FileStage::ExtractFailed);
                    if failure.is_some() {
                        warn!(file = %name, error = %e, "extraction also failed");
                    } else {
                        failure = Some(FileError::ExtractFailed {
                            path: copy_path,
                            source: e,
                        });
                    }
                }
            }
        }
    }

    if let Some(err) = failure {
        report.outcome = FileOutcome::Failed(err);
    }
    report
}

/// A selected name must be a single path component inside the source dir.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(segment)), None) if segment == name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;
    use std::fs;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct Dirs {
        _temp: tempfile::TempDir,
        source: PathBuf,
        output: PathBuf,
        processed: PathBuf,
    }

    fn setup() -> Dirs {
        let temp = tempfile::tempdir().expect("Failed to create temp dir");
        let source = temp.path().join("incoming");
        fs::create_dir(&source).expect("Failed to create source dir");
        Dirs {
            source,
            output: temp.path().join("out").join("batch"),
            processed: temp.path().join("processed"),
            _temp: temp,
        }
    }

    fn request(dirs: &Dirs, files: &[&str], extract: bool) -> PipelineRequest {
        PipelineRequest::new(
            &dirs.source,
            &dirs.output,
            &dirs.processed,
            files.iter().map(|f| f.to_string()),
            extract,
        )
    }

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).expect("Failed to create zip");
        let mut writer = zip::ZipWriter::new(file);
        for (name, data) in entries {
            writer
                .start_file(*name, zip::write::FileOptions::default())
                .expect("Failed to start entry");
            writer.write_all(data).expect("Failed to write entry");
        }
        writer.finish().expect("Failed to finish zip");
    }

    fn tar_with_entry(name: &str) -> Vec<u8> {
        let data = b"inside";
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, name, &data[..]).unwrap();
        builder.into_inner().unwrap()
    }

    /// Tar whose only entry is named `../evil.txt`, written as a raw header
    /// because `Builder::append_data` refuses `..`.
    fn escaping_tar() -> Vec<u8> {
        let data = b"escaped";
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_old();
        let name = b"../evil.txt";
        header.as_old_mut().name[..name.len()].copy_from_slice(name);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, &data[..]).unwrap();
        builder.into_inner().unwrap()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_missing_file_does_not_affect_others() {
        let dirs = setup();
        fs::write(dirs.source.join("present.txt"), b"here").unwrap();

        let result = run_pipeline(&request(&dirs, &["ghost.txt", "present.txt"], true), None)
            .expect("Failed to run pipeline");

        assert_eq!(result.reports.len(), 2);
        assert_eq!(result.reports[0].name, "ghost.txt");
        assert_eq!(
            result.reports[0].outcome.reason().as_deref(),
            Some("source missing")
        );
        assert!(matches!(result.reports[1].outcome, FileOutcome::Moved));
        assert!(dirs.output.join("present.txt").exists());
    }

    #[test]
    fn test_copy_then_move() {
        let dirs = setup();
        fs::write(dirs.source.join("report.pdf"), b"%PDF").unwrap();

        let result = run_pipeline(&request(&dirs, &["report.pdf"], true), None)
            .expect("Failed to run pipeline");

        let report = &result.reports[0];
        assert!(matches!(report.outcome, FileOutcome::Moved));
        assert_eq!(fs::read(dirs.output.join("report.pdf")).unwrap(), b"%PDF");
        assert_eq!(fs::read(dirs.processed.join("report.pdf")).unwrap(), b"%PDF");
        assert!(!dirs.source.join("report.pdf").exists());
        assert_eq!(report.copied_to.as_deref(), Some(dirs.output.join("report.pdf").as_path()));
        assert_eq!(
            report.archived_to.as_deref(),
            Some(dirs.processed.join("report.pdf").as_path())
        );
        assert!(report.extracted_to.is_none());
    }

    #[test]
    fn test_second_run_into_existing_destination() {
        let dirs = setup();
        fs::create_dir_all(&dirs.output).unwrap();
        fs::write(dirs.output.join("unrelated.txt"), b"keep me").unwrap();
        fs::write(dirs.source.join("first.txt"), b"1").unwrap();

        run_pipeline(&request(&dirs, &["first.txt"], false), None).expect("first run");
        fs::write(dirs.source.join("second.txt"), b"2").unwrap();
        let result =
            run_pipeline(&request(&dirs, &["second.txt"], false), None).expect("second run");

        assert!(!result.has_failures());
        assert_eq!(fs::read(dirs.output.join("unrelated.txt")).unwrap(), b"keep me");
        assert!(dirs.output.join("first.txt").exists());
        assert!(dirs.output.join("second.txt").exists());
    }

    #[test]
    fn test_zip_is_extracted_with_layout() {
        let dirs = setup();
        write_zip(
            &dirs.source.join("docs.zip"),
            &[("a.txt", b"hello"), ("b/c.txt", b"world")],
        );

        let result = run_pipeline(&request(&dirs, &["docs.zip"], true), None)
            .expect("Failed to run pipeline");

        let report = &result.reports[0];
        assert!(matches!(report.outcome, FileOutcome::Extracted));
        let folder = dirs.output.join("docs");
        assert_eq!(report.extracted_to.as_deref(), Some(folder.as_path()));
        assert_eq!(fs::read(folder.join("a.txt")).unwrap(), b"hello");
        assert_eq!(fs::read(folder.join("b").join("c.txt")).unwrap(), b"world");
        assert!(dirs.output.join("docs.zip").exists());
        assert!(dirs.processed.join("docs.zip").exists());
    }

    #[test]
    fn test_gzip_wrapped_tar_is_fully_extracted() {
        let dirs = setup();
        let payload = b"\x00\x01binary\xffpayload".to_vec();

        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(payload.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, "data.bin", payload.as_slice())
            .unwrap();
        let tar_data = builder.into_inner().unwrap();

        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&tar_data).unwrap();
        fs::write(dirs.source.join("bundle.tar.gz"), encoder.finish().unwrap()).unwrap();

        let result = run_pipeline(&request(&dirs, &["bundle.tar.gz"], true), None)
            .expect("Failed to run pipeline");

        assert!(matches!(result.reports[0].outcome, FileOutcome::Extracted));
        let folder = dirs.output.join("bundle.tar");
        assert_eq!(fs::read(folder.join("bundle.tar")).unwrap(), tar_data);
        assert_eq!(fs::read(folder.join("data.bin")).unwrap(), payload);
    }

    #[test]
    fn test_traversal_entry_is_rejected() {
        let dirs = setup();
        write_zip(
            &dirs.source.join("evil.zip"),
            &[("fine.txt", b"ok"), ("../evil.txt", b"escaped")],
        );

        let result = run_pipeline(&request(&dirs, &["evil.zip"], true), None)
            .expect("Failed to run pipeline");

        let report = &result.reports[0];
        assert_eq!(report.outcome.reason().as_deref(), Some("unsafe path"));
        assert!(matches!(
            report.outcome,
            FileOutcome::Failed(FileError::ExtractFailed {
                source: ExtractError::UnsafePath { .. },
                ..
            })
        ));
        assert!(!dirs.output.join("evil.txt").exists());
        assert!(!dirs.output.join("evil").join("fine.txt").exists());
        // copy and archive happened before extraction
        assert!(dirs.output.join("evil.zip").exists());
        assert!(dirs.processed.join("evil.zip").exists());
    }

    #[test]
    fn test_traversal_entry_in_tar_is_rejected() {
        let dirs = setup();
        fs::write(dirs.source.join("evil.tar"), escaping_tar()).unwrap();

        let result = run_pipeline(&request(&dirs, &["evil.tar"], true), None)
            .expect("Failed to run pipeline");

        assert_eq!(result.reports[0].outcome.reason().as_deref(), Some("unsafe path"));
        assert!(!dirs.output.join("evil.txt").exists());
        assert!(!dirs.output.parent().unwrap().join("evil.txt").exists());
    }

    #[test]
    fn test_traversal_entry_in_gzipped_tar_is_rejected() {
        let dirs = setup();
        fs::write(dirs.source.join("evil.tar.gz"), gzip(&escaping_tar())).unwrap();

        let result = run_pipeline(&request(&dirs, &["evil.tar.gz"], true), None)
            .expect("Failed to run pipeline");

        assert_eq!(result.reports[0].outcome.reason().as_deref(), Some("unsafe path"));
        assert!(!dirs.output.join("evil.txt").exists());
        assert!(!dirs.output.parent().unwrap().join("evil.txt").exists());
        assert!(!dirs.output.join("evil.tar").join("evil.txt").exists());
    }

    #[test]
    fn test_empty_selection_only_creates_folder() {
        let dirs = setup();

        let result =
            run_pipeline(&request(&dirs, &[], true), None).expect("Failed to run pipeline");

        assert!(dirs.output.is_dir());
        assert!(result.reports.is_empty());
        assert!(!result.has_failures());
        assert!(!dirs.processed.exists());
    }

    #[test]
    fn test_extract_disabled_leaves_archive_packed() {
        let dirs = setup();
        write_zip(&dirs.source.join("docs.zip"), &[("a.txt", b"hello")]);

        let result = run_pipeline(&request(&dirs, &["docs.zip"], false), None)
            .expect("Failed to run pipeline");

        assert!(matches!(result.reports[0].outcome, FileOutcome::Moved));
        assert!(!dirs.output.join("docs").exists());
    }

    #[test]
    fn test_copy_failure_keeps_source() {
        let dirs = setup();
        fs::write(dirs.source.join("clash"), b"data").unwrap();
        fs::create_dir_all(dirs.output.join("clash")).unwrap();

        let result =
            run_pipeline(&request(&dirs, &["clash"], true), None).expect("Failed to run pipeline");

        assert!(matches!(
            result.reports[0].outcome,
            FileOutcome::Failed(FileError::CopyFailed { .. })
        ));
        assert!(dirs.source.join("clash").exists());
        assert!(!dirs.processed.join("clash").exists());
    }

    #[test]
    fn test_destination_equal_to_source_keeps_original() {
        let dirs = setup();
        fs::write(dirs.source.join("a.txt"), b"original data").unwrap();
        let req = PipelineRequest::new(
            &dirs.source,
            &dirs.source,
            &dirs.processed,
            vec!["a.txt".to_string()],
            false,
        );

        let result = run_pipeline(&req, None).expect("Failed to run pipeline");

        assert!(matches!(
            result.reports[0].outcome,
            FileOutcome::Failed(FileError::CopyFailed { .. })
        ));
        assert_eq!(fs::read(dirs.source.join("a.txt")).unwrap(), b"original data");
        assert!(!dirs.processed.join("a.txt").exists());
    }

    #[test]
    fn test_dot_archive_names_do_not_escape_destination() {
        let dirs = setup();
        write_zip(&dirs.source.join("...zip"), &[("pwn.txt", b"escaped")]);
        fs::write(dirs.source.join("..tar"), tar_with_entry("inner.txt")).unwrap();

        let result = run_pipeline(&request(&dirs, &["...zip", "..tar"], true), None)
            .expect("Failed to run pipeline");

        for report in &result.reports {
            assert!(matches!(
                report.outcome,
                FileOutcome::Failed(FileError::ExtractFailed {
                    source: ExtractError::InvalidName { .. },
                    ..
                })
            ));
            assert!(report.extracted_to.is_none());
        }
        let parent = dirs.output.parent().unwrap();
        assert!(!parent.join("pwn.txt").exists());
        assert!(!dirs.output.join("pwn.txt").exists());
        assert!(!dirs.output.join("inner.txt").exists());
    }

    #[test]
    fn test_move_failure_keeps_copy() {
        let dirs = setup();
        fs::write(dirs.source.join("a.txt"), b"data").unwrap();
        // processed dir path is occupied by a regular file
        fs::write(&dirs.processed, b"not a dir").unwrap();

        let result =
            run_pipeline(&request(&dirs, &["a.txt"], true), None).expect("Failed to run pipeline");

        let report = &result.reports[0];
        assert!(matches!(
            report.outcome,
            FileOutcome::Failed(FileError::MoveFailed { .. })
        ));
        assert!(report.copied_to.is_some());
        assert!(dirs.output.join("a.txt").exists());
        assert!(dirs.source.join("a.txt").exists());
    }

    #[test]
    fn test_names_with_separators_are_missing() {
        let dirs = setup();
        fs::write(dirs.source.join("a.txt"), b"data").unwrap();
        let outside = dirs.source.parent().unwrap().join("secret.txt");
        fs::write(&outside, b"secret").unwrap();

        let result = run_pipeline(&request(&dirs, &["../secret.txt"], false), None)
            .expect("Failed to run pipeline");

        assert!(matches!(
            result.reports[0].outcome,
            FileOutcome::Failed(FileError::SourceMissing { .. })
        ));
        assert!(outside.exists());
    }

    #[test]
    fn test_unavailable_destination_rejects_run() {
        let dirs = setup();
        let blocker = dirs.source.parent().unwrap().join("blocker");
        fs::write(&blocker, b"file").unwrap();
        let req = PipelineRequest::new(
            &dirs.source,
            blocker.join("batch"),
            &dirs.processed,
            Vec::new(),
            false,
        );

        let result = run_pipeline(&req, None);
        assert!(matches!(result, Err(EngineError::DirectoryUnavailable { .. })));
    }

    #[test]
    fn test_empty_destination_path_rejected() {
        let dirs = setup();
        let req = PipelineRequest::new(&dirs.source, "", &dirs.processed, Vec::new(), false);
        assert!(matches!(
            run_pipeline(&req, None),
            Err(EngineError::InvalidPath { .. })
        ));
    }

    // Test helper: Mock progress callback to track invocations
    struct TestProgressCallback {
        calls: Mutex<Vec<String>>,
    }

    impl TestProgressCallback {
        fn new() -> Self {
            TestProgressCallback {
                calls: Mutex::new(Vec::new()),
            }
        }

        fn get_calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ProgressCallback for TestProgressCallback {
        fn on_run_started(&self, _request: &PipelineRequest) {
            self.calls.lock().unwrap().push("run_started".to_string());
        }

        fn on_file_started(&self, file_index: usize, _name: &str) {
            self.calls.lock().unwrap().push(format!("file_started({})", file_index));
        }

        fn on_file_stage(&self, file_index: usize, _name: &str, stage: FileStage) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("stage({}, {})", file_index, stage));
        }

        fn on_file_completed(&self, file_index: usize, _report: &FileReport) {
            self.calls.lock().unwrap().push(format!("file_completed({})", file_index));
        }

        fn on_run_completed(&self, _result: &PipelineResult) {
            self.calls.lock().unwrap().push("run_completed".to_string());
        }
    }

    #[test]
    fn test_progress_callbacks_follow_stages() {
        let dirs = setup();
        fs::write(dirs.source.join("a.txt"), b"data").unwrap();
        let callback = TestProgressCallback::new();

        run_pipeline(&request(&dirs, &["a.txt"], true), Some(&callback))
            .expect("Failed to run pipeline");

        assert_eq!(
            callback.get_calls(),
            vec![
                "run_started",
                "file_started(0)",
                "stage(0, pending)",
                "stage(0, copying)",
                "stage(0, copied)",
                "stage(0, moving)",
                "stage(0, moved)",
                "stage(0, no extraction)",
                "file_completed(0)",
                "run_completed",
            ]
        );
    }

    #[test]
    fn test_is_plain_file_name() {
        assert!(is_plain_file_name("a.zip"));
        assert!(!is_plain_file_name("dir/a.zip"));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name("/abs"));
    }
}
