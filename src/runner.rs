//! Running transfers from the command line.
//!
//! Shared by every command that talks to the service: expands input paths,
//! drives a session to completion behind a progress bar, prints the result
//! and saves artifacts.

use anyhow::{Context as _, Result, bail};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use transfer::backend::DownloadTarget;
use transfer::backend::http::HttpBackend;
use transfer::{
    Backend, FileHandle, OperationMode, Phase, Service, Session, TransferOptions, TransferResult,
    TransferState,
};

use crate::Context;
use crate::progress::TransferBar;
use crate::ui;

/// Expand `paths` into input files. Directories are walked recursively.
pub fn collect_files(paths: &[PathBuf]) -> Result<Vec<FileHandle>> {
    let mut files = Vec::new();
    for path in paths {
        let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref());
        if expanded.is_dir() {
            for entry in WalkDir::new(&expanded).sort_by_file_name() {
                let entry = entry.with_context(|| format!("Could not walk {}", expanded.display()))?;
                if entry.file_type().is_file() {
                    files.push(FileHandle::from_path(entry.path())?);
                }
            }
        } else {
            files.push(
                FileHandle::from_path(&expanded)
                    .with_context(|| format!("Cannot read {}", path.display()))?,
            );
        }
    }
    log::debug!("collected {} input file(s)", files.len());
    Ok(files)
}

/// Session against the configured service.
pub fn session(ctx: &Context) -> Session<HttpBackend> {
    log::debug!("using service at {}", ctx.config.base_url);
    Session::with_config(ctx.config.backend(), ctx.config.session_config())
}

/// Run one operation to completion and return its final state.
///
/// Fails with the state's error message when the operation fails.
pub fn execute<B: Backend + 'static>(
    ctx: &Context,
    session: &mut Session<B>,
    mode: OperationMode,
    files: &[FileHandle],
    options: TransferOptions,
) -> Result<TransferState> {
    if !ctx.quiet && !ctx.json {
        let total: u64 = files.iter().map(FileHandle::size_bytes).sum();
        ui::info(&format!(
            "{} {} file(s), {}",
            mode.processing_label(),
            files.len(),
            ui::format_size(total)
        ));
    }

    session.start(mode, files, options)?;

    let mut bar = TransferBar::new(session.state(), ctx.quiet || ctx.json);
    let state = session.wait(&mut bar).clone();
    bar.finish();

    match state.phase {
        Phase::Complete => Ok(state),
        _ => bail!(
            "{}",
            state
                .error_message
                .as_deref()
                .unwrap_or(mode.failure_message())
        ),
    }
}

/// Print a finished result, then download it when `output` names a directory.
pub fn report<B: Backend + 'static>(
    ctx: &Context,
    session: &Session<B>,
    mode: OperationMode,
    result: &TransferResult,
    output: Option<&Path>,
) -> Result<()> {
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else if !ctx.quiet {
        ui::result_summary(result);
    }

    match output {
        Some(dir) => {
            for path in download_all(session, mode.service(), result, dir)? {
                if !ctx.json {
                    ui::success(&format!("Saved {}", path.display()));
                }
            }
        }
        None if !ctx.quiet && !ctx.json => {
            println!();
            ui::dim(&format!(
                "Download with: shrnk download {} --kind {}",
                result.session_id,
                mode.service()
            ));
        }
        None => {}
    }
    Ok(())
}

/// Download every artifact of `result` into `dir`.
///
/// Image results are fetched file by file; archive results are one file.
pub fn download_all<B: Backend + 'static>(
    session: &Session<B>,
    service: Service,
    result: &TransferResult,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    if service == Service::Image && !result.output_files.is_empty() {
        return result
            .output_files
            .iter()
            .map(|file| {
                let target = DownloadTarget::new(service, &result.session_id).path(&file.name);
                save_artifact(session, &target, dir, &file.name)
            })
            .collect();
    }

    let name = result
        .file_name
        .clone()
        .unwrap_or_else(|| default_artifact_name(&result.session_id));
    let target = DownloadTarget::new(service, &result.session_id);
    Ok(vec![save_artifact(session, &target, dir, &name)?])
}

/// Name used when the service does not report one.
pub fn default_artifact_name(session_id: &str) -> String {
    format!("{session_id}.zip")
}

/// Stream one artifact to `dir/name`.
pub fn save_artifact<B: Backend + 'static>(
    session: &Session<B>,
    target: &DownloadTarget,
    dir: &Path,
    name: &str,
) -> Result<PathBuf> {
    let file_name = Path::new(name)
        .file_name()
        .with_context(|| format!("Invalid artifact name '{name}'"))?;
    fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;

    let path = dir.join(file_name);
    // Staged next to the target; dropped (and removed) unless the download succeeds.
    let mut staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("Cannot create a file in {}", dir.display()))?;
    let written = {
        let mut writer = BufWriter::new(staged.as_file_mut());
        let written = session
            .download(target, &mut writer)
            .with_context(|| format!("Download of session {} failed", target.session_id))?;
        writer.flush()?;
        written
    };
    staged
        .persist(&path)
        .with_context(|| format!("Cannot write {}", path.display()))?;

    log::info!("downloaded {written} bytes to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use transfer::backend::MockReply;
    use transfer::{MockBackend, OutputFile};

    fn ctx() -> Context {
        Context {
            quiet: true,
            json: false,
            config: crate::config::Config::default(),
        }
    }

    #[test]
    fn test_collect_files_expands_directories() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("photos");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("b.jpg"), b"bb").unwrap();
        fs::write(dir.join("nested").join("a.jpg"), b"a").unwrap();
        let single = temp.path().join("notes.txt");
        fs::write(&single, b"notes").unwrap();

        let files = collect_files(&[dir, single]).unwrap();
        let names: Vec<&str> = files.iter().map(FileHandle::name).collect();
        assert_eq!(names, ["b.jpg", "a.jpg", "notes.txt"]);
    }

    #[test]
    fn test_collect_files_missing_path() {
        let temp = TempDir::new().unwrap();
        assert!(collect_files(&[temp.path().join("missing.txt")]).is_err());
    }

    #[test]
    fn test_execute_success() {
        let mock = MockBackend::new();
        mock.push_reply(OperationMode::CreateArchive, MockReply::artifact("s1"));
        let mut session = Session::new(mock);

        let files = [FileHandle::from_bytes("a.txt", b"hello".to_vec())];
        let state = execute(
            &ctx(),
            &mut session,
            OperationMode::CreateArchive,
            &files,
            TransferOptions::new(),
        )
        .unwrap();
        assert_eq!(state.result.unwrap().session_id, "s1");
    }

    #[test]
    fn test_execute_failure_carries_message() {
        let mock = MockBackend::new();
        mock.push_reply(
            OperationMode::ExtractAll,
            MockReply::status(400, Some("bad password")),
        );
        let mut session = Session::new(mock);

        let files = [FileHandle::from_bytes("a.zip", vec![0u8; 4])];
        let err = execute(
            &ctx(),
            &mut session,
            OperationMode::ExtractAll,
            &files,
            TransferOptions::new(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "bad password");
    }

    #[test]
    fn test_execute_validation_error() {
        let mut session = Session::new(MockBackend::new());
        let err = execute(
            &ctx(),
            &mut session,
            OperationMode::StripMetadataOnly,
            &[],
            TransferOptions::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no files selected"));
        assert!(session.backend().submitted().is_empty());
    }

    #[test]
    fn test_download_archive_artifact() {
        let mock = MockBackend::new();
        mock.add_artifact("s1", b"PK".to_vec());
        let session = Session::new(mock);
        let temp = TempDir::new().unwrap();

        let result = TransferResult {
            session_id: "s1".to_string(),
            file_name: Some("archive.zip".to_string()),
            total_files: None,
            size_bytes: None,
            output_files: Vec::new(),
        };
        let saved = download_all(&session, Service::Archive, &result, temp.path()).unwrap();
        assert_eq!(saved, [temp.path().join("archive.zip")]);
        assert_eq!(fs::read(&saved[0]).unwrap(), b"PK");
    }

    #[test]
    fn test_download_image_outputs() {
        let mock = MockBackend::new();
        mock.add_artifact("s2", b"img".to_vec());
        let session = Session::new(mock);
        let temp = TempDir::new().unwrap();

        let result = TransferResult {
            session_id: "s2".to_string(),
            file_name: None,
            total_files: Some(2),
            size_bytes: None,
            output_files: vec![
                OutputFile {
                    name: "a.png".to_string(),
                    size_bytes: 3,
                },
                OutputFile {
                    name: "b.png".to_string(),
                    size_bytes: 3,
                },
            ],
        };
        let saved = download_all(&session, Service::Image, &result, temp.path()).unwrap();
        assert_eq!(saved.len(), 2);
        assert!(temp.path().join("b.png").exists());
    }

    #[test]
    fn test_artifact_name_is_sanitized() {
        let mock = MockBackend::new();
        mock.add_artifact("s3", b"x".to_vec());
        let session = Session::new(mock);
        let temp = TempDir::new().unwrap();

        let target = DownloadTarget::new(Service::Archive, "s3");
        let saved = save_artifact(&session, &target, temp.path(), "../../escape.zip").unwrap();
        assert_eq!(saved, temp.path().join("escape.zip"));
    }

    #[test]
    fn test_failed_download_leaves_no_file() {
        let session = Session::new(MockBackend::new());
        let temp = TempDir::new().unwrap();

        let target = DownloadTarget::new(Service::Archive, "bad-id");
        assert!(save_artifact(&session, &target, temp.path(), "bad-id.zip").is_err());
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_default_artifact_name() {
        assert_eq!(default_artifact_name("abc"), "abc.zip");
    }
}
