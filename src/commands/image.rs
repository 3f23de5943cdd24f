use anyhow::{Result, bail};
use std::path::Path;

use transfer::{Backend, FileHandle, OperationMode, Session, TransferOptions};

use crate::Context;
use crate::cli::{ResizeArgs, StripArgs};
use crate::runner;

pub fn resize(ctx: &Context, args: ResizeArgs) -> Result<()> {
    let files = runner::collect_files(&args.images)?;
    let options = TransferOptions::new()
        .resize(ctx.config.resize_option(args.resize.as_deref())?)
        .strip_metadata(args.strip_metadata || ctx.config.defaults.strip_metadata);

    let mut session = runner::session(ctx);
    process(
        ctx,
        &mut session,
        OperationMode::ResizeImages,
        &files,
        options,
        args.output.output.as_deref(),
    )
}

pub fn strip(ctx: &Context, args: StripArgs) -> Result<()> {
    let files = runner::collect_files(&args.images)?;
    let mut session = runner::session(ctx);
    process(
        ctx,
        &mut session,
        OperationMode::StripMetadataOnly,
        &files,
        TransferOptions::new(),
        args.output.output.as_deref(),
    )
}

fn process<B: Backend + 'static>(
    ctx: &Context,
    session: &mut Session<B>,
    mode: OperationMode,
    files: &[FileHandle],
    options: TransferOptions,
    output: Option<&Path>,
) -> Result<()> {
    let state = runner::execute(ctx, session, mode, files, options)?;
    let Some(result) = &state.result else {
        bail!("{mode} finished without a result");
    };
    runner::report(ctx, session, mode, result, ctx.config.output_dir(output).as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;
    use transfer::backend::MockReply;
    use transfer::{MockBackend, OutputFile, ResizeOption, TransferResult};

    fn ctx() -> Context {
        Context {
            quiet: true,
            json: false,
            config: Config::default(),
        }
    }

    fn images() -> Vec<FileHandle> {
        vec![
            FileHandle::from_bytes("a.jpg", vec![1u8; 16]),
            FileHandle::from_bytes("b.png", vec![2u8; 8]),
        ]
    }

    #[test]
    fn test_resize_downloads_each_output() {
        let mock = MockBackend::new();
        mock.push_reply(
            OperationMode::ResizeImages,
            MockReply::Artifact(TransferResult {
                session_id: "img".to_string(),
                file_name: None,
                total_files: Some(2),
                size_bytes: None,
                output_files: vec![
                    OutputFile {
                        name: "a.jpg".to_string(),
                        size_bytes: 4,
                    },
                    OutputFile {
                        name: "b.png".to_string(),
                        size_bytes: 4,
                    },
                ],
            }),
        );
        mock.add_artifact("img", b"data".to_vec());
        let mut session = Session::new(mock);
        let temp = TempDir::new().unwrap();

        process(
            &ctx(),
            &mut session,
            OperationMode::ResizeImages,
            &images(),
            TransferOptions::new().resize(ResizeOption::Percent(50)),
            Some(temp.path()),
        )
        .unwrap();

        assert!(temp.path().join("a.jpg").exists());
        assert!(temp.path().join("b.png").exists());
        let sent = &session.backend().submitted()[0];
        assert_eq!(sent.file_names, ["a.jpg", "b.png"]);
        assert!(
            sent.text_fields
                .contains(&("resizeOption".to_string(), "50".to_string()))
        );
    }

    #[test]
    fn test_resize_requires_option() {
        let mut session = Session::new(MockBackend::new());
        let err = process(
            &ctx(),
            &mut session,
            OperationMode::ResizeImages,
            &images(),
            TransferOptions::new(),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("resize"));
        assert!(session.backend().submitted().is_empty());
    }

    #[test]
    fn test_strip_sends_files_only() {
        let mut session = Session::new(MockBackend::new());
        process(
            &ctx(),
            &mut session,
            OperationMode::StripMetadataOnly,
            &images(),
            TransferOptions::new().password("ignored"),
            None,
        )
        .unwrap();

        let sent = &session.backend().submitted()[0];
        assert_eq!(sent.mode, OperationMode::StripMetadataOnly);
        assert!(sent.text_fields.is_empty());
    }
}
