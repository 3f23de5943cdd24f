use anyhow::Result;
use std::path::{Path, PathBuf};

use transfer::backend::DownloadTarget;
use transfer::{Backend, Service, Session};

use crate::Context;
use crate::cli::{ArtifactKind, DownloadArgs};
use crate::runner;
use crate::ui;

impl From<ArtifactKind> for Service {
    fn from(kind: ArtifactKind) -> Self {
        match kind {
            ArtifactKind::Archive => Service::Archive,
            ArtifactKind::Image => Service::Image,
        }
    }
}

pub fn run(ctx: &Context, args: DownloadArgs) -> Result<()> {
    let dir = ctx
        .config
        .output_dir(args.output.as_deref())
        .unwrap_or_else(|| PathBuf::from("."));
    let session = runner::session(ctx);
    let saved = fetch(&session, &args, &dir)?;

    if ctx.json {
        println!("{}", serde_json::json!({ "path": saved }));
    } else {
        ui::success(&format!("Saved {}", saved.display()));
    }
    Ok(())
}

fn fetch<B: Backend + 'static>(
    session: &Session<B>,
    args: &DownloadArgs,
    dir: &Path,
) -> Result<PathBuf> {
    let service = Service::from(args.kind);
    let mut target = DownloadTarget::new(service, &args.session_id);

    let name = match &args.path {
        Some(path) => {
            if service == Service::Archive {
                ui::warn("--path is only honoured by the image service");
            }
            target = target.path(path);
            path.clone()
        }
        None => runner::default_artifact_name(&args.session_id),
    };

    runner::save_artifact(session, &target, dir, &name)
}
