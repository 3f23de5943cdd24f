use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use dialoguer::MultiSelect;
use std::path::Path;

use transfer::{Backend, FileHandle, OperationMode, Session, TransferOptions};

use crate::Context;
use crate::cli::{PasswordArgs, PeekArgs, UnzipArgs, ZipArgs};
use crate::runner;
use crate::tree_view;
use crate::ui;

fn password_options(args: &PasswordArgs) -> TransferOptions {
    match &args.password {
        Some(pw) => TransferOptions::new().password(pw.clone()),
        None => TransferOptions::new(),
    }
}

fn open_archive(path: &Path) -> Result<FileHandle> {
    FileHandle::from_path(path).with_context(|| format!("Cannot read archive {}", path.display()))
}

// ============================================================================
// Zip / Unzip
// ============================================================================

pub fn zip(ctx: &Context, args: ZipArgs) -> Result<()> {
    let files = runner::collect_files(&args.paths)?;
    let options = password_options(&args.password)
        .resize(ctx.config.resize_option(args.resize.as_deref())?)
        .strip_metadata(args.strip_metadata || ctx.config.defaults.strip_metadata);

    let mut session = runner::session(ctx);
    let mode = OperationMode::CreateArchive;
    let state = runner::execute(ctx, &mut session, mode, &files, options)?;
    finish(ctx, &session, mode, &state, args.output.output.as_deref())
}

pub fn unzip(ctx: &Context, args: UnzipArgs) -> Result<()> {
    let archive = open_archive(&args.archive)?;
    let mut session = runner::session(ctx);
    let mode = OperationMode::ExtractAll;
    let state = runner::execute(
        ctx,
        &mut session,
        mode,
        &[archive],
        password_options(&args.password),
    )?;
    finish(ctx, &session, mode, &state, args.output.output.as_deref())
}

fn finish<B: Backend + 'static>(
    ctx: &Context,
    session: &Session<B>,
    mode: OperationMode,
    state: &transfer::TransferState,
    output: Option<&Path>,
) -> Result<()> {
    let Some(result) = &state.result else {
        bail!("{mode} finished without a result");
    };
    runner::report(ctx, session, mode, result, ctx.config.output_dir(output).as_deref())
}

// ============================================================================
// Peek
// ============================================================================

pub fn peek(ctx: &Context, args: PeekArgs) -> Result<()> {
    let archive = open_archive(&args.archive)?;
    let mut session = runner::session(ctx);
    runner::execute(
        ctx,
        &mut session,
        OperationMode::Peek,
        std::slice::from_ref(&archive),
        password_options(&args.password),
    )?;
    browse(ctx, &mut session, &archive, &args)
}

/// Show the listing, apply the requested selection and optionally extract it.
fn browse<B: Backend + 'static>(
    ctx: &Context,
    session: &mut Session<B>,
    archive: &FileHandle,
    args: &PeekArgs,
) -> Result<()> {
    if session.tree().is_empty() {
        ui::info("The archive is empty.");
        return Ok(());
    }

    if !args.collapsed {
        session.expand_all();
    }
    if args.all {
        session.select_all();
    }
    for path in &args.select {
        let path = path.trim_matches('/');
        if !session.selection().is_selected(path) {
            session.toggle_select(path)?;
        }
    }
    if args.interactive {
        pick(session)?;
    }

    if ctx.json {
        if let Some(entries) = &session.state().entries {
            println!("{}", serde_json::to_string_pretty(entries)?);
        }
    } else if !ctx.quiet {
        ui::header(archive.name());
        tree_view::print(session.tree(), session.selection());
        println!();
        ui::dim(&format!(
            "{} files, {} selected",
            session.tree().leaf_count(),
            session.selection().selected_count()
        ));
    }

    if !args.extract {
        return Ok(());
    }
    if session.selection().selected_count() == 0 {
        bail!("Nothing selected. Use --select, --all or --interactive to choose entries.");
    }

    let mode = OperationMode::ExtractSelected;
    let options =
        password_options(&args.password).selected_paths(session.selection().selected().to_vec());
    let state = runner::execute(ctx, session, mode, std::slice::from_ref(archive), options)?;
    finish(ctx, session, mode, &state, args.output.output.as_deref())
}

/// Let the user pick files from the listing.
fn pick<B: Backend + 'static>(session: &mut Session<B>) -> Result<()> {
    if !console::Term::stdout().is_term() {
        bail!("--interactive needs a terminal");
    }

    let leaves = session.tree().leaf_paths();
    let labels: Vec<String> = leaves
        .iter()
        .map(|path| {
            let size = session.tree().get(path).map_or(0, |n| n.size_bytes());
            format!(
                "{} {}",
                ui::truncate_name(path, 60),
                ui::format_size(size).dimmed()
            )
        })
        .collect();
    let defaults: Vec<bool> = leaves
        .iter()
        .map(|p| session.selection().is_selected(p))
        .collect();

    let chosen = MultiSelect::new()
        .with_prompt("Select files (space to toggle, enter to confirm)")
        .items(&labels)
        .defaults(&defaults)
        .interact()?;

    session.select_none();
    for index in chosen {
        if let Some(path) = leaves.get(index) {
            session.toggle_select(path)?;
        }
    }
    Ok(())
}
