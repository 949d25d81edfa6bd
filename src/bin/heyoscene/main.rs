//! Scene editing CLI
//!
//! Edits a scene on the remote store through the same engine the editor UI
//! uses. History is kept in a state directory, so `undo` and `redo` work
//! across invocations.
//!
//! Usage:
//!   heyoscene --base-url https://api.heyo.com --token "..." <SCENE_ID> <COMMAND>

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use heyoscene::{
    ApplyOutcome, EditorConfig, FileStorage, HttpSceneStore, LineValues, Scene, SceneEditor,
    SceneField,
};

#[derive(Parser)]
#[command(
    name = "heyoscene",
    about = "Edit two-character rehearsal scenes with undo/redo",
    version
)]
struct Args {
    /// Scene store base URL (or set HEYOSCENE_BASE_URL)
    #[arg(short = 'b', long)]
    base_url: Option<String>,

    /// Auth token (or set HEYOSCENE_TOKEN)
    #[arg(short = 't', long)]
    token: Option<String>,

    /// Directory holding per-scene history and settings
    #[arg(long, default_value = ".heyoscene")]
    state_dir: PathBuf,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Scene to operate on
    scene_id: i64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the scene and its lines
    Show,
    /// Set a scene field (title, play_title, play_author, description,
    /// character_1_name, character_2_name, setting, context_before, context_after)
    SetField {
        field: String,
        /// New value; omit to clear
        value: Option<String>,
    },
    /// Rename a character and every line they speak
    RenameCharacter { from: String, to: String },
    /// Replace a line's text (and optionally speaker or stage direction)
    EditLine {
        line_id: i64,
        text: String,
        #[arg(long)]
        character: Option<String>,
        #[arg(long)]
        stage_direction: Option<String>,
    },
    /// Add a line after another (first when --after is omitted)
    AddLine {
        character: String,
        text: String,
        #[arg(long)]
        after: Option<i64>,
    },
    /// Delete a line
    DeleteLine { line_id: i64 },
    /// Reorder lines; pass every line ID in the new order
    Reorder {
        #[arg(required = true)]
        line_ids: Vec<i64>,
    },
    /// Undo the last change
    Undo,
    /// Redo the last undone change
    Redo,
    /// Restore the scene's original content
    Reset,
    /// List undo and redo entries
    History,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "heyoscene=debug" } else { "heyoscene=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = EditorConfig::from_env();
    if args.base_url.is_some() {
        config.base_url = args.base_url.clone();
    }
    if args.token.is_some() {
        config.token = args.token.clone();
    }
    let base_url = config
        .base_url
        .clone()
        .context("Base URL is required. Use --base-url or set HEYOSCENE_BASE_URL.")?;

    let store = Arc::new(HttpSceneStore::new(&base_url, config.token.as_deref())?);
    let storage = Arc::new(
        FileStorage::new(&args.state_dir)
            .with_context(|| format!("opening state dir {}", args.state_dir.display()))?,
    );
    let editor = SceneEditor::open(store, args.scene_id, storage, &config).await?;

    match args.command {
        Command::Show => print_scene(&editor.scene()?),
        Command::SetField { field, value } => {
            let field = SceneField::from_key(&field)
                .with_context(|| format!("unknown field '{}'", field))?;
            report_change(editor.save_field(field, value).await?);
        }
        Command::RenameCharacter { from, to } => {
            report_change(editor.rename_character(&from, &to).await?);
        }
        Command::EditLine {
            line_id,
            text,
            character,
            stage_direction,
        } => {
            editor.start_edit(line_id).await?;
            let mut values = editor
                .active_edit()
                .map(|entry| entry.draft)
                .context("line edit did not open")?;
            values.text = text;
            if let Some(character) = character {
                values.character_name = character;
            }
            if stage_direction.is_some() {
                values.stage_direction = stage_direction;
            }
            editor.update_draft(values)?;
            println!("{:?}", editor.commit_if_dirty().await?);
        }
        Command::AddLine {
            character,
            text,
            after,
        } => {
            let id = editor.add_line(after, LineValues::new(character, text)).await?;
            println!("Added line {}", id);
        }
        Command::DeleteLine { line_id } => {
            editor.delete_line(line_id).await?;
            println!("Deleted line {}", line_id);
        }
        Command::Reorder { line_ids } => report_change(editor.reorder_lines(line_ids).await?),
        Command::Undo => report_outcome(editor.undo().await?),
        Command::Redo => report_outcome(editor.redo().await?),
        Command::Reset => match editor.reset_to_original().await? {
            ApplyOutcome::Nothing => println!("No original differs from the current scene"),
            outcome => report_outcome(outcome),
        },
        Command::History => {
            let stack = editor.history().snapshot();
            println!("Undo ({}):", stack.undo_len());
            let undo: Vec<_> = stack.undo_entries().collect();
            for entry in undo.into_iter().rev() {
                println!("  {}", entry.kind());
            }
            println!("Redo ({}):", stack.redo_len());
            let redo: Vec<_> = stack.redo_entries().collect();
            for entry in redo.into_iter().rev() {
                println!("  {}", entry.kind());
            }
        }
    }

    for notice in editor.notices().take_all() {
        eprintln!("{:?}: {}", notice.level, notice.message);
    }
    Ok(())
}

fn print_scene(scene: &Scene) {
    println!(
        "Scene {}: {}",
        scene.id,
        scene.title.as_deref().unwrap_or("(untitled)")
    );
    if let Some(play) = &scene.play_title {
        println!(
            "  from {}{}",
            play,
            scene
                .play_author
                .as_deref()
                .map(|a| format!(" by {}", a))
                .unwrap_or_default()
        );
    }
    println!(
        "  characters: {} / {}",
        scene.character_1_name, scene.character_2_name
    );
    if let Some(setting) = &scene.setting {
        println!("  setting: {}", setting);
    }
    println!("  {} lines", scene.line_count);
    for line in &scene.lines {
        let direction = line
            .stage_direction
            .as_deref()
            .map(|d| format!(" ({})", d))
            .unwrap_or_default();
        println!(
            "  [{:>4}] {}{}: {}",
            line.id, line.character_name, direction, line.text
        );
    }
}

fn report_change(changed: bool) {
    if changed {
        println!("Saved");
    } else {
        println!("No change");
    }
}

fn report_outcome(outcome: ApplyOutcome) {
    match outcome {
        ApplyOutcome::Applied => println!("Done"),
        ApplyOutcome::Nothing => println!("Nothing to do"),
        ApplyOutcome::Busy => println!("Another change is in progress"),
        ApplyOutcome::Resynced => println!("Store rejected the change; scene reloaded"),
        ApplyOutcome::Dropped => println!("Line no longer exists; entry dropped"),
        ApplyOutcome::Partial { failed } => println!("Done with {} failed write(s)", failed),
    }
}
