mod common;

use std::time::Duration;

use common::{open_editor, sample_scene, Call};
use heyoscene::{
    ApplyOutcome, Focus, HistoryEntry, KeyInput, LineValues, NoticeLevel, Scene, SceneField,
    VoiceMap,
};

/// Scene content with line IDs left out.
fn content(scene: &Scene) -> (Vec<Option<String>>, Vec<LineValues>) {
    let fields = SceneField::ALL.iter().map(|f| scene.field(*f)).collect();
    let lines = scene.lines.iter().map(|l| l.values()).collect();
    (fields, lines)
}

async fn edit_line(editor: &heyoscene::SceneEditor, line_id: i64, values: LineValues) {
    editor.start_edit(line_id).await.unwrap();
    editor.update_draft(values).unwrap();
    editor.commit_if_dirty().await.unwrap();
}

// =============================================================================
// ROUND TRIPS
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_every_entry_kind_round_trips() {
    let (store, editor) = open_editor(sample_scene(4));
    let initial = editor.scene().unwrap();

    editor
        .save_field(SceneField::Description, Some("Late at night".into()))
        .await
        .unwrap();
    edit_line(&editor, 2, LineValues::new("ALEX", "Changed")).await;
    editor.reorder_lines(vec![4, 3, 2, 1]).await.unwrap();
    let added = editor
        .add_line(Some(3), LineValues::new("SAM", "Added"))
        .await
        .unwrap();
    editor.delete_line(1).await.unwrap();
    editor.set_voices(VoiceMap::new("alloy", "echo"));
    editor.set_selected_character(Some("SAM".into())).unwrap();

    let kinds: Vec<&str> = editor
        .history()
        .snapshot()
        .undo_entries()
        .map(|e| e.kind())
        .collect();
    assert_eq!(
        kinds,
        vec![
            "scene_field",
            "line",
            "reorder",
            "add_line",
            "delete_line",
            "voice",
            "selected_character"
        ]
    );
    assert!(editor.scene().unwrap().line(added).is_some());

    for _ in 0..7 {
        assert_eq!(editor.undo().await.unwrap(), ApplyOutcome::Applied);
    }
    assert_eq!(editor.undo().await.unwrap(), ApplyOutcome::Nothing);

    let restored = editor.scene().unwrap();
    assert_eq!(content(&restored), content(&initial));
    assert_eq!(content(&store.server_scene()), content(&initial));
    assert_eq!(editor.voices(), VoiceMap::default());
    assert_eq!(editor.selected_character(), None);
}

#[tokio::test(start_paused = true)]
async fn test_undo_all_then_redo_all() {
    let (store, editor) = open_editor(sample_scene(5));
    let initial = content(&editor.scene().unwrap());

    editor
        .save_field(SceneField::Title, Some("Garden".into()))
        .await
        .unwrap();
    edit_line(&editor, 3, LineValues::new("SAM", "Three")).await;
    editor.add_line(None, LineValues::new("ALEX", "Opening")).await.unwrap();
    let mut reversed = editor.scene().unwrap().line_ids();
    reversed.reverse();
    editor.reorder_lines(reversed).await.unwrap();
    editor.delete_line(5).await.unwrap();
    let edited = content(&editor.scene().unwrap());

    let n = editor.history().undo_len();
    assert_eq!(n, 5);
    for _ in 0..n {
        editor.undo().await.unwrap();
    }
    assert_eq!(content(&editor.scene().unwrap()), initial);
    assert_eq!(editor.history().redo_len(), n);

    for _ in 0..n {
        assert_eq!(editor.redo().await.unwrap(), ApplyOutcome::Applied);
    }
    assert_eq!(content(&editor.scene().unwrap()), edited);
    assert_eq!(content(&store.server_scene()), edited);
    assert_eq!(editor.redo().await.unwrap(), ApplyOutcome::Nothing);
}

#[tokio::test(start_paused = true)]
async fn test_undo_after_two_edit_cycles_restores_first_cycle() {
    let (store, editor) = open_editor(sample_scene(3));
    edit_line(&editor, 1, LineValues::new("SAM", "First")).await;
    edit_line(&editor, 1, LineValues::new("SAM", "Second")).await;

    editor.undo().await.unwrap();
    assert_eq!(editor.line(1).unwrap().unwrap().text, "First");
    assert_eq!(store.server_scene().line(1).unwrap().text, "First");
}

#[tokio::test(start_paused = true)]
async fn test_new_action_clears_redo() {
    let (_store, editor) = open_editor(sample_scene(3));
    edit_line(&editor, 1, LineValues::new("SAM", "First")).await;
    editor.undo().await.unwrap();
    assert!(editor.can_redo());

    edit_line(&editor, 2, LineValues::new("ALEX", "Other")).await;
    assert!(!editor.can_redo());
    assert_eq!(editor.history().undo_len(), 1);
}

// =============================================================================
// LINE IDENTITY
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_deleted_line_comes_back_under_new_id() {
    let mut scene = sample_scene(8);
    scene.line_mut(7).unwrap().text = "Hello".into();
    let (store, editor) = open_editor(scene);

    edit_line(&editor, 7, LineValues::new("SAM", "Hi")).await;
    editor.delete_line(7).await.unwrap();
    assert!(editor.line(7).unwrap().is_none());

    assert_eq!(editor.undo().await.unwrap(), ApplyOutcome::Applied);
    let scene = editor.scene().unwrap();
    let restored = &scene.lines[6];
    assert_ne!(restored.id, 7);
    assert!(restored.id > 0);
    assert_eq!(restored.values(), LineValues::new("SAM", "Hi"));
    assert_eq!(scene.predecessor_of(restored.id), Some(6));
    let new_id = restored.id;

    let calls = store.writes();
    assert!(matches!(
        calls.last(),
        Some(Call::CreateLine(line)) if line.insert_after_line_id == Some(6) && line.text == "Hi"
    ));

    // The older line edit now points at the re-created line.
    assert_eq!(editor.undo().await.unwrap(), ApplyOutcome::Applied);
    assert_eq!(editor.line(new_id).unwrap().unwrap().text, "Hello");
    assert_eq!(store.server_scene().line(new_id).unwrap().text, "Hello");
    assert_eq!(
        store.writes().last(),
        Some(&Call::PatchLine(new_id, LineValues::new("SAM", "Hello")))
    );

    // Redo both: the edit and then the delete hit the new ID too.
    editor.redo().await.unwrap();
    editor.redo().await.unwrap();
    assert_eq!(store.writes().last(), Some(&Call::DeleteLine(new_id)));
    assert!(store.server_scene().line(new_id).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_added_line_undo_redo_tracks_new_id() {
    let (store, editor) = open_editor(sample_scene(3));
    let first = editor
        .add_line(Some(1), LineValues::new("ALEX", "Inserted"))
        .await
        .unwrap();

    editor.undo().await.unwrap();
    assert!(store.server_scene().line(first).is_none());

    editor.redo().await.unwrap();
    let scene = editor.scene().unwrap();
    assert_eq!(scene.lines[1].text, "Inserted");
    let second = scene.lines[1].id;
    assert_ne!(second, first);

    editor.undo().await.unwrap();
    assert_eq!(store.writes().last(), Some(&Call::DeleteLine(second)));
    assert_eq!(editor.scene().unwrap().line_ids(), vec![1, 2, 3]);
}

// =============================================================================
// FAILURES
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_remote_failure_resyncs_from_store() {
    let (store, editor) = open_editor(sample_scene(3));
    editor
        .save_field(SceneField::Title, Some("Garden".into()))
        .await
        .unwrap();
    store.fail("patch_scene", 500);

    assert_eq!(editor.undo().await.unwrap(), ApplyOutcome::Resynced);
    assert_eq!(editor.scene().unwrap().title.as_deref(), Some("Garden"));
    assert!(store.calls().iter().any(|c| c.is_fetch()));
    assert_eq!(editor.notices().take_all()[0].level, NoticeLevel::Error);
    assert_eq!(editor.history().redo_len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_entry_for_vanished_line_is_dropped() {
    let (store, editor) = open_editor(sample_scene(3));
    edit_line(&editor, 2, LineValues::new("ALEX", "Edited")).await;
    store.mutate_server(|scene| {
        scene.remove_line(2);
    });

    assert_eq!(editor.undo().await.unwrap(), ApplyOutcome::Dropped);
    assert_eq!(editor.history().undo_len(), 0);
    assert_eq!(editor.history().redo_len(), 0);
    assert_eq!(editor.scene().unwrap().line_ids(), vec![1, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_recreate_drops_placeholder() {
    let (store, editor) = open_editor(sample_scene(3));
    editor.delete_line(2).await.unwrap();
    store.fail("create_line", 500);

    assert_eq!(editor.undo().await.unwrap(), ApplyOutcome::Resynced);
    let scene = editor.scene().unwrap();
    assert_eq!(scene.line_ids(), vec![1, 3]);
    assert!(scene.lines.iter().all(|l| l.id > 0));
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_undo_is_refused() {
    let (store, editor) = open_editor(sample_scene(3));
    edit_line(&editor, 1, LineValues::new("SAM", "One")).await;
    edit_line(&editor, 2, LineValues::new("ALEX", "Two")).await;
    store.set_latency(Duration::from_millis(200));

    let (first, second) = tokio::join!(editor.undo(), editor.undo());
    assert_eq!(first.unwrap(), ApplyOutcome::Applied);
    assert_eq!(second.unwrap(), ApplyOutcome::Busy);
    assert_eq!(editor.history().undo_len(), 1);
    assert!(!editor.engine().is_applying());
}

// =============================================================================
// SHORTCUTS
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_shortcuts_ignored_in_text_inputs() {
    let (_store, editor) = open_editor(sample_scene(3));
    edit_line(&editor, 1, LineValues::new("SAM", "One")).await;

    let undo = KeyInput::new('z').ctrl();
    assert_eq!(
        editor.handle_shortcut(undo, Focus::TextInput).await.unwrap(),
        None
    );
    assert_eq!(editor.history().undo_len(), 1);

    assert_eq!(
        editor.handle_shortcut(undo, Focus::Elsewhere).await.unwrap(),
        Some(ApplyOutcome::Applied)
    );
    let redo = KeyInput::new('z').meta().shift();
    assert_eq!(
        editor.handle_shortcut(redo, Focus::Elsewhere).await.unwrap(),
        Some(ApplyOutcome::Applied)
    );
    assert_eq!(editor.line(1).unwrap().unwrap().text, "One");
}

// =============================================================================
// OPEN DRAFT
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_undo_commits_open_draft_before_replaying() {
    let (store, editor) = open_editor(sample_scene(3));
    editor
        .save_field(SceneField::Character1Name, Some("SAMUEL".into()))
        .await
        .unwrap();
    editor.start_edit(1).await.unwrap();
    editor
        .update_draft(LineValues::new("SAMUEL", "Changed text"))
        .unwrap();

    // The draft lands as its own entry, so it is what the first undo reverts.
    assert_eq!(editor.undo().await.unwrap(), ApplyOutcome::Applied);
    assert!(editor.active_edit().is_none());
    assert_eq!(
        editor.line(1).unwrap().unwrap().values(),
        LineValues::new("SAMUEL", "Line 1")
    );
    assert_eq!(editor.history().redo_len(), 1);

    assert_eq!(editor.undo().await.unwrap(), ApplyOutcome::Applied);
    let scene = editor.scene().unwrap();
    assert_eq!(scene.character_1_name, "SAM");
    assert!(scene.lines.iter().all(|l| scene.has_character(&l.character_name)));
    let server = store.server_scene();
    assert!(server.lines.iter().all(|l| server.has_character(&l.character_name)));

    drop(editor);
    assert!(!store.calls().iter().any(|c| matches!(c, Call::Keepalive(..))));
}

#[tokio::test(start_paused = true)]
async fn test_edit_after_undo_records_restored_values() {
    let (store, editor) = open_editor(sample_scene(3));
    edit_line(&editor, 1, LineValues::new("SAM", "First")).await;
    editor.start_edit(1).await.unwrap();

    editor.undo().await.unwrap();
    assert!(editor.active_edit().is_none());
    assert_eq!(editor.line(1).unwrap().unwrap().text, "Line 1");

    edit_line(&editor, 1, LineValues::new("SAM", "X")).await;
    editor.undo().await.unwrap();
    assert_eq!(editor.line(1).unwrap().unwrap().text, "Line 1");
    assert_eq!(store.server_scene().line(1).unwrap().text, "Line 1");
}

#[tokio::test(start_paused = true)]
async fn test_undo_add_line_closes_draft_on_it() {
    let (store, editor) = open_editor(sample_scene(2));
    let id = editor
        .add_line(None, LineValues::new("ALEX", "Fresh"))
        .await
        .unwrap();
    editor.start_edit(id).await.unwrap();

    assert_eq!(editor.undo().await.unwrap(), ApplyOutcome::Applied);
    assert!(editor.active_edit().is_none());
    assert!(editor.line(id).unwrap().is_none());
    assert_eq!(store.writes().last(), Some(&Call::DeleteLine(id)));
    assert!(!editor.before_unload());
}

// =============================================================================
// RESET
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_reset_replays_session_original() {
    let (store, editor) = open_editor(sample_scene(4));
    let original = content(&editor.scene().unwrap());

    editor
        .save_field(SceneField::Setting, Some("Rooftop".into()))
        .await
        .unwrap();
    edit_line(&editor, 1, LineValues::new("SAM", "Changed")).await;
    editor.delete_line(3).await.unwrap();
    editor.add_line(Some(4), LineValues::new("ALEX", "Extra")).await.unwrap();
    let before_reset = content(&editor.scene().unwrap());

    assert_eq!(editor.reset_to_original().await.unwrap(), ApplyOutcome::Applied);
    assert_eq!(content(&editor.scene().unwrap()), original);
    assert_eq!(content(&store.server_scene()), original);
    assert_eq!(editor.notices().take_all()[0].level, NoticeLevel::Info);

    let top = editor.history().snapshot();
    assert_eq!(top.undo_entries().last().map(|e| e.kind()), Some("reset"));

    assert_eq!(editor.undo().await.unwrap(), ApplyOutcome::Applied);
    assert_eq!(content(&editor.scene().unwrap()), before_reset);
    assert_eq!(content(&store.server_scene()), before_reset);
}

#[tokio::test(start_paused = true)]
async fn test_reset_prefers_server_original() {
    let scene = sample_scene(3);
    let mut pristine = scene.clone();
    pristine.line_mut(2).unwrap().text = "Server original".into();
    let (store, editor) = open_editor(scene);
    let store = store.with_original(pristine.clone());

    edit_line(&editor, 1, LineValues::new("SAM", "Changed")).await;
    store.clear_calls();

    editor.reset_to_original().await.unwrap();
    assert_eq!(store.writes(), vec![Call::Reset]);
    assert_eq!(content(&editor.scene().unwrap()), content(&pristine));
}

#[tokio::test(start_paused = true)]
async fn test_partial_reset_is_reported() {
    let (store, editor) = open_editor(sample_scene(3));
    edit_line(&editor, 1, LineValues::new("SAM", "Changed")).await;
    edit_line(&editor, 2, LineValues::new("ALEX", "Changed too")).await;
    store.fail("patch_line", 500);

    let outcome = editor.reset_to_original().await.unwrap();
    assert_eq!(outcome, ApplyOutcome::Partial { failed: 2 });
    assert_eq!(editor.line(1).unwrap().unwrap().text, "Line 1");
    let levels: Vec<_> = editor
        .notices()
        .take_all()
        .into_iter()
        .map(|n| n.level)
        .collect();
    assert_eq!(levels, vec![NoticeLevel::Error, NoticeLevel::Info]);
    assert!(matches!(
        editor.history().snapshot().undo_entries().last(),
        Some(HistoryEntry::Reset { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_reset_of_unchanged_scene_records_nothing() {
    let (store, editor) = open_editor(sample_scene(3));

    assert_eq!(editor.reset_to_original().await.unwrap(), ApplyOutcome::Nothing);
    assert_eq!(store.writes(), vec![Call::Reset]);
    assert_eq!(editor.history().undo_len(), 0);
    let notices = editor.notices().take_all();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Info);
}
