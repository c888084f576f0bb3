//! Inline (step-coordinate) editing through the public transaction surface.

use carbon_core::pin::steps::{leaves_of, total_steps};
use carbon_core::{
    baseline_schema, ContentJson, Editor, NodeId, NodeJson, Origin, Pin, Point, Transaction,
};
use pretty_assertions::assert_eq;

fn editor_with_title(leaves: Vec<NodeJson>) -> (Editor, NodeId) {
    let _ = env_logger::builder().is_test(true).try_init();
    let doc = NodeJson::named("doc").with_children(vec![NodeJson::named("section")
        .with_children(vec![NodeJson::named("title").with_children(leaves)])]);
    let editor = Editor::new(baseline_schema().unwrap(), &doc).unwrap();
    let title_type = editor.schema().type_id("title").unwrap();
    let nodes = editor.state().nodes();
    let title = nodes
        .ids()
        .find(|&id| nodes.get(id).unwrap().type_id == title_type)
        .unwrap();
    (editor, title)
}

#[test]
fn atoms_count_as_one_step() {
    let (editor, title) = editor_with_title(vec![
        NodeJson::text_run("text", "ab"),
        NodeJson::named("emoji"),
        NodeJson::text_run("text", "cd"),
    ]);
    let nodes = editor.state().nodes();

    assert_eq!(total_steps(nodes, editor.schema(), title).unwrap(), 5);
    let leaves = leaves_of(nodes, editor.schema(), title).unwrap();
    assert_eq!(leaves.len(), 3);
    assert_eq!(leaves[1].size, 1);
    assert!(!leaves[1].is_text);

    // Position 4 is one step into the trailing run.
    let pin = Pin::at_step(title, 4, nodes, editor.schema()).unwrap();
    assert_eq!(pin.node, leaves[2].id);
    assert_eq!(pin.offset, 1);

    // Negative addressing reaches the same position from the end.
    let from_end = Pin::at_step(title, -2, nodes, editor.schema()).unwrap();
    assert_eq!(from_end, pin);
}

#[test]
fn boundary_pins_attach_to_the_earlier_leaf() {
    let (editor, title) = editor_with_title(vec![
        NodeJson::text_run("text", "hello"),
        NodeJson::text_run("text", "world"),
    ]);
    let nodes = editor.state().nodes();
    let leaves = leaves_of(nodes, editor.schema(), title).unwrap();

    let pin = Pin::at_step(title, 5, nodes, editor.schema()).unwrap();
    assert_eq!(pin.node, leaves[0].id);
    assert_eq!(pin.offset, 5);
}

#[test]
fn mid_leaf_insert_splits_the_run() {
    let (mut editor, title) = editor_with_title(vec![NodeJson::text_run("text", "ab")]);
    let run = leaves_of(editor.state().nodes(), editor.schema(), title).unwrap()[0].id;

    Transaction::new(Origin::UserInput)
        .insert(Point::within(title, 1), NodeJson::named("emoji"))
        .dispatch(&mut editor)
        .unwrap();

    let nodes = editor.state().nodes();
    let leaves = leaves_of(nodes, editor.schema(), title).unwrap();
    assert_eq!(leaves.len(), 3);
    assert_eq!(total_steps(nodes, editor.schema(), title).unwrap(), 3);
    assert_eq!(editor.state().text_content(), "ab");

    // Undo rejoins the halves: one leaf again, under its original id.
    editor.undo().unwrap();
    assert_eq!(editor.state().text_content(), "ab");
    let leaves = leaves_of(editor.state().nodes(), editor.schema(), title).unwrap();
    assert_eq!(leaves.len(), 1);
    assert_eq!(leaves[0].id, run);
    assert_eq!(
        total_steps(editor.state().nodes(), editor.schema(), title).unwrap(),
        2
    );
}

#[test]
fn undo_of_a_mid_leaf_fragment_insert_leaves_no_residue() {
    let (mut editor, title) = editor_with_title(vec![NodeJson::text_run("text", "ab")]);
    let run = leaves_of(editor.state().nodes(), editor.schema(), title).unwrap()[0].id;

    Transaction::new(Origin::Api)
        .insert_fragment(
            Point::within(title, 1),
            vec![NodeJson::named("emoji"), NodeJson::text_run("text", "x")],
        )
        .dispatch(&mut editor)
        .unwrap();
    assert_eq!(editor.state().text_content(), "axb");
    assert_eq!(
        total_steps(editor.state().nodes(), editor.schema(), title).unwrap(),
        4
    );

    editor.undo().unwrap();
    assert_eq!(editor.state().text_content(), "ab");
    let leaves = leaves_of(editor.state().nodes(), editor.schema(), title).unwrap();
    assert_eq!(leaves.len(), 1);
    assert_eq!(leaves[0].id, run);
}

#[test]
fn boundary_insert_does_not_split() {
    let (mut editor, title) = editor_with_title(vec![
        NodeJson::text_run("text", "hello"),
        NodeJson::text_run("text", "world"),
    ]);

    Transaction::new(Origin::UserInput)
        .insert(Point::within(title, 5), NodeJson::named("emoji"))
        .dispatch(&mut editor)
        .unwrap();

    let nodes = editor.state().nodes();
    assert_eq!(leaves_of(nodes, editor.schema(), title).unwrap().len(), 3);
    assert_eq!(editor.state().text_content(), "helloworld");
}

#[test]
fn negative_one_appends_at_the_block_end() {
    let (mut editor, title) = editor_with_title(vec![NodeJson::text_run("text", "ab")]);

    Transaction::new(Origin::UserInput)
        .insert_text(title, -1, "!")
        .dispatch(&mut editor)
        .unwrap();

    assert_eq!(editor.state().text_content(), "ab!");
}

#[test]
fn out_of_range_steps_are_rejected_not_clamped() {
    let (mut editor, title) = editor_with_title(vec![NodeJson::text_run("text", "ab")]);

    let err = Transaction::new(Origin::UserInput)
        .insert_text(title, 7, "!")
        .dispatch(&mut editor)
        .unwrap_err();
    assert!(matches!(err, carbon_core::CarbonError::OutOfRange { .. }));
    assert_eq!(editor.state().text_content(), "ab");
}

#[test]
fn set_text_content_replaces_and_undoes() {
    let (mut editor, title) = editor_with_title(vec![NodeJson::text_run("text", "old")]);
    let nodes = editor.state().nodes();
    let leaf = leaves_of(nodes, editor.schema(), title).unwrap()[0].id;

    Transaction::new(Origin::Api)
        .set_content(leaf, ContentJson::Text("brand new".to_string()))
        .dispatch(&mut editor)
        .unwrap();
    assert_eq!(editor.state().text_content(), "brand new");

    editor.undo().unwrap();
    assert_eq!(editor.state().text_content(), "old");
}

#[test]
fn set_children_content_replaces_the_sequence() {
    let (mut editor, title) = editor_with_title(vec![
        NodeJson::text_run("text", "a"),
        NodeJson::text_run("text", "b"),
    ]);

    Transaction::new(Origin::Api)
        .set_content(
            title,
            ContentJson::Children(vec![NodeJson::text_run("text", "xyz")]),
        )
        .dispatch(&mut editor)
        .unwrap();
    assert_eq!(editor.state().text_content(), "xyz");
    assert_eq!(
        leaves_of(editor.state().nodes(), editor.schema(), title)
            .unwrap()
            .len(),
        1
    );

    editor.undo().unwrap();
    assert_eq!(editor.state().text_content(), "ab");
    assert_eq!(
        leaves_of(editor.state().nodes(), editor.schema(), title)
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn split_is_a_no_op_on_leaf_boundaries() {
    let (editor, title) = editor_with_title(vec![
        NodeJson::text_run("text", "hello"),
        NodeJson::text_run("text", "world"),
    ]);
    let schema = editor.schema();
    let mut nodes = editor.state().nodes().clone();
    let mut ids = carbon_core::IdGenerator::starting_after(100);

    // Boundary split: structure unchanged.
    carbon_core::pin::split_inp(&mut nodes, schema, &mut ids, title, 5).unwrap();
    assert_eq!(leaves_of(&nodes, schema, title).unwrap().len(), 2);

    // Mid-leaf split: one more leaf, same total, same text.
    carbon_core::pin::split_inp(&mut nodes, schema, &mut ids, title, 2).unwrap();
    let leaves = leaves_of(&nodes, schema, title).unwrap();
    assert_eq!(leaves.len(), 3);
    assert_eq!(total_steps(&nodes, schema, title).unwrap(), 10);
    assert_eq!(nodes.text_content(title), "helloworld");

    // Splitting the same position again changes nothing.
    carbon_core::pin::split_inp(&mut nodes, schema, &mut ids, title, 2).unwrap();
    assert_eq!(leaves_of(&nodes, schema, title).unwrap().len(), 3);
}

#[test]
fn remove_span_trims_partial_leaves() {
    let (editor, title) = editor_with_title(vec![NodeJson::text_run("text", "helloworld")]);
    let schema = editor.schema();
    let mut nodes = editor.state().nodes().clone();
    let mut ids = carbon_core::IdGenerator::starting_after(100);

    let (removed, map) =
        carbon_core::pin::remove_inp(&mut nodes, schema, &mut ids, title, 2, 7).unwrap();

    assert_eq!(nodes.text_content(title), "herld");
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].text.as_deref(), Some("llowo"));
    assert_eq!(
        map,
        carbon_core::StepMap::Remove {
            start: 2,
            end: 7,
            old_total: 10
        }
    );
    assert_eq!(leaves_of(&nodes, schema, title).unwrap().len(), 2);
}

#[test]
fn remove_span_deletes_covered_atoms() {
    let (editor, title) = editor_with_title(vec![
        NodeJson::text_run("text", "ab"),
        NodeJson::named("emoji"),
        NodeJson::text_run("text", "cd"),
    ]);
    let schema = editor.schema();
    let mut nodes = editor.state().nodes().clone();
    let mut ids = carbon_core::IdGenerator::starting_after(100);

    let (removed, _) =
        carbon_core::pin::remove_inp(&mut nodes, schema, &mut ids, title, 1, 4).unwrap();

    // "b", the atom and "c" are fully covered after boundary trimming.
    assert_eq!(removed.len(), 3);
    assert_eq!(nodes.text_content(title), "ad");
    assert_eq!(total_steps(&nodes, schema, title).unwrap(), 2);
}

#[test]
fn a_pin_inside_a_removed_span_collapses_to_its_start() {
    let (editor, title) = editor_with_title(vec![NodeJson::text_run("text", "helloworld")]);
    let schema = editor.schema();
    let pin = Pin::at_step(title, 5, editor.state().nodes(), schema).unwrap();

    let mut nodes = editor.state().nodes().clone();
    let mut ids = carbon_core::IdGenerator::starting_after(100);
    let (_, map) =
        carbon_core::pin::remove_inp(&mut nodes, schema, &mut ids, title, 2, 7).unwrap();

    let moved = pin.through(&map, &nodes, schema).unwrap();
    assert_eq!(moved.steps, 2);
}

#[test]
fn removing_an_inline_leaf_keeps_later_pins_stable() {
    let (mut editor, title) = editor_with_title(vec![
        NodeJson::text_run("text", "abc"),
        NodeJson::named("emoji"),
        NodeJson::text_run("text", "xyz"),
    ]);
    let nodes = editor.state().nodes();
    let emoji = leaves_of(nodes, editor.schema(), title).unwrap()[1].id;
    let caret = Pin::at_step(title, 6, nodes, editor.schema()).unwrap();
    Transaction::new(Origin::UserInput)
        .select(carbon_core::SelectionState::caret(caret))
        .dispatch(&mut editor)
        .unwrap();

    Transaction::new(Origin::UserInput)
        .remove(emoji)
        .dispatch(&mut editor)
        .unwrap();

    // The caret was two steps past the atom; it is now one step earlier.
    let pinned = editor.state().selection().pinned.unwrap();
    assert_eq!(pinned.head.steps, 5);
    assert_eq!(editor.state().text_content(), "abcxyz");
}
