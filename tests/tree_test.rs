extern crate fdt_lop;

use fdt_lop::prelude::*;

fn fixture() -> (Tree, NodeId, NodeId, NodeId) {
    let mut tree = Tree::new();
    let root = tree.root();
    let cpus = tree.create(root, "cpus").unwrap();
    let cpu0 = tree.create(cpus, "cpu@0").unwrap();
    let soc = tree.create(root, "soc").unwrap();
    (tree, cpus, cpu0, soc)
}

#[test]
fn paths_follow_parent_chain() {
    let (tree, cpus, cpu0, _) = fixture();
    assert_eq!(tree.path(tree.root()).unwrap(), "/");
    assert_eq!(tree.path(cpus).unwrap(), "/cpus");
    assert_eq!(tree.path(cpu0).unwrap(), "/cpus/cpu@0");
    assert_eq!(tree.lookup("/cpus/cpu@0"), Some(cpu0));
    assert_eq!(tree.lookup("/nope"), None);
}

#[test]
fn assign_phandle_is_monotonic_and_never_reused() {
    let (mut tree, cpus, cpu0, soc) = fixture();
    assert_eq!(tree.assign_phandle(cpu0).unwrap(), 1);
    // Explicit ingest raises the watermark.
    tree.set_phandle(soc, 5).unwrap();
    assert_eq!(tree.assign_phandle(cpus).unwrap(), 6);
    // Re-assigning an already-assigned node is a no-op.
    assert_eq!(tree.assign_phandle(cpu0).unwrap(), 1);

    tree.remove(cpu0).unwrap();
    let fresh = tree.create(soc, "uart@0").unwrap();
    // id 1 was freed by the removal but must never come back.
    assert_eq!(tree.assign_phandle(fresh).unwrap(), 7);
}

#[test]
fn set_phandle_rejects_duplicates() {
    let (mut tree, cpus, cpu0, _) = fixture();
    tree.set_phandle(cpu0, 3).unwrap();
    assert!(matches!(
        tree.set_phandle(cpus, 3),
        Err(LopError::PhandleInUse(3))
    ));
    // The failed call must not have touched the index.
    assert_eq!(tree.node_by_phandle(3), Some(cpu0));
    assert_eq!(tree.phandle_of(cpus).unwrap(), None);
}

#[test]
fn remove_unindexes_the_whole_subtree() {
    let (mut tree, cpus, cpu0, _) = fixture();
    let ph_parent = tree.assign_phandle(cpus).unwrap();
    let ph_child = tree.assign_phandle(cpu0).unwrap();

    tree.remove(cpus).unwrap();
    assert_eq!(tree.node_by_phandle(ph_parent), None);
    assert_eq!(tree.node_by_phandle(ph_child), None);
    assert!(matches!(tree.phandle_of(cpu0), Err(LopError::StaleNode(_))));
    assert_eq!(tree.lookup("/cpus"), None);
}

#[test]
fn reparent_rejects_cycles_and_leaves_tree_unchanged() {
    let (mut tree, cpus, cpu0, _) = fixture();
    let before = tree.render();
    assert!(matches!(
        tree.reparent(cpus, cpu0, None),
        Err(LopError::Cycle { .. })
    ));
    assert!(matches!(
        tree.reparent(cpus, cpus, None),
        Err(LopError::Cycle { .. })
    ));
    assert_eq!(tree.render(), before);
}

#[test]
fn reparent_moves_and_renames() {
    let (mut tree, _, cpu0, soc) = fixture();
    tree.reparent(cpu0, soc, Some("cpu@9")).unwrap();
    assert_eq!(tree.path(cpu0).unwrap(), "/soc/cpu@9");
    assert_eq!(tree.lookup("/cpus/cpu@0"), None);
}

#[test]
fn sibling_name_collisions_are_rejected() {
    let (mut tree, cpus, cpu0, soc) = fixture();
    assert!(matches!(
        tree.create(cpus, "cpu@0"),
        Err(LopError::NodeExists { .. })
    ));
    let other = tree.create(soc, "cpu@0").unwrap();
    assert!(matches!(
        tree.reparent(other, cpus, None),
        Err(LopError::NodeExists { .. })
    ));
    let sibling = tree.create(cpus, "cpu@1").unwrap();
    let before = tree.render();
    assert!(matches!(
        tree.rename(sibling, "cpu@0"),
        Err(LopError::NodeExists { .. })
    ));
    assert_eq!(tree.render(), before);
    // Renaming a node to its own name is fine.
    tree.rename(cpu0, "cpu@0").unwrap();
}

#[test]
fn root_is_immutable() {
    let (mut tree, _, cpu0, _) = fixture();
    let root = tree.root();
    assert!(matches!(
        tree.remove(root),
        Err(LopError::RootImmutable(_))
    ));
    assert!(matches!(
        tree.reparent(root, cpu0, None),
        Err(LopError::RootImmutable(_))
    ));
}

#[test]
fn duplicate_copies_structure_but_not_phandles() {
    let (mut tree, cpus, cpu0, soc) = fixture();
    tree.assign_phandle(cpu0).unwrap();
    tree.set_label(cpu0, Some("main_core")).unwrap();
    tree.set_property(cpu0, "reg", PropValue::cell(0)).unwrap();

    let copy = tree.duplicate(cpus, soc, "cpus-copy").unwrap();
    let copied_cpu = tree.lookup("/soc/cpus-copy/cpu@0").unwrap();
    assert_eq!(
        tree.node(copied_cpu).unwrap().property("reg"),
        Some(&PropValue::cell(0))
    );
    assert_eq!(tree.phandle_of(copied_cpu).unwrap(), None);
    assert_eq!(tree.node(copied_cpu).unwrap().label(), None);
    assert_eq!(tree.phandle_of(copy).unwrap(), None);
}

#[test]
fn walk_is_preorder_document_order() {
    let (tree, _, _, _) = fixture();
    let paths: Vec<String> = tree.walk().map(|id| tree.path(id).unwrap()).collect();
    assert_eq!(paths, vec!["/", "/cpus", "/cpus/cpu@0", "/soc"]);
}
