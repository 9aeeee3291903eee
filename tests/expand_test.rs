extern crate fdt_lop;

use fdt_lop::expand::{access, cpu, firewall, memory};
use fdt_lop::prelude::*;

const CLUSTER_PH: u32 = 0x10;
const MBOX_PH: u32 = 0x11;
const FW_PH: u32 = 0x12;

fn fixture() -> (Tree, NodeId, NodeId) {
    let mut tree = Tree::new();
    let root = tree.root();

    let cluster = tree.create(root, "cpus-a72").unwrap();
    tree.set_phandle(cluster, CLUSTER_PH).unwrap();
    for i in 0..2 {
        tree.create(cluster, &format!("cpu@{}", i)).unwrap();
    }
    let soc = tree.create(root, "soc").unwrap();
    let mbox = tree.create(soc, "mailbox@ff320000").unwrap();
    tree.set_phandle(mbox, MBOX_PH).unwrap();
    let fw = tree.create(soc, "firewall@ff990000").unwrap();
    tree.set_phandle(fw, FW_PH).unwrap();

    let domains = tree.create(root, "domains").unwrap();
    let domain = tree.create(domains, "rtos").unwrap();
    (tree, domain, cluster)
}

#[test]
fn cpu_grants_decode_mask_and_mode() {
    let (mut tree, domain, cluster) = fixture();
    tree.set_property(
        domain,
        "cpus",
        PropValue::Cells(vec![CLUSTER_PH, 0x3, 0x8000_0001]),
    )
    .unwrap();

    let reg = SchemaRegistry::defaults();
    let mut warnings = Vec::new();
    let grants = cpu::expand(&tree, &reg, domain, &mut warnings).unwrap();
    assert!(warnings.is_empty());
    assert_eq!(grants.len(), 1);

    let grant = &grants[0];
    assert_eq!(grant.cluster, cluster);
    assert_eq!(grant.cpus, vec![0, 1]);
    assert!(grant.mode.secure());
    assert!(grant.mode.lockstep());
    assert_eq!(grant.mode.el(), 0);
}

#[test]
fn cpu_apply_realizes_grant_children() {
    let (mut tree, domain, _) = fixture();
    tree.set_property(
        domain,
        "cpus",
        PropValue::Cells(vec![CLUSTER_PH, 0x3, 0x8000_0001]),
    )
    .unwrap();

    let reg = SchemaRegistry::defaults();
    let mut warnings = Vec::new();
    cpu::apply(&mut tree, &reg, domain, &mut warnings).unwrap();

    assert!(!tree.node(domain).unwrap().has_property("cpus"));
    let grant = tree.lookup("/domains/rtos/cpu-grant@0").unwrap();
    let node = tree.node(grant).unwrap();
    assert_eq!(node.property("cluster"), Some(&PropValue::cell(CLUSTER_PH)));
    assert_eq!(node.property("cpu-ids"), Some(&PropValue::Cells(vec![0, 1])));
    assert_eq!(node.property("el"), Some(&PropValue::cell(0)));
    assert!(node.has_property("secure"));
    assert!(node.has_property("lockstep"));
}

#[test]
fn access_grants_resolve_targets_and_flags() {
    let (mut tree, domain, _) = fixture();
    tree.set_property(domain, "access", PropValue::Cells(vec![MBOX_PH, 0x0]))
        .unwrap();

    let reg = SchemaRegistry::defaults();
    let mut warnings = Vec::new();
    let grants = access::expand(&tree, &reg, domain, &mut warnings).unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(tree.path(grants[0].target).unwrap(), "/soc/mailbox@ff320000");
    assert_eq!(grants[0].flags, 0);
    assert!(!grants[0].read_only());
    assert_eq!(grants[0].ipi_channels(), 0);
}

#[test]
fn unresolved_access_targets_are_skipped_not_fatal() {
    let (mut tree, domain, _) = fixture();
    tree.set_property(
        domain,
        "access",
        PropValue::Cells(vec![0xdead, 0x0, MBOX_PH, 0x1]),
    )
    .unwrap();

    let reg = SchemaRegistry::defaults();
    let mut warnings = Vec::new();
    let grants = access::expand(&tree, &reg, domain, &mut warnings).unwrap();
    assert_eq!(grants.len(), 1);
    assert!(grants[0].read_only());
    assert_eq!(warnings.len(), 1);
    assert!(matches!(
        warnings[0],
        LopError::UnresolvedPhandle { phandle: 0xdead, .. }
    ));
}

#[test]
fn ragged_cell_counts_are_schema_mismatches() {
    let (mut tree, domain, _) = fixture();
    tree.set_property(
        domain,
        "cpus",
        PropValue::Cells(vec![CLUSTER_PH, 0x3, 0x8000_0001, 0x0]),
    )
    .unwrap();

    let reg = SchemaRegistry::defaults();
    let mut warnings = Vec::new();
    match cpu::expand(&tree, &reg, domain, &mut warnings) {
        Err(LopError::SchemaMismatch {
            path,
            prop,
            cells,
            width,
        }) => {
            assert_eq!(path, "/domains/rtos");
            assert_eq!(prop, "cpus");
            assert_eq!(cells, 4);
            assert_eq!(width, 3);
        }
        other => panic!("expected schema mismatch, got {:?}", other.map(|g| g.len())),
    }
}

#[test]
fn memory_sizes_accept_unit_suffixes() {
    assert_eq!(memory::parse_size("4K"), Some(0x1000));
    assert_eq!(memory::parse_size("16M"), Some(16 << 20));
    assert_eq!(memory::parse_size("1G"), Some(1 << 30));
    assert_eq!(memory::parse_size("0xa0000000"), Some(0xa000_0000));
    assert_eq!(memory::parse_size("4096"), Some(4096));
    assert_eq!(memory::parse_size("bogus"), None);
}

#[test]
fn memory_ranges_are_merged_and_canonicalized() {
    let (mut tree, domain, _) = fixture();
    tree.set_property(
        domain,
        "memory",
        PropValue::Cells(vec![0x1000, 0x2000, 0x0, 0x2000, 0x8000, 0x1000]),
    )
    .unwrap();

    let ranges = memory::apply(&mut tree, domain).unwrap();
    assert_eq!(
        ranges,
        vec![
            MemRange {
                base: 0x0,
                size: 0x3000
            },
            MemRange {
                base: 0x8000,
                size: 0x1000
            }
        ]
    );
    assert_eq!(
        tree.node(domain).unwrap().property("memory"),
        Some(&PropValue::Cells(vec![0x0, 0x3000, 0x8000, 0x1000]))
    );
    // Canonical output is a fixed point.
    let again = memory::apply(&mut tree, domain).unwrap();
    assert_eq!(again, ranges);
}

#[test]
fn memory_accepts_string_encoded_pairs() {
    let (mut tree, domain, _) = fixture();
    tree.set_property(
        domain,
        "memory",
        PropValue::Strings(vec!["0xa0000000".to_string(), "4K".to_string()]),
    )
    .unwrap();

    let ranges = memory::apply(&mut tree, domain).unwrap();
    assert_eq!(
        ranges,
        vec![MemRange {
            base: 0xa000_0000,
            size: 0x1000
        }]
    );
    assert_eq!(
        tree.node(domain).unwrap().property("memory"),
        Some(&PropValue::Cells(vec![0xa000_0000, 0x1000]))
    );
}

#[test]
fn firewall_policies_decode_type_and_priority() {
    let (mut tree, domain, _) = fixture();
    tree.set_property(
        domain,
        "firewallconf",
        PropValue::Cells(vec![FW_PH, 1, 5, FW_PH, 2, 0]),
    )
    .unwrap();

    let reg = SchemaRegistry::defaults();
    let mut warnings = Vec::new();
    let policies = firewall::expand(&tree, &reg, domain, &mut warnings).unwrap();
    assert_eq!(policies.len(), 2);
    assert_eq!(policies[0].action, FirewallAction::Block);
    assert_eq!(policies[0].priority, 5);
    assert_eq!(policies[1].action, FirewallAction::BlockDesirable);
    assert_eq!(tree.path(policies[0].controller).unwrap(), "/soc/firewall@ff990000");
}
