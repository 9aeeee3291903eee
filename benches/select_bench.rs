#[macro_use]
extern crate criterion;
extern crate fdt_lop;

use criterion::Criterion;
use fdt_lop::prelude::*;

fn build_tree(buses: usize, devices: usize) -> Tree {
    let mut tree = Tree::new();
    let root = tree.root();
    let soc = tree.create(root, "soc").unwrap();
    for b in 0..buses {
        let bus = tree.create(soc, &format!("bus@{}", b)).unwrap();
        tree.set_property(bus, "compatible", PropValue::string("simple-bus"))
            .unwrap();
        for d in 0..devices {
            let dev = tree
                .create(bus, &format!("device@{:x}", d * 0x1000))
                .unwrap();
            tree.set_property(dev, "compatible", PropValue::string("vendor,device"))
                .unwrap();
            tree.set_property(dev, "reg", PropValue::Cells(vec![(d * 0x1000) as u32, 0x1000]))
                .unwrap();
        }
    }
    tree
}

fn bench_evaluate(c: &mut Criterion) {
    let tree = build_tree(16, 32);
    let selector = Selector::compile(&["/soc/bus@[0-7]/.*:compatible:vendor,.*"]).unwrap();
    c.bench_function("selector_evaluate_512_nodes", |b| {
        b.iter(|| selector.evaluate(&tree))
    });

    let union = Selector::compile(&["/soc/.*:reg", "/soc/bus@.*"]).unwrap();
    c.bench_function("selector_union_512_nodes", |b| b.iter(|| union.evaluate(&tree)));
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
