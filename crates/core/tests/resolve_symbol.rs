use symcat_core::db::{BinaryImage, Catalog, ImageSymbolLink, Symbol};

fn catalog_with(images: &[(&str, &[(&str, u64, u64)])]) -> Catalog {
    let catalog = Catalog::open_in_memory(100).expect("open in-memory catalog");
    for (uuid, symbols) in images {
        catalog.create_or_find(BinaryImage::new(*uuid, format!("{uuid}.dylib"))).expect("image");
        for (name, start, end) in symbols.iter() {
            let symbol = catalog.create_or_find(Symbol::new(*name, *start, *end)).expect("symbol");
            catalog
                .create_or_find(ImageSymbolLink::new(*uuid, symbol.id.expect("id")))
                .expect("link");
        }
    }
    catalog
}

#[test]
fn ranges_are_half_open() {
    let catalog = catalog_with(&[("U1", &[("A", 100, 200), ("B", 200, 300)])]);

    assert_eq!(catalog.resolve_symbol("U1", 100).expect("100").name, "A");
    assert_eq!(catalog.resolve_symbol("U1", 150).expect("150").name, "A");
    assert_eq!(catalog.resolve_symbol("U1", 199).expect("199").name, "A");
    assert_eq!(catalog.resolve_symbol("U1", 200).expect("200").name, "B");
    assert_eq!(catalog.resolve_symbol("U1", 299).expect("299").name, "B");

    assert!(catalog.resolve_symbol("U1", 99).expect_err("below").is_not_found());
    assert!(catalog.resolve_symbol("U1", 300).expect_err("end is exclusive").is_not_found());
}

/// Identical ranges in another image never leak into a lookup.
#[test]
fn resolution_is_scoped_to_the_image() {
    let catalog = catalog_with(&[
        ("U1", &[("A", 100, 200)]),
        ("U2", &[("Z", 100, 200), ("Y", 500, 600)]),
    ]);

    assert_eq!(catalog.resolve_symbol("U1", 150).expect("U1").name, "A");
    assert_eq!(catalog.resolve_symbol("U2", 150).expect("U2").name, "Z");
    assert!(catalog.resolve_symbol("U1", 550).expect_err("Y belongs to U2").is_not_found());
    assert!(catalog.resolve_symbol("U3", 150).expect_err("unknown image").is_not_found());
}

#[test]
fn overlapping_ranges_prefer_the_smallest() {
    let catalog = catalog_with(&[("U1", &[("outer", 100, 300), ("inner", 150, 200)])]);

    assert_eq!(catalog.resolve_symbol("U1", 120).expect("120").name, "outer");
    assert_eq!(catalog.resolve_symbol("U1", 160).expect("160").name, "inner");
    assert_eq!(catalog.resolve_symbol("U1", 250).expect("250").name, "outer");
}

#[test]
fn equal_overlaps_prefer_the_older_symbol() {
    let catalog = catalog_with(&[("U1", &[("first", 100, 200), ("alias", 100, 200)])]);
    assert_eq!(catalog.resolve_symbol("U1", 150).expect("150").name, "first");
}

/// Kernel addresses sit above `i64::MAX`; storage must keep their order.
#[test]
fn kernel_addresses_above_the_sign_bit_resolve() {
    let base = 0xffff_fff0_0700_4000u64;
    let catalog = catalog_with(&[(
        "KERNEL",
        &[("_low", 0x1000, 0x2000), ("_panic", base, base + 0x100), ("_top", u64::MAX - 0x10, u64::MAX)],
    )]);

    let symbol = catalog.resolve_symbol("KERNEL", base + 0x10).expect("kernel address");
    assert_eq!(symbol.name, "_panic");
    assert_eq!(symbol.start, base);
    assert_eq!(symbol.end, base + 0x100);

    assert_eq!(catalog.resolve_symbol("KERNEL", 0x1800).expect("low").name, "_low");
    assert_eq!(catalog.resolve_symbol("KERNEL", u64::MAX - 1).expect("top").name, "_top");
    assert!(catalog.resolve_symbol("KERNEL", base - 1).expect_err("gap").is_not_found());
}

#[test]
fn symbols_for_image_are_ordered_by_address() {
    let base = 0xffff_fff0_0000_0000u64;
    let catalog = catalog_with(&[(
        "U1",
        &[("_hi", base, base + 8), ("_mid", 0x2000, 0x2010), ("_lo", 0x1000, 0x1010)],
    )]);

    let names: Vec<String> =
        catalog.get_symbols_for_image("U1").expect("symbols").into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["_lo", "_mid", "_hi"]);
}
