use symcat_core::db::{
    Artifact, BinaryImage, Catalog, DbError, Device, ImageSymbolLink, Kernelcache, SharedCache,
    Symbol,
};

fn catalog() -> Catalog {
    Catalog::open_in_memory(50).expect("open in-memory catalog")
}

#[test]
fn create_or_find_artifact_is_idempotent() {
    let catalog = catalog();
    let candidate = Artifact::new("iPhone15,2_17.0_21A329_Restore.ipsw")
        .with_build(Some("17.0".into()), Some("21A329".into()));

    let first = catalog.create_or_find(candidate.clone()).expect("first create");
    let second = catalog.create_or_find(candidate).expect("second create");

    assert!(first.id.is_some());
    assert!(first.created_at.is_some());
    assert_eq!(first, second);
    assert_eq!(catalog.stats().expect("stats").artifacts, 1);
}

/// A second candidate with the same name but a different payload finds the
/// stored row; it does not overwrite it.
#[test]
fn create_or_find_returns_stored_row_not_candidate() {
    let catalog = catalog();
    let stored = catalog
        .create_or_find(Artifact::new("a.ipsw").with_build(Some("17.0".into()), None))
        .expect("create");

    // Same natural key, different payload: the stored row wins.
    let found = catalog
        .create_or_find(Artifact::new("a.ipsw").with_build(Some("99.9".into()), None))
        .expect("find");
    assert_eq!(found.id, stored.id);
    assert_eq!(found.version.as_deref(), Some("17.0"));
}

#[test]
fn every_entity_dedups_on_its_natural_key() {
    let catalog = catalog();
    let artifact = catalog.create_or_find(Artifact::new("fw.ipsw")).expect("artifact");
    let artifact_id = artifact.id;

    let d1 = catalog.create_or_find(Device::new(artifact_id, "iPhone15,2")).expect("device");
    let d2 = catalog.create_or_find(Device::new(artifact_id, "iPhone15,2")).expect("device again");
    assert_eq!(d1, d2);

    // Detached devices also dedup by name.
    let n1 = catalog.create_or_find(Device::new(None, "iPad13,1")).expect("detached");
    let n2 = catalog.create_or_find(Device::new(None, "iPad13,1")).expect("detached again");
    assert_eq!(n1.id, n2.id);

    let k1 = catalog.create_or_find(Kernelcache::new(artifact_id, "KC-UUID")).expect("kc");
    let k2 = catalog.create_or_find(Kernelcache::new(artifact_id, "KC-UUID")).expect("kc again");
    assert_eq!(k1, k2);

    let s1 = catalog
        .create_or_find(SharedCache::new(artifact_id, "DSC-UUID", 0x1_8000_0000))
        .expect("dsc");
    let s2 = catalog
        .create_or_find(SharedCache::new(artifact_id, "DSC-UUID", 0x1_8000_0000))
        .expect("dsc again");
    assert_eq!(s1, s2);
    assert_eq!(s2.shared_region_start, 0x1_8000_0000);

    let image = BinaryImage::new("IMG-UUID", "/usr/lib/libobjc.A.dylib").with_text_range(0x1000, 0x2000);
    let i1 = catalog.create_or_find(image.clone()).expect("image");
    let i2 = catalog.create_or_find(image).expect("image again");
    assert_eq!(i1, i2);

    let y1 = catalog.create_or_find(Symbol::new("_objc_msgSend", 0x1000, 0x1100)).expect("symbol");
    let y2 = catalog.create_or_find(Symbol::new("_objc_msgSend", 0x1000, 0x1100)).expect("symbol again");
    assert_eq!(y1, y2);

    let symbol_id = y1.id.expect("symbol id");
    catalog.create_or_find(ImageSymbolLink::new("IMG-UUID", symbol_id)).expect("link");
    catalog.create_or_find(ImageSymbolLink::new("IMG-UUID", symbol_id)).expect("link again");

    let stats = catalog.stats().expect("stats");
    assert_eq!(stats.artifacts, 1);
    assert_eq!(stats.devices, 2);
    assert_eq!(stats.kernelcaches, 1);
    assert_eq!(stats.shared_caches, 1);
    assert_eq!(stats.images, 1);
    assert_eq!(stats.symbols, 1);
    assert_eq!(stats.image_symbols, 1);
}

#[test]
fn symbols_with_same_name_but_different_range_are_distinct() {
    let catalog = catalog();
    let a = catalog.create_or_find(Symbol::new("_start", 0x100, 0x200)).expect("a");
    let b = catalog.create_or_find(Symbol::new("_start", 0x100, 0x180)).expect("b");
    assert_ne!(a.id, b.id);
}

/// The same (name, start, end) in two images is one symbol row and two links.
#[test]
fn shared_symbol_is_interned_once_and_linked_per_image() {
    let catalog = catalog();
    catalog.create_or_find(BinaryImage::new("U1", "libA.dylib")).expect("U1");
    catalog.create_or_find(BinaryImage::new("U2", "libB.dylib")).expect("U2");

    for uuid in ["U1", "U2"] {
        let symbol = catalog.create_or_find(Symbol::new("_memcpy", 0x4000, 0x4080)).expect("symbol");
        catalog
            .create_or_find(ImageSymbolLink::new(uuid, symbol.id.expect("id")))
            .expect("link");
    }

    let stats = catalog.stats().expect("stats");
    assert_eq!(stats.symbols, 1);
    assert_eq!(stats.image_symbols, 2);

    let u1 = catalog.get_symbols_for_image("U1").expect("U1 symbols");
    let u2 = catalog.get_symbols_for_image("U2").expect("U2 symbols");
    assert_eq!(u1, u2);
}

#[test]
fn create_or_find_all_reports_every_record_in_order() {
    let catalog = Catalog::open_in_memory(2).expect("open");
    let candidates: Vec<Symbol> =
        (0..5u64).map(|i| Symbol::new(format!("_f{i}"), i * 0x10, i * 0x10 + 0x10)).collect();

    let stored = catalog.create_or_find_all(candidates.clone()).expect("create all");
    assert_eq!(stored.len(), 5);
    assert!(stored.iter().all(|s| s.id.is_some()));
    assert_eq!(stored[3].name, "_f3");

    let again = catalog.create_or_find_all(candidates).expect("rerun");
    assert_eq!(stored, again);
    assert_eq!(catalog.stats().expect("stats").symbols, 5);
}

#[test]
fn lookups_of_missing_rows_are_not_found() {
    let catalog = catalog();

    let err = catalog.get_artifact_by_name("nope.ipsw").expect_err("missing by name");
    assert!(err.is_not_found(), "unexpected error: {err}");
    assert!(matches!(catalog.get_artifact(42), Err(DbError::NotFound { .. })));
    assert!(catalog.get_image("NOPE").expect_err("image").is_not_found());
    assert!(catalog.kernelcache_for_artifact(1).expect_err("kernelcache").is_not_found());
    assert!(catalog.get_symbols_for_image("NOPE").expect_err("symbols").is_not_found());
}

#[test]
fn artifact_children_are_listed() {
    let catalog = catalog();
    let artifact = catalog.create_or_find(Artifact::new("fw.ipsw")).expect("artifact");
    let id = artifact.id;

    catalog.create_or_find(Device::new(id, "iPhone15,3")).expect("device");
    catalog.create_or_find(Device::new(id, "iPhone15,2")).expect("device");
    let kc = catalog.create_or_find(Kernelcache::new(id, "KC")).expect("kc");
    catalog.create_or_find(SharedCache::new(id, "DSC", 0x1_8000_0000)).expect("dsc");
    let mut kext = BinaryImage::new("KEXT", "com.apple.driver.AppleA7IOP");
    kext.artifact_id = id;
    kext.kernelcache_id = kc.id;
    catalog.create_or_find(kext).expect("image");

    let id = id.expect("artifact id");
    let names: Vec<String> =
        catalog.devices_for_artifact(id).expect("devices").into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["iPhone15,2", "iPhone15,3"]);
    assert_eq!(catalog.kernelcache_for_artifact(id).expect("kc").uuid, "KC");
    assert_eq!(catalog.shared_caches_for_artifact(id).expect("dsc").len(), 1);
    let images = catalog.images_for_artifact(id).expect("images");
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].kernelcache_id, kc.id);
}

#[test]
fn second_kernelcache_for_an_artifact_is_rejected() {
    let catalog = catalog();
    let artifact = catalog.create_or_find(Artifact::new("fw.ipsw")).expect("artifact");
    catalog.create_or_find(Kernelcache::new(artifact.id, "KC-1")).expect("first kc");

    let err = catalog
        .create_or_find(Kernelcache::new(artifact.id, "KC-2"))
        .expect_err("one kernelcache per artifact");
    assert!(matches!(err, DbError::Sql(_)), "unexpected error: {err}");
}

#[test]
fn inverted_symbol_range_is_rejected_by_storage() {
    let catalog = catalog();
    let err = catalog.create_or_find(Symbol::new("_bad", 0x200, 0x100)).expect_err("start > end");
    assert!(matches!(err, DbError::Sql(_)));
    assert!(!err.is_transient());
}
