use symcat_core::db::{BinaryImage, Catalog, DbError, Symbol};
use symcat_core::services::ingest::{ingest_image_symbols, ResumableIngest};
use tempfile::tempdir;

const BASE: u64 = 0xffff_fff0_0700_0000;

fn symbols(count: u64) -> Vec<Symbol> {
    (0..count).map(|i| Symbol::new(format!("_fn_{i:04}"), BASE + i * 0x10, BASE + (i + 1) * 0x10)).collect()
}

#[test]
fn ingest_reports_counts_and_batches() {
    let catalog = Catalog::open_in_memory(100).expect("open");
    let image = BinaryImage::new("KERNEL", "kernel").with_text_range(BASE, BASE + 0x10 * 250);

    let report = ingest_image_symbols(&catalog, &image, &symbols(250)).expect("ingest");
    assert_eq!(report.image_uuid, "KERNEL");
    assert_eq!(report.symbols, 250);
    assert_eq!(report.new_symbols, 250);
    assert_eq!(report.new_links, 250);
    assert_eq!(report.batches, 3);
    assert_eq!(report.attempts, 1);

    let rerun = ingest_image_symbols(&catalog, &image, &symbols(250)).expect("rerun");
    assert_eq!(rerun.new_symbols, 0);
    assert_eq!(rerun.new_links, 0);
    assert_eq!(catalog.stats().expect("stats").symbols, 250);
}

/// 1000 symbols in batches of 100, with record 400 invalid. The first four
/// batches stay committed, the fifth rolls back, and rerunning the corrected
/// input adds exactly the missing 600 without duplicating anything.
#[test]
fn interrupted_ingest_keeps_committed_batches_and_rerun_converges() {
    let dir = tempdir().expect("tempdir");
    let catalog = Catalog::open(dir.path().join("catalog.db"), 100).expect("open");
    let image = BinaryImage::new("KERNEL", "kernel");

    // Record 400 opens the fifth batch and violates the range check.
    let mut broken = symbols(1000);
    broken[400] = Symbol::new("_broken", BASE + 0x20, BASE + 0x10);

    let err = ResumableIngest::new(3)
        .run(&catalog, &image, &broken)
        .expect_err("constraint violation is not retried");
    assert!(matches!(err, DbError::Sql(_)), "unexpected error: {err}");
    assert!(!err.is_transient());

    let stats = catalog.stats().expect("stats after failure");
    assert_eq!(stats.images, 1);
    assert_eq!(stats.symbols, 400);
    assert_eq!(stats.image_symbols, 400);

    let report = ResumableIngest::default().run(&catalog, &image, &symbols(1000)).expect("rerun");
    assert_eq!(report.attempts, 1);
    assert_eq!(report.batches, 10);
    assert_eq!(report.new_symbols, 600);
    assert_eq!(report.new_links, 600);

    let stats = catalog.stats().expect("stats after rerun");
    assert_eq!(stats.symbols, 1000);
    assert_eq!(stats.image_symbols, 1000);
    assert_eq!(catalog.get_symbols_for_image("KERNEL").expect("symbols").len(), 1000);

    let hit = catalog.resolve_symbol("KERNEL", BASE + 999 * 0x10 + 4).expect("last symbol");
    assert_eq!(hit.name, "_fn_0999");
}

/// A second image with the same symbol list links to the existing rows.
#[test]
fn identical_images_share_interned_symbols() {
    let catalog = Catalog::open_in_memory(64).expect("open");
    let list = symbols(32);

    ingest_image_symbols(&catalog, &BinaryImage::new("U1", "libA"), &list).expect("U1");
    let second = ingest_image_symbols(&catalog, &BinaryImage::new("U2", "libA"), &list).expect("U2");

    assert_eq!(second.new_symbols, 0);
    assert_eq!(second.new_links, 32);
    let stats = catalog.stats().expect("stats");
    assert_eq!(stats.symbols, 32);
    assert_eq!(stats.image_symbols, 64);
}

#[test]
fn ingest_on_closed_catalog_fails_without_retry() {
    let mut catalog = Catalog::open_in_memory(10).expect("open");
    catalog.close().expect("close");

    let err = ResumableIngest::new(5)
        .run(&catalog, &BinaryImage::new("U1", "lib"), &symbols(3))
        .expect_err("closed");
    assert!(matches!(err, DbError::Closed));
}
