use std::fs;
use std::path::Path;

use symcat::commands::{resolve_catalog_config, CatalogArgs};
use symcat::{file_display_name, parse_address, sha256_file};
use tempfile::tempdir;

#[test]
fn sha256_file_matches_known_hash() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("abc.bin");
    fs::write(&path, b"abc").expect("write");

    let hash = sha256_file(&path).expect("hash");
    assert_eq!(hash, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
}

#[test]
fn sha256_file_reports_missing_path() {
    let err = sha256_file(Path::new("/definitely/not/here.ipsw")).unwrap_err();
    assert!(err.to_string().contains("Failed to open file for hashing"));
}

#[test]
fn parse_address_accepts_hex_and_decimal() {
    assert_eq!(parse_address("0x1000").expect("hex"), 0x1000);
    assert_eq!(parse_address("0XFF").expect("upper hex"), 0xff);
    assert_eq!(parse_address("4096").expect("decimal"), 4096);
    assert_eq!(parse_address("0xffff_fff0_0700_4000").expect("separators"), 0xffff_fff0_0700_4000);
    assert_eq!(parse_address(" 0xffffffffffffffff ").expect("max"), u64::MAX);
}

#[test]
fn parse_address_rejects_garbage() {
    for raw in ["", "0x", "xyz", "0x1_0000_0000_0000_0000", "-5"] {
        let err = parse_address(raw).unwrap_err();
        assert!(err.to_string().contains("Invalid address"), "input {raw:?}");
    }
}

#[test]
fn file_display_name_uses_last_component() {
    assert_eq!(file_display_name(Path::new("/System/Library/Frameworks/libfoo.dylib")), "libfoo.dylib");
    assert_eq!(file_display_name(Path::new("/")), "unnamed-image");
}

#[test]
fn catalog_config_prefers_config_file() {
    let dir = tempdir().expect("tempdir");
    let config_path = dir.path().join("symcat.json");
    fs::write(&config_path, r#"{"path": "nested/catalog.db", "batch_size": 7}"#).expect("write");

    let args = CatalogArgs {
        db: "ignored.db".into(),
        batch_size: Some(99),
        config: Some(config_path),
    };
    let config = resolve_catalog_config(&args).expect("resolve");
    assert_eq!(config.path, dir.path().join("nested/catalog.db"));
    assert_eq!(config.batch_size, 7);
}

#[test]
fn catalog_config_defaults_batch_size_from_flags() {
    let config = resolve_catalog_config(&CatalogArgs::new("local.db")).expect("resolve");
    assert_eq!(config.path, Path::new("local.db"));
    assert_eq!(config.batch_size, symcat_core::db::DEFAULT_BATCH_SIZE);
}
