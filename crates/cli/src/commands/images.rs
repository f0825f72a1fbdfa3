use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use symcat_core::db::{BinaryImage, Catalog, Symbol};
use symcat_core::services::ingest::{IngestReport, ResumableIngest};
use symcat_core::services::macho::extract_macho_file;

use crate::commands::{open_catalog, print_json, CatalogArgs};
use crate::file_display_name;

/// Extract a Mach-O's image record and symbols and ingest them.
pub fn ingest_macho_command(
    args: &CatalogArgs,
    path: &Path,
    uuid: Option<String>,
    artifact: Option<&str>,
    json: bool,
) -> Result<()> {
    if !path.exists() {
        return Err(anyhow!("Binary file does not exist: {}", path.display()));
    }
    let extracted = extract_macho_file(path)?;
    let (image, symbols) = extracted.into_records(&file_display_name(path), uuid)?;

    let catalog = open_catalog(args)?;
    let image = attach_artifact(&catalog, image, artifact)?;
    let report = ResumableIngest::default().run(&catalog, &image, &symbols)?;
    print_report(&image, &report, json)
}

/// Ingest symbols from a JSON array of `{ "name", "start", "end" }` objects.
pub fn ingest_symbols_command(
    args: &CatalogArgs,
    uuid: &str,
    name: &str,
    file: &Path,
    artifact: Option<&str>,
    json: bool,
) -> Result<()> {
    let body = fs::read_to_string(file)
        .with_context(|| format!("Failed to read symbols file: {}", file.display()))?;
    let symbols: Vec<Symbol> = serde_json::from_str(&body)
        .with_context(|| format!("Failed to parse symbols JSON: {}", file.display()))?;
    if let Some(bad) = symbols.iter().find(|s| s.start > s.end) {
        return Err(anyhow!(
            "Symbol '{}' has start {:#x} past end {:#x}",
            bad.name,
            bad.start,
            bad.end
        ));
    }

    let text_start = symbols.iter().map(|s| s.start).min().unwrap_or(0);
    let text_end = symbols.iter().map(|s| s.end).max().unwrap_or(0);
    let image = BinaryImage::new(uuid, name).with_text_range(text_start, text_end);

    let catalog = open_catalog(args)?;
    let image = attach_artifact(&catalog, image, artifact)?;
    let report = ResumableIngest::default().run(&catalog, &image, &symbols)?;
    print_report(&image, &report, json)
}

fn attach_artifact(
    catalog: &Catalog,
    mut image: BinaryImage,
    artifact: Option<&str>,
) -> Result<BinaryImage> {
    if let Some(name) = artifact {
        let artifact = catalog
            .get_artifact_by_name(name)
            .with_context(|| format!("Artifact '{}' must be registered first", name))?;
        image.artifact_id = artifact.id;
    }
    Ok(image)
}

fn print_report(image: &BinaryImage, report: &IngestReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }

    println!("Ingested image:");
    println!("  UUID: {}", image.uuid);
    println!("  Name: {}", image.name);
    println!("  __text: {:#x}..{:#x}", image.text_start, image.text_end);
    println!(
        "  Symbols: {} ({} new, {} new links)",
        report.symbols, report.new_symbols, report.new_links
    );
    println!("  Batches: {}", report.batches);
    Ok(())
}
