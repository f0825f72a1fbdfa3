use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use symcat_core::db::{Artifact, BinaryImage, Device, Kernelcache, SharedCache};

use crate::commands::{open_catalog, opt_display, print_json, CatalogArgs};
use crate::sha256_file;

/// Register a firmware artifact and its devices.
pub fn add_artifact_command(
    args: &CatalogArgs,
    name: &str,
    version: Option<String>,
    build_id: Option<String>,
    devices: &[String],
    file: Option<&Path>,
) -> Result<()> {
    let sha256 = match file {
        Some(path) => {
            if !path.exists() {
                return Err(anyhow!("Artifact file does not exist: {}", path.display()));
            }
            Some(sha256_file(path)?)
        }
        None => None,
    };

    let catalog = open_catalog(args)?;
    let candidate = Artifact::new(name).with_build(version, build_id).with_sha256(sha256);
    let artifact = catalog.create_or_find(candidate).context("Failed to register artifact")?;
    let artifact_id = artifact.id.ok_or_else(|| anyhow!("Stored artifact has no id"))?;

    for device in devices {
        catalog
            .create_or_find(Device::new(Some(artifact_id), device.as_str()))
            .with_context(|| format!("Failed to register device {}", device))?;
    }

    println!("Artifact:");
    println!("  Id: {}", artifact_id);
    println!("  Name: {}", artifact.name);
    println!("  Version: {}", opt_display(artifact.version.as_deref()));
    println!("  Build: {}", opt_display(artifact.build_id.as_deref()));
    println!("  SHA-256: {}", opt_display(artifact.sha256.as_deref()));
    if !devices.is_empty() {
        println!("  Devices: {}", devices.join(", "));
    }
    println!("  DB: {}", catalog.path().display());

    Ok(())
}

/// Everything the catalog knows about one artifact.
#[derive(Debug, Serialize)]
pub struct ArtifactInfo {
    pub artifact: Artifact,
    pub devices: Vec<Device>,
    pub kernelcache: Option<Kernelcache>,
    pub shared_caches: Vec<SharedCache>,
    pub images: Vec<BinaryImage>,
}

pub fn artifact_info_command(args: &CatalogArgs, name: &str, json: bool) -> Result<()> {
    let catalog = open_catalog(args)?;
    let artifact = catalog.get_artifact_by_name(name)?;
    let id = artifact.id.ok_or_else(|| anyhow!("Stored artifact has no id"))?;

    let kernelcache = match catalog.kernelcache_for_artifact(id) {
        Ok(kc) => Some(kc),
        Err(err) if err.is_not_found() => None,
        Err(err) => return Err(err.into()),
    };
    let info = ArtifactInfo {
        devices: catalog.devices_for_artifact(id)?,
        kernelcache,
        shared_caches: catalog.shared_caches_for_artifact(id)?,
        images: catalog.images_for_artifact(id)?,
        artifact,
    };

    if json {
        return print_json(&info);
    }

    println!("Artifact: {} (id {})", info.artifact.name, id);
    println!("  Version: {}", opt_display(info.artifact.version.as_deref()));
    println!("  Build: {}", opt_display(info.artifact.build_id.as_deref()));
    println!("  SHA-256: {}", opt_display(info.artifact.sha256.as_deref()));
    if info.devices.is_empty() {
        println!("  Devices: (none)");
    } else {
        let names: Vec<&str> = info.devices.iter().map(|d| d.name.as_str()).collect();
        println!("  Devices: {}", names.join(", "));
    }
    println!("  Kernelcache: {}", opt_display(info.kernelcache.as_ref().map(|kc| kc.uuid.as_str())));
    println!("  Shared caches: {}", info.shared_caches.len());
    println!("  Images:");
    if info.images.is_empty() {
        println!("  (none)");
    }
    for image in &info.images {
        println!(
            "  - {} {} (__text {:#x}..{:#x})",
            image.uuid, image.name, image.text_start, image.text_end
        );
    }

    Ok(())
}

pub fn list_artifacts_command(args: &CatalogArgs, json: bool) -> Result<()> {
    let catalog = open_catalog(args)?;
    let artifacts = catalog.list_artifacts().context("Failed to list artifacts")?;

    if json {
        return print_json(&artifacts);
    }

    println!("Artifacts:");
    if artifacts.is_empty() {
        println!("(none)");
        return Ok(());
    }
    for artifact in artifacts {
        println!(
            "- {} (version: {}, build: {})",
            artifact.name,
            opt_display(artifact.version.as_deref()),
            opt_display(artifact.build_id.as_deref())
        );
    }

    Ok(())
}

/// Delete one artifact row. Children stay, detached.
pub fn delete_artifact_command(args: &CatalogArgs, name: &str) -> Result<()> {
    let catalog = open_catalog(args)?;
    let artifact = catalog.get_artifact_by_name(name)?;
    let id = artifact.id.ok_or_else(|| anyhow!("Stored artifact has no id"))?;
    catalog.delete_artifact(id)?;

    println!("Deleted artifact {} (id {})", artifact.name, id);
    Ok(())
}
