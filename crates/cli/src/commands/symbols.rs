use anyhow::{Context, Result};
use serde::Serialize;
use symcat_core::db::Symbol;

use crate::commands::{open_catalog, print_json, CatalogArgs};
use crate::parse_address;

#[derive(Debug, Serialize)]
pub struct Resolution {
    pub image_uuid: String,
    pub address: u64,
    pub offset: u64,
    pub symbol: Symbol,
}

/// Resolve an address inside one image to its enclosing symbol.
pub fn resolve_command(args: &CatalogArgs, uuid: &str, address: &str, json: bool) -> Result<()> {
    let address = parse_address(address)?;
    let catalog = open_catalog(args)?;
    let symbol = catalog.resolve_symbol(uuid, address)?;

    let resolution = Resolution {
        image_uuid: uuid.to_string(),
        address,
        offset: address - symbol.start,
        symbol,
    };
    if json {
        return print_json(&resolution);
    }

    println!(
        "{:#x} => {}+{:#x} [{:#x}, {:#x})",
        resolution.address,
        resolution.symbol.name,
        resolution.offset,
        resolution.symbol.start,
        resolution.symbol.end
    );
    Ok(())
}

/// List an image's symbols by address.
pub fn symbols_command(args: &CatalogArgs, uuid: &str, json: bool) -> Result<()> {
    let catalog = open_catalog(args)?;
    let symbols = catalog.get_symbols_for_image(uuid)?;

    if json {
        return print_json(&symbols);
    }

    println!("Symbols for {}:", uuid);
    for symbol in symbols {
        println!("- {:#018x}..{:#018x} {}", symbol.start, symbol.end, symbol.name);
    }
    Ok(())
}

pub fn prune_symbols_command(args: &CatalogArgs) -> Result<()> {
    let catalog = open_catalog(args)?;
    let removed = catalog.prune_orphan_symbols().context("Failed to prune orphan symbols")?;
    println!("Pruned {} orphan symbol(s)", removed);
    Ok(())
}
