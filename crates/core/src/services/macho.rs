//! Mach-O symbol extraction.
//!
//! Turns a thin Mach-O into catalog records: the image (UUID, install name,
//! `__TEXT,__text` range) and one [`Symbol`] per defined code symbol. Symbol
//! tables carry start addresses only, so each range runs to the next symbol
//! (or to the end of `__text` for the last one).

use std::path::Path;

use goblin::mach::load_command::CommandVariant;
use goblin::mach::symbols::{N_SECT, N_STAB, N_TYPE};
use goblin::mach::{self, MachO};
use goblin::Object;
use thiserror::Error;

use crate::db::{BinaryImage, Symbol};

#[derive(Debug, Error)]
pub enum MachoError {
    #[error("Failed to read {0}: {1}")]
    Io(String, #[source] std::io::Error),
    #[error("Failed to parse Mach-O: {0}")]
    Parse(#[from] goblin::error::Error),
    #[error("Not a thin Mach-O binary")]
    NotThinMacho,
    #[error("Mach-O has no __TEXT,__text section")]
    MissingText,
    #[error("Mach-O has no LC_UUID; pass an explicit UUID")]
    MissingUuid,
}

/// What a Mach-O contributes to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachoImage {
    /// LC_UUID, upper-case hyphenated.
    pub uuid: Option<String>,
    /// LC_ID_DYLIB install name, if present.
    pub install_name: Option<String>,
    pub text_start: u64,
    pub text_end: u64,
    pub symbols: Vec<Symbol>,
}

impl MachoImage {
    /// Build the image record. `uuid_override` wins over LC_UUID; `fallback_name`
    /// is used when there is no install name.
    pub fn into_records(
        self,
        fallback_name: &str,
        uuid_override: Option<String>,
    ) -> Result<(BinaryImage, Vec<Symbol>), MachoError> {
        let uuid = uuid_override.or(self.uuid).ok_or(MachoError::MissingUuid)?;
        let name = self.install_name.unwrap_or_else(|| fallback_name.to_string());
        let image = BinaryImage::new(uuid, name).with_text_range(self.text_start, self.text_end);
        Ok((image, self.symbols))
    }
}

pub fn extract_macho_file(path: &Path) -> Result<MachoImage, MachoError> {
    let bytes =
        std::fs::read(path).map_err(|err| MachoError::Io(path.display().to_string(), err))?;
    extract_macho(&bytes)
}

pub fn extract_macho(bytes: &[u8]) -> Result<MachoImage, MachoError> {
    match Object::parse(bytes)? {
        Object::Mach(mach::Mach::Binary(bin)) => from_binary(&bin),
        _ => Err(MachoError::NotThinMacho),
    }
}

fn from_binary(bin: &MachO) -> Result<MachoImage, MachoError> {
    let uuid = bin.load_commands.iter().find_map(|lc| match &lc.command {
        CommandVariant::Uuid(cmd) => Some(format_uuid(cmd.uuid)),
        _ => None,
    });

    let (text_start, text_end) = bin
        .segments
        .sections()
        .flatten()
        .filter_map(Result::ok)
        .find(|(sec, _)| {
            sec.segname().unwrap_or("") == "__TEXT" && sec.name().unwrap_or("") == "__text"
        })
        .map(|(sec, _)| (sec.addr, sec.addr.saturating_add(sec.size)))
        .ok_or(MachoError::MissingText)?;

    let mut entries = Vec::new();
    for sym in bin.symbols() {
        let Ok((name, nlist)) = sym else { continue };
        if nlist.n_type & N_STAB != 0 || nlist.n_type & N_TYPE != N_SECT || name.is_empty() {
            continue;
        }
        entries.push((name.to_string(), nlist.n_value));
    }

    Ok(MachoImage {
        uuid,
        install_name: bin.name.map(str::to_string),
        text_start,
        text_end,
        symbols: symbol_ranges(entries, text_start, text_end),
    })
}

/// Derive half-open ranges from `(name, address)` pairs inside `[text_start, text_end)`.
///
/// Aliases sharing an address collapse to the lexicographically first name so
/// the resulting ranges never overlap.
pub fn symbol_ranges(mut entries: Vec<(String, u64)>, text_start: u64, text_end: u64) -> Vec<Symbol> {
    entries.retain(|(_, addr)| *addr >= text_start && *addr < text_end);
    entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    entries.dedup_by_key(|(_, addr)| *addr);

    let mut symbols = Vec::with_capacity(entries.len());
    for (idx, (name, start)) in entries.iter().enumerate() {
        let end = entries.get(idx + 1).map_or(text_end, |(_, next)| *next);
        symbols.push(Symbol::new(name.clone(), *start, end));
    }
    symbols
}

fn format_uuid(bytes: [u8; 16]) -> String {
    uuid::Uuid::from_bytes(bytes).hyphenated().to_string().to_uppercase()
}
