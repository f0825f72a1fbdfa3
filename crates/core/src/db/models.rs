use serde::{Deserialize, Serialize};

/// A firmware archive (e.g. an IPSW) known to the catalog.
///
/// `name` is the natural key: it is how callers re-find an artifact they have
/// already ingested without knowing its generated id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    /// Generated row id. `None` until the record has been stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Unique archive name (e.g. "iPhone15,2_17.0_21A329_Restore.ipsw").
    pub name: String,
    /// Marketing OS version (e.g. "17.0").
    pub version: Option<String>,
    /// Build identifier (e.g. "21A329").
    pub build_id: Option<String>,
    /// Optional SHA-256 of the archive file.
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Artifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Builder-style helper to attach version and build information.
    pub fn with_build(mut self, version: Option<String>, build_id: Option<String>) -> Self {
        self.version = version;
        self.build_id = build_id;
        self
    }

    pub fn with_sha256(mut self, sha256: Option<String>) -> Self {
        self.sha256 = sha256;
        self
    }
}

/// A hardware target an artifact can be installed on.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Device {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Owning artifact. Becomes `None` if the artifact is deleted.
    pub artifact_id: Option<i64>,
    /// Device identifier (e.g. "iPhone15,2").
    pub name: String,
    /// Optional board/product code (e.g. "D73AP").
    pub board: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Device {
    pub fn new(artifact_id: Option<i64>, name: impl Into<String>) -> Self {
        Self { artifact_id, name: name.into(), ..Self::default() }
    }
}

/// The kernel image bundled in an artifact. At most one per artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Kernelcache {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub artifact_id: Option<i64>,
    pub uuid: String,
    /// Darwin kernel version string.
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Kernelcache {
    pub fn new(artifact_id: Option<i64>, uuid: impl Into<String>) -> Self {
        Self { artifact_id, uuid: uuid.into(), ..Self::default() }
    }
}

/// A combined-library image (dyld shared cache) bundled in an artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SharedCache {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub artifact_id: Option<i64>,
    pub uuid: String,
    /// Platform the cache targets (e.g. "iOS").
    pub platform: Option<String>,
    /// Base address of the shared region.
    pub shared_region_start: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl SharedCache {
    pub fn new(artifact_id: Option<i64>, uuid: impl Into<String>, shared_region_start: u64) -> Self {
        Self { artifact_id, uuid: uuid.into(), shared_region_start, ..Self::default() }
    }
}

/// A single loadable binary (executable, dylib or kext).
///
/// The build UUID is both the primary and the natural key, so there is no
/// generated id. Symbol resolution is scoped by this UUID alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BinaryImage {
    pub uuid: String,
    /// Install name or file name (e.g. "/usr/lib/libobjc.A.dylib").
    pub name: String,
    /// Start of the `__TEXT,__text` range.
    pub text_start: u64,
    /// End (exclusive) of the `__TEXT,__text` range.
    pub text_end: u64,
    pub artifact_id: Option<i64>,
    pub kernelcache_id: Option<i64>,
    pub shared_cache_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl BinaryImage {
    pub fn new(uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self { uuid: uuid.into(), name: name.into(), ..Self::default() }
    }

    pub fn with_text_range(mut self, start: u64, end: u64) -> Self {
        self.text_start = start;
        self.text_end = end;
        self
    }
}

/// A named address range `[start, end)`.
///
/// Symbols are interned: one row per distinct `(name, start, end)`, linked to
/// every image that carries it through [`ImageSymbolLink`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Symbol {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub start: u64,
    pub end: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, start: u64, end: u64) -> Self {
        Self { name: name.into(), start, end, ..Self::default() }
    }

    /// Half-open containment: `start <= address < end`.
    pub fn contains(&self, address: u64) -> bool {
        self.start <= address && address < self.end
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Association row binding an interned symbol to an image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ImageSymbolLink {
    pub image_uuid: String,
    pub symbol_id: i64,
}

impl ImageSymbolLink {
    pub fn new(image_uuid: impl Into<String>, symbol_id: i64) -> Self {
        Self { image_uuid: image_uuid.into(), symbol_id }
    }
}

/// Row counts per table, for status output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogStats {
    pub artifacts: u64,
    pub devices: u64,
    pub kernelcaches: u64,
    pub shared_caches: u64,
    pub images: u64,
    pub symbols: u64,
    pub image_symbols: u64,
}
