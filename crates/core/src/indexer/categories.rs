//! Canonical (Newznab-style) category ids and per-indexer code mapping.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::IndexerKind;

/// Canonical category id. `0` is reserved for "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub u32);

impl CategoryId {
    pub const UNKNOWN: CategoryId = CategoryId(0);
    pub const CONSOLE: CategoryId = CategoryId(1000);
    pub const MOVIES: CategoryId = CategoryId(2000);
    pub const MOVIES_HD: CategoryId = CategoryId(2040);
    pub const MOVIES_UHD: CategoryId = CategoryId(2045);
    pub const AUDIO: CategoryId = CategoryId(3000);
    pub const PC: CategoryId = CategoryId(4000);
    pub const TV: CategoryId = CategoryId(5000);
    pub const TV_HD: CategoryId = CategoryId(5040);
    pub const TV_UHD: CategoryId = CategoryId(5045);
    pub const TV_ANIME: CategoryId = CategoryId(5070);
    pub const XXX: CategoryId = CategoryId(6000);
    pub const BOOKS: CategoryId = CategoryId(7000);
    pub const OTHER: CategoryId = CategoryId(8000);

    pub fn is_unknown(&self) -> bool {
        self.0 == 0
    }

    /// Top-level category for a standard sub-category, itself otherwise.
    pub fn parent(&self) -> CategoryId {
        if (1000..10_000).contains(&self.0) {
            CategoryId(self.0 / 1000 * 1000)
        } else {
            *self
        }
    }

    pub fn is_standard(&self) -> bool {
        lookup(self.0).is_some()
    }

    pub fn name(&self) -> &'static str {
        lookup(self.0).unwrap_or("Custom")
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn lookup(id: u32) -> Option<&'static str> {
    STANDARD_CATEGORIES
        .binary_search_by_key(&id, |(code, _)| *code)
        .ok()
        .map(|i| STANDARD_CATEGORIES[i].1)
}

/// Standard category table, sorted by id.
pub const STANDARD_CATEGORIES: &[(u32, &str)] = &[
    (0, "Unknown"),
    (1000, "Console"),
    (1010, "Console/NDS"),
    (1020, "Console/PSP"),
    (1030, "Console/Wii"),
    (1040, "Console/XBox"),
    (1050, "Console/XBox 360"),
    (1060, "Console/Wiiware"),
    (1070, "Console/XBox 360 DLC"),
    (1080, "Console/PS3"),
    (1090, "Console/Other"),
    (1110, "Console/3DS"),
    (1120, "Console/PS Vita"),
    (1130, "Console/WiiU"),
    (1140, "Console/XBox One"),
    (1180, "Console/PS4"),
    (2000, "Movies"),
    (2010, "Movies/Foreign"),
    (2020, "Movies/Other"),
    (2030, "Movies/SD"),
    (2040, "Movies/HD"),
    (2045, "Movies/UHD"),
    (2050, "Movies/BluRay"),
    (2060, "Movies/3D"),
    (2070, "Movies/DVD"),
    (2080, "Movies/WEB-DL"),
    (2090, "Movies/x265"),
    (3000, "Audio"),
    (3010, "Audio/MP3"),
    (3020, "Audio/Video"),
    (3030, "Audio/Audiobook"),
    (3040, "Audio/Lossless"),
    (3050, "Audio/Other"),
    (3060, "Audio/Foreign"),
    (4000, "PC"),
    (4010, "PC/0day"),
    (4020, "PC/ISO"),
    (4030, "PC/Mac"),
    (4040, "PC/Mobile-Other"),
    (4050, "PC/Games"),
    (4060, "PC/Mobile-iOS"),
    (4070, "PC/Mobile-Android"),
    (5000, "TV"),
    (5010, "TV/WEB-DL"),
    (5020, "TV/Foreign"),
    (5030, "TV/SD"),
    (5040, "TV/HD"),
    (5045, "TV/UHD"),
    (5050, "TV/Other"),
    (5060, "TV/Sport"),
    (5070, "TV/Anime"),
    (5080, "TV/Documentary"),
    (5090, "TV/x265"),
    (6000, "XXX"),
    (6010, "XXX/DVD"),
    (6020, "XXX/WMV"),
    (6030, "XXX/XviD"),
    (6040, "XXX/x264"),
    (6045, "XXX/UHD"),
    (6050, "XXX/Pack"),
    (6060, "XXX/ImageSet"),
    (6070, "XXX/Other"),
    (6080, "XXX/SD"),
    (6090, "XXX/WEB-DL"),
    (7000, "Books"),
    (7010, "Books/Mags"),
    (7020, "Books/EBook"),
    (7030, "Books/Comics"),
    (7040, "Books/Technical"),
    (7050, "Books/Other"),
    (7060, "Books/Foreign"),
    (8000, "Other"),
    (8010, "Other/Misc"),
    (8020, "Other/Hashed"),
];

/// apibay (The Pirate Bay) category codes.
const APIBAY_CATEGORIES: &[(&str, u32)] = &[
    ("100", 3000),
    ("101", 3010),
    ("102", 3030),
    ("103", 3050),
    ("104", 3040),
    ("199", 3050),
    ("200", 2000),
    ("201", 2000),
    ("202", 2070),
    ("203", 3020),
    ("204", 2020),
    ("205", 5000),
    ("206", 2020),
    ("207", 2040),
    ("208", 5040),
    ("209", 2060),
    ("211", 2045),
    ("212", 5045),
    ("299", 2020),
    ("300", 4000),
    ("301", 4020),
    ("302", 4030),
    ("303", 4000),
    ("305", 4060),
    ("306", 4070),
    ("400", 4050),
    ("401", 4050),
    ("402", 4030),
    ("403", 1000),
    ("404", 1040),
    ("405", 1000),
    ("406", 4060),
    ("407", 4070),
    ("408", 1000),
    ("500", 6000),
    ("600", 8000),
    ("601", 7020),
    ("602", 7030),
    ("699", 8010),
];

/// Translation between an indexer's local category codes and canonical ids.
///
/// Codes that map nowhere resolve to [`CategoryId::UNKNOWN`] instead of
/// being dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMap {
    #[serde(default)]
    pub entries: BTreeMap<String, CategoryId>,
    /// Local codes that are already standard ids map to themselves.
    #[serde(default = "default_passthrough")]
    pub standard_passthrough: bool,
}

fn default_passthrough() -> bool {
    true
}

impl Default for CategoryMap {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            standard_passthrough: true,
        }
    }
}

impl CategoryMap {
    /// The built-in mapping for an indexer kind.
    pub fn for_kind(kind: IndexerKind) -> Self {
        if kind.speaks_standard_categories() {
            return Self::default();
        }
        Self {
            entries: APIBAY_CATEGORIES
                .iter()
                .map(|(local, id)| (local.to_string(), CategoryId(*id)))
                .collect(),
            standard_passthrough: false,
        }
    }

    pub fn insert(&mut self, local: impl Into<String>, canonical: CategoryId) {
        self.entries.insert(local.into(), canonical);
    }

    pub fn resolve(&self, local: &str) -> CategoryId {
        let local = local.trim();
        if let Some(id) = self.entries.get(local) {
            return *id;
        }
        if self.standard_passthrough {
            if let Ok(code) = local.parse::<u32>() {
                let id = CategoryId(code);
                // Torznab custom ranges (100000+) are indexer specific.
                if id.is_standard() && !id.is_unknown() {
                    return id;
                }
            }
        }
        CategoryId::UNKNOWN
    }

    /// Resolve a list of local codes, deduplicated, unknown kept once.
    pub fn resolve_all<'a>(&self, locals: impl IntoIterator<Item = &'a str>) -> Vec<CategoryId> {
        let mut out: Vec<CategoryId> = locals.into_iter().map(|l| self.resolve(l)).collect();
        out.sort();
        out.dedup();
        if out.len() > 1 {
            out.retain(|c| !c.is_unknown());
        }
        if out.is_empty() {
            out.push(CategoryId::UNKNOWN);
        }
        out
    }

    /// Local codes to send when querying for `canonical` categories.
    pub fn to_local(&self, canonical: &[CategoryId]) -> Vec<String> {
        let mut out = Vec::new();
        for want in canonical.iter().filter(|c| !c.is_unknown()) {
            if self.standard_passthrough && want.is_standard() {
                out.push(want.0.to_string());
            }
            for (local, id) in &self.entries {
                if (id == want || id.parent() == *want) && !out.contains(local) {
                    out.push(local.clone());
                }
            }
        }
        out.sort();
        out.dedup();
        out
    }
}

/// Whether a release's categories satisfy a requested category set.
///
/// An empty request matches everything. A release category matches a
/// requested id when equal or when its parent is the requested id. A release
/// without a known category matches only when `UNKNOWN` is requested.
pub fn categories_match(release: &[CategoryId], requested: &[CategoryId]) -> bool {
    if requested.is_empty() {
        return true;
    }
    let known: Vec<CategoryId> = release.iter().copied().filter(|c| !c.is_unknown()).collect();
    if known.is_empty() {
        return requested.contains(&CategoryId::UNKNOWN);
    }
    known.iter().any(|have| {
        requested
            .iter()
            .any(|want| !want.is_unknown() && (have == want || have.parent() == *want))
    })
}
