//! Font lookup backed by the system font database.

use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use rusttype::Font;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Shared, loaded font.
pub type SharedFont = Arc<Font<'static>>;

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct FontKey {
    family: String,
    bold: bool,
    italic: bool,
}

fn system_db() -> &'static Database {
    static DB: OnceLock<Database> = OnceLock::new();
    DB.get_or_init(|| {
        let mut db = Database::new();
        db.load_system_fonts();
        log::debug!("Loaded {} system font faces", db.len());
        db
    })
}

/// Split a CSS-like family list (`"Open Sans", Arial, sans-serif`).
fn family_names(family: &str) -> Vec<String> {
    family
        .split(',')
        .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|f| !f.is_empty())
        .collect()
}

fn to_family(name: &str) -> Family<'_> {
    match name.to_ascii_lowercase().as_str() {
        "sans" | "sans-serif" => Family::SansSerif,
        "serif" => Family::Serif,
        "monospace" => Family::Monospace,
        "cursive" => Family::Cursive,
        "fantasy" => Family::Fantasy,
        _ => Family::Name(name),
    }
}

fn load_face(db: &Database, id: fontdb::ID) -> Option<Font<'static>> {
    db.with_face_data(id, |data, index| Font::try_from_vec_and_index(data.to_vec(), index))
        .flatten()
}

fn query_system(db: &Database, families: &[Family<'_>], bold: bool, italic: bool) -> Option<Font<'static>> {
    let query = Query {
        families,
        weight: if bold { Weight::BOLD } else { Weight::NORMAL },
        stretch: Stretch::Normal,
        style: if italic { Style::Italic } else { Style::Normal },
    };
    let id = db.query(&query)?;
    load_face(db, id)
}

/// Resolves family/style requests to fonts, caching results.
///
/// Lookup order: registered fonts, the requested system family, the
/// generic sans-serif family, then any installed face.
#[derive(Default)]
pub struct FontBook {
    registered: HashMap<FontKey, SharedFont>,
    cache: HashMap<FontKey, Option<SharedFont>>,
    use_system: bool,
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("registered", &self.registered.len())
            .field("cached", &self.cache.len())
            .field("use_system", &self.use_system)
            .finish()
    }
}

impl FontBook {
    /// A font book that falls back to system fonts.
    pub fn new() -> Self {
        Self {
            use_system: true,
            ..Self::default()
        }
    }

    /// A font book that only knows registered fonts.
    pub fn without_system_fonts() -> Self {
        Self::default()
    }

    /// Register font bytes under a family name and style.
    /// Returns false if the data is not a usable font.
    pub fn register(&mut self, family: &str, bold: bool, italic: bool, data: Vec<u8>) -> bool {
        let Some(font) = Font::try_from_vec(data) else {
            log::warn!("Ignoring invalid font data for family {:?}", family);
            return false;
        };
        let key = FontKey {
            family: family.to_ascii_lowercase(),
            bold,
            italic,
        };
        self.registered.insert(key, Arc::new(font));
        self.cache.clear();
        true
    }

    /// Resolve a font for the given family list and style.
    pub fn font_for(&mut self, family: &str, bold: bool, italic: bool) -> Option<SharedFont> {
        let key = FontKey {
            family: family.to_string(),
            bold,
            italic,
        };
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }
        let resolved = self.resolve(family, bold, italic);
        if resolved.is_none() {
            log::warn!("No font found for family {:?}", family);
        }
        self.cache.insert(key, resolved.clone());
        resolved
    }

    fn resolve(&self, family: &str, bold: bool, italic: bool) -> Option<SharedFont> {
        let names = family_names(family);

        for name in &names {
            if let Some(font) = self.registered_match(name, bold, italic) {
                return Some(font);
            }
        }

        if self.use_system {
            let db = system_db();
            let mut families: Vec<Family<'_>> = names.iter().map(|n| to_family(n)).collect();
            families.push(Family::SansSerif);
            if let Some(font) = query_system(db, &families, bold, italic) {
                return Some(Arc::new(font));
            }
            if let Some(font) = db.faces().find_map(|face| load_face(db, face.id)) {
                return Some(Arc::new(font));
            }
        }

        // Any registered font beats nothing
        self.registered
            .iter()
            .min_by(|a, b| a.0.family.cmp(&b.0.family))
            .map(|(_, font)| font.clone())
    }

    fn registered_match(&self, name: &str, bold: bool, italic: bool) -> Option<SharedFont> {
        let family = name.to_ascii_lowercase();
        let exact = FontKey {
            family: family.clone(),
            bold,
            italic,
        };
        if let Some(font) = self.registered.get(&exact) {
            return Some(font.clone());
        }
        let regular = FontKey {
            family,
            bold: false,
            italic: false,
        };
        self.registered.get(&regular).cloned()
    }
}

/// Sorted list of installed font family names.
pub fn list_font_families() -> Vec<String> {
    let mut names: Vec<String> = system_db()
        .faces()
        .flat_map(|face| face.families.iter().map(|(name, _)| name.clone()))
        .collect();
    names.sort();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_names() {
        assert_eq!(
            family_names(r#""Open Sans", Arial , sans-serif"#),
            vec!["Open Sans", "Arial", "sans-serif"]
        );
        assert!(family_names("  ").is_empty());
    }

    #[test]
    fn test_generic_families() {
        assert_eq!(to_family("Sans-Serif"), Family::SansSerif);
        assert_eq!(to_family("Arial"), Family::Name("Arial"));
    }

    #[test]
    fn test_without_system_fonts_resolves_nothing() {
        let mut book = FontBook::without_system_fonts();
        assert!(book.font_for("Arial", false, false).is_none());
        assert!(!book.register("Broken", false, false, vec![1, 2, 3]));
    }
}
