//! Label vocabulary for zero-shot listing classification.
//!
//! One table maps every label to its category index and optional
//! subcategory slug. Category indices are the marketplace category ids
//! (1 = auto-motor, 3 = fietsen, 8 = elektronica, ...); 0 is the fallback for
//! labels outside the table.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// Category index for labels the table does not know.
pub const FALLBACK_CATEGORY: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelEntry {
    pub label: String,
    pub category_index: u32,
    pub subcategory_slug: Option<String>,
}

/// Ordered, immutable label table.
#[derive(Debug, Clone)]
pub struct LabelVocabulary {
    entries: Vec<LabelEntry>,
    by_label: HashMap<String, usize>,
}

impl LabelVocabulary {
    /// Build a vocabulary from `(label, category_index, subcategory_slug)`
    /// records. The first record wins when a label is repeated.
    pub fn new<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = (S, u32, Option<S>)>,
        S: Into<String>,
    {
        let mut entries = Vec::new();
        let mut by_label = HashMap::new();

        for (label, category_index, subcategory_slug) in records {
            let label = label.into();
            if by_label.contains_key(&label) {
                log::warn!("duplicate label '{}' ignored", label);
                continue;
            }
            by_label.insert(label.clone(), entries.len());
            entries.push(LabelEntry {
                label,
                category_index,
                subcategory_slug: subcategory_slug.map(Into::into),
            });
        }

        Self { entries, by_label }
    }

    /// The built-in marketplace vocabulary.
    pub fn marketplace() -> &'static LabelVocabulary {
        &MARKETPLACE
    }

    pub fn entries(&self) -> &[LabelEntry] {
        &self.entries
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.label.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.by_label.contains_key(label)
    }

    /// Category index of `label`, [`FALLBACK_CATEGORY`] when unknown.
    pub fn category_index(&self, label: &str) -> u32 {
        self.by_label
            .get(label)
            .map(|&i| self.entries[i].category_index)
            .unwrap_or(FALLBACK_CATEGORY)
    }

    /// Subcategory slug of `label`, if it has one.
    pub fn subcategory_slug(&self, label: &str) -> Option<&str> {
        self.by_label
            .get(label)
            .and_then(|&i| self.entries[i].subcategory_slug.as_deref())
    }
}

static MARKETPLACE: Lazy<LabelVocabulary> = Lazy::new(|| LabelVocabulary::new(MARKETPLACE_LABELS.iter().copied()));

#[rustfmt::skip]
const MARKETPLACE_LABELS: &[(&str, u32, Option<&str>)] = &[
    // auto-motor
    ("auto",                1,  Some("personenauto-s")),
    ("oldtimer",            1,  Some("oldtimers")),
    ("bestelwagen",         1,  Some("bedrijfswagens")),
    ("auto-onderdelen",     1,  Some("onderdelen-auto-s")),
    // motoren-en-scooters
    ("motorfiets",          2,  Some("motoren")),
    ("scooter",             2,  None),
    // fietsen
    ("fiets",               3,  Some("stadsfietsen")),
    ("racefiets",           3,  Some("racefietsen")),
    ("mountainbike",        3,  Some("mountainbikes")),
    ("elektrische fiets",   3,  Some("elektrische-fietsen")),
    ("brommer",             3,  Some("brommers")),
    ("fietsonderdelen",     3,  Some("onderdelen-fietsen")),
    // caravans-en-kamperen
    ("caravan",             4,  Some("caravans")),
    ("camper",              4,  None),
    ("tent",                4,  None),
    // watersport
    ("boot",                5,  Some("motorboten")),
    ("kano",                5,  None),
    // huis-en-inrichting
    ("meubel",              6,  Some("meubels")),
    ("verlichting",         6,  Some("decoratie")),
    ("decoratie",           6,  Some("decoratie")),
    ("keuken",              6,  Some("keuken")),
    // tuin-en-doe-het-zelf
    ("tuinmeubelen",        7,  Some("tuingereedschap")),
    ("tuingereedschap",     7,  Some("tuingereedschap")),
    ("bbq",                 7,  Some("tuingereedschap")),
    ("zwembad",             7,  Some("tuingereedschap")),
    // elektronica
    ("televisie",           8,  Some("audio-en-tv")),
    ("audio",               8,  Some("audio-en-tv")),
    ("koptelefoon",         8,  Some("telefonie")),
    ("laptop",              8,  Some("computers")),
    ("desktop",             8,  Some("computers")),
    ("tablet",              8,  Some("computers")),
    ("smartphone",          8,  Some("telefonie")),
    // gaming
    ("spelconsole",         9,  Some("consoles")),
    ("games",               9,  Some("games")),
    ("game controller",     9,  Some("accessoires")),
    // foto-en-video
    ("camera",              10, Some("camera-s")),
    // huishoudelijk
    ("wasmachine",          11, Some("wassen-en-drogen")),
    // kleding-en-accessoires
    ("dameskleding",        12, Some("dames")),
    ("herenkleding",        12, Some("heren")),
    ("schoenen",            12, Some("schoenen")),
    ("tas",                 12, Some("heren")),
    // sieraden-en-horloges
    ("horloge",             13, None),
    ("sieraden",            13, None),
    // kinderen-en-baby-s
    ("kinderkleding",       15, Some("kleding")),
    ("kinderwagen",         15, Some("kinderwagens")),
    ("speelgoed",           15, Some("speelgoed")),
    // sport-en-vrije-tijd
    ("fitness",             16, Some("fitness")),
    ("voetbal",             16, Some("teamsporten")),
    // muziek
    ("gitaar",              17, Some("snaarinstrumenten")),
    ("piano",               17, None),
    ("vinyl",               17, None),
    // boeken-en-media
    ("boeken",              18, Some("romans")),
    // film-en-series
    ("films",               19, Some("dvd")),
    // kunst-en-antiek
    ("schilderij",          20, None),
    // verzamelen
    ("modelbouw",           21, Some("modelbouw")),
    ("munten",              21, Some("munten")),
    // dieren
    ("hond",                22, Some("honden")),
    ("vogel",               22, Some("vogels")),
    // bouw-en-gereedschap
    ("gereedschap",         24, Some("gereedschap")),
    ("bouwmaterialen",      24, Some("bouwmaterialen")),
    ("sanitair",            24, Some("afwerking")),
    // agrarisch
    ("tractor",             26, None),
];
