//! Deterministic cross-reference and glossary selection.
//!
//! Every pseudo-random choice for a request is driven by a single seed:
//!
//! ```text
//! seed = xxh3_64("{book}|{chapter}|{verse}|{version}|{motif1,motif2,...}")
//! ```
//!
//! The seed initialises a SplitMix64 generator, and selections are taken
//! from the head of a Fisher-Yates shuffle (`i` from `n-1` down to `1`,
//! `j = next() % (i + 1)`). Identical inputs always produce identical output.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;
use xxhash_rust::xxh3::xxh3_64;

use crate::canon::Testament;
use crate::motif::MotifSet;
use crate::reference::{self, Reference, normalize_key};

/// SplitMix64 pseudo-random generator.
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform-ish index in `0..bound` (`bound` must be non-zero).
    pub fn below(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }

    /// In-place Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.below(i + 1);
            items.swap(i, j);
        }
    }

    /// One item chosen uniformly, or `None` for an empty slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            items.get(self.below(items.len()))
        }
    }

    /// The first `k` items of a seeded shuffle of `items`.
    pub fn pick<T: Clone>(&mut self, items: &[T], k: usize) -> Vec<T> {
        let mut pool = items.to_vec();
        self.shuffle(&mut pool);
        pool.truncate(k);
        pool
    }

    /// Fork an independent generator for a sub-task (e.g. one section).
    pub fn fork(&self, salt: u64) -> Self {
        let mut base = self.clone();
        Self::new(base.next_u64() ^ salt.wrapping_mul(0xD6E8_FEB8_6659_FD93))
    }
}

/// Compute the request seed.
pub fn seed_for(reference: &Reference, version: &str, motifs: &MotifSet) -> u64 {
    let material = format!(
        "{}|{}|{}|{}|{}",
        reference.book.name,
        reference.chapter,
        reference.verse_key(),
        version,
        motifs.motifs.join(",")
    );
    xxh3_64(material.as_bytes())
}

/// A topical group of citations.
struct Bucket {
    pattern: &'static LazyLock<Regex>,
    citations: &'static [&'static str],
}

macro_rules! bucket_pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect("bucket regex should compile"));
    };
}

// Patterns run against motif text folded by `reference::fold` (no accents).
bucket_pattern!(CREATION, r"creat|creation|lumiere|commencement|cieux|terre|parole");
bucket_pattern!(COVENANT, r"allian|promesse|abraham|circoncision|\bloi\b|sinai");
bucket_pattern!(GOSPEL, r"evangile|grace|salut|croix|redemption|\bfoi\b|naissance|royaume");
bucket_pattern!(WISDOM, r"sagesse|louange|psaume|adoration|crainte|confiance");
bucket_pattern!(PROPHETIC, r"prophet|appel|vocation|repentance|jugement|lamentation");
bucket_pattern!(SPIRIT, r"esprit|eglise|communaut|pentecote|corps|temoignage");

static BUCKETS: [Bucket; 6] = [
    Bucket {
        pattern: &CREATION,
        citations: &[
            "Psaumes 19:1-4",
            "Jean 1:1-3",
            "Colossiens 1:16-17",
            "Hébreux 11:3",
            "Psaumes 104:24",
            "Ésaïe 40:26",
        ],
    },
    Bucket {
        pattern: &COVENANT,
        citations: &[
            "Genèse 15:6",
            "Jérémie 31:31-34",
            "Hébreux 8:6-13",
            "Galates 3:29",
            "Exode 19:5-6",
        ],
    },
    Bucket {
        pattern: &GOSPEL,
        citations: &[
            "Jean 3:16",
            "Romains 3:23-24",
            "Éphésiens 2:8-9",
            "1 Corinthiens 15:3-4",
            "Romains 5:8",
            "Tite 3:5",
        ],
    },
    Bucket {
        pattern: &WISDOM,
        citations: &[
            "Proverbes 1:7",
            "Psaumes 103:1-5",
            "Jacques 1:5",
            "Psaumes 150:6",
            "Colossiens 3:16",
        ],
    },
    Bucket {
        pattern: &PROPHETIC,
        citations: &[
            "Ésaïe 6:8",
            "Jérémie 1:5",
            "Ézéchiel 37:4-5",
            "Joël 2:12-13",
            "Amos 5:24",
        ],
    },
    Bucket {
        pattern: &SPIRIT,
        citations: &[
            "Actes 2:42-47",
            "1 Corinthiens 12:12-13",
            "Éphésiens 4:4-6",
            "Galates 5:22-23",
            "Romains 8:14-16",
        ],
    },
];

const DEFAULT_OLD: &[&str] = &[
    "Deutéronome 6:4-5",
    "Psaumes 23:1",
    "Ésaïe 53:5",
    "Michée 6:8",
    "Proverbes 3:5-6",
];

const DEFAULT_NEW: &[&str] = &[
    "Matthieu 5:3-10",
    "Jean 15:5",
    "Romains 12:1-2",
    "Philippiens 4:6-7",
    "1 Jean 4:7-8",
];

/// Fixed glossary: term and short definition.
const GLOSSARY: &[(&str, &str)] = &[
    ("Alliance", "engagement solennel par lequel Dieu se lie à son peuple"),
    ("Grâce", "faveur imméritée que Dieu accorde au pécheur"),
    ("Rédemption", "rachat de l'homme par le prix payé à la croix"),
    ("Sainteté", "mise à part pour Dieu et pureté de son caractère"),
    ("Foi", "confiance personnelle en Dieu et en sa parole"),
    ("Repentance", "changement de pensée qui se détourne du péché vers Dieu"),
    ("Sagesse", "art de vivre selon la crainte de l'Éternel"),
    ("Esprit", "souffle de Dieu qui donne la vie et sanctifie"),
    ("Royaume", "règne de Dieu manifesté en Christ"),
    ("Justification", "déclaration de justice accordée par la foi"),
    ("Espérance", "attente assurée de l'accomplissement des promesses"),
    ("Louange", "reconnaissance publique de la grandeur de Dieu"),
];

/// Buckets whose patterns match the motifs, in bucket order.
fn matching_buckets(motifs: &MotifSet) -> Vec<&'static Bucket> {
    let folded = reference::fold(&motifs.motifs.join(" "));
    BUCKETS
        .iter()
        .filter(|b| b.pattern.is_match(&folded))
        .collect()
}

/// Candidate citations for a reference: matched buckets, or the testament
/// default; deduplicated and excluding the reference's own chapter.
pub fn candidate_citations(reference: &Reference, motifs: &MotifSet) -> Vec<&'static str> {
    let buckets = matching_buckets(motifs);
    let union: Vec<&'static str> = if buckets.is_empty() {
        match reference.book.testament {
            Testament::Old => DEFAULT_OLD.to_vec(),
            Testament::New => DEFAULT_NEW.to_vec(),
        }
    } else {
        buckets
            .iter()
            .flat_map(|b| b.citations.iter().copied())
            .collect()
    };

    let own_chapter = normalize_key(&format!("{} {}:", reference.book.name, reference.chapter));
    let mut seen = HashSet::new();
    union
        .into_iter()
        .filter(|c| seen.insert(normalize_key(c)))
        .filter(|c| !normalize_key(c).starts_with(&own_chapter))
        .collect()
}

/// Select up to `k` cross-references with the seeded shuffle.
pub fn select_citations(
    reference: &Reference,
    motifs: &MotifSet,
    rng: &mut SeededRng,
    k: usize,
) -> Vec<&'static str> {
    let candidates = candidate_citations(reference, motifs);
    rng.pick(&candidates, k)
}

/// Pick `k` glossary entries rendered as `Terme : définition`.
pub fn select_glossary(rng: &mut SeededRng, k: usize) -> Vec<(&'static str, &'static str)> {
    rng.pick(GLOSSARY, k)
}

/// External site used for citation hyperlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkStyle {
    #[default]
    BibleGateway,
    YouVersion,
}

impl LinkStyle {
    /// Parse a configuration value; unknown values fall back to BibleGateway.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "youversion" | "bible.com" => Self::YouVersion,
            _ => Self::BibleGateway,
        }
    }
}

/// YouVersion numeric ids for common version codes.
fn youversion_id(version: &str) -> u32 {
    match version.to_ascii_uppercase().as_str() {
        "KJV" => 1,
        "ESV" => 59,
        "NIV" => 111,
        "BDS" => 21,
        "S21" => 152,
        "PDV2017" => 133,
        _ => 93, // LSG
    }
}

/// Build the external URL for a citation.
///
/// Returns `None` only when a YouVersion link cannot resolve the citation.
pub fn citation_url(citation: &str, version: &str, style: LinkStyle) -> Option<String> {
    match style {
        LinkStyle::BibleGateway => {
            let url = Url::parse_with_params(
                "https://www.biblegateway.com/passage/",
                &[("search", citation), ("version", version)],
            )
            .ok()?;
            Some(url.to_string())
        }
        LinkStyle::YouVersion => {
            let r = reference::parse_citation(citation).ok()?;
            let mut path = format!(
                "https://www.bible.com/bible/{}/{}.{}",
                youversion_id(version),
                r.book.external_code,
                r.chapter
            );
            if let Some(v) = r.verse {
                path.push('.');
                path.push_str(&v.to_string());
            }
            path.push('.');
            path.push_str(&version.to_ascii_uppercase());
            Some(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genesis_one() -> Reference {
        Reference::parse("Genèse", "1", "").unwrap()
    }

    fn creation_motifs() -> MotifSet {
        MotifSet::new(["création", "lumière"], ["fidèle"])
    }

    #[test]
    fn splitmix_is_reproducible() {
        let mut a = SeededRng::new(42);
        let mut b = SeededRng::new(42);
        let xs: Vec<_> = (0..8).map(|_| a.next_u64()).collect();
        let ys: Vec<_> = (0..8).map(|_| b.next_u64()).collect();
        assert_eq!(xs, ys);
        assert_ne!(xs[0], xs[1]);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = SeededRng::new(7);
        let mut items: Vec<u32> = (0..20).collect();
        rng.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn selection_is_deterministic() {
        let r = genesis_one();
        let m = creation_motifs();
        let run = || {
            let mut rng = SeededRng::new(seed_for(&r, "LSG", &m));
            select_citations(&r, &m, &mut rng, 3)
        };
        assert_eq!(run(), run());
        assert_eq!(run().len(), 3);
    }

    #[test]
    fn seed_changes_with_any_input() {
        let r = genesis_one();
        let m = creation_motifs();
        let base = seed_for(&r, "LSG", &m);
        assert_ne!(base, seed_for(&r, "KJV", &m));
        assert_ne!(base, seed_for(&Reference::parse("Genèse", "2", "").unwrap(), "LSG", &m));
        assert_ne!(base, seed_for(&Reference::parse("Genèse", "1", "1").unwrap(), "LSG", &m));
        assert_ne!(
            base,
            seed_for(&r, "LSG", &MotifSet::new(["lumière", "création"], ["fidèle"]))
        );
    }

    #[test]
    fn creation_motifs_pick_creation_bucket() {
        let candidates = candidate_citations(&genesis_one(), &creation_motifs());
        assert!(candidates.contains(&"Jean 1:1-3"));
        assert!(!candidates.contains(&"Amos 5:24"));
    }

    #[test]
    fn unmatched_motifs_fall_back_to_testament_default() {
        let m = MotifSet::new(["xyz"], ["saint"]);
        let old = candidate_citations(&genesis_one(), &m);
        assert_eq!(old, DEFAULT_OLD.to_vec());
        let new = candidate_citations(&Reference::parse("Marc", "1", "").unwrap(), &m);
        assert_eq!(new, DEFAULT_NEW.to_vec());
    }

    #[test]
    fn own_chapter_is_excluded_and_union_is_deduped() {
        let r = Reference::parse("Jean", "3", "").unwrap();
        // grâce -> gospel bucket (contains Jean 3:16); alliance -> covenant
        let m = MotifSet::new(["grâce", "alliance", "évangile"], ["bon"]);
        let c = candidate_citations(&r, &m);
        assert!(!c.contains(&"Jean 3:16"));
        let unique: HashSet<_> = c.iter().map(|s| normalize_key(s)).collect();
        assert_eq!(unique.len(), c.len());
    }

    #[test]
    fn k_larger_than_pool_returns_whole_pool() {
        let r = genesis_one();
        let m = MotifSet::new(["xyz"], ["saint"]);
        let mut rng = SeededRng::new(1);
        assert_eq!(select_citations(&r, &m, &mut rng, 50).len(), DEFAULT_OLD.len());
    }

    #[test]
    fn glossary_pick_is_deterministic() {
        let a = select_glossary(&mut SeededRng::new(9), 3);
        let b = select_glossary(&mut SeededRng::new(9), 3);
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn biblegateway_url_is_encoded() {
        let url = citation_url("Jean 3:16", "LSG", LinkStyle::BibleGateway).unwrap();
        assert_eq!(
            url,
            "https://www.biblegateway.com/passage/?search=Jean+3%3A16&version=LSG"
        );
    }

    #[test]
    fn youversion_url_uses_usfm() {
        let url = citation_url("1 Corinthiens 15:3-4", "LSG", LinkStyle::YouVersion).unwrap();
        assert_eq!(url, "https://www.bible.com/bible/93/1CO.15.3-4.LSG");
        assert!(citation_url("nowhere 1:1", "LSG", LinkStyle::YouVersion).is_none());
    }

    #[test]
    fn link_style_parsing() {
        assert_eq!(LinkStyle::parse("YouVersion"), LinkStyle::YouVersion);
        assert_eq!(LinkStyle::parse("anything"), LinkStyle::BibleGateway);
    }
}
