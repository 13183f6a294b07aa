//! Motif sets and the local motif heuristic.
//!
//! A [`MotifSet`] normally comes from the LLM provider. When that call fails
//! the heuristic here maps the reference onto a fixed motif list and the book
//! genre onto a fixed list of divine attributes. The heuristic is total: it
//! never returns an empty list.

use serde::{Deserialize, Serialize};

use crate::canon::{Genre, Testament};
use crate::reference::Reference;

/// Topical keywords and divine attributes driving study composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotifSet {
    pub motifs: Vec<String>,
    #[serde(rename = "attributsDivins")]
    pub attributes: Vec<String>,
}

impl MotifSet {
    pub fn new<M, A>(motifs: M, attributes: A) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            motifs: motifs.into_iter().map(Into::into).collect(),
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    /// Trim entries, drop blanks and duplicates, and cap each list.
    ///
    /// Returns `None` when either list ends up empty.
    pub fn sanitized(self, max_len: usize) -> Option<Self> {
        fn tidy(items: Vec<String>, max_len: usize) -> Vec<String> {
            let mut out: Vec<String> = Vec::new();
            for item in items {
                let item = item.split_whitespace().collect::<Vec<_>>().join(" ");
                if item.is_empty() || out.iter().any(|o| o.eq_ignore_ascii_case(&item)) {
                    continue;
                }
                out.push(item);
                if out.len() == max_len {
                    break;
                }
            }
            out
        }

        let motifs = tidy(self.motifs, max_len);
        let attributes = tidy(self.attributes, max_len);
        if motifs.is_empty() || attributes.is_empty() {
            None
        } else {
            Some(Self { motifs, attributes })
        }
    }
}

/// Derive a motif set locally from the reference alone.
pub fn heuristic(reference: &Reference) -> MotifSet {
    MotifSet::new(
        heuristic_motifs(reference).iter().copied(),
        attributes_for(reference.book.genre).iter().copied(),
    )
}

fn heuristic_motifs(reference: &Reference) -> &'static [&'static str] {
    let chapter = reference.chapter;
    match (reference.book.external_code, chapter) {
        ("GEN", 1..=2) => &["création", "lumière", "image de Dieu"],
        ("GEN", 3..=11) => &["chute", "jugement", "promesse de salut"],
        ("GEN", _) => &["alliance", "promesse", "foi d'Abraham"],
        ("EXO", 1..=18) => &["délivrance", "Pâque", "rédemption"],
        ("EXO", _) => &["alliance", "loi", "présence de Dieu"],
        ("LEV" | "NUM" | "DEU", _) => &["alliance", "sainteté", "obéissance"],
        ("JOB" | "PRO" | "ECC", _) => &["sagesse", "crainte de Dieu", "souffrance"],
        ("PSA", _) => &["louange", "confiance", "adoration"],
        ("SNG", _) => &["amour", "fidélité", "louange"],
        ("LAM", _) => &["lamentation", "repentance", "espérance"],
        ("JHN", 3) => &["nouvelle naissance", "salut", "foi"],
        ("JHN", 1) => &["Parole", "lumière", "création"],
        ("MAT" | "MRK" | "LUK" | "JHN", _) => &["évangile", "royaume", "grâce"],
        ("ACT", 2) => &["Esprit", "Pentecôte", "église"],
        ("ACT", _) => &["Esprit", "église", "témoignage"],
        ("REV", _) => &["espérance", "victoire", "jugement"],
        _ => match reference.book.genre {
            Genre::Prophetic => &["appel prophétique", "repentance", "espérance"],
            Genre::Epistolary => &["grâce", "foi", "vie dans l'Esprit"],
            Genre::Poetic => &["louange", "sagesse"],
            Genre::Narrative => match reference.book.testament {
                Testament::Old => &["fidélité de Dieu", "alliance", "royauté"],
                Testament::New => &["évangile", "disciples", "grâce"],
            },
        },
    }
}

/// Fixed divine-attribute phrases per genre.
pub fn attributes_for(genre: Genre) -> &'static [&'static str] {
    match genre {
        Genre::Narrative => &[
            "fidèle à ses promesses",
            "souverain dans l'histoire",
            "patient envers son peuple",
        ],
        Genre::Poetic => &["digne de louange", "proche de ceux qui l'invoquent", "bon"],
        Genre::Prophetic => &["saint", "juste", "riche en miséricorde"],
        Genre::Epistolary => &[
            "plein de grâce",
            "Père de notre Seigneur Jésus-Christ",
            "source de toute sagesse",
        ],
    }
}
