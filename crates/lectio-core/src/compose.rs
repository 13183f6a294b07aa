//! Study-section composition.
//!
//! A study is the fixed 28-section outline for one reference. Each section
//! is built from static prose templates interpolated with the reference,
//! motifs picked by the seeded generator and cross-reference hyperlinks.
//! Composition is a pure function of its inputs and cannot fail.
//!
//! All interpolated values go through maud, so motifs coming back from the
//! LLM provider are HTML-escaped.

use std::sync::LazyLock;

use maud::{Markup, html};
use regex::Regex;
use serde::Serialize;

use crate::canon::{Genre, Testament};
use crate::motif::MotifSet;
use crate::reference::Reference;
use crate::select::{self, LinkStyle, SeededRng};

/// Number of sections in every study.
pub const SECTION_COUNT: usize = 28;

/// One section of a generated study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudySection {
    pub id: u32,
    pub title: String,
    pub description: String,
    /// HTML-safe prose.
    pub content: String,
}

/// A complete generated study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Study {
    pub reference: String,
    pub version: String,
    pub sections: Vec<StudySection>,
}

/// How a section body is produced.
#[derive(Clone, Copy)]
enum Body {
    /// Generic prose template(s), one picked per request.
    Prose(&'static [&'static str]),
    /// Genre-specific prose.
    ByGenre,
    /// Review of the previous chapter.
    Previous,
    /// Prose followed by a glossary list.
    Glossary(&'static str),
    /// Prose followed by a list of citations.
    CitationList(&'static str),
    /// Section 1.
    OpeningPrayer,
}

struct Outline {
    title: &'static str,
    description: &'static str,
    body: Body,
    /// Cross-references appended to the section (0..=5).
    refs: usize,
    /// Motifs drawn for `{motifs}` (1..=3).
    motifs: usize,
    /// Citations always linked, before the selected ones.
    fixed: &'static [&'static str],
}

const fn outline(
    title: &'static str,
    description: &'static str,
    body: Body,
    refs: usize,
    motifs: usize,
) -> Outline {
    Outline {
        title,
        description,
        body,
        refs,
        motifs,
        fixed: &[],
    }
}

static OUTLINE: [Outline; SECTION_COUNT] = [
    outline(
        "Prière d'ouverture",
        "Invocation pour ouvrir l'étude",
        Body::OpeningPrayer,
        0,
        1,
    ),
    outline(
        "Canon et testament",
        "Place du livre dans l'ensemble des Écritures",
        Body::Prose(&[
            "{book} appartient à l'{testament} et relève du genre {genre}. Le chapitre {chapter} s'inscrit dans l'histoire du salut autour de {motifs}.",
            "Situé dans l'{testament}, le livre de {book} ({genre}) éclaire {motifs} dans l'unité du canon.",
        ]),
        1,
        2,
    ),
    outline(
        "Questions du chapitre précédent",
        "Révision et transition",
        Body::Previous,
        0,
        1,
    ),
    outline(
        "Titre du chapitre",
        "Résumé du passage en une formule",
        Body::Prose(&[
            "Proposition de titre pour {ref} : « {motif_title} ». Ce titre résume le mouvement du passage et oriente la lecture.",
        ]),
        0,
        1,
    ),
    outline(
        "Contexte historique",
        "Cadre historique et culturel",
        Body::Prose(&[
            "Replacer {ref} dans son contexte historique aide à comprendre comment Dieu, {attr}, se révèle à travers {motif}.",
            "Les circonstances historiques de {book} éclairent {ref} : repérez les lieux, les acteurs et l'époque pour mieux saisir {motif}.",
        ]),
        1,
        1,
    ),
    outline(
        "Structure littéraire",
        "Découpage et articulation du texte",
        Body::Prose(&[
            "Observez l'enchaînement des unités de {ref} : ouverture, développement autour de {motif}, puis conclusion. Repérez les répétitions et les mots-charnières.",
        ]),
        0,
        1,
    ),
    outline(
        "Genre littéraire",
        "Comment lire ce type de texte",
        Body::ByGenre,
        0,
        1,
    ),
    outline(
        "Auteur et généalogie",
        "Auteur, destinataires et lignées",
        Body::Prose(&[
            "La tradition rattache {book} à un auteur inspiré. Relevez dans {ref} les indices sur l'auteur, les destinataires et les généalogies.",
        ]),
        0,
        1,
    ),
    outline(
        "Verset-clé doctrinal",
        "Le verset qui condense l'enseignement",
        Body::Prose(&[
            "Choisissez dans {ref} le verset qui condense le mieux {motif}, puis reliez-le à la révélation d'un Dieu {attr}.",
        ]),
        1,
        1,
    ),
    outline(
        "Analyse exégétique",
        "Lecture attentive du texte",
        Body::Prose(&[
            "Lisez {ref} lentement : identifiez le sujet, les verbes principaux et les liens logiques. Le thème de {motif} se déploie verset après verset.",
        ]),
        1,
        1,
    ),
    outline(
        "Analyse lexicale",
        "Mots importants et leur sens",
        Body::Glossary("Quelques termes clés pour lire {ref} :"),
        0,
        1,
    ),
    outline(
        "Références croisées",
        "Passages parallèles",
        Body::Prose(&["Comparez {ref} avec les passages suivants qui développent {motifs}."]),
        5,
        3,
    ),
    outline(
        "Fondements théologiques",
        "Ce que le texte révèle de Dieu",
        Body::Prose(&[
            "{ref} révèle un Dieu {attr}. Ce fondement soutient toute la réflexion sur {motif}.",
        ]),
        2,
        1,
    ),
    outline(
        "Thématique doctrinale",
        "Thèmes dominants du passage",
        Body::Prose(&["Les thèmes dominants de {ref} sont {motifs}."]),
        2,
        3,
    ),
    outline(
        "Fruits spirituels",
        "Effets de la Parole dans la vie du croyant",
        Body::Prose(&[
            "Méditer {ref} produit reconnaissance, confiance et obéissance. Laissez {motif} transformer votre caractère.",
        ]),
        1,
        1,
    ),
    outline(
        "Types bibliques",
        "Figures et préfigurations",
        Body::Prose(&[
            "Cherchez dans {ref} les figures qui annoncent Christ, notamment autour de {motif}.",
        ]),
        2,
        1,
    ),
    outline(
        "Appui doctrinal",
        "Textes qui confirment l'enseignement",
        Body::Prose(&["D'autres textes confirment l'enseignement de {ref} sur {motif}."]),
        3,
        1,
    ),
    outline(
        "Comparaison entre versets",
        "Échos internes au passage",
        Body::Prose(&[
            "Comparez les versets de {ref} entre eux : où {motif} apparaît-il en premier, et comment est-il repris ?",
        ]),
        1,
        1,
    ),
    Outline {
        title: "Parallèle avec Actes 2",
        description: "Lien avec la naissance de l'Église",
        body: Body::Prose(&[
            "Mettez {ref} en regard d'Actes 2 : la communauté née de la Pentecôte vit {motif} par la puissance de l'Esprit.",
        ]),
        refs: 1,
        motifs: 1,
        fixed: &["Actes 2:1-4"],
    },
    outline(
        "Verset à mémoriser",
        "Un verset à apprendre par cœur",
        Body::Prose(&[
            "Retenez un verset de {ref} sur {motif} et répétez-le chaque jour de la semaine.",
        ]),
        1,
        1,
    ),
    outline(
        "Enseignement pour l'Église",
        "Portée communautaire",
        Body::Prose(&[
            "Pour l'Église, {ref} rappelle que {motif} se vit ensemble, dans l'unité et le service.",
        ]),
        2,
        1,
    ),
    outline(
        "Enseignement pour la famille",
        "Transmission au foyer",
        Body::Prose(&[
            "En famille, lisez {ref} et discutez de {motif} autour d'une question simple : qu'apprenons-nous sur Dieu ?",
        ]),
        1,
        1,
    ),
    outline(
        "Enseignement pour enfants",
        "Version adaptée aux plus jeunes",
        Body::Prose(&[
            "Racontez {ref} aux enfants avec des mots simples : Dieu est {attr}, et {motif} nous concerne aussi.",
        ]),
        0,
        1,
    ),
    outline(
        "Application missionnaire",
        "Témoigner autour de soi",
        Body::Prose(&[
            "{ref} pousse à partager {motif} avec ceux qui ne connaissent pas encore Dieu.",
        ]),
        2,
        1,
    ),
    outline(
        "Application pastorale",
        "Accompagner et consoler",
        Body::Prose(&[
            "Dans l'accompagnement pastoral, {ref} offre un appui pour parler de {motif} aux personnes éprouvées.",
        ]),
        2,
        1,
    ),
    outline(
        "Application personnelle",
        "Mise en pratique cette semaine",
        Body::Prose(&[
            "Demandez-vous comment {motif} change votre manière de vivre cette semaine, à la lumière de {ref}.",
        ]),
        1,
        1,
    ),
    outline(
        "Versets à retenir",
        "Sélection de versets pour la méditation",
        Body::CitationList("Versets à retenir en lien avec {ref} :"),
        4,
        1,
    ),
    outline(
        "Prière de fin",
        "Prière de clôture",
        Body::Prose(&[
            "Seigneur, merci pour ta parole dans {ref}. Toi qui es {attr}, grave en nous {motif} et conduis-nous dans l'obéissance. Amen.",
        ]),
        0,
        1,
    ),
];

/// Titles of the 28 sections in order.
pub fn section_titles() -> [&'static str; SECTION_COUNT] {
    std::array::from_fn(|i| OUTLINE[i].title)
}

const INVOCATIONS_OLD: &[&str] = &[
    "Éternel notre Dieu",
    "Dieu d'Abraham, d'Isaac et de Jacob",
    "Seigneur, Créateur des cieux et de la terre",
];

const INVOCATIONS_NEW: &[&str] = &[
    "Père céleste",
    "Dieu et Père de notre Seigneur Jésus-Christ",
    "Seigneur Jésus",
];

const DOXOLOGIES: &[&str] = &[
    "Au nom de Jésus, amen.",
    "À toi soient la gloire et la louange, maintenant et pour toujours. Amen.",
    "Nous te le demandons au nom de Jésus-Christ, notre Seigneur. Amen.",
];

fn prayer_clauses(genre: Genre) -> &'static [&'static str] {
    match genre {
        Genre::Narrative => &[
            "tandis que nous suivons le récit de {ref}, apprends-nous à discerner ta main dans l'histoire",
            "ouvre nos yeux sur ton œuvre au fil du récit de {ref}",
        ],
        Genre::Poetic => &[
            "que les paroles de {ref} deviennent notre propre prière",
            "accorde-nous de goûter la beauté de {ref} et d'y répondre par la louange",
        ],
        Genre::Prophetic => &[
            "rends-nous attentifs à ton appel dans {ref}",
            "que la parole de {ref} nous conduise à la repentance et à l'espérance",
        ],
        Genre::Epistolary => &[
            "éclaire notre intelligence pour recevoir l'enseignement de {ref}",
            "fortifie notre foi par la lecture de {ref}",
        ],
    }
}

fn genre_reading(genre: Genre) -> &'static str {
    match genre {
        Genre::Narrative => {
            "{ref} se lit comme un récit : personnages, lieux et dialogues portent le message sur {motif}."
        }
        Genre::Poetic => {
            "Le langage poétique de {ref}, fait de parallélismes et d'images, exprime {motif} avec intensité."
        }
        Genre::Prophetic => {
            "L'oracle de {ref} interpelle le peuple de Dieu : distinguez l'avertissement, la promesse et l'appel autour de {motif}."
        }
        Genre::Epistolary => {
            "L'argumentation de {ref} développe {motif} en vue de la vie concrète de l'Église ; suivez les connecteurs logiques."
        }
    }
}

/// Values interpolated into templates.
struct Vars<'a> {
    reference: &'a Reference,
    motif: String,
    motifs: String,
    attr: String,
}

impl Vars<'_> {
    fn fill(&self, template: &str) -> String {
        let book = self.reference.book;
        let testament = match book.testament {
            Testament::Old => "Ancien Testament",
            Testament::New => "Nouveau Testament",
        };
        // One pass, so substituted values are never re-read as placeholders.
        PLACEHOLDER
            .replace_all(template, |caps: &regex::Captures<'_>| match &caps[1] {
                "ref" => self.reference.display(),
                "book" => book.name.to_string(),
                "chapter" => self.reference.chapter.to_string(),
                "testament" => testament.to_string(),
                "genre" => book.genre.label().to_string(),
                "motif_title" => capitalize(&self.motif),
                "motifs" => self.motifs.clone(),
                "motif" => self.motif.clone(),
                "attr" => self.attr.clone(),
                _ => caps[0].to_string(),
            })
            .into_owned()
    }
}

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("placeholder regex should compile"));

/// Join items the French way: `a, b et c`.
fn join_fr(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} et {}", init.join(", "), last),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Render a list of citations as inline hyperlinks.
pub fn citation_links(citations: &[&str], version: &str, style: LinkStyle) -> Markup {
    html! {
        @for (i, citation) in citations.iter().enumerate() {
            @if i > 0 { ", " }
            @match select::citation_url(citation, version, style) {
                Some(url) => {
                    a href=(url) target="_blank" rel="noopener" { (citation) }
                },
                None => { (citation) },
            }
        }
    }
}

/// Compose the full 28-section study.
pub fn compose(reference: &Reference, motifs: &MotifSet, version: &str, style: LinkStyle) -> Study {
    let seed = select::seed_for(reference, version, motifs);
    let base = SeededRng::new(seed);

    let sections = OUTLINE
        .iter()
        .enumerate()
        .map(|(i, outline)| {
            let id = i as u32 + 1;
            let mut rng = base.fork(u64::from(id));
            let content = render_section(outline, reference, motifs, version, style, &mut rng);
            StudySection {
                id,
                title: outline.title.to_string(),
                description: outline.description.to_string(),
                content: sanitize(&content),
            }
        })
        .collect();

    tracing::debug!(
        reference = %reference,
        version = %version,
        seed = seed,
        "study composed"
    );

    Study {
        reference: reference.display(),
        version: version.to_string(),
        sections,
    }
}

fn render_section(
    outline: &Outline,
    reference: &Reference,
    motifs: &MotifSet,
    version: &str,
    style: LinkStyle,
    rng: &mut SeededRng,
) -> String {
    let picked = rng.pick(&motifs.motifs, outline.motifs.clamp(1, 3));
    let vars = Vars {
        reference,
        motif: picked.first().cloned().unwrap_or_default(),
        motifs: join_fr(&picked),
        attr: rng.choose(&motifs.attributes).cloned().unwrap_or_default(),
    };

    let mut citations: Vec<&str> = outline.fixed.to_vec();
    citations.extend(select::select_citations(
        reference,
        motifs,
        rng,
        outline.refs.min(5),
    ));

    let markup = match outline.body {
        Body::OpeningPrayer => {
            let invocations = match reference.book.testament {
                Testament::Old => INVOCATIONS_OLD,
                Testament::New => INVOCATIONS_NEW,
            };
            let invocation = rng.choose(invocations).copied().unwrap_or_default();
            let clause = rng
                .choose(prayer_clauses(reference.book.genre))
                .copied()
                .unwrap_or_default();
            let doxology = rng.choose(DOXOLOGIES).copied().unwrap_or_default();
            let prayer = format!(
                "{invocation}, toi qui es {}, {}. Que {} nourrisse notre méditation. {doxology}",
                vars.attr,
                vars.fill(clause),
                vars.motif
            );
            html! { p { (prayer) } }
        }
        Body::Prose(templates) => {
            let template = rng.choose(templates).copied().unwrap_or_default();
            html! {
                p { (vars.fill(template)) }
                @if !citations.is_empty() {
                    p class="refs" { "Voir aussi : " (citation_links(&citations, version, style)) }
                }
            }
        }
        Body::ByGenre => html! { p { (vars.fill(genre_reading(reference.book.genre))) } },
        Body::Previous => {
            let text = if reference.chapter <= 1 {
                format!(
                    "{} ouvre le livre de {} : notez ce que vous attendez de cette lecture et ce que vous savez déjà de {}.",
                    reference.display(),
                    reference.book.name,
                    vars.motif
                )
            } else {
                format!(
                    "Avant d'aborder {}, rappelez-vous {} {} : quels en étaient les personnages, le thème principal et la leçon retenue ?",
                    reference.display(),
                    reference.book.name,
                    reference.chapter - 1
                )
            };
            html! { p { (text) } }
        }
        Body::Glossary(intro) => {
            let entries = select::select_glossary(rng, 3);
            html! {
                p { (vars.fill(intro)) }
                ul {
                    @for (term, definition) in &entries {
                        li { strong { (term) } " : " (definition) }
                    }
                }
            }
        }
        Body::CitationList(intro) => html! {
            p { (vars.fill(intro)) }
            ul {
                @for citation in &citations {
                    li { (citation_links(std::slice::from_ref(citation), version, style)) }
                }
            }
        },
    };

    markup.into_string()
}

static HTML_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment regex should compile"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));

/// Final pass over section HTML: drop comments, normalise `&nbsp;`,
/// collapse whitespace.
pub fn sanitize(html: &str) -> String {
    let without_comments = HTML_COMMENT.replace_all(html, "");
    let spaced = without_comments
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace('\u{a0}', " ");
    WHITESPACE.replace_all(&spaced, " ").trim().to_string()
}
