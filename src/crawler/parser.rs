//! HTML parsers for results listings and review pages
//!
//! The rest of the pipeline only sees the [`ListingParser`] and
//! [`ReviewParser`] traits; [`AjumParser`] implements both for the markup
//! the review site currently serves.

use crate::isbn;
use crate::storage::{ReviewId, ReviewRecord};
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

/// Marker text printed at the bottom of every genuine review page
const REVIEW_DISCLAIMER: &str = "presserechtliche Verantwortung";

static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td.td_body").expect("valid selector"));
static LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));
static FORM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("form").expect("valid selector"));
static CELLS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("valid selector"));

/// Listing links are relative; only their query matters
static LINK_BASE: LazyLock<Url> =
    LazyLock::new(|| Url::parse("https://localhost/index.php").expect("valid base URL"));

static TOTAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"wurden\s(\d+)\sRezensionen").expect("valid regex"));
static LISTING_ISBN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ISBN[:\s]*([0-9Xx][0-9Xx\- ]{8,16}[0-9Xx])").expect("valid regex"));

/// Errors produced while parsing a page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("page has no {0}")]
    MissingElement(&'static str),

    #[error("page is not a review (disclaimer missing)")]
    NotAReview,

    #[error("invalid review ID {0:?}")]
    InvalidReviewId(String),
}

/// One hit of a results listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub review_id: ReviewId,
    /// Normalised ISBN shown next to the hit, if the listing prints one
    pub isbn: Option<String>,
}

/// Parsed results page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Hits in page order, each review ID once
    pub entries: Vec<ListingEntry>,

    /// Total number of hits announced by the page, if present
    pub total: Option<usize>,
}

/// Extracts hits from a results page
pub trait ListingParser: Send + Sync {
    fn parse_listing(&self, html: &str) -> Result<ListingPage, ParseError>;
}

/// Converts one review page into a record
pub trait ReviewParser: Send + Sync {
    fn parse_review(&self, id: &ReviewId, html: &str) -> Result<ReviewRecord, ParseError>;
}

/// Parser for the review site's markup
#[derive(Debug, Clone, Default)]
pub struct AjumParser {
    /// Listing links known to point at a wrong ID, mapped to the right one
    redirects: HashMap<String, String>,
}

impl AjumParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_redirects(redirects: HashMap<String, String>) -> Self {
        Self { redirects }
    }

    fn resolve_id(&self, raw: &str) -> Result<ReviewId, ParseError> {
        let id = self.redirects.get(raw).map(String::as_str).unwrap_or(raw);
        let id = ReviewId::new(id);
        if id.is_numeric() {
            Ok(id)
        } else {
            Err(ParseError::InvalidReviewId(raw.to_string()))
        }
    }
}

impl ListingParser for AjumParser {
    /// Collects review links (`...?id=<digits>`) inside the main table cell
    ///
    /// Every hit links its review twice, so IDs are deduplicated. The ISBN is
    /// taken from the table row containing the link when that row prints one.
    fn parse_listing(&self, html: &str) -> Result<ListingPage, ParseError> {
        let document = Html::parse_document(html);
        let total = TOTAL
            .captures(html)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());

        let Some(body) = document.select(&BODY).next() else {
            // A search without hits renders no results table at all
            if total.is_none() || total == Some(0) {
                return Ok(ListingPage {
                    entries: Vec::new(),
                    total,
                });
            }
            return Err(ParseError::MissingElement("results table"));
        };

        let mut entries: Vec<ListingEntry> = Vec::new();

        for link in body.select(&LINKS) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let Ok(url) = LINK_BASE.join(href.trim()) else {
                continue;
            };
            let Some(raw_id) = url
                .query_pairs()
                .find(|(k, _)| k == "id")
                .map(|(_, v)| v.into_owned())
            else {
                continue;
            };

            let review_id = self.resolve_id(&raw_id)?;
            let isbn = row_isbn(link);

            match entries.iter_mut().find(|e| e.review_id == review_id) {
                Some(existing) => {
                    if existing.isbn.is_none() {
                        existing.isbn = isbn;
                    }
                }
                None => entries.push(ListingEntry { review_id, isbn }),
            }
        }

        Ok(ListingPage { entries, total })
    }
}

/// ISBN printed in the table row around `link`
fn row_isbn(link: ElementRef<'_>) -> Option<String> {
    let row = link
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "tr")?;
    let text = row.text().collect::<String>();
    LISTING_ISBN
        .captures(&text)
        .and_then(|c| c.get(1))
        .map(|m| isbn::normalize(m.as_str()))
}

/// Field labels of the review table and where they go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Author,
    Title,
    Isbn,
    Translator,
    OriginalLanguage,
    Illustrator,
    Pages,
    Publisher,
    Genre,
    Series,
    Year,
    Price,
    Content,
    ReadingAge,
    Applications,
    Wolgast,
    Rating,
    Keywords,
    Remarks,
    Review,
}

const FIELDS: &[(&str, Field)] = &[
    ("Autor", Field::Author),
    ("Titel", Field::Title),
    ("ISBN", Field::Isbn),
    ("Übersetzer", Field::Translator),
    ("Originalsprache", Field::OriginalLanguage),
    ("Illustrator", Field::Illustrator),
    ("Seitenanzahl", Field::Pages),
    ("Verlag", Field::Publisher),
    ("Gattung", Field::Genre),
    ("Reihe", Field::Series),
    ("Jahr", Field::Year),
    ("Preis", Field::Price),
    ("Inhalt", Field::Content),
    ("Lesealter", Field::ReadingAge),
    ("Einsatzmöglichkeiten", Field::Applications),
    ("WolgastPreis", Field::Wolgast),
    ("Bewertung", Field::Rating),
    ("Schlagwörter", Field::Keywords),
    ("Anmerkungen", Field::Remarks),
    ("Beurteilungstext", Field::Review),
];

impl ReviewParser for AjumParser {
    /// Reads the labelled cells of the review table
    ///
    /// Layout: the main cell (`td.td_body`) holds a form followed by a table
    /// of `label:` / value cell pairs. The binding has no label of its own and
    /// sits three cells to the right of `Preis:`. The first occurrence of a
    /// label wins.
    fn parse_review(&self, id: &ReviewId, html: &str) -> Result<ReviewRecord, ParseError> {
        if !html.contains(REVIEW_DISCLAIMER) {
            return Err(ParseError::NotAReview);
        }

        let document = Html::parse_document(html);
        let body = document
            .select(&BODY)
            .next()
            .ok_or(ParseError::MissingElement("main table cell"))?;
        let form = body
            .select(&FORM)
            .next()
            .ok_or(ParseError::MissingElement("form"))?;
        let table = next_sibling_element(form, "table")
            .ok_or(ParseError::MissingElement("review table"))?;

        let mut record = ReviewRecord::new(id.clone());
        let mut seen: Vec<Field> = Vec::new();

        for cell in table.select(&CELLS) {
            let label: String = cell
                .text()
                .collect::<String>()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            let Some(label) = label.strip_suffix(':') else {
                continue;
            };
            let Some(&(_, field)) = FIELDS.iter().find(|(name, _)| *name == label) else {
                continue;
            };
            if seen.contains(&field) {
                continue;
            }
            seen.push(field);

            let Some(value_cell) = next_sibling_element(cell, "td") else {
                continue;
            };
            let lines: Vec<String> = text_with_breaks(value_cell)
                .split('\n')
                .map(clean)
                .collect();
            let joined = lines.join(" ").trim().to_string();
            let paragraphs: Vec<String> = lines.into_iter().filter(|l| !l.is_empty()).collect();

            if field == Field::Price {
                record.binding = next_sibling_element(value_cell, "td")
                    .and_then(|c| next_sibling_element(c, "td"))
                    .map(|c| clean(&c.text().collect::<String>()))
                    .filter(|s| !s.is_empty());
            }

            apply_field(&mut record, field, joined, paragraphs);
        }

        Ok(record)
    }
}

fn apply_field(record: &mut ReviewRecord, field: Field, value: String, paragraphs: Vec<String>) {
    let scalar = if value.is_empty() { None } else { Some(value) };

    match field {
        Field::Author => record.authors = split_list(scalar.as_deref(), &[';', '/']),
        Field::Title => record.title = scalar,
        Field::Isbn => {
            record.isbns = split_list(scalar.as_deref(), &[';', ',', '/'])
                .iter()
                .map(|s| isbn::normalize(s))
                .collect()
        }
        Field::Translator => record.translator = scalar,
        Field::OriginalLanguage => record.original_language = scalar,
        Field::Illustrator => record.illustrator = scalar,
        Field::Pages => record.pages = scalar,
        Field::Publisher => record.publisher = scalar,
        Field::Genre => record.genre = scalar,
        Field::Series => record.series = scalar,
        Field::Year => record.year = scalar,
        Field::Price => record.price = scalar,
        Field::Content => record.content = paragraphs,
        Field::ReadingAge => record.reading_age = scalar,
        Field::Applications => record.applications = scalar,
        Field::Wolgast => record.laureate = scalar.as_deref().is_some_and(is_affirmative),
        Field::Rating => record.rating = scalar,
        Field::Keywords => record.keywords = split_list(scalar.as_deref(), &[',', ';']),
        Field::Remarks => record.remarks = paragraphs,
        Field::Review => record.text = paragraphs,
    }
}

fn is_affirmative(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    !(value.is_empty() || value == "-" || value == "nein" || value == "keine")
}

fn split_list(value: Option<&str>, separators: &[char]) -> Vec<String> {
    value
        .map(|v| {
            v.split(separators)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Next sibling element of `element` with the given tag name
fn next_sibling_element<'a>(element: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    element
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == name)
}

/// Text content with `<br>` turned into newlines
fn text_with_breaks(element: ElementRef<'_>) -> String {
    let mut text = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(e) if e.name() == "br" => text.push('\n'),
            _ => {}
        }
    }
    text
}

/// Trims and replaces the legacy control characters the site uses as punctuation
fn clean(text: &str) -> String {
    text.trim()
        .replace(['\u{0084}', '\u{0093}'], "\"")
        .replace('\u{0085}', "...")
        .replace('\u{0094}', "\". ")
        .replace('\u{0096}', "-")
}
