//! Search form of the review database
//!
//! The site's search is a plain GET form. Free-text fields are passed through;
//! the closed-set select fields are only sent when the value is one of the
//! options the form offers, otherwise the field stays at "any" (`0`).

/// Number of hits per results page
pub const PAGE_SIZE: usize = 50;

const RATINGS: &[&str] = &[
    "empfehlenswert",
    "sehr empfehlenswert",
    "nicht empfehlenswert",
];

const APPLICATIONS: &[&str] = &["Klassenlesestoff", "Büchereigrundstock für Arbeitsbücherei"];

const AGES: &[&str] = &[
    "0-3", "4-5", "6-7", "8-9", "10-11", "12-13", "14-15", "16-17", "ab 18",
];

/// Parameters of one remote search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub search_term: String,
    /// Keyword (Schlagwort)
    pub tag: String,
    pub title: String,
    pub first_name: String,
    pub last_name: String,
    pub illustrator: String,
    pub rating: String,
    /// Field of application (Einsatzmöglichkeiten)
    pub application: String,
    pub media_type: String,
    /// Recommended reading age, e.g. `8-9`
    pub age: String,
    pub genre: String,
    /// Include archived reviews
    pub archive: bool,
    /// Only Heinrich-Wolgast prize laureates
    pub wolgast: bool,
}

impl SearchQuery {
    /// A query matching every current review
    pub fn all() -> Self {
        Self::default()
    }

    /// A query matching every review, archived ones included
    pub fn everything() -> Self {
        Self {
            archive: true,
            ..Self::default()
        }
    }

    /// Form parameters for the results page starting at hit `start`
    ///
    /// Page 1 (`start == 0`) is requested without a `start` parameter, like
    /// the site's own form does.
    pub fn params(&self, start: usize) -> Vec<(String, String)> {
        let mut params = vec![
            ("do", "suchen".to_string()),
            ("suchtext", self.search_term.clone()),
            ("schlagwort", non_empty_or_zero(&self.tag)),
            ("titel", self.title.clone()),
            ("autor1", self.first_name.clone()),
            ("autor2", self.last_name.clone()),
            ("illustrator", self.illustrator.clone()),
            ("bewertung", one_of(&self.rating, RATINGS)),
            ("einsatz", one_of(&self.application, APPLICATIONS)),
            ("medienart", non_empty_or_zero(&self.media_type)),
            ("alter", one_of(&self.age, AGES)),
            ("gattung", non_empty_or_zero(&self.genre)),
            ("archiv", flag(self.archive)),
            ("wolgast", flag(self.wolgast)),
        ];
        if start > 0 {
            params.push(("start", start.to_string()));
        }

        params
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    /// Parameters of results page `page` (0-based)
    pub fn page_params(&self, page: usize) -> Vec<(String, String)> {
        self.params(page * PAGE_SIZE)
    }
}

/// Number of results pages needed for `total` hits
pub fn page_count(total: usize) -> usize {
    total.div_ceil(PAGE_SIZE)
}

fn one_of(value: &str, options: &[&str]) -> String {
    if options.contains(&value) {
        value.to_string()
    } else {
        "0".to_string()
    }
}

fn non_empty_or_zero(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        "0".to_string()
    } else {
        value.to_string()
    }
}

fn flag(set: bool) -> String {
    if set {
        "JA".to_string()
    } else {
        String::new()
    }
}
