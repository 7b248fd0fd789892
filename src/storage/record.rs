//! Review identifiers and parsed review records
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifier of one review on the remote site
///
/// The site uses numeric IDs, but index files written by older tools store
/// them either as strings or as integers, so both are accepted on input.
/// They are always written back as strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ReviewId(String);

impl ReviewId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the ID has the shape the site hands out (digits only)
    pub fn is_numeric(&self) -> bool {
        !self.0.is_empty() && self.0.chars().all(|c| c.is_ascii_digit())
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReviewId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ReviewId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl<'de> Deserialize<'de> for ReviewId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Self(text),
            Raw::Number(number) => Self(number.to_string()),
        })
    }
}

/// Structured content of one review page
///
/// Scalar fields are `None` when the page does not carry the label.
/// Running-text fields keep one entry per paragraph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub review_id: ReviewId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub illustrator: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translator: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_language: Option<String>,

    /// ISBNs printed on the review page, normalised
    #[serde(default)]
    pub isbns: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_age: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applications: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub content: Vec<String>,

    #[serde(default)]
    pub remarks: Vec<String>,

    /// The review text itself
    #[serde(default)]
    pub text: Vec<String>,

    /// Whether the book won the Heinrich-Wolgast prize
    #[serde(default)]
    pub laureate: bool,
}

impl ReviewRecord {
    /// Creates an empty record for `review_id`
    pub fn new(review_id: impl Into<ReviewId>) -> Self {
        Self {
            review_id: review_id.into(),
            ..Default::default()
        }
    }
}
