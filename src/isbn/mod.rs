//! ISBN handling
//!
//! Listing pages and review pages print ISBNs with hyphens, spaces and the
//! occasional lowercase check digit. Index keys use the normalised form.
//! Validity is purely syntactic: the ISBN-10 or ISBN-13 checksum must hold.

/// Strips hyphens and whitespace and upper-cases a trailing `x`
///
/// # Example
///
/// ```
/// use ajum_index::isbn::normalize;
///
/// assert_eq!(normalize(" 3-499-20505-x "), "349920505X");
/// ```
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| if c == 'x' { 'X' } else { c })
        .collect()
}

/// Returns true if `raw` is a syntactically valid ISBN-10 or ISBN-13
///
/// The input is normalised first, so hyphenated forms are accepted.
pub fn is_valid(raw: &str) -> bool {
    let isbn = normalize(raw);
    match isbn.len() {
        10 => is_valid_isbn10(&isbn),
        13 => is_valid_isbn13(&isbn),
        _ => false,
    }
}

/// ISBN-10: weighted sum 10..1 must be divisible by 11, `X` only as check digit
fn is_valid_isbn10(isbn: &str) -> bool {
    let mut sum = 0u32;
    for (i, c) in isbn.chars().enumerate() {
        let value = match c {
            '0'..='9' => c as u32 - '0' as u32,
            'X' if i == 9 => 10,
            _ => return false,
        };
        sum += value * (10 - i as u32);
    }
    sum % 11 == 0
}

/// ISBN-13: alternating weights 1 and 3, sum divisible by 10
fn is_valid_isbn13(isbn: &str) -> bool {
    let mut sum = 0u32;
    for (i, c) in isbn.chars().enumerate() {
        let Some(digit) = c.to_digit(10) else {
            return false;
        };
        sum += if i % 2 == 0 { digit } else { digit * 3 };
    }
    sum % 10 == 0
}
