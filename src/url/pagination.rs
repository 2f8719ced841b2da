//! Pagination summary parsing
//!
//! Result pages carry a human readable summary such as "Page 3 of 40". The
//! first two integers in that text are the indicated page and the total.

use regex::Regex;
use std::sync::LazyLock;

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Parses `(indicated_current, total)` out of a pagination summary
///
/// Returns `None` unless the text embeds at least two integers.
pub fn parse_pagination_summary(text: &str) -> Option<(u32, u32)> {
    let mut numbers = NUMBER
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<u32>().ok());

    let current = numbers.next()?;
    let total = numbers.next()?;
    Some((current, total))
}
