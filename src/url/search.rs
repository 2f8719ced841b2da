use crate::UrlError;
use url::Url;

/// Filters for one search invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    pub keywords: Option<String>,
    pub location: Option<String>,
}

impl SearchFilters {
    pub fn new(keywords: Option<String>, location: Option<String>) -> Self {
        Self {
            keywords: keywords.filter(|k| !k.trim().is_empty()),
            location: location.filter(|l| !l.trim().is_empty()),
        }
    }
}

/// Builds the results URL for a search
///
/// Filters are appended as `keywords` and `location` query parameters,
/// preserving any parameters already present on `search_url`.
///
/// # Examples
///
/// ```
/// use job_harvest::url::{build_search_url, SearchFilters};
///
/// let filters = SearchFilters::new(Some("rust developer".into()), Some("Brasil".into()));
/// let url = build_search_url("https://www.linkedin.com/jobs/search/", &filters).unwrap();
/// assert_eq!(
///     url.as_str(),
///     "https://www.linkedin.com/jobs/search/?keywords=rust+developer&location=Brasil"
/// );
/// ```
pub fn build_search_url(search_url: &str, filters: &SearchFilters) -> Result<Url, UrlError> {
    let mut url = Url::parse(search_url).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    if filters.keywords.is_none() && filters.location.is_none() {
        return Ok(url);
    }

    {
        let mut pairs = url.query_pairs_mut();
        if let Some(keywords) = &filters.keywords {
            pairs.append_pair("keywords", keywords.trim());
        }
        if let Some(location) = &filters.location {
            pairs.append_pair("location", location.trim());
        }
    }

    Ok(url)
}
