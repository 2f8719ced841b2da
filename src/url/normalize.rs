use crate::UrlError;
use url::Url;

/// Query parameters that never identify a listing, even when kept explicitly
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
    "ref",
    "refId",
    "trackingId",
    "trk",
    "eBP",
    "source",
];

/// Computes the canonical form of a listing URL, the deduplication key
///
/// # Canonicalization Steps
///
/// 1. Resolve `raw` against `base` when it is relative
/// 2. Reject anything that is not http/https or has no host
/// 3. Lowercase the host
/// 4. Remove dot segments, duplicate slashes, and the trailing slash
/// 5. Remove the fragment
/// 6. Drop every query parameter except those in `keep_params`; tracking
///    parameters are dropped even when listed
/// 7. Sort the surviving parameters, removing an empty query string
///
/// Canonicalizing an already canonical URL returns it unchanged.
///
/// # Examples
///
/// ```
/// use job_harvest::url::canonicalize_url;
///
/// let url = canonicalize_url(
///     "https://www.linkedin.com/jobs/view/123/?refId=abc&trackingId=xyz",
///     None,
///     &[],
/// )
/// .unwrap();
/// assert_eq!(url.as_str(), "https://www.linkedin.com/jobs/view/123");
/// ```
pub fn canonicalize_url(
    raw: &str,
    base: Option<&Url>,
    keep_params: &[String],
) -> Result<Url, UrlError> {
    let mut url = match base {
        Some(base) => base.join(raw.trim()),
        None => Url::parse(raw.trim()),
    }
    .map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    match url.host_str() {
        Some(host) => {
            let host = host.to_lowercase();
            url.set_host(Some(&host))
                .map_err(|e| UrlError::Parse(format!("Failed to set host: {}", e)))?;
        }
        None => return Err(UrlError::MissingDomain),
    }

    let path = normalize_path(url.path());
    url.set_path(&path);

    url.set_fragment(None);

    if url.query().is_some() {
        let kept = kept_query_params(&url, keep_params);
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
    }

    Ok(url)
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

/// Keeps only explicitly retained, non-tracking parameters, sorted by key
fn kept_query_params(url: &Url, keep_params: &[String]) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .filter(|(key, _)| keep_params.iter().any(|k| k == key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();
    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
