//! URL Transformer
//!
//! Applies `remove`, `add` and `redirect` rules to a URL in list order.
//! `hideElement` rules are skipped here; they are handled by the page hider.

use thiserror::Error;
use url::Url;

use crate::matcher::url_rules;
use crate::query::QueryParams;
use crate::types::{Rule, RuleAction};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Result of running rules over a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transform {
    /// The candidate URL (serialized, possibly normalized by the parser)
    pub url: String,
    /// At least one rule fired
    pub changed: bool,
}

pub(crate) fn parse_url(url: &str) -> Result<Url, TransformError> {
    Url::parse(url).map_err(|source| TransformError::InvalidUrl {
        url: url.to_string(),
        source,
    })
}

/// Apply `rules` to `url` in order, without any domain filtering.
pub fn apply_rules<'r, I>(rules: I, url: &str) -> Result<Transform, TransformError>
where
    I: IntoIterator<Item = &'r Rule>,
{
    let mut parsed = parse_url(url)?;
    let changed = apply_to_url(rules, &mut parsed);
    Ok(Transform {
        url: parsed.into(),
        changed,
    })
}

/// Apply rules to an already parsed URL. Returns true if any rule fired.
pub(crate) fn apply_to_url<'r, I>(rules: I, url: &mut Url) -> bool
where
    I: IntoIterator<Item = &'r Rule>,
{
    let mut params = QueryParams::parse(url.query().unwrap_or(""));
    let mut modified = false;
    let mut params_modified = false;

    for rule in rules {
        match &rule.action {
            RuleAction::Remove { parameter, value } => {
                let value_ok = match value {
                    None => true,
                    Some(v) => params.get(parameter) == Some(v.as_str()),
                };
                if params.has(parameter) && value_ok {
                    params.delete(parameter);
                    modified = true;
                    params_modified = true;
                }
            }
            RuleAction::Add { parameter, value } => {
                if params.get(parameter) != Some(value.as_str()) {
                    params.set(parameter, value);
                    modified = true;
                    params_modified = true;
                }
            }
            RuleAction::Redirect { from_path, to_path } => {
                if let Some(new_path) = redirect_path(url.path(), from_path, to_path) {
                    url.set_path(&new_path);
                    modified = true;
                }
            }
            RuleAction::HideElement { .. } => {}
        }
    }

    // Only re-serialize the query when a parameter rule fired
    if params_modified {
        let query = params.serialize();
        url.set_query(if query.is_empty() { None } else { Some(&query) });
    }

    modified
}

/// Rewrite `path` if it equals `from` or continues past it with `/`.
pub fn redirect_path(path: &str, from: &str, to: &str) -> Option<String> {
    let rest = path.strip_prefix(from)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(format!("{to}{rest}"))
    } else {
        None
    }
}

/// Apply `rules` and return the candidate only if it differs from `url`.
///
/// The textual comparison keeps a rule whose output equals its input from
/// triggering a navigation to the same page.
pub fn rewrite<'r, I>(rules: I, url: &str) -> Result<Option<String>, TransformError>
where
    I: IntoIterator<Item = &'r Rule>,
{
    let transform = apply_rules(rules, url)?;
    Ok(if transform.changed && transform.url != url {
        Some(transform.url)
    } else {
        None
    })
}

/// Match `rules` against the URL's hostname, then [`rewrite`].
pub fn rewrite_url(rules: &[Rule], url: &str) -> Result<Option<String>, TransformError> {
    let mut parsed = parse_url(url)?;
    let host = parsed.host_str().unwrap_or("").to_string();

    let mut matched = url_rules(rules, &host).peekable();
    if matched.peek().is_none() {
        return Ok(None);
    }

    if !apply_to_url(matched, &mut parsed) {
        return Ok(None);
    }

    let candidate: String = parsed.into();
    if candidate == url {
        log::debug!("rewrite of {} is a no-op, skipping", url);
        return Ok(None);
    }

    log::debug!("rewrite {} -> {}", url, candidate);
    Ok(Some(candidate))
}
