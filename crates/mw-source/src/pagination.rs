//! Continuation-following pagination shared by all adapters.
//!
//! Two continuation styles exist upstream:
//! - an RFC 8288 `Link` header carrying a `rel="next"` target (GitHub, GitLab);
//! - a flag in the response body that the adapter turns into the next URL
//!   itself (Gerrit `_more_projects`).
//!
//! Both reduce to a [`Page`] with an optional `next` reference. The walk stops
//! when `next` is absent; there is no page cap. A continuation seen twice is a
//! [`SourceError::PaginationLoop`].

use std::collections::HashSet;
use std::future::Future;

use crate::error::SourceError;

/// One page of results plus the continuation reference, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// Fetch `first_url` and every continuation after it, concatenating items in
/// discovery order.
pub async fn collect_pages<T, F, Fut>(
    first_url: String,
    mut fetch_page: F,
) -> Result<Vec<T>, SourceError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Page<T>, SourceError>>,
{
    let mut visited: HashSet<String> = HashSet::new();
    let mut out: Vec<T> = Vec::new();
    let mut next = Some(first_url);

    while let Some(url) = next.take() {
        if !visited.insert(url.clone()) {
            return Err(SourceError::PaginationLoop { url });
        }
        let page = fetch_page(url).await?;
        out.extend(page.items);
        next = page.next;
    }

    Ok(out)
}

/// Extract the `rel="next"` target from a `Link` header value.
///
/// `<https://h/x?page=2>; rel="next", <https://h/x?page=5>; rel="last"`
/// yields `https://h/x?page=2`.
pub fn parse_next_link(header: &str) -> Option<String> {
    for entry in header.split(',') {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            match param.split_once('=') {
                Some((key, value)) => {
                    key.trim().eq_ignore_ascii_case("rel")
                        && value
                            .trim()
                            .trim_matches('"')
                            .split_whitespace()
                            .any(|rel| rel.eq_ignore_ascii_case("next"))
                }
                None => false,
            }
        });
        if is_next {
            let url = target.strip_prefix('<')?.strip_suffix('>')?;
            if !url.is_empty() {
                return Some(url.to_string());
            }
        }
    }
    None
}
