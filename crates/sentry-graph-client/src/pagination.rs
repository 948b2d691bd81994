//! Sentry cursor pagination.
//!
//! Every list endpoint answers with a `Link` header carrying a `previous` and
//! a `next` link, for example:
//!
//! ```text
//! <https://sentry.io/api/0/organizations/acme/teams/?&cursor=0:100:0>; rel="next"; results="true"; cursor="0:100:0"
//! ```
//!
//! `results="true"` on the `next` link is the only signal that another page
//! exists. A `next` link that claims more results without a cursor is
//! malformed.

use crate::transport::ProviderResponse;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkEntry {
    pub url: String,
    pub params: BTreeMap<String, String>,
}

impl LinkEntry {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageSignal {
    More { cursor: String },
    Exhausted,
    MissingCursor,
}

pub fn page_signal(response: &ProviderResponse) -> PageSignal {
    let Some(header) = response.header("link") else {
        return PageSignal::Exhausted;
    };
    let Some(next) = parse_link_header(header)
        .into_iter()
        .find(|entry| entry.param("rel") == Some("next"))
    else {
        return PageSignal::Exhausted;
    };
    if !next
        .param("results")
        .is_some_and(|value| value.eq_ignore_ascii_case("true"))
    {
        return PageSignal::Exhausted;
    }

    match next
        .param("cursor")
        .map(str::to_string)
        .or_else(|| cursor_from_url(&next.url))
    {
        Some(cursor) if !cursor.is_empty() => PageSignal::More { cursor },
        _ => PageSignal::MissingCursor,
    }
}

pub fn parse_link_header(header: &str) -> Vec<LinkEntry> {
    split_link_values(header)
        .into_iter()
        .filter_map(parse_link_value)
        .collect()
}

fn parse_link_value(raw: &str) -> Option<LinkEntry> {
    let rest = raw.trim().strip_prefix('<')?;
    let (url, params) = rest.split_once('>')?;
    let params = params
        .split(';')
        .filter_map(|param| {
            let (name, value) = param.trim().split_once('=')?;
            Some((
                name.trim().to_ascii_lowercase(),
                value.trim().trim_matches('"').to_string(),
            ))
        })
        .collect();
    Some(LinkEntry {
        url: url.trim().to_string(),
        params,
    })
}

// Commas separate link values, but may also appear inside `<...>` or quotes.
fn split_link_values(header: &str) -> Vec<&str> {
    let mut values = Vec::new();
    let mut in_angle = false;
    let mut in_quotes = false;
    let mut start = 0;
    for (index, ch) in header.char_indices() {
        match ch {
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            '"' if !in_angle => in_quotes = !in_quotes,
            ',' if !in_angle && !in_quotes => {
                values.push(&header[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    values.push(&header[start..]);
    values
}

fn cursor_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(name, _)| name == "cursor")
        .map(|(_, value)| value.into_owned())
}
