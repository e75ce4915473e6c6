//! Progressive tag relaxation for sources that cannot filter by free-text tags
//! server-side.
//!
//! The query is split into at most [`MAX_TAGS`] tokens. Matching starts with
//! all tokens and drops trailing tokens one at a time until something matches.
//! With zero tokens everything matches, so a non-empty candidate list never
//! filters down to nothing.

/// Maximum number of tokens considered from a query.
pub const MAX_TAGS: usize = 5;

const SEPARATORS: [char; 3] = [',', '，', '/'];

/// A listing entry from a source, before one is picked for download.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateItem<T> {
    pub id: String,
    pub title: String,
    pub tags: Vec<String>,
    /// Source flags the item as adult-only.
    pub restricted: bool,
    /// Whatever else the provider needs once the item is chosen.
    pub payload: T,
}

impl<T> CandidateItem<T> {
    /// True when every token occurs in the title or in some tag.
    pub fn matches_all(&self, tokens: &[String]) -> bool {
        let title = self.title.to_lowercase();
        let tags: Vec<String> = self.tags.iter().map(|t| t.to_lowercase()).collect();
        tokens
            .iter()
            .all(|tok| title.contains(tok.as_str()) || tags.iter().any(|t| t.contains(tok.as_str())))
    }
}

/// Split a raw query into lowercase tokens.
///
/// Separators are `,`, full-width `，` and `/`. Tokens are trimmed, empties
/// dropped, duplicates removed keeping first occurrence, and the result
/// truncated to [`MAX_TAGS`].
pub fn parse_tags(query: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in query.split(SEPARATORS) {
        let token = token.trim().to_lowercase();
        if token.is_empty() || tokens.contains(&token) {
            continue;
        }
        tokens.push(token);
        if tokens.len() == MAX_TAGS {
            break;
        }
    }
    tokens
}

/// Narrow `candidates` to the items matching the longest possible prefix of
/// the query's tokens.
pub fn filter_by_tags<T>(candidates: Vec<CandidateItem<T>>, query: Option<&str>) -> Vec<CandidateItem<T>> {
    let tokens = query.map(parse_tags).unwrap_or_default();
    if tokens.is_empty() || candidates.is_empty() {
        return candidates;
    }

    for i in (1..=tokens.len()).rev() {
        let prefix = &tokens[..i];
        if candidates.iter().any(|c| c.matches_all(prefix)) {
            return candidates
                .into_iter()
                .filter(|c| c.matches_all(prefix))
                .collect();
        }
        tracing::trace!(tier = i, "No candidate matched, relaxing");
    }

    candidates
}
