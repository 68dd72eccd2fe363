use std::collections::HashMap;

use crate::models::{FrequencyConfig, TokenCount};

/// Splits `text` on `delimiters`, drops tokens shorter than `min_chars` and
/// counts the rest. Counts come back sorted by descending frequency; equal
/// counts keep the order in which the tokens first appeared.
pub fn count_tokens(text: &str, delimiters: &[char], min_chars: usize) -> Vec<TokenCount> {
    let mut counts: Vec<TokenCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for token in text
        .split(|ch: char| delimiters.contains(&ch))
        .filter(|token| token.chars().count() >= min_chars)
    {
        match index.get(token).copied() {
            Some(position) => counts[position].count += 1,
            None => {
                index.insert(token, counts.len());
                counts.push(TokenCount {
                    token: token.to_string(),
                    count: 1,
                });
            }
        }
    }

    // sort_by is stable, so first-occurrence order survives among ties.
    counts.sort_by(|lhs, rhs| rhs.count.cmp(&lhs.count));
    counts
}

pub fn top_tokens(text: &str, config: &FrequencyConfig) -> Vec<TokenCount> {
    let mut counts = count_tokens(text, &config.delimiters, config.min_token_chars);
    counts.truncate(config.top_n);
    counts
}

pub fn format_token_counts(counts: &[TokenCount]) -> String {
    counts
        .iter()
        .map(|entry| format!("{} ({}×)", entry.token, entry.count))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders the fallback reply; never empty.
pub fn summarize(text: &str, config: &FrequencyConfig) -> String {
    let top = top_tokens(text, config);
    if top.is_empty() {
        return config.empty_reply.clone();
    }

    config
        .template
        .replace("{tokens}", &format_token_counts(&top))
}
