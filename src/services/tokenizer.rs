//! Query string tokenizer.
//!
//! Turns a raw user query into at most five search tokens. Double-quoted
//! spans survive as single phrase tokens with the quotes stripped.

/// Maximum number of tokens per query.
const MAX_TOKENS: usize = 5;

/// Minimum token length, in characters.
const MIN_TOKEN_CHARS: usize = 2;

/// Parses a raw query into search tokens.
///
/// All whitespace (including tabs, newlines and ideographic spaces) and
/// commas are normalized to plain spaces before splitting, so CJK-formatted
/// and comma-separated input behaves like space-separated input. Duplicate
/// tokens keep their first occurrence; single-character tokens are dropped;
/// the result is capped at [`MAX_TOKENS`].
#[must_use]
pub fn parse(query: &str) -> Vec<String> {
    let normalized: String = query
        .chars()
        .map(|c| if c == ',' || c.is_whitespace() { ' ' } else { c })
        .collect();

    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_phrase = false;

    for c in normalized.chars() {
        match c {
            '"' => {
                if in_phrase {
                    push_token(&mut tokens, std::mem::take(&mut current));
                }
                in_phrase = !in_phrase;
            }
            ' ' if !in_phrase => push_token(&mut tokens, std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    // An unterminated phrase still contributes its text
    push_token(&mut tokens, current);

    tokens.truncate(MAX_TOKENS);
    tokens
}

fn push_token(tokens: &mut Vec<String>, token: String) {
    let token = token.trim().to_string();
    if token.chars().count() >= MIN_TOKEN_CHARS && !tokens.contains(&token) {
        tokens.push(token);
    }
}
