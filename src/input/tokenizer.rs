/// Characters that separate arguments. No quoting or escaping is recognised.
pub const DELIMITERS: [char; 4] = [' ', '\t', '\r', '\n'];

/// Splits a raw input line into argument tokens on runs of [`DELIMITERS`].
///
/// The returned tokens borrow from `line` and are never empty; a blank line
/// yields an empty vector.
pub fn tokenize(line: &str) -> Vec<&str> {
    line.split(&DELIMITERS[..])
        .filter(|token| !token.is_empty())
        .collect()
}
