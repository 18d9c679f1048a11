pub mod tokenizers;

/// Separators used when cutting a corpus into lines.
pub const LINE_SEPARATORS: &[char] = &['\n', '\r'];

/// Split `text` on any of `separators`, dropping empty fragments.
///
/// Consecutive separators never produce empty strings, so "a\r\n\nb"
/// splits into `["a", "b"]`.
pub fn split_lines<'a>(text: &'a str, separators: &[char]) -> Vec<&'a str> {
    text.split(|ch: char| separators.contains(&ch))
        .filter(|fragment| !fragment.is_empty())
        .collect()
}
