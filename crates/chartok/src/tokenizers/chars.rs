use std::collections::BTreeSet;

use indexmap::IndexSet;

use super::{TokenId, Tokenizer, LINE_END, LINE_END_ID, PAD, PAD_ID};

/// Character level tokenizer. The token id of a character is its position
/// in the ordered vocabulary; ids 0 and 1 are always padding and line end.
#[derive(Clone, Debug, PartialEq)]
pub struct CharTokenizer {
    vocab: IndexSet<char>,
}

impl std::fmt::Display for CharTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<{}>",
            self.vocab
                .iter()
                .skip(1)
                .collect::<String>()
                .escape_default()
        )
    }
}

impl Default for CharTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl CharTokenizer {
    /// A tokenizer holding only the reserved tokens.
    pub fn new() -> Self {
        let mut vocab = IndexSet::new();
        vocab.insert(PAD);
        vocab.insert(LINE_END);
        Self { vocab }
    }

    /// Rebuild a tokenizer from the output of [`CharTokenizer::code_points`].
    ///
    /// Returns `None` when the reserved tokens are missing or out of place,
    /// when a value is not a valid `char`, or when a character repeats.
    pub fn from_code_points(points: &[u32]) -> Option<Self> {
        if points.get(PAD_ID as usize) != Some(&(PAD as u32))
            || points.get(LINE_END_ID as usize) != Some(&(LINE_END as u32))
        {
            return None;
        }

        let mut vocab = IndexSet::with_capacity(points.len());
        for point in points {
            if !vocab.insert(char::from_u32(*point)?) {
                return None;
            }
        }

        Some(Self { vocab })
    }

    pub fn code_points(&self) -> Vec<u32> {
        self.vocab.iter().map(|ch| *ch as u32).collect()
    }

    pub fn token_to_char(&self, token: TokenId) -> Option<char> {
        self.vocab.get_index(token as usize).copied()
    }

    pub fn char_to_token(&self, ch: char) -> Option<TokenId> {
        self.vocab.get_index_of(&ch).map(|idx| idx as TokenId)
    }

    /// Encode `text`, skipping characters outside the vocabulary.
    /// Returns the tokens along with how many characters were skipped.
    pub fn encode_lossy(&self, text: &str) -> (Vec<TokenId>, usize) {
        let mut skipped = 0;
        let mut encoded = Vec::with_capacity(text.len());
        for ch in text.chars() {
            match self.char_to_token(ch) {
                Some(idx) if idx != PAD_ID => encoded.push(idx),
                _ => skipped += 1,
            }
        }

        (encoded, skipped)
    }
}

impl Tokenizer for CharTokenizer {
    fn train(&mut self, text: &str) {
        // New characters are appended in sorted order so existing ids never move.
        let unseen = text
            .chars()
            .filter(|ch| *ch != PAD && !self.vocab.contains(ch))
            .collect::<BTreeSet<_>>();
        self.vocab.extend(unseen);
    }

    fn encode(&self, text: &str) -> Vec<TokenId> {
        let (encoded, skipped) = self.encode_lossy(text);
        if skipped > 0 {
            log::debug!("skipped {skipped} char(s) not in vocab");
        }

        encoded
    }

    fn decode(&self, tokens: &[TokenId]) -> String {
        let mut decoded = String::with_capacity(tokens.len());
        for token in tokens.iter().filter(|token| **token != PAD_ID) {
            match self.token_to_char(*token) {
                Some(ch) => decoded.push(ch),
                None => log::warn!("token {token} out of vocab bounds"),
            }
        }

        decoded
    }

    fn len(&self) -> usize {
        self.vocab.len()
    }
}
