pub mod chars;

pub use chars::CharTokenizer;

pub type TokenId = u32;

/// Id of the padding token used to fill the context window. Never emitted.
pub const PAD_ID: TokenId = 0;
/// Id of the token that terminates a line.
pub const LINE_END_ID: TokenId = 1;

pub const PAD: char = '\0';
pub const LINE_END: char = '\n';

pub trait Tokenizer {
    /// Extend the vocabulary with every character found in `text`.
    fn train(&mut self, text: &str);
    /// Given a vocabulary, encode a string to its equivalent tokens.
    fn encode(&self, text: &str) -> Vec<TokenId>;
    /// Given a vocabulary, decode an array of token ids to the string representation.
    fn decode(&self, tokens: &[TokenId]) -> String;
    /// Number of tokens in the vocabulary, reserved tokens included.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
