//! Residue to vocabulary token mapping.
//!
//! ProstT5 reads a sequence as `<AA2fold> r1 r2 ... rN </s>`. Residues are
//! looked up one at a time so that every input byte yields exactly one token,
//! whatever the tokenizer would do with the whole string.
use crate::error::PredictError;
use crate::runtime::{RuntimeModel, TokenId};
use tracing::debug;

/// Task prefix selecting amino acid to 3Di translation.
pub const START_MARKER: &str = "<AA2fold>";
pub const END_MARKER: &str = "</s>";
pub const UNKNOWN_MARKER: &str = "<unk>";
pub const UNKNOWN_RESIDUE: u8 = b'X';
/// Sentencepiece word boundary; some vocabularies only store `▁A`, not `A`.
pub const WORD_BOUNDARY: char = '\u{2581}';

/// The token `piece` maps to, if it tokenizes to exactly one token.
pub fn token_from_piece<M: RuntimeModel + ?Sized>(
    model: &M,
    piece: &str,
    parse_special: bool,
) -> Option<TokenId> {
    match model.tokenize(piece, parse_special).as_slice() {
        [token] => Some(*token),
        _ => None,
    }
}

/// Token of a single residue, case-insensitive. Non-ASCII bytes never map.
pub fn token_from_residue<M: RuntimeModel + ?Sized>(model: &M, residue: u8) -> Option<TokenId> {
    if !residue.is_ascii() {
        return None;
    }
    let upper = residue.to_ascii_uppercase() as char;
    let mut piece = String::with_capacity(4);
    piece.push(upper);
    token_from_piece(model, &piece, false).or_else(|| {
        piece.clear();
        piece.push(WORD_BOUNDARY);
        piece.push(upper);
        token_from_piece(model, &piece, false)
    })
}

/// Encoder input for one sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSequence {
    tokens: Vec<TokenId>,
    has_start_end: bool,
}

impl TokenSequence {
    pub fn as_slice(&self) -> &[TokenId] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Whether the start and end markers wrap the residues.
    pub fn has_start_end(&self) -> bool {
        self.has_start_end
    }
}

/// Build the encoder input for `sequence`, one token per byte.
///
/// Residues without a token become the unknown residue token (`X`, else
/// `<unk>`). When the vocabulary has neither the sequence cannot be encoded.
pub fn build_tokens<M: RuntimeModel + ?Sized>(
    model: &M,
    sequence: &str,
) -> Result<TokenSequence, PredictError> {
    let start = token_from_piece(model, START_MARKER, true);
    let unknown = token_from_residue(model, UNKNOWN_RESIDUE)
        .or_else(|| token_from_piece(model, UNKNOWN_MARKER, true))
        .ok_or(PredictError::UnresolvedUnknownToken)?;

    // each distinct byte is resolved once
    let mut resolved: [Option<TokenId>; 256] = [None; 256];
    let mut tokens = Vec::with_capacity(sequence.len() + 2);
    tokens.extend(start);
    for byte in sequence.bytes() {
        let slot = &mut resolved[byte as usize];
        let token = *slot.get_or_insert_with(|| token_from_residue(model, byte).unwrap_or(unknown));
        tokens.push(token);
    }
    if start.is_some() {
        tokens.push(token_from_piece(model, END_MARKER, true).unwrap_or(unknown));
    }
    debug!(
        residues = sequence.len(),
        tokens = tokens.len(),
        start_end = start.is_some(),
        "built encoder input"
    );
    Ok(TokenSequence {
        tokens,
        has_start_end: start.is_some(),
    })
}
