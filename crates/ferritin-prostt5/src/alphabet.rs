//! The 3Di structural alphabet.
//!
//! Foldseek's 3Di states are encoded with the same twenty letters as the
//! amino acids. The classification head emits one score per state and the
//! state index is mapped to its letter in alphabetical order.

/// Number of 3Di states predicted per residue.
pub const THREEDI_CLASSES: usize = 20;

/// Letters of the 3Di states, indexed by class.
pub const THREEDI_ALPHABET: &[u8; THREEDI_CLASSES] = b"ACDEFGHIKLMNPQRSTVWY";

/// Emitted for any class index outside the alphabet.
pub const UNKNOWN_STATE: char = 'X';

/// Map a class index to its 3Di letter.
///
/// Negative indices and indices past the end of the alphabet map to
/// [`UNKNOWN_STATE`].
pub fn index_to_3di<I: TryInto<usize>>(index: I) -> char {
    index
        .try_into()
        .ok()
        .and_then(|i| THREEDI_ALPHABET.get(i))
        .map(|&b| b as char)
        .unwrap_or(UNKNOWN_STATE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphabet_table() {
        let decoded: String = (0..20usize).map(index_to_3di).collect();
        assert_eq!(decoded, "ACDEFGHIKLMNPQRSTVWY");
        assert_eq!(index_to_3di(0u32), 'A');
        assert_eq!(index_to_3di(1i32), 'C');
        assert_eq!(index_to_3di(19i64), 'Y');
    }

    #[test]
    fn test_out_of_range_is_unknown() {
        assert_eq!(index_to_3di(20usize), 'X');
        assert_eq!(index_to_3di(usize::MAX), 'X');
        assert_eq!(index_to_3di(-1i32), 'X');
        assert_eq!(index_to_3di(i64::MIN), 'X');
    }
}
