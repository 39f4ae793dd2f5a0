//! Argmax decoding of classifier scores into 3Di strings.
use crate::alphabet::index_to_3di;
use crate::error::PredictError;
use crate::profile::ScoreLayout;

/// A borrowed `pred_len x n_classes` view over the runtime's score buffer.
#[derive(Debug, Clone, Copy)]
pub struct ScoreMatrix<'a> {
    data: &'a [f32],
    pred_len: usize,
    n_classes: usize,
    layout: ScoreLayout,
}

impl<'a> ScoreMatrix<'a> {
    /// Fails when `data` is too short to hold every score, so indexing can
    /// never run off the end of the buffer.
    pub fn new(
        data: &'a [f32],
        pred_len: usize,
        n_classes: usize,
        layout: ScoreLayout,
    ) -> Result<Self, PredictError> {
        let expected = pred_len
            .checked_mul(n_classes)
            .ok_or(PredictError::ScoreBufferTooShort {
                len: data.len(),
                expected: usize::MAX,
            })?;
        if data.len() < expected {
            return Err(PredictError::ScoreBufferTooShort {
                len: data.len(),
                expected,
            });
        }
        Ok(Self {
            data,
            pred_len,
            n_classes,
            layout,
        })
    }

    pub fn pred_len(&self) -> usize {
        self.pred_len
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn score(&self, position: usize, class: usize) -> f32 {
        self.data[self.layout.index(position, class, self.pred_len, self.n_classes)]
    }

    /// Index of the highest scoring class at `position`.
    ///
    /// Ties keep the lowest class index and NaN never wins.
    pub fn argmax(&self, position: usize) -> usize {
        let mut best = 0;
        let mut best_score = f32::MIN;
        for class in 0..self.n_classes {
            let score = self.score(position, class);
            if score > best_score {
                best = class;
                best_score = score;
            }
        }
        best
    }

    pub fn argmax_indices(&self) -> Vec<usize> {
        (0..self.pred_len).map(|j| self.argmax(j)).collect()
    }
}

/// Decode the first `output_len` positions (at most `pred_len`) into 3Di letters.
pub fn decode_3di(scores: &ScoreMatrix<'_>, output_len: usize) -> String {
    (0..output_len.min(scores.pred_len))
        .map(|j| index_to_3di(scores.argmax(j)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // 3 positions x 4 classes, winners 2, 0, 3
    const TOKEN_MAJOR: [f32; 12] = [
        0.1, 0.2, 0.9, 0.0, //
        0.8, 0.1, 0.1, 0.1, //
        -1.0, -2.0, -3.0, 0.5,
    ];
    const CLASS_MAJOR: [f32; 12] = [
        0.1, 0.8, -1.0, //
        0.2, 0.1, -2.0, //
        0.9, 0.1, -3.0, //
        0.0, 0.1, 0.5,
    ];

    #[test]
    fn test_argmax_token_major() {
        let m = ScoreMatrix::new(&TOKEN_MAJOR, 3, 4, ScoreLayout::TokenMajor).unwrap();
        assert_eq!(m.argmax_indices(), vec![2, 0, 3]);
        assert_eq!(decode_3di(&m, 3), "DAE");
    }

    #[test]
    fn test_argmax_class_major() {
        let m = ScoreMatrix::new(&CLASS_MAJOR, 3, 4, ScoreLayout::ClassMajor).unwrap();
        assert_eq!(m.argmax_indices(), vec![2, 0, 3]);
        assert_eq!(m.score(2, 3), 0.5);
    }

    #[test]
    fn test_layout_changes_result() {
        let m = ScoreMatrix::new(&TOKEN_MAJOR, 3, 4, ScoreLayout::ClassMajor).unwrap();
        assert_ne!(m.argmax_indices(), vec![2, 0, 3]);
    }

    #[test]
    fn test_ties_keep_first_class() {
        let scores = [1.0, 1.0, 1.0, 0.5, 2.0, 2.0];
        let m = ScoreMatrix::new(&scores, 2, 3, ScoreLayout::TokenMajor).unwrap();
        assert_eq!(m.argmax_indices(), vec![0, 1]);
    }

    #[test]
    fn test_nan_never_wins() {
        let scores = [f32::NAN, 0.3, f32::NAN, f32::NAN];
        let m = ScoreMatrix::new(&scores, 2, 2, ScoreLayout::TokenMajor).unwrap();
        assert_eq!(m.argmax_indices(), vec![1, 0]);
    }

    #[test]
    fn test_output_len_is_capped() {
        let m = ScoreMatrix::new(&TOKEN_MAJOR, 3, 4, ScoreLayout::TokenMajor).unwrap();
        assert_eq!(decode_3di(&m, 2), "DA");
        assert_eq!(decode_3di(&m, 10), "DAE");
        assert_eq!(decode_3di(&m, 0), "");
    }

    #[test]
    fn test_classes_past_alphabet_are_unknown() {
        let mut scores = vec![0.0f32; 22];
        scores[21] = 1.0;
        let m = ScoreMatrix::new(&scores, 1, 22, ScoreLayout::TokenMajor).unwrap();
        assert_eq!(decode_3di(&m, 1), "X");
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let err = ScoreMatrix::new(&TOKEN_MAJOR, 4, 4, ScoreLayout::TokenMajor).unwrap_err();
        assert!(matches!(
            err,
            PredictError::ScoreBufferTooShort {
                len: 12,
                expected: 16
            }
        ));
    }
}
