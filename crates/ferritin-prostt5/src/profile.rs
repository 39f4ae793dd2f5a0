//! Model profiles.
//!
//! The converted ProstT5 variants disagree on how their classifier output is
//! laid out in memory, on how many classes they report, and on whether the
//! score buffer carries a slot for the end marker. These facts are not stored
//! in the weights, so they are recognised from the vocabulary size and the
//! reported class count. Each known variant is one entry in [`RULES`]; the
//! first matching entry wins.
use crate::alphabet::THREEDI_CLASSES;
use serde::Serialize;

/// Memory order of the `pred_len x n_classes` score buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ScoreLayout {
    /// All class scores of position 0, then position 1, ...
    TokenMajor,
    /// Scores of class 0 for every position, then class 1, ...
    ClassMajor,
}

impl ScoreLayout {
    pub fn index(self, position: usize, class: usize, pred_len: usize, n_classes: usize) -> usize {
        match self {
            ScoreLayout::TokenMajor => position * n_classes + class,
            ScoreLayout::ClassMajor => class * pred_len + position,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ClassCount {
    /// Use the count reported by the model, or 20 when it reports none.
    Reported,
    Fixed(usize),
}

#[derive(Debug)]
struct ProfileRule {
    name: &'static str,
    n_vocab: Option<usize>,
    n_cls_out: Option<u32>,
    classes: ClassCount,
    layout: ScoreLayout,
    trims_end_marker: bool,
}

impl ProfileRule {
    fn matches(&self, n_vocab: usize, n_cls_out: u32) -> bool {
        self.n_vocab.map_or(true, |v| v == n_vocab) && self.n_cls_out.map_or(true, |c| c == n_cls_out)
    }
}

const RULES: &[ProfileRule] = &[
    // Current conversion: compact residue vocabulary and a 20-state head.
    // Its score buffer holds exactly one row per residue.
    ProfileRule {
        name: "prostt5-compact",
        n_vocab: Some(28),
        n_cls_out: Some(20),
        classes: ClassCount::Fixed(THREEDI_CLASSES),
        layout: ScoreLayout::TokenMajor,
        trims_end_marker: false,
    },
    ProfileRule {
        name: "prostt5-compact-vocab",
        n_vocab: Some(28),
        n_cls_out: None,
        classes: ClassCount::Reported,
        layout: ScoreLayout::TokenMajor,
        trims_end_marker: true,
    },
    // The full sentencepiece vocabulary; some conversions report a
    // single output class although the head predicts all 20 states.
    ProfileRule {
        name: "prostt5-sentencepiece-single-class",
        n_vocab: Some(150),
        n_cls_out: Some(1),
        classes: ClassCount::Fixed(THREEDI_CLASSES),
        layout: ScoreLayout::ClassMajor,
        trims_end_marker: true,
    },
    ProfileRule {
        name: "generic",
        n_vocab: None,
        n_cls_out: None,
        classes: ClassCount::Reported,
        layout: ScoreLayout::ClassMajor,
        trims_end_marker: true,
    },
];

/// How to read the score buffer of one loaded model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelProfile {
    pub name: &'static str,
    pub n_classes: usize,
    pub layout: ScoreLayout,
    /// The buffer has one row per token minus the start marker, so with an
    /// end marker appended it is one row longer than the residue count.
    pub trims_end_marker: bool,
}

impl ModelProfile {
    pub fn resolve(n_vocab: usize, n_cls_out: u32) -> Self {
        // the last rule matches everything
        let rule = RULES
            .iter()
            .find(|rule| rule.matches(n_vocab, n_cls_out))
            .unwrap_or(&RULES[RULES.len() - 1]);
        let n_classes = match rule.classes {
            ClassCount::Fixed(n) => n,
            ClassCount::Reported if n_cls_out > 0 => n_cls_out as usize,
            ClassCount::Reported => THREEDI_CLASSES,
        };
        Self {
            name: rule.name,
            n_classes,
            layout: rule.layout,
            trims_end_marker: rule.trims_end_marker,
        }
    }

    /// Number of score rows to decode for a sequence of `n_residues`
    /// residues encoded as `n_tokens` tokens.
    pub fn pred_len(&self, n_residues: usize, n_tokens: usize, has_end_marker: bool) -> usize {
        if self.trims_end_marker && has_end_marker {
            n_tokens.saturating_sub(1)
        } else {
            n_residues
        }
    }
}
