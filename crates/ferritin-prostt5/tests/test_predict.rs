use ferritin_prostt5::runtime::stub::{Scoring, StubBackend, StubVocab};
use ferritin_prostt5::{PredictError, ProstT5Model, Runtime, RuntimeOptions};

const STANDARD_RESIDUES: &str = "ACDEFGHIKLMNPQRSTVWY";

fn runtime(backend: StubBackend) -> Runtime<StubBackend> {
    Runtime::init(backend, RuntimeOptions::default()).unwrap()
}

#[test]
fn test_output_length_matches_input() {
    let sequences = [
        "M",
        "MKTAYIAKQRQISFVKSHFSRQ",
        "mktayiakqrqisfvkshfsrq",
        "MkTaYiAkQrQiSfVkShFsRq",
        STANDARD_RESIDUES,
    ];
    for vocab in [StubVocab::sentencepiece(), StubVocab::compact()] {
        let runtime = runtime(StubBackend::new(vocab, 20));
        let model = ProstT5Model::load(&runtime, "prostt5.gguf", "none").unwrap();
        let mut session = model.session(1).unwrap();
        for sequence in sequences {
            let states = session.predict(sequence);
            assert_eq!(states.len(), sequence.len(), "{} on {sequence}", model.profile().name);
            assert!(states.bytes().all(|b| STANDARD_RESIDUES.as_bytes().contains(&b)));
        }
    }
}

#[test]
fn test_case_insensitive() {
    let runtime = runtime(StubBackend::default());
    let model = ProstT5Model::load(&runtime, "prostt5.gguf", "none").unwrap();
    let mut session = model.session(1).unwrap();
    let upper = session.predict("MKTAYIAKQR");
    let lower = session.predict("mktayiakqr");
    assert_eq!(upper, lower);
}

#[test]
fn test_unknown_residues_use_unknown_token() {
    let runtime = runtime(StubBackend::default());
    let model = ProstT5Model::load(&runtime, "prostt5.gguf", "none").unwrap();
    let mut session = model.session(1).unwrap();
    // X is token 23 in the sentencepiece vocabulary; J, * and é map to it
    let unknown = session.predict("X");
    assert_eq!(session.predict("J"), unknown);
    assert_eq!(session.predict("*"), unknown);
    assert_eq!(session.predict("é"), unknown.repeat(2));
}

#[test]
fn test_empty_sequence_is_success() {
    for vocab in [StubVocab::sentencepiece(), StubVocab::compact()] {
        let runtime = runtime(StubBackend::new(vocab, 20));
        let model = ProstT5Model::load(&runtime, "prostt5.gguf", "none").unwrap();
        let mut session = model.session(1).unwrap();
        assert_eq!(session.try_predict("").unwrap(), "");
    }
}

#[test]
fn test_unmappable_sequence_is_empty() {
    let vocab = StubVocab::new(4)
        .with_special("<AA2fold>", 0)
        .with_special("</s>", 1)
        .with_piece("▁A", 2);
    let runtime = runtime(StubBackend::new(vocab, 20));
    let model = ProstT5Model::load(&runtime, "prostt5.gguf", "none").unwrap();
    let mut session = model.session(1).unwrap();
    assert!(matches!(
        session.try_predict("JJJ"),
        Err(PredictError::UnresolvedUnknownToken)
    ));
    assert_eq!(session.predict("JJJ"), "");
    // nothing reached the encoder
    assert_eq!(session.perf().n_encode, 0);
}

#[test]
fn test_token_major_scores() {
    // 28 token vocabulary, 20 classes: token major, one row per residue
    // after the start marker
    let mut scores = vec![0.0f32; 3 * 20];
    scores[19] = 5.0; // Y
    scores[20] = 5.0; // A
    scores[2 * 20 + 7] = 5.0; // I
    let backend = StubBackend::new(StubVocab::compact(), 20).with_scoring(Scoring::Fixed(scores));
    let runtime = runtime(backend);
    let model = ProstT5Model::load(&runtime, "prostt5.gguf", "none").unwrap();
    let mut session = model.session(1).unwrap();
    assert_eq!(session.try_predict("MKV").unwrap(), "YAI");
}

#[test]
fn test_class_major_scores() {
    // 150 token vocabulary: class major, pred_len = residues + 1
    let pred_len = 4;
    let mut scores = vec![0.0f32; pred_len * 20];
    scores[19 * pred_len] = 5.0; // Y
    scores[1] = 5.0; // A
    scores[7 * pred_len + 2] = 5.0; // I
    scores[3 * pred_len + 3] = 5.0; // end marker row, not decoded
    let backend = StubBackend::default().with_scoring(Scoring::Fixed(scores));
    let runtime = runtime(backend);
    let model = ProstT5Model::load(&runtime, "prostt5.gguf", "none").unwrap();
    let mut session = model.session(1).unwrap();
    assert_eq!(session.try_predict("MKV").unwrap(), "YAI");
}

#[test]
fn test_single_class_report_decodes_twenty_classes() {
    let pred_len = 3;
    let mut scores = vec![0.0f32; pred_len * 20];
    scores[12 * pred_len] = 1.0; // P
    scores[17 * pred_len + 1] = 1.0; // V
    let backend = StubBackend::new(StubVocab::sentencepiece(), 1).with_scoring(Scoring::Fixed(scores));
    let runtime = runtime(backend);
    let model = ProstT5Model::load(&runtime, "prostt5.gguf", "none").unwrap();
    assert_eq!(model.profile().n_classes, 20);
    let mut session = model.session(1).unwrap();
    assert_eq!(session.try_predict("MK").unwrap(), "PV");
}

#[test]
fn test_sessions_share_one_model() {
    let runtime = runtime(StubBackend::default());
    let model = ProstT5Model::load(&runtime, "prostt5.gguf", "CUDA0").unwrap();
    let mut first = model.session(1).unwrap();
    let mut second = model.session(2).unwrap();
    assert_eq!(first.predict("MKV"), second.predict("MKV"));
    assert_eq!(first.perf().n_encode, 1);
    assert_eq!(second.perf().n_encode, 1);
    assert_eq!(model.params().n_gpu_layers, 24);
}

#[test]
fn test_sessions_on_threads() {
    let runtime = runtime(StubBackend::default());
    let model = ProstT5Model::load(&runtime, "prostt5.gguf", "none").unwrap();
    let results: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let model = &model;
                scope.spawn(move || model.session(1).unwrap().predict("MKTAYIAKQR"))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(results.iter().all(|r| r == &results[0] && r.len() == 10));
}

#[test]
fn test_oversized_sequence_fails() {
    let runtime = runtime(StubBackend::default());
    let model = ProstT5Model::load(&runtime, "prostt5.gguf", "none").unwrap();
    let mut session = model.session(1).unwrap();
    let long = "A".repeat(4096);
    assert!(matches!(
        session.try_predict(&long),
        Err(PredictError::Encode(_))
    ));
    assert_eq!(session.predict(&long), "");
}
