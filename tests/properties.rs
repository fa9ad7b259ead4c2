use incident_lsi::{
    utils::{math::dense, normalizer::normalize},
    vectorizer::{token::tokenize, VectorizerParams},
    Kmeans, TfIdfVectorizer,
};
use proptest::prelude::*;

const WORDS: &[&str] = &[
    "noise", "residential", "street", "sidewalk", "parking", "blocked", "driveway", "heat", "water", "hydrant",
    "loud", "music", "party", "the", "and", "Pothole", "42nd",
];

fn corpus() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        prop::collection::vec(prop::sample::select(WORDS), 0..8).prop_map(|w| w.join(" ")),
        1..12,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_columns_in_range_and_rows_unit_or_zero(texts in corpus(), max_features in 1usize..20) {
        let normalized: Vec<String> = texts.iter().map(|t| normalize(t)).collect();
        let params = VectorizerParams { max_features, min_document_frequency: 1 };
        if let Ok((vectorizer, matrix)) = TfIdfVectorizer::<incident_lsi::DefaultTfIdfEngine>::fit(&normalized, params) {
            prop_assert!(vectorizer.vocab_size() <= max_features);
            prop_assert_eq!(matrix.n_rows(), texts.len());
            for row in matrix.rows() {
                prop_assert!(row.indices().iter().all(|&i| (i as usize) < vectorizer.vocab_size()));
                let norm = row.norm();
                prop_assert!(row.is_zero() || (norm - 1.0).abs() < 1e-9);
            }
            // refitting the same texts through transform gives the same rows
            prop_assert_eq!(vectorizer.transform(&normalized), matrix);
        }
    }

    #[test]
    fn prop_unseen_text_stays_in_fitted_columns(
        texts in corpus(),
        unseen in prop::collection::vec("[ -~]{0,40}", 1..6),
    ) {
        let normalized: Vec<String> = texts.iter().map(|t| normalize(t)).collect();
        let params = VectorizerParams { max_features: 8, min_document_frequency: 1 };
        if let Ok((vectorizer, _)) = TfIdfVectorizer::<incident_lsi::DefaultTfIdfEngine>::fit(&normalized, params) {
            for text in &unseen {
                let row = vectorizer.transform_one(&normalize(text));
                prop_assert_eq!(row.len(), vectorizer.vocab_size());
                prop_assert!(row.indices().iter().all(|&i| (i as usize) < vectorizer.vocab_size()));
                prop_assert!(row.is_zero() || (row.norm() - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn prop_normalized_text_tokenizes_losslessly(text in "[ -~]{0,60}") {
        let normalized = normalize(&text);
        let tokens = tokenize(&normalized);
        prop_assert_eq!(tokens.join(" "), normalized);
    }

    #[test]
    fn prop_kmeans_labels_in_range(
        data in prop::collection::vec(prop::collection::vec(-10.0f64..10.0, 2), 1..20),
        k in 1usize..5
    ) {
        if k <= data.len() {
            let matrix = dense::from_rows(2, data.clone());
            let fit = Kmeans::new(k).with_seed(42).with_n_init(3).fit(&matrix).unwrap();
            prop_assert_eq!(fit.labels().len(), data.len());
            prop_assert!(fit.labels().iter().all(|&l| l < k));
            prop_assert_eq!(fit.sizes().iter().sum::<usize>(), data.len());
        }
    }
}
