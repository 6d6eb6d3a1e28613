//! # Evaluation Tests
//!
//! Exercises gold building, the precision and recall joins, web snippet
//! verification and the end-to-end evaluator with mock collaborators.

mod common;

use common::setup_tracing;
use kbc::config::EvalSettings;
use kbc::eval::gold::load_or_build;
use kbc::eval::{
    aggregate, EvalError, Evaluator, EvidenceJoin, Judge, MetricKind, SourceFiles, Tally,
    VerificationMethod, WebVerifier,
};
use kbc::triples_csv::write_triples_csv;
use kbc::types::{GoldTriple, Triple};
use kbc_test_utils::{MockAiProvider, MockReferenceSource, MockSearchProvider};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

fn butler_triples() -> Vec<Triple> {
    vec![
        Triple::new("Octavia Butler", "occupation", "writer", "Octavia Butler"),
        Triple::new("Octavia Butler", "genre", "science fiction", "Octavia Butler"),
        Triple::new("Octavia Butler", "born_in", "Pasadena", "Octavia Butler"),
    ]
}

fn butler_gold() -> BTreeMap<String, Vec<GoldTriple>> {
    BTreeMap::from([(
        "Octavia Butler".to_string(),
        vec![
            GoldTriple::new("Octavia Butler", "occupation", "writer"),
            GoldTriple::new("Octavia Butler", "genre", "science fiction"),
            GoldTriple::new("Octavia Butler", "place of birth", "Pasadena"),
            GoldTriple::new("Octavia Butler", "award received", "Hugo Award"),
        ],
    )])
}

fn butler_reference() -> MockReferenceSource {
    let reference = MockReferenceSource::new();
    reference.add_entity(
        "Octavia Butler",
        "Q237570",
        &[("P106", "Q36180"), ("P136", "Q24925"), ("P19", "Q485176")],
    );
    reference.add_literal("Q237570", "P569", "+1947-06-22T00:00:00Z");
    reference.add_label("P106", "occupation");
    reference.add_label("P136", "genre");
    reference.add_label("P19", "place of birth");
    reference.add_label("Q36180", "writer");
    reference.add_label("Q24925", "science fiction");
    reference.add_label("Q485176", "Pasadena");
    reference
}

fn settings(root: &Path, seed: &str) -> EvalSettings {
    EvalSettings {
        search_delay: Duration::ZERO,
        ..EvalSettings::under(root, seed)
    }
}

#[tokio::test]
async fn test_precision_all_true_gives_full_true_fraction() {
    setup_tracing();
    // --- 1. Arrange ---
    let ai = MockAiProvider::new();
    ai.set_default_response("a");
    let judge = Judge::new(Box::new(ai.clone()));
    let files: SourceFiles = BTreeMap::from([("wikidata_triples_1.csv".to_string(), butler_triples())]);

    // --- 2. Act ---
    let join = EvidenceJoin::new(&judge, None, "7");
    let tallies = join.precision(&files, &butler_gold()).await.unwrap();

    // --- 3. Assert ---
    let tally = &tallies["wikidata_triples_1.csv"];
    assert_eq!(
        *tally,
        Tally {
            true_count: 3,
            ..Tally::default()
        }
    );
    let row = aggregate("wikidata_triples_1.csv", tally, MetricKind::Precision).unwrap();
    assert_eq!(row.true_fraction, 1.0);
    assert_eq!(row.total, 3);

    // Every call carries the gold list of the subject.
    let calls = ai.get_calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].1.contains(
        "(Octavia Butler, occupation, writer) | (Octavia Butler, genre, science fiction)"
    ));
    assert!(calls[2].1.contains("(Octavia Butler, born in, Pasadena)"));
}

#[tokio::test]
async fn test_precision_tallies_each_verdict() {
    // --- 1. Arrange ---
    let ai = MockAiProvider::new();
    // Keys match the statement only; the gold list is part of every prompt.
    ai.add_response("verify: (Octavia Butler, occupation, writer)", "a");
    ai.add_response("verify: (Octavia Butler, genre, science fiction)", "b) plausible");
    ai.add_response("verify: (Octavia Butler, born in, Pasadena)", "d");
    ai.add_response("verify: (Octavia Butler, wrote, The Bible)", "I am not sure.");
    ai.add_response("verify: (Nobody, p, o)", "d");
    let judge = Judge::new(Box::new(ai));
    let mut triples = butler_triples();
    triples.push(Triple::new("Octavia Butler", "wrote", "The Bible", "Octavia Butler"));
    triples.push(Triple::new("Nobody", "p", "o", "Nobody"));
    let files: SourceFiles = BTreeMap::from([("f.csv".to_string(), triples)]);

    // --- 2. Act ---
    let tallies = EvidenceJoin::new(&judge, None, "7")
        .precision(&files, &butler_gold())
        .await
        .unwrap();

    // --- 3. Assert ---
    let tally = &tallies["f.csv"];
    assert_eq!(tally.true_count, 1);
    assert_eq!(tally.plausible, 1);
    assert_eq!(tally.false_count, 2);
    assert_eq!(tally.unrecognized, 1);
    assert_eq!(tally.no_evidence, 0);
    assert_eq!(tally.total(), 4);
    let row = aggregate("f.csv", tally, MetricKind::Precision).unwrap();
    assert!((row.fraction_sum() - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_precision_without_gold_still_asks_the_judge() {
    setup_tracing();
    // --- 1. Arrange: gold exists for Octavia Butler only ---
    let ai = MockAiProvider::new();
    ai.set_default_response("d");
    let judge = Judge::new(Box::new(ai.clone()));
    let triples = vec![
        Triple::new("Nobody", "occupation", "writer", "Nobody"),
        Triple::new("Somebody", "occupation", "painter", "Somebody"),
    ];
    let mut gold = butler_gold();
    gold.insert("Somebody".to_string(), Vec::new());
    let files: SourceFiles = BTreeMap::from([("f.csv".to_string(), triples)]);

    // --- 2. Act ---
    let tallies = EvidenceJoin::new(&judge, None, "7")
        .precision(&files, &gold)
        .await
        .unwrap();

    // --- 3. Assert: both triples are judged against an empty reference list ---
    let tally = &tallies["f.csv"];
    assert_eq!(tally.false_count, 2);
    assert_eq!(tally.no_evidence, 0);
    assert_eq!(tally.total(), 2);
    let calls = ai.get_calls();
    assert_eq!(calls.len(), 2);
    assert!(calls
        .iter()
        .all(|(_, user)| user.ends_with("Reference facts to verify from: ")));
}

#[tokio::test]
async fn test_precision_sample_is_seeded_and_sized() {
    let ai = MockAiProvider::new();
    ai.set_default_response("a");
    let judge = Judge::new(Box::new(ai.clone()));
    let triples: Vec<Triple> = (0..20)
        .map(|i| Triple::new("Octavia Butler", "p", &format!("o{i}"), "Octavia Butler"))
        .collect();
    let files: SourceFiles = BTreeMap::from([("f.csv".to_string(), triples)]);

    let first = EvidenceJoin::new(&judge, Some(5), "seed")
        .precision(&files, &butler_gold())
        .await
        .unwrap();
    let first_calls = ai.get_calls();
    EvidenceJoin::new(&judge, Some(5), "seed")
        .precision(&files, &butler_gold())
        .await
        .unwrap();
    let all_calls = ai.get_calls();

    assert_eq!(first["f.csv"].total(), 5);
    assert_eq!(first_calls.len(), 5);
    assert_eq!(&all_calls[5..], &first_calls[..]);
}

#[tokio::test]
async fn test_recall_judges_gold_against_elicited() {
    setup_tracing();
    // --- 1. Arrange ---
    let ai = MockAiProvider::new();
    ai.add_response("award received, Hugo Award)", "d");
    ai.set_default_response("a");
    let judge = Judge::new(Box::new(ai.clone()));
    let mut gold = butler_gold();
    gold.insert(
        "Ursula K. Le Guin".to_string(),
        vec![GoldTriple::new("Ursula K. Le Guin", "occupation", "writer")],
    );
    let files: SourceFiles = BTreeMap::from([("f.csv".to_string(), butler_triples())]);

    // --- 2. Act ---
    let tallies = EvidenceJoin::new(&judge, None, "7")
        .recall(&files, &gold)
        .await
        .unwrap();

    // --- 3. Assert: only gold of subjects present in the file is judged ---
    let tally = &tallies["f.csv"];
    assert_eq!(tally.total(), 4);
    assert_eq!(tally.true_count, 3);
    assert_eq!(tally.false_count, 1);

    let calls = ai.get_calls();
    assert_eq!(calls.len(), 4);
    assert!(calls
        .iter()
        .all(|(_, user)| user.contains("(Octavia Butler, occupation, writer), (Octavia Butler, genre, science fiction), (Octavia Butler, born in, Pasadena)")));
    assert!(calls.iter().all(|(_, user)| !user.contains("Le Guin")));
}

#[tokio::test]
async fn test_gold_is_built_once_and_then_authoritative() {
    setup_tracing();
    // --- 1. Arrange ---
    let dir = tempfile::tempdir().unwrap();
    let gold_path = dir.path().join("gold").join("wikidata_gold.json");
    let reference = butler_reference();
    let subjects = vec!["Octavia Butler".to_string(), "Unknown Person".to_string()];

    // --- 2. Act: build ---
    let gold = load_or_build(&gold_path, &subjects, &reference).await.unwrap();

    // --- 3. Assert ---
    assert_eq!(gold.len(), 1, "unresolvable subjects are skipped");
    assert_eq!(
        gold["Octavia Butler"],
        vec![
            GoldTriple::new("Octavia Butler", "occupation", "writer"),
            GoldTriple::new("Octavia Butler", "genre", "science fiction"),
            GoldTriple::new("Octavia Butler", "place of birth", "Pasadena"),
        ]
    );
    assert!(gold_path.exists());
    let lookups = reference.label_lookups();
    assert_eq!(lookups.len(), 6);

    // --- 4. Act: a second load reads the file, even with other subjects ---
    let other = MockReferenceSource::new();
    let reloaded = load_or_build(&gold_path, &["Someone Else".to_string()], &other)
        .await
        .unwrap();
    assert_eq!(reloaded, gold);
    assert!(other.label_lookups().is_empty());
}

#[tokio::test]
async fn test_gold_labels_are_resolved_once_per_build() {
    let dir = tempfile::tempdir().unwrap();
    let reference = MockReferenceSource::new();
    reference.add_entity("A", "Q1", &[("P31", "Q5"), ("P106", "Q36180")]);
    reference.add_entity("B", "Q2", &[("P31", "Q5"), ("P106", "Q404")]);
    for (id, label) in [("P31", "instance of"), ("P106", "occupation"), ("Q5", "human"), ("Q36180", "writer")] {
        reference.add_label(id, label);
    }

    let gold = load_or_build(
        &dir.path().join("gold.json"),
        &["A".to_string(), "B".to_string()],
        &reference,
    )
    .await
    .unwrap();

    // Q404 has no label, so that claim is dropped.
    assert_eq!(gold["B"], vec![GoldTriple::new("B", "instance of", "human")]);
    let mut lookups = reference.label_lookups();
    lookups.sort();
    assert_eq!(lookups, vec!["P106", "P31", "Q36180", "Q404", "Q5"]);
}

#[tokio::test]
async fn test_web_verification_uses_and_fills_the_cache() {
    setup_tracing();
    // --- 1. Arrange ---
    let dir = tempfile::tempdir().unwrap();
    let search = MockSearchProvider::new();
    search.add_results(
        "Octavia Butler writer",
        &["Octavia Estelle Butler was an American science fiction writer."],
    );
    search.add_results("Octavia Butler science fiction", &["Butler wrote science fiction."]);
    let ai = MockAiProvider::new();
    ai.set_default_response("a");
    let judge = Judge::new(Box::new(ai.clone()));
    let verifier = WebVerifier::new(&search, &judge, dir.path(), "42", Duration::ZERO);

    // --- 2. Act ---
    let enriched = verifier.enrich(&butler_triples()).await.unwrap();
    let tally = verifier.verify(&enriched).await.unwrap();

    // --- 3. Assert ---
    assert_eq!(
        search.queries(),
        vec![
            "Octavia Butler writer",
            "Octavia Butler science fiction",
            "Octavia Butler Pasadena"
        ]
    );
    assert_eq!(tally.true_count, 2);
    assert_eq!(tally.no_evidence, 1, "no snippets means no judge call");
    assert_eq!(ai.get_calls().len(), 2);
    assert!(ai.get_calls()[0]
        .1
        .contains("Octavia Estelle Butler was an American science fiction writer. | "));
    assert!(dir.path().join("42.json").exists());

    // --- 4. Act: a second run is served from the cache ---
    let again = verifier.enrich(&butler_triples()).await.unwrap();
    assert_eq!(again, enriched);
    assert_eq!(search.queries().len(), 3);
}

fn write_source(dir: &Path, name: &str, triples: &[Triple]) {
    write_triples_csv(&dir.join(name), triples).unwrap();
}

#[tokio::test]
async fn test_evaluator_writes_results_for_each_file() {
    setup_tracing();
    // --- 1. Arrange ---
    let dir = tempfile::tempdir().unwrap();
    let triples_dir = dir.path().join("triples");
    write_source(&triples_dir, "wikidata_triples_1.csv", &butler_triples());
    write_source(
        &triples_dir,
        "wikidata_triples_2.csv",
        &[Triple::new("Octavia Butler", "occupation", "painter", "Octavia Butler")],
    );
    fs::write(triples_dir.join("notes.txt"), "ignored").unwrap();
    let reference = butler_reference();
    let ai = MockAiProvider::new();
    ai.add_response("painter", "d");
    ai.set_default_response("a");
    let evaluator = Evaluator::new(Judge::new(Box::new(ai)), settings(dir.path(), "7"))
        .with_reference(&reference);
    let results_dir = dir.path().join("results");

    // --- 2. Act ---
    let report = evaluator
        .run(
            &triples_dir,
            &["Octavia Butler".to_string()],
            VerificationMethod::Wikidata,
            MetricKind::Precision,
            &results_dir,
        )
        .await
        .unwrap();

    // --- 3. Assert ---
    assert_eq!(
        report.output_path,
        results_dir.join("results_wikidata_precision_7.csv")
    );
    let content = fs::read_to_string(&report.output_path).unwrap();
    assert_eq!(
        content,
        "True,Plausible,Implausible,False,Total #Triples,Metric,Source Elicited File\n\
         1.0,0.0,0.0,0.0,3,precision,wikidata_triples_1.csv\n\
         0.0,0.0,0.0,1.0,1,precision,wikidata_triples_2.csv\n"
    );
    assert!(dir.path().join("wikidata_gold.json").exists());
}

#[tokio::test]
async fn test_evaluator_can_pool_files() {
    let dir = tempfile::tempdir().unwrap();
    let triples_dir = dir.path().join("triples");
    let triples = butler_triples();
    write_source(&triples_dir, "wikidata_triples_1.csv", &triples[..2]);
    write_source(&triples_dir, "wikidata_triples_2.csv", &triples[2..]);
    let reference = butler_reference();
    let ai = MockAiProvider::new();
    ai.set_default_response("b");
    let evaluator = Evaluator::new(
        Judge::new(Box::new(ai)),
        EvalSettings {
            pool_files: true,
            ..settings(dir.path(), "7")
        },
    )
    .with_reference(&reference);

    let report = evaluator
        .run(
            &triples_dir,
            &["Octavia Butler".to_string()],
            VerificationMethod::Wikidata,
            MetricKind::Recall,
            &dir.path().join("results"),
        )
        .await
        .unwrap();

    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].source, "pooled");
    assert_eq!(report.rows[0].plausible_fraction, 1.0);
    assert_eq!(report.rows[0].total, 3);
}

#[tokio::test]
async fn test_empty_sample_is_a_visible_error() {
    // --- 1. Arrange: the second file only draws answers the judge cannot decode ---
    let dir = tempfile::tempdir().unwrap();
    let triples_dir = dir.path().join("triples");
    write_source(&triples_dir, "wikidata_triples_1.csv", &butler_triples());
    write_source(
        &triples_dir,
        "wikidata_triples_2.csv",
        &[Triple::new("Nobody", "p", "o", "Nobody")],
    );
    let reference = butler_reference();
    let ai = MockAiProvider::new();
    ai.add_response("verify: (Nobody, p, o)", "Hard to say.");
    ai.set_default_response("a");
    let evaluator = Evaluator::new(Judge::new(Box::new(ai)), settings(dir.path(), "7"))
        .with_reference(&reference);

    // --- 2. Act ---
    let result = evaluator
        .run(
            &triples_dir,
            &["Octavia Butler".to_string(), "Nobody".to_string()],
            VerificationMethod::Wikidata,
            MetricKind::Precision,
            &dir.path().join("results"),
        )
        .await;

    // --- 3. Assert: no summary at all, and the message says so ---
    let err = result.unwrap_err();
    assert!(matches!(
        err,
        EvalError::EmptySample { ref file, no_evidence: 0, unrecognized: 1 } if file == "wikidata_triples_2.csv"
    ));
    let message = err.to_string();
    assert!(message.contains("every other file were discarded"), "{message}");
    assert!(message.contains("no summary was written"), "{message}");
    assert!(!dir.path().join("results").exists());
}

#[tokio::test]
async fn test_preconditions_fail_before_any_call() {
    let dir = tempfile::tempdir().unwrap();
    let ai = MockAiProvider::new();
    let search = MockSearchProvider::new();
    let evaluator = Evaluator::new(Judge::new(Box::new(ai.clone())), settings(dir.path(), "7"))
        .with_search(&search);

    let missing = evaluator
        .run(
            &dir.path().join("missing"),
            &[],
            VerificationMethod::Web,
            MetricKind::Precision,
            dir.path(),
        )
        .await;
    assert!(matches!(missing, Err(EvalError::MissingTriplesDir(_))));

    let web_recall = evaluator
        .run(
            dir.path(),
            &[],
            VerificationMethod::Web,
            MetricKind::Recall,
            dir.path(),
        )
        .await;
    assert!(matches!(web_recall, Err(EvalError::Config(_))));

    let no_reference = evaluator
        .run(
            dir.path(),
            &[],
            VerificationMethod::Wikidata,
            MetricKind::Precision,
            dir.path(),
        )
        .await;
    assert!(matches!(no_reference, Err(EvalError::Config(_))));

    assert!(ai.get_calls().is_empty());
    assert!(search.queries().is_empty());
}

#[tokio::test]
async fn test_web_method_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let triples_dir = dir.path().join("triples");
    write_source(&triples_dir, "wikidata_triples_1.csv", &butler_triples());
    let search = MockSearchProvider::new();
    search.add_results("Octavia Butler writer", &["She was a writer."]);
    let ai = MockAiProvider::new();
    ai.set_default_response("c");
    let evaluator = Evaluator::new(Judge::new(Box::new(ai)), settings(dir.path(), "99"))
        .with_search(&search);

    let report = evaluator
        .run(
            &triples_dir,
            &[],
            VerificationMethod::Web,
            MetricKind::Precision,
            &dir.path().join("results"),
        )
        .await
        .unwrap();

    assert_eq!(report.rows[0].implausible_fraction, 1.0);
    assert_eq!(report.rows[0].total, 1);
    assert_eq!(report.tallies["wikidata_triples_1.csv"].no_evidence, 2);
    assert!(dir.path().join("snippets").join("99.json").exists());
    assert!(report
        .output_path
        .ends_with("results_web_precision_99.csv"));
}
