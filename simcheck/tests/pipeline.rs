mod common;

use common::{doc, partition, words, Harness};
use simcheck::config::{CandidateConfig, ScoringConfig};
use simcheck::segments::TokenSpan;
use simcheck::{RepositoryIndex, SimcheckConfig, Status, Thresholds};

const ESSAY: &str = "Photosynthesis is the process used by plants, algae and certain bacteria \
    to harness energy from sunlight and turn it into chemical energy. The light dependent \
    reactions take place in the thylakoid membranes of the chloroplasts, where water is split \
    and oxygen is released as a by-product. The energy captured is stored in ATP and NADPH, \
    which then power the Calvin cycle in the stroma to fix carbon dioxide into sugars.";

fn config_without_confidence() -> SimcheckConfig {
    SimcheckConfig {
        scoring: ScoringConfig {
            min_confidence: 1.,
            ..ScoringConfig::default()
        },
        ..SimcheckConfig::default()
    }
}

#[tokio::test]
async fn test_exact_duplicate_is_flagged() {
    let h = Harness::default();
    let p = partition(10, "essay");
    h.ingest("stored", &p, ESSAY).await;

    let reformatted = ESSAY.to_uppercase().replace(',', " ;  ");
    let result = h.comparator.compare(&doc("new", &p, &reformatted)).await.unwrap();
    assert_eq!(result.highest_score, 1.);
    assert_eq!(result.highest_percentage, 100.);
    assert_eq!(result.status, Status::Flagged);
    assert_eq!(result.total_matches, 1);
    assert_eq!(result.high_risk_matches, 1);
    assert!(result.metadata.exact_duplicate);

    let m = &result.matches[0];
    assert_eq!(m.document_id, "stored");
    assert!(m.breakdown.exact_duplicate);
    assert_eq!(m.segments.len(), 1);
    assert_eq!(m.segments[0].incoming.start, 0);
    assert_eq!(m.segments[0].incoming.end, m.breakdown.matched_tokens);
}

#[tokio::test]
async fn test_deterministic() {
    let h = Harness::default();
    let p = partition(10, "essay");
    h.ingest("a", &p, ESSAY).await;
    h.ingest("b", &p, &format!("{} {}", words("intro", 30), ESSAY)).await;
    h.ingest("c", &p, &words("other", 80)).await;

    let incoming = doc("new", &p, &format!("{ESSAY} {}", words("outro", 20)));
    let first = h.comparator.compare(&incoming).await.unwrap();
    let second = h.comparator.compare(&incoming).await.unwrap();
    assert!(first.same_outcome(&second));
    assert_ne!(first.id, second.id);
    assert_eq!(
        serde_json::to_value(&first.matches).unwrap(),
        serde_json::to_value(&second.matches).unwrap()
    );
}

#[tokio::test]
async fn test_near_duplicate_is_selected() {
    let h = Harness::default();
    let p = partition(9, "report");
    let original: Vec<String> = (0..200).map(|i| format!("w{i}")).collect();
    h.ingest("original", &p, &original.join(" ")).await;

    // Every 20th word swapped for a synonym: a 5% substitution.
    let paraphrase: Vec<String> = original
        .iter()
        .enumerate()
        .map(|(i, w)| if i % 20 == 10 { format!("syn{i}") } else { w.clone() })
        .collect();
    let result = h
        .comparator
        .compare(&doc("paraphrase", &p, &paraphrase.join(" ")))
        .await
        .unwrap();
    assert_eq!(result.total_matches, 1);
    assert_eq!(result.matches[0].document_id, "original");
    assert!(!result.metadata.exact_duplicate);
    assert_eq!(result.status, Status::Flagged);
    // Passages between substitutions are reported separately.
    assert_eq!(result.matches[0].segments.len(), 11);
}

#[tokio::test]
async fn test_near_duplicate_is_found_by_simhash_alone() {
    let config = SimcheckConfig {
        candidates: CandidateConfig {
            min_shared_ngrams: usize::MAX,
            ..CandidateConfig::default()
        },
        ..SimcheckConfig::default()
    };
    let h = Harness::new(config);
    let p = partition(9, "report");
    let original: Vec<String> = (0..200).map(|i| format!("w{i}")).collect();
    h.ingest("original", &p, &original.join(" ")).await;

    for offset in [3, 10, 17] {
        let paraphrase: Vec<String> = original
            .iter()
            .enumerate()
            .map(|(i, w)| if i % 20 == offset { format!("syn{i}") } else { w.clone() })
            .collect();
        let result = h
            .comparator
            .compare(&doc("paraphrase", &p, &paraphrase.join(" ")))
            .await
            .unwrap();
        assert_eq!(result.total_matches, 1, "offset={offset}");
        assert!(result.matches[0].breakdown.simhash_distance <= 20);
    }
}

#[tokio::test]
async fn test_short_entry_does_not_flag_long_document() {
    let h = Harness::default();
    let p = partition(10, "essay");
    h.ingest("phrase", &p, "In this project, we").await;

    let essay = format!("{} {ESSAY} in this project we {}", words("a", 120), words("b", 120));
    let result = h.comparator.compare(&doc("essay", &p, &essay)).await.unwrap();
    assert_eq!(result.total_matches, 1);
    let m = &result.matches[0];
    assert_eq!(m.breakdown.ngram_score, 1.);
    assert!(m.score < 1.);
    assert_eq!(m.score, m.breakdown.confidence);
    assert_ne!(result.status, Status::Flagged);
}

#[tokio::test]
async fn test_segment_is_exact() {
    let h = Harness::default();
    let p = partition(11, "essay");
    let passage = words("p", 40);
    h.ingest(
        "source",
        &p,
        &format!("{} {passage} {}", words("a", 50), words("b", 50)),
    )
    .await;

    let result = h
        .comparator
        .compare(&doc(
            "copy",
            &p,
            &format!("{} {passage} {}", words("c", 10), words("d", 10)),
        ))
        .await
        .unwrap();
    assert_eq!(result.total_matches, 1);
    let segments = &result.matches[0].segments;
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].incoming, TokenSpan::new(10, 50));
    assert_eq!(segments[0].repository, TokenSpan::new(50, 90));
    assert_eq!(segments[0].excerpt, passage);
    assert_eq!(result.matches[0].breakdown.matched_tokens, 40);
}

#[tokio::test]
async fn test_score_is_monotone_in_shared_ngrams() {
    let h = Harness::new(config_without_confidence());
    let p = partition(12, "thesis");
    for copied in [10, 25, 40, 55] {
        let text = format!("{} {}", words("w", copied), words(&format!("x{copied}y"), 60 - copied));
        h.ingest(&format!("copied-{copied}"), &p, &text).await;
    }

    let result = h.comparator.compare(&doc("new", &p, &words("w", 60))).await.unwrap();
    let ids: Vec<_> = result.matches.iter().map(|m| m.document_id.as_str()).collect();
    assert_eq!(ids, vec!["copied-55", "copied-40", "copied-25", "copied-10"]);
    let scores: Vec<_> = result.matches.iter().map(|m| m.score).collect();
    assert!(scores.windows(2).all(|w| w[0] > w[1]));
}

#[tokio::test]
async fn test_partitions_are_isolated() {
    let h = Harness::default();
    h.ingest("stored", &partition(10, "essay"), ESSAY).await;

    let result = h
        .comparator
        .compare(&doc("new", &partition(11, "essay"), ESSAY))
        .await
        .unwrap();
    assert_eq!(result.total_matches, 0);
    assert_eq!(result.status, Status::Safe);

    // Project types are compared case-insensitively.
    let result = h
        .comparator
        .compare(&doc("new", &partition(10, " Essay "), ESSAY))
        .await
        .unwrap();
    assert_eq!(result.status, Status::Flagged);
}

#[tokio::test]
async fn test_flagged_boundary_is_inclusive() {
    let config = SimcheckConfig {
        thresholds: Thresholds::new(0.5, 0.25).unwrap(),
        ..config_without_confidence()
    };
    let h = Harness::new(config);
    let p = partition(8, "homework");
    // 5 of 10 trigrams are shared.
    h.ingest("half", &p, &format!("{} {}", words("w", 7), words("x", 5))).await;

    let result = h.comparator.compare(&doc("new", &p, &words("w", 12))).await.unwrap();
    assert_eq!(result.highest_score, 0.5);
    assert_eq!(result.status, Status::Flagged);
    assert_eq!(result.high_risk_matches, 1);
    assert_eq!(result.metadata.thresholds, Thresholds::new(0.5, 0.25).unwrap());
}

#[tokio::test]
async fn test_compare_does_not_modify_index() {
    let h = Harness::default();
    let p = partition(10, "essay");
    h.ingest("stored", &p, ESSAY).await;

    h.comparator.compare(&doc("new", &p, ESSAY)).await.unwrap();
    h.comparator.compare(&doc("new", &p, ESSAY)).await.unwrap();
    assert_eq!(h.comparator.list(&p).await.unwrap().len(), 1);
    assert_eq!(h.store.results_for("new").len(), 2);
}

#[tokio::test]
async fn test_ingest_does_not_deduplicate() {
    let h = Harness::default();
    let p = partition(10, "essay");
    let first = h.comparator.ingest(&doc("same", &p, ESSAY)).await.unwrap();
    let second = h.comparator.ingest(&doc("same", &p, ESSAY)).await.unwrap();
    assert_ne!(first.id, second.id);

    let listed = h.comparator.list(&p).await.unwrap();
    assert_eq!(
        listed.iter().map(|e| e.id).collect::<Vec<_>>(),
        vec![first.id, second.id]
    );

    let result = h.comparator.compare(&doc("new", &p, ESSAY)).await.unwrap();
    assert_eq!(result.total_matches, 2);

    assert!(h.comparator.remove(first.id).await.unwrap());
    assert!(!h.comparator.remove(first.id).await.unwrap());
    assert_eq!(h.comparator.list(&p).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_truncation_is_recorded() {
    let config = SimcheckConfig {
        candidates: CandidateConfig {
            max_candidates: 2,
            ..CandidateConfig::default()
        },
        ..SimcheckConfig::default()
    };
    let h = Harness::new(config);
    let p = partition(10, "essay");
    for i in 0..4 {
        h.ingest(&format!("d{i}"), &p, &format!("{} tail{i}", words("w", 30)))
            .await;
    }

    let result = h.comparator.compare(&doc("new", &p, &words("w", 30))).await.unwrap();
    assert!(result.metadata.truncated);
    assert_eq!(result.metadata.candidates_considered, 4);
    assert_eq!(result.metadata.candidates_scored, 2);
    assert_eq!(result.total_matches, 2);
}

#[tokio::test]
async fn test_snapshot_survives_reload() {
    let h = Harness::default();
    let p = partition(10, "essay");
    h.ingest("stored", &p, ESSAY).await;

    let json = h.index.snapshot().to_json().unwrap();
    let restored = simcheck::InMemoryIndex::from_snapshot(
        8,
        simcheck::IndexSnapshot::from_json(&json).unwrap(),
    )
    .unwrap();
    assert_eq!(restored.list(&p).await.unwrap(), h.index.list(&p).await.unwrap());
}
