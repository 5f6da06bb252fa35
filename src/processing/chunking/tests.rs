use super::*;
use crate::processing::cleaner::{RawRecord, clean_records, fields};
use crate::processing::dedup::filter_and_dedup;
use serde_json::json;

fn splitter(chunk_size: usize, chunk_overlap: usize) -> TextSplitter {
    TextSplitter::new(chunk_size, chunk_overlap).expect("valid splitter parameters")
}

fn filtered(id: Option<&str>, index: usize, semantic_text: &str) -> FilteredRecord {
    FilteredRecord {
        index,
        record: CleanedRecord {
            id: id.map(ToString::to_string),
            title: "Titre".to_string(),
            city: "Lyon".to_string(),
            semantic_text: semantic_text.to_string(),
            ..CleanedRecord::default()
        },
    }
}

#[test]
fn rejects_invalid_parameters() {
    assert_eq!(
        TextSplitter::new(0, 0).expect_err("zero chunk size"),
        ProcessingError::InvalidChunkSize(0)
    );
    assert_eq!(
        TextSplitter::new(10, 10).expect_err("overlap equal to size"),
        ProcessingError::OverlapTooLarge {
            overlap: 10,
            chunk_size: 10
        }
    );
    assert!(TextSplitter::new(10, 11).is_err());

    let ok = splitter(10, 9);
    assert_eq!(ok.chunk_size(), 10);
    assert_eq!(ok.chunk_overlap(), 9);
}

#[test]
fn short_text_is_a_single_trimmed_chunk() {
    let chunks = splitter(1000, 100).split_text("  Concert Rock . Live, Musique . Salle A . Lyon ");
    assert_eq!(chunks, vec!["Concert Rock . Live, Musique . Salle A . Lyon"]);
}

#[test]
fn empty_text_yields_no_chunks() {
    assert!(splitter(10, 2).split_text("").is_empty());
    assert!(splitter(10, 2).split_text("   ").is_empty());
}

#[test]
fn word_split_with_overlap() {
    // Pieces are "aaaa", " bbbb", " cccc", " dddd"; the trailing piece of each chunk
    // (5 characters, within the overlap budget) opens the next one
    let chunks = splitter(10, 5).split_text("aaaa bbbb cccc dddd");
    assert_eq!(chunks, vec!["aaaa bbbb", "bbbb cccc", "cccc dddd"]);
}

#[test]
fn word_split_without_overlap() {
    let chunks = splitter(10, 0).split_text("aaaa bbbb cccc dddd");
    assert_eq!(chunks, vec!["aaaa bbbb", "cccc dddd"]);
}

#[test]
fn character_fallback_with_overlap() {
    let chunks = splitter(4, 1).split_text("abcdefghij");
    assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
}

#[test]
fn prefers_paragraph_boundaries() {
    let text = "First paragraph here.\n\nSecond paragraph here.";
    let chunks = splitter(30, 0).split_text(text);
    assert_eq!(chunks, vec!["First paragraph here.", "Second paragraph here."]);
}

#[test]
fn prefers_sentence_boundaries_over_spaces() {
    let text = "Visite du musée. Atelier pour enfants. Goûter offert";
    let chunks = splitter(25, 0).split_text(text);
    assert_eq!(
        chunks,
        vec!["Visite du musée", ". Atelier pour enfants", ". Goûter offert"]
    );
}

#[test]
fn oversized_piece_falls_through_to_finer_separators() {
    // The first paragraph is too long and gets split on spaces, the second fits
    let text = "un deux trois quatre cinq six\n\nsept";
    let chunks = splitter(12, 0).split_text(text);
    assert_eq!(chunks, vec!["un deux", "trois", "quatre cinq", "six", "sept"]);
}

#[test]
fn chunks_never_exceed_chunk_size() {
    let text = "Festival de musique . ".repeat(40)
        + &"Exposition photographique en plein air\n".repeat(10)
        + &"x".repeat(300);

    for (size, overlap) in [(50, 10), (100, 0), (37, 36), (200, 50)] {
        for chunk in splitter(size, overlap).split_text(&text) {
            let len = chunk.chars().count();
            assert!(len <= size, "chunk of {len} chars exceeds {size}");
            assert!(!chunk.is_empty());
        }
    }
}

#[test]
fn overlap_is_bounded_by_chunk_overlap() {
    let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu";
    let chunks = splitter(20, 6).split_text(text);
    assert!(chunks.len() > 1);

    for pair in chunks.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        let shared = (1..=prev.len().min(next.len()))
            .rev()
            .find(|&n| prev.ends_with(&next[..n]))
            .unwrap_or(0);
        assert!(shared <= 6, "{prev:?} and {next:?} share {shared} chars");
    }
}

#[test]
fn multibyte_characters_are_counted_once() {
    let text = "é".repeat(8);
    let chunks = splitter(4, 0).split_text(&text);
    assert_eq!(chunks, vec!["éééé", "éééé"]);
}

#[test]
fn custom_separators() {
    let chunks = splitter(6, 0)
        .with_separators(vec!["|".to_string(), String::new()])
        .split_text("abc|def|ghi");
    assert_eq!(chunks, vec!["abc", "|def", "|ghi"]);
}

#[test]
fn end_to_end_example() {
    let raw = RawRecord::from(json!({
        "id": "evt1",
        "titre": "  Concert <b>Rock</b> ",
        "description": "",
        "description_complete": null,
        "mots_cles": ["Live", "Musique"],
        "lieu": "Salle A",
        "ville": "Lyon"
    }));

    let records = filter_and_dedup(clean_records(&[raw]), 10);
    assert_eq!(records.len(), 1);

    let (chunks, metadatas) = chunk_records(&records, 1000, 100).expect("valid parameters");
    assert_eq!(chunks, vec!["Concert Rock . Live, Musique . Salle A . Lyon"]);
    assert_eq!(metadatas.len(), 1);
    assert_eq!(metadatas[0].chunk_id, "evt1_0");
    assert_eq!(metadatas[0].source, "openagenda");
    assert_eq!(metadatas[0].event_id.as_deref(), Some("evt1"));
    assert_eq!(metadatas[0].title.as_deref(), Some("Concert Rock"));
    assert_eq!(metadatas[0].keywords.as_deref(), Some("Live, Musique"));
    assert_eq!(metadatas[0].city.as_deref(), Some("Lyon"));
    assert_eq!(metadatas[0].address, None);
}

#[test]
fn chunk_ids_increase_per_record_and_stay_aligned() {
    let records = vec![
        filtered(Some("a"), 0, "aaaa bbbb cccc dddd"),
        filtered(Some("b"), 1, "short"),
        filtered(Some("c"), 2, "eeee ffff gggg"),
    ];

    let (chunks, metadatas) = chunk_records(&records, 10, 0).expect("valid parameters");
    assert_eq!(chunks.len(), metadatas.len());

    let ids: Vec<&str> = metadatas.iter().map(|m| m.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["a_0", "a_1", "b_0", "c_0", "c_1"]);
    assert_eq!(chunks, vec!["aaaa bbbb", "cccc dddd", "short", "eeee ffff", "gggg"]);

    for (chunk, metadata) in chunks.iter().zip(&metadatas) {
        let event = metadata.event_id.as_deref().expect("event id is set");
        let expected_text = &records
            .iter()
            .find(|r| r.record.id.as_deref() == Some(event))
            .expect("record exists")
            .record
            .semantic_text;
        assert!(expected_text.contains(chunk.as_str()));
    }
}

#[test]
fn chunks_of_one_record_differ_only_by_chunk_id() {
    let records = vec![filtered(Some("x"), 0, "aaaa bbbb cccc dddd")];
    let (_, metadatas) = chunk_records(&records, 10, 5).expect("valid parameters");
    assert_eq!(metadatas.len(), 3);

    for metadata in &metadatas[1..] {
        assert_eq!(
            ChunkMetadata {
                chunk_id: metadatas[0].chunk_id.clone(),
                ..metadata.clone()
            },
            metadatas[0]
        );
    }
}

#[test]
fn missing_id_falls_back_to_batch_index() {
    let records = vec![
        filtered(Some("known"), 0, "premier événement"),
        filtered(None, 1, "second événement"),
    ];

    let (_, metadatas) = chunk_records(&records, 100, 10).expect("valid parameters");
    assert_eq!(metadatas[0].chunk_id, "known_0");
    assert_eq!(metadatas[1].chunk_id, "1_0");
    assert_eq!(metadatas[1].event_id, None);
}

#[test]
fn batch_index_fallback_shares_key_space_with_ids() {
    let records = vec![
        filtered(None, 0, "sans identifiant"),
        filtered(Some("0"), 1, "identifiant zéro"),
    ];

    let (_, metadatas) = chunk_records(&records, 100, 10).expect("valid parameters");
    assert_eq!(metadatas[0].chunk_id, "0_0");
    assert_eq!(metadatas[1].chunk_id, "0_0");
    assert_eq!(metadatas[0].event_id, None);
    assert_eq!(metadatas[1].event_id.as_deref(), Some("0"));
}

#[test]
fn fields_cleaned_to_empty_are_left_out_of_metadata() {
    let raw = RawRecord::from(json!({
        "id": "vide",
        "titre": "Balade nocturne",
        "description": "Découverte des étoiles",
        "adresse": "   ",
        "lieu": "<br/>",
        "ville": "Sète"
    }));

    let records = filter_and_dedup(clean_records(&[raw]), 0);
    let (_, metadatas) = chunk_records(&records, 1000, 100).expect("valid parameters");

    let value = serde_json::to_value(&metadatas[0]).expect("metadata serializes");
    let object = value.as_object().expect("metadata is an object");
    assert_eq!(object.get("ville"), Some(&json!("Sète")));
    assert!(!object.contains_key("adresse"));
    assert!(!object.contains_key("lieu"));
}

#[test]
fn metadata_keys_stay_within_allow_list() {
    let raw = RawRecord::from(json!({
        "id": "evt9",
        "titre": "Salon du livre",
        "description": "Rencontres avec des auteurs",
        "mots_cles": ["livres", "auteurs"],
        "date_debut": "2024-03-01",
        "date_fin": "2024-03-03",
        "lieu": "Parc des expositions",
        "adresse": "Route de Vendargues",
        "code_postal": "34000",
        "ville": "Montpellier",
        "departement": "Hérault",
        "conditions": "Gratuit",
        "coordonnees_gps": {"lat": 43.6, "lon": 3.9},
        "date_mise_a_jour": "2024-01-10",
        "url": "https://example.org/salon"
    }));

    let records = filter_and_dedup(clean_records(&[raw]), 0);
    let (_, metadatas) = chunk_records(&records, 1000, 100).expect("valid parameters");

    for metadata in metadatas {
        let value = serde_json::to_value(&metadata).expect("metadata serializes");
        let keys: Vec<&String> = value
            .as_object()
            .expect("metadata is an object")
            .keys()
            .collect();

        assert_eq!(keys.len(), METADATA_KEYS.len());
        for key in keys {
            assert!(METADATA_KEYS.contains(&key.as_str()), "unexpected key {key}");
            assert_ne!(key, fields::SEMANTIC_TEXT);
        }
    }
}

#[test]
fn empty_fields_are_left_out_of_metadata() {
    let records = vec![filtered(Some("e"), 0, "texte")];
    let (_, metadatas) = chunk_records(&records, 100, 0).expect("valid parameters");

    let value = serde_json::to_value(&metadatas[0]).expect("metadata serializes");
    let object = value.as_object().expect("metadata is an object");
    assert!(object.contains_key("titre"));
    assert!(object.contains_key("ville"));
    assert!(!object.contains_key("adresse"));
    assert!(!object.contains_key("url"));
}

#[test]
fn invalid_parameters_fail_before_any_work() {
    let records = vec![filtered(Some("a"), 0, "texte")];
    assert!(matches!(
        chunk_records(&records, 50, 50),
        Err(ProcessingError::OverlapTooLarge { .. })
    ));
    assert!(chunk_records(&[], 0, 0).is_err());
}
