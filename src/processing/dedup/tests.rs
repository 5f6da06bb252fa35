use super::*;

fn cleaned(id: &str, semantic_text: &str) -> CleanedRecord {
    CleanedRecord {
        id: Some(id.to_string()),
        title: semantic_text.to_string(),
        semantic_text: semantic_text.to_string(),
        ..CleanedRecord::default()
    }
}

fn ids(records: &[FilteredRecord]) -> Vec<&str> {
    records
        .iter()
        .filter_map(|r| r.record.id.as_deref())
        .collect()
}

#[test]
fn fingerprint_ignores_case_and_space_runs() {
    assert_eq!(fingerprint("  Hello   WORLD\n again "), "hello world again");
    assert_eq!(fingerprint("Été À Nîmes"), "été à nîmes");
    assert_eq!(fingerprint(""), "");
}

#[test]
fn duplicate_differing_by_case_and_spacing_keeps_first() {
    let records = vec![
        cleaned(
            "first",
            "Hello world, this is a long test sentence for length.",
        ),
        cleaned(
            "second",
            "HELLO   WORLD, THIS IS A LONG TEST SENTENCE FOR LENGTH.",
        ),
    ];

    let filtered = filter_and_dedup(records, 10);
    assert_eq!(filtered.len(), 1);
    assert_eq!(ids(&filtered), vec!["first"]);
    assert_eq!(filtered[0].index, 0);
}

#[test]
fn length_gate_boundary() {
    let exact = "a".repeat(20);
    let short = "b".repeat(19);
    let records = vec![cleaned("exact", &exact), cleaned("short", &short)];

    let filtered = filter_and_dedup(records, 20);
    assert_eq!(ids(&filtered), vec!["exact"]);
}

#[test]
fn length_is_counted_in_characters() {
    // 10 characters, 20 bytes
    let accented = "éééééééééé";
    let filtered = filter_and_dedup(vec![cleaned("accents", accented)], 10);
    assert_eq!(filtered.len(), 1);

    let filtered = filter_and_dedup(vec![cleaned("accents", accented)], 11);
    assert!(filtered.is_empty());
}

#[test]
fn indices_are_renumbered_contiguously() {
    let records = vec![
        cleaned("a", "Un concert de jazz en plein air"),
        cleaned("b", "court"),
        cleaned("c", "un concert de JAZZ en plein  air"),
        cleaned("d", "Une exposition de photographies"),
        cleaned("e", "Un marché de producteurs locaux"),
    ];

    let filtered = filter_and_dedup(records, 10);
    assert_eq!(ids(&filtered), vec!["a", "d", "e"]);
    let indices: Vec<usize> = filtered.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn length_gate_runs_before_duplicate_check() {
    // Same fingerprint, but the earlier record is one character too short
    let records = vec![cleaned("short", "jazz club"), cleaned("long", "Jazz  club")];
    assert_eq!(ids(&filter_and_dedup(records, 10)), vec!["long"]);

    let records = vec![cleaned("long", "Jazz  club"), cleaned("short", "jazz club")];
    assert_eq!(ids(&filter_and_dedup(records, 0)), vec!["long"]);
}

#[test]
fn empty_input() {
    assert!(filter_and_dedup(Vec::new(), 0).is_empty());
}

#[test]
fn zero_min_chars_keeps_everything_unique() {
    let records = vec![cleaned("a", "x"), cleaned("b", "y"), cleaned("c", "X")];
    assert_eq!(ids(&filter_and_dedup(records, 0)), vec!["a", "b"]);
}
