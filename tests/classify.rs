use sheet_mend::classify::{Category, LogClassifier};
use sheet_mend::config::Config;
use sheet_mend::error::PipelineError;

#[test]
fn classification_vector() {
    let lines = [
        "ERROR: missing field",
        "Auto-filled empty cell",
        "Warning: low confidence",
        "Success: saved 120 rows",
        "processed row 5",
    ];

    let classifier = LogClassifier::new();
    let events: Vec<_> = classifier.classify(lines).collect();

    assert_eq!(events.len(), 5);
    let categories: Vec<_> = events.iter().map(|e| e.category).collect();
    assert_eq!(
        categories,
        vec![
            Category::Error,
            Category::Correction,
            Category::Warning,
            Category::Success,
            Category::Info,
        ]
    );
    assert_eq!(events[0].raw, "ERROR: missing field");
}

#[test]
fn classification_is_idempotent() {
    let lines = [
        "Row 3: AUTO-CORRECTED: trimmed name",
        "",
        "Saved 12 rows",
        "   ",
        "something else",
    ];

    let classifier = LogClassifier::new();
    let first: Vec<_> = classifier.classify(lines).collect();
    let second: Vec<_> = classifier.classify(lines).collect();
    assert_eq!(first, second);
}

#[test]
fn blank_lines_are_dropped() {
    let classifier = LogClassifier::new();
    let events: Vec<_> = classifier.classify(["", "  \t ", "ok"]).collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].raw, "ok");
}

#[test]
fn first_match_wins() {
    let classifier = LogClassifier::new();
    // Contains both "fixed" and "error"; the error rule runs first.
    let event = classifier.classify_line("Fixed an error in row 2").unwrap();
    assert_eq!(event.category, Category::Error);

    // Contains both "warning" and "cleaned"; corrections outrank warnings.
    let event = classifier
        .classify_line("Warning resolved: cleaned field")
        .unwrap();
    assert_eq!(event.category, Category::Correction);
}

#[test]
fn matching_is_case_insensitive() {
    let classifier = LogClassifier::new();
    assert_eq!(
        classifier.classify_line("SAVED 10 ROWS").unwrap().category,
        Category::Success
    );
    assert_eq!(
        classifier.classify_line("auto-FILLED cell").unwrap().category,
        Category::Correction
    );
}

#[test]
fn raw_text_is_trimmed() {
    let classifier = LogClassifier::new();
    let event = classifier.classify_line("  Warning: odd value  ").unwrap();
    assert_eq!(event.raw, "Warning: odd value");
}

#[test]
fn extra_patterns_from_config() {
    let mut cfg = Config::default();
    cfg.classify.correction_patterns = vec!["(?i)normali[sz]ed".into()];

    let classifier = LogClassifier::from_config(&cfg).unwrap();
    assert_eq!(
        classifier
            .classify_line("Normalised date column")
            .unwrap()
            .category,
        Category::Correction
    );
    // Built-ins still outrank extras.
    assert_eq!(
        classifier
            .classify_line("error while normalised")
            .unwrap()
            .category,
        Category::Error
    );
}

#[test]
fn invalid_extra_pattern_is_rejected() {
    let mut cfg = Config::default();
    cfg.classify.error_patterns = vec!["([unclosed".into()];

    let err = LogClassifier::from_config(&cfg).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidPattern { .. }));
}
