use super::*;

#[test]
fn default_config_is_valid() {
    let config = ProcessingConfig::default();
    assert_eq!(config.min_chars, 200);
    assert_eq!(config.chunk_size, 1000);
    assert_eq!(config.chunk_overlap, 100);
    assert!(config.validate().is_ok());
}

#[test]
fn overlap_must_be_smaller_than_chunk_size() {
    let config = ProcessingConfig {
        chunk_size: 100,
        chunk_overlap: 100,
        ..ProcessingConfig::default()
    };
    assert_eq!(
        config.validate(),
        Err(ProcessingError::OverlapTooLarge {
            overlap: 100,
            chunk_size: 100
        })
    );
}

#[test]
fn zero_chunk_size_is_rejected() {
    let config = ProcessingConfig {
        chunk_size: 0,
        chunk_overlap: 0,
        ..ProcessingConfig::default()
    };
    assert_eq!(
        config.validate(),
        Err(ProcessingError::InvalidChunkSize(0))
    );
}

#[test]
fn error_messages_are_descriptive() {
    let err = ProcessingError::OverlapTooLarge {
        overlap: 150,
        chunk_size: 100,
    };
    let message = err.to_string();
    assert!(message.contains("150"));
    assert!(message.contains("100"));
}

#[test]
fn toml_defaults_fill_missing_fields() {
    let config: ProcessingConfig = toml::from_str("min_chars = 50").expect("should parse toml");
    assert_eq!(config.min_chars, 50);
    assert_eq!(config.chunk_size, 1000);
    assert_eq!(config.chunk_overlap, 100);
}
