use super::*;
use tempfile::TempDir;

fn config_in(dir: &Path) -> Config {
    Config {
        base_dir: dir.to_path_buf(),
        ..Config::default()
    }
}

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.ollama.protocol, "http");
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.ollama.model, "nomic-embed-text:latest");
    assert_eq!(config.ollama.batch_size, 50);
    assert_eq!(config.ollama.batch_delay_ms, 1000);
    assert_eq!(config.agenda.region, "Occitanie");
    assert_eq!(config.agenda.page_size, 100);
    assert_eq!(config.agenda.window_days, 365);
    assert_eq!(config.processing.min_chars, 200);
    assert_eq!(config.processing.chunk_size, 1000);
    assert_eq!(config.processing.chunk_overlap, 100);
    assert_eq!(config.retrieval.top_k, 3);
    assert!(config.validate().is_ok());
}

#[test]
fn config_validation() {
    let config = Config::default();

    let mut invalid = config.clone();
    invalid.ollama.protocol = "ftp".to_string();
    assert!(matches!(
        invalid.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));

    let mut invalid = config.clone();
    invalid.ollama.port = 0;
    assert!(invalid.validate().is_err());

    let mut invalid = config.clone();
    invalid.ollama.model = String::new();
    assert!(invalid.validate().is_err());

    let mut invalid = config.clone();
    invalid.ollama.batch_size = 1001;
    assert!(invalid.validate().is_err());

    let mut invalid = config.clone();
    invalid.agenda.page_size = 101;
    assert!(matches!(
        invalid.validate(),
        Err(ConfigError::InvalidPageSize(101))
    ));

    let mut invalid = config.clone();
    invalid.agenda.region = "  ".to_string();
    assert!(matches!(invalid.validate(), Err(ConfigError::InvalidRegion(_))));

    let mut invalid = config.clone();
    invalid.agenda.api_url = "not a url".to_string();
    assert!(matches!(invalid.validate(), Err(ConfigError::InvalidUrl(_))));

    let mut invalid = config.clone();
    invalid.processing.chunk_overlap = invalid.processing.chunk_size;
    assert!(matches!(
        invalid.validate(),
        Err(ConfigError::Processing(ProcessingError::OverlapTooLarge { .. }))
    ));

    let mut invalid = config;
    invalid.retrieval.top_k = 0;
    assert!(matches!(invalid.validate(), Err(ConfigError::InvalidTopK(0))));
}

#[test]
fn ollama_url_generation() {
    let mut config = Config::default();
    let url = config.ollama_url().expect("default url is valid");
    assert_eq!(url.as_str(), "http://localhost:11434/");

    config.ollama.protocol = "https".to_string();
    config.ollama.host = "secure.example.com".to_string();
    config.ollama.port = 443;
    let url = config.ollama_url().expect("https url is valid");
    assert_eq!(url.as_str(), "https://secure.example.com/");
}

#[test]
fn setter_validation() {
    let mut ollama = OllamaConfig::default();
    assert!(ollama.set_protocol("https".to_string()).is_ok());
    assert!(ollama.set_host("example.com".to_string()).is_ok());
    assert!(ollama.set_port(8080).is_ok());
    assert!(ollama.set_model("new-model".to_string()).is_ok());
    assert!(ollama.set_batch_size(128).is_ok());
    assert!(ollama.set_embedding_dimension(1024).is_ok());

    assert!(ollama.set_protocol("HTTP".to_string()).is_err());
    assert!(ollama.set_port(0).is_err());
    assert!(ollama.set_model(String::new()).is_err());
    assert!(ollama.set_batch_size(0).is_err());
    assert!(ollama.set_embedding_dimension(10).is_err());

    let mut agenda = AgendaConfig::default();
    assert!(agenda.set_region(" Bretagne ".to_string()).is_ok());
    assert_eq!(agenda.region, "Bretagne");
    assert!(agenda.set_region(String::new()).is_err());
    assert!(agenda.set_page_size(20).is_ok());
    assert!(agenda.set_page_size(0).is_err());
    assert!(agenda.set_window_days(30).is_ok());
    assert!(agenda.set_window_days(0).is_err());
}

#[test]
fn load_missing_config_uses_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::load(temp_dir.path()).expect("missing file falls back to defaults");

    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert_eq!(config.ollama, OllamaConfig::default());
    assert_eq!(config.processing, ProcessingConfig::default());
    assert_eq!(
        config.vector_database_path(),
        temp_dir.path().join("vectors")
    );
}

#[test]
fn save_and_reload() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = config_in(temp_dir.path());
    config.agenda.region = "Bretagne".to_string();
    config.processing.min_chars = 50;
    config.retrieval.top_k = 5;

    config.save().expect("config saves");
    assert!(config.config_file_path().exists());

    let loaded = Config::load(temp_dir.path()).expect("config reloads");
    assert_eq!(loaded, config);
}

#[test]
fn partial_file_fills_in_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join(CONFIG_FILE_NAME),
        "[processing]\nmin_chars = 10\n\n[agenda]\nregion = \"Normandie\"\n",
    )
    .expect("should write config file");

    let config = Config::load(temp_dir.path()).expect("partial config loads");
    assert_eq!(config.processing.min_chars, 10);
    assert_eq!(config.processing.chunk_size, 1000);
    assert_eq!(config.agenda.region, "Normandie");
    assert_eq!(config.agenda.page_size, 100);
    assert_eq!(config.ollama, OllamaConfig::default());
}

#[test]
fn invalid_file_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join(CONFIG_FILE_NAME),
        "[processing]\nchunk_size = 100\nchunk_overlap = 100\n",
    )
    .expect("should write config file");
    assert!(Config::load(temp_dir.path()).is_err());

    fs::write(
        temp_dir.path().join(CONFIG_FILE_NAME),
        "[processing]\nmin_chars = -1\n",
    )
    .expect("should write config file");
    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn save_refuses_invalid_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = config_in(temp_dir.path());
    config.retrieval.top_k = 0;

    assert!(config.save().is_err());
    assert!(!config.config_file_path().exists());
}
