use super::*;

fn minimal_toml() -> &'static str {
    r#"
        [archives]
        start = 1
        end = 3

        [[models]]
        name = "bge-m3"
        dimension = 1024

        [[models]]
        name = "text-embedding-3-small"
        backend = "openai-compat"
        dimension = 1536
        api_key_env = "OPENAI_API_KEY"
    "#
}

#[test]
fn test_minimal_config_fills_defaults() {
    let config: Config = toml::from_str(minimal_toml()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.archives.start, 1);
    assert_eq!(config.archives.end, 3);
    assert_eq!(config.archives.max_articles, 10_000);
    assert!(config.archives.base_url.contains("pubmed/baseline"));
    assert_eq!(config.archives.file_prefix, "pubmed25n");
    assert_eq!(config.filter.language, "eng");
    assert_eq!(config.qdrant.url, "http://localhost:6333");
    assert_eq!(config.qdrant.collection_prefix, "pubmed");
    assert_eq!(config.qdrant.distance, "cosine");
    assert_eq!(config.checkpoint.path, "medvex_checkpoints.json");
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.base_delay_ms, 500);

    assert_eq!(config.models.len(), 2);
    assert_eq!(config.models[0].backend, "ollama");
    assert_eq!(config.models[1].backend, "openai-compat");
    assert_eq!(config.models[1].api_key_env.as_deref(), Some("OPENAI_API_KEY"));
}

#[test]
fn test_inverted_range_rejected() {
    let toml_text = r#"
        [archives]
        start = 5
        end = 2

        [[models]]
        name = "bge-m3"
        dimension = 1024
    "#;
    let config: Config = toml::from_str(toml_text).unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn test_empty_model_set_rejected() {
    let toml_text = r#"
        models = []

        [archives]
        start = 1
        end = 1
    "#;
    let config: std::result::Result<Config, _> = toml::from_str(toml_text);
    // Missing/empty models either fails deserialization or validation.
    match config {
        Ok(config) => assert!(config.validate().is_err()),
        Err(_) => {}
    }
}

#[test]
fn test_unknown_backend_rejected() {
    let toml_text = r#"
        [archives]
        start = 1
        end = 1

        [[models]]
        name = "mystery"
        backend = "carrier-pigeon"
        dimension = 8
    "#;
    let config: Config = toml::from_str(toml_text).unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn test_load_from_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("medvex.toml");
    std::fs::write(&path, minimal_toml()).unwrap();
    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.models[0].name, "bge-m3");
}
