use bookrag::Settings;
use bookrag::config::{EmbeddingProviderKind, VectorStoreKind};
use std::env;
use tempfile::TempDir;

// Single test per binary: environment variables are process-wide.
#[test]
fn test_env_overrides_file_and_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("settings.toml");
    std::fs::write(
        &config_path,
        r#"
[retrieval]
top_k = 8
min_language_results = 2

[vector_store]
backend = "memory"
collection = "from_file"
"#,
    )
    .unwrap();

    unsafe {
        // Double underscore separates nested levels
        env::set_var("BOOKRAG_RETRIEVAL__TOP_K", "5");
        env::set_var("BOOKRAG_VECTOR_STORE__COLLECTION", "from_env");
        env::set_var("BOOKRAG_EMBEDDING__PROVIDER", "hashing");
        env::set_var("BOOKRAG_LANGUAGE__DEFAULT", "ur");
    }

    let settings = Settings::load_from(&config_path).unwrap();

    unsafe {
        env::remove_var("BOOKRAG_RETRIEVAL__TOP_K");
        env::remove_var("BOOKRAG_VECTOR_STORE__COLLECTION");
        env::remove_var("BOOKRAG_EMBEDDING__PROVIDER");
        env::remove_var("BOOKRAG_LANGUAGE__DEFAULT");
    }

    // Env beats file
    assert_eq!(settings.retrieval.top_k, 5);
    assert_eq!(settings.vector_store.collection, "from_env");
    // File beats defaults
    assert_eq!(settings.retrieval.min_language_results, 2);
    assert_eq!(settings.vector_store.backend, VectorStoreKind::Memory);
    // Env alone
    assert_eq!(settings.embedding.provider, EmbeddingProviderKind::Hashing);
    assert_eq!(settings.language.default, "ur");
    // Untouched keys keep defaults
    assert_eq!(settings.retrieval.window_before, 2);
    assert_eq!(settings.embedding.batch_size, 100);
    assert!(settings.validate().is_ok());
}
