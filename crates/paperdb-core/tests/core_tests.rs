use figment::Jail;

use paperdb_core::config::{
    expand_path, EmbeddingProvider, RefineFallback, Settings, SettingsSource,
    StoreBackend,
};
use paperdb_core::chunker::ChunkingStrategy;

#[test]
fn defaults_match_documented_values() {
    let s = Settings::default();
    assert_eq!(s.retrieval.candidate_k, 75);
    assert!((s.retrieval.min_score - 0.5).abs() < f32::EPSILON);
    assert_eq!(s.retrieval.max_chunks_per_query, 5);
    assert_eq!(s.retrieval.max_total_chunks, 20);
    assert_eq!(s.retrieval.refine_fallback, RefineFallback::Fail);
    assert_eq!(s.embedding.model, "text-embedding-3-small");
    assert_eq!(s.completion.model, "gpt-4o-mini");
    assert_eq!(s.store.vector_dim, 1536);
    assert_eq!(s.ingest.loader, "lopdf");
}

#[test]
fn layers_merge_in_order() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            [store]
            backend = "memory"
            vector_dim = 64

            [embedding]
            provider = "hashing"

            [retrieval]
            min_score = 0.4
            "#,
        )?;
        jail.create_file(
            "config.test.toml",
            r#"
            [retrieval]
            min_score = 0.6
            max_total_chunks = 10

            [ingest.chunking]
            strategy = "window"
            "#,
        )?;
        jail.set_env("APP_RETRIEVAL__MAX_TOTAL_CHUNKS", "12");
        jail.set_env("OPENAI_API_KEY", "sk-test");

        let source = SettingsSource { config_file: None, env: Some("test".into()) };
        let s = Settings::load(&source).expect("settings");
        assert_eq!(s.store.backend, StoreBackend::Memory);
        assert_eq!(s.store.vector_dim, 64);
        assert_eq!(s.embedding.provider, EmbeddingProvider::Hashing);
        assert!((s.retrieval.min_score - 0.6).abs() < 1e-6, "env file overrides base");
        assert_eq!(s.retrieval.max_total_chunks, 12, "APP_ vars override files");
        assert_eq!(s.ingest.chunking.strategy, ChunkingStrategy::Window);
        assert_eq!(s.openai.api_key.as_deref(), Some("sk-test"));
        Ok(())
    });
}

#[test]
fn missing_api_key_is_a_config_error() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        let err = Settings::load(&SettingsSource::default()).expect_err("needs key");
        assert!(err.is_config());
        Ok(())
    });
}

#[test]
fn self_hosted_endpoint_needs_no_key() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.set_env("APP_OPENAI__BASE_URL", "http://localhost:11434/v1");
        let s = Settings::load(&SettingsSource::default()).expect("settings");
        assert!(s.openai.api_key.is_none());
        Ok(())
    });
}

#[test]
fn out_of_range_values_are_rejected() {
    let mut s = Settings::default();
    s.openai.api_key = Some("k".into());
    assert!(s.validate().is_ok());

    s.retrieval.min_score = 1.5;
    assert!(s.validate().expect_err("min_score").is_config());

    let mut s = Settings::default();
    s.openai.api_key = Some("k".into());
    s.retrieval.max_chunks_per_query = 100;
    assert!(s.validate().is_err(), "per-query cap above candidate_k");

    let mut s = Settings::default();
    s.openai.api_key = Some("k".into());
    s.ingest.concurrency = 0;
    assert!(s.validate().is_err());
}

#[test]
fn redacted_groups_hide_secrets() {
    let mut s = Settings::default();
    s.openai.api_key = Some("sk-very-secret".into());
    let groups = s.redacted_groups().expect("groups");

    let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
    for section in ["store", "embedding", "completion", "openai", "retrieval", "ingest"] {
        assert!(names.contains(&section), "missing section {section}");
    }
    let openai = groups.iter().find(|g| g.name == "openai").expect("openai group");
    let key = openai.entries.iter().find(|(k, _)| k == "api_key").expect("api_key entry");
    assert_ne!(key.1, "sk-very-secret");
    assert!(!format!("{groups:?}").contains("sk-very-secret"));

    let ingest = groups.iter().find(|g| g.name == "ingest").expect("ingest group");
    assert!(ingest.entries.iter().any(|(k, v)| k == "chunking.strategy" && v == "segment"));
}

#[test]
fn expands_env_vars_in_paths() {
    Jail::expect_with(|jail| {
        jail.set_env("PAPERDB_TEST_DIR", "/data/papers");
        assert_eq!(expand_path("${PAPERDB_TEST_DIR}/db"), std::path::PathBuf::from("/data/papers/db"));
        Ok(())
    });
}
