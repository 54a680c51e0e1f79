use fleet_engine::config::Config;
use fleet_engine::memory::{MemoryStore, Turn};
use fleet_engine::retrieval::{content_hash, Chunker, Metadata};
use proptest::prelude::*;

// Configuration survives a TOML round trip
proptest! {
    #[test]
    fn test_config_parsing_round_trip(
        log_level in "error|warn|info|debug|trace",
        chunk_size in 1..=4000usize,
        overlap_ratio in 0.0..1.0f64,
        embedding_dim in 1..=2048usize,
        max_iterations in 1..=50usize,
        short_term_limit in 1..=100usize,
        max_workers in 1..=32usize,
        crew_timeout in 1..=3600u64,
    ) {
        let mut config = Config::default();
        config.core.log_level = log_level;
        config.retrieval.chunk_size = chunk_size;
        config.retrieval.chunk_overlap = ((chunk_size as f64) * overlap_ratio) as usize;
        config.retrieval.embedding_dim = embedding_dim;
        config.agents.max_iterations = max_iterations;
        config.memory.short_term_limit = short_term_limit;
        config.crew.max_workers = max_workers;
        config.crew.timeout_secs = crew_timeout;
        prop_assert!(config.validate().is_ok());

        // Serialize the config object to TOML
        let toml_string = toml::to_string(&config).expect("Failed to serialize Config to string");

        // Parse it back to a struct
        let parsed: Config = toml::from_str(&toml_string).expect("Failed to deserialize TOML to Config");

        prop_assert_eq!(config.core.log_level, parsed.core.log_level);
        prop_assert_eq!(config.retrieval.chunk_size, parsed.retrieval.chunk_size);
        prop_assert_eq!(config.retrieval.chunk_overlap, parsed.retrieval.chunk_overlap);
        prop_assert_eq!(config.retrieval.embedding_dim, parsed.retrieval.embedding_dim);
        prop_assert_eq!(config.agents.max_iterations, parsed.agents.max_iterations);
        prop_assert_eq!(config.memory.short_term_limit, parsed.memory.short_term_limit);
        prop_assert_eq!(config.crew.max_workers, parsed.crew.max_workers);
        prop_assert_eq!(config.crew.timeout_secs, parsed.crew.timeout_secs);
        prop_assert_eq!(config.models, parsed.models);
    }
}

// Memory holds exactly the most recent turns, oldest first
proptest! {
    #[test]
    fn test_memory_keeps_last_turns(
        limit in 1..=20usize,
        turns in prop::collection::vec("[a-z]{1,8}", 0..60),
    ) {
        let store = MemoryStore::new(limit).unwrap();
        for content in &turns {
            store.append("agent", Turn::user(content.clone()));
        }

        let history: Vec<String> = store
            .history("agent")
            .into_iter()
            .map(|turn| turn.content)
            .collect();
        let expected: Vec<String> = turns
            .iter()
            .skip(turns.len().saturating_sub(limit))
            .cloned()
            .collect();

        prop_assert_eq!(history.len(), turns.len().min(limit));
        prop_assert_eq!(history, expected);
    }
}

// Chunks cover the text: dropping each chunk's overlap prefix rebuilds it
proptest! {
    #[test]
    fn test_chunks_cover_text(
        text in "[a-zA-Z0-9]{1,600}",
        size in 1..=120usize,
        overlap_seed in 0..120usize,
    ) {
        let overlap = overlap_seed % size;
        let chunker = Chunker::new(size, overlap);
        let chunks = chunker.chunk(&text);

        prop_assert!(!chunks.is_empty());
        prop_assert!(chunks.iter().all(|c| c.chars().count() <= size));

        let mut rebuilt = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.chars().skip(overlap));
        }
        prop_assert_eq!(rebuilt, text);
    }
}

// Content hashes separate text from metadata
proptest! {
    #[test]
    fn test_content_hash_distinguishes_metadata(
        text in "[a-z ]{1,40}",
        source_a in "[a-z]{1,10}",
        source_b in "[a-z]{1,10}",
    ) {
        let meta = |source: &str| {
            Metadata::from([("source".to_string(), serde_json::Value::String(source.to_string()))])
        };

        prop_assert_eq!(content_hash(&text, &meta(&source_a)), content_hash(&text, &meta(&source_a)));
        if source_a != source_b {
            prop_assert_ne!(content_hash(&text, &meta(&source_a)), content_hash(&text, &meta(&source_b)));
        }
    }
}
