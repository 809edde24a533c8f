use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use scout_config::Error;

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_with(section: &[&str], key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let mut table = root.as_table_mut().expect("Template config must be a table.");

	for name in section {
		table = table
			.get_mut(*name)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Template config must include [{name}]."));
	}

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn write_temp_config(payload: &str) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now().duration_since(UNIX_EPOCH).expect("Clock error.").as_nanos();
	let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
	let path = env::temp_dir().join(format!("scout_config_{nanos}_{seq}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn expect_invalid(payload: &str, expected_key: &str) {
	let err = scout_config::parse(payload).expect_err("Expected config validation error.");

	match err {
		Error::Invalid { key, .. } => assert_eq!(key, expected_key),
		other => panic!("Unexpected error: {other:?}"),
	}
}

#[test]
fn sample_config_loads_from_disk() {
	let path = write_temp_config(SAMPLE_CONFIG_TEMPLATE_TOML);
	let cfg = scout_config::load(&path).expect("Failed to load sample config.");

	fs::remove_file(&path).expect("Failed to remove test config.");

	assert_eq!(cfg.service.tenant_header, "x-tenant-id");
	assert_eq!(cfg.search.recall.candidate_k, 200);
	assert_eq!(cfg.search.sla.target_ms, 1_200);
	assert_eq!(cfg.search.cache.rerank_ttl_secs, 300);
	assert_eq!(cfg.providers.embedding.api_base, "https://api.openai.com");
	assert!((cfg.bias.medium_risk_cap - 0.12).abs() < f64::EPSILON);
}

#[test]
fn optional_sections_fall_back_to_defaults() {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let table = root.as_table_mut().expect("Template config must be a table.");

	for section in ["search", "ranking", "bias", "limits"] {
		table.remove(section);
	}

	let payload = toml::to_string(&root).expect("Failed to render template config.");
	let cfg = scout_config::parse(&payload).expect("Failed to parse config without tunables.");

	assert_eq!(cfg.search.results.default_limit, 20);
	assert_eq!(cfg.search.rerank.top_k, 10);
	assert_eq!(cfg.search.cache.embedding_ttl_secs, 600);
	assert_eq!(cfg.limits.requests_per_minute, 120);
}

#[test]
fn missing_file_reports_read_error() {
	let path = env::temp_dir().join("scout_config_does_not_exist.toml");
	let err = scout_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }));
}

#[test]
fn rerank_ttl_must_stay_within_bounds() {
	expect_invalid(
		&sample_with(&["search", "cache"], "rerank_ttl_secs", Value::Integer(60)),
		"search.cache.rerank_ttl_secs",
	);
	expect_invalid(
		&sample_with(&["search", "cache"], "rerank_ttl_secs", Value::Integer(1_800)),
		"search.cache.rerank_ttl_secs",
	);
}

#[test]
fn cache_read_timeout_must_fit_the_latency_target() {
	expect_invalid(
		&sample_with(&["search", "cache"], "read_timeout_ms", Value::Integer(0)),
		"search.cache.read_timeout_ms",
	);
	expect_invalid(
		&sample_with(&["search", "cache"], "read_timeout_ms", Value::Integer(1_200)),
		"search.cache.read_timeout_ms",
	);
	expect_invalid(
		&sample_with(&["search", "cache"], "sweep_interval_secs", Value::Integer(0)),
		"search.cache.sweep_interval_secs",
	);
}

#[test]
fn safety_margin_must_be_below_target() {
	expect_invalid(
		&sample_with(&["search", "sla"], "safety_margin_ms", Value::Integer(1_200)),
		"search.sla.safety_margin_ms",
	);
}

#[test]
fn channel_timeout_must_be_below_target() {
	expect_invalid(
		&sample_with(&["search", "recall"], "channel_timeout_ms", Value::Integer(5_000)),
		"search.recall.channel_timeout_ms",
	);
}

#[test]
fn embedding_dimensions_must_match_vector_dim() {
	expect_invalid(
		&sample_with(&["providers", "embedding"], "dimensions", Value::Integer(1_536)),
		"providers.embedding.dimensions",
	);
}

#[test]
fn cache_backend_is_restricted() {
	expect_invalid(
		&sample_with(&["search", "cache"], "backend", Value::String("redis".to_string())),
		"search.cache.backend",
	);

	let cfg = scout_config::parse(&sample_with(
		&["search", "cache"],
		"backend",
		Value::String(" Memory ".to_string()),
	))
	.expect("Expected normalized backend to validate.");

	assert_eq!(cfg.search.cache.backend, "memory");
}

#[test]
fn medium_risk_cap_must_be_a_fraction() {
	expect_invalid(&sample_with(&["bias"], "medium_risk_cap", Value::Float(0.0)), "bias.medium_risk_cap");
	expect_invalid(&sample_with(&["bias"], "medium_risk_cap", Value::Float(1.5)), "bias.medium_risk_cap");
}

#[test]
fn blank_api_key_is_rejected() {
	expect_invalid(
		&sample_with(&["providers", "rerank"], "api_key", Value::String("  ".to_string())),
		"providers.rerank.api_key",
	);
}
