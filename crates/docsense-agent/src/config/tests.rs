use std::collections::HashMap;

use secrecy::ExposeSecret;

use super::*;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn minimal_env_resolves_with_defaults() {
    let env = env_from(&[("ARK_API_KEY", "sk-test"), ("ARK_MODEL", "doubao-pro")]);
    let cfg = Config::resolve(FileConfig::default(), &env).unwrap();

    assert_eq!(cfg.api_key.expose_secret(), "sk-test");
    assert_eq!(cfg.model, "doubao-pro");
    assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
    assert!(!cfg.use_local_agent);
    assert_eq!(cfg.router_model, DEFAULT_ROUTER_MODEL);
    assert_eq!(cfg.web.bind, "127.0.0.1:7861");
    assert_eq!(cfg.temp.max_mb, 300);
    assert_eq!(cfg.session.max_rounds, 20);
}

#[test]
fn missing_api_key_is_a_config_error() {
    let env = env_from(&[("ARK_MODEL", "m")]);
    let err = Config::resolve(FileConfig::default(), &env).unwrap_err();
    assert!(err.to_string().contains("ARK_API_KEY"));
}

#[test]
fn missing_model_is_a_config_error() {
    let env = env_from(&[("ARK_API_KEY", "k")]);
    let err = Config::resolve(FileConfig::default(), &env).unwrap_err();
    assert!(err.to_string().contains("ARK_MODEL"));
}

#[test]
fn use_local_agent_parses_case_insensitively() {
    for (value, expected) in [("true", true), ("TRUE", true), ("false", false), ("yes", false)] {
        let env = env_from(&[
            ("ARK_API_KEY", "k"),
            ("ARK_MODEL", "m"),
            ("USE_LOCAL_AGENT", value),
        ]);
        let cfg = Config::resolve(FileConfig::default(), &env).unwrap();
        assert_eq!(cfg.use_local_agent, expected, "USE_LOCAL_AGENT={value}");
    }
}

#[test]
fn env_overrides_file_values() {
    let file: FileConfig = toml::from_str(
        r#"
        [web]
        bind = "0.0.0.0:9000"

        [router]
        threshold = 0.7
        base_url = "http://10.0.0.5:8000"

        [session]
        max_rounds = 4
        "#,
    )
    .unwrap();

    let env = env_from(&[
        ("ARK_API_KEY", "k"),
        ("ARK_MODEL", "m"),
        ("ARK_BASE_URL", "https://ark.cn-beijing.volces.com/api/v3"),
        ("DOCSENSE_BIND", "127.0.0.1:7900"),
        ("DOCSENSE_ROUTER_URL", "http://127.0.0.1:8001"),
        ("ROUTER_MODEL_PATH", "/models/qwen2.5-7b"),
    ]);
    let cfg = Config::resolve(file, &env).unwrap();

    assert_eq!(cfg.base_url, "https://ark.cn-beijing.volces.com/api/v3");
    assert_eq!(cfg.web.bind, "127.0.0.1:7900");
    assert_eq!(cfg.router.base_url, "http://127.0.0.1:8001");
    assert_eq!(cfg.router.threshold, 0.7);
    assert_eq!(cfg.router_model, "/models/qwen2.5-7b");
    assert_eq!(cfg.session.max_rounds, 4);
}

#[test]
fn pipelines_file_parses_into_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipelines.json");
    std::fs::write(
        &path,
        r#"{
            "document": { "desc": "convert and read documents", "tools": ["pdf_to_markdown", "extract_text_and_images", "load_image"] },
            "web": { "desc": "fetch pages", "tools": ["fetch_structured_text"] }
        }"#,
    )
    .unwrap();

    let table = load_pipelines(&path).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table["document"].tools.len(), 3);
    assert_eq!(table["web"].desc, "fetch pages");
}
