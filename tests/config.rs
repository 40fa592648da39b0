//! Settings layering: defaults, TOML file, environment, overrides, validation.

use std::collections::HashMap;
use std::io::Write;

use git_cx::config::{
    DEFAULT_CANDIDATES, DEFAULT_MAX_SUBJECT_LENGTH, DEFAULT_MODEL, DEFAULT_PROVIDER,
    DEFAULT_TIMEOUT_SECS, GitConfig, MAX_TIMEOUT_SECS, Overrides, Settings,
};
use git_cx::exec::{ExecOutput, Invocation, RecordingRunner};
use git_cx::{BackendKind, CxError};

/// Every variable the environment layer reads, cleared so the host
/// environment cannot leak into a test.
const ENV_KEYS: &[&str] = &[
    "GIT_CX_PROVIDER",
    "GIT_CX_MODEL",
    "GIT_CX_CANDIDATES",
    "GIT_CX_TIMEOUT",
    "GIT_CX_COMMAND",
    "GIT_CX_API_BASE_URL",
    "GIT_CX_API_KEY",
    "OPENAI_API_KEY",
];

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn env_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn git_get(key: &str) -> Invocation {
    Invocation::program("git", ["config", "--get", key])
}

fn with_clean_env<R>(set: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
    let vars: Vec<(&str, Option<&str>)> = ENV_KEYS
        .iter()
        .map(|key| {
            let value = set.iter().find(|(k, _)| k == key).map(|(_, v)| *v);
            (*key, value)
        })
        .collect();
    temp_env::with_vars(vars, f)
}

// ---------------------------------------------------------------------------
// Defaults and TOML
// ---------------------------------------------------------------------------

#[test]
fn defaults_are_valid() {
    let settings = Settings::default();
    assert_eq!(settings.provider, DEFAULT_PROVIDER);
    assert_eq!(settings.model, DEFAULT_MODEL);
    assert_eq!(settings.candidates, DEFAULT_CANDIDATES);
    assert_eq!(settings.timeout_secs, DEFAULT_TIMEOUT_SECS);
    settings.validate().unwrap();
    assert_eq!(settings.backend_kind().unwrap(), BackendKind::Gemini);
}

#[test]
fn toml_overrides_only_present_keys() {
    let mut settings = Settings::default();
    settings
        .apply_toml("provider = \"claude\"\ncandidates = 5\n")
        .unwrap();
    assert_eq!(settings.provider, "claude");
    assert_eq!(settings.candidates, 5);
    assert_eq!(settings.model, DEFAULT_MODEL);
    assert_eq!(settings.timeout_secs, DEFAULT_TIMEOUT_SECS);
}

#[test]
fn toml_rejects_unknown_keys() {
    let mut settings = Settings::default();
    let err = settings.apply_toml("provder = \"claude\"\n").unwrap_err();
    assert!(err.is_config());
    assert!(err.to_string().contains("provder"), "{err}");
}

#[test]
fn toml_api_table_wins_over_flat_keys() {
    let mut settings = Settings::default();
    settings
        .apply_toml(
            r#"
provider = "api"
api_base_url = "http://flat.example/v1"
api_key = "flat"

[api]
base_url = "http://table.example/v1"
key = "table"
"#,
        )
        .unwrap();
    assert_eq!(settings.api.base_url, "http://table.example/v1");
    assert_eq!(settings.api.key, "table");
}

#[test]
fn toml_syntax_error_is_config_error() {
    let mut settings = Settings::default();
    let err = settings.apply_toml("provider = ").unwrap_err();
    assert!(matches!(err, CxError::Config { .. }), "{err:?}");
}

#[test]
fn toml_commit_table_is_accepted() {
    let mut settings = Settings::default();
    settings
        .apply_toml(
            r#"
provider = "claude"

[commit]
use_emoji = true
max_subject_length = 72
scopes = ["core", "cli"]
"#,
        )
        .unwrap();
    assert_eq!(settings.provider, "claude");
    assert!(settings.commit.use_emoji);
    assert_eq!(settings.commit.max_subject_length, 72);
    assert_eq!(settings.commit.scopes, vec!["core", "cli"]);
}

#[test]
fn toml_commit_table_rejects_unknown_keys() {
    let mut settings = Settings::default();
    let err = settings.apply_toml("[commit]\nemoji = true\n").unwrap_err();
    assert!(err.to_string().contains("emoji"), "{err}");
}

// ---------------------------------------------------------------------------
// git config
// ---------------------------------------------------------------------------

#[tokio::test]
async fn git_config_values_are_read_through_runner() {
    let runner = RecordingRunner::lenient()
        .with_output(git_get("cx.provider"), ExecOutput::success("api\n"))
        .with_output(git_get("cx.model"), ExecOutput::success("gpt-4o-mini\n"))
        .with_output(git_get("cx.candidates"), ExecOutput::success("5\n"))
        .with_output(git_get("cx.timeout"), ExecOutput::success("60\n"))
        .with_output(
            git_get("cx.apiBaseUrl"),
            ExecOutput::success("https://api.openai.com/v1\n"),
        )
        .with_output(git_get("cx.api.key"), ExecOutput::success("sk-git\n"))
        .with_output(git_get("cx.commit.useEmoji"), ExecOutput::success("TRUE\n"))
        .with_output(
            Invocation::program("git", ["config", "--get-all", "cx.commit.scopes"]),
            ExecOutput::success("core\n\ncli\n"),
        );

    let git = GitConfig::read(&runner).await;
    assert_eq!(git.get("cx.provider"), Some("api"));
    assert_eq!(git.get("cx.command"), None);

    let mut settings = Settings::default();
    settings.apply_git_config(&git);
    assert_eq!(settings.provider, "api");
    assert_eq!(settings.model, "gpt-4o-mini");
    assert_eq!(settings.candidates, 5);
    assert_eq!(settings.timeout_secs, 60);
    assert_eq!(settings.api.base_url, "https://api.openai.com/v1");
    assert_eq!(settings.api.key, "sk-git");
    assert!(settings.commit.use_emoji);
    assert_eq!(settings.commit.max_subject_length, DEFAULT_MAX_SUBJECT_LENGTH);
    assert_eq!(settings.commit.scopes, vec!["core", "cli"]);
    settings.validate().unwrap();

    let calls = runner.calls();
    assert!(calls.contains(&git_get("cx.api.baseUrl")));
    assert!(calls.iter().all(|c| matches!(c, Invocation::Program { name, .. } if name == "git")));
}

#[tokio::test]
async fn git_config_flat_keys_win_over_dotted() {
    let runner = RecordingRunner::lenient()
        .with_output(git_get("cx.apiBaseUrl"), ExecOutput::success("http://flat/v1"))
        .with_output(git_get("cx.api.baseUrl"), ExecOutput::success("http://dotted/v1"))
        .with_output(git_get("cx.apiKey"), ExecOutput::success("flat"))
        .with_output(git_get("cx.api.key"), ExecOutput::success("dotted"));

    let mut settings = Settings::default();
    settings.apply_git_config(&GitConfig::read(&runner).await);
    assert_eq!(settings.api.base_url, "http://flat/v1");
    assert_eq!(settings.api.key, "flat");
}

#[tokio::test]
async fn git_config_unset_keys_and_failures_are_ignored() {
    let runner = RecordingRunner::strict()
        .with_output(git_get("cx.provider"), ExecOutput::failure(1, ""))
        .with_output(git_get("cx.candidates"), ExecOutput::success("lots"))
        .with_spawn_error(git_get("cx.model"), "No such file or directory");

    let git = GitConfig::read(&runner).await;
    let mut settings = Settings::default();
    settings.apply_git_config(&git);
    assert_eq!(settings, Settings::default());
}

#[test]
fn toml_layer_overrides_git_config() {
    let file = write_config("model = \"from-file\"\n");
    let git = tokio::runtime::Runtime::new().unwrap().block_on(async {
        let runner = RecordingRunner::lenient()
            .with_output(git_get("cx.model"), ExecOutput::success("from-git"))
            .with_output(git_get("cx.provider"), ExecOutput::success("claude"));
        GitConfig::read(&runner).await
    });

    let settings = with_clean_env(&[], || {
        Settings::load(&git, Some(file.path()), &Overrides::default()).unwrap()
    });
    assert_eq!(settings.provider, "claude");
    assert_eq!(settings.model, "from-file");
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

#[test]
fn env_layer_overrides_file_values() {
    let env = env_map(&[
        ("GIT_CX_PROVIDER", "codex"),
        ("GIT_CX_MODEL", "o4-mini"),
        ("GIT_CX_CANDIDATES", "7"),
        ("GIT_CX_TIMEOUT", "90"),
    ]);
    let mut settings = Settings::default();
    settings.apply_toml("provider = \"claude\"\nmodel = \"sonnet\"").unwrap();
    settings.apply_env(|key| env.get(key).cloned());

    assert_eq!(settings.provider, "codex");
    assert_eq!(settings.model, "o4-mini");
    assert_eq!(settings.candidates, 7);
    assert_eq!(settings.timeout_secs, 90);
}

#[test]
fn env_invalid_numbers_are_ignored() {
    let env = env_map(&[("GIT_CX_CANDIDATES", "many"), ("GIT_CX_TIMEOUT", "-1")]);
    let mut settings = Settings::default();
    settings.apply_env(|key| env.get(key).cloned());
    assert_eq!(settings.candidates, DEFAULT_CANDIDATES);
    assert_eq!(settings.timeout_secs, DEFAULT_TIMEOUT_SECS);
}

#[test]
fn env_blank_values_are_ignored() {
    let env = env_map(&[("GIT_CX_PROVIDER", "  ")]);
    let mut settings = Settings::default();
    settings.apply_env(|key| env.get(key).cloned());
    assert_eq!(settings.provider, DEFAULT_PROVIDER);
}

#[test]
fn openai_key_is_only_a_fallback() {
    let env = env_map(&[("OPENAI_API_KEY", " sk-openai ")]);

    let mut unset = Settings::default();
    unset.apply_env(|key| env.get(key).cloned());
    assert_eq!(unset.api.key, "sk-openai");

    let mut from_file = Settings::default();
    from_file.apply_toml("[api]\nkey = \"sk-file\"").unwrap();
    from_file.apply_env(|key| env.get(key).cloned());
    assert_eq!(from_file.api.key, "sk-file");
}

#[test]
fn git_cx_key_beats_openai_key() {
    let env = env_map(&[("GIT_CX_API_KEY", "sk-cx"), ("OPENAI_API_KEY", "sk-openai")]);
    let mut settings = Settings::default();
    settings.apply_env(|key| env.get(key).cloned());
    assert_eq!(settings.api.key, "sk-cx");
}

// ---------------------------------------------------------------------------
// Settings::load
// ---------------------------------------------------------------------------

#[test]
fn load_layers_file_env_and_overrides() {
    let file = write_config(
        r#"
provider = "claude"
model = "sonnet"
timeout = 45
"#,
    );

    let settings = with_clean_env(&[("GIT_CX_MODEL", "opus")], || {
        let overrides = Overrides {
            candidates: Some(4),
            ..Default::default()
        };
        Settings::load(&GitConfig::default(), Some(file.path()), &overrides).unwrap()
    });

    assert_eq!(settings.provider, "claude");
    assert_eq!(settings.model, "opus");
    assert_eq!(settings.timeout_secs, 45);
    assert_eq!(settings.candidates, 4);
}

#[test]
fn load_override_beats_env() {
    let file = write_config("");
    let settings = with_clean_env(&[("GIT_CX_PROVIDER", "codex")], || {
        let overrides = Overrides {
            provider: Some("copilot".to_string()),
            ..Default::default()
        };
        Settings::load(&GitConfig::default(), Some(file.path()), &overrides).unwrap()
    });
    assert_eq!(settings.provider, "copilot");
}

#[test]
fn load_missing_explicit_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = with_clean_env(&[], || {
        Settings::load(&GitConfig::default(), Some(&path), &Overrides::default()).unwrap_err()
    });
    assert!(err.to_string().contains("absent.toml"), "{err}");
}

#[test]
fn load_reports_file_path_on_bad_toml() {
    let file = write_config("candidates = \"three\"\n");
    let err = with_clean_env(&[], || {
        Settings::load(&GitConfig::default(), Some(file.path()), &Overrides::default()).unwrap_err()
    });
    let text = err.to_string();
    assert!(text.contains(&file.path().display().to_string()), "{text}");
}

#[test]
fn load_validates_result() {
    let file = write_config("provider = \"custom\"\n");
    let err = with_clean_env(&[], || {
        Settings::load(&GitConfig::default(), Some(file.path()), &Overrides::default()).unwrap_err()
    });
    assert!(err.to_string().contains("command"), "{err}");
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn validate_rejects_unknown_provider() {
    let settings = Settings {
        provider: "gpt".to_string(),
        ..Default::default()
    };
    let err = settings.validate().unwrap_err();
    assert!(matches!(err, CxError::UnknownBackend { .. }));
}

#[test]
fn validate_rejects_zero_counts() {
    let zero_candidates = Settings {
        candidates: 0,
        ..Default::default()
    };
    assert!(zero_candidates.validate().unwrap_err().to_string().contains("candidates"));

    let zero_timeout = Settings {
        timeout_secs: 0,
        ..Default::default()
    };
    assert!(zero_timeout.validate().unwrap_err().to_string().contains("timeout"));
}

#[test]
fn validate_api_needs_base_url_and_model() {
    let mut settings = Settings {
        provider: "api".to_string(),
        ..Default::default()
    };
    assert!(settings.validate().unwrap_err().to_string().contains("api.base_url"));

    settings.api.base_url = "https://api.openai.com/v1".to_string();
    settings.model = String::new();
    assert!(settings.validate().unwrap_err().to_string().contains("model"));

    settings.model = "gpt-4o-mini".to_string();
    settings.validate().unwrap();
}

#[test]
fn validate_caps_timeout() {
    let settings = Settings {
        timeout_secs: u64::MAX,
        ..Default::default()
    };
    let err = settings.validate().unwrap_err();
    assert!(matches!(err, CxError::Config { ref setting, .. } if setting == "timeout"), "{err:?}");

    let at_cap = Settings {
        timeout_secs: MAX_TIMEOUT_SECS,
        ..Default::default()
    };
    at_cap.validate().unwrap();
}

#[test]
fn load_rejects_overflowing_timeout_override() {
    let file = write_config("");
    let err = with_clean_env(&[], || {
        let overrides = Overrides {
            timeout_secs: Some(u64::MAX),
            ..Default::default()
        };
        Settings::load(&GitConfig::default(), Some(file.path()), &overrides).unwrap_err()
    });
    assert!(err.to_string().contains("timeout"), "{err}");
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[test]
fn summary_lists_values_and_hides_key() {
    let mut settings = Settings {
        provider: "api".to_string(),
        model: "gpt-4o-mini".to_string(),
        ..Default::default()
    };
    settings.api.base_url = "https://api.openai.com/v1".to_string();
    settings.api.key = "sk-very-secret".to_string();
    settings.commit.scopes = vec!["core".to_string(), "cli".to_string()];

    let text = settings.summary().to_string();
    assert!(text.contains("provider:                  api\n"), "{text}");
    assert!(text.contains("model:                     gpt-4o-mini\n"), "{text}");
    assert!(text.contains("candidates:                3\n"), "{text}");
    assert!(text.contains("timeout:                   30\n"), "{text}");
    assert!(text.contains("apiBaseUrl:                https://api.openai.com/v1\n"));
    assert!(text.contains("apiKey (OPENAI_API_KEY):   <set>\n"), "{text}");
    assert!(text.contains("commit.scopes:             core, cli\n"), "{text}");
    assert!(!text.contains("sk-very-secret"));
    assert!(!text.contains("command:"));
}

#[test]
fn summary_reports_missing_key() {
    let text = Settings::default().summary().to_string();
    assert!(text.contains("apiKey (OPENAI_API_KEY):   <not set>\n"), "{text}");
    assert!(text.contains("commit.useEmoji:           false\n"), "{text}");
    assert!(text.contains("commit.maxSubjectLength:   100\n"), "{text}");
    assert!(!text.contains("apiBaseUrl"));
}

#[test]
fn api_settings_debug_redacts_key() {
    let mut settings = Settings::default();
    settings.api.key = "sk-very-secret".to_string();
    let debug = format!("{settings:?}");
    assert!(!debug.contains("sk-very-secret"), "{debug}");
}
