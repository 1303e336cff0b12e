//! Environment variable registry.
//!
//! Config values can be overridden with the `JOURNAL` prefix and `__`
//! separators for nested paths (e.g. `JOURNAL__SYNC__DEBOUNCE_MS`). The
//! generation API key is read directly and never stored in config files.
//! `journal env` prints this registry.

/// Anthropic API key used by the step generator
pub const ANTHROPIC_API_KEY: &str = "JOURNAL_ANTHROPIC_API_KEY";

/// An environment variable definition
#[derive(Debug, Clone)]
pub struct EnvVar {
    pub name: &'static str,
    pub description: &'static str,
    pub category: EnvVarCategory,
    pub default: Option<&'static str>,
    pub example: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvVarCategory {
    Authentication,
    Paths,
    Storage,
    Sync,
    Generation,
    Logging,
    Export,
}

impl EnvVarCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            EnvVarCategory::Authentication => "Authentication",
            EnvVarCategory::Paths => "Paths",
            EnvVarCategory::Storage => "Storage",
            EnvVarCategory::Sync => "Sync",
            EnvVarCategory::Generation => "Generation",
            EnvVarCategory::Logging => "Logging",
            EnvVarCategory::Export => "Export",
        }
    }

    /// All categories in display order
    pub fn all() -> &'static [EnvVarCategory] {
        &[
            EnvVarCategory::Authentication,
            EnvVarCategory::Paths,
            EnvVarCategory::Storage,
            EnvVarCategory::Sync,
            EnvVarCategory::Generation,
            EnvVarCategory::Logging,
            EnvVarCategory::Export,
        ]
    }
}

pub static ENV_VARS: &[EnvVar] = &[
    // === Authentication ===
    EnvVar {
        name: ANTHROPIC_API_KEY,
        description: "Anthropic API key for drafting step content; without it drafts use local datasets",
        category: EnvVarCategory::Authentication,
        default: None,
        example: Some("sk-ant-api03-..."),
    },
    // === Paths ===
    EnvVar {
        name: "JOURNAL__PATHS__DATA",
        description: "Directory holding teams, journals and logs",
        category: EnvVarCategory::Paths,
        default: Some(".journal"),
        example: Some("/var/lib/journal"),
    },
    // === Storage ===
    EnvVar {
        name: "JOURNAL__STORAGE__BACKEND",
        description: "Storage backend (file or memory)",
        category: EnvVarCategory::Storage,
        default: Some("file"),
        example: Some("memory"),
    },
    // === Sync ===
    EnvVar {
        name: "JOURNAL__SYNC__DEBOUNCE_MS",
        description: "Quiet window before an autosaved edit is written",
        category: EnvVarCategory::Sync,
        default: Some("600"),
        example: Some("250"),
    },
    EnvVar {
        name: "JOURNAL__SYNC__WATCH_POLL_MS",
        description: "Poll interval of the file change watcher",
        category: EnvVarCategory::Sync,
        default: Some("1000"),
        example: Some("500"),
    },
    // === Generation ===
    EnvVar {
        name: "JOURNAL__GENERATION__ENABLED",
        description: "Call the generation provider at all",
        category: EnvVarCategory::Generation,
        default: Some("true"),
        example: Some("false"),
    },
    EnvVar {
        name: "JOURNAL__GENERATION__MODEL",
        description: "Model used for drafts",
        category: EnvVarCategory::Generation,
        default: Some("claude-sonnet-4-5"),
        example: Some("claude-haiku-4-5"),
    },
    EnvVar {
        name: "JOURNAL__GENERATION__MAX_TOKENS",
        description: "Maximum tokens per draft",
        category: EnvVarCategory::Generation,
        default: Some("4096"),
        example: Some("2048"),
    },
    EnvVar {
        name: "JOURNAL__GENERATION__TIMEOUT_SECS",
        description: "Per-request timeout in seconds",
        category: EnvVarCategory::Generation,
        default: Some("60"),
        example: Some("30"),
    },
    EnvVar {
        name: "JOURNAL__GENERATION__MAX_RETRIES",
        description: "Retries for rate limits, network errors and server errors",
        category: EnvVarCategory::Generation,
        default: Some("3"),
        example: Some("0"),
    },
    // === Logging ===
    EnvVar {
        name: "JOURNAL__LOGGING__LEVEL",
        description: "Log level (trace, debug, info, warn, error)",
        category: EnvVarCategory::Logging,
        default: Some("info"),
        example: Some("debug"),
    },
    EnvVar {
        name: "JOURNAL__LOGGING__TO_FILE",
        description: "Write logs of long-running commands to a file instead of stderr",
        category: EnvVarCategory::Logging,
        default: Some("true"),
        example: Some("false"),
    },
    // === Export ===
    EnvVar {
        name: "JOURNAL__EXPORT__OUTPUT_DIR",
        description: "Directory receiving markdown exports",
        category: EnvVarCategory::Export,
        default: Some("exports"),
        example: Some("/tmp/journal-exports"),
    },
];

pub fn env_vars_for_category(category: EnvVarCategory) -> impl Iterator<Item = &'static EnvVar> {
    ENV_VARS.iter().filter(move |v| v.category == category)
}

/// Environment variables grouped by category, empty categories skipped
pub fn env_vars_by_category() -> Vec<(EnvVarCategory, Vec<&'static EnvVar>)> {
    EnvVarCategory::all()
        .iter()
        .map(|cat| (*cat, env_vars_for_category(*cat).collect::<Vec<_>>()))
        .filter(|(_, vars)| !vars.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_env_vars_have_descriptions() {
        for var in ENV_VARS {
            assert!(
                !var.description.is_empty(),
                "EnvVar {} has empty description",
                var.name
            );
        }
    }

    #[test]
    fn test_config_overrides_use_nested_prefix() {
        for var in ENV_VARS.iter().filter(|v| v.name != ANTHROPIC_API_KEY) {
            assert!(var.name.starts_with("JOURNAL__"), "{}", var.name);
        }
        // The key must not be picked up as a config override
        assert!(!ANTHROPIC_API_KEY.starts_with("JOURNAL__"));
    }

    #[test]
    fn test_every_category_is_documented() {
        let grouped = env_vars_by_category();
        assert_eq!(grouped.len(), EnvVarCategory::all().len());
        assert_eq!(grouped[0].0, EnvVarCategory::Authentication);
    }
}
