use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use toolrag::executor::McpConfig;
use toolrag::llm::GeminiConfig;
use toolrag::llm::gemini::{DEFAULT_API_KEY_ENV, DEFAULT_MODEL, GEMINI_API_URL};
use toolrag::orchestrator::OrchestratorConfig;
use toolrag::selector::SelectionOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub selector: SelectorConfig,
    pub orchestrator: OrchestratorConfig,
    pub executor: ExecutorConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub api_key_env: String,
    pub base_url: String,
    pub timeout_ms: u64,
    pub max_output_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            base_url: GEMINI_API_URL.to_string(),
            timeout_ms: 60000,
            max_output_tokens: 8192,
        }
    }
}

impl LlmConfig {
    pub fn to_gemini(&self) -> GeminiConfig {
        GeminiConfig {
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            api_key_env: self.api_key_env.clone(),
            max_output_tokens: self.max_output_tokens,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Off means every request is offered the full catalog
    pub enabled: bool,
    pub top_k: usize,
    pub fallback_k: usize,
    pub always_include: Vec<String>,
    pub debug: bool,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        let options = SelectionOptions::default();
        Self {
            enabled: true,
            top_k: options.top_k,
            fallback_k: options.fallback_k,
            always_include: options.always_include,
            debug: options.debug,
        }
    }
}

impl SelectorConfig {
    pub fn options(&self) -> SelectionOptions {
        SelectionOptions {
            top_k: self.top_k,
            fallback_k: self.fallback_k,
            always_include: self.always_include.clone(),
            debug: self.debug,
        }
    }

    /// Options when enabled, None when selection is off
    pub fn active_options(&self) -> Option<SelectionOptions> {
        self.enabled.then(|| self.options())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub command: String,
    pub args: Vec<String>,
    pub pool_size: usize,
    pub timeout_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        let mcp = McpConfig::default();
        Self {
            command: mcp.command,
            args: mcp.args,
            pool_size: mcp.pool_size,
            timeout_ms: mcp.timeout.as_millis() as u64,
        }
    }
}

impl ExecutorConfig {
    pub fn to_mcp(&self) -> McpConfig {
        McpConfig {
            command: self.command.clone(),
            args: self.args.clone(),
            pool_size: self.pool_size,
            timeout: Duration::from_millis(self.timeout_ms),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog file or directory; the built-in catalog when unset
    pub path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            llm: LlmConfig::default(),
            selector: SelectorConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            executor: ExecutorConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.llm.api_key_env, "GOOGLE_GENERATIVE_AI_API_KEY");
        assert!(config.selector.enabled);
        assert_eq!(config.selector.top_k, 12);
        assert_eq!(config.selector.always_include, vec!["search_geospatial_metadata"]);
        assert_eq!(config.orchestrator.max_rounds, 5);
        assert!(config.catalog.path.is_none());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "log_level: debug\nllm:\n  model: gemini-2.5-pro\nselector:\n  enabled: false\n  top_k: 4\nexecutor:\n  pool_size: 2\n  timeout_ms: 5000\norchestrator:\n  max_rounds: 3\ncatalog:\n  path: /etc/toolrag/tools"
        )
        .unwrap();

        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.llm.model, "gemini-2.5-pro");
        assert_eq!(config.llm.timeout_ms, 60000);
        assert!(config.selector.active_options().is_none());
        assert_eq!(config.selector.top_k, 4);
        assert_eq!(config.selector.fallback_k, 20);
        assert_eq!(config.orchestrator.max_rounds, 3);
        assert_eq!(config.orchestrator.payload_tools.len(), 2);
        assert_eq!(config.catalog.path, Some(PathBuf::from("/etc/toolrag/tools")));

        let mcp = config.executor.to_mcp();
        assert_eq!(mcp.pool_size, 2);
        assert_eq!(mcp.timeout, Duration::from_millis(5000));
        assert_eq!(mcp.command, "node");
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        let result = Config::load(Some(&PathBuf::from("/nonexistent/toolrag.yml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_yaml_fails() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "selector: [not, a, map]").unwrap();
        assert!(Config::load(Some(&file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_llm_to_gemini() {
        let llm = LlmConfig {
            timeout_ms: 1500,
            ..Default::default()
        };
        let gemini = llm.to_gemini();
        assert_eq!(gemini.timeout, Duration::from_millis(1500));
        assert_eq!(gemini.model, DEFAULT_MODEL);
    }
}
