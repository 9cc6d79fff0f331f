use serde::Deserialize;
use std::path::Path;
use toolbridge_chat::ChatConfig;
use toolbridge_core::{active_backends, BackendConfig};

/// Contents of `toolbridge.toml`.
#[derive(Debug, Deserialize)]
pub struct ToolbridgeConfig {
    pub model: ChatConfig,
    #[serde(default)]
    pub servers: Vec<BackendConfig>,
}

impl ToolbridgeConfig {
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.model.validate()?;
        Ok(config)
    }

    /// Fills an empty `api_key` from the provider's environment variable.
    pub fn resolve_api_key(&mut self) -> anyhow::Result<()> {
        if !self.model.api_key.is_empty() {
            return Ok(());
        }
        let var = self.model.api_key_env();
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => {
                self.model.api_key = key;
                Ok(())
            }
            _ => anyhow::bail!("No api_key in [model] and {var} is not set"),
        }
    }

    /// Servers the registry should connect to.
    pub fn active_servers(&self) -> Vec<BackendConfig> {
        active_backends(&self.servers)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use toolbridge_chat::Dialect;
    use toolbridge_core::BackendTransport;

    const SAMPLE: &str = r#"
[model]
provider = "openai"
model_id = "gpt-4o"
api_key = "sk-inline"
temperature = 0.2
max_turns = 4

[[servers]]
name = "web_search"
type = "sse"
sse_url = "https://example.com/mcp/web_search"

[[servers]]
name = "files"
type = "stdio"
command = "npx"
args = ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]
env_vars = { LOG_LEVEL = "warn" }

[[servers]]
name = "retired"
inactive = true
type = "sse"
sse_url = "https://example.com/mcp/retired"
"#;

    #[test]
    fn test_parse_sample() {
        let config = ToolbridgeConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.model.provider, Dialect::OpenAi);
        assert_eq!(config.model.max_turns, 4);
        assert_eq!(config.model.temperature, Some(0.2));
        assert_eq!(config.servers.len(), 3);
        assert_eq!(config.servers[0].owner, "system");

        match &config.servers[1].transport {
            BackendTransport::Stdio {
                command,
                args,
                env_vars,
            } => {
                assert_eq!(command, "npx");
                assert_eq!(args.len(), 3);
                assert_eq!(env_vars["LOG_LEVEL"], "warn");
            }
            other => panic!("expected stdio transport, got {other:?}"),
        }
    }

    #[test]
    fn test_inactive_servers_filtered() {
        let config = ToolbridgeConfig::parse(SAMPLE).unwrap();
        let names: Vec<String> = config.active_servers().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["web_search", "files"]);
    }

    #[test]
    fn test_invalid_turn_budget_rejected() {
        let raw = "[model]\nprovider = \"anthropic\"\nmodel_id = \"claude\"\nmax_turns = 0\n";
        assert!(ToolbridgeConfig::parse(raw).is_err());
    }

    #[test]
    fn test_inline_api_key_kept() {
        let mut config = ToolbridgeConfig::parse(SAMPLE).unwrap();
        config.resolve_api_key().unwrap();
        assert_eq!(config.model.api_key, "sk-inline");
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = ToolbridgeConfig::load(file.path()).await.unwrap();
        assert_eq!(config.model.model_id, "gpt-4o");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = ToolbridgeConfig::load(Path::new("/nonexistent/toolbridge.toml"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
