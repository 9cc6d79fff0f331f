use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// How to reach a tool server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendTransport {
    /// A local subprocess speaking JSON-RPC over stdin/stdout.
    Stdio {
        /// Executable to spawn.
        command: String,
        /// Command-line arguments.
        #[serde(default)]
        args: Vec<String>,
        /// Extra environment variables for the child.
        #[serde(default)]
        env_vars: HashMap<String, String>,
    },
    /// A remote server reached over server-sent events.
    Sse {
        /// URL of the event stream.
        sse_url: String,
    },
}

/// One configured tool server, as stored by the configuration service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Record id.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Server name; doubles as the session identifier in the routing table.
    pub name: String,
    /// Owning user id.
    #[serde(default = "default_owner")]
    pub owner: String,
    /// Inactive servers are skipped when building a registry.
    #[serde(default)]
    pub inactive: bool,
    /// Where the record came from (e.g. `system`, `vscode`, `website`).
    #[serde(default)]
    pub source: Option<String>,
    /// Transport parameters.
    #[serde(flatten)]
    pub transport: BackendTransport,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_owner() -> String {
    "system".to_string()
}

impl BackendConfig {
    /// A stdio backend owned by `system`.
    pub fn stdio(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self::with_transport(
            name,
            BackendTransport::Stdio {
                command: command.into(),
                args,
                env_vars: HashMap::new(),
            },
        )
    }

    /// An SSE backend owned by `system`.
    pub fn sse(name: impl Into<String>, sse_url: impl Into<String>) -> Self {
        Self::with_transport(
            name,
            BackendTransport::Sse {
                sse_url: sse_url.into(),
            },
        )
    }

    fn with_transport(name: impl Into<String>, transport: BackendTransport) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            owner: default_owner(),
            inactive: false,
            source: None,
            transport,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// Whether this backend should be connected.
    pub fn is_active(&self) -> bool {
        !self.inactive
    }

    /// Whether this backend is a local subprocess.
    pub fn is_stdio(&self) -> bool {
        matches!(self.transport, BackendTransport::Stdio { .. })
    }

    /// Short human-readable endpoint for logs.
    pub fn endpoint(&self) -> &str {
        match &self.transport {
            BackendTransport::Stdio { command, .. } => command,
            BackendTransport::Sse { sse_url } => sse_url,
        }
    }
}

/// Filters a configuration listing down to the backends that should be connected.
pub fn active_backends(configs: &[BackendConfig]) -> Vec<BackendConfig> {
    configs.iter().filter(|c| c.is_active()).cloned().collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_config_parse() {
        let config: BackendConfig = serde_json::from_str(
            r#"{"name":"web_search","type":"sse","sse_url":"https://example.com/mcp/web_search"}"#,
        )
        .unwrap();
        assert_eq!(config.owner, "system");
        assert!(config.is_active());
        assert!(!config.is_stdio());
        assert_eq!(config.endpoint(), "https://example.com/mcp/web_search");
    }

    #[test]
    fn test_stdio_config_parse() {
        let config: BackendConfig = serde_json::from_str(
            r#"{"name":"fs","owner":"u1","type":"stdio","command":"mcp-fs","args":["--root","/tmp"],"env_vars":{"DEBUG":"1"}}"#,
        )
        .unwrap();
        match &config.transport {
            BackendTransport::Stdio {
                command,
                args,
                env_vars,
            } => {
                assert_eq!(command, "mcp-fs");
                assert_eq!(args, &vec!["--root".to_string(), "/tmp".to_string()]);
                assert_eq!(env_vars.get("DEBUG").map(String::as_str), Some("1"));
            }
            other => panic!("unexpected transport: {other:?}"),
        }
        assert_eq!(config.owner, "u1");
    }

    #[test]
    fn test_active_filter() {
        let mut off = BackendConfig::sse("b", "http://b");
        off.inactive = true;
        let on = BackendConfig::stdio("a", "server", vec![]);
        let active = active_backends(&[on, off]);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "a");
    }
}
