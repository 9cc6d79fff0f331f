use crate::session::{SessionConnector, ToolSession, TransportConnector};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use toolbridge_core::{
    BackendConfig, ToolDescriptor, ToolOutcome, ToolbridgeError, ToolbridgeResult,
};
use tracing::{debug, error, info, warn};

/// Owns every session acquired for a run and releases them in reverse acquisition order.
///
/// Call [`SessionScope::release_all`] on every exit path. If the scope is dropped while
/// still holding sessions, the close is scheduled on the current tokio runtime instead.
#[derive(Default)]
pub struct SessionScope {
    sessions: Vec<Arc<dyn ToolSession>>,
}

impl SessionScope {
    /// An empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session and returns its position.
    pub fn acquire(&mut self, session: Arc<dyn ToolSession>) -> usize {
        self.sessions.push(session);
        self.sessions.len() - 1
    }

    /// Session at `index`.
    pub fn get(&self, index: usize) -> Option<&Arc<dyn ToolSession>> {
        self.sessions.get(index)
    }

    /// Number of held sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is held.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Held sessions in acquisition order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ToolSession>> {
        self.sessions.iter()
    }

    /// Closes every session, last acquired first. Every session is attempted; close
    /// failures are collected.
    pub async fn release_all(&mut self) -> Vec<ToolbridgeError> {
        let mut errors = Vec::new();
        while let Some(session) = self.sessions.pop() {
            match session.close().await {
                Ok(()) => debug!(server = %session.name(), "Session closed"),
                Err(e) => {
                    warn!(server = %session.name(), error = %e, "Failed to close session");
                    errors.push(e);
                }
            }
        }
        errors
    }
}

impl Drop for SessionScope {
    fn drop(&mut self) {
        if self.sessions.is_empty() {
            return;
        }
        let sessions = std::mem::take(&mut self.sessions);
        warn!(count = sessions.len(), "Session scope dropped with open sessions");
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                for session in sessions.into_iter().rev() {
                    let _ = session.close().await;
                }
            });
        }
    }
}

/// Tool name → owning session, first registration wins.
#[derive(Debug, Clone, Default)]
pub struct ToolRoutingTable {
    routes: HashMap<String, usize>,
    owners: Vec<String>,
}

impl ToolRoutingTable {
    /// Name of the session that owns `tool`.
    pub fn owner(&self, tool: &str) -> Option<&str> {
        self.routes
            .get(tool)
            .and_then(|idx| self.owners.get(*idx))
            .map(String::as_str)
    }

    /// Whether any session owns `tool`.
    pub fn contains(&self, tool: &str) -> bool {
        self.routes.contains_key(tool)
    }

    /// Number of routed tool names.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no tool is routed.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn session_index(&self, tool: &str) -> Option<usize> {
        self.routes.get(tool).copied()
    }

    /// Records `tool` for `session` unless an earlier session already claimed it.
    fn register(&mut self, tool: &str, session: usize) -> bool {
        if self.routes.contains_key(tool) {
            return false;
        }
        self.routes.insert(tool.to_string(), session);
        true
    }
}

/// Connects to a set of tool backends and presents their tools as one namespace.
pub struct SessionRegistry {
    backends: Vec<BackendConfig>,
    connector: Arc<dyn SessionConnector>,
    scope: SessionScope,
    names: Vec<String>,
    routing: Option<ToolRoutingTable>,
}

impl SessionRegistry {
    /// A registry that opens sessions through `connector`.
    ///
    /// Backends are used in routing order: stdio backends first, then SSE backends,
    /// each group in declaration order.
    pub fn new(backends: Vec<BackendConfig>, connector: Arc<dyn SessionConnector>) -> Self {
        let (mut ordered, sse): (Vec<_>, Vec<_>) =
            backends.into_iter().partition(BackendConfig::is_stdio);
        ordered.extend(sse);
        Self {
            backends: ordered,
            connector,
            scope: SessionScope::new(),
            names: Vec::new(),
            routing: None,
        }
    }

    /// A registry backed by real stdio / SSE MCP servers.
    pub fn with_transports(backends: Vec<BackendConfig>) -> Self {
        Self::new(backends, Arc::new(TransportConnector))
    }

    /// Backends in routing order.
    pub fn backends(&self) -> &[BackendConfig] {
        &self.backends
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.scope.len()
    }

    /// Names of live sessions in routing order.
    pub fn session_names(&self) -> &[String] {
        &self.names
    }

    /// The routing table built by the last [`SessionRegistry::list_tools`].
    pub fn routing(&self) -> Option<&ToolRoutingTable> {
        self.routing.as_ref()
    }

    /// Establishes one session per backend, concurrently.
    ///
    /// All or nothing: if any backend fails, every session that did come up is closed
    /// before the first failure is returned.
    pub async fn initialize(&mut self) -> ToolbridgeResult<()> {
        if !self.scope.is_empty() {
            return Err(ToolbridgeError::Session(
                "Session registry is already initialized".into(),
            ));
        }

        let connector = self.connector.clone();
        let attempts = join_all(self.backends.iter().map(|b| connector.connect(b))).await;

        let mut failure: Option<ToolbridgeError> = None;
        for (backend, attempt) in self.backends.iter().zip(attempts) {
            match attempt {
                Ok(session) => {
                    self.scope.acquire(session);
                    self.names.push(backend.name.clone());
                }
                Err(e) => {
                    error!(
                        server = %backend.name,
                        endpoint = %backend.endpoint(),
                        error = %e,
                        "Failed to connect tool backend"
                    );
                    if failure.is_none() {
                        failure = Some(match e {
                            ToolbridgeError::Connection(msg) => ToolbridgeError::Connection(
                                format!("backend '{}': {}", backend.name, msg),
                            ),
                            other => ToolbridgeError::Connection(format!(
                                "backend '{}': {}",
                                backend.name, other
                            )),
                        });
                    }
                }
            }
        }

        if let Some(e) = failure {
            let opened = self.scope.len();
            self.scope.release_all().await;
            self.names.clear();
            warn!(rolled_back = opened, "Session registry initialization rolled back");
            return Err(e);
        }

        info!(sessions = self.scope.len(), "Session registry initialized");
        Ok(())
    }

    /// Lists every session's tools and builds the routing table.
    ///
    /// A tool name already claimed by an earlier session is dropped silently.
    pub async fn list_tools(&mut self) -> ToolbridgeResult<(ToolRoutingTable, Vec<ToolDescriptor>)> {
        let mut table = ToolRoutingTable {
            routes: HashMap::new(),
            owners: self.names.clone(),
        };
        let mut descriptors = Vec::new();

        for (idx, session) in self.scope.iter().enumerate() {
            let tools = session.list_tools().await?;
            let offered = tools.len();
            for tool in tools {
                if table.register(&tool.name, idx) {
                    descriptors.push(tool);
                } else {
                    debug!(
                        server = %session.name(),
                        tool = %tool.name,
                        owner = ?table.owner(&tool.name),
                        "Duplicate tool name dropped"
                    );
                }
            }
            info!(server = %session.name(), tools = offered, "Tools listed");
        }

        self.routing = Some(table.clone());
        Ok((table, descriptors))
    }

    /// Routes a tool call to its owning session.
    ///
    /// A routing miss is [`ToolOutcome::NotFound`]; errors are reserved for sessions
    /// that fail while running the tool.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> ToolbridgeResult<ToolOutcome> {
        let routing = self.routing.as_ref().ok_or_else(|| {
            ToolbridgeError::Session("Tools must be listed before they can be invoked".into())
        })?;

        let Some(session) = routing
            .session_index(name)
            .and_then(|idx| self.scope.get(idx))
        else {
            warn!(tool = %name, "Tool not found in routing table");
            return Ok(ToolOutcome::NotFound);
        };

        debug!(tool = %name, server = %session.name(), "Routing tool call");
        let text = session.call_tool(name, arguments).await?;
        Ok(ToolOutcome::Completed(text))
    }

    /// Closes every session. Safe to call after a failed or partial initialize.
    pub async fn close(&mut self) -> ToolbridgeResult<()> {
        let errors = self.scope.release_all().await;
        self.names.clear();
        self.routing = None;
        match errors.into_iter().next() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
