//! MCP service facade.
//!
//! Owns both adapters and connects them lazily, once, on first use. Held in
//! `AppState` behind an `Arc`; callers never manage session lifecycle.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::client::{Connector, ToolSession};
use super::gateway::{
    DatabaseGateway, DeleteDataParams, ExecuteQueryParams, GatewayOp, GetSchemaParams,
    GetTableInfoParams, InsertDataParams, UpdateDataParams,
};
use super::tracker::{
    AddTaskCommentParams, CreateTaskParams, GetListsParams, GetTaskParams, GetTasksParams,
    TaskTracker, TrackerOp, UpdateTaskParams,
};
use super::{McpError, ToolResult};
use crate::config::EndpointConfig;

const TRACKER_CLIENT_NAME: &str = "hrbuddy-tracker-client";
const GATEWAY_CLIENT_NAME: &str = "hrbuddy-gateway-client";

struct Adapters {
    tracker: TaskTracker,
    gateway: DatabaseGateway,
}

pub struct McpService {
    connector: Arc<dyn Connector>,
    tracker_endpoint: Option<EndpointConfig>,
    gateway_endpoint: Option<EndpointConfig>,
    /// Single-flight guard over the pair of sessions. Concurrent first callers
    /// wait on one in-flight attempt; a failed attempt leaves the cell empty.
    adapters: OnceCell<Adapters>,
}

impl McpService {
    pub fn new(
        connector: Arc<dyn Connector>,
        tracker_endpoint: Option<EndpointConfig>,
        gateway_endpoint: Option<EndpointConfig>,
    ) -> Self {
        Self {
            connector,
            tracker_endpoint,
            gateway_endpoint,
            adapters: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.adapters.initialized()
    }

    /// Connects both endpoints if that has not happened yet. Idempotent and
    /// retryable: a failure leaves nothing behind.
    pub async fn initialize(&self) -> Result<(), McpError> {
        self.adapters().await.map(|_| ())
    }

    async fn adapters(&self) -> Result<&Adapters, McpError> {
        self.adapters
            .get_or_try_init(|| async {
                // Both handshakes run to completion so neither is torn down mid-flight.
                let (tracker, gateway) = tokio::join!(
                    self.open(self.tracker_endpoint.as_ref(), "tracker", TRACKER_CLIENT_NAME),
                    self.open(self.gateway_endpoint.as_ref(), "gateway", GATEWAY_CLIENT_NAME),
                );

                match (tracker, gateway) {
                    (Ok(tracker), Ok(gateway)) => {
                        info!("All MCP services initialized");
                        Ok(Adapters {
                            tracker: TaskTracker::new(tracker),
                            gateway: DatabaseGateway::new(gateway),
                        })
                    }
                    (Err(e), _) | (_, Err(e)) => {
                        warn!("MCP initialization failed: {e}");
                        Err(e)
                    }
                }
            })
            .await
    }

    async fn open(
        &self,
        endpoint: Option<&EndpointConfig>,
        label: &str,
        client_name: &str,
    ) -> Result<Arc<dyn ToolSession>, McpError> {
        let endpoint = endpoint.ok_or_else(|| {
            McpError::connection(label, format!("{label} MCP endpoint is not configured"))
        })?;
        self.connector
            .connect(&endpoint.url, &endpoint.token, client_name)
            .await
    }

    pub fn tracker(&self) -> TrackerGroup<'_> {
        TrackerGroup { service: self }
    }

    pub fn gateway(&self) -> GatewayGroup<'_> {
        GatewayGroup { service: self }
    }
}

/// Task-tracker operations, initializing the facade on first use.
pub struct TrackerGroup<'a> {
    service: &'a McpService,
}

impl TrackerGroup<'_> {
    /// Routes a closed operation to its typed method.
    pub async fn call(&self, op: TrackerOp) -> Result<ToolResult, McpError> {
        match op {
            TrackerOp::CreateTask(p) => self.create_task(p).await,
            TrackerOp::GetTasks(p) => self.get_tasks(p).await,
            TrackerOp::GetTask(p) => self.get_task(p).await,
            TrackerOp::UpdateTask(p) => self.update_task(p).await,
            TrackerOp::AddTaskComment(p) => self.add_task_comment(p).await,
            TrackerOp::GetLists(p) => self.get_lists(p).await,
        }
    }

    pub async fn create_task(&self, params: CreateTaskParams) -> Result<ToolResult, McpError> {
        self.send(TrackerOp::CreateTask(params)).await
    }

    pub async fn get_tasks(&self, params: GetTasksParams) -> Result<ToolResult, McpError> {
        self.send(TrackerOp::GetTasks(params)).await
    }

    pub async fn get_task(&self, params: GetTaskParams) -> Result<ToolResult, McpError> {
        self.send(TrackerOp::GetTask(params)).await
    }

    pub async fn update_task(&self, params: UpdateTaskParams) -> Result<ToolResult, McpError> {
        self.send(TrackerOp::UpdateTask(params)).await
    }

    pub async fn add_task_comment(
        &self,
        params: AddTaskCommentParams,
    ) -> Result<ToolResult, McpError> {
        self.send(TrackerOp::AddTaskComment(params)).await
    }

    pub async fn get_lists(&self, params: GetListsParams) -> Result<ToolResult, McpError> {
        self.send(TrackerOp::GetLists(params)).await
    }

    /// Arguments are validated before any connection is attempted.
    async fn send(&self, op: TrackerOp) -> Result<ToolResult, McpError> {
        let invocation = op.into_invocation()?;
        self.service.adapters().await?.tracker.send(invocation).await
    }
}

/// Database-gateway operations, initializing the facade on first use.
pub struct GatewayGroup<'a> {
    service: &'a McpService,
}

impl GatewayGroup<'_> {
    pub async fn call(&self, op: GatewayOp) -> Result<ToolResult, McpError> {
        match op {
            GatewayOp::ExecuteQuery(p) => self.execute_query(p).await,
            GatewayOp::GetSchema(p) => self.get_schema(p).await,
            GatewayOp::GetTableInfo(p) => self.get_table_info(p).await,
            GatewayOp::InsertData(p) => self.insert_data(p).await,
            GatewayOp::UpdateData(p) => self.update_data(p).await,
            GatewayOp::DeleteData(p) => self.delete_data(p).await,
        }
    }

    pub async fn execute_query(&self, params: ExecuteQueryParams) -> Result<ToolResult, McpError> {
        self.send(GatewayOp::ExecuteQuery(params)).await
    }

    pub async fn get_schema(&self, params: GetSchemaParams) -> Result<ToolResult, McpError> {
        self.send(GatewayOp::GetSchema(params)).await
    }

    pub async fn get_table_info(&self, params: GetTableInfoParams) -> Result<ToolResult, McpError> {
        self.send(GatewayOp::GetTableInfo(params)).await
    }

    pub async fn insert_data(&self, params: InsertDataParams) -> Result<ToolResult, McpError> {
        self.send(GatewayOp::InsertData(params)).await
    }

    pub async fn update_data(&self, params: UpdateDataParams) -> Result<ToolResult, McpError> {
        self.send(GatewayOp::UpdateData(params)).await
    }

    pub async fn delete_data(&self, params: DeleteDataParams) -> Result<ToolResult, McpError> {
        self.send(GatewayOp::DeleteData(params)).await
    }

    async fn send(&self, op: GatewayOp) -> Result<ToolResult, McpError> {
        let invocation = op.into_invocation()?;
        self.service.adapters().await?.gateway.send(invocation).await
    }
}

/// In-process fakes shared by the MCP test modules.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::mcp::client::{Connector, ToolSession};
    use crate::mcp::{ContentPart, McpError, ToolInvocation, ToolResult};

    /// Records every invocation and answers with one text part.
    pub struct RecordingSession {
        endpoint: String,
        calls: Mutex<Vec<ToolInvocation>>,
    }

    impl RecordingSession {
        pub fn new(endpoint: &str) -> Arc<Self> {
            Arc::new(Self {
                endpoint: endpoint.to_string(),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub fn calls(&self) -> Vec<ToolInvocation> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToolSession for RecordingSession {
        async fn invoke(&self, invocation: ToolInvocation) -> Result<ToolResult, McpError> {
            let text = format!("{} ok at {}", invocation.tool_name, self.endpoint);
            self.calls.lock().unwrap().push(invocation);
            Ok(ToolResult {
                content: vec![ContentPart {
                    kind: "text".to_string(),
                    text,
                }],
            })
        }
    }

    /// Counts connection attempts per URL; URLs listed in `failing` are refused.
    #[derive(Default)]
    pub struct FakeConnector {
        attempts: Mutex<HashMap<String, usize>>,
        sessions: Mutex<HashMap<String, Arc<RecordingSession>>>,
        failing: Mutex<Vec<String>>,
        slow: AtomicBool,
    }

    impl FakeConnector {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn fail(&self, url: &str) {
            self.failing.lock().unwrap().push(url.to_string());
        }

        pub fn recover(&self) {
            self.failing.lock().unwrap().clear();
        }

        pub fn slow(&self) {
            self.slow.store(true, Ordering::SeqCst);
        }

        pub fn attempts(&self, url: &str) -> usize {
            self.attempts.lock().unwrap().get(url).copied().unwrap_or(0)
        }

        pub fn session(&self, url: &str) -> Option<Arc<RecordingSession>> {
            self.sessions.lock().unwrap().get(url).cloned()
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn connect(
            &self,
            endpoint_url: &str,
            _credential: &str,
            _client_name: &str,
        ) -> Result<Arc<dyn ToolSession>, McpError> {
            *self
                .attempts
                .lock()
                .unwrap()
                .entry(endpoint_url.to_string())
                .or_default() += 1;

            if self.slow.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }

            if self
                .failing
                .lock()
                .unwrap()
                .iter()
                .any(|u| u == endpoint_url)
            {
                return Err(McpError::connection(endpoint_url, "connection refused"));
            }

            let session = RecordingSession::new(endpoint_url);
            self.sessions
                .lock()
                .unwrap()
                .insert(endpoint_url.to_string(), session.clone());
            Ok(session)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeConnector;
    use super::*;
    use serde_json::{json, Map};

    const TRACKER_URL: &str = "https://tracker.test/mcp";
    const GATEWAY_URL: &str = "https://gateway.test/mcp";

    fn endpoint(url: &str) -> Option<EndpointConfig> {
        Some(EndpointConfig {
            url: url.to_string(),
            token: "secret".to_string(),
        })
    }

    fn service(connector: Arc<FakeConnector>) -> McpService {
        McpService::new(connector, endpoint(TRACKER_URL), endpoint(GATEWAY_URL))
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let connector = FakeConnector::new();
        let service = service(connector.clone());

        service.initialize().await.unwrap();
        service.initialize().await.unwrap();
        service.initialize().await.unwrap();

        assert!(service.is_initialized());
        assert_eq!(connector.attempts(TRACKER_URL), 1);
        assert_eq!(connector.attempts(GATEWAY_URL), 1);
    }

    #[tokio::test]
    async fn test_concurrent_initialize_connects_each_endpoint_once() {
        let connector = FakeConnector::new();
        connector.slow();
        let service = Arc::new(service(connector.clone()));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let service = service.clone();
            tasks.spawn(async move { service.initialize().await });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap().unwrap();
        }

        assert_eq!(connector.attempts(TRACKER_URL), 1);
        assert_eq!(connector.attempts(GATEWAY_URL), 1);
    }

    #[tokio::test]
    async fn test_failed_initialize_can_be_retried() {
        let connector = FakeConnector::new();
        connector.fail(GATEWAY_URL);
        let service = service(connector.clone());

        let err = service.initialize().await.unwrap_err();
        assert!(matches!(err, McpError::Connection { .. }));
        assert!(!service.is_initialized());

        connector.recover();
        service.initialize().await.unwrap();

        assert!(service.is_initialized());
        assert_eq!(connector.attempts(GATEWAY_URL), 2);
        assert_eq!(connector.attempts(TRACKER_URL), 2);
    }

    #[tokio::test]
    async fn test_operation_initializes_transparently() {
        let connector = FakeConnector::new();
        let service = service(connector.clone());
        assert!(!service.is_initialized());

        let result = service
            .tracker()
            .create_task(CreateTaskParams {
                list_id: "L1".to_string(),
                name: "Review resume".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(service.is_initialized());
        assert_eq!(result.text(), format!("create_task ok at {TRACKER_URL}"));

        // The tracker call went to the tracker session only.
        let tracker_calls = connector.session(TRACKER_URL).unwrap().calls();
        assert_eq!(tracker_calls.len(), 1);
        assert_eq!(tracker_calls[0].arguments["list_id"], "L1");
        assert!(connector.session(GATEWAY_URL).unwrap().calls().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_group_routes_to_gateway_session() {
        let connector = FakeConnector::new();
        let service = service(connector.clone());

        service
            .gateway()
            .execute_query(ExecuteQueryParams {
                query: "SELECT count(*) FROM applicants".to_string(),
                params: None,
            })
            .await
            .unwrap();

        let calls = connector.session(GATEWAY_URL).unwrap().calls();
        assert_eq!(calls[0].tool_name, "execute_query");
        assert!(connector.session(TRACKER_URL).unwrap().calls().is_empty());
    }

    #[tokio::test]
    async fn test_call_dispatches_closed_ops_to_their_tools() {
        let connector = FakeConnector::new();
        let service = service(connector.clone());

        let result = service
            .tracker()
            .call(TrackerOp::GetLists(GetListsParams {
                folder_id: "F1".to_string(),
            }))
            .await
            .unwrap();
        assert_eq!(result.text(), format!("get_lists ok at {TRACKER_URL}"));

        service
            .gateway()
            .call(GatewayOp::GetSchema(GetSchemaParams { schema: None }))
            .await
            .unwrap();
        let calls = connector.session(GATEWAY_URL).unwrap().calls();
        assert_eq!(calls[0].tool_name, "get_schema");

        let err = service
            .gateway()
            .call(GatewayOp::DeleteData(DeleteDataParams {
                table_name: "files".to_string(),
                filter: Map::new(),
                schema: None,
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidArguments { .. }));
        assert_eq!(connector.session(GATEWAY_URL).unwrap().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_arguments_rejected_without_connecting() {
        let connector = FakeConnector::new();
        let service = service(connector.clone());

        let err = service
            .gateway()
            .delete_data(DeleteDataParams {
                table_name: "applicants".to_string(),
                filter: Map::new(),
                schema: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, McpError::InvalidArguments { .. }));
        assert_eq!(connector.attempts(GATEWAY_URL), 0);
        assert!(!service.is_initialized());
    }

    #[tokio::test]
    async fn test_unconfigured_endpoint_is_connection_error() {
        let connector = FakeConnector::new();
        let service = McpService::new(connector.clone(), endpoint(TRACKER_URL), None);

        let err = service
            .tracker()
            .get_task(GetTaskParams {
                task_id: "T1".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, McpError::Connection { .. }));
        assert!(err.to_string().contains("not configured"));
        assert!(!service.is_initialized());
    }

    #[tokio::test]
    async fn test_update_data_through_facade() {
        let connector = FakeConnector::new();
        let service = service(connector.clone());
        let mut filter = Map::new();
        filter.insert("id".to_string(), json!("app-7"));
        let mut data = Map::new();
        data.insert("status".to_string(), json!("hired"));

        service
            .gateway()
            .update_data(UpdateDataParams {
                table_name: "applications".to_string(),
                data,
                filter,
                schema: None,
            })
            .await
            .unwrap();

        let calls = connector.session(GATEWAY_URL).unwrap().calls();
        assert_eq!(calls[0].arguments["where"], json!({"id": "app-7"}));
    }
}
