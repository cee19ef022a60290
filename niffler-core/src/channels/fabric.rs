//! Concrete mailbox set for one process lifetime (spec §4.1).

use thiserror::Error;
use tokio::sync::mpsc;

use super::{Shutdown, DEFAULT_MAILBOX_CAPACITY};
use crate::protocol::{ApiRequest, ConfirmRequest, ConfirmResponse, ToolRequest, ToolResponse};
use crate::stream::StreamEvent;

#[derive(Debug, Error)]
pub enum FabricError {
    #[error("mailbox closed")]
    Closed,
    #[error("mailbox full")]
    Full,
}

impl<T> From<mpsc::error::TrySendError<T>> for FabricError {
    fn from(e: mpsc::error::TrySendError<T>) -> Self {
        match e {
            mpsc::error::TrySendError::Full(_) => FabricError::Full,
            mpsc::error::TrySendError::Closed(_) => FabricError::Closed,
        }
    }
}

/// Sender halves handed to the CLI side of the fabric.
#[derive(Clone)]
pub struct CliEndpoint {
    pub api_requests: mpsc::Sender<ApiRequest>,
    pub confirm_responses: mpsc::Sender<ConfirmResponse>,
}

/// Sender halves handed to the API worker.
#[derive(Clone)]
pub struct ApiWorkerEndpoint {
    pub stream_events: mpsc::Sender<StreamEvent>,
    pub tool_requests: mpsc::Sender<ToolRequest>,
}

/// Sender halves handed to the tool worker.
#[derive(Clone)]
pub struct ToolWorkerEndpoint {
    pub tool_responses: mpsc::Sender<ToolResponse>,
    pub confirm_requests: mpsc::Sender<ConfirmRequest>,
}

/// Owns every mailbox for one process lifetime. Construct once at startup,
/// then [`ChannelFabric::split`] into the receiver ends each worker owns plus
/// the sender handles each side needs to talk to the others.
pub struct ChannelFabric {
    api_requests: (mpsc::Sender<ApiRequest>, mpsc::Receiver<ApiRequest>),
    stream_events: (mpsc::Sender<StreamEvent>, mpsc::Receiver<StreamEvent>),
    tool_requests: (mpsc::Sender<ToolRequest>, mpsc::Receiver<ToolRequest>),
    tool_responses: (mpsc::Sender<ToolResponse>, mpsc::Receiver<ToolResponse>),
    confirm_requests: (
        mpsc::Sender<ConfirmRequest>,
        mpsc::Receiver<ConfirmRequest>,
    ),
    confirm_responses: (
        mpsc::Sender<ConfirmResponse>,
        mpsc::Receiver<ConfirmResponse>,
    ),
    pub shutdown: Shutdown,
}

impl ChannelFabric {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAILBOX_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (shutdown, _handle) = Shutdown::new();
        Self {
            api_requests: mpsc::channel(capacity),
            stream_events: mpsc::channel(capacity),
            tool_requests: mpsc::channel(capacity),
            tool_responses: mpsc::channel(capacity),
            confirm_requests: mpsc::channel(capacity),
            confirm_responses: mpsc::channel(capacity),
            shutdown,
        }
    }

    /// Splits the fabric into the three worker-facing bundles plus the
    /// receiver ends each worker consumes. Consumes `self` because mailbox
    /// receivers are single-consumer.
    #[allow(clippy::type_complexity)]
    pub fn split(
        self,
    ) -> (
        CliEndpoint,
        ApiWorkerEndpoint,
        ToolWorkerEndpoint,
        mpsc::Receiver<ApiRequest>,
        mpsc::Receiver<StreamEvent>,
        mpsc::Receiver<ToolRequest>,
        mpsc::Receiver<ToolResponse>,
        mpsc::Receiver<ConfirmRequest>,
        mpsc::Receiver<ConfirmResponse>,
        Shutdown,
    ) {
        let cli = CliEndpoint {
            api_requests: self.api_requests.0,
            confirm_responses: self.confirm_responses.0,
        };
        let api_worker = ApiWorkerEndpoint {
            stream_events: self.stream_events.0,
            tool_requests: self.tool_requests.0,
        };
        let tool_worker = ToolWorkerEndpoint {
            tool_responses: self.tool_responses.0,
            confirm_requests: self.confirm_requests.0,
        };
        (
            cli,
            api_worker,
            tool_worker,
            self.api_requests.1,
            self.stream_events.1,
            self.tool_requests.1,
            self.tool_responses.1,
            self.confirm_requests.1,
            self.confirm_responses.1,
            self.shutdown,
        )
    }
}

impl Default for ChannelFabric {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;

    #[tokio::test]
    async fn split_endpoints_are_wired_to_receivers() {
        let fabric = ChannelFabric::with_capacity(4);
        let (cli, _api_worker, _tool_worker, mut api_rx, _se, _tr, _tresp, _cr, _cresp, _sd) =
            fabric.split();

        cli.api_requests
            .send(ApiRequest {
                conversation_id: "c1".into(),
                messages: vec![],
                model: ModelConfig::default_for_test(),
                mode_system_prompt: String::new(),
                tool_schemas: vec![],
            })
            .await
            .unwrap();

        let received = api_rx.recv().await.expect("message delivered");
        assert_eq!(received.conversation_id, "c1");
    }
}
