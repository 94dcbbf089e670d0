use std::sync::Arc;

use tracing::debug;

use super::{NetworkRequest, NetworkTransport};
use crate::config::ProcessorConfig;
use crate::error::{BoxError, Outcome, RequestError};
use crate::executor::{ExecutionContext, Executor, OperationHandle};
use crate::pipeline::{Generator, MiddlewareChain};
use crate::request::OperationMode;

struct Shared<T> {
    transport: T,
    config: ProcessorConfig,
    chain: MiddlewareChain<NetworkRequest, Vec<u8>>,
}

impl<T: NetworkTransport> Shared<T> {
    fn execute_blocking(&self, context: ExecutionContext, request: NetworkRequest) -> Outcome<Vec<u8>> {
        if self.config.guard_interactive {
            context.ensure_background("network request")?;
        }
        debug!(request = %request, "executing");
        self.chain
            .run(request, NetworkRequest::validate, |prepared| self.transport.execute(prepared))
    }
}

/// Executes [`NetworkRequest`]s through a [`NetworkTransport`].
pub struct NetworkProcessor<T> {
    shared: Arc<Shared<T>>,
    executor: Executor,
}

impl<T> Clone for NetworkProcessor<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            executor: self.executor.clone(),
        }
    }
}

impl<T: NetworkTransport + 'static> NetworkProcessor<T> {
    pub fn builder() -> NetworkProcessorBuilder<T> {
        NetworkProcessorBuilder::default()
    }

    pub fn new(transport: T) -> Self {
        Self::from_parts(transport, ProcessorConfig::default(), MiddlewareChain::default())
    }

    fn from_parts(transport: T, config: ProcessorConfig, chain: MiddlewareChain<NetworkRequest, Vec<u8>>) -> Self {
        let executor = Executor::new(config.worker_threads);
        Self {
            shared: Arc::new(Shared {
                transport,
                config,
                chain,
            }),
            executor,
        }
    }

    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    pub fn execute_blocking(&self, context: ExecutionContext, request: NetworkRequest) -> Outcome<Vec<u8>> {
        self.shared.execute_blocking(context, request)
    }

    /// Run `request` on the concurrent worker pool.
    pub fn execute(&self, request: NetworkRequest) -> OperationHandle<Vec<u8>> {
        let shared = Arc::clone(&self.shared);
        self.executor.submit(OperationMode::Concurrent, move || {
            shared.execute_blocking(ExecutionContext::Background, request)
        })
    }

    /// A failed `previous` is passed through without calling `generator`.
    pub fn process_result<P>(
        &self,
        previous: Outcome<P>,
        generator: Generator<P, NetworkRequest>,
    ) -> OperationHandle<Vec<u8>> {
        match previous.and_then(generator) {
            Ok(request) => self.execute(request),
            Err(err) => Executor::ready(Err(err)),
        }
    }

    pub fn process_result_blocking<P>(
        &self,
        context: ExecutionContext,
        previous: Outcome<P>,
        generator: Generator<P, NetworkRequest>,
    ) -> Outcome<Vec<u8>> {
        let request = previous.and_then(generator)?;
        self.execute_blocking(context, request)
    }

    /// Execute and decode the response body as JSON.
    pub fn execute_json<D>(&self, context: ExecutionContext, request: NetworkRequest) -> Outcome<D>
    where
        D: serde::de::DeserializeOwned,
    {
        let body = self.execute_blocking(context, request)?;
        serde_json::from_slice(&body)
            .map_err(|e| RequestError::Network(format!("response is not valid JSON: {}", e)))
    }
}

/// Assembles a [`NetworkProcessor`].
pub struct NetworkProcessorBuilder<T> {
    transport: Option<T>,
    config: ProcessorConfig,
    chain: MiddlewareChain<NetworkRequest, Vec<u8>>,
}

impl<T> Default for NetworkProcessorBuilder<T> {
    fn default() -> Self {
        Self {
            transport: None,
            config: ProcessorConfig::default(),
            chain: MiddlewareChain::default(),
        }
    }
}

impl<T: NetworkTransport + 'static> NetworkProcessorBuilder<T> {
    pub fn transport(mut self, transport: T) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn request_middleware<F>(mut self, name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(NetworkRequest) -> Result<NetworkRequest, BoxError> + Send + Sync + 'static,
    {
        self.chain.request = self.chain.request.register(name, transform);
        self
    }

    pub fn output_middleware<F>(mut self, name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(Vec<u8>) -> Result<Vec<u8>, BoxError> + Send + Sync + 'static,
    {
        self.chain.output = self.chain.output.register(name, transform);
        self
    }

    pub fn error_middleware<F>(mut self, name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(RequestError) -> Result<RequestError, BoxError> + Send + Sync + 'static,
    {
        self.chain.error = self.chain.error.register(name, transform);
        self
    }

    pub fn build(self) -> Outcome<NetworkProcessor<T>> {
        let transport = self
            .transport
            .ok_or_else(|| RequestError::validation("network processor requires a transport"))?;
        if self.config.worker_threads == 0 {
            return Err(RequestError::validation("worker_threads must be at least 1"));
        }
        Ok(NetworkProcessor::from_parts(transport, self.config, self.chain))
    }
}
