//! Host function interface and in-process implementations

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Failure invoking a host function
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Backend function not found: {0}")]
    FunctionNotFound(String),

    #[error("Host call to {function} failed: {message}")]
    CallFailed { function: String, message: String },
}

/// Capability map of named host functions
///
/// Every argument is a JSON string. Invocation is fire-and-forget: any
/// response arrives later as a named event on the [`ResponseRouter`](super::ResponseRouter).
pub trait HostBridge: Send + Sync {
    /// Whether the host exposes `function`
    fn has_function(&self, function: &str) -> bool;

    /// Call `function` with JSON string arguments
    fn invoke(&self, function: &str, args: &[String]) -> Result<(), BridgeError>;
}

/// Bridge for running without a host: no functions exist
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBridge;

impl HostBridge for NullBridge {
    fn has_function(&self, _function: &str) -> bool {
        false
    }

    fn invoke(&self, function: &str, _args: &[String]) -> Result<(), BridgeError> {
        Err(BridgeError::FunctionNotFound(function.to_string()))
    }
}

/// One recorded host invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostCall {
    pub function: String,
    pub args: Vec<String>,
}

type InvokeHook = Arc<dyn Fn(&HostCall) + Send + Sync>;

/// In-memory host that records every call
///
/// By default every function exists. `on_invoke` installs a hook that runs
/// after each successful call, which is how tests and the simulator answer
/// request/response calls.
#[derive(Default)]
pub struct RecordingBridge {
    /// `None` means every function exists
    available: Option<HashSet<String>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<HostCall>>,
    hook: Mutex<Option<InvokeHook>>,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the named functions exist
    pub fn with_functions(functions: &[&str]) -> Self {
        Self {
            available: Some(functions.iter().map(|f| f.to_string()).collect()),
            ..Self::default()
        }
    }

    /// Make every future call to `function` fail with [`BridgeError::CallFailed`]
    pub fn fail_function(&self, function: &str) {
        lock(&self.failing).insert(function.to_string());
    }

    pub fn on_invoke<F>(&self, hook: F)
    where
        F: Fn(&HostCall) + Send + Sync + 'static,
    {
        *lock(&self.hook) = Some(Arc::new(hook));
    }

    pub fn calls(&self) -> Vec<HostCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_to(&self, function: &str) -> Vec<HostCall> {
        lock(&self.calls).iter().filter(|c| c.function == function).cloned().collect()
    }

    pub fn clear(&self) {
        lock(&self.calls).clear();
    }
}

impl HostBridge for RecordingBridge {
    fn has_function(&self, function: &str) -> bool {
        self.available.as_ref().is_none_or(|set| set.contains(function))
    }

    fn invoke(&self, function: &str, args: &[String]) -> Result<(), BridgeError> {
        if !self.has_function(function) {
            return Err(BridgeError::FunctionNotFound(function.to_string()));
        }
        let call = HostCall {
            function: function.to_string(),
            args: args.to_vec(),
        };
        lock(&self.calls).push(call.clone());

        if lock(&self.failing).contains(function) {
            debug!(%function, "RecordingBridge::invoke: simulated failure");
            return Err(BridgeError::CallFailed {
                function: function.to_string(),
                message: "simulated host failure".to_string(),
            });
        }

        let hook = lock(&self.hook).clone();
        if let Some(hook) = hook {
            hook(&call);
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
