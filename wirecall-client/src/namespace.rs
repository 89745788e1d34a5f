//! Namespace and method handles
//!
//! JSON-RPC method names are conventionally two-part, `Namespace.method`
//! (`VideoLibrary.GetMovies`, `Player.Open`). Handles let callers build
//! that shape incrementally: a [`Namespace`] is obtained from the client by
//! name, a [`Method`] from the namespace, and calling the method sends
//! `namespace.method` over whichever transport the client carries.
//!
//! Handles are memoized: asking a client for the same namespace twice, or a
//! namespace for the same method twice, returns the same `Arc`. Handles
//! hold only a weak reference back to the client, so outstanding handles
//! never keep a dropped client's connection alive; calling through a stale
//! handle fails with a connection-closed error.

use crate::client::WeakClient;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use wirecall_core::{Params, Result};

/// Handle to one method group; produces [`Method`] handles
pub struct Namespace {
    name: String,
    client: WeakClient,
    methods: Mutex<HashMap<String, Arc<Method>>>,
}

impl Namespace {
    pub(crate) fn new(name: impl Into<String>, client: WeakClient) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            client,
            methods: Mutex::new(HashMap::new()),
        })
    }

    /// The namespace part of the qualified method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle for `name` within this namespace, memoized per namespace
    pub async fn method(&self, name: &str) -> Arc<Method> {
        let mut methods = self.methods.lock().await;
        if let Some(method) = methods.get(name) {
            return Arc::clone(method);
        }

        let method = Arc::new(Method {
            full_name: format!("{}.{}", self.name, name),
            client: self.client.clone(),
        });
        methods.insert(name.to_string(), Arc::clone(&method));
        method
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace").field("name", &self.name).finish()
    }
}

/// Handle to one fully-qualified method on one client
pub struct Method {
    full_name: String,
    client: WeakClient,
}

impl Method {
    /// The qualified `namespace.method` name this handle sends
    pub fn name(&self) -> &str {
        &self.full_name
    }

    /// Invoke the method and return the call result
    pub async fn call(&self, params: Option<Params>) -> Result<Option<Value>> {
        self.client.upgrade()?.call(&self.full_name, params).await
    }

    /// Invoke the method as a notification: no id, no reply
    pub async fn notify(&self, params: Option<Params>) -> Result<()> {
        self.client.upgrade()?.notify(&self.full_name, params).await
    }
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Method")
            .field("full_name", &self.full_name)
            .finish()
    }
}
