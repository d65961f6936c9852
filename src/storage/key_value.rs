//! Single-value store

use super::backend::StorageBackend;
use super::subscribers::{Subscribers, Subscription};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// One value of type `T` under a namespace key
pub struct KeyValueStore<T> {
    namespace: String,
    backend: Arc<dyn StorageBackend>,
    write_gate: Arc<Mutex<()>>,
    subscribers: Subscribers<Option<T>>,
}

impl<T> Clone for KeyValueStore<T> {
    fn clone(&self) -> Self {
        Self {
            namespace: self.namespace.clone(),
            backend: Arc::clone(&self.backend),
            write_gate: Arc::clone(&self.write_gate),
            subscribers: self.subscribers.clone(),
        }
    }
}

impl<T> KeyValueStore<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(backend: Arc<dyn StorageBackend>, namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            backend,
            write_gate: Arc::new(Mutex::new(())),
            subscribers: Subscribers::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The stored value, or `None` when absent or unreadable
    pub async fn get(&self) -> Option<T> {
        match self.load().await {
            Ok(value) => value,
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "Failed to read value, treating as absent");
                None
            }
        }
    }

    pub async fn set(&self, value: T) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        self.commit(Some(value)).await
    }

    /// Read-modify-write under the namespace's write gate
    pub async fn update<F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Option<T>) -> T + Send,
    {
        let _gate = self.write_gate.lock().await;
        let next = f(self.load().await?);
        self.commit(Some(next.clone())).await?;
        Ok(next)
    }

    /// Delete the value. Subscribers receive `None`.
    pub async fn clear(&self) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        self.commit(None).await
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&T>) + Send + Sync + 'static,
    {
        self.subscribers
            .subscribe(move |value: &Option<T>| callback(value.as_ref()))
    }

    async fn load(&self) -> Result<Option<T>> {
        let value = match self.backend.read(&self.namespace).await {
            Ok(Some(value)) => value,
            Ok(None) => return Ok(None),
            Err(Error::StorageReadCorrupt { key, reason }) => {
                warn!(namespace = %key, %reason, "Corrupt stored value, treating as absent");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match serde_json::from_value(value) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "Stored value has unexpected shape, treating as absent");
                Ok(None)
            }
        }
    }

    async fn commit(&self, value: Option<T>) -> Result<()> {
        match &value {
            Some(v) => {
                let json = serde_json::to_value(v)?;
                self.backend.write(&self.namespace, &json).await?;
            }
            None => self.backend.remove(&self.namespace).await?,
        }
        self.subscribers.notify(&value);
        Ok(())
    }
}
