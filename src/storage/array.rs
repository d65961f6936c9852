//! Ordered-collection store
//!
//! Holds a sequence of records under one namespace key. Insertion order is
//! the canonical order, and records considered equal by the store's
//! comparison function are never stored twice.

use super::backend::StorageBackend;
use super::subscribers::{Subscribers, Subscription};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

type Compare<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

pub struct ArrayStore<T> {
    namespace: String,
    backend: Arc<dyn StorageBackend>,
    compare: Compare<T>,
    /// Serializes mutations of this namespace in submission order
    write_gate: Arc<Mutex<()>>,
    subscribers: Subscribers<Vec<T>>,
}

impl<T> Clone for ArrayStore<T> {
    fn clone(&self) -> Self {
        Self {
            namespace: self.namespace.clone(),
            backend: Arc::clone(&self.backend),
            compare: Arc::clone(&self.compare),
            write_gate: Arc::clone(&self.write_gate),
            subscribers: self.subscribers.clone(),
        }
    }
}

impl<T> ArrayStore<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new<F>(backend: Arc<dyn StorageBackend>, namespace: impl Into<String>, compare: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Self {
            namespace: namespace.into(),
            backend,
            compare: Arc::new(compare),
            write_gate: Arc::new(Mutex::new(())),
            subscribers: Subscribers::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// All records in insertion order. Missing or unreadable data reads as empty.
    pub async fn get(&self) -> Vec<T> {
        match self.load().await {
            Ok(items) => items,
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "Failed to read store, treating as empty");
                Vec::new()
            }
        }
    }

    /// Records matching `predicate`, in insertion order
    pub async fn get_where<F>(&self, predicate: F) -> Vec<T>
    where
        F: Fn(&T) -> bool + Send,
    {
        self.get().await.into_iter().filter(|x| predicate(x)).collect()
    }

    /// Append records that are not already present. Returns the records
    /// actually appended.
    pub async fn push<I>(&self, items: I) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = T> + Send,
    {
        let incoming: Vec<T> = items.into_iter().collect();
        let _gate = self.write_gate.lock().await;

        let mut all = self.load().await?;
        let mut appended = Vec::new();
        for item in incoming {
            if all.iter().any(|existing| (self.compare)(existing, &item)) {
                continue;
            }
            all.push(item.clone());
            appended.push(item);
        }

        if !appended.is_empty() {
            self.commit(&all).await?;
        }
        Ok(appended)
    }

    /// Remove every record matching `predicate`. Returns the removed records.
    pub async fn remove<F>(&self, predicate: F) -> Result<Vec<T>>
    where
        F: Fn(&T) -> bool + Send,
    {
        let _gate = self.write_gate.lock().await;

        let (removed, kept): (Vec<T>, Vec<T>) =
            self.load().await?.into_iter().partition(|x| predicate(x));

        if !removed.is_empty() {
            self.commit(&kept).await?;
        }
        Ok(removed)
    }

    /// Replace every record matching `predicate` with `f(record)`, keeping
    /// its position. Returns the replacement records.
    pub async fn update<P, F>(&self, predicate: P, f: F) -> Result<Vec<T>>
    where
        P: Fn(&T) -> bool + Send,
        F: Fn(&T) -> T + Send,
    {
        let _gate = self.write_gate.lock().await;

        let mut all = self.load().await?;
        let mut updated = Vec::new();
        for item in all.iter_mut() {
            if predicate(item) {
                *item = f(item);
                updated.push(item.clone());
            }
        }

        if !updated.is_empty() {
            self.commit(&all).await?;
        }
        Ok(updated)
    }

    pub async fn clear(&self) -> Result<Vec<T>> {
        self.remove(|_| true).await
    }

    /// Register a callback receiving the full collection after every
    /// committed mutation
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[T]) + Send + Sync + 'static,
    {
        self.subscribers
            .subscribe(move |items: &Vec<T>| callback(items.as_slice()))
    }

    /// Corrupt documents load as empty; I/O failures propagate so a
    /// mutation never overwrites data it could not read
    async fn load(&self) -> Result<Vec<T>> {
        let value = match self.backend.read(&self.namespace).await {
            Ok(Some(value)) => value,
            Ok(None) => return Ok(Vec::new()),
            Err(Error::StorageReadCorrupt { key, reason }) => {
                warn!(namespace = %key, %reason, "Corrupt stored collection, treating as absent");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        match serde_json::from_value(value) {
            Ok(items) => Ok(items),
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "Stored collection has unexpected shape, treating as absent");
                Ok(Vec::new())
            }
        }
    }

    async fn commit(&self, items: &Vec<T>) -> Result<()> {
        let value = serde_json::to_value(items)?;
        self.backend.write(&self.namespace, &value).await?;
        self.subscribers.notify(items);
        Ok(())
    }
}
