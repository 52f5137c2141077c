//! Session descriptor memo.
//!
//! Descriptors resolved through the adapter are kept for the whole session,
//! the same way the module system keeps imported modules. Concurrent lookups
//! of one address share a single resolution. Failed lookups are forgotten so
//! a later call can retry.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use dapploader_core::model::ApplicationDescriptor;
use dapploader_core::LoaderResult;

use crate::capability::DescriptorSource;
use crate::resolver::ContentResolver;

type SharedDescriptor = Shared<BoxFuture<'static, LoaderResult<ApplicationDescriptor>>>;

pub struct SessionDescriptors {
    resolver: ContentResolver,
    entries: Mutex<HashMap<String, SharedDescriptor>>,
}

impl SessionDescriptors {
    pub fn new(resolver: ContentResolver) -> Self {
        Self {
            resolver,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Public descriptor of `address`.
    pub async fn get(&self, address: &str) -> LoaderResult<ApplicationDescriptor> {
        let key = self.resolver.config().normalize_address(address);
        let pending = {
            let mut entries = self.entries.lock();
            entries
                .entry(key.clone())
                .or_insert_with(|| {
                    let resolver = self.resolver.clone();
                    let address = key.clone();
                    async move { resolver.resolve(&address).await.map(ApplicationDescriptor::into_public) }
                        .boxed()
                        .shared()
                })
                .clone()
        };

        let result = pending.await;
        if result.is_err() {
            self.entries.lock().remove(&key);
        }
        result
    }
}

#[async_trait]
impl DescriptorSource for SessionDescriptors {
    async fn descriptor(&self, address: &str) -> LoaderResult<ApplicationDescriptor> {
        self.get(address).await
    }
}
