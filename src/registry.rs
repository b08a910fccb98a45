use crate::admin_client::AdminClient;
use crate::analytics_client::AnalyticsClient;
use crate::error::ClientNotFoundError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Name to client lookup for multi-property setups.
///
/// Populated once at startup and read-only afterwards.
#[derive(Debug)]
pub struct ClientRegistry<C> {
    clients: BTreeMap<String, Arc<C>>,
    default_key: Option<String>,
}

pub type AnalyticsRegistry = ClientRegistry<AnalyticsClient>;
pub type AdminRegistry = ClientRegistry<AdminClient>;

impl<C> Default for ClientRegistry<C> {
    fn default() -> Self {
        ClientRegistry {
            clients: BTreeMap::new(),
            default_key: None,
        }
    }
}

impl<C> ClientRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `client` under `key`, replacing any previous client.
    pub fn add_client(&mut self, key: impl Into<String>, client: Arc<C>) {
        self.clients.insert(key.into(), client);
    }

    pub fn get_client(&self, key: &str) -> Result<Arc<C>, ClientNotFoundError> {
        self.clients
            .get(key)
            .cloned()
            .ok_or_else(|| ClientNotFoundError {
                key: key.to_string(),
            })
    }

    pub fn has_client(&self, key: &str) -> bool {
        self.clients.contains_key(key)
    }

    /// All clients, ordered by key.
    pub fn clients(&self) -> &BTreeMap<String, Arc<C>> {
        &self.clients
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Marks `key` as the default. The client does not need to be
    /// registered yet.
    pub fn set_default_client(&mut self, key: impl Into<String>) {
        self.default_key = Some(key.into());
    }

    /// The client registered under the default key.
    pub fn default_client(&self) -> Result<Arc<C>, ClientNotFoundError> {
        match &self.default_key {
            Some(key) => self.get_client(key),
            None => Err(ClientNotFoundError {
                key: "default".to_string(),
            }),
        }
    }
}
