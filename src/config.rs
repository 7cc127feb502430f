use anyhow::{anyhow, Result};
use clap::ValueEnum;
use std::{
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use crate::{
    aggregator::LinkSettings,
    store::{Cipher as _, FileStore, InMemoryStore, KeyValueStore, XChaCha20Poly1305Cipher},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlaidEnvironment {
    Sandbox,
    Development,
    Production,
}

impl PlaidEnvironment {
    pub fn base_url(self) -> &'static str {
        match self {
            PlaidEnvironment::Sandbox => "https://sandbox.plaid.com",
            PlaidEnvironment::Development => "https://development.plaid.com",
            PlaidEnvironment::Production => "https://production.plaid.com",
        }
    }
}

pub struct PlaidConfig {
    pub client_id: String,
    pub secret: String,
    pub environment: PlaidEnvironment,
    /// Overrides the environment's URL, e.g. for a local mock
    pub base_url: Option<String>,
    pub timeout: Duration,
    /// Country codes used when looking up institution names
    pub institution_country_codes: Vec<String>,
    pub link: LinkSettings,
}

impl PlaidConfig {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub page_size: usize,
    /// Pagination for an item stops once more than this many transactions were collected
    pub max_transactions_per_item: usize,
    pub days_requested: Option<u32>,
    /// How many items are synced at the same time
    pub max_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_transactions_per_item: 500,
            days_requested: None,
            max_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
    /// Header the upstream identity proxy puts the authenticated user id into
    pub user_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8000,
            user_header: "X-User-Id".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    Memory,
    File,
}

pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
    /// Base64 encoded key, only needed for the file backend
    pub key: Option<String>,
}

impl StoreConfig {
    pub async fn open(&self) -> Result<Arc<dyn KeyValueStore>> {
        match self.backend {
            StoreBackend::Memory => {
                log::warn!("Using in-memory store, linked items will be lost on restart");
                Ok(Arc::new(InMemoryStore::new()))
            }
            StoreBackend::File => {
                let key = self.key.as_deref().ok_or_else(|| {
                    anyhow!("The file store needs a key. Create one with the generate-key command and pass it in STORE_KEY")
                })?;
                let key = XChaCha20Poly1305Cipher::key_from_base64(key)?;
                let cipher = XChaCha20Poly1305Cipher::with_key(&key);
                let store = FileStore::open(self.path.clone(), cipher).await?;
                Ok(Arc::new(store))
            }
        }
    }
}
