use anyhow::{anyhow, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::{net::IpAddr, path::PathBuf, time::Duration};

use crate::{
    aggregator::LinkSettings,
    config::{
        CacheConfig, PlaidConfig, PlaidEnvironment, ServerConfig, StoreBackend, StoreConfig,
        SyncConfig,
    },
};

/// Backend for a personal finance dashboard that links bank accounts through Plaid.
#[derive(Parser, Debug)]
pub struct Args {
    #[clap(flatten)]
    pub plaid: PlaidArgs,

    #[clap(flatten)]
    pub store: StoreArgs,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        #[clap(long, env = "SERVER_ADDRESS", default_value = "127.0.0.1")]
        address: IpAddr,

        #[clap(long, env = "SERVER_PORT", default_value_t = 8000)]
        port: u16,

        /// Header carrying the id of the user authenticated by the upstream proxy
        #[clap(long, env = "USER_HEADER", default_value = "X-User-Id")]
        user_header: String,

        #[clap(flatten)]
        sync: SyncArgs,
    },

    /// Check that the Plaid credentials work by creating a link token
    TestConnection,

    /// Generate a new key for the encrypted file store
    GenerateKey,

    /// List the linked items of a user
    ListItems {
        #[clap(long)]
        user: String,
    },

    /// Unlink an item and revoke its access token
    RemoveItem {
        #[clap(long)]
        user: String,

        #[clap(long)]
        item: String,

        /// Don't ask for confirmation
        #[clap(long)]
        yes: bool,
    },

    /// Fetch the dashboard snapshot of a user and print a summary
    Sync {
        #[clap(long)]
        user: String,

        /// Ignore the cached snapshot
        #[clap(long)]
        refresh: bool,

        #[clap(flatten)]
        sync: SyncArgs,
    },
}

#[derive(ClapArgs, Debug)]
pub struct PlaidArgs {
    #[clap(long, env = "PLAID_CLIENT_ID", hide_env_values = true, global = true)]
    pub plaid_client_id: Option<String>,

    #[clap(long, env = "PLAID_SECRET", hide_env_values = true, global = true)]
    pub plaid_secret: Option<String>,

    #[clap(long, env = "PLAID_ENV", value_enum, default_value = "sandbox", global = true)]
    pub plaid_env: PlaidEnvironment,

    /// Use this URL instead of the one of the Plaid environment
    #[clap(long, env = "PLAID_BASE_URL", global = true)]
    pub plaid_base_url: Option<String>,

    /// Timeout for requests to Plaid, in seconds
    #[clap(long, env = "PLAID_TIMEOUT", default_value_t = 30, global = true)]
    pub plaid_timeout: u64,

    #[clap(long, env = "PLAID_CLIENT_NAME", default_value = "Personal Finance Dashboard", global = true)]
    pub link_client_name: String,

    #[clap(
        long,
        env = "PLAID_PRODUCTS",
        value_delimiter = ',',
        default_value = "transactions,investments,auth",
        global = true
    )]
    pub link_products: Vec<String>,

    #[clap(
        long,
        env = "PLAID_COUNTRY_CODES",
        value_delimiter = ',',
        default_value = "US,ES",
        global = true
    )]
    pub link_country_codes: Vec<String>,

    #[clap(long, env = "PLAID_LANGUAGE", default_value = "en", global = true)]
    pub link_language: String,

    /// Country codes used to look up institution names
    #[clap(
        long,
        env = "PLAID_INSTITUTION_COUNTRY_CODES",
        value_delimiter = ',',
        default_value = "US",
        global = true
    )]
    pub institution_country_codes: Vec<String>,
}

impl PlaidArgs {
    pub fn config(&self) -> Result<PlaidConfig> {
        let client_id = self
            .plaid_client_id
            .clone()
            .ok_or_else(|| anyhow!("Missing Plaid client id, set PLAID_CLIENT_ID"))?;
        let secret = self
            .plaid_secret
            .clone()
            .ok_or_else(|| anyhow!("Missing Plaid secret, set PLAID_SECRET"))?;
        Ok(PlaidConfig {
            client_id,
            secret,
            environment: self.plaid_env,
            base_url: self.plaid_base_url.clone(),
            timeout: Duration::from_secs(self.plaid_timeout),
            institution_country_codes: self.institution_country_codes.clone(),
            link: LinkSettings {
                client_name: self.link_client_name.clone(),
                products: self.link_products.clone(),
                country_codes: self.link_country_codes.clone(),
                language: self.link_language.clone(),
            },
        })
    }
}

#[derive(ClapArgs, Debug)]
pub struct StoreArgs {
    #[clap(long = "store", env = "STORE_BACKEND", value_enum, default_value = "file", global = true)]
    pub store_backend: StoreBackend,

    #[clap(long, env = "STORE_PATH", default_value = "finance_dashboard.db", global = true)]
    pub store_path: PathBuf,

    /// Base64 encoded key of the file store, see generate-key
    #[clap(long, env = "STORE_KEY", hide_env_values = true, global = true)]
    pub store_key: Option<String>,
}

impl StoreArgs {
    pub fn config(&self) -> StoreConfig {
        StoreConfig {
            backend: self.store_backend,
            path: self.store_path.clone(),
            key: self.store_key.clone(),
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct SyncArgs {
    /// Transactions requested per page
    #[clap(long, env = "SYNC_PAGE_SIZE", default_value_t = 100)]
    pub page_size: usize,

    /// Stop paginating an item once more than this many transactions were fetched
    #[clap(long, env = "SYNC_MAX_TRANSACTIONS", default_value_t = 500)]
    pub max_transactions_per_item: usize,

    /// History to request when an item is synced for the first time
    #[clap(long, env = "SYNC_DAYS_REQUESTED")]
    pub days_requested: Option<u32>,

    /// Number of items synced at the same time
    #[clap(long, env = "SYNC_CONCURRENCY", default_value_t = 4)]
    pub max_concurrency: usize,

    /// How long a fetched snapshot is served from the cache, in seconds
    #[clap(long, env = "CACHE_TTL", default_value_t = 3600)]
    pub cache_ttl: u64,
}

impl SyncArgs {
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            page_size: self.page_size,
            max_transactions_per_item: self.max_transactions_per_item,
            days_requested: self.days_requested,
            max_concurrency: self.max_concurrency,
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(self.cache_ttl),
        }
    }
}

impl Default for SyncArgs {
    fn default() -> Self {
        let sync = SyncConfig::default();
        Self {
            page_size: sync.page_size,
            max_transactions_per_item: sync.max_transactions_per_item,
            days_requested: sync.days_requested,
            max_concurrency: sync.max_concurrency,
            cache_ttl: CacheConfig::default().ttl.as_secs(),
        }
    }
}

pub fn server_config(address: IpAddr, port: u16, user_header: String) -> ServerConfig {
    ServerConfig {
        address,
        port,
        user_header,
    }
}

pub fn parse() -> Args {
    Args::parse()
}
