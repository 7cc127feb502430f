use anyhow::{anyhow, ensure, Context as _, Result};
use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use crc::{Crc, CRC_32_BZIP2};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::sync::Mutex;

use super::{crypto::Cipher, entries::Entries, KeyValueStore};
use crate::clock::{Clock, SystemClock};

const MAX_DECOMPRESSED_SIZE: usize = 1024 * 1024 * 1024;

#[derive(Serialize, Deserialize)]
enum StoreFile {
    V1(Entries),
}

fn crc() -> Crc<u32> {
    Crc::<u32>::new(&CRC_32_BZIP2)
}

/// Store that keeps all entries in memory and rewrites one encrypted file on every mutation
pub struct FileStore<C: Cipher> {
    path: PathBuf,
    cipher: C,
    entries: Mutex<Entries>,
    clock: Arc<dyn Clock>,
}

impl<C: Cipher> FileStore<C> {
    /// Opens the store file, or starts an empty store if the file doesn't exist yet
    pub async fn open(path: PathBuf, cipher: C) -> Result<Self> {
        Self::open_with_clock(path, cipher, Arc::new(SystemClock)).await
    }

    pub async fn open_with_clock(path: PathBuf, cipher: C, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut entries = load(&path, &cipher)
            .await
            .with_context(|| format!("Failed to load store file {}", path.display()))?
            .unwrap_or_else(Entries::new_empty);
        let purged = entries.purge_expired(clock.now());
        if purged > 0 {
            log::info!("Dropped {purged} expired store entries");
        }
        Ok(Self {
            path,
            cipher,
            entries: Mutex::new(entries),
            clock,
        })
    }

    async fn mutate(&self, f: impl FnOnce(&mut Entries) + Send) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let mut updated = entries.clone();
        updated.purge_expired(self.clock.now());
        f(&mut updated);
        save(&updated, &self.path, &self.cipher).await?;
        *entries = updated;
        Ok(())
    }
}

#[async_trait]
impl<C: Cipher> KeyValueStore for FileStore<C> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(key, self.clock.now()).map(str::to_string))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.mutate(|entries| entries.set(key, value, None)).await
    }

    async fn set_with_expiry(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let expires_at = self.clock.now() + ChronoDuration::from_std(ttl)?;
        self.mutate(|entries| entries.set(key, value, Some(expires_at)))
            .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.mutate(|entries| {
            entries.delete(key);
        })
        .await
    }
}

/// Returns Ok(None) if the store file doesn't exist yet
async fn load(path: &Path, cipher: &impl Cipher) -> Result<Option<Entries>> {
    log::info!("Loading store...");
    if !tokio::fs::try_exists(path).await? {
        log::info!("Loading store...not found");
        return Ok(None);
    }

    let content_ciphertext = tokio::fs::read(path).await?;
    let content_plaintext = cipher.decrypt(&content_ciphertext)?;
    let content_decompressed =
        zstd::bulk::decompress(&content_plaintext, MAX_DECOMPRESSED_SIZE)?;
    let crc = crc();
    let (parsed, remaining): (StoreFile, &[u8]) =
        postcard::take_from_bytes_crc32(&content_decompressed, crc.digest())?;
    ensure!(remaining.is_empty(), "File had extra bytes");
    let StoreFile::V1(entries) = parsed;

    log::info!("Loading store...done");

    Ok(Some(entries))
}

async fn save(entries: &Entries, path: &Path, cipher: &impl Cipher) -> Result<()> {
    log::debug!("Saving store...");

    let crc = crc();
    let content_plaintext = postcard::to_stdvec_crc32(&StoreFile::V1(entries.clone()), crc.digest())?;
    let content_compressed =
        zstd::bulk::compress(&content_plaintext, zstd::DEFAULT_COMPRESSION_LEVEL)?;
    let content_ciphertext = cipher.encrypt(&content_compressed)?;

    // Write to a temporary file first so a failed write doesn't destroy the previous state
    let filename = path
        .file_name()
        .ok_or_else(|| anyhow!("Path has no filename"))?
        .to_str()
        .ok_or_else(|| anyhow!("Filename isn't valid utf-8"))?;
    let tmppath = path.with_file_name(format!("{filename}.tmp"));
    tokio::fs::write(&tmppath, content_ciphertext).await?;
    tokio::fs::rename(&tmppath, path).await?;

    log::debug!("Saving store...done");

    Ok(())
}
