use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::arena::BLOCK_ALIGN;

pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;
pub const DEFAULT_BIG_CHUNK_THRESHOLD: usize = DEFAULT_BLOCK_SIZE / 16;

/// Sizing parameters for a `BlockPool` and the arenas it hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Size in bytes of every pooled block.
    pub block_size: usize,
    /// Requests larger than this that don't fit in the current block get
    /// their own allocation instead of a fresh block.
    pub big_chunk_threshold: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            block_size: DEFAULT_BLOCK_SIZE,
            big_chunk_threshold: DEFAULT_BIG_CHUNK_THRESHOLD,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.block_size == 0 {
            bail!("block_size must be non-zero");
        }
        if self.block_size % BLOCK_ALIGN != 0 {
            bail!(
                "block_size {} must be a multiple of {}",
                self.block_size,
                BLOCK_ALIGN
            );
        }
        if self.big_chunk_threshold >= self.block_size {
            bail!(
                "big_chunk_threshold {} must be smaller than block_size {}",
                self.big_chunk_threshold,
                self.block_size
            );
        }
        Ok(())
    }

    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let config: PoolConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    // Loads the config stored at `path`. If there is nothing there yet, the
    // default config is written out and returned.
    pub fn load<P>(path: P) -> anyhow::Result<Self>
    where
        P: AsRef<Path>,
    {
        match fs::read_to_string(path.as_ref()) {
            Ok(contents) => Self::from_json(contents.as_str()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.save(path)?;
                Ok(config)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save<P>(&self, path: P) -> anyhow::Result<()>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let tmp_path = Self::tmp_path(path);
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(&tmp_path)?;
        let encoded = serde_json::to_string_pretty(self)?;
        file.write_all(encoded.as_bytes())?;
        file.sync_all()?;

        fs::rename(tmp_path, path)?;
        Ok(())
    }

    fn tmp_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        path.with_file_name(name)
    }
}
