use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tablelink_core::DeviceId;
use tracing::info;

/// Device id persisted on disk so a device keeps its identity across sessions.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    device_id: DeviceId,
    path: PathBuf,
}

impl DeviceIdentity {
    pub async fn load_or_create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        match tokio::fs::read_to_string(&path).await {
            Ok(contents) if !contents.trim().is_empty() => {
                return Ok(Self {
                    device_id: DeviceId::from(contents.trim()),
                    path,
                });
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("reading identity {}", path.display()));
            }
        }

        let device_id = DeviceId::generate();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(&path, device_id.as_str())
            .await
            .with_context(|| format!("writing identity {}", path.display()))?;
        info!(device_id = %device_id, path = %path.display(), "generated new device identity");

        Ok(Self { device_id, path })
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
