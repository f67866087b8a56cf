use std::path::PathBuf;

use zbus::interface;

use crate::engine::{EngineError, EngineHandle};

pub const BUS_NAME: &str = "org.freedesktop.Proctor1";
pub const OBJECT_PATH: &str = "/org/freedesktop/Proctor1";

/// D-Bus interface for the proctor daemon.
///
/// Bus name: org.freedesktop.Proctor1
/// Object path: /org/freedesktop/Proctor1
pub struct ProctorService {
    pub engine: EngineHandle,
}

fn failed(e: EngineError) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(e.to_string())
}

#[interface(name = "org.freedesktop.Proctor1")]
impl ProctorService {
    /// Start capture if stopped, stop it if running. Returns the new state.
    async fn toggle(&self) -> zbus::fdo::Result<bool> {
        tracing::info!("toggle requested");
        let running = self.engine.toggle().await.map_err(|e| {
            tracing::warn!(error = %e, "toggle failed");
            failed(e)
        })?;
        tracing::info!(running, "capture state changed");
        Ok(running)
    }

    async fn start(&self) -> zbus::fdo::Result<bool> {
        tracing::info!("start requested");
        self.engine.set_running(true).await.map_err(|e| {
            tracing::warn!(error = %e, "start failed");
            failed(e)
        })
    }

    async fn stop(&self) -> zbus::fdo::Result<bool> {
        tracing::info!("stop requested");
        self.engine.set_running(false).await.map_err(failed)
    }

    /// Embed the image at `path` and use it as the identity baseline.
    async fn upload_reference(&self, path: &str) -> zbus::fdo::Result<bool> {
        tracing::info!(path, "reference upload requested");
        if path.is_empty() {
            return Err(zbus::fdo::Error::InvalidArgs("empty path".to_string()));
        }
        self.engine
            .upload_reference(PathBuf::from(path))
            .await
            .map_err(failed)?;
        tracing::info!(path, "reference embedding stored");
        Ok(true)
    }

    /// The activity log as JSON, newest entry first.
    async fn log(&self) -> zbus::fdo::Result<String> {
        let log = self.engine.log().await.map_err(failed)?;
        serde_json::to_string(&log).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Blend-shape scores of the most recent frame as JSON.
    async fn blend_shapes(&self) -> zbus::fdo::Result<String> {
        let rows = self.engine.blend_shapes().await.map_err(failed)?;
        serde_json::to_string(&rows).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Return daemon status information as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let status = self.engine.status().await.map_err(failed)?;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "engine": status,
        })
        .to_string())
    }
}
