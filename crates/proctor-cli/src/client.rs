//! D-Bus client commands against a running proctord.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

#[zbus::proxy(
    interface = "org.freedesktop.Proctor1",
    default_service = "org.freedesktop.Proctor1",
    default_path = "/org/freedesktop/Proctor1"
)]
pub trait Proctor {
    fn toggle(&self) -> zbus::Result<bool>;
    fn start(&self) -> zbus::Result<bool>;
    fn stop(&self) -> zbus::Result<bool>;
    fn upload_reference(&self, path: &str) -> zbus::Result<bool>;
    fn log(&self) -> zbus::Result<String>;
    fn blend_shapes(&self) -> zbus::Result<String>;
    fn status(&self) -> zbus::Result<String>;
}

pub async fn connect(session_bus: bool) -> Result<ProctorProxy<'static>> {
    let conn = if session_bus {
        zbus::Connection::session().await
    } else {
        zbus::Connection::system().await
    }
    .context("failed to connect to D-Bus")?;

    ProctorProxy::new(&conn)
        .await
        .context("proctord is not reachable on D-Bus")
}

fn print_running(running: bool) {
    println!("{}", if running { "running" } else { "stopped" });
}

pub async fn toggle(proxy: &ProctorProxy<'_>) -> Result<()> {
    print_running(proxy.toggle().await?);
    Ok(())
}

pub async fn start(proxy: &ProctorProxy<'_>) -> Result<()> {
    print_running(proxy.start().await?);
    Ok(())
}

pub async fn stop(proxy: &ProctorProxy<'_>) -> Result<()> {
    print_running(proxy.stop().await?);
    Ok(())
}

pub async fn upload(proxy: &ProctorProxy<'_>, path: &Path) -> Result<()> {
    // The daemon resolves paths against its own working directory
    let path = std::fs::canonicalize(path)
        .with_context(|| format!("reference image not found: {}", path.display()))?;
    let path = path
        .to_str()
        .context("reference image path is not valid UTF-8")?;
    proxy.upload_reference(path).await?;
    println!("reference stored: {path}");
    Ok(())
}

pub async fn log(proxy: &ProctorProxy<'_>, json: bool) -> Result<()> {
    let raw = proxy.log().await?;
    if json {
        println!("{raw}");
        return Ok(());
    }
    for line in log_lines(&raw)? {
        println!("{line}");
    }
    Ok(())
}

pub async fn blend_shapes(proxy: &ProctorProxy<'_>) -> Result<()> {
    for line in blend_shape_lines(&proxy.blend_shapes().await?)? {
        println!("{line}");
    }
    Ok(())
}

pub async fn status(proxy: &ProctorProxy<'_>) -> Result<()> {
    let status: Value =
        serde_json::from_str(&proxy.status().await?).context("malformed status reply")?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

/// Render a `Log` reply, one entry per line.
fn log_lines(raw: &str) -> Result<Vec<String>> {
    let entries: Value = serde_json::from_str(raw).context("malformed log reply")?;
    let entries = entries.as_array().context("log reply is not a list")?;
    if entries.is_empty() {
        return Ok(vec!["(log is empty)".to_string()]);
    }
    Ok(entries
        .iter()
        .map(|entry| {
            let at = entry["logged_at"].as_str().unwrap_or("-");
            let message = entry["message"].as_str().unwrap_or_default();
            format!("{at}  {message}")
        })
        .collect())
}

/// Render a `BlendShapes` reply as a two-column table.
fn blend_shape_lines(raw: &str) -> Result<Vec<String>> {
    let rows: Value = serde_json::from_str(raw).context("malformed blend-shape reply")?;
    let rows = rows.as_array().context("blend-shape reply is not a list")?;
    if rows.is_empty() {
        return Ok(vec!["(no face in the latest frame)".to_string()]);
    }
    Ok(rows
        .iter()
        .map(|row| {
            format!(
                "{:<24} {}",
                row["label"].as_str().unwrap_or_default(),
                row["display"].as_str().unwrap_or_default()
            )
        })
        .collect())
}
