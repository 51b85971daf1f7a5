//! System property access and polling.
//!
//! Properties are read through the [`PropertyReader`] trait so that the
//! session can be driven by `getprop` on a device and by a fixed table in
//! tests or on hosts without a property service.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Read access to system properties.
pub trait PropertyReader: Send + Sync + 'static {
    /// Current value of `name`, or `None` when the property is unset.
    fn get(&self, name: &str) -> impl Future<Output = Option<String>> + Send;

    /// Property interpreted as a boolean, falling back to `default` when
    /// unset or unrecognized.
    fn get_bool(&self, name: &str, default: bool) -> impl Future<Output = bool> + Send {
        async move {
            self.get(name)
                .await
                .and_then(|value| parse_bool(&value))
                .unwrap_or(default)
        }
    }
}

/// Boolean property parsing.
///
/// Accepts `1 y yes on true` and `0 n no off false`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "y" | "yes" | "on" | "true" => Some(true),
        "0" | "n" | "no" | "off" | "false" => Some(false),
        _ => None,
    }
}

/// Reads properties by running `getprop <name>`.
#[derive(Debug, Clone)]
pub struct GetpropReader {
    getprop_path: PathBuf,
}

impl GetpropReader {
    pub fn new(getprop_path: impl Into<PathBuf>) -> Self {
        Self {
            getprop_path: getprop_path.into(),
        }
    }
}

impl PropertyReader for GetpropReader {
    async fn get(&self, name: &str) -> Option<String> {
        let output = match Command::new(&self.getprop_path)
            .arg(name)
            .kill_on_drop(true)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!(
                    getprop = %self.getprop_path.display(),
                    property = name,
                    error = %e,
                    "getprop failed"
                );
                return None;
            }
        };

        let value = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        (!value.is_empty()).then_some(value)
    }
}

/// Fixed, in-memory property table.
///
/// Values can be changed while a session is running, which is how tests
/// flip stop conditions.
#[derive(Debug, Default)]
pub struct StaticProperties {
    values: Mutex<HashMap<String, String>>,
}

impl StaticProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`.
    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value.into());
    }

    /// Removes `name`.
    pub fn unset(&self, name: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }
}

impl<K, V> FromIterator<(K, V)> for StaticProperties
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: Mutex::new(
                iter.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl PropertyReader for StaticProperties {
    async fn get(&self, name: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

/// Polls `name` every `interval` until it equals `expected`.
///
/// Returns `false` if `cancel` fires first.
pub async fn wait_for_property<P: PropertyReader>(
    reader: &P,
    name: &str,
    expected: &str,
    interval: Duration,
    cancel: &CancellationToken,
) -> bool {
    loop {
        if reader.get(name).await.as_deref() == Some(expected) {
            tracing::debug!(property = name, value = expected, "property condition met");
            return true;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
