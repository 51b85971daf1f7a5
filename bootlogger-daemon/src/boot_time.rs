//! Boot duration record.
//!
//! When a boot session sees boot completion, the system uptime is written
//! to the kernel log as `bootlogger: Boot completed in <M>m <S>s` so it lands
//! in the captured kernel stream.

use std::path::Path;

use tokio::io::AsyncWriteExt;

/// Kernel uptime source. The first field is seconds since boot.
pub const UPTIME_PATH: &str = "/proc/uptime";

/// Formats an uptime as the boot-completion record.
///
/// Minutes are omitted when zero.
pub fn format_boot_time(uptime_secs: u64) -> String {
    let (minutes, seconds) = (uptime_secs / 60, uptime_secs % 60);
    if minutes > 0 {
        format!("bootlogger: Boot completed in {minutes}m {seconds}s")
    } else {
        format!("bootlogger: Boot completed in {seconds}s")
    }
}

/// Parses whole seconds out of `/proc/uptime` contents.
pub fn parse_uptime(contents: &str) -> Option<u64> {
    let field = contents.split_whitespace().next()?;
    let secs: f64 = field.parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then_some(secs as u64)
}

/// Writes the boot-completion record to `kmsg_device`.
///
/// Best effort: failures are logged and otherwise ignored.
pub async fn record_boot_time(uptime_path: &Path, kmsg_device: &Path) -> Option<u64> {
    let uptime = match tokio::fs::read_to_string(uptime_path).await {
        Ok(contents) => parse_uptime(&contents),
        Err(e) => {
            tracing::warn!(path = %uptime_path.display(), error = %e, "failed to read uptime");
            return None;
        }
    };
    let Some(uptime) = uptime else {
        tracing::warn!(path = %uptime_path.display(), "unparsable uptime");
        return None;
    };

    let record = format_boot_time(uptime);
    tracing::info!(uptime_secs = uptime, "{}", record);

    let written = async {
        let mut device = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(kmsg_device)
            .await?;
        device.write_all(record.as_bytes()).await?;
        device.write_all(b"\n").await?;
        device.flush().await?;
        Ok::<_, std::io::Error>(())
    }
    .await;

    if let Err(e) = written {
        tracing::warn!(device = %kmsg_device.display(), error = %e, "failed to write boot record");
    }
    Some(uptime)
}
