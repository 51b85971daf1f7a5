//! `/proc/config.gz` 읽기와 감사 게이트

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::KernelConfigError;
use crate::table::KernelConfig;

/// gzip으로 압축된 커널 설정을 읽어 분류합니다.
///
/// 블로킹 I/O입니다. 비동기 문맥에서는 `spawn_blocking`으로 호출하세요.
pub fn read_config_gz(path: impl AsRef<Path>) -> Result<KernelConfig, KernelConfigError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| KernelConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config = KernelConfig::from_reader(BufReader::new(GzDecoder::new(file))).map_err(
        |source| KernelConfigError::Decompress {
            path: path.to_path_buf(),
            source,
        },
    )?;

    tracing::debug!(
        path = %path.display(),
        symbols = config.len(),
        "kernel config loaded"
    );
    Ok(config)
}

/// `symbol`이 빌트인으로 켜져 있는지 확인합니다.
///
/// 설정을 읽지 못하면 경고를 남기고 `false`를 반환합니다.
pub fn audit_available(path: impl AsRef<Path>, symbol: &str) -> bool {
    let path = path.as_ref();
    match read_config_gz(path) {
        Ok(config) => {
            let available = config.is_builtin(symbol);
            tracing::info!(symbol, available, "audit subsystem check");
            available
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "kernel config unavailable, assuming audit is not compiled in"
            );
            false
        }
    }
}
