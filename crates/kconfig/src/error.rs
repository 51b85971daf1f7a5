//! 커널 설정 읽기 에러

use std::path::PathBuf;

/// 커널 설정 읽기 실패
///
/// 라인 단위 분류 실패는 에러가 아닙니다. 경고 로그와
/// [`KernelConfig::unparsable_lines`](crate::KernelConfig::unparsable_lines)로만 드러납니다.
#[derive(Debug, thiserror::Error)]
pub enum KernelConfigError {
    /// 파일을 열 수 없음
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// gzip 스트림이 손상되었거나 읽기 도중 실패
    #[error("failed to decompress {path}: {source}")]
    Decompress {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
