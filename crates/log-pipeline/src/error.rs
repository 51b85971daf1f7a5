//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 소스 열기, 싱크 열기/쓰기, 필터 초기화 중 발생하는 에러입니다.
//! 라인 단위 파싱 실패는 여기에 포함되지 않습니다 (테일러 밖으로 전파되지 않음).
//! `From<LogPipelineError> for BootloggerError` 변환으로 데몬에서 `?`로 전파합니다.

use std::path::PathBuf;

use bootlogger_core::error::{BootloggerError, PipelineError};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 출력 싱크 생성/쓰기 실패
    #[error("sink error: {path}: {source}")]
    Sink {
        /// 싱크 파일 경로
        path: PathBuf,
        /// 원인 I/O 에러
        #[source]
        source: std::io::Error,
    },

    /// 로그 소스 열기 실패
    #[error("source error: {name}: {reason}")]
    Source {
        /// 소스 이름 (dmesg, logcat)
        name: String,
        /// 실패 사유
        reason: String,
    },

    /// 필터 정규식 컴파일 실패
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 테일러 태스크 조인 실패 (패닉 등)
    #[error("tailer task failed: {0}")]
    Join(String),
}

impl From<LogPipelineError> for BootloggerError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Sink { path, source } => {
                BootloggerError::Pipeline(PipelineError::SinkOpen {
                    path: path.display().to_string(),
                    reason: source.to_string(),
                })
            }
            LogPipelineError::Io(e) => BootloggerError::Io(e),
            other => BootloggerError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
