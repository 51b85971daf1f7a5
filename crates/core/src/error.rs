//! 도메인별 에러 타입

/// Bootlogger 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum BootloggerError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 수집 파이프라인 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 수집 파이프라인 에러
///
/// 세션 시작 전에 발생하면 프로세스 종료 사유가 됩니다.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 출력 디렉토리 준비 실패
    #[error("output directory '{path}' unusable: {reason}")]
    OutputDir { path: String, reason: String },

    /// 필수 출력 파일 열기 실패
    #[error("mandatory sink '{path}' failed to open: {reason}")]
    SinkOpen { path: String, reason: String },

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}
