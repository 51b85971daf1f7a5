//! AVC 레코드 파싱 에러 타입
//!
//! 파싱 에러는 라인 단위로 복구 가능합니다. 호출자는 진단 로그를 남기고
//! 해당 라인만 버린 뒤 계속 진행합니다.

/// 거부 레코드 파싱 실패 사유
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DenialParseError {
    /// `avc:` 마커가 없음
    #[error("missing '{marker}' marker")]
    MissingMarker {
        /// 찾으려던 마커
        marker: &'static str,
    },

    /// 마커 뒤에 상태 토큰이 없음
    #[error("missing ACL status after marker")]
    MissingStatus,

    /// `granted`/`denied` 이외의 상태
    #[error("unknown ACL status '{0}'")]
    UnknownStatus(String),

    /// 권한 목록을 여는 `{`가 없음
    #[error("expected '{{' before operations, found {found:?}")]
    MissingOperations {
        /// 실제로 만난 토큰
        found: Option<String>,
    },

    /// 닫는 `}` 전에 라인이 끝남
    #[error("operation list is not terminated by '}}'")]
    UnterminatedOperations,

    /// 필수 키 누락
    #[error("missing required keys: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// `permissive` 값이 0 또는 1이 아님
    #[error("invalid permissive status '{0}'")]
    InvalidPermissive(String),
}
