//! 라인 필터 trait

/// 로그 라인 필터
///
/// 새로운 분류 규칙을 추가하려면 이 trait을 구현합니다.
/// 하나의 필터 인스턴스는 여러 테일러 태스크에서 동시에 호출되므로,
/// 내부 상태가 있다면 구현체가 직접 동기화해야 합니다.
pub trait LineFilter: Send + Sync {
    /// 필터 이름 (전용 출력 파일 이름의 접두어로 사용되므로 유효한 파일 이름이어야 함)
    fn name(&self) -> &str;

    /// 라인이 이 필터에 해당하는지 판정합니다.
    ///
    /// 상태가 있는 필터는 매칭 과정에서 공유 상태를 갱신할 수 있습니다.
    fn matches(&self, line: &str) -> bool;
}
