//! bootlogger.toml 파싱 및 런타임 설정
//!
//! [`BootloggerConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`BOOTLOGGER_AUDIT_EXCLUDED_ACTOR=isolated_app` 형식)
//! 3. 설정 파일 (`bootlogger.toml`, 선택)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), bootlogger_core::error::BootloggerError> {
//! use bootlogger_core::config::BootloggerConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = BootloggerConfig::load("bootlogger.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = BootloggerConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{BootloggerError, ConfigError};

/// 시스템 세션 모드를 켜는 환경변수
pub const SYSTEM_MODE_ENV: &str = "LOGGER_MODE_SYSTEM";

/// Bootlogger 통합 설정
///
/// `bootlogger.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootloggerConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 로그 소스 설정
    #[serde(default)]
    pub sources: SourcesConfig,
    /// AVC 수집 및 규칙 생성 설정
    #[serde(default)]
    pub audit: AuditConfig,
    /// 종료 조건(프로퍼티 대기) 설정
    #[serde(default)]
    pub wait: WaitConfig,
    /// 출력 파일 설정
    #[serde(default)]
    pub output: OutputConfig,
}

impl BootloggerConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, BootloggerError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 설정 파일 없이 기본값 + 환경변수 오버라이드로 설정을 만듭니다.
    pub fn from_env() -> Result<Self, BootloggerError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, BootloggerError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BootloggerError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                BootloggerError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, BootloggerError> {
        toml::from_str(toml_str).map_err(|e| {
            BootloggerError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `BOOTLOGGER_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "BOOTLOGGER_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "BOOTLOGGER_GENERAL_LOG_FORMAT");
        override_opt_path(&mut self.general.log_file, "BOOTLOGGER_GENERAL_LOG_FILE");

        // Sources
        override_path(&mut self.sources.kmsg_path, "BOOTLOGGER_SOURCES_KMSG_PATH");
        override_words(
            &mut self.sources.logcat_command,
            "BOOTLOGGER_SOURCES_LOGCAT_COMMAND",
        );
        override_usize(
            &mut self.sources.max_line_length,
            "BOOTLOGGER_SOURCES_MAX_LINE_LENGTH",
        );

        // Audit
        override_path(
            &mut self.audit.kernel_config_path,
            "BOOTLOGGER_AUDIT_KERNEL_CONFIG_PATH",
        );
        override_string(
            &mut self.audit.required_symbol,
            "BOOTLOGGER_AUDIT_REQUIRED_SYMBOL",
        );
        override_string(
            &mut self.audit.excluded_actor,
            "BOOTLOGGER_AUDIT_EXCLUDED_ACTOR",
        );
        override_csv(
            &mut self.audit.excluded_permissions,
            "BOOTLOGGER_AUDIT_EXCLUDED_PERMISSIONS",
        );

        // Wait
        override_path(&mut self.wait.getprop_path, "BOOTLOGGER_WAIT_GETPROP_PATH");
        override_u64(
            &mut self.wait.poll_interval_ms,
            "BOOTLOGGER_WAIT_POLL_INTERVAL_MS",
        );
        override_u64(
            &mut self.wait.boot_settle_secs,
            "BOOTLOGGER_WAIT_BOOT_SETTLE_SECS",
        );

        // Output
        override_usize(
            &mut self.output.flush_threshold_bytes,
            "BOOTLOGGER_OUTPUT_FLUSH_THRESHOLD_BYTES",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), BootloggerError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self
            .general
            .log_file
            .as_ref()
            .is_some_and(|path| path.as_os_str().is_empty())
        {
            return Err(invalid(
                "general.log_file",
                "must not be empty when set".to_owned(),
            ));
        }

        if self.sources.logcat_command.is_empty() {
            return Err(invalid(
                "sources.logcat_command",
                "command must not be empty".to_owned(),
            ));
        }

        if self.sources.max_line_length == 0 {
            return Err(invalid(
                "sources.max_line_length",
                "must be greater than zero".to_owned(),
            ));
        }

        if self.wait.poll_interval_ms == 0 {
            return Err(invalid(
                "wait.poll_interval_ms",
                "must be greater than zero".to_owned(),
            ));
        }

        if self.output.flush_threshold_bytes == 0 {
            return Err(invalid(
                "output.flush_threshold_bytes",
                "must be greater than zero".to_owned(),
            ));
        }

        // 규칙 파일은 출력 디렉토리 안에만 생성
        let rules_file = self.audit.rules_file.as_str();
        if rules_file.is_empty() || rules_file.contains('/') || rules_file == ".." {
            return Err(invalid(
                "audit.rules_file",
                "must be a bare file name".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> BootloggerError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 세션 모드
///
/// 부팅 직후 로그를 수집하는 `Boot` 모드와, 프로퍼티로 켜고 끄는
/// `System` 모드가 있습니다. 모드에 따라 출력 하위 디렉토리와 종료 조건이 달라집니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// 부팅 완료까지 수집
    Boot,
    /// 로거 활성화 프로퍼티가 꺼질 때까지 수집
    System,
}

impl SessionMode {
    /// `LOGGER_MODE_SYSTEM` 환경변수 존재 여부로 모드를 결정합니다.
    pub fn from_env() -> Self {
        if std::env::var_os(SYSTEM_MODE_ENV).is_some() {
            Self::System
        } else {
            Self::Boot
        }
    }

    /// 출력 루트 아래 하위 디렉토리 이름
    pub fn subdir(self) -> &'static str {
        match self {
            Self::Boot => "boot",
            Self::System => "system",
        }
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데몬 로그를 이어 쓸 파일. 없으면 stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            log_file: None,
        }
    }
}

/// 로그 소스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// 커널 메시지 스트림 경로
    pub kmsg_path: PathBuf,
    /// logcat 실행 커맨드 (프로그램 + 인자)
    pub logcat_command: Vec<String>,
    /// 참이면 logd가 커널 로그를 logcat으로 전달하므로 kmsg를 따로 수집하지 않음
    pub kernel_forwarded_property: String,
    /// 한 번에 읽는 최대 바이트 수, 더 긴 라인은 조각으로 나뉨
    pub max_line_length: usize,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            kmsg_path: PathBuf::from("/proc/kmsg"),
            logcat_command: vec!["/system/bin/logcat".to_owned()],
            kernel_forwarded_property: "ro.logd.kernel".to_owned(),
            max_line_length: 64 * 1024,
        }
    }
}

/// AVC 수집 및 규칙 생성 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// gzip 압축된 커널 빌드 설정 경로
    pub kernel_config_path: PathBuf,
    /// AVC 필터 설치 조건이 되는 커널 설정 심볼
    pub required_symbol: String,
    /// 이 토큰을 포함한 거부 라인은 수집하지 않음
    pub excluded_actor: String,
    /// 이 권한을 포함한 레코드는 규칙으로 출력하지 않음
    pub excluded_permissions: Vec<String>,
    /// 생성된 규칙 파일 이름 (`.txt` 자동 추가)
    pub rules_file: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            kernel_config_path: PathBuf::from("/proc/config.gz"),
            required_symbol: "CONFIG_AUDIT".to_owned(),
            excluded_actor: "untrusted_app".to_owned(),
            excluded_permissions: vec!["sys_admin".to_owned()],
            rules_file: "sepolicy.gen".to_owned(),
        }
    }
}

/// 종료 조건(프로퍼티 대기) 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// 프로퍼티 조회 도구 경로
    pub getprop_path: PathBuf,
    /// 프로퍼티 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// Boot 모드에서 `1`이 되기를 기다리는 프로퍼티
    pub boot_completed_property: String,
    /// 부팅 완료 후 남은 라인을 받기 위한 대기 시간 (초)
    pub boot_settle_secs: u64,
    /// System 모드에서 `false`가 되기를 기다리는 프로퍼티
    pub system_enabled_property: String,
    /// 부팅 소요 시간을 기록할 커널 로그 장치
    pub kmsg_device: PathBuf,
}

impl WaitConfig {
    /// 폴링 주기를 `Duration`으로 반환합니다.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 부팅 완료 후 대기 시간을 `Duration`으로 반환합니다.
    pub fn boot_settle(&self) -> Duration {
        Duration::from_secs(self.boot_settle_secs)
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            getprop_path: PathBuf::from("/system/bin/getprop"),
            poll_interval_ms: 500,
            boot_completed_property: "sys.boot_completed".to_owned(),
            boot_settle_secs: 3,
            system_enabled_property: "persist.ext.logdump.enabled".to_owned(),
            kmsg_device: PathBuf::from("/dev/kmsg"),
        }
    }
}

/// 출력 파일 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// 이 바이트 수만큼 쓰이면 flush
    pub flush_threshold_bytes: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            flush_threshold_bytes: 4096,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_path(target: &mut PathBuf, env_key: &str) {
    if let Some(val) = std::env::var_os(env_key) {
        *target = PathBuf::from(val);
    }
}

/// 빈 값이면 `None` (stderr로 복귀)
fn override_opt_path(target: &mut Option<PathBuf>, env_key: &str) {
    if let Some(val) = std::env::var_os(env_key) {
        *target = (!val.is_empty()).then(|| PathBuf::from(val));
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

fn override_words(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val.split_whitespace().map(str::to_owned).collect();
    }
}
