//! 로그 라인 소스
//!
//! - 파일: `/proc/kmsg` (커널 링 버퍼). 읽을 데이터가 없으면 블록됩니다.
//! - 명령: `/system/bin/logcat` 등. 표준 출력을 라인 단위로 읽습니다.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::fs::File;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::process::{Child, Command};

use crate::error::LogPipelineError;

/// 테일러 하나가 읽는 로그 소스
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSource {
    /// 파일을 열어 끝까지 읽음
    File { name: String, path: PathBuf },
    /// 자식 프로세스를 띄우고 표준 출력을 읽음
    Command {
        name: String,
        program: String,
        args: Vec<String>,
    },
}

impl LogSource {
    /// 커널 메시지 소스 (`dmesg`)
    pub fn kmsg(path: impl Into<PathBuf>) -> Self {
        Self::File {
            name: "dmesg".to_owned(),
            path: path.into(),
        }
    }

    /// 사용자 공간 로그 소스 (`logcat`)
    ///
    /// `command`의 첫 요소가 실행 파일, 나머지는 인자입니다.
    pub fn logcat(command: &[String]) -> Result<Self, LogPipelineError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| LogPipelineError::Source {
                name: "logcat".to_owned(),
                reason: "empty command".to_owned(),
            })?;
        Ok(Self::Command {
            name: "logcat".to_owned(),
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// 소스 이름. 출력 파일 이름으로 사용됩니다.
    pub fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Command { name, .. } => name,
        }
    }

    /// 소스를 엽니다.
    pub async fn open(&self) -> Result<SourceStream, LogPipelineError> {
        match self {
            Self::File { name, path } => {
                let file = File::open(path)
                    .await
                    .map_err(|e| LogPipelineError::Source {
                        name: name.clone(),
                        reason: format!("failed to open {}: {e}", path.display()),
                    })?;
                Ok(SourceStream {
                    reader: Box::new(BufReader::new(file)),
                    child: None,
                })
            }
            Self::Command {
                name,
                program,
                args,
            } => {
                let mut child = Command::new(program)
                    .args(args)
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .spawn()
                    .map_err(|e| LogPipelineError::Source {
                        name: name.clone(),
                        reason: format!("failed to spawn {program}: {e}"),
                    })?;
                let stdout = child.stdout.take().ok_or_else(|| LogPipelineError::Source {
                    name: name.clone(),
                    reason: "child stdout unavailable".to_owned(),
                })?;
                tracing::debug!(source = %name, program = %program, pid = ?child.id(), "spawned log command");
                Ok(SourceStream {
                    reader: Box::new(BufReader::new(stdout)),
                    child: Some(child),
                })
            }
        }
    }
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { name, path } => write!(f, "{name} ({})", path.display()),
            Self::Command { name, program, .. } => write!(f, "{name} ({program})"),
        }
    }
}

/// 열린 소스. 명령 소스라면 자식 프로세스를 함께 소유합니다.
pub struct SourceStream {
    reader: Box<dyn AsyncBufRead + Send + Unpin>,
    child: Option<Child>,
}

impl SourceStream {
    /// 라인 리더
    pub fn reader(&mut self) -> &mut (dyn AsyncBufRead + Send + Unpin + 'static) {
        self.reader.as_mut()
    }

    /// 자식 프로세스를 종료하고 회수합니다.
    pub async fn shutdown(self) {
        let Some(mut child) = self.child else {
            return;
        };
        if let Err(e) = child.kill().await {
            tracing::debug!(error = %e, "log command already exited");
        }
    }
}

impl fmt::Debug for SourceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceStream")
            .field("child", &self.child.as_ref().and_then(Child::id))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncBufReadExt;

    #[test]
    fn logcat_splits_program_and_args() {
        let command = vec![
            "/system/bin/logcat".to_owned(),
            "-b".to_owned(),
            "all".to_owned(),
        ];
        let source = LogSource::logcat(&command).unwrap();

        assert_eq!(
            source,
            LogSource::Command {
                name: "logcat".to_owned(),
                program: "/system/bin/logcat".to_owned(),
                args: vec!["-b".to_owned(), "all".to_owned()],
            }
        );
        assert_eq!(source.name(), "logcat");
    }

    #[test]
    fn logcat_rejects_empty_command() {
        let err = LogSource::logcat(&[]).unwrap_err();
        assert!(matches!(err, LogPipelineError::Source { .. }));
    }

    #[test]
    fn kmsg_is_named_dmesg() {
        let source = LogSource::kmsg("/proc/kmsg");
        assert_eq!(source.name(), "dmesg");
        assert_eq!(source.to_string(), "dmesg (/proc/kmsg)");
    }

    #[tokio::test]
    async fn file_source_reads_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kmsg");
        std::fs::write(&path, "one\ntwo\n").unwrap();

        let mut stream = LogSource::kmsg(&path).open().await.unwrap();
        let mut lines = Vec::new();
        let mut buf = String::new();
        while stream.reader().read_line(&mut buf).await.unwrap() > 0 {
            lines.push(buf.trim_end().to_owned());
            buf.clear();
        }
        stream.shutdown().await;

        assert_eq!(lines, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn missing_file_is_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LogSource::kmsg(dir.path().join("missing"))
            .open()
            .await
            .unwrap_err();
        assert!(matches!(err, LogPipelineError::Source { ref name, .. } if name == "dmesg"));
    }

    #[tokio::test]
    async fn missing_program_is_source_error() {
        let command = vec!["/nonexistent/bootlogger-test-logcat".to_owned()];
        let err = LogSource::logcat(&command)
            .unwrap()
            .open()
            .await
            .unwrap_err();
        assert!(matches!(err, LogPipelineError::Source { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_source_reads_stdout() {
        let command = vec![
            "/bin/sh".to_owned(),
            "-c".to_owned(),
            "echo hello; echo world".to_owned(),
        ];
        let mut stream = LogSource::logcat(&command).unwrap().open().await.unwrap();

        let mut out = String::new();
        let mut buf = String::new();
        while stream.reader().read_line(&mut buf).await.unwrap() > 0 {
            out.push_str(&buf);
            buf.clear();
        }
        stream.shutdown().await;

        assert_eq!(out, "hello\nworld\n");
    }
}
