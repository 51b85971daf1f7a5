//! 커널 설정 라인 분류와 심볼 테이블
//!
//! ```text
//! CONFIG_AUDIT=y                 -> BuiltIn
//! CONFIG_EXT4_FS=m               -> Module
//! CONFIG_CMDLINE="console=ttyS0" -> String
//! CONFIG_HZ=250                  -> Int
//! # CONFIG_KASAN is not set      -> Unset
//! ```

use std::collections::HashMap;
use std::io::{self, BufRead};

const SYMBOL_PREFIX: &str = "CONFIG_";
const UNSET_PREFIX: &str = "# ";
const UNSET_SUFFIX: &str = " is not set";

/// 설정 심볼 하나의 값 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigValue {
    /// `=y`
    BuiltIn,
    /// `=m`
    Module,
    /// `="..."`
    String,
    /// `=123`, `=-1`, `=0x10`
    Int,
    /// `# CONFIG_X is not set`
    Unset,
    /// 그 외 값
    Unknown,
}

impl ConfigValue {
    /// `=` 뒤의 값을 첫 글자로 분류합니다.
    fn classify(value: &str) -> Self {
        match value.as_bytes().first() {
            Some(b'y') => Self::BuiltIn,
            Some(b'm') => Self::Module,
            Some(b'"') => Self::String,
            Some(b'-' | b'0'..=b'9') => Self::Int,
            _ => Self::Unknown,
        }
    }
}

/// 한 줄의 분류 결과
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Symbol(&'a str, ConfigValue),
    /// 빈 줄 또는 주석
    Ignored,
    Unparsable,
}

fn is_symbol(name: &str) -> bool {
    name.strip_prefix(SYMBOL_PREFIX).is_some_and(|rest| {
        !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
    })
}

fn classify_line(line: &str) -> Line<'_> {
    if line.is_empty() {
        return Line::Ignored;
    }

    if let Some((name, value)) = line.split_once('=') {
        if is_symbol(name) {
            return Line::Symbol(name, ConfigValue::classify(value));
        }
    }

    if let Some(name) = line
        .strip_prefix(UNSET_PREFIX)
        .and_then(|rest| rest.strip_suffix(UNSET_SUFFIX))
    {
        if is_symbol(name) {
            return Line::Symbol(name, ConfigValue::Unset);
        }
    }

    if line.starts_with('#') {
        Line::Ignored
    } else {
        Line::Unparsable
    }
}

/// 설정 심볼 이름(`CONFIG_` 접두사 포함) -> 값 분류
#[derive(Debug, Clone, Default)]
pub struct KernelConfig {
    symbols: HashMap<String, ConfigValue>,
    unparsable: usize,
}

impl KernelConfig {
    /// 설정 텍스트 전체를 분류합니다.
    pub fn parse(text: &str) -> Self {
        let mut config = Self::default();
        for line in text.lines() {
            config.insert_line(line);
        }
        config
    }

    /// 라인 단위로 읽으면서 분류합니다. UTF-8이 아닌 바이트는 대체 문자로 바꿉니다.
    pub fn from_reader<R: BufRead>(mut reader: R) -> io::Result<Self> {
        let mut config = Self::default();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            config.insert_line(line.trim_end_matches(['\n', '\r']));
        }

        if config.unparsable > 0 {
            tracing::warn!(
                unparsable = config.unparsable,
                "kernel config contained unparsable lines"
            );
        }
        Ok(config)
    }

    fn insert_line(&mut self, line: &str) {
        match classify_line(line) {
            Line::Symbol(name, value) => {
                if value == ConfigValue::Unknown {
                    tracing::warn!(line, "unknown kernel config value");
                }
                self.symbols.insert(name.to_owned(), value);
            }
            Line::Ignored => {}
            Line::Unparsable => {
                tracing::warn!(line, "unparsable kernel config line");
                self.unparsable += 1;
            }
        }
    }

    /// 심볼의 분류를 조회합니다. 없으면 `None`.
    pub fn get(&self, symbol: &str) -> Option<ConfigValue> {
        self.symbols.get(symbol).copied()
    }

    pub fn is_builtin(&self, symbol: &str) -> bool {
        self.get(symbol) == Some(ConfigValue::BuiltIn)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// 분류하지 못한 라인 수
    pub fn unparsable_lines(&self) -> usize {
        self.unparsable
    }
}
