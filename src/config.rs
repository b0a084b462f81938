//! Store configuration
//!
//! 환경 변수와 `.env.local`에서 저장소 설정을 읽는다.

use std::path::{Path, PathBuf};

use crate::db::slots::DEFAULT_SLOT_COUNT;

pub const ENV_FILE: &str = ".env.local";
pub const DEFAULT_DB_FILE: &str = "trpg.db";
pub const DEFAULT_LOG_FILTER: &str = "info";

const DEFAULT_DATA_DIR: &str = "trpg-data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub db_file_name: String,
    pub initial_slot_count: u32,
    pub log_filter: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            db_file_name: DEFAULT_DB_FILE.to_string(),
            initial_slot_count: DEFAULT_SLOT_COUNT,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl StoreConfig {
    /// `.env.local`을 읽은 뒤 프로세스 환경 변수로 설정 구성
    pub fn from_env() -> Self {
        load_env_file();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 조회 함수로 설정 구성. 비어 있거나 잘못된 값은 기본값 유지
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(dir) = get("TRPG_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(file) = get("TRPG_DB_FILE") {
            config.db_file_name = file;
        }
        if let Some(raw) = get("TRPG_INITIAL_SLOTS") {
            match raw.parse::<u32>() {
                Ok(n) => config.initial_slot_count = n,
                Err(_) => log::warn!("Ignoring invalid TRPG_INITIAL_SLOTS: {}", raw),
            }
        }
        if let Some(filter) = get("TRPG_LOG") {
            config.log_filter = filter;
        }
        config
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file_name)
    }

    /// 안전 가져오기 전 백업 위치
    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }
}

fn is_valid_env_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|q| value.strip_prefix(*q)?.strip_suffix(*q))
        .unwrap_or(value)
}

/// `[export ]KEY=VALUE` 한 줄 해석. 주석, 코드펜스, 설명 문장은 None
fn parse_env_line(raw: &str) -> Option<(&str, &str)> {
    let line = raw.trim();
    if line.starts_with('#') || line.starts_with("```") {
        return None;
    }
    let line = line.strip_prefix("export ").map_or(line, str::trim_start);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    is_valid_env_key(key).then(|| (key, unquote(value.trim())))
}

/// strict 파서가 거부한 파일(마크다운 섞인 `.env.local` 등)에서 쓸 수 있는
/// 줄만 골라 설정한다. 비어 있지 않은 기존 값은 그대로 둔다. 설정한 키 수 반환
fn try_load_env_lenient(path: &Path) -> std::io::Result<usize> {
    let text = std::fs::read_to_string(path)?;
    let pairs = text.lines().filter_map(parse_env_line).filter(|(key, _)| {
        std::env::var(key).map_or(true, |existing| existing.trim().is_empty())
    });

    let mut loaded = 0usize;
    for (key, value) in pairs {
        std::env::set_var(key, value);
        loaded += 1;
    }
    Ok(loaded)
}

/// start부터 부모 디렉터리로 올라가며 filename 탐색
fn find_upwards(start: PathBuf, filename: &str, max_hops: usize) -> Option<PathBuf> {
    start
        .ancestors()
        .take(max_hops + 1)
        .map(|dir| dir.join(filename))
        .find(|candidate| candidate.exists())
}

/// `.env.local` 로드. 없으면 아무것도 하지 않는다
fn load_env_file() {
    let mut candidates: Vec<PathBuf> = vec![];
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_upwards(cwd, ENV_FILE, 6) {
            candidates.push(p);
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(p) = exe.parent().and_then(|dir| find_upwards(dir.to_path_buf(), ENV_FILE, 8)) {
            candidates.push(p);
        }
    }

    for p in candidates {
        if dotenvy::from_path(&p).is_ok() {
            log::debug!("Loaded {}", p.display());
            return;
        }
        // strict 파서가 실패하면 KEY=VALUE 라인만 읽는다
        if let Ok(loaded) = try_load_env_lenient(&p) {
            if loaded > 0 {
                log::debug!("Loaded {} keys leniently from {}", loaded, p.display());
                return;
            }
        }
    }
}
