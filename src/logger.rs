//! Logging
//!
//! `log` 매크로의 출력은 env_logger가 담당한다. 필터는 `TRPG_LOG` 형식
//! (`info`, `trpg_store_lib=debug` 등)을 따른다.

use env_logger::{Builder, Env};

/// 로거 초기화. 이미 초기화되어 있으면 false
pub fn init_logging(filter: &str) -> bool {
    let initialized = Builder::from_env(Env::default().default_filter_or(filter))
        .format_timestamp_millis()
        .try_init()
        .is_ok();
    if initialized {
        log::info!("Logging initialized with filter: {}", filter);
    }
    initialized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        let _ = init_logging("debug");
        assert!(!init_logging("info"));
    }
}
