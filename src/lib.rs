//! TRPG Store - 로컬 영속 저장소 라이브러리
//!
//! 시나리오, 씬 기록, 카드 로스터, 파티, 세이브 슬롯, 요약을 SQLite에
//! 저장하고, 가챠 추첨과 아카이브 가져오기/내보내기를 제공한다.

pub mod archive;
pub mod cancel;
pub mod compression;
pub mod config;
pub mod db;
pub mod error;
pub mod gacha;
pub mod history;
pub mod logger;
pub mod models;
pub mod roster;

use cancel::RequestCanceller;
use config::StoreConfig;
use db::{Database, DbState};
use error::StoreResult;

/// 앱 전역 상태
pub struct AppContext {
    pub db: DbState,
    pub canceller: RequestCanceller,
    pub config: StoreConfig,
}

impl AppContext {
    /// DB를 열고 초기 슬롯을 준비한다
    pub fn bootstrap(config: StoreConfig) -> StoreResult<Self> {
        let mut db = Database::at_path(&config.db_path());
        db.open()?;
        if db.ensure_initial_slots(config.initial_slot_count)? {
            log::info!("Created {} initial save slots", config.initial_slot_count);
        }

        Ok(Self {
            db: DbState::new(db),
            canceller: RequestCanceller::new(),
            config,
        })
    }

    /// 환경 변수로 설정을 읽고 로거까지 초기화
    pub fn from_env() -> StoreResult<Self> {
        let config = StoreConfig::from_env();
        logger::init_logging(&config.log_filter);
        Self::bootstrap(config)
    }
}
