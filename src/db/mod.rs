//! Database Module
//!
//! SQLite 기반 문서 저장소. 컬렉션마다 `(key, value_json)` 테이블 하나를 두고,
//! 보조 인덱스는 `json_extract` 식 인덱스로 만든다.

pub mod app_state;
pub mod cards;
pub mod kv;
pub mod parties;
pub mod scenarios;
pub mod scene_entries;
pub mod schema;
pub mod slots;
pub mod summaries;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::backup::Backup;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use kv::StoreKey;
use schema::{Collection, DB_VERSION};

/// 데이터베이스 위치
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    Memory,
}

/// 데이터베이스 상태 (앱 컨텍스트에서 공유)
pub struct DbState(pub Mutex<Database>);

impl DbState {
    pub fn new(db: Database) -> Self {
        DbState(Mutex::new(db))
    }

    pub fn lock(&self) -> StoreResult<MutexGuard<'_, Database>> {
        self.0.lock().map_err(|e| StoreError::Lock(e.to_string()))
    }
}

/// 데이터베이스 래퍼
///
/// `open()` 전에는 모든 작업이 `StoreError::Uninitialized`로 실패한다.
pub struct Database {
    location: DbLocation,
    conn: Option<Connection>,
}

impl Database {
    /// 열리지 않은 핸들 생성
    pub fn new(location: DbLocation) -> Self {
        Self { location, conn: None }
    }

    pub fn at_path(path: &Path) -> Self {
        Self::new(DbLocation::File(path.to_path_buf()))
    }

    pub fn in_memory() -> Self {
        Self::new(DbLocation::Memory)
    }

    /// 테스트/부트스트랩용: 메모리 DB를 바로 연다
    pub fn open_in_memory() -> StoreResult<Self> {
        let mut db = Self::in_memory();
        db.open()?;
        Ok(db)
    }

    pub fn location(&self) -> &DbLocation {
        &self.location
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// 연결을 열고 스키마 업그레이드 수행. 이미 열려 있으면 아무 일도 하지 않는다
    pub fn open(&mut self) -> StoreResult<()> {
        if self.conn.is_some() {
            return Ok(());
        }

        let conn = match &self.location {
            DbLocation::File(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Connection::open(path)?
            }
            DbLocation::Memory => Connection::open_in_memory()?,
        };
        conn.busy_timeout(Duration::from_secs(5))?;

        upgrade(&conn)?;
        log::debug!("Database opened: {:?}", self.location);
        self.conn = Some(conn);
        Ok(())
    }

    /// 연결 닫기. 이후 작업은 다시 `Uninitialized`
    pub fn close(&mut self) {
        if self.conn.take().is_some() {
            log::debug!("Database closed: {:?}", self.location);
        }
    }

    pub(crate) fn conn(&self) -> StoreResult<&Connection> {
        self.conn.as_ref().ok_or(StoreError::Uninitialized)
    }

    /// 여러 컬렉션에 걸친 작업을 하나의 트랜잭션으로 실행
    pub(crate) fn in_transaction<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let tx = self.conn()?.unchecked_transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// 현재 스키마 버전
    pub fn schema_version(&self) -> StoreResult<u32> {
        read_user_version(self.conn()?)
    }

    // ---- 범용 Key-Value 연산 ----

    pub fn get(&self, collection: Collection, key: &StoreKey) -> StoreResult<Option<Value>> {
        kv::get(self.conn()?, collection, key)
    }

    pub fn get_all(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        kv::get_all(self.conn()?, collection)
    }

    pub fn get_all_by_index(
        &self,
        collection: Collection,
        index_name: &str,
        value: &dyn rusqlite::ToSql,
    ) -> StoreResult<Vec<Value>> {
        kv::get_all_by_index(self.conn()?, collection, index_name, value)
    }

    pub fn delete_by_index(
        &self,
        collection: Collection,
        index_name: &str,
        value: &dyn rusqlite::ToSql,
    ) -> StoreResult<usize> {
        kv::delete_by_index(self.conn()?, collection, index_name, value)
    }

    pub fn put(&self, collection: Collection, record: &Value) -> StoreResult<StoreKey> {
        kv::put(self.conn()?, collection, record)
    }

    pub fn put_with_key(&self, collection: Collection, key: &StoreKey, record: &Value) -> StoreResult<()> {
        kv::put_with_key(self.conn()?, collection, key, record)
    }

    pub fn add(&self, collection: Collection, record: &Value) -> StoreResult<StoreKey> {
        kv::add(self.conn()?, collection, record)
    }

    pub fn delete(&self, collection: Collection, key: &StoreKey) -> StoreResult<()> {
        kv::delete(self.conn()?, collection, key)
    }

    pub fn clear(&self, collection: Collection) -> StoreResult<()> {
        kv::clear(self.conn()?, collection)
    }

    /// 현재 DB를 SQLite 파일로 백업
    pub fn backup_to_file(&self, out_path: &Path) -> StoreResult<()> {
        let conn = self.conn()?;
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut out_conn = Connection::open(out_path)?;
        let backup = Backup::new(conn, &mut out_conn)?;
        backup.run_to_completion(5, Duration::from_millis(10), None)?;
        log::info!("Database backed up to {}", out_path.display());
        Ok(())
    }
}

fn read_user_version(conn: &Connection) -> StoreResult<u32> {
    let v: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(v.max(0) as u32)
}

/// 누락된 컬렉션/인덱스를 만들고 구버전 데이터를 옮긴다
fn upgrade(conn: &Connection) -> StoreResult<()> {
    let from = read_user_version(conn)?;
    if from > DB_VERSION {
        return Err(StoreError::InvalidOperation(format!(
            "database schema v{} is newer than supported v{}",
            from, DB_VERSION
        )));
    }
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(&schema::create_schema_sql())?;

    if from < DB_VERSION {
        let added: Vec<&str> = Collection::ALL
            .iter()
            .filter(|c| c.spec().since > from)
            .map(|c| c.name())
            .collect();
        log::info!(
            "Upgrading schema v{} -> v{} (new collections: {:?})",
            from,
            DB_VERSION,
            added
        );

        if from > 0 && from < 9 {
            let moved = cards::migrate_character_blob(&tx)?;
            log::info!("Migrated {} cards out of the characterData blob", moved);
        }

        tx.execute_batch(&format!("PRAGMA user_version = {}", DB_VERSION))?;
    }

    tx.commit()?;
    Ok(())
}

/// 모든 시각은 Unix 밀리초
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn to_record<T: Serialize>(value: &T) -> StoreResult<Value> {
    Ok(serde_json::to_value(value)?)
}

pub(crate) fn from_record<T: DeserializeOwned>(value: Value) -> StoreResult<T> {
    Ok(serde_json::from_value(value)?)
}

pub(crate) fn expect_int_key(key: StoreKey) -> StoreResult<i64> {
    key.as_int()
        .ok_or_else(|| StoreError::InvalidOperation(format!("expected integer key, got '{}'", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_operations_before_open_are_uninitialized() {
        let db = Database::in_memory();
        assert!(!db.is_open());
        assert!(matches!(db.get_all(Collection::Scenarios), Err(StoreError::Uninitialized)));
        assert!(matches!(
            db.add(Collection::Parties, &json!({"name": "x"})),
            Err(StoreError::Uninitialized)
        ));
        assert!(matches!(db.clear(Collection::Cards), Err(StoreError::Uninitialized)));
    }

    #[test]
    fn test_open_sets_schema_version_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("trpg.db");

        let mut db = Database::at_path(&path);
        db.open().unwrap();
        db.open().unwrap();
        assert_eq!(db.schema_version().unwrap(), DB_VERSION);
        db.add(Collection::Parties, &json!({"name": "A"})).unwrap();
        db.close();
        assert!(matches!(db.schema_version(), Err(StoreError::Uninitialized)));

        let mut reopened = Database::at_path(&path);
        reopened.open().unwrap();
        assert_eq!(reopened.get_all(Collection::Parties).unwrap().len(), 1);
    }

    #[test]
    fn test_upgrade_from_v8_migrates_character_blob() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(&schema::create_collection_sql(Collection::CharacterData.spec()))
                .unwrap();
            let blob = json!([
                {"id": "c1", "name": "Knight", "rarity": "★3", "group": "Warehouse"},
                {"id": "c2", "name": "Slime", "rarity": "★0", "group": "GachaBox"}
            ]);
            conn.execute(
                "INSERT INTO \"characterData\" (key, value_json) VALUES ('characterData', ?1)",
                [blob.to_string()],
            )
            .unwrap();
            conn.execute_batch("PRAGMA user_version = 8").unwrap();
        }

        let mut db = Database::at_path(&path);
        db.open().unwrap();
        let cards = db.load_all_cards().unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].id, "c1");
        assert!(db.get_all(Collection::CharacterData).unwrap().is_empty());
    }

    #[test]
    fn test_index_queries() {
        let db = Database::open_in_memory().unwrap();
        for (scenario, text) in [(1, "a"), (2, "b"), (1, "c")] {
            db.add(
                Collection::SceneEntries,
                &json!({"scenarioId": scenario, "type": "scene", "content": text}),
            )
            .unwrap();
        }
        assert_eq!(db.get_all_by_index(Collection::SceneEntries, "scenarioId", &1).unwrap().len(), 2);
        assert_eq!(db.delete_by_index(Collection::SceneEntries, "scenarioId", &1).unwrap(), 2);
        assert_eq!(db.get_all(Collection::SceneEntries).unwrap().len(), 1);
        assert!(db.get_all_by_index(Collection::SceneEntries, "nope", &1).is_err());
    }

    #[test]
    fn test_open_refuses_newer_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("future.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(&format!("PRAGMA user_version = {}", DB_VERSION + 1)).unwrap();
        }

        let mut db = Database::at_path(&path);
        let err = db.open().unwrap_err();
        assert!(matches!(err, StoreError::InvalidOperation(_)));
        assert!(!db.is_open());
        assert_eq!(
            Connection::open(&path)
                .unwrap()
                .query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))
                .unwrap(),
            i64::from(DB_VERSION + 1)
        );
    }

    #[test]
    fn test_backup_to_file() {
        let dir = tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        db.add(Collection::Parties, &json!({"name": "A"})).unwrap();

        let out = dir.path().join("backup.db");
        db.backup_to_file(&out).unwrap();

        let mut copy = Database::at_path(&out);
        copy.open().unwrap();
        assert_eq!(copy.get_all(Collection::Parties).unwrap().len(), 1);
    }

    #[test]
    fn test_db_state_lock() {
        let state = DbState::new(Database::open_in_memory().unwrap());
        let db = state.lock().unwrap();
        assert!(db.is_open());
    }
}
