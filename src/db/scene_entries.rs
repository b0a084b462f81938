//! Scene Entry Store
//!
//! 시나리오별 씬/행동/삽화 기록. 순서는 항상 entryId 오름차순(= 삽입 순서).

use super::kv::{self, StoreKey};
use super::schema::Collection;
use super::scenarios::touch;
use super::{expect_int_key, from_record, to_record, Database};
use crate::error::{StoreError, StoreResult};
use crate::models::{EntryKind, SceneEntry};

/// 삽화는 반드시 설명하는 씬의 sceneId를 가진다
fn validate(entry: &SceneEntry) -> StoreResult<()> {
    if entry.kind == EntryKind::Image && entry.scene_id.as_deref().map_or(true, str::is_empty) {
        return Err(StoreError::InvalidOperation(
            "image entries must carry the sceneId of the scene they illustrate".to_string(),
        ));
    }
    Ok(())
}

impl Database {
    /// 기록 추가. 소속 시나리오의 updatedAt도 같은 트랜잭션에서 갱신
    pub fn add_entry(&self, entry: &SceneEntry) -> StoreResult<i64> {
        validate(entry)?;
        let mut record = entry.clone();
        record.entry_id = None;
        let record = to_record(&record)?;

        self.in_transaction(|conn| {
            let key = kv::add(conn, Collection::SceneEntries, &record)?;
            touch(conn, entry.scenario_id)?;
            expect_int_key(key)
        })
    }

    pub fn get_entry(&self, entry_id: i64) -> StoreResult<Option<SceneEntry>> {
        self.get(Collection::SceneEntries, &StoreKey::Int(entry_id))?
            .map(from_record)
            .transpose()
    }

    /// 시나리오의 기록 목록 (entryId 오름차순)
    pub fn list_entries_by_scenario(&self, scenario_id: i64) -> StoreResult<Vec<SceneEntry>> {
        list_by_scenario(self.conn()?, scenario_id)
    }

    /// content_en 인덱스로 기록 찾기 (가장 먼저 저장된 것)
    pub fn find_entry_by_content_en(&self, content_en: &str) -> StoreResult<Option<SceneEntry>> {
        self.get_all_by_index(Collection::SceneEntries, "content_en", &content_en)?
            .into_iter()
            .next()
            .map(from_record)
            .transpose()
    }

    /// 기록 수정. entryId 필수
    pub fn update_entry(&self, entry: &SceneEntry) -> StoreResult<()> {
        if entry.entry_id.is_none() {
            return Err(StoreError::InvalidOperation(
                "update_entry requires an entryId".to_string(),
            ));
        }
        validate(entry)?;
        self.put(Collection::SceneEntries, &to_record(entry)?)?;
        Ok(())
    }

    pub fn delete_entry(&self, entry_id: i64) -> StoreResult<()> {
        self.delete(Collection::SceneEntries, &StoreKey::Int(entry_id))
    }

    /// 한 비트(같은 sceneId의 씬/삽화) 삭제. 삭제된 수 반환
    pub fn delete_entries_by_scene_id(&self, scenario_id: i64, scene_id: &str) -> StoreResult<usize> {
        self.in_transaction(|conn| {
            let mut removed = 0;
            for entry in list_by_scenario(conn, scenario_id)? {
                if entry.scene_id.as_deref() == Some(scene_id) {
                    if let Some(id) = entry.entry_id {
                        kv::delete(conn, Collection::SceneEntries, &StoreKey::Int(id))?;
                        removed += 1;
                    }
                }
            }
            Ok(removed)
        })
    }
}

pub(crate) fn list_by_scenario(conn: &rusqlite::Connection, scenario_id: i64) -> StoreResult<Vec<SceneEntry>> {
    kv::get_all_by_index(conn, Collection::SceneEntries, "scenarioId", &scenario_id)?
        .into_iter()
        .map(from_record)
        .collect()
}
