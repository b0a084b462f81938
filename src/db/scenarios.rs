//! Scenario Store
//!
//! 시나리오 CRUD. 삭제 시 씬 기록/엔티티/엔딩을 같은 트랜잭션에서 함께 지운다.

use serde_json::Value;

use super::kv::{self, StoreKey};
use super::schema::Collection;
use super::{expect_int_key, from_record, now_millis, to_record, Database};
use crate::error::{StoreError, StoreResult};
use crate::models::Scenario;

impl Database {
    /// 새 시나리오 생성 (createdAt = updatedAt = now)
    pub fn create_scenario(&self, wizard_data: Value, title: &str) -> StoreResult<i64> {
        let scenario = Scenario::new(title, wizard_data, now_millis());
        let key = self.add(Collection::Scenarios, &to_record(&scenario)?)?;
        let id = expect_int_key(key)?;
        log::debug!("Scenario created: {} ({})", id, title);
        Ok(id)
    }

    /// 시나리오 조회
    pub fn get_scenario(&self, scenario_id: i64) -> StoreResult<Option<Scenario>> {
        self.get(Collection::Scenarios, &StoreKey::Int(scenario_id))?
            .map(from_record)
            .transpose()
    }

    /// 시나리오 목록 (updatedAt 내림차순)
    pub fn list_scenarios(&self) -> StoreResult<Vec<Scenario>> {
        let mut scenarios = self
            .get_all(Collection::Scenarios)?
            .into_iter()
            .map(from_record)
            .collect::<StoreResult<Vec<Scenario>>>()?;
        scenarios.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(scenarios)
    }

    /// 시나리오 전체 덮어쓰기
    ///
    /// `skip_timestamp_bump`가 true면 updatedAt을 건드리지 않는다
    /// (책장 앞/뒤 전환 같은 표시 전용 변경).
    pub fn update_scenario(&self, scenario: &mut Scenario, skip_timestamp_bump: bool) -> StoreResult<()> {
        if scenario.scenario_id.is_none() {
            return Err(StoreError::InvalidOperation(
                "update_scenario requires a scenarioId".to_string(),
            ));
        }
        if !skip_timestamp_bump {
            scenario.updated_at = scenario.updated_at.max(now_millis());
        }
        self.put(Collection::Scenarios, &to_record(scenario)?)?;
        Ok(())
    }

    /// updatedAt만 갱신 (씬 추가 후 호출). 없는 시나리오면 false
    pub fn touch_scenario(&self, scenario_id: i64) -> StoreResult<bool> {
        touch(self.conn()?, scenario_id)
    }

    /// 시나리오 삭제 + 소속 레코드 연쇄 삭제
    pub fn delete_scenario(&self, scenario_id: i64) -> StoreResult<()> {
        let removed = self.in_transaction(|conn| {
            kv::delete(conn, Collection::Scenarios, &StoreKey::Int(scenario_id))?;
            let entries = kv::delete_by_index(conn, Collection::SceneEntries, "scenarioId", &scenario_id)?;
            let entities = kv::delete_by_index(conn, Collection::Entities, "scenarioId", &scenario_id)?;
            let endings = kv::delete_by_index(conn, Collection::Endings, "scenarioId", &scenario_id)?;
            Ok((entries, entities, endings))
        })?;

        log::info!(
            "Scenario {} deleted (entries: {}, entities: {}, endings: {})",
            scenario_id,
            removed.0,
            removed.1,
            removed.2
        );
        Ok(())
    }
}

/// 트랜잭션 내부에서도 쓰는 updatedAt 갱신
pub(crate) fn touch(conn: &rusqlite::Connection, scenario_id: i64) -> StoreResult<bool> {
    let key = StoreKey::Int(scenario_id);
    let Some(record) = kv::get(conn, Collection::Scenarios, &key)? else {
        return Ok(false);
    };
    let mut scenario: Scenario = from_record(record)?;
    scenario.updated_at = scenario.updated_at.max(now_millis());
    kv::put(conn, Collection::Scenarios, &to_record(&scenario)?)?;
    Ok(true)
}
