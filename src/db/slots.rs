//! Save-Slot Store
//!
//! 번호가 붙은 세이브 슬롯. 저장은 시나리오 + 씬 기록 전체 스냅샷이고,
//! 복원은 하나의 트랜잭션에서 기록을 통째로 교체한다.

use super::kv::{self, StoreKey};
use super::scene_entries::list_by_scenario;
use super::schema::Collection;
use super::{from_record, now_millis, to_record, Database};
use crate::error::{StoreError, StoreResult};
use crate::models::{SaveSlot, Scenario, SlotSnapshot};

/// 최초 실행 시 만드는 슬롯 수
pub const DEFAULT_SLOT_COUNT: u32 = 5;

/// 슬롯 로드 결과
#[derive(Debug, Clone, PartialEq)]
pub enum SlotLoadOutcome {
    /// 현재 열린 시나리오에 적용됨. 새로 쓰인 기록 수
    Applied { scenario_id: i64, entries: usize },
    /// 다른 시나리오의 슬롯. 해당 시나리오 화면으로 이동한 뒤 다시 로드해야 한다
    NeedsNavigation { scenario_id: i64 },
    Empty,
}

impl Database {
    /// 슬롯 목록 (slotIndex 오름차순)
    pub fn list_slots(&self) -> StoreResult<Vec<SaveSlot>> {
        self.get_all(Collection::UniversalSaves)?
            .into_iter()
            .map(from_record)
            .collect()
    }

    pub fn get_slot(&self, slot_index: i64) -> StoreResult<Option<SaveSlot>> {
        self.get(Collection::UniversalSaves, &StoreKey::Int(slot_index))?
            .map(from_record)
            .transpose()
    }

    pub fn put_slot(&self, slot: &SaveSlot) -> StoreResult<()> {
        self.put(Collection::UniversalSaves, &to_record(slot)?)?;
        Ok(())
    }

    pub fn delete_slot(&self, slot_index: i64) -> StoreResult<()> {
        self.delete(Collection::UniversalSaves, &StoreKey::Int(slot_index))
    }

    /// 컬렉션이 비어 있을 때만 1..=count 빈 슬롯 생성. 생성했으면 true
    pub fn ensure_initial_slots(&self, count: u32) -> StoreResult<bool> {
        self.in_transaction(|conn| {
            if kv::count(conn, Collection::UniversalSaves)? > 0 {
                return Ok(false);
            }
            for i in 1..=i64::from(count) {
                kv::put(conn, Collection::UniversalSaves, &to_record(&SaveSlot::empty(i))?)?;
            }
            log::info!("Created {} empty save slots", count);
            Ok(true)
        })
    }

    /// 마지막 번호 다음에 빈 슬롯 추가. 새 slotIndex 반환
    pub fn add_slot(&self) -> StoreResult<i64> {
        let next = self
            .list_slots()?
            .iter()
            .map(|s| s.slot_index)
            .max()
            .unwrap_or(0)
            + 1;
        self.put_slot(&SaveSlot::empty(next))?;
        Ok(next)
    }

    /// 슬롯은 남기고 내용만 비운다
    pub fn clear_slot(&self, slot_index: i64) -> StoreResult<()> {
        let mut slot = SaveSlot::empty(slot_index);
        slot.updated_at = Some(now_millis());
        self.put_slot(&slot)
    }

    /// 메모리의 시나리오 + 저장된 씬 기록을 슬롯에 저장
    pub fn save_to_slot(&self, slot_index: i64, scenario: &Scenario) -> StoreResult<SaveSlot> {
        let scenario_id = scenario.scenario_id.ok_or_else(|| {
            StoreError::InvalidOperation("cannot save an unsaved scenario to a slot".to_string())
        })?;

        let slot = SaveSlot {
            slot_index,
            updated_at: Some(now_millis()),
            data: Some(SlotSnapshot {
                scenario_id,
                scenario_title: scenario.title.clone(),
                scenario_wizard_data: scenario.wizard_data.clone(),
                scenes: self.list_entries_by_scenario(scenario_id)?,
            }),
        };
        self.put_slot(&slot)?;
        log::info!(
            "Saved scenario {} to slot {} ({} entries)",
            scenario_id,
            slot_index,
            slot.data.as_ref().map_or(0, |d| d.scenes.len())
        );
        Ok(slot)
    }

    /// 현재 열린 시나리오 기준으로 슬롯 로드
    pub fn load_slot(&self, slot_index: i64, open_scenario_id: Option<i64>) -> StoreResult<SlotLoadOutcome> {
        let slot = self
            .get_slot(slot_index)?
            .ok_or_else(|| StoreError::not_found("Slot", slot_index))?;

        let Some(data) = slot.data else {
            return Ok(SlotLoadOutcome::Empty);
        };

        if open_scenario_id != Some(data.scenario_id) {
            return Ok(SlotLoadOutcome::NeedsNavigation {
                scenario_id: data.scenario_id,
            });
        }

        let entries = self.restore_slot_into(slot_index, data.scenario_id)?;
        Ok(SlotLoadOutcome::Applied {
            scenario_id: data.scenario_id,
            entries,
        })
    }

    /// 슬롯 스냅샷을 대상 시나리오에 적용. 기존 기록 삭제/재삽입/메타데이터 갱신이
    /// 한 트랜잭션이므로 중간에 실패하면 이전 기록이 그대로 남는다.
    pub fn restore_slot_into(&self, slot_index: i64, target_scenario_id: i64) -> StoreResult<usize> {
        let slot = self
            .get_slot(slot_index)?
            .ok_or_else(|| StoreError::not_found("Slot", slot_index))?;
        let data = slot
            .data
            .ok_or_else(|| StoreError::InvalidOperation(format!("slot {} is empty", slot_index)))?;

        let written = self.in_transaction(|conn| {
            let removed = kv::delete_by_index(conn, Collection::SceneEntries, "scenarioId", &target_scenario_id)?;

            for entry in &data.scenes {
                let mut entry = entry.clone();
                entry.entry_id = None;
                entry.scenario_id = target_scenario_id;
                kv::add(conn, Collection::SceneEntries, &to_record(&entry)?)?;
            }

            let target_key = StoreKey::Int(target_scenario_id);
            let mut scenario: Scenario = kv::get(conn, Collection::Scenarios, &target_key)?
                .map(from_record)
                .transpose()?
                .ok_or_else(|| StoreError::not_found("Scenario", target_scenario_id))?;
            scenario.title = data.scenario_title.clone();
            scenario.wizard_data = data.scenario_wizard_data.clone();
            scenario.updated_at = scenario.updated_at.max(now_millis());
            kv::put(conn, Collection::Scenarios, &to_record(&scenario)?)?;

            log::debug!("Slot restore replaced {} entries", removed);
            Ok(list_by_scenario(conn, target_scenario_id)?.len())
        })?;

        log::info!(
            "Restored slot {} into scenario {} ({} entries)",
            slot_index,
            target_scenario_id,
            written
        );
        Ok(written)
    }
}
