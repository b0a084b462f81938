//! Summary / Entity / Ending side stores

use super::kv::{self, StoreKey};
use super::schema::Collection;
use super::{expect_int_key, from_record, now_millis, to_record, Database};
use crate::error::{StoreError, StoreResult};
use crate::models::{Ending, EndingKind, Entity, SceneSummary};

impl Database {
    // ---- 씬 요약 (chunkIndex 유니크) ----

    /// chunkIndex 기준으로 저장. 이미 있으면 summaryId를 유지한 채 덮어쓴다
    pub fn upsert_summary(&self, summary: &SceneSummary) -> StoreResult<i64> {
        self.in_transaction(|conn| {
            let existing = kv::get_all_by_index(conn, Collection::SceneSummaries, "chunkIndex", &summary.chunk_index)?
                .into_iter()
                .next()
                .map(from_record::<SceneSummary>)
                .transpose()?;

            let mut record = summary.clone();
            record.summary_id = existing.and_then(|s| s.summary_id);
            expect_int_key(kv::put(conn, Collection::SceneSummaries, &to_record(&record)?)?)
        })
    }

    pub fn get_summary_by_chunk(&self, chunk_index: i64) -> StoreResult<Option<SceneSummary>> {
        self.get_all_by_index(Collection::SceneSummaries, "chunkIndex", &chunk_index)?
            .into_iter()
            .next()
            .map(from_record)
            .transpose()
    }

    /// 요약 목록 (chunkIndex 오름차순)
    pub fn list_summaries(&self) -> StoreResult<Vec<SceneSummary>> {
        let mut summaries = self
            .get_all(Collection::SceneSummaries)?
            .into_iter()
            .map(from_record)
            .collect::<StoreResult<Vec<SceneSummary>>>()?;
        summaries.sort_by_key(|s| s.chunk_index);
        Ok(summaries)
    }

    /// chunk_index 이상인 요약 삭제 (기록을 되돌렸을 때). 삭제 수 반환
    pub fn delete_summaries_from(&self, chunk_index: i64) -> StoreResult<usize> {
        self.in_transaction(|conn| {
            let mut removed = 0;
            for record in kv::get_all(conn, Collection::SceneSummaries)? {
                let summary: SceneSummary = from_record(record)?;
                if summary.chunk_index >= chunk_index {
                    if let Some(id) = summary.summary_id {
                        kv::delete(conn, Collection::SceneSummaries, &StoreKey::Int(id))?;
                        removed += 1;
                    }
                }
            }
            Ok(removed)
        })
    }

    pub fn clear_summaries(&self) -> StoreResult<()> {
        self.clear(Collection::SceneSummaries)
    }

    // ---- 엔티티 ----

    pub fn add_entity(&self, entity: &Entity) -> StoreResult<i64> {
        let mut record = entity.clone();
        record.entity_id = None;
        expect_int_key(self.add(Collection::Entities, &to_record(&record)?)?)
    }

    pub fn list_entities(&self, scenario_id: i64) -> StoreResult<Vec<Entity>> {
        self.get_all_by_index(Collection::Entities, "scenarioId", &scenario_id)?
            .into_iter()
            .map(from_record)
            .collect()
    }

    pub fn update_entity(&self, entity: &Entity) -> StoreResult<()> {
        if entity.entity_id.is_none() {
            return Err(StoreError::InvalidOperation(
                "update_entity requires an entityId".to_string(),
            ));
        }
        self.put(Collection::Entities, &to_record(entity)?)?;
        Ok(())
    }

    pub fn delete_entity(&self, entity_id: i64) -> StoreResult<()> {
        self.delete(Collection::Entities, &StoreKey::Int(entity_id))
    }

    // ---- 엔딩 (시나리오 x 종류당 1개) ----

    pub fn save_ending(&self, scenario_id: i64, kind: EndingKind, story: &str) -> StoreResult<Ending> {
        self.in_transaction(|conn| {
            let existing = find_ending(conn, scenario_id, kind)?;
            let ending = Ending {
                ending_id: existing.and_then(|e| e.ending_id),
                scenario_id,
                kind,
                story: story.to_string(),
                created_at: now_millis(),
            };
            let key = kv::put(conn, Collection::Endings, &to_record(&ending)?)?;
            Ok(Ending {
                ending_id: Some(expect_int_key(key)?),
                ..ending
            })
        })
    }

    pub fn get_ending(&self, scenario_id: i64, kind: EndingKind) -> StoreResult<Option<Ending>> {
        find_ending(self.conn()?, scenario_id, kind)
    }

    pub fn delete_ending(&self, scenario_id: i64, kind: EndingKind) -> StoreResult<()> {
        let conn = self.conn()?;
        if let Some(id) = find_ending(conn, scenario_id, kind)?.and_then(|e| e.ending_id) {
            kv::delete(conn, Collection::Endings, &StoreKey::Int(id))?;
        }
        Ok(())
    }
}

fn find_ending(conn: &rusqlite::Connection, scenario_id: i64, kind: EndingKind) -> StoreResult<Option<Ending>> {
    for record in kv::get_all_by_index(conn, Collection::Endings, "scenarioId", &scenario_id)? {
        let ending: Ending = from_record(record)?;
        if ending.kind == kind {
            return Ok(Some(ending));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summary(chunk: i64, en: &str) -> SceneSummary {
        SceneSummary {
            summary_id: None,
            chunk_index: chunk,
            content_en: en.to_string(),
            content_ja: String::new(),
        }
    }

    #[test]
    fn test_upsert_keeps_one_row_per_chunk() {
        let db = Database::open_in_memory().unwrap();
        let first = db.upsert_summary(&summary(0, "v1")).unwrap();
        let second = db.upsert_summary(&summary(0, "v2")).unwrap();
        assert_eq!(first, second);

        db.upsert_summary(&summary(2, "c2")).unwrap();
        db.upsert_summary(&summary(1, "c1")).unwrap();

        let chunks: Vec<_> = db.list_summaries().unwrap().iter().map(|s| s.chunk_index).collect();
        assert_eq!(chunks, vec![0, 1, 2]);
        assert_eq!(db.get_summary_by_chunk(0).unwrap().unwrap().content_en, "v2");
    }

    #[test]
    fn test_delete_summaries_from() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..4 {
            db.upsert_summary(&summary(i, "x")).unwrap();
        }
        assert_eq!(db.delete_summaries_from(2).unwrap(), 2);
        assert!(db.get_summary_by_chunk(2).unwrap().is_none());
        assert!(db.get_summary_by_chunk(1).unwrap().is_some());

        db.clear_summaries().unwrap();
        assert!(db.list_summaries().unwrap().is_empty());
    }

    #[test]
    fn test_entities_follow_scenario_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_scenario(json!({}), "T").unwrap();
        let entity = Entity {
            entity_id: None,
            scenario_id: id,
            category: "item".into(),
            name: "Rusty key".into(),
            description: String::new(),
            image_data: None,
            created_at: 0,
        };
        let entity_id = db.add_entity(&entity).unwrap();

        let mut stored = db.list_entities(id).unwrap().remove(0);
        assert_eq!(stored.entity_id, Some(entity_id));
        stored.description = "Opens the cellar".into();
        db.update_entity(&stored).unwrap();
        assert_eq!(db.list_entities(id).unwrap()[0].description, "Opens the cellar");

        db.save_ending(id, EndingKind::Clear, "The end.").unwrap();
        db.delete_scenario(id).unwrap();
        assert!(db.list_entities(id).unwrap().is_empty());
        assert!(db.get_ending(id, EndingKind::Clear).unwrap().is_none());
    }

    #[test]
    fn test_endings_one_per_kind() {
        let db = Database::open_in_memory().unwrap();
        let first = db.save_ending(1, EndingKind::Bad, "You fell.").unwrap();
        let again = db.save_ending(1, EndingKind::Bad, "You fell harder.").unwrap();
        assert_eq!(first.ending_id, again.ending_id);
        db.save_ending(1, EndingKind::Clear, "You won.").unwrap();

        assert_eq!(db.get_ending(1, EndingKind::Bad).unwrap().unwrap().story, "You fell harder.");
        db.delete_ending(1, EndingKind::Bad).unwrap();
        assert!(db.get_ending(1, EndingKind::Bad).unwrap().is_none());
        assert!(db.get_ending(1, EndingKind::Clear).unwrap().is_some());
    }
}
