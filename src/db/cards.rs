//! Character/Card Store
//!
//! 카드는 `cards` 컬렉션에 1행 1장으로 저장한다 (group / partyId 인덱스).
//! 구버전의 `characterData` 단일 blob은 업그레이드 때 옮겨 담는다.

use rusqlite::Connection;
use serde_json::Value;

use super::kv::{self, StoreKey};
use super::schema::Collection;
use super::{from_record, to_record, Database};
use crate::error::StoreResult;
use crate::models::{Card, CardGroup};
use crate::roster::Roster;

/// 구버전 blob 키
pub const CHARACTER_DATA_KEY: &str = "characterData";

impl Database {
    /// 전체 카드 (저장 순서)
    pub fn load_all_cards(&self) -> StoreResult<Vec<Card>> {
        self.get_all(Collection::Cards)?
            .into_iter()
            .map(from_record)
            .collect()
    }

    /// 카드 목록 전체 교체. id가 중복되면 드라이버 제약 에러로 롤백된다
    pub fn save_all_cards(&self, cards: &[Card]) -> StoreResult<()> {
        self.in_transaction(|conn| {
            kv::clear(conn, Collection::Cards)?;
            for card in cards {
                kv::add(conn, Collection::Cards, &to_record(card)?)?;
            }
            Ok(())
        })?;
        log::debug!("Saved {} cards", cards.len());
        Ok(())
    }

    pub fn load_roster(&self) -> StoreResult<Roster> {
        Ok(Roster::new(self.load_all_cards()?))
    }

    pub fn save_roster(&self, roster: &Roster) -> StoreResult<()> {
        self.save_all_cards(roster.cards())
    }

    /// 카드 한 장만 저장 (전체 read-modify-write 없이)
    pub fn put_card(&self, card: &Card) -> StoreResult<()> {
        self.put(Collection::Cards, &to_record(card)?)?;
        Ok(())
    }

    pub fn get_card(&self, card_id: &str) -> StoreResult<Option<Card>> {
        self.get(Collection::Cards, &StoreKey::from(card_id))?
            .map(from_record)
            .transpose()
    }

    pub fn delete_card(&self, card_id: &str) -> StoreResult<()> {
        self.delete(Collection::Cards, &StoreKey::from(card_id))
    }

    pub fn list_cards_by_group(&self, group: CardGroup) -> StoreResult<Vec<Card>> {
        self.get_all_by_index(Collection::Cards, "group", &group.as_str())?
            .into_iter()
            .map(from_record)
            .collect()
    }

    pub fn list_party_members(&self, party_id: i64) -> StoreResult<Vec<Card>> {
        self.get_all_by_index(Collection::Cards, "partyId", &party_id)?
            .into_iter()
            .map(from_record)
            .filter(|card: &StoreResult<Card>| {
                card.as_ref().map_or(true, |c| c.group == CardGroup::Party)
            })
            .collect()
    }

    /// 파티 삭제 전후에 호출: 소속 카드를 창고로 되돌린다. 변경된 카드 수 반환
    pub fn release_party_members(&self, party_id: i64) -> StoreResult<usize> {
        self.in_transaction(|conn| {
            let members = kv::get_all_by_index(conn, Collection::Cards, "partyId", &party_id)?;
            let mut released = 0;
            for record in members {
                let mut card: Card = from_record(record)?;
                card.group = CardGroup::Warehouse;
                card.party_id = None;
                card.role = None;
                kv::put(conn, Collection::Cards, &to_record(&card)?)?;
                released += 1;
            }
            Ok(released)
        })
    }
}

/// `characterData` blob → `cards` 행. 옮긴 카드 수 반환
///
/// 읽을 수 없는 항목은 버리지 않고 blob에 남긴다. 모두 옮겨졌을 때만 blob을 지운다.
pub(crate) fn migrate_character_blob(conn: &Connection) -> StoreResult<usize> {
    let key = StoreKey::from(CHARACTER_DATA_KEY);
    let Some(blob) = kv::get(conn, Collection::CharacterData, &key)? else {
        return Ok(0);
    };

    let items = match blob {
        Value::Array(items) => items,
        other => {
            log::warn!("characterData blob is not an array ({}); leaving it in place", type_name(&other));
            return Ok(0);
        }
    };

    let mut moved = 0;
    let mut leftover = Vec::new();
    for item in items {
        match serde_json::from_value::<Card>(item.clone()) {
            Ok(card) => {
                kv::put(conn, Collection::Cards, &to_record(&card)?)?;
                moved += 1;
            }
            Err(e) => {
                log::warn!("Keeping unreadable legacy card in characterData: {}", e);
                leftover.push(item);
            }
        }
    }

    if leftover.is_empty() {
        kv::delete(conn, Collection::CharacterData, &key)?;
    } else {
        kv::put_with_key(conn, Collection::CharacterData, &key, &Value::Array(leftover))?;
    }
    Ok(moved)
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::Rarity;

    fn card(id: &str, group: CardGroup) -> Card {
        Card::new(id, format!("card-{}", id), Rarity::Star1, group)
    }

    #[test]
    fn test_save_all_and_load_all_keep_order() {
        let db = Database::open_in_memory().unwrap();
        let cards = vec![card("b", CardGroup::GachaBox), card("a", CardGroup::Warehouse)];
        db.save_all_cards(&cards).unwrap();
        assert_eq!(db.load_all_cards().unwrap(), cards);

        db.save_all_cards(&cards[1..]).unwrap();
        assert_eq!(db.load_all_cards().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_ids_rejected_and_rolled_back() {
        let db = Database::open_in_memory().unwrap();
        db.save_all_cards(&[card("x", CardGroup::Warehouse)]).unwrap();

        let err = db
            .save_all_cards(&[card("a", CardGroup::Warehouse), card("a", CardGroup::Trash)])
            .unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
        let ids: Vec<_> = db.load_all_cards().unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["x"]);
    }

    #[test]
    fn test_partial_writes_and_group_index() {
        let db = Database::open_in_memory().unwrap();
        db.put_card(&card("1", CardGroup::GachaBox)).unwrap();
        db.put_card(&card("2", CardGroup::Warehouse)).unwrap();

        let mut c = db.get_card("1").unwrap().unwrap();
        c.group = CardGroup::Trash;
        db.put_card(&c).unwrap();

        assert_eq!(db.list_cards_by_group(CardGroup::Trash).unwrap().len(), 1);
        assert!(db.list_cards_by_group(CardGroup::GachaBox).unwrap().is_empty());

        db.delete_card("1").unwrap();
        assert!(db.get_card("1").unwrap().is_none());
    }

    #[test]
    fn test_release_party_members() {
        let db = Database::open_in_memory().unwrap();
        let party_id = db.create_party("Heroes").unwrap();

        let mut member = card("m", CardGroup::Party);
        member.party_id = Some(party_id);
        member.role = Some("leader".into());
        db.put_card(&member).unwrap();
        db.put_card(&card("w", CardGroup::Warehouse)).unwrap();

        assert_eq!(db.list_party_members(party_id).unwrap().len(), 1);
        db.delete_party(party_id).unwrap();
        assert_eq!(db.release_party_members(party_id).unwrap(), 1);

        let released = db.get_card("m").unwrap().unwrap();
        assert_eq!(released.group, CardGroup::Warehouse);
        assert_eq!(released.party_id, None);
        assert_eq!(released.role, None);
        assert!(db.list_party_members(party_id).unwrap().is_empty());
    }

    #[test]
    fn test_migration_keeps_unreadable_cards_and_extra_fields() {
        use crate::db::schema::create_schema_sql;
        use serde_json::json;

        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&create_schema_sql()).unwrap();
        let key = StoreKey::from(CHARACTER_DATA_KEY);
        let blob = json!([
            {"id": "c1", "name": "Knight", "rarity": "★3", "group": "Warehouse"},
            {"id": "c2", "name": "Lost"},
            {"id": "c3", "rarity": "★6", "group": "GachaBox"},
            {"id": "c4", "group": "Warehouse", "flipped": true}
        ]);
        kv::put_with_key(&conn, Collection::CharacterData, &key, &blob).unwrap();

        assert_eq!(migrate_character_blob(&conn).unwrap(), 2);

        let ids: Vec<_> = kv::get_all(&conn, Collection::Cards)
            .unwrap()
            .into_iter()
            .map(|v| v["id"].clone())
            .collect();
        assert_eq!(ids, vec![json!("c1"), json!("c4")]);

        let c4 = kv::get(&conn, Collection::Cards, &StoreKey::from("c4")).unwrap().unwrap();
        assert_eq!(c4["flipped"], json!(true));

        let left = kv::get(&conn, Collection::CharacterData, &key).unwrap().unwrap();
        let left_ids: Vec<_> = left.as_array().unwrap().iter().map(|v| v["id"].clone()).collect();
        assert_eq!(left_ids, vec![json!("c2"), json!("c3")]);
    }

    #[test]
    fn test_migration_removes_blob_when_everything_moved() {
        use crate::db::schema::create_schema_sql;
        use serde_json::json;

        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&create_schema_sql()).unwrap();
        let key = StoreKey::from(CHARACTER_DATA_KEY);
        kv::put_with_key(&conn, Collection::CharacterData, &key, &json!([{"id": "a", "group": "Trash"}])).unwrap();

        assert_eq!(migrate_character_blob(&conn).unwrap(), 1);
        assert!(kv::get(&conn, Collection::CharacterData, &key).unwrap().is_none());
    }
}
