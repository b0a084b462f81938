//! Party Store
//!
//! 파티 CRUD. 카드 쪽 정리는 하지 않는다 (`release_party_members` 참고).

use super::kv::StoreKey;
use super::schema::Collection;
use super::{expect_int_key, from_record, now_millis, to_record, Database};
use crate::error::{StoreError, StoreResult};
use crate::models::Party;

impl Database {
    pub fn create_party(&self, name: &str) -> StoreResult<i64> {
        let now = now_millis();
        let party = Party {
            party_id: None,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        expect_int_key(self.add(Collection::Parties, &to_record(&party)?)?)
    }

    pub fn get_party(&self, party_id: i64) -> StoreResult<Option<Party>> {
        self.get(Collection::Parties, &StoreKey::Int(party_id))?
            .map(from_record)
            .transpose()
    }

    /// 파티 목록 (updatedAt 내림차순)
    pub fn list_parties(&self) -> StoreResult<Vec<Party>> {
        let mut parties = self
            .get_all(Collection::Parties)?
            .into_iter()
            .map(from_record)
            .collect::<StoreResult<Vec<Party>>>()?;
        parties.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(parties)
    }

    pub fn update_party(&self, party: &mut Party) -> StoreResult<()> {
        if party.party_id.is_none() {
            return Err(StoreError::InvalidOperation(
                "update_party requires a partyId".to_string(),
            ));
        }
        party.updated_at = party.updated_at.max(now_millis());
        self.put(Collection::Parties, &to_record(party)?)?;
        Ok(())
    }

    pub fn delete_party(&self, party_id: i64) -> StoreResult<()> {
        self.delete(Collection::Parties, &StoreKey::Int(party_id))
    }
}
