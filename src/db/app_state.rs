//! App state blobs
//!
//! 위저드 작성 중 데이터, 내 아바타, 배경 이미지

use serde_json::Value;

use super::kv::StoreKey;
use super::schema::Collection;
use super::{expect_int_key, from_record, now_millis, to_record, Database};
use crate::error::StoreResult;
use crate::models::BackgroundImage;

pub const WIZARD_STATE_KEY: &str = "wizardData";
pub const AVATAR_KEY: &str = "myAvatar";

impl Database {
    pub fn load_wizard_state(&self) -> StoreResult<Option<Value>> {
        self.get(Collection::WizardState, &StoreKey::from(WIZARD_STATE_KEY))
    }

    pub fn save_wizard_state(&self, wizard_data: &Value) -> StoreResult<()> {
        self.put_with_key(Collection::WizardState, &StoreKey::from(WIZARD_STATE_KEY), wizard_data)
    }

    pub fn clear_wizard_state(&self) -> StoreResult<()> {
        self.delete(Collection::WizardState, &StoreKey::from(WIZARD_STATE_KEY))
    }

    pub fn load_avatar(&self) -> StoreResult<Option<Value>> {
        self.get(Collection::AvatarData, &StoreKey::from(AVATAR_KEY))
    }

    pub fn save_avatar(&self, avatar: &Value) -> StoreResult<()> {
        self.put_with_key(Collection::AvatarData, &StoreKey::from(AVATAR_KEY), avatar)
    }

    pub fn add_background_image(&self, data_url: &str) -> StoreResult<i64> {
        let image = BackgroundImage {
            id: None,
            data_url: data_url.to_string(),
            created_at: now_millis(),
        };
        expect_int_key(self.add(Collection::BgImages, &to_record(&image)?)?)
    }

    pub fn list_background_images(&self) -> StoreResult<Vec<BackgroundImage>> {
        self.get_all(Collection::BgImages)?
            .into_iter()
            .map(from_record)
            .collect()
    }

    pub fn delete_background_image(&self, id: i64) -> StoreResult<()> {
        self.delete(Collection::BgImages, &StoreKey::Int(id))
    }
}
