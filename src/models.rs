//! Data Models
//!
//! 저장 레코드 모델. 필드명은 프론트엔드 레코드와 동일하게 직렬화한다.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 시나리오 (TRPG 세션 컨테이너)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<i64>,
    pub title: String,
    /// 위저드 설정 (장르, 섹션, 파티 스냅샷, 클리어 조건, 요약 등)
    #[serde(default)]
    pub wizard_data: Value,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub book_shelf_flag: bool,
    #[serde(default)]
    pub book_facing_front: bool,
    #[serde(default)]
    pub shelf_order: Option<i64>,
    #[serde(default)]
    pub cover_color1: Option<String>,
    #[serde(default)]
    pub cover_color2: Option<String>,
    #[serde(default)]
    pub cover_spacing: Option<f64>,
    #[serde(default)]
    pub use_cover_image: bool,
    #[serde(default)]
    pub hide_from_history_flag: bool,
    #[serde(default)]
    pub show_history: bool,
}

impl Scenario {
    pub fn new(title: impl Into<String>, wizard_data: Value, now: i64) -> Self {
        Self {
            scenario_id: None,
            title: title.into(),
            wizard_data,
            created_at: now,
            updated_at: now,
            book_shelf_flag: false,
            book_facing_front: false,
            shelf_order: None,
            cover_color1: None,
            cover_color2: None,
            cover_spacing: None,
            use_cover_image: false,
            hide_from_history_flag: false,
            show_history: false,
        }
    }
}

/// 씬 기록 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Scene,
    Action,
    Image,
}

/// 씬 기록 한 줄 (씬 / 행동 / 삽화)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<i64>,
    pub scenario_id: i64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// 한 비트(씬 + 행동 + 삽화)를 묶는 ID
    #[serde(default)]
    pub scene_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default, rename = "content_en")]
    pub content_en: String,
    #[serde(default)]
    pub action_content: String,
    #[serde(default, rename = "actionContent_en")]
    pub action_content_en: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub data_url: Option<String>,
}

impl SceneEntry {
    pub fn new(scenario_id: i64, kind: EntryKind, scene_id: Option<&str>, content: impl Into<String>) -> Self {
        Self {
            entry_id: None,
            scenario_id,
            kind,
            scene_id: scene_id.map(str::to_string),
            content: content.into(),
            content_en: String::new(),
            action_content: String::new(),
            action_content_en: String::new(),
            prompt: String::new(),
            data_url: None,
        }
    }
}

/// 카드 레어도
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rarity {
    #[serde(rename = "★0")]
    Star0,
    #[serde(rename = "★1")]
    Star1,
    #[serde(rename = "★2")]
    Star2,
    #[serde(rename = "★3")]
    Star3,
    #[serde(rename = "★4")]
    Star4,
    #[serde(rename = "★5")]
    Star5,
}

impl Rarity {
    pub const ALL: [Rarity; 6] = [
        Rarity::Star0,
        Rarity::Star1,
        Rarity::Star2,
        Rarity::Star3,
        Rarity::Star4,
        Rarity::Star5,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Rarity::Star0 => "★0",
            Rarity::Star1 => "★1",
            Rarity::Star2 => "★2",
            Rarity::Star3 => "★3",
            Rarity::Star4 => "★4",
            Rarity::Star5 => "★5",
        }
    }
}

impl Default for Rarity {
    fn default() -> Self {
        Rarity::Star0
    }
}

/// 카드가 속한 논리적 보관함
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardGroup {
    GachaBox,
    Warehouse,
    Party,
    Trash,
}

impl CardGroup {
    pub const ALL: [CardGroup; 4] = [
        CardGroup::GachaBox,
        CardGroup::Warehouse,
        CardGroup::Party,
        CardGroup::Trash,
    ];

    /// 인덱스 조회에 쓰는 저장 문자열
    pub fn as_str(self) -> &'static str {
        match self {
            CardGroup::GachaBox => "GachaBox",
            CardGroup::Warehouse => "Warehouse",
            CardGroup::Party => "Party",
            CardGroup::Trash => "Trash",
        }
    }
}

/// 가챠로 생성된 캐릭터/아이템/몬스터 카드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub card_type: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub special: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub rarity: Rarity,
    #[serde(default, rename = "backgroundcss")]
    pub background_css: String,
    #[serde(default, rename = "imageprompt")]
    pub image_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    pub group: CardGroup,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// 모델에 없는 필드 (프론트엔드 확장 필드 보존)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Card {
    pub fn new(id: impl Into<String>, name: impl Into<String>, rarity: Rarity, group: CardGroup) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            card_type: String::new(),
            state: String::new(),
            special: String::new(),
            caption: String::new(),
            rarity,
            background_css: String::new(),
            image_prompt: String::new(),
            image_data: None,
            group,
            party_id: None,
            role: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// 파티
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party_id: Option<i64>,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// 세이브 슬롯에 담기는 스냅샷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSnapshot {
    pub scenario_id: i64,
    pub scenario_title: String,
    #[serde(default)]
    pub scenario_wizard_data: Value,
    pub scenes: Vec<SceneEntry>,
}

/// 세이브 슬롯. `data`가 null이면 빈 슬롯
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSlot {
    pub slot_index: i64,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub data: Option<SlotSnapshot>,
}

impl SaveSlot {
    pub fn empty(slot_index: i64) -> Self {
        Self {
            slot_index,
            updated_at: None,
            data: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_none()
    }
}

/// 행동 10개 단위 요약
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_id: Option<i64>,
    pub chunk_index: i64,
    #[serde(default, rename = "content_en")]
    pub content_en: String,
    #[serde(default, rename = "content_ja")]
    pub content_ja: String,
}

/// 시나리오 진행 중 발견한 인물/아이템 등
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<i64>,
    pub scenario_id: i64,
    #[serde(default)]
    pub category: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    pub created_at: i64,
}

/// 엔딩 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndingKind {
    Clear,
    Bad,
}

impl EndingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EndingKind::Clear => "clear",
            EndingKind::Bad => "bad",
        }
    }
}

/// 생성된 엔딩
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ending {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ending_id: Option<i64>,
    pub scenario_id: i64,
    pub kind: EndingKind,
    pub story: String,
    pub created_at: i64,
}

/// 배경 이미지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub data_url: String,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scene_entry_wire_names() {
        let mut entry = SceneEntry::new(3, EntryKind::Action, None, "Look around");
        entry.content_en = "Look around".into();
        entry.action_content_en = "x".into();
        let v = serde_json::to_value(&entry).unwrap();
        assert_eq!(v["type"], json!("action"));
        assert_eq!(v["scenarioId"], json!(3));
        assert!(v.get("content_en").is_some());
        assert!(v.get("actionContent_en").is_some());
        assert!(v.get("entryId").is_none());
    }

    #[test]
    fn test_card_wire_names() {
        let card = Card::new("c1", "Knight", Rarity::Star5, CardGroup::Party);
        let v = serde_json::to_value(&card).unwrap();
        assert_eq!(v["rarity"], json!("★5"));
        assert_eq!(v["group"], json!("Party"));
        assert!(v.get("backgroundcss").is_some());
        assert!(v.get("partyId").is_none());

        let back: Card = serde_json::from_value(json!({"id": "x", "group": "Trash"})).unwrap();
        assert_eq!(back.rarity, Rarity::Star0);
        assert_eq!(back.group, CardGroup::Trash);
    }

    #[test]
    fn test_card_keeps_unknown_fields() {
        let raw = json!({"id": "c4", "group": "Warehouse", "flipped": true, "tags": ["a"]});
        let card: Card = serde_json::from_value(raw).unwrap();
        assert_eq!(card.extra.get("flipped"), Some(&json!(true)));

        let v = serde_json::to_value(&card).unwrap();
        assert_eq!(v["flipped"], json!(true));
        assert_eq!(v["tags"], json!(["a"]));
        assert!(v.get("extra").is_none());
    }

    #[test]
    fn test_empty_slot_serializes_null_data() {
        let v = serde_json::to_value(SaveSlot::empty(2)).unwrap();
        assert_eq!(v, json!({"slotIndex": 2, "updatedAt": null, "data": null}));
    }
}
