//! Database Schema
//!
//! 컬렉션(object store) 정의와 SQLite 테이블/인덱스 생성 SQL

/// 현재 스키마 버전 (`PRAGMA user_version`)
///
/// 8: 브라우저 시절 스키마 (characterData 단일 blob)
/// 9: 카드 1행 1장(`cards`), `entities`, `endings` 추가
pub const DB_VERSION: u32 = 9;

/// 키 생성 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// 레코드 필드가 키, 없으면 자동 증가
    AutoIncrement(&'static str),
    /// 레코드 필드가 키, 호출자가 반드시 지정
    Inline(&'static str),
    /// 레코드 밖에서 키를 지정 (단일 blob 레코드)
    OutOfLine,
}

/// `get_all` 결과 순서
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrder {
    Key,
    Insertion,
}

/// 보조 인덱스 정의
#[derive(Debug, Clone, Copy)]
pub struct IndexSpec {
    pub name: &'static str,
    pub key_path: &'static str,
    pub unique: bool,
}

/// 컬렉션 정의
#[derive(Debug, Clone, Copy)]
pub struct CollectionSpec {
    pub name: &'static str,
    pub key: KeyKind,
    pub order: RowOrder,
    pub indexes: &'static [IndexSpec],
    /// 처음 등장한 스키마 버전
    pub since: u32,
}

const fn index(name: &'static str, key_path: &'static str) -> IndexSpec {
    IndexSpec {
        name,
        key_path,
        unique: false,
    }
}

/// 레코드 컬렉션 목록
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    CharacterData,
    Scenarios,
    SceneEntries,
    WizardState,
    Parties,
    BgImages,
    SceneSummaries,
    AvatarData,
    UniversalSaves,
    Cards,
    Entities,
    Endings,
}

impl Collection {
    pub const ALL: [Collection; 12] = [
        Collection::CharacterData,
        Collection::Scenarios,
        Collection::SceneEntries,
        Collection::WizardState,
        Collection::Parties,
        Collection::BgImages,
        Collection::SceneSummaries,
        Collection::AvatarData,
        Collection::UniversalSaves,
        Collection::Cards,
        Collection::Entities,
        Collection::Endings,
    ];

    pub fn spec(self) -> &'static CollectionSpec {
        match self {
            Collection::CharacterData => &CHARACTER_DATA,
            Collection::Scenarios => &SCENARIOS,
            Collection::SceneEntries => &SCENE_ENTRIES,
            Collection::WizardState => &WIZARD_STATE,
            Collection::Parties => &PARTIES,
            Collection::BgImages => &BG_IMAGES,
            Collection::SceneSummaries => &SCENE_SUMMARIES,
            Collection::AvatarData => &AVATAR_DATA,
            Collection::UniversalSaves => &UNIVERSAL_SAVES,
            Collection::Cards => &CARDS,
            Collection::Entities => &ENTITIES,
            Collection::Endings => &ENDINGS,
        }
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn from_name(name: &str) -> Option<Collection> {
        Collection::ALL.into_iter().find(|c| c.name() == name)
    }
}

static CHARACTER_DATA: CollectionSpec = CollectionSpec {
    name: "characterData",
    key: KeyKind::OutOfLine,
    order: RowOrder::Key,
    indexes: &[],
    since: 1,
};

static SCENARIOS: CollectionSpec = CollectionSpec {
    name: "scenarios",
    key: KeyKind::AutoIncrement("scenarioId"),
    order: RowOrder::Key,
    indexes: &[index("updatedAt", "updatedAt")],
    since: 1,
};

static SCENE_ENTRIES: CollectionSpec = CollectionSpec {
    name: "sceneEntries",
    key: KeyKind::AutoIncrement("entryId"),
    order: RowOrder::Key,
    indexes: &[index("scenarioId", "scenarioId"), index("content_en", "content_en")],
    since: 1,
};

static WIZARD_STATE: CollectionSpec = CollectionSpec {
    name: "wizardState",
    key: KeyKind::OutOfLine,
    order: RowOrder::Key,
    indexes: &[],
    since: 2,
};

static PARTIES: CollectionSpec = CollectionSpec {
    name: "parties",
    key: KeyKind::AutoIncrement("partyId"),
    order: RowOrder::Key,
    indexes: &[index("updatedAt", "updatedAt")],
    since: 3,
};

static BG_IMAGES: CollectionSpec = CollectionSpec {
    name: "bgImages",
    key: KeyKind::AutoIncrement("id"),
    order: RowOrder::Key,
    indexes: &[],
    since: 4,
};

static SCENE_SUMMARIES: CollectionSpec = CollectionSpec {
    name: "sceneSummaries",
    key: KeyKind::AutoIncrement("summaryId"),
    order: RowOrder::Key,
    indexes: &[IndexSpec {
        name: "chunkIndex",
        key_path: "chunkIndex",
        unique: true,
    }],
    since: 5,
};

static AVATAR_DATA: CollectionSpec = CollectionSpec {
    name: "avatarData",
    key: KeyKind::OutOfLine,
    order: RowOrder::Key,
    indexes: &[],
    since: 6,
};

static UNIVERSAL_SAVES: CollectionSpec = CollectionSpec {
    name: "universalSaves",
    key: KeyKind::Inline("slotIndex"),
    order: RowOrder::Key,
    indexes: &[],
    since: 8,
};

static CARDS: CollectionSpec = CollectionSpec {
    name: "cards",
    key: KeyKind::Inline("id"),
    order: RowOrder::Insertion,
    indexes: &[index("group", "group"), index("partyId", "partyId")],
    since: 9,
};

static ENTITIES: CollectionSpec = CollectionSpec {
    name: "entities",
    key: KeyKind::AutoIncrement("entityId"),
    order: RowOrder::Key,
    indexes: &[index("scenarioId", "scenarioId")],
    since: 9,
};

static ENDINGS: CollectionSpec = CollectionSpec {
    name: "endings",
    key: KeyKind::AutoIncrement("endingId"),
    order: RowOrder::Key,
    indexes: &[index("scenarioId", "scenarioId")],
    since: 9,
};

/// 인덱스가 사용하는 SQL 식. 조회 쿼리도 같은 식을 써야 인덱스를 탄다.
pub fn index_expr(key_path: &str) -> String {
    format!("json_extract(value_json, '$.{}')", key_path)
}

pub fn find_index(spec: &'static CollectionSpec, index_name: &str) -> Option<&'static IndexSpec> {
    spec.indexes.iter().find(|i| i.name == index_name)
}

/// 컬렉션 테이블 + 인덱스 생성 SQL
pub fn create_collection_sql(spec: &CollectionSpec) -> String {
    let key_column = match spec.key {
        KeyKind::AutoIncrement(_) => "key INTEGER PRIMARY KEY AUTOINCREMENT",
        // 타입 선언이 없으면 정수/문자열 키를 그대로 보존
        KeyKind::Inline(_) | KeyKind::OutOfLine => "key PRIMARY KEY NOT NULL",
    };

    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (\n    {},\n    value_json TEXT NOT NULL\n);\n",
        spec.name, key_column
    );

    for idx in spec.indexes {
        sql.push_str(&format!(
            "CREATE {}INDEX IF NOT EXISTS \"idx_{}_{}\" ON \"{}\"({});\n",
            if idx.unique { "UNIQUE " } else { "" },
            spec.name,
            idx.name,
            spec.name,
            index_expr(idx.key_path)
        ));
    }

    sql
}

/// 전체 스키마 생성 SQL
pub fn create_schema_sql() -> String {
    Collection::ALL
        .iter()
        .map(|c| create_collection_sql(c.spec()))
        .collect::<Vec<_>>()
        .join("\n")
}
