//! Key-Value Store
//!
//! 컬렉션 단위의 get / getAll / put / add / delete / clear.
//! 모든 함수는 `&Connection`을 받으므로 트랜잭션 안에서도 그대로 사용할 수 있다.
//!
//! 인라인 키 컬렉션은 쓰기 시 키 필드를 `key` 컬럼으로 옮기고,
//! 읽기 시 다시 레코드에 주입한다.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::schema::{find_index, index_expr, Collection, CollectionSpec, KeyKind, RowOrder};
use crate::error::{StoreError, StoreResult};

/// 레코드 키 (정수 또는 문자열)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreKey {
    Int(i64),
    Text(String),
}

impl StoreKey {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            StoreKey::Int(v) => Some(*v),
            StoreKey::Text(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            StoreKey::Int(v) => Value::from(*v),
            StoreKey::Text(s) => Value::from(s.as_str()),
        }
    }

    /// JSON 값에서 키 추출. null/기타 타입은 키가 없는 것으로 본다.
    pub fn from_json(value: &Value) -> Option<StoreKey> {
        match value {
            Value::Number(n) => n.as_i64().map(StoreKey::Int),
            Value::String(s) => Some(StoreKey::Text(s.clone())),
            _ => None,
        }
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKey::Int(v) => write!(f, "{}", v),
            StoreKey::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for StoreKey {
    fn from(v: i64) -> Self {
        StoreKey::Int(v)
    }
}

impl From<&str> for StoreKey {
    fn from(v: &str) -> Self {
        StoreKey::Text(v.to_string())
    }
}

impl From<String> for StoreKey {
    fn from(v: String) -> Self {
        StoreKey::Text(v)
    }
}

impl ToSql for StoreKey {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            StoreKey::Int(v) => ToSqlOutput::from(*v),
            StoreKey::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

impl FromSql for StoreKey {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(v) => Ok(StoreKey::Int(v)),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .map(|s| StoreKey::Text(s.to_string()))
                .map_err(|e| FromSqlError::Other(Box::new(e))),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

fn key_path(spec: &CollectionSpec) -> Option<&'static str> {
    match spec.key {
        KeyKind::AutoIncrement(path) | KeyKind::Inline(path) => Some(path),
        KeyKind::OutOfLine => None,
    }
}

fn order_clause(spec: &CollectionSpec) -> &'static str {
    match spec.order {
        RowOrder::Key => "ORDER BY key",
        RowOrder::Insertion => "ORDER BY rowid",
    }
}

/// 저장된 JSON에 키를 주입해 레코드로 복원
fn hydrate(spec: &CollectionSpec, key: StoreKey, value_json: &str) -> StoreResult<Value> {
    let mut record: Value = serde_json::from_str(value_json)?;
    if let (Some(path), Some(obj)) = (key_path(spec), record.as_object_mut()) {
        obj.insert(path.to_string(), key.to_json());
    }
    Ok(record)
}

/// 인라인 키 필드를 분리. 반환: (키, 키가 제거된 JSON 문자열)
fn split_inline_key(spec: &CollectionSpec, record: &Value) -> StoreResult<(Option<StoreKey>, String)> {
    let path = key_path(spec).ok_or_else(|| {
        StoreError::InvalidOperation(format!(
            "collection '{}' uses out-of-line keys; use put_with_key",
            spec.name
        ))
    })?;

    let obj = record.as_object().ok_or_else(|| {
        StoreError::InvalidOperation(format!("record for '{}' must be a JSON object", spec.name))
    })?;

    let key = obj.get(path).and_then(StoreKey::from_json);
    let mut stripped = obj.clone();
    stripped.remove(path);
    Ok((key, serde_json::to_string(&Value::Object(stripped))?))
}

fn insert_generated(conn: &Connection, spec: &CollectionSpec, value_json: &str) -> StoreResult<StoreKey> {
    conn.execute(
        &format!("INSERT INTO \"{}\" (key, value_json) VALUES (NULL, ?1)", spec.name),
        [value_json],
    )?;
    Ok(StoreKey::Int(conn.last_insert_rowid()))
}

fn upsert(conn: &Connection, spec: &CollectionSpec, key: &StoreKey, value_json: &str) -> StoreResult<()> {
    // INSERT OR REPLACE는 rowid를 바꾸므로 삽입 순서 컬렉션에서는 upsert를 쓴다
    conn.execute(
        &format!(
            "INSERT INTO \"{}\" (key, value_json) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
            spec.name
        ),
        params![key, value_json],
    )?;
    Ok(())
}

fn missing_key(spec: &CollectionSpec) -> StoreError {
    StoreError::InvalidOperation(format!(
        "record for '{}' is missing its key path '{}'",
        spec.name,
        key_path(spec).unwrap_or("")
    ))
}

/// 단건 조회
pub fn get(conn: &Connection, collection: Collection, key: &StoreKey) -> StoreResult<Option<Value>> {
    let spec = collection.spec();
    let value_json: Option<String> = conn
        .query_row(
            &format!("SELECT value_json FROM \"{}\" WHERE key = ?1", spec.name),
            [key],
            |row| row.get(0),
        )
        .optional()?;

    value_json
        .map(|json| hydrate(spec, key.clone(), &json))
        .transpose()
}

/// 전체 조회
pub fn get_all(conn: &Connection, collection: Collection) -> StoreResult<Vec<Value>> {
    let spec = collection.spec();
    let mut stmt = conn.prepare(&format!(
        "SELECT key, value_json FROM \"{}\" {}",
        spec.name,
        order_clause(spec)
    ))?;

    let rows = stmt.query_map([], |row| Ok((row.get::<_, StoreKey>(0)?, row.get::<_, String>(1)?)))?;

    let mut out = Vec::new();
    for row in rows {
        let (key, json) = row?;
        out.push(hydrate(spec, key, &json)?);
    }
    Ok(out)
}

/// 키와 함께 전체 조회 (아카이브 내보내기용)
pub fn get_all_entries(conn: &Connection, collection: Collection) -> StoreResult<Vec<(StoreKey, Value)>> {
    let spec = collection.spec();
    let mut stmt = conn.prepare(&format!(
        "SELECT key, value_json FROM \"{}\" {}",
        spec.name,
        order_clause(spec)
    ))?;

    let rows = stmt.query_map([], |row| Ok((row.get::<_, StoreKey>(0)?, row.get::<_, String>(1)?)))?;

    let mut out = Vec::new();
    for row in rows {
        let (key, json) = row?;
        let record = hydrate(spec, key.clone(), &json)?;
        out.push((key, record));
    }
    Ok(out)
}

fn index_path(collection: Collection, index_name: &str) -> StoreResult<&'static str> {
    find_index(collection.spec(), index_name)
        .map(|idx| idx.key_path)
        .ok_or_else(|| {
            StoreError::InvalidOperation(format!(
                "collection '{}' has no index '{}'",
                collection.name(),
                index_name
            ))
        })
}

/// 보조 인덱스 값으로 조회 (컬렉션 순서 유지)
pub fn get_all_by_index(
    conn: &Connection,
    collection: Collection,
    index_name: &str,
    value: &dyn ToSql,
) -> StoreResult<Vec<Value>> {
    let spec = collection.spec();
    let path = index_path(collection, index_name)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT key, value_json FROM \"{}\" WHERE {} = ?1 {}",
        spec.name,
        index_expr(path),
        order_clause(spec)
    ))?;

    let rows = stmt.query_map([value], |row| Ok((row.get::<_, StoreKey>(0)?, row.get::<_, String>(1)?)))?;

    let mut out = Vec::new();
    for row in rows {
        let (key, json) = row?;
        out.push(hydrate(spec, key, &json)?);
    }
    Ok(out)
}

/// 보조 인덱스 값으로 삭제. 삭제된 행 수 반환
pub fn delete_by_index(
    conn: &Connection,
    collection: Collection,
    index_name: &str,
    value: &dyn ToSql,
) -> StoreResult<usize> {
    let path = index_path(collection, index_name)?;
    let removed = conn.execute(
        &format!(
            "DELETE FROM \"{}\" WHERE {} = ?1",
            collection.name(),
            index_expr(path)
        ),
        [value],
    )?;
    Ok(removed)
}

/// 인라인 키 컬렉션에 저장 (있으면 덮어씀). 자동 증가 컬렉션에서 키가 없으면 add와 같다.
pub fn put(conn: &Connection, collection: Collection, record: &Value) -> StoreResult<StoreKey> {
    let spec = collection.spec();
    let (key, value_json) = split_inline_key(spec, record)?;

    match (key, spec.key) {
        (Some(key), _) => {
            upsert(conn, spec, &key, &value_json)?;
            Ok(key)
        }
        (None, KeyKind::AutoIncrement(_)) => insert_generated(conn, spec, &value_json),
        (None, _) => Err(missing_key(spec)),
    }
}

/// 인라인 키 컬렉션에 신규 추가. 키가 이미 있으면 드라이버 제약 에러
pub fn add(conn: &Connection, collection: Collection, record: &Value) -> StoreResult<StoreKey> {
    let spec = collection.spec();
    let (key, value_json) = split_inline_key(spec, record)?;

    match (key, spec.key) {
        (Some(key), _) => {
            conn.execute(
                &format!("INSERT INTO \"{}\" (key, value_json) VALUES (?1, ?2)", spec.name),
                params![key, value_json],
            )?;
            Ok(key)
        }
        (None, KeyKind::AutoIncrement(_)) => insert_generated(conn, spec, &value_json),
        (None, _) => Err(missing_key(spec)),
    }
}

/// 레코드 밖의 키로 저장 (단일 blob 컬렉션)
pub fn put_with_key(conn: &Connection, collection: Collection, key: &StoreKey, record: &Value) -> StoreResult<()> {
    let spec = collection.spec();
    if spec.key != KeyKind::OutOfLine {
        return Err(StoreError::InvalidOperation(format!(
            "collection '{}' uses inline keys; use put",
            spec.name
        )));
    }
    upsert(conn, spec, key, &serde_json::to_string(record)?)
}

/// 아카이브 복원용: 키 종류와 무관하게 그대로 기록
pub fn put_raw(conn: &Connection, collection: Collection, key: &StoreKey, record: &Value) -> StoreResult<()> {
    let spec = collection.spec();
    let value_json = match key_path(spec) {
        Some(_) => split_inline_key(spec, record)?.1,
        None => serde_json::to_string(record)?,
    };
    upsert(conn, spec, key, &value_json)
}

/// 단건 삭제. 없는 키는 아무 일도 하지 않는다
pub fn delete(conn: &Connection, collection: Collection, key: &StoreKey) -> StoreResult<()> {
    conn.execute(
        &format!("DELETE FROM \"{}\" WHERE key = ?1", collection.name()),
        [key],
    )?;
    Ok(())
}

/// 컬렉션 비우기
pub fn clear(conn: &Connection, collection: Collection) -> StoreResult<()> {
    conn.execute(&format!("DELETE FROM \"{}\"", collection.name()), [])?;
    Ok(())
}

/// 레코드 수
pub fn count(conn: &Connection, collection: Collection) -> StoreResult<i64> {
    let n = conn.query_row(
        &format!("SELECT COUNT(*) FROM \"{}\"", collection.name()),
        [],
        |row| row.get(0),
    )?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::create_schema_sql;
    use serde_json::json;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&create_schema_sql()).unwrap();
        conn
    }

    #[test]
    fn test_add_generates_increasing_keys_and_injects_them() {
        let conn = conn();
        let k1 = add(&conn, Collection::Parties, &json!({"name": "A"})).unwrap();
        let k2 = add(&conn, Collection::Parties, &json!({"name": "B"})).unwrap();
        assert_eq!(k1, StoreKey::Int(1));
        assert_eq!(k2, StoreKey::Int(2));

        let rec = get(&conn, Collection::Parties, &k2).unwrap().unwrap();
        assert_eq!(rec["partyId"], json!(2));
        assert_eq!(rec["name"], json!("B"));
    }

    #[test]
    fn test_put_overwrites_and_add_rejects_existing_key() {
        let conn = conn();
        put(&conn, Collection::UniversalSaves, &json!({"slotIndex": 1, "data": null})).unwrap();
        put(&conn, Collection::UniversalSaves, &json!({"slotIndex": 1, "data": {"x": 1}})).unwrap();
        assert_eq!(count(&conn, Collection::UniversalSaves).unwrap(), 1);
        let rec = get(&conn, Collection::UniversalSaves, &StoreKey::Int(1)).unwrap().unwrap();
        assert_eq!(rec["data"]["x"], json!(1));

        let err = add(&conn, Collection::UniversalSaves, &json!({"slotIndex": 1})).unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn test_inline_key_required_when_not_auto_increment() {
        let conn = conn();
        let err = put(&conn, Collection::UniversalSaves, &json!({"data": null})).unwrap_err();
        assert!(matches!(err, StoreError::InvalidOperation(_)));
    }

    #[test]
    fn test_out_of_line_blob() {
        let conn = conn();
        let key = StoreKey::from("wizardData");
        put_with_key(&conn, Collection::WizardState, &key, &json!({"step": 2})).unwrap();
        assert_eq!(get(&conn, Collection::WizardState, &key).unwrap(), Some(json!({"step": 2})));

        let err = put(&conn, Collection::WizardState, &json!({"step": 3})).unwrap_err();
        assert!(matches!(err, StoreError::InvalidOperation(_)));
    }

    #[test]
    fn test_index_query_and_delete() {
        let conn = conn();
        add(&conn, Collection::SceneEntries, &json!({"scenarioId": 1, "content": "a"})).unwrap();
        add(&conn, Collection::SceneEntries, &json!({"scenarioId": 2, "content": "b"})).unwrap();
        add(&conn, Collection::SceneEntries, &json!({"scenarioId": 1, "content": "c"})).unwrap();

        let rows = get_all_by_index(&conn, Collection::SceneEntries, "scenarioId", &1i64).unwrap();
        let contents: Vec<_> = rows.iter().map(|r| r["content"].as_str().unwrap()).collect();
        assert_eq!(contents, vec!["a", "c"]);

        let removed = delete_by_index(&conn, Collection::SceneEntries, "scenarioId", &1i64).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(count(&conn, Collection::SceneEntries).unwrap(), 1);

        let err = get_all_by_index(&conn, Collection::SceneEntries, "nope", &1i64).unwrap_err();
        assert!(matches!(err, StoreError::InvalidOperation(_)));
    }

    #[test]
    fn test_unique_index_violation_is_driver_error() {
        let conn = conn();
        add(&conn, Collection::SceneSummaries, &json!({"chunkIndex": 0})).unwrap();
        let err = add(&conn, Collection::SceneSummaries, &json!({"chunkIndex": 0})).unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn test_insertion_order_survives_update() {
        let conn = conn();
        put(&conn, Collection::Cards, &json!({"id": "b", "v": 1})).unwrap();
        put(&conn, Collection::Cards, &json!({"id": "a", "v": 1})).unwrap();
        put(&conn, Collection::Cards, &json!({"id": "b", "v": 2})).unwrap();

        let ids: Vec<_> = get_all(&conn, Collection::Cards)
            .unwrap()
            .into_iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_delete_missing_and_clear() {
        let conn = conn();
        delete(&conn, Collection::Parties, &StoreKey::Int(42)).unwrap();
        add(&conn, Collection::Parties, &json!({"name": "A"})).unwrap();
        clear(&conn, Collection::Parties).unwrap();
        assert!(get_all(&conn, Collection::Parties).unwrap().is_empty());
    }
}
