//! Archive Import/Export
//!
//! 전체 컬렉션을 zip 하나로 내보내고 다시 가져온다.
//!
//! 구성:
//! - `manifest.json`: 버전, 스키마 버전, 컬렉션 목록, 추출 이미지의 MIME
//! - `data/<collection>.json`: `[{ key, value }]`
//! - `images/<collection>/<n>.<ext>`: 레코드 안의 `data:image/...;base64,` 문자열을
//!   떼어낸 바이너리. 레코드에는 `"__EXTERNAL__<경로>"`가 대신 들어간다.
//!
//! 원래부터 `__EXTERNAL__`(또는 `__LITERAL__`)로 시작하는 문자열은 내보낼 때
//! `__LITERAL__`을 앞에 붙이고, 가져올 때 한 번 벗겨낸다.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::db::kv::{self, StoreKey};
use crate::db::schema::{Collection, DB_VERSION};
use crate::db::{now_millis, Database};
use crate::error::{StoreError, StoreResult};

pub const ARCHIVE_VERSION: u32 = 1;
pub const EXTERNAL_PREFIX: &str = "__EXTERNAL__";
pub const LITERAL_PREFIX: &str = "__LITERAL__";

const MANIFEST_PATH: &str = "manifest.json";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArchiveManifest {
    version: u32,
    created_at: i64,
    schema_version: u32,
    collections: Vec<String>,
    /// 이미지 경로 → MIME 타입
    #[serde(default)]
    images: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ArchiveRecord {
    key: StoreKey,
    value: Value,
}

/// 가져오기/내보내기 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub collections: usize,
    pub records: usize,
    pub images: usize,
}

/// 안전 가져오기 결과
#[derive(Debug, Clone)]
pub struct SafeImportReport {
    pub summary: ArchiveSummary,
    pub backup_path: PathBuf,
}

fn data_path(collection: Collection) -> String {
    format!("data/{}.json", collection.name())
}

/// `data:image/png;base64,....` → (MIME, payload)
fn split_data_url(s: &str) -> Option<(&str, &str)> {
    let rest = s.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    if !mime.starts_with("image/") {
        return None;
    }
    Some((mime, payload))
}

fn needs_escape(s: &str) -> bool {
    s.starts_with(EXTERNAL_PREFIX) || s.starts_with(LITERAL_PREFIX)
}

fn extension_for(mime: &str) -> String {
    let subtype = mime.trim_start_matches("image/");
    match subtype {
        "jpeg" => "jpg".to_string(),
        other => other
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect(),
    }
}

/// 이미지 추출기 (내보내기 중 상태)
struct ImageExtractor<'a, W: Write + Seek> {
    zip: &'a mut ZipWriter<W>,
    options: SimpleFileOptions,
    mimes: BTreeMap<String, String>,
    counter: usize,
}

impl<'a, W: Write + Seek> ImageExtractor<'a, W> {
    fn extract(&mut self, collection: Collection, value: &mut Value) -> StoreResult<()> {
        match value {
            Value::String(s) => {
                if needs_escape(s) {
                    s.insert_str(0, LITERAL_PREFIX);
                    return Ok(());
                }
                let Some((mime, payload)) = split_data_url(s) else {
                    return Ok(());
                };
                let bytes = match general_purpose::STANDARD.decode(payload) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        log::warn!("Keeping undecodable inline image in {}: {}", collection.name(), e);
                        return Ok(());
                    }
                };

                self.counter += 1;
                let path = format!(
                    "images/{}/{}.{}",
                    collection.name(),
                    self.counter,
                    extension_for(mime)
                );
                self.mimes.insert(path.clone(), mime.to_string());
                self.zip.start_file(path.as_str(), self.options)?;
                self.zip.write_all(&bytes)?;
                *s = format!("{}{}", EXTERNAL_PREFIX, path);
            }
            Value::Array(items) => {
                for item in items {
                    self.extract(collection, item)?;
                }
            }
            Value::Object(map) => {
                for (_, item) in map.iter_mut() {
                    self.extract(collection, item)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// `__EXTERNAL__` 자리표시자를 data URL로 되돌린다. 되돌린 수 반환
fn resolve_placeholders<R: Read + Seek>(
    value: &mut Value,
    archive: &mut ZipArchive<R>,
    mimes: &BTreeMap<String, String>,
) -> StoreResult<usize> {
    match value {
        Value::String(s) => {
            if let Some(literal) = s.strip_prefix(LITERAL_PREFIX) {
                let literal = literal.to_string();
                *s = literal;
                return Ok(0);
            }
            // 매니페스트에 기록된 경로만 이미지 자리표시자로 본다
            let Some((path, mime)) = s
                .strip_prefix(EXTERNAL_PREFIX)
                .and_then(|path| mimes.get_key_value(path))
            else {
                return Ok(0);
            };

            let mut bytes = Vec::new();
            archive.by_name(path)?.read_to_end(&mut bytes)?;
            *s = format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(bytes));
            Ok(1)
        }
        Value::Array(items) => {
            let mut n = 0;
            for item in items {
                n += resolve_placeholders(item, archive, mimes)?;
            }
            Ok(n)
        }
        Value::Object(map) => {
            let mut n = 0;
            for (_, item) in map.iter_mut() {
                n += resolve_placeholders(item, archive, mimes)?;
            }
            Ok(n)
        }
        _ => Ok(0),
    }
}

fn read_entry_string<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> StoreResult<String> {
    let mut text = String::new();
    archive.by_name(name)?.read_to_string(&mut text)?;
    Ok(text)
}

impl Database {
    /// 전체 컬렉션을 zip으로 내보내기
    pub fn export_archive<W: Write + Seek>(&self, writer: W) -> StoreResult<ArchiveSummary> {
        let conn = self.conn()?;
        let mut zip = ZipWriter::new(writer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut summary = ArchiveSummary::default();
        let mut dumps: Vec<(Collection, Vec<ArchiveRecord>)> = Vec::new();
        let mut extractor = ImageExtractor {
            zip: &mut zip,
            options,
            mimes: BTreeMap::new(),
            counter: 0,
        };

        for collection in Collection::ALL {
            let mut records = Vec::new();
            for (key, mut value) in kv::get_all_entries(conn, collection)? {
                extractor.extract(collection, &mut value)?;
                records.push(ArchiveRecord { key, value });
            }
            summary.records += records.len();
            dumps.push((collection, records));
        }
        summary.images = extractor.counter;
        let mimes = extractor.mimes;

        for (collection, records) in &dumps {
            zip.start_file(data_path(*collection).as_str(), options)?;
            zip.write_all(&serde_json::to_vec(records)?)?;
        }
        summary.collections = dumps.len();

        let manifest = ArchiveManifest {
            version: ARCHIVE_VERSION,
            created_at: now_millis(),
            schema_version: DB_VERSION,
            collections: dumps.iter().map(|(c, _)| c.name().to_string()).collect(),
            images: mimes,
        };
        zip.start_file(MANIFEST_PATH, options)?;
        zip.write_all(serde_json::to_string_pretty(&manifest)?.as_bytes())?;
        zip.finish()?;

        log::info!(
            "Exported archive: {} records, {} images",
            summary.records,
            summary.images
        );
        Ok(summary)
    }

    pub fn export_archive_to_file(&self, out_path: &Path) -> StoreResult<ArchiveSummary> {
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.export_archive(File::create(out_path)?)
    }

    /// zip을 읽어 포함된 컬렉션을 통째로 교체. 전체가 하나의 트랜잭션
    pub fn import_archive<R: Read + Seek>(&self, reader: R) -> StoreResult<ArchiveSummary> {
        // 열려 있지 않으면 파일을 읽기 전에 실패
        self.conn()?;

        let mut archive = ZipArchive::new(reader)?;
        let manifest: ArchiveManifest = serde_json::from_str(&read_entry_string(&mut archive, MANIFEST_PATH)?)?;

        if manifest.version > ARCHIVE_VERSION || manifest.schema_version > DB_VERSION {
            return Err(StoreError::InvalidArchive(format!(
                "archive v{} (schema v{}) is newer than this app (v{}, schema v{})",
                manifest.version, manifest.schema_version, ARCHIVE_VERSION, DB_VERSION
            )));
        }

        let mut summary = ArchiveSummary::default();
        let mut loaded: Vec<(Collection, Vec<ArchiveRecord>)> = Vec::new();

        for name in &manifest.collections {
            let Some(collection) = Collection::from_name(name) else {
                log::warn!("Skipping unknown collection in archive: {}", name);
                continue;
            };
            let mut records: Vec<ArchiveRecord> =
                serde_json::from_str(&read_entry_string(&mut archive, &data_path(collection))?)?;
            for record in &mut records {
                summary.images += resolve_placeholders(&mut record.value, &mut archive, &manifest.images)?;
            }
            summary.records += records.len();
            loaded.push((collection, records));
        }
        summary.collections = loaded.len();

        self.in_transaction(|conn| {
            for (collection, records) in &loaded {
                kv::clear(conn, *collection)?;
                for record in records {
                    kv::put_raw(conn, *collection, &record.key, &record.value)?;
                }
            }
            Ok(())
        })?;

        log::info!(
            "Imported archive: {} collections, {} records, {} images",
            summary.collections,
            summary.records,
            summary.images
        );
        Ok(summary)
    }

    /// 가져오기 전에 현재 DB를 backup_dir에 백업
    pub fn import_archive_safe(&self, archive_path: &Path, backup_dir: &Path) -> StoreResult<SafeImportReport> {
        let backup_path = backup_dir.join(format!("backup-before-import-{}.db", now_millis()));
        self.backup_to_file(&backup_path)?;

        let summary = self.import_archive(File::open(archive_path)?)?;
        Ok(SafeImportReport { summary, backup_path })
    }
}
