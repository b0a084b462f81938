//! Scene history helpers
//!
//! 저장소는 씬 기록을 평평한 행으로만 다룬다. 비트 묶음과 요약 청크 계산은
//! 여기서 메모리 상에서 수행한다.

use std::collections::HashSet;

use crate::models::{EntryKind, SceneEntry, SceneSummary};

/// 요약 한 건이 덮는 행동 수
pub const ACTIONS_PER_CHUNK: usize = 10;

/// 하나의 서사 비트: 직전 행동, 씬, 그 씬의 삽화들
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneBeat {
    pub scene_id: Option<String>,
    pub action: Option<SceneEntry>,
    pub scene: Option<SceneEntry>,
    pub images: Vec<SceneEntry>,
}

/// 기록을 비트 단위로 묶는다.
///
/// 행동은 다음 씬과 같은 비트가 되고, 삽화는 sceneId가 같은 비트에 붙는다.
/// 씬이 아직 없는 마지막 행동은 씬 없는 비트로 남는다.
pub fn group_beats(entries: &[SceneEntry]) -> Vec<SceneBeat> {
    let mut beats: Vec<SceneBeat> = Vec::new();
    let mut pending_action: Option<SceneEntry> = None;

    for entry in entries {
        match entry.kind {
            EntryKind::Action => {
                if let Some(prev) = pending_action.take() {
                    beats.push(SceneBeat {
                        action: Some(prev),
                        ..SceneBeat::default()
                    });
                }
                pending_action = Some(entry.clone());
            }
            EntryKind::Scene => beats.push(SceneBeat {
                scene_id: entry.scene_id.clone(),
                action: pending_action.take(),
                scene: Some(entry.clone()),
                images: Vec::new(),
            }),
            EntryKind::Image => {
                let target = beats
                    .iter_mut()
                    .rev()
                    .find(|b| b.scene_id.is_some() && b.scene_id == entry.scene_id);
                match target {
                    Some(beat) => beat.images.push(entry.clone()),
                    None => log::debug!("Orphan image entry {:?} (sceneId {:?})", entry.entry_id, entry.scene_id),
                }
            }
        }
    }

    if let Some(action) = pending_action {
        beats.push(SceneBeat {
            action: Some(action),
            ..SceneBeat::default()
        });
    }

    beats
}

/// 요약 청크 하나의 범위
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkWindow {
    pub chunk_index: i64,
    /// 이 청크에 속한 행동과 그 사이의 씬 기록
    pub entries: Vec<SceneEntry>,
}

/// 요약이 필요한 청크 계산.
///
/// 청크 k는 k*10 ~ k*10+9번째 행동과, 그 행동들 다음에 이어지는 씬까지 포함한다.
/// 행동 10개가 모두 찬 청크 중 요약이 없는 것만 반환한다.
pub fn plan_summary_chunks(entries: &[SceneEntry], summaries: &[SceneSummary]) -> Vec<ChunkWindow> {
    let done: HashSet<i64> = summaries.iter().map(|s| s.chunk_index).collect();

    let mut windows: Vec<ChunkWindow> = Vec::new();
    let mut current: Vec<SceneEntry> = Vec::new();
    let mut actions_in_current = 0usize;
    let mut chunk_index = 0i64;

    for entry in entries.iter().filter(|e| e.kind != EntryKind::Image) {
        if entry.kind == EntryKind::Action {
            if actions_in_current == ACTIONS_PER_CHUNK {
                windows.push(ChunkWindow {
                    chunk_index,
                    entries: std::mem::take(&mut current),
                });
                chunk_index += 1;
                actions_in_current = 0;
            }
            actions_in_current += 1;
        }
        current.push(entry.clone());
    }

    if actions_in_current == ACTIONS_PER_CHUNK {
        windows.push(ChunkWindow {
            chunk_index,
            entries: current,
        });
    }

    windows.retain(|w| !done.contains(&w.chunk_index));
    windows
}
