//! Request cancellation
//!
//! 씬/이미지 생성 요청마다 새 중단 핸들을 끼워 넣고, 사용자가 취소하면
//! 현재 핸들만 발화한다. 이미 예약된 저장소 쓰기는 취소 대상이 아니다.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::error::{StoreError, StoreResult};

#[derive(Debug)]
struct AbortHandle {
    label: String,
    tx: Option<oneshot::Sender<()>>,
}

impl AbortHandle {
    fn abort(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// 요청 하나가 받는 취소 신호
#[derive(Debug)]
pub struct CancelSignal {
    label: String,
    rx: oneshot::Receiver<()>,
}

impl CancelSignal {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// future를 실행하되 취소되면 `StoreError::Cancelled`
    pub async fn guard<F: Future>(self, fut: F) -> StoreResult<F::Output> {
        let CancelSignal { label, rx } = self;
        let fired = async move {
            // 핸들이 교체되어 버려진 경우는 취소가 아니다
            if rx.await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        tokio::select! {
            out = fut => Ok(out),
            () = fired => Err(StoreError::Cancelled(label)),
        }
    }
}

/// 공유 취소 슬롯 (한 번에 하나의 요청)
#[derive(Clone, Default)]
pub struct RequestCanceller {
    current: Arc<Mutex<Option<AbortHandle>>>,
}

impl RequestCanceller {
    pub fn new() -> Self {
        Self::default()
    }

    // poison 이후에도 슬롯 값은 항상 유효하다
    fn slot(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 새 요청 시작. 이전 핸들은 발화하지 않고 교체한다
    pub fn begin(&self, label: &str) -> CancelSignal {
        let (tx, rx) = oneshot::channel();
        *self.slot() = Some(AbortHandle {
            label: label.to_string(),
            tx: Some(tx),
        });
        CancelSignal {
            label: label.to_string(),
            rx,
        }
    }

    /// 현재 요청 취소. 취소한 요청 라벨 반환
    pub fn cancel_current(&self) -> Option<String> {
        let mut handle = self.slot().take()?;
        handle.abort();
        log::info!("Cancelled request: {}", handle.label);
        Some(handle.label)
    }

    /// 요청 정상 종료
    pub fn finish(&self) {
        self.slot().take();
    }

    pub fn is_active(&self) -> bool {
        self.slot().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_stops_request() {
        let canceller = RequestCanceller::new();
        let signal = canceller.begin("scene");
        assert!(canceller.is_active());

        let c2 = canceller.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            c2.cancel_current();
        });

        let result = signal
            .guard(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "never"
            })
            .await;
        assert!(matches!(result, Err(StoreError::Cancelled(label)) if label == "scene"));
        assert!(!canceller.is_active());
    }

    #[tokio::test]
    async fn test_completed_request_and_swap() {
        let canceller = RequestCanceller::new();
        let old = canceller.begin("image-1");
        let new = canceller.begin("image-2");

        // 교체된 이전 요청은 취소되지 않고 끝까지 실행된다
        assert_eq!(old.guard(async { 1 }).await.unwrap(), 1);
        assert_eq!(canceller.cancel_current().as_deref(), Some("image-2"));
        assert!(new.guard(std::future::pending::<()>()).await.is_err());

        assert_eq!(canceller.cancel_current(), None);
        canceller.begin("scene");
        canceller.finish();
        assert!(!canceller.is_active());
    }

    #[tokio::test]
    async fn test_poisoned_slot_still_cancels() {
        let canceller = RequestCanceller::new();
        let shared = canceller.clone();
        let _ = std::thread::spawn(move || {
            let _guard = shared.current.lock().unwrap();
            panic!("poison the slot");
        })
        .join();
        assert!(canceller.current.is_poisoned());

        let signal = canceller.begin("scene");
        assert!(canceller.is_active());
        assert_eq!(canceller.cancel_current().as_deref(), Some("scene"));
        assert!(matches!(
            signal.guard(std::future::pending::<()>()).await,
            Err(StoreError::Cancelled(_))
        ));
    }
}
