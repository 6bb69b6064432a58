use std::{future::Future, time::Duration};

use iota_common::{PayloadError, ShadowSnapshot, UpdateDocument};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShadowError {
    #[error("shadow request timed out after {0:?}")]
    Timeout(Duration),
    #[error("shadow request rejected ({code}): {message}")]
    Rejected { code: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("shadow channel closed")]
    Closed,
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

/// Inbound traffic the reconciler reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShadowEvent {
    /// The session was (re)established and subscriptions are in place.
    Connected,
    /// Raw body of a delta notification.
    Delta(Vec<u8>),
}

/// Request/response side of the remote shadow.
pub trait ShadowChannel: Send + Sync + 'static {
    fn update(&self, document: UpdateDocument) -> impl Future<Output = Result<(), ShadowError>> + Send;

    fn get(&self) -> impl Future<Output = Result<ShadowSnapshot, ShadowError>> + Send;
}

/// Runs one shadow call under `limit`. An expired call is not retried.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, ShadowError>
where
    F: Future<Output = Result<T, ShadowError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| ShadowError::Timeout(limit))?
}

#[cfg(test)]
pub mod fake {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex as StdMutex,
    };

    use serde_json::Value;

    use super::*;

    #[derive(Default)]
    pub struct FakeShadow {
        pub updates: StdMutex<Vec<Value>>,
        pub attempts: AtomicUsize,
        pub document: StdMutex<Option<Vec<u8>>>,
        pub delay: Option<Duration>,
    }

    impl FakeShadow {
        pub fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        pub fn with_document(document: Value) -> Self {
            let shadow = Self::default();
            *shadow.document.lock().unwrap() = Some(serde_json::to_vec(&document).unwrap());
            shadow
        }

        pub fn updates(&self) -> Vec<Value> {
            self.updates.lock().unwrap().clone()
        }

        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    impl ShadowChannel for FakeShadow {
        async fn update(&self, document: UpdateDocument) -> Result<(), ShadowError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.updates.lock().unwrap().push(serde_json::to_value(&document).unwrap());
            Ok(())
        }

        async fn get(&self) -> Result<ShadowSnapshot, ShadowError> {
            let document = self.document.lock().unwrap().clone();
            match document {
                Some(raw) => Ok(ShadowSnapshot::parse(&raw)?),
                None => Err(ShadowError::Rejected {
                    code: 404,
                    message: "No shadow exists".to_string(),
                }),
            }
        }
    }
}
