//! Exercise batch dispatch: fetch, dedupe, pace, and fan out media messages.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::catalog::ExerciseCatalog;
use crate::channel::MessagingGateway;
use crate::texts;
use crate::types::{DispatchReport, Language, MuscleGroup};

/// Per-user cancellation flags for in-flight dispatch batches.
///
/// The engine cancels a user's batch whenever it clears their session; the
/// dispatcher checks the flag before every send. Shared by value (cheap Arc
/// clone) so neither side owns the other.
#[derive(Clone, Default)]
pub struct CancelRegistry {
    flags: Arc<DashMap<String, Arc<AtomicBool>>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a batch for a user, replacing any earlier flag.
    fn begin(&self, user_id: &str) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        self.flags.insert(user_id.to_string(), flag.clone());
        flag
    }

    /// Signal the user's in-flight batch (if any) to stop.
    pub fn cancel(&self, user_id: &str) {
        if let Some(flag) = self.flags.get(user_id) {
            flag.store(true, Ordering::SeqCst);
        }
    }

    /// Drop the flag when its batch finishes, unless a newer batch replaced it.
    fn finish(&self, user_id: &str, flag: &Arc<AtomicBool>) {
        self.flags
            .remove_if(user_id, |_, current| Arc::ptr_eq(current, flag));
    }
}

/// Sends the exercise batch for a muscle-group selection.
pub struct ExerciseDispatcher {
    catalog: Arc<dyn ExerciseCatalog>,
    gateway: Arc<dyn MessagingGateway>,
    cancels: CancelRegistry,
    pacing: Duration,
}

impl ExerciseDispatcher {
    pub fn new(
        catalog: Arc<dyn ExerciseCatalog>,
        gateway: Arc<dyn MessagingGateway>,
        cancels: CancelRegistry,
        pacing: Duration,
    ) -> Self {
        Self {
            catalog,
            gateway,
            cancels,
            pacing,
        }
    }

    /// Send one captioned image per unique record, paced, stopping early if
    /// the batch is cancelled. Individual send failures are counted, not
    /// fatal. A live batch ends with the "what next" menu; an empty match
    /// gets a "not found" message instead.
    pub async fn dispatch(
        &self,
        user_id: &str,
        group: MuscleGroup,
        lang: Language,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        let records = match self.catalog.find_by_muscle_group(group) {
            Ok(records) => records,
            Err(e) => {
                warn!("Exercise catalog unavailable: {}", e);
                let _ = self
                    .gateway
                    .send_text(user_id, texts::generic_reprompt(lang))
                    .await;
                return report;
            }
        };

        // The same image must never go out twice in one batch.
        let mut seen = HashSet::new();
        let unique: Vec<_> = records
            .into_iter()
            .filter(|r| seen.insert(r.media_url.clone()))
            .collect();
        report.requested = unique.len();

        if unique.is_empty() {
            let _ = self
                .gateway
                .send_text(user_id, &texts::no_exercises_found(lang, group))
                .await;
            return report;
        }

        let flag = self.cancels.begin(user_id);
        for (index, record) in unique.iter().enumerate() {
            if flag.load(Ordering::SeqCst) {
                report.cancelled = true;
                info!(
                    "Dispatch for {} cancelled after {} of {} sends",
                    user_id, report.sent, report.requested
                );
                break;
            }
            if index > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            let caption = texts::exercise_caption(lang, record.name(lang), &record.equipment);
            match self
                .gateway
                .send_image(user_id, &record.media_url, &caption)
                .await
            {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    warn!("Failed to send exercise to {}: {}", user_id, e);
                    report.failed += 1;
                }
            }
        }
        self.cancels.finish(user_id, &flag);

        if !report.cancelled {
            let _ = self
                .gateway
                .send_buttons(
                    user_id,
                    texts::what_next(lang),
                    &texts::what_next_buttons(lang),
                )
                .await;
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ExerciseRecord;
    use crate::error::{GatewayError, StorageError};
    use crate::types::Button;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedCatalog {
        records: Vec<ExerciseRecord>,
    }

    impl ExerciseCatalog for FixedCatalog {
        fn find_by_muscle_group(
            &self,
            _group: MuscleGroup,
        ) -> Result<Vec<ExerciseRecord>, StorageError> {
            Ok(self.records.clone())
        }
    }

    struct FailingCatalog;

    impl ExerciseCatalog for FailingCatalog {
        fn find_by_muscle_group(
            &self,
            _group: MuscleGroup,
        ) -> Result<Vec<ExerciseRecord>, StorageError> {
            Err(StorageError::Unavailable("catalog down".into()))
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Text(String),
        Image(String),
        Buttons(String),
    }

    /// Recording gateway. Optionally cancels a batch after N image sends and
    /// fails sends whose media url contains a marker.
    struct FakeGateway {
        sent: Mutex<Vec<Sent>>,
        cancel_after: Option<(usize, CancelRegistry, String)>,
        fail_marker: Option<String>,
    }

    impl FakeGateway {
        fn recording() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                cancel_after: None,
                fail_marker: None,
            }
        }

        fn image_count(&self) -> usize {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|s| matches!(s, Sent::Image(_)))
                .count()
        }
    }

    #[async_trait]
    impl MessagingGateway for FakeGateway {
        async fn send_text(&self, _to: &str, body: &str) -> Result<(), GatewayError> {
            self.sent.lock().unwrap().push(Sent::Text(body.to_string()));
            Ok(())
        }

        async fn send_image(
            &self,
            _to: &str,
            media_url: &str,
            _caption: &str,
        ) -> Result<(), GatewayError> {
            if let Some(marker) = &self.fail_marker {
                if media_url.contains(marker) {
                    return Err(GatewayError::Api {
                        status: 500,
                        message: "boom".into(),
                    });
                }
            }
            self.sent
                .lock()
                .unwrap()
                .push(Sent::Image(media_url.to_string()));
            if let Some((after, cancels, user)) = &self.cancel_after {
                if self.image_count() >= *after {
                    cancels.cancel(user);
                }
            }
            Ok(())
        }

        async fn send_buttons(
            &self,
            _to: &str,
            body: &str,
            _buttons: &[Button],
        ) -> Result<(), GatewayError> {
            self.sent
                .lock()
                .unwrap()
                .push(Sent::Buttons(body.to_string()));
            Ok(())
        }
    }

    fn record(name: &str, url: &str) -> ExerciseRecord {
        ExerciseRecord {
            name_en: name.to_string(),
            name_es: name.to_string(),
            equipment: "Barbell".to_string(),
            media_url: url.to_string(),
            animation_url: None,
        }
    }

    fn dispatcher(
        records: Vec<ExerciseRecord>,
        gateway: Arc<FakeGateway>,
        cancels: CancelRegistry,
    ) -> ExerciseDispatcher {
        ExerciseDispatcher::new(
            Arc::new(FixedCatalog { records }),
            gateway,
            cancels,
            Duration::ZERO,
        )
    }

    #[tokio::test]
    async fn test_dedup_by_media_url() {
        let gateway = Arc::new(FakeGateway::recording());
        let d = dispatcher(
            vec![
                record("Bench Press", "https://cdn/a.gif"),
                record("Incline Press", "https://cdn/a.gif"),
                record("Push-ups", "https://cdn/b.gif"),
            ],
            gateway.clone(),
            CancelRegistry::new(),
        );

        let report = d.dispatch("u1", MuscleGroup::Chest, Language::En).await;
        assert_eq!(report.requested, 2);
        assert_eq!(report.sent, 2);
        assert_eq!(gateway.image_count(), 2);
    }

    #[tokio::test]
    async fn test_batch_ends_with_what_next_menu() {
        let gateway = Arc::new(FakeGateway::recording());
        let d = dispatcher(
            vec![record("Bench Press", "https://cdn/a.gif")],
            gateway.clone(),
            CancelRegistry::new(),
        );

        d.dispatch("u1", MuscleGroup::Chest, Language::En).await;
        let sent = gateway.sent.lock().unwrap();
        assert!(matches!(sent.last(), Some(Sent::Buttons(_))));
    }

    #[tokio::test]
    async fn test_no_records_sends_not_found_without_menu() {
        let gateway = Arc::new(FakeGateway::recording());
        let d = dispatcher(vec![], gateway.clone(), CancelRegistry::new());

        let report = d.dispatch("u1", MuscleGroup::Legs, Language::Es).await;
        assert_eq!(report.requested, 0);
        let sent = gateway.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], Sent::Text(t) if t.contains("Piernas")));
    }

    #[tokio::test]
    async fn test_cancellation_stops_remaining_sends() {
        let cancels = CancelRegistry::new();
        let gateway = Arc::new(FakeGateway {
            sent: Mutex::new(Vec::new()),
            cancel_after: Some((1, cancels.clone(), "u1".to_string())),
            fail_marker: None,
        });
        let records = (0..5)
            .map(|i| record(&format!("Ex {i}"), &format!("https://cdn/{i}.gif")))
            .collect();
        let d = dispatcher(records, gateway.clone(), cancels);

        let report = d.dispatch("u1", MuscleGroup::Chest, Language::En).await;
        assert!(report.cancelled);
        assert_eq!(report.sent, 1);
        assert_eq!(gateway.image_count(), 1);
        // No continuation menu after a cancelled batch.
        let sent = gateway.sent.lock().unwrap();
        assert!(!sent.iter().any(|s| matches!(s, Sent::Buttons(_))));
    }

    #[tokio::test]
    async fn test_individual_failure_does_not_abort_batch() {
        let gateway = Arc::new(FakeGateway {
            sent: Mutex::new(Vec::new()),
            cancel_after: None,
            fail_marker: Some("bad".to_string()),
        });
        let d = dispatcher(
            vec![
                record("One", "https://cdn/1.gif"),
                record("Bad", "https://cdn/bad.gif"),
                record("Three", "https://cdn/3.gif"),
            ],
            gateway.clone(),
            CancelRegistry::new(),
        );

        let report = d.dispatch("u1", MuscleGroup::Chest, Language::En).await;
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_catalog_failure_degrades_to_reprompt() {
        let gateway = Arc::new(FakeGateway::recording());
        let d = ExerciseDispatcher::new(
            Arc::new(FailingCatalog),
            gateway.clone(),
            CancelRegistry::new(),
            Duration::ZERO,
        );

        let report = d.dispatch("u1", MuscleGroup::Chest, Language::En).await;
        assert_eq!(report.sent, 0);
        let sent = gateway.sent.lock().unwrap();
        assert!(matches!(&sent[0], Sent::Text(_)));
    }

    #[test]
    fn test_cancel_registry_scoped_to_batch() {
        let cancels = CancelRegistry::new();
        let flag_a = cancels.begin("u1");
        let flag_b = cancels.begin("u1");

        // A new batch replaced the first flag; cancel hits the current one.
        cancels.cancel("u1");
        assert!(!flag_a.load(Ordering::SeqCst));
        assert!(flag_b.load(Ordering::SeqCst));

        cancels.finish("u1", &flag_b);
        // Cancelling with no live batch is a no-op.
        cancels.cancel("u1");
    }
}
