use crate::error::{DetectionError, SinkError};
use crate::models::detection::DetectionRecord;
use crate::services::detector::{Detector, ImageSource};
use crate::services::store::{BroadcastHub, DetectionStore};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Async front of the detector: uploads in, records out.
///
/// Analysis is CPU-bound and runs on the blocking pool so the runtime keeps
/// serving other submissions.
#[derive(Clone)]
pub struct DetectionService {
    detector: Arc<Detector>,
    store: Arc<dyn DetectionStore>,
    hub: BroadcastHub,
}

impl DetectionService {
    /// `store` is read for history; `hub` is the one the detector's sink
    /// broadcasts on
    pub fn new(detector: Arc<Detector>, store: Arc<dyn DetectionStore>, hub: BroadcastHub) -> Self {
        Self {
            detector,
            store,
            hub,
        }
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    /// Analyze one encoded screenshot. The timestamp is taken at submission.
    pub async fn submit(&self, bytes: Vec<u8>, image_path: String) -> Result<DetectionRecord, DetectionError> {
        let now = Utc::now();
        let detector = Arc::clone(&self.detector);

        tokio::task::spawn_blocking(move || detector.analyze(ImageSource::Encoded(&bytes), &image_path, now))
            .await
            .map_err(|e| DetectionError::Worker(e.to_string()))?
    }

    /// All stored records in append order
    pub fn history(&self) -> Result<Vec<DetectionRecord>, SinkError> {
        self.store.load_all()
    }

    /// Real-time feed of newly stored records
    pub fn subscribe(&self) -> broadcast::Receiver<DetectionRecord> {
        self.hub.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use crate::models::config::{DetectorConfig, INVENTORY_PANEL};
    use crate::services::ocr::OcrEngine;
    use crate::services::store::{MemoryStore, PersistAndBroadcast};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    struct FixedEngine(&'static str);

    impl OcrEngine for FixedEngine {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
            Ok(self.0.to_string())
        }
    }

    fn service(text: &'static str) -> DetectionService {
        let hub = BroadcastHub::new(16);
        let sink = Arc::new(PersistAndBroadcast::new(MemoryStore::new(), hub.clone()));
        let detector = Detector::new(&DetectorConfig::default(), Arc::new(FixedEngine(text)), sink.clone()).unwrap();

        DetectionService::new(Arc::new(detector), sink, hub)
    }

    /// 400x300 screenshot with a busy inventory panel on the right
    fn screenshot_png() -> Vec<u8> {
        let image = RgbImage::from_fn(400, 300, |x, y| {
            if x >= 260 && (x / 4 + y / 4) % 2 == 0 {
                Rgb([240, 220, 180])
            } else {
                Rgb([20, 20, 28])
            }
        });

        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn test_submit_stores_and_broadcasts() {
        let service = service("Combat Power: 1,234,567");
        let mut rx = service.subscribe();

        let record = service
            .submit(screenshot_png(), "/uploads/shot.png".to_string())
            .await
            .unwrap();

        assert_eq!(record.combat_power.as_deref(), Some("1234567"));
        assert_eq!(record.is_visible(INVENTORY_PANEL), Some(true));

        assert_eq!(rx.recv().await.unwrap(), record);
        assert_eq!(service.history().unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_concurrent_submissions() {
        let service = service("Combat Power 5000");
        let bytes = screenshot_png();

        let submissions = (0..8).map(|i| {
            let service = service.clone();
            let bytes = bytes.clone();
            async move { service.submit(bytes, format!("shot-{}.png", i)).await }
        });
        let records: Vec<_> = spawn_all(submissions).await;

        let mut ids: Vec<_> = records.iter().map(|r| r.as_ref().unwrap().id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);
        assert_eq!(service.history().unwrap().len(), 8);
    }

    async fn spawn_all<F, T>(futures: impl IntoIterator<Item = F>) -> Vec<T>
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handles: Vec<_> = futures.into_iter().map(tokio::spawn).collect();
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    }

    #[test]
    fn test_submit_rejects_garbage() {
        let service = service("123");

        let result = tokio_test::block_on(service.submit(b"GIF89a-not-really".to_vec(), "bad.gif".to_string()));

        assert!(matches!(result, Err(DetectionError::Decode(_))));
        assert!(service.history().unwrap().is_empty());
    }

    #[test]
    fn test_history_starts_empty() {
        let service = service("");
        assert!(service.history().unwrap().is_empty());
        assert_eq!(service.detector().regions().len(), 3);
    }
}
