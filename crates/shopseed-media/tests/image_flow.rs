use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use shopseed_generate::RecordingSleeper;
use shopseed_media::{
    CallbackNotifier, ImageJobBackend, ImageOutcome, ImageRecords, ImageService, ImageSubject,
    ImageTarget, JobCallback, JobStatus, MediaError, MemoryObjectStore, ObjectStore,
    PollingNotifier, Result, Templates, WorkflowTemplate,
};

/// Job service that finishes every job on the first poll with a fixed PNG.
#[derive(Default)]
struct InstantJobs {
    workflows: Mutex<Vec<Value>>,
}

// "PNG" in base64.
const PAYLOAD: &str = "UE5H";

#[async_trait]
impl ImageJobBackend for InstantJobs {
    async fn start(&self, workflow: &Value) -> Result<String> {
        let mut workflows = self.workflows.lock().unwrap();
        workflows.push(workflow.clone());
        Ok(format!("job-{}", workflows.len()))
    }

    async fn status(&self, _job_id: &str) -> Result<JobStatus> {
        Ok(JobStatus::Completed {
            image: Some(PAYLOAD.to_string()),
        })
    }
}

#[derive(Default)]
struct RecordedUrls {
    urls: Mutex<Vec<(ImageTarget, String)>>,
}

#[async_trait]
impl ImageRecords for RecordedUrls {
    async fn set_image_url(&self, target: ImageTarget, url: &str) -> Result<()> {
        self.urls.lock().unwrap().push((target, url.to_string()));
        Ok(())
    }
}

fn templates() -> Templates {
    Templates {
        user: WorkflowTemplate::bundled(ImageSubject::User).unwrap(),
        product: WorkflowTemplate::bundled(ImageSubject::Product).unwrap(),
    }
}

#[tokio::test]
async fn polled_image_is_uploaded_and_linked() {
    let jobs = Arc::new(InstantJobs::default());
    let storage = Arc::new(MemoryObjectStore::default());
    let records = Arc::new(RecordedUrls::default());
    let notifier = PollingNotifier::new(
        jobs.clone(),
        Arc::new(RecordingSleeper::default()),
        60,
        Duration::from_secs(5),
    );
    let service = ImageService::new(
        Arc::new(notifier),
        storage.clone(),
        records.clone(),
        templates(),
    );

    let outcome = service
        .generate(ImageTarget::product(8), "red lamp\n\nproduct rendering, 1QQQ")
        .await
        .unwrap();

    let ImageOutcome::Stored { url } = outcome else {
        panic!("expected a stored image");
    };
    let keys = storage.keys();
    assert_eq!(keys.len(), 1);
    assert!(keys[0].starts_with("product_images/product_8_"));
    assert!(keys[0].ends_with(".png"));
    assert_eq!(storage.get(&keys[0]).unwrap(), b"PNG".to_vec());
    assert_eq!(
        *records.urls.lock().unwrap(),
        vec![(ImageTarget::product(8), url)]
    );

    let sent = jobs.workflows.lock().unwrap()[0].clone();
    assert_eq!(
        sent["input"]["workflow"]["74"]["inputs"]["string"],
        "red lamp\n\nproduct rendering, 1QQQ"
    );
}

#[tokio::test]
async fn callback_flow_stores_only_successful_results() {
    let storage = Arc::new(MemoryObjectStore::default());
    let records = Arc::new(RecordedUrls::default());
    let notifier = CallbackNotifier::new(Arc::new(InstantJobs::default()), "https://seed.example");
    let service = ImageService::new(
        Arc::new(notifier),
        storage.clone(),
        records.clone(),
        templates(),
    );

    let first = service.generate(ImageTarget::user(1), "a").await.unwrap();
    let second = service.generate(ImageTarget::user(2), "b").await.unwrap();
    assert_eq!(
        first,
        ImageOutcome::Pending {
            job_id: "job-1".to_string()
        }
    );
    assert!(storage.keys().is_empty());

    let stored = service
        .handle_callback(
            ImageSubject::User,
            &JobCallback {
                id: "job-1".to_string(),
                status: "failed".to_string(),
                image: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(stored, None);

    let ImageOutcome::Pending { job_id } = second else {
        panic!("expected a pending job");
    };
    let stored = service
        .handle_callback(
            ImageSubject::User,
            &JobCallback {
                id: job_id,
                status: "Success".to_string(),
                image: Some(PAYLOAD.to_string()),
            },
        )
        .await
        .unwrap();
    assert!(stored.is_some());

    let urls = records.urls.lock().unwrap();
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].0, ImageTarget::user(2));
    assert!(storage.keys()[0].starts_with("user_images/user_2_"));
}

#[tokio::test]
async fn undecodable_payload_is_an_error() {
    struct BrokenJobs;

    #[async_trait]
    impl ImageJobBackend for BrokenJobs {
        async fn start(&self, _workflow: &Value) -> Result<String> {
            Ok("job-1".to_string())
        }

        async fn status(&self, _job_id: &str) -> Result<JobStatus> {
            Ok(JobStatus::Completed {
                image: Some("not base64!".to_string()),
            })
        }
    }

    let records = Arc::new(RecordedUrls::default());
    let service = ImageService::new(
        Arc::new(PollingNotifier::new(
            Arc::new(BrokenJobs),
            Arc::new(RecordingSleeper::default()),
            1,
            Duration::ZERO,
        )),
        Arc::new(MemoryObjectStore::default()),
        records.clone(),
        templates(),
    );

    let err = service
        .generate(ImageTarget::user(1), "x")
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::Decode(_)));
    assert!(records.urls.lock().unwrap().is_empty());
}

/// Object store whose first upload fails.
#[derive(Default)]
struct FlakyStore {
    failed_once: Mutex<bool>,
    inner: MemoryObjectStore,
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn put_png(&self, key: &str, bytes: Vec<u8>) -> Result<String> {
        {
            let mut failed_once = self.failed_once.lock().unwrap();
            if !*failed_once {
                *failed_once = true;
                return Err(MediaError::Storage("connection reset".to_string()));
            }
        }
        self.inner.put_png(key, bytes).await
    }
}

fn success(job_id: &str) -> JobCallback {
    JobCallback {
        id: job_id.to_string(),
        status: "success".to_string(),
        image: Some(PAYLOAD.to_string()),
    }
}

#[tokio::test]
async fn failed_upload_keeps_the_job_for_redelivery() {
    let storage = Arc::new(FlakyStore::default());
    let records = Arc::new(RecordedUrls::default());
    let notifier = Arc::new(CallbackNotifier::new(
        Arc::new(InstantJobs::default()),
        "https://seed.example",
    ));
    let service = ImageService::new(notifier.clone(), storage.clone(), records.clone(), templates());

    service.generate(ImageTarget::user(5), "a").await.unwrap();

    let err = service
        .handle_callback(ImageSubject::User, &success("job-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::Storage(_)));
    assert_eq!(notifier.pending_jobs(), 1);
    assert!(records.urls.lock().unwrap().is_empty());

    let stored = service
        .handle_callback(ImageSubject::User, &success("job-1"))
        .await
        .unwrap();
    assert!(stored.is_some());
    assert_eq!(notifier.pending_jobs(), 0);
    assert_eq!(storage.inner.keys().len(), 1);
    assert_eq!(records.urls.lock().unwrap()[0].0, ImageTarget::user(5));
}

#[tokio::test]
async fn callbacks_on_the_wrong_endpoint_are_ignored() {
    let storage = Arc::new(MemoryObjectStore::default());
    let records = Arc::new(RecordedUrls::default());
    let notifier = Arc::new(CallbackNotifier::new(
        Arc::new(InstantJobs::default()),
        "https://seed.example",
    ));
    let service = ImageService::new(notifier.clone(), storage.clone(), records.clone(), templates());

    service.generate(ImageTarget::product(3), "lamp").await.unwrap();

    let stored = service
        .handle_callback(ImageSubject::User, &success("job-1"))
        .await
        .unwrap();
    assert_eq!(stored, None);
    assert!(storage.keys().is_empty());
    assert_eq!(notifier.pending_jobs(), 1);

    let stored = service
        .handle_callback(ImageSubject::Product, &success("job-1"))
        .await
        .unwrap();
    assert!(stored.is_some());
    assert_eq!(*records.urls.lock().unwrap(), vec![(ImageTarget::product(3), stored.unwrap())]);
}
