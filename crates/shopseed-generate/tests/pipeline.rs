use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use serde::Deserialize;
use serde_json::json;
use shopseed_core::{FieldSpec, RecordSchema};
use shopseed_generate::entities::ProductEntity;
use shopseed_generate::{
    BackendError, ChunkedGenerator, Completion, CompletionRequest, Directives, EntityKind,
    GenerateOptions, GenerationError, RecordingSleeper, RetryPolicy, Sink, SinkError,
    TextBackend, TransportKind,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Widget {
    name: String,
    price: f64,
}

/// Test entity whose user directive is just the requested count.
struct WidgetEntity {
    schema: RecordSchema,
}

impl WidgetEntity {
    fn new() -> Self {
        Self {
            schema: RecordSchema::new("widget")
                .field(FieldSpec::text("name"))
                .field(FieldSpec::number("price")),
        }
    }
}

impl EntityKind for WidgetEntity {
    type Record = Widget;

    fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    fn directives(&self, count: usize) -> Directives {
        Directives {
            system: "widgets".to_string(),
            user: count.to_string(),
        }
    }
}

fn widgets_json(count: usize) -> String {
    let items: Vec<_> = (0..count)
        .map(|index| json!({ "name": format!("widget-{index}"), "price": index as f64 }))
        .collect();
    serde_json::Value::Array(items).to_string()
}

type Script = Box<dyn Fn(usize, usize) -> Result<Completion, BackendError> + Send + Sync>;

/// Backend driven by a closure of `(call number, requested count)`.
struct ScriptedBackend {
    calls: AtomicUsize,
    requested: Mutex<Vec<usize>>,
    script: Script,
}

impl ScriptedBackend {
    fn new(
        script: impl Fn(usize, usize) -> Result<Completion, BackendError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
            script: Box::new(script),
        })
    }

    fn valid() -> Arc<Self> {
        Self::new(|_, count| Ok(Completion::Text(widgets_json(count))))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, BackendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let count: usize = request.user.parse().unwrap_or(0);
        self.requested.lock().unwrap().push(count);
        (self.script)(call, count)
    }
}

/// Sink that records batch sizes and can be told to fail on a given call.
#[derive(Default)]
struct CountingSink {
    batches: Vec<usize>,
    fail_on: Option<usize>,
}

#[async_trait]
impl Sink<Widget> for CountingSink {
    async fn accept(&mut self, batch: Vec<Widget>) -> Result<(), SinkError> {
        if self.fail_on == Some(self.batches.len() + 1) {
            return Err(SinkError::message("disk full"));
        }
        self.batches.push(batch.len());
        Ok(())
    }
}

fn generator(
    backend: Arc<ScriptedBackend>,
    sleeper: Arc<RecordingSleeper>,
    options: GenerateOptions,
) -> ChunkedGenerator<WidgetEntity> {
    ChunkedGenerator::new(backend, sleeper, WidgetEntity::new(), options)
}

fn reset() -> BackendError {
    BackendError::transport(TransportKind::ConnectionReset, "connection reset by peer")
}

#[tokio::test]
async fn twenty_five_in_chunks_of_ten_arrive_as_ten_ten_five() {
    let backend = ScriptedBackend::valid();
    let sleeper = Arc::new(RecordingSleeper::default());
    let options = GenerateOptions {
        inter_batch_delay: Duration::from_secs(2),
        retry: RetryPolicy::default(),
        max_tokens: None,
    };
    let generator = generator(backend.clone(), sleeper.clone(), options);

    let mut collected: Vec<Widget> = Vec::new();
    let report = generator.generate(25, 10, &mut collected).await.unwrap();

    assert_eq!(report.batch_sizes, vec![10, 10, 5]);
    assert_eq!(*backend.requested.lock().unwrap(), vec![10, 10, 5]);
    assert_eq!(collected.len(), 25);
    assert_eq!(report.delivered, 25);
    assert_eq!(collected[10].name, "widget-0");
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_secs(2), Duration::from_secs(2)]
    );
}

#[tokio::test]
async fn batch_sizes_sum_to_the_total_and_respect_the_chunk() {
    for total in 1..=23 {
        for chunk in 1..=9 {
            let generator = generator(
                ScriptedBackend::valid(),
                Arc::new(RecordingSleeper::default()),
                GenerateOptions::immediate(1),
            );
            let mut sink = CountingSink::default();
            let report = generator.generate(total, chunk, &mut sink).await.unwrap();

            assert_eq!(report.batch_sizes.iter().sum::<usize>(), total);
            assert!(report.batch_sizes.iter().all(|size| *size <= chunk));
            assert_eq!(sink.batches, report.batch_sizes);
        }
    }
}

#[tokio::test]
async fn always_transient_backend_exhausts_the_retry_ceiling() {
    let backend = ScriptedBackend::new(|_, _| Err(reset()));
    let sleeper = Arc::new(RecordingSleeper::default());
    let options = GenerateOptions {
        inter_batch_delay: Duration::ZERO,
        retry: RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
        },
        max_tokens: None,
    };
    let generator = generator(backend.clone(), sleeper.clone(), options);

    let mut sink = CountingSink::default();
    let failure = generator.generate(10, 10, &mut sink).await.unwrap_err();

    match failure.error {
        GenerationError::RetryExhausted { attempts, last } => {
            assert_eq!(attempts, 5);
            assert_eq!(last, reset());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(backend.calls(), 5);
    assert_eq!(
        sleeper.delays(),
        vec![
            Duration::from_millis(500),
            Duration::from_millis(1000),
            Duration::from_millis(2000),
            Duration::from_millis(4000),
        ]
    );
    assert!(sink.batches.is_empty());
}

#[tokio::test]
async fn transient_failure_then_success_is_counted_as_a_retry() {
    let backend = ScriptedBackend::new(|call, count| {
        if call == 1 {
            Err(reset())
        } else {
            Ok(Completion::Text(widgets_json(count)))
        }
    });
    let generator = generator(
        backend.clone(),
        Arc::new(RecordingSleeper::default()),
        GenerateOptions::immediate(3),
    );

    let mut collected: Vec<Widget> = Vec::new();
    let report = generator.generate(4, 10, &mut collected).await.unwrap();
    assert_eq!(report.retries, 1);
    assert_eq!(collected.len(), 4);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn non_transient_failure_after_k_batches_keeps_the_k_deliveries() {
    let backend = ScriptedBackend::new(|call, count| {
        if call <= 2 {
            Ok(Completion::Text(widgets_json(count)))
        } else {
            Err(BackendError::Status {
                status: 500,
                body: "internal".to_string(),
            })
        }
    });
    let generator = generator(
        backend.clone(),
        Arc::new(RecordingSleeper::default()),
        GenerateOptions::immediate(5),
    );

    let mut sink = CountingSink::default();
    let failure = generator.generate(50, 10, &mut sink).await.unwrap_err();

    assert_eq!(sink.batches, vec![10, 10]);
    assert_eq!(failure.report.delivered, 20);
    assert_eq!(backend.calls(), 3);
    assert!(matches!(
        failure.error,
        GenerationError::Backend(BackendError::Status { status: 500, .. })
    ));
}

#[tokio::test]
async fn sink_failure_stops_the_run() {
    let generator = generator(
        ScriptedBackend::valid(),
        Arc::new(RecordingSleeper::default()),
        GenerateOptions::immediate(1),
    );
    let mut sink = CountingSink {
        fail_on: Some(2),
        ..CountingSink::default()
    };
    let failure = generator.generate(30, 10, &mut sink).await.unwrap_err();

    assert!(matches!(failure.error, GenerationError::Sink(_)));
    assert_eq!(failure.report.delivered, 10);
    assert_eq!(sink.batches, vec![10]);
}

#[tokio::test]
async fn widget_without_product_fields_is_all_records_malformed() {
    let backend = ScriptedBackend::new(|_, _| {
        Ok(Completion::Text(r#"[{ "name": "Widget" }]"#.to_string()))
    });
    let generator = ChunkedGenerator::new(
        backend,
        Arc::new(RecordingSleeper::default()),
        ProductEntity::default(),
        GenerateOptions::immediate(3),
    );

    let mut collected = Vec::new();
    let failure = generator.generate(5, 5, &mut collected).await.unwrap_err();

    assert!(matches!(
        failure.error,
        GenerationError::AllRecordsMalformed { received: 1 }
    ));
    assert!(collected.is_empty());
    assert_eq!(failure.report.delivered, 0);
}

#[tokio::test]
async fn unparseable_output_is_malformed_backend_output() {
    let backend = ScriptedBackend::new(|_, _| {
        Ok(Completion::Text("I'm sorry, I can't help with that.".to_string()))
    });
    let generator = generator(
        backend,
        Arc::new(RecordingSleeper::default()),
        GenerateOptions::immediate(3),
    );

    let mut sink = CountingSink::default();
    let failure = generator.generate(3, 3, &mut sink).await.unwrap_err();
    assert!(matches!(
        failure.error,
        GenerationError::MalformedBackendOutput { .. }
    ));
    assert!(sink.batches.is_empty());
}

#[tokio::test]
async fn streamed_fragments_are_joined_before_parsing() {
    let backend = ScriptedBackend::new(|_, count| {
        let text = format!("```json\n{}\n```", widgets_json(count));
        let pieces: Vec<Result<String, BackendError>> = text
            .as_bytes()
            .chunks(7)
            .map(|piece| Ok(String::from_utf8_lossy(piece).into_owned()))
            .collect();
        Ok(Completion::Fragments(stream::iter(pieces).boxed()))
    });
    let generator = generator(
        backend,
        Arc::new(RecordingSleeper::default()),
        GenerateOptions::immediate(1),
    );

    let mut collected: Vec<Widget> = Vec::new();
    generator.generate(6, 6, &mut collected).await.unwrap();
    assert_eq!(collected.len(), 6);
    assert_eq!(collected[5].name, "widget-5");
}

#[tokio::test]
async fn broken_elements_are_dropped_and_repairs_counted() {
    let backend = ScriptedBackend::new(|_, _| {
        Ok(Completion::Text(
            "[{name: 'a', price: 1,}, {\"name\": \"\", \"price\": 2}, {\"name\": \"c\", \"price\": \"3\"}, {\"name\": \"d\", \"price\": 4}"
                .to_string(),
        ))
    });
    let generator = generator(
        backend,
        Arc::new(RecordingSleeper::default()),
        GenerateOptions::immediate(1),
    );

    let mut collected: Vec<Widget> = Vec::new();
    let report = generator.generate(4, 4, &mut collected).await.unwrap();

    let names: Vec<_> = collected.iter().map(|widget| widget.name.as_str()).collect();
    assert_eq!(names, vec!["a", "d"]);
    assert_eq!(report.dropped, 2);
    assert_eq!(report.repaired_responses, 1);
    assert_eq!(report.delivered, 2);
}

#[tokio::test]
async fn oversized_batches_are_capped_at_the_requested_count() {
    let backend = ScriptedBackend::new(|_, count| Ok(Completion::Text(widgets_json(count + 3))));
    let generator = generator(
        backend,
        Arc::new(RecordingSleeper::default()),
        GenerateOptions::immediate(1),
    );

    let mut collected: Vec<Widget> = Vec::new();
    generator.generate(5, 5, &mut collected).await.unwrap();
    assert_eq!(collected.len(), 5);
}

#[tokio::test]
async fn fetch_batch_returns_the_raw_array() {
    let backend = ScriptedBackend::new(|_, _| {
        Ok(Completion::Text(r#"[{"name":"x"}, 3, "loose"]"#.to_string()))
    });
    let generator = generator(
        backend,
        Arc::new(RecordingSleeper::default()),
        GenerateOptions::immediate(1),
    );

    let raw = generator.fetch_batch(3).await.unwrap();
    assert_eq!(raw, vec![json!({"name": "x"}), json!(3), json!("loose")]);
}

#[tokio::test]
async fn zero_totals_and_chunks_are_rejected_up_front() {
    let backend = ScriptedBackend::valid();
    let generator = generator(
        backend.clone(),
        Arc::new(RecordingSleeper::default()),
        GenerateOptions::immediate(1),
    );

    let mut sink = CountingSink::default();
    for (total, chunk) in [(0, 10), (10, 0)] {
        let failure = generator.generate(total, chunk, &mut sink).await.unwrap_err();
        assert!(matches!(failure.error, GenerationError::InvalidRequest(_)));
    }
    assert_eq!(backend.calls(), 0);
}
