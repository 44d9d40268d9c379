//! Inference handler behaviour: payload shape, telemetry accounting, failure
//! containment and span lifecycle.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::span::{Attributes, Id};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use pops_core::error::{PopsError, Result, INFERENCE_FAILED_MSG, MODEL_NOT_LOADED_MSG};
use pops_core::protocol::{Label, PredictInput, PredictResponse, TextInput};
use pops_server::inference::InferenceHandler;
use pops_server::model::{Classifier, LexiconClassifier, ModelGuard, Prediction};
use pops_server::obs::trace::REQUEST_SPAN;
use pops_server::obs::Telemetry;

enum Behaviour {
    Fail,
    Panic,
    Confidence(f64),
}

struct FakeClassifier(Behaviour);

#[async_trait]
impl Classifier for FakeClassifier {
    fn id(&self) -> &str {
        "fake"
    }

    fn labels(&self) -> Vec<Label> {
        vec![Label::new("LABEL_0")]
    }

    async fn classify(&self, _text: &str) -> Result<Prediction> {
        match self.0 {
            Behaviour::Fail => Err(PopsError::InferenceFailed("input too long for model".into())),
            Behaviour::Panic => panic!("index out of bounds in attention layer"),
            Behaviour::Confidence(c) => Ok(Prediction::new("LABEL_0", c)),
        }
    }
}

fn handler_with(guard: ModelGuard) -> (InferenceHandler, Arc<Telemetry>) {
    let telemetry = Arc::new(Telemetry::new());
    (InferenceHandler::new(Arc::new(guard), Arc::clone(&telemetry)), telemetry)
}

fn lexicon_handler() -> (InferenceHandler, Arc<Telemetry>) {
    handler_with(ModelGuard::with_classifier(Arc::new(LexiconClassifier::default())))
}

fn path(text: &str) -> PredictInput {
    PredictInput::FromPath(text.to_string())
}

fn error_of(resp: &PredictResponse) -> &str {
    match resp {
        PredictResponse::Error { error } => error,
        other => panic!("expected error payload, got {other:?}"),
    }
}

#[tokio::test]
async fn loaded_model_yields_bounded_confidence_and_known_label() {
    let (handler, _) = lexicon_handler();
    let labels = LexiconClassifier::default().labels();

    for text in ["great product", "awful, broken, useless", "not bad", "", "🙂", "No text provided"] {
        let resp = handler.handle(path(text)).await;
        let PredictResponse::Success(r) = resp else { panic!("text={text:?}") };
        assert!((0.0..=1.0).contains(&r.confidence), "text={text:?}");
        assert!(labels.contains(&r.label), "text={text:?}");
    }
}

#[tokio::test]
async fn body_input_is_echoed_back() {
    let (handler, _) = lexicon_handler();
    let resp = handler
        .handle(PredictInput::FromBody(TextInput { text: "terrible service".into() }))
        .await;
    let PredictResponse::Success(r) = resp else { panic!("expected success") };
    assert_eq!(r.text, "terrible service");
    assert_eq!(r.label.as_str(), Label::NEGATIVE);
}

#[tokio::test]
async fn missing_input_is_classified_as_sentinel() {
    let (handler, telemetry) = lexicon_handler();
    let resp = handler.handle(PredictInput::Neither).await;
    let PredictResponse::Success(r) = resp else { panic!("expected success") };
    assert_eq!(r.text, "No text provided");
    assert_eq!(telemetry.snapshot().requests_total, 1);
}

#[tokio::test]
async fn unavailable_model_fails_fast_without_counting() {
    let (handler, telemetry) = handler_with(ModelGuard::failed("weights missing"));

    for _ in 0..5 {
        let resp = handler.handle(path("great product")).await;
        assert_eq!(error_of(&resp), MODEL_NOT_LOADED_MSG);
    }

    let snap = telemetry.snapshot();
    assert_eq!(snap.requests_total, 0);
    assert_eq!(snap.latency.count, 0);
    assert_eq!(
        telemetry.metrics().inference_errors.get(&[("kind", "model_unavailable")]),
        5
    );
}

#[tokio::test]
async fn never_initialized_model_is_unavailable() {
    let (handler, telemetry) = handler_with(ModelGuard::new());
    let resp = handler.handle(PredictInput::Neither).await;
    assert_eq!(error_of(&resp), MODEL_NOT_LOADED_MSG);
    assert_eq!(telemetry.snapshot().requests_total, 0);
}

#[tokio::test]
async fn inference_failure_is_counted_and_observed() {
    let (handler, telemetry) = handler_with(ModelGuard::with_classifier(Arc::new(FakeClassifier(Behaviour::Fail))));

    let resp = handler.handle(path("x")).await;
    assert_eq!(error_of(&resp), INFERENCE_FAILED_MSG);

    let snap = telemetry.snapshot();
    assert_eq!(snap.requests_total, 1);
    assert_eq!(snap.latency.count, 1);
    assert_eq!(
        telemetry.metrics().inference_errors.get(&[("kind", "inference_failed")]),
        1
    );
}

#[tokio::test]
async fn classifier_panic_is_contained() {
    let (handler, telemetry) = handler_with(ModelGuard::with_classifier(Arc::new(FakeClassifier(Behaviour::Panic))));

    let resp = handler.handle(path("x")).await;
    assert_eq!(error_of(&resp), INFERENCE_FAILED_MSG);
    assert_eq!(telemetry.snapshot().requests_total, 1);

    // The handler keeps serving after a panic.
    let resp = handler.handle(path("y")).await;
    assert_eq!(error_of(&resp), INFERENCE_FAILED_MSG);
    assert_eq!(telemetry.snapshot().requests_total, 2);
}

#[tokio::test]
async fn confidence_is_never_fabricated() {
    for bad in [1.5, -0.1, f64::NAN, f64::INFINITY] {
        let (handler, _) =
            handler_with(ModelGuard::with_classifier(Arc::new(FakeClassifier(Behaviour::Confidence(bad)))));
        let resp = handler.handle(path("x")).await;
        assert_eq!(error_of(&resp), INFERENCE_FAILED_MSG, "confidence={bad}");
    }

    let (handler, _) = handler_with(ModelGuard::with_classifier(Arc::new(FakeClassifier(Behaviour::Confidence(1.0)))));
    assert!(handler.handle(path("x")).await.is_success());
}

#[tokio::test]
async fn repeated_requests_are_identical() {
    let (handler, telemetry) = lexicon_handler();
    let first = handler.handle(path("really great, but slow")).await;
    for _ in 0..9 {
        assert_eq!(handler.handle(path("really great, but slow")).await, first);
    }
    assert_eq!(telemetry.snapshot().requests_total, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_requests_lose_no_updates() {
    const N: usize = 256;
    let (handler, telemetry) = lexicon_handler();

    let tasks: Vec<_> = (0..N)
        .map(|i| {
            let handler = handler.clone();
            tokio::spawn(async move { handler.handle(path(&format!("good item {i}"))).await })
        })
        .collect();

    for t in tasks {
        assert!(t.await.unwrap().is_success());
    }

    let snap = telemetry.snapshot();
    assert_eq!(snap.requests_total, N as u64);
    assert_eq!(snap.latency.count, N as u64);
}

#[derive(Clone, Default)]
struct SpanCounter {
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl<S> Layer<S> for SpanCounter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        if attrs.metadata().name() == REQUEST_SPAN {
            self.opened.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        if ctx.span(&id).is_some_and(|s| s.name() == REQUEST_SPAN) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[tokio::test]
async fn every_span_closes_exactly_once() {
    let counter = SpanCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    let _default = tracing::subscriber::set_default(subscriber);

    let guards = [
        ModelGuard::with_classifier(Arc::new(LexiconClassifier::default())),
        ModelGuard::with_classifier(Arc::new(FakeClassifier(Behaviour::Fail))),
        ModelGuard::with_classifier(Arc::new(FakeClassifier(Behaviour::Panic))),
        ModelGuard::with_classifier(Arc::new(FakeClassifier(Behaviour::Confidence(2.0)))),
        ModelGuard::failed("weights missing"),
        ModelGuard::new(),
    ];

    let mut served = 0;
    for guard in guards {
        let (handler, _) = handler_with(guard);
        handler.handle(path("fine")).await;
        handler.handle(PredictInput::Neither).await;
        served += 2;
    }

    // A handle dropped without `end` (early return, unwinding) still closes.
    let handle = Telemetry::new().start_span("abandoned");
    drop(handle);
    served += 1;

    assert_eq!(counter.opened.load(Ordering::SeqCst), served);
    assert_eq!(counter.closed.load(Ordering::SeqCst), served);
}
