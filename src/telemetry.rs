use std::fmt;
use std::time::Duration;

use anyhow::{Result, anyhow};
use opentelemetry::trace::{Span, TraceContextExt, Tracer, TracerProvider as OtelTracerProvider};
use opentelemetry::{Context as OtelContext, KeyValue};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{
    BatchConfigBuilder, BatchSpanProcessor, SdkTracer, SdkTracerProvider, SpanExporter,
};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::store::EntityKind;

const SERVICE_NAME: &str = "immutability-engine";

/// Checked before `RUST_LOG`.
pub const LOG_ENV: &str = "IMMUTABILITY_ENGINE_LOG";

const DEFAULT_LOG_FILTER: &str = "immutability_engine=info,warn";

/// Unit of engine work that gets its own span.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// A whole fixpoint run.
    Fixpoint,
    /// One pass over every entity.
    Pass,
    /// One entity analysed within a pass.
    Analyse,
    /// Marker derivation for one frozen entity.
    Derive,
}

impl Phase {
    pub fn span_name(self) -> &'static str {
        match self {
            Phase::Fixpoint => "engine.fixpoint",
            Phase::Pass => "engine.pass",
            Phase::Analyse => "engine.analyse",
            Phase::Derive => "engine.derive",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.span_name())
    }
}

/// Span attributes identifying one entity.
pub fn entity_attributes(entity: &str, kind: EntityKind) -> [KeyValue; 2] {
    [
        KeyValue::new("engine.entity", entity.to_string()),
        KeyValue::new("engine.entity.kind", kind.to_string()),
    ]
}

pub fn pass_attribute(pass: usize) -> KeyValue {
    KeyValue::new("engine.pass", pass as i64)
}

/// Span export for fixpoint runs and marker derivation.
///
/// Spans may end on rayon workers; the batch processor exports from its own
/// thread, so ending a span is a channel send.
pub struct Telemetry {
    tracer: SdkTracer,
    provider: SdkTracerProvider,
}

impl Telemetry {
    /// Sized for one span per entity per pass on large programs.
    const MAX_QUEUED_SPANS: usize = 65_536;
    const EXPORT_BATCH: usize = 4096;
    const EXPORT_DELAY: Duration = Duration::from_millis(200);

    pub fn from_exporter<E: SpanExporter + 'static>(exporter: E) -> Result<Self> {
        let batch_config = BatchConfigBuilder::default()
            .with_max_queue_size(Self::MAX_QUEUED_SPANS)
            .with_max_export_batch_size(Self::EXPORT_BATCH)
            .with_scheduled_delay(Self::EXPORT_DELAY)
            .build();
        let processor = BatchSpanProcessor::builder(exporter)
            .with_batch_config(batch_config)
            .build();
        let provider = SdkTracerProvider::builder()
            .with_resource(Resource::builder().with_service_name(SERVICE_NAME).build())
            .with_span_processor(processor)
            .build();
        let tracer = provider.tracer(SERVICE_NAME);
        Ok(Self { tracer, provider })
    }

    /// Run `f` inside a span for `phase`, nested under the current context.
    pub fn in_phase<T, F>(&self, phase: Phase, attributes: &[KeyValue], f: F) -> T
    where
        F: FnOnce() -> T,
    {
        self.tracer.in_span(phase.span_name(), |cx| {
            let span = cx.span();
            for attribute in attributes {
                span.set_attribute(attribute.clone());
            }
            f()
        })
    }

    /// Like [`Telemetry::in_phase`], parented on `parent` rather than the
    /// current context; rayon workers do not inherit the pass span.
    pub fn in_child_phase<T, F>(
        &self,
        phase: Phase,
        attributes: &[KeyValue],
        parent: &OtelContext,
        f: F,
    ) -> T
    where
        F: FnOnce() -> T,
    {
        let mut span = self.tracer.start_with_context(phase.span_name(), parent);
        for attribute in attributes {
            span.set_attribute(attribute.clone());
        }
        let _guard = parent.with_span(span).attach();
        f()
    }

    /// Flush pending spans and shut the provider down.
    pub fn shutdown(&self) -> Result<()> {
        self.provider
            .shutdown()
            .map_err(|err| anyhow!("failed to shut down engine telemetry: {err}"))
    }
}

/// Install the stderr log subscriber. The filter comes from [`LOG_ENV`],
/// then `RUST_LOG`, then a default of `info` for this crate. A second call
/// keeps the first subscriber.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Record `name` on the active span; a no-op outside any span.
pub(crate) fn record_event(name: &'static str, attributes: &[KeyValue]) {
    let cx = OtelContext::current();
    let span = cx.span();
    if span.span_context().is_valid() {
        span.add_event(name, attributes.to_vec());
    }
}

pub(crate) fn in_phase<T, F>(telemetry: Option<&Telemetry>, phase: Phase, attributes: &[KeyValue], f: F) -> T
where
    F: FnOnce() -> T,
{
    match telemetry {
        Some(telemetry) => telemetry.in_phase(phase, attributes, f),
        None => f(),
    }
}

pub(crate) fn in_child_phase<T, F>(
    telemetry: Option<&Telemetry>,
    phase: Phase,
    attributes: &[KeyValue],
    parent: &OtelContext,
    f: F,
) -> T
where
    F: FnOnce() -> T,
{
    match telemetry {
        Some(telemetry) => telemetry.in_child_phase(phase, attributes, parent, f),
        None => f(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use opentelemetry_sdk::error::OTelSdkResult;
    use opentelemetry_sdk::trace::SpanData;

    /// Keeps the names and event names of exported spans.
    #[derive(Clone, Debug, Default)]
    pub(crate) struct RecordingExporter {
        spans: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    }

    impl RecordingExporter {
        pub(crate) fn span_names(&self) -> Vec<String> {
            let spans = self.spans.lock().expect("recorded spans");
            spans.iter().map(|(name, _)| name.clone()).collect()
        }

        pub(crate) fn events_of(&self, span: &str) -> Vec<String> {
            let spans = self.spans.lock().expect("recorded spans");
            spans
                .iter()
                .filter(|(name, _)| name == span)
                .flat_map(|(_, events)| events.iter().cloned())
                .collect()
        }
    }

    impl SpanExporter for RecordingExporter {
        async fn export(&self, batch: Vec<SpanData>) -> OTelSdkResult {
            let mut spans = self.spans.lock().expect("recorded spans");
            for span in batch {
                let events = span.events.events.iter().map(|event| event.name.to_string()).collect();
                spans.push((span.name.to_string(), events));
            }
            Ok(())
        }
    }

    #[test]
    fn phases_export_under_engine_names() {
        let exporter = RecordingExporter::default();
        let telemetry = Telemetry::from_exporter(exporter.clone()).expect("telemetry");
        telemetry.in_phase(Phase::Derive, &entity_attributes("com.example.Box", EntityKind::Type), || {
            record_event("engine.derived", &[]);
        });
        telemetry.shutdown().expect("shutdown");
        assert_eq!(exporter.span_names(), vec!["engine.derive"]);
        assert_eq!(exporter.events_of("engine.derive"), vec!["engine.derived"]);
    }

    #[test]
    fn disabled_telemetry_still_runs_the_work() {
        assert_eq!(in_phase(None, Phase::Derive, &[], || 7), 7);
        let parent = OtelContext::current();
        assert_eq!(in_child_phase(None, Phase::Analyse, &[pass_attribute(0)], &parent, || 8), 8);
        record_event("engine.ignored", &[]);
    }

    #[test]
    fn child_phase_is_parented_on_the_given_context() {
        let exporter = RecordingExporter::default();
        let telemetry = Telemetry::from_exporter(exporter.clone()).expect("telemetry");
        let nested = telemetry.in_phase(Phase::Pass, &[pass_attribute(0)], || {
            let parent = OtelContext::current();
            let pass_trace = parent.span().span_context().trace_id();
            std::thread::scope(|scope| {
                scope
                    .spawn(|| {
                        in_child_phase(Some(&telemetry), Phase::Analyse, &[], &parent, || {
                            OtelContext::current().span().span_context().trace_id() == pass_trace
                        })
                    })
                    .join()
                    .expect("worker")
            })
        });
        assert!(nested);
        telemetry.shutdown().expect("shutdown");
        let mut names = exporter.span_names();
        names.sort();
        assert_eq!(names, vec!["engine.analyse", "engine.pass"]);
    }

    #[test]
    fn init_logging_twice_keeps_the_first_subscriber() {
        init_logging();
        init_logging();
    }
}
