// Prometheus metrics exposed on GET /metrics
use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};
use pytutor_common::types::ExecutionOutcome;

lazy_static! {
    pub static ref EXECUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "pytutor_executions_total",
        "Code executions by outcome",
        &["outcome"]
    )
    .expect("executions counter is valid");
    pub static ref VALIDATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "pytutor_validations_total",
        "Challenge validations by verdict",
        &["verdict"]
    )
    .expect("validations counter is valid");
    pub static ref EXECUTION_SECONDS: Histogram = register_histogram!(
        "pytutor_execution_duration_seconds",
        "Wall-clock time of code executions",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("execution histogram is valid");
}

/// Force registration so every series shows up before first use
pub fn init() {
    lazy_static::initialize(&EXECUTIONS_TOTAL);
    lazy_static::initialize(&VALIDATIONS_TOTAL);
    lazy_static::initialize(&EXECUTION_SECONDS);
}

pub fn record_execution(outcome: &ExecutionOutcome) {
    let label = match outcome.error_kind {
        None => "success".to_string(),
        Some(kind) => kind.to_string(),
    };
    EXECUTIONS_TOTAL.with_label_values(&[label.as_str()]).inc();
    EXECUTION_SECONDS.observe(outcome.wall_clock_seconds);
}

pub fn record_validation(is_correct: bool) {
    let label = if is_correct { "correct" } else { "incorrect" };
    VALIDATIONS_TOTAL.with_label_values(&[label]).inc();
}

/// Text exposition format of the default registry
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
