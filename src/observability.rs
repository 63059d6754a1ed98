use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("tgpt.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("tgpt.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("tgpt.client.request_duration_seconds");

pub(crate) static STREAM_LINES: Counter = Counter::new("tgpt.stream.lines");
pub(crate) static STREAM_DELTAS: Counter = Counter::new("tgpt.stream.deltas");
pub(crate) static STREAM_SKIPPED_LINES: Counter = Counter::new("tgpt.stream.skipped_lines");
pub(crate) static STREAM_BYTES: Counter = Counter::new("tgpt.stream.bytes");

pub(crate) static SUMMARY_CHUNKS: Counter = Counter::new("tgpt.summary.chunks");

pub(crate) static SESSION_TURNS: Counter = Counter::new("tgpt.session.turns");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_LINES);
    collector.register_counter(&STREAM_DELTAS);
    collector.register_counter(&STREAM_SKIPPED_LINES);
    collector.register_counter(&STREAM_BYTES);

    collector.register_counter(&SUMMARY_CHUNKS);

    collector.register_counter(&SESSION_TURNS);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn biometrics_register() {
        register_biometrics(Collector::new());
    }
}
