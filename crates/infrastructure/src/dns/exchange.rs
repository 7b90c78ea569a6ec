use dnsperf_domain::{Collector, Measurement, ProbeError};
use hickory_proto::op::Message;

/// Outcome of one exchange: the decoded reply (if any), the error (if any)
/// and the collector that timed it.
///
/// Both a response and an error may be present, e.g. on an ID mismatch or a
/// non-NOERROR RCODE.
#[derive(Debug, Clone)]
pub struct ExchangeResult {
    response: Option<Message>,
    error: Option<ProbeError>,
    collector: Collector,
}

impl ExchangeResult {
    pub fn failed(error: ProbeError, collector: Collector) -> Self {
        Self {
            response: None,
            error: Some(error),
            collector,
        }
    }

    pub fn with_error(response: Message, error: Option<ProbeError>, collector: Collector) -> Self {
        Self {
            response: Some(response),
            error,
            collector,
        }
    }

    pub fn response(&self) -> Option<&Message> {
        self.response.as_ref()
    }

    pub fn error(&self) -> Option<&ProbeError> {
        self.error.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    pub fn metrics(&self) -> Measurement {
        self.collector.measurement()
    }
}
