use dnsperf_domain::Measurement;
use dnsperf_infrastructure::dns::ExchangeResult;
use hickory_proto::op::Message;
use serde::Serialize;

#[derive(Serialize)]
pub struct ExchangeReport<'a> {
    pub upstream: &'a str,
    pub protocol: &'static str,
    pub attempt: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseSummary>,
    pub metrics: Measurement,
}

#[derive(Serialize)]
pub struct ResponseSummary {
    pub id: u16,
    pub rcode: String,
    pub truncated: bool,
    pub answers: Vec<String>,
}

impl From<&Message> for ResponseSummary {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id(),
            rcode: format!("{:?}", message.response_code()),
            truncated: message.truncated(),
            answers: message.answers().iter().map(|r| r.to_string()).collect(),
        }
    }
}

impl<'a> ExchangeReport<'a> {
    pub fn new(
        upstream: &'a str,
        protocol: &'static str,
        attempt: usize,
        result: &ExchangeResult,
    ) -> Self {
        Self {
            upstream,
            protocol,
            attempt,
            error: result.error().map(|e| e.to_string()),
            response: result.response().map(ResponseSummary::from),
            metrics: result.metrics(),
        }
    }
}
