//! Per-call diagnostic records.
//!
//! Independent of `tracing`: an embedding tool that wants a request log
//! (e.g. an editor's output channel) installs a [`DiagnosticSink`] and gets
//! one [`RequestRecord`] per completed or failed underlying call.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{HttpMethod, InstanceId, RequestSequence, Timestamp};

/// Summary of one underlying call. Never contains credentials or tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub instance: InstanceId,
    pub sequence: RequestSequence,
    pub method: HttpMethod,
    /// Path relative to the base address.
    pub path: String,
    /// Value of the session-type header sent (`""` for keep).
    pub session_type: String,
    pub started: Timestamp,
    pub elapsed_ms: u64,
    /// Status of the reply, absent when no reply arrived.
    pub status: Option<u16>,
    /// Rendered error, absent on success.
    pub error: Option<String>,
}

/// Receives one record per call. Must not block.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, record: &RequestRecord);
}

impl<F> DiagnosticSink for F
where
    F: Fn(&RequestRecord) + Send + Sync,
{
    fn record(&self, record: &RequestRecord) {
        self(record)
    }
}

/// Sink that keeps every record in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<RequestRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies out everything recorded so far.
    pub fn records(&self) -> Vec<RequestRecord> {
        self.records.lock().clone()
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, record: &RequestRecord) {
        self.records.lock().push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: Option<u16>) -> RequestRecord {
        RequestRecord {
            instance: InstanceId::new_random(),
            sequence: RequestSequence::new(3),
            method: HttpMethod::Get,
            path: "/sap/bc/adt/compatibility/graph".to_string(),
            session_type: String::new(),
            started: Timestamp::now(),
            elapsed_ms: 12,
            status,
            error: None,
        }
    }

    #[test]
    fn closures_and_memory_sink_receive_records() {
        let sink = MemorySink::new();
        let seen = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&seen);
        let closure = move |_: &RequestRecord| *counter.lock() += 1;

        sink.record(&record(Some(200)));
        closure.record(&record(None));

        assert_eq!(sink.records().len(), 1);
        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn record_serialises_flat() {
        let json = serde_json::to_value(record(Some(404))).unwrap();
        assert_eq!(json["status"], 404);
        assert_eq!(json["method"], "GET");
        assert_eq!(json["elapsed_ms"], 12);
    }
}
