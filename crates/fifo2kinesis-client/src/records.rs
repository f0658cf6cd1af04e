//! Record types exchanged with the `PutRecords` API.
//!
//! `PutRecordsEntry` and `PutRecordsOutput` are the in-process representations
//! used by callers; the `Wire*` structs mirror the x-amz-json-1.1 bodies and
//! stay private to the crate.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single record to be published in a batch.
///
/// `data` is the raw line bytes, with no framing and no trailing newline. The
/// partition key is hashed by the service to choose a shard.
#[derive(Debug, Clone)]
pub struct PutRecordsEntry {
    /// Record payload.
    pub data: Bytes,
    /// Partition key for shard routing.
    pub partition_key: String,
}

/// Per-record outcome of a batch publish.
///
/// Exactly one of the two halves is populated: a sequence number and shard id
/// on success, or an error code and message on failure. Results are positional
/// `records[i]` in the output corresponds to `entries[i]` in the request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RecordResult {
    pub sequence_number: Option<String>,
    pub shard_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl RecordResult {
    /// Whether this record was rejected by the service.
    pub fn is_failed(&self) -> bool {
        self.error_code.is_some()
    }
}

/// Outcome of a whole batch publish.
#[derive(Debug, Clone, Default)]
pub struct PutRecordsOutput {
    /// Number of records the service did not accept.
    pub failed_record_count: usize,
    /// Positional per-record results.
    pub records: Vec<RecordResult>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WirePutRecordsRequest<'a> {
    pub stream_name: &'a str,
    pub records: Vec<WireEntry>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WireEntry {
    pub data: String,
    pub partition_key: String,
}

impl From<&PutRecordsEntry> for WireEntry {
    fn from(entry: &PutRecordsEntry) -> Self {
        WireEntry {
            data: BASE64.encode(&entry.data),
            partition_key: entry.partition_key.clone(),
        }
    }
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct WirePutRecordsResponse {
    pub failed_record_count: usize,
    pub records: Vec<RecordResult>,
}

impl From<WirePutRecordsResponse> for PutRecordsOutput {
    fn from(wire: WirePutRecordsResponse) -> Self {
        PutRecordsOutput {
            failed_record_count: wire.failed_record_count,
            records: wire.records,
        }
    }
}

/// Error body returned by the service on a non-2xx response.
#[derive(Deserialize, Default)]
#[serde(default)]
pub(crate) struct WireErrorResponse {
    #[serde(rename = "__type")]
    pub error_type: String,
    #[serde(alias = "Message")]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // Request serialization
    // ---------------------------------------------------------------

    #[test]
    fn test_request_body_shape() {
        let entries = vec![
            PutRecordsEntry {
                data: Bytes::from("hello"),
                partition_key: "pk-one".to_string(),
            },
            PutRecordsEntry {
                data: Bytes::from("world"),
                partition_key: "pk-two".to_string(),
            },
        ];
        let request = WirePutRecordsRequest {
            stream_name: "events",
            records: entries.iter().map(WireEntry::from).collect(),
        };
        let body: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&request).unwrap()).unwrap();

        assert_eq!(body["StreamName"], "events");
        assert_eq!(body["Records"].as_array().unwrap().len(), 2);
        assert_eq!(body["Records"][0]["PartitionKey"], "pk-one");
        // "hello" base64-encoded
        assert_eq!(body["Records"][0]["Data"], "aGVsbG8=");
        assert_eq!(body["Records"][1]["Data"], "d29ybGQ=");
    }

    #[test]
    fn test_request_data_is_raw_bytes() {
        // Binary payloads must survive the encoding untouched.
        let entry = PutRecordsEntry {
            data: Bytes::from(vec![0u8, 159, 146, 150]),
            partition_key: "k".to_string(),
        };
        let wire = WireEntry::from(&entry);
        assert_eq!(BASE64.decode(&wire.data).unwrap(), vec![0u8, 159, 146, 150]);
    }

    // ---------------------------------------------------------------
    // Response parsing
    // ---------------------------------------------------------------

    #[test]
    fn test_response_full_success() {
        let json = r#"{
            "FailedRecordCount": 0,
            "Records": [
                {"SequenceNumber": "49543463076548007577105092703039560359975228518395019266",
                 "ShardId": "shardId-000000000000"}
            ]
        }"#;
        let wire: WirePutRecordsResponse = serde_json::from_str(json).unwrap();
        let output = PutRecordsOutput::from(wire);
        assert_eq!(output.failed_record_count, 0);
        assert_eq!(output.records.len(), 1);
        assert!(!output.records[0].is_failed());
        assert!(output.records[0].sequence_number.is_some());
    }

    #[test]
    fn test_response_partial_failure() {
        let json = r#"{
            "FailedRecordCount": 1,
            "Records": [
                {"SequenceNumber": "495434630", "ShardId": "shardId-000000000000"},
                {"ErrorCode": "ProvisionedThroughputExceededException",
                 "ErrorMessage": "Rate exceeded for shard shardId-000000000001"},
                {"SequenceNumber": "495434631", "ShardId": "shardId-000000000002"}
            ]
        }"#;
        let output = PutRecordsOutput::from(
            serde_json::from_str::<WirePutRecordsResponse>(json).unwrap(),
        );
        assert_eq!(output.failed_record_count, 1);
        let failed: Vec<usize> = output
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_failed())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(failed, vec![1]);
        assert_eq!(
            output.records[1].error_code.as_deref(),
            Some("ProvisionedThroughputExceededException")
        );
    }

    #[test]
    fn test_response_missing_fields_default() {
        let wire: WirePutRecordsResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(wire.failed_record_count, 0);
        assert!(wire.records.is_empty());
    }

    #[test]
    fn test_error_response_parsing() {
        let json = r#"{"__type":"ResourceNotFoundException","message":"Stream events not found"}"#;
        let err: WireErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(err.error_type, "ResourceNotFoundException");
        assert_eq!(err.message, "Stream events not found");
    }

    #[test]
    fn test_error_response_capitalized_message() {
        let json = r#"{"__type":"ValidationException","Message":"1 validation error"}"#;
        let err: WireErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(err.message, "1 validation error");
    }
}
