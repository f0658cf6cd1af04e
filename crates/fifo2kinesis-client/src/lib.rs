//! Kinesis wire client for the fifo2kinesis ingest agent.
//!
//! Implements the subset of the Kinesis Data Streams API the agent needs,
//! `PutRecords`, over the x-amz-json-1.1 HTTP protocol, with SigV4 request
//! signing and a pluggable credential source.
//!
//! ## Architecture
//!
//! - **Traits**: [`KinesisApi`] is the publish seam; [`ProvideCredentials`]
//!   is the credential seam.
//! - **Client**: [`KinesisClient`] posts signed batch requests via `reqwest`.
//! - **Records**: [`PutRecordsEntry`] in, [`PutRecordsOutput`] with
//!   positional [`RecordResult`]s out.
//!
//! ## Example
//!
//! ```ignore
//! use fifo2kinesis_client::{KinesisClient, KinesisConfig, PutRecordsEntry};
//!
//! let client = KinesisClient::new(KinesisConfig::default())?;
//! let output = client.put_records("my-stream", &entries).await?;
//! if output.failed_record_count > 0 {
//!     // inspect output.records positionally
//! }
//! ```

pub mod client;
pub mod credentials;
pub mod error;
pub mod records;
mod signer;

pub use client::{KinesisApi, KinesisClient, KinesisConfig};
pub use credentials::{Credentials, EnvCredentials, ProvideCredentials, StaticCredentials};
pub use error::{ClientError, Result};
pub use records::{PutRecordsEntry, PutRecordsOutput, RecordResult};
