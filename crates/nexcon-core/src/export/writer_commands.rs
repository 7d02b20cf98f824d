use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use uuid::Uuid;

/// Broker used when none is configured
pub const DEFAULT_BROKER: &str = "localhost:9092";

/// Settings of a write job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    pub broker: String,
    /// Generated when empty
    pub job_id: String,
    /// Milliseconds since the Unix epoch
    pub start_time: Option<u64>,
    /// Milliseconds since the Unix epoch
    pub stop_time: Option<u64>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            broker: DEFAULT_BROKER.to_string(),
            job_id: String::new(),
            start_time: None,
            stop_time: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAttributes {
    pub file_name: String,
}

/// `FileWriter_new` command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteCommand {
    pub cmd: String,
    pub broker: String,
    pub job_id: String,
    pub file_attributes: FileAttributes,
    pub nexus_structure: Json,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u64>,
}

/// `FileWriter_stop` command for the same job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopCommand {
    pub cmd: String,
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<u64>,
}

/// Wrap a `nexus_structure` tree in a write command and its stop command
///
/// Both commands share one job id; a fresh UUID v7 is used when
/// `options.job_id` is empty.
pub fn writer_commands(
    nexus_structure: Json,
    file_name: &str,
    options: &WriterOptions,
) -> (WriteCommand, StopCommand) {
    let job_id = if options.job_id.is_empty() {
        Uuid::now_v7().to_string()
    } else {
        options.job_id.clone()
    };
    tracing::debug!(job_id = %job_id, file_name = file_name, "writer commands built");

    let write = WriteCommand {
        cmd: "FileWriter_new".to_string(),
        broker: options.broker.clone(),
        job_id: job_id.clone(),
        file_attributes: FileAttributes {
            file_name: file_name.to_string(),
        },
        nexus_structure,
        start_time: options.start_time,
    };
    let stop = StopCommand {
        cmd: "FileWriter_stop".to_string(),
        job_id,
        stop_time: options.stop_time,
    };
    (write, stop)
}
