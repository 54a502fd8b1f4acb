use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use ureq::Agent;

use super::{Attachment, Backend, DraftFilter, Notice};
use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::lifecycle::TicketUpdate;
use crate::ticket::{DraftRecord, TicketId};

/// `GET /draft` answers with either a bare array or a `data` envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum DraftList {
    Bare(Vec<Value>),
    Envelope { data: Vec<Value> },
}

impl DraftList {
    /// Decodes each record on its own; records that fail are skipped.
    fn into_records(self) -> Vec<DraftRecord> {
        let (Self::Bare(values) | Self::Envelope { data: values }) = self;
        let total = values.len();
        let records: Vec<DraftRecord> = values
            .into_iter()
            .filter_map(|value| {
                let ticket_id = value.get("ticket_id").map(ToString::to_string);
                match serde_json::from_value::<DraftRecord>(value) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(
                            ticket_id = ticket_id.as_deref().unwrap_or("?"),
                            error = %e,
                            "Skipping undecodable draft"
                        );
                        None
                    }
                }
            })
            .collect();
        if records.len() < total {
            debug!(total, decoded = records.len(), "Draft list partially decoded");
        }
        records
    }
}

fn parse_draft_list(body: &str) -> Result<Vec<DraftRecord>, BackendError> {
    let list: DraftList = serde_json::from_str(body)
        .map_err(|e| BackendError::Decode(format!("Invalid draft list: {}", e)))?;
    Ok(list.into_records())
}

/// Backend reached over HTTP with `ureq`.
pub struct HttpBackend {
    agent: Agent,
    base_url: String,
}

impl HttpBackend {
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self {
            agent,
            base_url: config.base_url.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

fn map_error(err: ureq::Error) -> BackendError {
    match err {
        ureq::Error::Status(status, response) => {
            let message = response
                .into_string()
                .ok()
                .map(|body| body.trim().to_string())
                .filter(|body| !body.is_empty())
                .unwrap_or_else(|| "no response body".to_string());
            BackendError::Status { status, message }
        }
        ureq::Error::Transport(transport) => BackendError::Transport(transport.to_string()),
    }
}

impl Backend for HttpBackend {
    fn list_drafts(&self, filter: &DraftFilter) -> Result<Vec<DraftRecord>, BackendError> {
        let mut request = self.agent.get(&self.url("draft"));
        for (key, value) in filter.query_pairs() {
            request = request.query(key, &value);
        }
        debug!(url = %request.url(), "Listing drafts");

        let body = request
            .call()
            .map_err(map_error)?
            .into_string()
            .map_err(|e| BackendError::Decode(format!("Failed to read response: {}", e)))?;
        parse_draft_list(&body)
    }

    fn update_draft(
        &self,
        ticket_id: &TicketId,
        update: &TicketUpdate,
    ) -> Result<(), BackendError> {
        let body = serde_json::to_string(update)
            .map_err(|e| BackendError::Decode(format!("Failed to encode update: {}", e)))?;
        let url = self.url(&format!("draft/{}", ticket_id));
        debug!(%url, %body, "Updating draft");

        self.agent
            .put(&url)
            .set("Content-Type", "application/json")
            .send_string(&body)
            .map_err(map_error)?;
        Ok(())
    }

    fn send_document(&self, notice: Notice, attachment: &Attachment) -> Result<(), BackendError> {
        let form = attachment.to_form();
        let content_type = form.content_type();
        let body = form.into_body();
        let url = self.url(notice.path());
        debug!(%url, bytes = body.len(), file = %attachment.file_name, "Uploading document");

        self.agent
            .post(&url)
            .set("Content-Type", &content_type)
            .send_bytes(&body)
            .map_err(map_error)?;
        Ok(())
    }
}
