//! Remote dataset version check
//!
//! The registry publishes its latest release through the SOAP 1.2 operation
//! `GetLastDownloadFileInfo`. Only `VersionId` and `FiasCompleteXmlUrl` drive
//! the loader; the remaining fields are kept for logging.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::error::{IngestError, Result};

pub const DEFAULT_ENDPOINT: &str =
    "https://fias.nalog.ru/WebServices/Public/DownloadService.asmx";

const SOAP_CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";

const LAST_DOWNLOAD_REQUEST: &str = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope" xmlns:dow="http://fias.nalog.ru/WebServices/Public/DownloadService.asmx">
   <soap:Header/>
   <soap:Body>
      <dow:GetLastDownloadFileInfo/>
   </soap:Body>
</soap:Envelope>"#;

/// Latest published release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteVersion {
    pub version_id: i64,
    pub text_version: String,
    pub complete_xml_url: String,
    pub delta_xml_url: Option<String>,
}

impl RemoteVersion {
    /// Value persisted as the local version marker
    pub fn marker(&self) -> String {
        self.version_id.to_string()
    }
}

/// Source of the latest release information
#[async_trait]
pub trait VersionService: Send + Sync {
    async fn latest(&self) -> Result<RemoteVersion>;
}

/// `VersionService` over the registry's SOAP endpoint
#[derive(Debug, Clone)]
pub struct SoapVersionService {
    client: reqwest::Client,
    endpoint: String,
}

impl SoapVersionService {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl VersionService for SoapVersionService {
    async fn latest(&self) -> Result<RemoteVersion> {
        debug!(endpoint = %self.endpoint, "querying latest version");

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .body(LAST_DOWNLOAD_REQUEST)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Transport(format!(
                "version check at {} returned {}",
                self.endpoint, status
            )));
        }

        let body = response.text().await?;
        parse_version_response(&body)
    }
}

/// Extract the release fields from a `GetLastDownloadFileInfo` response
pub fn parse_version_response(body: &str) -> Result<RemoteVersion> {
    const FIELDS: [&str; 4] = [
        "VersionId",
        "TextVersion",
        "FiasCompleteXmlUrl",
        "FiasDeltaXmlUrl",
    ];

    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut fields: HashMap<&'static str, String> = HashMap::new();
    let mut current: Option<&'static str> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                current = FIELDS
                    .iter()
                    .copied()
                    .find(|field| e.local_name().as_ref() == field.as_bytes());
            }
            Ok(Event::Text(text)) => {
                if let Some(field) = current {
                    let value = text.unescape().map_err(|e| {
                        IngestError::Transport(format!("bad {field} in version response: {e}"))
                    })?;
                    fields.insert(field, value.into_owned());
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(IngestError::Transport(format!(
                    "malformed version response at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
    }

    let version_id = fields
        .get("VersionId")
        .ok_or_else(|| IngestError::Transport("version response has no VersionId".to_string()))?
        .trim()
        .parse::<i64>()
        .map_err(|e| IngestError::Transport(format!("invalid VersionId: {e}")))?;

    let complete_xml_url = fields
        .remove("FiasCompleteXmlUrl")
        .filter(|url| !url.is_empty())
        .ok_or_else(|| {
            IngestError::Transport("version response has no FiasCompleteXmlUrl".to_string())
        })?;

    Ok(RemoteVersion {
        version_id,
        text_version: fields.remove("TextVersion").unwrap_or_default(),
        complete_xml_url,
        delta_xml_url: fields.remove("FiasDeltaXmlUrl").filter(|url| !url.is_empty()),
    })
}
