//! Live instrument status from the Federal Register.
//!
//! An executive order is looked up in three steps: a presidential-document
//! search for the order itself, a general term search if that finds nothing,
//! and a scan for later orders that revoke, repeal or amend it.

use async_trait::async_trait;
use navigator_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument};

pub const DEFAULT_ENDPOINT: &str = "https://www.federalregister.gov/api/v1";
const DOCUMENTS_PATH: &str = "/documents.json";

/// Whether an instrument is still in force.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentState {
    Active,
    Revoked,
    Amended,
    Other(String),
}

impl fmt::Display for InstrumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentState::Active => f.write_str("Active"),
            InstrumentState::Revoked => f.write_str("Revoked"),
            InstrumentState::Amended => f.write_str("Amended"),
            InstrumentState::Other(s) => f.write_str(s),
        }
    }
}

/// A later document that modifies an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    pub document_number: Option<String>,
    pub title: String,
    pub date: Option<String>,
}

impl fmt::Display for Modification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)?;
        if let Some(date) = &self.date {
            write!(f, " ({})", date)?;
        }
        Ok(())
    }
}

/// Live status of a regulatory instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentStatus {
    /// Instrument number, digits only ("14067")
    pub number: String,
    pub title: String,
    pub effective_date: Option<String>,
    pub status: InstrumentState,
    pub html_url: Option<String>,
    pub amendments: Vec<Modification>,
    pub revocations: Vec<Modification>,
}

impl InstrumentStatus {
    /// Facts as a plain-text block for the generation context.
    pub fn render_facts(&self) -> String {
        let mut lines = vec![
            format!("Executive Order {}: {}", self.number, self.title),
            format!("Status: {}", self.status),
        ];
        if let Some(date) = &self.effective_date {
            lines.push(format!("Published: {}", date));
        }
        for revocation in &self.revocations {
            lines.push(format!("Revoked by: {}", revocation));
        }
        for amendment in &self.amendments {
            lines.push(format!("Amended by: {}", amendment));
        }
        if let Some(url) = &self.html_url {
            lines.push(format!("Source: {}", url));
        }
        lines.join("\n")
    }
}

/// External registry of regulatory instruments.
#[async_trait]
pub trait InstrumentRegistry: Send + Sync {
    fn name(&self) -> &str;

    /// Look up an instrument by number.
    ///
    /// Fails with `LookupNotFound` when the registry has no such instrument
    /// and `LookupService` when it cannot be queried.
    async fn lookup(&self, number: &str) -> AppResult<InstrumentStatus>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RegisterDocument>,
}

/// One search hit from the Federal Register API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterDocument {
    #[serde(default)]
    pub document_number: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,

    /// Number or string depending on the record
    #[serde(default)]
    pub executive_order_number: Option<serde_json::Value>,
}

/// Full details of a single Federal Register document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRecord {
    #[serde(default)]
    pub document_number: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub publication_date: Option<String>,

    /// "Presidential Document", "Rule", "Notice" ...
    #[serde(default, rename = "type", alias = "document_type")]
    pub document_type: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default, rename = "abstract")]
    pub summary: Option<String>,
    #[serde(default)]
    pub body_html: Option<String>,
    #[serde(default)]
    pub raw_text_url: Option<String>,
    #[serde(default)]
    pub agencies: Vec<Agency>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Agency {
    #[serde(default)]
    pub name: Option<String>,
}

impl RegisterRecord {
    /// Inline HTML body, or the URL of the raw text when the body is absent.
    pub fn full_text(&self) -> Option<&str> {
        self.body_html.as_deref().or(self.raw_text_url.as_deref())
    }

    pub fn agency_names(&self) -> Vec<&str> {
        self.agencies.iter().filter_map(|a| a.name.as_deref()).collect()
    }
}

impl RegisterDocument {
    fn order_number(&self) -> Option<String> {
        match self.executive_order_number.as_ref()? {
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            _ => None,
        }
    }

    fn modification(&self) -> Modification {
        Modification {
            document_number: self.document_number.clone(),
            title: self.title.clone().unwrap_or_default(),
            date: self.publication_date.clone(),
        }
    }
}

/// Pick the hit describing the order itself: an exact order-number match,
/// else the first hit.
pub fn select_match<'a>(number: &str, results: &'a [RegisterDocument]) -> Option<&'a RegisterDocument> {
    results
        .iter()
        .find(|d| d.order_number().as_deref() == Some(number))
        .or_else(|| results.first())
}

/// Build the status of `original` from the documents that mention it
/// alongside amend/revoke/repeal.
pub fn classify_modifications(
    number: &str,
    original: &RegisterDocument,
    candidates: &[RegisterDocument],
) -> InstrumentStatus {
    let mut status = InstrumentStatus {
        number: number.to_string(),
        title: original
            .title
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
        effective_date: original.publication_date.clone(),
        status: InstrumentState::Active,
        html_url: original.html_url.clone(),
        amendments: Vec::new(),
        revocations: Vec::new(),
    };

    for doc in candidates {
        let is_original = doc.order_number().as_deref() == Some(number)
            || (doc.document_number.is_some() && doc.document_number == original.document_number);
        if is_original {
            continue;
        }

        let title = doc.title.as_deref().unwrap_or_default().to_lowercase();
        if title.contains("revok") || title.contains("repeal") {
            status.revocations.push(doc.modification());
        } else if title.contains("amend") {
            status.amendments.push(doc.modification());
        }
    }

    status.status = if !status.revocations.is_empty() {
        InstrumentState::Revoked
    } else if !status.amendments.is_empty() {
        InstrumentState::Amended
    } else {
        InstrumentState::Active
    };

    status
}

/// Digits of an instrument identifier ("E.O. 14,067" becomes "14067").
pub fn clean_number(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Federal Register API client.
#[derive(Debug, Clone)]
pub struct FederalRegisterClient {
    client: Client,
    base_url: String,
}

impl FederalRegisterClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::LookupService(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn search(&self, params: &[(&str, String)]) -> AppResult<Vec<RegisterDocument>> {
        let url = format!("{}{}", self.base_url, DOCUMENTS_PATH);

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                AppError::LookupService(format!("Failed to query Federal Register: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::LookupService(format!(
                "Federal Register API error ({})",
                status
            )));
        }

        let body: SearchResponse = response.json().await.map_err(|e| {
            AppError::LookupService(format!("Failed to parse Federal Register response: {}", e))
        })?;

        Ok(body.results)
    }

    /// Fetch one document by its Federal Register document number
    /// ("2022-05471").
    #[instrument(skip(self), fields(registry = "federal_register"))]
    pub async fn document(&self, document_number: &str) -> AppResult<RegisterRecord> {
        let document_number = document_number.trim();
        if document_number.is_empty()
            || !document_number
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(AppError::LookupNotFound(format!(
                "Invalid document number: {:?}",
                document_number
            )));
        }

        let url = format!("{}/documents/{}.json", self.base_url, document_number);
        let response = self.client.get(&url).send().await.map_err(|e| {
            AppError::LookupService(format!("Failed to query Federal Register: {}", e))
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::LookupNotFound(format!(
                "Document {} not found in the Federal Register",
                document_number
            )));
        }
        if !status.is_success() {
            return Err(AppError::LookupService(format!(
                "Federal Register API error ({})",
                status
            )));
        }

        let record: RegisterRecord = response.json().await.map_err(|e| {
            AppError::LookupService(format!("Failed to parse Federal Register document: {}", e))
        })?;
        debug!("Fetched document {}", document_number);
        Ok(record)
    }

    async fn search_executive_orders(&self, number: &str) -> AppResult<Vec<RegisterDocument>> {
        self.search(&[
            ("conditions[type]", "PRESDOCU".to_string()),
            (
                "conditions[presidential_document_type]",
                "executive_order".to_string(),
            ),
            ("conditions[term]", format!("Executive Order {}", number)),
            ("per_page", "10".to_string()),
            ("fields[]", "document_number".to_string()),
            ("fields[]", "title".to_string()),
            ("fields[]", "publication_date".to_string()),
            ("fields[]", "html_url".to_string()),
            ("fields[]", "executive_order_number".to_string()),
        ])
        .await
    }

    async fn general_search(&self, number: &str) -> AppResult<Vec<RegisterDocument>> {
        self.search(&[
            ("conditions[term]", number.to_string()),
            ("per_page", "5".to_string()),
        ])
        .await
    }

    async fn modification_scan(&self, number: &str) -> AppResult<Vec<RegisterDocument>> {
        self.search(&[
            (
                "conditions[term]",
                format!("\"Executive Order {}\" AND (amend OR revoke OR repeal)", number),
            ),
            ("conditions[type]", "PRESDOCU".to_string()),
            ("per_page", "20".to_string()),
            ("fields[]", "document_number".to_string()),
            ("fields[]", "title".to_string()),
            ("fields[]", "publication_date".to_string()),
            ("fields[]", "executive_order_number".to_string()),
        ])
        .await
    }
}

#[async_trait]
impl InstrumentRegistry for FederalRegisterClient {
    fn name(&self) -> &str {
        "federal_register"
    }

    #[instrument(skip(self), fields(registry = "federal_register"))]
    async fn lookup(&self, number: &str) -> AppResult<InstrumentStatus> {
        let number = clean_number(number);
        if number.is_empty() {
            return Err(AppError::LookupNotFound(
                "instrument identifier has no number".to_string(),
            ));
        }

        info!("Looking up Executive Order {}", number);

        let mut results = self.search_executive_orders(&number).await?;
        if results.is_empty() {
            debug!("No executive order hit for {}, trying general search", number);
            results = self.general_search(&number).await?;
        }

        let original = select_match(&number, &results)
            .cloned()
            .ok_or_else(|| {
                AppError::LookupNotFound(format!(
                    "Executive Order {} not found in the Federal Register",
                    number
                ))
            })?;

        let candidates = self.modification_scan(&number).await?;
        let status = classify_modifications(&number, &original, &candidates);

        info!(
            "Executive Order {} is {} ({} revocations, {} amendments)",
            number,
            status.status,
            status.revocations.len(),
            status.amendments.len()
        );

        Ok(status)
    }
}
