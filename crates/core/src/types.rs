use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Display name used when a customer arrives without one.
pub const DEFAULT_CUSTOMER_NAME: &str = "Cliente";

/// Recipient of a campaign message. Only used as personalization input and
/// message destination.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, rename = "nome", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, rename = "regiao", skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Customer {
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => DEFAULT_CUSTOMER_NAME,
        }
    }

    /// Identifier used in logs and failure lists.
    pub fn log_id(&self) -> &str {
        self.id.as_deref().unwrap_or("unknown")
    }
}

/// Closed set of segment variants. Anything unrecognized is `General`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SegmentTag {
    #[serde(rename = "premium")]
    Premium,
    #[serde(rename = "regiao_sul")]
    SouthRegion,
    #[serde(rename = "geral")]
    General,
}

impl SegmentTag {
    /// Parse a wire tag. Returns `None` for unrecognized values.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "premium" => Some(SegmentTag::Premium),
            "regiao_sul" | "south_region" | "south-region" => Some(SegmentTag::SouthRegion),
            "geral" | "general" => Some(SegmentTag::General),
            _ => None,
        }
    }

    /// Parse a wire tag, falling back to `General`.
    pub fn resolve(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(SegmentTag::General)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentTag::Premium => "premium",
            SegmentTag::SouthRegion => "regiao_sul",
            SegmentTag::General => "geral",
        }
    }
}

impl std::fmt::Display for SegmentTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Inbound request ───────────────────────────────────────────────────────

/// Segment as received on the trigger endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SegmentSpec {
    #[serde(default, rename = "tipo", skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// An explicit `null` reads as an empty list.
    #[serde(default, rename = "clientes", deserialize_with = "null_as_empty")]
    pub customers: Vec<Customer>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Campaign trigger request. Every field is optional on the wire so that
/// validation can name the first one missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignRequest {
    #[serde(default, rename = "nome")]
    pub name: Option<String>,
    #[serde(default, rename = "assunto")]
    pub subject: Option<String>,
    #[serde(default, rename = "conteudo")]
    pub body: Option<String>,
    #[serde(default, rename = "grupos")]
    pub segments: Option<Vec<SegmentSpec>>,
}

// ─── Validated campaign ────────────────────────────────────────────────────

/// One segment of an accepted campaign.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Tag exactly as received, reported back in results and messages.
    pub label: String,
    pub tag: SegmentTag,
    pub customers: Vec<Customer>,
}

/// An accepted campaign, ready for fan-out.
#[derive(Debug, Clone)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub subject: String,
    pub body: String,
    pub segments: Vec<Segment>,
    pub created_at: DateTime<Utc>,
}

// ─── Outbound message ──────────────────────────────────────────────────────

/// Message consumed by the e-mail delivery worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundEmailMessage {
    #[serde(rename = "destinatario")]
    pub recipient: String,
    #[serde(rename = "assunto")]
    pub subject: String,
    #[serde(rename = "conteudo")]
    pub body: String,
    #[serde(rename = "campanha_id")]
    pub campaign_id: Uuid,
    #[serde(rename = "grupo")]
    pub segment: String,
    #[serde(rename = "cliente_id")]
    pub customer_id: Option<String>,
    /// Creation time, epoch milliseconds.
    pub timestamp: i64,
}

// ─── Results and records ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SegmentResult {
    #[serde(rename = "tipo")]
    pub segment: String,
    #[serde(rename = "clientes_alvo")]
    pub customers_targeted: usize,
    #[serde(rename = "emails_enviados")]
    pub messages_enqueued: usize,
    #[serde(rename = "queue_url", default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    #[serde(rename = "erro", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "clientes_com_falha", default, skip_serializing_if = "Vec::is_empty")]
    pub failed_customers: Vec<String>,
}

impl SegmentResult {
    /// Result for a segment whose processing did not complete.
    pub fn failed(segment: &Segment, reason: impl Into<String>) -> Self {
        Self {
            segment: segment.label.clone(),
            customers_targeted: segment.customers.len(),
            messages_enqueued: 0,
            queue: None,
            error: Some(reason.into()),
            failed_customers: Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CampaignStatus {
    #[serde(rename = "iniciada")]
    Started,
    #[serde(rename = "concluida")]
    Completed,
}

/// Persisted campaign record, written once on start and once on completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CampaignRecord {
    #[serde(rename = "campanha_id")]
    pub campaign_id: Uuid,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "assunto")]
    pub subject: String,
    #[serde(rename = "conteudo")]
    pub body: String,
    #[serde(rename = "grupos")]
    pub segments: Vec<SegmentSpec>,
    pub status: CampaignStatus,
    #[serde(rename = "emails_enviados")]
    pub messages_enqueued: usize,
    #[serde(rename = "criado_em")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "finalizado_em", default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(rename = "grupos_processados", default)]
    pub segment_results: Vec<SegmentResult>,
}

impl CampaignRecord {
    pub fn started(campaign: &Campaign) -> Self {
        Self {
            campaign_id: campaign.id,
            name: campaign.name.clone(),
            subject: campaign.subject.clone(),
            body: campaign.body.clone(),
            segments: campaign
                .segments
                .iter()
                .map(|s| SegmentSpec {
                    tag: Some(s.label.clone()),
                    customers: s.customers.clone(),
                })
                .collect(),
            status: CampaignStatus::Started,
            messages_enqueued: 0,
            created_at: campaign.created_at,
            completed_at: None,
            segment_results: Vec::new(),
        }
    }

    /// Terminal record. Consumes the start record so it cannot be reused.
    pub fn complete(self, results: Vec<SegmentResult>, completed_at: DateTime<Utc>) -> Self {
        Self {
            status: CampaignStatus::Completed,
            messages_enqueued: results.iter().map(|r| r.messages_enqueued).sum(),
            completed_at: Some(completed_at),
            segment_results: results,
            ..self
        }
    }
}

/// Response body of the trigger endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CampaignSummary {
    #[serde(rename = "campanha_id")]
    pub campaign_id: Uuid,
    pub status: CampaignStatus,
    #[serde(rename = "emails_enviados")]
    pub messages_enqueued: usize,
    #[serde(rename = "grupos_processados")]
    pub segment_results: Vec<SegmentResult>,
}

impl From<&CampaignRecord> for CampaignSummary {
    fn from(record: &CampaignRecord) -> Self {
        Self {
            campaign_id: record.campaign_id,
            status: record.status,
            messages_enqueued: record.messages_enqueued,
            segment_results: record.segment_results.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_tag_parse_aliases() {
        assert_eq!(SegmentTag::parse("premium"), Some(SegmentTag::Premium));
        assert_eq!(SegmentTag::parse("regiao_sul"), Some(SegmentTag::SouthRegion));
        assert_eq!(SegmentTag::parse("south-region"), Some(SegmentTag::SouthRegion));
        assert_eq!(SegmentTag::parse("General"), Some(SegmentTag::General));
        assert_eq!(SegmentTag::parse("premum"), None);
        assert_eq!(SegmentTag::resolve("premum"), SegmentTag::General);
    }

    #[test]
    fn test_customer_display_name_fallback() {
        let anonymous = Customer::default();
        assert_eq!(anonymous.display_name(), DEFAULT_CUSTOMER_NAME);
        assert_eq!(anonymous.log_id(), "unknown");

        let named = Customer {
            name: Some("Ana".into()),
            ..Default::default()
        };
        assert_eq!(named.display_name(), "Ana");
    }

    #[test]
    fn test_null_customer_list_reads_as_empty() {
        let spec: SegmentSpec =
            serde_json::from_str(r#"{"tipo": "geral", "clientes": null}"#).unwrap();
        assert_eq!(spec.tag.as_deref(), Some("geral"));
        assert!(spec.customers.is_empty());

        let spec: SegmentSpec = serde_json::from_str(r#"{"tipo": "geral"}"#).unwrap();
        assert!(spec.customers.is_empty());
    }

    #[test]
    fn test_request_wire_names() {
        let json = r#"{
            "nome": "X", "assunto": "Y", "conteudo": "Z",
            "grupos": [{"tipo": "premium", "clientes": [{"id": "1", "nome": "A", "email": "a@x.com"}]}]
        }"#;
        let request: CampaignRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.name.as_deref(), Some("X"));
        let segments = request.segments.unwrap();
        assert_eq!(segments[0].tag.as_deref(), Some("premium"));
        assert_eq!(segments[0].customers[0].email.as_deref(), Some("a@x.com"));
        assert_eq!(segments[0].customers[0].region, None);
    }

    #[test]
    fn test_record_completion_sums_segments() {
        let campaign = Campaign {
            id: Uuid::new_v4(),
            name: "X".into(),
            subject: "Y".into(),
            body: "Z".into(),
            segments: vec![],
            created_at: Utc::now(),
        };
        let ok = SegmentResult {
            segment: "premium".into(),
            customers_targeted: 3,
            messages_enqueued: 2,
            queue: Some("emails.premium".into()),
            error: None,
            failed_customers: vec!["7".into()],
        };
        let segment = Segment {
            label: "geral".into(),
            tag: SegmentTag::General,
            customers: vec![Customer::default()],
        };
        let failed = SegmentResult::failed(&segment, "timed out");

        let record = CampaignRecord::started(&campaign).complete(vec![ok, failed], Utc::now());
        assert_eq!(record.status, CampaignStatus::Completed);
        assert_eq!(record.messages_enqueued, 2);
        assert_eq!(record.segment_results.len(), 2);
        assert!(record.segment_results[1].is_failed());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "concluida");
        assert_eq!(json["grupos_processados"][1]["erro"], "timed out");
        assert!(json["grupos_processados"][1].get("queue_url").is_none());
    }
}
