//! HTTP-backed collaborators
//!
//! Production implementations of [`IdentityResolver`] and [`RecordStore`].
//! NSID ownership lookups go through a DNS-over-HTTPS resolver (JSON
//! dialect); DID documents come from the PLC directory or a `did:web`
//! well-known path; records move over the storage service's XRPC endpoints.
//! All calls are synchronous and blocking.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Result, SyncError};
use crate::nsid::Nsid;
use crate::resolver::{Did, IdentityResolver};
use crate::session::Session;
use crate::store::{RecordPage, RecordRef, RecordStore};

pub const DEFAULT_DOH_ENDPOINT: &str = "https://cloudflare-dns.com/dns-query";
pub const DEFAULT_PLC_HOST: &str = "https://plc.directory";

const USER_AGENT: &str = concat!("lexsync/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn build_client() -> Result<Client> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

fn xrpc_url(endpoint: &str, method: &str) -> String {
    format!("{}/xrpc/{}", endpoint.trim_end_matches('/'), method)
}

#[derive(Debug, Deserialize)]
struct XrpcErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Map a non-success XRPC response to a server error with the body's
/// message attached.
fn check_response(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp
        .json::<XrpcErrorBody>()
        .ok()
        .and_then(|b| b.message.or(b.error))
        .unwrap_or_else(|| status.to_string());
    Err(SyncError::Server {
        status: status.as_u16(),
        message,
    })
}

/// Identity resolution over DNS-over-HTTPS and DID document fetches.
pub struct HttpIdentityResolver {
    http: Client,
    doh_endpoint: String,
    plc_host: String,
}

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    data: String,
}

#[derive(Debug, Deserialize)]
struct DidDocument {
    #[serde(default)]
    service: Vec<DidService>,
}

#[derive(Debug, Deserialize)]
struct DidService {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default)]
    service_type: String,
    #[serde(rename = "serviceEndpoint", default)]
    service_endpoint: Value,
}

impl HttpIdentityResolver {
    pub fn new(doh_endpoint: impl Into<String>, plc_host: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: build_client()?,
            doh_endpoint: doh_endpoint.into(),
            plc_host: plc_host.into(),
        })
    }

    fn fetch_did_document(&self, did: &Did) -> Result<DidDocument> {
        let url = match did.method() {
            "plc" => format!("{}/{}", self.plc_host.trim_end_matches('/'), did),
            "web" => {
                let host = did
                    .as_str()
                    .strip_prefix("did:web:")
                    .unwrap_or_default()
                    .replace("%3A", ":");
                format!("https://{host}/.well-known/did.json")
            }
            method => {
                return Err(SyncError::IdentityLookup {
                    did: did.to_string(),
                    message: format!("unsupported DID method: {method}"),
                })
            }
        };
        let resp = check_response(self.http.get(url).send()?)?;
        Ok(resp.json()?)
    }
}

impl IdentityResolver for HttpIdentityResolver {
    fn resolve_nsid(&self, nsid: &Nsid) -> Result<Did> {
        let name = format!("_lexicon.{}", nsid.authority());
        let resp = self
            .http
            .get(&self.doh_endpoint)
            .query(&[("name", name.as_str()), ("type", "TXT")])
            .header("accept", "application/dns-json")
            .send()?;
        let body: DohResponse = check_response(resp)?.json()?;

        if body.status != 0 {
            return Err(SyncError::NsidUnresolved(nsid.to_string()));
        }
        for answer in body.answer {
            let data = answer.data.trim().trim_matches('"');
            if let Some(raw) = data.strip_prefix("did=") {
                return Did::parse(raw);
            }
        }
        Err(SyncError::NsidUnresolved(nsid.to_string()))
    }

    fn lookup_did(&self, did: &Did) -> Result<String> {
        let doc = self.fetch_did_document(did)?;
        doc.service
            .iter()
            .find(|s| {
                s.id.ends_with("#atproto_pds") || s.service_type == "AtprotoPersonalDataServer"
            })
            .and_then(|s| s.service_endpoint.as_str())
            .map(str::to_string)
            .ok_or_else(|| SyncError::IdentityLookup {
                did: did.to_string(),
                message: "no personal data server endpoint in DID document".to_string(),
            })
    }
}

/// Record storage over the service's XRPC endpoints.
pub struct HttpRecordStore {
    http: Client,
}

#[derive(Debug, Deserialize)]
struct ListRecordsOutput {
    records: Vec<RecordRef>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteRecordOutput {
    #[serde(default)]
    commit: Option<Value>,
}

impl HttpRecordStore {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: build_client()?,
        })
    }
}

impl RecordStore for HttpRecordStore {
    fn list_records(
        &self,
        endpoint: &str,
        collection: &str,
        repo: &Did,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<RecordPage> {
        let mut query = vec![
            ("collection", collection.to_string()),
            ("repo", repo.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }
        let resp = self
            .http
            .get(xrpc_url(endpoint, "com.atproto.repo.listRecords"))
            .query(&query)
            .send()?;
        let out: ListRecordsOutput = check_response(resp)?.json()?;
        Ok(RecordPage {
            records: out.records,
            cursor: out.cursor,
        })
    }

    fn get_record(
        &self,
        endpoint: &str,
        collection: &str,
        repo: &Did,
        rkey: &str,
    ) -> Result<RecordRef> {
        let resp = self
            .http
            .get(xrpc_url(endpoint, "com.atproto.repo.getRecord"))
            .query(&[
                ("collection", collection),
                ("repo", repo.as_str()),
                ("rkey", rkey),
            ])
            .send()?;
        Ok(check_response(resp)?.json()?)
    }

    fn put_record(
        &self,
        session: &Session,
        collection: &str,
        rkey: &str,
        record: Value,
    ) -> Result<()> {
        let resp = self
            .http
            .post(xrpc_url(&session.endpoint, "com.atproto.repo.putRecord"))
            .bearer_auth(&session.access_token)
            .json(&json!({
                "repo": session.did,
                "collection": collection,
                "rkey": rkey,
                "record": record,
            }))
            .send()?;
        check_response(resp)?;
        Ok(())
    }

    fn delete_record(&self, session: &Session, collection: &str, rkey: &str) -> Result<bool> {
        let resp = self
            .http
            .post(xrpc_url(&session.endpoint, "com.atproto.repo.deleteRecord"))
            .bearer_auth(&session.access_token)
            .json(&json!({
                "repo": session.did,
                "collection": collection,
                "rkey": rkey,
            }))
            .send()?;
        let out: DeleteRecordOutput = check_response(resp)?.json()?;
        Ok(out.commit.is_some())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionOutput {
    did: String,
    access_jwt: String,
    refresh_jwt: String,
}

/// Authenticate against a service with account credentials, producing a
/// session usable for publish/unpublish.
pub fn login(service: &str, identifier: &str, password: &str) -> Result<Session> {
    let http = build_client()?;
    let resp = http
        .post(xrpc_url(service, "com.atproto.server.createSession"))
        .json(&json!({
            "identifier": identifier,
            "password": password,
        }))
        .send()?;
    let out: CreateSessionOutput = check_response(resp)?.json()?;
    Ok(Session::new(
        Did::parse(&out.did)?,
        service.trim_end_matches('/'),
        out.access_jwt,
        out.refresh_jwt,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xrpc_url() {
        assert_eq!(
            xrpc_url("https://pds.example.com/", "com.atproto.repo.listRecords"),
            "https://pds.example.com/xrpc/com.atproto.repo.listRecords"
        );
    }

    #[test]
    fn test_doh_answer_parsing() {
        let body: DohResponse = serde_json::from_str(
            r#"{"Status":0,"Answer":[{"name":"_lexicon.example.com","type":16,"data":"\"did=did:plc:abc123\""}]}"#,
        )
        .unwrap();
        assert_eq!(body.status, 0);
        let data = body.answer[0].data.trim().trim_matches('"');
        assert_eq!(data.strip_prefix("did="), Some("did:plc:abc123"));
    }

    #[test]
    fn test_nxdomain_status() {
        let body: DohResponse = serde_json::from_str(r#"{"Status":3}"#).unwrap();
        assert_eq!(body.status, 3);
        assert!(body.answer.is_empty());
    }
}
