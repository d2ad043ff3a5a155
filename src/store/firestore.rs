//! Firestore REST backend.
//!
//! Documents cross the wire in Firestore's tagged field format
//! (`integerValue`, `stringValue`, ...); conversion to and from plain JSON
//! happens here and only here, so the engine never sees the tagged form.
//! Merge semantics come from `batchWrite` update masks listing exactly the
//! fields being written.

use super::{DocumentStore, Fields, WriteOp, MAX_BATCH_OPS};
use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use std::time::Duration;

const PUBLIC_ENDPOINT: &str = "https://firestore.googleapis.com";
const LIST_PAGE_SIZE: usize = 300;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct FirestoreStore {
    client: Client,
    /// `{endpoint}/v1`
    base_url: String,
    /// `projects/{p}/databases/(default)/documents`
    root: String,
    token: Option<String>,
}

impl FirestoreStore {
    pub fn new(project: &str) -> Result<Self> {
        Self::with_endpoint(PUBLIC_ENDPOINT, project)
    }

    /// Points the client at a non-default endpoint, e.g. a local emulator.
    pub fn with_endpoint(endpoint: &str, project: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed building HTTP client")?;
        Ok(Self {
            client,
            base_url: format!("{}/v1", endpoint.trim_end_matches('/')),
            root: format!("projects/{project}/databases/(default)/documents"),
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn doc_url(&self, collection: &str, key: &str) -> String {
        format!("{}/{}/{collection}/{key}", self.base_url, self.root)
    }
}

impl DocumentStore for FirestoreStore {
    fn get(&self, collection: &str, key: &str) -> Result<Option<Fields>> {
        let response = self
            .authorize(self.client.get(self.doc_url(collection, key)))
            .send()
            .with_context(|| format!("fetching {collection}/{key}"))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let doc: Value = response
            .error_for_status()
            .with_context(|| format!("fetching {collection}/{key}"))?
            .json()
            .context("decoding document response")?;
        Ok(Some(fields_from_wire(&doc)))
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Fields)>> {
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = format!("{}/{}/{collection}", self.base_url, self.root);
            let mut request = self
                .client
                .get(&url)
                .query(&[("pageSize", LIST_PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let body: Value = self
                .authorize(request)
                .send()
                .with_context(|| format!("listing collection {collection}"))?
                .error_for_status()
                .with_context(|| format!("listing collection {collection}"))?
                .json()
                .context("decoding list response")?;

            if let Some(documents) = body.get("documents").and_then(Value::as_array) {
                for doc in documents {
                    let key = doc
                        .get("name")
                        .and_then(Value::as_str)
                        .and_then(|name| name.rsplit('/').next())
                        .ok_or_else(|| anyhow!("document without a name in {collection}"))?;
                    out.push((key.to_string(), fields_from_wire(doc)));
                }
            }

            page_token = body
                .get("nextPageToken")
                .and_then(Value::as_str)
                .map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }

        Ok(out)
    }

    fn commit(&self, ops: &[WriteOp]) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }
        if ops.len() > MAX_BATCH_OPS {
            bail!("batch of {} ops exceeds the {MAX_BATCH_OPS} op limit", ops.len());
        }

        let writes: Vec<Value> = ops
            .iter()
            .map(|op| {
                let fields: Map<String, Value> = op
                    .fields
                    .iter()
                    .map(|(name, value)| (name.clone(), to_wire(value)))
                    .collect();
                let paths: Vec<&String> = op.fields.keys().collect();
                json!({
                    "update": {
                        "name": format!("{}/{}/{}", self.root, op.collection, op.key),
                        "fields": fields,
                    },
                    "updateMask": { "fieldPaths": paths },
                })
            })
            .collect();

        let url = format!("{}/{}:batchWrite", self.base_url, self.root);
        let body: Value = self
            .authorize(self.client.post(&url).json(&json!({ "writes": writes })))
            .send()
            .context("committing write batch")?
            .error_for_status()
            .context("committing write batch")?
            .json()
            .context("decoding batchWrite response")?;

        // batchWrite is non-atomic: each write carries its own status
        if let Some(statuses) = body.get("status").and_then(Value::as_array) {
            for (i, status) in statuses.iter().enumerate() {
                let code = status.get("code").and_then(Value::as_i64).unwrap_or(0);
                if code != 0 {
                    let message = status
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error");
                    bail!(
                        "write {i} of {} failed (code {code}): {message}",
                        ops.len()
                    );
                }
            }
        }

        Ok(())
    }
}

fn fields_from_wire(doc: &Value) -> Fields {
    doc.get("fields")
        .and_then(Value::as_object)
        .map(|fields| {
            fields
                .iter()
                .map(|(name, value)| (name.clone(), from_wire(value)))
                .collect()
        })
        .unwrap_or_default()
}

/// Plain JSON to tagged Firestore value.
fn to_wire(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                // the wire format carries integers as strings
                json!({ "integerValue": i.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(to_wire).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => {
            let fields: Map<String, Value> = map
                .iter()
                .map(|(name, value)| (name.clone(), to_wire(value)))
                .collect();
            json!({ "mapValue": { "fields": fields } })
        }
    }
}

/// Tagged Firestore value to plain JSON.
fn from_wire(value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return Value::Null;
    };

    if obj.contains_key("nullValue") {
        return Value::Null;
    }
    if let Some(b) = obj.get("booleanValue").and_then(Value::as_bool) {
        return Value::Bool(b);
    }
    if let Some(raw) = obj.get("integerValue") {
        // the emulator may answer with either a string or a bare number
        if let Some(s) = raw.as_str() {
            if let Ok(i) = s.parse::<i64>() {
                return Value::from(i);
            }
            return Value::String(s.to_string());
        }
        return raw.clone();
    }
    if let Some(f) = obj.get("doubleValue").and_then(Value::as_f64) {
        return serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Some(s) = obj.get("stringValue").and_then(Value::as_str) {
        return Value::String(s.to_string());
    }
    if let Some(s) = obj.get("timestampValue").and_then(Value::as_str) {
        return Value::String(s.to_string());
    }
    if let Some(items) = obj
        .get("arrayValue")
        .and_then(|v| v.get("values"))
        .and_then(Value::as_array)
    {
        return Value::Array(items.iter().map(from_wire).collect());
    }
    if let Some(fields) = obj
        .get("mapValue")
        .and_then(|v| v.get("fields"))
        .and_then(Value::as_object)
    {
        return Value::Object(
            fields
                .iter()
                .map(|(name, value)| (name.clone(), from_wire(value)))
                .collect(),
        );
    }

    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_round_trip_through_the_wire_format() {
        for value in [
            Value::Null,
            Value::Bool(true),
            Value::from(42i64),
            Value::from(-7i64),
            Value::from(2.5f64),
            Value::from("O' Brien"),
        ] {
            assert_eq!(from_wire(&to_wire(&value)), value);
        }
    }

    #[test]
    fn integers_are_strings_on_the_wire() {
        assert_eq!(to_wire(&Value::from(9)), json!({ "integerValue": "9" }));
    }

    #[test]
    fn nested_maps_and_arrays_convert() {
        let value = json!({ "tags": ["a", "b"], "meta": { "depth": 2 } });
        assert_eq!(from_wire(&to_wire(&value)), value);
    }

    #[test]
    fn timestamps_read_as_strings() {
        let wire = json!({ "timestampValue": "2026-08-25T00:00:00Z" });
        assert_eq!(from_wire(&wire), Value::from("2026-08-25T00:00:00Z"));
    }

    #[test]
    fn document_without_fields_reads_empty() {
        assert!(fields_from_wire(&json!({ "name": "projects/x" })).is_empty());
    }
}
