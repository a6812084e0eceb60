use std::path::Path;
use std::time::SystemTime;

use anyhow::{anyhow, bail, Context, Result};
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use csv_async::AsyncWriter;
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::sync::Mutex;

use crate::types::credential::CredentialBundle;

use super::CredentialClient;

pub const DEFAULT_REGION: &str = "us-east-1";

const JSON_CONTENT_TYPE: &str = "application/json";
const TEXT_CONTENT_TYPE: &str = "text/plain";
const CSV_CONTENT_TYPE: &str = "text/csv";

/// Object operations on one bucket, signed with credentials the broker vends
/// for one service. Credentials are fetched lazily and refreshed through the
/// [`CredentialClient`] cache before they expire.
pub struct ObjectClient {
    credentials: CredentialClient,
    service: String,
    bucket: String,

    region: String,
    endpoint_url: Option<String>,

    /// S3 client built for the access key it carries.
    client: Mutex<Option<(String, Client)>>,
}

impl ObjectClient {
    pub fn new(credentials: CredentialClient, service: &str, bucket: &str) -> Self {
        Self {
            credentials,
            service: service.to_string(),
            bucket: bucket.to_string(),
            region: String::from(DEFAULT_REGION),
            endpoint_url: None,
            client: Mutex::new(None),
        }
    }

    pub fn set_region(&mut self, region: &str) {
        self.region = region.to_string();
    }

    /// Talks to an S3-compatible endpoint instead of AWS, addressing buckets
    /// by path.
    pub fn set_endpoint_url(&mut self, endpoint_url: &str) {
        self.endpoint_url = Some(endpoint_url.to_string());
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub async fn file_exists(&self, key: &str) -> Result<bool> {
        let client = self.s3().await?;
        match client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(err) => Err(self.sdk_error("head", key, err)),
        }
    }

    /// Object content, `None` when the key does not exist.
    pub async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let client = self.s3().await?;
        let output = match client.get_object().bucket(&self.bucket).key(key).send().await {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                return Ok(None)
            }
            Err(err) => return Err(self.sdk_error("get", key, err)),
        };
        let data = output
            .body
            .collect()
            .await
            .with_context(|| format!("read body of '{key}'"))?;
        Ok(Some(data.into_bytes().to_vec()))
    }

    pub async fn read_text(&self, key: &str) -> Result<Option<String>> {
        match self.read_bytes(key).await? {
            Some(data) => {
                let text = String::from_utf8(data)
                    .with_context(|| format!("object '{key}' is not utf-8 text"))?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(data) => {
                let value = serde_json::from_slice(&data)
                    .with_context(|| format!("decode json object '{key}'"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub async fn write_bytes(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        let client = self.s3().await?;
        let size = data.len();
        client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| self.sdk_error("put", key, err))?;
        debug!("Put s3://{}/{key}, {size} byte(s)", self.bucket);
        Ok(())
    }

    pub async fn write_text(&self, key: &str, text: &str) -> Result<()> {
        self.write_bytes(key, text.as_bytes().to_vec(), TEXT_CONTENT_TYPE)
            .await
    }

    pub async fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let data = encode_json(value).with_context(|| format!("encode json object '{key}'"))?;
        self.write_bytes(key, data, JSON_CONTENT_TYPE).await
    }

    pub async fn upload_file(&self, path: &Path, key: &str) -> Result<()> {
        let body = ByteStream::from_path(path)
            .await
            .with_context(|| format!("open file '{}'", path.display()))?;
        let client = self.s3().await?;
        client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|err| self.sdk_error("upload", key, err))?;
        info!("Uploaded '{}' to s3://{}/{key}", path.display(), self.bucket);
        Ok(())
    }

    pub async fn download_file(&self, key: &str, path: &Path) -> Result<()> {
        let data = match self.read_bytes(key).await? {
            Some(data) => data,
            None => bail!("object '{key}' not found in bucket '{}'", self.bucket),
        };
        fs::write(path, data)
            .await
            .with_context(|| format!("write file '{}'", path.display()))?;
        info!("Downloaded s3://{}/{key} to '{}'", self.bucket, path.display());
        Ok(())
    }

    /// Every key under `prefix`, following continuation pages.
    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let client = self.s3().await?;
        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let output = client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(|err| self.sdk_error("list", prefix, err))?;
            keys.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .map(String::from),
            );
            match output.next_continuation_token() {
                Some(next) if output.is_truncated() == Some(true) => {
                    token = Some(next.to_string())
                }
                _ => break,
            }
        }
        Ok(keys)
    }

    pub async fn delete_object(&self, key: &str) -> Result<()> {
        let client = self.s3().await?;
        client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| self.sdk_error("delete", key, err))?;
        info!("Deleted s3://{}/{key}", self.bucket);
        Ok(())
    }

    /// Appends one CSV record to a text object, creating it when missing.
    pub async fn append_csv_row<I, T>(&self, key: &str, row: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let existing = self.read_text(key).await?.unwrap_or_default();
        let content = append_csv_record(existing, row).await?;
        self.write_bytes(key, content.into_bytes(), CSV_CONTENT_TYPE)
            .await
    }

    async fn s3(&self) -> Result<Client> {
        let bundle = self
            .credentials
            .credentials(&self.service, Some(&self.bucket))
            .await
            .with_context(|| format!("fetch credentials for service '{}'", self.service))?;

        let mut cached = self.client.lock().await;
        if let Some((access_key_id, client)) = cached.as_ref() {
            if *access_key_id == bundle.access_key_id {
                return Ok(client.clone());
            }
        }

        let mut config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .credentials_provider(sdk_credentials(&bundle));
        if let Some(endpoint_url) = self.endpoint_url.as_ref() {
            config = config.endpoint_url(endpoint_url).force_path_style(true);
        }
        let client = Client::from_conf(config.build());
        debug!(
            "Built s3 client for bucket '{}' with key {}",
            self.bucket, bundle.access_key_id
        );
        *cached = Some((bundle.access_key_id, client.clone()));
        Ok(client)
    }

    fn sdk_error<E>(&self, op: &str, key: &str, err: E) -> anyhow::Error
    where
        E: std::error::Error,
    {
        anyhow!(
            "{op} s3://{}/{key}: {}",
            self.bucket,
            DisplayErrorContext(err)
        )
    }
}

fn sdk_credentials(bundle: &CredentialBundle) -> Credentials {
    Credentials::new(
        bundle.access_key_id.clone(),
        bundle.secret_access_key.clone(),
        Some(bundle.session_token.clone()),
        Some(SystemTime::from(bundle.expiration)),
        "s3bridge",
    )
}

fn encode_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut data, formatter);
    value.serialize(&mut ser)?;
    Ok(data)
}

/// `existing` with one more CSV record. A missing final newline is added
/// first so the record starts on its own line.
async fn append_csv_record<I, T>(mut existing: String, row: I) -> Result<String>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    if !existing.is_empty() && !existing.ends_with('\n') {
        existing.push('\n');
    }

    let mut writer = AsyncWriter::from_writer(Vec::new());
    writer.write_record(row).await.context("encode csv row")?;
    writer.flush().await.context("flush csv row")?;
    let record = writer
        .into_inner()
        .await
        .map_err(|err| anyhow!("finish csv row: {err}"))?;
    let record = String::from_utf8(record).context("csv row is not utf-8")?;

    existing.push_str(&record);
    Ok(existing)
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_append_csv_record() {
        let content = append_csv_record(String::new(), ["date", "count"])
            .await
            .unwrap();
        assert_eq!(content.lines().collect::<Vec<_>>(), vec!["date,count"]);

        // Rows land on their own line even when the object lacks a trailing
        // newline.
        let content = append_csv_record(String::from("date,count"), ["2024-01-02", "7"])
            .await
            .unwrap();
        assert_eq!(
            content.lines().collect::<Vec<_>>(),
            vec!["date,count", "2024-01-02,7"]
        );

        let content = append_csv_record(content, ["2024-01-03", "a \"quoted\", value"])
            .await
            .unwrap();
        assert_eq!(
            content.lines().last().unwrap(),
            "2024-01-03,\"a \"\"quoted\"\", value\""
        );
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn test_encode_json() {
        let data = encode_json(&json!({ "name": "report" })).unwrap();
        assert_eq!(
            String::from_utf8(data).unwrap(),
            "{\n    \"name\": \"report\"\n}"
        );
    }

    #[test]
    fn test_sdk_credentials() {
        let bundle = CredentialBundle {
            access_key_id: String::from("ASIATEST"),
            secret_access_key: String::from("secret"),
            session_token: String::from("token"),
            expiration: DateTime::from_timestamp(4_000_000_000, 0).unwrap(),
        };
        let credentials = sdk_credentials(&bundle);
        assert_eq!(credentials.access_key_id(), "ASIATEST");
        assert_eq!(credentials.secret_access_key(), "secret");
        assert_eq!(credentials.session_token(), Some("token"));
        assert_eq!(
            credentials.expiry(),
            Some(SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(4_000_000_000))
        );
    }

    #[tokio::test]
    async fn test_missing_broker_fails_before_s3() {
        let credentials =
            CredentialClient::new("http://127.0.0.1:9", "", String::from("a=1")).unwrap();
        let client = ObjectClient::new(credentials, "analytics", "analytics-reports");
        let err = client.list_objects("daily/").await.unwrap_err();
        assert!(
            format!("{err:#}").contains("fetch credentials for service 'analytics'"),
            "{err:#}"
        );
    }
}
