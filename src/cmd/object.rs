use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Args, Subcommand};
use s3bridge::client::cookie::CookieSource;
use s3bridge::client::objects::{ObjectClient, DEFAULT_REGION};
use s3bridge::client::CredentialClient;
use s3bridge::display::display_json;
use serde_json::Value;

use super::{LogArgs, RunCommand};

/// Work with objects in a bucket using credentials vended for a service.
#[derive(Args)]
pub struct ObjectArgs {
    pub service: String,

    pub bucket: String,

    #[command(subcommand)]
    pub action: ObjectAction,

    /// Broker address.
    #[arg(short, long, default_value = "http://127.0.0.1:7880")]
    pub server: String,

    /// CA certificate to trust when the broker uses a private one.
    #[arg(long, default_value = "")]
    pub cert_path: String,

    #[arg(long, default_value = DEFAULT_REGION)]
    pub region: String,

    /// S3-compatible endpoint to use instead of AWS.
    #[arg(long)]
    pub endpoint_url: Option<String>,

    #[command(flatten)]
    pub log: LogArgs,
}

#[derive(Subcommand)]
pub enum ObjectAction {
    /// List keys under a prefix.
    Ls {
        #[arg(default_value = "")]
        prefix: String,
    },

    /// Print an object, or save it to a file.
    Get {
        key: String,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Decode the object as JSON and pretty print it.
        #[arg(long)]
        json: bool,
    },

    /// Store text as an object.
    Write {
        key: String,

        text: String,

        /// Store the text as a JSON document; it must parse.
        #[arg(long)]
        json: bool,
    },

    /// Upload a file.
    Put { file: PathBuf, key: String },

    /// Append one CSV row to an object.
    Append { key: String, fields: Vec<String> },

    /// Exit with an error unless the object exists.
    Exists { key: String },

    Rm { key: String },
}

#[async_trait]
impl RunCommand for ObjectArgs {
    async fn run(&self) -> Result<()> {
        self.log.init("warn")?;

        let cookie = CookieSource::new()?.load()?;
        let credentials = CredentialClient::new(&self.server, &self.cert_path, cookie)?;
        let mut client = ObjectClient::new(credentials, &self.service, &self.bucket);
        client.set_region(&self.region);
        if let Some(endpoint_url) = self.endpoint_url.as_ref() {
            client.set_endpoint_url(endpoint_url);
        }

        match &self.action {
            ObjectAction::Ls { prefix } => {
                for key in client.list_objects(prefix).await? {
                    println!("{key}");
                }
            }
            ObjectAction::Get { key, output, json } => match output {
                Some(path) => client.download_file(key, path).await?,
                None if *json => match client.read_json::<Value>(key).await? {
                    Some(value) => display_json(value)?,
                    None => bail!("object '{key}' not found in bucket '{}'", client.bucket()),
                },
                None => match client.read_text(key).await? {
                    Some(text) => print!("{text}"),
                    None => bail!("object '{key}' not found in bucket '{}'", client.bucket()),
                },
            },
            ObjectAction::Write { key, text, json } => {
                if *json {
                    let value: Value = serde_json::from_str(text).context("parse json text")?;
                    client.write_json(key, &value).await?
                } else {
                    client.write_text(key, text).await?
                }
            }
            ObjectAction::Put { file, key } => client.upload_file(file, key).await?,
            ObjectAction::Append { key, fields } => {
                if fields.is_empty() {
                    bail!("at least one field is required");
                }
                client.append_csv_row(key, fields).await?
            }
            ObjectAction::Exists { key } => {
                if !client.file_exists(key).await? {
                    bail!("object '{key}' not found in bucket '{}'", client.bucket());
                }
            }
            ObjectAction::Rm { key } => client.delete_object(key).await?,
        }
        Ok(())
    }
}
