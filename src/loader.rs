//! Bulk indexing of listing images from a CSV file.
//!
//! Each row is uploaded to a running service's `/index` endpoint. A failing
//! row is reported and skipped; the run continues with the next one.

use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);
/// Characters of the service response echoed per row
const RESPONSE_PREVIEW: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedRow {
    #[serde(default)]
    pub listing_id: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub local_path_to_image: Option<String>,
}

impl SeedRow {
    /// The local image path, when set and pointing at an existing file.
    fn local_file(&self) -> Option<PathBuf> {
        let path = self.local_path_to_image.as_deref()?.trim();
        if path.is_empty() {
            return None;
        }
        let path = PathBuf::from(path);
        path.is_file().then_some(path)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub indexed: usize,
    pub failed: usize,
}

pub fn read_rows(path: &Path) -> anyhow::Result<Vec<SeedRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("cannot open {}", path.display()))?;

    let mut rows = vec![];
    for row in reader.deserialize() {
        let row: SeedRow = row.with_context(|| format!("malformed row in {}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

pub struct Loader {
    base_url: String,
    download: reqwest::blocking::Client,
    upload: reqwest::blocking::Client,
}

impl Loader {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url).with_context(|| format!("invalid base url '{base_url}'"))?;

        Ok(Self {
            base_url,
            download: reqwest::blocking::Client::builder()
                .timeout(DOWNLOAD_TIMEOUT)
                .build()?,
            upload: reqwest::blocking::Client::builder()
                .timeout(UPLOAD_TIMEOUT)
                .build()?,
        })
    }

    /// Image bytes and a file name for `row`: the local file when present,
    /// otherwise a download of `image_url`.
    pub fn load_image(&self, row: &SeedRow) -> anyhow::Result<(Vec<u8>, String)> {
        if let Some(path) = row.local_file() {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "image.jpg".to_string());
            return Ok((bytes, name));
        }

        if row.image_url.is_empty() {
            bail!("no local file and no image_url");
        }

        let response = self.download.get(&row.image_url).send()?.error_for_status()?;
        let bytes = response.bytes()?.to_vec();

        let name = row
            .image_url
            .rsplit('/')
            .next()
            .filter(|n| !n.is_empty())
            .unwrap_or("image.jpg")
            .to_string();

        Ok((bytes, name))
    }

    /// Upload one row. Returns the service's status code and response body.
    pub fn index_row(&self, row: &SeedRow) -> anyhow::Result<(u16, String)> {
        let (bytes, file_name) = self.load_image(row)?;

        let form = reqwest::blocking::multipart::Form::new()
            .text("listing_id", row.listing_id.clone())
            .text("image_url", row.image_url.clone())
            .part(
                "file",
                reqwest::blocking::multipart::Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str("application/octet-stream")?,
            );

        let response = self
            .upload
            .post(format!("{}/index", self.base_url))
            .multipart(form)
            .send()?;

        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();
        Ok((status, body))
    }

    pub fn run(&self, rows: &[SeedRow]) -> LoadSummary {
        let pb = ProgressBar::new(rows.len() as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} ({eta}) {msg}")
        {
            pb.set_style(style.progress_chars("=> "));
        }

        let mut summary = LoadSummary::default();

        for row in rows {
            pb.set_message(row.listing_id.clone());
            match self.index_row(row) {
                Ok((status, body)) => {
                    pb.println(format!(
                        "{} {} {}",
                        row.listing_id,
                        status,
                        preview(&body)
                    ));
                    if (200..300).contains(&status) {
                        summary.indexed += 1;
                    } else {
                        summary.failed += 1;
                    }
                }
                Err(e) => {
                    pb.println(format!("{} ERROR {:#}", row.listing_id, e));
                    summary.failed += 1;
                }
            }
            pb.inc(1);
        }

        pb.finish_and_clear();
        summary
    }
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(RESPONSE_PREVIEW) {
        Some((cut, _)) => &body[..cut],
        None => body,
    }
}

/// Index every row of `csv_path` through the service at `base_url`.
pub fn index_csv(base_url: &str, csv_path: &Path) -> anyhow::Result<LoadSummary> {
    let rows = read_rows(csv_path)?;
    log::info!("indexing {} rows from {}", rows.len(), csv_path.display());

    let loader = Loader::new(base_url)?;
    let summary = loader.run(&rows);

    println!("{} indexed, {} failed", summary.indexed, summary.failed);
    Ok(summary)
}
