//! B3 instrument registry (InstrumentsConsolidatedFile).
//!
//! Downloaded on demand and cached for a day under the user cache dir. Used
//! by the mapping tools as a second-chance source to find the listed ticker
//! of a company name; the extraction pipeline never touches the network.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use encoding_rs::ISO_8859_15;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::ExtractionError;
use crate::normalize::normalize_text;

const B3_REQUEST_BASE_URL: &str =
    "https://arquivos.b3.com.br/api/download/requestname?fileName=InstrumentsConsolidatedFile&date=";
const B3_API_BASE_URL: &str = "https://arquivos.b3.com.br/api";
const CACHE_FILENAME: &str = "instruments.csv";
const META_FILENAME: &str = "instruments.meta.json";
const CACHE_MAX_AGE_HOURS: i64 = 24;

/// Listed instrument as published by B3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentRecord {
    pub ticker: String,
    pub security_category: String,
    pub corporate_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistryMeta {
    fetched_at: DateTime<Utc>,
    source_url: String,
}

#[derive(Debug, Deserialize)]
struct B3DownloadResponse {
    #[serde(rename = "redirectUrl")]
    redirect_url: Option<String>,
    token: Option<String>,
}

/// In-memory view over the cached instruments file.
#[derive(Debug, Clone, Default)]
pub struct B3Registry {
    records: Vec<InstrumentRecord>,
}

impl B3Registry {
    pub fn from_records(records: Vec<InstrumentRecord>) -> Self {
        Self { records }
    }

    /// Load the cached list, downloading it first when missing or stale.
    pub fn load_or_refresh() -> Result<Self> {
        let cache_dir = registry_cache_dir()?;
        let csv_path = refresh_instruments(&cache_dir, false)?;
        let bytes = fs::read(&csv_path).context("Failed to read cached instruments CSV")?;
        let registry = Self::parse(&bytes)?;
        info!("Loaded {} B3 instrument(s) from {:?}", registry.len(), csv_path);
        Ok(registry)
    }

    /// Parse the raw (ISO-8859-15) instruments CSV.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let (decoded, _, _) = ISO_8859_15.decode(bytes);
        let (cleaned, delimiter) = strip_preamble(&decoded)?;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(cleaned.as_bytes());
        let headers = reader.headers()?.clone();

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result?;
            let ticker = get_field(&record, &headers, "TckrSymb").trim().to_ascii_uppercase();
            if ticker.is_empty() {
                continue;
            }
            records.push(InstrumentRecord {
                ticker,
                security_category: get_field(&record, &headers, "SctyCtgyNm")
                    .trim()
                    .to_ascii_uppercase(),
                corporate_name: get_field(&record, &headers, "CrpnNm").trim().to_string(),
            });
        }

        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Listed share whose corporate name starts with `company` and whose
    /// ticker carries the share-class digit. An exact name match is
    /// preferred over a prefix match.
    pub fn find_ticker(&self, company: &str, suffix_digit: Option<u8>) -> Option<String> {
        let wanted = normalize_text(company);
        if wanted.is_empty() {
            return None;
        }

        let candidates = self.records.iter().filter(|record| {
            record.security_category == "SHARES"
                && suffix_digit.map_or(true, |digit| ticker_has_digit(&record.ticker, digit))
        });

        let mut prefix_match: Option<&InstrumentRecord> = None;
        for record in candidates {
            let name = normalize_text(&record.corporate_name);
            if name == wanted {
                return Some(record.ticker.clone());
            }
            if prefix_match.is_none() && name.starts_with(&wanted) {
                prefix_match = Some(record);
            }
        }
        prefix_match.map(|record| record.ticker.clone())
    }
}

fn ticker_has_digit(ticker: &str, digit: u8) -> bool {
    let root_len = ticker.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    root_len == 4 && ticker[root_len..] == digit.to_string()
}

pub fn registry_cache_dir() -> Result<PathBuf> {
    let cache_dir =
        dir_spec::cache_home().ok_or_else(|| anyhow!("Could not determine cache directory"))?;
    Ok(cache_dir.join("corretagem").join("tickers"))
}

/// Make sure a fresh instruments file exists in `cache_dir` and return its path.
pub fn refresh_instruments(cache_dir: &Path, force: bool) -> Result<PathBuf> {
    fs::create_dir_all(cache_dir).context("Failed to create instruments cache directory")?;

    let csv_path = cache_dir.join(CACHE_FILENAME);
    if !force && csv_path.exists() && !cache_is_stale(cache_dir)? {
        debug!("Using cached B3 instruments at {:?}", csv_path);
        return Ok(csv_path);
    }

    let today = Local::now().date_naive();
    let (bytes, download_url) = match download_instruments(today) {
        Ok(downloaded) => downloaded,
        Err(err) if csv_path.exists() => {
            warn!("Failed to refresh B3 instruments, using stale cache: {}", err);
            return Ok(csv_path);
        }
        Err(err) => return Err(err),
    };

    let tmp_path = cache_dir.join(format!("{}.tmp", CACHE_FILENAME));
    fs::write(&tmp_path, &bytes).context("Failed to write B3 instruments file")?;
    fs::rename(&tmp_path, &csv_path).context("Failed to finalize B3 instruments cache")?;

    let meta = RegistryMeta {
        fetched_at: Utc::now(),
        source_url: download_url,
    };
    fs::write(cache_dir.join(META_FILENAME), serde_json::to_vec_pretty(&meta)?)
        .context("Failed to write instruments metadata")?;

    Ok(csv_path)
}

fn cache_is_stale(cache_dir: &Path) -> Result<bool> {
    let meta_path = cache_dir.join(META_FILENAME);
    if !meta_path.exists() {
        return Ok(true);
    }
    let meta_bytes = fs::read(&meta_path).context("Failed to read instruments metadata")?;
    let meta: RegistryMeta =
        serde_json::from_slice(&meta_bytes).context("Failed to parse instruments metadata")?;
    Ok(Utc::now() - meta.fetched_at > Duration::hours(CACHE_MAX_AGE_HOURS))
}

fn build_download_url(response: &B3DownloadResponse) -> Result<String> {
    if let Some(token) = response.token.as_deref() {
        return Ok(format!("{}/download/?token={}", B3_API_BASE_URL, token));
    }
    match response.redirect_url.as_deref() {
        Some(url) if url.starts_with("http") => Ok(url.to_string()),
        Some(url) => Ok(format!("{}{}", B3_API_BASE_URL, url.trim_start_matches('~'))),
        None => Err(anyhow!("B3 download response missing redirectUrl and token")),
    }
}

// reqwest::blocking cannot run inside the tokio runtime thread, so the
// download happens on its own thread.
fn download_instruments(date: NaiveDate) -> Result<(Vec<u8>, String)> {
    std::thread::spawn(move || {
        let request_url = format!(
            "{}{}&recaptchaToken=",
            B3_REQUEST_BASE_URL,
            date.format("%Y-%m-%d")
        );
        let client = reqwest::blocking::Client::new();
        let response: B3DownloadResponse = client
            .get(&request_url)
            .send()
            .context("Failed to request B3 instruments download")?
            .error_for_status()
            .context("B3 instruments request returned an error status")?
            .json()
            .context("Failed to parse B3 instruments request response")?;

        let download_url = build_download_url(&response)?;
        info!("Downloading B3 instruments from {}", download_url);

        let bytes = client
            .get(&download_url)
            .send()
            .context("Failed to download B3 instruments file")?
            .error_for_status()
            .context("B3 instruments download returned an error status")?
            .bytes()
            .context("Failed to read B3 instruments response")?
            .to_vec();

        Ok((bytes, download_url))
    })
    .join()
    .map_err(|_| anyhow!("Instruments download thread panicked"))?
}

fn get_field<'a>(record: &'a csv::StringRecord, headers: &csv::StringRecord, name: &str) -> &'a str {
    headers
        .iter()
        .position(|h| h == name)
        .and_then(|idx| record.get(idx))
        .unwrap_or("")
}

/// Drop everything before the header line and detect the delimiter.
fn strip_preamble(content: &str) -> Result<(String, u8)> {
    let header_index = content
        .lines()
        .position(|line| line.contains("TckrSymb") && line.contains("SctyCtgyNm"))
        .ok_or_else(|| {
            ExtractionError::Mapping("B3 instruments CSV header not found in downloaded content".to_string())
        })?;

    let cleaned = content
        .lines()
        .skip(header_index)
        .collect::<Vec<_>>()
        .join("\n");

    let header = cleaned.lines().next().unwrap_or("");
    let delimiter = if header.matches(';').count() > header.matches(',').count() {
        b';'
    } else {
        b','
    };
    Ok((cleaned, delimiter))
}
