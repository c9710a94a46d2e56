use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context as _;
use regex::Regex;
use reqwest::header::{ACCEPT, USER_AGENT};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::cli::ExtractArgs;
use crate::config::Settings;
use crate::formats::{MISSING_RATING_LABEL, RawBookRecord};

const USER_AGENT_VALUE: &str = concat!("books-etl/", env!("CARGO_PKG_VERSION"));

/// Paginated catalogue: page `n` lives at `<base_url>page-<n>.html` and
/// detail links on every page are relative to `base_url`.
#[derive(Debug, Clone)]
pub struct CatalogueSource {
    base_url: Url,
}

impl CatalogueSource {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let mut base_url =
            Url::parse(base_url).with_context(|| format!("parse catalogue base url: {base_url}"))?;
        if base_url.scheme() != "http" && base_url.scheme() != "https" {
            anyhow::bail!("catalogue base url must be http/https: {base_url}");
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn page_url(&self, page: u32) -> anyhow::Result<Url> {
        self.base_url
            .join(&format!("page-{page}.html"))
            .with_context(|| format!("build url for catalogue page {page}"))
    }
}

pub fn run(args: ExtractArgs, settings: &Settings) -> anyhow::Result<PathBuf> {
    let out_path = match args.out {
        Some(out) => PathBuf::from(out),
        None => settings.artifacts.raw_path()?.to_path_buf(),
    };
    let base_url = args
        .base_url
        .unwrap_or_else(|| settings.catalogue.base_url.clone());
    let page_count = args.pages.unwrap_or(settings.catalogue.page_count);

    let source = CatalogueSource::new(&base_url)?;
    extract_to(&out_path, &source, page_count)
}

/// Scrapes the catalogue and writes the raw table to `out_path`, returning the location.
pub fn extract_to(
    out_path: &Path,
    source: &CatalogueSource,
    page_count: u32,
) -> anyhow::Result<PathBuf> {
    let client = reqwest::blocking::Client::builder()
        .build()
        .context("build catalogue http client")?;

    let records = fetch_catalogue(&client, source, page_count)?;
    crate::raw_store::write_raw_table(out_path, &records)?;

    tracing::info!(
        records = records.len(),
        out = %out_path.display(),
        "extract: raw table written"
    );
    Ok(out_path.to_path_buf())
}

/// Fetches pages `1..=page_count` in order.
///
/// A page answering with a non-success status, or whose markup has no usable
/// product entries, is logged and skipped; the records of every other page
/// are still returned. Transport failures abort the fetch.
pub fn fetch_catalogue(
    client: &reqwest::blocking::Client,
    source: &CatalogueSource,
    page_count: u32,
) -> anyhow::Result<Vec<RawBookRecord>> {
    let mut records = Vec::new();

    for page in 1..=page_count {
        let url = source.page_url(page)?;
        tracing::info!(page, %url, "extract: fetch catalogue page");

        let response = client
            .get(url.clone())
            .header(USER_AGENT, USER_AGENT_VALUE)
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .with_context(|| format!("GET {url}"))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                page,
                %url,
                status = status.as_u16(),
                "extract: catalogue page request failed; skipping page"
            );
            continue;
        }

        let html = response
            .text()
            .with_context(|| format!("read body: {url}"))?;
        match parse_catalogue_page(&html, source.base_url()) {
            Ok(page_records) => {
                tracing::debug!(page, records = page_records.len(), "extract: page parsed");
                records.extend(page_records);
            }
            Err(err) => {
                tracing::warn!(page, %url, ?err, "extract: malformed catalogue page; skipping page");
            }
        }
    }

    Ok(records)
}

/// Parses every `article.product_pod` on a catalogue page, in document order.
pub fn parse_catalogue_page(html: &str, base_url: &Url) -> anyhow::Result<Vec<RawBookRecord>> {
    let document = Html::parse_document(html);

    let mut records = Vec::new();
    for (idx, product) in document.select(product_selector()).enumerate() {
        let record = parse_product(product, base_url)
            .with_context(|| format!("parse product entry {}", idx + 1))?;
        records.push(record);
    }

    if records.is_empty() {
        anyhow::bail!("no product entries found");
    }
    Ok(records)
}

fn parse_product(product: ElementRef<'_>, base_url: &Url) -> anyhow::Result<RawBookRecord> {
    let anchor = product
        .select(title_anchor_selector())
        .next()
        .ok_or_else(|| anyhow::anyhow!("missing title anchor"))?;
    let title = anchor
        .value()
        .attr("title")
        .ok_or_else(|| anyhow::anyhow!("title anchor has no title attribute"))?
        .to_owned();
    let href = anchor
        .value()
        .attr("href")
        .ok_or_else(|| anyhow::anyhow!("title anchor has no href attribute"))?;
    let detail_link = base_url
        .join(href.trim())
        .with_context(|| format!("resolve detail link: {href}"))?;

    // An unparsable price is kept verbatim and rejected per row by the transformer.
    let price_text = match product.select(price_selector()).next() {
        Some(price) => {
            let text = element_text(price);
            currency_amount(&text).unwrap_or(text)
        }
        None => currency_amount(&element_text(product))
            .ok_or_else(|| anyhow::anyhow!("missing price"))?,
    };

    let availability_text = product
        .select(availability_selector())
        .next()
        .map(element_text)
        .ok_or_else(|| anyhow::anyhow!("missing availability"))?;

    let rating_label = product
        .select(rating_selector())
        .next()
        .and_then(|rating| rating.value().attr("class"))
        .and_then(|classes| classes.split_whitespace().nth(1))
        .unwrap_or(MISSING_RATING_LABEL)
        .to_owned();

    Ok(RawBookRecord {
        title,
        price_text,
        availability_text,
        rating_label,
        detail_link: detail_link.to_string(),
    })
}

/// First currency-prefixed amount in `text`, without the currency symbol.
pub fn currency_amount(text: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"[£$€]\s*([0-9][0-9,]*(?:\.[0-9]+)?)").expect("valid currency pattern")
    });
    pattern
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|amount| amount.as_str().to_owned())
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_owned()
}

fn product_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("article.product_pod").expect("valid selector"))
}

fn title_anchor_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("h3 a").expect("valid selector"))
}

fn price_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("p.price_color").expect("valid selector"))
}

fn availability_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("p.instock.availability").expect("valid selector"))
}

fn rating_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("p.star-rating").expect("valid selector"))
}
