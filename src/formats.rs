use serde::{Deserialize, Serialize};

/// Rating label written when a product carries no star-rating marker.
pub const MISSING_RATING_LABEL: &str = "None";

/// One scraped catalogue entry, kept as text exactly as it appeared on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBookRecord {
    pub title: String,
    #[serde(rename = "price")]
    pub price_text: String,
    #[serde(rename = "availability")]
    pub availability_text: String,
    #[serde(rename = "rating")]
    pub rating_label: String,
    #[serde(rename = "link")]
    pub detail_link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedBookRecord {
    pub title: String,
    pub price: f64,
    pub in_stock: bool,
    pub rating_number: u8,
    #[serde(rename = "link")]
    pub detail_link: String,
}

/// Destination row of the `BOOK_FINAL` warehouse table.
#[derive(Debug, Clone, PartialEq)]
pub struct WarehouseRow<'a> {
    pub title: &'a str,
    pub price: f64,
    pub link: &'a str,
    pub in_stock: bool,
    pub rating_number: u8,
}

impl<'a> From<&'a CleanedBookRecord> for WarehouseRow<'a> {
    fn from(record: &'a CleanedBookRecord) -> Self {
        Self {
            title: &record.title,
            price: record.price,
            link: &record.detail_link,
            in_stock: record.in_stock,
            rating_number: record.rating_number,
        }
    }
}
