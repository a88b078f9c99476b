//! Google Sheets v4 adapter.
//!
//! Each collection lives in its own tab. Tabs are found by title, ignoring
//! case and whitespace, so `Words` and ` words ` both work. Every write
//! uses `valueInputOption=RAW` so the sheet stores exactly the text the
//! engine renders. Reads ask for unformatted values so numbers and
//! checkboxes arrive as JSON numbers and booleans whatever the sheet's
//! locale or number format.

mod a1;

use crate::sync::{SheetStore, SyncError};
use a1::{cell_range, column_letter, quote_title};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sheetsync_engine::{EntityKind, RawTable};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<Tab>,
}

#[derive(Debug, Deserialize)]
struct Tab {
    properties: TabProperties,
}

#[derive(Debug, Deserialize)]
struct TabProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueWrite<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: Vec<Vec<String>>,
}

/// Client for one spreadsheet.
pub struct SheetsClient {
    http: Client,
    base: Url,
    spreadsheet_id: String,
    access_token: String,
    /// Tab titles as found on the last metadata read
    titles: Mutex<HashMap<EntityKind, String>>,
}

impl SheetsClient {
    pub fn new(
        api_base: &str,
        spreadsheet_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, SyncError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base = Url::parse(api_base).map_err(SyncError::sheet)?;
        Ok(Self {
            http,
            base,
            spreadsheet_id: spreadsheet_id.into(),
            access_token: access_token.into(),
            titles: Mutex::new(HashMap::new()),
        })
    }

    /// `{base}/v4/spreadsheets/{id}/{tail...}`
    fn url(&self, tail: &[&str]) -> Result<Url, SyncError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::sheet("Sheets API base URL cannot hold a path"))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str()])
            .extend(tail);
        Ok(url)
    }

    fn cached_title(&self, kind: EntityKind) -> Option<String> {
        self.titles.lock().ok()?.get(&kind).cloned()
    }

    /// Re-read tab titles from the spreadsheet metadata.
    async fn refresh_title(&self, kind: EntityKind) -> Result<String, SyncError> {
        let mut url = self.url(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties.title");

        let spreadsheet: Spreadsheet = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let title = spreadsheet
            .sheets
            .into_iter()
            .map(|tab| tab.properties.title)
            .find(|title| kind.matches_tab(title))
            .ok_or(SyncError::TabNotFound(kind))?;

        tracing::debug!(kind = %kind, title = %title, "Found sheet tab");
        if let Ok(mut titles) = self.titles.lock() {
            titles.insert(kind, title.clone());
        }
        Ok(title)
    }

    async fn title(&self, kind: EntityKind) -> Result<String, SyncError> {
        match self.cached_title(kind) {
            Some(title) => Ok(title),
            None => self.refresh_title(kind).await,
        }
    }

    /// `values.get` for a whole tab.
    fn read_url(&self, title: &str) -> Result<Url, SyncError> {
        let mut url = self.url(&["values", &quote_title(title)])?;
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE")
            .append_pair("dateTimeRenderOption", "FORMATTED_STRING");
        Ok(url)
    }

    async fn put_values(&self, range: &str, values: Vec<Vec<String>>) -> Result<(), SyncError> {
        let mut url = self.url(&["values", range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        self.http
            .put(url)
            .bearer_auth(&self.access_token)
            .json(&ValueWrite {
                range,
                major_dimension: "ROWS",
                values,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

impl SheetStore for SheetsClient {
    async fn fetch_table(&self, kind: EntityKind) -> Result<RawTable, SyncError> {
        // Tabs may be renamed between runs.
        let title = self.refresh_title(kind).await?;
        let url = self.read_url(&title)?;

        let range: ValueRange = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::debug!(kind = %kind, rows = range.values.len(), "Read sheet tab");
        Ok(RawTable::from_values(range.values))
    }

    async fn write_cell(
        &self,
        kind: EntityKind,
        row_number: usize,
        column: usize,
        value: &str,
    ) -> Result<(), SyncError> {
        let title = self.title(kind).await?;
        let range = cell_range(&title, column, row_number);
        self.put_values(&range, vec![vec![value.to_string()]]).await
    }

    async fn write_row(
        &self,
        kind: EntityKind,
        row_number: usize,
        cells: Vec<String>,
    ) -> Result<(), SyncError> {
        let title = self.title(kind).await?;
        let range = format!(
            "{}!A{row}:{}{row}",
            quote_title(&title),
            column_letter(cells.len().max(1)),
            row = row_number
        );
        self.put_values(&range, vec![cells]).await
    }

    async fn append_rows(&self, kind: EntityKind, rows: Vec<Vec<String>>) -> Result<(), SyncError> {
        let title = self.title(kind).await?;
        let range = quote_title(&title);
        let mut url = self.url(&["values", &format!("{}:append", range)])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        self.http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&ValueWrite {
                range: &range,
                major_dimension: "ROWS",
                values: rows,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
