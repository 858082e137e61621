//! # Sheet Reader
//!
//! Lists the tabs of a spreadsheet and loads the header and sample rows of
//! one tab.
//!
//! Only sheets following the naming convention (an optional name prefix) are
//! offered. When none do, [`SheetListing::NoValidSheets`] is returned; that
//! is an outcome, not an error.
//!
//! At most one listing is in flight. Starting a new one cancels the previous
//! request, which then resolves to [`ClientError::Cancelled`].

use crate::api::SyncApiClient;
use crate::error::{ClientError, Result};
use crate::slot::RequestSlot;
use core_async::sync::CancellationToken;
use core_async::task::with_cancellation;
use core_async::time::timeout;
use core_sync::api::{SheetColumnsData, SheetInfo};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Result of a successful listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetListing {
    Sheets(Vec<SheetInfo>),
    NoValidSheets,
}

impl SheetListing {
    pub fn sheets(&self) -> &[SheetInfo] {
        match self {
            SheetListing::Sheets(sheets) => sheets,
            SheetListing::NoValidSheets => &[],
        }
    }
}

pub struct SheetReader {
    api: Arc<SyncApiClient>,
    name_prefix: Option<String>,
    list_timeout: Duration,
    slot: RequestSlot,
}

impl SheetReader {
    pub fn new(
        api: Arc<SyncApiClient>,
        name_prefix: Option<String>,
        list_timeout: Duration,
        root: &CancellationToken,
    ) -> Self {
        Self {
            api,
            name_prefix,
            list_timeout,
            slot: RequestSlot::new(root),
        }
    }

    /// Whether `name` follows the sheet naming convention.
    pub fn is_valid_sheet_name(&self, name: &str) -> bool {
        match &self.name_prefix {
            Some(prefix) => name.starts_with(prefix.as_str()),
            None => !name.trim().is_empty(),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_sheets(&self, spreadsheet_id: &str) -> Result<SheetListing> {
        let token = self.slot.begin().await;
        let request = timeout(
            self.list_timeout,
            self.api.list_sheets(spreadsheet_id, self.list_timeout),
        );

        let outcome = with_cancellation(&token, request).await;
        self.slot.finish(&token).await;

        let data = match outcome {
            None => {
                debug!("Sheet listing superseded");
                return Err(ClientError::Cancelled);
            }
            Some(Err(_elapsed)) => return Err(ClientError::timeout("list sheets")),
            Some(Ok(result)) => result?,
        };

        let total = data.sheets.len();
        let sheets: Vec<SheetInfo> = data
            .sheets
            .into_iter()
            .filter(|sheet| self.is_valid_sheet_name(&sheet.name))
            .collect();

        info!(total, valid = sheets.len(), "Sheets listed");
        if sheets.is_empty() {
            Ok(SheetListing::NoValidSheets)
        } else {
            Ok(SheetListing::Sheets(sheets))
        }
    }

    pub async fn cancel(&self) {
        self.slot.cancel().await;
    }

    #[instrument(skip(self))]
    pub async fn load_columns(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
    ) -> Result<SheetColumnsData> {
        let data = self.api.sheet_columns(spreadsheet_id, sheet_name).await?;
        debug!(columns = data.columns.len(), "Sheet columns loaded");
        Ok(data)
    }
}
