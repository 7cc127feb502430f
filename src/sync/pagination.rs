use crate::{
    aggregator::{Aggregator, AggregatorError, TransactionsSyncRequest},
    config::SyncConfig,
    domain::{AccessToken, Transaction},
};

#[derive(Debug, Clone, PartialEq)]
pub struct PagedTransactions {
    pub transactions: Vec<Transaction>,
    pub pages: usize,
    /// Pagination stopped at the cap, the aggregator has more transactions than returned here
    pub truncated: bool,
}

/// Page through the transaction sync of one item, starting from an empty cursor.
///
/// Stops once the aggregator reports no more pages or once more than
/// `max_transactions_per_item` transactions were collected. The page that crosses
/// the cap is kept. The number of pages is capped as well, so an aggregator that keeps
/// reporting more pages without adding transactions can't keep the loop going.
pub async fn fetch_all_transactions(
    aggregator: &dyn Aggregator,
    access_token: &AccessToken,
    config: &SyncConfig,
) -> Result<PagedTransactions, AggregatorError> {
    log::info!("Requesting transactions...");

    let mut transactions = Vec::new();
    let mut request = TransactionsSyncRequest {
        cursor: None,
        count: config.page_size,
        days_requested: config.days_requested,
    };
    let max_pages = config.max_transactions_per_item / config.page_size.max(1) + 1;
    let mut pages = 0;

    loop {
        pages += 1;
        log::info!("Requesting transactions...page {pages}...");
        let page = aggregator.sync_transactions(access_token, &request).await?;
        transactions.extend(page.added);

        if !page.has_more {
            break;
        }
        if transactions.len() > config.max_transactions_per_item || pages >= max_pages {
            log::warn!(
                "Stopping after {} transactions in {pages} pages, the item has more",
                transactions.len()
            );
            log::info!("Requesting transactions...truncated");
            return Ok(PagedTransactions {
                transactions,
                pages,
                truncated: true,
            });
        }
        let Some(next_cursor) = page.next_cursor else {
            return Err(AggregatorError::InvalidResponse(
                "Transaction sync reported more pages but no cursor".to_string(),
            ));
        };
        request = TransactionsSyncRequest {
            cursor: Some(next_cursor),
            count: config.page_size,
            days_requested: None,
        };
    }

    log::info!("Requesting transactions...done");
    Ok(PagedTransactions {
        transactions,
        pages,
        truncated: false,
    })
}
