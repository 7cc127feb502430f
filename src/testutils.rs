//! Fixtures and a scriptable in-process aggregator for tests

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use std::{cell::RefCell, collections::HashMap, rc::Rc, sync::Mutex};

use crate::{
    aggregator::{
        Aggregator, AggregatorError, ExchangedToken, ItemInfo, LinkSettings, PlaidError,
        TransactionsPage, TransactionsSyncRequest,
    },
    domain::{
        AccessToken, Account, AccountId, Balances, Institution, InstitutionId, ItemId,
        LinkToken, LinkedItem, PublicToken, Transaction, TransactionId, UserId,
    },
    terminal::LineWriter,
};

pub fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

pub fn account(id: &str) -> Account {
    Account {
        account_id: AccountId::new(id),
        balances: Balances {
            available: Some(Decimal::new(10000, 2)),
            current: Some(Decimal::new(12000, 2)),
            iso_currency_code: Some("USD".to_string()),
            limit: None,
        },
        mask: Some("0000".to_string()),
        name: format!("Account {id}"),
        official_name: None,
        type_: "depository".to_string(),
        subtype: Some("checking".to_string()),
    }
}

pub fn transaction(id: &str, account_id: &str) -> Transaction {
    Transaction {
        transaction_id: TransactionId::new(id),
        account_id: AccountId::new(account_id),
        amount: Decimal::new(1250, 2),
        iso_currency_code: Some("USD".to_string()),
        date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        authorized_date: None,
        name: format!("Transaction {id}"),
        merchant_name: None,
        category: vec![],
        personal_finance_category: None,
        pending: false,
        payment_channel: "online".to_string(),
    }
}

/// `count` transactions with ids `{prefix}-0`, `{prefix}-1`, ...
pub fn transactions(prefix: &str, count: usize, account_id: &str) -> Vec<Transaction> {
    (0..count)
        .map(|i| transaction(&format!("{prefix}-{i}"), account_id))
        .collect()
}

pub fn linked_item(item_id: &str, institution_id: &str, access_token: &str) -> LinkedItem {
    LinkedItem {
        item_id: ItemId::new(item_id),
        access_token: AccessToken::new(access_token),
        institution_id: InstitutionId::new(institution_id),
        institution_name: format!("Bank {institution_id}"),
        date_connected: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    }
}

pub fn api_error(error_code: &str) -> AggregatorError {
    AggregatorError::Api(PlaidError::new("ITEM_ERROR", error_code, "scripted failure"))
}

/// One scripted page, returned when the request carries `expected_cursor`
#[derive(Clone)]
pub struct ScriptedPage {
    pub expected_cursor: Option<String>,
    pub added: Vec<Transaction>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl ScriptedPage {
    pub fn new(
        expected_cursor: Option<&str>,
        added: Vec<Transaction>,
        next_cursor: Option<&str>,
        has_more: bool,
    ) -> Self {
        Self {
            expected_cursor: expected_cursor.map(str::to_string),
            added,
            next_cursor: next_cursor.map(str::to_string),
            has_more,
        }
    }
}

#[derive(Clone, Default)]
struct ScriptedItem {
    item_id: Option<ItemId>,
    institution_id: Option<InstitutionId>,
    accounts: Vec<Account>,
    pages: Vec<ScriptedPage>,
    accounts_error: Option<String>,
    sync_error: Option<String>,
}

#[derive(Default)]
struct State {
    items: HashMap<String, ScriptedItem>,
    public_tokens: HashMap<String, String>,
    institutions: HashMap<InstitutionId, String>,
    link_token_error: Option<String>,
    fail_remove: bool,
    sync_calls: Vec<(String, TransactionsSyncRequest)>,
    removed_tokens: Vec<String>,
}

/// In-process aggregator whose responses are scripted per access token
#[derive(Default)]
pub struct FakeAggregator {
    state: Mutex<State>,
}

impl FakeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Item with a single page of transactions
    pub fn with_item(
        self,
        access_token: &str,
        accounts: Vec<Account>,
        transactions: Vec<Transaction>,
    ) -> Self {
        self.with_paged_item(
            access_token,
            accounts,
            vec![ScriptedPage::new(None, transactions, None, false)],
        )
    }

    pub fn with_paged_item(
        self,
        access_token: &str,
        accounts: Vec<Account>,
        pages: Vec<ScriptedPage>,
    ) -> Self {
        self.update_item(access_token, |item| {
            item.accounts = accounts;
            item.pages = pages;
        });
        self
    }

    /// Every call for this access token fails with the given aggregator error code
    pub fn with_failing_item(self, access_token: &str, error_code: &str) -> Self {
        self.update_item(access_token, |item| {
            item.accounts_error = Some(error_code.to_string());
            item.sync_error = Some(error_code.to_string());
        });
        self
    }

    pub fn with_failing_accounts(self, access_token: &str, error_code: &str) -> Self {
        self.update_item(access_token, |item| {
            item.accounts_error = Some(error_code.to_string());
        });
        self
    }

    /// `public_token` exchanges into `access_token` for an item at `institution`
    pub fn with_public_token(
        self,
        public_token: &str,
        access_token: &str,
        item_id: &str,
        institution_id: Option<&str>,
    ) -> Self {
        self.update_item(access_token, |item| {
            item.item_id = Some(ItemId::new(item_id));
            item.institution_id = institution_id.map(InstitutionId::new);
        });
        self.state
            .lock()
            .unwrap()
            .public_tokens
            .insert(public_token.to_string(), access_token.to_string());
        self
    }

    pub fn with_institution(self, institution_id: &str, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .institutions
            .insert(InstitutionId::new(institution_id), name.to_string());
        self
    }

    pub fn with_failing_link_token(self, error_code: &str) -> Self {
        self.state.lock().unwrap().link_token_error = Some(error_code.to_string());
        self
    }

    pub fn with_failing_remove(self) -> Self {
        self.state.lock().unwrap().fail_remove = true;
        self
    }

    /// All sync requests so far, with the access token they were made for
    pub fn sync_calls(&self) -> Vec<(String, TransactionsSyncRequest)> {
        self.state.lock().unwrap().sync_calls.clone()
    }

    pub fn sync_calls_for(&self, access_token: &str) -> Vec<TransactionsSyncRequest> {
        self.sync_calls()
            .into_iter()
            .filter(|(token, _)| token == access_token)
            .map(|(_, request)| request)
            .collect()
    }

    pub fn removed_tokens(&self) -> Vec<String> {
        self.state.lock().unwrap().removed_tokens.clone()
    }

    fn update_item(&self, access_token: &str, f: impl FnOnce(&mut ScriptedItem)) {
        let mut state = self.state.lock().unwrap();
        f(state.items.entry(access_token.to_string()).or_default());
    }

    fn item(&self, access_token: &AccessToken) -> Result<ScriptedItem, AggregatorError> {
        self.state
            .lock()
            .unwrap()
            .items
            .get(access_token.get())
            .cloned()
            .ok_or_else(|| api_error("INVALID_ACCESS_TOKEN"))
    }
}

#[async_trait]
impl Aggregator for FakeAggregator {
    async fn create_link_token(
        &self,
        user: &UserId,
        _settings: &LinkSettings,
    ) -> Result<LinkToken, AggregatorError> {
        if let Some(error_code) = &self.state.lock().unwrap().link_token_error {
            return Err(api_error(error_code));
        }
        Ok(LinkToken {
            link_token: format!("link-{user}"),
            expiration: Some(Utc.with_ymd_and_hms(2024, 3, 1, 16, 0, 0).unwrap()),
        })
    }

    async fn exchange_public_token(
        &self,
        public_token: &PublicToken,
    ) -> Result<ExchangedToken, AggregatorError> {
        let access_token = self
            .state
            .lock()
            .unwrap()
            .public_tokens
            .get(&public_token.0)
            .cloned()
            .ok_or_else(|| api_error("INVALID_PUBLIC_TOKEN"))?;
        let access_token = AccessToken::new(access_token);
        let item = self.item(&access_token)?;
        Ok(ExchangedToken {
            access_token,
            item_id: item.item_id.unwrap_or_else(|| ItemId::new("unknown")),
        })
    }

    async fn get_item(&self, access_token: &AccessToken) -> Result<ItemInfo, AggregatorError> {
        let item = self.item(access_token)?;
        Ok(ItemInfo {
            item_id: item.item_id.unwrap_or_else(|| ItemId::new("unknown")),
            institution_id: item.institution_id,
        })
    }

    async fn get_institution(
        &self,
        institution_id: &InstitutionId,
    ) -> Result<Institution, AggregatorError> {
        let name = self
            .state
            .lock()
            .unwrap()
            .institutions
            .get(institution_id)
            .cloned()
            .ok_or_else(|| api_error("INVALID_INSTITUTION"))?;
        Ok(Institution {
            institution_id: institution_id.clone(),
            name,
        })
    }

    async fn get_accounts(
        &self,
        access_token: &AccessToken,
    ) -> Result<Vec<Account>, AggregatorError> {
        let item = self.item(access_token)?;
        match item.accounts_error {
            Some(error_code) => Err(api_error(&error_code)),
            None => Ok(item.accounts),
        }
    }

    async fn sync_transactions(
        &self,
        access_token: &AccessToken,
        request: &TransactionsSyncRequest,
    ) -> Result<TransactionsPage, AggregatorError> {
        self.state
            .lock()
            .unwrap()
            .sync_calls
            .push((access_token.get().to_string(), request.clone()));
        let item = self.item(access_token)?;
        if let Some(error_code) = item.sync_error {
            return Err(api_error(&error_code));
        }
        let page = item
            .pages
            .into_iter()
            .find(|page| page.expected_cursor == request.cursor)
            .ok_or_else(|| AggregatorError::InvalidResponse("Unexpected cursor".to_string()))?;
        Ok(TransactionsPage {
            added: page.added,
            next_cursor: page.next_cursor,
            has_more: page.has_more,
        })
    }

    async fn remove_item(&self, access_token: &AccessToken) -> Result<(), AggregatorError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_remove {
            return Err(api_error("INTERNAL_SERVER_ERROR"));
        }
        state.removed_tokens.push(access_token.get().to_string());
        Ok(())
    }
}

/// Collects printed lines with styling stripped
#[derive(Clone, Default)]
pub struct RecordingLineWriter {
    lines: Rc<RefCell<Vec<String>>>,
}

impl RecordingLineWriter {
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }
}

impl LineWriter for RecordingLineWriter {
    fn write_line(&self, line: &str) {
        self.lines
            .borrow_mut()
            .push(console::strip_ansi_codes(line).into_owned());
    }
}
