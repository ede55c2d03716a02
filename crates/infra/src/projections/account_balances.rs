use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use ledgerly_accounting::{AccountNumber, JournalEntryEvent, JournalEntryPosted, Side};
use ledgerly_core::{Money, TenantId};
use ledgerly_events::EventEnvelope;

use super::cursor_store::{InMemoryCursorStore, ProjectionCursorStore, StreamCursors};
use super::{ProjectionError, decode_journal_event, replay_order};
use crate::read_model::TenantStore;

/// Running balance of one account across every posted entry.
///
/// `balance` is debit-positive and excludes the chart opening balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: AccountNumber,
    pub debit_total: Money,
    pub credit_total: Money,
    pub balance: Money,
    pub posted_lines: u64,
    pub last_entry_date: Option<NaiveDate>,
}

impl AccountBalance {
    fn empty(account: AccountNumber) -> Self {
        Self {
            account,
            debit_total: Money::ZERO,
            credit_total: Money::ZERO,
            balance: Money::ZERO,
            posted_lines: 0,
            last_entry_date: None,
        }
    }
}

/// Projection: posted journal entries → per-account balances.
#[derive(Debug)]
pub struct AccountBalancesProjection<S, C = InMemoryCursorStore> {
    store: S,
    cursors: StreamCursors<C>,
}

impl<S> AccountBalancesProjection<S>
where
    S: TenantStore<AccountNumber, AccountBalance>,
{
    pub fn new(store: S) -> Self {
        Self::with_cursor_store(store, Arc::new(InMemoryCursorStore::new()))
    }
}

impl<S, C> AccountBalancesProjection<S, C>
where
    S: TenantStore<AccountNumber, AccountBalance>,
    C: ProjectionCursorStore,
{
    pub const NAME: &'static str = "accounting.account_balances";

    pub fn with_cursor_store(store: S, cursor_store: Arc<C>) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(cursor_store, Self::NAME),
        }
    }

    pub fn get(&self, tenant_id: TenantId, account: &AccountNumber) -> Option<AccountBalance> {
        self.store.get(tenant_id, account)
    }

    /// Balances of a tenant in account number order.
    pub fn list(&self, tenant_id: TenantId) -> Vec<AccountBalance> {
        self.store.list(tenant_id)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let Some(event) = decode_journal_event(envelope)? else {
            return Ok(());
        };
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        if let JournalEntryEvent::JournalEntryPosted(posted) = event {
            self.apply_posted(&posted);
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn apply_posted(&self, posted: &JournalEntryPosted) {
        for line in &posted.lines {
            self.store.update(posted.tenant_id, line.account.clone(), &mut |current: Option<AccountBalance>| {
                let mut rm = current.unwrap_or_else(|| AccountBalance::empty(line.account.clone()));

                match line.side {
                    Side::Debit => rm.debit_total += line.amount,
                    Side::Credit => rm.credit_total += line.amount,
                }
                rm.balance += line.side.signed(line.amount);
                rm.posted_lines += 1;
                rm.last_entry_date = rm.last_entry_date.max(Some(posted.entry_date));
                rm
            });
        }
    }

    /// Clear every tenant present in `envelopes` and replay them in stream
    /// order.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        let tenants: BTreeSet<TenantId> = envs.iter().map(|e| e.tenant_id()).collect();
        for t in tenants {
            self.store.clear_tenant(t);
            self.cursors.clear(t);
        }

        replay_order(&mut envs);
        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
