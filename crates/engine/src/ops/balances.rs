use sea_orm::TransactionTrait;

use crate::{
    BalanceEntry, Caller, ResultEngine, SettlementSuggestion, compute_balances,
    optimize_settlements,
};

use super::{Engine, with_tx};

impl Engine {
    /// Net balance of every member, derived from expenses and settlements
    /// read in one transaction.
    pub async fn balances(&self, trip_id: &str, caller: &Caller) -> ResultEngine<Vec<BalanceEntry>> {
        with_tx!(self, |db_tx| {
            self.require_trip_read(&db_tx, trip_id, caller).await?;
            let members = self.trip_members(&db_tx, trip_id).await?;
            let expenses = self.trip_expenses(&db_tx, trip_id).await?;
            let settlements = self.trip_settlements(&db_tx, trip_id).await?;
            Ok(compute_balances(&expenses, &settlements, &members))
        })
    }

    /// Payments that would settle the trip.
    pub async fn suggested_settlements(
        &self,
        trip_id: &str,
        caller: &Caller,
    ) -> ResultEngine<Vec<SettlementSuggestion>> {
        let balances = self.balances(trip_id, caller).await?;
        Ok(optimize_settlements(&balances))
    }
}
