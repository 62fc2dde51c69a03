//! Balance ledger and debt settlement.
//!
//! Balances are derived on every read from the trip's expenses and
//! settlements and are never stored, so they cannot drift from their source
//! records.
//!
//! Amounts are `f64`. Equal splits may produce fractional cents which are
//! kept as-is; the sum of all balances is zero within
//! [`BALANCE_TOLERANCE`].

use std::{cmp::Ordering, collections::HashMap};

use serde::{Deserialize, Serialize};

use crate::{expenses::Expense, members::Member, settlements::Settlement};

/// Tolerance for `sum(balances) == 0`.
pub const BALANCE_TOLERANCE: f64 = 1e-6;

/// Remaining magnitude below which a debtor or creditor counts as settled.
pub const SETTLEMENT_EPSILON: f64 = 0.01;

/// Net position of a member. Positive is owed money, negative owes money.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub member_id: String,
    pub display_name: String,
    pub balance: f64,
}

/// A suggested payment from a debtor to a creditor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SettlementSuggestion {
    /// Member who owes and pays.
    pub from: String,
    /// Member who is owed and receives.
    pub to: String,
    pub amount: f64,
}

/// Computes one entry per member, in member order, zero balances included.
pub fn compute_balances(
    expenses: &[Expense],
    settlements: &[Settlement],
    members: &[Member],
) -> Vec<BalanceEntry> {
    let mut net: HashMap<&str, f64> = HashMap::new();

    for expense in expenses {
        if expense.split_with_member_ids.is_empty() {
            continue;
        }
        *net.entry(expense.paid_by_member_id.as_str()).or_default() += expense.amount;
        let share = expense.share();
        for member_id in &expense.split_with_member_ids {
            *net.entry(member_id.as_str()).or_default() -= share;
        }
    }

    for settlement in settlements {
        *net.entry(settlement.payer_member_id.as_str()).or_default() += settlement.amount;
        *net.entry(settlement.payee_member_id.as_str()).or_default() -= settlement.amount;
    }

    members
        .iter()
        .map(|member| BalanceEntry {
            member_id: member.member_id.clone(),
            display_name: member.display_name.clone(),
            balance: net.get(member.member_id.as_str()).copied().unwrap_or(0.0),
        })
        .collect()
}

/// Greedy reduction of balances to a short list of payments.
///
/// Members within [`SETTLEMENT_EPSILON`] of zero are already settled.
/// Debtors are visited most negative first and creditors most positive first;
/// equal magnitudes are ordered by `member_id`. Each step pays
/// `min(|debt|, credit)` from the current debtor to the current creditor.
/// The result is not guaranteed to be globally minimal when several members
/// tie, but it is deterministic.
pub fn optimize_settlements(balances: &[BalanceEntry]) -> Vec<SettlementSuggestion> {
    let mut debtors: Vec<(String, f64)> = balances
        .iter()
        .filter(|b| b.balance <= -SETTLEMENT_EPSILON)
        .map(|b| (b.member_id.clone(), b.balance))
        .collect();
    debtors.sort_by(|a, b| by_amount_then_id(a.1, b.1, &a.0, &b.0));

    let mut creditors: Vec<(String, f64)> = balances
        .iter()
        .filter(|b| b.balance >= SETTLEMENT_EPSILON)
        .map(|b| (b.member_id.clone(), b.balance))
        .collect();
    creditors.sort_by(|a, b| by_amount_then_id(b.1, a.1, &a.0, &b.0));

    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < debtors.len() && j < creditors.len() {
        let debt = debtors[i].1.abs();
        let credit = creditors[j].1;
        let amount = debt.min(credit);

        out.push(SettlementSuggestion {
            from: debtors[i].0.clone(),
            to: creditors[j].0.clone(),
            amount: round_cents(amount),
        });

        debtors[i].1 += amount;
        creditors[j].1 -= amount;

        if debtors[i].1.abs() < SETTLEMENT_EPSILON {
            i += 1;
        }
        if creditors[j].1.abs() < SETTLEMENT_EPSILON {
            j += 1;
        }
    }
    out
}

fn by_amount_then_id(a: f64, b: f64, id_a: &str, id_b: &str) -> Ordering {
    a.partial_cmp(&b)
        .unwrap_or(Ordering::Equal)
        .then_with(|| id_a.cmp(id_b))
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::settlements::SettlementMode;

    fn member(id: &str) -> Member {
        Member {
            member_id: id.to_string(),
            display_name: id.to_uppercase(),
            user_id: None,
        }
    }

    fn expense(amount: f64, paid_by: &str, split: &[&str]) -> Expense {
        Expense {
            id: format!("e-{paid_by}-{amount}"),
            trip_id: "t".to_string(),
            description: "x".to_string(),
            amount,
            paid_by_member_id: paid_by.to_string(),
            split_with_member_ids: split.iter().map(|s| s.to_string()).collect(),
            category: None,
            created_at: Utc::now(),
        }
    }

    fn settlement(payer: &str, payee: &str, amount: f64) -> Settlement {
        Settlement {
            id: format!("s-{payer}-{payee}"),
            trip_id: "t".to_string(),
            payer_member_id: payer.to_string(),
            payee_member_id: payee.to_string(),
            amount,
            mode: SettlementMode::Cash,
            note: None,
            created_at: Utc::now(),
        }
    }

    fn balance_of(entries: &[BalanceEntry], id: &str) -> f64 {
        entries
            .iter()
            .find(|e| e.member_id == id)
            .map(|e| e.balance)
            .unwrap()
    }

    fn total(entries: &[BalanceEntry]) -> f64 {
        entries.iter().map(|e| e.balance).sum()
    }

    /// Applies the suggestions as settlements on top of `entries`.
    fn settle(entries: &[BalanceEntry], suggestions: &[SettlementSuggestion]) -> Vec<f64> {
        entries
            .iter()
            .map(|e| {
                let paid: f64 = suggestions
                    .iter()
                    .filter(|s| s.from == e.member_id)
                    .map(|s| s.amount)
                    .sum();
                let received: f64 = suggestions
                    .iter()
                    .filter(|s| s.to == e.member_id)
                    .map(|s| s.amount)
                    .sum();
                e.balance + paid - received
            })
            .collect()
    }

    #[test]
    fn three_way_dinner() {
        let members = vec![member("a"), member("b"), member("c")];
        let balances = compute_balances(&[expense(90.0, "a", &["a", "b", "c"])], &[], &members);

        assert_eq!(balance_of(&balances, "a"), 60.0);
        assert_eq!(balance_of(&balances, "b"), -30.0);
        assert_eq!(balance_of(&balances, "c"), -30.0);

        let plan = optimize_settlements(&balances);
        assert_eq!(
            plan,
            vec![
                SettlementSuggestion {
                    from: "b".to_string(),
                    to: "a".to_string(),
                    amount: 30.0
                },
                SettlementSuggestion {
                    from: "c".to_string(),
                    to: "a".to_string(),
                    amount: 30.0
                },
            ]
        );
    }

    #[test]
    fn every_member_is_listed() {
        let members = vec![member("a"), member("b"), member("idle")];
        let balances = compute_balances(&[expense(10.0, "a", &["a", "b"])], &[], &members);
        assert_eq!(balances.len(), 3);
        assert_eq!(balance_of(&balances, "idle"), 0.0);
        assert_eq!(balances[2].display_name, "IDLE");
    }

    #[test]
    fn settlements_reduce_debt() {
        let members = vec![member("a"), member("b")];
        let balances = compute_balances(
            &[expense(50.0, "a", &["a", "b"])],
            &[settlement("b", "a", 20.0)],
            &members,
        );
        assert_eq!(balance_of(&balances, "a"), 5.0);
        assert_eq!(balance_of(&balances, "b"), -5.0);
    }

    #[test]
    fn fractional_shares_still_sum_to_zero() {
        let members: Vec<Member> = ["a", "b", "c", "d", "e", "f", "g"]
            .into_iter()
            .map(member)
            .collect();
        let expenses = vec![
            expense(100.0, "a", &["a", "b", "c"]),
            expense(33.33, "b", &["a", "b", "c", "d", "e", "f", "g"]),
            expense(0.01, "c", &["d", "e", "f"]),
            expense(77.77, "g", &["a", "g"]),
            expense(12.5, "d", &["b", "c", "d", "e", "f", "g"]),
        ];
        let settlements = vec![settlement("b", "a", 10.0), settlement("e", "g", 3.21)];
        let balances = compute_balances(&expenses, &settlements, &members);
        assert!(total(&balances).abs() < BALANCE_TOLERANCE);

        let plan = optimize_settlements(&balances);
        for remaining in settle(&balances, &plan) {
            assert!(remaining.abs() < SETTLEMENT_EPSILON, "left {remaining}");
        }
    }

    #[test]
    fn optimized_plan_zeroes_balances() {
        let members: Vec<Member> = ["a", "b", "c", "d"].into_iter().map(member).collect();
        let balances = compute_balances(
            &[
                expense(120.0, "a", &["a", "b", "c", "d"]),
                expense(40.0, "b", &["c", "d"]),
                expense(15.0, "c", &["a"]),
            ],
            &[],
            &members,
        );
        let plan = optimize_settlements(&balances);
        assert!(plan.len() < members.len());
        for remaining in settle(&balances, &plan) {
            assert!(remaining.abs() < SETTLEMENT_EPSILON);
        }
    }

    #[test]
    fn ties_break_by_member_id() {
        let entries = vec![
            BalanceEntry {
                member_id: "z".to_string(),
                display_name: "Z".to_string(),
                balance: -10.0,
            },
            BalanceEntry {
                member_id: "m".to_string(),
                display_name: "M".to_string(),
                balance: -10.0,
            },
            BalanceEntry {
                member_id: "q".to_string(),
                display_name: "Q".to_string(),
                balance: 10.0,
            },
            BalanceEntry {
                member_id: "b".to_string(),
                display_name: "B".to_string(),
                balance: 10.0,
            },
        ];
        let plan = optimize_settlements(&entries);
        let pairs: Vec<(&str, &str)> = plan
            .iter()
            .map(|s| (s.from.as_str(), s.to.as_str()))
            .collect();
        assert_eq!(pairs, vec![("m", "b"), ("z", "q")]);
    }

    #[test]
    fn dust_is_not_worth_a_payment() {
        let entries = vec![
            BalanceEntry {
                member_id: "a".to_string(),
                display_name: "A".to_string(),
                balance: 0.006,
            },
            BalanceEntry {
                member_id: "b".to_string(),
                display_name: "B".to_string(),
                balance: -0.006,
            },
        ];
        assert!(optimize_settlements(&entries).is_empty());
    }

    #[test]
    fn settled_group_needs_no_payments() {
        let members = vec![member("a"), member("b")];
        let balances = compute_balances(&[], &[], &members);
        assert!(optimize_settlements(&balances).is_empty());
    }
}
