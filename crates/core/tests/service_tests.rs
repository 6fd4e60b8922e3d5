// ═══════════════════════════════════════════════════════════════════
// Service Tests — CostBasisEngine, PositionLedger, TransactionLog,
// CurrencyService, GrowthCalculator
// ═══════════════════════════════════════════════════════════════════

use chrono::NaiveDate;
use proptest::prelude::*;
use std::collections::BTreeSet;

use stock_ledger_core::errors::CoreError;
use stock_ledger_core::models::position::Position;
use stock_ledger_core::models::quote::{PriceQuotes, Quote};
use stock_ledger_core::models::rates::ExchangeRates;
use stock_ledger_core::models::transaction::{
    CashConfirmation, CashTransaction, CashTransactionKind, PositionEdit, TradeRequest, TradeSide,
};
use stock_ledger_core::models::year_data::{YearData, YearMap};
use stock_ledger_core::services::cost_basis::CostBasisEngine;
use stock_ledger_core::services::currency_service::CurrencyService;
use stock_ledger_core::services::growth_service::GrowthCalculator;
use stock_ledger_core::services::ledger_service::PositionLedger;
use stock_ledger_core::services::transaction_log::TransactionLog;

// ═══════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn no_hidden() -> BTreeSet<String> {
    BTreeSet::new()
}

/// Ledger with one year holding `cash` and `Apple` at 100 shares @ 45.
fn ledger_with_apple(cash: f64) -> PositionLedger {
    let mut ledger = PositionLedger::new();
    ledger.add_year("2024", false, d(2024, 1, 1)).unwrap();
    if cash > 0.0 {
        ledger
            .record_cash_transaction("2024", CashTransactionKind::Deposit, cash, d(2024, 1, 2))
            .unwrap();
    }
    ledger
        .edit_position(
            "2024",
            "Apple",
            PositionEdit {
                shares: 100.0,
                price: 45.0,
                cost_price: 45.0,
                symbol: Some("AAPL".into()),
            },
        )
        .unwrap();
    ledger
}

// ═══════════════════════════════════════════════════════════════════
// CostBasisEngine
// ═══════════════════════════════════════════════════════════════════

mod cost_basis {
    use super::*;

    #[test]
    fn buy_averages_cost() {
        let r = CostBasisEngine::new()
            .apply_trade(100.0, 45.0, TradeSide::Buy, 50.0, 50.0)
            .unwrap();
        assert_eq!(r.new_shares, 150.0);
        assert!(approx(r.new_cost_price, 7000.0 / 150.0));
        assert_eq!(r.cash_delta, -2500.0);
    }

    #[test]
    fn first_buy_takes_trade_price_exactly() {
        let r = CostBasisEngine::new()
            .apply_trade(0.0, 0.0, TradeSide::Buy, 3.0, 0.1)
            .unwrap();
        assert_eq!(r.new_cost_price, 0.1);
    }

    #[test]
    fn sell_subtracts_proceeds_from_pool() {
        let r = CostBasisEngine::new()
            .apply_trade(150.0, 46.67, TradeSide::Sell, 50.0, 55.0)
            .unwrap();
        assert_eq!(r.new_shares, 100.0);
        assert!(approx(r.new_cost_price, (150.0 * 46.67 - 2750.0) / 100.0));
        assert_eq!(r.cash_delta, 2750.0);
    }

    #[test]
    fn sell_everything_zeroes_cost() {
        let r = CostBasisEngine::new()
            .apply_trade(10.0, 20.0, TradeSide::Sell, 10.0, 25.0)
            .unwrap();
        assert_eq!(r.new_shares, 0.0);
        assert_eq!(r.new_cost_price, 0.0);
    }

    #[test]
    fn oversell_is_rejected() {
        let err = CostBasisEngine::new()
            .apply_trade(10.0, 20.0, TradeSide::Sell, 11.0, 25.0)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientShares { requested, held, .. } if requested == 11.0 && held == 10.0
        ));
    }

    #[test]
    fn fractional_full_sell_closes_position() {
        let engine = CostBasisEngine::new();
        let first = engine.apply_trade(0.0, 0.0, TradeSide::Buy, 0.1, 10.0).unwrap();
        let second = engine
            .apply_trade(first.new_shares, first.new_cost_price, TradeSide::Buy, 0.2, 10.0)
            .unwrap();
        assert_ne!(second.new_shares, 0.3);

        let sold = engine
            .apply_trade(second.new_shares, second.new_cost_price, TradeSide::Sell, 0.3, 12.0)
            .unwrap();
        assert_eq!(sold.new_shares, 0.0);
        assert_eq!(sold.new_cost_price, 0.0);
        assert!(approx(sold.cash_delta, 3.6));
    }

    #[test]
    fn sell_slightly_above_float_holding_is_allowed() {
        let held = 0.1 + 0.2 - 1e-16;
        let r = CostBasisEngine::new()
            .apply_trade(held, 10.0, TradeSide::Sell, 0.3, 10.0)
            .unwrap();
        assert_eq!(r.new_shares, 0.0);
    }

    #[test]
    fn sell_without_holding_is_rejected() {
        assert!(matches!(
            CostBasisEngine::new().apply_trade(0.0, 0.0, TradeSide::Sell, 1e-12, 10.0),
            Err(CoreError::InsufficientShares { .. })
        ));
    }

    #[test]
    fn rejects_non_positive_or_non_finite_input() {
        let engine = CostBasisEngine::new();
        for (shares, price) in [(0.0, 1.0), (-1.0, 1.0), (1.0, 0.0), (f64::NAN, 1.0), (1.0, f64::INFINITY)] {
            assert!(matches!(
                engine.apply_trade(10.0, 1.0, TradeSide::Buy, shares, price),
                Err(CoreError::Validation(_))
            ));
        }
    }

    #[test]
    fn profit_helpers() {
        let engine = CostBasisEngine::new();
        assert_eq!(engine.realized_profit(40.0, 10.0, 50.0), 100.0);
        assert!(approx(engine.profit_pct(40.0, 50.0).unwrap(), 25.0));
        assert_eq!(engine.profit_pct(0.0, 50.0), None);
    }

    proptest! {
        #[test]
        fn buys_yield_share_weighted_average(
            trades in prop::collection::vec((1u32..1_000, 1u32..100_000), 1..20)
        ) {
            let engine = CostBasisEngine::new();
            let (mut shares, mut cost) = (0.0, 0.0);
            let (mut total_shares, mut total_paid) = (0.0, 0.0);
            for (s, cents) in trades {
                let (s, p) = (f64::from(s), f64::from(cents) / 100.0);
                let r = engine.apply_trade(shares, cost, TradeSide::Buy, s, p).unwrap();
                shares = r.new_shares;
                cost = r.new_cost_price;
                total_shares += s;
                total_paid += s * p;
            }
            let expected = total_paid / total_shares;
            prop_assert!((cost - expected).abs() <= 1e-9 * expected.max(1.0));
            prop_assert_eq!(shares, total_shares);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// PositionLedger — years
// ═══════════════════════════════════════════════════════════════════

mod ledger_years {
    use super::*;

    #[test]
    fn add_year_rejects_duplicates_and_bad_keys() {
        let mut ledger = PositionLedger::new();
        ledger.add_year("2024", false, d(2024, 1, 1)).unwrap();
        assert!(matches!(
            ledger.add_year("2024", true, d(2024, 1, 1)),
            Err(CoreError::DuplicateYear(y)) if y == "2024"
        ));
        assert!(matches!(
            ledger.add_year("24", false, d(2024, 1, 1)),
            Err(CoreError::Validation(_))
        ));
        assert_eq!(ledger.years().len(), 1);
    }

    #[test]
    fn carry_forward_clones_positions_and_cash() {
        let mut ledger = ledger_with_apple(1000.0);
        let apple_id = ledger.year("2024").unwrap().position("Apple").unwrap().id;

        let change = ledger.add_year("2025", true, d(2025, 1, 1)).unwrap();

        let y = ledger.year("2025").unwrap();
        assert_eq!(y.position("Apple").unwrap().id, apple_id);
        assert_eq!(y.position("Apple").unwrap().shares, 100.0);
        assert_eq!(y.cash_balance, 1000.0);
        assert_eq!(y.cash_transactions.len(), 1);
        assert!(y.cash_transactions[0].is_carryover());
        assert!(y.stock_transactions.is_empty());

        assert_eq!(change.positions.len(), 1);
        assert_eq!(change.cash_transactions.len(), 1);
        assert_eq!(change.cash_balance, Some(1000.0));
    }

    #[test]
    fn carry_forward_uses_most_recent_earlier_year() {
        let mut ledger = PositionLedger::new();
        ledger.add_year("2020", false, d(2020, 1, 1)).unwrap();
        ledger
            .record_cash_transaction("2020", CashTransactionKind::Deposit, 10.0, d(2020, 1, 1))
            .unwrap();
        ledger.add_year("2022", false, d(2022, 1, 1)).unwrap();
        ledger
            .record_cash_transaction("2022", CashTransactionKind::Deposit, 22.0, d(2022, 1, 1))
            .unwrap();
        ledger.add_year("2030", false, d(2030, 1, 1)).unwrap();

        ledger.add_year("2023", true, d(2023, 1, 1)).unwrap();
        assert_eq!(ledger.year("2023").unwrap().cash_balance, 22.0);

        ledger.add_year("2019", true, d(2019, 1, 1)).unwrap();
        assert_eq!(ledger.year("2019").unwrap().cash_balance, 0.0);
    }

    #[test]
    fn carry_forward_of_zero_cash_records_no_transaction() {
        let mut ledger = PositionLedger::new();
        ledger.add_year("2024", false, d(2024, 1, 1)).unwrap();
        ledger.add_year("2025", true, d(2025, 1, 1)).unwrap();
        assert!(ledger.year("2025").unwrap().cash_transactions.is_empty());
    }

    #[test]
    fn years_are_ordered() {
        let mut ledger = PositionLedger::new();
        for y in ["2022", "2024", "2023"] {
            ledger.add_year(y, false, d(2024, 1, 1)).unwrap();
        }
        assert_eq!(ledger.year_keys_desc(), vec!["2024", "2023", "2022"]);
        assert_eq!(ledger.latest_year(), Some("2024"));
    }
}

// ═══════════════════════════════════════════════════════════════════
// PositionLedger — cash & trades
// ═══════════════════════════════════════════════════════════════════

mod ledger_trades {
    use super::*;

    #[test]
    fn cash_validation() {
        let mut ledger = PositionLedger::new();
        ledger.add_year("2024", false, d(2024, 1, 1)).unwrap();
        for amount in [0.0, -5.0, f64::NAN] {
            assert!(matches!(
                ledger.record_cash_transaction("2024", CashTransactionKind::Deposit, amount, d(2024, 1, 1)),
                Err(CoreError::Validation(_))
            ));
        }
        assert!(matches!(
            ledger.record_cash_transaction("2024", CashTransactionKind::Buy, 5.0, d(2024, 1, 1)),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            ledger.record_cash_transaction("1999", CashTransactionKind::Deposit, 5.0, d(2024, 1, 1)),
            Err(CoreError::YearNotFound(_))
        ));
        assert!(ledger.year("2024").unwrap().cash_transactions.is_empty());
    }

    #[test]
    fn withdraw_lowers_balance() {
        let mut ledger = ledger_with_apple(1000.0);
        let change = ledger
            .record_cash_transaction("2024", CashTransactionKind::Withdraw, 400.0, d(2024, 3, 1))
            .unwrap();
        assert_eq!(ledger.year("2024").unwrap().cash_balance, 600.0);
        assert_eq!(change.cash_transactions[0].amount, -400.0);
        assert_eq!(change.cash_balance, Some(600.0));
    }

    #[test]
    fn scenario_buy_into_existing_position() {
        let mut ledger = ledger_with_apple(10_000.0);
        ledger
            .record_stock_trade(
                &TradeRequest::buy("2024", "Apple", 50.0, 50.0).on(d(2024, 5, 1)),
                CashConfirmation::Unconfirmed,
            )
            .unwrap();
        let y = ledger.year("2024").unwrap();
        let apple = y.position("Apple").unwrap();
        assert_eq!(apple.shares, 150.0);
        assert!((apple.cost_price - 46.67).abs() < 0.005);
        assert_eq!(apple.price, 45.0, "existing market price is kept");
        assert_eq!(apple.symbol.as_deref(), Some("AAPL"));
        assert_eq!(y.cash_balance, 7500.0);
    }

    #[test]
    fn scenario_sell_part_of_position() {
        let mut ledger = ledger_with_apple(0.0);
        ledger
            .record_stock_trade(
                &TradeRequest::sell("2024", "Apple", 50.0, 55.0).on(d(2024, 6, 1)),
                CashConfirmation::Unconfirmed,
            )
            .unwrap();
        let y = ledger.year("2024").unwrap();
        assert_eq!(y.position("Apple").unwrap().shares, 50.0);
        assert_eq!(y.cash_balance, 2750.0);
        let cash = y.cash_transactions.last().unwrap();
        assert_eq!(cash.kind, CashTransactionKind::Sell);
        assert_eq!(cash.stock_name.as_deref(), Some("Apple"));
        let trade = y.stock_transactions.last().unwrap();
        assert_eq!(trade.before_cost_price, 45.0);
        assert!(approx(trade.after_cost_price, (4500.0 - 2750.0) / 50.0));
    }

    #[test]
    fn scenario_deposit_then_buy() {
        let mut ledger = PositionLedger::new();
        ledger.add_year("2024", false, d(2024, 1, 1)).unwrap();
        ledger
            .record_cash_transaction("2024", CashTransactionKind::Deposit, 10_000.0, d(2024, 1, 2))
            .unwrap();
        ledger
            .record_stock_trade(
                &TradeRequest::buy("2024", "Apple", 40.0, 100.0),
                CashConfirmation::Unconfirmed,
            )
            .unwrap();
        let y = ledger.year("2024").unwrap();
        assert_eq!(y.cash_balance, 6000.0);
        let apple = y.position("Apple").unwrap();
        assert_eq!(apple.price, 100.0, "new position takes the trade price");
        assert_eq!(apple.cost_price, 100.0);
    }

    #[test]
    fn oversell_changes_nothing() {
        let mut ledger = ledger_with_apple(500.0);
        let before = ledger.year("2024").unwrap().clone();
        let err = ledger
            .record_stock_trade(
                &TradeRequest::sell("2024", "Apple", 101.0, 50.0),
                CashConfirmation::AllowNegative,
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientShares { ref stock, .. } if stock == "Apple"));
        assert_eq!(ledger.year("2024").unwrap(), &before);
    }

    #[test]
    fn selling_unknown_stock_is_insufficient_shares() {
        let mut ledger = ledger_with_apple(0.0);
        let err = ledger
            .record_stock_trade(
                &TradeRequest::sell("2024", "apple", 1.0, 50.0),
                CashConfirmation::Unconfirmed,
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientShares { held, .. } if held == 0.0));
    }

    #[test]
    fn overdraw_needs_confirmation() {
        let mut ledger = ledger_with_apple(1000.0);
        let req = TradeRequest::buy("2024", "Tencent", 10.0, 300.0).with_symbol("0700.HK");

        let err = ledger
            .record_stock_trade(&req, CashConfirmation::Unconfirmed)
            .unwrap_err();
        assert!(err.is_confirmable());
        assert!(ledger.year("2024").unwrap().position("Tencent").is_none());
        assert_eq!(ledger.year("2024").unwrap().cash_balance, 1000.0);

        ledger
            .record_stock_trade(&req, CashConfirmation::AllowNegative)
            .unwrap();
        assert_eq!(ledger.year("2024").unwrap().cash_balance, -2000.0);
    }

    #[test]
    fn selling_out_removes_position_but_reports_it() {
        let mut ledger = ledger_with_apple(0.0);
        let change = ledger
            .record_stock_trade(
                &TradeRequest::sell("2024", "Apple", 100.0, 60.0),
                CashConfirmation::Unconfirmed,
            )
            .unwrap();
        assert!(ledger.year("2024").unwrap().position("Apple").is_none());
        assert_eq!(change.positions[0].shares, 0.0);
        assert_eq!(change.entity_count(), 3);
        assert_eq!(change.cash_balance, Some(6000.0));
    }

    #[test]
    fn year_end_price_and_symbol_override() {
        let mut ledger = ledger_with_apple(10_000.0);
        ledger
            .record_stock_trade(
                &TradeRequest::buy("2024", "Apple", 1.0, 50.0)
                    .with_year_end_price(70.0)
                    .with_symbol("  "),
                CashConfirmation::Unconfirmed,
            )
            .unwrap();
        let apple = ledger.year("2024").unwrap().position("Apple").unwrap().clone();
        assert_eq!(apple.price, 70.0);
        assert_eq!(apple.symbol.as_deref(), Some("AAPL"), "blank symbol keeps existing");
    }

    #[test]
    fn invalid_trade_input_is_validation() {
        let mut ledger = ledger_with_apple(0.0);
        for req in [
            TradeRequest::buy("2024", "  ", 1.0, 1.0),
            TradeRequest::buy("2024", "Apple", 0.0, 1.0),
            TradeRequest::buy("2024", "Apple", 1.0, -1.0),
            TradeRequest::buy("2024", "Apple", 1.0, 1.0).with_year_end_price(f64::NAN),
        ] {
            assert!(matches!(
                ledger.record_stock_trade(&req, CashConfirmation::AllowNegative),
                Err(CoreError::Validation(_))
            ));
        }
        assert!(ledger.year("2024").unwrap().stock_transactions.is_empty());
    }

    #[test]
    fn preview_matches_execution_and_mutates_nothing() {
        let ledger = ledger_with_apple(100.0);
        let preview = ledger
            .preview_trade(&TradeRequest::sell("2024", "Apple", 20.0, 54.0))
            .unwrap();
        assert_eq!(preview.old_shares, 100.0);
        assert_eq!(preview.new_shares, 80.0);
        assert_eq!(preview.cash_delta, 1080.0);
        assert_eq!(preview.cash_after, 1180.0);
        assert!(!preview.needs_cash_confirmation);
        assert!(approx(preview.expected_profit.unwrap(), 180.0));
        assert!(approx(preview.expected_profit_pct.unwrap(), 20.0));
        assert!(ledger.year("2024").unwrap().stock_transactions.is_empty());

        let buy = ledger
            .preview_trade(&TradeRequest::buy("2024", "Apple", 10.0, 50.0))
            .unwrap();
        assert!(buy.needs_cash_confirmation);
        assert_eq!(buy.expected_profit, None);
    }
}

// ═══════════════════════════════════════════════════════════════════
// PositionLedger — edits, deletion, prices, valuation
// ═══════════════════════════════════════════════════════════════════

mod ledger_edits {
    use super::*;

    #[test]
    fn edit_keeps_id_and_zero_removes() {
        let mut ledger = ledger_with_apple(0.0);
        let id = ledger.year("2024").unwrap().position("Apple").unwrap().id;
        let change = ledger
            .edit_position(
                "2024",
                "Apple",
                PositionEdit {
                    shares: 120.0,
                    price: 50.0,
                    cost_price: 44.0,
                    symbol: Some("AAPL".into()),
                },
            )
            .unwrap();
        assert_eq!(change.positions[0].id, id);
        assert_eq!(ledger.year("2024").unwrap().position("Apple").unwrap().shares, 120.0);

        ledger
            .edit_position(
                "2024",
                "Apple",
                PositionEdit {
                    shares: 0.0,
                    price: 50.0,
                    cost_price: 44.0,
                    symbol: None,
                },
            )
            .unwrap();
        assert!(ledger.year("2024").unwrap().position("Apple").is_none());
    }

    #[test]
    fn edit_rejects_negative_values() {
        let mut ledger = ledger_with_apple(0.0);
        let err = ledger
            .edit_position(
                "2024",
                "Apple",
                PositionEdit {
                    shares: -1.0,
                    price: 1.0,
                    cost_price: 1.0,
                    symbol: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn remove_stock_across_years_keeps_history() {
        let mut ledger = ledger_with_apple(10_000.0);
        ledger
            .record_stock_trade(
                &TradeRequest::buy("2024", "Apple", 1.0, 50.0),
                CashConfirmation::Unconfirmed,
            )
            .unwrap();
        ledger.add_year("2025", true, d(2025, 1, 1)).unwrap();

        let years = ledger.remove_stock("Apple").unwrap();
        assert_eq!(years, vec!["2024", "2025"]);
        assert!(ledger.year("2025").unwrap().position("Apple").is_none());
        assert_eq!(ledger.year("2024").unwrap().stock_transactions.len(), 1);

        assert!(matches!(ledger.remove_stock("Apple"), Err(CoreError::StockNotFound(_))));
    }

    #[test]
    fn update_prices_converts_and_skips_bad_quotes() {
        let mut ledger = ledger_with_apple(0.0);
        ledger
            .edit_position(
                "2024",
                "Tencent",
                PositionEdit {
                    shares: 10.0,
                    price: 40.0,
                    cost_price: 35.0,
                    symbol: Some("0700.HK".into()),
                },
            )
            .unwrap();
        ledger
            .edit_position(
                "2024",
                "Euro Co",
                PositionEdit {
                    shares: 1.0,
                    price: 10.0,
                    cost_price: 10.0,
                    symbol: Some("EUCO".into()),
                },
            )
            .unwrap();

        let mut quotes = PriceQuotes::new();
        quotes.insert("AAPL".into(), Quote::new(190.0));
        quotes.insert("0700.HK".into(), Quote::in_currency(320.0, "HKD"));
        quotes.insert("EUCO".into(), Quote::in_currency(12.0, "EUR"));

        let rates = ExchangeRates::default();
        let change = ledger.update_prices("2024", &quotes, &rates).unwrap();
        assert_eq!(change.positions.len(), 2);

        let y = ledger.year("2024").unwrap();
        assert_eq!(y.position("Apple").unwrap().price, 190.0);
        assert_eq!(y.position("Apple").unwrap().cost_price, 45.0);
        assert!(approx(y.position("Tencent").unwrap().price, 320.0 * 0.128_643_84));
        assert_eq!(y.position("Euro Co").unwrap().price, 10.0);
    }

    #[test]
    fn valuation_in_display_currency() {
        let ledger = ledger_with_apple(500.0);
        let rates = ExchangeRates::default();
        let usd = ledger.valuation("2024", "USD", &no_hidden(), &rates).unwrap();
        assert_eq!(usd, 5000.0);

        let hkd = ledger.valuation("2024", "HKD", &no_hidden(), &rates).unwrap();
        assert!(approx(hkd, 5000.0 / 0.128_643_84));

        let mut hidden = BTreeSet::new();
        hidden.insert("Apple".to_string());
        assert_eq!(ledger.valuation("2024", "USD", &hidden, &rates).unwrap(), 500.0);

        assert!(matches!(
            ledger.valuation("2024", "EUR", &no_hidden(), &rates),
            Err(CoreError::UnknownCurrency(_))
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════
// TransactionLog
// ═══════════════════════════════════════════════════════════════════

mod transaction_log {
    use super::*;

    #[test]
    fn deposits_exclude_trades_and_count_carryover() {
        let mut y = YearData::new();
        y.push_cash(CashTransaction::carryover(5000.0, d(2025, 1, 1)));
        y.push_cash(CashTransaction::deposit(1000.0, d(2025, 1, 2)));
        y.push_cash(CashTransaction::withdraw(300.0, d(2025, 1, 3)));
        y.push_cash(CashTransaction::trade(TradeSide::Sell, "Apple", 800.0, d(2025, 1, 4)));

        let log = TransactionLog::new();
        assert_eq!(log.year_deposits(&y), 6000.0);
        assert_eq!(log.fresh_deposits(&y), 1000.0);
        assert_eq!(log.year_withdrawals(&y), 300.0);
        assert_eq!(log.net_deposits(&y), 5700.0);
        assert_eq!(log.net_fresh_deposits(&y), 700.0);
        assert_eq!(log.cash_history_sum(&y), 6500.0);
        assert_eq!(log.cash_for_stock(&y, "Apple").len(), 1);
        assert!(log.verify_cash_balance(&y).is_ok());
    }

    #[test]
    fn empty_year_sums_to_positive_zero() {
        let log = TransactionLog::new();
        let y = YearData::new();
        for total in [log.year_deposits(&y), log.year_withdrawals(&y), log.cash_history_sum(&y)] {
            assert_eq!(total, 0.0);
            assert!(total.is_sign_positive());
        }
    }

    #[test]
    fn trail_replays_after_fractional_full_sell() {
        let mut ledger = PositionLedger::new();
        ledger.add_year("2024", false, d(2024, 1, 1)).unwrap();
        ledger
            .record_cash_transaction("2024", CashTransactionKind::Deposit, 1000.0, d(2024, 1, 2))
            .unwrap();
        for req in [
            TradeRequest::buy("2024", "A", 0.1, 10.0),
            TradeRequest::buy("2024", "A", 0.2, 10.0),
            TradeRequest::sell("2024", "A", 0.3, 12.0),
            TradeRequest::buy("2024", "A", 1.0, 8.0),
        ] {
            ledger
                .record_stock_trade(&req, CashConfirmation::Unconfirmed)
                .unwrap();
        }
        let y = ledger.year("2024").unwrap();
        assert_eq!(y.position("A").unwrap().cost_price, 8.0);
        let log = TransactionLog::new();
        assert!(log.verify_cost_basis_trail(y).is_ok());
        assert!(log.verify_cash_balance(y).is_ok());
    }

    #[test]
    fn cash_balance_drift_is_reported() {
        let mut y = YearData::new();
        y.push_cash(CashTransaction::deposit(1000.0, d(2025, 1, 2)));
        y.cash_balance = 999.0;
        assert!(matches!(
            TransactionLog::new().verify_cash_balance(&y),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn cost_basis_trail_replays() {
        let mut ledger = ledger_with_apple(10_000.0);
        for req in [
            TradeRequest::buy("2024", "Apple", 50.0, 50.0),
            TradeRequest::sell("2024", "Apple", 30.0, 60.0),
            TradeRequest::buy("2024", "Tencent", 10.0, 30.0),
            TradeRequest::sell("2024", "Tencent", 10.0, 35.0),
        ] {
            ledger
                .record_stock_trade(&req, CashConfirmation::Unconfirmed)
                .unwrap();
        }
        let log = TransactionLog::new();
        let y = ledger.year("2024").unwrap();
        assert!(log.verify_cost_basis_trail(y).is_ok());
        assert!(log.verify_cash_balance(y).is_ok());
        assert_eq!(log.trades_for(y, "Apple").len(), 2);

        let mut tampered = y.clone();
        tampered.stock_transactions[1].after_cost_price += 1.0;
        assert!(log.verify_cost_basis_trail(&tampered).is_err());
    }
}

// ═══════════════════════════════════════════════════════════════════
// CurrencyService
// ═══════════════════════════════════════════════════════════════════

mod currency {
    use super::*;

    #[test]
    fn converts_through_base() {
        let svc = CurrencyService::new();
        let rates = ExchangeRates::default();
        assert_eq!(svc.convert(&rates, 100.0, "usd", "USD").unwrap(), 100.0);
        assert!(approx(svc.convert(&rates, 1000.0, "USD", "HKD").unwrap(), 1000.0 / 0.128_643_84));
        assert!(approx(
            svc.convert(&rates, 1000.0, "HKD", "CNY").unwrap(),
            1000.0 * 0.128_643_84 / 0.14
        ));
        assert!(matches!(
            svc.convert(&rates, 1.0, "GBP", "USD"),
            Err(CoreError::UnknownCurrency(c)) if c == "GBP"
        ));
    }

    #[test]
    fn quote_without_currency_is_base() {
        let svc = CurrencyService::new();
        let rates = ExchangeRates::default();
        assert_eq!(svc.quote_to_base(&rates, 12.5, None).unwrap(), 12.5);
        assert!(approx(svc.quote_to_base(&rates, 10.0, Some("CNY")).unwrap(), 1.4));
    }
}

// ═══════════════════════════════════════════════════════════════════
// GrowthCalculator
// ═══════════════════════════════════════════════════════════════════

mod growth {
    use super::*;

    /// Year with `cash` deposited and a position worth `stock_value`.
    fn year(deposit: f64, stock_value: f64, date: NaiveDate) -> YearData {
        let mut y = YearData::new();
        if deposit > 0.0 {
            y.push_cash(CashTransaction::deposit(deposit, date));
        }
        if stock_value > 0.0 {
            y.upsert_position(Position::new("Index", 1.0, stock_value, stock_value));
        }
        y
    }

    #[test]
    fn scenario_cagr_two_years() {
        let mut years = YearMap::new();
        years.insert("2023".into(), year(4000.0, 0.0, d(2023, 1, 1)));
        years.insert("2024".into(), year(0.0, 5000.0, d(2024, 1, 1)));

        let cagr = GrowthCalculator::new().cagr(&years, &no_hidden()).unwrap();
        assert!((cagr - 11.80).abs() < 0.01, "cagr = {cagr}");
    }

    #[test]
    fn cagr_falls_back_to_net_deposits() {
        let mut years = YearMap::new();
        let mut first = YearData::new();
        first.push_cash(CashTransaction::deposit(1000.0, d(2023, 1, 1)));
        first.push_cash(CashTransaction::trade(TradeSide::Buy, "X", -2000.0, d(2023, 1, 2)));
        years.insert("2023".into(), first);
        years.insert("2024".into(), year(0.0, 1210.0, d(2024, 1, 1)));

        let cagr = GrowthCalculator::new().cagr(&years, &no_hidden()).unwrap();
        assert!(approx(cagr, 10.0), "cagr = {cagr}");
    }

    #[test]
    fn cagr_without_base_is_none() {
        let calc = GrowthCalculator::new();
        assert_eq!(calc.cagr(&YearMap::new(), &no_hidden()), None);

        let mut years = YearMap::new();
        years.insert("2023".into(), YearData::new());
        years.insert("2024".into(), year(0.0, 100.0, d(2024, 1, 1)));
        assert_eq!(calc.cagr(&years, &no_hidden()), None);
    }

    #[test]
    fn year_over_year_strips_deposits() {
        let mut years = YearMap::new();
        years.insert("2023".into(), year(0.0, 10_000.0, d(2023, 1, 1)));
        years.insert("2024".into(), year(2000.0, 10_500.0, d(2024, 1, 1)));

        let g = GrowthCalculator::new()
            .year_over_year_growth(&years, "2024", "2023", &no_hidden())
            .unwrap();
        assert_eq!(g.actual_growth, 2500.0);
        assert!(approx(g.actual_growth_rate.unwrap(), 25.0));
        assert_eq!(g.year_deposits, 2000.0);
        assert_eq!(g.investment_growth, 500.0);
        assert!(approx(g.investment_growth_rate.unwrap(), 5.0));
    }

    #[test]
    fn year_over_year_without_previous_value_has_no_rates() {
        let mut years = YearMap::new();
        years.insert("2023".into(), YearData::new());
        years.insert("2024".into(), year(100.0, 0.0, d(2024, 1, 1)));
        let calc = GrowthCalculator::new();
        let g = calc
            .year_over_year_growth(&years, "2024", "2023", &no_hidden())
            .unwrap();
        assert_eq!(g.actual_growth_rate, None);
        assert_eq!(g.investment_growth_rate, None);
        assert_eq!(calc.growth_series(&years, &no_hidden()).unwrap().len(), 1);
        assert!(matches!(
            calc.year_over_year_growth(&years, "2025", "2024", &no_hidden()),
            Err(CoreError::YearNotFound(_))
        ));
    }

    #[test]
    fn carried_year_counts_carryover_as_deposit() {
        let mut ledger = PositionLedger::new();
        ledger.add_year("2022", false, d(2022, 1, 1)).unwrap();
        ledger
            .record_cash_transaction("2022", CashTransactionKind::Deposit, 1000.0, d(2022, 3, 1))
            .unwrap();
        ledger.add_year("2023", true, d(2023, 1, 1)).unwrap();

        let calc = GrowthCalculator::new();
        let g = calc
            .year_over_year_growth(ledger.years(), "2023", "2022", &no_hidden())
            .unwrap();
        assert_eq!(g.actual_growth, 0.0);
        assert_eq!(g.year_deposits, 1000.0);
        assert_eq!(g.investment_growth, -1000.0);
        assert!(approx(g.investment_growth_rate.unwrap(), -100.0));
        assert_eq!(calc.total_investment(ledger.years(), "2023"), 1000.0);
    }

    #[test]
    fn investment_totals_accumulate() {
        let mut years = YearMap::new();
        let mut y1 = year(5000.0, 0.0, d(2023, 1, 1));
        y1.push_cash(CashTransaction::withdraw(1000.0, d(2023, 6, 1)));
        years.insert("2023".into(), y1);
        let mut y2 = YearData::new();
        y2.push_cash(CashTransaction::carryover(4000.0, d(2024, 1, 1)));
        y2.push_cash(CashTransaction::deposit(2000.0, d(2024, 2, 1)));
        y2.upsert_position(Position::new("Index", 10.0, 100.0, 90.0));
        years.insert("2024".into(), y2);

        let calc = GrowthCalculator::new();
        assert_eq!(calc.total_investment(&years, "2023"), 4000.0);
        assert_eq!(calc.total_investment(&years, "2024"), 6000.0);

        let r = calc.investment_return(&years, "2024", &no_hidden()).unwrap();
        assert_eq!(r.portfolio_value, 7000.0);
        assert_eq!(r.absolute_return, 1000.0);
        assert!(approx(r.percentage_return, 1000.0 / 6000.0 * 100.0));
    }

    #[test]
    fn yearly_values_per_stock() {
        let mut years = YearMap::new();
        let mut y = YearData::new();
        y.upsert_position(Position::new("A", 2.0, 10.0, 1.0));
        y.upsert_position(Position::new("B", 1.0, 5.0, 1.0));
        y.cash_balance = 1000.0;
        years.insert("2024".into(), y);

        let mut hidden = BTreeSet::new();
        hidden.insert("B".to_string());
        let values = GrowthCalculator::new().yearly_values(&years, &hidden);
        let v = &values["2024"];
        assert_eq!(v.by_stock.get("A"), Some(&20.0));
        assert!(v.by_stock.get("B").is_none());
        assert_eq!(v.total, 20.0);
    }

    #[test]
    fn goal_helpers() {
        let calc = GrowthCalculator::new();
        assert_eq!(calc.years_to_goal(100_000.0, 200_000.0, 7.0), Some(11));
        assert_eq!(calc.years_to_goal(100_000.0, 50_000.0, 7.0), Some(0));
        assert_eq!(calc.years_to_goal(100_000.0, 200_000.0, 0.0), None);
        assert_eq!(calc.years_to_goal(0.0, 200_000.0, 5.0), None);

        let rate = calc.required_return_rate(100_000.0, 200_000.0, 10).unwrap();
        assert!((rate - 7.177).abs() < 0.001);
        assert_eq!(calc.required_return_rate(100_000.0, 200_000.0, 0), None);
    }
}
