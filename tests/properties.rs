// Property tests: amount resolution, fiscal periods and aggregation order

use proptest::prelude::*;
use wa_budget_extract::{
    infer_fiscal_period, resolve_amount, AppropriationItem, Biennium, FiscalAggregate, FundType,
    Money, ResolvedAmount, StyledRun,
};

fn item(agency: u8, fiscal_year: i32, old: i64, new: i64, total: bool) -> AppropriationItem {
    let old_amount = Money::from_cents(old);
    let new_amount = Money::from_cents(new);
    AppropriationItem {
        account_label: format!("General Fund-State Appropriation (FY {})", fiscal_year),
        normalized_label: format!("General Fund-State Appropriation (FY {})", fiscal_year),
        account_name: "General Fund-State".to_string(),
        account_code: None,
        account_type: None,
        fund_type: Some(FundType::GeneralFund),
        fiscal_year: Some(fiscal_year),
        biennium: Some(Biennium::for_fiscal_year(fiscal_year)),
        amount: ResolvedAmount {
            old_amount: Some(old_amount),
            new_amount: Some(new_amount),
            change_amount: Some(new_amount - old_amount),
            is_amended: old != new,
        },
        is_total_row: total,
        section_number: Some("101".to_string()),
        agency_code: Some(format!("{:03}", agency)),
    }
}

fn items() -> impl Strategy<Value = Vec<AppropriationItem>> {
    prop::collection::vec(
        (0u8..5, 2019i32..2030, 0i64..1_000_000_000, 0i64..1_000_000_000, prop::bool::weighted(0.2)),
        0..40,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .map(|(agency, fy, old, new, total)| item(agency, fy, old, new, total))
            .collect()
    })
}

proptest! {
    #[test]
    fn change_is_new_minus_old(old in 0i64..100_000_000_000, new in 0i64..100_000_000_000) {
        let (old, new) = (Money::from_cents(old), Money::from_cents(new));
        let runs = [StyledRun::strike(&old.to_string()), StyledRun::add(&new.to_string())];

        let (amount, errors) = resolve_amount(&runs, "");
        prop_assert!(errors.is_empty());
        prop_assert_eq!(amount.old_amount, Some(old));
        prop_assert_eq!(amount.new_amount, Some(new));
        prop_assert_eq!(amount.change_amount, Some(new - old));
        prop_assert!(amount.is_amended);
    }

    #[test]
    fn plain_amount_has_zero_change(cents in 0i64..100_000_000_000) {
        let money = Money::from_cents(cents);
        let (amount, errors) = resolve_amount(&[], &money.to_string());
        prop_assert!(errors.is_empty());
        prop_assert_eq!(amount.old_amount, amount.new_amount);
        prop_assert_eq!(amount.change_amount, Some(Money::ZERO));
        prop_assert!(!amount.is_amended);
    }

    #[test]
    fn fiscal_period_is_pure(label in "\\PC{0,60}") {
        prop_assert_eq!(infer_fiscal_period(&label), infer_fiscal_period(&label));
    }

    #[test]
    fn fiscal_year_lands_in_an_odd_start_biennium(fy in 1990i32..2100) {
        let period = infer_fiscal_period(&format!("General Fund-State Appropriation (FY {})", fy));
        prop_assert_eq!(period.fiscal_year, Some(fy));
        let biennium = period.biennium.unwrap();
        prop_assert_eq!(biennium.start % 2, 1);
        prop_assert_eq!(biennium.end - biennium.start, 2);
        prop_assert!(fy >= biennium.start && fy <= biennium.end);
    }

    #[test]
    fn aggregation_ignores_order(items in items()) {
        let forward = FiscalAggregate::fold(&items);
        let backward = FiscalAggregate::fold(items.iter().rev());
        prop_assert_eq!(&forward, &backward);

        let mid = items.len() / 2;
        let mut merged = FiscalAggregate::fold(&items[mid..]);
        merged.merge(&FiscalAggregate::fold(&items[..mid]));
        prop_assert_eq!(&forward, &merged);
    }

    #[test]
    fn total_rows_never_reach_the_sums(items in items()) {
        let aggregate = FiscalAggregate::fold(&items);
        let lines: Vec<_> = items.iter().filter(|i| !i.is_total_row).collect();
        let expected: Money = lines.iter().filter_map(|i| i.amount.new_amount).sum();

        prop_assert_eq!(aggregate.grand_total.new, expected);
        prop_assert_eq!(aggregate.grand_total.line_count, lines.len());
        prop_assert_eq!(aggregate.excluded_total_rows, items.len() - lines.len());
    }
}
