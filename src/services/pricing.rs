use {
    crate::domain::{fee::FeeOption, money::MoneyAmount},
    std::collections::HashSet,
    uuid::Uuid,
};

/// Compute the total and the set of options actually charged.
///
/// Required options are included unconditionally. Optional options are
/// included iff they are selectable, active and selected. Pure and
/// deterministic; the caller validates `selected_ids` against the event's
/// active options and rejects non-positive totals before creating a booking.
pub fn price(all_options: &[FeeOption], selected_ids: &HashSet<Uuid>) -> (MoneyAmount, Vec<FeeOption>) {
    let charged: Vec<FeeOption> = all_options
        .iter()
        .filter(|o| o.required || (o.selectable && o.active && selected_ids.contains(&o.id)))
        .cloned()
        .collect();

    let total = charged
        .iter()
        .fold(MoneyAmount::ZERO, |acc, o| acc + o.price);

    (total, charged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fee::FeeCategory;

    fn option(category: FeeCategory, price: i64, required: bool, selectable: bool) -> FeeOption {
        FeeOption {
            id: Uuid::now_v7(),
            event_id: Uuid::now_v7(),
            category,
            label: category.as_str().to_string(),
            price: MoneyAmount::new(price).unwrap(),
            required,
            selectable,
            active: true,
            sort_order: category.default_sort_order(),
        }
    }

    /// TICKET (required, 5000), TRAVEL (selectable, 2000), CLUB_FEE
    /// (required, 1000).
    fn fixture() -> Vec<FeeOption> {
        vec![
            option(FeeCategory::Ticket, 5000, true, false),
            option(FeeCategory::Travel, 2000, false, true),
            option(FeeCategory::ClubFee, 1000, true, false),
        ]
    }

    #[test]
    fn selecting_travel_charges_all_three() {
        let options = fixture();
        let travel_id = options[1].id;
        let (total, charged) = price(&options, &HashSet::from([travel_id]));

        assert_eq!(total.cents(), 8000);
        let categories: Vec<_> = charged.iter().map(|o| o.category).collect();
        assert_eq!(
            categories,
            vec![FeeCategory::Ticket, FeeCategory::Travel, FeeCategory::ClubFee]
        );
    }

    #[test]
    fn empty_selection_charges_required_only() {
        let options = fixture();
        let (total, charged) = price(&options, &HashSet::new());

        assert_eq!(total.cents(), 6000);
        let categories: Vec<_> = charged.iter().map(|o| o.category).collect();
        assert_eq!(categories, vec![FeeCategory::Ticket, FeeCategory::ClubFee]);
    }

    #[test]
    fn unselectable_option_is_never_charged_by_selection() {
        let mut options = fixture();
        options[1].selectable = false;
        let travel_id = options[1].id;
        let (total, _) = price(&options, &HashSet::from([travel_id]));
        assert_eq!(total.cents(), 6000);
    }

    #[test]
    fn inactive_optional_is_never_charged() {
        let mut options = fixture();
        options[1].active = false;
        let travel_id = options[1].id;
        let (total, _) = price(&options, &HashSet::from([travel_id]));
        assert_eq!(total.cents(), 6000);
    }

    #[test]
    fn identical_inputs_yield_identical_output() {
        let options = fixture();
        let selection = HashSet::from([options[1].id]);
        let first = price(&options, &selection);
        let second = price(&options, &selection);
        assert_eq!(first, second);
    }
}
