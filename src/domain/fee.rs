use {
    super::error::BookingError,
    super::money::MoneyAmount,
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

/// The three configurable fee categories. At most one option per
/// (event, category) exists, enforced by a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeCategory {
    Travel,
    Ticket,
    ClubFee,
}

impl FeeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Travel => "TRAVEL",
            Self::Ticket => "TICKET",
            Self::ClubFee => "CLUB_FEE",
        }
    }

    /// Default position when an option is first created for a category.
    pub fn default_sort_order(&self) -> i32 {
        match self {
            Self::Travel => 10,
            Self::Ticket => 20,
            Self::ClubFee => 30,
        }
    }

    /// Flag rules per category. CLUB_FEE is the mandatory club charge:
    /// always required, never selectable, always active. TRAVEL/TICKET are
    /// opt-in add-ons; only their `active` flag is caller-controlled.
    pub fn apply_flag_rules(&self, requested_active: bool) -> FeeFlags {
        match self {
            Self::ClubFee => FeeFlags {
                required: true,
                selectable: false,
                active: true,
            },
            Self::Travel | Self::Ticket => FeeFlags {
                required: false,
                selectable: true,
                active: requested_active,
            },
        }
    }
}

impl fmt::Display for FeeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for FeeCategory {
    type Error = BookingError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "TRAVEL" => Ok(Self::Travel),
            "TICKET" => Ok(Self::Ticket),
            "CLUB_FEE" => Ok(Self::ClubFee),
            other => Err(BookingError::Validation(format!(
                "unknown fee category: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeFlags {
    pub required: bool,
    pub selectable: bool,
    pub active: bool,
}

/// A configured, priced charge attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeOption {
    pub id: Uuid,
    pub event_id: Uuid,
    pub category: FeeCategory,
    pub label: String,
    pub price: MoneyAmount,
    pub required: bool,
    pub selectable: bool,
    pub active: bool,
    pub sort_order: i32,
}

/// One entry of a replace-options payload, already validated and with the
/// category flag rules applied.
#[derive(Debug, Clone)]
pub struct FeeOptionSpec {
    pub category: FeeCategory,
    pub label: String,
    pub price: MoneyAmount,
    pub flags: FeeFlags,
}

impl FeeOptionSpec {
    pub fn new(
        category: FeeCategory,
        label: Option<String>,
        price: MoneyAmount,
        requested_active: bool,
    ) -> Self {
        let label = label
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| category.as_str().to_string());
        Self {
            category,
            label,
            price,
            flags: category.apply_flag_rules(requested_active),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn club_fee_flags_are_forced() {
        let flags = FeeCategory::ClubFee.apply_flag_rules(false);
        assert!(flags.required);
        assert!(!flags.selectable);
        assert!(flags.active, "club fee cannot be deactivated");
    }

    #[test]
    fn travel_and_ticket_are_selectable_never_required() {
        for cat in [FeeCategory::Travel, FeeCategory::Ticket] {
            let flags = cat.apply_flag_rules(false);
            assert!(!flags.required);
            assert!(flags.selectable);
            assert!(!flags.active);
        }
    }

    #[test]
    fn category_roundtrip() {
        for cat in [FeeCategory::Travel, FeeCategory::Ticket, FeeCategory::ClubFee] {
            assert_eq!(FeeCategory::try_from(cat.as_str()).unwrap(), cat);
        }
        assert!(FeeCategory::try_from("PARKING").is_err());
    }

    #[test]
    fn spec_falls_back_to_category_label() {
        let spec = FeeOptionSpec::new(
            FeeCategory::Ticket,
            Some("   ".into()),
            MoneyAmount::new(5000).unwrap(),
            true,
        );
        assert_eq!(spec.label, "TICKET");
    }
}
