//! Project progress auto-calculation
//!
//! Derives a 0-100 completion percentage from a project's categorical
//! status, its implementation method, how much of the allocation has been
//! released, and the completed/delayed flags.
//!
//! ## Formula
//!
//! 1. `is_completed` short-circuits to 100.
//! 2. Base % comes from the status table of the implementation method.
//!    Lookup order: method table, then the generic fallback table, then 0.
//!    An unknown or empty method goes straight to the fallback table.
//! 3. When both allocation and released are positive, the base is blended
//!    with the fund-release ratio (capped at 1.0):
//!    `round(base * 0.75 + ratio * 100 * 0.25)`.
//! 4. `is_delayed` caps the blended value at the base: a delayed project
//!    never gains progress from fund releases.
//! 5. Result is clamped to `[0, 100]`.
//!
//! The calculation is total: unrecognized labels degrade to a 0 base and
//! missing funds disable blending. It never fails.

/// Weight of the status-implied baseline in the blend
pub const STATUS_WEIGHT: f64 = 0.75;

/// Weight of the fund-release percentage in the blend
pub const FUND_WEIGHT: f64 = 0.25;

/// Status labels as entered by the district office
pub mod status {
    pub const TENDER_FLOATING: &str = "টেন্ডার ফ্লোটিং";
    pub const TENDER_EVALUATION: &str = "টেন্ডার মূল্যায়ন";
    pub const WORK_ORDER_ISSUED: &str = "কার্যাদেশ প্রদান";
    pub const CPPC_APPROVAL: &str = "সিপিপিসি অনুমোদন প্রক্রিয়া";
    pub const RFQ_PROCESS: &str = "আরএফকিউ প্রক্রিয়া";
    pub const NOT_STARTED: &str = "কাজ শুরু হয়নি";
    pub const ONGOING: &str = "কাজ চলমান";
    pub const PARTIALLY_COMPLETE: &str = "আংশিক সম্পন্ন";
    pub const FINAL_BILLING: &str = "চূড়ান্ত বিল প্রক্রিয়া";
    pub const DONE: &str = "কাজ সম্পন্ন";
}

type StatusTable = &'static [(&'static str, u8)];

const TENDER_TABLE: StatusTable = &[
    (status::TENDER_FLOATING, 5),
    (status::TENDER_EVALUATION, 15),
    (status::WORK_ORDER_ISSUED, 25),
    (status::NOT_STARTED, 30),
    (status::ONGOING, 55),
    (status::PARTIALLY_COMPLETE, 75),
    (status::FINAL_BILLING, 90),
    (status::DONE, 100),
];

const CPPC_TABLE: StatusTable = &[
    (status::CPPC_APPROVAL, 10),
    (status::NOT_STARTED, 25),
    (status::ONGOING, 55),
    (status::PARTIALLY_COMPLETE, 75),
    (status::FINAL_BILLING, 90),
    (status::DONE, 100),
];

const RFQ_TABLE: StatusTable = &[
    (status::RFQ_PROCESS, 10),
    (status::NOT_STARTED, 25),
    (status::ONGOING, 55),
    (status::PARTIALLY_COMPLETE, 75),
    (status::FINAL_BILLING, 90),
    (status::DONE, 100),
];

/// Shared late-stage statuses, consulted for unknown methods and for
/// statuses a method table does not list
const FALLBACK_TABLE: StatusTable = &[
    (status::NOT_STARTED, 25),
    (status::ONGOING, 55),
    (status::PARTIALLY_COMPLETE, 75),
    (status::FINAL_BILLING, 90),
    (status::DONE, 100),
];

/// Procurement pathway of a project; selects the status table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImplementationMethod {
    /// Open tender (টেন্ডার)
    Tender,
    /// Committee-approved works (সিপিপিসি)
    Cppc,
    /// Request for quotation (আরএফকিউ)
    Rfq,
}

impl ImplementationMethod {
    pub const ALL: [ImplementationMethod; 3] = [Self::Tender, Self::Cppc, Self::Rfq];

    /// Label stored in the `implementation_method` column
    pub fn label(&self) -> &'static str {
        match self {
            Self::Tender => "টেন্ডার",
            Self::Cppc => "সিপিপিসি",
            Self::Rfq => "আরএফকিউ",
        }
    }

    /// Match a stored label. Returns None for empty or unknown labels.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|m| m.label() == label)
    }

    fn status_table(&self) -> StatusTable {
        match self {
            Self::Tender => TENDER_TABLE,
            Self::Cppc => CPPC_TABLE,
            Self::Rfq => RFQ_TABLE,
        }
    }
}

fn lookup(table: StatusTable, status: &str) -> Option<u8> {
    table
        .iter()
        .find(|(label, _)| *label == status)
        .map(|(_, pct)| *pct)
}

/// Status-implied baseline percentage
pub fn base_percentage(current_status: &str, method: Option<ImplementationMethod>) -> u8 {
    let status = current_status.trim();
    let table = method.map_or(FALLBACK_TABLE, |m| m.status_table());

    lookup(table, status)
        .or_else(|| lookup(FALLBACK_TABLE, status))
        .unwrap_or(0)
}

/// Released / allocation, capped at 1.0. None when either side is not a
/// positive finite amount.
pub fn fund_ratio(allocation_amount: f64, released_amount: f64) -> Option<f64> {
    let alloc = finite_or_zero(allocation_amount);
    let released = finite_or_zero(released_amount);

    if alloc > 0.0 && released > 0.0 {
        Some((released / alloc).min(1.0))
    } else {
        None
    }
}

fn finite_or_zero(amount: f64) -> f64 {
    if amount.is_finite() {
        amount
    } else {
        0.0
    }
}

/// Calculate the progress percentage of a project
pub fn calculate(
    current_status: &str,
    implementation_method: Option<&str>,
    allocation_amount: f64,
    released_amount: f64,
    is_completed: bool,
    is_delayed: bool,
) -> u8 {
    if is_completed {
        return 100;
    }

    let method = implementation_method.and_then(ImplementationMethod::from_label);
    let base = base_percentage(current_status, method);

    let mut blended = match fund_ratio(allocation_amount, released_amount) {
        // Half away from zero; the blend is never negative
        Some(ratio) => (f64::from(base) * STATUS_WEIGHT + ratio * 100.0 * FUND_WEIGHT).round(),
        None => f64::from(base),
    };

    if is_delayed {
        blended = blended.min(f64::from(base));
    }

    blended.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    const TENDER: Option<&str> = Some("টেন্ডার");
    const CPPC: Option<&str> = Some("সিপিপিসি");
    const RFQ: Option<&str> = Some("আরএফকিউ");

    #[test]
    fn test_completed_overrides_everything() {
        let statuses = ["", "garbage", status::TENDER_FLOATING, status::DONE];
        let methods = [None, Some(""), Some("unknown"), TENDER, CPPC, RFQ];
        let amounts = [(0.0, 0.0), (1000.0, 0.0), (1000.0, 500.0), (1000.0, 5000.0), (0.0, 10.0)];

        for s in statuses {
            for m in methods {
                for (alloc, released) in amounts {
                    for delayed in [false, true] {
                        assert_eq!(calculate(s, m, alloc, released, true, delayed), 100);
                    }
                }
            }
        }
    }

    #[test]
    fn test_method_tables() {
        assert_eq!(calculate(status::TENDER_FLOATING, TENDER, 0.0, 0.0, false, false), 5);
        assert_eq!(calculate(status::TENDER_EVALUATION, TENDER, 0.0, 0.0, false, false), 15);
        assert_eq!(calculate(status::WORK_ORDER_ISSUED, TENDER, 0.0, 0.0, false, false), 25);
        assert_eq!(calculate(status::NOT_STARTED, TENDER, 0.0, 0.0, false, false), 30);
        assert_eq!(calculate(status::NOT_STARTED, CPPC, 0.0, 0.0, false, false), 25);
        assert_eq!(calculate(status::CPPC_APPROVAL, CPPC, 0.0, 0.0, false, false), 10);
        assert_eq!(calculate(status::RFQ_PROCESS, RFQ, 0.0, 0.0, false, false), 10);
        assert_eq!(calculate(status::FINAL_BILLING, RFQ, 0.0, 0.0, false, false), 90);
        assert_eq!(calculate(status::DONE, CPPC, 0.0, 0.0, false, false), 100);
    }

    #[test]
    fn test_unknown_method_uses_fallback() {
        assert_eq!(calculate(status::ONGOING, None, 0.0, 0.0, false, false), 55);
        assert_eq!(calculate(status::ONGOING, Some(""), 0.0, 0.0, false, false), 55);
        assert_eq!(calculate(status::NOT_STARTED, Some("direct"), 0.0, 0.0, false, false), 25);
        // Method-specific stage is not in the fallback table
        assert_eq!(calculate(status::TENDER_FLOATING, None, 0.0, 0.0, false, false), 0);
    }

    #[test]
    fn test_status_from_other_method_under_known_method() {
        // Tender-only stage under RFQ misses both tables
        assert_eq!(calculate(status::TENDER_EVALUATION, RFQ, 0.0, 0.0, false, false), 0);
        assert_eq!(calculate(status::CPPC_APPROVAL, TENDER, 0.0, 0.0, false, false), 0);
    }

    #[test]
    fn test_unknown_status_is_zero_base() {
        assert_eq!(calculate("nonsense", TENDER, 0.0, 0.0, false, false), 0);
        assert_eq!(calculate("", None, 0.0, 0.0, false, false), 0);
        // Blending still applies on a zero base
        assert_eq!(calculate("nonsense", TENDER, 1000.0, 1000.0, false, false), 25);
    }

    #[test]
    fn test_labels_are_trimmed() {
        let padded = format!("  {}  ", status::ONGOING);
        assert_eq!(calculate(&padded, Some(" টেন্ডার "), 0.0, 0.0, false, false), 55);
        assert_eq!(ImplementationMethod::from_label(" সিপিপিসি"), Some(ImplementationMethod::Cppc));
    }

    #[test]
    fn test_no_blend_without_funds() {
        for m in [None, TENDER, CPPC, RFQ] {
            let base = calculate(status::ONGOING, m, 0.0, 0.0, false, false);
            assert_eq!(calculate(status::ONGOING, m, 0.0, 500.0, false, false), base);
            assert_eq!(calculate(status::ONGOING, m, 1000.0, 0.0, false, false), base);
        }
    }

    #[test]
    fn test_blend_half_released() {
        // round(55 * 0.75 + 50 * 0.25) = round(53.75) = 54
        assert_eq!(calculate(status::ONGOING, TENDER, 1000.0, 500.0, false, false), 54);
    }

    #[test]
    fn test_blend_rounds_half_up() {
        // 5 * 0.75 + 10 * 0.25 = 3.75 + 2.5 = 6.25 -> 6
        assert_eq!(calculate(status::TENDER_FLOATING, TENDER, 1000.0, 100.0, false, false), 6);
        // 10 * 0.75 + 20 * 0.25 = 7.5 + 5 = 12.5 -> 13
        assert_eq!(calculate(status::RFQ_PROCESS, RFQ, 1000.0, 200.0, false, false), 13);
    }

    #[test]
    fn test_blend_just_below_half_rounds_down() {
        // Blend lands just under 0.5, where `(x + 0.5).floor()` gives 1
        let blend = 49.999999999999994 / 2500.0 * 100.0 * FUND_WEIGHT;
        assert!(blend < 0.5);
        assert_eq!(calculate("nonsense", TENDER, 2500.0, 49.999999999999994, false, false), 0);
    }

    #[test]
    fn test_delayed_caps_at_base() {
        // Blend below base: cap does not bind
        assert_eq!(calculate(status::ONGOING, TENDER, 1000.0, 500.0, false, true), 54);
        // Full release: blend 66, capped to 55
        assert_eq!(calculate(status::ONGOING, TENDER, 1000.0, 1000.0, false, false), 66);
        assert_eq!(calculate(status::ONGOING, TENDER, 1000.0, 1000.0, false, true), 55);
    }

    #[test]
    fn test_over_release_is_capped() {
        let full = calculate(status::ONGOING, TENDER, 1000.0, 1000.0, false, false);
        assert_eq!(calculate(status::ONGOING, TENDER, 1000.0, 2500.0, false, false), full);
        assert_eq!(fund_ratio(1000.0, 2500.0), Some(1.0));
    }

    #[test]
    fn test_result_never_exceeds_bounds() {
        for s in [status::DONE, status::FINAL_BILLING, "x"] {
            for released in [0.0, 1.0, 999.0, 1e12] {
                let pct = calculate(s, TENDER, 1000.0, released, false, false);
                assert!(pct <= 100);
            }
        }
        assert_eq!(calculate(status::DONE, TENDER, 1000.0, 1000.0, false, false), 100);
    }

    #[test]
    fn test_non_finite_amounts_disable_blend() {
        assert_eq!(fund_ratio(f64::NAN, 10.0), None);
        assert_eq!(fund_ratio(1000.0, f64::INFINITY), None);
        assert_eq!(calculate(status::ONGOING, TENDER, f64::NAN, 500.0, false, false), 55);
    }

    #[test]
    fn test_negative_amounts_disable_blend() {
        assert_eq!(fund_ratio(-1000.0, 500.0), None);
        assert_eq!(fund_ratio(1000.0, -500.0), None);
    }

    #[test]
    fn test_method_labels_round_trip() {
        for m in ImplementationMethod::ALL {
            assert_eq!(ImplementationMethod::from_label(m.label()), Some(m));
        }
        assert_eq!(ImplementationMethod::from_label(""), None);
    }
}
