//! Payload-id signer
//!
//! Certain POST endpoints (floorsheet, today-price) refuse requests unless
//! the body carries a numeric `id` derived from the day's market-status id,
//! the calendar day, a fixed lookup table the portal frontend embeds, and
//! one of the session salts. The derivation lives here as a pure function;
//! callers fetch the market-status id themselves and recompute the payload
//! id per request — it is never cached.

use crate::descramble::Salts;

/// The portal's embedded "dummy data" table, indexed by `base_id mod 100`
const DUMMY_DATA: [i64; 100] = [
    147, 117, 239, 143, 157, 312, 161, 612, 512, 804, 411, 527, 170, 511, 421, 667, 764, 621, 301, 106,
    133, 793, 411, 511, 312, 423, 344, 346, 653, 758, 342, 222, 236, 811, 711, 611, 122, 447, 128, 199,
    183, 135, 489, 703, 800, 745, 152, 863, 134, 211, 142, 564, 375, 793, 212, 153, 138, 153, 648, 611,
    151, 649, 318, 143, 117, 756, 119, 141, 717, 113, 112, 146, 162, 660, 693, 261, 362, 354, 251, 641,
    157, 178, 631, 192, 734, 445, 192, 883, 187, 122, 591, 731, 852, 384, 565, 596, 451, 772, 624, 691,
];

/// Market-status id assumed when the status response omits one
pub const DEFAULT_BASE_ID: i64 = 147;

/// Derive the payload id for a signed POST request
///
/// * `base_id` — the `id` field of a freshly fetched market-status response
/// * `day_of_month` — calendar day (1–31) of the business date the request
///   targets
/// * `salts` — the session salts from the last authenticate/refresh
///
/// The intermediate sum selects one of two salt pairs: positions (1, 0) when
/// its last digit is below 4, positions (3, 2) otherwise.
pub fn compute_payload_id(base_id: i64, day_of_month: u32, salts: &Salts) -> i64 {
    let day = i64::from(day_of_month);
    let e = DUMMY_DATA[base_id.rem_euclid(100) as usize] + base_id + 2 * day;
    let salt_index = if e.rem_euclid(10) < 4 { 1 } else { 3 };

    e + salts.get(salt_index) * day - salts.get(salt_index - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // table[47] = 863; e = 863 + 147 + 24 = 1034; 1034 % 10 = 4 selects
        // the (3, 2) pair: 1034 + 400 * 12 - 300 = 5534.
        let salts = Salts::new([100, 200, 300, 400, 500]);
        assert_eq!(compute_payload_id(147, 12, &salts), 5534);
    }

    #[test]
    fn test_low_digit_selects_first_salt_pair() {
        // base_id 0: table[0] = 147; e = 147 + 0 + 2 = 149; 149 % 10 = 9
        // selects (3, 2). base_id 1: table[1] = 117; e = 117 + 1 + 2 = 120;
        // 120 % 10 = 0 selects (1, 0): 120 + 200 * 1 - 100 = 220.
        let salts = Salts::new([100, 200, 300, 400, 500]);
        assert_eq!(compute_payload_id(1, 1, &salts), 220);
    }

    #[test]
    fn test_base_id_wraps_past_table_length() {
        let salts = Salts::new([1, 2, 3, 4, 5]);
        // 247 % 100 = 47 uses the same table entry as 147 with a different
        // base term.
        let wrapped = compute_payload_id(247, 12, &salts);
        let direct = compute_payload_id(147, 12, &salts);
        assert_eq!(wrapped - direct, 100);
    }

    #[test]
    fn test_table_shape() {
        assert_eq!(DUMMY_DATA.len(), 100);
        assert_eq!(DUMMY_DATA[0], DEFAULT_BASE_ID);
    }
}
