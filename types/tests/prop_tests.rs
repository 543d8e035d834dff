use proptest::prelude::*;

use brvs_types::{AccountId, Amount, TxHash, Verdict};

proptest! {
    /// TxHash survives its hex rendering, which is how it appears in logs and APIs.
    #[test]
    fn tx_hash_hex_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let hash = TxHash::new(bytes);
        let parsed: TxHash = hash.to_string().parse().unwrap();
        prop_assert_eq!(parsed, hash);
        prop_assert_eq!(hash.is_zero(), bytes == [0u8; 32]);
    }

    /// Exactly one separator with non-empty sides parses.
    #[test]
    fn account_id_requires_name_and_domain(name in "[a-z_]{0,8}", domain in "[a-z]{0,8}") {
        let parsed = AccountId::parse(format!("{name}@{domain}"));
        prop_assert_eq!(parsed.is_ok(), !name.is_empty() && !domain.is_empty());
        if let Ok(id) = parsed {
            prop_assert_eq!(id.name(), name.as_str());
            prop_assert_eq!(id.domain(), domain.as_str());
        }
    }

    /// Trailing fractional zeros change neither equality nor ordering.
    #[test]
    fn amount_scale_does_not_affect_value(units in 0u64..10_000_000, zeros in 0usize..6) {
        let plain = Amount::from_units(u128::from(units));
        let padded = if zeros == 0 {
            Amount::parse(&units.to_string()).unwrap()
        } else {
            Amount::parse(&format!("{units}.{}", "0".repeat(zeros))).unwrap()
        };
        prop_assert_eq!(plain, padded);
        prop_assert!(padded < Amount::from_units(u128::from(units) + 1));
    }

    /// Adding then subtracting the same amount is the identity.
    #[test]
    fn amount_add_sub_inverse(a in 0u64..1_000_000, cents in 0u32..100) {
        let base = Amount::from_units(u128::from(a));
        let delta = Amount::parse(&format!("0.{cents:02}")).unwrap();
        let sum = base.checked_add(delta).unwrap();
        prop_assert!(sum >= base);
        prop_assert_eq!(sum.checked_sub(delta).unwrap(), base);
    }

    /// Only `pending` is non-terminal, and only rejected/failed carry a reason.
    #[test]
    fn verdict_terminality(reason in ".{0,16}", pick in 0u8..4) {
        let verdict = match pick {
            0 => Verdict::Pending,
            1 => Verdict::Validated,
            2 => Verdict::Rejected(reason.clone()),
            _ => Verdict::Failed(reason.clone()),
        };
        prop_assert_eq!(verdict.is_terminal(), pick != 0);
        prop_assert_eq!(verdict.is_rejected_or_failed(), pick >= 2);
        prop_assert_eq!(verdict.reason().is_some(), pick >= 2);
    }
}
