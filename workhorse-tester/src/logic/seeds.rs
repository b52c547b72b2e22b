use anyhow::{Context, Result, bail};

/// Seeds the `sweep` keyword expands to; spread across the u64 range on purpose.
pub const SWEEP_SEEDS: [u64; 8] = [
    1,
    1337,
    0xBEEF,
    0x5EED_CAFE,
    0xDEAD_BEEF_0000,
    0x0123_4567_89AB_CDEF,
    u64::MAX / 3,
    u64::MAX - 1,
];

/// Resolve CLI seed tokens into concrete seeds.
///
/// Accepts decimal integers, `0x`-prefixed hex, and the keyword `sweep`.
/// Duplicates are dropped while keeping first-seen order.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<u64>> {
    let mut seeds: Vec<u64> = Vec::new();
    for token in tokens {
        let parsed = if token.eq_ignore_ascii_case("sweep") {
            SWEEP_SEEDS.to_vec()
        } else {
            vec![parse_seed(token)?]
        };
        for seed in parsed {
            if !seeds.contains(&seed) {
                seeds.push(seed);
            }
        }
    }
    if seeds.is_empty() {
        bail!("no seeds supplied");
    }
    Ok(seeds)
}

fn parse_seed(token: &str) -> Result<u64> {
    let token = token.replace('_', "");
    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16).with_context(|| format!("invalid hex seed '{token}'"));
    }
    token
        .parse::<u64>()
        .with_context(|| format!("invalid seed '{token}'"))
}
