//! Curve configuration builder: merges launch defaults with caller overrides
//! into a validated, wire-ready config.
//!
//! Pure computation — the activation timestamp is an explicit input, so
//! identical inputs always produce an identical configuration.

use serde::Deserialize;
use solana_sdk::{native_token::LAMPORTS_PER_SOL, pubkey::Pubkey};
use tknz_sdk::constants::MAX_SQRT_PRICE;
use tknz_sdk::dbc::{ConfigParameters, LiquidityPoint, PoolFeeParameters};

use crate::error::ApiError;

const Q64: f64 = 18_446_744_073_709_551_616.0; // 2^64

/// Caller-suppliable curve overrides. Only the fields listed here can be
/// overridden; anything else in the request is rejected by serde, never
/// spread blindly into the config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CurveOverrides {
    pub base_fee_bps: Option<u16>,
    pub dynamic_fee_bps: Option<u16>,
    pub collect_fee_mode: Option<u8>,
    pub activation_type: Option<u8>,
    pub activation_value: Option<u64>,
    pub migration_quote_threshold: Option<u64>,
    pub migration_option: Option<u8>,
    pub partner_lp_percentage: Option<u8>,
    pub partner_locked_lp_percentage: Option<u8>,
    pub creator_lp_percentage: Option<u8>,
    pub creator_locked_lp_percentage: Option<u8>,
    pub migration_fee_option: Option<u8>,
    pub token_type: Option<u8>,
    pub sqrt_start_price: Option<u128>,
    /// Replaces the default curve wholesale when non-empty.
    #[serde(default)]
    pub curve: Vec<CurveSegmentOverride>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CurveSegmentOverride {
    pub sqrt_price: u128,
    pub liquidity: u128,
}

/// Everything the builder needs, resolved by the handler beforehand.
pub struct CurveInputs {
    pub decimals: u8,
    /// Requested deposit in SOL; `None` means "use the configured minimum".
    pub requested_deposit_sol: Option<f64>,
    /// Starting price override in SOL per token.
    pub initial_price: Option<f64>,
    /// Explicit pool-seed token amount (UI units); overrides the
    /// deposit/price calculation.
    pub pool_supply: Option<u64>,
    pub activation_ts: i64,
    pub min_deposit_sol: f64,
    pub default_initial_price: f64,
    pub fee_claimer: Pubkey,
    pub leftover_receiver: Pubkey,
}

/// Builder output: wire parameters plus the derived amounts the assembler
/// and response both need.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveBuild {
    pub params: ConfigParameters,
    pub fee_claimer: Pubkey,
    pub leftover_receiver: Pubkey,
    pub effective_deposit_sol: f64,
    pub deposit_lamports: u64,
    pub pool_supply_ui: u64,
    pub pool_supply_raw: u128,
}

pub fn build_curve_config(
    inputs: &CurveInputs,
    overrides: &CurveOverrides,
) -> Result<CurveBuild, ApiError> {
    if inputs.decimals > 18 {
        return Err(ApiError::InvalidCurveConfig {
            field: "decimals",
            reason: format!("must be between 0 and 18, got {}", inputs.decimals),
        });
    }

    // Deposit floor: absent or below-minimum requests clamp up to the
    // configured minimum so micro-pools cannot be farmed.
    let effective_deposit_sol = inputs
        .requested_deposit_sol
        .unwrap_or(inputs.min_deposit_sol)
        .max(inputs.min_deposit_sol);
    if !(effective_deposit_sol > 0.0) {
        return Err(ApiError::InvalidCurveConfig {
            field: "amount",
            reason: "deposit must be greater than zero".to_string(),
        });
    }
    let deposit_lamports = (effective_deposit_sol * LAMPORTS_PER_SOL as f64).round() as u64;

    let initial_price = inputs.initial_price.unwrap_or(inputs.default_initial_price);
    if !(initial_price > 0.0) || !initial_price.is_finite() {
        return Err(ApiError::InvalidCurveConfig {
            field: "initialPrice",
            reason: "must be a positive finite number".to_string(),
        });
    }

    let pool_supply_ui = match inputs.pool_supply {
        Some(supply) => supply,
        None => (effective_deposit_sol / initial_price).floor() as u64,
    };
    let multiplier = 10u128
        .checked_pow(inputs.decimals as u32)
        .ok_or_else(|| ApiError::InvalidCurveConfig {
            field: "decimals",
            reason: "scale overflow".to_string(),
        })?;
    let pool_supply_raw = (pool_supply_ui as u128).checked_mul(multiplier).ok_or_else(|| {
        ApiError::InvalidCurveConfig {
            field: "poolSupply",
            reason: "raw pool supply overflows".to_string(),
        }
    })?;

    let sqrt_start_price = match overrides.sqrt_start_price {
        Some(p) => p,
        None => (initial_price.sqrt() * Q64) as u128,
    };

    let liquidity = pool_supply_raw
        .checked_shl(64)
        .filter(|l| *l >> 64 == pool_supply_raw)
        .ok_or_else(|| ApiError::InvalidCurveConfig {
            field: "poolSupply",
            reason: "liquidity overflows the fixed-point range".to_string(),
        })?;

    let curve = if overrides.curve.is_empty() {
        vec![LiquidityPoint {
            sqrt_price: MAX_SQRT_PRICE,
            liquidity,
        }]
    } else {
        overrides
            .curve
            .iter()
            .map(|s| LiquidityPoint {
                sqrt_price: s.sqrt_price,
                liquidity: s.liquidity,
            })
            .collect()
    };

    let migration_quote_threshold = match overrides.migration_quote_threshold {
        Some(t) => t,
        // Migrate only after volume reaches 100x the initial deposit.
        None => deposit_lamports.checked_mul(100).ok_or_else(|| {
            ApiError::InvalidCurveConfig {
                field: "migrationQuoteThreshold",
                reason: "threshold overflows".to_string(),
            }
        })?,
    };

    let params = ConfigParameters {
        pool_fees: PoolFeeParameters {
            base_fee_bps: overrides.base_fee_bps.unwrap_or(30),
            dynamic_fee_bps: overrides.dynamic_fee_bps.unwrap_or(10),
        },
        collect_fee_mode: overrides.collect_fee_mode.unwrap_or(0),
        activation_type: overrides.activation_type.unwrap_or(1),
        activation_value: overrides
            .activation_value
            .unwrap_or(inputs.activation_ts.max(0) as u64),
        migration_quote_threshold,
        migration_option: overrides.migration_option.unwrap_or(0),
        partner_lp_percentage: overrides.partner_lp_percentage.unwrap_or(5),
        partner_locked_lp_percentage: overrides.partner_locked_lp_percentage.unwrap_or(0),
        creator_lp_percentage: overrides.creator_lp_percentage.unwrap_or(95),
        creator_locked_lp_percentage: overrides.creator_locked_lp_percentage.unwrap_or(0),
        migration_fee_option: overrides.migration_fee_option.unwrap_or(2),
        token_type: overrides.token_type.unwrap_or(0),
        token_decimal: inputs.decimals,
        sqrt_start_price,
        curve,
    };

    validate(&params)?;

    Ok(CurveBuild {
        params,
        fee_claimer: inputs.fee_claimer,
        leftover_receiver: inputs.leftover_receiver,
        effective_deposit_sol,
        deposit_lamports,
        pool_supply_ui,
        pool_supply_raw,
    })
}

fn validate(params: &ConfigParameters) -> Result<(), ApiError> {
    let percentages: [(&'static str, u8); 4] = [
        ("partnerLpPercentage", params.partner_lp_percentage),
        ("partnerLockedLpPercentage", params.partner_locked_lp_percentage),
        ("creatorLpPercentage", params.creator_lp_percentage),
        ("creatorLockedLpPercentage", params.creator_locked_lp_percentage),
    ];
    for (field, value) in percentages {
        if value > 100 {
            return Err(ApiError::InvalidCurveConfig {
                field,
                reason: format!("must be within [0, 100], got {}", value),
            });
        }
    }

    if params.curve.is_empty() {
        return Err(ApiError::InvalidCurveConfig {
            field: "curve",
            reason: "at least one liquidity segment is required".to_string(),
        });
    }
    for pair in params.curve.windows(2) {
        if pair[1].sqrt_price <= pair[0].sqrt_price {
            return Err(ApiError::InvalidCurveConfig {
                field: "curve",
                reason: "segment sqrt prices must be strictly increasing".to_string(),
            });
        }
    }
    if params.sqrt_start_price > params.curve[0].sqrt_price {
        return Err(ApiError::InvalidCurveConfig {
            field: "sqrtStartPrice",
            reason: "starting price exceeds the first segment bound".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> CurveInputs {
        CurveInputs {
            decimals: 9,
            requested_deposit_sol: None,
            initial_price: None,
            pool_supply: None,
            activation_ts: 1_700_000_000,
            min_deposit_sol: 0.01,
            default_initial_price: 0.00001,
            fee_claimer: Pubkey::new_unique(),
            leftover_receiver: Pubkey::new_unique(),
        }
    }

    #[test]
    fn defaults_produce_a_single_segment_to_max_price() {
        let build = build_curve_config(&inputs(), &CurveOverrides::default()).unwrap();
        assert_eq!(build.deposit_lamports, 10_000_000); // 0.01 SOL
        assert_eq!(build.pool_supply_ui, 1000); // 0.01 / 0.00001
        assert_eq!(build.pool_supply_raw, 1000u128 * 1_000_000_000);
        assert_eq!(build.params.curve.len(), 1);
        assert_eq!(build.params.curve[0].sqrt_price, MAX_SQRT_PRICE);
        assert_eq!(build.params.migration_quote_threshold, 1_000_000_000);
        assert_eq!(build.params.pool_fees.base_fee_bps, 30);
    }

    #[test]
    fn below_minimum_deposit_is_clamped_up() {
        let mut i = inputs();
        i.requested_deposit_sol = Some(0.001);
        let build = build_curve_config(&i, &CurveOverrides::default()).unwrap();
        assert_eq!(build.effective_deposit_sol, 0.01);
    }

    #[test]
    fn pool_supply_override_wins_over_the_price_calculation() {
        let mut i = inputs();
        i.pool_supply = Some(42);
        let build = build_curve_config(&i, &CurveOverrides::default()).unwrap();
        assert_eq!(build.pool_supply_ui, 42);
    }

    #[test]
    fn builder_is_deterministic() {
        let i = inputs();
        let overrides = CurveOverrides {
            base_fee_bps: Some(25),
            curve: vec![
                CurveSegmentOverride {
                    sqrt_price: 1 << 70,
                    liquidity: 1 << 80,
                },
                CurveSegmentOverride {
                    sqrt_price: 1 << 80,
                    liquidity: 1 << 81,
                },
            ],
            ..CurveOverrides::default()
        };
        let a = build_curve_config(&i, &overrides).unwrap();
        let b = build_curve_config(&i, &overrides).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.params.pool_fees.base_fee_bps, 25);
        assert_eq!(a.params.curve.len(), 2);
    }

    #[test]
    fn non_monotonic_segments_are_rejected() {
        let overrides = CurveOverrides {
            curve: vec![
                CurveSegmentOverride {
                    sqrt_price: 1 << 80,
                    liquidity: 1,
                },
                CurveSegmentOverride {
                    sqrt_price: 1 << 70,
                    liquidity: 1,
                },
            ],
            ..CurveOverrides::default()
        };
        let err = build_curve_config(&inputs(), &overrides).unwrap_err();
        assert!(matches!(
            err,
            ApiError::InvalidCurveConfig { field: "curve", .. }
        ));
    }

    #[test]
    fn start_price_above_first_bound_is_rejected() {
        let overrides = CurveOverrides {
            sqrt_start_price: Some(1 << 90),
            curve: vec![CurveSegmentOverride {
                sqrt_price: 1 << 80,
                liquidity: 1,
            }],
            ..CurveOverrides::default()
        };
        let err = build_curve_config(&inputs(), &overrides).unwrap_err();
        assert!(matches!(
            err,
            ApiError::InvalidCurveConfig {
                field: "sqrtStartPrice",
                ..
            }
        ));
    }

    #[test]
    fn out_of_range_lp_percentage_names_the_field() {
        let overrides = CurveOverrides {
            creator_lp_percentage: Some(101),
            ..CurveOverrides::default()
        };
        let err = build_curve_config(&inputs(), &overrides).unwrap_err();
        assert!(matches!(
            err,
            ApiError::InvalidCurveConfig {
                field: "creatorLpPercentage",
                ..
            }
        ));
    }

    #[test]
    fn decimals_out_of_range_is_rejected() {
        let mut i = inputs();
        i.decimals = 19;
        assert!(build_curve_config(&i, &CurveOverrides::default()).is_err());
    }
}
