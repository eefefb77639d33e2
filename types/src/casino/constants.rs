/// Coinflip payout multiplier (2% house edge on a fair 2x).
pub const COINFLIP_MULTIPLIER: f64 = 1.96;

/// House edge applied to dice payout multipliers.
pub const DICE_HOUSE_EDGE: f64 = 0.02;

/// Dice target bounds (2d6 totals).
pub const DICE_MIN_TARGET: u8 = 2;
pub const DICE_MAX_TARGET: u8 = 12;

/// Blackjack payout multipliers.
pub const BLACKJACK_WIN_MULTIPLIER: f64 = 2.0;
pub const BLACKJACK_PUSH_MULTIPLIER: f64 = 1.0;
/// Natural blackjack pays 3:2.
pub const BLACKJACK_NATURAL_MULTIPLIER: f64 = 2.5;

/// Fixed hit threshold for both hands (hit below, stand at or above).
pub const BLACKJACK_STAND_TOTAL: u8 = 17;

/// Bet bounds per game, in whole asset units (USDC).
pub const COINFLIP_MIN_BET: f64 = 0.01;
pub const COINFLIP_MAX_BET: f64 = 1.0;
pub const DICE_MIN_BET: f64 = 0.01;
pub const DICE_MAX_BET: f64 = 1.0;
pub const BLACKJACK_MIN_BET: f64 = 0.1;
pub const BLACKJACK_MAX_BET: f64 = 5.0;
