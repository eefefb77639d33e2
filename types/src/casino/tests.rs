use super::*;
use crate::fairness::verify_proof;

const EPSILON: f64 = 1e-6;

#[test]
fn test_win_probability_symmetry_at_seven() {
    assert!((win_probability(DicePrediction::Over, 7) - 15.0 / 36.0).abs() < EPSILON);
    assert!((win_probability(DicePrediction::Under, 7) - 15.0 / 36.0).abs() < EPSILON);
}

#[test]
fn test_impossible_targets_have_zero_multiplier() {
    assert_eq!(payout_multiplier(DicePrediction::Over, 12), 0.0);
    assert_eq!(payout_multiplier(DicePrediction::Under, 2), 0.0);
}

#[test]
fn test_multiplier_formula_for_possible_targets() {
    for target in DICE_MIN_TARGET..=DICE_MAX_TARGET {
        for prediction in [DicePrediction::Over, DicePrediction::Under] {
            let probability = win_probability(prediction, target);
            let multiplier = payout_multiplier(prediction, target);
            if probability == 0.0 {
                assert_eq!(multiplier, 0.0);
            } else {
                let fair = (1.0 / probability) * (1.0 - DICE_HOUSE_EDGE);
                let expected = (fair * 10_000.0).round() / 10_000.0;
                assert!(
                    (multiplier - expected).abs() < EPSILON,
                    "{prediction:?}/{target}: got {multiplier}, expected {expected}"
                );
            }
        }
    }
}

#[test]
fn test_under_seven_multiplier_value() {
    // 15/36 win probability: (36/15) * 0.98 = 2.352
    assert!((payout_multiplier(DicePrediction::Under, 7) - 2.352).abs() < EPSILON);
}

#[test]
fn test_dice_rejects_target_out_of_range() {
    for target in [0, 1, 13, 200] {
        let err = play_dice(&DiceRequest {
            prediction: DicePrediction::Over,
            target,
            bet: 0.5,
            client_seed: None,
        })
        .unwrap_err();
        assert!(matches!(err, GameError::TargetOutOfRange { .. }));
    }
}

#[test]
fn test_dice_outcome_consistency() {
    for _ in 0..200 {
        let result = play_dice(&DiceRequest {
            prediction: DicePrediction::Over,
            target: 7,
            bet: 0.5,
            client_seed: Some("seed".to_string()),
        })
        .unwrap();
        assert!((1..=6).contains(&result.roll[0]));
        assert!((1..=6).contains(&result.roll[1]));
        assert_eq!(result.total, result.roll[0] + result.roll[1]);
        assert_eq!(result.won, result.total > 7);
        if result.won {
            let expected = (0.5 * result.multiplier * 1_000_000.0).round() / 1_000_000.0;
            assert!((result.payout - expected).abs() < EPSILON);
        } else {
            assert_eq!(result.payout, 0.0);
        }
        assert!(verify_proof(&result.fairness_proof));
    }
}

#[test]
fn test_coinflip_payout_and_proof() {
    let mut wins = 0;
    for _ in 0..500 {
        let result = play_coinflip(&CoinflipRequest {
            choice: CoinSide::Heads,
            bet: 0.5,
            client_seed: None,
        });
        assert_eq!(result.multiplier, COINFLIP_MULTIPLIER);
        assert_eq!(result.won, result.result == result.choice);
        if result.won {
            wins += 1;
            assert!((result.payout - 0.98).abs() < EPSILON);
        } else {
            assert_eq!(result.payout, 0.0);
        }
        assert_eq!(result.fairness_proof.client_seed, "default");
        assert!(verify_proof(&result.fairness_proof));
    }
    // 500 fair flips landing all one way means the seed source is broken.
    assert!(wins > 0 && wins < 500);
}

#[test]
fn test_blackjack_hand_invariants() {
    for _ in 0..1000 {
        let result = play_blackjack(&BlackjackRequest {
            bet: 1.0,
            client_seed: None,
        });

        assert!(result.player_hand.len() >= 2);
        assert!(result.dealer_hand.len() >= 2);

        for card in result.player_hand.iter().chain(result.dealer_hand.iter()) {
            let expected = match card.rank {
                "J" | "Q" | "K" => 10,
                "A" => 11,
                numeral => numeral.parse().unwrap(),
            };
            assert_eq!(card.value, expected);
        }

        let expected_multiplier = match result.outcome {
            BlackjackOutcome::Win => 2.0,
            BlackjackOutcome::Lose => 0.0,
            BlackjackOutcome::Push => 1.0,
            BlackjackOutcome::Blackjack => 2.5,
        };
        assert_eq!(result.multiplier, expected_multiplier);
        assert!((result.payout - result.bet * expected_multiplier).abs() < EPSILON);

        if result.outcome != BlackjackOutcome::Lose {
            assert!(result.player_total <= 21);
        }

        assert!(verify_proof(&result.fairness_proof));
    }
}

#[test]
fn test_blackjack_totals_reduce_aces() {
    // A hand that busts with hard aces must be reported reduced.
    for _ in 0..1000 {
        let result = play_blackjack(&BlackjackRequest {
            bet: 0.5,
            client_seed: Some("ace-check".to_string()),
        });
        let raw: u16 = result
            .player_hand
            .iter()
            .map(|card| u16::from(card.value))
            .sum();
        assert!(u16::from(result.player_total) <= raw);
        // A bust total never exceeds 21 + the last drawn card's value.
        if result.player_total > 21 {
            assert!(result.player_total <= 21 + result.player_hand.last().unwrap().value);
        }
    }
}

#[test]
fn test_one_seed_pair_backs_all_draws_in_a_game() {
    let result = play_blackjack(&BlackjackRequest {
        bet: 0.5,
        client_seed: Some("replay".to_string()),
    });
    let proof = &result.fairness_proof;

    // Replaying the revealed seed material reproduces the exact hands.
    let mut index = 0u32;
    let mut replay = |count: usize| {
        let mut hand = Vec::with_capacity(count);
        for _ in 0..count {
            let r = crate::fairness::derive_uniform(
                &proof.server_seed,
                &proof.client_seed,
                &format!("{}:card{}r", proof.nonce, index),
            );
            let s = crate::fairness::derive_uniform(
                &proof.server_seed,
                &proof.client_seed,
                &format!("{}:card{}s", proof.nonce, index),
            );
            index += 1;
            hand.push((r, s));
        }
        hand
    };

    // Initial deal interleaves player/player/dealer/dealer.
    let first_four = replay(4);
    let ranks = [
        "2", "3", "4", "5", "6", "7", "8", "9", "10", "J", "Q", "K", "A",
    ];
    assert_eq!(
        result.player_hand[0].rank,
        ranks[(first_four[0].0 * 13.0) as usize]
    );
    assert_eq!(
        result.player_hand[1].rank,
        ranks[(first_four[1].0 * 13.0) as usize]
    );
    assert_eq!(
        result.dealer_hand[0].rank,
        ranks[(first_four[2].0 * 13.0) as usize]
    );
    assert_eq!(
        result.dealer_hand[1].rank,
        ranks[(first_four[3].0 * 13.0) as usize]
    );
}

#[test]
fn test_result_wire_shape() {
    let result = play_coinflip(&CoinflipRequest {
        choice: CoinSide::Tails,
        bet: 0.25,
        client_seed: Some("wire".to_string()),
    });
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["game"], "coinflip");
    assert!(json["result"] == "heads" || json["result"] == "tails");
    assert_eq!(json["choice"], "tails");
    assert!(json["fairness_proof"]["serverSeed"].is_string());
}
