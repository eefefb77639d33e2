use serde::Serialize;

use crate::fairness::{
    build_proof, derive_uniform, generate_nonce, generate_server_seed, FairnessProof,
    DEFAULT_CLIENT_SEED,
};

use super::{
    round_money, BLACKJACK_NATURAL_MULTIPLIER, BLACKJACK_PUSH_MULTIPLIER, BLACKJACK_STAND_TOTAL,
    BLACKJACK_WIN_MULTIPLIER,
};

const RANKS: [&str; 13] = [
    "2", "3", "4", "5", "6", "7", "8", "9", "10", "J", "Q", "K", "A",
];
const SUITS: [&str; 4] = ["♠", "♥", "♦", "♣"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Card {
    pub rank: &'static str,
    pub suit: &'static str,
    pub value: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlackjackOutcome {
    Win,
    Lose,
    Push,
    Blackjack,
}

#[derive(Clone, Debug)]
pub struct BlackjackRequest {
    pub bet: f64,
    pub client_seed: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BlackjackResult {
    pub game: &'static str,
    #[serde(rename = "playerHand")]
    pub player_hand: Vec<Card>,
    #[serde(rename = "dealerHand")]
    pub dealer_hand: Vec<Card>,
    #[serde(rename = "playerTotal")]
    pub player_total: u8,
    #[serde(rename = "dealerTotal")]
    pub dealer_total: u8,
    pub outcome: BlackjackOutcome,
    pub bet: f64,
    pub payout: f64,
    pub multiplier: f64,
    pub fairness_proof: FairnessProof,
}

fn card_value(rank: &str) -> u8 {
    match rank {
        "J" | "Q" | "K" => 10,
        "A" => 11,
        numeral => numeral.parse().unwrap_or(0),
    }
}

/// Hand total with aces reduced from 11 to 1 while the hand busts.
fn hand_total(hand: &[Card]) -> u8 {
    let mut total: u8 = hand.iter().map(|card| card.value).sum();
    let mut soft_aces = hand.iter().filter(|card| card.rank == "A").count();
    while total > 21 && soft_aces > 0 {
        total -= 10;
        soft_aces -= 1;
    }
    total
}

/// Draw one card from the infinite shoe.
///
/// Rank and suit come from separate draws keyed by the card index, so
/// every card is independent and indices are never reused in a game.
fn deal_card(server_seed: &str, client_seed: &str, nonce: &str, index: u32) -> Card {
    let r = derive_uniform(server_seed, client_seed, &format!("{nonce}:card{index}r"));
    let s = derive_uniform(server_seed, client_seed, &format!("{nonce}:card{index}s"));
    let rank = RANKS[(r * RANKS.len() as f64) as usize];
    let suit = SUITS[(s * SUITS.len() as f64) as usize];
    Card {
        rank,
        suit,
        value: card_value(rank),
    }
}

pub fn play_blackjack(request: &BlackjackRequest) -> BlackjackResult {
    let client_seed = request
        .client_seed
        .as_deref()
        .unwrap_or(DEFAULT_CLIENT_SEED);

    let server_seed = generate_server_seed();
    let nonce = generate_nonce();
    let mut card_index: u32 = 0;
    let mut deal = || {
        let card = deal_card(&server_seed, client_seed, &nonce, card_index);
        card_index += 1;
        card
    };

    let mut player_hand = vec![deal(), deal()];
    let mut dealer_hand = vec![deal(), deal()];

    let player_natural = hand_total(&player_hand) == 21;
    let dealer_natural = hand_total(&dealer_hand) == 21;

    let finish = |player_hand: Vec<Card>,
                  dealer_hand: Vec<Card>,
                  outcome: BlackjackOutcome,
                  multiplier: f64| {
        let player_total = hand_total(&player_hand);
        let dealer_total = hand_total(&dealer_hand);
        BlackjackResult {
            game: "blackjack",
            player_hand,
            dealer_hand,
            player_total,
            dealer_total,
            outcome,
            bet: request.bet,
            payout: round_money(request.bet * multiplier),
            multiplier,
            fairness_proof: build_proof(&server_seed, client_seed, &nonce),
        }
    };

    if player_natural || dealer_natural {
        let (outcome, multiplier) = if player_natural && dealer_natural {
            (BlackjackOutcome::Push, BLACKJACK_PUSH_MULTIPLIER)
        } else if player_natural {
            (BlackjackOutcome::Blackjack, BLACKJACK_NATURAL_MULTIPLIER)
        } else {
            (BlackjackOutcome::Lose, 0.0)
        };
        return finish(player_hand, dealer_hand, outcome, multiplier);
    }

    // Fixed strategy for both hands: hit below 17. There is no player
    // decision branch in this game.
    while hand_total(&player_hand) < BLACKJACK_STAND_TOTAL {
        player_hand.push(deal());
    }

    if hand_total(&player_hand) > 21 {
        // Player bust ends the hand; the dealer does not draw further.
        return finish(player_hand, dealer_hand, BlackjackOutcome::Lose, 0.0);
    }

    while hand_total(&dealer_hand) < BLACKJACK_STAND_TOTAL {
        dealer_hand.push(deal());
    }

    let player_total = hand_total(&player_hand);
    let dealer_total = hand_total(&dealer_hand);

    let (outcome, multiplier) = if dealer_total > 21 || player_total > dealer_total {
        (BlackjackOutcome::Win, BLACKJACK_WIN_MULTIPLIER)
    } else if player_total == dealer_total {
        (BlackjackOutcome::Push, BLACKJACK_PUSH_MULTIPLIER)
    } else {
        (BlackjackOutcome::Lose, 0.0)
    };

    finish(player_hand, dealer_hand, outcome, multiplier)
}
