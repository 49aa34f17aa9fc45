//! Word pairs, join codes and role/turn-order assignment.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::types::{Player, PlayerId, Role, SessionConfig};

#[derive(Debug, Clone, Copy)]
pub struct WordPair {
    pub civilian: &'static str,
    pub undercover: &'static str,
}

/// Built-in word pairs, used when the caller does not supply one.
pub const WORD_PAIRS: &[WordPair] = &[
    WordPair { civilian: "Lion", undercover: "Tigre" },
    WordPair { civilian: "Pizza", undercover: "Tarte flambée" },
    WordPair { civilian: "Plage", undercover: "Piscine" },
    WordPair { civilian: "Chat", undercover: "Lynx" },
    WordPair { civilian: "Cinéma", undercover: "Théâtre" },
    WordPair { civilian: "Café", undercover: "Thé" },
    WordPair { civilian: "Soleil", undercover: "Lampe" },
    WordPair { civilian: "Voiture", undercover: "Moto" },
    WordPair { civilian: "Pomme", undercover: "Poire" },
    WordPair { civilian: "Livre", undercover: "Magazine" },
    WordPair { civilian: "Football", undercover: "Rugby" },
    WordPair { civilian: "Piano", undercover: "Synthétiseur" },
    WordPair { civilian: "Prison", undercover: "Hôpital" },
    WordPair { civilian: "Mariage", undercover: "PACS" },
    WordPair { civilian: "Avion", undercover: "Hélicoptère" },
    WordPair { civilian: "Paris", undercover: "Lyon" },
    WordPair { civilian: "Chocolat", undercover: "Caramel" },
    WordPair { civilian: "Noël", undercover: "Pâques" },
    WordPair { civilian: "Vampire", undercover: "Zombie" },
    WordPair { civilian: "Guitare", undercover: "Ukulélé" },
];

pub fn random_word_pair() -> WordPair {
    let mut rng = rand::rng();
    WORD_PAIRS[rng.random_range(0..WORD_PAIRS.len())]
}

/// Generate a 6-digit join code.
pub fn generate_join_code() -> String {
    let mut rng = rand::rng();
    rng.random_range(100_000..1_000_000u32).to_string()
}

/// Most undercovers a game of this size supports.
pub fn max_undercovers(player_count: usize) -> u32 {
    match player_count {
        0..=3 => 1,
        4..=6 => 2,
        7..=9 => 3,
        n => (n / 3) as u32,
    }
}

/// Most mister whites a game of this size supports, given the undercovers.
pub fn max_mister_whites(player_count: usize, undercover_count: u32) -> u32 {
    let remaining = player_count.saturating_sub(undercover_count as usize);
    if remaining <= 3 {
        0
    } else {
        1
    }
}

/// Check that the configured role counts make sense for this many players.
pub fn validate_counts(config: &SessionConfig, player_count: usize) -> Result<(), String> {
    let infiltrators = config.undercover_count + config.mister_white_count;
    if config.undercover_count == 0 {
        return Err("at least one undercover is required".into());
    }
    if config.undercover_count > max_undercovers(player_count) {
        return Err(format!(
            "{} players support at most {} undercover(s)",
            player_count,
            max_undercovers(player_count)
        ));
    }
    if config.mister_white_count > max_mister_whites(player_count, config.undercover_count) {
        return Err(format!(
            "{} players with {} undercover(s) support at most {} mister white(s)",
            player_count,
            config.undercover_count,
            max_mister_whites(player_count, config.undercover_count)
        ));
    }
    let civilians = player_count as u32 - infiltrators;
    if civilians <= infiltrators {
        return Err("civilians must outnumber infiltrators at the start".into());
    }
    Ok(())
}

/// Roles, words and turn order for a starting session.
#[derive(Debug, Clone)]
pub struct RoleAssignment {
    /// (player, role, secret word) — mister white gets no word.
    pub roles: Vec<(PlayerId, Role, Option<String>)>,
    pub turn_order: Vec<PlayerId>,
    pub civilian_word: String,
    pub undercover_word: String,
}

/// Shuffle the players and hand out roles per the config, then build a turn
/// order that weights civilians toward the front and never lets mister white
/// open the game.
pub fn assign_roles(players: &[Player], config: &SessionConfig) -> RoleAssignment {
    let pair = random_word_pair();
    let mut rng = rand::rng();

    let mut shuffled: Vec<&Player> = players.iter().collect();
    shuffled.shuffle(&mut rng);

    let whites = config.mister_white_count as usize;
    let undercovers = config.undercover_count as usize;
    let roles: Vec<(PlayerId, Role, Option<String>)> = shuffled
        .iter()
        .enumerate()
        .map(|(i, p)| {
            if i < whites {
                (p.id.clone(), Role::MisterWhite, None)
            } else if i < whites + undercovers {
                (
                    p.id.clone(),
                    Role::Undercover,
                    Some(pair.undercover.to_string()),
                )
            } else {
                (p.id.clone(), Role::Civilian, Some(pair.civilian.to_string()))
            }
        })
        .collect();

    let turn_order = generate_turn_order(&roles);

    RoleAssignment {
        roles,
        turn_order,
        civilian_word: pair.civilian.to_string(),
        undercover_word: pair.undercover.to_string(),
    }
}

fn shuffled_group<'a>(
    roles: &'a [(PlayerId, Role, Option<String>)],
    role: Role,
    rng: &mut impl Rng,
) -> Vec<&'a PlayerId> {
    let mut members: Vec<&PlayerId> = roles
        .iter()
        .filter(|(_, r, _)| *r == role)
        .map(|(id, _, _)| id)
        .collect();
    members.shuffle(rng);
    members
}

fn generate_turn_order(roles: &[(PlayerId, Role, Option<String>)]) -> Vec<PlayerId> {
    let mut rng = rand::rng();

    let civilians = shuffled_group(roles, Role::Civilian, &mut rng);
    let undercovers = shuffled_group(roles, Role::Undercover, &mut rng);
    let whites = shuffled_group(roles, Role::MisterWhite, &mut rng);

    // Interleave by weight so the order is not an obvious role pattern, while
    // civilians lean toward the front and mister white can never speak first.
    let mut weighted: Vec<(&PlayerId, f64)> = Vec::with_capacity(roles.len());
    for (i, id) in civilians.iter().enumerate() {
        weighted.push((id, i as f64));
    }
    for (i, id) in undercovers.iter().enumerate() {
        weighted.push((id, civilians.len() as f64 * 0.5 + i as f64 * 1.2));
    }
    for (i, id) in whites.iter().enumerate() {
        weighted.push((id, 999.0 + i as f64));
    }

    weighted.sort_by(|a, b| a.1.total_cmp(&b.1));
    weighted.into_iter().map(|(id, _)| id.clone()).collect()
}
