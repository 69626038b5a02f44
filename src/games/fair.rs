//! Provably-fair outcome derivation
//!
//! Commit-reveal scheme: the server publishes `sha256(server_seed)` up
//! front and every outcome is `HMAC-SHA256(server_seed, game_message)`
//! over the player's `(client_seed, nonce)`. Anyone holding a revealed
//! seed can re-derive any outcome it minted; [`FairRng::verify`] is that
//! re-derivation and never consults server state.

use crate::games::types::GameType;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::RwLock;

type HmacSha256 = Hmac<Sha256>;

/// Bits of the HMAC consumed by the crash curve (13 hex chars).
const CRASH_HASH_BITS: u32 = 52;

/// Fair-RNG engine holding the current server seed.
///
/// Rotation swaps the seed for *future* games only; sessions freeze the
/// seed they were minted under.
pub struct FairRng {
    server_seed: RwLock<String>,
    house_edge: f64,
}

/// Outcome of a pure re-derivation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VerifiedOutcome {
    pub game_type: GameType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_point: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mine_positions: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll: Option<u8>,
    pub calculated_hash: String,
}

impl FairRng {
    pub fn new(server_seed: String, house_edge: f64) -> Self {
        Self {
            server_seed: RwLock::new(server_seed),
            house_edge,
        }
    }

    /// Engine with a freshly generated 32-byte seed.
    pub fn generate(house_edge: f64) -> Self {
        Self::new(generate_server_seed(), house_edge)
    }

    /// Current seed, for freezing into a session record.
    pub fn current_seed(&self) -> String {
        self.server_seed.read().expect("seed lock poisoned").clone()
    }

    /// Public commitment to the current seed.
    pub fn server_hash(&self) -> String {
        commitment(&self.current_seed())
    }

    /// Swap in a new seed. Prior sessions stay verifiable because each
    /// record froze the seed it was minted under.
    pub fn rotate(&self, new_seed: String) {
        *self.server_seed.write().expect("seed lock poisoned") = new_seed;
    }

    /// Crash point and full HMAC for `(client_seed, nonce)`.
    pub fn crash_outcome(&self, client_seed: &str, nonce: i64) -> (f64, String) {
        let hash = hmac_hex(&self.current_seed(), &crash_message(client_seed, nonce));
        (crash_point_from_hash(&hash, self.house_edge), hash)
    }

    /// Distinct mine positions and full HMAC for `(client_seed, nonce)`.
    pub fn mines_outcome(
        &self,
        client_seed: &str,
        nonce: i64,
        mine_count: usize,
        grid_size: usize,
    ) -> (Vec<u8>, String) {
        let hash = hmac_hex(&self.current_seed(), &mines_message(client_seed, nonce));
        (mines_from_hash(&hash, mine_count, grid_size), hash)
    }

    /// Dice roll in [0, 99] and full HMAC for `(client_seed, nonce)`.
    pub fn dice_outcome(&self, client_seed: &str, nonce: i64) -> (u8, String) {
        let hash = hmac_hex(&self.current_seed(), &dice_message(client_seed, nonce));
        (dice_roll_from_hash(&hash), hash)
    }

    /// Re-derive an outcome from caller-supplied material. Pure: any
    /// `(server_seed, client_seed, nonce)` triple works, including seeds
    /// rotated out long ago.
    pub fn verify(
        server_seed: &str,
        client_seed: &str,
        nonce: i64,
        game_type: GameType,
        house_edge: f64,
    ) -> VerifiedOutcome {
        match game_type {
            GameType::Crash => {
                let hash = hmac_hex(server_seed, &crash_message(client_seed, nonce));
                VerifiedOutcome {
                    game_type,
                    crash_point: Some(crash_point_from_hash(&hash, house_edge)),
                    mine_positions: None,
                    roll: None,
                    calculated_hash: hash,
                }
            }
            GameType::Mines => {
                let hash = hmac_hex(server_seed, &mines_message(client_seed, nonce));
                VerifiedOutcome {
                    game_type,
                    crash_point: None,
                    mine_positions: Some(mines_from_hash(&hash, 3, 25)),
                    roll: None,
                    calculated_hash: hash,
                }
            }
            GameType::Dice => {
                let hash = hmac_hex(server_seed, &dice_message(client_seed, nonce));
                VerifiedOutcome {
                    game_type,
                    crash_point: None,
                    mine_positions: None,
                    roll: Some(dice_roll_from_hash(&hash)),
                    calculated_hash: hash,
                }
            }
        }
    }
}

/// 32 random bytes, hex-encoded.
pub fn generate_server_seed() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// `sha256(server_seed)` as lowercase hex — the published commitment.
pub fn commitment(server_seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(server_seed.as_bytes());
    hex::encode(hasher.finalize())
}

fn crash_message(client_seed: &str, nonce: i64) -> String {
    format!("{}:{}", client_seed, nonce)
}

fn mines_message(client_seed: &str, nonce: i64) -> String {
    format!("mines:{}:{}", client_seed, nonce)
}

fn dice_message(client_seed: &str, nonce: i64) -> String {
    format!("dice:{}:{}", client_seed, nonce)
}

fn hmac_hex(server_seed: &str, message: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(server_seed.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Standard crash formula over the first 52 bits of the HMAC:
/// `floor(100 * (1 - edge) / (1 - r)) / 100`, clamped to [1.00, 1000.00].
fn crash_point_from_hash(hash: &str, house_edge: f64) -> f64 {
    let n = u64::from_str_radix(&hash[..13], 16).expect("hex HMAC prefix");
    let rand_float = n as f64 / 2f64.powi(CRASH_HASH_BITS as i32);

    let crash_point = (100.0 * (1.0 - house_edge) / (1.0 - rand_float)).floor() / 100.0;

    crash_point.clamp(1.0, 1000.0)
}

/// Mine layout derivation.
///
/// Positions come from the ASCII byte values of consecutive hex-character
/// pairs (`val = b(2i)*16 + b(2i+1)`), not from the decoded hash bytes.
/// That quirk is load-bearing: published verifiers reproduce it, so it
/// stays.
fn mines_from_hash(hash: &str, mine_count: usize, grid_size: usize) -> Vec<u8> {
    let bytes = hash.as_bytes();
    let mut positions = Vec::with_capacity(mine_count);
    let mut used = vec![false; grid_size];

    for i in 0..mine_count {
        let val = bytes[i * 2] as usize * 16 + bytes[i * 2 + 1] as usize;
        let mut pos = val % grid_size;

        while used[pos] {
            pos = (pos + 1) % grid_size;
        }

        positions.push(pos as u8);
        used[pos] = true;
    }

    positions
}

/// Dice roll from the ASCII byte value of the first hex character.
/// Same compatibility constraint as the mine layout.
fn dice_roll_from_hash(hash: &str) -> u8 {
    hash.as_bytes()[0] % 100
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUSE_EDGE: f64 = 0.01;

    fn fixed_rng() -> FairRng {
        FairRng::new(
            "1f7a9b3c5d8e2f406a1b3c5d7e9f0a2b4c6d8e0f1a3b5c7d9e1f3a5b7c9d0e2f".to_string(),
            HOUSE_EDGE,
        )
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let rng = fixed_rng();

        let (cp1, h1) = rng.crash_outcome("aabbccdd", 7);
        let (cp2, h2) = rng.crash_outcome("aabbccdd", 7);
        assert_eq!(cp1, cp2);
        assert_eq!(h1, h2);

        let (mines1, _) = rng.mines_outcome("aabbccdd", 7, 3, 25);
        let (mines2, _) = rng.mines_outcome("aabbccdd", 7, 3, 25);
        assert_eq!(mines1, mines2);

        assert_eq!(rng.dice_outcome("aabbccdd", 7), rng.dice_outcome("aabbccdd", 7));
    }

    #[test]
    fn test_nonce_changes_outcome_hash() {
        let rng = fixed_rng();
        let (_, h0) = rng.crash_outcome("seed", 0);
        let (_, h1) = rng.crash_outcome("seed", 1);
        assert_ne!(h0, h1);
    }

    #[test]
    fn test_crash_point_range_and_precision() {
        let rng = fixed_rng();

        for nonce in 0..200 {
            let (cp, _) = rng.crash_outcome("range-check", nonce);
            assert!((1.0..=1000.0).contains(&cp), "crash point {} out of range", cp);

            // At most two decimal digits.
            let scaled = cp * 100.0;
            assert!((scaled - scaled.round()).abs() < 1e-9, "crash point {} not truncated", cp);
        }
    }

    #[test]
    fn test_crash_point_clamps() {
        // r ~ 1 explodes the curve; clamp to the table maximum.
        let high = "f".repeat(64);
        assert_eq!(crash_point_from_hash(&high, HOUSE_EDGE), 1000.0);

        // r = 0 gives 0.99, below the floor.
        let low = "0".repeat(64);
        assert_eq!(crash_point_from_hash(&low, HOUSE_EDGE), 1.0);
    }

    #[test]
    fn test_mines_are_distinct_and_in_range() {
        let rng = fixed_rng();

        for nonce in 0..100 {
            let (mines, _) = rng.mines_outcome("layout-check", nonce, 3, 25);
            assert_eq!(mines.len(), 3);
            assert!(mines.iter().all(|&p| p < 25));

            let mut unique = mines.clone();
            unique.sort_unstable();
            unique.dedup();
            assert_eq!(unique.len(), 3, "duplicate mine in {:?}", mines);
        }
    }

    #[test]
    fn test_mines_linear_probe_on_collision() {
        // Every pair derives the same value, so positions probe 0, 1, 2.
        let colliding = "0".repeat(64);
        let mines = mines_from_hash(&colliding, 3, 25);
        let base = (b'0' as usize * 16 + b'0' as usize) % 25;
        assert_eq!(
            mines,
            vec![base as u8, (base + 1) as u8 % 25, (base + 2) as u8 % 25]
        );
    }

    #[test]
    fn test_dice_roll_uses_ascii_byte() {
        // '0' = 48, 'a' = 97: the roll is the character's byte value mod 100.
        assert_eq!(dice_roll_from_hash(&"0".repeat(64)), 48);
        assert_eq!(dice_roll_from_hash(&"a".repeat(64)), 97);

        let rng = fixed_rng();
        for nonce in 0..100 {
            let (roll, _) = rng.dice_outcome("roll-check", nonce);
            assert!(roll < 100);
        }
    }

    #[test]
    fn test_verify_reproduces_generation() {
        let rng = fixed_rng();
        let seed = rng.current_seed();

        let (cp, hash) = rng.crash_outcome("client", 3);
        let verified = FairRng::verify(&seed, "client", 3, GameType::Crash, HOUSE_EDGE);
        assert_eq!(verified.crash_point, Some(cp));
        assert_eq!(verified.calculated_hash, hash);

        let (mines, mines_hash) = rng.mines_outcome("client", 3, 3, 25);
        let verified = FairRng::verify(&seed, "client", 3, GameType::Mines, HOUSE_EDGE);
        assert_eq!(verified.mine_positions, Some(mines));
        assert_eq!(verified.calculated_hash, mines_hash);

        let (roll, dice_hash) = rng.dice_outcome("client", 3);
        let verified = FairRng::verify(&seed, "client", 3, GameType::Dice, HOUSE_EDGE);
        assert_eq!(verified.roll, Some(roll));
        assert_eq!(verified.calculated_hash, dice_hash);
    }

    #[test]
    fn test_rotation_changes_commitment_not_history() {
        let rng = fixed_rng();
        let old_seed = rng.current_seed();
        let old_hash = rng.server_hash();
        let (cp, _) = rng.crash_outcome("client", 11);

        rng.rotate(generate_server_seed());
        assert_ne!(rng.server_hash(), old_hash);

        // The old outcome is still reproducible from the frozen seed.
        let verified = FairRng::verify(&old_seed, "client", 11, GameType::Crash, HOUSE_EDGE);
        assert_eq!(verified.crash_point, Some(cp));
    }

    #[test]
    fn test_commitment_is_sha256_of_seed() {
        let rng = fixed_rng();
        let hash = rng.server_hash();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, commitment(&rng.current_seed()));
    }
}
