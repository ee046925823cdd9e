// ═══════════════════════════════════════════════════════════════════════
// Game setup — creates the initial GameState for N participants
//
// The map is rolled from the seed with ChaCha8, so the same setup always
// produces the same game. Capitals sit on fixed anchor points spread over
// the map and are always land.
// ═══════════════════════════════════════════════════════════════════════

use crate::config::RulesConfig;
use crate::economy::spawn_position;
use crate::error::ActionError;
use crate::grid::{HexGrid, Position};
use crate::types::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const MIN_PARTICIPANTS: usize = 2;
pub const MAX_PARTICIPANTS: usize = 8;
pub const MIN_SIDE: u32 = 8;

/// Capital anchors as (row, col) fractions of the map. Seat 0 and seat 1
/// face each other across the diagonal, later seats fill the gaps.
const ANCHORS: [(f64, f64); MAX_PARTICIPANTS] = [
    (0.2, 0.2),
    (0.8, 0.8),
    (0.2, 0.8),
    (0.8, 0.2),
    (0.2, 0.5),
    (0.8, 0.5),
    (0.5, 0.15),
    (0.5, 0.85),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSetup {
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    /// Seat order; seat 0 plays first.
    pub participants: Vec<(String, ParticipantKind)>,
    pub starting_stock: ResourceMap,
}

impl GameSetup {
    /// A 16×12 map with a modest starting stock.
    pub fn new(seed: u64, participants: Vec<(String, ParticipantKind)>) -> Self {
        let starting_stock = BTreeMap::from([
            (ResourceKind::Wheat, 20),
            (ResourceKind::Wood, 10),
            (ResourceKind::Stone, 10),
            (ResourceKind::Iron, 10),
        ]);
        GameSetup { width: 16, height: 12, seed, participants, starting_stock }
    }

    /// One human seat followed by `ai` AI seats.
    pub fn human_vs_ai(seed: u64, ai: usize) -> Self {
        let mut seats = vec![("Player".to_string(), ParticipantKind::Human)];
        seats.extend((1..=ai).map(|i| (format!("AI {i}"), ParticipantKind::Ai)));
        GameSetup::new(seed, seats)
    }

    fn validate(&self, rules: &RulesConfig) -> Result<(), ActionError> {
        let n = self.participants.len();
        if !(MIN_PARTICIPANTS..=MAX_PARTICIPANTS).contains(&n) {
            return Err(ActionError::InvalidInput(format!(
                "a game needs {MIN_PARTICIPANTS}..={MAX_PARTICIPANTS} participants, got {n}"
            )));
        }
        if self.width < MIN_SIDE || self.height < MIN_SIDE {
            return Err(ActionError::InvalidInput(format!(
                "map must be at least {MIN_SIDE}x{MIN_SIDE}, got {}x{}",
                self.width, self.height
            )));
        }
        if rules.unit(&rules.starting_unit).is_none() {
            return Err(ActionError::InvalidUnitType(rules.starting_unit.clone()));
        }
        Ok(())
    }
}

// ── Map generation ─────────────────────────────────────────────────────

fn roll_terrain(rng: &mut ChaCha8Rng) -> Terrain {
    match rng.gen_range(0..100) {
        0..=9 => Terrain::Water,
        10..=29 => Terrain::Forest,
        30..=44 => Terrain::Hills,
        _ => Terrain::Plains,
    }
}

fn roll_resource(terrain: Terrain, rng: &mut ChaCha8Rng) -> Option<TileResource> {
    if terrain == Terrain::Water || !rng.gen_bool(0.4) {
        return None;
    }
    let kind = match terrain {
        Terrain::Forest => ResourceKind::Wood,
        Terrain::Hills if rng.gen_bool(0.5) => ResourceKind::Stone,
        Terrain::Hills => ResourceKind::Iron,
        _ => ResourceKind::Wheat,
    };
    let capacity = rng.gen_range(20..=40);
    Some(TileResource { kind, amount: capacity, capacity })
}

fn generate_map(width: u32, height: u32, rng: &mut ChaCha8Rng) -> GameMap {
    let mut tiles = Vec::with_capacity((width * height) as usize);
    for row in 0..height as i32 {
        for col in 0..width as i32 {
            let terrain = roll_terrain(rng);
            let resource = roll_resource(terrain, rng);
            tiles.push(Tile {
                id: TileId(tiles.len() as u32),
                position: Position::new(row, col),
                terrain,
                resource,
            });
        }
    }
    GameMap { grid: HexGrid::new(width, height), tiles }
}

fn anchor(grid: &HexGrid, seat: usize) -> Position {
    let (fr, fc) = ANCHORS[seat];
    let row = ((grid.height - 1) as f64 * fr).round() as i32;
    let col = ((grid.width - 1) as f64 * fc).round() as i32;
    Position::new(row, col)
}

// ── Initial state ──────────────────────────────────────────────────────

pub fn create_initial_state(id: GameId, setup: &GameSetup, rules: &RulesConfig) -> Result<GameState, ActionError> {
    setup.validate(rules)?;
    let mut rng = ChaCha8Rng::seed_from_u64(setup.seed);
    let mut map = generate_map(setup.width, setup.height, &mut rng);

    let participants: Vec<Participant> = setup.participants.iter().enumerate()
        .map(|(i, (name, kind))| Participant {
            id: ParticipantId(i as u8),
            name: name.clone(),
            kind: *kind,
            eliminated: false,
        })
        .collect();

    // Capitals are land and keep any resource they rolled.
    let capitals: Vec<Position> = (0..participants.len()).map(|seat| anchor(&map.grid, seat)).collect();
    for pos in &capitals {
        if let Some(tile) = map.tile_id(*pos).and_then(|id| map.tile_mut(id)) {
            if tile.terrain == Terrain::Water {
                tile.terrain = Terrain::Plains;
            }
        }
    }

    let mut cities = BTreeMap::new();
    for (seat, p) in participants.iter().enumerate() {
        let pos = capitals[seat];
        let territory: BTreeSet<TileId> = std::iter::once(pos)
            .chain(map.grid.neighbors_in_bounds(pos))
            .filter(|p| map.is_passable(*p))
            .filter_map(|p| map.tile_id(p))
            .collect();
        let city = City {
            id: CityId(seat as u32),
            name: format!("{} Capital", p.name),
            owner: p.id,
            position: pos,
            hp: rules.city.max_hp,
            max_hp: rules.city.max_hp,
            base_defence: rules.city.base_defence,
            defence_bonus: 0,
            buildings: BTreeSet::new(),
            has_acted_this_turn: false,
            territory,
            stock: setup.starting_stock.clone(),
        };
        cities.insert(city.id, city);
    }

    let mut state = GameState {
        id,
        turn: 1,
        active: participants[0].id,
        turn_in_progress: false,
        status: GameStatus::Active,
        winner: None,
        seed: setup.seed,
        next_city_id: participants.len() as u32,
        participants,
        map,
        units: BTreeMap::new(),
        cities,
        next_unit_id: 0,
    };

    // Anchors keep cities apart, so a territory tile is never claimed twice.
    let claimed: Vec<(CityId, Vec<TileId>)> = state.cities.values()
        .map(|c| (c.id, c.territory.iter().copied().collect()))
        .collect();
    for (i, (city, tiles)) in claimed.iter().enumerate() {
        for (other, other_tiles) in &claimed[i + 1..] {
            if tiles.iter().any(|t| other_tiles.contains(t)) {
                return Err(ActionError::InvalidInput(format!(
                    "capitals of cities {} and {} overlap; use a larger map",
                    city.0, other.0
                )));
            }
        }
    }

    let starting_unit = rules.unit(&rules.starting_unit)
        .ok_or_else(|| ActionError::InvalidUnitType(rules.starting_unit.clone()))?;
    let seats: Vec<(ParticipantId, Position)> = state.cities.values().map(|c| (c.owner, c.position)).collect();
    for (owner, capital) in seats {
        let position = spawn_position(&state, capital).ok_or(ActionError::SpawnBlocked)?;
        let id = state.allocate_unit_id();
        state.units.insert(id, Unit {
            id,
            owner,
            unit_type: starting_unit.code.clone(),
            position,
            hp: starting_unit.max_hp,
            has_acted: false,
        });
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> std::sync::Arc<RulesConfig> {
        RulesConfig::builtin()
    }

    #[test]
    fn test_create_two_player_game() {
        let state = create_initial_state(GameId(1), &GameSetup::human_vs_ai(42, 1), &rules()).unwrap();
        assert_eq!(state.participants.len(), 2);
        assert_eq!(state.turn, 1);
        assert_eq!(state.active, ParticipantId(0));
        assert_eq!(state.status, GameStatus::Active);
        assert_eq!(state.cities.len(), 2);
        assert_eq!(state.units.len(), 2);
        assert_eq!(state.map.tiles.len(), 16 * 12);
    }

    #[test]
    fn test_capitals_are_land_with_bounded_territory() {
        for seed in 0..20 {
            let setup = GameSetup::new(seed, (0..8).map(|i| (format!("P{i}"), ParticipantKind::Ai)).collect());
            let state = create_initial_state(GameId(seed), &setup, &rules()).unwrap();
            for city in state.cities.values() {
                assert!(state.map.is_passable(city.position));
                assert!(city.territory.len() <= 7);
                let own = state.map.tile_id(city.position).unwrap();
                assert!(city.owns_tile(own));
            }
        }
    }

    #[test]
    fn test_starting_unit_on_capital() {
        let state = create_initial_state(GameId(1), &GameSetup::human_vs_ai(7, 3), &rules()).unwrap();
        for city in state.cities.values() {
            let unit = state.unit_at(city.position).unwrap();
            assert_eq!(unit.owner, city.owner);
            assert_eq!(unit.unit_type, "warrior");
            assert!(!unit.has_acted);
        }
    }

    #[test]
    fn test_deterministic_seed() {
        let setup = GameSetup::human_vs_ai(123, 2);
        let s1 = create_initial_state(GameId(1), &setup, &rules()).unwrap();
        let s2 = create_initial_state(GameId(1), &setup, &rules()).unwrap();
        assert_eq!(s1, s2);

        let s3 = create_initial_state(GameId(1), &GameSetup::human_vs_ai(124, 2), &rules()).unwrap();
        assert_ne!(s1.map, s3.map);
    }

    #[test]
    fn test_rejects_bad_setups() {
        let solo = GameSetup::new(1, vec![("Solo".into(), ParticipantKind::Human)]);
        assert!(matches!(create_initial_state(GameId(1), &solo, &rules()), Err(ActionError::InvalidInput(_))));

        let mut tiny = GameSetup::human_vs_ai(1, 1);
        tiny.width = 4;
        assert!(matches!(create_initial_state(GameId(1), &tiny, &rules()), Err(ActionError::InvalidInput(_))));
    }
}
