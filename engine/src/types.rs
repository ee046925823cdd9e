// ═══════════════════════════════════════════════════════════════════════
// Core types — the Game aggregate and the command vocabulary
//
// Everything is stored as flat, id-keyed collections. Relationships
// (unit → tile, city → territory) are id or position lookups, never
// references, so the whole aggregate is a plain serializable value.
// ═══════════════════════════════════════════════════════════════════════

use crate::grid::{HexGrid, Position};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ── Ids ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CityId(pub u32);

/// Index into `GameMap::tiles` (`row * width + col`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId(pub u32);

impl std::fmt::Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "game-{}", self.0)
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p{}", self.0)
    }
}

// ── Enums ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Wheat,
    Wood,
    Stone,
    Iron,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Wheat,
        ResourceKind::Wood,
        ResourceKind::Stone,
        ResourceKind::Iron,
    ];
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Wheat => write!(f, "wheat"),
            ResourceKind::Wood => write!(f, "wood"),
            ResourceKind::Stone => write!(f, "stone"),
            ResourceKind::Iron => write!(f, "iron"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    Plains,
    Forest,
    Hills,
    Water,
}

impl Terrain {
    pub fn is_passable(self) -> bool {
        self != Terrain::Water
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantKind {
    Human,
    Ai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameStatus {
    Active,
    Finished,
}

/// Resource amounts keyed by kind. Used for costs, stocks and turn totals.
pub type ResourceMap = BTreeMap<ResourceKind, u32>;

// ── Map ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileResource {
    pub kind: ResourceKind,
    /// Remaining amount; decreases on harvest.
    pub amount: u32,
    /// Regeneration ceiling.
    pub capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub id: TileId,
    pub position: Position,
    pub terrain: Terrain,
    pub resource: Option<TileResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMap {
    pub grid: HexGrid,
    /// Row-major; `tiles[id]` has `tiles[id].id == id`.
    pub tiles: Vec<Tile>,
}

impl GameMap {
    pub fn tile_id(&self, pos: Position) -> Option<TileId> {
        if !self.grid.in_bounds(pos) {
            return None;
        }
        Some(TileId(pos.row as u32 * self.grid.width + pos.col as u32))
    }

    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id.0 as usize)
    }

    pub fn tile_mut(&mut self, id: TileId) -> Option<&mut Tile> {
        self.tiles.get_mut(id.0 as usize)
    }

    pub fn tile_at(&self, pos: Position) -> Option<&Tile> {
        self.tile_id(pos).and_then(|id| self.tile(id))
    }

    /// In bounds and not water.
    pub fn is_passable(&self, pos: Position) -> bool {
        self.tile_at(pos).map_or(false, |t| t.terrain.is_passable())
    }
}

// ── Participants, units, cities ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub kind: ParticipantKind,
    pub eliminated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub owner: ParticipantId,
    /// Code into `RulesConfig::units`.
    pub unit_type: String,
    pub position: Position,
    pub hp: i32,
    pub has_acted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub id: CityId,
    pub name: String,
    pub owner: ParticipantId,
    pub position: Position,
    pub hp: i32,
    pub max_hp: i32,
    pub base_defence: i32,
    /// Extra defence granted by constructed buildings.
    pub defence_bonus: i32,
    pub buildings: BTreeSet<String>,
    pub has_acted_this_turn: bool,
    pub territory: BTreeSet<TileId>,
    pub stock: ResourceMap,
}

impl City {
    pub fn defence(&self) -> i32 {
        self.base_defence + self.defence_bonus
    }

    pub fn stock_of(&self, kind: ResourceKind) -> u32 {
        self.stock.get(&kind).copied().unwrap_or(0)
    }

    pub fn owns_tile(&self, tile: TileId) -> bool {
        self.territory.contains(&tile)
    }
}

// ── Game State ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub id: GameId,
    /// Starts at 1, only ever increases.
    pub turn: u32,
    pub active: ParticipantId,
    /// The turn guard. Set while the orchestrator is advancing the turn.
    pub turn_in_progress: bool,
    pub status: GameStatus,
    pub winner: Option<ParticipantId>,
    pub seed: u64,

    /// Ordered by id; turn rotation follows this order.
    pub participants: Vec<Participant>,
    pub map: GameMap,
    pub units: BTreeMap<UnitId, Unit>,
    pub cities: BTreeMap<CityId, City>,

    pub next_unit_id: u32,
    pub next_city_id: u32,
}

impl GameState {
    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn unit_at(&self, pos: Position) -> Option<&Unit> {
        self.units.values().find(|u| u.position == pos)
    }

    pub fn is_occupied(&self, pos: Position) -> bool {
        self.unit_at(pos).is_some()
    }

    /// A unit not owned by `viewer` stands on `pos`.
    pub fn enemy_unit_at(&self, pos: Position, viewer: ParticipantId) -> bool {
        self.unit_at(pos).map_or(false, |u| u.owner != viewer)
    }

    pub fn city_at(&self, pos: Position) -> Option<&City> {
        self.cities.values().find(|c| c.position == pos)
    }

    /// The city whose territory contains `tile`, if any.
    pub fn city_owning_tile(&self, tile: TileId) -> Option<&City> {
        self.cities.values().find(|c| c.owns_tile(tile))
    }

    pub fn cities_of(&self, owner: ParticipantId) -> impl Iterator<Item = &City> {
        self.cities.values().filter(move |c| c.owner == owner)
    }

    pub fn units_of(&self, owner: ParticipantId) -> impl Iterator<Item = &Unit> {
        self.units.values().filter(move |u| u.owner == owner)
    }

    pub fn allocate_unit_id(&mut self) -> UnitId {
        let id = UnitId(self.next_unit_id);
        self.next_unit_id += 1;
        id
    }
}

// ── Commands ───────────────────────────────────────────────────────────

/// Every state-changing request a participant (or the AI) can make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    MoveUnit { unit_id: UnitId, target: Position },
    AttackUnit { attacker: UnitId, target: UnitId },
    AttackCity { attacker: UnitId, target_city: CityId },
    SpawnUnit { city_id: CityId, unit_type: String },
    BuildBuilding { city_id: CityId, building: String },
    ExpandTerritory { city_id: CityId, target_tile: TileId },
    EndTurn,
}

/// The unit or city a command acts through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActorRef {
    Unit(UnitId),
    City(CityId),
}

impl Command {
    pub fn actor(&self) -> Option<ActorRef> {
        match self {
            Command::MoveUnit { unit_id, .. } => Some(ActorRef::Unit(*unit_id)),
            Command::AttackUnit { attacker, .. } | Command::AttackCity { attacker, .. } => {
                Some(ActorRef::Unit(*attacker))
            }
            Command::SpawnUnit { city_id, .. }
            | Command::BuildBuilding { city_id, .. }
            | Command::ExpandTerritory { city_id, .. } => Some(ActorRef::City(*city_id)),
            Command::EndTurn => None,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::MoveUnit { .. } => "move_unit",
            Command::AttackUnit { .. } => "attack_unit",
            Command::AttackCity { .. } => "attack_city",
            Command::SpawnUnit { .. } => "spawn_unit",
            Command::BuildBuilding { .. } => "build_building",
            Command::ExpandTerritory { .. } => "expand_territory",
            Command::EndTurn => "end_turn",
        }
    }
}

/// A command as it arrives from outside the core: the authenticated
/// caller, the payload and an optional client idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub caller: ParticipantId,
    pub command: Command,
    pub idempotency_key: Option<String>,
}
