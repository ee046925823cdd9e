// ═══════════════════════════════════════════════════════════════════════
// State projection — the external snapshot format
//
// A snapshot is a read-only, self-contained copy of the Game aggregate in
// collection form. It is what every successful command returns, what
// readers see and what AI agents decide from. Collections are emitted in
// id order so identical states serialize to identical bytes.
// ═══════════════════════════════════════════════════════════════════════

use crate::config::RulesConfig;
use crate::grid::{HexGrid, Position};
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameView {
    pub id: GameId,
    pub turn: u32,
    pub active: ParticipantId,
    pub turn_in_progress: bool,
    pub status: GameStatus,
    pub winner: Option<ParticipantId>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileView {
    pub id: TileId,
    pub position: Position,
    pub terrain: Terrain,
    pub resource: Option<TileResource>,
    pub owner_city: Option<CityId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitView {
    pub id: UnitId,
    pub owner: ParticipantId,
    pub unit_type: String,
    pub position: Position,
    pub hp: i32,
    pub has_acted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityView {
    pub id: CityId,
    pub name: String,
    pub owner: ParticipantId,
    pub position: Position,
    pub hp: i32,
    pub max_hp: i32,
    pub defence: i32,
    pub has_acted_this_turn: bool,
    pub buildings: Vec<String>,
    pub territory: Vec<TileId>,
    pub stock: ResourceMap,
    /// What the next territory expansion would cost.
    pub expansion_cost: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub game: GameView,
    pub participants: Vec<Participant>,
    pub tiles: Vec<TileView>,
    pub units: Vec<UnitView>,
    pub cities: Vec<CityView>,
}

pub fn project(state: &GameState, rules: &RulesConfig) -> StateSnapshot {
    let tiles = state.map.tiles.iter()
        .map(|t| TileView {
            id: t.id,
            position: t.position,
            terrain: t.terrain,
            resource: t.resource,
            owner_city: state.city_owning_tile(t.id).map(|c| c.id),
        })
        .collect();

    let units = state.units.values()
        .map(|u| UnitView {
            id: u.id,
            owner: u.owner,
            unit_type: u.unit_type.clone(),
            position: u.position,
            hp: u.hp,
            has_acted: u.has_acted,
        })
        .collect();

    let cities = state.cities.values()
        .map(|c| CityView {
            id: c.id,
            name: c.name.clone(),
            owner: c.owner,
            position: c.position,
            hp: c.hp,
            max_hp: c.max_hp,
            defence: c.defence(),
            has_acted_this_turn: c.has_acted_this_turn,
            buildings: c.buildings.iter().cloned().collect(),
            territory: c.territory.iter().copied().collect(),
            stock: c.stock.clone(),
            expansion_cost: rules.expansion_cost(c.territory.len() as u32),
        })
        .collect();

    StateSnapshot {
        game: GameView {
            id: state.id,
            turn: state.turn,
            active: state.active,
            turn_in_progress: state.turn_in_progress,
            status: state.status,
            winner: state.winner,
            width: state.map.grid.width,
            height: state.map.grid.height,
        },
        participants: state.participants.clone(),
        tiles,
        units,
        cities,
    }
}

// ── Read helpers (used by agents and tests) ────────────────────────────

impl StateSnapshot {
    pub fn grid(&self) -> HexGrid {
        HexGrid::new(self.game.width, self.game.height)
    }

    pub fn tile_at(&self, pos: Position) -> Option<&TileView> {
        if !self.grid().in_bounds(pos) {
            return None;
        }
        self.tiles.get((pos.row as u32 * self.game.width + pos.col as u32) as usize)
    }

    pub fn is_passable(&self, pos: Position) -> bool {
        self.tile_at(pos).map_or(false, |t| t.terrain.is_passable())
    }

    pub fn unit(&self, id: UnitId) -> Option<&UnitView> {
        self.units.iter().find(|u| u.id == id)
    }

    pub fn unit_at(&self, pos: Position) -> Option<&UnitView> {
        self.units.iter().find(|u| u.position == pos)
    }

    pub fn city(&self, id: CityId) -> Option<&CityView> {
        self.cities.iter().find(|c| c.id == id)
    }

    pub fn units_of(&self, owner: ParticipantId) -> impl Iterator<Item = &UnitView> {
        self.units.iter().filter(move |u| u.owner == owner)
    }

    pub fn cities_of(&self, owner: ParticipantId) -> impl Iterator<Item = &CityView> {
        self.cities.iter().filter(move |c| c.owner == owner)
    }
}
