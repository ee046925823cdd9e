// ═══════════════════════════════════════════════════════════════════════
// Combat resolution — unit vs unit and unit vs city
//
// Damage dealt = max(0, attack − receiver's defence).
// Ranged attackers are never countered. Melee attacks are a
// simultaneous exchange: both sides take damage from the same
// resolution, so both may be destroyed at once.
// ═══════════════════════════════════════════════════════════════════════

use crate::config::UnitDefinition;
use crate::error::ActionError;
use crate::grid::{distance, in_range, Position};

/// The numbers combat needs from either side of an attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Combatant {
    pub attack: i32,
    pub defence: i32,
    pub hp: i32,
}

impl Combatant {
    pub fn unit(def: &UnitDefinition, hp: i32) -> Self {
        Combatant { attack: def.attack, defence: def.defence, hp }
    }

    /// Cities have no attack of their own; their defence includes
    /// building bonuses.
    pub fn city(defence: i32, hp: i32) -> Self {
        Combatant { attack: 0, defence, hp }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackOutcome {
    pub damage_to_target: i32,
    pub damage_to_attacker: i32,
    pub target_hp: i32,
    pub attacker_hp: i32,
}

impl AttackOutcome {
    pub fn target_destroyed(&self) -> bool {
        self.target_hp <= 0
    }

    pub fn attacker_destroyed(&self) -> bool {
        self.attacker_hp <= 0
    }
}

pub fn damage(attack: i32, defence: i32) -> i32 {
    (attack - defence).max(0)
}

/// Resolve one attack. `ranged` is the attacker's ranged flag.
pub fn resolve_attack(attacker: Combatant, target: Combatant, ranged: bool) -> AttackOutcome {
    let damage_to_target = damage(attacker.attack, target.defence);
    let damage_to_attacker = if ranged {
        0
    } else {
        damage(target.attack, attacker.defence)
    };
    AttackOutcome {
        damage_to_target,
        damage_to_attacker,
        target_hp: target.hp - damage_to_target,
        attacker_hp: attacker.hp - damage_to_attacker,
    }
}

/// Check that `target` is inside the attacker's strike range.
pub fn check_range(def: &UnitDefinition, from: Position, target: Position) -> Result<(), ActionError> {
    let (min, max) = def.attack_range();
    if !in_range(from, target, min, max) {
        return Err(ActionError::OutOfRange { distance: distance(from, target), min, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RulesConfig;

    #[test]
    fn melee_exchange_is_simultaneous() {
        let a = Combatant { attack: 14, defence: 6, hp: 30 };
        let b = Combatant { attack: 12, defence: 3, hp: 20 };
        let out = resolve_attack(a, b, false);
        assert_eq!(out.damage_to_target, 11);
        assert_eq!(out.damage_to_attacker, 6);
        assert_eq!(out.target_hp, 9);
        assert_eq!(out.attacker_hp, 24);
    }

    #[test]
    fn ranged_attack_never_countered() {
        let archer = Combatant { attack: 12, defence: 3, hp: 20 };
        let warrior = Combatant { attack: 50, defence: 6, hp: 30 };
        let out = resolve_attack(archer, warrior, true);
        assert_eq!(out.damage_to_attacker, 0);
        assert_eq!(out.attacker_hp, 20);
        assert_eq!(out.target_hp, 24);
    }

    #[test]
    fn damage_floors_at_zero() {
        let weak = Combatant { attack: 2, defence: 0, hp: 5 };
        let wall = Combatant { attack: 0, defence: 10, hp: 5 };
        let out = resolve_attack(weak, wall, false);
        assert_eq!(out.damage_to_target, 0);
        assert_eq!(out.damage_to_attacker, 0);
    }

    #[test]
    fn mutual_destruction() {
        let a = Combatant { attack: 20, defence: 0, hp: 10 };
        let b = Combatant { attack: 20, defence: 0, hp: 10 };
        let out = resolve_attack(a, b, false);
        assert!(out.attacker_destroyed());
        assert!(out.target_destroyed());
    }

    #[test]
    fn range_check_for_melee_and_ranged() {
        let rules = RulesConfig::builtin();
        let warrior = rules.unit("warrior").unwrap();
        let archer = rules.unit("archer").unwrap();
        let o = Position::new(4, 4);
        assert!(check_range(warrior, o, Position::new(4, 5)).is_ok());
        assert_eq!(
            check_range(warrior, o, Position::new(4, 6)),
            Err(ActionError::OutOfRange { distance: 2, min: 1, max: 1 })
        );
        assert!(check_range(archer, o, Position::new(4, 5)).is_err());
        assert!(check_range(archer, o, Position::new(4, 7)).is_ok());
    }

    #[test]
    fn ranged_band_reports_both_edges() {
        let rules = RulesConfig::builtin();
        let archer = rules.unit("archer").unwrap();
        let o = Position::new(4, 4);
        assert_eq!(
            check_range(archer, o, Position::new(4, 5)),
            Err(ActionError::OutOfRange { distance: 1, min: 2, max: 3 })
        );
        assert!(check_range(archer, o, Position::new(4, 6)).is_ok());
        assert!(check_range(archer, o, Position::new(4, 7)).is_ok());
        assert_eq!(
            check_range(archer, o, Position::new(4, 8)),
            Err(ActionError::OutOfRange { distance: 4, min: 2, max: 3 })
        );
    }
}
