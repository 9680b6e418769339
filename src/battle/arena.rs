use crate::battle::arena_tags::{default_turns, ArenaTag, DelayedHit};
use crate::battle::events::{BattleEvent, EventBus};
use crate::battle::state::{BattlerIndex, Side};
use crate::pokemon::PokemonId;
use schema::{ArenaTagSide, ArenaTagType, BiomeId, MoveId, TerrainType, WeatherType};
use serde::{Deserialize, Serialize};

/// Default duration of weather set by moves or abilities.
pub const DEFAULT_WEATHER_TURNS: u8 = 5;
pub const DEFAULT_TERRAIN_TURNS: u8 = 5;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherState {
    pub weather_type: WeatherType,
    /// 0 means the weather never runs out.
    pub turns_left: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainState {
    pub terrain_type: TerrainType,
    pub turns_left: u8,
}

/// Field state shared by every combatant: weather, terrain and arena tags.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Arena {
    pub biome: BiomeId,
    #[serde(default)]
    pub weather: Option<WeatherState>,
    #[serde(default)]
    pub terrain: Option<TerrainState>,
    #[serde(default)]
    pub tags: Vec<ArenaTag>,
}

/// Whether a tag stored on `tag_side` is visible from `side`.
fn side_matches(tag_side: ArenaTagSide, side: ArenaTagSide) -> bool {
    tag_side == ArenaTagSide::Both || side == ArenaTagSide::Both || tag_side == side
}

impl Arena {
    pub fn new(biome: BiomeId) -> Self {
        Self {
            biome,
            weather: None,
            terrain: None,
            tags: Vec::new(),
        }
    }

    pub fn weather_type(&self) -> Option<WeatherType> {
        self.weather.map(|weather| weather.weather_type)
    }

    pub fn terrain_type(&self) -> Option<TerrainType> {
        self.terrain.map(|terrain| terrain.terrain_type)
    }

    // --- Weather and terrain ---

    /// Replace the weather. Returns false if nothing changed or a primal weather
    /// refused to yield.
    pub fn set_weather(
        &mut self,
        weather: Option<WeatherType>,
        turns: u8,
        bus: &mut EventBus,
    ) -> bool {
        let old = self.weather_type();
        if old == weather {
            return false;
        }
        if let (Some(current), Some(next)) = (old, weather) {
            if current.is_primal() && !next.is_primal() {
                return false;
            }
        }

        let turns = match weather {
            Some(next) if next.is_primal() => 0,
            Some(_) => turns,
            None => 0,
        };
        self.weather = weather.map(|weather_type| WeatherState {
            weather_type,
            turns_left: turns,
        });
        bus.push(BattleEvent::WeatherChanged {
            old,
            new: weather,
            turns,
        });
        true
    }

    pub fn set_terrain(
        &mut self,
        terrain: Option<TerrainType>,
        turns: u8,
        bus: &mut EventBus,
    ) -> bool {
        let old = self.terrain_type();
        if old == terrain {
            return false;
        }
        self.terrain = terrain.map(|terrain_type| TerrainState {
            terrain_type,
            turns_left: turns,
        });
        bus.push(BattleEvent::TerrainChanged {
            old,
            new: terrain,
            turns: if terrain.is_some() { turns } else { 0 },
        });
        true
    }

    /// One turn of weather decay. Clears the weather when it reaches zero.
    pub fn lapse_weather(&mut self, bus: &mut EventBus) {
        let Some(weather) = self.weather.as_mut() else {
            return;
        };
        if weather.turns_left == 0 {
            return;
        }
        weather.turns_left -= 1;
        if weather.turns_left == 0 {
            self.set_weather(None, 0, bus);
        }
    }

    pub fn lapse_terrain(&mut self, bus: &mut EventBus) {
        let Some(terrain) = self.terrain.as_mut() else {
            return;
        };
        if terrain.turns_left == 0 {
            return;
        }
        terrain.turns_left -= 1;
        if terrain.turns_left == 0 {
            self.set_terrain(None, 0, bus);
        }
    }

    // --- Tags ---

    /// Add a tag, or stack a layer onto an existing one. Adding at the layer cap
    /// succeeds without changing anything.
    pub fn add_tag(
        &mut self,
        tag_type: ArenaTagType,
        turns: u8,
        source_move: Option<MoveId>,
        source_id: Option<PokemonId>,
        side: ArenaTagSide,
        bus: &mut EventBus,
    ) -> bool {
        if let Some(existing) = self
            .tags
            .iter_mut()
            .find(|tag| tag.tag_type == tag_type && tag.side == side)
        {
            if tag_type == ArenaTagType::NeutralizingGas {
                if let Some(id) = source_id.filter(|id| !existing.sources.contains(id)) {
                    existing.sources.push(id);
                }
                return true;
            }
            let at_max = existing.layers >= tag_type.max_layers();
            if !at_max {
                existing.layers += 1;
            }
            bus.push(BattleEvent::ArenaTagAdded {
                tag: tag_type,
                side,
                layers: existing.layers,
                at_max,
            });
            return true;
        }

        let tag = ArenaTag::new(tag_type, turns, source_move, source_id, side);
        bus.push(BattleEvent::ArenaTagAdded {
            tag: tag_type,
            side,
            layers: tag.layers,
            at_max: false,
        });
        log::debug!("arena tag {:?} added on {:?} for {} turns", tag_type, side, turns);
        self.tags.push(tag);
        true
    }

    /// Remove a tag from exactly this side. Returns false if it was not present.
    pub fn remove_tag_on_side(
        &mut self,
        tag_type: ArenaTagType,
        side: ArenaTagSide,
        bus: &mut EventBus,
    ) -> bool {
        let Some(position) = self
            .tags
            .iter()
            .position(|tag| tag.tag_type == tag_type && tag.side == side)
        else {
            return false;
        };
        self.tags.remove(position);
        bus.push(BattleEvent::ArenaTagRemoved {
            tag: tag_type,
            side,
        });
        true
    }

    /// The tag of this type visible from `side` (a `Both` tag is visible everywhere).
    pub fn get_tag_on_side(&self, tag_type: ArenaTagType, side: ArenaTagSide) -> Option<&ArenaTag> {
        self.tags
            .iter()
            .find(|tag| tag.tag_type == tag_type && side_matches(tag.side, side))
    }

    pub fn has_tag_on_side(&self, tag_type: ArenaTagType, side: ArenaTagSide) -> bool {
        self.get_tag_on_side(tag_type, side).is_some()
    }

    pub fn has_tag(&self, tag_type: ArenaTagType) -> bool {
        self.tags.iter().any(|tag| tag.tag_type == tag_type)
    }

    /// Tags affecting one side of the field, including field-wide tags.
    pub fn tags_for_side(&self, side: Side) -> impl Iterator<Item = &ArenaTag> {
        let side = side.arena_side();
        self.tags
            .iter()
            .filter(move |tag| side_matches(tag.side, side))
    }

    /// A battler left the field. If it was one of the suppression sources it is
    /// dropped, and the tag goes once no source remains. Returns true if the tag
    /// was removed.
    pub fn source_left_field(&mut self, source_id: PokemonId, bus: &mut EventBus) -> bool {
        let Some(tag) = self.tags.iter_mut().find(|tag| {
            tag.tag_type == ArenaTagType::NeutralizingGas && tag.sources.contains(&source_id)
        }) else {
            return false;
        };
        log::debug!("suppression source {:?} left the field", source_id);
        tag.sources.retain(|id| *id != source_id);
        if tag.sources.is_empty() {
            let side = tag.side;
            self.remove_tag_on_side(ArenaTagType::NeutralizingGas, side, bus);
            return true;
        }
        false
    }

    /// The delayed attack waiting on this position, if any.
    pub fn delayed_attack_at(&self, index: BattlerIndex) -> Option<&ArenaTag> {
        let side = index.side().arena_side();
        self.tags.iter().find(|tag| {
            tag.side == side && tag.delayed.is_some_and(|hit| hit.slot as usize == index.slot())
        })
    }

    /// Queue a delayed hit on `target`'s position. A position holds one at a time.
    pub fn schedule_delayed_attack(
        &mut self,
        target: BattlerIndex,
        move_id: MoveId,
        source_id: PokemonId,
        damage: u16,
        bus: &mut EventBus,
    ) -> bool {
        if self.delayed_attack_at(target).is_some() {
            return false;
        }
        let side = target.side().arena_side();
        let mut tag = ArenaTag::new(
            ArenaTagType::DelayedAttack,
            default_turns(ArenaTagType::DelayedAttack),
            Some(move_id),
            Some(source_id),
            side,
        );
        tag.delayed = Some(DelayedHit {
            slot: target.slot() as u8,
            damage,
        });
        log::debug!("{:?} will land on {:?} for {} damage", move_id, target, damage);
        self.tags.push(tag);
        bus.push(BattleEvent::DelayedAttackForeseen {
            target,
            move_used: move_id,
        });
        true
    }

    /// Count every finite tag down by one, removing those that reach zero.
    pub fn lapse_tags(&mut self, bus: &mut EventBus) {
        self.tags.retain_mut(|tag| {
            if tag.lapse() {
                return true;
            }
            bus.push(BattleEvent::ArenaTagRemoved {
                tag: tag.tag_type,
                side: tag.side,
            });
            false
        });
    }

    /// Wipe weather, terrain and every tag between battles.
    pub fn reset_for_new_battle(&mut self, bus: &mut EventBus) {
        self.set_weather(None, 0, bus);
        self.set_terrain(None, 0, bus);
        let tags: Vec<(ArenaTagType, ArenaTagSide)> =
            self.tags.iter().map(|tag| (tag.tag_type, tag.side)).collect();
        for (tag_type, side) in tags {
            self.remove_tag_on_side(tag_type, side, bus);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_spikes_stack_to_three_layers() {
        let mut arena = Arena::new(BiomeId::Plains);
        let mut bus = EventBus::new();
        for _ in 0..4 {
            assert!(arena.add_tag(ArenaTagType::Spikes, 0, Some(MoveId::Spikes), None, ArenaTagSide::Enemy, &mut bus));
        }
        let tag = arena
            .get_tag_on_side(ArenaTagType::Spikes, ArenaTagSide::Enemy)
            .unwrap();
        assert_eq!(tag.layers, 3);
        assert_eq!(arena.tags.len(), 1);
        assert_eq!(
            bus.events().last(),
            Some(&BattleEvent::ArenaTagAdded {
                tag: ArenaTagType::Spikes,
                side: ArenaTagSide::Enemy,
                layers: 3,
                at_max: true,
            })
        );
    }

    #[test]
    fn test_one_tag_per_type_and_side() {
        let mut arena = Arena::new(BiomeId::Plains);
        let mut bus = EventBus::new();
        arena.add_tag(ArenaTagType::Reflect, 5, None, None, ArenaTagSide::Player, &mut bus);
        arena.add_tag(ArenaTagType::Reflect, 5, None, None, ArenaTagSide::Enemy, &mut bus);
        assert_eq!(arena.tags.len(), 2);

        assert!(arena.remove_tag_on_side(ArenaTagType::Reflect, ArenaTagSide::Enemy, &mut bus));
        assert!(arena.has_tag_on_side(ArenaTagType::Reflect, ArenaTagSide::Player));
        assert!(!arena.has_tag_on_side(ArenaTagType::Reflect, ArenaTagSide::Enemy));
        assert!(!arena.remove_tag_on_side(ArenaTagType::Reflect, ArenaTagSide::Enemy, &mut bus));
    }

    #[test]
    fn test_tags_decay_and_emit_removal() {
        let mut arena = Arena::new(BiomeId::Plains);
        let mut bus = EventBus::new();
        arena.add_tag(ArenaTagType::Tailwind, 2, None, None, ArenaTagSide::Player, &mut bus);
        arena.add_tag(ArenaTagType::StealthRock, 0, None, None, ArenaTagSide::Enemy, &mut bus);

        arena.lapse_tags(&mut bus);
        assert!(arena.has_tag(ArenaTagType::Tailwind));
        arena.lapse_tags(&mut bus);
        assert!(!arena.has_tag(ArenaTagType::Tailwind));
        assert!(arena.has_tag(ArenaTagType::StealthRock), "zero turns means infinite");
        assert!(bus.events().contains(&BattleEvent::ArenaTagRemoved {
            tag: ArenaTagType::Tailwind,
            side: ArenaTagSide::Player,
        }));
    }

    #[test]
    fn test_weather_decays_to_none() {
        let mut arena = Arena::new(BiomeId::Plains);
        let mut bus = EventBus::new();
        assert!(arena.set_weather(Some(WeatherType::Rain), 2, &mut bus));
        arena.lapse_weather(&mut bus);
        assert_eq!(arena.weather_type(), Some(WeatherType::Rain));
        arena.lapse_weather(&mut bus);
        assert_eq!(arena.weather_type(), None);
        assert_eq!(
            bus.events().last(),
            Some(&BattleEvent::WeatherChanged {
                old: Some(WeatherType::Rain),
                new: None,
                turns: 0,
            })
        );
    }

    #[test]
    fn test_primal_weather_only_yields_to_primal() {
        let mut arena = Arena::new(BiomeId::Plains);
        let mut bus = EventBus::new();
        arena.set_weather(Some(WeatherType::HeavyRain), 5, &mut bus);
        assert_eq!(arena.weather.unwrap().turns_left, 0);
        assert!(!arena.set_weather(Some(WeatherType::Sunny), 5, &mut bus));
        assert!(arena.set_weather(Some(WeatherType::HarshSun), 5, &mut bus));
        arena.lapse_weather(&mut bus);
        assert_eq!(arena.weather_type(), Some(WeatherType::HarshSun));
    }

    #[test]
    fn test_suppression_counts_sources() {
        let mut arena = Arena::new(BiomeId::Plains);
        let mut bus = EventBus::new();
        let first = PokemonId(1);
        let second = PokemonId(2);
        arena.add_tag(ArenaTagType::NeutralizingGas, 0, None, Some(first), ArenaTagSide::Both, &mut bus);
        arena.add_tag(ArenaTagType::NeutralizingGas, 0, None, Some(second), ArenaTagSide::Both, &mut bus);
        assert_eq!(arena.tags[0].sources, vec![first, second]);

        assert!(!arena.source_left_field(first, &mut bus));
        assert!(arena.has_tag(ArenaTagType::NeutralizingGas));
        assert!(arena.source_left_field(second, &mut bus));
        assert!(!arena.has_tag(ArenaTagType::NeutralizingGas));
    }

    #[test]
    fn test_bystander_leaving_keeps_suppression() {
        let mut arena = Arena::new(BiomeId::Plains);
        let mut bus = EventBus::new();
        let holder = PokemonId(1);
        arena.add_tag(ArenaTagType::NeutralizingGas, 0, None, Some(holder), ArenaTagSide::Both, &mut bus);
        arena.add_tag(ArenaTagType::NeutralizingGas, 0, None, Some(holder), ArenaTagSide::Both, &mut bus);

        assert!(!arena.source_left_field(PokemonId(7), &mut bus));
        assert_eq!(arena.tags[0].sources, vec![holder]);
        assert!(arena.source_left_field(holder, &mut bus));
        assert!(!arena.source_left_field(holder, &mut bus));
    }

    #[test]
    fn test_delayed_attacks_hold_one_per_position() {
        let mut arena = Arena::new(BiomeId::Plains);
        let mut bus = EventBus::new();
        let seer = PokemonId(1);
        assert!(arena.schedule_delayed_attack(BattlerIndex::Enemy, MoveId::FutureSight, seer, 40, &mut bus));
        assert!(!arena.schedule_delayed_attack(BattlerIndex::Enemy, MoveId::DoomDesire, seer, 60, &mut bus));
        assert!(arena.schedule_delayed_attack(BattlerIndex::Enemy2, MoveId::DoomDesire, seer, 60, &mut bus));
        assert_eq!(arena.tags.len(), 2);
        let pending = arena.delayed_attack_at(BattlerIndex::Enemy).unwrap();
        assert_eq!(pending.source_move, Some(MoveId::FutureSight));
        assert_eq!(pending.delayed.map(|hit| hit.damage), Some(40));

        arena.lapse_tags(&mut bus);
        arena.lapse_tags(&mut bus);
        assert!(arena.tags.iter().all(|tag| tag.is_due()));
        arena.lapse_tags(&mut bus);
        assert!(arena.tags.is_empty());
        let removals = bus
            .events()
            .iter()
            .filter(|event| matches!(event, BattleEvent::ArenaTagRemoved { tag: ArenaTagType::DelayedAttack, .. }))
            .count();
        assert_eq!(removals, 2);
    }

    #[test]
    fn test_reset_clears_everything_with_events() {
        let mut arena = Arena::new(BiomeId::Plains);
        let mut bus = EventBus::new();
        arena.set_weather(Some(WeatherType::Sandstorm), 5, &mut bus);
        arena.set_terrain(Some(TerrainType::Grassy), 5, &mut bus);
        arena.add_tag(ArenaTagType::Spikes, 0, None, None, ArenaTagSide::Player, &mut bus);
        let before = bus.len();

        arena.reset_for_new_battle(&mut bus);
        assert_eq!(arena, Arena::new(BiomeId::Plains));
        assert_eq!(bus.len(), before + 3);
    }
}
