use crate::ability_data::AbilityId;
use crate::pokemon_types::PokemonType;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, IntoStaticStr)]
pub enum SpeciesId {
    Pikachu,
    Charizard,
    Blastoise,
    Venusaur,
    Gengar,
    Gyarados,
    Cloyster,
    Machamp,
    Butterfree,
    Golem,
    Clefable,
    Dragonite,
    Kangaskhan,
    Snorlax,
    Darmanitan,
    Corviknight,
    Jolteon,
    Vaporeon,
    Arcanine,
    Hitmonlee,
    Ludicolo,
    Rattata,
    Torkoal,
    Pelipper,
    Kyogre,
    Groudon,
    Regigigas,
    Weezing,
    Tyranitar,
    Abomasnow,
    TapuKoko,
    Ferrothorn,
    Magikarp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseStats {
    pub hp: u8,
    pub attack: u8,
    pub defense: u8,
    pub sp_attack: u8,
    pub sp_defense: u8,
    pub speed: u8,
}

impl BaseStats {
    /// Stats in `Stat` order (HP first).
    pub fn as_array(&self) -> [u8; 6] {
        [
            self.hp,
            self.attack,
            self.defense,
            self.sp_attack,
            self.sp_defense,
            self.speed,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormChangeTrigger {
    /// Active while the holder is at or below half HP.
    HpAtOrBelowHalf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesForm {
    pub name: String,
    pub types: Vec<PokemonType>,
    pub base_stats: BaseStats,
    pub trigger: FormChangeTrigger,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesData {
    pub id: SpeciesId,
    pub name: String,
    pub types: Vec<PokemonType>,
    pub base_stats: BaseStats,
    pub abilities: Vec<AbilityId>,
    #[serde(default = "no_ability")]
    pub passive: AbilityId,
    #[serde(default)]
    pub forms: Vec<SpeciesForm>,
}

fn no_ability() -> AbilityId {
    AbilityId::None
}

impl SpeciesData {
    /// Form 0 is the base form; alternate forms are numbered from 1.
    pub fn form(&self, form_index: u8) -> Option<&SpeciesForm> {
        match form_index {
            0 => None,
            n => self.forms.get(n as usize - 1),
        }
    }

    pub fn base_stats_for_form(&self, form_index: u8) -> BaseStats {
        self.form(form_index)
            .map(|form| form.base_stats)
            .unwrap_or(self.base_stats)
    }

    pub fn types_for_form(&self, form_index: u8) -> &[PokemonType] {
        self.form(form_index)
            .map(|form| form.types.as_slice())
            .unwrap_or(self.types.as_slice())
    }
}
