pub mod common;

#[cfg(test)]
mod test_stat_stages;

#[cfg(test)]
mod test_arena_tags;

#[cfg(test)]
mod test_entry_abilities;


#[cfg(test)]
mod test_move_reactions;

#[cfg(test)]
mod test_fixed_damage;
