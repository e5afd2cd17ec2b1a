use std::sync::OnceLock;

use fastnbt::Value;

use super::PacketPayload;
use crate::nbt::{self, Compound};
use crate::network::error::{EncodeError, FieldError, FieldExt, WireError};
use crate::network::resources::{self, BlockState};
use crate::network::wire::{ByteCursor, Wire};
use crate::types::*;

static BLOCK_TABLE_CACHE: OnceLock<Vec<u8>> = OnceLock::new();
static ITEM_TABLE_CACHE: OnceLock<Vec<u8>> = OnceLock::new();

/// Sent once on join with the level settings and the block and item id tables.
///
/// Leaving `block_table` or `item_table` empty sends the bundled table, serialized
/// once per process. Decoding always fills them in.
#[derive(Debug, Clone, PartialEq)]
pub struct StartGame {
    pub entity_unique_id: i64,
    pub entity_runtime_id: u64,
    pub player_gamemode: i32,
    pub player_position: Vec3,
    pub pitch: f32,
    pub yaw: f32,

    pub seed: i32,
    pub dimension: i32,
    /// 0 old, 1 infinite, 2 flat
    pub generator: i32,
    pub world_gamemode: i32,
    pub difficulty: i32,
    pub spawn: BlockPos,
    pub has_achievements_disabled: bool,
    pub time: i32,
    pub edu_mode: bool,
    pub has_edu_features_enabled: bool,
    pub rain_level: f32,
    pub lightning_level: f32,
    pub has_confirmed_platform_locked_content: bool,
    pub is_multiplayer_game: bool,
    pub has_lan_broadcast: bool,
    pub xbox_live_broadcast_mode: i32,
    pub platform_broadcast_mode: i32,
    pub commands_enabled: bool,
    pub is_texture_packs_required: bool,
    pub game_rules: GameRules,
    pub has_bonus_chest_enabled: bool,
    pub has_start_with_map_enabled: bool,
    pub default_player_permission: i32,
    pub server_chunk_tick_radius: i32,
    pub has_locked_behavior_pack: bool,
    pub has_locked_resource_pack: bool,
    pub is_from_locked_world_template: bool,
    pub use_msa_gamertags_only: bool,
    pub is_from_world_template: bool,
    pub is_world_template_option_locked: bool,
    pub only_spawn_v1_villagers: bool,
    pub vanilla_version: String,

    /// Usually the world folder name, base64 encoded.
    pub level_id: String,
    pub world_name: String,
    pub premium_world_template_id: String,
    pub is_trial: bool,
    pub is_movement_server_authoritative: bool,
    /// Only meaningful for trial worlds.
    pub current_tick: i64,
    pub enchantment_seed: i32,

    pub block_table: Option<Vec<BlockState>>,
    pub item_table: Option<Vec<(String, i16)>>,
    pub multiplayer_correlation_id: String,
}

impl StartGame {
    pub const PERMISSION_CUSTOM: i32 = 3;
    pub const PERMISSION_OPERATOR: i32 = 2;
    pub const PERMISSION_MEMBER: i32 = 1;
    pub const PERMISSION_VISITOR: i32 = 0;

    pub const VANILLA_VERSION: &'static str = "1.13.0";
}

impl Default for StartGame {
    fn default() -> Self {
        let mut game_rules = GameRules::new();
        // client side regeneration
        game_rules.insert("naturalregeneration".into(), GameRule::Bool(false));
        Self {
            entity_unique_id: 0,
            entity_runtime_id: 0,
            player_gamemode: 0,
            player_position: Vec3::default(),
            pitch: 0.0,
            yaw: 0.0,
            seed: 0,
            dimension: 0,
            generator: 1,
            world_gamemode: 0,
            difficulty: 0,
            spawn: BlockPos::default(),
            has_achievements_disabled: true,
            time: -1,
            edu_mode: false,
            has_edu_features_enabled: false,
            rain_level: 0.0,
            lightning_level: 0.0,
            has_confirmed_platform_locked_content: false,
            is_multiplayer_game: true,
            has_lan_broadcast: true,
            xbox_live_broadcast_mode: 0,
            platform_broadcast_mode: 0,
            commands_enabled: false,
            is_texture_packs_required: true,
            game_rules,
            has_bonus_chest_enabled: false,
            has_start_with_map_enabled: false,
            default_player_permission: Self::PERMISSION_MEMBER,
            server_chunk_tick_radius: 4,
            has_locked_behavior_pack: false,
            has_locked_resource_pack: false,
            is_from_locked_world_template: false,
            use_msa_gamertags_only: false,
            is_from_world_template: false,
            is_world_template_option_locked: false,
            only_spawn_v1_villagers: false,
            vanilla_version: Self::VANILLA_VERSION.into(),
            level_id: String::new(),
            world_name: String::new(),
            premium_world_template_id: String::new(),
            is_trial: false,
            is_movement_server_authoritative: false,
            current_tick: 0,
            enchantment_seed: 0,
            block_table: None,
            item_table: None,
            multiplayer_correlation_id: String::new(),
        }
    }
}

/// A root list of `{block: {name, states}, id}` compounds.
fn serialize_block_table(table: &[BlockState]) -> Result<Vec<u8>, EncodeError> {
    let states = table
        .iter()
        .map(|state| {
            let mut block = Compound::new();
            block.insert("name".into(), Value::String(state.name.clone()));
            block.insert("states".into(), Value::Compound(state.states.clone()));
            let mut entry = Compound::new();
            entry.insert("block".into(), Value::Compound(block));
            entry.insert("id".into(), Value::Short(state.legacy_id));
            Value::Compound(entry)
        })
        .collect();
    let mut cur = ByteCursor::new();
    nbt::write_root(&mut cur, "", &Value::List(states))?;
    Ok(cur.into_inner())
}

fn malformed(what: &str) -> WireError {
    WireError::Unexpected(format!("malformed block table: {what}"))
}

fn read_block_table(cur: &mut ByteCursor) -> Result<Vec<BlockState>, WireError> {
    let entries = match nbt::read_root(cur)? {
        (_, Value::List(entries)) => entries,
        _ => return Err(malformed("root is not a list")),
    };
    entries
        .into_iter()
        .map(|entry| {
            let Value::Compound(mut entry) = entry else {
                return Err(malformed("entry is not a compound"));
            };
            let Some(Value::Compound(mut block)) = entry.remove("block") else {
                return Err(malformed("missing block"));
            };
            let Some(Value::String(name)) = block.remove("name") else {
                return Err(malformed("missing name"));
            };
            let states = match block.remove("states") {
                Some(Value::Compound(states)) => states,
                None => Compound::new(),
                Some(_) => return Err(malformed("states is not a compound")),
            };
            let Some(Value::Short(legacy_id)) = entry.remove("id") else {
                return Err(malformed("missing id"));
            };
            Ok(BlockState { name, states, legacy_id })
        })
        .collect()
}

fn serialize_item_table<'a>(table: impl ExactSizeIterator<Item = (&'a String, &'a i16)>) -> Vec<u8> {
    let mut cur = ByteCursor::new();
    cur.put_unsigned_var_int(table.len() as u32);
    for (name, legacy_id) in table {
        cur.put_string(name);
        cur.put_i16_le(*legacy_id);
    }
    cur.into_inner()
}

fn default_block_table() -> Result<&'static [u8], EncodeError> {
    resources::cached(&BLOCK_TABLE_CACHE, || serialize_block_table(resources::block_states()?)).map(Vec::as_slice)
}

fn default_item_table() -> Result<&'static [u8], EncodeError> {
    resources::cached(&ITEM_TABLE_CACHE, || Ok::<_, EncodeError>(serialize_item_table(resources::item_id_map()?.iter())))
        .map(Vec::as_slice)
}

impl PacketPayload for StartGame {
    const ID: u32 = 0x0b;
    const NAME: &'static str = "StartGame";
    fn decode_payload(cur: &mut ByteCursor) -> Result<Self, FieldError> {
        Ok(Self {
            entity_unique_id: cur.get_entity_unique_id().field("entity_unique_id")?,
            entity_runtime_id: cur.get_entity_runtime_id().field("entity_runtime_id")?,
            player_gamemode: cur.get_var_int().field("player_gamemode")?,
            player_position: cur.get_vector3().field("player_position")?,
            pitch: cur.get_f32_le().field("pitch")?,
            yaw: cur.get_f32_le().field("yaw")?,

            seed: cur.get_var_int().field("seed")?,
            dimension: cur.get_var_int().field("dimension")?,
            generator: cur.get_var_int().field("generator")?,
            world_gamemode: cur.get_var_int().field("world_gamemode")?,
            difficulty: cur.get_var_int().field("difficulty")?,
            spawn: cur.get_block_position().field("spawn")?,
            has_achievements_disabled: cur.get_bool().field("has_achievements_disabled")?,
            time: cur.get_var_int().field("time")?,
            edu_mode: cur.get_bool().field("edu_mode")?,
            has_edu_features_enabled: cur.get_bool().field("has_edu_features_enabled")?,
            rain_level: cur.get_f32_le().field("rain_level")?,
            lightning_level: cur.get_f32_le().field("lightning_level")?,
            has_confirmed_platform_locked_content: cur.get_bool().field("has_confirmed_platform_locked_content")?,
            is_multiplayer_game: cur.get_bool().field("is_multiplayer_game")?,
            has_lan_broadcast: cur.get_bool().field("has_lan_broadcast")?,
            xbox_live_broadcast_mode: cur.get_var_int().field("xbox_live_broadcast_mode")?,
            platform_broadcast_mode: cur.get_var_int().field("platform_broadcast_mode")?,
            commands_enabled: cur.get_bool().field("commands_enabled")?,
            is_texture_packs_required: cur.get_bool().field("is_texture_packs_required")?,
            game_rules: cur.get_game_rules().field("game_rules")?,
            has_bonus_chest_enabled: cur.get_bool().field("has_bonus_chest_enabled")?,
            has_start_with_map_enabled: cur.get_bool().field("has_start_with_map_enabled")?,
            default_player_permission: cur.get_var_int().field("default_player_permission")?,
            server_chunk_tick_radius: cur.get_i32_le().field("server_chunk_tick_radius")?,
            has_locked_behavior_pack: cur.get_bool().field("has_locked_behavior_pack")?,
            has_locked_resource_pack: cur.get_bool().field("has_locked_resource_pack")?,
            is_from_locked_world_template: cur.get_bool().field("is_from_locked_world_template")?,
            use_msa_gamertags_only: cur.get_bool().field("use_msa_gamertags_only")?,
            is_from_world_template: cur.get_bool().field("is_from_world_template")?,
            is_world_template_option_locked: cur.get_bool().field("is_world_template_option_locked")?,
            only_spawn_v1_villagers: cur.get_bool().field("only_spawn_v1_villagers")?,
            vanilla_version: cur.get_string().field("vanilla_version")?,

            level_id: cur.get_string().field("level_id")?,
            world_name: cur.get_string().field("world_name")?,
            premium_world_template_id: cur.get_string().field("premium_world_template_id")?,
            is_trial: cur.get_bool().field("is_trial")?,
            is_movement_server_authoritative: cur.get_bool().field("is_movement_server_authoritative")?,
            current_tick: cur.get_i64_le().field("current_tick")?,
            enchantment_seed: cur.get_var_int().field("enchantment_seed")?,

            block_table: Some(read_block_table(cur).field("block_table")?),
            item_table: Some(Vec::decode(cur).field("item_table")?),
            multiplayer_correlation_id: cur.get_string().field("multiplayer_correlation_id")?,
        })
    }

    fn encode_payload(&self, cur: &mut ByteCursor) -> Result<(), EncodeError> {
        cur.put_entity_unique_id(self.entity_unique_id);
        cur.put_entity_runtime_id(self.entity_runtime_id);
        cur.put_var_int(self.player_gamemode);
        cur.put_vector3(&self.player_position);
        cur.put_f32_le(self.pitch);
        cur.put_f32_le(self.yaw);

        cur.put_var_int(self.seed);
        cur.put_var_int(self.dimension);
        cur.put_var_int(self.generator);
        cur.put_var_int(self.world_gamemode);
        cur.put_var_int(self.difficulty);
        cur.put_block_position(&self.spawn);
        cur.put_bool(self.has_achievements_disabled);
        cur.put_var_int(self.time);
        cur.put_bool(self.edu_mode);
        cur.put_bool(self.has_edu_features_enabled);
        cur.put_f32_le(self.rain_level);
        cur.put_f32_le(self.lightning_level);
        cur.put_bool(self.has_confirmed_platform_locked_content);
        cur.put_bool(self.is_multiplayer_game);
        cur.put_bool(self.has_lan_broadcast);
        cur.put_var_int(self.xbox_live_broadcast_mode);
        cur.put_var_int(self.platform_broadcast_mode);
        cur.put_bool(self.commands_enabled);
        cur.put_bool(self.is_texture_packs_required);
        cur.put_game_rules(&self.game_rules);
        cur.put_bool(self.has_bonus_chest_enabled);
        cur.put_bool(self.has_start_with_map_enabled);
        cur.put_var_int(self.default_player_permission);
        cur.put_i32_le(self.server_chunk_tick_radius);
        cur.put_bool(self.has_locked_behavior_pack);
        cur.put_bool(self.has_locked_resource_pack);
        cur.put_bool(self.is_from_locked_world_template);
        cur.put_bool(self.use_msa_gamertags_only);
        cur.put_bool(self.is_from_world_template);
        cur.put_bool(self.is_world_template_option_locked);
        cur.put_bool(self.only_spawn_v1_villagers);
        cur.put_string(&self.vanilla_version);

        cur.put_string(&self.level_id);
        cur.put_string(&self.world_name);
        cur.put_string(&self.premium_world_template_id);
        cur.put_bool(self.is_trial);
        cur.put_bool(self.is_movement_server_authoritative);
        cur.put_i64_le(self.current_tick);
        cur.put_var_int(self.enchantment_seed);

        match &self.block_table {
            Some(table) => cur.put(&serialize_block_table(table)?),
            None => cur.put(default_block_table()?),
        }
        match &self.item_table {
            Some(table) => cur.put(&serialize_item_table(table.iter().map(|(name, id)| (name, id)))),
            None => cur.put(default_item_table()?),
        }

        cur.put_string(&self.multiplayer_correlation_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(p: &StartGame) -> Vec<u8> {
        let mut cur = ByteCursor::new();
        p.encode_payload(&mut cur).unwrap();
        cur.into_inner()
    }

    fn custom_block() -> BlockState {
        let mut states = Compound::new();
        states.insert("color".into(), Value::String("red".into()));
        BlockState { name: "test:block".into(), states, legacy_id: 900 }
    }

    #[test]
    fn default_tables_are_cached() {
        let p = StartGame { world_name: "world".into(), ..Default::default() };
        let first = encode(&p);
        assert!(BLOCK_TABLE_CACHE.get().is_some());
        assert!(ITEM_TABLE_CACHE.get().is_some());
        assert_eq!(encode(&p), first);

        let decoded = StartGame::decode_payload(&mut first.into()).unwrap();
        let blocks = decoded.block_table.as_deref().unwrap();
        assert_eq!(blocks, resources::block_states().unwrap());
        let items = decoded.item_table.as_ref().unwrap();
        assert_eq!(items.len(), resources::item_id_map().unwrap().len());
        assert_eq!(decoded.world_name, "world");
        assert_eq!(decoded.game_rules, p.game_rules);
    }

    #[test]
    fn override_tables_bypass_the_cache() {
        let cached_blocks = default_block_table().unwrap().to_vec();
        let p = StartGame {
            block_table: Some(vec![custom_block()]),
            item_table: Some(vec![("test:item".into(), -2)]),
            ..Default::default()
        };
        let mut cur = ByteCursor::from(encode(&p));
        let decoded = StartGame::decode_payload(&mut cur).unwrap();
        assert!(cur.is_exhausted());
        assert_eq!(decoded, p);
        assert_eq!(default_block_table().unwrap(), &cached_blocks[..]);
    }

    #[test]
    fn field_order_is_fixed() {
        let p = StartGame {
            entity_unique_id: -1,
            entity_runtime_id: 1,
            player_gamemode: 1,
            player_position: V3::new(0.5, 70.0, -3.25),
            seed: 12345,
            spawn: V3::new(0, 64, 0),
            rain_level: 0.5,
            commands_enabled: true,
            current_tick: 1 << 40,
            enchantment_seed: -7,
            multiplayer_correlation_id: "abc".into(),
            block_table: Some(vec![]),
            item_table: Some(vec![]),
            ..Default::default()
        };
        let bytes = encode(&p);
        // unique id, runtime id, gamemode
        assert_eq!(&bytes[..3], &[1, 1, 2]);
        assert_eq!(StartGame::decode_payload(&mut bytes.into()).unwrap(), p);
    }

    #[test]
    fn truncated_packet_names_field() {
        let mut bytes = encode(&StartGame { block_table: Some(vec![]), item_table: Some(vec![]), ..Default::default() });
        bytes.truncate(bytes.len() - 1);
        let err = StartGame::decode_payload(&mut bytes.into()).unwrap_err();
        assert_eq!(err.field, "multiplayer_correlation_id");
    }
}
