//! Value types that recur across packets.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::nbt::Compound;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct V3<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}
impl<T> V3<T> {
    pub fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }
}
pub type Vec3 = V3<f32>;
pub type BlockPos = V3<i32>;

pub const SHIELD: i32 = 513;

/// Ids of items that wear down. Their meta is a damage value and travels in the tag tree too.
const DURABLE_ITEMS: &[std::ops::RangeInclusive<i32>] = &[
    256..=259, // iron shovel, pickaxe, axe, flint and steel
    261..=261, // bow
    267..=279, // iron sword, wooden, stone and diamond tools
    283..=286, // golden tools
    290..=294, // hoes
    298..=317, // armor
    346..=346, // fishing rod
    359..=359, // shears
    398..=398, // carrot on a stick
    444..=444, // elytra
    455..=455, // trident
    SHIELD..=SHIELD,
];

/// An item stack as carried in an inventory slot.
///
/// `id == 0` is the empty slot; none of the other fields are sent for it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Item {
    pub id: i32,
    pub meta: i32,
    pub count: u8,
    pub nbt: Option<Compound>,
    pub can_place_on: Vec<String>,
    pub can_destroy: Vec<String>,
    /// Only sent for shields.
    pub blocking_tick: i64,
}
impl Item {
    pub const AIR: Item = Item {
        id: 0,
        meta: 0,
        count: 0,
        nbt: None,
        can_place_on: Vec::new(),
        can_destroy: Vec::new(),
        blocking_tick: 0,
    };
    pub fn new(id: i32, meta: i32, count: u8) -> Self {
        Self { id, meta, count, ..Self::AIR }
    }
    pub fn with_nbt(mut self, nbt: Compound) -> Self {
        self.nbt = Some(nbt);
        self
    }
    pub fn is_null(&self) -> bool {
        self.id == 0
    }
    pub fn is_durable(&self) -> bool {
        DURABLE_ITEMS.iter().any(|ids| ids.contains(&self.id))
    }
}

/// A recipe input. `meta == -1` matches any meta value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ingredient {
    pub id: i32,
    pub meta: i32,
    pub count: i32,
}
impl Ingredient {
    pub const WILDCARD_META: i32 = -1;
    pub fn new(id: i32, meta: i32, count: i32) -> Self {
        Self { id, meta, count }
    }
}

/// Attribute names the client knows about. Anything else cannot be decoded.
pub const KNOWN_ATTRIBUTES: &[&str] = &[
    "minecraft:absorption",
    "minecraft:player.saturation",
    "minecraft:player.exhaustion",
    "minecraft:knockback_resistance",
    "minecraft:health",
    "minecraft:movement",
    "minecraft:follow_range",
    "minecraft:player.hunger",
    "minecraft:attack_damage",
    "minecraft:player.level",
    "minecraft:player.experience",
    "minecraft:underwater_movement",
    "minecraft:luck",
    "minecraft:fall_damage",
    "minecraft:horse.jump_strength",
    "minecraft:zombie.spawn_reinforcements",
    "minecraft:lava_movement",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub min: f32,
    pub max: f32,
    pub value: f32,
    pub default: f32,
}
impl Attribute {
    pub fn new(name: impl Into<String>, min: f32, max: f32, value: f32) -> Self {
        Self { name: name.into(), min, max, value, default: value }
    }
}

/// One entity metadata value. The variant decides the wire type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Byte(u8),
    Short(i16),
    Int(i32),
    Float(f32),
    String(String),
    Compound(Compound),
    Pos(BlockPos),
    Long(i64),
    Vec3(Vec3),
}
impl MetadataValue {
    pub const BYTE: u32 = 0;
    pub const SHORT: u32 = 1;
    pub const INT: u32 = 2;
    pub const FLOAT: u32 = 3;
    pub const STRING: u32 = 4;
    pub const COMPOUND: u32 = 5;
    pub const POS: u32 = 6;
    pub const LONG: u32 = 7;
    pub const VEC3: u32 = 8;

    pub fn type_id(&self) -> u32 {
        match self {
            Self::Byte(_) => Self::BYTE,
            Self::Short(_) => Self::SHORT,
            Self::Int(_) => Self::INT,
            Self::Float(_) => Self::FLOAT,
            Self::String(_) => Self::STRING,
            Self::Compound(_) => Self::COMPOUND,
            Self::Pos(_) => Self::POS,
            Self::Long(_) => Self::LONG,
            Self::Vec3(_) => Self::VEC3,
        }
    }
}
pub type EntityMetadata = BTreeMap<u32, MetadataValue>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameRule {
    Bool(bool),
    Int(u32),
    Float(f32),
}
impl GameRule {
    pub fn type_id(&self) -> u32 {
        match self {
            Self::Bool(_) => 1,
            Self::Int(_) => 2,
            Self::Float(_) => 3,
        }
    }
}
pub type GameRules = BTreeMap<String, GameRule>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntityLink {
    pub from_unique_id: i64,
    pub to_unique_id: i64,
    pub kind: u8,
    pub immediate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOrigin {
    pub kind: u32,
    pub uuid: Uuid,
    pub request_id: String,
    /// Only sent for [`CommandOrigin::DEV_CONSOLE`] and [`CommandOrigin::TEST`].
    pub player_unique_id: i64,
}
impl CommandOrigin {
    pub const PLAYER: u32 = 0;
    pub const BLOCK: u32 = 1;
    pub const MINECART_BLOCK: u32 = 2;
    pub const DEV_CONSOLE: u32 = 3;
    pub const TEST: u32 = 4;

    pub fn has_player_unique_id(&self) -> bool {
        self.kind == Self::DEV_CONSOLE || self.kind == Self::TEST
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructureSettings {
    pub palette_name: String,
    pub ignore_entities: bool,
    pub ignore_blocks: bool,
    pub size: BlockPos,
    pub offset: BlockPos,
    pub last_touched_by: i64,
    pub rotation: u8,
    pub mirror: u8,
    pub integrity: f32,
    pub integrity_seed: i32,
}
