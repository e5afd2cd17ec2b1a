//! Composite encodings shared by many packets.

use fastnbt::Value;
use uuid::Uuid;

use super::error::{EncodeError, WireError};
use super::wire::{ByteCursor, Wire};
use crate::nbt::{self, Compound};
use crate::types::*;

const DAMAGE_TAG: &str = "Damage";
const DAMAGE_TAG_CONFLICT_RESOLUTION: &str = "___Damage_ProtocolCollisionResolution___";
/// Marks an item slot that carries a tag tree.
const NBT_PRESENT: u16 = 0xffff;
const WILDCARD_META: i32 = 0x7fff;
const ROTATION_STEP: f32 = 360.0 / 256.0;

fn round4(v: f32) -> f32 {
    ((v as f64 * 10_000.0).round() / 10_000.0) as f32
}

impl ByteCursor {
    /// Four 32-bit words, each little-endian, in the order 1, 0, 3, 2.
    pub fn get_uuid(&mut self) -> Result<Uuid, WireError> {
        let part1 = self.get_u32_le()?;
        let part0 = self.get_u32_le()?;
        let part3 = self.get_u32_le()?;
        let part2 = self.get_u32_le()?;
        let mut bytes = [0u8; 16];
        for (chunk, part) in bytes.chunks_exact_mut(4).zip([part0, part1, part2, part3]) {
            chunk.copy_from_slice(&part.to_be_bytes());
        }
        Ok(Uuid::from_bytes(bytes))
    }
    pub fn put_uuid(&mut self, uuid: &Uuid) {
        let bytes = uuid.as_bytes();
        let part = |i: usize| u32::from_be_bytes([bytes[4 * i], bytes[4 * i + 1], bytes[4 * i + 2], bytes[4 * i + 3]]);
        for i in [1, 0, 3, 2] {
            self.put_u32_le(part(i));
        }
    }

    /// Each component is rounded to four decimal places. Writes are not rounded.
    pub fn get_vector3(&mut self) -> Result<Vec3, WireError> {
        Ok(V3 {
            x: round4(self.get_f32_le()?),
            y: round4(self.get_f32_le()?),
            z: round4(self.get_f32_le()?),
        })
    }
    pub fn put_vector3(&mut self, v: &Vec3) {
        self.put_f32_le(v.x);
        self.put_f32_le(v.y);
        self.put_f32_le(v.z);
    }

    /// Block position with an unsigned Y coordinate.
    pub fn get_block_position(&mut self) -> Result<BlockPos, WireError> {
        Ok(V3 {
            x: self.get_var_int()?,
            y: self.get_unsigned_var_int()? as i32,
            z: self.get_var_int()?,
        })
    }
    pub fn put_block_position(&mut self, pos: &BlockPos) {
        self.put_var_int(pos.x);
        self.put_unsigned_var_int(pos.y as u32);
        self.put_var_int(pos.z);
    }
    pub fn get_signed_block_position(&mut self) -> Result<BlockPos, WireError> {
        Ok(V3 {
            x: self.get_var_int()?,
            y: self.get_var_int()?,
            z: self.get_var_int()?,
        })
    }
    pub fn put_signed_block_position(&mut self, pos: &BlockPos) {
        self.put_var_int(pos.x);
        self.put_var_int(pos.y);
        self.put_var_int(pos.z);
    }

    pub fn get_entity_unique_id(&mut self) -> Result<i64, WireError> {
        self.get_var_long()
    }
    pub fn put_entity_unique_id(&mut self, eid: i64) {
        self.put_var_long(eid)
    }
    pub fn get_entity_runtime_id(&mut self) -> Result<u64, WireError> {
        self.get_unsigned_var_long()
    }
    pub fn put_entity_runtime_id(&mut self, eid: u64) {
        self.put_unsigned_var_long(eid)
    }

    /// One byte, 256 steps per full turn.
    pub fn get_byte_rotation(&mut self) -> Result<f32, WireError> {
        Ok(self.get_u8()? as f32 * ROTATION_STEP)
    }
    pub fn put_byte_rotation(&mut self, degrees: f32) {
        self.put_u8((degrees / ROTATION_STEP).round() as i32 as u8)
    }

    fn get_count(&mut self) -> Result<usize, WireError> {
        let n = self.get_var_int()?;
        usize::try_from(n).map_err(|_| WireError::Unexpected(format!("negative count {n}")))
    }
    fn get_string_list(&mut self) -> Result<Vec<String>, WireError> {
        let n = self.get_count()?;
        let mut out = Vec::with_capacity(n.min(self.remaining()));
        for _ in 0..n {
            out.push(self.get_string()?);
        }
        Ok(out)
    }
    fn put_string_list(&mut self, list: &[String]) {
        self.put_var_int(list.len() as i32);
        for s in list {
            self.put_string(s);
        }
    }

    pub fn get_slot(&mut self) -> Result<Item, WireError> {
        let id = self.get_var_int()?;
        if id == 0 {
            return Ok(Item::AIR);
        }
        let aux = self.get_var_int()?;
        let mut meta = aux >> 8;
        let count = (aux & 0xff) as u8;

        let mut nbt = match self.get_u16_le()? {
            0 => None,
            NBT_PRESENT => {
                let c = self.get_u8()?;
                if c != 1 {
                    return Err(WireError::Unexpected(format!("unexpected NBT count {c}")));
                }
                Some(nbt::read_compound_root(self)?)
            }
            len => return Err(WireError::Unexpected(format!("unexpected fake NBT length {len}"))),
        };
        let can_place_on = self.get_string_list()?;
        let can_destroy = self.get_string_list()?;
        let blocking_tick = if id == SHIELD { self.get_var_long()? } else { 0 };

        if let Some(map) = &mut nbt {
            if let Some(Value::Int(damage)) = map.get(DAMAGE_TAG) {
                meta = *damage;
                map.remove(DAMAGE_TAG);
            }
            if let Some(conflicted) = map.remove(DAMAGE_TAG_CONFLICT_RESOLUTION) {
                map.insert(DAMAGE_TAG.to_owned(), conflicted);
            }
        }
        let nbt = nbt.filter(|map| !map.is_empty());

        Ok(Item { id, meta, count, nbt, can_place_on, can_destroy, blocking_tick })
    }

    pub fn put_slot(&mut self, item: &Item) -> Result<(), EncodeError> {
        if item.id == 0 {
            self.put_var_int(0);
            return Ok(());
        }
        self.put_var_int(item.id);
        self.put_var_int(((item.meta & 0x7fff) << 8) | item.count as i32);

        let mut nbt = item.nbt.clone();
        if item.is_durable() && item.meta > 0 {
            let map = nbt.get_or_insert_with(Compound::new);
            if let Some(existing) = map.remove(DAMAGE_TAG) {
                map.insert(DAMAGE_TAG_CONFLICT_RESOLUTION.to_owned(), existing);
            }
            map.insert(DAMAGE_TAG.to_owned(), Value::Int(item.meta));
        }
        match &nbt {
            Some(map) => {
                self.put_u16_le(NBT_PRESENT);
                self.put_u8(1);
                nbt::write_compound_root(self, map)?;
            }
            None => self.put_u16_le(0),
        }
        self.put_string_list(&item.can_place_on);
        self.put_string_list(&item.can_destroy);
        if item.id == SHIELD {
            self.put_var_long(item.blocking_tick);
        }
        Ok(())
    }

    pub fn get_entity_metadata(&mut self) -> Result<EntityMetadata, WireError> {
        let count = self.get_unsigned_var_int()?;
        let mut data = EntityMetadata::new();
        for _ in 0..count {
            let key = self.get_unsigned_var_int()?;
            let value = match self.get_unsigned_var_int()? {
                MetadataValue::BYTE => MetadataValue::Byte(self.get_u8()?),
                MetadataValue::SHORT => MetadataValue::Short(self.get_i16_le()?),
                MetadataValue::INT => MetadataValue::Int(self.get_var_int()?),
                MetadataValue::FLOAT => MetadataValue::Float(self.get_f32_le()?),
                MetadataValue::STRING => MetadataValue::String(self.get_string()?),
                MetadataValue::COMPOUND => MetadataValue::Compound(nbt::read_compound_root(self)?),
                MetadataValue::POS => MetadataValue::Pos(self.get_signed_block_position()?),
                MetadataValue::LONG => MetadataValue::Long(self.get_var_long()?),
                MetadataValue::VEC3 => MetadataValue::Vec3(self.get_vector3()?),
                other => return Err(WireError::UnknownMetadataType(other)),
            };
            data.insert(key, value);
        }
        Ok(data)
    }
    pub fn put_entity_metadata(&mut self, metadata: &EntityMetadata) -> Result<(), EncodeError> {
        self.put_unsigned_var_int(metadata.len() as u32);
        for (key, value) in metadata {
            self.put_unsigned_var_int(*key);
            self.put_unsigned_var_int(value.type_id());
            match value {
                MetadataValue::Byte(v) => self.put_u8(*v),
                MetadataValue::Short(v) => self.put_i16_le(*v),
                MetadataValue::Int(v) => self.put_var_int(*v),
                MetadataValue::Float(v) => self.put_f32_le(*v),
                MetadataValue::String(v) => self.put_string(v),
                MetadataValue::Compound(v) => nbt::write_compound_root(self, v)?,
                MetadataValue::Pos(v) => self.put_signed_block_position(v),
                MetadataValue::Long(v) => self.put_var_long(*v),
                MetadataValue::Vec3(v) => self.put_vector3(v),
            }
        }
        Ok(())
    }

    pub fn get_attribute_list(&mut self) -> Result<Vec<Attribute>, WireError> {
        Vec::decode(self)
    }
    pub fn put_attribute_list(&mut self, attributes: &[Attribute]) {
        self.put_unsigned_var_int(attributes.len() as u32);
        for attribute in attributes {
            attribute.encode(self);
        }
    }

    pub fn get_game_rules(&mut self) -> Result<GameRules, WireError> {
        let count = self.get_unsigned_var_int()?;
        let mut rules = GameRules::new();
        for _ in 0..count {
            let name = self.get_string()?;
            let rule = match self.get_unsigned_var_int()? {
                1 => GameRule::Bool(self.get_bool()?),
                2 => GameRule::Int(self.get_unsigned_var_int()?),
                3 => GameRule::Float(self.get_f32_le()?),
                other => return Err(WireError::UnknownGameRuleType(other)),
            };
            rules.insert(name, rule);
        }
        Ok(rules)
    }
    pub fn put_game_rules(&mut self, rules: &GameRules) {
        self.put_unsigned_var_int(rules.len() as u32);
        for (name, rule) in rules {
            self.put_string(name);
            self.put_unsigned_var_int(rule.type_id());
            match rule {
                GameRule::Bool(v) => self.put_bool(*v),
                GameRule::Int(v) => self.put_unsigned_var_int(*v),
                GameRule::Float(v) => self.put_f32_le(*v),
            }
        }
    }

    pub fn get_command_origin(&mut self) -> Result<CommandOrigin, WireError> {
        let mut origin = CommandOrigin {
            kind: self.get_unsigned_var_int()?,
            uuid: self.get_uuid()?,
            request_id: self.get_string()?,
            player_unique_id: 0,
        };
        if origin.has_player_unique_id() {
            origin.player_unique_id = self.get_var_long()?;
        }
        Ok(origin)
    }
    pub fn put_command_origin(&mut self, origin: &CommandOrigin) {
        self.put_unsigned_var_int(origin.kind);
        self.put_uuid(&origin.uuid);
        self.put_string(&origin.request_id);
        if origin.has_player_unique_id() {
            self.put_var_long(origin.player_unique_id);
        }
    }

    pub fn get_structure_settings(&mut self) -> Result<StructureSettings, WireError> {
        Ok(StructureSettings {
            palette_name: self.get_string()?,
            ignore_entities: self.get_bool()?,
            ignore_blocks: self.get_bool()?,
            size: self.get_block_position()?,
            offset: self.get_block_position()?,
            last_touched_by: self.get_entity_unique_id()?,
            rotation: self.get_u8()?,
            mirror: self.get_u8()?,
            integrity: self.get_f32()?,
            integrity_seed: self.get_i32()?,
        })
    }
    pub fn put_structure_settings(&mut self, settings: &StructureSettings) {
        self.put_string(&settings.palette_name);
        self.put_bool(settings.ignore_entities);
        self.put_bool(settings.ignore_blocks);
        self.put_block_position(&settings.size);
        self.put_block_position(&settings.offset);
        self.put_entity_unique_id(settings.last_touched_by);
        self.put_u8(settings.rotation);
        self.put_u8(settings.mirror);
        self.put_f32(settings.integrity);
        self.put_i32(settings.integrity_seed);
    }
}

impl Wire for Uuid {
    fn decode(cur: &mut ByteCursor) -> Result<Self, WireError> {
        cur.get_uuid()
    }
    fn encode(&self, cur: &mut ByteCursor) {
        cur.put_uuid(self)
    }
}
impl Wire for Vec3 {
    fn decode(cur: &mut ByteCursor) -> Result<Self, WireError> {
        cur.get_vector3()
    }
    fn encode(&self, cur: &mut ByteCursor) {
        cur.put_vector3(self)
    }
}
impl Wire for Ingredient {
    fn decode(cur: &mut ByteCursor) -> Result<Self, WireError> {
        let id = cur.get_var_int()?;
        if id == 0 {
            return Ok(Ingredient::default());
        }
        let meta = match cur.get_var_int()? {
            WILDCARD_META => Ingredient::WILDCARD_META,
            meta => meta,
        };
        Ok(Ingredient { id, meta, count: cur.get_var_int()? })
    }
    fn encode(&self, cur: &mut ByteCursor) {
        if self.id == 0 {
            cur.put_var_int(0);
        } else {
            cur.put_var_int(self.id);
            cur.put_var_int(self.meta & 0x7fff);
            cur.put_var_int(self.count);
        }
    }
}
impl Wire for Attribute {
    fn decode(cur: &mut ByteCursor) -> Result<Self, WireError> {
        let min = cur.get_f32_le()?;
        let max = cur.get_f32_le()?;
        let value = cur.get_f32_le()?;
        let default = cur.get_f32_le()?;
        let name = cur.get_string()?;
        if !KNOWN_ATTRIBUTES.contains(&name.as_str()) {
            return Err(WireError::UnknownAttribute(name));
        }
        Ok(Attribute { name, min, max, value, default })
    }
    fn encode(&self, cur: &mut ByteCursor) {
        cur.put_f32_le(self.min);
        cur.put_f32_le(self.max);
        cur.put_f32_le(self.value);
        cur.put_f32_le(self.default);
        cur.put_string(&self.name);
    }
}
impl Wire for EntityLink {
    fn decode(cur: &mut ByteCursor) -> Result<Self, WireError> {
        Ok(EntityLink {
            from_unique_id: cur.get_entity_unique_id()?,
            to_unique_id: cur.get_entity_unique_id()?,
            kind: cur.get_u8()?,
            immediate: cur.get_bool()?,
        })
    }
    fn encode(&self, cur: &mut ByteCursor) {
        cur.put_entity_unique_id(self.from_unique_id);
        cur.put_entity_unique_id(self.to_unique_id);
        cur.put_u8(self.kind);
        cur.put_bool(self.immediate);
    }
}
