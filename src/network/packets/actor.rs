use super::PacketPayload;
use crate::network::error::{EncodeError, FieldError, FieldExt};
use crate::network::resources;
use crate::network::wire::{ByteCursor, Wire};
use crate::types::*;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AddItemActor {
    pub unique_id: i64,
    pub runtime_id: u64,
    pub item: Item,
    pub position: Vec3,
    pub motion: Vec3,
    pub metadata: EntityMetadata,
    pub is_from_fishing: bool,
}
impl PacketPayload for AddItemActor {
    const ID: u32 = 0x0f;
    const NAME: &'static str = "AddItemActor";
    fn decode_payload(cur: &mut ByteCursor) -> Result<Self, FieldError> {
        Ok(Self {
            unique_id: cur.get_entity_unique_id().field("unique_id")?,
            runtime_id: cur.get_entity_runtime_id().field("runtime_id")?,
            item: cur.get_slot().field("item")?,
            position: cur.get_vector3().field("position")?,
            motion: cur.get_vector3().field("motion")?,
            metadata: cur.get_entity_metadata().field("metadata")?,
            is_from_fishing: cur.get_bool().field("is_from_fishing")?,
        })
    }
    fn encode_payload(&self, cur: &mut ByteCursor) -> Result<(), EncodeError> {
        cur.put_entity_unique_id(self.unique_id);
        cur.put_entity_runtime_id(self.runtime_id);
        cur.put_slot(&self.item)?;
        cur.put_vector3(&self.position);
        cur.put_vector3(&self.motion);
        cur.put_entity_metadata(&self.metadata)?;
        cur.put_bool(self.is_from_fishing);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateAttributes {
    pub runtime_id: u64,
    pub attributes: Vec<Attribute>,
}
impl PacketPayload for UpdateAttributes {
    const ID: u32 = 0x1d;
    const NAME: &'static str = "UpdateAttributes";
    fn decode_payload(cur: &mut ByteCursor) -> Result<Self, FieldError> {
        Ok(Self {
            runtime_id: cur.get_entity_runtime_id().field("runtime_id")?,
            attributes: cur.get_attribute_list().field("attributes")?,
        })
    }
    fn encode_payload(&self, cur: &mut ByteCursor) -> Result<(), EncodeError> {
        cur.put_entity_runtime_id(self.runtime_id);
        cur.put_attribute_list(&self.attributes);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MobEquipment {
    pub runtime_id: u64,
    pub item: Item,
    pub inventory_slot: u8,
    pub hotbar_slot: u8,
    pub window_id: u8,
}
impl PacketPayload for MobEquipment {
    const ID: u32 = 0x1f;
    const NAME: &'static str = "MobEquipment";
    fn decode_payload(cur: &mut ByteCursor) -> Result<Self, FieldError> {
        Ok(Self {
            runtime_id: cur.get_entity_runtime_id().field("runtime_id")?,
            item: cur.get_slot().field("item")?,
            inventory_slot: cur.get_u8().field("inventory_slot")?,
            hotbar_slot: cur.get_u8().field("hotbar_slot")?,
            window_id: cur.get_u8().field("window_id")?,
        })
    }
    fn encode_payload(&self, cur: &mut ByteCursor) -> Result<(), EncodeError> {
        cur.put_entity_runtime_id(self.runtime_id);
        cur.put_slot(&self.item)?;
        cur.put_u8(self.inventory_slot);
        cur.put_u8(self.hotbar_slot);
        cur.put_u8(self.window_id);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetActorData {
    pub runtime_id: u64,
    pub metadata: EntityMetadata,
}
impl PacketPayload for SetActorData {
    const ID: u32 = 0x27;
    const NAME: &'static str = "SetActorData";
    fn decode_payload(cur: &mut ByteCursor) -> Result<Self, FieldError> {
        Ok(Self {
            runtime_id: cur.get_entity_runtime_id().field("runtime_id")?,
            metadata: cur.get_entity_metadata().field("metadata")?,
        })
    }
    fn encode_payload(&self, cur: &mut ByteCursor) -> Result<(), EncodeError> {
        cur.put_entity_runtime_id(self.runtime_id);
        cur.put_entity_metadata(&self.metadata)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetActorLink {
    pub link: EntityLink,
}
impl PacketPayload for SetActorLink {
    const ID: u32 = 0x29;
    const NAME: &'static str = "SetActorLink";
    fn decode_payload(cur: &mut ByteCursor) -> Result<Self, FieldError> {
        Ok(Self { link: EntityLink::decode(cur).field("link")? })
    }
    fn encode_payload(&self, cur: &mut ByteCursor) -> Result<(), EncodeError> {
        self.link.encode(cur);
        Ok(())
    }
}

/// Relative movement where only the components named by `flags` are sent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MoveActorDelta {
    pub runtime_id: u64,
    pub flags: u8,
    pub x_diff: i32,
    pub y_diff: i32,
    pub z_diff: i32,
    pub x_rot: f32,
    pub y_rot: f32,
    pub z_rot: f32,
}
impl MoveActorDelta {
    pub const FLAG_HAS_X: u8 = 0x01;
    pub const FLAG_HAS_Y: u8 = 0x02;
    pub const FLAG_HAS_Z: u8 = 0x04;
    pub const FLAG_HAS_ROT_X: u8 = 0x08;
    pub const FLAG_HAS_ROT_Y: u8 = 0x10;
    pub const FLAG_HAS_ROT_Z: u8 = 0x20;

    fn has(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}
impl PacketPayload for MoveActorDelta {
    const ID: u32 = 0x6f;
    const NAME: &'static str = "MoveActorDelta";
    fn decode_payload(cur: &mut ByteCursor) -> Result<Self, FieldError> {
        let mut p = Self {
            runtime_id: cur.get_entity_runtime_id().field("runtime_id")?,
            flags: cur.get_u8().field("flags")?,
            ..Self::default()
        };
        let flags = p.flags;
        for (flag, diff, name) in [
            (Self::FLAG_HAS_X, &mut p.x_diff, "x_diff"),
            (Self::FLAG_HAS_Y, &mut p.y_diff, "y_diff"),
            (Self::FLAG_HAS_Z, &mut p.z_diff, "z_diff"),
        ] {
            if flags & flag != 0 {
                *diff = cur.get_var_int().field(name)?;
            }
        }
        for (flag, rot, name) in [
            (Self::FLAG_HAS_ROT_X, &mut p.x_rot, "x_rot"),
            (Self::FLAG_HAS_ROT_Y, &mut p.y_rot, "y_rot"),
            (Self::FLAG_HAS_ROT_Z, &mut p.z_rot, "z_rot"),
        ] {
            if flags & flag != 0 {
                *rot = cur.get_byte_rotation().field(name)?;
            }
        }
        Ok(p)
    }
    fn encode_payload(&self, cur: &mut ByteCursor) -> Result<(), EncodeError> {
        cur.put_entity_runtime_id(self.runtime_id);
        cur.put_u8(self.flags);
        for (flag, diff) in [(Self::FLAG_HAS_X, self.x_diff), (Self::FLAG_HAS_Y, self.y_diff), (Self::FLAG_HAS_Z, self.z_diff)] {
            if self.has(flag) {
                cur.put_var_int(diff);
            }
        }
        for (flag, rot) in [(Self::FLAG_HAS_ROT_X, self.x_rot), (Self::FLAG_HAS_ROT_Y, self.y_rot), (Self::FLAG_HAS_ROT_Z, self.z_rot)] {
            if self.has(flag) {
                cur.put_byte_rotation(rot);
            }
        }
        Ok(())
    }
}

/// The vanilla entity identifier table. Without an override the bundled copy is sent verbatim.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AvailableActorIdentifiers {
    pub nbt: Option<Vec<u8>>,
}
impl PacketPayload for AvailableActorIdentifiers {
    const ID: u32 = 0x77;
    const NAME: &'static str = "AvailableActorIdentifiers";
    fn decode_payload(cur: &mut ByteCursor) -> Result<Self, FieldError> {
        Ok(Self { nbt: Some(cur.get_remaining()) })
    }
    fn encode_payload(&self, cur: &mut ByteCursor) -> Result<(), EncodeError> {
        match &self.nbt {
            Some(blob) => cur.put(blob),
            None => cur.put(resources::entity_identifiers()?),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<P: PacketPayload>(p: &P) -> P {
        let mut cur = ByteCursor::new();
        p.encode_payload(&mut cur).unwrap();
        let decoded = P::decode_payload(&mut cur).unwrap();
        assert!(cur.is_exhausted());
        decoded
    }

    #[test]
    fn move_delta_only_sends_flagged_fields() {
        let p = MoveActorDelta {
            runtime_id: 7,
            flags: MoveActorDelta::FLAG_HAS_Y | MoveActorDelta::FLAG_HAS_ROT_Z,
            x_diff: 100,
            y_diff: -3,
            z_rot: 90.0,
            ..Default::default()
        };
        let mut cur = ByteCursor::new();
        p.encode_payload(&mut cur).unwrap();
        // runtime id, flags, y diff, z rotation
        assert_eq!(cur.as_bytes(), &[7, 0x22, 5, 64]);

        let decoded = MoveActorDelta::decode_payload(&mut cur).unwrap();
        assert_eq!(decoded.x_diff, 0);
        assert_eq!(decoded.y_diff, -3);
        assert_eq!(decoded.z_rot, 90.0);
        assert_eq!(decoded.x_rot, 0.0);
    }

    #[test]
    fn move_delta_with_every_flag() {
        let p = MoveActorDelta {
            runtime_id: 1 << 40,
            flags: 0x3f,
            x_diff: i32::MIN,
            y_diff: 1,
            z_diff: i32::MAX,
            x_rot: 45.0,
            y_rot: 180.0,
            z_rot: 270.0,
        };
        assert_eq!(round_trip(&p), p);
    }

    #[test]
    fn item_actor_round_trips() {
        let mut metadata = EntityMetadata::new();
        metadata.insert(0, MetadataValue::Long(0));
        let p = AddItemActor {
            unique_id: -5,
            runtime_id: 5,
            item: Item::new(264, 0, 3),
            position: V3::new(0.5, 64.0, -0.5),
            motion: V3::new(0.0, 0.25, 0.0),
            metadata,
            is_from_fishing: true,
        };
        assert_eq!(round_trip(&p), p);
    }

    #[test]
    fn attributes_and_equipment_round_trip() {
        let p = UpdateAttributes {
            runtime_id: 1,
            attributes: vec![
                Attribute::new("minecraft:health", 0.0, 20.0, 18.0),
                Attribute::new("minecraft:movement", 0.0, f32::MAX, 0.1),
            ],
        };
        assert_eq!(round_trip(&p), p);

        let p = MobEquipment { runtime_id: 2, item: Item::new(SHIELD, 0, 1), inventory_slot: 3, hotbar_slot: 3, window_id: 0 };
        assert_eq!(round_trip(&p), p);
    }

    #[test]
    fn link_round_trips() {
        let p = SetActorLink { link: EntityLink { from_unique_id: 1, to_unique_id: -2, kind: 1, immediate: true } };
        assert_eq!(round_trip(&p), p);
    }

    #[test]
    fn identifiers_keep_their_blob() {
        let p = AvailableActorIdentifiers { nbt: Some(vec![10, 0, 0]) };
        assert_eq!(round_trip(&p), p);

        let mut cur = ByteCursor::new();
        AvailableActorIdentifiers::default().encode_payload(&mut cur).unwrap();
        assert_eq!(cur.as_bytes(), resources::entity_identifiers().unwrap());
    }
}
