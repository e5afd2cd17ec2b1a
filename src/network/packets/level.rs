use super::PacketPayload;
use crate::network::error::{EncodeError, FieldError, FieldExt};
use crate::network::wire::ByteCursor;
use crate::types::*;

/// The message is only sent when the client is asked to show the disconnect screen.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Disconnect {
    pub hide_screen: bool,
    pub message: String,
}
impl Disconnect {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self { hide_screen: false, message: message.into() }
    }
}
impl PacketPayload for Disconnect {
    const ID: u32 = 0x05;
    const NAME: &'static str = "Disconnect";
    fn decode_payload(cur: &mut ByteCursor) -> Result<Self, FieldError> {
        let hide_screen = cur.get_bool().field("hide_screen")?;
        let message = if hide_screen { String::new() } else { cur.get_string().field("message")? };
        Ok(Self { hide_screen, message })
    }
    fn encode_payload(&self, cur: &mut ByteCursor) -> Result<(), EncodeError> {
        cur.put_bool(self.hide_screen);
        if !self.hide_screen {
            cur.put_string(&self.message);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateBlock {
    pub pos: BlockPos,
    pub block_runtime_id: u32,
    pub flags: u32,
    pub data_layer_id: u32,
}
impl UpdateBlock {
    pub const FLAG_NEIGHBORS: u32 = 0b0001;
    pub const FLAG_NETWORK: u32 = 0b0010;
    pub const FLAG_NOGRAPHIC: u32 = 0b0100;
    pub const FLAG_PRIORITY: u32 = 0b1000;

    pub const DATA_LAYER_NORMAL: u32 = 0;
    pub const DATA_LAYER_LIQUID: u32 = 1;
}
impl PacketPayload for UpdateBlock {
    const ID: u32 = 0x15;
    const NAME: &'static str = "UpdateBlock";
    fn decode_payload(cur: &mut ByteCursor) -> Result<Self, FieldError> {
        Ok(Self {
            pos: cur.get_block_position().field("pos")?,
            block_runtime_id: cur.get_unsigned_var_int().field("block_runtime_id")?,
            flags: cur.get_unsigned_var_int().field("flags")?,
            data_layer_id: cur.get_unsigned_var_int().field("data_layer_id")?,
        })
    }
    fn encode_payload(&self, cur: &mut ByteCursor) -> Result<(), EncodeError> {
        cur.put_block_position(&self.pos);
        cur.put_unsigned_var_int(self.block_runtime_id);
        cur.put_unsigned_var_int(self.flags);
        cur.put_unsigned_var_int(self.data_layer_id);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GameRulesChanged {
    pub rules: GameRules,
}
impl PacketPayload for GameRulesChanged {
    const ID: u32 = 0x48;
    const NAME: &'static str = "GameRulesChanged";
    fn decode_payload(cur: &mut ByteCursor) -> Result<Self, FieldError> {
        Ok(Self { rules: cur.get_game_rules().field("rules")? })
    }
    fn encode_payload(&self, cur: &mut ByteCursor) -> Result<(), EncodeError> {
        cur.put_game_rules(&self.rules);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructureBlockUpdate {
    pub pos: BlockPos,
    pub structure_name: String,
    pub data_field: String,
    pub include_players: bool,
    pub show_bounding_box: bool,
    pub structure_block_type: i32,
    pub settings: StructureSettings,
    pub redstone_save_mode: i32,
    pub is_powered: bool,
}
impl PacketPayload for StructureBlockUpdate {
    const ID: u32 = 0x5a;
    const NAME: &'static str = "StructureBlockUpdate";
    fn decode_payload(cur: &mut ByteCursor) -> Result<Self, FieldError> {
        Ok(Self {
            pos: cur.get_block_position().field("pos")?,
            structure_name: cur.get_string().field("structure_name")?,
            data_field: cur.get_string().field("data_field")?,
            include_players: cur.get_bool().field("include_players")?,
            show_bounding_box: cur.get_bool().field("show_bounding_box")?,
            structure_block_type: cur.get_var_int().field("structure_block_type")?,
            settings: cur.get_structure_settings().field("settings")?,
            redstone_save_mode: cur.get_var_int().field("redstone_save_mode")?,
            is_powered: cur.get_bool().field("is_powered")?,
        })
    }
    fn encode_payload(&self, cur: &mut ByteCursor) -> Result<(), EncodeError> {
        cur.put_block_position(&self.pos);
        cur.put_string(&self.structure_name);
        cur.put_string(&self.data_field);
        cur.put_bool(self.include_players);
        cur.put_bool(self.show_bounding_box);
        cur.put_var_int(self.structure_block_type);
        cur.put_structure_settings(&self.settings);
        cur.put_var_int(self.redstone_save_mode);
        cur.put_bool(self.is_powered);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<P: PacketPayload>(p: &P) -> (P, Vec<u8>) {
        let mut cur = ByteCursor::new();
        p.encode_payload(&mut cur).unwrap();
        let bytes = cur.as_bytes().to_vec();
        let decoded = P::decode_payload(&mut cur).unwrap();
        assert!(cur.is_exhausted());
        (decoded, bytes)
    }

    #[test]
    fn hidden_disconnect_drops_message() {
        let p = Disconnect { hide_screen: true, message: "ignored".into() };
        let (decoded, bytes) = round_trip(&p);
        assert_eq!(bytes, [1]);
        assert_eq!(decoded, Disconnect { hide_screen: true, message: String::new() });

        let p = Disconnect::with_message("bye");
        assert_eq!(round_trip(&p).0, p);
    }

    #[test]
    fn update_block_round_trips() {
        let p = UpdateBlock {
            pos: V3::new(-10, 64, 300),
            block_runtime_id: 1234,
            flags: UpdateBlock::FLAG_NETWORK | UpdateBlock::FLAG_NEIGHBORS,
            data_layer_id: UpdateBlock::DATA_LAYER_LIQUID,
        };
        assert_eq!(round_trip(&p).0, p);
    }

    #[test]
    fn structure_settings_round_trip() {
        let p = StructureBlockUpdate {
            pos: V3::new(1, 2, 3),
            structure_name: "house".into(),
            include_players: true,
            settings: StructureSettings {
                palette_name: "default".into(),
                size: V3::new(5, 6, 7),
                offset: V3::new(-1, 0, -1),
                last_touched_by: -42,
                rotation: 1,
                integrity: 0.75,
                integrity_seed: -9,
                ..Default::default()
            },
            is_powered: true,
            ..Default::default()
        };
        assert_eq!(round_trip(&p).0, p);
    }

    #[test]
    fn truncated_field_is_named() {
        let mut cur = ByteCursor::from(vec![0]);
        let err = Disconnect::decode_payload(&mut cur).unwrap_err();
        assert_eq!(err.field, "message");
    }
}
