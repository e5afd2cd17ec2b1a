use super::error::{DecodeError, EncodeError, FieldError};
use super::wire::ByteCursor;

mod actor;
mod commands;
mod crafting;
mod level;
mod start_game;

pub use actor::*;
pub use commands::*;
pub use crafting::*;
pub use level::*;
pub use start_game::*;

/// The body of one packet, everything after the header varint.
pub trait PacketPayload: Sized {
    const ID: u32;
    const NAME: &'static str;
    fn decode_payload(cur: &mut ByteCursor) -> Result<Self, FieldError>;
    fn encode_payload(&self, cur: &mut ByteCursor) -> Result<(), EncodeError>;
}

macro_rules! packets {
    {$($name:ident => $handler:ident)*} => {
        #[derive(Debug, Clone, PartialEq)]
        pub enum Packet {
            $($name($name),)*
        }
        impl Packet {
            pub fn id(&self) -> u32 {
                match self {
                    $(Packet::$name(_) => $name::ID,)*
                }
            }
            pub fn name(&self) -> &'static str {
                match self {
                    $(Packet::$name(_) => $name::NAME,)*
                }
            }
            /// `Ok(None)` when no packet is registered under `id`.
            pub fn decode(id: u32, cur: &mut ByteCursor) -> Result<Option<Self>, DecodeError> {
                $(if id == $name::ID {
                    return $name::decode_payload(cur)
                        .map(|p| Some(Packet::$name(p)))
                        .map_err(|e| DecodeError::new($name::NAME, e));
                })*
                Ok(None)
            }
            pub fn encode_payload(&self, cur: &mut ByteCursor) -> Result<(), EncodeError> {
                match self {
                    $(Packet::$name(p) => p.encode_payload(cur),)*
                }
            }
            pub fn handle<S: Session + ?Sized>(&self, session: &mut S) -> bool {
                match self {
                    $(Packet::$name(p) => session.$handler(p),)*
                }
            }
        }
        $(impl From<$name> for Packet {
            fn from(p: $name) -> Self {
                Packet::$name(p)
            }
        })*

        /// Receives decoded packets. Unimplemented handlers report the packet as unhandled.
        pub trait Session {
            $(fn $handler(&mut self, packet: &$name) -> bool {
                let _ = packet;
                false
            })*
        }
    };
}
packets! {
    Disconnect => handle_disconnect
    StartGame => handle_start_game
    AddItemActor => handle_add_item_actor
    UpdateBlock => handle_update_block
    UpdateAttributes => handle_update_attributes
    MobEquipment => handle_mob_equipment
    SetActorData => handle_set_actor_data
    SetActorLink => handle_set_actor_link
    CraftingData => handle_crafting_data
    GameRulesChanged => handle_game_rules_changed
    AvailableCommands => handle_available_commands
    CommandRequest => handle_command_request
    StructureBlockUpdate => handle_structure_block_update
    MoveActorDelta => handle_move_actor_delta
    AvailableActorIdentifiers => handle_available_actor_identifiers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let ids = [
            Disconnect::ID,
            StartGame::ID,
            AddItemActor::ID,
            UpdateBlock::ID,
            UpdateAttributes::ID,
            MobEquipment::ID,
            SetActorData::ID,
            SetActorLink::ID,
            CraftingData::ID,
            GameRulesChanged::ID,
            AvailableCommands::ID,
            CommandRequest::ID,
            StructureBlockUpdate::ID,
            MoveActorDelta::ID,
            AvailableActorIdentifiers::ID,
        ];
        let mut sorted = ids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
        assert!(ids.iter().all(|&id| id < 1 << 10));
    }

    #[test]
    fn unregistered_id_decodes_to_none() {
        let mut cur = ByteCursor::new();
        assert!(Packet::decode(0x3ff, &mut cur).unwrap().is_none());
    }
}
