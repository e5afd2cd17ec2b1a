use super::error::{EncodeError, ProtocolError};
use super::packets::{Packet, Session};
use super::wire::ByteCursor;

const PID_MASK: u32 = 0x3ff;
const SENDER_SUB_ID_SHIFT: u32 = 10;
const RECIPIENT_SUB_ID_SHIFT: u32 = 12;
const SUB_ID_MASK: u32 = 0x03;

/// The varint in front of every packet: the packet id plus split-screen sub-client ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketHeader {
    pub id: u32,
    pub sender_sub_id: u8,
    pub recipient_sub_id: u8,
}
impl PacketHeader {
    pub fn from_raw(raw: u32) -> Self {
        Self {
            id: raw & PID_MASK,
            sender_sub_id: ((raw >> SENDER_SUB_ID_SHIFT) & SUB_ID_MASK) as u8,
            recipient_sub_id: ((raw >> RECIPIENT_SUB_ID_SHIFT) & SUB_ID_MASK) as u8,
        }
    }
    pub fn to_raw(self) -> u32 {
        (self.id & PID_MASK)
            | (self.sender_sub_id as u32 & SUB_ID_MASK) << SENDER_SUB_ID_SHIFT
            | (self.recipient_sub_id as u32 & SUB_ID_MASK) << RECIPIENT_SUB_ID_SHIFT
    }
}

pub fn decode(bytes: &[u8]) -> Result<(PacketHeader, Packet), ProtocolError> {
    let mut cur = ByteCursor::from(bytes);
    let header = PacketHeader::from_raw(cur.get_unsigned_var_int().map_err(ProtocolError::Header)?);
    let packet = Packet::decode(header.id, &mut cur)?.ok_or(ProtocolError::UnknownPacket(header.id))?;
    if !cur.is_exhausted() {
        log::warn!("still {} bytes unread in {}", cur.remaining(), packet.name());
    }
    log::trace!("decoded {} ({} bytes)", packet.name(), bytes.len());
    Ok((header, packet))
}

/// Encodes `packet` under its own id; `header.id` is ignored.
pub fn encode(packet: &Packet, header: PacketHeader) -> Result<Vec<u8>, EncodeError> {
    let mut cur = ByteCursor::new();
    cur.put_unsigned_var_int(PacketHeader { id: packet.id(), ..header }.to_raw());
    packet.encode_payload(&mut cur)?;
    log::trace!("encoded {} ({} bytes)", packet.name(), cur.as_bytes().len());
    Ok(cur.into_inner())
}

/// Decodes one packet and hands it to `session`.
///
/// `Ok(false)` means the session did not handle the packet; what to do about that
/// is up to the owner of the connection.
pub fn dispatch<S: Session + ?Sized>(session: &mut S, bytes: &[u8]) -> Result<bool, ProtocolError> {
    let (header, packet) = decode(bytes)?;
    let handled = packet.handle(session);
    if !handled {
        log::debug!("unhandled {} from sub-client {}", packet.name(), header.sender_sub_id);
    }
    Ok(handled)
}
