use std::collections::HashMap;

use super::PacketPayload;
use crate::network::error::{EncodeError, FieldError, FieldExt, WireError};
use crate::network::wire::{ByteCursor, Wire};
use crate::types::CommandOrigin;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandEnum {
    pub name: String,
    pub values: Vec<String>,
}
impl CommandEnum {
    pub fn new(name: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { name: name.into(), values: values.into_iter().map(Into::into).collect() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    /// A raw argument type, normally `ARG_FLAG_VALID | ARG_TYPE_*`.
    Basic(u32),
    Enum(CommandEnum),
    Postfix(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandParameter {
    pub name: String,
    pub kind: ParamType,
    pub optional: bool,
    pub flags: u8,
}
impl CommandParameter {
    pub fn basic(name: impl Into<String>, arg_type: u32, optional: bool) -> Self {
        let kind = ParamType::Basic(AvailableCommands::ARG_FLAG_VALID | arg_type);
        Self { name: name.into(), kind, optional, flags: 0 }
    }
    pub fn enumeration(name: impl Into<String>, e: CommandEnum, optional: bool) -> Self {
        Self { name: name.into(), kind: ParamType::Enum(e), optional, flags: 0 }
    }
    pub fn postfix(name: impl Into<String>, postfix: impl Into<String>, optional: bool) -> Self {
        Self { name: name.into(), kind: ParamType::Postfix(postfix.into()), optional, flags: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandData {
    pub name: String,
    pub description: String,
    pub flags: u8,
    pub permission: u8,
    pub aliases: Option<CommandEnum>,
    pub overloads: Vec<Vec<CommandParameter>>,
}

/// The command tree sent to the client.
///
/// Enum values, postfixes and enums are deduplicated into tables on the wire and
/// referenced by index; the tables are rebuilt from `commands` on every encode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AvailableCommands {
    pub commands: Vec<CommandData>,
    pub soft_enums: Vec<CommandEnum>,
}
impl AvailableCommands {
    pub const ARG_FLAG_VALID: u32 = 0x100000;
    pub const ARG_FLAG_ENUM: u32 = 0x200000;
    pub const ARG_FLAG_POSTFIX: u32 = 0x1000000;

    pub const ARG_TYPE_INT: u32 = 0x01;
    pub const ARG_TYPE_FLOAT: u32 = 0x02;
    pub const ARG_TYPE_VALUE: u32 = 0x03;
    pub const ARG_TYPE_WILDCARD_INT: u32 = 0x04;
    pub const ARG_TYPE_OPERATOR: u32 = 0x05;
    pub const ARG_TYPE_TARGET: u32 = 0x06;
    pub const ARG_TYPE_FILEPATH: u32 = 0x0e;
    pub const ARG_TYPE_STRING: u32 = 0x1b;
    pub const ARG_TYPE_POSITION: u32 = 0x1d;
    pub const ARG_TYPE_MESSAGE: u32 = 0x20;
    pub const ARG_TYPE_RAWTEXT: u32 = 0x22;
    pub const ARG_TYPE_JSON: u32 = 0x25;
    pub const ARG_TYPE_COMMAND: u32 = 0x2c;
}

/// Index width depends on the size of the value table.
fn put_enum_value_index(cur: &mut ByteCursor, index: usize, pool_len: usize) {
    if pool_len < 0x100 {
        cur.put_u8(index as u8)
    } else if pool_len < 0x10000 {
        cur.put_u16_le(index as u16)
    } else {
        cur.put_u32_le(index as u32)
    }
}
fn get_enum_value_index(cur: &mut ByteCursor, pool_len: usize) -> Result<usize, WireError> {
    Ok(if pool_len < 0x100 {
        cur.get_u8()? as usize
    } else if pool_len < 0x10000 {
        cur.get_u16_le()? as usize
    } else {
        cur.get_u32_le()? as usize
    })
}

fn lookup<T: Clone>(table: &[T], index: usize) -> Result<T, WireError> {
    table.get(index).cloned().ok_or(WireError::BadIndex { index, len: table.len() })
}

/// Names in first-seen order.
#[derive(Default)]
struct Indexed<'a> {
    names: Vec<&'a str>,
    index: HashMap<&'a str, usize>,
}
impl<'a> Indexed<'a> {
    fn insert(&mut self, name: &'a str) -> bool {
        if self.index.contains_key(name) {
            return false;
        }
        self.index.insert(name, self.names.len());
        self.names.push(name);
        true
    }
    fn get(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}

#[derive(Default)]
struct Tables<'a> {
    values: Indexed<'a>,
    postfixes: Indexed<'a>,
    enum_names: Indexed<'a>,
    enums: Vec<&'a CommandEnum>,
}
impl<'a> Tables<'a> {
    fn scan(commands: &'a [CommandData]) -> Self {
        let mut tables = Self::default();
        for command in commands {
            if let Some(aliases) = &command.aliases {
                tables.add_enum(aliases);
            }
            for param in command.overloads.iter().flatten() {
                match &param.kind {
                    ParamType::Enum(e) => tables.add_enum(e),
                    ParamType::Postfix(p) => {
                        tables.postfixes.insert(p);
                    }
                    ParamType::Basic(_) => {}
                }
            }
        }
        tables
    }
    fn add_enum(&mut self, e: &'a CommandEnum) {
        if self.enum_names.insert(&e.name) {
            self.enums.push(e);
        }
        for value in &e.values {
            self.values.insert(value);
        }
    }
    fn enum_index(&self, e: &CommandEnum) -> Result<usize, EncodeError> {
        self.enum_names.get(&e.name).ok_or_else(|| EncodeError::UnknownEnum(e.name.clone()))
    }
}

fn put_strings(cur: &mut ByteCursor, strings: &[&str]) {
    cur.put_unsigned_var_int(strings.len() as u32);
    for s in strings {
        cur.put_string(s);
    }
}

fn put_soft_enum(cur: &mut ByteCursor, e: &CommandEnum) {
    cur.put_string(&e.name);
    e.values.encode(cur);
}
fn get_soft_enum(cur: &mut ByteCursor) -> Result<CommandEnum, WireError> {
    Ok(CommandEnum { name: cur.get_string()?, values: Vec::decode(cur)? })
}

fn get_enum(cur: &mut ByteCursor, values: &[String]) -> Result<CommandEnum, WireError> {
    let name = cur.get_string()?;
    let count = cur.get_unsigned_var_int()?;
    let mut e = CommandEnum { name, values: Vec::new() };
    for _ in 0..count {
        let index = get_enum_value_index(cur, values.len())?;
        e.values.push(lookup(values, index)?);
    }
    Ok(e)
}

fn get_command_data(cur: &mut ByteCursor, enums: &[CommandEnum], postfixes: &[String]) -> Result<CommandData, WireError> {
    let mut data = CommandData {
        name: cur.get_string()?,
        description: cur.get_string()?,
        flags: cur.get_u8()?,
        permission: cur.get_u8()?,
        ..Default::default()
    };
    data.aliases = match cur.get_i32_le()? {
        -1 => None,
        index => Some(lookup(enums, index as usize)?),
    };
    for _ in 0..cur.get_unsigned_var_int()? {
        let count = cur.get_unsigned_var_int()?;
        let mut overload = Vec::new();
        for _ in 0..count {
            let name = cur.get_string()?;
            let raw = cur.get_u32_le()?;
            let optional = cur.get_bool()?;
            let flags = cur.get_u8()?;
            let index = (raw & 0xffff) as usize;
            let kind = if raw & AvailableCommands::ARG_FLAG_ENUM != 0 {
                ParamType::Enum(lookup(enums, index)?)
            } else if raw & AvailableCommands::ARG_FLAG_POSTFIX != 0 {
                ParamType::Postfix(lookup(postfixes, index)?)
            } else if raw & AvailableCommands::ARG_FLAG_VALID == 0 {
                return Err(WireError::Unexpected(format!(
                    "{} parameter {name}: invalid parameter type 0x{raw:x}",
                    data.name
                )));
            } else {
                ParamType::Basic(raw)
            };
            overload.push(CommandParameter { name, kind, optional, flags });
        }
        data.overloads.push(overload);
    }
    Ok(data)
}

fn put_command_data(cur: &mut ByteCursor, data: &CommandData, tables: &Tables) -> Result<(), EncodeError> {
    cur.put_string(&data.name);
    cur.put_string(&data.description);
    cur.put_u8(data.flags);
    cur.put_u8(data.permission);
    let alias = match &data.aliases {
        Some(e) => tables.enum_index(e)? as i32,
        None => -1,
    };
    cur.put_i32_le(alias);

    cur.put_unsigned_var_int(data.overloads.len() as u32);
    for overload in &data.overloads {
        cur.put_unsigned_var_int(overload.len() as u32);
        for param in overload {
            cur.put_string(&param.name);
            let raw = match &param.kind {
                ParamType::Enum(e) => {
                    AvailableCommands::ARG_FLAG_ENUM | AvailableCommands::ARG_FLAG_VALID | tables.enum_index(e)? as u32
                }
                ParamType::Postfix(p) => {
                    let index = tables.postfixes.get(p).ok_or_else(|| EncodeError::UnknownPostfix(p.clone()))?;
                    AvailableCommands::ARG_FLAG_POSTFIX | index as u32
                }
                ParamType::Basic(raw) => *raw,
            };
            cur.put_u32_le(raw);
            cur.put_bool(param.optional);
            cur.put_u8(param.flags);
        }
    }
    Ok(())
}

impl PacketPayload for AvailableCommands {
    const ID: u32 = 0x4c;
    const NAME: &'static str = "AvailableCommands";
    fn decode_payload(cur: &mut ByteCursor) -> Result<Self, FieldError> {
        let values: Vec<String> = Vec::decode(cur).field("enum_values")?;
        let postfixes: Vec<String> = Vec::decode(cur).field("postfixes")?;

        let count = cur.get_unsigned_var_int().field("enums")?;
        let mut enums = Vec::new();
        for _ in 0..count {
            enums.push(get_enum(cur, &values).field("enums")?);
        }

        let count = cur.get_unsigned_var_int().field("commands")?;
        let mut commands = Vec::new();
        for _ in 0..count {
            commands.push(get_command_data(cur, &enums, &postfixes).field("commands")?);
        }

        let count = cur.get_unsigned_var_int().field("soft_enums")?;
        let mut soft_enums = Vec::new();
        for _ in 0..count {
            soft_enums.push(get_soft_enum(cur).field("soft_enums")?);
        }
        Ok(Self { commands, soft_enums })
    }

    fn encode_payload(&self, cur: &mut ByteCursor) -> Result<(), EncodeError> {
        let tables = Tables::scan(&self.commands);
        log::trace!(
            "command tables: {} values, {} postfixes, {} enums",
            tables.values.names.len(),
            tables.postfixes.names.len(),
            tables.enums.len()
        );
        put_strings(cur, &tables.values.names);
        put_strings(cur, &tables.postfixes.names);

        let pool_len = tables.values.names.len();
        cur.put_unsigned_var_int(tables.enums.len() as u32);
        for e in &tables.enums {
            cur.put_string(&e.name);
            cur.put_unsigned_var_int(e.values.len() as u32);
            for value in &e.values {
                let index = tables.values.get(value).ok_or_else(|| EncodeError::UnknownEnumValue(value.clone()))?;
                put_enum_value_index(cur, index, pool_len);
            }
        }

        cur.put_unsigned_var_int(self.commands.len() as u32);
        for data in &self.commands {
            put_command_data(cur, data, &tables)?;
        }

        cur.put_unsigned_var_int(self.soft_enums.len() as u32);
        for e in &self.soft_enums {
            put_soft_enum(cur, e);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub command: String,
    pub origin: CommandOrigin,
    pub is_internal: bool,
}
impl PacketPayload for CommandRequest {
    const ID: u32 = 0x4d;
    const NAME: &'static str = "CommandRequest";
    fn decode_payload(cur: &mut ByteCursor) -> Result<Self, FieldError> {
        Ok(Self {
            command: cur.get_string().field("command")?,
            origin: cur.get_command_origin().field("origin")?,
            is_internal: cur.get_bool().field("is_internal")?,
        })
    }
    fn encode_payload(&self, cur: &mut ByteCursor) -> Result<(), EncodeError> {
        cur.put_string(&self.command);
        cur.put_command_origin(&self.origin);
        cur.put_bool(self.is_internal);
        Ok(())
    }
}
