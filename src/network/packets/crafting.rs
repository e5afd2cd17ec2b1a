use uuid::Uuid;

use super::PacketPayload;
use crate::network::error::{EncodeError, FieldError, FieldExt, WireError};
use crate::network::wire::{ByteCursor, Wire};
use crate::types::{Ingredient, Item};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShapelessRecipe {
    pub recipe_id: String,
    pub inputs: Vec<Ingredient>,
    pub outputs: Vec<Item>,
    pub uuid: Uuid,
    pub block: String,
    pub priority: i32,
}

/// `inputs` holds `width * height` ingredients, row by row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShapedRecipe {
    pub recipe_id: String,
    pub width: i32,
    pub height: i32,
    pub inputs: Vec<Ingredient>,
    pub outputs: Vec<Item>,
    pub uuid: Uuid,
    pub block: String,
    pub priority: i32,
}

/// `input_meta` is only sent for data-specific recipes; `Some(-1)` matches any meta.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FurnaceRecipe {
    pub input_id: i32,
    pub input_meta: Option<i32>,
    pub output: Item,
    pub block: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecipeEntry {
    Shapeless(ShapelessRecipe),
    Shaped(ShapedRecipe),
    Furnace(FurnaceRecipe),
    Multi(Uuid),
    ShulkerBox(ShapelessRecipe),
    ShapelessChemistry(ShapelessRecipe),
    ShapedChemistry(ShapedRecipe),
}
impl RecipeEntry {
    pub const SHAPELESS: i32 = 0;
    pub const SHAPED: i32 = 1;
    pub const FURNACE: i32 = 2;
    pub const FURNACE_DATA: i32 = 3;
    pub const MULTI: i32 = 4;
    pub const SHULKER_BOX: i32 = 5;
    pub const SHAPELESS_CHEMISTRY: i32 = 6;
    pub const SHAPED_CHEMISTRY: i32 = 7;

    pub fn type_id(&self) -> i32 {
        match self {
            Self::Shapeless(_) => Self::SHAPELESS,
            Self::Shaped(_) => Self::SHAPED,
            Self::Furnace(FurnaceRecipe { input_meta: None, .. }) => Self::FURNACE,
            Self::Furnace(_) => Self::FURNACE_DATA,
            Self::Multi(_) => Self::MULTI,
            Self::ShulkerBox(_) => Self::SHULKER_BOX,
            Self::ShapelessChemistry(_) => Self::SHAPELESS_CHEMISTRY,
            Self::ShapedChemistry(_) => Self::SHAPED_CHEMISTRY,
        }
    }

    fn decode(cur: &mut ByteCursor) -> Result<Self, WireError> {
        Ok(match cur.get_var_int()? {
            Self::SHAPELESS => Self::Shapeless(get_shapeless(cur)?),
            Self::SHULKER_BOX => Self::ShulkerBox(get_shapeless(cur)?),
            Self::SHAPELESS_CHEMISTRY => Self::ShapelessChemistry(get_shapeless(cur)?),
            Self::SHAPED => Self::Shaped(get_shaped(cur)?),
            Self::SHAPED_CHEMISTRY => Self::ShapedChemistry(get_shaped(cur)?),
            kind @ (Self::FURNACE | Self::FURNACE_DATA) => {
                let input_id = cur.get_var_int()?;
                let input_meta = if kind == Self::FURNACE_DATA {
                    Some(match cur.get_var_int()? {
                        0x7fff => -1,
                        meta => meta,
                    })
                } else {
                    None
                };
                Self::Furnace(FurnaceRecipe { input_id, input_meta, output: cur.get_slot()?, block: cur.get_string()? })
            }
            Self::MULTI => Self::Multi(cur.get_uuid()?),
            other => return Err(WireError::Unexpected(format!("unhandled recipe type {other}"))),
        })
    }

    fn encode(&self, cur: &mut ByteCursor) -> Result<(), EncodeError> {
        cur.put_var_int(self.type_id());
        match self {
            Self::Shapeless(r) | Self::ShulkerBox(r) | Self::ShapelessChemistry(r) => put_shapeless(cur, r),
            Self::Shaped(r) | Self::ShapedChemistry(r) => put_shaped(cur, r),
            Self::Furnace(r) => {
                cur.put_var_int(r.input_id);
                if let Some(meta) = r.input_meta {
                    cur.put_var_int(meta & 0x7fff);
                }
                cur.put_slot(&r.output)?;
                cur.put_string(&r.block);
                Ok(())
            }
            Self::Multi(uuid) => {
                cur.put_uuid(uuid);
                Ok(())
            }
        }
    }
}

fn get_outputs(cur: &mut ByteCursor) -> Result<Vec<Item>, WireError> {
    let count = cur.get_unsigned_var_int()? as usize;
    let mut outputs = Vec::with_capacity(count.min(cur.remaining()));
    for _ in 0..count {
        outputs.push(cur.get_slot()?);
    }
    Ok(outputs)
}
fn put_outputs(cur: &mut ByteCursor, outputs: &[Item]) -> Result<(), EncodeError> {
    cur.put_unsigned_var_int(outputs.len() as u32);
    for item in outputs {
        cur.put_slot(item)?;
    }
    Ok(())
}

fn get_shapeless(cur: &mut ByteCursor) -> Result<ShapelessRecipe, WireError> {
    Ok(ShapelessRecipe {
        recipe_id: cur.get_string()?,
        inputs: Vec::decode(cur)?,
        outputs: get_outputs(cur)?,
        uuid: cur.get_uuid()?,
        block: cur.get_string()?,
        priority: cur.get_var_int()?,
    })
}
fn put_shapeless(cur: &mut ByteCursor, r: &ShapelessRecipe) -> Result<(), EncodeError> {
    cur.put_string(&r.recipe_id);
    r.inputs.encode(cur);
    put_outputs(cur, &r.outputs)?;
    cur.put_uuid(&r.uuid);
    cur.put_string(&r.block);
    cur.put_var_int(r.priority);
    Ok(())
}

fn get_shaped(cur: &mut ByteCursor) -> Result<ShapedRecipe, WireError> {
    let recipe_id = cur.get_string()?;
    let width = cur.get_var_int()?;
    let height = cur.get_var_int()?;
    let count = usize::try_from(width)
        .ok()
        .zip(usize::try_from(height).ok())
        .and_then(|(w, h)| w.checked_mul(h))
        .ok_or_else(|| WireError::Unexpected(format!("bad recipe shape {width}x{height}")))?;
    let mut inputs = Vec::with_capacity(count.min(cur.remaining()));
    for _ in 0..count {
        inputs.push(Ingredient::decode(cur)?);
    }
    Ok(ShapedRecipe {
        recipe_id,
        width,
        height,
        inputs,
        outputs: get_outputs(cur)?,
        uuid: cur.get_uuid()?,
        block: cur.get_string()?,
        priority: cur.get_var_int()?,
    })
}
fn put_shaped(cur: &mut ByteCursor, r: &ShapedRecipe) -> Result<(), EncodeError> {
    let expected = usize::try_from(r.width).ok().zip(usize::try_from(r.height).ok()).and_then(|(w, h)| w.checked_mul(h));
    if expected != Some(r.inputs.len()) {
        return Err(EncodeError::RecipeShape { width: r.width, height: r.height, inputs: r.inputs.len() });
    }
    cur.put_string(&r.recipe_id);
    cur.put_var_int(r.width);
    cur.put_var_int(r.height);
    for ingredient in &r.inputs {
        ingredient.encode(cur);
    }
    put_outputs(cur, &r.outputs)?;
    cur.put_uuid(&r.uuid);
    cur.put_string(&r.block);
    cur.put_var_int(r.priority);
    Ok(())
}

/// All recipes known to the client. An entry of unknown type aborts the whole decode.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CraftingData {
    pub entries: Vec<RecipeEntry>,
    pub clean_recipes: bool,
}
impl PacketPayload for CraftingData {
    const ID: u32 = 0x34;
    const NAME: &'static str = "CraftingData";
    fn decode_payload(cur: &mut ByteCursor) -> Result<Self, FieldError> {
        let count = cur.get_unsigned_var_int().field("entries")?;
        let mut entries = Vec::new();
        for _ in 0..count {
            entries.push(RecipeEntry::decode(cur).field("entries")?);
        }
        Ok(Self { entries, clean_recipes: cur.get_bool().field("clean_recipes")? })
    }
    fn encode_payload(&self, cur: &mut ByteCursor) -> Result<(), EncodeError> {
        cur.put_unsigned_var_int(self.entries.len() as u32);
        for entry in &self.entries {
            entry.encode(cur)?;
        }
        cur.put_bool(self.clean_recipes);
        Ok(())
    }
}
