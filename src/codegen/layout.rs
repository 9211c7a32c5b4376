// Linear-memory layout and wasm value representation (§4.4.1, §9).
//
// Every Clarity value maps to exactly one wasm primitive: `Int64` is an
// `i64`, `Float64` an `f64`, `Unit` contributes no value at all, and
// everything else (`Bool`, `String`, `Bytes`, `List`, `Map`, `Record`,
// `Union` — which covers `Option`/`Result` too — and `Function`) is an
// `i32`: either a handle into a `runtime::HostState` arena (String, Bytes,
// List, Map), a bump-allocated pointer into the module's own linear memory
// (Record, Union), or a function-table index (Function).

use crate::types::{RecordType, Type, UnionType};
use wasm_encoder::ValType;

pub fn wasm_valtype(ty: &Type) -> Option<ValType> {
    match ty {
        Type::Unit => None,
        // `Timestamp` is epoch milliseconds and needs the full 64 bits,
        // same as `Int64` — an `i32` would wrap a few weeks past 1970.
        Type::Int64 | Type::Timestamp => Some(ValType::I64),
        Type::Float64 => Some(ValType::F64),
        _ => Some(ValType::I32),
    }
}

/// 0 or 1 — how many wasm values `ty` occupies on the stack.
pub fn repr_count(ty: &Type) -> usize {
    usize::from(wasm_valtype(ty).is_some())
}

/// Natural size in bytes of one field slot for `ty`. Independent of stack
/// representation: this is storage layout, not calling convention.
pub fn field_size(ty: &Type) -> u32 {
    match ty {
        Type::Int64 | Type::Float64 | Type::Timestamp => 8,
        _ => 4,
    }
}

fn align_up(offset: u32, align: u32) -> u32 {
    if align == 0 {
        offset
    } else {
        (offset + align - 1) / align * align
    }
}

#[derive(Debug, Clone)]
pub struct FieldLayout {
    pub name: String,
    pub offset: u32,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct RecordLayout {
    pub fields: Vec<FieldLayout>,
    pub size: u32,
}

impl RecordLayout {
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Naturally-aligned field layout (§9's explicit correction of the
/// source's packing bug): each field's offset is rounded up to its own
/// size, so an 8-byte field never starts mid-word, and the record's total
/// size is padded up to the widest field's alignment.
pub fn layout_record(record: &RecordType) -> RecordLayout {
    layout_fields_from(&record.fields, 0)
}

pub fn layout_fields(fields: &[(String, Type)]) -> RecordLayout {
    layout_fields_from(fields, 0)
}

/// Lays fields out starting at absolute offset `start` (nonzero when a
/// union tag precedes them), so each field's own alignment is computed
/// against its true address rather than shifted after the fact.
fn layout_fields_from(fields: &[(String, Type)], start: u32) -> RecordLayout {
    let mut offset = start;
    let mut max_align = 4u32;
    let mut out = Vec::with_capacity(fields.len());
    for (name, ty) in fields {
        let size = field_size(ty);
        offset = align_up(offset, size);
        out.push(FieldLayout { name: name.clone(), offset, ty: ty.clone() });
        offset += size;
        max_align = max_align.max(size);
    }
    RecordLayout { fields: out, size: align_up(offset, max_align) }
}

#[derive(Debug, Clone)]
pub struct UnionLayout {
    pub variants: Vec<RecordLayout>,
}

impl UnionLayout {
    pub fn variant(&self, tag: u32) -> &RecordLayout {
        &self.variants[tag as usize]
    }
}

/// The tag occupies the first 4 bytes of every variant's allocation;
/// each variant's own fields are laid out starting right after it, so a
/// `Circle(r: Float64)` and a `Square` variant of the same union can have
/// different total sizes — the constructor call site allocates exactly
/// what its variant needs.
pub fn layout_union(union: &UnionType) -> UnionLayout {
    let variants = union.variants.iter().map(|v| layout_fields_from(&v.fields, 4)).collect();
    UnionLayout { variants }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int64_field_after_bool_is_8_byte_aligned() {
        let fields = vec![("flag".to_string(), Type::Bool), ("count".to_string(), Type::Int64)];
        let layout = layout_fields(&fields);
        assert_eq!(layout.field("flag").unwrap().offset, 0);
        assert_eq!(layout.field("count").unwrap().offset, 8);
        assert_eq!(layout.size, 16);
    }

    #[test]
    fn union_variants_have_independent_sizes() {
        let union = UnionType {
            name: "Shape".into(),
            variants: vec![
                crate::types::UnionVariant { name: "Circle".into(), fields: vec![("r".into(), Type::Float64)] },
                crate::types::UnionVariant { name: "Square".into(), fields: vec![] },
            ],
        };
        let layout = layout_union(&union);
        assert_eq!(layout.variant(0).field("r").unwrap().offset, 8);
        assert_eq!(layout.variant(0).size, 16);
        assert_eq!(layout.variant(1).size, 4);
    }
}
