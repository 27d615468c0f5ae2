//! Rust source emission from parsed definitions.
//!
//! [`clientbound`] turns definitions into packet structs with `read`
//! constructors plus a dispatch enum over the id-bearing ones;
//! [`serverbound`] turns them into builder functions returning
//! `(wire id, payload)`. Both are driven from the packet crate's `build.rs`,
//! so every rejection here is a compile-time failure.

use std::collections::HashMap;

use crate::error::CodegenError;
use crate::parser::{ArgDef, ArgForm, Definition};

/// Emits structs, read constructors and the `Clientbound` dispatch enum.
pub fn clientbound(definitions: &[Definition]) -> Result<String, CodegenError> {
    check_duplicates(definitions)?;
    let param_types = infer_param_types(definitions)?;

    let mut src = Source::new();
    emit_header(&mut src);

    for definition in definitions {
        if definition.id.is_some() && !definition.params.is_empty() {
            return Err(CodegenError::DispatchWithParams {
                definition: definition.name.clone(),
            });
        }
        emit_struct(&mut src, definition, &param_types)?;
    }

    let dispatched: Vec<&Definition> = definitions
        .iter()
        .filter(|definition| definition.id.is_some())
        .collect();
    if !dispatched.is_empty() {
        emit_dispatch(&mut src, &dispatched);
    }

    Ok(src.finish())
}

/// Emits one builder function per definition, named after it.
pub fn serverbound(definitions: &[Definition]) -> Result<String, CodegenError> {
    check_duplicates(definitions)?;

    let mut src = Source::new();
    emit_header(&mut src);

    for definition in definitions {
        emit_builder(&mut src, definition)?;
    }

    Ok(src.finish())
}

fn emit_header(src: &mut Source) {
    src.line("// Generated by redstone-schema from an MBM protocol file.");
    src.line("// Do not edit by hand.");
    src.blank();
    src.line("use redstone_buf::{ByteCursor, Position, Uuid};");
    src.line("use redstone_nbt::Tag;");
    src.blank();
    src.line("use crate::error::ProtoError;");
    src.line("use crate::types::{EntityMeta, Slot};");
    src.blank();
}

// ---------------------------------------------------------------------------
// Read side
// ---------------------------------------------------------------------------

fn emit_struct(
    src: &mut Source,
    definition: &Definition,
    param_types: &HashMap<(String, String), String>,
) -> Result<(), CodegenError> {
    let fields: Vec<&ArgDef> = definition
        .args
        .iter()
        .filter_map(|arg| match arg {
            ArgForm::Def(def) => Some(def),
            _ => None,
        })
        .collect();

    src.line("#[derive(Debug, Clone, PartialEq)]");
    if fields.is_empty() {
        src.line(&format!("pub struct {};", definition.cls));
    } else {
        src.open(&format!("pub struct {} {{", definition.cls));
        for field in &fields {
            src.line(&format!("pub {}: {},", field.name, field_type(field)));
        }
        src.close("}");
    }
    src.blank();

    src.open(&format!("impl {} {{", definition.cls));
    if let Some(id) = definition.id {
        src.line(&format!("pub const ID: i32 = 0x{id:x};"));
    }
    src.line(&format!(
        "pub const NAME: &'static str = \"{}\";",
        definition.name
    ));
    src.blank();

    let mut signature = String::from("pub fn read(buf: &mut ByteCursor");
    for param in &definition.params {
        let ty = param_types
            .get(&(definition.cls.clone(), param.clone()))
            .ok_or_else(|| CodegenError::ParamType {
                param: param.clone(),
                definition: definition.name.clone(),
            })?;
        signature.push_str(&format!(", {param}: {ty}"));
    }
    signature.push_str(") -> Result<Self, ProtoError> {");
    src.open(&signature);

    let mut in_condition = false;
    for arg in &definition.args {
        match arg {
            ArgForm::Def(def) if def.referenced => {
                src.line(&format!("let mut {} = None;", def.name));
            }
            ArgForm::Def(def) => emit_read_binding(src, def, true)?,
            ArgForm::Condition(cond) => {
                if in_condition {
                    src.close("}");
                }
                src.open(&format!("if {} {} {} {{", cond.name, cond.op, cond.value));
                in_condition = true;
            }
            ArgForm::ConditionDisable => {
                if in_condition {
                    src.close("}");
                    in_condition = false;
                }
            }
            ArgForm::Reference { name, target } => {
                let def = resolve(definition, *target, name)?;
                emit_read_binding(src, def, false)?;
            }
        }
    }
    if in_condition {
        src.close("}");
    }

    if fields.is_empty() {
        src.line("let _ = buf;");
        src.line("Ok(Self)");
    } else {
        let names: Vec<&str> = fields.iter().map(|field| field.name.as_str()).collect();
        src.line(&format!("Ok(Self {{ {} }})", names.join(", ")));
    }
    src.close("}");
    src.close("}");
    src.blank();
    Ok(())
}

/// Emits the statement(s) reading one argument. With `declare` the value is
/// bound with `let`; without, it is assigned into the pre-declared `Option`
/// of a referenced argument.
fn emit_read_binding(src: &mut Source, def: &ArgDef, declare: bool) -> Result<(), CodegenError> {
    let assign = |some: bool, expr: &str| {
        if declare {
            format!("let {} = {};", def.name, expr)
        } else if some {
            format!("{} = Some({});", def.name, expr)
        } else {
            format!("{} = {};", def.name, expr)
        }
    };

    match (&def.vec_count_cls, def.optional) {
        (None, false) => {
            src.line(&assign(true, &read_expr(&def.cls, &def.ctor_args)));
        }
        (None, true) => {
            let expr = format!(
                "if buf.read_bool()? {{ Some({}) }} else {{ None }}",
                read_expr(&def.cls, &def.ctor_args)
            );
            src.line(&assign(false, &expr));
        }
        (Some(count_cls), optional) => {
            // A vector: read the count, then the elements. Byte vectors are
            // read as one raw run instead of element-by-element.
            let count = count_read_expr(count_cls, &def.name)?;
            if optional {
                if declare {
                    src.open(&format!("let {} = if buf.read_bool()? {{", def.name));
                } else {
                    src.open(&format!("{} = if buf.read_bool()? {{", def.name));
                }
                src.line(&format!("let count = {count};"));
                src.line(&format!("Some({})", vec_expr(def)));
                src.close_open("} else {");
                src.line("None");
                src.close("};");
            } else {
                src.line(&format!("let count = {count};"));
                src.line(&assign(true, &vec_expr(def)));
            }
        }
    }
    Ok(())
}

/// The element-reading expression for a vector argument, assuming a local
/// `count` is in scope.
fn vec_expr(def: &ArgDef) -> String {
    if def.cls == "u8" {
        "buf.read_exact(count)?.to_vec()".to_string()
    } else {
        format!(
            "crate::types::read_vec(buf, count, |buf| Ok({}))?",
            read_expr(&def.cls, &def.ctor_args)
        )
    }
}

fn read_expr(cls: &str, ctor_args: &[String]) -> String {
    let simple = match cls {
        "i8" => "buf.read_i8()?",
        "u8" => "buf.read_u8()?",
        "i16" => "buf.read_i16()?",
        "u16" => "buf.read_u16()?",
        "i32" => "buf.read_i32()?",
        "u32" => "buf.read_u32()?",
        "i64" => "buf.read_i64()?",
        "u64" => "buf.read_u64()?",
        "bool" => "buf.read_bool()?",
        "float" => "buf.read_f32()?",
        "double" => "buf.read_f64()?",
        "vari32" => "buf.read_varint32()?",
        "vari64" => "buf.read_varint64()?",
        "str" => "buf.read_str()?",
        "bytes" => "buf.read_left()",
        "uuid" => "buf.read_uuid()?",
        "pos" => "buf.read_pos()?",
        "angle" => "buf.read_angle()?",
        "nbt" => "crate::types::read_nbt(buf)?",
        "entmeta" => "crate::types::read_entity_meta(buf)?",
        "slot" => "crate::types::read_slot(buf)?",
        _ => "",
    };
    if !simple.is_empty() {
        return simple.to_string();
    }
    let mut call = format!("{cls}::read(buf");
    for arg in ctor_args {
        call.push_str(&format!(", {arg}.clone()"));
    }
    call.push_str(")?");
    call
}

fn count_read_expr(cls: &str, arg_name: &str) -> Result<String, CodegenError> {
    let reader = match cls {
        "i8" => "read_i8",
        "u8" => "read_u8",
        "i16" => "read_i16",
        "u16" => "read_u16",
        "i32" => "read_i32",
        "u32" => "read_u32",
        "i64" => "read_i64",
        "u64" => "read_u64",
        "vari32" => "read_varint32",
        "vari64" => "read_varint64",
        _ => {
            return Err(CodegenError::VectorCount {
                cls: cls.to_string(),
                definition: arg_name.to_string(),
            })
        }
    };
    Ok(format!("buf.{reader}()? as usize"))
}

fn emit_dispatch(src: &mut Source, dispatched: &[&Definition]) {
    src.line("/// Every id-bearing inbound packet of this schema.");
    src.line("#[derive(Debug, Clone, PartialEq)]");
    src.open("pub enum Clientbound {");
    for definition in dispatched {
        src.line(&format!("{}({}),", definition.cls, definition.cls));
    }
    src.close("}");
    src.blank();

    src.open("impl Clientbound {");
    src.line("/// Constructs the typed packet for a wire id; `None` for ids");
    src.line("/// this schema does not know.");
    src.open("pub fn decode(pid: i32, buf: &mut ByteCursor) -> Result<Option<Self>, ProtoError> {");
    src.open("Ok(Some(match pid {");
    for definition in dispatched {
        let id = definition.id.unwrap_or(0);
        src.line(&format!(
            "0x{id:x} => Clientbound::{cls}({cls}::read(buf)?),",
            cls = definition.cls
        ));
    }
    src.line("_ => return Ok(None),");
    src.close("}))");
    src.close("}");
    src.blank();

    src.open("pub fn name(&self) -> &'static str {");
    src.open("match self {");
    for definition in dispatched {
        src.line(&format!(
            "Clientbound::{cls}(_) => {cls}::NAME,",
            cls = definition.cls
        ));
    }
    src.close("}");
    src.close("}");
    src.close("}");
    src.blank();
}

// ---------------------------------------------------------------------------
// Write side
// ---------------------------------------------------------------------------

fn emit_builder(src: &mut Source, definition: &Definition) -> Result<(), CodegenError> {
    if !definition.params.is_empty() {
        return Err(CodegenError::WriteWithParams {
            definition: definition.name.clone(),
        });
    }
    let id = definition.id.ok_or_else(|| CodegenError::WriteWithoutId {
        definition: definition.name.clone(),
    })?;

    let mut signature = format!("pub fn {}(", definition.name);
    let mut first = true;
    for arg in &definition.args {
        if let ArgForm::Def(def) = arg {
            if !first {
                signature.push_str(", ");
            }
            first = false;
            signature.push_str(&format!("{}: {}", def.name, write_param_type(def, definition)?));
        }
    }
    signature.push_str(") -> Result<(i32, Vec<u8>), ProtoError> {");

    src.open(&signature);
    src.line("let mut buf = ByteCursor::new();");

    let mut in_condition = false;
    for arg in &definition.args {
        match arg {
            ArgForm::Def(def) if def.referenced => {}
            ArgForm::Def(def) if def.optional => emit_optional_write(src, def, definition)?,
            ArgForm::Def(def) => emit_write(src, def, &def.name, definition)?,
            ArgForm::Condition(cond) => {
                if in_condition {
                    src.close("}");
                }
                src.open(&format!("if {} {} {} {{", cond.name, cond.op, cond.value));
                in_condition = true;
            }
            ArgForm::ConditionDisable => {
                if in_condition {
                    src.close("}");
                    in_condition = false;
                }
            }
            ArgForm::Reference { name, target } => {
                let def = resolve(definition, *target, name)?;
                if def.optional {
                    emit_optional_write(src, def, definition)?;
                } else {
                    src.line(&format!(
                        "let {name} = {name}.ok_or(ProtoError::MissingField(\"{name}\"))?;"
                    ));
                    emit_write(src, def, name, definition)?;
                }
            }
        }
    }
    if in_condition {
        src.close("}");
    }

    src.line(&format!("Ok((0x{id:x}, buf.into_vec()))"));
    src.close("}");
    src.blank();
    Ok(())
}

/// An optional value writes a presence bool, then the value iff present.
fn emit_optional_write(
    src: &mut Source,
    def: &ArgDef,
    definition: &Definition,
) -> Result<(), CodegenError> {
    src.open(&format!("match {} {{", def.name));
    src.open("Some(value) => {");
    src.line("buf.write_bool(true);");
    emit_write(src, def, "value", definition)?;
    src.close("}");
    src.line("None => buf.write_bool(false),");
    src.close("}");
    Ok(())
}

fn emit_write(
    src: &mut Source,
    def: &ArgDef,
    value: &str,
    definition: &Definition,
) -> Result<(), CodegenError> {
    if let Some(count_cls) = &def.vec_count_cls {
        src.line(&count_write_stmt(count_cls, value, definition)?);
        src.open(&format!("for item in {value} {{"));
        src.line(&write_stmt(&def.cls, loop_value(&def.cls), definition)?);
        src.close("}");
    } else {
        src.line(&write_stmt(&def.cls, value, definition)?);
    }
    Ok(())
}

fn write_stmt(cls: &str, value: &str, definition: &Definition) -> Result<String, CodegenError> {
    let stmt = match cls {
        "i8" => format!("buf.write_i8({value});"),
        "u8" => format!("buf.write_u8({value});"),
        "i16" => format!("buf.write_i16({value});"),
        "u16" => format!("buf.write_u16({value});"),
        "i32" => format!("buf.write_i32({value});"),
        "u32" => format!("buf.write_u32({value});"),
        "i64" => format!("buf.write_i64({value});"),
        "u64" => format!("buf.write_u64({value});"),
        "bool" => format!("buf.write_bool({value});"),
        "float" => format!("buf.write_f32({value});"),
        "double" => format!("buf.write_f64({value});"),
        "vari32" => format!("buf.write_varint32({value});"),
        "vari64" => format!("buf.write_varint64({value});"),
        "str" => format!("buf.write_str({value});"),
        "bytes" => format!("buf.write_bytes({value});"),
        "uuid" => format!("buf.write_uuid({value});"),
        "pos" => format!("buf.write_pos({value});"),
        "angle" => format!("buf.write_angle({value});"),
        "nbt" => format!("crate::types::write_nbt({value}, &mut buf);"),
        "slot" => format!("crate::types::write_slot({value}, &mut buf);"),
        other => {
            return Err(CodegenError::UnsupportedWrite {
                cls: other.to_string(),
                definition: definition.name.clone(),
            })
        }
    };
    Ok(stmt)
}

/// Loop items are references; dereference the `Copy` kinds.
fn loop_value(cls: &str) -> &'static str {
    match cls {
        "str" | "bytes" | "nbt" => "item",
        "slot" => "item.as_ref()",
        _ => "*item",
    }
}

fn count_write_stmt(
    count_cls: &str,
    value: &str,
    definition: &Definition,
) -> Result<String, CodegenError> {
    let stmt = match count_cls {
        "i8" => format!("buf.write_i8({value}.len() as i8);"),
        "u8" => format!("buf.write_u8({value}.len() as u8);"),
        "i16" => format!("buf.write_i16({value}.len() as i16);"),
        "u16" => format!("buf.write_u16({value}.len() as u16);"),
        "i32" => format!("buf.write_i32({value}.len() as i32);"),
        "u32" => format!("buf.write_u32({value}.len() as u32);"),
        "i64" => format!("buf.write_i64({value}.len() as i64);"),
        "u64" => format!("buf.write_u64({value}.len() as u64);"),
        "vari32" => format!("buf.write_varint32({value}.len() as i32);"),
        "vari64" => format!("buf.write_varint64({value}.len() as i64);"),
        other => {
            return Err(CodegenError::VectorCount {
                cls: other.to_string(),
                definition: definition.name.clone(),
            })
        }
    };
    Ok(stmt)
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

fn rust_type(cls: &str) -> String {
    match cls {
        "i8" | "u8" | "i16" | "u16" | "i32" | "u32" | "i64" | "u64" | "bool" => cls.to_string(),
        "float" => "f32".to_string(),
        "double" => "f64".to_string(),
        "vari32" => "i32".to_string(),
        "vari64" => "i64".to_string(),
        "str" => "String".to_string(),
        "bytes" => "Vec<u8>".to_string(),
        "uuid" => "Uuid".to_string(),
        "pos" => "Position".to_string(),
        "angle" => "u8".to_string(),
        "nbt" => "Tag".to_string(),
        "entmeta" => "EntityMeta".to_string(),
        "slot" => "Option<Slot>".to_string(),
        other => other.to_string(),
    }
}

fn field_type(def: &ArgDef) -> String {
    let base = if def.vec_count_cls.is_some() {
        if def.cls == "u8" {
            "Vec<u8>".to_string()
        } else {
            format!("Vec<{}>", rust_type(&def.cls))
        }
    } else {
        rust_type(&def.cls)
    };
    if def.optional || def.referenced {
        format!("Option<{base}>")
    } else {
        base
    }
}

fn write_param_type(def: &ArgDef, definition: &Definition) -> Result<String, CodegenError> {
    let base = if def.vec_count_cls.is_some() {
        format!("&[{}]", rust_type(&def.cls))
    } else {
        match def.cls.as_str() {
            "i8" | "u8" | "i16" | "u16" | "i32" | "u32" | "i64" | "u64" | "bool" => {
                def.cls.clone()
            }
            "float" => "f32".to_string(),
            "double" => "f64".to_string(),
            "vari32" => "i32".to_string(),
            "vari64" => "i64".to_string(),
            "str" => "&str".to_string(),
            "bytes" => "&[u8]".to_string(),
            "uuid" => "Uuid".to_string(),
            "pos" => "Position".to_string(),
            "angle" => "u8".to_string(),
            "nbt" => "&Tag".to_string(),
            "slot" => "Option<&Slot>".to_string(),
            other => {
                return Err(CodegenError::UnsupportedWrite {
                    cls: other.to_string(),
                    definition: definition.name.clone(),
                })
            }
        }
    };
    if def.optional || def.referenced {
        Ok(format!("Option<{base}>"))
    } else {
        Ok(base)
    }
}

// ---------------------------------------------------------------------------
// Shared checks
// ---------------------------------------------------------------------------

fn check_duplicates(definitions: &[Definition]) -> Result<(), CodegenError> {
    let mut seen = HashMap::new();
    for definition in definitions {
        if seen.insert(definition.cls.as_str(), ()).is_some() {
            return Err(CodegenError::DuplicateClass {
                cls: definition.cls.clone(),
            });
        }
    }
    Ok(())
}

/// Types for `?param` parameters, inferred from `@ctor-arg` call sites.
///
/// Keyed by `(callee cls, param name)`; every use site must agree.
fn infer_param_types(
    definitions: &[Definition],
) -> Result<HashMap<(String, String), String>, CodegenError> {
    let by_cls: HashMap<&str, &Definition> = definitions
        .iter()
        .map(|definition| (definition.cls.as_str(), definition))
        .collect();

    let mut types: HashMap<(String, String), String> = HashMap::new();
    for caller in definitions {
        for arg in &caller.args {
            let ArgForm::Def(def) = arg else { continue };
            if def.ctor_args.is_empty() {
                continue;
            }
            let Some(callee) = by_cls.get(def.cls.as_str()) else {
                continue;
            };
            if callee.params.len() != def.ctor_args.len() {
                return Err(CodegenError::CtorArity {
                    cls: callee.cls.clone(),
                    definition: caller.name.clone(),
                });
            }
            for (param, ctor_arg) in callee.params.iter().zip(&def.ctor_args) {
                let passed = caller
                    .args
                    .iter()
                    .find_map(|arg| match arg {
                        ArgForm::Def(candidate) if candidate.name == *ctor_arg => Some(candidate),
                        _ => None,
                    })
                    .ok_or_else(|| CodegenError::ParamType {
                        param: param.clone(),
                        definition: caller.name.clone(),
                    })?;
                let ty = field_type(passed);
                let key = (callee.cls.clone(), param.clone());
                if let Some(existing) = types.get(&key) {
                    if existing != &ty {
                        return Err(CodegenError::ParamType {
                            param: param.clone(),
                            definition: callee.name.clone(),
                        });
                    }
                } else {
                    types.insert(key, ty);
                }
            }
        }
    }
    Ok(types)
}

fn resolve<'a>(
    definition: &'a Definition,
    target: usize,
    name: &str,
) -> Result<&'a ArgDef, CodegenError> {
    match definition.args.get(target) {
        Some(ArgForm::Def(def)) => Ok(def),
        _ => Err(CodegenError::BadReference {
            name: name.to_string(),
            definition: definition.name.clone(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Source writer
// ---------------------------------------------------------------------------

struct Source {
    out: String,
    indent: usize,
}

impl Source {
    fn new() -> Self {
        Self {
            out: String::new(),
            indent: 0,
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn open(&mut self, text: &str) {
        self.line(text);
        self.indent += 1;
    }

    fn close(&mut self, text: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    /// Dedents for a `} else {`-style line, staying inside the block.
    fn close_open(&mut self, text: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
        self.indent += 1;
    }

    fn finish(self) -> String {
        self.out
    }
}
