//! MBM text to AST.

use crate::error::SchemaError;

/// Wire format character for the 11 fixed-width scalar types, if any.
///
/// These mirror big-endian struct packing codes; everything else (varints,
/// strings, positions, ...) has its own named reader and no format char.
pub fn builtin_fmt(cls: &str) -> Option<char> {
    match cls {
        "i8" => Some('b'),
        "u8" => Some('B'),
        "i16" => Some('h'),
        "u16" => Some('H'),
        "i32" => Some('i'),
        "u32" => Some('I'),
        "i64" => Some('q'),
        "u64" => Some('Q'),
        "bool" => Some('?'),
        "float" => Some('f'),
        "double" => Some('d'),
        _ => None,
    }
}

/// One parsed schema statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    /// Symbolic name: the inbound handler name / outbound method name.
    pub name: String,
    /// Wire id; absent for non-packet subtypes.
    pub id: Option<u32>,
    /// Caller-supplied parameters for inbound parsing.
    pub params: Vec<String>,
    pub args: Vec<ArgForm>,
    /// Generated type name.
    pub cls: String,
}

impl Definition {
    /// Whether parsing this definition can leave fields unset: true iff any
    /// argument is optional or any condition appears.
    pub fn has_optional(&self) -> bool {
        self.args.iter().any(|arg| match arg {
            ArgForm::Def(def) => def.optional,
            ArgForm::Condition(_) => true,
            _ => false,
        })
    }

    /// Re-emits the canonical statement text; parsing it yields this AST.
    pub fn serialize(&self) -> String {
        let mut out = self.name.clone();
        if let Some(id) = self.id {
            out.push_str(&format!("#{id:x}"));
        }
        for param in &self.params {
            out.push('?');
            out.push_str(param);
        }
        for arg in &self.args {
            out.push(' ');
            match arg {
                ArgForm::ConditionDisable => out.push('?'),
                ArgForm::Condition(cond) => {
                    out.push_str(&format!("?{}?{}?{}", cond.name, cond.op, cond.value));
                }
                ArgForm::Reference { name, .. } => out.push_str(name),
                ArgForm::Def(def) => {
                    out.push_str(&def.name);
                    out.push(':');
                    if let Some(count) = &def.vec_count_cls {
                        out.push_str(count);
                        out.push('+');
                    }
                    out.push_str(&def.cls);
                    for ctor_arg in &def.ctor_args {
                        out.push('@');
                        out.push_str(ctor_arg);
                    }
                    if def.optional {
                        out.push('?');
                    }
                }
            }
        }
        out.push_str(" -> ");
        out.push_str(&self.cls);
        out.push(';');
        out
    }
}

/// The four argument forms of a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgForm {
    Def(ArgDef),
    /// Gates every following reference until disabled or replaced.
    Condition(Condition),
    /// A bare `?`, closing the open condition.
    ConditionDisable,
    /// Re-use of a previously declared argument; `target` indexes into the
    /// `args` list of the owning definition.
    Reference { name: String, target: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgDef {
    pub name: String,
    pub cls: String,
    /// When present, the value is a length-prefixed sequence whose count is
    /// read as this type.
    pub vec_count_cls: Option<String>,
    /// Prefixed on the wire by a single bool.
    pub optional: bool,
    /// Names of previously declared fields passed when constructing `cls`.
    pub ctor_args: Vec<String>,
    /// Set when a later `ArgForm::Reference` consumes this argument.
    pub referenced: bool,
}

impl ArgDef {
    pub fn builtin_fmt(&self) -> Option<char> {
        builtin_fmt(&self.cls)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub name: String,
    pub op: String,
    pub value: String,
}

/// Parses a whole schema file. Empty input yields zero definitions.
pub fn parse(input: &str) -> Result<Vec<Definition>, SchemaError> {
    let stripped: Vec<String> = input
        .lines()
        .map(|line| {
            line.split_once("//")
                .map_or(line, |(head, _)| head)
                .to_string()
        })
        .collect();
    let stripped = stripped.join("\n");

    let mut definitions = Vec::new();
    for statement in stripped.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        definitions.push(parse_definition(statement)?);
    }
    Ok(definitions)
}

fn parse_definition(statement: &str) -> Result<Definition, SchemaError> {
    let shape_err = || SchemaError::DefinitionShape {
        definition: statement.to_string(),
    };

    if statement.matches("->").count() != 1 {
        return Err(shape_err());
    }
    let (left, cls) = statement.split_once("->").ok_or_else(shape_err)?;
    let cls = cls.trim();
    if cls.is_empty() {
        return Err(shape_err());
    }

    let mut tokens = left.split_whitespace();
    let header = tokens.next().ok_or_else(shape_err)?;

    let mut header_parts = header.split('?');
    let name_id = header_parts.next().unwrap_or("");
    let mut params = Vec::new();
    for param in header_parts {
        if param.is_empty() {
            return Err(shape_err());
        }
        params.push(param.to_string());
    }

    let (name, id) = match name_id.split_once('#') {
        Some((name, id_hex)) => {
            let id = u32::from_str_radix(id_hex, 16).map_err(|_| SchemaError::InvalidId {
                id: id_hex.to_string(),
                definition: statement.to_string(),
            })?;
            (name, Some(id))
        }
        None => (name_id, None),
    };
    if name.is_empty() {
        return Err(shape_err());
    }

    let mut args: Vec<ArgForm> = Vec::new();
    let mut seen_condition = false;
    for token in tokens {
        if token == "?" {
            args.push(ArgForm::ConditionDisable);
            continue;
        }
        if let Some(rest) = token.strip_prefix('?') {
            let pieces: Vec<&str> = rest.split('?').collect();
            if pieces.len() != 3 || pieces.iter().any(|piece| piece.is_empty()) {
                return Err(SchemaError::ConditionShape {
                    token: token.to_string(),
                    definition: statement.to_string(),
                });
            }
            check_value_source(pieces[0], &args, &params, statement)?;
            args.push(ArgForm::Condition(Condition {
                name: pieces[0].to_string(),
                op: pieces[1].to_string(),
                value: pieces[2].to_string(),
            }));
            seen_condition = true;
            continue;
        }
        if let Some((arg_name, type_expr)) = token.split_once(':') {
            if seen_condition {
                return Err(SchemaError::ArgumentAfterCondition {
                    name: arg_name.to_string(),
                    definition: statement.to_string(),
                });
            }
            if find_def(&args, arg_name).is_some() {
                return Err(SchemaError::RedefinedArgument {
                    name: arg_name.to_string(),
                    definition: statement.to_string(),
                });
            }
            let def = parse_arg(arg_name, type_expr, &args, &params, statement)?;
            args.push(ArgForm::Def(def));
        } else {
            let target = find_def(&args, token).ok_or_else(|| SchemaError::UnknownReference {
                name: token.to_string(),
                definition: statement.to_string(),
            })?;
            if let ArgForm::Def(def) = &mut args[target] {
                def.referenced = true;
            }
            args.push(ArgForm::Reference {
                name: token.to_string(),
                target,
            });
        }
    }

    Ok(Definition {
        name: name.to_string(),
        id,
        params,
        args,
        cls: cls.to_string(),
    })
}

fn parse_arg(
    name: &str,
    type_expr: &str,
    args: &[ArgForm],
    params: &[String],
    statement: &str,
) -> Result<ArgDef, SchemaError> {
    let mut expr = type_expr;
    let optional = expr.ends_with('?');
    if optional {
        expr = &expr[..expr.len() - 1];
    }

    let mut at_parts = expr.split('@');
    let head = at_parts.next().unwrap_or("");
    let mut ctor_args = Vec::new();
    for ctor_arg in at_parts {
        check_value_source(ctor_arg, args, params, statement)?;
        ctor_args.push(ctor_arg.to_string());
    }

    let (vec_count_cls, cls) = match head.split_once('+') {
        Some((count, cls)) => (Some(count.to_string()), cls),
        None => (None, head),
    };
    if cls.is_empty() || name.is_empty() {
        return Err(SchemaError::DefinitionShape {
            definition: statement.to_string(),
        });
    }

    Ok(ArgDef {
        name: name.to_string(),
        cls: cls.to_string(),
        vec_count_cls,
        optional,
        ctor_args,
        referenced: false,
    })
}

/// Condition subjects and constructor arguments must name a previously
/// declared argument or a caller parameter.
fn check_value_source(
    name: &str,
    args: &[ArgForm],
    params: &[String],
    statement: &str,
) -> Result<(), SchemaError> {
    if params.iter().any(|param| param == name) || find_def(args, name).is_some() {
        Ok(())
    } else {
        Err(SchemaError::UnknownReference {
            name: name.to_string(),
            definition: statement.to_string(),
        })
    }
}

fn find_def(args: &[ArgForm], name: &str) -> Option<usize> {
    args.iter().position(|arg| match arg {
        ArgForm::Def(def) => def.name == name,
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(input: &str) -> Definition {
        let mut defs = parse(input).unwrap();
        assert_eq!(defs.len(), 1);
        defs.remove(0)
    }

    fn def_at(definition: &Definition, index: usize) -> &ArgDef {
        match &definition.args[index] {
            ArgForm::Def(def) => def,
            other => panic!("expected a definition at {index}, got {other:?}"),
        }
    }

    #[test]
    fn redefined_argument_rejected() {
        assert!(matches!(
            parse("type x:i32 y:i32 x:double -> Type;"),
            Err(SchemaError::RedefinedArgument { .. })
        ));
    }

    #[test]
    fn minimal_definition() {
        one("type -> Type;");
    }

    #[test]
    fn comment_only_input_yields_nothing() {
        assert!(parse("// just a comment").unwrap().is_empty());
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn missing_arrow_rejected() {
        assert!(matches!(
            parse("type x:i32;"),
            Err(SchemaError::DefinitionShape { .. })
        ));
        assert!(matches!(
            parse("type -> A -> B;"),
            Err(SchemaError::DefinitionShape { .. })
        ));
    }

    #[test]
    fn comments_everywhere() {
        one(
            "
            // comment before
            type
            // comment in between
            ->
            // comment in between
            Type;
            // comment after
            ",
        );
    }

    #[test]
    fn no_id() {
        let item = one("type x:i32 -> Type;");
        assert_eq!(item.id, None);
        assert_eq!(item.name, "type");
        assert_eq!(item.args.len(), 1);
        assert_eq!(item.cls, "Type");
        assert!(item.params.is_empty());
        assert!(!item.has_optional());
        assert!(def_at(&item, 0).ctor_args.is_empty());
    }

    #[test]
    fn hex_id() {
        let item = one("type#71 -> Type;");
        assert_eq!(item.id, Some(0x71));
        assert_eq!(item.name, "type");
        assert!(item.args.is_empty());
        assert_eq!(item.cls, "Type");
    }

    #[test]
    fn bad_id_rejected() {
        assert!(matches!(
            parse("type#zz -> Type;"),
            Err(SchemaError::InvalidId { .. })
        ));
    }

    #[test]
    fn input_params() {
        let item = one("type#13?inp -> Type;");
        assert_eq!(item.params, vec!["inp".to_string()]);
        assert!(!item.has_optional());
    }

    #[test]
    fn optional_marks_definition() {
        let item = one("type x:i32 y:str? -> Type;");
        assert!(item.has_optional());
        assert!(!def_at(&item, 0).optional);
        assert!(def_at(&item, 1).optional);
    }

    #[test]
    fn condition_block() {
        let item = one("type x:i32 y:str ?x?==?0 y -> Type;");
        assert!(item.has_optional());
        assert!(!def_at(&item, 0).optional);
        assert!(def_at(&item, 1).referenced);
        assert!(matches!(item.args[2], ArgForm::Condition(_)));
        match &item.args[3] {
            ArgForm::Reference { name, target } => {
                assert_eq!(name, "y");
                assert_eq!(*target, 1);
            }
            other => panic!("expected a reference, got {other:?}"),
        }
    }

    #[test]
    fn condition_disable() {
        let item = one("type ? -> Type;");
        assert!(matches!(item.args[0], ArgForm::ConditionDisable));
    }

    #[test]
    fn unknown_reference_rejected() {
        assert!(matches!(
            parse("type x:i32 ?y?==?0 -> Type;"),
            Err(SchemaError::UnknownReference { .. })
        ));
        assert!(matches!(
            parse("type x:i32 z -> Type;"),
            Err(SchemaError::UnknownReference { .. })
        ));
    }

    #[test]
    fn definition_after_condition_rejected() {
        assert!(matches!(
            parse("type x:i32 ?x?==?0 y:i32 -> Type;"),
            Err(SchemaError::ArgumentAfterCondition { .. })
        ));
    }

    #[test]
    fn builtin_fmt_coverage() {
        let item = one(
            "type a:i8 b:u8 c:i16 d:u16 e:i32 f:u32 \
             g:i64 h:u64 i:bool j:float k:double -> Type;",
        );
        for index in 0..11 {
            assert!(def_at(&item, index).builtin_fmt().is_some());
        }

        let item = one("type a:str b:bytes c:angle d:Other -> Type;");
        for index in 0..4 {
            assert!(def_at(&item, index).builtin_fmt().is_none());
        }
    }

    #[test]
    fn vector_count() {
        let item = one("type a:u8+str -> Type;");
        let def = def_at(&item, 0);
        assert_eq!(def.name, "a");
        assert_eq!(def.vec_count_cls.as_deref(), Some("u8"));
        assert_eq!(def.cls, "str");
    }

    #[test]
    fn ctor_args() {
        let item = one("type a:str b:Other@a -> Type;");
        let def = def_at(&item, 1);
        assert_eq!(def.name, "b");
        assert_eq!(def.ctor_args, vec!["a".to_string()]);
    }

    #[test]
    fn everything_at_once() {
        let item = one("type a:str b:i16+Other@a? -> Type;");
        let def = def_at(&item, 1);
        assert_eq!(def.name, "b");
        assert_eq!(def.vec_count_cls.as_deref(), Some("i16"));
        assert_eq!(def.cls, "Other");
        assert_eq!(def.ctor_args, vec!["a".to_string()]);
        assert!(def.optional);
    }

    #[test]
    fn serialize_roundtrip() {
        let inputs = [
            "type -> Type;",
            "type#71 -> Type;",
            "type#13?inp a:i32 -> Type;",
            "type x:i32 y:str? -> Type;",
            "type x:i32 y:str ?x?==?0 y ? -> Type;",
            "type a:str b:i16+Other@a? -> Type;",
            "map#24 item_damage:vari32 scale:i8 columns:i8 rows:i8 \
             ?columns?!=?0 rows ? -> Map;",
        ];
        for input in inputs {
            let parsed = parse(input).unwrap();
            let reserialized: Vec<String> =
                parsed.iter().map(Definition::serialize).collect();
            let reparsed = parse(&reserialized.join("\n")).unwrap();
            assert_eq!(parsed, reparsed, "roundtrip failed for {input}");
        }
    }
}
