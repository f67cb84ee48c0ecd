//! Language-agnostic type model consumed by the schema resolver.
//!
//! A [`TypeNode`] describes the static shape of a value. Named types are not
//! inlined: a [`TypeNode::Reference`] or [`TypeNode::Generic`] points at a
//! [`Declaration`] held by the [`TypeCatalog`], which is looked up lazily when
//! the resolver reaches it.

use crate::error::SourceLocation;
use indexmap::IndexMap;
use serde::Serialize;
use std::path::Path;

/// Scalar kinds a type can bottom out in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PrimitiveKind {
    String,
    Char,
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    F32,
    F64,
    Bool,
    Null,
    Any,
    Uuid,
    DateTime,
    Date,
}

impl PrimitiveKind {
    /// JSON schema `type` keyword, `None` for the unconstrained kind.
    pub fn schema_type(&self) -> Option<&'static str> {
        match self {
            PrimitiveKind::String
            | PrimitiveKind::Char
            | PrimitiveKind::Uuid
            | PrimitiveKind::DateTime
            | PrimitiveKind::Date => Some("string"),
            PrimitiveKind::I8
            | PrimitiveKind::I16
            | PrimitiveKind::I32
            | PrimitiveKind::I64
            | PrimitiveKind::I128
            | PrimitiveKind::U8
            | PrimitiveKind::U16
            | PrimitiveKind::U32
            | PrimitiveKind::U64
            | PrimitiveKind::U128 => Some("integer"),
            PrimitiveKind::F32 | PrimitiveKind::F64 => Some("number"),
            PrimitiveKind::Bool => Some("boolean"),
            PrimitiveKind::Null => Some("null"),
            PrimitiveKind::Any => None,
        }
    }

    pub fn format(&self) -> Option<&'static str> {
        match self {
            PrimitiveKind::I8
            | PrimitiveKind::I16
            | PrimitiveKind::I32
            | PrimitiveKind::U8
            | PrimitiveKind::U16
            | PrimitiveKind::U32 => Some("int32"),
            PrimitiveKind::I64 | PrimitiveKind::I128 | PrimitiveKind::U64 | PrimitiveKind::U128 => {
                Some("int64")
            }
            PrimitiveKind::F32 => Some("float"),
            PrimitiveKind::F64 => Some("double"),
            PrimitiveKind::Uuid => Some("uuid"),
            PrimitiveKind::DateTime => Some("date-time"),
            PrimitiveKind::Date => Some("date"),
            _ => None,
        }
    }

    /// Parse a Rust primitive or well-known scalar type name
    pub fn from_rust_name(type_name: &str) -> Option<PrimitiveKind> {
        match type_name {
            "String" | "str" => Some(PrimitiveKind::String),
            "char" => Some(PrimitiveKind::Char),
            "i8" => Some(PrimitiveKind::I8),
            "i16" => Some(PrimitiveKind::I16),
            "i32" => Some(PrimitiveKind::I32),
            "i64" | "isize" => Some(PrimitiveKind::I64),
            "i128" => Some(PrimitiveKind::I128),
            "u8" => Some(PrimitiveKind::U8),
            "u16" => Some(PrimitiveKind::U16),
            "u32" => Some(PrimitiveKind::U32),
            "u64" | "usize" => Some(PrimitiveKind::U64),
            "u128" => Some(PrimitiveKind::U128),
            "f32" => Some(PrimitiveKind::F32),
            "f64" => Some(PrimitiveKind::F64),
            "bool" => Some(PrimitiveKind::Bool),
            "Uuid" => Some(PrimitiveKind::Uuid),
            "DateTime" | "NaiveDateTime" | "SystemTime" | "OffsetDateTime" => {
                Some(PrimitiveKind::DateTime)
            }
            "NaiveDate" => Some(PrimitiveKind::Date),
            "Value" => Some(PrimitiveKind::Any),
            _ => None,
        }
    }
}

/// A literal value usable in enums, literal types and discriminants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Literal {
    String(String),
    Integer(i64),
    Boolean(bool),
    Null,
}

impl Literal {
    pub fn schema_type(&self) -> &'static str {
        match self {
            Literal::String(_) => "string",
            Literal::Integer(_) => "integer",
            Literal::Boolean(_) => "boolean",
            Literal::Null => "null",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Literal::String(s) => serde_json::Value::String(s.clone()),
            Literal::Integer(i) => serde_json::Value::from(*i),
            Literal::Boolean(b) => serde_json::Value::Bool(*b),
            Literal::Null => serde_json::Value::Null,
        }
    }
}

/// One property of an object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub node: TypeNode,
    pub required: bool,
}

impl Member {
    pub fn required(node: TypeNode) -> Self {
        Self {
            node,
            required: true,
        }
    }

    pub fn optional(node: TypeNode) -> Self {
        Self {
            node,
            required: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObjectType {
    pub properties: IndexMap<String, Member>,
    /// Closed objects reject properties they do not declare.
    pub closed: bool,
}

impl ObjectType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn closed() -> Self {
        Self {
            properties: IndexMap::new(),
            closed: true,
        }
    }

    pub fn with(mut self, name: impl Into<String>, member: Member) -> Self {
        self.properties.insert(name.into(), member);
        self
    }
}

/// Resolved static type of a declaration, field or parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "of", rename_all = "camelCase")]
pub enum TypeNode {
    Primitive(PrimitiveKind),
    Object(ObjectType),
    /// String-keyed dictionary with a uniform value type.
    Map(Box<TypeNode>),
    Array(Box<TypeNode>),
    Tuple(Vec<TypeNode>),
    Union(Vec<TypeNode>),
    Intersection(Vec<TypeNode>),
    Enum(Vec<Literal>),
    Literal(Literal),
    /// Named type whose target is looked up in the catalog on demand.
    Reference(String),
    Generic {
        base: String,
        args: Vec<TypeNode>,
    },
    /// Type parameter of the enclosing generic declaration.
    TypeParameter(String),
    /// Function-typed position; never representable as data.
    Callable,
}

impl TypeNode {
    pub fn string() -> Self {
        TypeNode::Primitive(PrimitiveKind::String)
    }

    pub fn null() -> Self {
        TypeNode::Primitive(PrimitiveKind::Null)
    }

    pub fn any() -> Self {
        TypeNode::Primitive(PrimitiveKind::Any)
    }

    pub fn reference(name: impl Into<String>) -> Self {
        TypeNode::Reference(name.into())
    }

    pub fn array(element: TypeNode) -> Self {
        TypeNode::Array(Box::new(element))
    }

    /// `T | null`
    pub fn nullable(inner: TypeNode) -> Self {
        TypeNode::Union(vec![inner, TypeNode::null()])
    }

    pub fn is_null_like(&self) -> bool {
        matches!(
            self,
            TypeNode::Primitive(PrimitiveKind::Null) | TypeNode::Literal(Literal::Null)
        )
    }

    /// Name used when minting registry ids for generic instantiations.
    pub fn display_name(&self) -> String {
        match self {
            TypeNode::Primitive(kind) => format!("{:?}", kind),
            TypeNode::Object(_) => "Object".to_string(),
            TypeNode::Map(value) => format!("Map_{}", value.display_name()),
            TypeNode::Array(element) => format!("Array_{}", element.display_name()),
            TypeNode::Tuple(elements) => {
                let parts: Vec<String> = elements.iter().map(|e| e.display_name()).collect();
                format!("Tuple_{}", parts.join("_"))
            }
            TypeNode::Union(variants) => {
                let parts: Vec<String> = variants.iter().map(|v| v.display_name()).collect();
                parts.join("Or")
            }
            TypeNode::Intersection(members) => {
                let parts: Vec<String> = members.iter().map(|m| m.display_name()).collect();
                parts.join("And")
            }
            TypeNode::Enum(_) => "Enum".to_string(),
            TypeNode::Literal(_) => "Literal".to_string(),
            TypeNode::Reference(name) | TypeNode::TypeParameter(name) => name.clone(),
            TypeNode::Generic { base, args } => {
                let mut name = base.clone();
                for arg in args {
                    name.push('_');
                    name.push_str(&arg.display_name());
                }
                name
            }
            TypeNode::Callable => "Fn".to_string(),
        }
    }
}

/// Index of a declaration in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub usize);

/// A named type declaration: struct, enum or alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub type_params: Vec<String>,
    pub body: TypeNode,
    pub location: SourceLocation,
    /// Identifier the declaration insists on in the output, e.g. a serde
    /// container rename. Never disambiguated.
    pub external_id: Option<String>,
}

impl Declaration {
    pub fn new(name: impl Into<String>, body: TypeNode, location: SourceLocation) -> Self {
        Self {
            name: name.into(),
            type_params: Vec::new(),
            body,
            location,
            external_id: None,
        }
    }

    pub fn with_type_params(mut self, params: &[&str]) -> Self {
        self.type_params = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }

    /// Preferred registry id for this declaration.
    pub fn schema_name(&self) -> &str {
        self.external_id.as_deref().unwrap_or(&self.name)
    }
}

/// Every declaration visible to one generation run.
#[derive(Debug, Default)]
pub struct TypeCatalog {
    declarations: Vec<Declaration>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, declaration: Declaration) -> DeclId {
        self.declarations.push(declaration);
        DeclId(self.declarations.len() - 1)
    }

    pub fn extend(&mut self, declarations: impl IntoIterator<Item = Declaration>) {
        for declaration in declarations {
            self.add(declaration);
        }
    }

    pub fn get(&self, id: DeclId) -> &Declaration {
        &self.declarations[id.0]
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// Find the declaration `name` refers to when written inside `unit`.
    ///
    /// A declaration in the same unit wins; otherwise the one with the
    /// smallest `(unit, line)` is chosen so the answer does not depend on
    /// the order declarations were added in.
    pub fn lookup(&self, name: &str, unit: &Path) -> Option<DeclId> {
        let mut best: Option<DeclId> = None;
        for (index, declaration) in self.declarations.iter().enumerate() {
            if declaration.name != name {
                continue;
            }
            let candidate = DeclId(index);
            best = match best {
                None => Some(candidate),
                Some(current) => {
                    let current_decl = self.get(current);
                    let current_local = current_decl.location.unit == unit;
                    let candidate_local = declaration.location.unit == unit;
                    let prefer_candidate = match (candidate_local, current_local) {
                        (true, false) => true,
                        (false, true) => false,
                        _ => declaration.location < current_decl.location,
                    };
                    if prefer_candidate {
                        Some(candidate)
                    } else {
                        Some(current)
                    }
                }
            };
        }
        best
    }
}
