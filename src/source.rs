//! Lowers parsed Rust source into the language-agnostic model.
//!
//! Three entry points:
//!
//! - [`lower_declarations`] collects structs, enums and type aliases into
//!   [`Declaration`]s, honoring serde attributes so the schema matches the
//!   serialized form.
//! - [`lower_unit`] turns the public functions of a controller file into a
//!   [`ControllerUnit`].
//! - [`lower_provider`] reads the function a provider alias points at.

use crate::error::{Error, Result, SourceLocation};
use crate::extractor::{ControllerUnit, HandlerDecl, HandlerParam, RawTarget, SourceMarker};
use crate::parser::ParsedFile;
use crate::provider_registry::ProviderDefinition;
use crate::type_node::{Declaration, Literal, Member, ObjectType, PrimitiveKind, TypeNode};
use heck::{
    ToKebabCase, ToLowerCamelCase, ToShoutyKebabCase, ToShoutySnakeCase, ToSnakeCase,
    ToUpperCamelCase,
};
use log::debug;
use proc_macro2::Span;
use std::fmt;
use std::path::{Path, PathBuf};

/// Function name used when a provider reference names only a file.
pub const DEFAULT_PROVIDER_FN: &str = "provide";

/// Serde attributes relevant to the serialized shape.
#[derive(Debug, Default, Clone)]
struct SerdeAttrs {
    rename: Option<String>,
    rename_all: Option<String>,
    skip: bool,
    default: bool,
    flatten: bool,
    deny_unknown_fields: bool,
    tag: Option<String>,
    content: Option<String>,
    untagged: bool,
    transparent: bool,
}

impl SerdeAttrs {
    fn parse(attrs: &[syn::Attribute]) -> Self {
        let mut parsed = SerdeAttrs::default();
        for attr in attrs {
            if !attr.path().is_ident("serde") {
                continue;
            }
            let result = attr.parse_nested_meta(|meta| {
                let key = meta
                    .path
                    .get_ident()
                    .map(|ident| ident.to_string())
                    .unwrap_or_default();
                match key.as_str() {
                    "rename" => parsed.rename = Some(string_or_serialize(&meta)?),
                    "rename_all" => parsed.rename_all = Some(string_or_serialize(&meta)?),
                    "tag" => parsed.tag = Some(meta.value()?.parse::<syn::LitStr>()?.value()),
                    "content" => parsed.content = Some(meta.value()?.parse::<syn::LitStr>()?.value()),
                    "skip" => parsed.skip = true,
                    "flatten" => parsed.flatten = true,
                    "untagged" => parsed.untagged = true,
                    "transparent" => parsed.transparent = true,
                    "deny_unknown_fields" => parsed.deny_unknown_fields = true,
                    "default" => {
                        parsed.default = true;
                        skip_meta_value(&meta)?;
                    }
                    _ => skip_meta_value(&meta)?,
                }
                Ok(())
            });
            if let Err(err) = result {
                debug!("Ignoring malformed serde attribute: {}", err);
            }
        }
        parsed
    }
}

/// Value of `key = "..."` or the `serialize` half of `key(serialize = "...")`.
fn string_or_serialize(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<String> {
    if meta.input.peek(syn::Token![=]) {
        return Ok(meta.value()?.parse::<syn::LitStr>()?.value());
    }
    let mut serialized = None;
    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("serialize") {
            serialized = Some(inner.value()?.parse::<syn::LitStr>()?.value());
        } else {
            skip_meta_value(&inner)?;
        }
        Ok(())
    })?;
    serialized.ok_or_else(|| meta.error("expected a serialized name"))
}

fn skip_meta_value(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<()> {
    if meta.input.peek(syn::Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| skip_meta_value(&inner))?;
    }
    Ok(())
}

/// Apply a serde `rename_all` rule.
fn apply_rename_all(rule: &str, name: &str) -> String {
    let name = name.trim_start_matches("r#");
    match rule {
        "lowercase" => name.to_lowercase(),
        "UPPERCASE" => name.to_uppercase(),
        "PascalCase" => name.to_upper_camel_case(),
        "camelCase" => name.to_lower_camel_case(),
        "snake_case" => name.to_snake_case(),
        "SCREAMING_SNAKE_CASE" => name.to_shouty_snake_case(),
        "kebab-case" => name.to_kebab_case(),
        "SCREAMING-KEBAB-CASE" => name.to_shouty_kebab_case(),
        _ => name.to_string(),
    }
}

fn serialized_name(ident: &syn::Ident, attrs: &SerdeAttrs, rename_all: Option<&str>) -> String {
    if let Some(rename) = &attrs.rename {
        return rename.clone();
    }
    let raw = ident.to_string();
    match rename_all {
        Some(rule) => apply_rename_all(rule, &raw),
        None => raw.trim_start_matches("r#").to_string(),
    }
}

fn location(path: &Path, span: Span) -> SourceLocation {
    let start = span.start();
    SourceLocation::new(path, start.line, start.column)
}

/// Generic arguments of the last path segment, lifetimes and consts dropped.
fn type_args(segment: &syn::PathSegment) -> Vec<&syn::Type> {
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|arg| match arg {
                syn::GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Last path segment of a plain path type, looking through references.
fn last_segment(ty: &syn::Type) -> Option<&syn::PathSegment> {
    match ty {
        syn::Type::Path(type_path) if type_path.qself.is_none() => type_path.path.segments.last(),
        syn::Type::Reference(reference) => last_segment(&reference.elem),
        syn::Type::Paren(paren) => last_segment(&paren.elem),
        syn::Type::Group(group) => last_segment(&group.elem),
        _ => None,
    }
}

fn has_fn_bound<'b>(mut bounds: impl Iterator<Item = &'b syn::TypeParamBound>) -> bool {
    bounds.any(|bound| match bound {
        syn::TypeParamBound::Trait(trait_bound) => trait_bound
            .path
            .segments
            .last()
            .is_some_and(|s| matches!(s.ident.to_string().as_str(), "Fn" | "FnMut" | "FnOnce")),
        _ => false,
    })
}

/// Converts `syn::Type`s with the type parameters of the enclosing item in scope.
struct TypeLowering<'a> {
    type_params: &'a [String],
}

impl TypeLowering<'_> {
    fn lower(&self, ty: &syn::Type) -> TypeNode {
        match ty {
            syn::Type::Reference(reference) => self.lower(&reference.elem),
            syn::Type::Paren(paren) => self.lower(&paren.elem),
            syn::Type::Group(group) => self.lower(&group.elem),
            syn::Type::Slice(slice) => TypeNode::array(self.lower(&slice.elem)),
            syn::Type::Array(array) => TypeNode::array(self.lower(&array.elem)),
            syn::Type::Tuple(tuple) if tuple.elems.is_empty() => TypeNode::null(),
            syn::Type::Tuple(tuple) => TypeNode::Tuple(tuple.elems.iter().map(|t| self.lower(t)).collect()),
            syn::Type::BareFn(_) => TypeNode::Callable,
            syn::Type::ImplTrait(impl_trait) if has_fn_bound(impl_trait.bounds.iter()) => TypeNode::Callable,
            syn::Type::TraitObject(object) if has_fn_bound(object.bounds.iter()) => TypeNode::Callable,
            syn::Type::Path(type_path) if type_path.qself.is_none() => self.lower_path(&type_path.path),
            _ => {
                debug!("Treating unsupported type syntax as any");
                TypeNode::any()
            }
        }
    }

    fn lower_path(&self, path: &syn::Path) -> TypeNode {
        let Some(segment) = path.segments.last() else {
            return TypeNode::any();
        };
        let name = segment.ident.to_string();
        let args = type_args(segment);

        if path.segments.len() == 1 && args.is_empty() && self.type_params.contains(&name) {
            return TypeNode::TypeParameter(name);
        }
        if let Some(kind) = PrimitiveKind::from_rust_name(&name) {
            return TypeNode::Primitive(kind);
        }

        let first = args.first().map(|ty| self.lower(ty));
        match (name.as_str(), first) {
            ("Option", Some(inner)) => TypeNode::nullable(inner),
            (
                "Vec" | "VecDeque" | "LinkedList" | "HashSet" | "BTreeSet" | "IndexSet"
                | "BinaryHeap",
                Some(element),
            ) => TypeNode::array(element),
            ("HashMap" | "BTreeMap" | "IndexMap", Some(_)) => {
                let value = args.get(1).map(|ty| self.lower(ty)).unwrap_or_else(TypeNode::any);
                TypeNode::Map(Box::new(value))
            }
            ("Box" | "Rc" | "Arc" | "Cow", Some(inner)) => inner,
            (_, None) => TypeNode::Reference(name),
            (_, Some(_)) => TypeNode::Generic {
                base: name,
                args: args.iter().map(|ty| self.lower(ty)).collect(),
            },
        }
    }

    /// A struct field: `Option<T>` becomes an optional `T`.
    fn member(&self, ty: &syn::Type, attrs: &SerdeAttrs) -> Member {
        if let Some(segment) = last_segment(ty) {
            if segment.ident == "Option" {
                if let [inner] = type_args(segment).as_slice() {
                    return Member::optional(self.lower(inner));
                }
            }
        }
        let node = self.lower(ty);
        if attrs.default {
            Member::optional(node)
        } else {
            Member::required(node)
        }
    }

    /// Object for named fields, plus flattened members as an intersection.
    fn lower_named_fields(
        &self,
        fields: &syn::FieldsNamed,
        rename_all: Option<&str>,
        closed: bool,
    ) -> TypeNode {
        let mut object = if closed { ObjectType::closed() } else { ObjectType::new() };
        let mut flattened = Vec::new();

        for field in &fields.named {
            let Some(ident) = &field.ident else {
                continue;
            };
            let attrs = SerdeAttrs::parse(&field.attrs);
            if attrs.skip {
                continue;
            }
            if attrs.flatten {
                flattened.push(self.member(&field.ty, &attrs).node);
                continue;
            }
            let name = serialized_name(ident, &attrs, rename_all);
            object.properties.insert(name, self.member(&field.ty, &attrs));
        }

        if flattened.is_empty() {
            TypeNode::Object(object)
        } else {
            let mut members = vec![TypeNode::Object(object)];
            members.extend(flattened);
            TypeNode::Intersection(members)
        }
    }

    fn lower_fields(&self, fields: &syn::Fields, rename_all: Option<&str>, closed: bool) -> TypeNode {
        match fields {
            syn::Fields::Named(named) => self.lower_named_fields(named, rename_all, closed),
            syn::Fields::Unnamed(unnamed) => {
                let kept: Vec<&syn::Field> = unnamed
                    .unnamed
                    .iter()
                    .filter(|field| !SerdeAttrs::parse(&field.attrs).skip)
                    .collect();
                match kept.as_slice() {
                    [single] => self.lower(&single.ty),
                    many => TypeNode::Tuple(many.iter().map(|field| self.lower(&field.ty)).collect()),
                }
            }
            syn::Fields::Unit => TypeNode::null(),
        }
    }

    fn lower_enum(&self, item: &syn::ItemEnum, container: &SerdeAttrs) -> TypeNode {
        let rename_all = container.rename_all.as_deref();
        let variants: Vec<(&syn::Variant, String)> = item
            .variants
            .iter()
            .filter_map(|variant| {
                let attrs = SerdeAttrs::parse(&variant.attrs);
                if attrs.skip {
                    None
                } else {
                    Some((variant, serialized_name(&variant.ident, &attrs, rename_all)))
                }
            })
            .collect();

        let all_unit = variants
            .iter()
            .all(|(variant, _)| matches!(variant.fields, syn::Fields::Unit));
        if all_unit && container.tag.is_none() && !container.untagged {
            return TypeNode::Enum(
                variants
                    .into_iter()
                    .map(|(_, name)| Literal::String(name))
                    .collect(),
            );
        }

        let mut alternatives = Vec::with_capacity(variants.len());
        for (variant, name) in variants {
            let payload = match &variant.fields {
                syn::Fields::Unit => None,
                fields => Some(self.lower_fields(fields, None, false)),
            };
            let tag_value = TypeNode::Literal(Literal::String(name.clone()));

            let alternative = if container.untagged {
                payload.unwrap_or_else(TypeNode::null)
            } else if let Some(tag) = &container.tag {
                let tag_object = ObjectType::new().with(tag.clone(), Member::required(tag_value));
                match (&container.content, payload) {
                    (Some(content), Some(payload)) => TypeNode::Object(
                        tag_object.with(content.clone(), Member::required(payload)),
                    ),
                    (_, None) => TypeNode::Object(tag_object),
                    (None, Some(TypeNode::Object(fields))) => {
                        let mut merged = tag_object;
                        merged.properties.extend(fields.properties);
                        TypeNode::Object(merged)
                    }
                    (None, Some(payload)) => {
                        TypeNode::Intersection(vec![TypeNode::Object(tag_object), payload])
                    }
                }
            } else {
                match payload {
                    None => tag_value,
                    Some(payload) => TypeNode::Object(
                        ObjectType::closed().with(name, Member::required(payload)),
                    ),
                }
            };
            alternatives.push(alternative);
        }
        TypeNode::Union(alternatives)
    }
}

fn generic_names(generics: &syn::Generics) -> Vec<String> {
    generics
        .type_params()
        .map(|param| param.ident.to_string())
        .collect()
}

fn lower_item(item: &syn::Item, path: &Path, out: &mut Vec<Declaration>) {
    match item {
        syn::Item::Struct(item) => {
            let attrs = SerdeAttrs::parse(&item.attrs);
            let type_params = generic_names(&item.generics);
            let lowering = TypeLowering { type_params: &type_params };
            let body = if attrs.transparent {
                lowering.lower_fields(&item.fields, None, false)
            } else {
                lowering.lower_fields(&item.fields, attrs.rename_all.as_deref(), attrs.deny_unknown_fields)
            };
            out.push(declaration(&item.ident, type_params, body, attrs, path));
        }
        syn::Item::Enum(item) => {
            let attrs = SerdeAttrs::parse(&item.attrs);
            let type_params = generic_names(&item.generics);
            let body = TypeLowering { type_params: &type_params }.lower_enum(item, &attrs);
            out.push(declaration(&item.ident, type_params, body, attrs, path));
        }
        syn::Item::Type(item) => {
            let type_params = generic_names(&item.generics);
            let body = TypeLowering { type_params: &type_params }.lower(&item.ty);
            out.push(declaration(&item.ident, type_params, body, SerdeAttrs::default(), path));
        }
        syn::Item::Mod(module) => {
            if let Some((_, items)) = &module.content {
                for item in items {
                    lower_item(item, path, out);
                }
            }
        }
        _ => {}
    }
}

fn declaration(
    ident: &syn::Ident,
    type_params: Vec<String>,
    body: TypeNode,
    attrs: SerdeAttrs,
    path: &Path,
) -> Declaration {
    debug!("Lowered declaration {} in {}", ident, path.display());
    Declaration {
        name: ident.to_string(),
        type_params,
        body,
        location: location(path, ident.span()),
        external_id: attrs.rename,
    }
}

/// Every struct, enum and type alias of `file`, inline modules included.
pub fn lower_declarations(file: &ParsedFile) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    for item in &file.syntax_tree.items {
        lower_item(item, &file.path, &mut declarations);
    }
    declarations
}

/// Doc comment of an item: free text plus `@tag value` lines.
#[derive(Debug, Default, PartialEq)]
struct DocComment {
    text: Vec<String>,
    tags: Vec<(String, String)>,
}

impl DocComment {
    fn parse(attrs: &[syn::Attribute]) -> Self {
        let mut doc = DocComment::default();
        for attr in attrs {
            if !attr.path().is_ident("doc") {
                continue;
            }
            let syn::Meta::NameValue(name_value) = &attr.meta else {
                continue;
            };
            let syn::Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Str(line),
                ..
            }) = &name_value.value
            else {
                continue;
            };
            let line = line.value();
            let line = line.trim();
            match line.strip_prefix('@') {
                Some(tag) => {
                    let (name, value) = tag.split_once(char::is_whitespace).unwrap_or((tag, ""));
                    doc.tags.push((name.to_string(), value.trim().to_string()));
                }
                None => doc.text.push(line.to_string()),
            }
        }
        doc
    }

    fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(tag, _)| tag == name)
            .map(|(_, value)| value.as_str())
    }

    /// Marker for parameter `param` from `@path|@query|@body|@header param`.
    fn marker_for(&self, param: &str) -> Option<SourceMarker> {
        self.tags.iter().find_map(|(tag, value)| {
            if value != param {
                return None;
            }
            match tag.as_str() {
                "path" => Some(SourceMarker::Path),
                "query" => Some(SourceMarker::Query),
                "body" => Some(SourceMarker::Body),
                "header" => Some(SourceMarker::Header),
                _ => None,
            }
        })
    }

    fn description(&self) -> Option<String> {
        let text = self.text.join("\n").trim().to_string();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

fn param_name(pat: &syn::Pat, index: usize) -> String {
    match pat {
        syn::Pat::Ident(ident) => ident.ident.to_string(),
        syn::Pat::TupleStruct(tuple) => match tuple.elems.iter().collect::<Vec<_>>().as_slice() {
            [inner] => param_name(inner, index),
            _ => format!("arg{}", index),
        },
        syn::Pat::Type(typed) => param_name(&typed.pat, index),
        syn::Pat::Reference(reference) => param_name(&reference.pat, index),
        _ => format!("arg{}", index),
    }
}

/// Source marker implied by an extractor wrapper or a raw framework type.
fn wrapper_marker(name: &str) -> Option<SourceMarker> {
    match name {
        "Path" => Some(SourceMarker::Path),
        "Query" => Some(SourceMarker::Query),
        "Body" | "Json" | "Form" => Some(SourceMarker::Body),
        "Header" | "TypedHeader" => Some(SourceMarker::Header),
        "Request" | "HttpRequest" => Some(SourceMarker::Raw(RawTarget::Request)),
        "Reply" | "Response" => Some(SourceMarker::Raw(RawTarget::Reply)),
        "WebSocket" | "WebSocketUpgrade" | "Socket" => Some(SourceMarker::Raw(RawTarget::Socket)),
        _ => None,
    }
}

fn lower_params(sig: &syn::Signature, doc: &DocComment, path: &Path) -> Vec<HandlerParam> {
    let type_params = generic_names(&sig.generics);
    let lowering = TypeLowering { type_params: &type_params };
    let mut params = Vec::new();

    for (index, input) in sig.inputs.iter().enumerate() {
        let syn::FnArg::Typed(typed) = input else {
            continue;
        };
        let name = param_name(&typed.pat, index);
        let at = location(path, syn::spanned::Spanned::span(&typed.pat));

        let wrapped = last_segment(&typed.ty).and_then(|segment| {
            let marker = wrapper_marker(&segment.ident.to_string())?;
            let node = match (marker, type_args(segment).first()) {
                (SourceMarker::Raw(_), _) | (_, None) => TypeNode::any(),
                (_, Some(inner)) => lowering.lower(inner),
            };
            Some((marker, node))
        });

        let param = match wrapped {
            Some((marker, node)) => HandlerParam::new(name, node, at).with_marker(marker),
            None => {
                let node = lowering.lower(&typed.ty);
                let marker = doc.marker_for(&name);
                let param = HandlerParam::new(name, node, at);
                match marker {
                    Some(marker) => param.with_marker(marker),
                    None => param,
                }
            }
        };
        params.push(param);
    }
    params
}

/// Response type of a handler: `Json<T>` and `Result<T, E>` unwrap to `T`.
fn lower_response(output: &syn::ReturnType, lowering: &TypeLowering<'_>) -> TypeNode {
    fn unwrap(ty: &syn::Type, lowering: &TypeLowering<'_>) -> TypeNode {
        if let syn::Type::ImplTrait(_) = ty {
            return TypeNode::any();
        }
        if let Some(segment) = last_segment(ty) {
            let name = segment.ident.to_string();
            if matches!(name.as_str(), "Json" | "Result") {
                if let Some(inner) = type_args(segment).first() {
                    return unwrap(inner, lowering);
                }
            }
        }
        lowering.lower(ty)
    }

    match output {
        syn::ReturnType::Default => TypeNode::null(),
        syn::ReturnType::Type(_, ty) => unwrap(ty, lowering),
    }
}

/// Build the controller unit of a routes file from its public functions.
pub fn lower_unit(file: &ParsedFile) -> ControllerUnit {
    let mut handlers = Vec::new();

    for item in &file.syntax_tree.items {
        let syn::Item::Fn(function) = item else {
            continue;
        };
        if !matches!(function.vis, syn::Visibility::Public(_)) {
            continue;
        }

        let sig = &function.sig;
        let doc = DocComment::parse(&function.attrs);
        let type_params = generic_names(&sig.generics);
        let lowering = TypeLowering { type_params: &type_params };

        handlers.push(HandlerDecl {
            export_name: sig.ident.to_string(),
            params: lower_params(sig, &doc, &file.path),
            response: lower_response(&sig.output, &lowering),
            operation_id: doc.tag("operationId").map(str::to_string),
            description: doc.description(),
            location: location(&file.path, sig.ident.span()),
        });
    }

    debug!(
        "Lowered {} exported functions from {}",
        handlers.len(),
        file.path.display()
    );
    ControllerUnit::new(file.path.clone(), handlers)
}

/// A provider alias target: `path/to/file.rs::function`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReference {
    pub path: PathBuf,
    pub function: String,
}

impl ProviderReference {
    pub fn parse(reference: &str) -> Self {
        match reference.rsplit_once("::") {
            Some((path, function)) if !function.is_empty() => Self {
                path: PathBuf::from(path),
                function: function.to_string(),
            },
            _ => Self {
                path: PathBuf::from(reference.trim_end_matches("::")),
                function: DEFAULT_PROVIDER_FN.to_string(),
            },
        }
    }
}

impl fmt::Display for ProviderReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.path.display(), self.function)
    }
}

/// Read the provider function `reference` names out of `file`.
pub fn lower_provider(alias: &str, reference: &ProviderReference, file: &ParsedFile) -> Result<ProviderDefinition> {
    let function = file
        .syntax_tree
        .items
        .iter()
        .find_map(|item| match item {
            syn::Item::Fn(function) if function.sig.ident == reference.function.as_str() => Some(function),
            _ => None,
        })
        .ok_or_else(|| {
            Error::Config(format!(
                "provider `{}`: no function `{}` in {}",
                alias,
                reference.function,
                file.path.display()
            ))
        })?;

    let sig = &function.sig;
    let doc = DocComment::parse(&function.attrs);
    let type_params = generic_names(&sig.generics);
    let lowering = TypeLowering { type_params: &type_params };

    let mut definition = ProviderDefinition::new(
        alias,
        reference.to_string(),
        location(&file.path, sig.ident.span()),
    )
    .with_parameters(lower_params(sig, &doc, &file.path));

    if let syn::ReturnType::Type(_, ty) = &sig.output {
        let mut ty: &syn::Type = ty;
        if let Some(segment) = last_segment(ty) {
            let name = segment.ident.to_string();
            let inner = type_args(segment).first().copied();
            match (name.as_str(), inner) {
                ("ProviderOutcome" | "Outcome", Some(inner)) => {
                    definition = definition.aborting();
                    ty = inner;
                }
                ("Result", Some(inner)) => ty = inner,
                _ => {}
            }
        }
        if !matches!(ty, syn::Type::ImplTrait(_)) {
            definition = definition.with_output(lowering.lower(ty));
        }
    }

    debug!(
        "Lowered provider {} -> {} (may abort: {})",
        alias, definition.target, definition.may_abort
    );
    Ok(definition)
}
