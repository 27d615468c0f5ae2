//! Schema parsing and code generation failures.
//!
//! Both abort the build: the parser runs from `build.rs` of the packet
//! crate, so a bad definition can never reach runtime.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("definition must contain exactly one `->`:\n{definition}")]
    DefinitionShape { definition: String },

    #[error("invalid hexadecimal id `{id}`:\n{definition}")]
    InvalidId { id: String, definition: String },

    #[error("malformed condition `{token}`:\n{definition}")]
    ConditionShape { token: String, definition: String },

    #[error("argument `{name}` is defined more than once:\n{definition}")]
    RedefinedArgument { name: String, definition: String },

    #[error("`{name}` does not refer to an earlier argument:\n{definition}")]
    UnknownReference { name: String, definition: String },

    #[error("argument `{name}` declared after a condition:\n{definition}")]
    ArgumentAfterCondition { name: String, definition: String },
}

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("write method for `{definition}` cannot take caller parameters")]
    WriteWithParams { definition: String },

    #[error("write method for `{definition}` needs a wire id")]
    WriteWithoutId { definition: String },

    #[error("unsupported vector count type `{cls}` in `{definition}`")]
    VectorCount { cls: String, definition: String },

    #[error("cannot emit a writer for type `{cls}` in `{definition}`")]
    UnsupportedWrite { cls: String, definition: String },

    #[error("duplicate generated type `{cls}`")]
    DuplicateClass { cls: String },

    #[error("packet `{definition}` has a wire id and caller parameters")]
    DispatchWithParams { definition: String },

    #[error("cannot infer a type for parameter `{param}` of `{definition}`")]
    ParamType { param: String, definition: String },

    #[error("`{definition}` passes the wrong number of constructor arguments to `{cls}`")]
    CtorArity { cls: String, definition: String },

    #[error("reference `{name}` in `{definition}` does not resolve to an argument")]
    BadReference { name: String, definition: String },
}
