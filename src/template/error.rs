use thiserror::Error;

/// Errors produced while compiling or using path templates
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A placeholder name has no known capture fragment or fill value
    #[error("Unknown placeholder '{{{name}}}' in template")]
    UnknownPlaceholder { name: String },
    /// The assembled matcher failed to compile, usually a broken
    /// user-defined fragment
    #[error("Placeholder regex is broken: {reason}")]
    BrokenPlaceholderRegex { reason: String },
    /// A placeholder name appears more than once in one template
    #[error("Placeholder '{{{name}}}' appears more than once in template")]
    DuplicatePlaceholder { name: String },
    /// User-defined placeholders are not supported in the directory portion
    #[error("User-defined placeholder '{{{name}}}' is not allowed in the directory portion")]
    PlaceholderInDirectory { name: String },
    /// A template without temporal placeholders denotes a single file and
    /// may not contain placeholders at all
    #[error("Placeholders are not allowed in the path of a single-file dataset")]
    PlaceholderOnSingleFile,
    /// An opening brace without a matching closing brace
    #[error("Unclosed placeholder brace in template '{template}'")]
    UnclosedPlaceholder { template: String },
    /// A path did not match the compiled template
    #[error("Path '{path}' does not match the template")]
    NoMatch { path: String },
    /// Parsed fields are insufficient to assemble a timestamp
    #[error("Not enough placeholders to assemble the {which} timestamp")]
    NotEnoughPlaceholders { which: &'static str },
    /// Parsed fields form an impossible calendar date or time
    #[error("Parsed placeholder values form an invalid timestamp")]
    InvalidTimeValue,
}
