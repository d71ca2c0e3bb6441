use thiserror::Error;

#[derive(Error, Debug)]
pub enum ItemEvalError {
    #[error("Invalid glob pattern '{pattern}'")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Item type '{item_type}' was referenced while it was being resolved")]
    CircularItemReference { item_type: String },

    #[error("Unable to parse condition '{condition}'")]
    ConditionSyntax { condition: String },

    #[error("Unterminated expression in '{text}'")]
    UnterminatedExpression { text: String },

    #[error("Malformed item expression '{text}'")]
    InvalidItemExpression { text: String },

    #[error("'{name}' is reserved metadata and cannot be assigned")]
    ReservedMetadata { name: String },

    #[error("Unable to walk the project directory")]
    WalkError {
        #[from]
        source: walkdir::Error,
    },
}

pub type ItemEvalResult<T> = anyhow::Result<T>;
