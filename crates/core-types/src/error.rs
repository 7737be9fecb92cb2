use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid sort field(s): {}", .0.join(", "))]
    InvalidSortField(Vec<String>),

    #[error("invalid filter field(s): {}", .0.join(", "))]
    InvalidFilterField(Vec<String>),

    #[error("invalid filter '{0}': expected <field>=<pattern>")]
    InvalidFilterSyntax(String),
}
