use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Property value that does not parse as the expected type.
    #[snafu(display("invalid value '{value}' for property '{key}'"))]
    InvalidProperty { key: String, value: String },

    #[snafu(display("{source}"))]
    Runtime { source: tessera_runtime::Error },

    /// `code`, `validate` or `tear_down` called before `set_up`.
    #[snafu(display("benchmark '{benchmark}' has not been set up"))]
    NotSetUp { benchmark: String },
}
