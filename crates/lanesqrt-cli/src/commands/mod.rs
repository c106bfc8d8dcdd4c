pub mod bench;
pub mod partition;
pub mod solve;

/// Report format shared by the `bench` and `solve` subcommands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown format '{other}', expected 'text' or 'json'")),
        }
    }
}
