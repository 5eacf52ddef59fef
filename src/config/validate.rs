use std::fmt;

use thiserror::Error;

use super::Config;

const MAX_IDENTIFIER_BYTES: usize = 1024;
const MAX_PARALLELISM: usize = 1000;

/// One invalid field, displayed as `<Field> <problem>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

/// Every invalid field of a [`Config`]. Displayed sorted, one per line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", render(.errors))]
pub struct ConfigError {
    pub errors: Vec<FieldError>,
}

fn render(errors: &[FieldError]) -> String {
    let mut lines: Vec<String> = errors.iter().map(ToString::to_string).collect();
    lines.sort();
    lines.join(";\n")
}

#[derive(Default)]
struct Errors(Vec<FieldError>);

impl Errors {
    fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }
}

impl Config {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        let mut errs = Errors::default();

        if self.identifier.is_empty() {
            errs.add("Identifier", "must not be blank");
        }

        if self.identifier.len() > MAX_IDENTIFIER_BYTES {
            errs.add(
                "Identifier",
                format!(
                    "was {} bytes long, must not be longer than {MAX_IDENTIFIER_BYTES}",
                    self.identifier.len()
                ),
            );
        }

        if self.parallelism < 1 {
            errs.add(
                "Parallelism",
                format!("was {}, must be greater than or equal to 1", self.parallelism),
            );
        }

        if self.parallelism > MAX_PARALLELISM {
            errs.add(
                "Parallelism",
                format!("was {}, must not be greater than {MAX_PARALLELISM}", self.parallelism),
            );
        }

        if self.parallelism >= 1 && self.node_index > self.parallelism - 1 {
            errs.add(
                "NodeIndex",
                format!(
                    "was {}, must not be greater than {}",
                    self.node_index,
                    self.parallelism - 1
                ),
            );
        }

        if !self.server_base_url.is_empty() && reqwest::Url::parse(&self.server_base_url).is_err()
        {
            errs.add("ServerBaseUrl", "must be a valid URL");
        }

        if self.access_token.is_empty() {
            errs.add("AccessToken", "must not be blank");
        }

        if self.organization_slug.is_empty() {
            errs.add("OrganizationSlug", "must not be blank");
        }

        if self.suite_slug.is_empty() {
            errs.add("SuiteSlug", "must not be blank");
        }

        if errs.0.is_empty() {
            Ok(())
        } else {
            Err(ConfigError { errors: errs.0 })
        }
    }
}
