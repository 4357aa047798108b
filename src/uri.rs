use std::str::FromStr;

use anyhow::Context;

use crate::databases::postgres::PostgresDB;
use crate::databases::sqlite::SqliteDB;
use crate::databases::traits::{DBReader, DBWriter};

const POSTGRES_DEFAULT_PORT: u16 = 5432;

#[derive(Debug, Clone, PartialEq)]
pub enum URI {
    Sqlite(String),
    Postgres(String),
}

/// Position of the `host[:port]` part inside a network URI.
struct Authority<'a> {
    scheme: &'a str,
    userinfo: Option<&'a str>,
    host: &'a str,
    port: Option<&'a str>,
    rest: &'a str,
}

impl<'a> Authority<'a> {
    fn parse(uri: &'a str) -> anyhow::Result<Self> {
        let (scheme, after_scheme) = uri.split_once("://").context("URI has no scheme")?;
        let end = after_scheme
            .find(['/', '?'])
            .unwrap_or(after_scheme.len());
        let (authority, rest) = after_scheme.split_at(end);
        let (userinfo, hostport) = match authority.rfind('@') {
            Some(idx) => (Some(&authority[..idx]), &authority[idx + 1..]),
            None => (None, authority),
        };
        // Bracketed IPv6 hosts contain colons of their own
        let port_separator = match hostport.rfind(']') {
            Some(bracket) => hostport[bracket..].find(':').map(|idx| bracket + idx),
            None => hostport.rfind(':'),
        };
        let (host, port) = match port_separator {
            Some(idx) => (&hostport[..idx], Some(&hostport[idx + 1..])),
            None => (hostport, None),
        };
        if host.is_empty() {
            return Err(anyhow::anyhow!("URI has no host"));
        }
        return Ok(Self {
            scheme,
            userinfo,
            host,
            port,
            rest,
        });
    }
}

impl URI {
    /// Host and port the database listens on, for network databases.
    pub fn endpoint(&self) -> anyhow::Result<(String, u16)> {
        return match self {
            URI::Sqlite(_) => Err(anyhow::anyhow!("sqlite databases have no network endpoint")),
            URI::Postgres(uri) => {
                let authority = Authority::parse(uri)?;
                let port = match authority.port {
                    Some(port) => port.parse().context("Invalid port in URI")?,
                    None => POSTGRES_DEFAULT_PORT,
                };
                Ok((authority.host.trim_matches(['[', ']']).to_string(), port))
            }
        };
    }

    /// Same database, reached through another host and port (e.g. a local tunnel end).
    pub fn with_endpoint(&self, host: &str, port: u16) -> anyhow::Result<URI> {
        return match self {
            URI::Sqlite(_) => Err(anyhow::anyhow!("sqlite databases have no network endpoint")),
            URI::Postgres(uri) => {
                let authority = Authority::parse(uri)?;
                let userinfo = authority
                    .userinfo
                    .map(|userinfo| format!("{userinfo}@"))
                    .unwrap_or_default();
                Ok(URI::Postgres(format!(
                    "{}://{userinfo}{host}:{port}{}",
                    authority.scheme, authority.rest
                )))
            }
        };
    }

    pub fn create_reader(&self) -> anyhow::Result<Box<dyn DBReader>> {
        let reader: Box<dyn DBReader> = match self {
            URI::Sqlite(uri) => {
                Box::new(SqliteDB::new(uri).context("Unable to connect to the sqlite")?)
            }
            URI::Postgres(uri) => {
                Box::new(PostgresDB::new(uri).context("Unable to connect to the postgres")?)
            }
        };
        return Ok(reader);
    }

    pub fn create_writer(&self) -> anyhow::Result<Box<dyn DBWriter>> {
        let writer: Box<dyn DBWriter> = match self {
            URI::Sqlite(uri) => {
                Box::new(SqliteDB::new(uri).context("Unable to connect to the sqlite")?)
            }
            URI::Postgres(uri) => {
                Box::new(PostgresDB::new(uri).context("Unable to connect to the postgres")?)
            }
        };
        return Ok(writer);
    }

    /// URI without the password, for logs.
    pub fn redacted(&self) -> String {
        return match self {
            URI::Sqlite(uri) => uri.clone(),
            URI::Postgres(uri) => match Authority::parse(uri) {
                Ok(Authority {
                    scheme,
                    userinfo: Some(userinfo),
                    host,
                    port,
                    rest,
                }) => {
                    let user = match userinfo.split_once(':') {
                        Some((user, _)) => format!("{user}:***"),
                        None => userinfo.to_string(),
                    };
                    let port = port.map(|p| format!(":{p}")).unwrap_or_default();
                    format!("{scheme}://{user}@{host}{port}{rest}")
                }
                _ => uri.clone(),
            },
        };
    }
}

impl FromStr for URI {
    type Err = String;

    fn from_str(s: &str) -> Result<URI, Self::Err> {
        if s.starts_with("sqlite://") {
            return Ok(URI::Sqlite(s.to_owned()));
        }
        if s.starts_with("postgres://") || s.starts_with("postgresql://") {
            return Ok(URI::Postgres(s.to_owned()));
        }
        return Err("Unknown URI format".to_string());
    }
}
