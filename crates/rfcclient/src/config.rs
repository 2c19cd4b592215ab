//! # Connection Parameters
//!
//! Named logon and routing fields, validated into a `Route` before any I/O.
//!
//! ## Invariants
//! - **Route Required**: One of `ashost`, `mshost` or `gwhost` must be present.
//! - **Complete Groups**: A routing group must carry its sub-fields
//!   (`ashost` needs `sysnr`, `mshost` needs `sysid` and `group`, `gwhost`
//!   needs `gwserv`).
//! - **No Leaks**: `Debug` never prints the password.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;
use crate::error::Result;
use crate::error::RfcError;

/// Logon and routing fields for one session.
///
/// Keys are case-insensitive when built with `from_pairs`. Unrecognized keys
/// are kept in `extras` and forwarded with the logon.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionParameters {
    pub ashost: Option<String>,
    pub sysnr: Option<String>,
    pub gwhost: Option<String>,
    pub gwserv: Option<String>,
    pub mshost: Option<String>,
    pub msserv: Option<String>,
    pub sysid: Option<String>,
    pub group: Option<String>,
    pub client: Option<String>,
    pub user: Option<String>,
    pub passwd: Option<String>,
    pub lang: Option<String>,
    pub saprouter: Option<String>,
    /// Overrides the port derived from the route.
    pub server_port: Option<u16>,
    /// Connect and I/O timeout, in seconds.
    pub timeout: Option<u64>,
    #[serde(flatten)]
    pub extras: BTreeMap<String, String>,
}

/// The resolved way to reach the remote system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Application { host: String, sysnr: String },
    MessageServer { host: String, service: Option<String>, sysid: String, group: String },
    Gateway { host: String, service: String },
}

impl Route {
    pub fn host(&self) -> &str {
        match self {
            Self::Application { host, .. }
            | Self::MessageServer { host, .. }
            | Self::Gateway { host, .. } => host,
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Application { host, sysnr } => write!(f, "ashost={} sysnr={}", host, sysnr),
            Self::MessageServer { host, sysid, group, .. } => {
                write!(f, "mshost={} sysid={} group={}", host, sysid, group)
            }
            Self::Gateway { host, service } => write!(f, "gwhost={} gwserv={}", host, service),
        }
    }
}

impl ConnectionParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds parameters from key/value pairs, ignoring key case.
    ///
    /// # Errors
    /// `ExternalRuntime` (`RFC_INVALID_PARAMETER`) when `server_port` or
    /// `timeout` is not a number.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            params.set(key.as_ref(), value.into())?;
        }
        Ok(params)
    }

    /// Sets one field by name, ignoring key case.
    pub fn set(&mut self, key: &str, value: String) -> Result<()> {
        let key = key.to_ascii_lowercase();
        let slot = match key.as_str() {
            "ashost" => &mut self.ashost,
            "sysnr" => &mut self.sysnr,
            "gwhost" => &mut self.gwhost,
            "gwserv" => &mut self.gwserv,
            "mshost" => &mut self.mshost,
            "msserv" => &mut self.msserv,
            "sysid" => &mut self.sysid,
            "group" => &mut self.group,
            "client" => &mut self.client,
            "user" => &mut self.user,
            "passwd" => &mut self.passwd,
            "lang" => &mut self.lang,
            "saprouter" => &mut self.saprouter,
            "server_port" => {
                self.server_port = Some(parse_number(&key, &value)?);
                return Ok(());
            }
            "timeout" => {
                self.timeout = Some(parse_number(&key, &value)?);
                return Ok(());
            }
            _ => {
                self.extras.insert(key, value);
                return Ok(());
            }
        };
        *slot = Some(value);
        Ok(())
    }

    /// Builder-style `set` for known-good values.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Result<Self> {
        self.set(key, value.into())?;
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    /// Validates completeness and resolves the routing group.
    ///
    /// Precedence when several groups are present: application server,
    /// then message server, then gateway.
    pub fn route(&self) -> Result<Route> {
        if self.is_empty() {
            return Err(Error::Rfc(RfcError::ParametersMissing));
        }

        if let Some(host) = &self.ashost {
            let [sysnr] = require([("SYSNR", &self.sysnr)])?;
            return Ok(Route::Application { host: host.clone(), sysnr });
        }

        if let Some(host) = &self.mshost {
            let [sysid, group] = require([("SYSID", &self.sysid), ("GROUP", &self.group)])?;
            return Ok(Route::MessageServer {
                host: host.clone(),
                service: self.msserv.clone(),
                sysid,
                group,
            });
        }

        if let Some(host) = &self.gwhost {
            let [service] = require([("GWSERV", &self.gwserv)])?;
            return Ok(Route::Gateway { host: host.clone(), service });
        }

        Err(Error::invalid_parameter("Parameter ASHOST, GWHOST, MSHOST or SERVER_PORT is missing."))
    }

    /// Fields sent with the logon request, keyed by upper-case name.
    ///
    /// Transport-only settings (`server_port`, `timeout`) are not included.
    pub fn logon_fields(&self) -> Vec<(String, String)> {
        let named = [
            ("ASHOST", &self.ashost),
            ("SYSNR", &self.sysnr),
            ("GWHOST", &self.gwhost),
            ("GWSERV", &self.gwserv),
            ("MSHOST", &self.mshost),
            ("MSSERV", &self.msserv),
            ("SYSID", &self.sysid),
            ("GROUP", &self.group),
            ("CLIENT", &self.client),
            ("USER", &self.user),
            ("PASSWD", &self.passwd),
            ("LANG", &self.lang),
            ("SAPROUTER", &self.saprouter),
        ];
        let mut fields: Vec<(String, String)> = named
            .into_iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.to_string(), v.clone())))
            .collect();
        fields.extend(self.extras.iter().map(|(k, v)| (k.to_ascii_uppercase(), v.clone())));
        fields
    }
}

fn require<const N: usize>(fields: [(&str, &Option<String>); N]) -> Result<[String; N]> {
    let missing: Vec<&str> = fields.iter().filter(|(_, v)| v.is_none()).map(|(k, _)| *k).collect();
    if !missing.is_empty() {
        return Err(Error::invalid_parameter(format!("Parameter {} is missing.", missing.join(", "))));
    }
    Ok(fields.map(|(_, v)| v.clone().unwrap_or_default()))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::invalid_parameter(format!("Parameter {} must be a number, received {:?}", key.to_ascii_uppercase(), value)))
}

impl std::fmt::Debug for ConnectionParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParameters")
            .field("ashost", &self.ashost)
            .field("sysnr", &self.sysnr)
            .field("gwhost", &self.gwhost)
            .field("gwserv", &self.gwserv)
            .field("mshost", &self.mshost)
            .field("msserv", &self.msserv)
            .field("sysid", &self.sysid)
            .field("group", &self.group)
            .field("client", &self.client)
            .field("user", &self.user)
            .field("passwd", &self.passwd.as_ref().map(|_| "***"))
            .field("lang", &self.lang)
            .field("saprouter", &self.saprouter)
            .field("server_port", &self.server_port)
            .field("timeout", &self.timeout)
            .field("extras", &self.extras)
            .finish()
    }
}
